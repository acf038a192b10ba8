//! Operation outcome vocabulary shared by the store, the bookmark manager and the HTTP layer.
//!
//! Every store and manager call resolves to exactly one [`OperationStatus`], including on
//! success. The accompanying [`OperationError`] only carries human readable detail; callers
//! decide what to do by looking at the status.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Operation family an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFamily {
    Create,
    Update,
    Delete,
    Authorization,
    Fetch,
    AttachPost,
    DetachPost,
    General,
}

/// Terminal outcome of a bookmark operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    CreateSuccess,
    CreateFailed,
    UpdateSuccess,
    UpdateFailed,
    DeleteFailed,
    DeleteSuccess,
    Unauthorized,
    Authorized,
    Forbidden,
    FetchFailed,
    NotExist,
    PostFailed,
    PostSuccess,
    Success,
    DeletePostFailed,
    DeletePostSuccess,
    Duplicate,
    PostRevokeFailed,
}

impl OperationStatus {
    /// Stable numeric code, kept compatible with the codes clients already know about.
    pub fn code(self) -> u16 {
        match self {
            OperationStatus::CreateSuccess => 100,
            OperationStatus::CreateFailed => 101,
            OperationStatus::UpdateSuccess => 200,
            OperationStatus::UpdateFailed => 201,
            OperationStatus::DeleteFailed => 300,
            OperationStatus::DeleteSuccess => 301,
            OperationStatus::Unauthorized => 500,
            OperationStatus::Authorized => 501,
            OperationStatus::Forbidden => 502,
            OperationStatus::FetchFailed => 600,
            OperationStatus::NotExist => 601,
            OperationStatus::PostFailed => 602,
            OperationStatus::PostSuccess => 603,
            OperationStatus::Success => 700,
            OperationStatus::DeletePostFailed => 800,
            OperationStatus::DeletePostSuccess => 801,
            OperationStatus::Duplicate => 802,
            OperationStatus::PostRevokeFailed => 803,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(OperationStatus::CreateSuccess),
            101 => Some(OperationStatus::CreateFailed),
            200 => Some(OperationStatus::UpdateSuccess),
            201 => Some(OperationStatus::UpdateFailed),
            300 => Some(OperationStatus::DeleteFailed),
            301 => Some(OperationStatus::DeleteSuccess),
            500 => Some(OperationStatus::Unauthorized),
            501 => Some(OperationStatus::Authorized),
            502 => Some(OperationStatus::Forbidden),
            600 => Some(OperationStatus::FetchFailed),
            601 => Some(OperationStatus::NotExist),
            602 => Some(OperationStatus::PostFailed),
            603 => Some(OperationStatus::PostSuccess),
            700 => Some(OperationStatus::Success),
            800 => Some(OperationStatus::DeletePostFailed),
            801 => Some(OperationStatus::DeletePostSuccess),
            802 => Some(OperationStatus::Duplicate),
            803 => Some(OperationStatus::PostRevokeFailed),
            _ => None,
        }
    }

    pub fn family(self) -> StatusFamily {
        match self {
            OperationStatus::CreateSuccess
            | OperationStatus::CreateFailed
            | OperationStatus::Duplicate => StatusFamily::Create,
            OperationStatus::UpdateSuccess | OperationStatus::UpdateFailed => StatusFamily::Update,
            OperationStatus::DeleteFailed | OperationStatus::DeleteSuccess => StatusFamily::Delete,
            OperationStatus::Unauthorized
            | OperationStatus::Authorized
            | OperationStatus::Forbidden => StatusFamily::Authorization,
            OperationStatus::FetchFailed | OperationStatus::NotExist => StatusFamily::Fetch,
            OperationStatus::PostFailed | OperationStatus::PostSuccess => StatusFamily::AttachPost,
            OperationStatus::DeletePostFailed
            | OperationStatus::DeletePostSuccess
            | OperationStatus::PostRevokeFailed => StatusFamily::DetachPost,
            OperationStatus::Success => StatusFamily::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::CreateSuccess => "create_success",
            OperationStatus::CreateFailed => "create_failed",
            OperationStatus::UpdateSuccess => "update_success",
            OperationStatus::UpdateFailed => "update_failed",
            OperationStatus::DeleteFailed => "delete_failed",
            OperationStatus::DeleteSuccess => "delete_success",
            OperationStatus::Unauthorized => "unauthorized",
            OperationStatus::Authorized => "authorized",
            OperationStatus::Forbidden => "forbidden",
            OperationStatus::FetchFailed => "fetch_failed",
            OperationStatus::NotExist => "not_exist",
            OperationStatus::PostFailed => "post_failed",
            OperationStatus::PostSuccess => "post_success",
            OperationStatus::Success => "success",
            OperationStatus::DeletePostFailed => "delete_post_failed",
            OperationStatus::DeletePostSuccess => "delete_post_success",
            OperationStatus::Duplicate => "duplicate",
            OperationStatus::PostRevokeFailed => "post_revoke_failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// Successful result of an operation together with the status that describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub status: OperationStatus,
}

impl<T> Outcome<T> {
    pub fn new(value: T, status: OperationStatus) -> Self {
        Self { value, status }
    }
}

impl Outcome<()> {
    pub fn status(status: OperationStatus) -> Self {
        Self { value: (), status }
    }
}

/// Failed operation. The status is authoritative, the message is for humans.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    pub status: OperationStatus,
    pub message: String,
}

impl OperationError {
    pub fn new(status: OperationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Re-labels the failure with the status of the calling operation, keeping the detail.
    pub fn with_status(self, status: OperationStatus) -> Self {
        Self { status, ..self }
    }
}

pub type OperationResult<T> = Result<Outcome<T>, OperationError>;
