//! Mapping of operation outcomes onto HTTP.

use crate::status::{OperationError, OperationStatus};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub fn http_status(status: OperationStatus) -> StatusCode {
    match status {
        OperationStatus::CreateSuccess => StatusCode::CREATED,
        OperationStatus::UpdateSuccess
        | OperationStatus::DeleteSuccess
        | OperationStatus::Authorized
        | OperationStatus::PostSuccess
        | OperationStatus::Success
        | OperationStatus::DeletePostSuccess => StatusCode::OK,
        OperationStatus::NotExist => StatusCode::NOT_FOUND,
        OperationStatus::Duplicate => StatusCode::CONFLICT,
        OperationStatus::Unauthorized => StatusCode::UNAUTHORIZED,
        OperationStatus::Forbidden => StatusCode::FORBIDDEN,
        OperationStatus::CreateFailed
        | OperationStatus::UpdateFailed
        | OperationStatus::DeleteFailed
        | OperationStatus::FetchFailed
        | OperationStatus::PostFailed
        | OperationStatus::DeletePostFailed
        | OperationStatus::PostRevokeFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: OperationStatus,
}

#[derive(Serialize)]
pub struct MessageBody {
    pub message: &'static str,
    pub status: OperationStatus,
}

#[derive(Serialize)]
pub struct PaginatedBody<T> {
    pub data: T,
    pub page: usize,
    pub per_page: usize,
    pub status_code: u16,
}

impl IntoResponse for OperationError {
    fn into_response(self) -> Response {
        (
            http_status(self.status),
            Json(ErrorBody {
                error: self.message,
                status: self.status,
            }),
        )
            .into_response()
    }
}

/// 400 for requests that never reached the bookmark manager.
pub fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": message.into(),
            "status": StatusCode::BAD_REQUEST.as_u16(),
        })),
    )
        .into_response()
}
