//! Principal extraction from gateway-provided headers.
//!
//! The gateway in front of this service authenticates callers and forwards who they are.
//! Header values are trusted as-is.

use crate::auth::Principal;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

pub const HEADER_USER_ID: &str = "X-User-Id";
pub const HEADER_USER_PERMISSIONS: &str = "X-User-Permissions";

#[derive(Debug)]
pub enum PrincipalExtractionError {
    MissingUserId,
}

impl IntoResponse for PrincipalExtractionError {
    fn into_response(self) -> Response {
        match self {
            PrincipalExtractionError::MissingUserId => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": format!("missing {} header", HEADER_USER_ID),
                    "status": StatusCode::UNAUTHORIZED.as_u16(),
                })),
            )
                .into_response(),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = PrincipalExtractionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner_id = match header_value(parts, HEADER_USER_ID) {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!("No {} header on request", HEADER_USER_ID);
                return Err(PrincipalExtractionError::MissingUserId);
            }
        };
        let permissions = header_value(parts, HEADER_USER_PERMISSIONS).unwrap_or_default();

        Ok(Principal::from_aliases(owner_id, &permissions))
    }
}
