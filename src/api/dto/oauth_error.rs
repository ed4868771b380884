use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::authorize::AuthorizeError;

/// OAuth2 error body (`error`, `error_description`) with its status code.
#[derive(Debug, Clone)]
pub struct OAuthErrorResponse {
    pub status: StatusCode,
    pub error: AuthorizeError,
}

#[derive(Serialize)]
struct OAuthErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<&'a str>,
}

impl OAuthErrorResponse {
    pub fn bad_request(error: AuthorizeError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    pub fn invalid_client() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: AuthorizeError::new("invalid_client", "Client authentication failed."),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: AuthorizeError::new("server_error", ""),
        }
    }
}

impl IntoResponse for OAuthErrorResponse {
    fn into_response(self) -> Response {
        let body = OAuthErrorBody {
            error: &self.error.error,
            error_description: Some(self.error.description.as_str()).filter(|d| !d.is_empty()),
        };
        (self.status, Json(body)).into_response()
    }
}
