use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use cordchat_common::CordChatError;
use std::fmt;

/// Maps domain errors onto HTTP responses with a JSON `{"error": ...}` body
#[derive(Debug)]
pub struct ApiError(pub CordChatError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<CordChatError> for ApiError {
    fn from(err: CordChatError) -> Self {
        Self(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.0.to_string()
        }))
    }
}
