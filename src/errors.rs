use crate::models::batch::{ErrorResponse, LFS_MEDIA_TYPE};
use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

pub const BATCH_DOCS_URL: &str =
    "https://github.com/git-lfs/git-lfs/blob/v2.12.0/docs/api/batch.md#requests";

pub const LFS_AUTHENTICATE: HeaderName = HeaderName::from_static("lfs-authenticate");

const BASIC_CHALLENGE: &str = r#"Basic realm="Git LFS""#;

/// A request-fatal failure, rendered as an LFS `ErrorResponse`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub documentation_url: Option<String>,
    pub request_id: Option<String>,
    /// Send an `LFS-Authenticate` Basic challenge with the response.
    pub challenge: bool,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            documentation_url: None,
            request_id: None,
            challenge: false,
        }
    }

    /// 401 with a Basic challenge. `reason` is appended to "Unauthorized".
    pub fn unauthorized(reason: Option<&str>) -> Self {
        let message = match reason {
            Some(reason) => format!("Unauthorized: {reason}"),
            None => "Unauthorized".to_string(),
        };
        Self {
            challenge: true,
            ..Self::new(StatusCode::UNAUTHORIZED, message)
        }
    }

    /// Body could not be decoded. Git LFS servers answer this with 404.
    pub fn unparseable() -> Self {
        Self {
            documentation_url: Some(BATCH_DOCS_URL.to_string()),
            ..Self::new(StatusCode::NOT_FOUND, "could not parse request")
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

/// Headers every batch endpoint response carries.
pub fn lfs_headers() -> [(HeaderName, HeaderValue); 2] {
    [
        (header::CONTENT_TYPE, HeaderValue::from_static(LFS_MEDIA_TYPE)),
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
    ]
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
            documentation_url: self.documentation_url,
            request_id: self.request_id,
        });

        let mut response = (self.status, lfs_headers(), body).into_response();
        if self.challenge {
            response
                .headers_mut()
                .insert(LFS_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }
        response
    }
}
