use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The oracle returned empty or whitespace-only text. The only hard
    /// failure of the structurer.
    #[error("the generated text was empty")]
    EmptyGeneration,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("too many requests, try again in a few minutes")]
    RateLimited,
    #[error("book generation timed out, please try again")]
    OracleTimeout,
    #[error("text generation failed: {0}")]
    Oracle(String),
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::EmptyGeneration | Error::OracleTimeout | Error::Oracle(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
