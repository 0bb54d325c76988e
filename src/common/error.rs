use reqwest::StatusCode;
use serde::Deserialize;

/// Errors returned by the [`ApiClient`](super::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend answered `401`, the session is gone.
    #[error("Session expired, please sign in again")]
    Unauthorized,
    /// The backend answered `404`.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Any other non-success status, `message` is what the backend said.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("Cannot reach API server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// Rejected locally before anything was sent.
    #[error("{0}")]
    InvalidInput(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Builds an error from a failed response body.
    ///
    /// The backend replies with `{"error": "..."}`, in which case only the message
    /// is kept, otherwise the raw body (or the status reason) is used.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ => ApiError::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_response() {
        let err = ApiError::from_response(
            StatusCode::BAD_REQUEST,
            r#"{"error": "task already completed"}"#,
        );
        assert_eq!(err.to_string(), "task already completed");

        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.to_string(), "upstream down");

        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.to_string(), "Internal Server Error");

        assert!(ApiError::from_response(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(
            ApiError::from_response(StatusCode::NOT_FOUND, r#"{"error":"endpoint not found"}"#)
                .is_not_found()
        );
    }
}
