use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Network { message: String, timeout: bool },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Upstream rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// Transport failures, timeouts and 5xx responses are worth another attempt.
    /// Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network { .. } => true,
            ApiError::Api { status, .. } => *status >= 500,
            ApiError::Rejected { .. } | ApiError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Parse(err.to_string());
        }
        ApiError::Network {
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        let five = ApiError::Api {
            status: 503,
            message: "busy".into(),
        };
        let four = ApiError::Api {
            status: 404,
            message: "gone".into(),
        };
        assert!(five.is_retryable());
        assert!(!four.is_retryable());
    }

    #[test]
    fn rejected_and_parse_errors_are_final() {
        let rejected = ApiError::Rejected {
            code: -460,
            message: "cheating".into(),
        };
        assert!(!rejected.is_retryable());
        assert!(!ApiError::Parse("eof".into()).is_retryable());
        assert!(ApiError::Network {
            message: "reset".into(),
            timeout: false
        }
        .is_retryable());
    }
}
