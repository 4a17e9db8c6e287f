//! OpenAI-specific error handling.

use journal_core::Error;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Map an OpenAI failure onto the journal error taxonomy.
///
/// `fallback` wraps codes that have no dedicated variant, so callers can keep
/// embedding and generation failures apart.
pub fn to_journal_error(
    code: OpenAIErrorCode,
    message: &str,
    fallback: fn(String) -> Error,
) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => fallback(format!("Rate limit exceeded: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => {
            fallback(format!("Context too long: {}", message))
        }
        OpenAIErrorCode::ServerError => fallback(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => fallback(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_status() {
        assert_eq!(
            OpenAIErrorCode::from_response(401, "invalid_api_key"),
            OpenAIErrorCode::AuthenticationError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(429, "rate_limit_exceeded"),
            OpenAIErrorCode::RateLimitExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(404, "model_not_found"),
            OpenAIErrorCode::ModelNotFound
        );
        assert_eq!(
            OpenAIErrorCode::from_response(400, "context_length_exceeded"),
            OpenAIErrorCode::ContextLengthExceeded
        );
        assert_eq!(
            OpenAIErrorCode::from_response(502, "bad_gateway"),
            OpenAIErrorCode::ServerError
        );
        assert_eq!(
            OpenAIErrorCode::from_response(418, "im_a_teapot"),
            OpenAIErrorCode::Unknown
        );
    }

    #[test]
    fn test_auth_failure_is_config_error() {
        let err = to_journal_error(
            OpenAIErrorCode::AuthenticationError,
            "Invalid key",
            Error::Inference,
        );
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_fallback_variant_is_used() {
        let err = to_journal_error(OpenAIErrorCode::ServerError, "boom", Error::Embedding);
        assert!(matches!(err, Error::Embedding(_)));

        let err = to_journal_error(OpenAIErrorCode::RateLimitExceeded, "slow down", Error::Inference);
        assert!(matches!(err, Error::Inference(_)));
        assert!(err.to_string().contains("Rate limit exceeded"));
    }
}
