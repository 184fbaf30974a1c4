//! Error handling and custom error types
//!
//! Provides unified error handling across the pipeline using thiserror. Each
//! variant corresponds to one failure class the pipeline can surface to the
//! user; `MalformedResponse` is the only one the normalizer absorbs itself.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Could not read the selected file: {0}")]
    ReadFailure(String),

    #[error("Analysis service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Model failure: {0}")]
    ModelFailure(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Analysis returned an unexpected or empty result")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("An analysis is already in progress")]
    Busy,

    #[error("Invalid pipeline transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fieldless mirror of [`Error`], for recording which class of failure
/// happened without holding on to the error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedContentType,
    ReadFailure,
    ServiceUnavailable,
    AuthRequired,
    NetworkFailure,
    ModelFailure,
    ServiceError,
    EmptyResponse,
    MalformedResponse,
    Busy,
    InvalidTransition,
    Config,
    Io,
}

const AUTH_KEYWORDS: &[&str] = &[
    "auth",
    "sign in",
    "signin",
    "sign-in",
    "login",
    "log in",
    "unauthorized",
    "forbidden",
    "401",
    "403",
    "api key",
    "permission",
];

const NETWORK_KEYWORDS: &[&str] = &[
    "network",
    "connection",
    "connect",
    "fetch",
    "timeout",
    "timed out",
    "dns",
    "offline",
    "unreachable",
];

const MODEL_KEYWORDS: &[&str] = &[
    "model",
    "quota",
    "rate limit",
    "rate-limit",
    "overloaded",
    "capacity",
    "429",
];

/// Coarse category used to phrase a failure for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Auth,
    Network,
    Model,
    Generic,
}

/// Best-effort keyword classification of arbitrary error text.
///
/// Auth wins over network, network over model. Ambiguous strings can land in
/// the wrong bucket; the result only picks the wording of a message.
pub fn classify_error_text(text: &str) -> FailureCategory {
    let lower = text.to_lowercase();
    if AUTH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FailureCategory::Auth
    } else if NETWORK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FailureCategory::Network
    } else if MODEL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FailureCategory::Model
    } else {
        FailureCategory::Generic
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            Error::ReadFailure(_) => ErrorKind::ReadFailure,
            Error::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Error::AuthRequired(_) => ErrorKind::AuthRequired,
            Error::NetworkFailure(_) => ErrorKind::NetworkFailure,
            Error::ModelFailure(_) => ErrorKind::ModelFailure,
            Error::ServiceError(_) => ErrorKind::ServiceError,
            Error::EmptyResponse => ErrorKind::EmptyResponse,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::Busy => ErrorKind::Busy,
            Error::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Error::AuthRequired(_) => FailureCategory::Auth,
            Error::NetworkFailure(_) => FailureCategory::Network,
            Error::ModelFailure(_) => FailureCategory::Model,
            other => classify_error_text(&other.to_string()),
        }
    }

    /// Message suitable for showing to the person who submitted the content.
    pub fn user_message(&self) -> String {
        match self {
            Error::UnsupportedContentType(detail) => format!(
                "{}. Please upload a standard image or text document.",
                detail
            ),
            Error::ReadFailure(_) => "Could not read the selected file.".to_string(),
            Error::ServiceUnavailable(_) => {
                "The analysis service is not loaded. Please refresh and try again.".to_string()
            }
            Error::Busy => "An analysis is already running. Please wait for it to finish.".to_string(),
            _ => match self.category() {
                FailureCategory::Auth => format!(
                    "Analysis failed: please sign in to the analysis service and try again. ({})",
                    self
                ),
                FailureCategory::Network => format!(
                    "Analysis failed: the analysis service could not be reached. Check your connection and try again. ({})",
                    self
                ),
                FailureCategory::Model => format!(
                    "Analysis failed: the AI model could not complete the request. Please try again later. ({})",
                    self
                ),
                FailureCategory::Generic => format!("Analysis failed: {}", self),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::NetworkFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_text() {
        assert_eq!(
            classify_error_text("401 Unauthorized"),
            FailureCategory::Auth
        );
        assert_eq!(
            classify_error_text("Please sign in first"),
            FailureCategory::Auth
        );
    }

    #[test]
    fn test_classify_network_text() {
        assert_eq!(
            classify_error_text("connection refused"),
            FailureCategory::Network
        );
    }

    #[test]
    fn test_classify_model_text() {
        assert_eq!(
            classify_error_text("model overloaded"),
            FailureCategory::Model
        );
        assert_eq!(
            classify_error_text("quota exceeded"),
            FailureCategory::Model
        );
    }

    #[test]
    fn test_classify_generic_text() {
        assert_eq!(
            classify_error_text("something odd happened"),
            FailureCategory::Generic
        );
    }

    #[test]
    fn test_auth_takes_priority_over_network() {
        assert_eq!(
            classify_error_text("network auth token rejected"),
            FailureCategory::Auth
        );
    }

    #[test]
    fn test_service_error_user_message_uses_keywords() {
        let err = Error::ServiceError("quota exceeded".to_string());
        let message = err.user_message();
        assert!(message.contains("AI model"));
        assert!(message.contains("quota exceeded"));
    }

    #[test]
    fn test_variant_category_overrides_text() {
        let err = Error::NetworkFailure("model endpoint".to_string());
        assert_eq!(err.category(), FailureCategory::Network);
    }

    #[test]
    fn test_unsupported_user_message() {
        let err = Error::UnsupportedContentType("File type \"video/mp4\" is not supported".into());
        assert!(err.user_message().contains("video/mp4"));
    }
}
