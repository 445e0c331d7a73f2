use thiserror::Error;

/// Outcome of a single HTTP exchange that did not yield a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")] Timeout,
    #[error("connection refused: {0}")] ConnectionRefused(String),
    #[error("unexpected HTTP status {0}")] HttpStatus(u16),
    #[error("response body was empty")] EmptyBody,
    #[error("response body could not be decoded: {0}")] Decode(String),
    #[error("request failed: {0}")] Request(String),
}

impl TransportError {
    /// Failures that usually clear up on their own. Any other HTTP status
    /// means the backend refused the request and retrying cannot help.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus(code) => matches!(code, 408 | 429 | 500..=599),
            _ => true,
        }
    }
}

/// A decoded response that lacks the field a provider promises on success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} response is missing {missing}")]
pub struct ExtractionError {
    pub provider: &'static str,
    pub missing: String,
}

impl ExtractionError {
    pub fn new(provider: &'static str, missing: impl Into<String>) -> Self {
        Self {
            provider,
            missing: missing.into(),
        }
    }
}

/// Why one attempt of the retry loop failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// The only error type callers of the dispatcher observe.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI configuration error: {0}")]
    Configuration(String),
    #[error("AI backend unavailable after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },
    #[error("AI request cancelled")]
    Cancelled,
    #[error("AI backend rejected the request with HTTP {status}")]
    Rejected { status: u16 },
}

impl AiError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "AI-1001",
            Self::Exhausted { .. } => "AI-1002",
            Self::Cancelled => "AI-1003",
            Self::Rejected { .. } => "AI-1004",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The AI provider settings are incomplete or invalid; fix them before retrying."
            }
            Self::Exhausted { .. } => {
                "Every attempt to reach the AI backend failed and simulation is disabled."
            }
            Self::Cancelled => "The caller aborted the request before it completed.",
            Self::Rejected { .. } => {
                "The backend refused the request; check the API key, endpoint and model."
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_match_retry_classes() {
        assert!(TransportError::HttpStatus(408).is_transient());
        assert!(TransportError::HttpStatus(429).is_transient());
        assert!(TransportError::HttpStatus(503).is_transient());
        assert!(!TransportError::HttpStatus(401).is_transient());
        assert!(TransportError::Timeout.is_transient());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AiError::configuration("x").code(), "AI-1001");
        assert_eq!(AiError::Cancelled.code(), "AI-1003");
        let exhausted = AiError::Exhausted {
            attempts: 3,
            last: TransportError::EmptyBody.into(),
        };
        assert_eq!(exhausted.code(), "AI-1002");
        assert!(exhausted.to_string().contains("3 attempt(s)"));
        assert_eq!(AiError::Rejected { status: 401 }.code(), "AI-1004");
    }
}
