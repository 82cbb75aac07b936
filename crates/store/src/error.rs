use thiserror::Error;

/// Failure talking to the object store, tagged with whether the caller
/// should bother retrying.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
    message: String,
    retryable: bool,
}

impl GatewayError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flag_survives_construction() {
        assert!(GatewayError::retryable("slow down").is_retryable());
        assert!(!GatewayError::non_retryable("no such upload").is_retryable());
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = GatewayError::non_retryable("no such upload");
        assert_eq!(err.to_string(), "no such upload");
    }
}
