use convertr_core::models::TransitionError;
use uuid::Uuid;

/// Message shown when "convert all" finds nothing to start because no file
/// has a target format
pub const NO_TARGET_MESSAGE: &str = "Please select a target format for at least one file";

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Please select a target format for at least one file")]
    NoTargetSelected,

    #[error("Job {0} not found")]
    UnknownJob(Uuid),

    #[error("Job {0} has no converted output")]
    NotCompleted(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Download failed: {0}")]
    Download(String),
}

/// Failure talking to the conversion server
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Could not reach the conversion server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from the conversion server: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the failure says nothing about the job itself, so the same
    /// request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Rejected(_) | ApiError::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_target_message() {
        assert_eq!(OrchestratorError::NoTargetSelected.to_string(), NO_TARGET_MESSAGE);
    }

    #[test]
    fn test_status_errors_retry_only_on_server_side_failures() {
        let unavailable = ApiError::Status {
            status: 503,
            code: Some("QUEUE_FULL".to_string()),
            message: "busy".to_string(),
        };
        assert!(unavailable.is_retryable());

        let unsupported = ApiError::Status {
            status: 400,
            code: Some("UNSUPPORTED_FORMAT".to_string()),
            message: "nope".to_string(),
        };
        assert!(!unsupported.is_retryable());
        assert!(!ApiError::Rejected("empty".to_string()).is_retryable());
    }
}
