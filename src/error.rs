use thiserror::Error;

/// Failure taxonomy for the synchronization client.
///
/// Nothing here is fatal to the process. Fetch and channel failures are
/// transient and absorbed by the caller (the worst outcome is a stale,
/// non-live view); validation and auth failures surface immediately to the
/// initiating action and are never retried automatically.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to fetch results: {0}")]
    FetchFailed(String),
    #[error("Failed to submit vote: {0}")]
    SubmitFailed(String),
    #[error("No option selected")]
    ValidationFailed,
    #[error("Authentication required")]
    AuthRequired,
    #[error("Live channel degraded: reconnect attempts exhausted")]
    ChannelDegraded,
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::FetchFailed(error.to_string())
    }
}
