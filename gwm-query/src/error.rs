use gwm_fetch::FetchError;
use thiserror::Error;

/// Failures that reach the caller of a load.
///
/// Cache problems, bad coordinates and bad dates never show up here; they
/// degrade the result instead.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The backend could not be read
    #[error("failed to load data: {0}")]
    Transport(FetchError),

    /// The caller abandoned the load; its results were discarded
    #[error("load cancelled")]
    Cancelled,
}

impl From<FetchError> for LoadError {
    fn from(value: FetchError) -> Self {
        match value {
            FetchError::Cancelled => LoadError::Cancelled,
            other => LoadError::Transport(other),
        }
    }
}
