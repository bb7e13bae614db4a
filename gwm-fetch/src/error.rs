use thiserror::Error;

/// Errors raised while fetching rows from the backend.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not a JSON array of rows
    #[error("failed to decode rows: {0}")]
    Decode(String),

    /// Pagination needs a positive page size
    #[error("page size must be greater than zero")]
    InvalidPageSize,

    /// The caller abandoned the fetch
    #[error("fetch cancelled")]
    Cancelled,
}

#[cfg(feature = "api")]
impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            FetchError::Decode(value.to_string())
        } else {
            FetchError::Transport(value.to_string())
        }
    }
}
