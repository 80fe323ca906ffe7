use crate::models::MovieId;
use std::fmt;

/// Failure of a single catalog request. On any of these the call yields no data.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Network, DNS or timeout failure before a response was read.
    #[error("catalog transport error: {0}")]
    Transport(String),

    #[error("catalog returned status {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("malformed catalog payload from {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl CatalogError {
    pub fn is_transport(&self) -> bool {
        matches!(self, CatalogError::Transport(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Transport(err.to_string())
    }
}

/// Which of the three detail sub-requests failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPart {
    Detail,
    Credits,
    Videos,
}

impl fmt::Display for DetailPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailPart::Detail => write!(f, "detail"),
            DetailPart::Credits => write!(f, "credits"),
            DetailPart::Videos => write!(f, "videos"),
        }
    }
}

/// The detail view could not be assembled; wraps the first sub-request failure.
#[derive(thiserror::Error, Debug)]
#[error("failed to aggregate movie {movie_id}: {part} request failed: {source}")]
pub struct AggregationError {
    pub movie_id: MovieId,
    pub part: DetailPart,
    #[source]
    pub source: CatalogError,
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("trending store unavailable: {0}")]
    Unavailable(String),

    #[error("trending store rejected {operation} with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed trending store payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::Unavailable(err.to_string())
    }
}
