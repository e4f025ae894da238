use thiserror::Error;

/// Failures raised by DOM mutations, mirroring the DOM exception names a page
/// script would see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("IndexSizeError: offset {offset} exceeds length {length}")]
    IndexSize { offset: usize, length: usize },
    #[error("InvalidStateError: {0}")]
    InvalidState(String),
    #[error("HierarchyRequestError: {0}")]
    HierarchyRequest(String),
    #[error("NotFoundError: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LibsqlError: {0}")]
    Libsql(#[from] libsql::Error),
    #[error("StorageUnavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum HighlightError {
    /// The DOM refused to surround the range with a marker.
    #[error("WrapFailure: {0}")]
    Wrap(#[source] DomError),
    #[error("PathResolutionFailure: {0}")]
    PathResolution(String),
    /// The saved offsets were taken against a text node that no longer exists as such.
    #[error("StaleTarget: {0}")]
    StaleTarget(String),
    #[error("StorageFailure: {0}")]
    Storage(#[from] StorageError),
    #[error("DomError: {0}")]
    Dom(#[from] DomError),
}

pub type DomResult<T> = Result<T, DomError>;
