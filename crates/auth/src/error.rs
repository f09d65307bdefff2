use thiserror::Error;

/// Failure of an external collaborator (user directory, permission store,
/// feature-flag source).
///
/// The pipeline converts these into [`crate::Denial::InternalError`]; they are
/// never interpreted as an allow or a deny.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,

    #[error("store returned invalid data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
