use tracing::error;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A two-sided edge update failed half way and was rolled back.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SocialError {
    /// Logical errors are reported straight away and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unavailable(_))
    }
}

impl From<StoreError> for SocialError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(reason) => Self::Unavailable(reason),
            StoreError::Backend(e) => {
                error!("Store backend error: {:#}", e);
                Self::Internal(e.to_string())
            }
        }
    }
}

pub type SocialResult<T> = Result<T, SocialError>;
