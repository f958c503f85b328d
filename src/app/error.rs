use thiserror::Error;

use crate::infra::store::StoreError;

/// Outcome kinds shared by every service. `NotFound` and `NotOwner` are
/// always raised before anything is written.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("acting user does not own this record")]
    NotOwner,
    #[error("you may only vote once")]
    DuplicateVote,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejects missing or whitespace-only required text fields.
pub fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
