use thiserror::Error;

use crate::db::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict_error",
            ServiceError::Authorization(_) => "authorization_error",
            ServiceError::NotFound(_) => "not_found_error",
            ServiceError::Storage(_) => "internal_error",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
