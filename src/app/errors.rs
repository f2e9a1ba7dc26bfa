use crate::items::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
