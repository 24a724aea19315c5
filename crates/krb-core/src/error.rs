use thiserror::Error;

pub type KrbResult<T> = Result<T, KrbError>;

#[derive(Debug, Error)]
pub enum KrbError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
