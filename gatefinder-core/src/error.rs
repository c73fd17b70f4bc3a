use gatefinder_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("Scanner error: {0}")]
    Scan(#[from] ScanError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectError>;
