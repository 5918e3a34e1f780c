use arib_caption::CaptionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Caption error: {0}")]
    Caption(#[from] CaptionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AppError>;
