use thiserror::Error;

use crate::data_unit::CaptionDataType;

/// Errors produced while framing or emitting captions.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data unit too large: {size} bytes does not fit a 24-bit length (max {max})")]
    DataUnitTooLarge { size: usize, max: usize },

    #[error("Caption statement must carry at least one data unit")]
    EmptyStatement,

    #[error("Data group payload too large: {size} bytes exceeds {max} bytes (256 linked groups)")]
    GroupTooLarge { size: usize, max: usize },

    #[error("{0:?} is not a caption management type")]
    NotManagement(CaptionDataType),

    #[error("{0:?} is not a caption statement type")]
    NotStatement(CaptionDataType),

    #[error("Caption encoder task is no longer running")]
    EncoderClosed,
}

impl CaptionError {
    /// Whether the error came from the output sink rather than from framing.
    pub fn is_io(&self) -> bool {
        matches!(self, CaptionError::Io(_))
    }
}
