//! Audio Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("Audio channel '{0}' is closed")]
    ChannelClosed(&'static str),

    #[error("Capture worklet has stopped")]
    WorkletStopped,

    #[error("Invalid audio frame: {0}")]
    InvalidFrame(String),
}

impl ContextualError for AudioError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

impl From<base64::DecodeError> for AudioError {
    fn from(err: base64::DecodeError) -> Self {
        AudioError::InvalidFrame(err.to_string())
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
