use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnimError>;

/// Every failure that can abort a render. None of them are retried.
#[derive(Error, Debug)]
pub enum AnimError {
    /// Missing or unreadable input file
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unsupported or corrupt media
    #[error("Decode error ({what}): {reason}")]
    Decode { what: String, reason: String },

    /// A user parameter, or a size derived from one, is unusable
    #[error("Configuration error: {param}: {reason}")]
    Configuration { param: String, reason: String },

    /// A frame does not match the shape an effect expects
    #[error("Effect error in {effect}: {reason}")]
    Effect { effect: &'static str, reason: String },

    /// Two clips that must line up frame-for-frame do not
    #[error("Alignment error ({what}): expected {expected}, got {got}")]
    Alignment {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// The external encoder failed
    #[error("Encode error: {0}")]
    Encode(String),
}

impl AnimError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnimError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        AnimError::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(param: impl Into<String>, reason: impl Into<String>) -> Self {
        AnimError::Configuration {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn effect(effect: &'static str, reason: impl Into<String>) -> Self {
        AnimError::Effect {
            effect,
            reason: reason.into(),
        }
    }
}

impl From<symphonia::core::errors::Error> for AnimError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AnimError::decode("audio", err)
    }
}
