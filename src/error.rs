//! Error handling for Stompbox
//!
//! Errors map onto four failure classes: unknown effect names, invalid
//! settings, I/O failures and processing faults. None of them is allowed to
//! stop the audio loop; callers degrade to "keep previous state".

use thiserror::Error;

/// Result type alias for Stompbox operations
pub type Result<T> = std::result::Result<T, StompError>;

/// Main error type for Stompbox operations
#[derive(Error, Debug)]
pub enum StompError {
    // Registry Errors
    #[error("Effect not found: {name}")]
    EffectNotFound { name: String },

    // Setting Errors
    #[error("Invalid setting for '{effect}': {reason}")]
    InvalidSetting { effect: String, reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to read audio file: {path}")]
    AudioRead {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to write audio file: {path}")]
    AudioWrite {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Processing Errors
    #[error("Processing fault in effect '{effect}'")]
    ProcessingFault { effect: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StompError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StompError::EffectNotFound { .. } => "EFFECT_NOT_FOUND",
            StompError::InvalidSetting { .. } => "INVALID_SETTING",
            StompError::FileNotFound { .. } => "FILE_NOT_FOUND",
            StompError::AudioRead { .. } => "AUDIO_READ",
            StompError::AudioWrite { .. } => "AUDIO_WRITE",
            StompError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            StompError::ProcessingFault { .. } => "PROCESSING_FAULT",
            StompError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the pedal running on its previous state.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StompError::EffectNotFound { .. } => true,
            StompError::InvalidSetting { .. } => true,
            StompError::ProcessingFault { .. } => true,
            StompError::FileNotFound { .. } => true,
            _ => false,
        }
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            StompError::EffectNotFound { .. } => {
                "Check the effect name against `stompbox-cli effects`"
            }
            StompError::InvalidSetting { .. } => {
                "The previous setting is still in use; fix the config value and reload"
            }
            StompError::FileNotFound { .. } => "Check that the path exists and is readable",
            StompError::AudioRead { .. } | StompError::UnsupportedFormat { .. } => {
                "Convert the file to a PCM or float WAV"
            }
            StompError::AudioWrite { .. } => "Check the destination directory is writable",
            StompError::ProcessingFault { .. } => {
                "The sample was passed through unchanged; inspect the effect's settings"
            }
            StompError::Io(_) => "Retry the operation",
        }
    }

    /// Shorthand for an [`StompError::InvalidSetting`]
    pub fn invalid_setting(effect: &str, reason: impl Into<String>) -> Self {
        StompError::InvalidSetting {
            effect: effect.to_string(),
            reason: reason.into(),
        }
    }
}
