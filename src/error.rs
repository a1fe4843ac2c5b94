//! Error handling for Mixline
//!
//! Resolution anomalies are not errors (see `timeline::ResolutionWarning`).
//! Everything here is reported to a caller that decides whether to skip a
//! segment or surface a diagnostic.

use thiserror::Error;

/// Result type alias for Mixline operations
pub type Result<T> = std::result::Result<T, MixlineError>;

/// Main error type for Mixline operations
#[derive(Error, Debug)]
pub enum MixlineError {
    // Resource Errors
    #[error("Resource not found: {resource_id}")]
    ResourceNotFound { resource_id: String },

    #[error("Failed to fetch resource {resource_id}: {reason}")]
    FetchFailed {
        resource_id: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to decode resource {resource_id}: {reason}")]
    DecodeFailed {
        resource_id: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid range {start:.3}s-{end:.3}s for resource {resource_id}")]
    InvalidRange {
        resource_id: String,
        start: f64,
        end: f64,
    },

    // Playback Errors
    #[error("Timeline is empty, nothing to schedule")]
    EmptyTimeline,

    #[error("Start position {from:.3}s is past the end of the timeline ({total:.3}s)")]
    PastEnd { from: f64, total: f64 },

    #[error("Cannot replace the schedule while {state}")]
    ReconfigureWhileActive { state: String },

    #[error("Playback session has been destroyed")]
    SessionDestroyed,

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixlineError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixlineError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            MixlineError::FetchFailed { .. } => "FETCH_FAILED",
            MixlineError::DecodeFailed { .. } => "DECODE_FAILED",
            MixlineError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MixlineError::InvalidRange { .. } => "INVALID_RANGE",
            MixlineError::EmptyTimeline => "EMPTY_TIMELINE",
            MixlineError::PastEnd { .. } => "PAST_END",
            MixlineError::ReconfigureWhileActive { .. } => "RECONFIGURE_WHILE_ACTIVE",
            MixlineError::SessionDestroyed => "SESSION_DESTROYED",
            MixlineError::InvalidConfig { .. } => "INVALID_CONFIG",
            MixlineError::Io(_) => "IO_ERROR",
            MixlineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error only affects a single segment
    ///
    /// Recoverable errors skip the affected segment and let the rest of the
    /// session continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MixlineError::ResourceNotFound { .. }
                | MixlineError::FetchFailed { .. }
                | MixlineError::DecodeFailed { .. }
                | MixlineError::UnsupportedFormat { .. }
                | MixlineError::InvalidRange { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MixlineError::ResourceNotFound { .. } => vec![
                "Check that the track finished uploading",
                "Verify the resource id in the timeline document",
            ],
            MixlineError::FetchFailed { .. } => vec![
                "Check the network connection or source directory",
                "Retry once the generation job has finished",
            ],
            MixlineError::DecodeFailed { .. } | MixlineError::UnsupportedFormat { .. } => vec![
                "Convert the source to WAV (16/24/32-bit, mono or stereo)",
                "Re-upload the file; it may be truncated",
            ],
            MixlineError::InvalidRange { .. } => vec![
                "Check the clip start/end against the source length",
            ],
            MixlineError::EmptyTimeline => vec!["Add at least one clip or transition"],
            MixlineError::PastEnd { .. } => vec!["Seek to a position inside the timeline"],
            MixlineError::ReconfigureWhileActive { .. } => {
                vec!["Call stop() before replacing the schedule"]
            }
            MixlineError::SessionDestroyed => vec!["Create a new scheduler"],
            MixlineError::InvalidConfig { .. } => vec![
                "Check the configuration file and MIXLINE_* environment variables",
            ],
            _ => vec![],
        }
    }

    pub(crate) fn fetch_failed(resource_id: &str, reason: impl Into<String>) -> Self {
        MixlineError::FetchFailed {
            resource_id: resource_id.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn decode_failed<E>(resource_id: &str, reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MixlineError::DecodeFailed {
            resource_id: resource_id.to_string(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}
