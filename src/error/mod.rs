// Error types for the audio/tempo core.
//
// Every error kind here maps to one of the four policies in spec §7:
// RecoverableCapture and RecoverableOverload are absorbed inside the
// pipeline and only ever surface through diagnostics; Invariant violations
// are clamped and recorded; FatalInit is the only variant that should stop
// the audio task from entering its main loop.

mod capture;
mod core;

pub use capture::{CaptureError, CaptureErrorCodes};
pub use core::{log_core_error, CoreError, CoreErrorCodes};

/// Standard way to get a stable numeric code and message from an error type.
pub trait ErrorCode {
    /// Numeric error code, stable across releases.
    fn code(&self) -> i32;

    /// Human-readable error message.
    fn message(&self) -> String;
}

/// Configuration loading failures (§6). Never fatal: callers fall back to
/// `CoreConfig::default()`, but the error is still available for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ReadFailed { path: String, reason: String },
    ParseFailed { path: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadFailed { path, reason } => {
                write!(f, "failed to read config {path}: {reason}")
            }
            ConfigError::ParseFailed { path, reason } => {
                write!(f, "failed to parse config {path}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
