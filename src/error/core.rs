//! Top-level core errors: wraps capture failures and adds `FatalInit`
//! (spec §7). `FatalInit` is the only variant that should keep the audio
//! task out of its main loop; everything else is absorbed internally.
//!
//! Error code range: 1101-1103.

use log::error;

use super::{CaptureError, ErrorCode};

pub struct CoreErrorCodes;

impl CoreErrorCodes {
    pub const CAPTURE: i32 = 1101;
    pub const FATAL_INIT: i32 = 1102;
    pub const INVARIANT: i32 = 1103;
}

/// Log a core error with structured context, mirroring the teacher's
/// `log_audio_error` helper.
pub fn log_core_error(err: &CoreError, context: &str) {
    error!(
        "core error in {context}: code={}, message={}",
        err.code(),
        err.message()
    );
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A capture-stage failure bubbled up for logging; the pipeline itself
    /// already recovered from it.
    Capture(CaptureError),
    /// The I2S/audio driver refused to install at startup. Fail fast: the
    /// audio task never enters its main loop.
    FatalInit { reason: String },
    /// An internal invariant was violated (e.g. a Goertzel window larger
    /// than the ring's capacity). The offending value is clamped to its
    /// safe bound and the violation is recorded here for diagnostics.
    Invariant { description: String },
}

impl ErrorCode for CoreError {
    fn code(&self) -> i32 {
        match self {
            CoreError::Capture(_) => CoreErrorCodes::CAPTURE,
            CoreError::FatalInit { .. } => CoreErrorCodes::FATAL_INIT,
            CoreError::Invariant { .. } => CoreErrorCodes::INVARIANT,
        }
    }

    fn message(&self) -> String {
        match self {
            CoreError::Capture(inner) => inner.message(),
            CoreError::FatalInit { reason } => format!("audio driver install failed: {reason}"),
            CoreError::Invariant { description } => {
                format!("invariant violated, clamped: {description}")
            }
        }
    }
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoreError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for CoreError {}

impl From<CaptureError> for CoreError {
    fn from(err: CaptureError) -> Self {
        CoreError::Capture(err)
    }
}
