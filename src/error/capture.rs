//! Capture-stage errors (spec §4.1, §7 "RecoverableCapture").
//!
//! Error code range: 1001-1004.

use super::ErrorCode;

pub struct CaptureErrorCodes;

impl CaptureErrorCodes {
    /// Capture backend used before `init()` completed.
    pub const NOT_INITIALIZED: i32 = 1001;
    /// DMA-equivalent read exceeded `2 * hop_duration`.
    pub const DMA_TIMEOUT: i32 = 1002;
    /// Backend reported a hard I/O failure.
    pub const READ_ERROR: i32 = 1003;
    /// Fewer than `hop_size` samples were available; the rest were zero-filled.
    pub const PARTIAL_READ: i32 = 1004;
}

/// Capture-stage failure. All variants are recoverable: the caller always
/// gets a full hop back (zero-filled where necessary) and the pipeline
/// keeps running (spec §7).
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    NotInitialized,
    DmaTimeout,
    ReadError { details: String },
    PartialRead { samples_delivered: usize },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::NotInitialized => CaptureErrorCodes::NOT_INITIALIZED,
            CaptureError::DmaTimeout => CaptureErrorCodes::DMA_TIMEOUT,
            CaptureError::ReadError { .. } => CaptureErrorCodes::READ_ERROR,
            CaptureError::PartialRead { .. } => CaptureErrorCodes::PARTIAL_READ,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::NotInitialized => {
                "capture backend read before initialization".to_string()
            }
            CaptureError::DmaTimeout => "capture read exceeded 2x hop duration".to_string(),
            CaptureError::ReadError { details } => format!("capture read failed: {details}"),
            CaptureError::PartialRead { samples_delivered } => {
                format!("partial hop delivered ({samples_delivered} samples)")
            }
        }
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for CaptureError {}
