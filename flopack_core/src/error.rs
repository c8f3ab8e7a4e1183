//! Error types for plane encoding and decoding.

use thiserror::Error;

/// Errors raised by the array codec and the plane pipeline.
#[derive(Debug, Error)]
pub enum FlopackError {
    /// Element width is neither 4 (f32) nor 8 (f64) bytes.
    #[error("invalid precision: {0} bytes (must be 4 or 8)")]
    InvalidPrecision(usize),

    /// Compression level outside the compressor's supported range.
    #[error("invalid compression level {level}: must be in range [{min}, {max}]")]
    InvalidLevel { level: i32, min: i32, max: i32 },

    /// Lossy bit count outside `[0, width * 8]`.
    #[error("invalid lossy range: {lossy_bits} bits (must be in [0, {max}])")]
    InvalidLossyRange { lossy_bits: i64, max: u16 },

    /// The generic compressor failed on one plane, in either direction.
    #[error("compressor failed on plane {plane}")]
    CompressorFailure {
        plane: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Bytes consumed while decoding differ from the declared stream length.
    #[error("stream length mismatch: consumed {consumed} bytes but {declared} were declared")]
    StreamLengthMismatch { consumed: u64, declared: u64 },

    /// The stream is malformed in a way that prevents decoding.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// The framed header checksum does not match the frame bytes.
    #[error("checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    /// Legacy streams carry no element count, so the caller must supply one.
    #[error("legacy streams require the element count to be supplied")]
    ElementCountRequired,

    /// A configuration value cannot be used as given.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FlopackError {
    pub(crate) fn compressor(plane: usize, err: anyhow::Error) -> Self {
        FlopackError::CompressorFailure {
            plane,
            source: err.into(),
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        FlopackError::CorruptStream(msg.into())
    }
}
