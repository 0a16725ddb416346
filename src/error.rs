//! Error types for zpipe

use std::io;
use thiserror::Error;

/// Result type for zpipe operations
pub type Result<T> = std::result::Result<T, PumpError>;

/// Error types that can occur while pumping a stream
#[derive(Debug, Error)]
pub enum PumpError {
    /// Reading the source failed (other than an interrupted call)
    #[error("error reading input: {0}")]
    Read(#[source] io::Error),
    /// Writing or flushing the destination failed, or made no progress
    #[error("error writing output: {0}")]
    Write(#[source] io::Error),
    /// The bounded arena could not satisfy a codec allocation
    #[error("out of memory: requested {requested} bytes, {available} available")]
    Mem { requested: usize, available: usize },
    /// Compressed input is malformed, truncated or needs a preset dictionary
    #[error("invalid or incomplete deflate data: {0}")]
    Data(#[from] DataError),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Stream(String),
    /// Codec library mismatch detected when a session is initialized
    #[error("codec version mismatch: {0}")]
    Version(String),
}

/// Why compressed input was rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Source ended before the codec reached the end of the stream
    #[error("stream truncated before end marker")]
    Truncated,
    /// Codec rejected the bytes
    #[error("{0}")]
    Malformed(String),
    /// Stream was produced with a preset dictionary, which sessions never carry
    #[error("stream requires a preset dictionary")]
    NeedsDictionary(Option<u32>),
}

/// Result codes of a pump run, numbered after zlib's return values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    Io = -1,
    Stream = -2,
    Data = -3,
    Mem = -4,
    Version = -6,
}

impl ResultCode {
    /// Numeric code, as reported to the operating system on exit
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl PumpError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ResultCode {
        match self {
            PumpError::Read(_) | PumpError::Write(_) => ResultCode::Io,
            PumpError::Mem { .. } => ResultCode::Mem,
            PumpError::Data(_) => ResultCode::Data,
            PumpError::Stream(_) => ResultCode::Stream,
            PumpError::Version(_) => ResultCode::Version,
        }
    }

    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

impl<T> From<&Result<T>> for ResultCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.kind(),
        }
    }
}
