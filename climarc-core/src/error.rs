//! Error types for climarc operations.
//!
//! Every failure in either stage of the pipeline is fatal to the current call.
//! Nothing is retried internally and no partial output is ever returned, so a
//! caller that sees an error should discard whatever it was holding and start
//! the whole load again.

use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for climarc operations.
#[derive(Debug, Error)]
pub enum ClimarcError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Dataset does not start with the expected identification bytes.
    #[error("Magic mismatch: expected {expected:02x?}, found {found:02x?}")]
    MagicMismatch {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual bytes found.
        found: Vec<u8>,
    },

    /// Dataset version is not supported by this parser.
    #[error("Unsupported dataset version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version byte found in the input.
        found: u8,
        /// The only version this parser reads.
        supported: u8,
    },

    /// LZMA properties (lc/lp/pb/dictionary size) are out of range.
    #[error("Invalid stream properties: {message}")]
    InvalidStreamProperties {
        /// Description of the offending property.
        message: String,
    },

    /// The input ended before the format said it would.
    #[error("Premature end of input at offset {offset}")]
    PrematureEndOfInput {
        /// Byte offset at which more input was required.
        offset: u64,
    },

    /// The entropy-coded stream decoded into something impossible.
    #[error("Corrupt compressed stream at output position {position}: {message}")]
    CorruptCompressedStream {
        /// Number of bytes produced when the corruption was detected.
        position: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The number of decoded bytes differs from the declared size.
    #[error("Size mismatch: declared {expected} bytes, decoded {actual}")]
    SizeMismatch {
        /// Size declared in the stream header.
        expected: u64,
        /// Bytes actually produced.
        actual: u64,
    },

    /// A declared bit width cannot be honored.
    #[error("Invalid bit width for {field}: {width}")]
    InvalidBitWidth {
        /// Name of the header field declaring the width.
        field: &'static str,
        /// The declared width.
        width: u8,
    },

    /// Dataset header carries inconsistent values.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// A record points outside the array it indexes.
    #[error("Index out of range in {record} #{index}: {value} (limit {limit})")]
    IndexOutOfRange {
        /// Record array holding the index.
        record: &'static str,
        /// Position of the record in its array.
        index: usize,
        /// The offending index value.
        value: u64,
        /// Exclusive upper bound (or previous value for non-monotonic indices).
        limit: u64,
    },

    /// A configured resource limit would be exceeded.
    #[error("Limit exceeded: {what} is {value}, maximum {limit}")]
    LimitExceeded {
        /// Name of the limited quantity.
        what: &'static str,
        /// Requested value.
        value: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// The background worker has shut down.
    #[error("Worker unavailable: {message}")]
    WorkerUnavailable {
        /// Description of why the worker could not answer.
        message: String,
    },
}

/// Result type alias for climarc operations.
pub type Result<T> = std::result::Result<T, ClimarcError>;

/// Coarse classification of [`ClimarcError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ClimarcError::Io`].
    Io,
    /// See [`ClimarcError::MagicMismatch`].
    MagicMismatch,
    /// See [`ClimarcError::UnsupportedVersion`].
    UnsupportedVersion,
    /// See [`ClimarcError::InvalidStreamProperties`].
    InvalidStreamProperties,
    /// See [`ClimarcError::PrematureEndOfInput`].
    PrematureEndOfInput,
    /// See [`ClimarcError::CorruptCompressedStream`].
    CorruptCompressedStream,
    /// See [`ClimarcError::SizeMismatch`].
    SizeMismatch,
    /// See [`ClimarcError::InvalidBitWidth`].
    InvalidBitWidth,
    /// See [`ClimarcError::InvalidHeader`].
    InvalidHeader,
    /// See [`ClimarcError::IndexOutOfRange`].
    IndexOutOfRange,
    /// See [`ClimarcError::LimitExceeded`].
    LimitExceeded,
    /// See [`ClimarcError::WorkerUnavailable`].
    WorkerUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "io",
            Self::MagicMismatch => "magic-mismatch",
            Self::UnsupportedVersion => "unsupported-version",
            Self::InvalidStreamProperties => "invalid-stream-properties",
            Self::PrematureEndOfInput => "premature-end-of-input",
            Self::CorruptCompressedStream => "corrupt-compressed-stream",
            Self::SizeMismatch => "size-mismatch",
            Self::InvalidBitWidth => "invalid-bit-width",
            Self::InvalidHeader => "invalid-header",
            Self::IndexOutOfRange => "index-out-of-range",
            Self::LimitExceeded => "limit-exceeded",
            Self::WorkerUnavailable => "worker-unavailable",
        };
        f.write_str(name)
    }
}

impl ClimarcError {
    /// Create a magic mismatch error.
    pub fn magic_mismatch(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::MagicMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unsupported version error.
    pub fn unsupported_version(found: u8, supported: u8) -> Self {
        Self::UnsupportedVersion { found, supported }
    }

    /// Create an invalid stream properties error.
    pub fn invalid_properties(message: impl Into<String>) -> Self {
        Self::InvalidStreamProperties {
            message: message.into(),
        }
    }

    /// Create a premature end of input error.
    pub fn premature_end(offset: u64) -> Self {
        Self::PrematureEndOfInput { offset }
    }

    /// Create a corrupt stream error.
    pub fn corrupt(position: u64, message: impl Into<String>) -> Self {
        Self::CorruptCompressedStream {
            position,
            message: message.into(),
        }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Create an invalid bit width error.
    pub fn invalid_bit_width(field: &'static str, width: u8) -> Self {
        Self::InvalidBitWidth { field, width }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an index out of range error.
    pub fn index_out_of_range(record: &'static str, index: usize, value: u64, limit: u64) -> Self {
        Self::IndexOutOfRange {
            record,
            index,
            value,
            limit,
        }
    }

    /// Create a limit exceeded error.
    pub fn limit_exceeded(what: &'static str, value: u64, limit: u64) -> Self {
        Self::LimitExceeded { what, value, limit }
    }

    /// Create a worker unavailable error.
    pub fn worker_unavailable(message: impl Into<String>) -> Self {
        Self::WorkerUnavailable {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::MagicMismatch { .. } => ErrorKind::MagicMismatch,
            Self::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            Self::InvalidStreamProperties { .. } => ErrorKind::InvalidStreamProperties,
            Self::PrematureEndOfInput { .. } => ErrorKind::PrematureEndOfInput,
            Self::CorruptCompressedStream { .. } => ErrorKind::CorruptCompressedStream,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::InvalidBitWidth { .. } => ErrorKind::InvalidBitWidth,
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Self::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            Self::WorkerUnavailable { .. } => ErrorKind::WorkerUnavailable,
        }
    }
}
