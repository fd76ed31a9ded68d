//! Error types for the segment core.

use crate::seglet::SegletClass;
use thiserror::Error;

/// Result type for segment core operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in segment core operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// The segment has been closed and no longer accepts appends.
    #[error("segment is closed")]
    SegmentClosed,

    /// The segment does not have enough free space for the encoded entry.
    #[error("segment full: entry needs {needed} bytes, {available} free")]
    SegmentFull {
        /// Total encoded size of the rejected entry.
        needed: u32,
        /// Free bytes remaining in the segment.
        available: u32,
    },

    /// The payload cannot be framed with a 1, 2, or 3 byte length field.
    #[error("payload too large: {length} bytes cannot be framed (maximum {max})")]
    PayloadTooLarge {
        /// The rejected payload length.
        length: usize,
        /// Largest frameable payload length.
        max: u32,
    },

    /// The seglet pool cannot satisfy an allocation request.
    #[error(
        "seglet pool exhausted: class {class:?} has {available} free seglets, {requested} requested"
    )]
    SegletsExhausted {
        /// Reservation class the request was made against.
        class: SegletClass,
        /// Number of seglets requested.
        requested: usize,
        /// Number of seglets available in that class.
        available: usize,
    },

    /// The supplied configuration is inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the inconsistency.
        message: String,
    },

    /// The entry type tag does not fit the header's tag field.
    #[error("invalid entry type tag {tag:#04x}: tags must fit in 6 bits")]
    InvalidEntryType {
        /// The rejected tag value.
        tag: u8,
    },

    /// An entry header could not be decoded.
    #[error("malformed entry: {message}")]
    MalformedEntry {
        /// Description of the decode failure.
        message: String,
    },

    /// A foreign byte span is too large to address as a segment.
    #[error("foreign span too large: {length} bytes exceeds segment address space")]
    ForeignSpanTooLarge {
        /// Length of the rejected span.
        length: usize,
    },
}

impl LogError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a malformed entry error.
    pub fn malformed_entry(message: impl Into<String>) -> Self {
        Self::MalformedEntry {
            message: message.into(),
        }
    }
}

/// Classification of a failed segment integrity check.
///
/// Produced by [`Segment::verify_metadata`](crate::Segment::verify_metadata)
/// when re-parsing the entry stream against a certificate. The variants are
/// ordered checks: entries are first walked against the allocated capacity and
/// the certified length, then the recomputed metadata checksum is compared.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    /// An entry's declared length would walk the parse past the allocated
    /// capacity of the segment.
    #[error("entries run off past allocated segment size")]
    RunsPastAllocatedSize,

    /// An entry header is malformed, or its declared length would walk the
    /// parse past the certified segment length.
    #[error("entries run off past expected length")]
    RunsPastExpectedLength,

    /// The metadata checksum recomputed from the entry stream does not match
    /// the certificate.
    #[error("bad checksum")]
    BadChecksum,
}
