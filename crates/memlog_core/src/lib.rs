//! # memlog core
//!
//! Segment-management core of an in-memory log-structured storage engine:
//! the machinery that turns a pool of fixed-size memory blocks into
//! append-only, checksum-verifiable log segments.
//!
//! This crate provides:
//! - [`SegletAllocator`] - a pool of fixed-size blocks ("seglets") with
//!   reservation classes, so cleaning and recovery can proceed even when
//!   ordinary allocation is exhausted
//! - [`Segment`] - an append-only logical byte space packed across pooled
//!   seglets, or reconstructed read-only over a foreign byte span
//! - [`EntryHeader`] - the compact binary framing prefixed to every stored
//!   record (type tag + minimal-width length field)
//! - [`Certificate`] - an incrementally maintained length + checksum
//!   snapshot that lets a segment's structural integrity be verified
//!   cheaply after a crash or a transfer
//!
//! What gets stored, and when segments are replicated or cleaned, is decided
//! by the surrounding log layer; this crate only provides the correct,
//! verifiable container.
//!
//! ## Example
//!
//! ```rust
//! use memlog_core::{EntryType, LogConfig, Segment, SegletAllocator, SegletClass};
//! use std::sync::Arc;
//!
//! let config = LogConfig::new()
//!     .segment_size(66560)
//!     .seglet_size(256)
//!     .log_total_bytes(66560)
//!     .emergency_seglets(0);
//! let pool = Arc::new(SegletAllocator::new(&config).unwrap());
//!
//! let seglets = pool
//!     .allocate(SegletClass::Default, pool.seglets_per_segment())
//!     .unwrap();
//! let mut segment = Segment::new(Arc::clone(&pool), seglets);
//!
//! let offset = segment.append(EntryType::new(2).unwrap(), b"hi").unwrap();
//! let certificate = segment.certificate();
//! assert!(segment.check_metadata_integrity(&certificate));
//!
//! let mut out = bytes::BytesMut::new();
//! segment.get_entry(offset, &mut out).unwrap();
//! assert_eq!(&out[..], b"hi");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod config;
mod entry;
mod error;
mod seglet;
mod segment;

pub use checksum::{Certificate, SegmentChecksum};
pub use config::{LogConfig, DEFAULT_SEGLET_SIZE, DEFAULT_SEGMENT_SIZE};
pub use entry::{
    prefix_len_for, EntryHeader, EntryType, MAX_ENTRY_TAG, MAX_PAYLOAD_LEN, MAX_PREFIX_LEN,
};
pub use error::{IntegrityError, LogError, LogResult};
pub use seglet::{Seglet, SegletAllocator, SegletClass};
pub use segment::Segment;
