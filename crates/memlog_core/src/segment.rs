//! Append-only log segments over pooled seglets.
//!
//! A [`Segment`] packs variable-length typed entries into fixed-size seglets
//! and presents them as one logical byte address space: callers see
//! contiguous offsets even though entries straddle physical block boundaries.
//! All mutation funnels through [`Segment::append`]; all structural trust
//! funnels through the [`Certificate`] taken from the running metadata
//! checksum.
//!
//! Segments are single-writer. The caller serializes mutation; concurrent
//! reads of a segment that is not being mutated need no synchronization.

use crate::checksum::{Certificate, SegmentChecksum};
use crate::entry::{prefix_len_for, EntryHeader, EntryType, MAX_PREFIX_LEN};
use crate::error::{IntegrityError, LogError, LogResult};
use crate::seglet::{Seglet, SegletAllocator};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::Arc;

/// Backing storage for a segment's logical address space.
enum Blocks {
    /// Seglets drawn from the pool; returned to it when the segment drops.
    Owned {
        seglets: Vec<Seglet>,
        allocator: Arc<SegletAllocator>,
    },
    /// An externally owned, already-serialized span. Never freed here.
    Foreign { span: Bytes },
}

/// An append-only segment of the log.
///
/// Constructed either over seglets allocated from a [`SegletAllocator`]
/// (open, growable up to its allocated capacity) or over a foreign byte span
/// received from elsewhere (closed, read-only, non-owning). Offsets handed
/// out by [`append`](Self::append) are stable: entries are never moved or
/// rewritten in place.
pub struct Segment {
    blocks: Blocks,
    /// Size of each logical block. For foreign segments the whole span is a
    /// single block.
    seglet_size: u32,
    /// Logical offset of the next free byte; total bytes appended.
    head: u32,
    closed: bool,
    /// Running digest over appended entry metadata (headers + length fields).
    checksum: SegmentChecksum,
}

impl Segment {
    /// Creates an empty, open segment over seglets from `allocator`.
    ///
    /// The seglets are owned by this segment and released back to the pool
    /// when it is dropped. Their order in `seglets` is their logical order.
    #[must_use]
    pub fn new(allocator: Arc<SegletAllocator>, seglets: Vec<Seglet>) -> Self {
        Self {
            seglet_size: allocator.seglet_size(),
            blocks: Blocks::Owned { seglets, allocator },
            head: 0,
            closed: false,
            checksum: SegmentChecksum::new(),
        }
    }

    /// Reconstructs a segment's view over an externally produced byte span,
    /// typically bytes copied out of another segment for transfer.
    ///
    /// The result is immediately closed, has a single logical block equal to
    /// the entire span, and never frees the span's memory. The running
    /// metadata checksum is rebuilt by walking the entry stream, so
    /// [`certificate`](Self::certificate) matches the producing segment's
    /// when the span is intact.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::ForeignSpanTooLarge`] if the span exceeds the
    /// 32-bit logical address space.
    pub fn from_bytes(span: Bytes) -> LogResult<Self> {
        let length = span.len();
        let head = u32::try_from(length).map_err(|_| LogError::ForeignSpanTooLarge { length })?;
        let mut segment = Self {
            seglet_size: head,
            blocks: Blocks::Foreign { span },
            head,
            closed: true,
            checksum: SegmentChecksum::new(),
        };
        segment.checksum = segment.reconstruct_metadata_digest();
        Ok(segment)
    }

    /// Returns the segment's logical capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        match &self.blocks {
            Blocks::Owned { seglets, .. } => seglets.len() as u32 * self.seglet_size,
            Blocks::Foreign { span } => span.len() as u32,
        }
    }

    /// Returns true once the segment has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the number of logical bytes appended so far.
    #[must_use]
    pub const fn appended_length(&self) -> u32 {
        self.head
    }

    /// Appends a typed entry, returning its logical offset.
    ///
    /// The entry is framed as header byte + minimal-width length field +
    /// payload and may span seglet boundaries. Capacity is checked against
    /// the full encoded size before any byte is written, so a failed append
    /// never leaves a partial entry.
    ///
    /// # Errors
    ///
    /// - [`LogError::SegmentClosed`] if [`close`](Self::close) was called.
    /// - [`LogError::PayloadTooLarge`] if `data` needs a 4-byte length field.
    /// - [`LogError::SegmentFull`] if the encoded entry does not fit.
    pub fn append(&mut self, entry_type: EntryType, data: &[u8]) -> LogResult<u32> {
        if self.closed {
            return Err(LogError::SegmentClosed);
        }
        let header = EntryHeader::new(entry_type, data.len())?;
        let available = self.capacity() - self.head;
        if header.total_len() > available {
            return Err(LogError::SegmentFull {
                needed: header.total_len(),
                available,
            });
        }

        let offset = self.head;
        let prefix = header.encode();
        let written = self.copy_in(self.head, &prefix);
        debug_assert_eq!(written, prefix.len());
        self.checksum.update(&prefix);
        self.head += prefix.len() as u32;

        let written = self.copy_in(self.head, data);
        debug_assert_eq!(written, data.len());
        self.head += data.len() as u32;

        Ok(offset)
    }

    /// Appends a typed entry and reports the certificate covering the
    /// segment as of this append.
    ///
    /// # Errors
    ///
    /// Same conditions as [`append`](Self::append).
    pub fn append_certified(
        &mut self,
        entry_type: EntryType,
        data: &[u8],
    ) -> LogResult<(u32, Certificate)> {
        let offset = self.append(entry_type, data)?;
        Ok((offset, self.certificate()))
    }

    /// Closes the segment. Idempotent and irreversible; reads remain valid.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Checks whether a batch of prospective payloads would all fit if
    /// appended in sequence, accounting for each entry's framing overhead.
    ///
    /// Always true for an empty batch; always false on a closed segment or
    /// if any payload cannot be framed.
    #[must_use]
    pub fn has_space_for(&self, lengths: &[u32]) -> bool {
        if lengths.is_empty() {
            return true;
        }
        if self.closed {
            return false;
        }
        let mut needed: u64 = 0;
        for &length in lengths {
            let Some(prefix) = prefix_len_for(length) else {
                return false;
            };
            needed += u64::from(prefix) + u64::from(length);
        }
        needed <= u64::from(self.capacity() - self.head)
    }

    /// Decodes the entry at `offset` and copies its payload into `out`.
    ///
    /// `offset` must be a value previously returned by
    /// [`append`](Self::append) on this segment (or its serialized twin), or
    /// obtained from a verified scan; other offsets decode garbage or fail.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MalformedEntry`] if no well-formed header lies at
    /// `offset` or the declared payload runs past the segment's capacity.
    pub fn get_entry(&self, offset: u32, out: &mut BytesMut) -> LogResult<EntryType> {
        let header = self.read_entry_header(offset)?;
        let payload_offset = u64::from(offset) + u64::from(header.prefix_len());
        let end = payload_offset + u64::from(header.length());
        if end > u64::from(self.capacity()) {
            return Err(LogError::malformed_entry(
                "entry payload runs past segment capacity",
            ));
        }
        self.append_range_to_buffer(out, payload_offset as u32, header.length());
        Ok(header.entry_type())
    }

    /// Copies the whole appended region `[0, head)` into `out`.
    pub fn append_to_buffer(&self, out: &mut BytesMut) {
        self.append_range_to_buffer(out, 0, self.head);
    }

    /// Copies `length` bytes starting at `offset` into `out`, clipped to the
    /// segment's capacity.
    pub fn append_range_to_buffer(&self, out: &mut BytesMut, offset: u32, length: u32) {
        let mut offset = offset;
        let mut remaining = length;
        while remaining > 0 {
            let Some(chunk) = self.peek(offset) else {
                break;
            };
            let take = chunk.len().min(remaining as usize);
            out.extend_from_slice(&chunk[..take]);
            offset += take as u32;
            remaining -= take as u32;
        }
    }

    /// Returns a zero-copy view of the bytes at `offset`, up to the next
    /// seglet boundary.
    ///
    /// Returns `None` at or past the segment's capacity. The slice length is
    /// the number of contiguous bytes available; callers streaming a segment
    /// out (e.g. over the network) iterate seglet by seglet with this.
    #[must_use]
    pub fn peek(&self, offset: u32) -> Option<&[u8]> {
        if offset >= self.capacity() {
            return None;
        }
        match &self.blocks {
            Blocks::Owned { seglets, .. } => {
                let index = (offset / self.seglet_size) as usize;
                let block_offset = (offset % self.seglet_size) as usize;
                Some(&seglets[index].bytes()[block_offset..])
            }
            Blocks::Foreign { span } => Some(&span[offset as usize..]),
        }
    }

    fn peek_mut(&mut self, offset: u32) -> Option<&mut [u8]> {
        if offset >= self.capacity() {
            return None;
        }
        match &mut self.blocks {
            Blocks::Owned { seglets, .. } => {
                let index = (offset / self.seglet_size) as usize;
                let block_offset = (offset % self.seglet_size) as usize;
                Some(&mut seglets[index].bytes_mut()[block_offset..])
            }
            // Foreign spans are read-only snapshots.
            Blocks::Foreign { .. } => None,
        }
    }

    /// Copies up to `dest.len()` bytes starting at `offset` into `dest`,
    /// clipped to the segment's capacity. Returns the bytes copied; 0 at or
    /// past capacity.
    pub fn copy_out(&self, offset: u32, dest: &mut [u8]) -> usize {
        let capacity = self.capacity();
        if offset >= capacity {
            return 0;
        }
        let total = dest.len().min((capacity - offset) as usize);
        let mut copied = 0;
        while copied < total {
            let Some(chunk) = self.peek(offset + copied as u32) else {
                break;
            };
            let take = chunk.len().min(total - copied);
            dest[copied..copied + take].copy_from_slice(&chunk[..take]);
            copied += take;
        }
        copied
    }

    /// Raw overwrite of segment memory at `offset`, bypassing entry framing.
    ///
    /// Used by corruption tests and specialized recovery paths. Clipped to
    /// the segment's capacity; returns the bytes copied. Foreign segments
    /// are immutable, so this copies 0 bytes into them.
    pub fn copy_in(&mut self, offset: u32, src: &[u8]) -> usize {
        let capacity = self.capacity();
        if offset >= capacity {
            return 0;
        }
        let total = src.len().min((capacity - offset) as usize);
        let mut copied = 0;
        while copied < total {
            let Some(chunk) = self.peek_mut(offset + copied as u32) else {
                break;
            };
            let take = chunk.len().min(total - copied);
            chunk[..take].copy_from_slice(&src[copied..copied + take]);
            copied += take;
        }
        copied
    }

    /// Like [`copy_in`](Self::copy_in), pulling `length` bytes from an
    /// accumulation buffer starting at `src_offset`. Clipped identically on
    /// both ends; returns the bytes copied.
    pub fn copy_in_from_buffer(
        &mut self,
        offset: u32,
        src: &[u8],
        src_offset: usize,
        length: usize,
    ) -> usize {
        if src_offset >= src.len() {
            return 0;
        }
        let end = src.len().min(src_offset + length);
        self.copy_in(offset, &src[src_offset..end])
    }

    /// Snapshots the certificate for the current appended content.
    ///
    /// The checksum is carried forward incrementally as entries are
    /// appended, so this is O(1) regardless of segment size.
    #[must_use]
    pub fn certificate(&self) -> Certificate {
        Certificate {
            segment_length: self.head,
            checksum: self.checksum.current(),
        }
    }

    /// Verifies the segment's structural integrity against a certificate.
    ///
    /// Re-parses the entry stream from offset 0, walking each header and its
    /// declared length, and recomputes the metadata checksum over the walked
    /// prefixes. Classification of the first failure:
    ///
    /// - [`IntegrityError::RunsPastAllocatedSize`]: an entry would walk the
    ///   parse past the segment's allocated capacity.
    /// - [`IntegrityError::RunsPastExpectedLength`]: a header is malformed or
    ///   an entry would walk the parse past `certificate.segment_length`.
    /// - [`IntegrityError::BadChecksum`]: the recomputed metadata digest
    ///   differs from `certificate.checksum`.
    ///
    /// Detection only: recovery policy lives with the caller.
    ///
    /// # Errors
    ///
    /// The failing check, as above.
    pub fn verify_metadata(&self, certificate: &Certificate) -> Result<(), IntegrityError> {
        let expected = certificate.segment_length;
        let capacity = self.capacity();
        if expected > capacity {
            return Err(IntegrityError::RunsPastAllocatedSize);
        }

        let mut digest = SegmentChecksum::new();
        let mut offset: u32 = 0;
        while offset < expected {
            let header = self
                .read_entry_header(offset)
                .map_err(|_| IntegrityError::RunsPastExpectedLength)?;
            let end = u64::from(offset) + u64::from(header.total_len());
            if end > u64::from(capacity) {
                return Err(IntegrityError::RunsPastAllocatedSize);
            }
            if end > u64::from(expected) {
                return Err(IntegrityError::RunsPastExpectedLength);
            }

            let mut prefix = [0u8; MAX_PREFIX_LEN];
            let read = self.copy_out(offset, &mut prefix);
            digest.update(&prefix[..(header.prefix_len() as usize).min(read)]);
            offset = end as u32;
        }

        if digest.current() != certificate.checksum {
            return Err(IntegrityError::BadChecksum);
        }
        Ok(())
    }

    /// Boolean form of [`verify_metadata`](Self::verify_metadata); logs the
    /// failing classification as a diagnostic.
    #[must_use]
    pub fn check_metadata_integrity(&self, certificate: &Certificate) -> bool {
        match self.verify_metadata(certificate) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    segment_length = certificate.segment_length,
                    checksum = certificate.checksum,
                    "segment corrupt: {error}"
                );
                false
            }
        }
    }

    /// Returns the number of physical blocks backing this segment.
    #[must_use]
    pub fn seglets_allocated(&self) -> usize {
        match &self.blocks {
            Blocks::Owned { seglets, .. } => seglets.len(),
            Blocks::Foreign { .. } => 1,
        }
    }

    /// Returns the number of seglets touched by at least one appended byte.
    #[must_use]
    pub fn seglets_in_use(&self) -> usize {
        if self.head == 0 {
            return 0;
        }
        match &self.blocks {
            Blocks::Owned { .. } => self.head.div_ceil(self.seglet_size) as usize,
            Blocks::Foreign { .. } => 1,
        }
    }

    fn read_entry_header(&self, offset: u32) -> LogResult<EntryHeader> {
        let mut prefix = [0u8; MAX_PREFIX_LEN];
        let read = self.copy_out(offset, &mut prefix);
        EntryHeader::decode(&prefix[..read])
    }

    /// Rebuilds the running metadata digest of a foreign span by walking its
    /// entry stream. Stops at the first malformed or overrunning entry; a
    /// damaged span then simply fails verification against its certificate.
    fn reconstruct_metadata_digest(&self) -> SegmentChecksum {
        let mut digest = SegmentChecksum::new();
        let mut offset: u32 = 0;
        while offset < self.head {
            let Ok(header) = self.read_entry_header(offset) else {
                break;
            };
            let end = u64::from(offset) + u64::from(header.total_len());
            if end > u64::from(self.head) {
                break;
            }
            let mut prefix = [0u8; MAX_PREFIX_LEN];
            let read = self.copy_out(offset, &mut prefix);
            digest.update(&prefix[..(header.prefix_len() as usize).min(read)]);
            offset = end as u32;
        }
        digest
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if let Blocks::Owned { seglets, allocator } = &mut self.blocks {
            for seglet in seglets.drain(..) {
                allocator.release(seglet);
            }
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("head", &self.head)
            .field("closed", &self.closed)
            .field("capacity", &self.capacity())
            .field("seglets_allocated", &self.seglets_allocated())
            .finish_non_exhaustive()
    }
}
