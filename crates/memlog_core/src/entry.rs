//! Entry framing: the compact binary header prefixed to every record.
//!
//! An entry is stored as `header byte | length bytes | payload`. The header
//! byte packs the entry's type tag into its low 6 bits and the width of the
//! length field (1, 2, or 3 bytes) into its high 2 bits. The length field is
//! little-endian and always the minimum width that represents the payload
//! length; payloads of 2^24 bytes or more cannot be framed.
//!
//! This byte layout is a wire contract: a segment reconstructed from bytes
//! produced elsewhere must decode identically, so any implementation must
//! emit identical bytes for identical `(type, length, payload)` sequences.

use crate::error::{LogError, LogResult};
use std::fmt;

/// Largest payload length that can be framed (2^24 - 1 bytes).
pub const MAX_PAYLOAD_LEN: u32 = 0x00ff_ffff;

/// Largest entry type tag (6 bits).
pub const MAX_ENTRY_TAG: u8 = 0x3f;

/// Maximum encoded size of an entry's prefix: header byte + 3 length bytes.
pub const MAX_PREFIX_LEN: usize = 4;

const WIDTH_SHIFT: u8 = 6;
const TAG_MASK: u8 = 0x3f;

/// An entry's type tag.
///
/// The set of meaningful tags is owned by the surrounding log layer; the
/// segment core stores and retrieves them verbatim. Tags must fit in the
/// header byte's 6-bit tag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryType(u8);

impl EntryType {
    /// Creates an entry type from a raw tag.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidEntryType`] if `tag` exceeds
    /// [`MAX_ENTRY_TAG`].
    pub fn new(tag: u8) -> LogResult<Self> {
        if tag > MAX_ENTRY_TAG {
            return Err(LogError::InvalidEntryType { tag });
        }
        Ok(Self(tag))
    }

    /// Returns the raw tag value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Extracts the tag from a decoded header byte.
    const fn from_header_byte(byte: u8) -> Self {
        Self(byte & TAG_MASK)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

/// Returns the minimal length-field width (in bytes) for a payload length.
const fn width_for(length: u32) -> u32 {
    if length <= 0xff {
        1
    } else if length <= 0xffff {
        2
    } else {
        3
    }
}

/// Returns the encoded prefix size (header byte + length field) for a
/// prospective payload length, or `None` if the payload cannot be framed.
///
/// Used by capacity checks that must account for per-entry overhead without
/// constructing headers.
#[must_use]
pub const fn prefix_len_for(length: u32) -> Option<u32> {
    if length > MAX_PAYLOAD_LEN {
        return None;
    }
    Some(1 + width_for(length))
}

/// Decoded form of the per-entry prefix: type tag plus payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    entry_type: EntryType,
    length: u32,
}

impl EntryHeader {
    /// Creates a header for a payload of `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::PayloadTooLarge`] if the length needs a 4-byte
    /// length field.
    pub fn new(entry_type: EntryType, length: usize) -> LogResult<Self> {
        if length > MAX_PAYLOAD_LEN as usize {
            return Err(LogError::PayloadTooLarge {
                length,
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            entry_type,
            length: length as u32,
        })
    }

    /// Returns the entry's type tag.
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Returns the declared payload length.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Returns the width of the length field in bytes (1, 2, or 3).
    #[must_use]
    pub const fn length_width(&self) -> u32 {
        width_for(self.length)
    }

    /// Returns the encoded prefix size: header byte + length field.
    #[must_use]
    pub const fn prefix_len(&self) -> u32 {
        1 + self.length_width()
    }

    /// Returns the total encoded entry size: prefix + payload.
    #[must_use]
    pub const fn total_len(&self) -> u32 {
        self.prefix_len() + self.length
    }

    /// Encodes the prefix bytes that precede the payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let width = self.length_width() as usize;
        let mut buf = Vec::with_capacity(1 + width);
        buf.push(((width as u8 - 1) << WIDTH_SHIFT) | self.entry_type.as_u8());
        buf.extend_from_slice(&self.length.to_le_bytes()[..width]);
        buf
    }

    /// Decodes a prefix from a logically contiguous byte view.
    ///
    /// The caller supplies at least the entry's prefix bytes (up to
    /// [`MAX_PREFIX_LEN`]), copied out of the segment so that entries
    /// straddling seglet boundaries decode the same as contiguous ones.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::MalformedEntry`] if the view is truncated or the
    /// header declares an unsupported 4-byte length field.
    pub fn decode(buf: &[u8]) -> LogResult<Self> {
        let Some(&first) = buf.first() else {
            return Err(LogError::malformed_entry("empty header view"));
        };
        let width = ((first >> WIDTH_SHIFT) + 1) as usize;
        if width > 3 {
            return Err(LogError::malformed_entry(
                "4-byte length fields are unsupported",
            ));
        }
        if buf.len() < 1 + width {
            return Err(LogError::malformed_entry(format!(
                "header view truncated: {} bytes, {} needed",
                buf.len(),
                1 + width
            )));
        }

        let mut length_bytes = [0u8; 4];
        length_bytes[..width].copy_from_slice(&buf[1..1 + width]);
        Ok(Self {
            entry_type: EntryType::from_header_byte(first),
            length: u32::from_le_bytes(length_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(tag: u8) -> EntryType {
        EntryType::new(tag).unwrap()
    }

    #[test]
    fn tag_bounds() {
        assert!(EntryType::new(0).is_ok());
        assert!(EntryType::new(MAX_ENTRY_TAG).is_ok());
        assert!(matches!(
            EntryType::new(MAX_ENTRY_TAG + 1),
            Err(LogError::InvalidEntryType { tag: 0x40 })
        ));
    }

    #[test]
    fn width_selection() {
        for (length, expected_width) in [
            (0u32, 1u32),
            (255, 1),
            (256, 2),
            (65535, 2),
            (65536, 3),
            (MAX_PAYLOAD_LEN, 3),
        ] {
            let header = EntryHeader::new(ty(1), length as usize).unwrap();
            assert_eq!(header.length_width(), expected_width, "length {length}");
            assert_eq!(header.prefix_len(), 1 + expected_width);
            assert_eq!(header.total_len(), 1 + expected_width + length);
            assert_eq!(header.encode().len() as u32, header.prefix_len());
        }
    }

    #[test]
    fn four_byte_lengths_rejected() {
        let err = EntryHeader::new(ty(1), (MAX_PAYLOAD_LEN as usize) + 1).unwrap_err();
        assert!(matches!(err, LogError::PayloadTooLarge { .. }));
        assert_eq!(prefix_len_for(MAX_PAYLOAD_LEN + 1), None);
    }

    #[test]
    fn encode_decode_roundtrip() {
        for length in [0usize, 1, 255, 256, 300, 65535, 65536, 1 << 23] {
            for tag in [0u8, 1, 17, MAX_ENTRY_TAG] {
                let header = EntryHeader::new(ty(tag), length).unwrap();
                let encoded = header.encode();
                let decoded = EntryHeader::decode(&encoded).unwrap();
                assert_eq!(decoded, header);
            }
        }
    }

    #[test]
    fn decode_is_exact_on_byte_layout() {
        // The wire layout is a compatibility contract; pin it down.
        let header = EntryHeader::new(ty(2), 300).unwrap();
        assert_eq!(header.encode(), vec![0b0100_0010, 0x2c, 0x01]);

        let header = EntryHeader::new(ty(5), 7).unwrap();
        assert_eq!(header.encode(), vec![0b0000_0101, 0x07]);
    }

    #[test]
    fn decode_rejects_truncated_views() {
        assert!(EntryHeader::decode(&[]).is_err());
        // Header byte declares a 2-byte length field but only one follows.
        assert!(EntryHeader::decode(&[0b0100_0001, 0x2c]).is_err());
    }

    #[test]
    fn decode_rejects_four_byte_width() {
        assert!(matches!(
            EntryHeader::decode(&[0b1100_0001, 0, 0, 0]),
            Err(LogError::MalformedEntry { .. })
        ));
    }

    #[test]
    fn prefix_len_for_matches_headers() {
        for length in [0u32, 255, 256, 65535, 65536, MAX_PAYLOAD_LEN] {
            let header = EntryHeader::new(ty(1), length as usize).unwrap();
            assert_eq!(prefix_len_for(length), Some(header.prefix_len()));
        }
    }
}
