//! Field Traversal Primitive
//!
//! Sizes one encoded value from its type tag without decoding it. The high
//! nibble of the tag selects the layout:
//!
//! ```text
//! 0x4_ → no payload        0xA_ / 0xC_ / 0xE_ → 1-byte size prefix
//! 0x5_ → 1 byte            0xB_ / 0xD_ / 0xF_ → 4-byte size prefix
//! 0x6_ → 2 bytes
//! 0x7_ → 4 bytes
//! 0x8_ → 8 bytes
//! 0x9_ → 16 bytes
//! ```
//!
//! For compound values (lists, maps) the size prefix covers the element
//! count and the elements, so skipping by size never descends into them.

use crate::error::{ProtocolError, ProtocolResult};
use types::{BufferChain, Cursor, FieldLocation};

/// Payload layout selected by a type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Payload of a fixed number of bytes
    Fixed(usize),
    /// Payload size read from a big-endian prefix of this many bytes
    Variable(usize),
}

/// Classify a tag by its high nibble
pub fn tag_width(tag: u8) -> Option<Width> {
    match tag & 0xF0 {
        0x40 => Some(Width::Fixed(0)),
        0x50 => Some(Width::Fixed(1)),
        0x60 => Some(Width::Fixed(2)),
        0x70 => Some(Width::Fixed(4)),
        0x80 => Some(Width::Fixed(8)),
        0x90 => Some(Width::Fixed(16)),
        0xA0 | 0xC0 | 0xE0 => Some(Width::Variable(1)),
        0xB0 | 0xD0 | 0xF0 => Some(Width::Variable(4)),
        _ => None,
    }
}

/// Read one octet, mapping an exhausted chain to a truncation error
#[inline]
pub fn read_octet(chain: &BufferChain, cursor: Cursor, context: &'static str) -> ProtocolResult<(u8, Cursor)> {
    chain
        .next_octet(cursor)
        .ok_or_else(|| ProtocolError::truncated(chain.position(cursor), context))
}

/// Read a big-endian unsigned integer of `width` bytes (1 or 4)
pub fn read_be(
    chain: &BufferChain,
    mut cursor: Cursor,
    width: usize,
    context: &'static str,
) -> ProtocolResult<(usize, Cursor)> {
    let mut value = 0usize;
    for _ in 0..width {
        let (octet, next) = read_octet(chain, cursor, context)?;
        value = (value << 8) | octet as usize;
        cursor = next;
    }
    Ok((value, cursor))
}

/// Locate the value starting at `start` and return the cursor just past it
///
/// The returned location anchors the tag byte; `hdr_length` covers the tag
/// and any size prefix, `length` the whole encoded value.
pub fn traverse_field(chain: &BufferChain, start: Cursor) -> ProtocolResult<(FieldLocation, Cursor)> {
    let (tag, cursor) = read_octet(chain, start, "field tag")?;

    let width = tag_width(tag).ok_or(ProtocolError::UnsupportedTag {
        tag,
        offset: chain.position(start),
    })?;

    let (hdr_length, consume, cursor) = match width {
        Width::Fixed(size) => (1, size, cursor),
        Width::Variable(prefix) => {
            let (size, cursor) = read_be(chain, cursor, prefix, "field size prefix")?;
            (1 + prefix, size, cursor)
        }
    };

    let end = chain
        .advance(cursor, consume)
        .ok_or_else(|| ProtocolError::truncated(chain.position(cursor), "field payload"))?;

    let location = FieldLocation {
        cursor: start,
        length: hdr_length + consume,
        hdr_length,
        tag,
    };
    Ok((location, end))
}
