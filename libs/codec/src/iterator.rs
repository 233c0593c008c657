//! Field Iteration Over Buffer Chains
//!
//! A located field may straddle any number of buffers. [`FieldIterator`]
//! walks its bytes in place, either the whole encoding or just the payload,
//! without copying the chain.

use crate::error::{ProtocolError, ProtocolResult};
use types::{BufferChain, Cursor, FieldLocation};

/// Which bytes of a field to expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldView {
    /// Bytes after the descriptor, tag and size prefix
    #[default]
    Payload,
    /// The complete encoding, descriptor included
    Encoded,
}

/// Byte-wise cursor over one located field
#[derive(Debug, Clone)]
pub struct FieldIterator<'a> {
    chain: &'a BufferChain,
    cursor: Cursor,
    remaining: usize,
}

impl<'a> FieldIterator<'a> {
    pub fn new(chain: &'a BufferChain, location: &FieldLocation, view: FieldView) -> ProtocolResult<Self> {
        let (cursor, remaining) = match view {
            FieldView::Encoded => (location.cursor, location.length),
            FieldView::Payload => {
                let cursor = chain
                    .advance(location.cursor, location.hdr_length)
                    .ok_or_else(|| ProtocolError::truncated(chain.position(location.cursor), "field header"))?;
                (cursor, location.payload_len())
            }
        };
        Ok(Self {
            chain,
            cursor,
            remaining,
        })
    }

    /// Bytes not yet yielded
    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Contiguous spans covering the remaining bytes
    pub fn segments(self) -> Segments<'a> {
        Segments {
            chain: self.chain,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }

    /// Compare the remaining bytes with `expected` without materializing them
    pub fn equals(self, expected: &[u8]) -> bool {
        if self.remaining != expected.len() {
            return false;
        }
        let mut rest = expected;
        for span in self.segments() {
            if span.len() > rest.len() {
                return false;
            }
            let (head, tail) = rest.split_at(span.len());
            if head != span {
                return false;
            }
            rest = tail;
        }
        rest.is_empty()
    }

    /// Copy the remaining bytes into `dest`, returning how many were written
    pub fn copy_to(self, dest: &mut [u8]) -> ProtocolResult<usize> {
        let need = self.remaining;
        if dest.len() < need {
            return Err(ProtocolError::DestinationTooSmall { need, got: dest.len() });
        }

        let mut written = 0;
        for span in self.segments() {
            dest[written..written + span.len()].copy_from_slice(span);
            written += span.len();
        }
        if written < need {
            return Err(ProtocolError::truncated(written, "field bytes"));
        }
        Ok(written)
    }

    pub fn to_vec(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.remaining);
        for span in self.segments() {
            out.extend_from_slice(span);
        }
        out
    }
}

impl Iterator for FieldIterator<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let (octet, cursor) = self.chain.next_octet(self.cursor)?;
        self.cursor = cursor;
        self.remaining -= 1;
        Some(octet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Spans of a field, one per buffer it touches
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    chain: &'a BufferChain,
    cursor: Cursor,
    remaining: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while self.remaining > 0 {
            let data = self.chain.get(self.cursor.buffer)?.as_slice();
            let available = data.len().saturating_sub(self.cursor.offset);
            if available == 0 {
                self.cursor = Cursor::new(self.cursor.buffer + 1, 0);
                continue;
            }

            let take = available.min(self.remaining);
            let span = &data[self.cursor.offset..self.cursor.offset + take];
            self.cursor.offset += take;
            self.remaining -= take;
            return Some(span);
        }
        None
    }
}

/// Copy one field of `chain` into caller storage
pub fn copy_field(
    chain: &BufferChain,
    location: &FieldLocation,
    view: FieldView,
    dest: &mut [u8],
) -> ProtocolResult<usize> {
    FieldIterator::new(chain, location, view)?.copy_to(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    // short descriptor, vbin8 of 6 bytes, spread over 4-byte buffers
    const BODY: [u8; 11] = [0x00, 0x53, 0x75, 0xA0, 0x06, b'a', b'b', b'c', b'd', b'e', b'f'];

    fn body_location() -> FieldLocation {
        FieldLocation {
            cursor: Cursor::START,
            length: BODY.len(),
            hdr_length: 5,
            tag: 0xA0,
        }
    }

    #[test]
    fn test_payload_view_skips_header() {
        let chain = BufferChain::from_slice(&BODY, 4).unwrap();
        let iter = FieldIterator::new(&chain, &body_location(), FieldView::Payload).unwrap();
        assert_eq!(iter.remaining(), 6);
        assert_eq!(iter.collect::<Vec<_>>(), b"abcdef");
    }

    #[test]
    fn test_encoded_view_spans_buffers() {
        let chain = BufferChain::from_slice(&BODY, 4).unwrap();
        let iter = FieldIterator::new(&chain, &body_location(), FieldView::Encoded).unwrap();
        let spans: Vec<&[u8]> = iter.segments().collect();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans.concat(), BODY);
    }

    #[test]
    fn test_equals_across_boundaries() {
        let chain = BufferChain::from_slice(&BODY, 3).unwrap();
        let iter = FieldIterator::new(&chain, &body_location(), FieldView::Payload).unwrap();
        assert!(iter.clone().equals(b"abcdef"));
        assert!(!iter.clone().equals(b"abcdeg"));
        assert!(!iter.equals(b"abc"));
    }

    #[test]
    fn test_copy_field_checks_destination() {
        let chain = BufferChain::from_slice(&BODY, 2).unwrap();
        let mut small = [0u8; 5];
        assert_eq!(
            copy_field(&chain, &body_location(), FieldView::Payload, &mut small).unwrap_err(),
            ProtocolError::DestinationTooSmall { need: 6, got: 5 }
        );

        let mut dest = [0u8; 16];
        let written = copy_field(&chain, &body_location(), FieldView::Payload, &mut dest).unwrap();
        assert_eq!(&dest[..written], b"abcdef");
    }
}
