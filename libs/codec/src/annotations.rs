//! Annotation Map Decoding
//!
//! Delivery and message annotations are maps keyed by symbols. Entries are
//! kept as raw encoded values; callers ask for the representation they need.

use crate::error::{ProtocolError, ProtocolResult};
use crate::iterator::{FieldIterator, FieldView};
use crate::traverse::{read_be, traverse_field};
use types::{tags, BufferChain, FieldLocation, Section};

/// One decoded map key or value: its tag and payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub tag: u8,
    pub bytes: Vec<u8>,
}

impl EncodedValue {
    /// Text of a string or symbol
    pub fn as_str(&self) -> Option<&str> {
        match self.tag {
            tags::STR8 | tags::STR32 | tags::SYM8 | tags::SYM32 => std::str::from_utf8(&self.bytes).ok(),
            _ => None,
        }
    }

    /// Value of an unsigned integer in any of its encodings
    pub fn as_u64(&self) -> Option<u64> {
        match self.tag {
            tags::UINT0 | tags::ULONG0 => Some(0),
            tags::UBYTE | tags::SMALLUINT | tags::SMALLULONG | tags::UINT | tags::ULONG => {
                Some(self.bytes.iter().fold(0u64, |acc, &octet| (acc << 8) | u64::from(octet)))
            }
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.tag == tags::NULL
    }
}

/// Decoded key/value pairs of an annotation section, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMap {
    section: Section,
    entries: Vec<(EncodedValue, EncodedValue)>,
}

impl AnnotationMap {
    pub fn section(&self) -> Section {
        self.section
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First value whose key is the string or symbol `key`
    pub fn get(&self, key: &str) -> Option<&EncodedValue> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate.as_str() == Some(key))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EncodedValue, EncodedValue)> {
        self.entries.iter()
    }
}

/// Decode the map-valued section at `location`
pub fn decode_map(chain: &BufferChain, location: &FieldLocation, section: Section) -> ProtocolResult<AnnotationMap> {
    let section_end = chain.position(location.cursor) + location.length;
    let payload = chain
        .advance(location.cursor, location.hdr_length)
        .ok_or_else(|| ProtocolError::truncated(chain.position(location.cursor), "annotation map"))?;

    let width = if location.tag == tags::MAP8 { 1 } else { 4 };
    let (count, mut cursor) = read_be(chain, payload, width, "annotation map count")?;
    if chain.position(cursor) > section_end {
        return Err(ProtocolError::FieldOverrun {
            section,
            offset: chain.position(payload),
            section_end,
        });
    }
    if count % 2 != 0 {
        return Err(ProtocolError::OddMapCount { section, count });
    }

    let mut values = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let (element, end) = traverse_field(chain, cursor)?;
        if chain.position(end) > section_end {
            return Err(ProtocolError::FieldOverrun {
                section,
                offset: chain.position(cursor),
                section_end,
            });
        }
        values.push(EncodedValue {
            tag: element.tag,
            bytes: FieldIterator::new(chain, &element, FieldView::Payload)?.to_vec(),
        });
        cursor = end;
    }

    let mut entries = Vec::with_capacity(values.len() / 2);
    let mut values = values.into_iter();
    while let (Some(key), Some(value)) = (values.next(), values.next()) {
        entries.push((key, value));
    }

    Ok(AnnotationMap { section, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::Cursor;

    fn map_section(body: &[u8], count: u8) -> (BufferChain, FieldLocation) {
        let mut bytes = vec![0x00, 0x53, 0x71, 0xC1, (body.len() + 1) as u8, count];
        bytes.extend_from_slice(body);
        let location = FieldLocation {
            cursor: Cursor::START,
            length: bytes.len(),
            hdr_length: 5,
            tag: 0xC1,
        };
        (BufferChain::from_slice(&bytes, 4).unwrap(), location)
    }

    #[test]
    fn test_decode_symbol_keyed_map() {
        let body = [0xA3, 0x04, b'h', b'o', b'p', b's', 0x52, 0x03, 0xA3, 0x01, b'r', 0xA1, 0x02, b'o', b'k'];
        let (chain, location) = map_section(&body, 4);

        let map = decode_map(&chain, &location, Section::DeliveryAnnotations).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("hops").and_then(EncodedValue::as_u64), Some(3));
        assert_eq!(map.get("r").and_then(EncodedValue::as_str), Some("ok"));
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_odd_count_is_rejected() {
        let (chain, location) = map_section(&[0xA3, 0x01, b'k'], 1);
        assert_eq!(
            decode_map(&chain, &location, Section::MessageAnnotations).unwrap_err(),
            ProtocolError::OddMapCount {
                section: Section::MessageAnnotations,
                count: 1,
            }
        );
    }

    #[test]
    fn test_count_past_section_is_rejected() {
        // map8 of size 0, followed by the next section's descriptor
        let bytes = [0x00, 0x53, 0x71, 0xC1, 0x00, 0x00, 0x53, 0x75];
        let location = FieldLocation {
            cursor: Cursor::START,
            length: 5,
            hdr_length: 5,
            tag: 0xC1,
        };
        let chain = BufferChain::from_slice(&bytes, 4).unwrap();
        assert_eq!(
            decode_map(&chain, &location, Section::DeliveryAnnotations).unwrap_err(),
            ProtocolError::FieldOverrun {
                section: Section::DeliveryAnnotations,
                offset: 5,
                section_end: 5,
            }
        );
    }

    #[test]
    fn test_empty_map() {
        let (chain, location) = map_section(&[], 0);
        assert!(decode_map(&chain, &location, Section::DeliveryAnnotations).unwrap().is_empty());
    }
}
