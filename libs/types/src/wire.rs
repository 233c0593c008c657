//! Wire Constants for the Message Encoding
//!
//! Section descriptors, primitive type tags and the tag sets each section
//! accepts. Descriptors come in two canonical forms: a 10-byte "long" form
//! (`0x00 0x80` followed by an 8-byte ulong code) and a 3-byte "short" form
//! (`0x00 0x53` followed by a 1-byte smallulong code).

/// Constructor byte introducing a described type
pub const DESCRIPTOR: u8 = 0x00;

/// Length of the long section descriptor
pub const LONG_DESCRIPTOR_LEN: usize = 10;

/// Length of the short section descriptor
pub const SHORT_DESCRIPTOR_LEN: usize = 3;

/// Primitive type tags
pub mod tags {
    pub const NULL: u8 = 0x40;
    pub const TRUE: u8 = 0x41;
    pub const FALSE: u8 = 0x42;
    pub const UINT0: u8 = 0x43;
    pub const ULONG0: u8 = 0x44;
    pub const LIST0: u8 = 0x45;

    pub const UBYTE: u8 = 0x50;
    pub const SMALLUINT: u8 = 0x52;
    pub const SMALLULONG: u8 = 0x53;
    pub const SMALLINT: u8 = 0x54;
    pub const SMALLLONG: u8 = 0x55;
    pub const BOOLEAN: u8 = 0x56;

    pub const UINT: u8 = 0x70;
    pub const INT: u8 = 0x71;

    pub const ULONG: u8 = 0x80;
    pub const LONG: u8 = 0x81;
    pub const TIMESTAMP: u8 = 0x83;

    pub const VBIN8: u8 = 0xA0;
    pub const STR8: u8 = 0xA1;
    pub const SYM8: u8 = 0xA3;
    pub const VBIN32: u8 = 0xB0;
    pub const STR32: u8 = 0xB1;
    pub const SYM32: u8 = 0xB3;

    pub const LIST8: u8 = 0xC0;
    pub const MAP8: u8 = 0xC1;
    pub const LIST32: u8 = 0xD0;
    pub const MAP32: u8 = 0xD1;
}

/// Tags a list-valued section may start with
pub const TAGS_LIST: &[u8] = &[tags::LIST0, tags::LIST8, tags::LIST32];

/// Tags a map-valued section may start with
pub const TAGS_MAP: &[u8] = &[tags::MAP8, tags::MAP32];

/// Tags a binary-data body may start with
pub const TAGS_BINARY: &[u8] = &[tags::VBIN8, tags::VBIN32];

/// Set of tags accepted after a section descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSet {
    /// Only the listed tags
    Only(&'static [u8]),
    /// Any tag whose encoded size can be determined
    Any,
}

impl TagSet {
    pub fn contains(&self, tag: u8) -> bool {
        match self {
            TagSet::Only(set) => set.contains(&tag),
            TagSet::Any => tag != DESCRIPTOR,
        }
    }
}

/// Build the 10-byte long descriptor for a section code
pub const fn long_descriptor(code: u8) -> [u8; LONG_DESCRIPTOR_LEN] {
    [DESCRIPTOR, tags::ULONG, 0, 0, 0, 0, 0, 0, 0, code]
}

/// Build the 3-byte short descriptor for a section code
pub const fn short_descriptor(code: u8) -> [u8; SHORT_DESCRIPTOR_LEN] {
    [DESCRIPTOR, tags::SMALLULONG, code]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_forms() {
        assert_eq!(
            long_descriptor(0x70),
            [0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x70]
        );
        assert_eq!(short_descriptor(0x78), [0x00, 0x53, 0x78]);
    }

    #[test]
    fn test_tag_sets() {
        assert!(TagSet::Only(TAGS_LIST).contains(0x45));
        assert!(!TagSet::Only(TAGS_MAP).contains(0xC0));
        assert!(TagSet::Any.contains(0xA1));
        assert!(!TagSet::Any.contains(DESCRIPTOR));
    }
}
