//! Sections, Parse Depths and Field Locations
//!
//! A message is a sequence of optional top-level sections in a fixed order.
//! The parser records where each one starts in the buffer chain as a
//! [`FieldLocation`]; consumers materialize bytes from those anchors.

use crate::buffer::Cursor;
use crate::wire::{self, TagSet, TAGS_BINARY, TAGS_LIST, TAGS_MAP};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// How deep a message has been validated
///
/// Depths are totally ordered; a content's committed depth only increases.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Depth {
    #[default]
    None = 0,
    Header = 1,
    DeliveryAnnotations = 2,
    MessageAnnotations = 3,
    Properties = 4,
    ApplicationProperties = 5,
    Body = 6,
    All = 7,
}

/// Top-level message sections, keyed by their descriptor code
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Section {
    Header = 0x70,
    DeliveryAnnotations = 0x71,
    MessageAnnotations = 0x72,
    Properties = 0x73,
    ApplicationProperties = 0x74,
    BodyData = 0x75,
    BodySequence = 0x76,
    BodyValue = 0x77,
    Footer = 0x78,
}

impl Section {
    /// Descriptor code carried in the last byte of both descriptor forms
    #[inline]
    pub fn code(self) -> u8 {
        self.into()
    }

    /// The parse depth reached once this section has been located
    pub fn depth(self) -> Depth {
        match self {
            Section::Header => Depth::Header,
            Section::DeliveryAnnotations => Depth::DeliveryAnnotations,
            Section::MessageAnnotations => Depth::MessageAnnotations,
            Section::Properties => Depth::Properties,
            Section::ApplicationProperties => Depth::ApplicationProperties,
            Section::BodyData | Section::BodySequence | Section::BodyValue => Depth::Body,
            Section::Footer => Depth::All,
        }
    }

    /// Tags allowed to follow this section's descriptor
    pub fn expected_tags(self) -> TagSet {
        match self {
            Section::Header | Section::Properties | Section::BodySequence => TagSet::Only(TAGS_LIST),
            Section::DeliveryAnnotations
            | Section::MessageAnnotations
            | Section::ApplicationProperties
            | Section::Footer => TagSet::Only(TAGS_MAP),
            Section::BodyData => TagSet::Only(TAGS_BINARY),
            Section::BodyValue => TagSet::Any,
        }
    }

    pub fn long_descriptor(self) -> [u8; wire::LONG_DESCRIPTOR_LEN] {
        wire::long_descriptor(self.code())
    }

    pub fn short_descriptor(self) -> [u8; wire::SHORT_DESCRIPTOR_LEN] {
        wire::short_descriptor(self.code())
    }

    pub fn is_body(self) -> bool {
        self.depth() == Depth::Body
    }
}

/// Scalar fields of the properties list, by list position
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum PropertyField {
    MessageId = 0,
    UserId = 1,
    To = 2,
    Subject = 3,
    ReplyTo = 4,
}

impl PropertyField {
    /// Number of property positions the engine resolves
    pub const COUNT: usize = 5;

    #[inline]
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Anything a consumer can ask the location of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageField {
    Header,
    DeliveryAnnotations,
    MessageAnnotations,
    Properties,
    ApplicationProperties,
    Body,
    Footer,
    MessageId,
    UserId,
    To,
    Subject,
    ReplyTo,
}

impl MessageField {
    /// Depth the message must reach before this field can be located
    pub fn required_depth(self) -> Depth {
        match self {
            MessageField::Header => Depth::Header,
            MessageField::DeliveryAnnotations => Depth::DeliveryAnnotations,
            MessageField::MessageAnnotations => Depth::MessageAnnotations,
            MessageField::ApplicationProperties => Depth::ApplicationProperties,
            MessageField::Body => Depth::Body,
            MessageField::Footer => Depth::All,
            MessageField::Properties
            | MessageField::MessageId
            | MessageField::UserId
            | MessageField::To
            | MessageField::Subject
            | MessageField::ReplyTo => Depth::Properties,
        }
    }

    /// The properties-list position for scalar fields
    pub fn property(self) -> Option<PropertyField> {
        match self {
            MessageField::MessageId => Some(PropertyField::MessageId),
            MessageField::UserId => Some(PropertyField::UserId),
            MessageField::To => Some(PropertyField::To),
            MessageField::Subject => Some(PropertyField::Subject),
            MessageField::ReplyTo => Some(PropertyField::ReplyTo),
            _ => None,
        }
    }
}

impl From<PropertyField> for MessageField {
    fn from(field: PropertyField) -> Self {
        match field {
            PropertyField::MessageId => MessageField::MessageId,
            PropertyField::UserId => MessageField::UserId,
            PropertyField::To => MessageField::To,
            PropertyField::Subject => MessageField::Subject,
            PropertyField::ReplyTo => MessageField::ReplyTo,
        }
    }
}

/// Byte range of one encoded field inside a buffer chain
///
/// `cursor` anchors the first encoded byte (the section descriptor for
/// sections, the type tag for scalars). The field spans `length` bytes from
/// there, of which the first `hdr_length` are descriptor/tag/size bytes. The
/// span may continue into later buffers of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLocation {
    pub cursor: Cursor,
    pub length: usize,
    pub hdr_length: usize,
    /// Type tag that follows the descriptor (or the scalar's own tag)
    pub tag: u8,
}

impl FieldLocation {
    /// Bytes after the header
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.length - self.hdr_length
    }
}

/// Parse status of one location slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldState {
    /// Not looked for yet
    #[default]
    Unparsed,
    /// Looked for and not present
    Absent,
    Present(FieldLocation),
}

impl FieldState {
    pub fn location(&self) -> Option<FieldLocation> {
        match self {
            FieldState::Present(location) => Some(*location),
            _ => None,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, FieldState::Present(_))
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, FieldState::Unparsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_is_totally_ordered() {
        let order = [
            Depth::None,
            Depth::Header,
            Depth::DeliveryAnnotations,
            Depth::MessageAnnotations,
            Depth::Properties,
            Depth::ApplicationProperties,
            Depth::Body,
            Depth::All,
        ];
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Depth::try_from(6u8).unwrap(), Depth::Body);
        assert!(Depth::try_from(8u8).is_err());
        assert_eq!(Depth::default(), Depth::None);
        assert_eq!(FieldState::default(), FieldState::Unparsed);
    }

    #[test]
    fn test_section_depths_and_tags() {
        assert_eq!(Section::BodySequence.depth(), Depth::Body);
        assert_eq!(Section::Footer.depth(), Depth::All);
        assert!(Section::BodyData.expected_tags().contains(0xB0));
        assert!(!Section::Properties.expected_tags().contains(0xC1));
        assert_eq!(Section::try_from(0x73u8).unwrap(), Section::Properties);
    }

    #[test]
    fn test_property_fields_map_to_message_fields() {
        assert_eq!(MessageField::from(PropertyField::ReplyTo), MessageField::ReplyTo);
        assert_eq!(MessageField::To.property(), Some(PropertyField::To));
        assert_eq!(MessageField::Body.property(), None);
        assert_eq!(MessageField::UserId.required_depth(), Depth::Properties);
    }

    #[test]
    fn test_field_state_accessors() {
        let location = FieldLocation {
            cursor: Cursor::new(1, 4),
            length: 12,
            hdr_length: 5,
            tag: 0xA0,
        };
        assert_eq!(location.payload_len(), 7);
        assert_eq!(FieldState::Present(location).location(), Some(location));
        assert!(FieldState::Absent.is_resolved());
        assert!(!FieldState::Unparsed.is_resolved());
    }
}
