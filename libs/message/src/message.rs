//! # Message Handle
//!
//! A [`Message`] is a cheap, clonable reference to shared
//! [`MessageContent`]. Cloning (or [`Message::retain`]) never copies buffer
//! data; the content is freed when the last handle is released or dropped.
//!
//! ## Consumer Flow
//!
//! ```text
//! check(depth) ──► field_location / field / copy_field
//!      │
//!      └─► set_delivery_annotations ──► send (spliced)
//! ```

use crate::content::{ChainState, MessageContent};
use crate::error::{MessageError, MessageResult};
use codec::{AnnotationMap, DepthStatus, FieldIterator, FieldView, ProtocolResult, SectionComposer};
use config::EngineConfig;
use parking_lot::RwLockReadGuard;
use std::fmt;
use std::sync::Arc;
use types::{BufferChain, Depth, FieldLocation, MessageField, Section};

/// What releasing a handle did to the shared content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// This was the last handle; the content has been freed
    Freed,
    /// Other handles still reference the content
    Shared,
}

/// Reference-counted handle to one message
#[derive(Clone)]
pub struct Message {
    content: Arc<MessageContent>,
}

impl Message {
    /// Empty message awaiting bytes from a link
    pub fn new() -> Self {
        Self::from_content(MessageContent::new())
    }

    /// Adopt a complete chain as message content
    pub fn from_chain(chain: BufferChain) -> Self {
        Self::from_content(MessageContent::with_chain(chain, true))
    }

    fn from_content(content: MessageContent) -> Self {
        Self {
            content: Arc::new(content),
        }
    }

    /// Build an internal message: header, properties carrying `to`, and an
    /// optional binary body
    pub fn compose(to: &str, body: Option<&[u8]>, config: &EngineConfig) -> MessageResult<Self> {
        let mut composer = SectionComposer::new()
            .start_section(Section::Header)
            .start_list()
            .insert_bool(false)
            .end_list()
            .start_section(Section::Properties)
            .start_list()
            .insert_null()
            .insert_null()
            .insert_string(to)
            .end_list();

        if let Some(body) = body {
            composer = composer.start_section(Section::BodyData).insert_binary(body);
        }

        Self::from_composer(composer, config)
    }

    /// Adopt the output of any composer as a complete message
    pub fn from_composer(composer: SectionComposer, config: &EngineConfig) -> MessageResult<Self> {
        let chain = composer.build(config.buffer_capacity)?;
        Ok(Self::from_chain(chain))
    }

    /// A new handle to the same content
    pub fn retain(&self) -> Self {
        self.clone()
    }

    /// Give up this handle
    pub fn release(self) -> Released {
        match Arc::into_inner(self.content) {
            Some(content) => {
                drop(content);
                Released::Freed
            }
            None => Released::Shared,
        }
    }

    /// Number of live handles to this content
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.content)
    }

    /// True when both handles share one content
    pub fn shares_content(&self, other: &Message) -> bool {
        Arc::ptr_eq(&self.content, &other.content)
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Validate the message up to `depth`
    ///
    /// `NeedMoreData` is only returned while the message is still arriving.
    pub fn check(&self, depth: Depth) -> MessageResult<DepthStatus> {
        Ok(self.content.check(depth)?)
    }

    /// True when the message is valid up to `depth` right now
    pub fn is_parsed_to(&self, depth: Depth) -> bool {
        matches!(self.check(depth), Ok(DepthStatus::Reached))
    }

    /// Deepest depth validated so far
    pub fn depth(&self) -> Depth {
        self.content.depth()
    }

    /// Location of a field, if the message has been checked far enough for it
    /// and the field is present
    pub fn field_location(&self, field: MessageField) -> MessageResult<Option<FieldLocation>> {
        Ok(self.content.field_location(field)?)
    }

    /// Payload length of a located field
    pub fn field_length(&self, field: MessageField) -> MessageResult<Option<usize>> {
        Ok(self.field_location(field)?.map(|location| location.payload_len()))
    }

    /// Borrow a located field for in-place reading
    ///
    /// The returned reference holds the content's chain read lock; drop it
    /// before feeding more bytes to the same message.
    pub fn field(&self, field: MessageField, view: FieldView) -> MessageResult<Option<FieldRef<'_>>> {
        let Some(location) = self.field_location(field)? else {
            return Ok(None);
        };
        Ok(Some(FieldRef {
            chain: self.content.read_chain(),
            location,
            view,
        }))
    }

    /// Copy a field's payload into `dest`, returning the number of bytes
    /// written, or `None` when the field is not present
    pub fn copy_field(&self, field: MessageField, dest: &mut [u8]) -> MessageResult<Option<usize>> {
        let Some(location) = self.field_location(field)? else {
            return Ok(None);
        };
        let chain = self.content.read_chain();
        let written = codec::copy_field(chain.buffers(), &location, FieldView::Payload, dest)?;
        Ok(Some(written))
    }

    /// Replace the delivery annotations emitted by [`Message::send`]
    ///
    /// # Panics
    ///
    /// If annotations were already replaced on this content, through any handle.
    pub fn set_delivery_annotations(&self, annotations: BufferChain) {
        self.content.set_new_annotations(annotations);
    }

    /// Decoded delivery annotations, parsing the message that far if needed
    pub fn delivery_annotations(&self) -> MessageResult<Option<Arc<AnnotationMap>>> {
        self.require(Depth::DeliveryAnnotations)?;
        Ok(self.content.decoded_annotations()?)
    }

    /// Fail unless the message has been validated through `depth`
    pub(crate) fn require(&self, depth: Depth) -> MessageResult<()> {
        match self.check(depth)? {
            DepthStatus::Reached => Ok(()),
            DepthStatus::NeedMoreData => Err(MessageError::Incomplete { depth }),
        }
    }

    /// True once the link has delivered the whole message
    pub fn is_complete(&self) -> bool {
        self.content.read_chain().is_complete()
    }

    /// Bytes received or composed so far
    pub fn byte_len(&self) -> usize {
        self.content.read_chain().buffers().byte_len()
    }

    /// Copy of the stored bytes, original annotations included
    pub fn to_bytes(&self) -> Vec<u8> {
        self.content.read_chain().buffers().to_vec()
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("content", &self.content.id())
            .field("refs", &self.ref_count())
            .field("depth", &self.depth())
            .finish()
    }
}

/// A located field with the chain read lock held
pub struct FieldRef<'a> {
    chain: RwLockReadGuard<'a, ChainState>,
    location: FieldLocation,
    view: FieldView,
}

impl FieldRef<'_> {
    pub fn location(&self) -> FieldLocation {
        self.location
    }

    /// Length of the selected view
    pub fn len(&self) -> usize {
        match self.view {
            FieldView::Payload => self.location.payload_len(),
            FieldView::Encoded => self.location.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> ProtocolResult<FieldIterator<'_>> {
        FieldIterator::new(self.chain.buffers(), &self.location, self.view)
    }

    pub fn to_vec(&self) -> ProtocolResult<Vec<u8>> {
        Ok(self.iter()?.to_vec())
    }

    pub fn equals(&self, expected: &[u8]) -> ProtocolResult<bool> {
        Ok(self.iter()?.equals(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default().with_buffer_capacity(8)
    }

    #[test]
    fn test_compose_round_trip() {
        let message = Message::compose("queue/a", Some(b"hello world"), &config()).unwrap();
        assert!(message.is_complete());
        assert_eq!(message.check(Depth::All).unwrap(), DepthStatus::Reached);

        let to = message.field(MessageField::To, FieldView::Payload).unwrap().unwrap();
        assert!(to.equals(b"queue/a").unwrap());
        drop(to);

        assert_eq!(message.field_length(MessageField::Body).unwrap(), Some(11));
        let mut dest = [0u8; 32];
        assert_eq!(message.copy_field(MessageField::Body, &mut dest).unwrap(), Some(11));
        assert_eq!(&dest[..11], b"hello world");
    }

    #[test]
    fn test_compose_without_body() {
        let message = Message::compose("topic", None, &config()).unwrap();
        message.check(Depth::All).unwrap();
        assert_eq!(message.field_location(MessageField::Body).unwrap(), None);
        assert_eq!(message.field_location(MessageField::ReplyTo).unwrap(), None);
    }

    #[test]
    fn test_fields_unavailable_before_check() {
        let message = Message::compose("queue/b", None, &config()).unwrap();
        assert_eq!(message.field_location(MessageField::To).unwrap(), None);
        assert!(message.is_parsed_to(Depth::Properties));
        assert!(message.field_location(MessageField::To).unwrap().is_some());
    }

    #[test]
    fn test_retain_and_release() {
        let message = Message::compose("q", None, &config()).unwrap();
        let copy = message.retain();
        assert_eq!(message.ref_count(), 2);
        assert!(copy.shares_content(&message));

        assert_eq!(copy.release(), Released::Shared);
        assert_eq!(message.ref_count(), 1);
        assert!(message.is_parsed_to(Depth::Header));
        assert_eq!(message.release(), Released::Freed);
    }

    #[test]
    fn test_encoded_field_view() {
        let message = Message::compose("x", None, &config()).unwrap();
        message.check(Depth::Header).unwrap();
        let header = message.field(MessageField::Header, FieldView::Encoded).unwrap().unwrap();
        assert_eq!(header.to_vec().unwrap(), [0x00, 0x53, 0x70, 0xC0, 0x02, 0x01, 0x42]);
        assert_eq!(header.len(), 7);
    }

    #[test]
    fn test_delivery_annotations_decoded_once() {
        let composer = SectionComposer::new()
            .start_section(Section::DeliveryAnnotations)
            .start_map()
            .insert_symbol("x-hops")
            .insert_uint(2)
            .end_map();
        let message = Message::from_composer(composer, &config()).unwrap();

        let first = message.delivery_annotations().unwrap().unwrap();
        let second = message.delivery_annotations().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.get("x-hops").and_then(|value| value.as_u64()), Some(2));

        let plain = Message::compose("q", None, &config()).unwrap();
        assert!(plain.delivery_annotations().unwrap().is_none());
    }

    #[test]
    #[should_panic(expected = "already replaced")]
    fn test_second_annotation_replacement_panics() {
        let message = Message::compose("q", None, &config()).unwrap();
        let copy = message.retain();
        message.set_delivery_annotations(BufferChain::new());
        copy.set_delivery_annotations(BufferChain::new());
    }
}
