//! # Send Splicer
//!
//! Writes a message to a link without re-encoding it. With replacement
//! delivery annotations installed, the output is spliced from two chains:
//!
//! ```text
//! original:  [ header ][ old annotations ][ rest ............ ]
//!                 │                            │
//! output:    [ header ][ new annotations ][ rest ............ ]
//!                           ▲
//!                      replacement chain
//! ```
//!
//! Every span is handed to the link as it sits in its buffer.

use crate::error::{MessageError, MessageResult};
use crate::link::Link;
use crate::message::Message;
use codec::{FieldIterator, FieldView};
use tracing::{debug, trace};
use types::{BufferChain, Cursor, Depth, FieldLocation, MessageField};

/// Write `message` to `link`, returning the number of bytes sent
///
/// Replacement annotations require the message to have fully arrived and to
/// be valid through its delivery annotations.
pub fn send<L: Link + ?Sized>(message: &Message, link: &mut L) -> MessageResult<usize> {
    let content = message.content();

    let Some(annotations) = content.new_annotations() else {
        let chain = content.read_chain();
        let sent = write_spans(link, chain.buffers().segments_from(Cursor::START))?;
        trace!(content = content.id(), sent, "message sent unchanged");
        return Ok(sent);
    };

    if !message.is_complete() {
        return Err(MessageError::Incomplete {
            depth: Depth::DeliveryAnnotations,
        });
    }
    message.require(Depth::DeliveryAnnotations)?;

    let header = content.section_state(MessageField::Header).location();
    let original = content.section_state(MessageField::DeliveryAnnotations).location();

    let chain = content.read_chain();
    let buffers = chain.buffers();
    let (splice_at, resume_at) = splice_points(buffers, header, original)?;

    let prefix = FieldLocation {
        cursor: Cursor::START,
        length: buffers.position(splice_at),
        hdr_length: 0,
        tag: 0,
    };

    let mut sent = write_spans(link, FieldIterator::new(buffers, &prefix, FieldView::Encoded)?.segments())?;
    sent += write_spans(link, annotations.segments_from(Cursor::START))?;
    sent += write_spans(link, buffers.segments_from(resume_at))?;

    debug!(
        content = content.id(),
        sent,
        replaced = original.map_or(0, |location| location.length),
        inserted = annotations.byte_len(),
        "message sent with replacement delivery annotations"
    );
    Ok(sent)
}

/// Where the replacement goes in, and where the original resumes
fn splice_points(
    chain: &BufferChain,
    header: Option<FieldLocation>,
    annotations: Option<FieldLocation>,
) -> MessageResult<(Cursor, Cursor)> {
    if let Some(annotations) = annotations {
        let resume = skip(chain, &annotations)?;
        return Ok((annotations.cursor, resume));
    }

    let splice_at = match header {
        Some(header) => skip(chain, &header)?,
        None => Cursor::START,
    };
    Ok((splice_at, splice_at))
}

fn skip(chain: &BufferChain, location: &FieldLocation) -> MessageResult<Cursor> {
    chain.advance(location.cursor, location.length).ok_or_else(|| {
        codec::ProtocolError::truncated(chain.position(location.cursor), "section being spliced").into()
    })
}

fn write_spans<'a, L, I>(link: &mut L, spans: I) -> MessageResult<usize>
where
    L: Link + ?Sized,
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut sent = 0;
    for span in spans {
        link.send(span)?;
        sent += span.len();
    }
    Ok(sent)
}

impl Message {
    /// Write this message to `link`; see [`send`]
    pub fn send<L: Link + ?Sized>(&self, link: &mut L) -> MessageResult<usize> {
        send(self, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;
    use codec::SectionComposer;
    use config::EngineConfig;
    use types::Section;

    fn replacement() -> BufferChain {
        SectionComposer::new()
            .start_section(Section::DeliveryAnnotations)
            .start_map()
            .insert_symbol("x-new")
            .insert_bool(true)
            .end_map()
            .build(4)
            .unwrap()
    }

    #[test]
    fn test_unmodified_send_is_pass_through() {
        let message = Message::compose("q", Some(b"body"), &EngineConfig::default().with_buffer_capacity(5)).unwrap();
        let mut link = MemoryLink::new();

        let sent = message.send(&mut link).unwrap();
        assert_eq!(sent, message.byte_len());
        assert_eq!(link.outbound(), message.to_bytes());
        assert_eq!(link.send_calls(), message.content().read_chain().buffers().buffer_count());
    }

    #[test]
    fn test_splice_without_original_annotations() {
        let message = Message::compose("q", Some(b"body"), &EngineConfig::default()).unwrap();
        let original = message.to_bytes();
        let header_len = 7;

        message.set_delivery_annotations(replacement());
        let mut link = MemoryLink::new();
        message.send(&mut link).unwrap();

        let mut expected = original[..header_len].to_vec();
        expected.extend_from_slice(&replacement().to_vec());
        expected.extend_from_slice(&original[header_len..]);
        assert_eq!(link.outbound(), expected);
    }

    #[test]
    fn test_splice_requires_complete_message() {
        let message = Message::new();
        message.set_delivery_annotations(replacement());
        let error = message.send(&mut MemoryLink::new()).unwrap_err();
        assert!(matches!(error, MessageError::Incomplete { .. }));
    }
}
