//! # Receive Loop
//!
//! ## Purpose
//!
//! Non-blocking, resumable assembly of one inbound message from a [`Link`].
//! Each call fills the chain's tail buffer until the link runs dry or ends
//! the message:
//!
//! ```text
//! ┌──────────────┐  Data(n)    commit n; full tail → new tail; loop
//! │ recv(tail)   │──────────►
//! └──────────────┘  Drained    keep the delivery, return None
//!        │          EndOfMessage
//!        └────────► trim empty tail, mark complete, return Some(message)
//! ```
//!
//! The in-flight message lives in the caller's delivery slot between calls.
//! Any error drops the partial message and clears the slot.

use crate::content::MessageContent;
use crate::error::{MessageError, MessageResult};
use crate::link::{Link, LinkRead};
use crate::message::Message;
use config::EngineConfig;
use tracing::{debug, trace, warn};

/// Pull available bytes for the delivery in `delivery`
///
/// Returns the finished message once the link signals end of message; the
/// delivery slot is empty again afterwards.
pub fn receive<L: Link + ?Sized>(
    link: &mut L,
    delivery: &mut Option<Message>,
    config: &EngineConfig,
) -> MessageResult<Option<Message>> {
    let message = delivery.get_or_insert_with(Message::new);

    match fill(link, message.content(), config) {
        Ok(true) => {
            let finished = delivery.take();
            if let Some(message) = &finished {
                debug!(content = message.content().id(), bytes = message.byte_len(), "message received");
            }
            Ok(finished)
        }
        Ok(false) => Ok(None),
        Err(error) => {
            warn!(%error, "dropping partially received message");
            *delivery = None;
            Err(error)
        }
    }
}

/// Read until the link drains or ends the message; `true` on end of message
fn fill<L: Link + ?Sized>(link: &mut L, content: &MessageContent, config: &EngineConfig) -> MessageResult<bool> {
    let mut state = content.write_chain();
    let mut received = state.buffers.byte_len();

    loop {
        let tail = state.buffers.writable_tail(config.buffer_capacity)?;
        let spare = tail.spare_mut();
        let capacity = spare.len();

        match link.recv(spare)? {
            LinkRead::EndOfMessage => {
                state.buffers.trim_empty_tail();
                state.complete = true;
                return Ok(true);
            }
            LinkRead::Drained | LinkRead::Data(0) => {
                trace!(content = content.id(), received, "link drained");
                return Ok(false);
            }
            LinkRead::Data(n) => {
                if n > capacity {
                    return Err(MessageError::LinkOverrun { reported: n, capacity });
                }
                tail.commit(n)?;
                received += n;

                if let Some(limit) = config.max_message_size {
                    if received > limit {
                        return Err(MessageError::MessageTooLarge { size: received, limit });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;
    use std::io;
    use types::Depth;

    fn config(capacity: usize) -> EngineConfig {
        EngineConfig::default().with_buffer_capacity(capacity)
    }

    #[test]
    fn test_single_pass_receive() {
        let bytes = [0x00, 0x53, 0x70, 0x45];
        let mut link = MemoryLink::new();
        link.push_bytes(&bytes).end_message();

        let mut delivery = None;
        let message = receive(&mut link, &mut delivery, &config(16)).unwrap().unwrap();
        assert!(delivery.is_none());
        assert!(message.is_complete());
        assert_eq!(message.to_bytes(), bytes);
        assert!(message.is_parsed_to(Depth::All));
    }

    #[test]
    fn test_drained_link_keeps_delivery() {
        let mut link = MemoryLink::new();
        link.push_bytes(&[0x00, 0x53]).pause().push_bytes(&[0x70, 0x45]).end_message();

        let mut delivery = None;
        let config = config(16);
        assert!(receive(&mut link, &mut delivery, &config).unwrap().is_none());
        let partial = delivery.as_ref().unwrap();
        assert_eq!(partial.byte_len(), 2);
        assert!(!partial.is_complete());

        let message = receive(&mut link, &mut delivery, &config).unwrap().unwrap();
        assert_eq!(message.byte_len(), 4);
    }

    #[test]
    fn test_full_tail_gets_new_buffer_and_empty_tail_is_trimmed() {
        let mut link = MemoryLink::new();
        link.push_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).end_message();

        let mut delivery = None;
        let message = receive(&mut link, &mut delivery, &config(4)).unwrap().unwrap();
        let chain = message.content().read_chain();
        assert_eq!(chain.buffers().buffer_count(), 2);
        assert!(chain.buffers().iter().all(|buffer| buffer.is_full()));
    }

    #[test]
    fn test_size_limit_drops_delivery() {
        let mut link = MemoryLink::new();
        link.push_bytes(&[0u8; 40]).end_message();

        let mut delivery = None;
        let config = config(8).with_max_message_size(16);
        let error = receive(&mut link, &mut delivery, &config).unwrap_err();
        assert!(matches!(error, MessageError::MessageTooLarge { limit: 16, .. }));
        assert!(delivery.is_none());
    }

    struct OverrunLink;

    impl Link for OverrunLink {
        fn recv(&mut self, buf: &mut [u8]) -> io::Result<LinkRead> {
            Ok(LinkRead::Data(buf.len() + 1))
        }

        fn send(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenLink;

    impl Link for BrokenLink {
        fn recv(&mut self, _buf: &mut [u8]) -> io::Result<LinkRead> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
        }

        fn send(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        }
    }

    #[test]
    fn test_link_failures_clear_delivery() {
        let mut delivery = Some(Message::new());
        let error = receive(&mut OverrunLink, &mut delivery, &config(4)).unwrap_err();
        assert!(matches!(error, MessageError::LinkOverrun { reported: 5, capacity: 4 }));
        assert!(delivery.is_none());

        let error = receive(&mut BrokenLink, &mut delivery, &config(4)).unwrap_err();
        assert!(matches!(error, MessageError::Transport(_)));
        assert!(delivery.is_none());
    }
}
