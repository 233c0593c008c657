//! Link Transport Seam
//!
//! The engine drives a link through two calls: a non-blocking read into the
//! free space of a buffer, and a write of one contiguous span. [`MemoryLink`]
//! scripts both directions in memory.

use std::collections::VecDeque;
use std::io;

/// Result of one non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRead {
    /// This many bytes were written to the front of the offered buffer
    Data(usize),
    /// Nothing available right now; the message is not finished
    Drained,
    /// The current message is complete
    EndOfMessage,
}

/// Transport endpoint carrying one message at a time in each direction
pub trait Link {
    /// Read available bytes of the current inbound message into `buf`
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<LinkRead>;

    /// Write one span of the current outbound message
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
}

#[derive(Debug)]
enum Inbound {
    Bytes { data: Vec<u8>, position: usize },
    Pause,
    End,
}

/// Scripted in-memory link
///
/// Inbound events are consumed in order: byte runs are handed out as buffer
/// space allows, a pause yields [`LinkRead::Drained`] once, an end marker
/// yields [`LinkRead::EndOfMessage`]. An exhausted script reads as drained.
#[derive(Debug, Default)]
pub struct MemoryLink {
    inbound: VecDeque<Inbound>,
    outbound: Vec<u8>,
    send_calls: usize,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes of the current inbound message
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.inbound.push_back(Inbound::Bytes {
            data: bytes.to_vec(),
            position: 0,
        });
        self
    }

    /// Queue a point where the reader sees no data
    pub fn pause(&mut self) -> &mut Self {
        self.inbound.push_back(Inbound::Pause);
        self
    }

    /// Queue the end of the current inbound message
    pub fn end_message(&mut self) -> &mut Self {
        self.inbound.push_back(Inbound::End);
        self
    }

    /// Everything sent so far
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Number of `send` calls, one per span written
    pub fn send_calls(&self) -> usize {
        self.send_calls
    }
}

impl Link for MemoryLink {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<LinkRead> {
        loop {
            let Some(front) = self.inbound.front_mut() else {
                return Ok(LinkRead::Drained);
            };

            match front {
                Inbound::Bytes { data, position } => {
                    let available = data.len() - *position;
                    if available == 0 {
                        self.inbound.pop_front();
                        continue;
                    }
                    let take = available.min(buf.len());
                    buf[..take].copy_from_slice(&data[*position..*position + take]);
                    *position += take;
                    if *position == data.len() {
                        self.inbound.pop_front();
                    }
                    return Ok(LinkRead::Data(take));
                }
                Inbound::Pause => {
                    self.inbound.pop_front();
                    return Ok(LinkRead::Drained);
                }
                Inbound::End => {
                    self.inbound.pop_front();
                    return Ok(LinkRead::EndOfMessage);
                }
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.outbound.extend_from_slice(bytes);
        self.send_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads() {
        let mut link = MemoryLink::new();
        link.push_bytes(b"abcde").pause().push_bytes(b"f").end_message();

        let mut buf = [0u8; 3];
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::Data(3));
        assert_eq!(&buf, b"abc");
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::Data(2));
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::Drained);
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::Data(1));
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::EndOfMessage);
        assert_eq!(link.recv(&mut buf).unwrap(), LinkRead::Drained);
    }

    #[test]
    fn test_sends_accumulate() {
        let mut link = MemoryLink::new();
        link.send(b"ab").unwrap();
        link.send(b"c").unwrap();
        assert_eq!(link.outbound(), b"abc");
        assert_eq!(link.send_calls(), 2);
        assert_eq!(link.take_outbound(), b"abc");
        assert!(link.outbound().is_empty());
    }
}
