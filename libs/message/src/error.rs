//! Errors surfaced by message handles, the receive loop and the send splicer

use codec::ProtocolError;
use std::io;
use thiserror::Error;
use types::{BufferError, Depth};

#[derive(Debug, Error)]
pub enum MessageError {
    /// Malformed or truncated message structure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The link failed while reading or writing
    #[error("Link transport failed: {0}")]
    Transport(#[from] io::Error),

    /// The receive loop exceeded the configured size limit
    #[error("Message of at least {size} bytes exceeds the {limit}-byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    /// The link claimed to deliver more bytes than it was offered room for
    #[error("Link reported {reported} bytes into a buffer with {capacity} bytes free")]
    LinkOverrun { reported: usize, capacity: usize },

    /// The operation needs sections that have not fully arrived
    #[error("Message has not arrived far enough to reach {depth:?}")]
    Incomplete { depth: Depth },
}

impl MessageError {
    /// True for errors caused by the message bytes themselves
    ///
    /// Truncation only surfaces once a message is complete, so it counts too.
    pub fn is_malformed(&self) -> bool {
        matches!(self, MessageError::Protocol(_))
    }
}

pub type MessageResult<T> = Result<T, MessageError>;
