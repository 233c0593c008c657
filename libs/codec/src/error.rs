//! Protocol-level errors for message section processing
//!
//! Every error carries enough context (offset into the message, offending
//! tag, section name) to diagnose a rejected message from a log line alone.
//! Truncation is kept apart from malformation: a truncated field on a message
//! that is still arriving only means "come back with more bytes".

use thiserror::Error;
use types::{BufferError, Section};

/// Errors raised while parsing, iterating or composing message sections
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// The chain ended inside a field
    #[error("Truncated field at byte {offset}: chain ended while reading {context}")]
    Truncated { offset: usize, context: &'static str },

    /// A section descriptor matched but the value tag is not allowed there
    #[error("Unexpected tag {tag:#04x} after {section:?} descriptor at byte {offset}")]
    UnexpectedTag {
        section: Section,
        tag: u8,
        offset: usize,
    },

    /// The same section appeared twice
    #[error("Duplicate {section:?} section at byte {offset}")]
    DuplicateSection { section: Section, offset: usize },

    /// A tag whose encoded size cannot be determined
    #[error("Unsupported tag {tag:#04x} at byte {offset}")]
    UnsupportedTag { tag: u8, offset: usize },

    /// A field ran past the end of the section that contains it
    #[error("Field at byte {offset} overruns its enclosing {section:?} section (ends at byte {section_end})")]
    FieldOverrun {
        section: Section,
        offset: usize,
        section_end: usize,
    },

    /// A map section declared an odd number of elements
    #[error("Map in {section:?} declares {count} elements; maps need key/value pairs")]
    OddMapCount { section: Section, count: usize },

    /// Caller-supplied storage cannot hold the field
    #[error("Destination too small: field needs {need} bytes, got {got}")]
    DestinationTooSmall { need: usize, got: usize },

    /// The message has no bytes at all
    #[error("Message contains no data")]
    EmptyMessage,

    /// Misuse of the section composer
    #[error("Composition error: {0}")]
    Composition(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl ProtocolError {
    /// Create a truncation error with the position where the chain ran out
    pub fn truncated(offset: usize, context: &'static str) -> Self {
        Self::Truncated { offset, context }
    }

    pub fn composition(description: impl Into<String>) -> Self {
        Self::Composition(description.into())
    }

    /// True when more bytes might turn this failure into success
    #[inline]
    pub fn is_truncation(&self) -> bool {
        matches!(self, ProtocolError::Truncated { .. })
    }
}

/// Result type for codec operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_is_distinguished() {
        assert!(ProtocolError::truncated(4, "length prefix").is_truncation());
        assert!(!ProtocolError::DuplicateSection {
            section: Section::DeliveryAnnotations,
            offset: 12,
        }
        .is_truncation());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let error = ProtocolError::UnexpectedTag {
            section: Section::Properties,
            tag: 0xC1,
            offset: 7,
        };
        let message = error.to_string();
        assert!(message.contains("0xc1"));
        assert!(message.contains("Properties"));
        assert!(message.contains("byte 7"));
    }
}
