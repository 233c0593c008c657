//! # Dispatch Message Codec
//!
//! ## Purpose
//!
//! The rules layer of the message engine: everything that interprets or
//! produces the bytes of a message without owning them.
//!
//! - **Traversal**: size any encoded value from its tag ([`traverse_field`])
//! - **Section parsing**: incremental, depth-driven location of sections and
//!   properties fields ([`ParseState`])
//! - **Field access**: in-place iteration and bounded copies of located fields
//!   ([`FieldIterator`], [`copy_field`])
//! - **Annotations**: decoding of map-valued sections ([`decode_map`])
//! - **Composition**: building outbound sections ([`SectionComposer`])
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/message
//!     ↑           ↓            ↓
//! Buffer      Parse/Compose  Shared content,
//! Chains      Rules          Receive/Send
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Ownership or sharing of message content (belongs in libs/message)
//! - Link I/O of any kind
//! - Full decoding of section bodies beyond annotation maps

pub mod annotations;
pub mod compose;
pub mod error;
pub mod iterator;
pub mod parser;
pub mod traverse;

pub use annotations::{decode_map, AnnotationMap, EncodedValue};
pub use compose::SectionComposer;
pub use error::{ProtocolError, ProtocolResult};
pub use iterator::{copy_field, FieldIterator, FieldView, Segments};
pub use parser::{match_section, DepthStatus, ParseState, SectionRule, SECTION_RULES};
pub use traverse::{tag_width, traverse_field, Width};
