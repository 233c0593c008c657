//! # Dispatch Message Types
//!
//! Pure data structures shared by the message engine:
//!
//! - **Buffers**: fixed-capacity blocks with a write cursor, linked into a
//!   [`BufferChain`] that holds one message's bytes
//! - **Cursors**: stable (buffer, offset) positions inside a chain
//! - **Field locations**: byte ranges of located sections and scalar fields
//! - **Wire constants**: section descriptors, type tags and tag sets
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → libs/codec → libs/message
//!     ↑             ↓             ↓
//! Buffers,     Parse/Compose   Shared content,
//! Locations    Rules           Receive/Send
//! ```
//!
//! Parsing and composition logic lives in the codec crate; this crate only
//! defines the shapes they operate on.

pub mod buffer;
pub mod field;
pub mod wire;

pub use buffer::{Buffer, BufferChain, BufferError, Cursor, DEFAULT_BUFFER_CAPACITY};
pub use field::{Depth, FieldLocation, FieldState, MessageField, PropertyField, Section};
pub use wire::{tags, TagSet};
