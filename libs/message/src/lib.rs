//! # Dispatch Message Engine
//!
//! ## Purpose
//!
//! Ownership and movement of messages: shared, reference-counted content,
//! the resumable receive loop that assembles it from a link, and the send
//! path that writes it back out, splicing in replacement delivery
//! annotations without re-encoding anything else.
//!
//! ## Architecture Role
//!
//! ```text
//! Link ──recv──► receive() ──► Message ──clone──► consumers
//!                                 │               (check, field, copy_field)
//!                                 └──► send() ──► Link
//! ```
//!
//! ## Threading
//!
//! Nothing here spawns threads or blocks on I/O. Handles are `Send + Sync`;
//! concurrent `check` calls on one content are serialized by its parse lock,
//! and the first caller to reach a depth commits it for everyone.

pub mod content;
pub mod error;
pub mod link;
pub mod message;
pub mod receive;
pub mod send;

pub use codec::{DepthStatus, FieldView};
pub use content::{ChainState, MessageContent};
pub use error::{MessageError, MessageResult};
pub use link::{Link, LinkRead, MemoryLink};
pub use message::{FieldRef, Message, Released};
pub use receive::receive;
pub use send::send;
