//! # Shared Message Content
//!
//! ## Purpose
//!
//! One [`MessageContent`] holds the bytes of one message and everything
//! learned about them. Handles ([`crate::Message`]) share it through an `Arc`.
//!
//! ## Locking
//!
//! ```text
//! parse: Mutex<ParseState>      depth, cursor, located fields
//!   └─ chain: RwLock<ChainState>  buffers + completion flag
//! ```
//!
//! The parse mutex is always taken before the chain lock. The receive loop
//! takes only the chain write lock; parsing, iteration and sending take the
//! read lock. New delivery annotations and the decoded annotation map are
//! write-once cells.

use codec::{decode_map, AnnotationMap, DepthStatus, ParseState, ProtocolResult};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use types::{BufferChain, Depth, FieldLocation, FieldState, MessageField, Section};

/// Source of content ids for log correlation
static CONTENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Bytes of a message and whether the link has finished delivering them
#[derive(Debug, Default)]
pub struct ChainState {
    pub(crate) buffers: BufferChain,
    pub(crate) complete: bool,
}

impl ChainState {
    #[inline]
    pub fn buffers(&self) -> &BufferChain {
        &self.buffers
    }

    /// True once the link has signalled end of message
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

#[derive(Debug)]
pub struct MessageContent {
    id: u64,
    parse: Mutex<ParseState>,
    chain: RwLock<ChainState>,
    new_annotations: OnceCell<BufferChain>,
    annotations: OnceCell<Arc<AnnotationMap>>,
}

impl MessageContent {
    /// Empty content awaiting bytes from a link
    pub fn new() -> Self {
        Self::with_chain(BufferChain::new(), false)
    }

    /// Content adopting an existing chain
    pub fn with_chain(buffers: BufferChain, complete: bool) -> Self {
        let id = CONTENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        trace!(content = id, bytes = buffers.byte_len(), complete, "message content created");
        Self {
            id,
            parse: Mutex::new(ParseState::new()),
            chain: RwLock::new(ChainState { buffers, complete }),
            new_annotations: OnceCell::new(),
            annotations: OnceCell::new(),
        }
    }

    /// Id used in log lines about this content
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn read_chain(&self) -> RwLockReadGuard<'_, ChainState> {
        self.chain.read()
    }

    pub(crate) fn write_chain(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.chain.write()
    }

    /// Parse up to `depth`, serialized with every other parse of this content
    pub fn check(&self, depth: Depth) -> ProtocolResult<DepthStatus> {
        let mut parse = self.parse.lock();
        let before = parse.depth();
        let chain = self.chain.read();
        let status = parse.check(&chain.buffers, chain.complete, depth)?;
        if parse.depth() > before {
            debug!(content = self.id, from = ?before, to = ?parse.depth(), "parse depth advanced");
        }
        Ok(status)
    }

    /// Deepest committed parse depth
    pub fn depth(&self) -> Depth {
        self.parse.lock().depth()
    }

    /// Location of an already-parsed field
    pub fn field_location(&self, field: MessageField) -> ProtocolResult<Option<FieldLocation>> {
        let mut parse = self.parse.lock();
        let chain = self.chain.read();
        parse.field(&chain.buffers, field)
    }

    /// Parse status of a top-level section
    pub fn section_state(&self, field: MessageField) -> FieldState {
        self.parse.lock().section_state(field)
    }

    /// Install replacement delivery annotations
    ///
    /// # Panics
    ///
    /// If replacement annotations were already installed on this content.
    pub fn set_new_annotations(&self, annotations: BufferChain) {
        let installed = self.new_annotations.set(annotations).is_ok();
        assert!(installed, "delivery annotations already replaced on content {}", self.id);
        debug!(content = self.id, "replacement delivery annotations installed");
    }

    pub fn new_annotations(&self) -> Option<&BufferChain> {
        self.new_annotations.get()
    }

    /// Decode the delivery-annotations map once and share the result
    ///
    /// The section must already be located; a failed decode is not cached.
    pub fn decoded_annotations(&self) -> ProtocolResult<Option<Arc<AnnotationMap>>> {
        if let Some(map) = self.annotations.get() {
            return Ok(Some(Arc::clone(map)));
        }

        let Some(location) = self.field_location(MessageField::DeliveryAnnotations)? else {
            return Ok(None);
        };
        let map = self.annotations.get_or_try_init(|| {
            let chain = self.chain.read();
            decode_map(&chain.buffers, &location, Section::DeliveryAnnotations).map(Arc::new)
        })?;
        Ok(Some(Arc::clone(map)))
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MessageContent {
    fn drop(&mut self) {
        let bytes = self.chain.get_mut().buffers.byte_len();
        trace!(content = self.id, bytes, "message content freed");
    }
}
