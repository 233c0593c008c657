//! Fixed-Capacity Buffers and Buffer Chains
//!
//! ## Purpose
//!
//! Message content is stored as a chain of fixed-capacity buffers. The receive
//! path appends bytes to the tail buffer and grows the chain one buffer at a
//! time; every other component only reads bytes below the tail's write cursor.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Buffer 0     │──>│ Buffer 1     │──>│ Buffer 2     │
//! │ full (cap)   │   │ full (cap)   │   │ len < cap    │ <- write cursor
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Positions inside a chain are [`Cursor`] values (buffer index + offset).
//! Buffers are only ever appended (or an empty tail removed), so a cursor
//! handed out once stays valid for the lifetime of the chain.

use thiserror::Error;

/// Default buffer capacity for received and composed content
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// Errors raised while allocating or filling buffers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The allocator refused the reservation
    #[error("Buffer allocation failed: could not reserve {capacity} bytes")]
    AllocationFailed { capacity: usize },

    /// Zero-capacity buffers would never make progress
    #[error("Buffer capacity must be non-zero")]
    ZeroCapacity,

    /// More bytes were committed than the buffer has room for
    #[error("Buffer overrun: committed {requested} bytes with only {remaining} free")]
    Overrun { requested: usize, remaining: usize },
}

/// A fixed-capacity byte block with a write cursor
pub struct Buffer {
    data: Box<[u8]>,
    len: usize,
}

impl Buffer {
    /// Allocate an empty buffer of the given capacity
    ///
    /// Allocation is fallible: a refused reservation is reported instead of
    /// aborting the process.
    pub fn allocate(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| BufferError::AllocationFailed { capacity })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            len: 0,
        })
    }

    /// Total capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes (the write cursor)
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space behind the write cursor
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// The valid bytes of this buffer
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Writable region behind the write cursor
    ///
    /// Bytes written here become visible only after [`Buffer::commit`].
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Advance the write cursor over `n` bytes written into [`Buffer::spare_mut`]
    pub fn commit(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.remaining() {
            return Err(BufferError::Overrun {
                requested: n,
                remaining: self.remaining(),
            });
        }
        self.len += n;
        Ok(())
    }

    /// Copy as much of `bytes` as fits; returns the number of bytes taken
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.remaining());
        self.data[self.len..self.len + take].copy_from_slice(&bytes[..take]);
        self.len += take;
        take
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A position in a buffer chain
///
/// `offset` may equal the buffer's length, meaning "just past the last byte of
/// this buffer"; readers step over to the next buffer lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cursor {
    pub buffer: usize,
    pub offset: usize,
}

impl Cursor {
    pub const START: Cursor = Cursor { buffer: 0, offset: 0 };

    pub const fn new(buffer: usize, offset: usize) -> Self {
        Self { buffer, offset }
    }
}

/// An ordered sequence of buffers holding one logical byte stream
#[derive(Debug, Default)]
pub struct BufferChain {
    buffers: Vec<Buffer>,
}

impl BufferChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `bytes` into a fresh chain of `capacity`-sized buffers
    pub fn from_slice(bytes: &[u8], capacity: usize) -> Result<Self, BufferError> {
        let mut chain = Self::new();
        chain.extend_from_slice(bytes, capacity)?;
        Ok(chain)
    }

    /// Append `bytes`, filling the tail first and allocating as needed
    pub fn extend_from_slice(&mut self, mut bytes: &[u8], capacity: usize) -> Result<(), BufferError> {
        while !bytes.is_empty() {
            let needs_buffer = self.buffers.last().map_or(true, Buffer::is_full);
            if needs_buffer {
                self.buffers.push(Buffer::allocate(capacity)?);
            }
            if let Some(tail) = self.buffers.last_mut() {
                let taken = tail.fill_from(bytes);
                bytes = &bytes[taken..];
            }
        }
        Ok(())
    }

    /// Link a buffer at the tail of the chain
    pub fn append(&mut self, buffer: Buffer) {
        self.buffers.push(buffer);
    }

    /// The tail buffer, after appending a fresh one if the tail is full or
    /// the chain is empty
    pub fn writable_tail(&mut self, capacity: usize) -> Result<&mut Buffer, BufferError> {
        if self.buffers.last().map_or(true, Buffer::is_full) {
            self.buffers.push(Buffer::allocate(capacity)?);
        }
        let index = self.buffers.len() - 1;
        Ok(&mut self.buffers[index])
    }

    /// Remove the tail buffer if it holds no bytes
    ///
    /// Returns `true` when a buffer was removed.
    pub fn trim_empty_tail(&mut self) -> bool {
        if self.buffers.last().is_some_and(Buffer::is_empty) {
            self.buffers.pop();
            return true;
        }
        false
    }

    pub fn get(&self, index: usize) -> Option<&Buffer> {
        self.buffers.get(index)
    }

    /// Number of buffers in the chain
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Buffer> {
        self.buffers.iter()
    }

    /// Total number of valid bytes across all buffers
    pub fn byte_len(&self) -> usize {
        self.buffers.iter().map(Buffer::len).sum()
    }

    /// True when the chain holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(Buffer::is_empty)
    }

    /// Materialize the whole chain into one vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for buffer in &self.buffers {
            out.extend_from_slice(buffer.as_slice());
        }
        out
    }

    /// Absolute byte position of a cursor from the start of the chain
    pub fn position(&self, cursor: Cursor) -> usize {
        self.buffers
            .iter()
            .take(cursor.buffer)
            .map(Buffer::len)
            .sum::<usize>()
            + cursor.offset
    }

    /// Read the octet at `cursor` and return it with the cursor just past it
    ///
    /// Returns `None` when no byte has been written at that position yet.
    pub fn next_octet(&self, mut cursor: Cursor) -> Option<(u8, Cursor)> {
        loop {
            let data = self.buffers.get(cursor.buffer)?.as_slice();
            if let Some(&octet) = data.get(cursor.offset) {
                return Some((octet, Cursor::new(cursor.buffer, cursor.offset + 1)));
            }
            cursor = Cursor::new(cursor.buffer + 1, 0);
        }
    }

    /// Move `cursor` forward by exactly `consume` bytes
    ///
    /// Returns `None` if the chain ends before `consume` bytes are available.
    pub fn advance(&self, cursor: Cursor, consume: usize) -> Option<Cursor> {
        self.advance_with(cursor, consume, |_| {})
    }

    /// Move `cursor` forward by `consume` bytes, handing each contiguous span
    /// to `visit` as it is crossed
    ///
    /// Spans are visited in order even when the chain turns out to be too
    /// short; in that case `None` is returned after the last available span.
    pub fn advance_with<F>(&self, mut cursor: Cursor, mut consume: usize, mut visit: F) -> Option<Cursor>
    where
        F: FnMut(&[u8]),
    {
        while consume > 0 {
            let data = self.buffers.get(cursor.buffer)?.as_slice();
            let available = data.len().saturating_sub(cursor.offset);
            if available == 0 {
                cursor = Cursor::new(cursor.buffer + 1, 0);
                continue;
            }

            let take = available.min(consume);
            visit(&data[cursor.offset..cursor.offset + take]);
            cursor.offset += take;
            consume -= take;
        }
        Some(cursor)
    }

    /// Contiguous spans from `cursor` to the end of the written data
    pub fn segments_from(&self, cursor: Cursor) -> impl Iterator<Item = &[u8]> + '_ {
        self.buffers
            .iter()
            .enumerate()
            .skip(cursor.buffer)
            .filter_map(move |(index, buffer)| {
                let data = buffer.as_slice();
                let start = if index == cursor.buffer { cursor.offset } else { 0 };
                data.get(start..).filter(|span| !span.is_empty())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(parts: &[&[u8]], capacity: usize) -> BufferChain {
        let mut chain = BufferChain::new();
        for part in parts {
            let mut buffer = Buffer::allocate(capacity).unwrap();
            assert_eq!(buffer.fill_from(part), part.len());
            chain.append(buffer);
        }
        chain
    }

    #[test]
    fn test_allocate_rejects_zero_capacity() {
        assert_eq!(Buffer::allocate(0).unwrap_err(), BufferError::ZeroCapacity);
    }

    #[test]
    fn test_commit_tracks_write_cursor() {
        let mut buffer = Buffer::allocate(8).unwrap();
        buffer.spare_mut()[..3].copy_from_slice(&[1, 2, 3]);
        buffer.commit(3).unwrap();

        assert_eq!(buffer.as_slice(), &[1, 2, 3]);
        assert_eq!(buffer.remaining(), 5);
        assert!(matches!(buffer.commit(6), Err(BufferError::Overrun { requested: 6, remaining: 5 })));
    }

    #[test]
    fn test_from_slice_splits_at_capacity() {
        let bytes: Vec<u8> = (0..10).collect();
        let chain = BufferChain::from_slice(&bytes, 4).unwrap();

        assert_eq!(chain.buffer_count(), 3);
        assert_eq!(chain.get(2).unwrap().as_slice(), &[8, 9]);
        assert_eq!(chain.to_vec(), bytes);
    }

    #[test]
    fn test_advance_crosses_buffers_and_visits_spans() {
        let chain = chain_of(&[&[1, 2, 3], &[4, 5], &[6, 7, 8]], 4);
        let mut spans = Vec::new();

        let cursor = chain
            .advance_with(Cursor::new(0, 1), 5, |span| spans.push(span.to_vec()))
            .unwrap();

        assert_eq!(spans, vec![vec![2, 3], vec![4, 5], vec![6]]);
        assert_eq!(cursor, Cursor::new(2, 1));
        assert_eq!(chain.position(cursor), 6);
    }

    #[test]
    fn test_advance_past_end_returns_none() {
        let chain = chain_of(&[&[1, 2], &[3]], 2);
        assert_eq!(chain.advance(Cursor::START, 3), Some(Cursor::new(1, 1)));
        assert_eq!(chain.advance(Cursor::START, 4), None);
    }

    #[test]
    fn test_next_octet_skips_exhausted_buffers() {
        let chain = chain_of(&[&[1, 2], &[3]], 2);
        let (octet, cursor) = chain.next_octet(Cursor::new(0, 2)).unwrap();
        assert_eq!(octet, 3);
        assert_eq!(cursor, Cursor::new(1, 1));
        assert!(chain.next_octet(cursor).is_none());
    }

    #[test]
    fn test_segments_from_mid_buffer() {
        let chain = chain_of(&[&[1, 2, 3], &[], &[4, 5]], 3);
        let segments: Vec<&[u8]> = chain.segments_from(Cursor::new(0, 2)).collect();
        assert_eq!(segments, vec![&[3][..], &[4, 5][..]]);
    }

    #[test]
    fn test_writable_tail_allocates_when_full() {
        let mut chain = BufferChain::new();
        assert_eq!(chain.writable_tail(2).unwrap().remaining(), 2);
        assert_eq!(chain.buffer_count(), 1);

        chain.writable_tail(2).unwrap().fill_from(&[1, 2]);
        assert_eq!(chain.buffer_count(), 1);
        chain.writable_tail(2).unwrap();
        assert_eq!(chain.buffer_count(), 2);
    }

    #[test]
    fn test_trim_empty_tail_only_removes_empty_buffers() {
        let mut chain = chain_of(&[&[1, 2]], 2);
        assert!(!chain.trim_empty_tail());

        chain.append(Buffer::allocate(2).unwrap());
        assert_eq!(chain.buffer_count(), 2);
        assert!(chain.trim_empty_tail());
        assert_eq!(chain.buffer_count(), 1);
    }
}
