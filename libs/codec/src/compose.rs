//! # Section Composer
//!
//! ## Purpose
//!
//! Builds encoded message sections for outbound messages and for replacement
//! delivery annotations. Compound values (lists, maps) are composed on a stack
//! so their size prefixes can be written once the contents are known.
//!
//! ## Usage
//!
//! ```text
//! SectionComposer::new()
//!     .start_section(Section::Properties)
//!     .start_list()
//!         .insert_null()              // message-id
//!         .insert_null()              // user-id
//!         .insert_string("queue")     // to
//!     .end_list()
//!     .build(capacity)  → BufferChain
//! ```
//!
//! Sections are written with short descriptors, in wire order. Misuse is
//! recorded on the first offending call and reported by [`SectionComposer::build`],
//! which keeps call chains free of intermediate `?`.

use crate::error::{ProtocolError, ProtocolResult};
use types::{tags, BufferChain, Depth, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compound {
    List,
    Map,
}

#[derive(Debug)]
struct Frame {
    kind: Compound,
    count: usize,
    bytes: Vec<u8>,
}

/// Incremental encoder for top-level message sections
#[derive(Debug, Default)]
pub struct SectionComposer {
    output: Vec<u8>,
    stack: Vec<Frame>,
    /// Section whose descriptor is written but whose value is not
    pending: Option<Section>,
    last_section: Option<Section>,
    error: Option<ProtocolError>,
}

impl SectionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of completed top-level output
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    fn fail(&mut self, error: ProtocolError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Open a section by writing its descriptor; the next value is its body
    pub fn start_section(mut self, section: Section) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !self.stack.is_empty() || self.pending.is_some() {
            self.fail(ProtocolError::composition(format!(
                "{section:?} started before the previous value was finished"
            )));
            return self;
        }

        if let Some(last) = self.last_section {
            let repeated_data = last == Section::BodyData && section == Section::BodyData;
            if section.depth() < last.depth() {
                self.fail(ProtocolError::composition(format!("{section:?} cannot follow {last:?}")));
                return self;
            }
            if section.depth() == last.depth() && !repeated_data {
                self.fail(ProtocolError::DuplicateSection {
                    section,
                    offset: self.output.len(),
                });
                return self;
            }
        }

        self.output.extend_from_slice(&section.short_descriptor());
        self.pending = Some(section);
        self.last_section = Some(section);
        self
    }

    pub fn start_list(mut self) -> Self {
        self.open(Compound::List);
        self
    }

    pub fn end_list(mut self) -> Self {
        self.close(Compound::List);
        self
    }

    pub fn start_map(mut self) -> Self {
        self.open(Compound::Map);
        self
    }

    pub fn end_map(mut self) -> Self {
        self.close(Compound::Map);
        self
    }

    pub fn insert_null(mut self) -> Self {
        self.write_value(tags::NULL, &[]);
        self
    }

    pub fn insert_bool(mut self, value: bool) -> Self {
        self.write_value(if value { tags::TRUE } else { tags::FALSE }, &[]);
        self
    }

    pub fn insert_ubyte(mut self, value: u8) -> Self {
        self.write_value(tags::UBYTE, &[value]);
        self
    }

    pub fn insert_uint(mut self, value: u32) -> Self {
        match value {
            0 => self.write_value(tags::UINT0, &[]),
            1..=255 => self.write_value(tags::SMALLUINT, &[value as u8]),
            _ => self.write_value(tags::UINT, &value.to_be_bytes()),
        }
        self
    }

    pub fn insert_ulong(mut self, value: u64) -> Self {
        match value {
            0 => self.write_value(tags::ULONG0, &[]),
            1..=255 => self.write_value(tags::SMALLULONG, &[value as u8]),
            _ => self.write_value(tags::ULONG, &value.to_be_bytes()),
        }
        self
    }

    pub fn insert_int(mut self, value: i32) -> Self {
        match i8::try_from(value) {
            Ok(small) => self.write_value(tags::SMALLINT, &small.to_be_bytes()),
            Err(_) => self.write_value(tags::INT, &value.to_be_bytes()),
        }
        self
    }

    pub fn insert_long(mut self, value: i64) -> Self {
        match i8::try_from(value) {
            Ok(small) => self.write_value(tags::SMALLLONG, &small.to_be_bytes()),
            Err(_) => self.write_value(tags::LONG, &value.to_be_bytes()),
        }
        self
    }

    /// Milliseconds since the Unix epoch
    pub fn insert_timestamp(mut self, millis: i64) -> Self {
        self.write_value(tags::TIMESTAMP, &millis.to_be_bytes());
        self
    }

    pub fn insert_string(mut self, value: &str) -> Self {
        self.write_sized(tags::STR8, tags::STR32, value.as_bytes());
        self
    }

    pub fn insert_symbol(mut self, value: &str) -> Self {
        self.write_sized(tags::SYM8, tags::SYM32, value.as_bytes());
        self
    }

    pub fn insert_binary(mut self, value: &[u8]) -> Self {
        self.write_sized(tags::VBIN8, tags::VBIN32, value);
        self
    }

    /// Insert the bytes of a whole chain as one binary value
    pub fn insert_binary_chain(mut self, chain: &BufferChain) -> Self {
        let payload = chain.to_vec();
        self.write_sized(tags::VBIN8, tags::VBIN32, &payload);
        self
    }

    /// Finish composing and copy the output into a fresh chain
    pub fn build(self, capacity: usize) -> ProtocolResult<BufferChain> {
        let bytes = self.into_bytes()?;
        Ok(BufferChain::from_slice(&bytes, capacity)?)
    }

    /// Finish composing and return the contiguous encoding
    pub fn into_bytes(self) -> ProtocolResult<Vec<u8>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.stack.is_empty() {
            return Err(ProtocolError::composition(format!(
                "{} compound value(s) left open",
                self.stack.len()
            )));
        }
        if let Some(section) = self.pending {
            return Err(ProtocolError::composition(format!("{section:?} has no value")));
        }
        Ok(self.output)
    }

    /// Depth of the last section written
    pub fn depth(&self) -> Depth {
        self.last_section.map_or(Depth::None, Section::depth)
    }

    fn open(&mut self, kind: Compound) {
        if self.error.is_some() {
            return;
        }
        if self.stack.is_empty() && self.pending.is_none() {
            self.fail(ProtocolError::composition("value written outside a section"));
            return;
        }
        self.stack.push(Frame {
            kind,
            count: 0,
            bytes: Vec::new(),
        });
    }

    fn close(&mut self, kind: Compound) {
        if self.error.is_some() {
            return;
        }
        let frame = match self.stack.pop() {
            Some(frame) if frame.kind == kind => frame,
            Some(frame) => {
                self.fail(ProtocolError::composition(format!(
                    "end of {kind:?} while a {:?} is open",
                    frame.kind
                )));
                return;
            }
            None => {
                self.fail(ProtocolError::composition(format!("end of {kind:?} with nothing open")));
                return;
            }
        };

        if kind == Compound::Map && frame.count % 2 != 0 {
            self.fail(ProtocolError::composition(format!(
                "map closed with {} elements; keys need values",
                frame.count
            )));
            return;
        }

        match encode_compound(&frame) {
            Ok((tag, encoded)) => self.write_value(tag, &encoded),
            Err(error) => self.fail(error),
        }
    }

    fn write_sized(&mut self, tag8: u8, tag32: u8, payload: &[u8]) {
        if let Ok(size) = u8::try_from(payload.len()) {
            let mut encoded = Vec::with_capacity(payload.len() + 1);
            encoded.push(size);
            encoded.extend_from_slice(payload);
            self.write_value(tag8, &encoded);
            return;
        }

        match u32::try_from(payload.len()) {
            Ok(size) => {
                let mut encoded = Vec::with_capacity(payload.len() + 4);
                encoded.extend_from_slice(&size.to_be_bytes());
                encoded.extend_from_slice(payload);
                self.write_value(tag32, &encoded);
            }
            Err(_) => self.fail(ProtocolError::composition(format!(
                "value of {} bytes exceeds the 32-bit size limit",
                payload.len()
            ))),
        }
    }

    /// Append `tag` and its encoded remainder to the innermost open container
    fn write_value(&mut self, tag: u8, encoded: &[u8]) {
        if self.error.is_some() {
            return;
        }

        if let Some(frame) = self.stack.last_mut() {
            frame.bytes.push(tag);
            frame.bytes.extend_from_slice(encoded);
            frame.count += 1;
            return;
        }

        match self.pending.take() {
            Some(section) if section.expected_tags().contains(tag) => {
                self.output.push(tag);
                self.output.extend_from_slice(encoded);
            }
            Some(section) => self.fail(ProtocolError::UnexpectedTag {
                section,
                tag,
                offset: self.output.len(),
            }),
            None => self.fail(ProtocolError::composition("value written outside a section")),
        }
    }
}

/// Pick the narrowest list/map encoding for a finished frame
fn encode_compound(frame: &Frame) -> ProtocolResult<(u8, Vec<u8>)> {
    if frame.kind == Compound::List && frame.count == 0 {
        return Ok((tags::LIST0, Vec::new()));
    }

    let (tag8, tag32) = match frame.kind {
        Compound::List => (tags::LIST8, tags::LIST32),
        Compound::Map => (tags::MAP8, tags::MAP32),
    };

    if frame.bytes.len() < 255 && frame.count <= 255 {
        let mut encoded = Vec::with_capacity(frame.bytes.len() + 2);
        encoded.push((frame.bytes.len() + 1) as u8);
        encoded.push(frame.count as u8);
        encoded.extend_from_slice(&frame.bytes);
        return Ok((tag8, encoded));
    }

    let size = u32::try_from(frame.bytes.len() + 4)
        .map_err(|_| ProtocolError::composition("compound value exceeds the 32-bit size limit"))?;
    let count = u32::try_from(frame.count)
        .map_err(|_| ProtocolError::composition("compound value has too many elements"))?;

    let mut encoded = Vec::with_capacity(frame.bytes.len() + 8);
    encoded.extend_from_slice(&size.to_be_bytes());
    encoded.extend_from_slice(&count.to_be_bytes());
    encoded.extend_from_slice(&frame.bytes);
    Ok((tag32, encoded))
}
