//! # Incremental Section Parser
//!
//! ## Purpose
//!
//! Locates the top-level sections of a message on demand. Parsing resumes from
//! the last committed cursor, so repeated requests for increasing depths walk
//! each byte of the chain once in total.
//!
//! ## Section Order
//!
//! ```text
//! header → delivery-annotations → message-annotations → properties
//!        → application-properties → body (data | sequence | value) → footer
//! ```
//!
//! Every section is optional. A section is recognized by its descriptor (long
//! or short form) followed by a value tag from the section's expected set.
//! The walk is driven by [`SECTION_RULES`]; a depth is committed once every
//! rule belonging to it has been tried.
//!
//! ## Partial Data
//!
//! The parser never reads past the chain's written bytes. Running out of bytes
//! on a message that is still arriving yields [`DepthStatus::NeedMoreData`]
//! and leaves the committed depth untouched; on a complete message the same
//! condition is a malformed-message error.

use crate::error::{ProtocolError, ProtocolResult};
use crate::traverse::{read_be, read_octet, traverse_field};
use tracing::{debug, trace, warn};
use types::{tags, BufferChain, Cursor, Depth, FieldLocation, FieldState, MessageField, PropertyField, Section};

/// Outcome of a depth check that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthStatus {
    /// The requested depth has been validated
    Reached,
    /// The message is still arriving and the bytes so far end before the
    /// requested depth could be decided
    NeedMoreData,
}

/// Location slots filled by the section walk
const HEADER: usize = 0;
const DELIVERY_ANNOTATIONS: usize = 1;
const MESSAGE_ANNOTATIONS: usize = 2;
const PROPERTIES: usize = 3;
const APPLICATION_PROPERTIES: usize = 4;
const BODY: usize = 5;
const FOOTER: usize = 6;
const SLOT_COUNT: usize = 7;

/// One step of the section walk
#[derive(Debug, Clone, Copy)]
pub struct SectionRule {
    pub section: Section,
    slot: usize,
}

/// The walk, in wire order. Body rules share one slot and one depth; the first
/// body form that matches wins.
pub const SECTION_RULES: [SectionRule; 9] = [
    SectionRule { section: Section::Header, slot: HEADER },
    SectionRule { section: Section::DeliveryAnnotations, slot: DELIVERY_ANNOTATIONS },
    SectionRule { section: Section::MessageAnnotations, slot: MESSAGE_ANNOTATIONS },
    SectionRule { section: Section::Properties, slot: PROPERTIES },
    SectionRule { section: Section::ApplicationProperties, slot: APPLICATION_PROPERTIES },
    SectionRule { section: Section::BodyData, slot: BODY },
    SectionRule { section: Section::BodySequence, slot: BODY },
    SectionRule { section: Section::BodyValue, slot: BODY },
    SectionRule { section: Section::Footer, slot: FOOTER },
];

fn section_slot(field: MessageField) -> Option<usize> {
    match field {
        MessageField::Header => Some(HEADER),
        MessageField::DeliveryAnnotations => Some(DELIVERY_ANNOTATIONS),
        MessageField::MessageAnnotations => Some(MESSAGE_ANNOTATIONS),
        MessageField::Properties => Some(PROPERTIES),
        MessageField::ApplicationProperties => Some(APPLICATION_PROPERTIES),
        MessageField::Body => Some(BODY),
        MessageField::Footer => Some(FOOTER),
        _ => None,
    }
}

enum PatternMatch {
    NoMatch,
    /// Cursor just past the descriptor
    Matched(Cursor),
}

fn match_pattern(chain: &BufferChain, start: Cursor, pattern: &[u8], complete: bool) -> ProtocolResult<PatternMatch> {
    let mut cursor = start;
    for &expected in pattern {
        match chain.next_octet(cursor) {
            Some((octet, next)) if octet == expected => cursor = next,
            Some(_) => return Ok(PatternMatch::NoMatch),
            // A complete message that ends here simply lacks the section
            None if complete => return Ok(PatternMatch::NoMatch),
            None => return Err(ProtocolError::truncated(chain.position(cursor), "section descriptor")),
        }
    }
    Ok(PatternMatch::Matched(cursor))
}

/// Try to recognize `section` at `start`
///
/// Returns `Ok(None)` without consuming anything when neither descriptor form
/// matches. On a match the whole section is validated to be present and the
/// cursor past it is returned alongside its location.
pub fn match_section(
    chain: &BufferChain,
    start: Cursor,
    section: Section,
    complete: bool,
) -> ProtocolResult<Option<(FieldLocation, Cursor)>> {
    let long = section.long_descriptor();
    let short = section.short_descriptor();

    for pattern in [&long[..], &short[..]] {
        let after = match match_pattern(chain, start, pattern, complete)? {
            PatternMatch::NoMatch => continue,
            PatternMatch::Matched(after) => after,
        };

        let (tag, _) = read_octet(chain, after, "section value tag")?;
        if !section.expected_tags().contains(tag) {
            return Err(ProtocolError::UnexpectedTag {
                section,
                tag,
                offset: chain.position(after),
            });
        }

        let (value, end) = traverse_field(chain, after)?;
        let location = FieldLocation {
            cursor: start,
            length: pattern.len() + value.length,
            hdr_length: pattern.len() + value.hdr_length,
            tag,
        };
        return Ok(Some((location, end)));
    }

    Ok(None)
}

/// Cached walk over the properties list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PropertiesWalk {
    fields: [FieldState; PropertyField::COUNT],
    /// Next unvisited element, once the list header has been read
    cursor: Option<Cursor>,
    next_index: usize,
    count: usize,
}

/// Mutable parse state of one message content
///
/// Callers serialize access (the message content keeps it behind a mutex).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseState {
    cursor: Cursor,
    /// Cursor at the last depth commit
    committed: Cursor,
    depth: Depth,
    sections: [FieldState; SLOT_COUNT],
    body_section: Option<Section>,
    properties: PropertiesWalk,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deepest committed depth
    #[inline]
    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Where the next section walk resumes
    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Which body form was found, once the body depth is committed
    pub fn body_section(&self) -> Option<Section> {
        if self.depth < Depth::Body {
            return None;
        }
        self.body_section
    }

    /// Parse state of a top-level section; `Unparsed` for scalar fields
    ///
    /// Sections located past the committed depth stay `Unparsed` until their
    /// depth commits, since a later byte may still reject them.
    pub fn section_state(&self, field: MessageField) -> FieldState {
        match section_slot(field) {
            Some(slot) if self.is_committed(slot) => self.sections[slot],
            _ => FieldState::Unparsed,
        }
    }

    fn is_committed(&self, slot: usize) -> bool {
        SECTION_RULES
            .iter()
            .find(|rule| rule.slot == slot)
            .map_or(false, |rule| rule.section.depth() <= self.depth)
    }

    /// Parse `chain` until `depth` is validated
    ///
    /// `complete` tells whether the transport has delivered the whole message.
    pub fn check(&mut self, chain: &BufferChain, complete: bool, depth: Depth) -> ProtocolResult<DepthStatus> {
        if depth <= self.depth {
            return Ok(DepthStatus::Reached);
        }

        if chain.is_empty() {
            return if complete {
                Err(ProtocolError::EmptyMessage)
            } else {
                Ok(DepthStatus::NeedMoreData)
            };
        }

        match self.advance_to(chain, complete, depth) {
            Ok(()) => Ok(DepthStatus::Reached),
            Err(error) if error.is_truncation() && !complete => {
                trace!(requested = ?depth, committed = ?self.depth, "waiting for more message data");
                Ok(DepthStatus::NeedMoreData)
            }
            Err(error) => {
                warn!(requested = ?depth, committed = ?self.depth, %error, "message failed section validation");
                self.rollback();
                Err(error)
            }
        }
    }

    /// Forget sections located past the committed depth
    fn rollback(&mut self) {
        let committed_depth = self.depth;
        self.cursor = self.committed;
        for rule in SECTION_RULES.iter().filter(|rule| rule.section.depth() > committed_depth) {
            self.sections[rule.slot] = FieldState::Unparsed;
        }
        if self.depth < Depth::Body {
            self.body_section = None;
        }
    }

    fn advance_to(&mut self, chain: &BufferChain, complete: bool, target: Depth) -> ProtocolResult<()> {
        let mut index = 0;
        while let Some(rule) = SECTION_RULES.get(index) {
            let depth = rule.section.depth();
            if depth > target {
                break;
            }

            if depth > self.depth {
                let body_found = rule.section.is_body() && self.sections[rule.slot].is_present();
                if !body_found {
                    if let Some((location, end)) = match_section(chain, self.cursor, rule.section, complete)? {
                        if self.sections[rule.slot].is_present() {
                            return Err(ProtocolError::DuplicateSection {
                                section: rule.section,
                                offset: chain.position(self.cursor),
                            });
                        }

                        trace!(section = ?rule.section, offset = chain.position(self.cursor), length = location.length, "section located");
                        self.sections[rule.slot] = FieldState::Present(location);
                        self.cursor = end;
                        if rule.section.is_body() {
                            self.body_section = Some(rule.section);
                        } else {
                            // Probe the same rule again so a repeated section is caught
                            continue;
                        }
                    }
                }

                let closes_depth = SECTION_RULES
                    .get(index + 1)
                    .map_or(true, |next| next.section.depth() != depth);
                if closes_depth {
                    if !self.sections[rule.slot].is_present() {
                        self.sections[rule.slot] = FieldState::Absent;
                    }
                    self.depth = depth;
                    self.committed = self.cursor;
                    debug!(depth = ?depth, offset = chain.position(self.cursor), "parse depth committed");
                }
            }

            index += 1;
        }

        Ok(())
    }

    /// Location of a section or property field
    ///
    /// Sections report what the walk has found so far. Property fields need the
    /// properties section to be located; otherwise `Ok(None)` is returned.
    pub fn field(&mut self, chain: &BufferChain, field: MessageField) -> ProtocolResult<Option<FieldLocation>> {
        match field.property() {
            Some(property) => self.property(chain, property),
            None => Ok(self.section_state(field).location()),
        }
    }

    /// Resolve one scalar of the properties list, caching every element passed
    ///
    /// Nothing is resolved until the properties depth has been committed.
    pub fn property(&mut self, chain: &BufferChain, field: PropertyField) -> ProtocolResult<Option<FieldLocation>> {
        if self.depth < Depth::Properties {
            return Ok(None);
        }

        let index = field.index();
        let cached = self.properties.fields[index];
        if cached.is_resolved() {
            return Ok(cached.location());
        }

        let section = match self.sections[PROPERTIES] {
            FieldState::Present(section) => section,
            FieldState::Absent => {
                self.properties.fields = [FieldState::Absent; PropertyField::COUNT];
                return Ok(None);
            }
            FieldState::Unparsed => return Ok(None),
        };
        let section_end = chain.position(section.cursor) + section.length;
        let walk = &mut self.properties;

        let mut cursor = match walk.cursor {
            Some(cursor) => cursor,
            None => {
                let payload = chain
                    .advance(section.cursor, section.hdr_length)
                    .ok_or_else(|| ProtocolError::truncated(chain.position(section.cursor), "properties list"))?;
                let (count, cursor) = match section.tag {
                    tags::LIST0 => (0, payload),
                    tags::LIST8 => read_be(chain, payload, 1, "properties element count")?,
                    _ => read_be(chain, payload, 4, "properties element count")?,
                };
                if chain.position(cursor) > section_end {
                    return Err(ProtocolError::FieldOverrun {
                        section: Section::Properties,
                        offset: chain.position(payload),
                        section_end,
                    });
                }
                walk.count = count;
                walk.cursor = Some(cursor);
                cursor
            }
        };

        if index >= walk.count {
            for state in walk.fields.iter_mut().skip(walk.count) {
                *state = FieldState::Absent;
            }
            return Ok(None);
        }

        while walk.next_index <= index {
            let (element, end) = traverse_field(chain, cursor)?;
            if chain.position(end) > section_end {
                return Err(ProtocolError::FieldOverrun {
                    section: Section::Properties,
                    offset: chain.position(cursor),
                    section_end,
                });
            }

            walk.fields[walk.next_index] = if element.tag == tags::NULL {
                FieldState::Absent
            } else {
                FieldState::Present(element)
            };
            walk.next_index += 1;
            cursor = end;
            walk.cursor = Some(cursor);
        }

        Ok(walk.fields[index].location())
    }
}
