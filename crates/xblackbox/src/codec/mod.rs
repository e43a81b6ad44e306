//! Binary trace format.
//!
//! A trace is a header with an embedded schema, a stream of marker-tagged
//! frames, and a footer. Every multi-byte number is fixed-width little-endian.
//!
//! ```text
//! header   "XFDR" u16:version u8:level f32:interval u64:start_time
//!          [location:departure location:arrival]   (version 2 only)
//!          u16:count { u16:len name u8:kind u8:array_size } * count
//! frame    "DATA" f32:timestamp value * slots
//! footer   "ENDR" u32:frames u64:end_time
//!
//! location u8:valid [u8; 8]:code [u8; 48]:name f64:lat f64:lon
//! value    f32 | i32 | u8:len bytes
//! ```
//!
//! Location blocks are fixed width so the arrival block can be overwritten in
//! place when a session ends.

mod reader;
mod writer;

pub use reader::{read_trace, DecodedFrame, DecodedTrace, FrameValue, TraceFooter};
pub use writer::TraceWriter;

use serde::Serialize;

use crate::catalog::{ParameterCatalog, RecordingLevel, ValueKind};
use crate::location::LocationRecord;

/// File magic.
pub const MAGIC: [u8; 4] = *b"XFDR";
/// Marker preceding every frame.
pub const FRAME_MARKER: [u8; 4] = *b"DATA";
/// Marker preceding the footer.
pub const FOOTER_MARKER: [u8; 4] = *b"ENDR";
/// Format version written by this crate.
pub const FORMAT_VERSION: u16 = 2;
/// File extension for traces.
pub const FILE_EXTENSION: &str = "xdr";

/// Longest string value that fits in a frame.
pub const MAX_STRING_LEN: usize = 255;
/// Width of the code field in a location block.
pub const LOCATION_CODE_LEN: usize = 8;
/// Width of the name field in a location block.
pub const LOCATION_NAME_LEN: usize = 48;
/// Encoded size of a location block.
pub const LOCATION_BLOCK_LEN: usize = 1 + LOCATION_CODE_LEN + LOCATION_NAME_LEN + 8 + 8;
/// Encoded size of the footer.
pub const FOOTER_LEN: usize = 4 + 4 + 8;
/// Byte offset of the departure block in a version 2 header.
pub const DEPARTURE_OFFSET: u64 = 4 + 2 + 1 + 4 + 8;
/// Byte offset of the arrival block in a version 2 header.
pub const ARRIVAL_OFFSET: u64 = DEPARTURE_OFFSET + LOCATION_BLOCK_LEN as u64;

/// Size of the in-memory write buffer.
pub const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;
/// Frames between explicit flushes.
pub const FLUSH_INTERVAL_FRAMES: u32 = 10;

/// One schema entry in a trace header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEntry {
    /// Channel name.
    pub name: String,
    /// Value type.
    pub kind: ValueKind,
    /// Elements per frame, 0 for a scalar.
    pub array_size: u8,
}

impl SchemaEntry {
    /// Values this entry contributes to each frame.
    #[must_use]
    pub fn slots(&self) -> usize {
        usize::from(self.array_size.max(1))
    }
}

/// Decoded or to-be-written trace header.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceHeader {
    /// Format version.
    pub version: u16,
    /// Recording level the catalog was built at.
    pub level: RecordingLevel,
    /// Capture interval in seconds.
    pub interval: f32,
    /// Session start, unix seconds.
    pub start_time: u64,
    /// Departure airport. Always invalid in version 1 traces.
    pub departure: LocationRecord,
    /// Arrival airport. Invalid until the session is stopped.
    pub arrival: LocationRecord,
    /// One entry per catalog channel, in frame order.
    pub schema: Vec<SchemaEntry>,
}

impl TraceHeader {
    /// Header for a new session over `catalog`.
    #[must_use]
    pub fn for_catalog(
        catalog: &ParameterCatalog,
        interval: f32,
        start_time: u64,
        departure: LocationRecord,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            level: catalog.level(),
            interval,
            start_time,
            departure,
            arrival: LocationRecord::invalid(),
            schema: catalog
                .iter()
                .map(|entry| SchemaEntry {
                    name: entry.definition.name.to_string(),
                    kind: entry.definition.kind,
                    array_size: entry.definition.array_size,
                })
                .collect(),
        }
    }

    /// Flattened value slots per frame.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.schema.iter().map(SchemaEntry::slots).sum()
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
