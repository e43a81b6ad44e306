//! Parameter catalog.
//!
//! The catalog is the ordered list of channels the recorder samples. It is
//! built from a recording level whose tiers are cumulative, and only holds
//! channels the telemetry source could resolve. Catalog order is the order
//! values are written to every frame of a trace.

mod channels;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::telemetry::{ChannelHandle, TelemetrySource};

pub use channels::{MAX_BATTERIES, MAX_ENGINES, MAX_GENERATORS, MAX_LANDING_GEAR};

/// Recording detail level. Each level includes every lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecordingLevel {
    /// Position, attitude, speeds and load factors.
    Simple = 1,
    /// Adds controls, gear, engines, weight and ground contact.
    Normal = 2,
    /// Adds avionics, systems, environment and failures.
    Detailed = 3,
}

impl RecordingLevel {
    /// All levels, lowest first.
    pub const ALL: [RecordingLevel; 3] = [Self::Simple, Self::Normal, Self::Detailed];

    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Normal => "Normal",
            Self::Detailed => "Detailed",
        }
    }

    /// The tiers included at this level, lowest first.
    pub fn tiers(self) -> impl Iterator<Item = RecordingLevel> {
        Self::ALL.into_iter().filter(move |tier| *tier <= self)
    }
}

impl fmt::Display for RecordingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl TryFrom<u8> for RecordingLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Simple),
            2 => Ok(Self::Normal),
            3 => Ok(Self::Detailed),
            other => Err(format!("recording level must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<RecordingLevel> for u8 {
    fn from(level: RecordingLevel) -> Self {
        level as u8
    }
}

/// The value type of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// Short UTF-8 string.
    String,
}

impl ValueKind {
    /// The schema tag written to trace headers.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Float => 0,
            Self::Int => 1,
            Self::String => 2,
        }
    }

    /// Parse a schema tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Float),
            1 => Some(Self::Int),
            2 => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::String => write!(f, "string"),
        }
    }
}

/// A declared, recordable channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDefinition {
    /// Channel name, unique across all tiers.
    pub name: &'static str,
    /// Short description for listings.
    pub description: &'static str,
    /// The tier that declares this channel.
    pub tier: RecordingLevel,
    /// Value type.
    pub kind: ValueKind,
    /// Number of elements, 0 for a scalar.
    pub array_size: u8,
}

impl ParameterDefinition {
    /// Number of values this definition contributes to each frame.
    #[must_use]
    pub fn slots(&self) -> usize {
        usize::from(self.array_size.max(1))
    }

    /// Resolve this definition against a telemetry source.
    pub fn resolve(self, source: &impl TelemetrySource) -> Option<CatalogEntry> {
        source
            .resolve(self.name)
            .map(|handle| CatalogEntry {
                definition: self,
                handle,
            })
    }
}

/// Every declared definition for a level, in serialization order, whether or
/// not a source supports it.
pub fn declared(level: RecordingLevel) -> impl Iterator<Item = ParameterDefinition> {
    level.tiers().flat_map(|tier| {
        channels::tier_table(tier)
            .iter()
            .map(move |decl| ParameterDefinition {
                name: decl.name,
                description: decl.description,
                tier,
                kind: decl.kind,
                array_size: decl.array_size,
            })
    })
}

/// A definition together with its live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// The declared channel.
    pub definition: ParameterDefinition,
    /// Handle resolved from the telemetry source.
    pub handle: ChannelHandle,
}

/// Flattened value slot counts, per value kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotCounts {
    /// Float slots per frame.
    pub floats: usize,
    /// Integer slots per frame.
    pub ints: usize,
    /// String slots per frame.
    pub strings: usize,
}

impl SlotCounts {
    /// Total slots per frame.
    #[must_use]
    pub fn total(&self) -> usize {
        self.floats + self.ints + self.strings
    }
}

/// The ordered, resolved set of channels recorded at one level.
#[derive(Debug, Clone)]
pub struct ParameterCatalog {
    level: RecordingLevel,
    entries: Vec<CatalogEntry>,
}

impl ParameterCatalog {
    /// Build the catalog for a level.
    ///
    /// Definitions the source cannot resolve are left out; that is normal
    /// for aircraft that don't model a system.
    pub fn build(level: RecordingLevel, source: &impl TelemetrySource) -> Self {
        let mut catalog = Self {
            level,
            entries: Vec::new(),
        };
        catalog.load(source);
        catalog
    }

    /// Clear and rebuild the catalog, optionally at a new level.
    ///
    /// The caller must not have a session open.
    pub fn reload(&mut self, level: RecordingLevel, source: &impl TelemetrySource) {
        info!(level = %level, "Reloading parameter catalog");
        self.level = level;
        self.entries.clear();
        self.load(source);
    }

    fn load(&mut self, source: &impl TelemetrySource) {
        let mut skipped = 0usize;
        for definition in declared(self.level) {
            if let Some(entry) = definition.resolve(source) {
                self.entries.push(entry);
            } else {
                debug!(channel = definition.name, "Channel unavailable, skipping");
                skipped += 1;
            }
        }

        let counts = self.slot_counts();
        info!(
            level = %self.level,
            channels = self.entries.len(),
            skipped,
            floats = counts.floats,
            ints = counts.ints,
            strings = counts.strings,
            "Parameter catalog built"
        );
    }

    /// The level this catalog was built for.
    #[must_use]
    pub fn level(&self) -> RecordingLevel {
        self.level
    }

    /// Number of resolved channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no channel resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The resolved entries, in serialization order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Iterate the resolved entries in serialization order.
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    /// Position of a channel in the catalog.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.definition.name == name)
    }

    /// Flattened slot counts per value kind.
    #[must_use]
    pub fn slot_counts(&self) -> SlotCounts {
        let mut counts = SlotCounts::default();
        for entry in &self.entries {
            let n = entry.definition.slots();
            match entry.definition.kind {
                ValueKind::Float => counts.floats += n,
                ValueKind::Int => counts.ints += n,
                ValueKind::String => counts.strings += n,
            }
        }
        counts
    }
}

impl<'a> IntoIterator for &'a ParameterCatalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
