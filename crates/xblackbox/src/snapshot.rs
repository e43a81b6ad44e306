//! Per-tick value snapshot.
//!
//! A snapshot holds the current value of every catalog slot in three
//! type-segregated buffers. It is rebuilt from scratch on each capture tick
//! and then drained, in catalog order, by the frame encoder.

use tracing::warn;

use crate::catalog::{ParameterCatalog, SlotCounts, ValueKind};
use crate::telemetry::TelemetrySource;

/// Coerce a non-finite float to `0.0`.
#[must_use]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// One frame value, borrowed from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// A float slot.
    Float(f32),
    /// An integer slot.
    Int(i32),
    /// A string slot.
    Str(&'a str),
}

/// Current values for every catalog slot.
#[derive(Debug, Clone, Default)]
pub struct ValueSnapshot {
    floats: Vec<f32>,
    ints: Vec<i32>,
    strings: Vec<String>,
}

impl ValueSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty snapshot sized for a catalog.
    #[must_use]
    pub fn with_capacity(counts: SlotCounts) -> Self {
        Self {
            floats: Vec::with_capacity(counts.floats),
            ints: Vec::with_capacity(counts.ints),
            strings: Vec::with_capacity(counts.strings),
        }
    }

    /// Drop all buffered values and resize for a new catalog.
    pub fn reset(&mut self, counts: SlotCounts) {
        *self = Self::with_capacity(counts);
    }

    /// Read every catalog slot from the source, replacing prior contents.
    ///
    /// Array entries produce one read per element. A read the source
    /// cannot satisfy stores the zero value for that slot.
    pub fn capture(&mut self, catalog: &ParameterCatalog, source: &impl TelemetrySource) {
        self.floats.clear();
        self.ints.clear();
        self.strings.clear();

        for entry in catalog {
            let def = &entry.definition;
            for index in 0..def.slots() {
                match def.kind {
                    ValueKind::Float => {
                        let value = source.read_float(entry.handle, index).unwrap_or(0.0);
                        self.floats.push(sanitize(value));
                    }
                    ValueKind::Int => {
                        self.ints
                            .push(source.read_int(entry.handle, index).unwrap_or(0));
                    }
                    ValueKind::String => {
                        self.strings
                            .push(source.read_string(entry.handle, index).unwrap_or_default());
                    }
                }
            }
        }
    }

    /// Captured float values in catalog order.
    #[must_use]
    pub fn floats(&self) -> &[f32] {
        &self.floats
    }

    /// Captured integer values in catalog order.
    #[must_use]
    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    /// Captured string values in catalog order.
    #[must_use]
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Walk the snapshot in catalog slot order.
    ///
    /// Always yields exactly one value per catalog slot. If a buffer runs
    /// short, a zero filler is yielded and a warning is logged.
    #[must_use]
    pub fn values<'a>(&'a self, catalog: &'a ParameterCatalog) -> FrameValues<'a> {
        FrameValues {
            snapshot: self,
            catalog,
            entry: 0,
            element: 0,
            float_idx: 0,
            int_idx: 0,
            string_idx: 0,
        }
    }
}

/// Iterator over a snapshot in catalog slot order. See [`ValueSnapshot::values`].
#[derive(Debug)]
pub struct FrameValues<'a> {
    snapshot: &'a ValueSnapshot,
    catalog: &'a ParameterCatalog,
    entry: usize,
    element: usize,
    float_idx: usize,
    int_idx: usize,
    string_idx: usize,
}

impl<'a> Iterator for FrameValues<'a> {
    type Item = Value<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let snapshot: &'a ValueSnapshot = self.snapshot;
        let catalog: &'a ParameterCatalog = self.catalog;
        let entry = catalog.entries().get(self.entry)?;
        let def = &entry.definition;

        let value = match def.kind {
            ValueKind::Float => {
                let v = snapshot.floats.get(self.float_idx).copied();
                self.float_idx += 1;
                Value::Float(v.unwrap_or_else(|| underrun(def.name, 0.0)))
            }
            ValueKind::Int => {
                let v = snapshot.ints.get(self.int_idx).copied();
                self.int_idx += 1;
                Value::Int(v.unwrap_or_else(|| underrun(def.name, 0)))
            }
            ValueKind::String => {
                let v = snapshot.strings.get(self.string_idx);
                self.string_idx += 1;
                Value::Str(v.map_or_else(|| underrun(def.name, ""), String::as_str))
            }
        };

        self.element += 1;
        if self.element >= def.slots() {
            self.element = 0;
            self.entry += 1;
        }
        Some(value)
    }
}

fn underrun<T>(channel: &str, filler: T) -> T {
    warn!(channel, "Snapshot buffer exhausted, writing filler value");
    filler
}
