//! Live telemetry source abstraction.
//!
//! The recorder never talks to a simulator directly. It resolves channel names
//! to opaque handles once, when the catalog is built, and reads values through
//! those handles on every capture tick.

use std::collections::HashMap;

/// Opaque handle to a resolved telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u32);

impl ChannelHandle {
    /// Create a handle from a source-specific index.
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The source-specific index behind this handle.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A source of live, named telemetry values.
///
/// Implementors wrap whatever the host simulation exposes. Reads take an
/// element index; scalar channels are read at index 0. A read the source
/// cannot satisfy (index out of range, wrong value type) returns `None`.
pub trait TelemetrySource {
    /// Resolve a channel by name. `None` means the channel is unsupported
    /// in the current context.
    fn resolve(&self, name: &str) -> Option<ChannelHandle>;

    /// Read one floating-point element.
    fn read_float(&self, handle: ChannelHandle, index: usize) -> Option<f32>;

    /// Read one integer element.
    fn read_int(&self, handle: ChannelHandle, index: usize) -> Option<i32>;

    /// Read one string element.
    fn read_string(&self, handle: ChannelHandle, index: usize) -> Option<String>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for &T {
    fn resolve(&self, name: &str) -> Option<ChannelHandle> {
        (**self).resolve(name)
    }

    fn read_float(&self, handle: ChannelHandle, index: usize) -> Option<f32> {
        (**self).read_float(handle, index)
    }

    fn read_int(&self, handle: ChannelHandle, index: usize) -> Option<i32> {
        (**self).read_int(handle, index)
    }

    fn read_string(&self, handle: ChannelHandle, index: usize) -> Option<String> {
        (**self).read_string(handle, index)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ChannelValue {
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    Strings(Vec<String>),
}

/// An in-memory telemetry source.
///
/// Channels are created on first write. Used by the synthetic flight and by
/// tests that need precise control over what the recorder sees.
#[derive(Debug, Clone, Default)]
pub struct TelemetryTable {
    index: HashMap<String, ChannelHandle>,
    values: Vec<ChannelValue>,
}

impl TelemetryTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table has no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if a channel exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Set a scalar float channel.
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.upsert(name, ChannelValue::Floats(vec![value]));
    }

    /// Set a float array channel.
    pub fn set_floats(&mut self, name: &str, values: &[f32]) {
        self.upsert(name, ChannelValue::Floats(values.to_vec()));
    }

    /// Set a scalar integer channel.
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.upsert(name, ChannelValue::Ints(vec![value]));
    }

    /// Set an integer array channel.
    pub fn set_ints(&mut self, name: &str, values: &[i32]) {
        self.upsert(name, ChannelValue::Ints(values.to_vec()));
    }

    /// Set a scalar string channel.
    pub fn set_string(&mut self, name: &str, value: impl Into<String>) {
        self.upsert(name, ChannelValue::Strings(vec![value.into()]));
    }

    fn upsert(&mut self, name: &str, value: ChannelValue) {
        if let Some(handle) = self.index.get(name) {
            self.values[handle.raw() as usize] = value;
            return;
        }
        let handle = ChannelHandle::new(self.values.len() as u32);
        self.values.push(value);
        self.index.insert(name.to_string(), handle);
    }

    fn get(&self, handle: ChannelHandle) -> Option<&ChannelValue> {
        self.values.get(handle.raw() as usize)
    }
}

impl TelemetrySource for TelemetryTable {
    fn resolve(&self, name: &str) -> Option<ChannelHandle> {
        self.index.get(name).copied()
    }

    fn read_float(&self, handle: ChannelHandle, index: usize) -> Option<f32> {
        match self.get(handle)? {
            ChannelValue::Floats(v) => v.get(index).copied(),
            _ => None,
        }
    }

    fn read_int(&self, handle: ChannelHandle, index: usize) -> Option<i32> {
        match self.get(handle)? {
            ChannelValue::Ints(v) => v.get(index).copied(),
            _ => None,
        }
    }

    fn read_string(&self, handle: ChannelHandle, index: usize) -> Option<String> {
        match self.get(handle)? {
            ChannelValue::Strings(v) => v.get(index).cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_channel() {
        let table = TelemetryTable::new();
        assert!(table.resolve("sim/flightmodel/position/latitude").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_and_read_scalars() {
        let mut table = TelemetryTable::new();
        table.set_float("sim/flightmodel/position/groundspeed", 12.5);
        table.set_int("sim/flightmodel/failures/onground_any", 1);
        table.set_string("sim/aircraft/view/acf_ICAO", "C172");

        let gs = table.resolve("sim/flightmodel/position/groundspeed").unwrap();
        let wow = table.resolve("sim/flightmodel/failures/onground_any").unwrap();
        let icao = table.resolve("sim/aircraft/view/acf_ICAO").unwrap();

        assert_eq!(table.read_float(gs, 0), Some(12.5));
        assert_eq!(table.read_int(wow, 0), Some(1));
        assert_eq!(table.read_string(icao, 0).as_deref(), Some("C172"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_array_reads_out_of_range() {
        let mut table = TelemetryTable::new();
        table.set_ints("sim/flightmodel/engine/ENGN_running", &[1, 0]);
        let h = table.resolve("sim/flightmodel/engine/ENGN_running").unwrap();

        assert_eq!(table.read_int(h, 1), Some(0));
        assert_eq!(table.read_int(h, 2), None);
    }

    #[test]
    fn test_wrong_kind_read_is_none() {
        let mut table = TelemetryTable::new();
        table.set_float("sim/time/zulu_time_sec", 3600.0);
        let h = table.resolve("sim/time/zulu_time_sec").unwrap();

        assert_eq!(table.read_int(h, 0), None);
        assert_eq!(table.read_string(h, 0), None);
    }

    #[test]
    fn test_overwrite_keeps_handle() {
        let mut table = TelemetryTable::new();
        table.set_float("sim/flightmodel/position/elevation", 100.0);
        let before = table.resolve("sim/flightmodel/position/elevation").unwrap();
        table.set_float("sim/flightmodel/position/elevation", 250.0);
        let after = table.resolve("sim/flightmodel/position/elevation").unwrap();

        assert_eq!(before, after);
        assert_eq!(table.read_float(after, 0), Some(250.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_source_through_reference() {
        let mut table = TelemetryTable::new();
        table.set_float("sim/flightmodel/position/theta", 2.0);
        let by_ref: &TelemetryTable = &table;
        let h = TelemetrySource::resolve(&by_ref, "sim/flightmodel/position/theta").unwrap();
        assert_eq!(TelemetrySource::read_float(&by_ref, h, 0), Some(2.0));
    }
}
