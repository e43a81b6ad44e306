//! Trace decoder.

use std::io::{self, BufReader, Read};
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use super::{
    SchemaEntry, TraceHeader, FOOTER_MARKER, FRAME_MARKER, LOCATION_CODE_LEN, LOCATION_NAME_LEN,
    MAGIC,
};
use crate::catalog::{RecordingLevel, ValueKind};
use crate::error::{Error, Result};
use crate::location::LocationRecord;

/// One decoded frame value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameValue {
    /// A float slot.
    Float(f32),
    /// An integer slot.
    Int(i32),
    /// A string slot.
    Str(String),
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedFrame {
    /// Seconds since the session started.
    pub timestamp: f32,
    /// One value per schema slot.
    pub values: Vec<FrameValue>,
}

/// A decoded footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceFooter {
    /// Frame count recorded by the writer.
    pub frame_count: u32,
    /// Session end, unix seconds.
    pub end_time: u64,
}

/// A fully decoded trace.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTrace {
    /// Header and schema.
    pub header: TraceHeader,
    /// Every complete frame in file order.
    pub frames: Vec<DecodedFrame>,
    /// Footer, absent if the recording was cut short.
    pub footer: Option<TraceFooter>,
}

impl DecodedTrace {
    /// Whether the trace has a footer agreeing with its frames.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.footer
            .is_some_and(|footer| footer.frame_count as usize == self.frames.len())
    }

    /// Timestamp of the last frame.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.frames.last().map_or(0.0, |frame| frame.timestamp)
    }

    /// Value slots occupied by the named channel in every frame.
    #[must_use]
    pub fn slot_range(&self, name: &str) -> Option<Range<usize>> {
        let mut start = 0;
        for entry in &self.header.schema {
            if entry.name == name {
                return Some(start..start + entry.slots());
            }
            start += entry.slots();
        }
        None
    }
}

/// Decode a whole trace.
///
/// A trace that ends without a footer, or in the middle of a frame, decodes
/// with `footer` set to `None` and only the complete frames.
///
/// # Errors
///
/// Returns [`Error::TraceFormat`] for a bad magic, unknown version, unknown
/// level or value kind, invalid UTF-8, an unexpected marker or a truncated
/// header. Other read failures are returned as [`Error::Io`].
pub fn read_trace(reader: impl Read) -> Result<DecodedTrace> {
    let mut input = Input(BufReader::new(reader));
    let header = read_header(&mut input).map_err(|err| decode_error(&err, "header"))?;
    let kinds: Vec<ValueKind> = header
        .schema
        .iter()
        .flat_map(|entry| std::iter::repeat(entry.kind).take(entry.slots()))
        .collect();

    let mut frames = Vec::new();
    let footer = loop {
        let marker = match input.array::<4>() {
            Ok(marker) => marker,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break None,
            Err(err) => return Err(err.into()),
        };
        let result = match marker {
            FRAME_MARKER => read_frame(&mut input, &kinds).map(|frame| {
                frames.push(frame);
                None
            }),
            FOOTER_MARKER => read_footer(&mut input).map(Some),
            other => {
                return Err(Error::trace_format(format!(
                    "unexpected marker {other:02x?} after {} frames",
                    frames.len()
                )));
            }
        };
        match result {
            Ok(Some(footer)) => break Some(footer),
            Ok(None) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                debug!(frames = frames.len(), "Trace ends mid-record");
                break None;
            }
            Err(err) => return Err(decode_error(&err, "frame")),
        }
    };

    debug!(
        version = header.version,
        channels = header.schema.len(),
        frames = frames.len(),
        complete = footer.is_some(),
        "Decoded trace"
    );
    Ok(DecodedTrace {
        header,
        frames,
        footer,
    })
}

fn read_header<R: Read>(input: &mut Input<R>) -> io::Result<TraceHeader> {
    if input.array::<4>()? != MAGIC {
        return Err(invalid_data("bad magic"));
    }
    let version = input.u16()?;
    if !matches!(version, 1 | 2) {
        return Err(invalid_data(format!("unsupported version {version}")));
    }
    let level = RecordingLevel::try_from(input.u8()?).map_err(invalid_data)?;
    let interval = input.f32()?;
    let start_time = input.u64()?;
    let (departure, arrival) = if version >= 2 {
        (read_location(input)?, read_location(input)?)
    } else {
        (LocationRecord::invalid(), LocationRecord::invalid())
    };

    let count = input.u16()?;
    let mut schema = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let len = input.u16()?;
        let name = input.string(usize::from(len))?;
        let tag = input.u8()?;
        let kind = ValueKind::from_tag(tag)
            .ok_or_else(|| invalid_data(format!("unknown value kind {tag} for {name}")))?;
        let array_size = input.u8()?;
        schema.push(SchemaEntry {
            name,
            kind,
            array_size,
        });
    }

    Ok(TraceHeader {
        version,
        level,
        interval,
        start_time,
        departure,
        arrival,
        schema,
    })
}

fn read_location<R: Read>(input: &mut Input<R>) -> io::Result<LocationRecord> {
    Ok(LocationRecord {
        valid: input.u8()? != 0,
        code: input.fixed_string(LOCATION_CODE_LEN)?,
        name: input.fixed_string(LOCATION_NAME_LEN)?,
        latitude: input.f64()?,
        longitude: input.f64()?,
    })
}

fn read_frame<R: Read>(input: &mut Input<R>, kinds: &[ValueKind]) -> io::Result<DecodedFrame> {
    let timestamp = input.f32()?;
    let values = kinds
        .iter()
        .map(|kind| match kind {
            ValueKind::Float => input.f32().map(FrameValue::Float),
            ValueKind::Int => input.i32().map(FrameValue::Int),
            ValueKind::String => {
                let len = input.u8()?;
                input.string(usize::from(len)).map(FrameValue::Str)
            }
        })
        .collect::<io::Result<_>>()?;
    Ok(DecodedFrame { timestamp, values })
}

fn read_footer<R: Read>(input: &mut Input<R>) -> io::Result<TraceFooter> {
    Ok(TraceFooter {
        frame_count: input.u32()?,
        end_time: input.u64()?,
    })
}

struct Input<R>(BufReader<R>);

impl<R: Read> Input<R> {
    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.0.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> io::Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> io::Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> io::Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> io::Result<u64> {
        self.array().map(u64::from_le_bytes)
    }

    fn i32(&mut self) -> io::Result<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> io::Result<f32> {
        self.array().map(f32::from_le_bytes)
    }

    fn f64(&mut self) -> io::Result<f64> {
        self.array().map(f64::from_le_bytes)
    }

    fn string(&mut self, len: usize) -> io::Result<String> {
        let mut buf = vec![0u8; len];
        self.0.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(invalid_data)
    }

    /// Zero-padded field. Padding is stripped.
    fn fixed_string(&mut self, width: usize) -> io::Result<String> {
        let mut buf = vec![0u8; width];
        self.0.read_exact(&mut buf)?;
        let end = buf.iter().position(|b| *b == 0).unwrap_or(width);
        buf.truncate(end);
        String::from_utf8(buf).map_err(invalid_data)
    }
}

fn invalid_data(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn decode_error(err: &io::Error, section: &str) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::trace_format(format!("truncated {section}")),
        io::ErrorKind::InvalidData => Error::trace_format(format!("{section}: {err}")),
        kind => Error::Io(io::Error::new(kind, err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{TraceWriter, FORMAT_VERSION};
    use crate::snapshot::Value;
    use std::io::Cursor;

    fn header() -> TraceHeader {
        TraceHeader {
            version: FORMAT_VERSION,
            level: RecordingLevel::Simple,
            interval: 0.5,
            start_time: 42,
            departure: LocationRecord::invalid(),
            arrival: LocationRecord::invalid(),
            schema: vec![
                SchemaEntry {
                    name: "sim/flightmodel/position/latitude".to_string(),
                    kind: ValueKind::Float,
                    array_size: 0,
                },
                SchemaEntry {
                    name: "sim/flightmodel/engine/ENGN_running".to_string(),
                    kind: ValueKind::Int,
                    array_size: 2,
                },
            ],
        }
    }

    fn encode(frames: u8, footer: bool) -> Vec<u8> {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        for i in 0..frames {
            let t = f32::from(i) * 0.5;
            writer
                .write_frame(t, [Value::Float(47.0), Value::Int(1), Value::Int(i32::from(i))])
                .unwrap();
        }
        if footer {
            writer.finish(99).unwrap().into_inner()
        } else {
            writer.flush().unwrap();
            writer.get_ref().get_ref().clone()
        }
    }

    #[test]
    fn test_complete_trace() {
        let trace = read_trace(encode(4, true).as_slice()).unwrap();
        assert!(trace.is_complete());
        assert_eq!(trace.frames.len(), 4);
        assert_eq!(trace.duration(), 1.5);
        assert_eq!(trace.header.slot_count(), 3);
    }

    #[test]
    fn test_missing_footer() {
        let trace = read_trace(encode(3, false).as_slice()).unwrap();
        assert_eq!(trace.frames.len(), 3);
        assert!(trace.footer.is_none());
        assert!(!trace.is_complete());
    }

    #[test]
    fn test_truncated_frame_dropped() {
        let mut bytes = encode(3, false);
        bytes.truncate(bytes.len() - 2);
        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.frames.len(), 2);
        assert!(trace.footer.is_none());
    }

    #[test]
    fn test_slot_range() {
        let trace = read_trace(encode(2, true).as_slice()).unwrap();
        let range = trace
            .slot_range("sim/flightmodel/engine/ENGN_running")
            .unwrap();
        assert_eq!(range, 1..3);
        assert_eq!(trace.frames[1].values[range], [FrameValue::Int(1), FrameValue::Int(1)]);
        assert!(trace.slot_range("sim/nope").is_none());
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(0, true);
        bytes[0] = b'Y';
        let err = read_trace(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::TraceFormat { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(0, true);
        bytes[4..6].copy_from_slice(&9u16.to_le_bytes());
        let err = read_trace(bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("unsupported version 9"));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(0, true);
        let err = read_trace(&bytes[..30]).unwrap_err();
        assert!(matches!(err, Error::TraceFormat { .. }));
    }

    #[test]
    fn test_unexpected_marker() {
        let mut bytes = encode(1, false);
        bytes.extend_from_slice(b"JUNK");
        let err = read_trace(bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("unexpected marker"));
    }

    #[test]
    fn test_frame_values_serialize_untagged() {
        let values = vec![
            FrameValue::Float(1.5),
            FrameValue::Int(2),
            FrameValue::Str("C172".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[1.5,2,"C172"]"#);
    }
}
