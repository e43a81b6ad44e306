//! Buffered trace encoder.

use std::io::{self, Seek, SeekFrom, Write};

use tracing::{debug, trace, warn};

use super::{
    truncate_utf8, TraceHeader, ARRIVAL_OFFSET, FLUSH_INTERVAL_FRAMES, FOOTER_MARKER,
    FRAME_MARKER, LOCATION_BLOCK_LEN, LOCATION_CODE_LEN, LOCATION_NAME_LEN, MAGIC,
    MAX_STRING_LEN, WRITE_BUFFER_CAPACITY,
};
use crate::catalog::ValueKind;
use crate::location::LocationRecord;
use crate::snapshot::{sanitize, Value};

/// Streams a trace into a seekable sink.
///
/// Encoded bytes collect in an in-memory buffer that is written out when it
/// fills and flushed every [`FLUSH_INTERVAL_FRAMES`] frames. A frame that
/// does not match the header schema is rejected before any of it reaches the
/// buffer.
///
/// Once the sink reports an error the writer is failed: buffered bytes are
/// discarded and nothing more is written, so the sink holds a clean prefix
/// of the trace that decodes without a footer.
#[derive(Debug)]
pub struct TraceWriter<W: Write + Seek> {
    inner: W,
    buffer: Vec<u8>,
    slot_kinds: Vec<ValueKind>,
    arrival_offset: Option<u64>,
    /// Frames encoded, buffered or written.
    frames: u32,
    /// Sink offsets at which buffered frames end.
    frame_ends: Vec<u64>,
    /// Frames whose bytes the sink has fully accepted.
    durable_frames: u32,
    /// Bytes the sink has accepted.
    committed: u64,
    failed: bool,
}

impl<W: Write + Seek> TraceWriter<W> {
    /// Write `header` to `inner` and return a writer ready for frames.
    ///
    /// The header reaches `inner` before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be encoded or written.
    pub fn begin(inner: W, header: &TraceHeader) -> io::Result<Self> {
        let mut writer = Self {
            inner,
            buffer: Vec::with_capacity(WRITE_BUFFER_CAPACITY),
            slot_kinds: header
                .schema
                .iter()
                .flat_map(|entry| std::iter::repeat(entry.kind).take(entry.slots()))
                .collect(),
            arrival_offset: None,
            frames: 0,
            frame_ends: Vec::new(),
            durable_frames: 0,
            committed: 0,
            failed: false,
        };
        writer.encode_header(header)?;
        writer.flush()?;

        debug!(
            version = header.version,
            channels = header.schema.len(),
            slots = writer.slot_kinds.len(),
            bytes = writer.committed,
            "Wrote trace header"
        );
        Ok(writer)
    }

    fn encode_header(&mut self, header: &TraceHeader) -> io::Result<()> {
        let buf = &mut self.buffer;
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&header.version.to_le_bytes());
        buf.push(u8::from(header.level));
        buf.extend_from_slice(&header.interval.to_le_bytes());
        buf.extend_from_slice(&header.start_time.to_le_bytes());

        match header.version {
            1 => {}
            2 => {
                put_location(buf, &header.departure);
                self.arrival_offset = Some(ARRIVAL_OFFSET);
                put_location(buf, &header.arrival);
            }
            other => {
                return Err(invalid_input(format!("cannot write trace version {other}")));
            }
        }

        let count = u16::try_from(header.schema.len())
            .map_err(|_| invalid_input("too many channels for one trace"))?;
        buf.extend_from_slice(&count.to_le_bytes());
        for entry in &header.schema {
            let len = u16::try_from(entry.name.len())
                .map_err(|_| invalid_input(format!("channel name too long: {}", entry.name)))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(entry.name.as_bytes());
            buf.push(entry.kind.tag());
            buf.push(entry.array_size);
        }
        Ok(())
    }

    /// Append one frame.
    ///
    /// `values` must yield exactly one value per schema slot, each of the
    /// slot's kind. Non-finite floats are written as `0.0` and strings are
    /// cut to [`MAX_STRING_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the values do not match the schema, or the
    /// underlying error if buffered bytes cannot be written out. A failed
    /// writer refuses every frame.
    pub fn write_frame<'a>(
        &mut self,
        timestamp: f32,
        values: impl IntoIterator<Item = Value<'a>>,
    ) -> io::Result<()> {
        self.ensure_usable()?;
        let start = self.buffer.len();
        self.buffer.extend_from_slice(&FRAME_MARKER);
        self.buffer
            .extend_from_slice(&sanitize(timestamp).to_le_bytes());

        let mut slot = 0;
        for value in values {
            match (value, self.slot_kinds.get(slot)) {
                (Value::Float(v), Some(ValueKind::Float)) => {
                    self.buffer.extend_from_slice(&sanitize(v).to_le_bytes());
                }
                (Value::Int(v), Some(ValueKind::Int)) => {
                    self.buffer.extend_from_slice(&v.to_le_bytes());
                }
                (Value::Str(s), Some(ValueKind::String)) => put_short_str(&mut self.buffer, s),
                (_, expected) => {
                    self.buffer.truncate(start);
                    return Err(invalid_input(format!(
                        "frame value {slot} does not match schema (expected {expected:?})"
                    )));
                }
            }
            slot += 1;
        }
        if slot != self.slot_kinds.len() {
            self.buffer.truncate(start);
            return Err(invalid_input(format!(
                "frame has {slot} values, schema has {}",
                self.slot_kinds.len()
            )));
        }

        self.frames += 1;
        self.frame_ends
            .push(self.committed + self.buffer.len() as u64);
        trace!(frame = self.frames, timestamp, "Encoded frame");

        if self.buffer.len() >= WRITE_BUFFER_CAPACITY {
            self.drain()?;
        }
        if self.frames % FLUSH_INTERVAL_FRAMES == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Overwrite the arrival block in the header.
    ///
    /// Buffered frames are flushed first and the stream position is restored
    /// to the end afterwards. Version 1 traces have no arrival block, so this
    /// is a no-op for them.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if flushing, seeking or writing fails,
    /// or if the writer has already failed.
    pub fn patch_arrival(&mut self, arrival: &LocationRecord) -> io::Result<()> {
        self.ensure_usable()?;
        let Some(offset) = self.arrival_offset else {
            return Ok(());
        };
        self.flush()?;

        let mut block = Vec::with_capacity(LOCATION_BLOCK_LEN);
        put_location(&mut block, arrival);
        let result = self
            .inner
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.inner.write_all(&block))
            .and_then(|()| self.inner.seek(SeekFrom::End(0)));
        if let Err(err) = result {
            return Err(self.fail(err));
        }
        debug!(arrival = %arrival, "Patched arrival block");
        Ok(())
    }

    /// Write the footer, flush, and hand back the sink.
    ///
    /// A failed writer appends nothing, leaving the trace without a footer.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the footer cannot be written, or if
    /// the writer has already failed.
    pub fn finish(mut self, end_time: u64) -> io::Result<W> {
        self.ensure_usable()?;
        self.buffer.extend_from_slice(&FOOTER_MARKER);
        self.buffer.extend_from_slice(&self.frames.to_le_bytes());
        self.buffer.extend_from_slice(&end_time.to_le_bytes());
        self.flush()?;
        debug!(
            frames = self.frames,
            bytes = self.committed,
            "Wrote trace footer"
        );
        Ok(self.inner)
    }

    /// Write out buffered bytes and flush the sink.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if writing or flushing fails, or if the
    /// writer has already failed.
    pub fn flush(&mut self) -> io::Result<()> {
        self.ensure_usable()?;
        self.drain()?;
        self.inner.flush().map_err(|err| self.fail(err))
    }

    /// Hand the buffer to the sink, keeping only what it did not accept.
    fn drain(&mut self) -> io::Result<()> {
        let mut written = 0;
        let result = loop {
            if written == self.buffer.len() {
                break Ok(());
            }
            match self.inner.write(&self.buffer[written..]) {
                Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => break Err(err),
            }
        };

        self.buffer.drain(..written);
        self.committed += written as u64;
        let committed = self.committed;
        let landed = self
            .frame_ends
            .iter()
            .take_while(|&&end| end <= committed)
            .count();
        self.frame_ends.drain(..landed);
        self.durable_frames += landed as u32;

        result.map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        if !self.failed {
            warn!(
                frames = self.durable_frames,
                bytes = self.committed,
                discarded = self.buffer.len(),
                error = %err,
                "Trace sink failed"
            );
        }
        self.failed = true;
        self.buffer.clear();
        self.frame_ends.clear();
        self.frames = self.durable_frames;
        err
    }

    fn ensure_usable(&self) -> io::Result<()> {
        if self.failed {
            Err(io::Error::other("trace sink failed earlier"))
        } else {
            Ok(())
        }
    }

    /// Frames encoded so far. After a sink failure, only the frames whose
    /// bytes reached the sink.
    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Bytes encoded so far, including any still buffered.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.committed + self.buffer.len() as u64
    }

    /// Whether the sink has reported an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Borrow the sink.
    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

fn put_location(buf: &mut Vec<u8>, location: &LocationRecord) {
    buf.push(u8::from(location.valid));
    put_fixed_str(buf, &location.code, LOCATION_CODE_LEN);
    put_fixed_str(buf, &location.name, LOCATION_NAME_LEN);
    buf.extend_from_slice(&location.latitude.to_le_bytes());
    buf.extend_from_slice(&location.longitude.to_le_bytes());
}

fn put_fixed_str(buf: &mut Vec<u8>, s: &str, width: usize) {
    let s = truncate_utf8(s, width);
    buf.extend_from_slice(s.as_bytes());
    buf.resize(buf.len() + width - s.len(), 0);
}

fn put_short_str(buf: &mut Vec<u8>, s: &str) {
    let s = truncate_utf8(s, MAX_STRING_LEN);
    buf.push(u8::try_from(s.len()).unwrap_or(u8::MAX));
    buf.extend_from_slice(s.as_bytes());
}

fn invalid_input(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecordingLevel;
    use crate::codec::{read_trace, FrameValue, SchemaEntry, FORMAT_VERSION};
    use std::io::Cursor;

    fn schema() -> Vec<SchemaEntry> {
        vec![
            SchemaEntry {
                name: "sim/time/total_running_time_sec".to_string(),
                kind: ValueKind::Float,
                array_size: 0,
            },
            SchemaEntry {
                name: "sim/aircraft/view/acf_ICAO".to_string(),
                kind: ValueKind::String,
                array_size: 0,
            },
            SchemaEntry {
                name: "sim/flightmodel/engine/ENGN_running".to_string(),
                kind: ValueKind::Int,
                array_size: 2,
            },
        ]
    }

    fn header() -> TraceHeader {
        TraceHeader {
            version: FORMAT_VERSION,
            level: RecordingLevel::Normal,
            interval: 0.25,
            start_time: 1_700_000_000,
            departure: LocationRecord {
                code: "KSEA".to_string(),
                name: "Seattle-Tacoma Intl".to_string(),
                latitude: 47.449,
                longitude: -122.309,
                valid: true,
            },
            arrival: LocationRecord::invalid(),
            schema: schema(),
        }
    }

    fn frame(t: f32) -> Vec<Value<'static>> {
        vec![
            Value::Float(t),
            Value::Str("C172"),
            Value::Int(1),
            Value::Int(0),
        ]
    }

    /// Fails every write once `budget` bytes have been accepted.
    struct FailingSink {
        inner: Cursor<Vec<u8>>,
        budget: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.inner.get_ref().len() + buf.len() > self.budget {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = header();
        let writer = TraceWriter::begin(Cursor::new(Vec::new()), &header).unwrap();
        let bytes = writer.finish(1_700_000_100).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.header, header);
        assert!(trace.frames.is_empty());
        let footer = trace.footer.unwrap();
        assert_eq!(footer.frame_count, 0);
        assert_eq!(footer.end_time, 1_700_000_100);
    }

    #[test]
    fn test_frames_round_trip() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        for i in 0..3u8 {
            writer.write_frame(f32::from(i) * 0.25, frame(f32::from(i))).unwrap();
        }
        assert_eq!(writer.frames(), 3);
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.frames.len(), 3);
        assert_eq!(trace.frames[2].timestamp, 0.5);
        assert_eq!(
            trace.frames[2].values,
            vec![
                FrameValue::Float(2.0),
                FrameValue::Str("C172".to_string()),
                FrameValue::Int(1),
                FrameValue::Int(0),
            ]
        );
        assert_eq!(trace.footer.unwrap().frame_count, 3);
    }

    #[test]
    fn test_non_finite_floats_written_as_zero() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        writer.write_frame(f32::NAN, frame(f32::INFINITY)).unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.frames[0].timestamp, 0.0);
        assert_eq!(trace.frames[0].values[0], FrameValue::Float(0.0));
    }

    #[test]
    fn test_long_strings_truncated() {
        let long = "x".repeat(300);
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        writer
            .write_frame(
                0.0,
                vec![
                    Value::Float(0.0),
                    Value::Str(&long),
                    Value::Int(0),
                    Value::Int(0),
                ],
            )
            .unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(
            trace.frames[0].values[1],
            FrameValue::Str("x".repeat(MAX_STRING_LEN))
        );
    }

    #[test]
    fn test_mismatched_frame_rejected() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        let before = writer.bytes_written();

        let wrong_kind = vec![Value::Int(0), Value::Str(""), Value::Int(0), Value::Int(0)];
        let err = writer.write_frame(0.0, wrong_kind).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let too_short = vec![Value::Float(0.0), Value::Str("")];
        assert!(writer.write_frame(0.0, too_short).is_err());

        let too_long = [frame(0.0), vec![Value::Int(9)]].concat();
        assert!(writer.write_frame(0.0, too_long).is_err());

        assert_eq!(writer.frames(), 0);
        assert_eq!(writer.bytes_written(), before);

        // The stream is still usable after a rejected frame.
        writer.write_frame(0.25, frame(1.0)).unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();
        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.frames.len(), 1);
        assert_eq!(trace.footer.unwrap().frame_count, 1);
    }

    #[test]
    fn test_flushes_every_interval() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        let header_len = writer.get_ref().get_ref().len();

        for i in 1..FLUSH_INTERVAL_FRAMES {
            writer.write_frame(0.0, frame(0.0)).unwrap();
            assert_eq!(writer.get_ref().get_ref().len(), header_len, "frame {i}");
        }
        writer.write_frame(0.0, frame(0.0)).unwrap();
        assert_eq!(
            writer.get_ref().get_ref().len() as u64,
            writer.bytes_written()
        );
    }

    #[test]
    fn test_patch_arrival_in_place() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        writer.write_frame(0.0, frame(0.0)).unwrap();
        let arrival = LocationRecord {
            code: "KPDX".to_string(),
            name: "Portland Intl".to_string(),
            latitude: 45.589,
            longitude: -122.597,
            valid: true,
        };
        writer.patch_arrival(&arrival).unwrap();
        let len_after_patch = writer.get_ref().get_ref().len() as u64;
        assert_eq!(len_after_patch, writer.bytes_written());

        writer.write_frame(0.25, frame(1.0)).unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.header.arrival, arrival);
        assert_eq!(trace.header.departure.code, "KSEA");
        assert_eq!(trace.frames.len(), 2);
    }

    #[test]
    fn test_location_name_truncated_to_block() {
        let mut header = header();
        header.departure.name = "N".repeat(LOCATION_NAME_LEN + 10);
        let writer = TraceWriter::begin(Cursor::new(Vec::new()), &header).unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.header.departure.name.len(), LOCATION_NAME_LEN);
    }

    #[test]
    fn test_version_one_has_no_location_blocks() {
        let mut header = header();
        header.version = 1;
        header.departure = LocationRecord::invalid();
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header).unwrap();
        writer.write_frame(0.0, frame(0.0)).unwrap();
        // Nothing to patch in a version 1 trace.
        writer.patch_arrival(&header.departure).unwrap();
        let bytes = writer.finish(0).unwrap().into_inner();

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.header.version, 1);
        assert!(!trace.header.departure.valid);
        assert_eq!(trace.frames.len(), 1);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut header = header();
        header.version = 7;
        let err = TraceWriter::begin(Cursor::new(Vec::new()), &header).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_sink_failure_surfaces() {
        let sink = FailingSink {
            inner: Cursor::new(Vec::new()),
            budget: 400,
        };
        let mut writer = TraceWriter::begin(sink, &header()).unwrap();
        let result = (0..100).try_for_each(|_| writer.write_frame(0.0, frame(0.0)));
        assert!(result.is_err());
        assert!(writer.is_failed());
    }

    /// Accepts part of one write once `limit` is near, fails the next write,
    /// then behaves normally.
    struct ShortWriteSink {
        inner: Cursor<Vec<u8>>,
        limit: Option<usize>,
    }

    impl Write for ShortWriteSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(limit) = self.limit {
                let room = limit.saturating_sub(self.inner.get_ref().len());
                if room == 0 {
                    self.limit = None;
                    return Err(io::Error::other("device busy"));
                }
                return self.inner.write(&buf[..room.min(buf.len())]);
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortWriteSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_short_write_leaves_decodable_prefix() {
        let sink = ShortWriteSink {
            inner: Cursor::new(Vec::new()),
            limit: None,
        };
        let mut writer = TraceWriter::begin(sink, &header()).unwrap();
        let header_len = writer.get_ref().inner.get_ref().len();
        // One full frame and a few bytes of the next fit before the error.
        writer.inner.limit = Some(header_len + 32);

        let result = (0..FLUSH_INTERVAL_FRAMES).try_for_each(|i| {
            writer.write_frame(0.25 * i as f32, frame(i as f32))
        });
        assert!(result.is_err());
        assert!(writer.is_failed());
        assert_eq!(writer.frames(), 1);

        // The sink works again, but the writer must not resend anything.
        assert!(writer.flush().is_err());
        assert!(writer.patch_arrival(&LocationRecord::invalid()).is_err());
        assert!(writer.write_frame(9.0, frame(9.0)).is_err());
        let bytes = writer.get_ref().inner.get_ref().clone();
        assert_eq!(bytes.len(), header_len + 32);
        assert_eq!(writer.bytes_written(), bytes.len() as u64);
        assert!(writer.finish(0).is_err());

        let trace = read_trace(bytes.as_slice()).unwrap();
        assert_eq!(trace.frames.len(), 1);
        assert!(trace.footer.is_none());
    }

    #[test]
    fn test_frames_counted_before_flush() {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), &header()).unwrap();
        writer.write_frame(0.0, frame(0.0)).unwrap();
        writer.write_frame(0.25, frame(1.0)).unwrap();
        assert_eq!(writer.frames(), 2);
        assert!(!writer.is_failed());
        writer.flush().unwrap();
        assert_eq!(writer.durable_frames, 2);
        assert!(writer.frame_ends.is_empty());
    }
}
