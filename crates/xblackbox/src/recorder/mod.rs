//! Recording engine.
//!
//! The [`Recorder`] owns the parameter catalog, the value snapshot, the
//! telemetry source and the navigation index, and at most one open
//! recording session. The host calls [`Recorder::update`] once per tick; the
//! recorder decides whether to start or stop (in auto mode) and whether a
//! frame is due.

mod auto;
mod perf;
mod store;

pub use auto::{
    AutoCondition, AutoPolicy, ENGINE_RUNNING_CHANNEL, GROUND_SPEED_CHANNEL, ON_GROUND_CHANNEL,
};
pub use perf::{PerfLimits, PerfStats};
pub use store::{FileStore, TraceStore};

use std::fs;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::{ParameterCatalog, RecordingLevel};
use crate::codec::{TraceHeader, TraceWriter, FILE_EXTENSION, FOOTER_LEN};
use crate::error::{Error, Result};
use crate::location::{self, LocationRecord, NavigationIndex};
use crate::snapshot::ValueSnapshot;
use crate::telemetry::TelemetrySource;

use auto::AutoSignals;

/// Latitude in degrees.
pub const LATITUDE_CHANNEL: &str = "sim/flightmodel/position/latitude";
/// Longitude in degrees.
pub const LONGITUDE_CHANNEL: &str = "sim/flightmodel/position/longitude";

/// Default capture interval in seconds.
pub const DEFAULT_INTERVAL: f32 = 0.25;
/// Shortest allowed capture interval in seconds.
pub const MIN_INTERVAL: f32 = 0.05;
/// Longest allowed capture interval in seconds.
pub const MAX_INTERVAL: f32 = 5.0;
/// Default trace file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "flightdata_";

const MAX_NAME_ATTEMPTS: u32 = 100;

/// Slack when comparing the session clock against a capture deadline.
const CLOCK_EPSILON: f64 = 1e-6;

/// Everything the recorder needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Catalog detail level.
    pub level: RecordingLevel,
    /// Seconds between frames, within [`MIN_INTERVAL`]..=[`MAX_INTERVAL`].
    pub interval: f32,
    /// Directory new traces are written to.
    pub output_dir: PathBuf,
    /// Prefix for trace file names.
    pub file_prefix: String,
    /// Automatic start/stop policy.
    pub auto: AutoPolicy,
    /// Performance advisory ceilings.
    pub perf: PerfLimits,
}

impl RecorderSettings {
    /// Default settings writing to `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: RecordingLevel::Detailed,
            interval: DEFAULT_INTERVAL,
            output_dir: output_dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            auto: AutoPolicy::default(),
            perf: PerfLimits::default(),
        }
    }

    /// Check that the settings describe a workable recorder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        let interval = self.interval;
        if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
            return Err(invalid(format!(
                "interval ({interval}) must be between {MIN_INTERVAL} and {MAX_INTERVAL} seconds"
            )));
        }

        let prefix = &self.file_prefix;
        if prefix.contains(['/', '\\']) {
            return Err(invalid(format!(
                "file_prefix ({prefix}) must not contain path separators"
            )));
        }

        if !(self.auto.stop_delay.is_finite() && self.auto.stop_delay > 0.0) {
            return Err(invalid("stop_delay must be greater than 0"));
        }

        if !(self.auto.start_threshold.is_finite() && self.auto.stop_threshold.is_finite()) {
            return Err(invalid("auto thresholds must be finite"));
        }

        if !(self.perf.max_mean_ms > 0.0 && self.perf.max_frame_ms > 0.0) {
            return Err(invalid("performance ceilings must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Trace file path.
    pub path: PathBuf,
    /// Frames in the trace.
    pub frames: u32,
    /// Bytes written, header and footer included.
    pub bytes_written: u64,
    /// Session clock at stop, in seconds.
    pub duration: f64,
    /// Where the session started.
    pub departure: LocationRecord,
    /// Where the session ended.
    pub arrival: LocationRecord,
    /// Capture cost over the session.
    pub perf: PerfStats,
    /// Whether the arrival patch and footer reached the file.
    pub finalized: bool,
}

#[derive(Debug)]
struct RecordingSession<W: Write + Seek> {
    writer: TraceWriter<W>,
    path: PathBuf,
    elapsed: f64,
    next_capture: Option<f64>,
    stop_timer: f64,
    departure: LocationRecord,
    perf: PerfStats,
}

impl<W: Write + Seek> RecordingSession<W> {
    fn finish(
        self,
        arrival: LocationRecord,
        store: &mut impl TraceStore<Sink = W>,
    ) -> (SessionSummary, Option<io::Error>) {
        let Self {
            mut writer,
            path,
            elapsed,
            departure,
            perf,
            ..
        } = self;

        let patched = writer
            .flush()
            .and_then(|()| writer.patch_arrival(&arrival));
        let frames = writer.frames();
        let mut bytes_written = writer.bytes_written();
        let result = patched
            .and_then(|()| writer.finish(unix_seconds(Local::now())))
            .and_then(|sink| store.sync(sink));

        let error = match result {
            Ok(()) => {
                bytes_written += FOOTER_LEN as u64;
                None
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Failed to finalize trace");
                Some(err)
            }
        };

        let summary = SessionSummary {
            path,
            frames,
            bytes_written,
            duration: elapsed,
            departure,
            arrival,
            perf,
            finalized: error.is_none(),
        };
        (summary, error)
    }
}

/// The recording state machine.
///
/// Idle until [`start`](Self::start) (or the auto policy) opens a session;
/// recording until [`stop`](Self::stop). Dropping a recording recorder
/// stops it.
#[derive(Debug)]
pub struct Recorder<S: TelemetrySource, N: NavigationIndex, T: TraceStore = FileStore> {
    source: S,
    navigation: N,
    store: T,
    settings: RecorderSettings,
    catalog: ParameterCatalog,
    snapshot: ValueSnapshot,
    signals: AutoSignals,
    session: Option<RecordingSession<T::Sink>>,
    last_summary: Option<SessionSummary>,
    last_error: Option<Error>,
}

impl<S: TelemetrySource, N: NavigationIndex> Recorder<S, N> {
    /// Build a recorder that writes traces as files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `settings` are out of range.
    pub fn new(source: S, navigation: N, settings: RecorderSettings) -> Result<Self> {
        Self::with_store(source, navigation, settings, FileStore)
    }
}

impl<S: TelemetrySource, N: NavigationIndex, T: TraceStore> Recorder<S, N, T> {
    /// Build a recorder and its catalog over a custom trace store.
    ///
    /// The catalog and the auto-condition channels are resolved against
    /// `source` here, so it should already expose its channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `settings` are out of range.
    pub fn with_store(
        source: S,
        navigation: N,
        settings: RecorderSettings,
        store: T,
    ) -> Result<Self> {
        settings.validate()?;

        let catalog = ParameterCatalog::build(settings.level, &source);
        let snapshot = ValueSnapshot::with_capacity(catalog.slot_counts());
        let signals = if settings.auto.enabled {
            AutoSignals::resolve(&source)
        } else {
            AutoSignals::default()
        };

        info!(
            level = %settings.level,
            channels = catalog.len(),
            interval = settings.interval,
            auto = settings.auto.enabled,
            output_dir = %settings.output_dir.display(),
            "Recorder ready"
        );

        Ok(Self {
            source,
            navigation,
            store,
            settings,
            catalog,
            snapshot,
            signals,
            session: None,
            last_summary: None,
            last_error: None,
        })
    }

    /// Open a new session and write its header.
    ///
    /// Returns the path of the new trace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRecording`] if a session is open, or a
    /// directory/file creation error. On error no session is opened and no
    /// file is left behind.
    pub fn start(&mut self) -> Result<PathBuf> {
        if self.session.is_some() {
            return Err(Error::AlreadyRecording);
        }

        let dir = &self.settings.output_dir;
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;

        let now = Local::now();
        let (path, sink) = create_trace(&mut self.store, dir, &self.settings.file_prefix, now)?;
        let departure = self.locate();
        let header = TraceHeader::for_catalog(
            &self.catalog,
            self.settings.interval,
            unix_seconds(now),
            departure.clone(),
        );

        let writer = match TraceWriter::begin(sink, &header) {
            Ok(writer) => writer,
            Err(source) => {
                if let Err(err) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %err, "Failed to remove partial trace");
                }
                return Err(Error::TraceCreate { path, source });
            }
        };

        info!(
            path = %path.display(),
            level = %self.catalog.level(),
            channels = self.catalog.len(),
            departure = %departure,
            "Recording started"
        );

        self.session = Some(RecordingSession {
            writer,
            path: path.clone(),
            elapsed: 0.0,
            next_capture: None,
            stop_timer: 0.0,
            departure,
            perf: PerfStats::default(),
        });
        Ok(path)
    }

    /// Close the open session.
    ///
    /// Pending frames are flushed, the arrival is patched into the header and
    /// the footer is appended. The session is torn down even if those writes
    /// fail; [`SessionSummary::finalized`] tells whether they succeeded and
    /// [`take_error`](Self::take_error) returns the failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRecording`] if no session is open.
    pub fn stop(&mut self) -> Result<SessionSummary> {
        let session = self.session.take().ok_or(Error::NotRecording)?;
        let arrival = self.locate();
        let (summary, error) = session.finish(arrival, &mut self.store);
        if let Some(err) = error {
            self.record_error(Error::TraceWrite(err));
        }

        info!(
            path = %summary.path.display(),
            frames = summary.frames,
            bytes = summary.bytes_written,
            duration = summary.duration,
            arrival = %summary.arrival,
            finalized = summary.finalized,
            "Recording stopped"
        );
        self.last_summary = Some(summary.clone());
        Ok(summary)
    }

    /// Advance by one host tick of `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let dt = f64::from(dt);
        let mut started_now = false;

        if self.settings.auto.enabled {
            let policy = self.settings.auto;
            if self.session.is_none() {
                if self.signals.should_start(
                    policy.start_condition,
                    policy.start_threshold,
                    &self.source,
                ) {
                    match self.start() {
                        Ok(_) => started_now = true,
                        Err(err) => {
                            error!(error = %err, "Auto start failed");
                            self.record_error(err);
                        }
                    }
                }
            } else {
                let holding = self.signals.should_stop(
                    policy.stop_condition,
                    policy.stop_threshold,
                    &self.source,
                );
                if self.tick_stop_timer(holding, dt) >= f64::from(policy.stop_delay) {
                    info!(
                        condition = %policy.stop_condition,
                        delay = policy.stop_delay,
                        "Auto stop condition held"
                    );
                    if let Err(err) = self.stop() {
                        error!(error = %err, "Auto stop failed");
                    }
                    return;
                }
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !started_now {
            session.elapsed += dt;
        }
        if session
            .next_capture
            .is_some_and(|due| session.elapsed + CLOCK_EPSILON < due)
        {
            return;
        }

        let began = Instant::now();
        self.snapshot.capture(&self.catalog, &self.source);
        let result = session.writer.write_frame(
            session.elapsed as f32,
            self.snapshot.values(&self.catalog),
        );
        match result {
            Ok(()) => {
                // Deadlines advance on a grid anchored at the first frame; a
                // late tick does not cause a burst of catch-up frames.
                let interval = f64::from(self.settings.interval);
                let mut next = session.next_capture.unwrap_or(session.elapsed) + interval;
                if next <= session.elapsed {
                    next = session.elapsed + interval;
                }
                session.next_capture = Some(next);
                session.perf.record(began.elapsed());
                session.perf.report(&self.settings.perf);
            }
            Err(err) => {
                error!(
                    path = %session.path.display(),
                    error = %err,
                    "Frame write failed, stopping recording"
                );
                self.record_error(Error::TraceWrite(err));
                if let Err(err) = self.stop() {
                    error!(error = %err, "Stop after write failure failed");
                }
            }
        }
    }

    fn tick_stop_timer(&mut self, holding: bool, dt: f64) -> f64 {
        let Some(session) = self.session.as_mut() else {
            return 0.0;
        };
        if holding {
            session.stop_timer += dt;
        } else {
            session.stop_timer = 0.0;
        }
        session.stop_timer
    }

    /// Keep the first unreported failure; later ones are only logged.
    fn record_error(&mut self, err: Error) {
        if self.last_error.is_none() {
            self.last_error = Some(err);
        }
    }

    /// Switch recording level and rebuild the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordingActive`] while a session is open.
    pub fn set_level(&mut self, level: RecordingLevel) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::recording_active("change recording level"));
        }
        self.catalog.reload(level, &self.source);
        self.snapshot.reset(self.catalog.slot_counts());
        self.settings.level = level;
        Ok(())
    }

    fn locate(&self) -> LocationRecord {
        let read = |name: &str| {
            let handle = self.source.resolve(name)?;
            self.source.read_float(handle, 0)
        };
        match (read(LATITUDE_CHANNEL), read(LONGITUDE_CHANNEL)) {
            (Some(lat), Some(lon)) => {
                location::resolve(&self.navigation, f64::from(lat), f64::from(lon))
            }
            _ => {
                debug!("Position unavailable, location unknown");
                LocationRecord::invalid()
            }
        }
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Frames written in the open session, 0 when idle.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.writer.frames())
    }

    /// Bytes written in the open session, 0 when idle.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.writer.bytes_written())
    }

    /// Session clock in seconds, 0 when idle.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.elapsed)
    }

    /// Path of the open trace.
    #[must_use]
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Capture cost of the open session.
    #[must_use]
    pub fn perf(&self) -> Option<PerfStats> {
        self.session.as_ref().map(|s| s.perf)
    }

    /// Summary of the most recently stopped session.
    #[must_use]
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    /// Take the first failure hit inside [`update`](Self::update) or while
    /// finalizing a trace, if any.
    pub fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }

    /// The active catalog.
    #[must_use]
    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Mutable access to the telemetry source, for hosts that feed it.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: TelemetrySource, N: NavigationIndex, T: TraceStore> Drop for Recorder<S, N, T> {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Recorder dropped while recording, forcing stop");
            if let Err(err) = self.stop() {
                error!(error = %err, "Forced stop failed");
            }
        }
    }
}

fn unix_seconds(at: DateTime<Local>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

/// Create `<prefix><YYYYmmdd_HHMMSS>.xdr` in `dir`, adding a numeric suffix
/// if that name is taken.
fn create_trace<T: TraceStore>(
    store: &mut T,
    dir: &Path,
    prefix: &str,
    at: DateTime<Local>,
) -> Result<(PathBuf, T::Sink)> {
    let stem = format!("{prefix}{}", at.format("%Y%m%d_%H%M%S"));
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}.{FILE_EXTENSION}")
        } else {
            format!("{stem}_{attempt}.{FILE_EXTENSION}")
        };
        let path = dir.join(name);
        match store.create(&path) {
            Ok(sink) => return Ok((path, sink)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(Error::TraceCreate { path, source }),
        }
    }
    Err(Error::TraceCreate {
        path: dir.join(format!("{stem}.{FILE_EXTENSION}")),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"),
    })
}
