//! `xbbrec` - CLI for xblackbox
//!
//! This binary records synthetic flights through the recorder and decodes
//! the traces it produces.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use xblackbox::catalog::{self, RecordingLevel};
use xblackbox::cli::{ChannelsCommand, Cli, Command, ConfigCommand, InspectCommand, RecordCommand};
use xblackbox::sim::SyntheticFlight;
use xblackbox::{init_logging, read_trace, Config, DecodedTrace, Recorder, SessionSummary};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // The config commands must still run when the configuration is invalid
    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Record(record_cmd) => handle_record(config, &record_cmd).await,
        Command::Inspect(inspect_cmd) => handle_inspect(&inspect_cmd),
        Command::Channels(channels_cmd) => handle_channels(&config, &channels_cmd),
        Command::Config(_) => Ok(()),
    }
}

async fn handle_record(mut config: Config, cmd: &RecordCommand) -> Result<()> {
    if let Some(level) = cmd.level {
        config.recording.level = level.into();
    }
    if let Some(interval) = cmd.interval {
        config.recording.interval = interval;
    }
    if let Some(dir) = &cmd.output_dir {
        config.recording.output_dir = Some(dir.clone());
    }
    if cmd.auto {
        config.auto.enabled = true;
    }
    config.validate()?;

    if cmd.tick_rate == 0 {
        bail!("tick rate must be at least 1");
    }
    if !(cmd.speed.is_finite() && cmd.speed > 0.0) {
        bail!("speed must be greater than 0");
    }
    if !(cmd.duration.is_finite() && cmd.duration > 0.0) {
        bail!("duration must be greater than 0");
    }

    let index = config.navigation_index()?;
    let origin = index
        .find(&cmd.from)
        .cloned()
        .ok_or_else(|| anyhow!("unknown departure airport {}", cmd.from))?;
    let destination = index
        .find(&cmd.to)
        .cloned()
        .ok_or_else(|| anyhow!("unknown arrival airport {}", cmd.to))?;

    let mut flight = SyntheticFlight::new(&origin, &destination, cmd.duration);
    let table = flight.telemetry_table();
    let auto = config.auto.enabled;
    let mut recorder = Recorder::new(table, index, config.recorder_settings())?;

    info!(
        from = %origin.code,
        to = %destination.code,
        duration = cmd.duration,
        level = %config.recording.level,
        auto,
        "Flight planned"
    );

    if !auto {
        let path = recorder.start().context("failed to start recording")?;
        println!("Recording to {}", path.display());
    }

    let period = Duration::from_secs_f64(1.0 / f64::from(cmd.tick_rate));
    let dt = period.as_secs_f32() * cmd.speed;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut phase = flight.phase();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flight.step(dt, recorder.source_mut());
                recorder.update(dt);

                if flight.phase() != phase {
                    phase = flight.phase();
                    info!(%phase, elapsed = flight.elapsed(), "Flight phase");
                }
                if flight.is_finished() {
                    break;
                }
            }
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                warn!(elapsed = flight.elapsed(), "Interrupted");
                break;
            }
        }
    }

    if recorder.is_recording() {
        recorder.stop().context("failed to stop recording")?;
    }
    if let Some(err) = recorder.take_error() {
        warn!(error = %err, "Recording hit an error");
    }

    match recorder.last_summary() {
        Some(summary) => print_summary(summary),
        None => println!("No session was recorded."),
    }
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("Session summary");
    println!("---------------");
    println!("Trace:       {}", summary.path.display());
    println!("Frames:      {}", summary.frames);
    println!("Bytes:       {}", summary.bytes_written);
    println!("Duration:    {:.2} s", summary.duration);
    println!("Departure:   {}", summary.departure);
    println!("Arrival:     {}", summary.arrival);
    println!(
        "Capture:     mean {:.3} ms, max {:.3} ms",
        summary.perf.mean_ms, summary.perf.max_ms
    );
    if !summary.finalized {
        println!("Warning:     trace was not finalized; footer may be missing");
    }
}

fn handle_inspect(cmd: &InspectCommand) -> Result<()> {
    let file = File::open(&cmd.file)
        .with_context(|| format!("failed to open {}", cmd.file.display()))?;
    let trace =
        read_trace(file).with_context(|| format!("failed to decode {}", cmd.file.display()))?;

    if cmd.json {
        let mut summary = serde_json::json!({
            "file": cmd.file,
            "version": trace.header.version,
            "level": trace.header.level,
            "interval": trace.header.interval,
            "start_time": trace.header.start_time,
            "departure": trace.header.departure,
            "arrival": trace.header.arrival,
            "channel_count": trace.header.schema.len(),
            "slot_count": trace.header.slot_count(),
            "frames": trace.frames.len(),
            "duration": trace.duration(),
            "footer": trace.footer,
            "complete": trace.is_complete(),
        });
        if cmd.channels {
            summary["channels"] = serde_json::to_value(&trace.header.schema)?;
        }
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_trace(cmd, &trace);
    Ok(())
}

fn print_trace(cmd: &InspectCommand, trace: &DecodedTrace) {
    let header = &trace.header;
    println!("Trace:       {}", cmd.file.display());
    println!("Version:     {}", header.version);
    println!("Level:       {} ({})", header.level, u8::from(header.level));
    println!("Interval:    {} s", header.interval);
    println!("Started:     {}", format_time(header.start_time));
    println!("Departure:   {}", header.departure);
    println!("Arrival:     {}", header.arrival);
    println!(
        "Channels:    {} ({} values per frame)",
        header.schema.len(),
        header.slot_count()
    );
    println!("Frames:      {}", trace.frames.len());
    println!("Duration:    {:.2} s", trace.duration());
    match trace.footer {
        Some(footer) if trace.is_complete() => {
            println!("Ended:       {}", format_time(footer.end_time));
        }
        Some(footer) => println!(
            "Footer:      claims {} frames, {} decoded",
            footer.frame_count,
            trace.frames.len()
        ),
        None => println!("Footer:      missing (recording was cut short)"),
    }

    if cmd.channels {
        println!();
        for entry in &header.schema {
            if entry.array_size > 0 {
                println!("  {:<60} {}[{}]", entry.name, entry.kind, entry.array_size);
            } else {
                println!("  {:<60} {}", entry.name, entry.kind);
            }
        }
    }
}

fn format_time(unix_seconds: u64) -> String {
    i64::try_from(unix_seconds)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(|| unix_seconds.to_string(), |t| t.to_rfc3339())
}

fn handle_channels(config: &Config, cmd: &ChannelsCommand) -> Result<()> {
    let level: RecordingLevel = cmd.level.map_or(config.recording.level, Into::into);

    if cmd.json {
        let channels: Vec<_> = catalog::declared(level)
            .map(|def| {
                serde_json::json!({
                    "name": def.name,
                    "description": def.description,
                    "tier": def.tier,
                    "kind": def.kind,
                    "array_size": def.array_size,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    let mut count = 0;
    let mut slots = 0;
    for def in catalog::declared(level) {
        let kind = if def.array_size > 0 {
            format!("{}[{}]", def.kind, def.array_size)
        } else {
            def.kind.to_string()
        };
        println!("{:<8} {:<60} {:<10} {}", def.tier, def.name, kind, def.description);
        count += 1;
        slots += def.slots();
    }
    println!();
    println!("{count} channels, {slots} values per frame at level {level}");
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config =
                Config::extract_from(config_path).context("failed to load configuration")?;
            if let Err(e) = config.validate() {
                warn!(error = %e, "Configuration is not valid");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Configuration");
                println!("-------------");
                println!();
                println!("[recording]");
                println!("  Level:              {}", config.recording.level);
                println!("  Interval:           {} s", config.recording.interval);
                println!("  Output dir:         {}", config.output_dir().display());
                println!("  File prefix:        {}", config.recording.file_prefix);
                println!();
                println!("[auto]");
                println!("  Enabled:            {}", config.auto.enabled);
                println!(
                    "  Start:              {} > {}",
                    config.auto.start_condition, config.auto.start_threshold
                );
                println!(
                    "  Stop:               {} < {} for {} s",
                    config.auto.stop_condition, config.auto.stop_threshold, config.auto.stop_delay
                );
                println!();
                println!("[performance]");
                println!("  Report every:       {} frames", config.performance.report_every);
                println!("  Max mean:           {} ms", config.performance.max_mean_ms);
                println!("  Max frame:          {} ms", config.performance.max_frame_ms);
                println!();
                println!("[navigation]");
                match &config.navigation.index_path {
                    Some(path) => println!("  Index:              {}", path.display()),
                    None => println!("  Index:              built-in"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
