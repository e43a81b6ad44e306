//! `xblackbox` - A flight data recorder for simulator telemetry
//!
//! This library samples a configurable catalog of named telemetry channels at
//! a fixed interval and streams them into a compact, self-describing binary
//! trace, tagged with the departure and arrival airports.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod location;
pub mod logging;
pub mod recorder;
pub mod sim;
pub mod snapshot;
pub mod telemetry;

pub use catalog::{ParameterCatalog, RecordingLevel};
pub use codec::{read_trace, DecodedTrace};
pub use config::Config;
pub use error::{Error, Result};
pub use location::{FacilityIndex, LocationRecord, NavigationIndex};
pub use logging::init_logging;
pub use recorder::{FileStore, Recorder, RecorderSettings, SessionSummary, TraceStore};
pub use telemetry::{TelemetrySource, TelemetryTable};
