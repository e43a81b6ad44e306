//! Automatic start/stop predicates.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::MAX_ENGINES;
use crate::telemetry::{ChannelHandle, TelemetrySource};

/// Ground speed in metres per second.
pub const GROUND_SPEED_CHANNEL: &str = "sim/flightmodel/position/groundspeed";
/// Per-engine running flags.
pub const ENGINE_RUNNING_CHANNEL: &str = "sim/flightmodel/engine/ENGN_running";
/// Non-zero while any gear touches the ground.
pub const ON_GROUND_CHANNEL: &str = "sim/flightmodel/failures/onground_any";

/// What an automatic start or stop decision is based on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCondition {
    /// Start above the threshold speed, stop below it.
    #[default]
    GroundSpeed,
    /// Start once any engine runs, stop once none do.
    EngineRunning,
    /// Start when airborne, stop when back on the ground.
    WeightOnWheels,
}

impl std::fmt::Display for AutoCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroundSpeed => write!(f, "ground_speed"),
            Self::EngineRunning => write!(f, "engine_running"),
            Self::WeightOnWheels => write!(f, "weight_on_wheels"),
        }
    }
}

/// Automatic start/stop policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoPolicy {
    /// Whether `update` starts and stops sessions on its own.
    pub enabled: bool,
    /// Condition that starts a session.
    pub start_condition: AutoCondition,
    /// Threshold for the start condition, where it takes one.
    pub start_threshold: f32,
    /// Condition that stops a session.
    pub stop_condition: AutoCondition,
    /// Threshold for the stop condition, where it takes one.
    pub stop_threshold: f32,
    /// Seconds the stop condition must hold continuously.
    pub stop_delay: f32,
}

impl Default for AutoPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            start_condition: AutoCondition::GroundSpeed,
            start_threshold: 5.0,
            stop_condition: AutoCondition::GroundSpeed,
            stop_threshold: 5.0,
            stop_delay: 30.0,
        }
    }
}

/// Handles for the channels the predicates read.
///
/// Resolved once per recorder. A missing channel is reported here and
/// afterwards just makes its predicates false.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AutoSignals {
    ground_speed: Option<ChannelHandle>,
    engines_running: Option<ChannelHandle>,
    on_ground: Option<ChannelHandle>,
}

impl AutoSignals {
    pub(crate) fn resolve(source: &impl TelemetrySource) -> Self {
        let lookup = |name: &str| {
            let handle = source.resolve(name);
            if handle.is_none() {
                warn!(channel = name, "Auto condition channel unavailable");
            }
            handle
        };
        Self {
            ground_speed: lookup(GROUND_SPEED_CHANNEL),
            engines_running: lookup(ENGINE_RUNNING_CHANNEL),
            on_ground: lookup(ON_GROUND_CHANNEL),
        }
    }

    /// Whether a session should start now.
    pub(crate) fn should_start(
        &self,
        condition: AutoCondition,
        threshold: f32,
        source: &impl TelemetrySource,
    ) -> bool {
        let met = match condition {
            AutoCondition::GroundSpeed => self
                .ground_speed(source)
                .is_some_and(|speed| speed > threshold),
            AutoCondition::EngineRunning => self.any_engine_running(source) == Some(true),
            AutoCondition::WeightOnWheels => self.on_ground(source) == Some(false),
        };
        if met {
            debug!(%condition, threshold, "Auto start condition met");
        }
        met
    }

    /// Whether the stop condition holds now.
    pub(crate) fn should_stop(
        &self,
        condition: AutoCondition,
        threshold: f32,
        source: &impl TelemetrySource,
    ) -> bool {
        match condition {
            AutoCondition::GroundSpeed => self
                .ground_speed(source)
                .is_some_and(|speed| speed < threshold),
            AutoCondition::EngineRunning => self.any_engine_running(source) == Some(false),
            AutoCondition::WeightOnWheels => self.on_ground(source) == Some(true),
        }
    }

    fn ground_speed(&self, source: &impl TelemetrySource) -> Option<f32> {
        source.read_float(self.ground_speed?, 0)
    }

    fn any_engine_running(&self, source: &impl TelemetrySource) -> Option<bool> {
        let handle = self.engines_running?;
        Some(
            (0..usize::from(MAX_ENGINES))
                .any(|i| source.read_int(handle, i).is_some_and(|v| v != 0)),
        )
    }

    fn on_ground(&self, source: &impl TelemetrySource) -> Option<bool> {
        source.read_int(self.on_ground?, 0).map(|v| v != 0)
    }
}
