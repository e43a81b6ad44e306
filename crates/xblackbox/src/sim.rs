//! A synthetic flight between two airports.
//!
//! Stands in for a live simulator: each [`SyntheticFlight::step`] writes a
//! plausible aircraft state into a [`TelemetryTable`], moving through taxi,
//! takeoff, climb, cruise, descent, landing and shutdown over a fixed
//! duration.

use crate::catalog::{self, RecordingLevel, ValueKind, MAX_ENGINES};
use crate::location::Facility;
use crate::recorder::{
    ENGINE_RUNNING_CHANNEL, GROUND_SPEED_CHANNEL, LATITUDE_CHANNEL, LONGITUDE_CHANNEL,
    ON_GROUND_CHANNEL,
};
use crate::telemetry::TelemetryTable;

const ENGINES: usize = 2;
const CRUISE_ALTITUDE_M: f32 = 10_000.0;
const LIFTOFF_ALTITUDE_M: f32 = 150.0;
const MPS_TO_KNOTS: f32 = 1.943_844;
const MPS_TO_FPM: f32 = 196.850_4;

/// Phase of the synthetic flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightPhase {
    /// At the gate, engines off.
    Parked,
    /// Taxiing out.
    Taxi,
    /// Takeoff roll and rotation.
    Takeoff,
    /// Climbing to cruise altitude.
    Climb,
    /// Level cruise.
    Cruise,
    /// Descending towards the destination.
    Descent,
    /// Touchdown and rollout.
    Landing,
    /// Taxiing in.
    TaxiIn,
    /// At the gate, engines off.
    Shutdown,
}

/// Phase boundaries as fractions of the whole flight.
const PROFILE: [(f32, FlightPhase); 8] = [
    (0.04, FlightPhase::Parked),
    (0.10, FlightPhase::Taxi),
    (0.15, FlightPhase::Takeoff),
    (0.32, FlightPhase::Climb),
    (0.62, FlightPhase::Cruise),
    (0.80, FlightPhase::Descent),
    (0.85, FlightPhase::Landing),
    (0.90, FlightPhase::TaxiIn),
];

/// Fraction of the flight at liftoff and at touchdown. The aircraft only
/// moves along the route between the two.
const LIFTOFF: f32 = 0.13;
const TOUCHDOWN: f32 = 0.80;

impl FlightPhase {
    /// The phase at `progress` (0..=1), and how far through it we are.
    fn at(progress: f32) -> (Self, f32) {
        let mut start = 0.0;
        for (end, phase) in PROFILE {
            if progress < end {
                return (phase, (progress - start) / (end - start));
            }
            start = end;
        }
        (Self::Shutdown, (progress - start) / (1.0 - start))
    }

    fn engines_running(self) -> bool {
        !matches!(self, Self::Parked | Self::Shutdown)
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Parked => "parked",
            Self::Taxi => "taxi",
            Self::Takeoff => "takeoff",
            Self::Climb => "climb",
            Self::Cruise => "cruise",
            Self::Descent => "descent",
            Self::Landing => "landing",
            Self::TaxiIn => "taxi-in",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// A scripted flight from `origin` to `destination`.
#[derive(Debug, Clone)]
pub struct SyntheticFlight {
    origin: (f64, f64),
    destination: (f64, f64),
    heading: f32,
    duration: f32,
    elapsed: f32,
    altitude: f32,
}

impl SyntheticFlight {
    /// Plan a flight lasting `duration` seconds.
    #[must_use]
    pub fn new(origin: &Facility, destination: &Facility, duration: f32) -> Self {
        let origin = (origin.latitude, origin.longitude);
        let destination = (destination.latitude, destination.longitude);
        Self {
            origin,
            destination,
            heading: initial_bearing(origin, destination),
            duration: duration.max(1.0),
            elapsed: 0.0,
            altitude: 0.0,
        }
    }

    /// A table exposing every recordable channel, set to the parked state.
    #[must_use]
    pub fn telemetry_table(&self) -> TelemetryTable {
        let mut table = TelemetryTable::new();
        for def in catalog::declared(RecordingLevel::Detailed) {
            let n = def.slots();
            match def.kind {
                ValueKind::Float => table.set_floats(def.name, &vec![0.0; n]),
                ValueKind::Int => table.set_ints(def.name, &vec![0; n]),
                ValueKind::String => table.set_string(def.name, ""),
            }
        }
        table.set_string("sim/aircraft/view/acf_ICAO", "B738");
        table.set_string("sim/aircraft/view/acf_descrip", "Boeing 737-800");
        self.write(&mut table, &self.sample(), 0.0);
        table
    }

    /// Advance by `dt` seconds and write the new state into `table`.
    pub fn step(&mut self, dt: f32, table: &mut TelemetryTable) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        let sample = self.sample();
        let vertical_speed = if dt > 0.0 {
            (sample.altitude - self.altitude) / dt
        } else {
            0.0
        };
        self.altitude = sample.altitude;
        self.write(table, &sample, vertical_speed);
    }

    /// Seconds flown.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Whether the flight has reached its end.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> FlightPhase {
        FlightPhase::at(self.progress()).0
    }

    fn progress(&self) -> f32 {
        self.elapsed / self.duration
    }

    fn sample(&self) -> Sample {
        let progress = self.progress();
        let (phase, t) = FlightPhase::at(progress);

        let (speed, altitude, n1, pitch) = match phase {
            FlightPhase::Parked | FlightPhase::Shutdown => (0.0, 0.0, 0.0, 0.0),
            FlightPhase::Taxi => (8.0, 0.0, 25.0, 0.0),
            FlightPhase::Takeoff => {
                let climb = ((t - 0.6) / 0.4).clamp(0.0, 1.0);
                (
                    lerp(8.0, 80.0, t),
                    LIFTOFF_ALTITUDE_M * climb,
                    95.0,
                    8.0 * climb,
                )
            }
            FlightPhase::Climb => (
                lerp(80.0, 200.0, t),
                lerp(LIFTOFF_ALTITUDE_M, CRUISE_ALTITUDE_M, t),
                90.0,
                10.0,
            ),
            FlightPhase::Cruise => (230.0, CRUISE_ALTITUDE_M, 80.0, 2.0),
            FlightPhase::Descent => (
                lerp(230.0, 75.0, t),
                lerp(CRUISE_ALTITUDE_M, 0.0, t),
                40.0,
                -3.0,
            ),
            FlightPhase::Landing => (lerp(70.0, 10.0, t), 0.0, 60.0, 0.0),
            FlightPhase::TaxiIn => (6.0, 0.0, 22.0, 0.0),
        };

        let route = f64::from(((progress - LIFTOFF) / (TOUCHDOWN - LIFTOFF)).clamp(0.0, 1.0));
        Sample {
            phase,
            speed,
            altitude,
            n1,
            pitch,
            latitude: self.origin.0 + (self.destination.0 - self.origin.0) * route,
            longitude: self.origin.1 + (self.destination.1 - self.origin.1) * route,
        }
    }

    fn write(&self, table: &mut TelemetryTable, sample: &Sample, vertical_speed: f32) {
        let speed = sample.speed;
        table.set_float("sim/time/total_running_time_sec", self.elapsed);
        table.set_float(LATITUDE_CHANNEL, sample.latitude as f32);
        table.set_float(LONGITUDE_CHANNEL, sample.longitude as f32);
        table.set_float("sim/flightmodel/position/elevation", sample.altitude);
        table.set_float("sim/flightmodel/position/y_agl", sample.altitude);
        table.set_float("sim/flightmodel/position/theta", sample.pitch);
        table.set_float("sim/flightmodel/position/psi", self.heading);
        table.set_float("sim/flightmodel/position/hpath", self.heading);
        table.set_float("sim/flightmodel/position/indicated_airspeed", speed * MPS_TO_KNOTS);
        table.set_float("sim/flightmodel/position/true_airspeed", speed);
        table.set_float(GROUND_SPEED_CHANNEL, speed);
        table.set_float("sim/flightmodel/position/vh_ind_fpm", vertical_speed * MPS_TO_FPM);
        table.set_float("sim/flightmodel/forces/g_nrml", 1.0);
        table.set_int(ON_GROUND_CHANNEL, i32::from(sample.altitude <= 0.0));

        let mut engines = [0; MAX_ENGINES as usize];
        let mut n1 = [0.0; MAX_ENGINES as usize];
        engines[..ENGINES].fill(i32::from(sample.phase.engines_running()));
        n1[..ENGINES].fill(sample.n1);
        table.set_ints(ENGINE_RUNNING_CHANNEL, &engines);
        table.set_floats("sim/flightmodel/engine/ENGN_N1_", &n1);
    }
}

/// Aircraft state at one instant.
#[derive(Debug, Clone, Copy)]
struct Sample {
    phase: FlightPhase,
    speed: f32,
    altitude: f32,
    n1: f32,
    pitch: f32,
    latitude: f64,
    longitude: f64,
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Initial great-circle bearing in degrees true.
fn initial_bearing(from: (f64, f64), to: (f64, f64)) -> f32 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlon = lon2 - lon1;
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees().rem_euclid(360.0)) as f32
}
