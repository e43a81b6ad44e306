//! Declared telemetry channels, per tier, in serialization order.
//!
//! Changing the order of an existing table changes the on-disk layout of new
//! traces. Append only.

use super::{RecordingLevel, ValueKind};

/// Engine slots recorded for per-engine channels.
pub const MAX_ENGINES: u8 = 8;
/// Battery slots recorded for per-battery channels.
pub const MAX_BATTERIES: u8 = 8;
/// Generator slots recorded for per-generator channels.
pub const MAX_GENERATORS: u8 = 8;
/// Gear slots recorded for per-gear channels.
pub const MAX_LANDING_GEAR: u8 = 10;

/// A channel declaration before tier assignment and resolution.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelDecl {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ValueKind,
    pub array_size: u8,
}

const fn float(name: &'static str, description: &'static str) -> ChannelDecl {
    ChannelDecl {
        name,
        description,
        kind: ValueKind::Float,
        array_size: 0,
    }
}

const fn floats(name: &'static str, description: &'static str, n: u8) -> ChannelDecl {
    ChannelDecl {
        name,
        description,
        kind: ValueKind::Float,
        array_size: n,
    }
}

const fn int(name: &'static str, description: &'static str) -> ChannelDecl {
    ChannelDecl {
        name,
        description,
        kind: ValueKind::Int,
        array_size: 0,
    }
}

const fn ints(name: &'static str, description: &'static str, n: u8) -> ChannelDecl {
    ChannelDecl {
        name,
        description,
        kind: ValueKind::Int,
        array_size: n,
    }
}

const fn string(name: &'static str, description: &'static str) -> ChannelDecl {
    ChannelDecl {
        name,
        description,
        kind: ValueKind::String,
        array_size: 0,
    }
}

/// Channels declared for exactly one tier (not cumulative).
pub(crate) fn tier_table(tier: RecordingLevel) -> &'static [ChannelDecl] {
    match tier {
        RecordingLevel::Simple => SIMPLE,
        RecordingLevel::Normal => NORMAL,
        RecordingLevel::Detailed => DETAILED,
    }
}

const SIMPLE: &[ChannelDecl] = &[
    // Time
    float("sim/time/total_running_time_sec", "Total running time"),
    float("sim/time/zulu_time_sec", "Zulu time"),
    int("sim/time/local_date_days", "Local date days"),
    // Aircraft
    string("sim/aircraft/view/acf_descrip", "Aircraft description"),
    string("sim/aircraft/view/acf_ICAO", "Aircraft ICAO code"),
    // Position
    float("sim/flightmodel/position/latitude", "Latitude"),
    float("sim/flightmodel/position/longitude", "Longitude"),
    float("sim/flightmodel/position/elevation", "Elevation MSL"),
    float("sim/flightmodel/position/y_agl", "Height AGL"),
    // Attitude
    float("sim/flightmodel/position/theta", "Pitch"),
    float("sim/flightmodel/position/phi", "Roll"),
    float("sim/flightmodel/position/psi", "Heading true"),
    float("sim/flightmodel/position/mag_psi", "Heading magnetic"),
    float("sim/flightmodel/position/hpath", "Ground track"),
    float("sim/flightmodel/position/beta", "Sideslip angle"),
    float("sim/flightmodel/position/alpha", "Angle of attack"),
    // Velocities
    float("sim/flightmodel/position/indicated_airspeed", "IAS"),
    float("sim/flightmodel/position/true_airspeed", "TAS"),
    float("sim/flightmodel/position/groundspeed", "Ground speed"),
    float("sim/flightmodel/position/vh_ind_fpm", "Vertical speed fpm"),
    float("sim/flightmodel/position/P", "Roll rate"),
    float("sim/flightmodel/position/Q", "Pitch rate"),
    float("sim/flightmodel/position/R", "Yaw rate"),
    // Load factors
    float("sim/flightmodel/forces/g_nrml", "G-force normal"),
    float("sim/flightmodel/forces/g_axil", "G-force axial"),
    float("sim/flightmodel/forces/g_side", "G-force side"),
];

const NORMAL: &[ChannelDecl] = &[
    // Flight controls
    float("sim/joystick/yoke_pitch_ratio", "Yoke pitch"),
    float("sim/joystick/yoke_roll_ratio", "Yoke roll"),
    float("sim/joystick/yoke_heading_ratio", "Rudder pedals"),
    float("sim/flightmodel/controls/parkbrake", "Parking brake"),
    float("sim/flightmodel/controls/ldgbrk", "Landing brake"),
    // Control surfaces
    float("sim/flightmodel/controls/wing1l_ail1def", "Left aileron"),
    float("sim/flightmodel/controls/wing1r_ail1def", "Right aileron"),
    float("sim/flightmodel/controls/hstab1_elv1def", "Elevator"),
    float("sim/flightmodel/controls/vstab1_rud1def", "Rudder"),
    float("sim/flightmodel/controls/flaprqst", "Flap request"),
    float("sim/flightmodel/controls/flaprat", "Flap actual"),
    float("sim/flightmodel/controls/sbrkrqst", "Speedbrake request"),
    float("sim/flightmodel/controls/sbrkrat", "Speedbrake actual"),
    // Landing gear
    float("sim/flightmodel/controls/gear_request", "Gear request"),
    float("sim/flightmodel/movingparts/gear1def", "Gear 1 deploy"),
    float("sim/flightmodel/movingparts/gear2def", "Gear 2 deploy"),
    float("sim/flightmodel/movingparts/gear3def", "Gear 3 deploy"),
    floats(
        "sim/flightmodel2/gear/tire_rotation_speed_rad_sec",
        "Tire rotation speed",
        MAX_LANDING_GEAR,
    ),
    // Throttle quadrant
    floats("sim/flightmodel/engine/ENGN_thro", "Throttle", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_thro_use", "Throttle actual", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_mixt", "Mixture", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_prop", "Prop pitch", MAX_ENGINES),
    // Engines
    ints("sim/flightmodel/engine/ENGN_running", "Engine running", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_N1_", "N1", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_N2_", "N2", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_FF_", "Fuel flow", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_EGT", "EGT", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_ITT", "ITT", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_CHT", "CHT", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_TRQ", "Torque", MAX_ENGINES),
    // Weight and fuel
    float("sim/flightmodel/weight/m_total", "Total weight"),
    float("sim/flightmodel/weight/m_fuel_total", "Total fuel weight"),
    float("sim/aircraft/weight/acf_m_fuel_tot", "Fuel quantity total"),
    // Ground contact
    int("sim/flightmodel/failures/onground_any", "On ground"),
    ints(
        "sim/flightmodel2/gear/on_ground",
        "Gear on ground",
        MAX_LANDING_GEAR,
    ),
];

const DETAILED: &[ChannelDecl] = &[
    // Autopilot
    int("sim/cockpit/autopilot/autopilot_state", "Autopilot state"),
    int("sim/cockpit/autopilot/autopilot_mode", "Autopilot mode"),
    float("sim/cockpit/autopilot/altitude", "AP altitude target"),
    float("sim/cockpit/autopilot/heading", "AP heading target"),
    float("sim/cockpit/autopilot/airspeed", "AP airspeed target"),
    float("sim/cockpit/autopilot/vertical_velocity", "AP VS target"),
    // Radios
    int("sim/cockpit/radios/nav1_freq_hz", "NAV1 frequency"),
    int("sim/cockpit/radios/nav2_freq_hz", "NAV2 frequency"),
    int("sim/cockpit/radios/com1_freq_hz", "COM1 frequency"),
    int("sim/cockpit/radios/com2_freq_hz", "COM2 frequency"),
    float("sim/cockpit/radios/nav1_dme_dist_m", "NAV1 DME distance"),
    float("sim/cockpit/radios/gps_dme_dist_m", "GPS distance"),
    // Pressurization and environment
    float(
        "sim/cockpit2/pressurization/indicators/cabin_altitude_ft",
        "Cabin altitude",
    ),
    float("sim/cockpit2/pressurization/indicators/cabin_vvi_fpm", "Cabin VS"),
    float("sim/cockpit2/temperature/outside_air_temp_degc", "OAT"),
    floats("sim/weather/wind_speed_kt", "Wind speed", 3),
    floats("sim/weather/wind_direction_degt", "Wind direction", 3),
    float("sim/weather/barometer_sealevel_inhg", "Barometer sea level"),
    // Electrical
    floats(
        "sim/cockpit2/electrical/battery_voltage_actual_volts",
        "Battery voltage",
        MAX_BATTERIES,
    ),
    floats("sim/cockpit2/electrical/battery_amps", "Battery amps", MAX_BATTERIES),
    ints("sim/cockpit2/electrical/generator_on", "Generator on", MAX_GENERATORS),
    // Hydraulics
    float(
        "sim/cockpit2/hydraulics/indicators/hydraulic_press_1",
        "Hydraulic pressure 1",
    ),
    float(
        "sim/cockpit2/hydraulics/indicators/hydraulic_press_2",
        "Hydraulic pressure 2",
    ),
    // Additional engine data
    floats("sim/flightmodel/engine/ENGN_MPR", "Manifold pressure", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_oil_press", "Oil pressure", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_oil_temp", "Oil temperature", MAX_ENGINES),
    floats("sim/flightmodel/engine/ENGN_cowl", "Cowl flaps", MAX_ENGINES),
    // Flight director
    int("sim/cockpit/autopilot/flight_director_mode", "FD mode"),
    float("sim/cockpit/autopilot/flight_director_pitch", "FD pitch"),
    float("sim/cockpit/autopilot/flight_director_roll", "FD roll"),
    // Annunciators
    int("sim/cockpit2/annunciators/master_warning", "Master warning"),
    int("sim/cockpit2/annunciators/master_caution", "Master caution"),
    int("sim/cockpit2/annunciators/stall_warning", "Stall warning"),
    int("sim/cockpit2/annunciators/low_vacuum", "Low vacuum"),
    int("sim/cockpit2/annunciators/low_voltage", "Low voltage"),
    int("sim/cockpit2/annunciators/fuel_quantity", "Fuel quantity warning"),
    // Ice protection
    int("sim/cockpit2/ice/ice_frame_anti_ice_on", "Frame anti-ice"),
    ints("sim/cockpit2/ice/ice_inlet_heat_on", "Inlet heat", MAX_ENGINES),
    ints("sim/cockpit2/ice/ice_pitot_heat_on", "Pitot heat", 2),
    float("sim/flightmodel/failures/rel_ice_frame", "Frame ice"),
    floats("sim/flightmodel/failures/rel_ice_inlet", "Inlet ice", MAX_ENGINES),
    floats("sim/flightmodel/failures/rel_ice_pitot", "Pitot ice", 2),
    // Aerodynamic forces and moments
    float("sim/flightmodel/forces/fside_aero", "Side force"),
    float("sim/flightmodel/forces/fnrml_aero", "Normal force"),
    float("sim/flightmodel/forces/faxil_aero", "Axial force"),
    float("sim/flightmodel/forces/L_total", "Roll moment"),
    float("sim/flightmodel/forces/M_total", "Pitch moment"),
    float("sim/flightmodel/forces/N_total", "Yaw moment"),
    // Switches and lights
    ints("sim/cockpit2/switches/battery_on", "Battery switches", MAX_BATTERIES),
    int("sim/cockpit2/switches/avionics_power_on", "Avionics master switch"),
    int("sim/cockpit2/switches/landing_lights_on", "Landing lights switch"),
    int("sim/cockpit2/switches/beacon_on", "Beacon light switch"),
    int("sim/cockpit2/switches/strobe_lights_on", "Strobe lights switch"),
    int("sim/cockpit2/switches/navigation_lights_on", "Nav lights switch"),
    int("sim/cockpit2/switches/taxi_light_on", "Taxi light switch"),
    // Traffic
    int("sim/cockpit2/tcas/indicators/tcas_num_acf", "Number of TCAS targets"),
    // Autopilot status
    int("sim/cockpit2/autopilot/fms_vnav", "FMS VNAV mode"),
    int(
        "sim/cockpit2/autopilot/approach_status",
        "Approach status: 0=off 1=armed 2=captured",
    ),
    int(
        "sim/cockpit2/autopilot/nav_status",
        "Nav status: 0=off 1=armed 2=captured",
    ),
    // Failures
    int("sim/operation/failures/rel_servo_ailn", "Autopilot servo failed - ailerons"),
    int("sim/operation/failures/rel_servo_elev", "Autopilot servo failed - elevators"),
    int("sim/operation/failures/rel_servo_rudd", "Autopilot servo failed - rudder"),
    int("sim/operation/failures/rel_ss_dgy", "Directional gyro failure"),
    int("sim/operation/failures/rel_ss_ahz", "Artificial horizon failure"),
    int("sim/operation/failures/rel_ss_asi", "Airspeed indicator failure"),
    int("sim/operation/failures/rel_ss_alt", "Altimeter failure"),
    // Engine extended
    floats(
        "sim/flightmodel2/engines/thrust_reverser_deploy_ratio",
        "Thrust reverser position",
        MAX_ENGINES,
    ),
    ints(
        "sim/flightmodel2/engines/engine_is_burning_fuel",
        "Engine burning fuel status",
        MAX_ENGINES,
    ),
    // Trim
    float("sim/cockpit2/controls/elevator_trim", "Elevator trim"),
    float("sim/cockpit2/controls/aileron_trim", "Aileron trim"),
    float("sim/cockpit2/controls/rudder_trim", "Rudder trim"),
    // GPS indicators
    float(
        "sim/cockpit2/radios/indicators/gps_dme_distance_nm",
        "GPS DME distance",
    ),
    float(
        "sim/cockpit2/radios/indicators/gps_hdef_dots_pilot",
        "GPS HDEF dots pilot",
    ),
    float("sim/cockpit2/radios/actuators/gps_course_degtm", "GPS course"),
    float(
        "sim/cockpit2/radios/indicators/gps_vdef_dots_pilot",
        "GPS VDEF dots pilot",
    ),
    // Weight and balance
    float("sim/flightmodel/weight/m_fixed", "Payload weight"),
    float("sim/flightmodel/weight/m_jettison", "Jettisoned weight"),
    float("sim/flightmodel/misc/cgz_ref_to_default", "CG position longitudinal"),
    // Local velocities
    float("sim/flightmodel/position/local_vx", "Local velocity X"),
    float("sim/flightmodel/position/local_vy", "Local velocity Y"),
    float("sim/flightmodel/position/local_vz", "Local velocity Z"),
    float("sim/flightmodel2/position/mag_psi", "Magnetic heading"),
    // Replay
    int("sim/time/is_in_replay", "In replay mode"),
    // Weather
    float("sim/weather/visibility_reported_m", "Visibility in meters"),
    floats("sim/weather/cloud_base_msl_m", "Cloud base MSL", 3),
    floats("sim/weather/cloud_coverage", "Cloud coverage", 3),
    ints("sim/weather/cloud_type", "Cloud type", 3),
    float("sim/weather/temperature_sealevel_c", "Temperature at sea level"),
    float("sim/weather/temperature_ambient_c", "Ambient temperature"),
    // Pressurization controls
    float(
        "sim/cockpit2/pressurization/actuators/safety_valve",
        "Safety valve position",
    ),
    float("sim/cockpit2/pressurization/actuators/dump_all", "Dump all valve"),
    // Engine fuel and nacelle
    floats(
        "sim/flightmodel2/engines/fuel_flow_kg_sec",
        "Fuel flow kg/sec",
        MAX_ENGINES,
    ),
    floats(
        "sim/flightmodel2/engines/nacelle_temp_c",
        "Nacelle temperature",
        MAX_ENGINES,
    ),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_channel_names_are_unique() {
        let mut seen = HashSet::new();
        for tier in RecordingLevel::ALL {
            for decl in tier_table(tier) {
                assert!(seen.insert(decl.name), "duplicate channel {}", decl.name);
            }
        }
    }

    #[test]
    fn test_strings_are_scalar() {
        for tier in RecordingLevel::ALL {
            for decl in tier_table(tier) {
                if decl.kind == ValueKind::String {
                    assert_eq!(decl.array_size, 0, "{}", decl.name);
                }
            }
        }
    }

    #[test]
    fn test_simple_tier_size() {
        assert_eq!(tier_table(RecordingLevel::Simple).len(), 26);
    }
}
