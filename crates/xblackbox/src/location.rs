//! Nearest-airport lookup used to tag sessions with departure and arrival.
//!
//! Lookups run inside the recorder's tick, so they only ever touch an index
//! that is already in memory.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Farthest a facility may be from the aircraft and still match.
pub const MAX_MATCH_DISTANCE_NM: f64 = 5.0;

/// The kind of a navigation facility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    /// Land airport.
    #[default]
    Airport,
    /// Heliport.
    Heliport,
    /// Seaplane base.
    SeaplaneBase,
}

/// A navigation facility with a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Identifier, e.g. an ICAO code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Facility kind.
    #[serde(default)]
    pub kind: FacilityKind,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A resolved session location.
///
/// An invalid record has empty strings and zero coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Facility identifier.
    pub code: String,
    /// Facility display name.
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Whether a facility matched.
    pub valid: bool,
}

impl LocationRecord {
    /// The "not found" record.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Build a record from a candidate facility at a known distance.
    ///
    /// The candidate is accepted when it is at most
    /// [`MAX_MATCH_DISTANCE_NM`] away.
    #[must_use]
    pub fn from_candidate(facility: &Facility, distance_nm: f64) -> Self {
        if distance_nm <= MAX_MATCH_DISTANCE_NM {
            Self {
                code: facility.code.clone(),
                name: facility.name.clone(),
                latitude: facility.latitude,
                longitude: facility.longitude,
                valid: true,
            }
        } else {
            Self::invalid()
        }
    }
}

impl std::fmt::Display for LocationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid {
            write!(f, "{} ({})", self.code, self.name)
        } else {
            write!(f, "unknown")
        }
    }
}

/// Great-circle distance between two points, in nautical miles.
#[must_use]
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

/// A queryable, memory-resident navigation database.
pub trait NavigationIndex {
    /// The facility of `kind` nearest to a position, if any exists.
    fn nearest(&self, kind: FacilityKind, latitude: f64, longitude: f64) -> Option<&Facility>;
}

/// Resolve the airport at a position.
///
/// Best-effort: returns [`LocationRecord::invalid`] when the index has no
/// airport within [`MAX_MATCH_DISTANCE_NM`].
pub fn resolve(index: &impl NavigationIndex, latitude: f64, longitude: f64) -> LocationRecord {
    let Some(facility) = index.nearest(FacilityKind::Airport, latitude, longitude) else {
        debug!(latitude, longitude, "No airport in navigation index");
        return LocationRecord::invalid();
    };

    let distance = haversine_nm(latitude, longitude, facility.latitude, facility.longitude);
    let record = LocationRecord::from_candidate(facility, distance);
    debug!(
        code = %facility.code,
        distance_nm = distance,
        matched = record.valid,
        "Nearest airport lookup"
    );
    record
}

/// An in-memory facility list searched linearly.
#[derive(Debug, Clone, Default)]
pub struct FacilityIndex {
    facilities: Vec<Facility>,
}

impl FacilityIndex {
    /// Create an index over the given facilities.
    #[must_use]
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    /// A small table of major airports.
    #[must_use]
    pub fn builtin() -> Self {
        let airport = |code: &str, name: &str, latitude: f64, longitude: f64| Facility {
            code: code.to_string(),
            name: name.to_string(),
            kind: FacilityKind::Airport,
            latitude,
            longitude,
        };
        Self::new(vec![
            airport("KSEA", "Seattle-Tacoma Intl", 47.4490, -122.3093),
            airport("KBFI", "Boeing Field King County Intl", 47.5300, -122.3020),
            airport("KPAE", "Snohomish County (Paine Field)", 47.9063, -122.2816),
            airport("KPDX", "Portland Intl", 45.5887, -122.5975),
            airport("KSFO", "San Francisco Intl", 37.6213, -122.3790),
            airport("KOAK", "Metropolitan Oakland Intl", 37.7213, -122.2208),
            airport("KLAX", "Los Angeles Intl", 33.9425, -118.4081),
            airport("KJFK", "John F Kennedy Intl", 40.6413, -73.7781),
            airport("EGLL", "London Heathrow", 51.4700, -0.4543),
            airport("LFPG", "Paris Charles de Gaulle", 49.0097, 2.5479),
            airport("EDDF", "Frankfurt am Main", 50.0379, 8.5622),
            airport("LSZH", "Zurich", 47.4647, 8.5492),
            airport("RJTT", "Tokyo Haneda", 35.5494, 139.7798),
            airport("YSSY", "Sydney Kingsford Smith", -33.9399, 151.1753),
        ])
    }

    /// Load a facility list from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a list of
    /// facilities.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::NavIndexLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let facilities: Vec<Facility> =
            serde_json::from_str(&text).map_err(|e| Error::NavIndexLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), count = facilities.len(), "Loaded navigation index");
        Ok(Self::new(facilities))
    }

    /// Number of facilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    /// Look up a facility by code, ignoring ASCII case.
    #[must_use]
    pub fn find(&self, code: &str) -> Option<&Facility> {
        self.facilities
            .iter()
            .find(|f| f.code.eq_ignore_ascii_case(code))
    }
}

impl NavigationIndex for FacilityIndex {
    fn nearest(&self, kind: FacilityKind, latitude: f64, longitude: f64) -> Option<&Facility> {
        self.facilities
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| (haversine_nm(latitude, longitude, f.latitude, f.longitude), f))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, f)| f)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn facility(code: &str, latitude: f64, longitude: f64) -> Facility {
        Facility {
            code: code.to_string(),
            name: format!("{code} test field"),
            kind: FacilityKind::Airport,
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_haversine_zero_distance() {
        assert!(haversine_nm(47.0, 8.0, 47.0, 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree along a meridian is R * pi / 180.
        let expected = EARTH_RADIUS_NM * std::f64::consts::PI / 180.0;
        let d = haversine_nm(10.0, 20.0, 11.0, 20.0);
        assert!((d - expected).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_haversine_known_pair() {
        // SEA to PDX is roughly 112 NM.
        let d = haversine_nm(47.4490, -122.3093, 45.5887, -122.5975);
        assert!((105.0..120.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_acceptance_boundary() {
        let f = facility("LSZH", 47.4647, 8.5492);

        let at_limit = LocationRecord::from_candidate(&f, 5.0);
        assert!(at_limit.valid);
        assert_eq!(at_limit.code, "LSZH");

        let beyond = LocationRecord::from_candidate(&f, 5.001);
        assert!(!beyond.valid);
        assert_eq!(beyond, LocationRecord::invalid());
    }

    #[test]
    fn test_invalid_record_is_empty() {
        let r = LocationRecord::invalid();
        assert!(!r.valid);
        assert!(r.code.is_empty());
        assert!(r.name.is_empty());
        assert_eq!(r.latitude, 0.0);
        assert_eq!(r.longitude, 0.0);
        assert_eq!(r.to_string(), "unknown");
    }

    #[test]
    fn test_resolve_nearby_airport() {
        let index = FacilityIndex::builtin();
        // A short taxi away from the Zurich reference point.
        let r = resolve(&index, 47.4600, 8.5550);
        assert!(r.valid);
        assert_eq!(r.code, "LSZH");
    }

    #[test]
    fn test_find_by_code() {
        let index = FacilityIndex::builtin();
        assert_eq!(index.find("ksea").map(|f| f.name.as_str()), Some("Seattle-Tacoma Intl"));
        assert!(index.find("ZZZZ").is_none());
    }

    #[test]
    fn test_resolve_picks_nearest() {
        let index = FacilityIndex::builtin();
        let r = resolve(&index, 47.5300, -122.3020);
        assert_eq!(r.code, "KBFI");
    }

    #[test]
    fn test_resolve_too_far() {
        let index = FacilityIndex::new(vec![facility("TEST", 10.0, 10.0)]);
        // 0.1 degree of latitude is about 6 NM.
        let r = resolve(&index, 10.1, 10.0);
        assert!(!r.valid);

        let r = resolve(&index, 10.08, 10.0);
        assert!(r.valid);
    }

    #[test]
    fn test_resolve_empty_index() {
        let index = FacilityIndex::default();
        assert!(index.is_empty());
        assert!(!resolve(&index, 0.0, 0.0).valid);
    }

    #[test]
    fn test_nearest_filters_kind() {
        let mut heli = facility("H1", 1.0, 1.0);
        heli.kind = FacilityKind::Heliport;
        let index = FacilityIndex::new(vec![heli, facility("A1", 1.5, 1.0)]);

        let f = index.nearest(FacilityKind::Airport, 1.0, 1.0).unwrap();
        assert_eq!(f.code, "A1");
        let f = index.nearest(FacilityKind::Heliport, 1.5, 1.0).unwrap();
        assert_eq!(f.code, "H1");
        assert!(index.nearest(FacilityKind::SeaplaneBase, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"code":"LOWI","name":"Innsbruck","latitude":47.2602,"longitude":11.3439}},
                {{"code":"LOWS","name":"Salzburg","kind":"airport","latitude":47.7933,"longitude":13.0043}}]"#
        )
        .unwrap();

        let index = FacilityIndex::from_json_file(file.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(resolve(&index, 47.2600, 11.3400).code, "LOWI");
    }

    #[test]
    fn test_from_json_file_errors() {
        let err = FacilityIndex::from_json_file("/nonexistent/airports.json").unwrap_err();
        assert!(matches!(err, Error::NavIndexLoad { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"not\": \"a list\"}}").unwrap();
        let err = FacilityIndex::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("navigation index"));
    }
}
