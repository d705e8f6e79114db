//! Coordinate extraction from heterogeneous event records.
//!
//! Records carry coordinates under different names depending on which
//! endpoint produced them. Resolution walks [`COORDINATE_RULES`] in order and
//! takes the first rule that yields a finite pair.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// `None` unless both components are finite.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        (lat.is_finite() && lon.is_finite()).then_some(Self { lat, lon })
    }
}

/// One named way of reading a coordinate pair out of a record.
#[derive(Debug, Clone, Copy)]
pub enum CoordinateRule {
    /// Two sibling fields holding latitude and longitude.
    Fields {
        name: &'static str,
        lat: &'static str,
        lon: &'static str,
    },
    /// A GeoJSON-style `[lon, lat]` array reached by following `path`.
    LonLatPair {
        name: &'static str,
        path: &'static [&'static str],
    },
}

pub const COORDINATE_RULES: &[CoordinateRule] = &[
    CoordinateRule::Fields { name: "lat/lon", lat: "lat", lon: "lon" },
    CoordinateRule::Fields { name: "lat/lng", lat: "lat", lon: "lng" },
    CoordinateRule::Fields { name: "latitude/longitude", lat: "latitude", lon: "longitude" },
    CoordinateRule::Fields { name: "latitudine/longitudine", lat: "latitudine", lon: "longitudine" },
    CoordinateRule::LonLatPair { name: "location.coordinates", path: &["location", "coordinates"] },
    CoordinateRule::LonLatPair { name: "geo.coordinates", path: &["geo", "coordinates"] },
    CoordinateRule::LonLatPair { name: "coordinates", path: &["coordinates"] },
];

impl CoordinateRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fields { name, .. } | Self::LonLatPair { name, .. } => name,
        }
    }

    pub fn apply(&self, fields: &Map<String, Value>) -> Option<GeoPoint> {
        match self {
            Self::Fields { lat, lon, .. } => {
                let lat = fields.get(*lat).and_then(parse_decimal)?;
                let lon = fields.get(*lon).and_then(parse_decimal)?;
                GeoPoint::new(lat, lon)
            }
            Self::LonLatPair { path, .. } => {
                let (first, rest) = path.split_first()?;
                let mut node = fields.get(*first)?;
                for key in rest {
                    node = node.get(*key)?;
                }
                match node.as_array()?.as_slice() {
                    [lon, lat, ..] => GeoPoint::new(parse_decimal(lat)?, parse_decimal(lon)?),
                    _ => None,
                }
            }
        }
    }
}

pub fn resolve_coordinates(fields: &Map<String, Value>) -> Option<GeoPoint> {
    COORDINATE_RULES.iter().find_map(|rule| {
        let point = rule.apply(fields)?;
        tracing::trace!(rule = rule.name(), lat = point.lat, lon = point.lon, "Coordinates resolved");
        Some(point)
    })
}

/// Read a number from a JSON number or a string, accepting a comma as the
/// decimal separator (`"41,9"`). Non-finite results are rejected.
pub fn parse_decimal(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Axis-aligned lat/lon box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        for p in iter {
            bounds.south = bounds.south.min(p.lat);
            bounds.north = bounds.north.max(p.lat);
            bounds.west = bounds.west.min(p.lon);
            bounds.east = bounds.east.max(p.lon);
        }
        Some(bounds)
    }

    /// Grow each side by `ratio` of the box's span.
    pub fn padded(&self, ratio: f64) -> Self {
        let dlat = (self.north - self.south) * ratio;
        let dlon = (self.east - self.west) * ratio;
        Self {
            south: self.south - dlat,
            west: self.west - dlon,
            north: self.north + dlat,
            east: self.east + dlon,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }
}
