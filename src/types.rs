//! Core data types: inbound feed frames, the canonical report record, and
//! the query vocabulary shared by the engine and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Stable identifier of a reporting source (`stn` on the wire).
///
/// The feed emits it as either a JSON number or a string; both canonicalize
/// to the same key so a source cannot appear twice in the live store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Float(f64),
            Text(String),
        }

        let canonical = match Repr::deserialize(deserializer)? {
            Repr::Int(n) => n.to_string(),
            Repr::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
            Repr::Float(f) => f.to_string(),
            Repr::Text(s) => s,
        };
        Ok(Self(canonical))
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(serde_json::Value::as_f64))
}

fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_stn<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<StationId>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(v @ serde_json::Value::Number(_)) | Some(v @ serde_json::Value::String(_)) => {
            serde_json::from_value(v).ok()
        }
        _ => None,
    })
}

/// One inbound feed frame, parsed leniently.
///
/// Required fields stay `Option` here so the normalizer — not the JSON
/// layer — decides whether a frame is usable. `generalType` and
/// `general_type` both occur upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReport {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bearing: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub range: Option<f64>,
    #[serde(default, deserialize_with = "lenient_stn")]
    pub stn: Option<StationId>,
    #[serde(default, deserialize_with = "lenient_code")]
    pub category: Option<String>,
    #[serde(
        default,
        rename = "generalType",
        alias = "general_type",
        deserialize_with = "lenient_code"
    )]
    pub general_type: Option<String>,
}

/// Canonical record for one source: the latest normalized report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub stn: StationId,
    /// Degrees clockwise from true north, in `[0, 360)`.
    pub bearing: f64,
    /// Meters from the station.
    pub range: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Zero-padded to at least two digits.
    pub category: String,
    /// Zero-padded to at least two digits.
    pub general_type: String,
    /// Receipt time, assigned at normalization.
    pub timestamp: DateTime<Utc>,
}

/// The closed set of sortable/filterable report fields.
///
/// Unknown keys fail to deserialize, so a client cannot probe fields the
/// record does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    Stn,
    Bearing,
    Range,
    Latitude,
    Longitude,
    Category,
    GeneralType,
    Timestamp,
}

/// Typed view of one report field, used by the sort comparator.
#[derive(Debug, Clone)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(Cow<'a, str>),
}

impl FieldValue<'_> {
    /// Numeric reading of the value, if it has one. Numeric strings (such
    /// as station ids) count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Text(s) => Cow::Borrowed(s.as_ref()),
        }
    }
}

impl FieldKey {
    /// Typed accessor for the field on a report.
    pub fn value_of<'a>(&self, report: &'a Report) -> FieldValue<'a> {
        match self {
            FieldKey::Stn => FieldValue::Text(Cow::Borrowed(report.stn.as_str())),
            FieldKey::Bearing => FieldValue::Number(report.bearing),
            FieldKey::Range => FieldValue::Number(report.range),
            FieldKey::Latitude => FieldValue::Number(report.latitude),
            FieldKey::Longitude => FieldValue::Number(report.longitude),
            FieldKey::Category => FieldValue::Text(Cow::Borrowed(&report.category)),
            FieldKey::GeneralType => FieldValue::Text(Cow::Borrowed(&report.general_type)),
            FieldKey::Timestamp => FieldValue::Text(Cow::Owned(report.timestamp.to_rfc3339())),
        }
    }

    /// String form of the field, as used for substring filtering.
    pub fn text_of(&self, report: &Report) -> String {
        self.value_of(report).as_text().into_owned()
    }
}

/// One column of a sort specification: `{id, desc}` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub id: FieldKey,
    #[serde(default)]
    pub desc: bool,
}

/// One filter clause: `{id, value}` on the wire. Clauses are ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub id: FieldKey,
    pub value: String,
}

/// Bounding-box fields as received from a client, before validation.
/// Any missing or non-numeric field invalidates the whole box.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaRequest {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_lon: Option<f64>,
}

impl AreaRequest {
    pub fn validate(&self) -> Option<AreaBounds> {
        match (self.min_lat, self.max_lat, self.min_lon, self.max_lon) {
            (Some(min_lat), Some(max_lat), Some(min_lon), Some(max_lon))
                if [min_lat, max_lat, min_lon, max_lon].iter().all(|v| v.is_finite()) =>
            {
                Some(AreaBounds::new(min_lat, max_lat, min_lon, max_lon))
            }
            _ => None,
        }
    }
}

/// Validated geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl AreaBounds {
    /// Global box covering the entire world.
    pub const GLOBAL: Self = Self {
        min_lat: -90.0,
        max_lat: 90.0,
        min_lon: -180.0,
        max_lon: 180.0,
    };

    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Containment test; min/max are swapped defensively so callers may
    /// pass the corners in either order.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if !latitude.is_finite() || !longitude.is_finite() {
            return false;
        }
        let (lat_lo, lat_hi) = (
            self.min_lat.min(self.max_lat),
            self.min_lat.max(self.max_lat),
        );
        let (lon_lo, lon_hi) = (
            self.min_lon.min(self.max_lon),
            self.min_lon.max(self.max_lon),
        );
        (lat_lo..=lat_hi).contains(&latitude) && (lon_lo..=lon_hi).contains(&longitude)
    }
}
