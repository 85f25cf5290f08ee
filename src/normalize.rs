//! Turns raw feed frames into canonical [`Report`]s: bearing wrap, unit
//! conversion, geodesic projection from the fixed station, code padding,
//! and receipt timestamping.

use crate::geodesy::{self, ProjectionError, RangeUnit};
use crate::types::{RawReport, Report};
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing or non-numeric field: {0}")]
    MissingField(&'static str),
    #[error("negative range: {0}")]
    NegativeRange(f64),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// The fixed observation station all reports are relative to.
#[derive(Debug, Clone, Copy)]
pub struct Station {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Station {
    fn default() -> Self {
        Self {
            latitude: -6.0,
            longitude: 107.0,
        }
    }
}

/// Stateless report normalizer bound to one station and one inbound
/// range unit.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    station: Station,
    range_unit: RangeUnit,
}

impl Normalizer {
    pub fn new(station: Station, range_unit: RangeUnit) -> Self {
        Self {
            station,
            range_unit,
        }
    }

    pub fn station(&self) -> Station {
        self.station
    }

    /// Normalize one raw frame. `stn`, `bearing`, and `range` are
    /// required; a failure here must leave the live store untouched, so
    /// the caller drops the frame and moves on.
    pub fn normalize(&self, raw: &RawReport) -> Result<Report, NormalizeError> {
        let stn = raw.stn.clone().ok_or(NormalizeError::MissingField("stn"))?;
        let bearing = geodesy::wrap_bearing(
            raw.bearing.ok_or(NormalizeError::MissingField("bearing"))?,
        );
        let range = raw.range.ok_or(NormalizeError::MissingField("range"))?;
        if range < 0.0 {
            return Err(NormalizeError::NegativeRange(range));
        }
        let range_meters = geodesy::to_meters(range, self.range_unit);

        let (latitude, longitude) = geodesy::destination(
            self.station.latitude,
            self.station.longitude,
            bearing,
            range_meters,
        )?;

        Ok(Report {
            stn,
            bearing,
            range: range_meters,
            latitude,
            longitude,
            category: pad_code(raw.category.as_deref()),
            general_type: pad_code(raw.general_type.as_deref()),
            timestamp: Utc::now(),
        })
    }
}

/// Zero-pad a categorical code to at least two characters; absent codes
/// read as `0`.
fn pad_code(code: Option<&str>) -> String {
    format!("{:0>2}", code.unwrap_or("0"))
}
