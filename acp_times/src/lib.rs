//! Open and close control times for ACP-sanctioned brevets.
//!
//! Times follow the rules at <https://rusa.org/octime_alg.html>: a control
//! opens when a rider holding the band's maximum speed would reach it and
//! closes when a rider holding the minimum speed would.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod clock;
pub mod schedule;
pub mod table;

pub use clock::{add_hours, parse_start_time, to_iso, to_utc};
pub use schedule::{compute_schedule, BrevetPlan, Schedule, ScheduleRow};
pub use table::{integrate, Band, SpeedColumn, RATE_TABLE};

/// Close time of a 200 km control on a 200 km brevet (13H30).
pub const CLOSE_200_ON_200_HOURS: f64 = 13.5;
/// Riders have one hour to leave the start line.
pub const START_CLOSE_HOURS: f64 = 1.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrevetError {
    #[error("illegal brevet length {0} km (expected 200, 300, 400, 600 or 1000)")]
    InvalidBrevetLength(u32),
    #[error("controle at {controle_km} km exceeds 120% of the brevet distance ({limit_km} km)")]
    ControleExceedsLimit { controle_km: f64, limit_km: u32 },
    #[error("invalid controle distance: {0} km")]
    InvalidControleDistance(f64),
    #[error("invalid start time: {0:?}")]
    InvalidStartTime(String),
    #[error("failed to parse brevet plan: {0}")]
    PlanParse(String),
}

/// The official ACP brevet lengths.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u32", into = "u32")]
pub enum BrevetDistance {
    Km200,
    Km300,
    Km400,
    Km600,
    Km1000,
}

impl BrevetDistance {
    pub const ALL: [BrevetDistance; 5] = [
        BrevetDistance::Km200,
        BrevetDistance::Km300,
        BrevetDistance::Km400,
        BrevetDistance::Km600,
        BrevetDistance::Km1000,
    ];

    pub const fn km(self) -> u32 {
        match self {
            BrevetDistance::Km200 => 200,
            BrevetDistance::Km300 => 300,
            BrevetDistance::Km400 => 400,
            BrevetDistance::Km600 => 600,
            BrevetDistance::Km1000 => 1000,
        }
    }

    /// Furthest a control may sit: 120% of the nominal length.
    pub const fn controle_limit_km(self) -> u32 {
        self.km() * 6 / 5
    }
}

impl TryFrom<u32> for BrevetDistance {
    type Error = BrevetError;

    fn try_from(km: u32) -> Result<Self, Self::Error> {
        BrevetDistance::ALL
            .into_iter()
            .find(|distance| distance.km() == km)
            .ok_or(BrevetError::InvalidBrevetLength(km))
    }
}

impl From<BrevetDistance> for u32 {
    fn from(distance: BrevetDistance) -> Self {
        distance.km()
    }
}

/// A control whose distance has been validated against its brevet.
///
/// `controle_km` is the distance actually timed, which differs from the
/// requested one when a control past the finish was clamped back to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Controle {
    pub controle_km: f64,
    pub brevet: BrevetDistance,
}

impl Controle {
    pub fn open_hours(&self) -> f64 {
        integrate(self.controle_km, SpeedColumn::Max)
    }

    pub fn close_hours(&self) -> f64 {
        let mut hours = integrate(self.controle_km, SpeedColumn::Min);
        if self.controle_km == 200.0 && self.brevet == BrevetDistance::Km200 {
            hours = CLOSE_200_ON_200_HOURS;
        }
        if self.controle_km == 0.0 {
            hours = START_CLOSE_HOURS;
        }
        hours
    }

    pub fn times(&self, start: DateTime<FixedOffset>) -> ControlTimes {
        ControlTimes {
            open: add_hours(self.open_hours(), start),
            close: add_hours(self.close_hours(), start),
        }
    }
}

/// Open and close instants of one control, in the start time's zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ControlTimes {
    #[serde(serialize_with = "clock::serialize_iso")]
    pub open: DateTime<FixedOffset>,
    #[serde(serialize_with = "clock::serialize_iso")]
    pub close: DateTime<FixedOffset>,
}

impl ControlTimes {
    pub fn to_utc(&self) -> Self {
        Self {
            open: to_utc(&self.open),
            close: to_utc(&self.close),
        }
    }
}

/// Validate a control against its brevet, clamping controls up to 20% past
/// the finish back to the nominal distance.
pub fn normalize(controle_km: f64, brevet_km: u32) -> Result<Controle, BrevetError> {
    let brevet = BrevetDistance::try_from(brevet_km)?;
    if !controle_km.is_finite() || controle_km < 0.0 {
        return Err(BrevetError::InvalidControleDistance(controle_km));
    }
    let nominal = f64::from(brevet.km());
    let limit = f64::from(brevet.controle_limit_km());
    let controle_km = if controle_km > nominal && controle_km < limit {
        nominal
    } else if controle_km > limit {
        return Err(BrevetError::ControleExceedsLimit {
            controle_km,
            limit_km: brevet.controle_limit_km(),
        });
    } else {
        controle_km
    };
    Ok(Controle {
        controle_km,
        brevet,
    })
}

/// Hours after the start at which the control opens.
pub fn calc_open(controle_km: f64, brevet_km: u32) -> Result<f64, BrevetError> {
    Ok(normalize(controle_km, brevet_km)?.open_hours())
}

/// Hours after the start at which the control closes.
pub fn calc_close(controle_km: f64, brevet_km: u32) -> Result<f64, BrevetError> {
    Ok(normalize(controle_km, brevet_km)?.close_hours())
}

pub fn control_times(
    controle_km: f64,
    brevet_km: u32,
    start: DateTime<FixedOffset>,
) -> Result<ControlTimes, BrevetError> {
    Ok(normalize(controle_km, brevet_km)?.times(start))
}

/// ISO-8601 opening time of a control, in the same zone as `start`.
pub fn open_time(controle_km: f64, brevet_km: u32, start: &str) -> Result<String, BrevetError> {
    let hours = calc_open(controle_km, brevet_km)?;
    let start = parse_start_time(start)?;
    Ok(to_iso(&add_hours(hours, start)))
}

/// ISO-8601 closing time of a control, in the same zone as `start`.
pub fn close_time(controle_km: f64, brevet_km: u32, start: &str) -> Result<String, BrevetError> {
    let hours = calc_close(controle_km, brevet_km)?;
    let start = parse_start_time(start)?;
    Ok(to_iso(&add_hours(hours, start)))
}
