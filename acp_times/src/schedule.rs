// Whole-brevet schedules: one start time and brevet length, many controls.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::clock::{parse_start_time, serialize_iso, to_utc};
use crate::{normalize, BrevetDistance, BrevetError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrevetPlan {
    #[serde(default)]
    pub name: Option<String>,
    pub brevet_km: u32,
    pub start: String,
    pub controls_km: Vec<f64>,
}

impl BrevetPlan {
    pub fn from_json(text: &str) -> Result<Self, BrevetError> {
        serde_json::from_str(text).map_err(|e| BrevetError::PlanParse(e.to_string()))
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScheduleRow {
    pub controle_km: f64,
    /// Distance the control was timed at after clamping.
    pub timed_km: f64,
    #[serde(serialize_with = "serialize_iso")]
    pub open: DateTime<FixedOffset>,
    #[serde(serialize_with = "serialize_iso")]
    pub close: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Schedule {
    pub name: Option<String>,
    pub brevet_km: u32,
    #[serde(serialize_with = "serialize_iso")]
    pub start: DateTime<FixedOffset>,
    pub rows: Vec<ScheduleRow>,
}

impl Schedule {
    pub fn to_utc(&self) -> Self {
        Self {
            name: self.name.clone(),
            brevet_km: self.brevet_km,
            start: to_utc(&self.start),
            rows: self
                .rows
                .iter()
                .map(|row| ScheduleRow {
                    open: to_utc(&row.open),
                    close: to_utc(&row.close),
                    ..row.clone()
                })
                .collect(),
        }
    }
}

/// Compute open/close times for every control of a plan, in plan order.
///
/// Fails on the first control that does not validate.
pub fn compute_schedule(plan: &BrevetPlan) -> Result<Schedule, BrevetError> {
    let brevet = BrevetDistance::try_from(plan.brevet_km)?;
    let start = parse_start_time(&plan.start)?;

    let rows = plan
        .controls_km
        .iter()
        .map(|&controle_km| {
            let controle = normalize(controle_km, brevet.km())?;
            let times = controle.times(start);
            Ok(ScheduleRow {
                controle_km,
                timed_km: controle.controle_km,
                open: times.open,
                close: times.close,
            })
        })
        .collect::<Result<Vec<_>, BrevetError>>()?;

    Ok(Schedule {
        name: plan.name.clone(),
        brevet_km: brevet.km(),
        start,
        rows,
    })
}
