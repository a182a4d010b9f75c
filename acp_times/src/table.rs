// ACP control-time rate table and the piecewise integration over it.
// Bands follow the table at https://rusa.org/octime_alg.html: each band carries
// the minimum and maximum average speed a rider may hold across it.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Band {
    pub start_km: f64,
    pub end_km: f64,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
}

/// Which speed column of the table to integrate against.
///
/// Opening times use the maximum speed (the fastest legal rider arrives
/// first); closing times use the minimum speed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedColumn {
    Min,
    Max,
}

pub const RATE_TABLE: [Band; 4] = [
    Band::new(0.0, 200.0, 15.0, 34.0),
    Band::new(200.0, 400.0, 15.0, 32.0),
    Band::new(400.0, 600.0, 15.0, 30.0),
    Band::new(600.0, 1000.0, 11.428, 28.0),
];

impl Band {
    const fn new(start_km: f64, end_km: f64, min_speed_kmh: f64, max_speed_kmh: f64) -> Self {
        Self {
            start_km,
            end_km,
            min_speed_kmh,
            max_speed_kmh,
        }
    }

    pub fn speed(&self, column: SpeedColumn) -> f64 {
        match column {
            SpeedColumn::Min => self.min_speed_kmh,
            SpeedColumn::Max => self.max_speed_kmh,
        }
    }

    pub fn length_km(&self) -> f64 {
        self.end_km - self.start_km
    }

    /// Hours credited by this band to a control at `controle_km`.
    ///
    /// A control sitting exactly on the band's end gets the whole band; one
    /// sitting exactly on its start gets nothing.
    pub fn hours_to(&self, controle_km: f64, column: SpeedColumn) -> f64 {
        let speed = self.speed(column);
        if controle_km >= self.end_km {
            self.length_km() / speed
        } else if controle_km > self.start_km {
            (controle_km - self.start_km) / speed
        } else {
            0.0
        }
    }
}

/// Elapsed hours from the start line to `controle_km`, summed band by band.
///
/// No validation happens here; distances past the end of the table get no
/// credit beyond it.
pub fn integrate(controle_km: f64, column: SpeedColumn) -> f64 {
    RATE_TABLE
        .iter()
        .fold(0.0, |hours, band| hours + band.hours_to(controle_km, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_contiguous() {
        assert_eq!(RATE_TABLE[0].start_km, 0.0);
        for pair in RATE_TABLE.windows(2) {
            assert_eq!(pair[0].end_km, pair[1].start_km);
            assert!(pair[0].start_km < pair[0].end_km);
        }
        assert_eq!(RATE_TABLE[RATE_TABLE.len() - 1].end_km, 1000.0);
    }

    #[test]
    fn test_min_speed_never_exceeds_max() {
        for band in RATE_TABLE.iter() {
            assert!(band.min_speed_kmh <= band.max_speed_kmh);
        }
    }

    #[test]
    fn test_integrate_zero() {
        assert_eq!(integrate(0.0, SpeedColumn::Max), 0.0);
        assert_eq!(integrate(0.0, SpeedColumn::Min), 0.0);
    }

    #[test]
    fn test_integrate_partial_band() {
        assert_eq!(integrate(250.0, SpeedColumn::Max), 200.0 / 34.0 + 50.0 / 32.0);
        assert_eq!(integrate(60.0, SpeedColumn::Min), 60.0 / 15.0);
    }

    #[test]
    fn test_boundary_credited_to_lower_band() {
        assert_eq!(integrate(200.0, SpeedColumn::Max), 200.0 / 34.0);
        assert_eq!(
            integrate(400.0, SpeedColumn::Max),
            200.0 / 34.0 + 200.0 / 32.0
        );
        assert_eq!(
            integrate(600.0, SpeedColumn::Min),
            200.0 / 15.0 + 200.0 / 15.0 + 200.0 / 15.0
        );
        assert_eq!(
            integrate(1000.0, SpeedColumn::Max),
            200.0 / 34.0 + 200.0 / 32.0 + 200.0 / 30.0 + 400.0 / 28.0
        );
    }

    #[test]
    fn test_boundary_continuity() {
        for band in RATE_TABLE.iter() {
            for column in [SpeedColumn::Min, SpeedColumn::Max] {
                let full: f64 = RATE_TABLE
                    .iter()
                    .take_while(|b| b.end_km <= band.end_km)
                    .fold(0.0, |acc, b| acc + b.length_km() / b.speed(column));
                assert_eq!(integrate(band.end_km, column), full);
            }
        }
    }

    #[test]
    fn test_no_credit_past_table_end() {
        assert_eq!(
            integrate(1200.0, SpeedColumn::Min),
            integrate(1000.0, SpeedColumn::Min)
        );
    }
}
