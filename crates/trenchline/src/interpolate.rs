//! Ground and excavation profiles interpolated from structure levels.

use crate::error::{ProfileError, Result};
use crate::model::{Structure, MIN_STRUCTURES};

/// One interpolation knot taken from a structure.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Knot {
    station: f64,
    ground: f64,
    excavation: f64,
}

/// Piecewise-linear profile through structure cover and excavation levels.
///
/// Knots are sorted by station with a stable sort, so structures sharing a
/// station keep their input order. Queries outside the knot range clamp to
/// the nearest end knot.
#[derive(Debug, Clone)]
pub struct ProfileInterpolator {
    knots: Vec<Knot>,
}

impl ProfileInterpolator {
    /// Build an interpolator from at least two structures.
    pub fn new(structures: &[Structure]) -> Result<Self> {
        if structures.len() < MIN_STRUCTURES {
            return Err(ProfileError::InsufficientData(format!(
                "need at least {} structures, got {}",
                MIN_STRUCTURES,
                structures.len()
            )));
        }
        let mut knots: Vec<Knot> = structures
            .iter()
            .map(|s| Knot {
                station: s.station,
                ground: s.cover_level,
                excavation: s.excavation_level,
            })
            .collect();
        knots.sort_by(|a, b| a.station.total_cmp(&b.station));
        Ok(Self { knots })
    }

    /// Station of the first knot.
    pub fn first_station(&self) -> f64 {
        self.knots[0].station
    }

    /// Station of the last knot.
    pub fn last_station(&self) -> f64 {
        self.knots[self.knots.len() - 1].station
    }

    /// Ground (cover) elevation at `station`. NaN for a NaN station.
    pub fn ground_level_at(&self, station: f64) -> f64 {
        self.evaluate(station, |k| k.ground)
    }

    /// Structure-derived excavation elevation at `station`.
    pub fn excavation_level_at(&self, station: f64) -> f64 {
        self.evaluate(station, |k| k.excavation)
    }

    fn evaluate(&self, station: f64, value: impl Fn(&Knot) -> f64) -> f64 {
        if station.is_nan() {
            return f64::NAN;
        }
        let first = &self.knots[0];
        let last = &self.knots[self.knots.len() - 1];
        if station <= first.station {
            return value(first);
        }
        if station >= last.station {
            return value(last);
        }

        // First knot strictly past the query; the bracket is (hi - 1, hi).
        // With duplicate stations the later one in input order is `lo`.
        let hi_idx = self.knots.partition_point(|k| k.station <= station);
        let lo = &self.knots[hi_idx - 1];
        let hi = &self.knots[hi_idx];

        let t = (station - lo.station) / (hi.station - lo.station);
        value(lo) + t * (value(hi) - value(lo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExcavationDepths, StructureKind};
    use approx::assert_abs_diff_eq;

    fn structure(id: u32, station: f64, invert: f64, cover: f64) -> Structure {
        Structure::new(
            id,
            StructureKind::Manhole,
            format!("S{id}"),
            station,
            invert,
            cover,
            &ExcavationDepths::default(),
        )
    }

    #[test]
    fn test_requires_two_structures() {
        let one = vec![structure(1, 0.0, 601.0, 602.5)];
        assert!(matches!(
            ProfileInterpolator::new(&one),
            Err(ProfileError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_passes_through_knots_unordered() {
        let structures = vec![
            structure(1, 35.0, 600.64, 602.14),
            structure(2, 0.0, 601.0, 602.5),
            structure(3, 20.0, 600.8, 603.1),
        ];
        let interp = ProfileInterpolator::new(&structures).unwrap();
        for s in &structures {
            assert_eq!(interp.ground_level_at(s.station), s.cover_level);
            assert_eq!(interp.excavation_level_at(s.station), s.excavation_level);
        }
        assert_eq!(interp.first_station(), 0.0);
        assert_eq!(interp.last_station(), 35.0);
    }

    #[test]
    fn test_midpoint() {
        let structures = vec![
            structure(1, 0.0, 601.0, 602.5),
            structure(2, 35.0, 600.64, 602.14),
        ];
        let interp = ProfileInterpolator::new(&structures).unwrap();
        assert_abs_diff_eq!(interp.ground_level_at(17.5), 602.32, epsilon = 1e-9);
    }

    #[test]
    fn test_clamped_outside_range() {
        let structures = vec![
            structure(1, 5.0, 601.0, 602.5),
            structure(2, 30.0, 600.64, 602.14),
        ];
        let interp = ProfileInterpolator::new(&structures).unwrap();
        assert_eq!(interp.ground_level_at(-100.0), 602.5);
        assert_eq!(interp.ground_level_at(0.0), 602.5);
        assert_eq!(interp.ground_level_at(30.0001), 602.14);
        assert_eq!(interp.excavation_level_at(1e6), structures[1].excavation_level);
    }

    #[test]
    fn test_duplicate_station_tie_break() {
        let structures = vec![
            structure(1, 0.0, 601.0, 602.0),
            structure(2, 10.0, 600.0, 603.0),
            structure(3, 10.0, 600.0, 605.0),
            structure(4, 20.0, 600.0, 601.0),
        ];
        let interp = ProfileInterpolator::new(&structures).unwrap();
        // Approaching from the left uses the first duplicate, from the right the second
        assert_abs_diff_eq!(interp.ground_level_at(5.0), 602.5, epsilon = 1e-9);
        assert_abs_diff_eq!(interp.ground_level_at(15.0), 603.0, epsilon = 1e-9);
        assert_eq!(interp.ground_level_at(10.0), 605.0);
    }

    #[test]
    fn test_nan_station() {
        let structures = vec![
            structure(1, 0.0, 601.0, 602.5),
            structure(2, 35.0, 600.64, 602.14),
        ];
        let interp = ProfileInterpolator::new(&structures).unwrap();
        assert!(interp.ground_level_at(f64::NAN).is_nan());
        assert!(interp.excavation_level_at(f64::NAN).is_nan());
        assert_eq!(interp.ground_level_at(f64::INFINITY), 602.14);
        assert_eq!(interp.ground_level_at(f64::NEG_INFINITY), 602.5);
    }
}
