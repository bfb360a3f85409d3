//! Scene construction: sampling the section into polylines, glyphs and labels.
//!
//! [`GeometryBuilder::build`] is the only place input is validated. The
//! renderer and the exporter consume the resulting [`Scene`] as-is.

use serde::{Deserialize, Serialize};

use crate::annotate::{AnnotationEngine, Label};
use crate::error::{ProfileError, Result};
use crate::interpolate::ProfileInterpolator;
use crate::model::{PipelineParameters, Structure, StructureKind, MIN_STRUCTURES};
use crate::types::{Bounds, Point2D, Polyline};

/// Stations closer than this to `total_length` are merged into the end sample.
const STATION_EPSILON: f64 = 1e-9;

/// Tunable constants of the geometry stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Design excavation depth below the gradient invert (m).
    pub excavation_margin: f64,
    /// Padding added above and below the elevation range (m).
    pub bounds_padding: f64,
    /// Allowed gap between a structure's invert and the gradient line (m)
    /// before a warning is raised.
    pub invert_tolerance: f64,
    /// Upper limit on samples per scene.
    pub max_samples: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            excavation_margin: 0.2,
            bounds_padding: 0.5,
            invert_tolerance: 0.01,
            max_samples: 100_000,
        }
    }
}

/// Profile values at one sampled station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Station (m).
    pub station: f64,
    /// Interpolated ground elevation (m).
    pub ground_level: f64,
    /// Gradient invert elevation (m).
    pub invert_level: f64,
    /// Top of pipe elevation (m).
    pub top_of_pipe: f64,
    /// Design excavation elevation (m).
    pub excavation_level: f64,
}

/// Drawing descriptor for one structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureGlyph {
    /// Id of the source structure.
    pub id: u32,
    /// Station (m).
    pub station: f64,
    /// Structure kind, selects the symbol.
    pub kind: StructureKind,
    /// Ground elevation at the structure (m).
    pub cover_level: f64,
    /// Structure's own invert (m).
    pub invert_level: f64,
    /// Structure's own excavation level (m).
    pub excavation_level: f64,
    /// Gradient invert at this station (m).
    pub gradient_invert: f64,
    /// Display colour.
    pub color: String,
    /// Display name.
    pub label: String,
}

/// Non-fatal findings surfaced alongside a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryWarning {
    /// A structure's invert disagrees with the gradient line. The scene
    /// draws both as entered.
    InconsistentInvert {
        /// Structure id.
        id: u32,
        /// Structure name.
        name: String,
        /// Structure station (m).
        station: f64,
        /// Invert entered on the structure (m).
        structure_invert: f64,
        /// Invert from the gradient at that station (m).
        gradient_invert: f64,
    },
}

impl GeometryWarning {
    /// Absolute divergence between the two inverts (m).
    pub fn divergence(&self) -> f64 {
        match self {
            GeometryWarning::InconsistentInvert {
                structure_invert,
                gradient_invert,
                ..
            } => (structure_invert - gradient_invert).abs(),
        }
    }
}

/// Derived geometric representation of one profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Padded world extent.
    pub bounds: Bounds,
    /// Samples the polylines were built from.
    pub samples: Vec<Sample>,
    /// Interpolated ground line.
    pub ground: Polyline,
    /// Gradient invert line.
    pub invert: Polyline,
    /// Top of pipe line.
    pub crown: Polyline,
    /// Design excavation line at a fixed margin below invert.
    pub excavation: Polyline,
    /// Excavation line interpolated from the structures' own levels.
    pub structure_excavation: Polyline,
    /// One glyph per structure, in station order.
    pub glyphs: Vec<StructureGlyph>,
    /// Text annotations.
    pub labels: Vec<Label>,
    /// Non-fatal inconsistencies found while building.
    pub warnings: Vec<GeometryWarning>,
    /// Gradient in percent.
    pub slope_percent: f64,
    /// Pipe diameter (mm).
    pub pipe_diameter_mm: f64,
    /// Sampling step (m).
    pub station_interval: f64,
}

/// Which excavation line an output draws.
///
/// On screen the selected line also bounds the excavation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcavationLine {
    /// Fixed margin below the gradient invert.
    #[default]
    Design,
    /// Interpolated from the structures' own excavation levels.
    Structures,
    /// Both lines; the design line bounds the band.
    Both,
}

/// Builds [`Scene`]s from parameters and structures.
#[derive(Debug, Clone, Default)]
pub struct GeometryBuilder {
    options: BuildOptions,
    annotations: AnnotationEngine,
}

impl GeometryBuilder {
    /// Builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with explicit options.
    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            options,
            annotations: AnnotationEngine::default(),
        }
    }

    /// Options in use.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the scene.
    ///
    /// Fails with [`ProfileError::InsufficientData`] for fewer than two
    /// structures or a non-positive length; no partial scene is returned.
    pub fn build(&self, params: &PipelineParameters, structures: &[Structure]) -> Result<Scene> {
        if structures.len() < MIN_STRUCTURES {
            return Err(ProfileError::InsufficientData(format!(
                "need at least {} structures, got {}",
                MIN_STRUCTURES,
                structures.len()
            )));
        }
        params.validate()?;
        for s in structures {
            s.validate()?;
        }

        let interp = ProfileInterpolator::new(structures)?;
        let stations = self.sample_stations(params)?;
        if interp.first_station() > 0.0 || interp.last_station() < params.total_length {
            log::warn!(
                "structures cover stations {}..{} of 0..{}; ground is held level outside",
                interp.first_station(),
                interp.last_station(),
                params.total_length
            );
        }
        log::debug!(
            "building profile: {} structures, {} samples over {} m",
            structures.len(),
            stations.len(),
            params.total_length
        );

        let samples: Vec<Sample> = stations
            .iter()
            .map(|&station| {
                let invert_level = params.invert_at(station);
                Sample {
                    station,
                    ground_level: interp.ground_level_at(station),
                    invert_level,
                    top_of_pipe: invert_level + params.pipe_diameter_m(),
                    excavation_level: invert_level - self.options.excavation_margin,
                }
            })
            .collect();

        let line = |f: fn(&Sample) -> f64| {
            Polyline::new(
                samples
                    .iter()
                    .map(|s| Point2D::new(s.station, f(s)))
                    .collect(),
            )
        };
        let ground = line(|s| s.ground_level);
        let invert = line(|s| s.invert_level);
        let crown = invert.shifted(params.pipe_diameter_m());
        let excavation = invert.shifted(-self.options.excavation_margin);
        let structure_excavation = Polyline::new(
            stations
                .iter()
                .map(|&st| Point2D::new(st, interp.excavation_level_at(st)))
                .collect(),
        );

        let mut ordered: Vec<&Structure> = structures.iter().collect();
        ordered.sort_by(|a, b| a.station.total_cmp(&b.station));

        let glyphs: Vec<StructureGlyph> = ordered
            .iter()
            .map(|s| StructureGlyph {
                id: s.id,
                station: s.station,
                kind: s.kind,
                cover_level: s.cover_level,
                invert_level: s.invert_level,
                excavation_level: s.excavation_level,
                gradient_invert: params.invert_at(s.station),
                color: s.color.clone(),
                label: s.name.clone(),
            })
            .collect();

        let warnings = self.check_inverts(&glyphs);

        let mut bounds = Bounds::stations(0.0, params.total_length);
        for polyline in [&ground, &invert, &crown, &excavation] {
            for y in polyline.elevations() {
                bounds.include_elevation(y);
            }
        }
        for s in structures {
            bounds.include_elevation(s.cover_level);
            bounds.include_elevation(s.excavation_level);
        }
        let bounds = bounds.padded(self.options.bounds_padding);
        if !bounds.is_valid() {
            return Err(ProfileError::DegenerateBounds(format!(
                "scene bounds {:?} enclose no area",
                bounds
            )));
        }

        let mut scene = Scene {
            bounds,
            samples,
            ground,
            invert,
            crown,
            excavation,
            structure_excavation,
            glyphs,
            labels: Vec::new(),
            warnings,
            slope_percent: params.slope(),
            pipe_diameter_mm: params.pipe_diameter,
            station_interval: params.station_interval,
        };
        scene.labels = self.annotations.annotate(params, &scene);
        Ok(scene)
    }

    /// Sample stations `0, h, 2h, ...` plus a final sample at `total_length`.
    fn sample_stations(&self, params: &PipelineParameters) -> Result<Vec<f64>> {
        let total = params.total_length;
        let step = params.station_interval;
        let expected = (total / step).ceil() + 1.0;
        if expected > self.options.max_samples as f64 {
            return Err(ProfileError::InvalidParameter(format!(
                "station_interval {} over {} m needs {} samples (limit {})",
                step, total, expected, self.options.max_samples
            )));
        }

        let mut stations = Vec::with_capacity(expected as usize + 1);
        let mut i = 0u64;
        loop {
            // Multiply rather than accumulate so steps do not drift.
            let station = i as f64 * step;
            if station >= total - STATION_EPSILON {
                break;
            }
            stations.push(station);
            i += 1;
        }
        stations.push(total);
        Ok(stations)
    }

    fn check_inverts(&self, glyphs: &[StructureGlyph]) -> Vec<GeometryWarning> {
        glyphs
            .iter()
            .filter(|g| (g.invert_level - g.gradient_invert).abs() > self.options.invert_tolerance)
            .map(|g| {
                log::warn!(
                    "structure {} ({}) invert {:.3} differs from gradient invert {:.3} at station {}",
                    g.id,
                    g.label,
                    g.invert_level,
                    g.gradient_invert,
                    g.station
                );
                GeometryWarning::InconsistentInvert {
                    id: g.id,
                    name: g.label.clone(),
                    station: g.station,
                    structure_invert: g.invert_level,
                    gradient_invert: g.gradient_invert,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExcavationDepths;
    use approx::assert_abs_diff_eq;

    fn default_structures() -> Vec<Structure> {
        let depths = ExcavationDepths::default();
        vec![
            Structure::new(1, StructureKind::Manhole, "MH-1", 0.0, 601.0, 602.5, &depths),
            Structure::new(
                2,
                StructureKind::InspectionChamber,
                "IC Chamber 10",
                35.0,
                600.64,
                602.14,
                &depths,
            ),
        ]
    }

    #[test]
    fn test_sample_stations_include_end() {
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &default_structures())
            .unwrap();
        let stations: Vec<f64> = scene.samples.iter().map(|s| s.station).collect();
        assert_eq!(
            stations,
            vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0, 33.0, 35.0]
        );
        assert_eq!(scene.ground.len(), stations.len());
        assert_eq!(scene.crown.len(), stations.len());
        assert_eq!(scene.structure_excavation.len(), stations.len());
    }

    #[test]
    fn test_exact_multiple_has_no_duplicate_end() {
        let params = PipelineParameters {
            total_length: 30.0,
            station_interval: 0.1,
            end_invert: 600.7,
            ..Default::default()
        };
        let scene = GeometryBuilder::new()
            .build(&params, &default_structures())
            .unwrap();
        assert_eq!(scene.samples.len(), 301);
        assert_eq!(scene.samples.last().unwrap().station, 30.0);
        for w in scene.samples.windows(2) {
            assert!(w[1].station > w[0].station);
        }
    }

    #[test]
    fn test_offsets() {
        let params = PipelineParameters::default();
        let scene = GeometryBuilder::new()
            .build(&params, &default_structures())
            .unwrap();
        for ((inv, crown), exc) in scene
            .invert
            .points
            .iter()
            .zip(&scene.crown.points)
            .zip(&scene.excavation.points)
        {
            assert_abs_diff_eq!(crown.y - inv.y, 0.2, epsilon = 1e-9);
            assert_abs_diff_eq!(inv.y - exc.y, 0.2, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(scene.invert.points[0].y, 601.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            scene.invert.points.last().unwrap().y,
            600.64,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_bounds_padding() {
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &default_structures())
            .unwrap();
        assert_eq!(scene.bounds.min_station, 0.0);
        assert_eq!(scene.bounds.max_station, 35.0);
        // Lowest: IC excavation 600.29 vs design excavation 600.44
        assert_abs_diff_eq!(scene.bounds.min_elevation, 599.79, epsilon = 1e-9);
        assert_abs_diff_eq!(scene.bounds.max_elevation, 603.0, epsilon = 1e-9);
    }

    #[test]
    fn test_glyphs_in_station_order() {
        let mut structures = default_structures();
        structures.reverse();
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &structures)
            .unwrap();
        let ids: Vec<u32> = scene.glyphs.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(scene.warnings.is_empty());
    }

    #[test]
    fn test_inconsistent_invert_warns_without_failing() {
        let mut structures = default_structures();
        structures[1].invert_level = 600.40;
        structures[1].excavation_level = 600.0;
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &structures)
            .unwrap();
        assert_eq!(scene.warnings.len(), 1);
        assert_abs_diff_eq!(scene.warnings[0].divergence(), 0.24, epsilon = 1e-9);
        // Gradient line is left untouched
        assert_abs_diff_eq!(
            scene.invert.points.last().unwrap().y,
            600.64,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_insufficient_data() {
        let builder = GeometryBuilder::new();
        let one = &default_structures()[..1];
        assert!(matches!(
            builder.build(&PipelineParameters::default(), one),
            Err(ProfileError::InsufficientData(_))
        ));
        let zero_len = PipelineParameters {
            total_length: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            builder.build(&zero_len, &default_structures()),
            Err(ProfileError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_sample_limit() {
        let builder = GeometryBuilder::with_options(BuildOptions {
            max_samples: 10,
            ..Default::default()
        });
        assert!(matches!(
            builder.build(&PipelineParameters::default(), &default_structures()),
            Err(ProfileError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_ground_level_outside_structures() {
        let mut structures = default_structures();
        structures[0].station = 5.0;
        structures[1].station = 30.0;
        let scene = GeometryBuilder::new()
            .build(&PipelineParameters::default(), &structures)
            .unwrap();
        assert_eq!(scene.samples[0].ground_level, 602.5);
        assert_eq!(scene.samples.last().unwrap().ground_level, 602.14);
        assert_eq!(scene.bounds.max_station, 35.0);
    }

    #[test]
    fn test_excavation_line_serde() {
        let line: ExcavationLine = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(line, ExcavationLine::Both);
        assert_eq!(ExcavationLine::default(), ExcavationLine::Design);
        assert_eq!(
            serde_json::to_string(&ExcavationLine::Structures).unwrap(),
            "\"structures\""
        );
    }
}
