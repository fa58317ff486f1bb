//! Helical particle tracks from the beam spot to the first sensor layer, and
//! comparison of their distributions against a detector-simulator track list.
//!
//! Lengths are millimetres, momenta GeV/c and the solenoid field Tesla.

use super::{Workflow, WorkflowArtifact, WorkflowOutcome};
use crate::config::ProbeConfig;
use crate::domain::{Point3, ProbeError, WorkflowResult};
use crate::numerics::{Distribution, arange_count};
use crate::parser::{RecordFormat, malformed_record_error, parse_records, read_text_file};
use crate::serialization::{join_f64, write_json_artifact, write_text_artifact};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TRACK_LIST_HEADER: &str = "# X,Y,Z,P,Pt";
pub const DEFAULT_TRACK_LIST_NAME: &str = "new_track_list.txt";
pub const DEFAULT_COMPARISON_NAME: &str = "track_comparison.json";

/// `pt [GeV/c] = 0.3 * B [T] * R [m]`.
const CURVATURE_CONSTANT: f64 = 0.3;
const MM_PER_M: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackGeneratorConfig {
    pub seed: u64,
    pub b_field_tesla: f64,
    pub sensor_y_mm: f64,
    /// Half width of the sensor array along global X.
    pub x_max_mm: f64,
    /// Half length of the sensor array along global Z.
    pub z_max_mm: f64,
    pub crossing_tolerance_mm: f64,
    pub pt_max_gev: f64,
    pub pz_max_gev: f64,
    /// Half extents of the vertex box around the origin.
    pub vertex_half_extent_mm: [f64; 3],
    pub arc_start_mm: f64,
    pub arc_step_mm: f64,
    /// Tracks whose full circle is shorter than this never reach the sensor.
    pub min_circumference_mm: f64,
    pub helicity: f64,
    /// Consecutive misses tolerated before generation gives up.
    pub max_attempts_per_track: u64,
}

impl Default for TrackGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 20240416,
            b_field_tesla: 3.8,
            sensor_y_mm: 30.0,
            x_max_mm: 8.1,
            z_max_mm: 30.0,
            crossing_tolerance_mm: 0.5,
            pt_max_gev: 5.0,
            pz_max_gev: 1.0,
            vertex_half_extent_mm: [2.0, 2.0, 10.0],
            arc_start_mm: 20.0,
            arc_step_mm: 0.4,
            min_circumference_mm: 30.0,
            helicity: -1.0,
            max_attempts_per_track: 100_000,
        }
    }
}

impl TrackGeneratorConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        let positive = [
            ("bFieldTesla", self.b_field_tesla),
            ("xMaxMm", self.x_max_mm),
            ("zMaxMm", self.z_max_mm),
            ("crossingToleranceMm", self.crossing_tolerance_mm),
            ("ptMaxGev", self.pt_max_gev),
            ("arcStepMm", self.arc_step_mm),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackError::InvalidConfig { field, value });
            }
        }

        let non_negative = [
            ("pzMaxGev", self.pz_max_gev),
            ("arcStartMm", self.arc_start_mm),
            ("minCircumferenceMm", self.min_circumference_mm),
            ("vertexHalfExtentMm[0]", self.vertex_half_extent_mm[0]),
            ("vertexHalfExtentMm[1]", self.vertex_half_extent_mm[1]),
            ("vertexHalfExtentMm[2]", self.vertex_half_extent_mm[2]),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TrackError::InvalidConfig { field, value });
            }
        }

        if !self.sensor_y_mm.is_finite() {
            return Err(TrackError::InvalidConfig {
                field: "sensorYMm",
                value: self.sensor_y_mm,
            });
        }
        if self.helicity != 1.0 && self.helicity != -1.0 {
            return Err(TrackError::InvalidConfig {
                field: "helicity",
                value: self.helicity,
            });
        }
        if self.max_attempts_per_track == 0 {
            return Err(TrackError::InvalidConfig {
                field: "maxAttemptsPerTrack",
                value: 0.0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("track generator setting {field} is out of range: {value}")]
    InvalidConfig { field: &'static str, value: f64 },
    #[error(
        "no sensor hit after {attempts} consecutive attempts ({generated} of {requested} tracks generated)"
    )]
    AttemptsExhausted {
        attempts: u64,
        generated: usize,
        requested: usize,
    },
}

impl From<TrackError> for ProbeError {
    fn from(error: TrackError) -> Self {
        let code = match error {
            TrackError::InvalidConfig { .. } => "INPUT.TRACK_CONFIG",
            TrackError::AttemptsExhausted { .. } => "INPUT.TRACK_ACCEPTANCE",
        };
        ProbeError::input_validation(code, error.to_string())
    }
}

/// Initial state of a track at its production vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSeed {
    pub vertex_mm: Point3,
    pub pt_gev: f64,
    pub pz_gev: f64,
    /// Azimuth of the transverse momentum at the vertex.
    pub phi0: f64,
}

impl TrackSeed {
    pub fn p_gev(&self) -> f64 {
        self.pt_gev.hypot(self.pz_gev)
    }

    pub fn draw(rng: &mut impl Rng, config: &TrackGeneratorConfig) -> Self {
        let [hx, hy, hz] = config.vertex_half_extent_mm;
        Self {
            vertex_mm: [
                rng.gen_range(-hx..=hx),
                rng.gen_range(-hy..=hy),
                rng.gen_range(-hz..=hz),
            ],
            pt_gev: rng.gen_range(0.0..config.pt_max_gev),
            pz_gev: rng.gen_range(-config.pz_max_gev..=config.pz_max_gev),
            phi0: rng.gen_range(0.0..TAU),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorHit {
    pub position_mm: Point3,
    pub p_gev: f64,
    pub pt_gev: f64,
}

impl SensorHit {
    pub fn render(&self) -> String {
        let [x, y, z] = self.position_mm;
        join_f64(&[x, y, z, self.p_gev, self.pt_gev], " ")
    }
}

/// Helix geometry shared by every step of one track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Helix {
    pub origin_mm: Point3,
    pub radius_mm: f64,
    pub phi0: f64,
    pub helicity: f64,
    /// Dip angle, `asin(pz / p)`.
    pub lambda: f64,
}

impl Helix {
    pub fn new(seed: &TrackSeed, b_field_tesla: f64, helicity: f64) -> Self {
        let radius_mm = seed.pt_gev / (CURVATURE_CONSTANT * b_field_tesla) * MM_PER_M;
        let p = seed.p_gev();
        let lambda = if p > 0.0 { (seed.pz_gev / p).asin() } else { 0.0 };
        Self {
            origin_mm: seed.vertex_mm,
            radius_mm,
            phi0: seed.phi0,
            helicity,
            lambda,
        }
    }

    pub fn circumference_mm(&self) -> f64 {
        TAU * self.radius_mm
    }

    /// Position after arc length `s` along the helix.
    pub fn position(&self, s: f64) -> Point3 {
        let [x0, y0, z0] = self.origin_mm;
        let turn = self.phi0 + self.helicity * s * self.lambda.cos() / self.radius_mm;
        [
            x0 + self.radius_mm * (turn.cos() - self.phi0.cos()),
            y0 + self.radius_mm * (turn.sin() - self.phi0.sin()),
            z0 + s * self.lambda.sin(),
        ]
    }
}

/// Steps along the helix and returns the first position inside the sensor
/// crossing window, or `None` when the track never reaches it.
pub fn propagate_to_sensor(seed: &TrackSeed, config: &TrackGeneratorConfig) -> Option<SensorHit> {
    let helix = Helix::new(seed, config.b_field_tesla, config.helicity);
    let circumference = helix.circumference_mm();
    if circumference < config.min_circumference_mm {
        return None;
    }

    let steps = arange_count(config.arc_start_mm, circumference, config.arc_step_mm)?;
    let dip = helix.lambda.sin();
    for step in 0..steps {
        let s = config.arc_start_mm + step as f64 * config.arc_step_mm;
        let [x, y, z] = helix.position(s);
        if x.abs() < config.x_max_mm
            && (y - config.sensor_y_mm).abs() < config.crossing_tolerance_mm
            && z.abs() < config.z_max_mm
        {
            return Some(SensorHit {
                position_mm: [x, y, z],
                p_gev: seed.p_gev(),
                pt_gev: seed.pt_gev,
            });
        }
        // z is monotonic in s; once outside and moving away it never returns.
        if z.abs() >= config.z_max_mm && z * dip > 0.0 {
            return None;
        }
    }
    None
}

/// Generates exactly `count` sensor hits, drawing a fresh track per attempt.
pub fn generate_tracks(
    count: usize,
    config: &TrackGeneratorConfig,
) -> Result<Vec<SensorHit>, TrackError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut hits = Vec::with_capacity(count);
    let mut total_attempts = 0_u64;

    while hits.len() < count {
        let mut misses = 0_u64;
        let hit = loop {
            let seed = TrackSeed::draw(&mut rng, config);
            total_attempts += 1;
            if let Some(hit) = propagate_to_sensor(&seed, config) {
                break hit;
            }
            misses += 1;
            if misses >= config.max_attempts_per_track {
                return Err(TrackError::AttemptsExhausted {
                    attempts: misses,
                    generated: hits.len(),
                    requested: count,
                });
            }
        };
        hits.push(hit);
        if hits.len() % 100 == 0 {
            debug!(generated = hits.len(), attempts = total_attempts, "track generation progress");
        }
    }

    info!(
        tracks = hits.len(),
        attempts = total_attempts,
        "generated sensor hits"
    );
    Ok(hits)
}

pub fn render_track_list(hits: &[SensorHit]) -> String {
    let mut rendered = String::from(TRACK_LIST_HEADER);
    rendered.push('\n');
    for hit in hits {
        rendered.push_str(&hit.render());
        rendered.push('\n');
    }
    rendered
}

/// Columns shared by the generated and the simulator track lists, in global
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackColumns {
    pub x: Vec<f64>,
    pub z: Vec<f64>,
    pub p: Vec<f64>,
    pub pt: Vec<f64>,
}

impl TrackColumns {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn push(&mut self, x: f64, z: f64, p: f64, pt: f64) {
        self.x.push(x);
        self.z.push(z);
        self.p.push(p);
        self.pt.push(pt);
    }
}

/// Reads a generated list: `x y z p pt` per line.
pub fn read_generated_tracks(path: &Path) -> WorkflowResult<TrackColumns> {
    let source = read_text_file(path)?;
    let records = parse_records::<5>(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::TrackList, error))?;
    let mut columns = TrackColumns::default();
    for [x, _y, z, p, pt] in records {
        columns.push(x, z, p, pt);
    }
    Ok(columns)
}

/// Reads a simulator list: `cotb cota p flp localx localy pT` per line.
///
/// The sensor-local frame is rotated against the global one: global X is
/// `localy` and global Z is `localx`.
pub fn read_pixelav_tracks(path: &Path) -> WorkflowResult<TrackColumns> {
    let source = read_text_file(path)?;
    let records = parse_records::<7>(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::PixelavTrackList, error))?;
    let mut columns = TrackColumns::default();
    for [_cotb, _cota, p, _flp, local_x, local_y, pt] in records {
        columns.push(local_y, local_x, p, pt);
    }
    Ok(columns)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityComparison {
    pub name: &'static str,
    pub unit: &'static str,
    pub generated: Distribution,
    pub reference: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackComparisonReport {
    pub generated_count: usize,
    pub reference_count: usize,
    pub quantities: Vec<QuantityComparison>,
}

impl TrackComparisonReport {
    pub fn new(generated: &TrackColumns, reference: &TrackColumns, bins: usize) -> Self {
        let quantity = |name, unit, ours: &[f64], theirs: &[f64]| QuantityComparison {
            name,
            unit,
            generated: Distribution::from_values(ours, bins, None),
            reference: Distribution::from_values(theirs, bins, None),
        };
        Self {
            generated_count: generated.len(),
            reference_count: reference.len(),
            quantities: vec![
                quantity("X", "mm", &generated.x, &reference.x),
                quantity("Z", "mm", &generated.z, &reference.z),
                quantity("P", "GeV/c", &generated.p, &reference.p),
                quantity("Pt", "GeV/c", &generated.pt, &reference.pt),
            ],
        }
    }

    pub fn quantity(&self, name: &str) -> Option<&QuantityComparison> {
        self.quantities.iter().find(|quantity| quantity.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackGenerateRequest {
    pub count: usize,
    pub output_path: PathBuf,
    /// Overrides the configured seed.
    pub seed: Option<u64>,
}

impl Workflow for TrackGenerateRequest {
    fn name(&self) -> &'static str {
        "tracks-generate"
    }

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
        let mut generator = config.tracks.clone();
        if let Some(seed) = self.seed {
            generator.seed = seed;
        }
        info!(count = self.count, seed = generator.seed, "generating tracks");

        let hits = generate_tracks(self.count, &generator)?;
        write_text_artifact(&self.output_path, &render_track_list(&hits))?;

        Ok(WorkflowOutcome {
            summary: vec![format!(
                "Generated {} tracks hitting the sensor at y = {} mm.",
                hits.len(),
                generator.sensor_y_mm
            )],
            artifacts: vec![WorkflowArtifact::new(self.output_path.clone())],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackCompareRequest {
    pub generated_path: PathBuf,
    pub pixelav_path: PathBuf,
    pub output_path: PathBuf,
}

impl Workflow for TrackCompareRequest {
    fn name(&self) -> &'static str {
        "tracks-compare"
    }

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
        let generated = read_generated_tracks(&self.generated_path)?;
        let reference = read_pixelav_tracks(&self.pixelav_path)?;
        info!(
            generated = generated.len(),
            reference = reference.len(),
            "loaded track lists"
        );

        let report = TrackComparisonReport::new(&generated, &reference, config.histograms.track);
        write_json_artifact(&self.output_path, &report)?;

        let mut summary = Vec::with_capacity(report.quantities.len());
        for quantity in &report.quantities {
            let line = match (&quantity.generated.stats, &quantity.reference.stats) {
                (Some(ours), Some(theirs)) => format!(
                    "{} [{}]: generated [{}, {}], reference [{}, {}]",
                    quantity.name, quantity.unit, ours.min, ours.max, theirs.min, theirs.max
                ),
                _ => format!("{} [{}]: one of the lists is empty", quantity.name, quantity.unit),
            };
            summary.push(line);
        }

        Ok(WorkflowOutcome {
            summary,
            artifacts: vec![WorkflowArtifact::new(self.output_path.clone())],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Helix, SensorHit, TRACK_LIST_HEADER, TrackColumns, TrackComparisonReport, TrackError,
        TrackGeneratorConfig, TrackSeed, generate_tracks, propagate_to_sensor,
        read_pixelav_tracks, render_track_list,
    };
    use crate::domain::{ProbeError, ProbeErrorCategory};
    use std::f64::consts::PI;
    use std::fs;
    use tempfile::TempDir;

    fn seed(pt_gev: f64, pz_gev: f64, phi0: f64) -> TrackSeed {
        TrackSeed {
            vertex_mm: [0.0, 0.0, 0.0],
            pt_gev,
            pz_gev,
            phi0,
        }
    }

    #[test]
    fn helix_starts_at_vertex() {
        let helix = Helix::new(&seed(1.0, 0.5, 0.3), 3.8, -1.0);
        let start = helix.position(0.0);
        for (actual, expected) in start.iter().zip([0.0, 0.0, 0.0]) {
            assert!((actual - expected).abs() < 1e-12);
        }
        assert!((helix.radius_mm - 1000.0 / 1.14).abs() < 1e-9);
    }

    #[test]
    fn stiff_transverse_track_hits_sensor_near_thirty_mm() {
        let hit = propagate_to_sensor(&seed(1.0, 0.0, PI), &TrackGeneratorConfig::default())
            .expect("track should reach the sensor");
        let [x, y, z] = hit.position_mm;
        assert!((y - 29.594).abs() < 0.01, "y = {y}");
        assert!((x - 0.4994).abs() < 0.01, "x = {x}");
        assert!(z.abs() < 1e-12);
        assert_eq!(hit.p_gev, 1.0);
        assert_eq!(hit.pt_gev, 1.0);
    }

    #[test]
    fn curling_track_is_dropped() {
        assert_eq!(
            propagate_to_sensor(&seed(0.001, 0.0, PI), &TrackGeneratorConfig::default()),
            None
        );
    }

    #[test]
    fn steep_track_leaves_through_the_sensor_end() {
        assert_eq!(
            propagate_to_sensor(&seed(1.0, 2.0, PI), &TrackGeneratorConfig::default()),
            None
        );
    }

    #[test]
    fn generation_yields_exactly_the_requested_count() {
        let config = TrackGeneratorConfig {
            seed: 11,
            ..TrackGeneratorConfig::default()
        };
        let hits = generate_tracks(25, &config).expect("tracks");
        assert_eq!(hits.len(), 25);
        for hit in &hits {
            let [x, y, z] = hit.position_mm;
            assert!(x.abs() < config.x_max_mm);
            assert!((y - config.sensor_y_mm).abs() < config.crossing_tolerance_mm);
            assert!(z.abs() < config.z_max_mm);
            assert!(hit.pt_gev <= hit.p_gev);
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let config = TrackGeneratorConfig {
            seed: 3,
            ..TrackGeneratorConfig::default()
        };
        let first = generate_tracks(10, &config).expect("tracks");
        let second = generate_tracks(10, &config).expect("tracks");
        assert_eq!(first, second);

        let other = generate_tracks(
            10,
            &TrackGeneratorConfig {
                seed: 4,
                ..config.clone()
            },
        )
        .expect("tracks");
        assert_ne!(first, other);
    }

    #[test]
    fn unreachable_sensor_exhausts_attempts() {
        let config = TrackGeneratorConfig {
            sensor_y_mm: 10_000.0,
            pt_max_gev: 0.01,
            max_attempts_per_track: 50,
            ..TrackGeneratorConfig::default()
        };
        let error = generate_tracks(1, &config).unwrap_err();
        assert_eq!(
            error,
            TrackError::AttemptsExhausted {
                attempts: 50,
                generated: 0,
                requested: 1
            }
        );
        let probe: ProbeError = error.into();
        assert_eq!(probe.code(), "INPUT.TRACK_ACCEPTANCE");
    }

    #[test]
    fn invalid_generator_settings_are_rejected() {
        let config = TrackGeneratorConfig {
            arc_step_mm: 0.0,
            ..TrackGeneratorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(TrackError::InvalidConfig {
                field: "arcStepMm",
                value: 0.0
            })
        );

        let probe: ProbeError = generate_tracks(
            1,
            &TrackGeneratorConfig {
                helicity: 0.5,
                ..TrackGeneratorConfig::default()
            },
        )
        .unwrap_err()
        .into();
        assert_eq!(probe.category(), ProbeErrorCategory::InputValidationError);
        assert_eq!(probe.code(), "INPUT.TRACK_CONFIG");
    }

    #[test]
    fn track_list_starts_with_header() {
        let rendered = render_track_list(&[SensorHit {
            position_mm: [0.5, 29.75, -3.0],
            p_gev: 1.25,
            pt_gev: 1.0,
        }]);
        assert_eq!(rendered, format!("{TRACK_LIST_HEADER}\n0.5 29.75 -3 1.25 1\n"));
    }

    #[test]
    fn pixelav_columns_map_to_global_axes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("track_list.txt");
        fs::write(
            &path,
            "# cotb cota p flp localx localy pT\n0.1 0.2 1.5 0 -4.0 2.5 0.9\n",
        )
        .expect("track list should be written");

        let columns = read_pixelav_tracks(&path).expect("tracks");
        assert_eq!(columns.x, vec![2.5]);
        assert_eq!(columns.z, vec![-4.0]);
        assert_eq!(columns.p, vec![1.5]);
        assert_eq!(columns.pt, vec![0.9]);
    }

    #[test]
    fn comparison_reports_ranges_of_both_lists() {
        let generated = TrackColumns {
            x: vec![-1.0, 1.0],
            z: vec![0.0, 10.0],
            p: vec![1.0, 2.0],
            pt: vec![0.5, 1.5],
        };
        let reference = TrackColumns {
            x: vec![-3.0, 0.0, 3.0],
            z: vec![5.0, 6.0, 7.0],
            p: vec![0.25, 0.25, 0.25],
            pt: vec![0.2, 0.2, 0.2],
        };
        let report = TrackComparisonReport::new(&generated, &reference, 100);
        assert_eq!(report.generated_count, 2);
        assert_eq!(report.reference_count, 3);
        assert_eq!(report.quantities.len(), 4);

        let x = report.quantity("X").expect("x comparison");
        let theirs = x.reference.stats.as_ref().expect("reference stats");
        assert_eq!((theirs.min, theirs.max), (-3.0, 3.0));
        assert_eq!(x.generated.histogram.as_ref().expect("histogram").total(), 2);

        let p = report.quantity("P").expect("p comparison");
        assert_eq!(p.reference.histogram.as_ref().expect("histogram").bins(), 100);
    }
}
