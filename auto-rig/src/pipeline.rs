//! The rigging pipeline driver
//!
//! [`AutoRigger`] validates its inputs, builds the skeleton, runs the
//! weighting strategies in fallback order, verifies the result and generates
//! the clip library.
//!
//! # Examples
//!
//! ```rust,no_run
//! use auto_rig::{AutoRigger, ObjSource, MeshSource};
//!
//! let mesh = ObjSource::from_path("character.obj").load_mesh()?;
//! let output = AutoRigger::new().rig(&mesh)?;
//! println!("{} joints, {} vertices", output.skeleton.len(), output.weights.len());
//! # Ok::<(), auto_rig::Error>(())
//! ```

use std::fmt;

use log::{info, warn};

use crate::{
    aabb::AABB,
    animation::Clip,
    config::{RigSettings, StrategyKind},
    error::{Error, Result},
    mesh::{Mesh, MeshSource},
    schema::BoneSchema,
    skeleton::Skeleton,
    solver::{
        DegeneracyReport, EnvelopeWeigher, SegmentEnvelope, StrategyFailure, StrategyOutcome,
        WeightSolver,
    },
    verify::VerificationReport,
    weights::WeightTable,
};

/// Where the strategy state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    EnvelopeAttempt,
    DistanceAttempt,
    ZoneAttempt,
    Done,
}

impl SolveState {
    /// The state a pipeline configured with `strategy` starts in
    pub fn initial(strategy: StrategyKind) -> Self {
        match strategy {
            StrategyKind::Envelope => SolveState::EnvelopeAttempt,
            StrategyKind::Distance => SolveState::DistanceAttempt,
            StrategyKind::Zone => SolveState::ZoneAttempt,
        }
    }

    /// The strategy attempted in this state
    pub fn strategy(self) -> Option<StrategyKind> {
        match self {
            SolveState::EnvelopeAttempt => Some(StrategyKind::Envelope),
            SolveState::DistanceAttempt => Some(StrategyKind::Distance),
            SolveState::ZoneAttempt => Some(StrategyKind::Zone),
            SolveState::Done => None,
        }
    }

    /// The state to move to when this attempt is degenerate
    pub fn fallback(self) -> Option<SolveState> {
        match self {
            SolveState::EnvelopeAttempt => Some(SolveState::DistanceAttempt),
            SolveState::DistanceAttempt => Some(SolveState::ZoneAttempt),
            SolveState::ZoneAttempt | SolveState::Done => None,
        }
    }
}

/// Record of one strategy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    /// `None` when the attempt produced the final weights
    pub failure: Option<StrategyFailure>,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failure {
            Some(failure) => write!(f, "{:?}: degenerate ({failure})", self.strategy),
            None => write!(f, "{:?}: solved", self.strategy),
        }
    }
}

/// Everything the pipeline produces for one mesh
#[derive(Debug, Clone, PartialEq)]
pub struct RigOutput {
    /// World-space bounds the skeleton was fitted to
    pub bounds: AABB,
    pub skeleton: Skeleton,
    pub weights: WeightTable,
    pub verification: VerificationReport,
    pub degeneracy: DegeneracyReport,
    /// The strategy that produced `weights`
    pub strategy: StrategyKind,
    /// Every strategy tried, in order
    pub attempts: Vec<StrategyAttempt>,
    pub clips: Vec<Clip>,
}

/// Builder and driver for the rigging pipeline
pub struct AutoRigger {
    settings: RigSettings,
    schema: BoneSchema,
    envelope: Box<dyn EnvelopeWeigher>,
}

impl AutoRigger {
    /// Create a rigger with the humanoid schema and default settings
    pub fn new() -> Self {
        Self {
            settings: RigSettings::default(),
            schema: BoneSchema::humanoid(),
            envelope: Box::new(SegmentEnvelope),
        }
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: RigSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the bone schema
    pub fn with_schema(mut self, schema: BoneSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Replace the envelope weigher used by the envelope strategy
    pub fn with_envelope<E: EnvelopeWeigher + 'static>(mut self, envelope: E) -> Self {
        self.envelope = Box::new(envelope);
        self
    }

    /// Current settings
    pub fn settings(&self) -> &RigSettings {
        &self.settings
    }

    /// Current bone schema
    pub fn schema(&self) -> &BoneSchema {
        &self.schema
    }

    /// Load a mesh from `source` and rig it
    pub fn rig_source<S: MeshSource + ?Sized>(&self, source: &mut S) -> Result<RigOutput> {
        let mesh = source.load_mesh()?;
        self.rig(&mesh)
    }

    /// Rig `mesh`
    pub fn rig(&self, mesh: &Mesh) -> Result<RigOutput> {
        let settings = &self.settings;
        settings.validate()?;

        if mesh.is_empty() {
            return Err(Error::no_mesh(format!(
                "mesh `{}` has no vertices",
                mesh.name()
            )));
        }
        let positions = mesh.world_positions();
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(Error::invalid_parameter(format!(
                "mesh `{}` has a non-finite position at vertex {index}",
                mesh.name()
            )));
        }
        let bounds = AABB::from_points(positions.iter().copied());
        let height = bounds.height();
        if !bounds.is_finite() || !(height > settings.min_height) {
            return Err(Error::DegenerateBounds {
                height,
                epsilon: settings.min_height,
            });
        }
        info!(
            "Rigging `{}`: {} vertices, height {:.3}",
            mesh.name(),
            positions.len(),
            height
        );

        let skeleton = Skeleton::build(&self.schema, &bounds, &settings.skeleton)?;
        settings.zones.validate(&skeleton)?;
        info!("Skeleton: {} joints, root {}", skeleton.len(), skeleton.root().id);

        let solver = WeightSolver::new(&skeleton, bounds, settings);
        let mut state = SolveState::initial(settings.strategy);
        let mut attempts = Vec::new();
        let (strategy, weights, degeneracy) = loop {
            let Some(strategy) = state.strategy() else {
                return Err(Error::weighting_failed("no weighting strategy left to try"));
            };
            let outcome = match state {
                SolveState::EnvelopeAttempt => {
                    solver.solve_envelope(self.envelope.as_ref(), &positions)
                }
                SolveState::DistanceAttempt => solver.solve_distance(&positions),
                _ => solver.solve_zone(&positions),
            };
            match outcome {
                StrategyOutcome::Solved { table, degeneracy } => {
                    attempts.push(StrategyAttempt {
                        strategy,
                        failure: None,
                    });
                    state = SolveState::Done;
                    break (strategy, table, degeneracy);
                }
                StrategyOutcome::Degenerate(failure) => {
                    warn!("{strategy:?} weighting is degenerate: {failure}");
                    attempts.push(StrategyAttempt {
                        strategy,
                        failure: Some(failure),
                    });
                    state = match state.fallback() {
                        Some(next) => next,
                        None => {
                            return Err(Error::weighting_failed(format!(
                                "{strategy:?} weighting left the mesh unweighted: {failure}"
                            )));
                        }
                    };
                }
            }
        };
        debug_assert_eq!(state, SolveState::Done);
        info!("Weights solved with {strategy:?} after {} attempt(s)", attempts.len());
        degeneracy.log_summary();

        let verification = VerificationReport::new(&weights, &skeleton, settings.significance);
        verification.log_summary();
        if !verification.has_weights() {
            warn!("Verification found no weighted joints");
        }

        let clips = Clip::generate_all(&settings.clips, &skeleton);
        info!("Generated {} clip(s)", clips.len());

        Ok(RigOutput {
            bounds,
            skeleton,
            weights,
            verification,
            degeneracy,
            strategy,
            attempts,
            clips,
        })
    }
}

impl Default for AutoRigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3D;

    #[test]
    fn test_state_transitions() {
        assert_eq!(
            SolveState::initial(StrategyKind::Envelope).fallback(),
            Some(SolveState::DistanceAttempt)
        );
        assert_eq!(
            SolveState::DistanceAttempt.fallback(),
            Some(SolveState::ZoneAttempt)
        );
        assert_eq!(SolveState::ZoneAttempt.fallback(), None);
        assert_eq!(SolveState::Done.strategy(), None);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let err = AutoRigger::new().rig(&Mesh::new("empty", Vec::new())).unwrap_err();
        assert!(matches!(err, Error::NoMesh { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_flat_mesh_is_rejected() {
        let mesh = Mesh::new(
            "flat",
            vec![Vector3D::new(-1.0, 0.0, 0.0), Vector3D::new(1.0, 0.0, 0.0)],
        );
        let err = AutoRigger::new().rig(&mesh).unwrap_err();
        assert!(matches!(err, Error::DegenerateBounds { .. }));
    }

    #[test]
    fn test_non_finite_mesh_is_rejected() {
        for bad in [f32::INFINITY, f32::NAN] {
            let mesh = Mesh::new(
                "broken",
                vec![
                    Vector3D::new(-0.6, -1.78, 0.0),
                    Vector3D::new(0.6, 1.47, 0.0),
                    Vector3D::new(0.0, bad, 0.0),
                ],
            );
            let err = AutoRigger::new().rig(&mesh).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter { .. }), "{err}");
            assert!(err.is_configuration());
        }
    }

    struct NoCoverage;

    impl EnvelopeWeigher for NoCoverage {
        fn name(&self) -> &str {
            "none"
        }

        fn weigh(
            &self,
            _skeleton: &Skeleton,
            positions: &[Vector3D],
            _settings: &RigSettings,
        ) -> WeightTable {
            WeightTable::new(vec![Default::default(); positions.len()])
        }
    }

    #[test]
    fn test_envelope_falls_through_to_distance() {
        let mut settings = RigSettings::default();
        settings.strategy = StrategyKind::Envelope;
        settings.clips.clear();
        let mesh = Mesh::new(
            "pole",
            vec![Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(0.1, 2.0, 0.0)],
        );
        let output = AutoRigger::new()
            .with_settings(settings)
            .with_envelope(NoCoverage)
            .rig(&mesh)
            .unwrap();
        assert_eq!(output.strategy, StrategyKind::Distance);
        assert_eq!(
            output.attempts,
            vec![
                StrategyAttempt {
                    strategy: StrategyKind::Envelope,
                    failure: Some(StrategyFailure::NoVertexGroups),
                },
                StrategyAttempt {
                    strategy: StrategyKind::Distance,
                    failure: None,
                },
            ]
        );
        assert!(output.clips.is_empty());
        assert!(output.verification.has_weights());
    }
}
