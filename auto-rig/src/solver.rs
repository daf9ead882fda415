//! Vertex-to-joint weight solving
//!
//! Three strategies are available:
//!
//! - **Envelope**: delegated to an [`EnvelopeWeigher`]; [`SegmentEnvelope`] is
//!   the built-in linear-falloff implementation.
//! - **Distance**: point-to-segment distance to every joint, blended either as
//!   the nearest pair or as an inverse-square mix of up to four joints.
//! - **Zone**: the vertex is classified into an anatomical region and weighted
//!   against that region's candidate joints by a Gaussian over normalized height.
//!
//! Every vertex is solved independently and writes only its own slot, so the
//! per-vertex loop runs on rayon when the `parallel` feature is enabled.

use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    aabb::AABB,
    config::{DistanceBlend, DistanceSettings, RigSettings},
    region::{NormalizedCoords, Region, ZoneProfile},
    schema::JointId,
    skeleton::Skeleton,
    types::Vector3D,
    weights::{Influence, VertexWeights, WeightTable},
};

/// Most joints the envelope and distance strategies assign to one vertex
pub const MAX_INFLUENCES: usize = 4;

/// Distance from `point` to the segment `head..tail`, clamped to its endpoints
///
/// Segments shorter than `min_segment` are treated as the single point `head`.
pub fn segment_distance(point: Vector3D, head: Vector3D, tail: Vector3D, min_segment: f32) -> f32 {
    let axis = tail - head;
    let length_squared = axis.length_squared();
    if length_squared < min_segment * min_segment {
        return point.distance(head);
    }
    let t = ((point - head).dot(axis) / length_squared).clamp(0.0, 1.0);
    point.distance(head + axis * t)
}

/// Every joint with its segment distance to `point`, nearest first
///
/// Ties keep schema order.
pub fn rank_joints(point: Vector3D, skeleton: &Skeleton, min_segment: f32) -> Vec<(JointId, f32)> {
    let mut ranked: Vec<(JointId, f32)> = skeleton
        .iter()
        .map(|joint| {
            (
                joint.id,
                segment_distance(point, joint.head, joint.tail, min_segment),
            )
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

/// Linear blend of the two nearest joints
///
/// `ranked` must be sorted nearest first.
pub fn nearest_pair_weights(
    ranked: &[(JointId, f32)],
    settings: &DistanceSettings,
    significance: f32,
) -> VertexWeights {
    let (first, d1) = match ranked.first() {
        Some(&nearest) => nearest,
        None => return VertexWeights::new(),
    };
    let (second, d2) = match ranked.get(1) {
        Some(&next) if d1 >= settings.near_zero => next,
        _ => return VertexWeights::single(first),
    };

    let total = d1 + d2;
    let mut weights: VertexWeights = [
        Influence::new(first, 1.0 - d1 / total),
        Influence::new(second, 1.0 - d2 / total),
    ]
    .into_iter()
    .collect();
    weights.normalize();
    weights.prune(significance);
    weights.normalize();
    weights
}

/// Inverse-square blend of up to `max_candidates` nearby joints
///
/// `ranked` must be sorted nearest first. With `renormalize` unset the weights
/// left after pruning are not rescaled, so their sum may fall short of one.
pub fn inverse_square_weights(
    ranked: &[(JointId, f32)],
    settings: &DistanceSettings,
    significance: f32,
    renormalize: bool,
) -> VertexWeights {
    let (first, d1) = match ranked.first() {
        Some(&nearest) => nearest,
        None => return VertexWeights::new(),
    };
    if d1 < settings.near_zero {
        return VertexWeights::single(first);
    }

    let cutoff = settings.cutoff_factor * d1 + settings.cutoff_margin;
    let mut weights: VertexWeights = ranked
        .iter()
        .take(settings.max_candidates)
        .filter(|(_, d)| *d <= cutoff)
        .map(|&(joint, d)| Influence::new(joint, 1.0 / (d * d + settings.epsilon)))
        .collect();
    weights.normalize();
    weights.prune(significance);
    if renormalize {
        weights.normalize();
    }
    weights
}

/// Why a vertex fell back to a single forced joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegeneracyReason {
    /// No zone candidate was significant at the vertex height
    BelowThreshold,
    /// The vertex's region lists no candidates
    EmptyRegion,
}

impl DegeneracyReason {
    /// All reasons in a stable order
    pub const ALL: [DegeneracyReason; 2] =
        [DegeneracyReason::BelowThreshold, DegeneracyReason::EmptyRegion];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DegeneracyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegeneracyReason::BelowThreshold => f.write_str("below threshold"),
            DegeneracyReason::EmptyRegion => f.write_str("empty region"),
        }
    }
}

/// Result of weighting one vertex against the zone profile
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneAssignment {
    pub region: Region,
    pub weights: VertexWeights,
    /// Set when the weights are a forced single-joint fallback
    pub fallback: Option<DegeneracyReason>,
}

/// Gaussian zone weights for a vertex at normalized height `y` inside `region`
///
/// An empty region returns no weights with [`DegeneracyReason::EmptyRegion`];
/// the caller picks the nearest joint instead.
pub fn zone_weights(
    y: f32,
    region: Region,
    profile: &ZoneProfile,
    significance: f32,
) -> ZoneAssignment {
    let bones = profile.bones(region);
    let Some(first) = bones.first() else {
        return ZoneAssignment {
            region,
            weights: VertexWeights::new(),
            fallback: Some(DegeneracyReason::EmptyRegion),
        };
    };

    let mut weights: VertexWeights = bones
        .iter()
        .map(|bone| Influence::new(bone.joint, bone.falloff(y, profile.falloff_padding)))
        .filter(|influence| influence.is_significant(significance))
        .collect();
    weights.normalize();
    weights.prune(significance);
    weights.normalize();

    if weights.is_empty() {
        ZoneAssignment {
            region,
            weights: VertexWeights::single(first.joint),
            fallback: Some(DegeneracyReason::BelowThreshold),
        }
    } else {
        weights.sort_strongest_first();
        ZoneAssignment {
            region,
            weights,
            fallback: None,
        }
    }
}

/// Forced fallbacks per reason and region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegeneracyReport {
    counts: [[usize; 6]; 2],
}

impl DegeneracyReport {
    /// An empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one fallback
    pub fn record(&mut self, reason: DegeneracyReason, region: Region) {
        self.counts[reason.index()][region.index()] += 1;
    }

    /// Fallbacks for one reason in one region
    pub fn count(&self, reason: DegeneracyReason, region: Region) -> usize {
        self.counts[reason.index()][region.index()]
    }

    /// Fallbacks for one reason across all regions
    pub fn count_reason(&self, reason: DegeneracyReason) -> usize {
        self.counts[reason.index()].iter().sum()
    }

    /// All fallbacks
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Whether no vertex needed a fallback
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Nonzero counts as (reason, region, count)
    pub fn entries(&self) -> impl Iterator<Item = (DegeneracyReason, Region, usize)> + '_ {
        DegeneracyReason::ALL.into_iter().flat_map(move |reason| {
            Region::ALL.into_iter().filter_map(move |region| {
                let count = self.count(reason, region);
                (count > 0).then_some((reason, region, count))
            })
        })
    }

    /// Emit a warning summary when any fallback happened
    pub fn log_summary(&self) {
        if self.is_empty() {
            return;
        }
        warn!("{} vertices fell back to a single joint", self.total());
        for (reason, region, count) in self.entries() {
            warn!("  {region}: {count} ({reason})");
        }
    }
}

/// Why a whole strategy produced no usable table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyFailure {
    /// No vertex received any weight
    NoVertexGroups,
    /// Some vertices received no weight
    UncoveredVertices { count: usize },
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyFailure::NoVertexGroups => f.write_str("no vertex received any weight"),
            StrategyFailure::UncoveredVertices { count } => {
                write!(f, "{count} vertices received no weight")
            }
        }
    }
}

/// Outcome of one strategy attempt
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// Every vertex is weighted
    Solved {
        table: WeightTable,
        degeneracy: DegeneracyReport,
    },
    /// The strategy cannot be used for this mesh
    Degenerate(StrategyFailure),
}

impl StrategyOutcome {
    /// Classify a finished table
    pub fn from_table(table: WeightTable, degeneracy: DegeneracyReport) -> Self {
        let uncovered = table.unweighted().count();
        if uncovered == 0 {
            StrategyOutcome::Solved { table, degeneracy }
        } else if uncovered == table.len() {
            StrategyOutcome::Degenerate(StrategyFailure::NoVertexGroups)
        } else {
            StrategyOutcome::Degenerate(StrategyFailure::UncoveredVertices { count: uncovered })
        }
    }

    /// Whether the attempt produced a table
    pub fn is_solved(&self) -> bool {
        matches!(self, StrategyOutcome::Solved { .. })
    }
}

/// Envelope-based automatic weighting
///
/// Implementations receive the finished skeleton and world-space vertex
/// positions, and return one entry per vertex. Vertices they leave empty make
/// the attempt degenerate.
pub trait EnvelopeWeigher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Weight every vertex
    ///
    /// Implementations should honor `settings.parallel` and drop influences at
    /// or below `settings.significance`.
    fn weigh(
        &self,
        skeleton: &Skeleton,
        positions: &[Vector3D],
        settings: &RigSettings,
    ) -> WeightTable;
}

/// Linear envelope falloff around each joint segment
///
/// A joint influences a vertex when the vertex lies within the joint's
/// envelope radius of its segment, with weight `1 - d / r`. Segments shorter
/// than `distance.min_segment` measure from the joint head.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEnvelope;

impl SegmentEnvelope {
    fn weigh_vertex(
        skeleton: &Skeleton,
        point: Vector3D,
        min_segment: f32,
        significance: f32,
    ) -> VertexWeights {
        let mut weights: VertexWeights = skeleton
            .iter()
            .filter_map(|joint| {
                let radius = joint.envelope_radius;
                if !(radius > 0.0) {
                    return None;
                }
                let d = segment_distance(point, joint.head, joint.tail, min_segment);
                (d < radius).then(|| Influence::new(joint.id, 1.0 - d / radius))
            })
            .collect();
        weights.truncate_strongest(MAX_INFLUENCES);
        weights.normalize();
        weights.prune(significance);
        weights.normalize();
        weights
    }
}

impl EnvelopeWeigher for SegmentEnvelope {
    fn name(&self) -> &str {
        "segment envelope"
    }

    fn weigh(
        &self,
        skeleton: &Skeleton,
        positions: &[Vector3D],
        settings: &RigSettings,
    ) -> WeightTable {
        let min_segment = settings.distance.min_segment;
        let significance = settings.significance;
        WeightTable::new(map_vertices(settings.parallel, positions, |point| {
            Self::weigh_vertex(skeleton, point, min_segment, significance)
        }))
    }
}

/// Solves weights for one skeleton inside one set of mesh bounds
#[derive(Debug, Clone, Copy)]
pub struct WeightSolver<'a> {
    skeleton: &'a Skeleton,
    bounds: AABB,
    settings: &'a RigSettings,
}

impl<'a> WeightSolver<'a> {
    /// Create a solver
    pub fn new(skeleton: &'a Skeleton, bounds: AABB, settings: &'a RigSettings) -> Self {
        Self {
            skeleton,
            bounds,
            settings,
        }
    }

    /// Run an envelope weigher and check its coverage
    pub fn solve_envelope(
        &self,
        weigher: &dyn EnvelopeWeigher,
        positions: &[Vector3D],
    ) -> StrategyOutcome {
        debug!("Envelope weighting with {}", weigher.name());
        let table = weigher.weigh(self.skeleton, positions, self.settings);
        if table.len() != positions.len() {
            warn!(
                "Envelope weigher returned {} entries for {} vertices",
                table.len(),
                positions.len()
            );
            return StrategyOutcome::Degenerate(StrategyFailure::NoVertexGroups);
        }
        StrategyOutcome::from_table(table, DegeneracyReport::new())
    }

    /// Distance weighting with the configured blend
    pub fn solve_distance(&self, positions: &[Vector3D]) -> StrategyOutcome {
        let distance = &self.settings.distance;
        let significance = self.settings.significance;
        let renormalize = self.settings.renormalize_after_prune;
        let vertices = map_vertices(self.settings.parallel, positions, |point| {
            let ranked = rank_joints(point, self.skeleton, distance.min_segment);
            match distance.blend {
                DistanceBlend::NearestPair => nearest_pair_weights(&ranked, distance, significance),
                DistanceBlend::InverseSquare => {
                    inverse_square_weights(&ranked, distance, significance, renormalize)
                }
            }
        });
        StrategyOutcome::from_table(WeightTable::new(vertices), DegeneracyReport::new())
    }

    /// Zone weighting against the configured profile
    pub fn solve_zone(&self, positions: &[Vector3D]) -> StrategyOutcome {
        let profile = &self.settings.zones;
        let significance = self.settings.significance;
        let assignments = map_vertices(self.settings.parallel, positions, |point| {
            let coords = NormalizedCoords::of(point, &self.bounds);
            let region = profile.thresholds.classify(coords);
            let mut assignment = zone_weights(coords.y, region, profile, significance);
            if assignment.fallback == Some(DegeneracyReason::EmptyRegion) {
                if let Some(&(nearest, _)) =
                    rank_joints(point, self.skeleton, self.settings.distance.min_segment).first()
                {
                    assignment.weights = VertexWeights::single(nearest);
                }
            }
            assignment
        });

        let mut degeneracy = DegeneracyReport::new();
        let vertices = assignments
            .into_iter()
            .map(|assignment| {
                if let Some(reason) = assignment.fallback {
                    degeneracy.record(reason, assignment.region);
                }
                assignment.weights
            })
            .collect();
        StrategyOutcome::from_table(WeightTable::new(vertices), degeneracy)
    }
}

#[cfg(feature = "parallel")]
fn map_vertices<T, F>(parallel: bool, positions: &[Vector3D], f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Vector3D) -> T + Sync + Send,
{
    if parallel {
        positions.par_iter().map(|&point| f(point)).collect()
    } else {
        positions.iter().map(|&point| f(point)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn map_vertices<T, F>(_parallel: bool, positions: &[Vector3D], f: F) -> Vec<T>
where
    F: Fn(Vector3D) -> T,
{
    positions.iter().map(|&point| f(point)).collect()
}
