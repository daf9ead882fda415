//! Post-hoc checks on a solved weight table

use bitflags::bitflags;
use log::{info, warn};

use crate::{
    schema::JointId,
    skeleton::Skeleton,
    weights::{SUM_TOLERANCE, WeightTable},
};

bitflags! {
    /// Problems found while verifying a weight table
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VerificationIssues: u32 {
        /// No joint has any significant vertex
        const NO_WEIGHTS = 1 << 0;
        /// At least one vertex has no influence
        const UNWEIGHTED_VERTICES = 1 << 1;
        /// At least one joint influences no vertex
        const EMPTY_JOINTS = 1 << 2;
        /// At least one vertex's weights do not sum to one
        const SUM_DRIFT = 1 << 3;
    }
}

/// Per-joint vertex histogram and coverage findings
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Vertices with a significant weight, per joint in skeleton order
    pub joint_counts: Vec<(JointId, usize)>,
    /// Vertices with no influence at all
    pub unweighted: Vec<usize>,
    /// Joints with no significant vertex
    pub empty_joints: Vec<JointId>,
    /// Vertices whose weight sum is off by more than the tolerance
    pub drifting: Vec<usize>,
    pub max_influences: usize,
    pub issues: VerificationIssues,
}

impl VerificationReport {
    /// Verify `table` against the joints of `skeleton`
    pub fn new(table: &WeightTable, skeleton: &Skeleton, significance: f32) -> Self {
        let mut counts = vec![0usize; skeleton.len()];
        let mut unweighted = Vec::new();
        let mut drifting = Vec::new();

        for (vertex, weights) in table.iter().enumerate() {
            if weights.is_empty() {
                unweighted.push(vertex);
                continue;
            }
            if (weights.sum() - 1.0).abs() > SUM_TOLERANCE {
                drifting.push(vertex);
            }
            for influence in weights.iter().filter(|i| i.is_significant(significance)) {
                if let Some(index) = skeleton.index_of(influence.joint) {
                    counts[index] += 1;
                }
            }
        }

        let joint_counts: Vec<(JointId, usize)> = skeleton
            .iter()
            .map(|joint| joint.id)
            .zip(counts)
            .collect();
        let empty_joints: Vec<JointId> = joint_counts
            .iter()
            .filter(|(_, count)| *count == 0)
            .map(|(joint, _)| *joint)
            .collect();

        let mut issues = VerificationIssues::empty();
        if joint_counts.iter().all(|(_, count)| *count == 0) {
            issues |= VerificationIssues::NO_WEIGHTS;
        }
        if !unweighted.is_empty() {
            issues |= VerificationIssues::UNWEIGHTED_VERTICES;
        }
        if !empty_joints.is_empty() {
            issues |= VerificationIssues::EMPTY_JOINTS;
        }
        if !drifting.is_empty() {
            issues |= VerificationIssues::SUM_DRIFT;
        }

        Self {
            joint_counts,
            unweighted,
            empty_joints,
            drifting,
            max_influences: table.max_influences(),
            issues,
        }
    }

    /// Whether any joint received any vertex
    pub fn has_weights(&self) -> bool {
        !self.issues.contains(VerificationIssues::NO_WEIGHTS)
    }

    /// Whether every vertex is weighted and normalized
    ///
    /// Empty joints are not counted against a clean table.
    pub fn is_clean(&self) -> bool {
        !self.issues.intersects(
            VerificationIssues::NO_WEIGHTS
                | VerificationIssues::UNWEIGHTED_VERTICES
                | VerificationIssues::SUM_DRIFT,
        )
    }

    /// Significant vertex count for `joint`
    pub fn count(&self, joint: JointId) -> usize {
        self.joint_counts
            .iter()
            .find(|(id, _)| *id == joint)
            .map_or(0, |(_, count)| *count)
    }

    /// Log the histogram and any findings
    pub fn log_summary(&self) {
        for (joint, count) in &self.joint_counts {
            info!("  {joint}: {count} vertices");
        }
        if !self.unweighted.is_empty() {
            warn!("{} vertices have no weight", self.unweighted.len());
        }
        if !self.empty_joints.is_empty() {
            warn!(
                "{} joints influence no vertex: {:?}",
                self.empty_joints.len(),
                self.empty_joints
            );
        }
        if !self.drifting.is_empty() {
            warn!(
                "{} vertices have weights that do not sum to 1",
                self.drifting.len()
            );
        }
    }
}
