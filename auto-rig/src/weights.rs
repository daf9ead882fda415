//! Per-vertex skin weights
//!
//! A [`WeightTable`] holds one [`VertexWeights`] per mesh vertex, in vertex
//! order. Each entry is a short list of (joint, weight) influences; most
//! vertices have four or fewer, so the list lives inline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::schema::JointId;

/// Tolerance on the sum of a vertex's weights
pub const SUM_TOLERANCE: f32 = 1e-4;

/// A single joint influence on a vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    pub joint: JointId,
    pub weight: f32,
}

impl Influence {
    /// Create a new influence
    pub fn new(joint: JointId, weight: f32) -> Self {
        Self { joint, weight }
    }

    /// Check if this influence is above a significance threshold
    pub fn is_significant(&self, threshold: f32) -> bool {
        self.weight > threshold
    }
}

/// Influences on one vertex, strongest first once solved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexWeights {
    influences: SmallVec<[Influence; 4]>,
}

impl VertexWeights {
    /// An empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// A single joint with full weight
    pub fn single(joint: JointId) -> Self {
        let mut influences = SmallVec::new();
        influences.push(Influence::new(joint, 1.0));
        Self { influences }
    }

    /// Add an influence
    pub fn push(&mut self, joint: JointId, weight: f32) {
        self.influences.push(Influence::new(joint, weight));
    }

    /// Number of influences
    pub fn len(&self) -> usize {
        self.influences.len()
    }

    /// Whether the vertex has no influences
    pub fn is_empty(&self) -> bool {
        self.influences.is_empty()
    }

    /// Iterate influences
    pub fn iter(&self) -> std::slice::Iter<'_, Influence> {
        self.influences.iter()
    }

    /// All influences as a slice
    pub fn as_slice(&self) -> &[Influence] {
        &self.influences
    }

    /// Sum of all weights
    pub fn sum(&self) -> f32 {
        self.influences.iter().map(|i| i.weight).sum()
    }

    /// Weight of `joint`, or 0 when it has no influence
    pub fn weight_for(&self, joint: JointId) -> f32 {
        self.influences
            .iter()
            .filter(|i| i.joint == joint)
            .map(|i| i.weight)
            .sum()
    }

    /// Strongest influence
    pub fn dominant(&self) -> Option<Influence> {
        self.influences
            .iter()
            .copied()
            .reduce(|best, i| if i.weight > best.weight { i } else { best })
    }

    /// Scale weights to sum to one
    ///
    /// Returns `false` and leaves the weights untouched when the sum is not positive.
    pub fn normalize(&mut self) -> bool {
        let total = self.sum();
        if !(total > 0.0) {
            return false;
        }
        for influence in &mut self.influences {
            influence.weight /= total;
        }
        true
    }

    /// Drop influences at or below `threshold`
    pub fn prune(&mut self, threshold: f32) {
        self.influences.retain(|i| i.weight > threshold);
    }

    /// Keep only the `count` strongest influences
    pub fn truncate_strongest(&mut self, count: usize) {
        self.sort_strongest_first();
        self.influences.truncate(count);
    }

    /// Stable sort by descending weight
    pub fn sort_strongest_first(&mut self) {
        self.influences
            .sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }

    /// Whether the weights sum to one within [`SUM_TOLERANCE`]
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= SUM_TOLERANCE
    }
}

impl FromIterator<Influence> for VertexWeights {
    fn from_iter<I: IntoIterator<Item = Influence>>(iter: I) -> Self {
        Self {
            influences: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a VertexWeights {
    type Item = &'a Influence;
    type IntoIter = std::slice::Iter<'a, Influence>;

    fn into_iter(self) -> Self::IntoIter {
        self.influences.iter()
    }
}

/// A weight from the point of view of a joint's vertex group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupWeight {
    /// The vertex this weight applies to
    pub vertex_id: u32,
    pub weight: f32,
}

/// Weights for every vertex of a mesh, indexed by vertex
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    vertices: Vec<VertexWeights>,
}

impl WeightTable {
    /// Wrap per-vertex weights
    pub fn new(vertices: Vec<VertexWeights>) -> Self {
        Self { vertices }
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the table covers no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Weights of vertex `index`
    pub fn get(&self, index: usize) -> Option<&VertexWeights> {
        self.vertices.get(index)
    }

    /// Iterate in vertex order
    pub fn iter(&self) -> std::slice::Iter<'_, VertexWeights> {
        self.vertices.iter()
    }

    /// Per-vertex weights as a slice
    pub fn as_slice(&self) -> &[VertexWeights] {
        &self.vertices
    }

    /// Indices of vertices with no influence at all
    pub fn unweighted(&self) -> impl Iterator<Item = usize> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_empty())
            .map(|(index, _)| index)
    }

    /// Largest influence count over all vertices
    pub fn max_influences(&self) -> usize {
        self.vertices.iter().map(VertexWeights::len).max().unwrap_or(0)
    }

    /// The vertex group of one joint
    pub fn group(&self, joint: JointId) -> Vec<GroupWeight> {
        self.vertices
            .iter()
            .enumerate()
            .filter_map(|(index, weights)| {
                let weight = weights.weight_for(joint);
                (weight > 0.0).then_some(GroupWeight {
                    vertex_id: index as u32,
                    weight,
                })
            })
            .collect()
    }

    /// Invert the table into per-joint vertex groups
    pub fn groups(&self) -> BTreeMap<JointId, Vec<GroupWeight>> {
        let mut groups: BTreeMap<JointId, Vec<GroupWeight>> = BTreeMap::new();
        for (index, weights) in self.vertices.iter().enumerate() {
            for influence in weights {
                groups.entry(influence.joint).or_default().push(GroupWeight {
                    vertex_id: index as u32,
                    weight: influence.weight,
                });
            }
        }
        groups
    }
}

impl<'a> IntoIterator for &'a WeightTable {
    type Item = &'a VertexWeights;
    type IntoIter = std::slice::Iter<'a, VertexWeights>;

    fn into_iter(self) -> Self::IntoIter {
        self.vertices.iter()
    }
}
