//! Skeleton construction from a validated bone schema
//!
//! The skeleton is a strongly-typed joint registry: joints live in a flat vector
//! in schema order, parents and children are stored as indices into it, and a
//! lookup table maps [`JointId`] to that index.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    aabb::AABB,
    error::{Error, Result},
    schema::{BoneSchema, DepthPlacement, JointId, JointKind, Side},
    types::Vector3D,
};

/// Tail offset used for the head top, leaf joints and degenerate directions
const UP_TAIL_FRACTION: f32 = 0.05;
/// Tail offset for toes, pointing along -Z
const TOE_TAIL_FRACTION: f32 = 0.05;
/// Lateral and downward tail offset for hands
const HAND_TAIL_FRACTION: f32 = 0.03;

/// Tunables for tail placement and depth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonSettings {
    /// How far toward the first child the tail reaches
    pub child_tail_ratio: f32,
    /// Child directions shorter than this fall back to an upward tail
    pub degenerate_epsilon: f32,
    pub depth: DepthPlacement,
}

impl Default for SkeletonSettings {
    fn default() -> Self {
        Self {
            child_tail_ratio: 0.8,
            degenerate_epsilon: 0.01,
            depth: DepthPlacement::Zero,
        }
    }
}

/// A joint in world space
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub id: JointId,
    pub kind: JointKind,
    pub side: Side,
    pub head: Vector3D,
    /// End of the bone segment; `tail - head` is the joint's forward axis
    pub tail: Vector3D,
    /// Index of the parent joint, `None` only for the root
    pub parent: Option<usize>,
    /// Indices of child joints in schema order
    pub children: Vec<usize>,
    /// Whether the parent's chain continues straight into this joint
    pub connected: bool,
    /// Influence radius for envelope weighting
    pub envelope_radius: f32,
}

impl Joint {
    /// Bone length
    pub fn length(&self) -> f32 {
        self.head.distance(self.tail)
    }

    /// Whether the joint has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted joint tree built once from a schema and mesh bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    joints: Vec<Joint>,
    lookup: HashMap<JointId, usize>,
    height: f32,
}

impl Skeleton {
    /// Build a skeleton by placing `schema` inside `bounds`
    pub fn build(schema: &BoneSchema, bounds: &AABB, settings: &SkeletonSettings) -> Result<Self> {
        schema.validate()?;

        let height = bounds.height();
        if !bounds.is_finite() || !(height > f32::EPSILON) {
            return Err(Error::DegenerateBounds {
                height,
                epsilon: f32::EPSILON,
            });
        }

        let lookup: HashMap<JointId, usize> = schema
            .joints()
            .iter()
            .enumerate()
            .map(|(index, def)| (def.id, index))
            .collect();

        let heads: Vec<Vector3D> = schema
            .joints()
            .iter()
            .map(|def| def.head_position(bounds, settings.depth))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); schema.len()];
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(schema.len());
        for (index, def) in schema.joints().iter().enumerate() {
            let parent = match def.parent {
                Some(parent_id) => {
                    let parent = *lookup.get(&parent_id).ok_or(Error::UnknownParent {
                        joint: def.id,
                        parent: parent_id,
                    })?;
                    children[parent].push(index);
                    Some(parent)
                }
                None => None,
            };
            parents.push(parent);
        }

        let joints = schema
            .joints()
            .iter()
            .enumerate()
            .map(|(index, def)| {
                let head = heads[index];
                let first_child = children[index].first().map(|&c| heads[c]);
                let tail = tail_for(def.kind, def.side, head, first_child, height, settings);
                Joint {
                    id: def.id,
                    kind: def.kind,
                    side: def.side,
                    head,
                    tail,
                    parent: parents[index],
                    children: std::mem::take(&mut children[index]),
                    connected: parents[index].is_some() && !def.kind.is_limb_root(),
                    envelope_radius: height * def.kind.envelope_fraction(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Built skeleton with {} joints for mesh height {:.3}",
            joints.len(),
            height
        );

        Ok(Self {
            joints,
            lookup,
            height,
        })
    }

    /// Number of joints
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the skeleton is empty
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Mesh height the skeleton was built for
    pub fn height(&self) -> f32 {
        self.height
    }

    /// All joints in schema order
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Iterate joints in schema order
    pub fn iter(&self) -> std::slice::Iter<'_, Joint> {
        self.joints.iter()
    }

    /// Index of a joint
    pub fn index_of(&self, id: JointId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// Whether the skeleton contains `id`
    pub fn contains(&self, id: JointId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Look up a joint by id
    pub fn get(&self, id: JointId) -> Option<&Joint> {
        self.index_of(id).map(|index| &self.joints[index])
    }

    /// Look up a joint by index
    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    /// The root joint
    pub fn root(&self) -> &Joint {
        // Validation guarantees exactly one parentless joint, declared before its children.
        &self.joints[0]
    }

    /// Parent of `id`
    pub fn parent(&self, id: JointId) -> Option<&Joint> {
        self.get(id)
            .and_then(|joint| joint.parent)
            .map(|index| &self.joints[index])
    }

    /// Direct children of `id`
    pub fn children(&self, id: JointId) -> impl Iterator<Item = &Joint> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(move |joint| joint.children.iter().map(move |&c| &self.joints[c]))
    }

    /// Walk from `id` up to the root, excluding `id` itself
    pub fn ancestors(&self, id: JointId) -> Ancestors<'_> {
        Ancestors {
            skeleton: self,
            next: self.get(id).and_then(|joint| joint.parent),
        }
    }

    /// Number of parent links between `id` and the root
    pub fn depth(&self, id: JointId) -> Option<usize> {
        self.get(id).map(|_| self.ancestors(id).count())
    }

    /// Head/tail segment of the joint at `index`
    pub fn segment(&self, index: usize) -> (Vector3D, Vector3D) {
        let joint = &self.joints[index];
        (joint.head, joint.tail)
    }
}

impl<'a> IntoIterator for &'a Skeleton {
    type Item = &'a Joint;
    type IntoIter = std::slice::Iter<'a, Joint>;

    fn into_iter(self) -> Self::IntoIter {
        self.joints.iter()
    }
}

/// Iterator over a joint's ancestors, nearest first
pub struct Ancestors<'a> {
    skeleton: &'a Skeleton,
    next: Option<usize>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Joint;

    fn next(&mut self) -> Option<Self::Item> {
        let joint = self.skeleton.joints.get(self.next?)?;
        self.next = joint.parent;
        Some(joint)
    }
}

fn tail_for(
    kind: JointKind,
    side: Side,
    head: Vector3D,
    first_child: Option<Vector3D>,
    height: f32,
    settings: &SkeletonSettings,
) -> Vector3D {
    let up = Vector3D::new(0.0, height * UP_TAIL_FRACTION, 0.0);
    match kind {
        JointKind::HeadTop => head + up,
        JointKind::Toe => head + Vector3D::new(0.0, 0.0, -height * TOE_TAIL_FRACTION),
        JointKind::Hand => {
            let offset = height * HAND_TAIL_FRACTION;
            head + Vector3D::new(side.lateral_sign() * offset, -offset, 0.0)
        }
        _ => match first_child {
            Some(child) => {
                let direction = child - head;
                if direction.length() < settings.degenerate_epsilon {
                    head + up
                } else {
                    head + direction * settings.child_tail_ratio
                }
            }
            None => head + up,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_skeleton() -> Skeleton {
        let bounds = AABB::new(
            Vector3D::new(-0.6, -1.78, -0.2),
            Vector3D::new(0.6, 1.47, 0.2),
        );
        Skeleton::build(&BoneSchema::humanoid(), &bounds, &SkeletonSettings::default()).unwrap()
    }

    #[test]
    fn test_single_root() {
        let skeleton = reference_skeleton();
        assert_eq!(skeleton.root().id, JointId::Hips);
        assert!(skeleton.root().parent.is_none());
        let roots = skeleton.iter().filter(|j| j.parent.is_none()).count();
        assert_eq!(roots, 1);
    }

    #[test]
    fn test_ancestor_chains_terminate_at_root() {
        let skeleton = reference_skeleton();
        for joint in &skeleton {
            let chain: Vec<_> = skeleton.ancestors(joint.id).map(|j| j.id).collect();
            assert!(chain.len() < skeleton.len());
            if joint.id != JointId::Hips {
                assert_eq!(chain.last(), Some(&JointId::Hips));
            }
        }
        assert_eq!(skeleton.depth(JointId::LeftToe), Some(4));
        assert_eq!(skeleton.depth(JointId::HeadTop), Some(6));
    }

    #[test]
    fn test_tail_points_toward_first_child() {
        let skeleton = reference_skeleton();
        let spine = skeleton.get(JointId::Spine).unwrap();
        let spine1 = skeleton.get(JointId::Spine1).unwrap();
        let expected = spine.head + (spine1.head - spine.head) * 0.8;
        assert_relative_eq!(spine.tail.y, expected.y, epsilon = 1e-6);

        // Chest has three children; the neck is declared first.
        let chest = skeleton.get(JointId::Chest).unwrap();
        let neck = skeleton.get(JointId::Neck).unwrap();
        assert_relative_eq!(chest.tail.x, 0.0);
        assert_relative_eq!(
            chest.tail.y,
            chest.head.y + (neck.head.y - chest.head.y) * 0.8,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_extremity_tails() {
        let skeleton = reference_skeleton();
        let h = skeleton.height();

        let left = skeleton.get(JointId::LeftHand).unwrap();
        assert_relative_eq!(left.tail.x - left.head.x, -0.03 * h, epsilon = 1e-6);
        assert_relative_eq!(left.tail.y - left.head.y, -0.03 * h, epsilon = 1e-6);
        let right = skeleton.get(JointId::RightHand).unwrap();
        assert_relative_eq!(right.tail.x - right.head.x, 0.03 * h, epsilon = 1e-6);

        let toe = skeleton.get(JointId::LeftToe).unwrap();
        assert_relative_eq!(toe.tail.z - toe.head.z, -0.05 * h, epsilon = 1e-6);
        assert_relative_eq!(toe.tail.y, toe.head.y);

        let top = skeleton.get(JointId::HeadTop).unwrap();
        assert_relative_eq!(top.tail.y - top.head.y, 0.05 * h, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_child_direction_points_up() {
        let mut rows = BoneSchema::humanoid().joints().to_vec();
        // Put the foot on top of the lower leg.
        let lower = rows.iter().find(|d| d.id == JointId::LeftLowerLeg).unwrap().y_fraction;
        for row in rows.iter_mut().filter(|d| d.id == JointId::LeftFoot) {
            row.y_fraction = lower;
        }
        let bounds = AABB::new(Vector3D::new(-0.5, 0.0, 0.0), Vector3D::new(0.5, 2.0, 0.0));
        let skeleton =
            Skeleton::build(&BoneSchema::new(rows), &bounds, &SkeletonSettings::default()).unwrap();
        let joint = skeleton.get(JointId::LeftLowerLeg).unwrap();
        assert_relative_eq!(joint.tail.x, joint.head.x);
        assert_relative_eq!(joint.tail.y - joint.head.y, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_connectivity() {
        let skeleton = reference_skeleton();
        for id in [
            JointId::LeftShoulder,
            JointId::RightShoulder,
            JointId::LeftUpperLeg,
            JointId::RightUpperLeg,
            JointId::Hips,
        ] {
            assert!(!skeleton.get(id).unwrap().connected, "{id} should be disjoint");
        }
        for id in [JointId::Spine, JointId::LeftUpperArm, JointId::RightFoot, JointId::Head] {
            assert!(skeleton.get(id).unwrap().connected, "{id} should be connected");
        }
    }

    #[test]
    fn test_envelope_radii() {
        let skeleton = reference_skeleton();
        let h = skeleton.height();
        assert_relative_eq!(skeleton.get(JointId::Spine).unwrap().envelope_radius, 0.12 * h);
        assert_relative_eq!(skeleton.get(JointId::LeftHand).unwrap().envelope_radius, 0.06 * h);
        assert_relative_eq!(skeleton.get(JointId::RightFoot).unwrap().envelope_radius, 0.06 * h);
        assert_relative_eq!(skeleton.get(JointId::HeadTop).unwrap().envelope_radius, 0.10 * h);
        assert_relative_eq!(skeleton.get(JointId::Head).unwrap().envelope_radius, 0.10 * h);
    }

    #[test]
    fn test_children_lookup() {
        let skeleton = reference_skeleton();
        let ids: Vec<_> = skeleton.children(JointId::Hips).map(|j| j.id).collect();
        assert_eq!(
            ids,
            vec![JointId::Spine, JointId::LeftUpperLeg, JointId::RightUpperLeg]
        );
        assert_eq!(skeleton.parent(JointId::LeftHand).unwrap().id, JointId::LeftLowerArm);
        assert!(skeleton.get(JointId::LeftToe).unwrap().is_leaf());
    }

    #[test]
    fn test_flat_bounds_rejected() {
        let bounds = AABB::new(Vector3D::new(-1.0, 0.5, 0.0), Vector3D::new(1.0, 0.5, 0.0));
        let err = Skeleton::build(&BoneSchema::humanoid(), &bounds, &SkeletonSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateBounds { .. }));
    }

    #[test]
    fn test_unbounded_bounds_rejected() {
        let bounds = AABB::new(
            Vector3D::new(-1.0, 0.0, 0.0),
            Vector3D::new(1.0, f32::INFINITY, 0.0),
        );
        let err = Skeleton::build(&BoneSchema::humanoid(), &bounds, &SkeletonSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateBounds { .. }));
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(reference_skeleton(), reference_skeleton());
    }
}
