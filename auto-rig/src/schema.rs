//! Bone schema: the named joint layout expressed in bounding-box fractions
//!
//! Each joint's head sits at `center_x + x_fraction * half_width` laterally and
//! `min_y + y_fraction * height` vertically. Depth is either zero or the mesh's
//! mid-depth, see [`DepthPlacement`].

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    aabb::AABB,
    error::{Error, Result},
    types::Vector3D,
};

/// Identifier of a joint in the humanoid rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointId {
    Hips,
    Spine,
    Spine1,
    Chest,
    Neck,
    Head,
    HeadTop,
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToe,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToe,
}

impl JointId {
    /// Every joint, in humanoid schema order
    pub const ALL: [JointId; 23] = [
        JointId::Hips,
        JointId::Spine,
        JointId::Spine1,
        JointId::Chest,
        JointId::Neck,
        JointId::Head,
        JointId::HeadTop,
        JointId::LeftShoulder,
        JointId::LeftUpperArm,
        JointId::LeftLowerArm,
        JointId::LeftHand,
        JointId::RightShoulder,
        JointId::RightUpperArm,
        JointId::RightLowerArm,
        JointId::RightHand,
        JointId::LeftUpperLeg,
        JointId::LeftLowerLeg,
        JointId::LeftFoot,
        JointId::LeftToe,
        JointId::RightUpperLeg,
        JointId::RightLowerLeg,
        JointId::RightFoot,
        JointId::RightToe,
    ];

    /// Name used for vertex groups and exported nodes
    pub fn as_str(self) -> &'static str {
        match self {
            JointId::Hips => "Hips",
            JointId::Spine => "Spine",
            JointId::Spine1 => "Spine1",
            JointId::Chest => "Chest",
            JointId::Neck => "Neck",
            JointId::Head => "Head",
            JointId::HeadTop => "HeadTop",
            JointId::LeftShoulder => "LeftShoulder",
            JointId::LeftUpperArm => "LeftUpperArm",
            JointId::LeftLowerArm => "LeftLowerArm",
            JointId::LeftHand => "LeftHand",
            JointId::RightShoulder => "RightShoulder",
            JointId::RightUpperArm => "RightUpperArm",
            JointId::RightLowerArm => "RightLowerArm",
            JointId::RightHand => "RightHand",
            JointId::LeftUpperLeg => "LeftUpperLeg",
            JointId::LeftLowerLeg => "LeftLowerLeg",
            JointId::LeftFoot => "LeftFoot",
            JointId::LeftToe => "LeftToe",
            JointId::RightUpperLeg => "RightUpperLeg",
            JointId::RightLowerLeg => "RightLowerLeg",
            JointId::RightFoot => "RightFoot",
            JointId::RightToe => "RightToe",
        }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JointId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::invalid_parameter(format!("unknown joint name `{s}`")))
    }
}

/// Which side of the body a joint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    /// Lateral direction pointing away from the center line
    pub fn lateral_sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
            Side::Center => 0.0,
        }
    }
}

/// Anatomical role of a joint; drives tail, envelope and connectivity rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointKind {
    Torso,
    Head,
    HeadTop,
    Shoulder,
    UpperArm,
    LowerArm,
    Hand,
    UpperLeg,
    LowerLeg,
    Foot,
    Toe,
}

impl JointKind {
    /// Limb roots branch off the torso instead of extending it
    pub fn is_limb_root(self) -> bool {
        matches!(self, JointKind::Shoulder | JointKind::UpperLeg)
    }

    /// Hands, feet and toes
    pub fn is_extremity(self) -> bool {
        matches!(self, JointKind::Hand | JointKind::Foot | JointKind::Toe)
    }

    /// Envelope radius as a fraction of mesh height
    pub fn envelope_fraction(self) -> f32 {
        match self {
            JointKind::Hand | JointKind::Foot | JointKind::Toe => 0.06,
            JointKind::Head | JointKind::HeadTop => 0.10,
            _ => 0.12,
        }
    }
}

/// Where joint heads sit along the depth (Z) axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthPlacement {
    /// Z = 0 regardless of the mesh
    #[default]
    Zero,
    /// Z at the middle of the mesh's depth extent
    Center,
}

/// One row of the schema
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointDef {
    pub id: JointId,
    pub kind: JointKind,
    pub side: Side,
    /// Lateral offset as a fraction of half-width from the center line
    pub x_fraction: f32,
    /// Height as a fraction of mesh height from the bottom
    pub y_fraction: f32,
    pub parent: Option<JointId>,
}

impl JointDef {
    const fn new(
        id: JointId,
        kind: JointKind,
        side: Side,
        x_fraction: f32,
        y_fraction: f32,
        parent: Option<JointId>,
    ) -> Self {
        Self {
            id,
            kind,
            side,
            x_fraction,
            y_fraction,
            parent,
        }
    }

    /// World-space head position for this joint inside `bounds`
    pub fn head_position(&self, bounds: &AABB, depth: DepthPlacement) -> Vector3D {
        let center = bounds.center();
        let z = match depth {
            DepthPlacement::Zero => 0.0,
            DepthPlacement::Center => center.z,
        };
        Vector3D::new(
            center.x + self.x_fraction * bounds.half_width(),
            bounds.min.y + self.y_fraction * bounds.height(),
            z,
        )
    }
}

/// An ordered joint table with parent declarations
///
/// Parents must be declared before their children, which keeps the hierarchy
/// acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneSchema {
    joints: Vec<JointDef>,
}

impl BoneSchema {
    /// Create a schema from explicit rows; call [`BoneSchema::validate`] before use
    pub fn new(joints: Vec<JointDef>) -> Self {
        Self { joints }
    }

    /// The 23-joint humanoid layout
    pub fn humanoid() -> Self {
        use JointId::*;
        use JointKind as K;
        use Side::{Center as C, Left as L, Right as R};

        Self::new(vec![
            JointDef::new(Hips, K::Torso, C, 0.0, 0.21, None),
            JointDef::new(Spine, K::Torso, C, 0.0, 0.35, Some(Hips)),
            JointDef::new(Spine1, K::Torso, C, 0.0, 0.45, Some(Spine)),
            JointDef::new(Chest, K::Torso, C, 0.0, 0.58, Some(Spine1)),
            JointDef::new(Neck, K::Torso, C, 0.0, 0.75, Some(Chest)),
            JointDef::new(Head, K::Head, C, 0.0, 0.85, Some(Neck)),
            JointDef::new(HeadTop, K::HeadTop, C, 0.0, 1.0, Some(Head)),
            JointDef::new(LeftShoulder, K::Shoulder, L, -0.45, 0.72, Some(Chest)),
            JointDef::new(LeftUpperArm, K::UpperArm, L, -0.85, 0.72, Some(LeftShoulder)),
            JointDef::new(LeftLowerArm, K::LowerArm, L, -0.85, 0.52, Some(LeftUpperArm)),
            JointDef::new(LeftHand, K::Hand, L, -0.85, 0.35, Some(LeftLowerArm)),
            JointDef::new(RightShoulder, K::Shoulder, R, 0.45, 0.72, Some(Chest)),
            JointDef::new(RightUpperArm, K::UpperArm, R, 0.85, 0.72, Some(RightShoulder)),
            JointDef::new(RightLowerArm, K::LowerArm, R, 0.85, 0.52, Some(RightUpperArm)),
            JointDef::new(RightHand, K::Hand, R, 0.85, 0.35, Some(RightLowerArm)),
            JointDef::new(LeftUpperLeg, K::UpperLeg, L, -0.25, 0.22, Some(Hips)),
            JointDef::new(LeftLowerLeg, K::LowerLeg, L, -0.25, 0.11, Some(LeftUpperLeg)),
            JointDef::new(LeftFoot, K::Foot, L, -0.25, 0.02, Some(LeftLowerLeg)),
            JointDef::new(LeftToe, K::Toe, L, -0.25, 0.0, Some(LeftFoot)),
            JointDef::new(RightUpperLeg, K::UpperLeg, R, 0.25, 0.22, Some(Hips)),
            JointDef::new(RightLowerLeg, K::LowerLeg, R, 0.25, 0.11, Some(RightUpperLeg)),
            JointDef::new(RightFoot, K::Foot, R, 0.25, 0.02, Some(RightLowerLeg)),
            JointDef::new(RightToe, K::Toe, R, 0.25, 0.0, Some(RightFoot)),
        ])
    }

    /// Rows in declaration order
    pub fn joints(&self) -> &[JointDef] {
        &self.joints
    }

    /// Number of joints
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the schema has no joints
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Find a joint row by id
    pub fn get(&self, id: JointId) -> Option<&JointDef> {
        self.joints.iter().find(|def| def.id == id)
    }

    /// The parentless joint, if the schema has exactly one
    pub fn root(&self) -> Option<&JointDef> {
        let mut roots = self.joints.iter().filter(|def| def.parent.is_none());
        match (roots.next(), roots.next()) {
            (Some(root), None) => Some(root),
            _ => None,
        }
    }

    /// Direct children of `id` in declaration order
    pub fn children_of(&self, id: JointId) -> impl Iterator<Item = &JointDef> + '_ {
        self.joints
            .iter()
            .filter(move |def| def.parent == Some(id))
    }

    /// Check the structural rules: unique ids, one root, parents declared first
    pub fn validate(&self) -> Result<()> {
        let roots = self.joints.iter().filter(|d| d.parent.is_none()).count();
        if roots != 1 {
            return Err(Error::InvalidRoot { count: roots });
        }

        let mut seen = HashSet::with_capacity(self.joints.len());
        for def in &self.joints {
            if let Some(parent) = def.parent {
                if !seen.contains(&parent) {
                    return Err(if self.get(parent).is_some() {
                        Error::ParentDeclaredLate {
                            joint: def.id,
                            parent,
                        }
                    } else {
                        Error::UnknownParent {
                            joint: def.id,
                            parent,
                        }
                    });
                }
            }
            if !seen.insert(def.id) {
                return Err(Error::DuplicateJoint { joint: def.id });
            }
        }
        Ok(())
    }

    /// World-space head positions for every joint, in declaration order
    pub fn joint_positions(
        &self,
        bounds: &AABB,
        depth: DepthPlacement,
    ) -> Vec<(JointId, Vector3D)> {
        self.joints
            .iter()
            .map(|def| (def.id, def.head_position(bounds, depth)))
            .collect()
    }
}

impl Default for BoneSchema {
    fn default() -> Self {
        Self::humanoid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_bounds() -> AABB {
        AABB::new(
            Vector3D::new(-0.6, -1.78, -0.2),
            Vector3D::new(0.6, 1.47, 0.2),
        )
    }

    #[test]
    fn test_humanoid_is_valid() {
        let schema = BoneSchema::humanoid();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.len(), JointId::ALL.len());
        assert_eq!(schema.root().map(|r| r.id), Some(JointId::Hips));
    }

    #[test]
    fn test_hips_position() {
        let schema = BoneSchema::humanoid();
        let hips = schema.get(JointId::Hips).unwrap();
        let head = hips.head_position(&reference_bounds(), DepthPlacement::Zero);
        assert_relative_eq!(head.x, 0.0);
        assert_relative_eq!(head.y, -1.0975, epsilon = 1e-5);
        assert_relative_eq!(head.z, 0.0);
    }

    #[test]
    fn test_left_is_negative_x() {
        let schema = BoneSchema::humanoid();
        let bounds = reference_bounds();
        let left = schema.get(JointId::LeftHand).unwrap();
        let right = schema.get(JointId::RightHand).unwrap();
        let l = left.head_position(&bounds, DepthPlacement::Zero);
        let r = right.head_position(&bounds, DepthPlacement::Zero);
        assert_relative_eq!(l.x, -0.51, epsilon = 1e-6);
        assert_relative_eq!(r.x, 0.51, epsilon = 1e-6);
        assert_eq!(left.side, Side::Left);
    }

    #[test]
    fn test_center_depth() {
        let bounds = AABB::new(Vector3D::new(-1.0, 0.0, 0.5), Vector3D::new(1.0, 2.0, 1.5));
        let schema = BoneSchema::humanoid();
        let head = schema
            .get(JointId::Chest)
            .unwrap()
            .head_position(&bounds, DepthPlacement::Center);
        assert_relative_eq!(head.z, 1.0);
    }

    #[test]
    fn test_children_in_declaration_order() {
        let schema = BoneSchema::humanoid();
        let children: Vec<_> = schema.children_of(JointId::Chest).map(|d| d.id).collect();
        assert_eq!(
            children,
            vec![JointId::Neck, JointId::LeftShoulder, JointId::RightShoulder]
        );
    }

    #[test]
    fn test_unknown_parent_fails_fast() {
        let mut rows = BoneSchema::humanoid().joints().to_vec();
        rows.retain(|d| d.id != JointId::LeftLowerArm);
        let err = BoneSchema::new(rows).validate().unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownParent {
                joint: JointId::LeftHand,
                parent: JointId::LeftLowerArm
            }
        ));
    }

    #[test]
    fn test_parent_declared_late() {
        let mut rows = BoneSchema::humanoid().joints().to_vec();
        let spine = rows.remove(1);
        rows.push(spine);
        let err = BoneSchema::new(rows).validate().unwrap_err();
        assert!(matches!(
            err,
            Error::ParentDeclaredLate {
                joint: JointId::Spine1,
                parent: JointId::Spine
            }
        ));
    }

    #[test]
    fn test_duplicate_and_root_checks() {
        let mut rows = BoneSchema::humanoid().joints().to_vec();
        rows.push(rows[3]);
        assert!(matches!(
            BoneSchema::new(rows).validate(),
            Err(Error::DuplicateJoint {
                joint: JointId::Chest
            })
        ));

        let mut rows = BoneSchema::humanoid().joints().to_vec();
        rows[1].parent = None;
        assert!(matches!(
            BoneSchema::new(rows).validate(),
            Err(Error::InvalidRoot { count: 2 })
        ));

        assert!(matches!(
            BoneSchema::new(Vec::new()).validate(),
            Err(Error::InvalidRoot { count: 0 })
        ));
    }

    #[test]
    fn test_joint_name_parsing() {
        for id in JointId::ALL {
            assert_eq!(id.as_str().parse::<JointId>().unwrap(), id);
        }
        assert!("LeftTail".parse::<JointId>().is_err());
    }
}
