//! Anatomical regions and the zone profile used by zone weighting
//!
//! Vertices are classified into one of six regions from their position inside
//! the mesh bounding box. Each region carries an ordered list of candidate
//! joints with a vertical center and radius in normalized height.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    aabb::AABB,
    error::{Error, Result},
    schema::JointId,
    skeleton::Skeleton,
    types::Vector3D,
};

/// One of the six anatomical regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Head,
    Torso,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl Region {
    /// All regions in a stable order
    pub const ALL: [Region; 6] = [
        Region::Head,
        Region::Torso,
        Region::LeftArm,
        Region::RightArm,
        Region::LeftLeg,
        Region::RightLeg,
    ];

    /// Position of this region in [`Region::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Region name
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Head => "Head",
            Region::Torso => "Torso",
            Region::LeftArm => "LeftArm",
            Region::RightArm => "RightArm",
            Region::LeftLeg => "LeftLeg",
            Region::RightLeg => "RightLeg",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point expressed relative to the mesh bounds
///
/// `y` is 0 at the bottom and 1 at the top. `x` is 0 on the lateral center
/// line and ±1 at the sides, negative toward the character's left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedCoords {
    pub x: f32,
    pub y: f32,
}

impl NormalizedCoords {
    /// Normalize `point` against `bounds`
    ///
    /// A degenerate half-width maps every point onto the center line.
    pub fn of(point: Vector3D, bounds: &AABB) -> Self {
        let height = bounds.height();
        let half_width = bounds.half_width();
        let y = if height > f32::EPSILON {
            (point.y - bounds.min.y) / height
        } else {
            0.0
        };
        let x = if half_width > f32::EPSILON {
            (point.x - bounds.center().x) / half_width
        } else {
            0.0
        };
        Self { x, y }
    }
}

/// Region boundaries in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneThresholds {
    /// Anything strictly above this height is head
    pub head_above: f32,
    /// Arms start strictly above this height
    pub arm_above: f32,
    /// Arms start strictly beyond this lateral offset
    pub arm_lateral: f32,
    /// Legs are strictly below this height
    pub leg_below: f32,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            head_above: 0.78,
            arm_above: 0.27,
            arm_lateral: 0.38,
            leg_below: 0.27,
        }
    }
}

impl ZoneThresholds {
    /// Classify normalized coordinates, first matching rule wins
    pub fn classify(&self, coords: NormalizedCoords) -> Region {
        let NormalizedCoords { x, y } = coords;
        if y > self.head_above {
            Region::Head
        } else if y > self.arm_above && x.abs() > self.arm_lateral {
            if x < 0.0 {
                Region::LeftArm
            } else {
                Region::RightArm
            }
        } else if y < self.leg_below {
            if x < 0.0 {
                Region::LeftLeg
            } else {
                Region::RightLeg
            }
        } else {
            Region::Torso
        }
    }

    /// Classify a world-space point
    pub fn classify_point(&self, point: Vector3D, bounds: &AABB) -> Region {
        self.classify(NormalizedCoords::of(point, bounds))
    }
}

/// A candidate joint for a region with its vertical falloff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBone {
    pub joint: JointId,
    /// Normalized height of peak influence
    pub center: f32,
    /// Normalized vertical spread
    pub radius: f32,
}

impl ZoneBone {
    /// Create a zone bone
    pub const fn new(joint: JointId, center: f32, radius: f32) -> Self {
        Self {
            joint,
            center,
            radius,
        }
    }

    /// Gaussian falloff at normalized height `y`
    pub fn falloff(&self, y: f32, padding: f32) -> f32 {
        let sigma = self.radius + padding;
        let u = (y - self.center) / sigma;
        (-0.5 * u * u).exp()
    }
}

/// Classifier thresholds and per-region candidate joints
///
/// The first bone listed for each region is its fallback when no candidate
/// survives the significance cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneProfile {
    pub thresholds: ZoneThresholds,
    /// Added to every radius before evaluating the falloff
    pub falloff_padding: f32,
    pub head: Vec<ZoneBone>,
    pub torso: Vec<ZoneBone>,
    pub left_arm: Vec<ZoneBone>,
    pub right_arm: Vec<ZoneBone>,
    pub left_leg: Vec<ZoneBone>,
    pub right_leg: Vec<ZoneBone>,
}

impl ZoneProfile {
    /// Tuned profile for the humanoid schema
    pub fn humanoid() -> Self {
        use JointId::*;

        let bone = ZoneBone::new;
        Self {
            thresholds: ZoneThresholds::default(),
            falloff_padding: 0.02,
            head: vec![
                bone(Neck, 0.77, 0.03),
                bone(Head, 0.88, 0.08),
                bone(HeadTop, 0.98, 0.04),
            ],
            torso: vec![
                bone(Spine, 0.36, 0.06),
                bone(Hips, 0.24, 0.05),
                bone(Spine1, 0.46, 0.06),
                bone(Chest, 0.60, 0.09),
                bone(Neck, 0.75, 0.03),
            ],
            left_arm: vec![
                bone(LeftUpperArm, 0.64, 0.08),
                bone(LeftShoulder, 0.72, 0.03),
                bone(LeftLowerArm, 0.45, 0.08),
                bone(LeftHand, 0.32, 0.05),
            ],
            right_arm: vec![
                bone(RightUpperArm, 0.64, 0.08),
                bone(RightShoulder, 0.72, 0.03),
                bone(RightLowerArm, 0.45, 0.08),
                bone(RightHand, 0.32, 0.05),
            ],
            left_leg: vec![
                bone(LeftUpperLeg, 0.17, 0.05),
                bone(LeftLowerLeg, 0.07, 0.04),
                bone(LeftFoot, 0.02, 0.02),
                bone(LeftToe, 0.0, 0.01),
            ],
            right_leg: vec![
                bone(RightUpperLeg, 0.17, 0.05),
                bone(RightLowerLeg, 0.07, 0.04),
                bone(RightFoot, 0.02, 0.02),
                bone(RightToe, 0.0, 0.01),
            ],
        }
    }

    /// Candidate bones for `region`, proximal first
    pub fn bones(&self, region: Region) -> &[ZoneBone] {
        match region {
            Region::Head => &self.head,
            Region::Torso => &self.torso,
            Region::LeftArm => &self.left_arm,
            Region::RightArm => &self.right_arm,
            Region::LeftLeg => &self.left_leg,
            Region::RightLeg => &self.right_leg,
        }
    }

    /// Mutable access to a region's bone list
    pub fn bones_mut(&mut self, region: Region) -> &mut Vec<ZoneBone> {
        match region {
            Region::Head => &mut self.head,
            Region::Torso => &mut self.torso,
            Region::LeftArm => &mut self.left_arm,
            Region::RightArm => &mut self.right_arm,
            Region::LeftLeg => &mut self.left_leg,
            Region::RightLeg => &mut self.right_leg,
        }
    }

    /// Check that every listed joint exists in `skeleton`
    pub fn validate(&self, skeleton: &Skeleton) -> Result<()> {
        for region in Region::ALL {
            if let Some(bone) = self
                .bones(region)
                .iter()
                .find(|bone| !skeleton.contains(bone.joint))
            {
                return Err(Error::UnknownZoneJoint {
                    region,
                    joint: bone.joint,
                });
            }
        }
        if !(self.falloff_padding >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "zone falloff padding must be non-negative, got {}",
                self.falloff_padding
            )));
        }
        Ok(())
    }
}

impl Default for ZoneProfile {
    fn default() -> Self {
        Self::humanoid()
    }
}
