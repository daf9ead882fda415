//! Procedural looping animation clips
//!
//! Each clip samples `t = (frame mod n) / n` for frames `0..=n`, so the last
//! key repeats the first and the clip loops without a seam. Rotations are
//! stored as Euler angles in radians, applied X then Y then Z about the fixed
//! axes; [`EulerKey::quaternion`] converts them for export.

use std::{collections::BTreeSet, f32::consts::TAU, fmt};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    schema::JointId,
    skeleton::Skeleton,
    types::{EulerRot, Quaternion, Vector3D},
};

/// Default playback rate of generated clips
pub const FRAMES_PER_SECOND: f32 = 24.0;

/// A keyframe containing a frame number and Euler angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerKey {
    pub frame: u32,
    pub value: Vector3D,
}

impl EulerKey {
    /// The rotation as a quaternion
    pub fn quaternion(&self) -> Quaternion {
        euler_to_quaternion(self.value)
    }
}

/// A keyframe containing a frame number and a 3D vector value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorKey {
    pub frame: u32,
    pub value: Vector3D,
}

/// A keyframe containing a frame number and a quaternion value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionKey {
    pub frame: u32,
    pub value: Quaternion,
}

/// Convert XYZ Euler angles (X applied first, about fixed axes) to a quaternion
pub fn euler_to_quaternion(euler: Vector3D) -> Quaternion {
    Quaternion::from_euler(EulerRot::ZYX, euler.z, euler.y, euler.x)
}

/// Keys for one joint in one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointChannel {
    pub joint: JointId,
    pub rotation_keys: Vec<EulerKey>,
    pub position_keys: Vec<VectorKey>,
}

impl JointChannel {
    fn new(joint: JointId) -> Self {
        Self {
            joint,
            rotation_keys: Vec::new(),
            position_keys: Vec::new(),
        }
    }

    /// Rotation keys converted to quaternions
    pub fn quaternion_keys(&self) -> Vec<QuaternionKey> {
        self.rotation_keys
            .iter()
            .map(|key| QuaternionKey {
                frame: key.frame,
                value: key.quaternion(),
            })
            .collect()
    }

    /// Rotation keyed at `frame`
    pub fn rotation_at(&self, frame: u32) -> Option<Vector3D> {
        self.rotation_keys
            .iter()
            .find(|key| key.frame == frame)
            .map(|key| key.value)
    }

    /// Translation keyed at `frame`
    pub fn position_at(&self, frame: u32) -> Option<Vector3D> {
        self.position_keys
            .iter()
            .find(|key| key.frame == frame)
            .map(|key| key.value)
    }
}

/// The built-in clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipKind {
    Walk,
    Idle,
    Run,
    Work,
    Wave,
}

impl ClipKind {
    /// All clips in generation order
    pub const ALL: [ClipKind; 5] = [
        ClipKind::Walk,
        ClipKind::Idle,
        ClipKind::Run,
        ClipKind::Work,
        ClipKind::Wave,
    ];

    /// Clip name
    pub fn name(self) -> &'static str {
        match self {
            ClipKind::Walk => "Walk",
            ClipKind::Idle => "Idle",
            ClipKind::Run => "Run",
            ClipKind::Work => "Work",
            ClipKind::Wave => "Wave",
        }
    }

    /// Loop length in frames
    pub fn frame_count(self) -> u32 {
        match self {
            ClipKind::Walk => 30,
            ClipKind::Idle => 60,
            ClipKind::Run => 20,
            ClipKind::Work => 40,
            ClipKind::Wave => 30,
        }
    }

    fn keyframe(self, keys: &mut KeyframeWriter<'_>, p: f32) {
        match self {
            ClipKind::Walk => stride(keys, p, &WALK),
            ClipKind::Idle => idle(keys, p),
            ClipKind::Run => stride(keys, p, &RUN),
            ClipKind::Work => work(keys, p),
            ClipKind::Wave => wave(keys, p),
        }
    }
}

impl fmt::Display for ClipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named looping clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub frame_count: u32,
    pub frames_per_second: f32,
    pub channels: Vec<JointChannel>,
}

impl Clip {
    /// Generate `kind` for the joints present in `skeleton`
    pub fn generate(kind: ClipKind, skeleton: &Skeleton) -> Self {
        let frame_count = kind.frame_count();
        let mut keys = KeyframeWriter::new(skeleton);
        for frame in 0..=frame_count {
            let t = (frame % frame_count) as f32 / frame_count as f32;
            keys.frame = frame;
            kind.keyframe(&mut keys, t * TAU);
        }
        if !keys.skipped.is_empty() {
            debug!(
                "{kind}: skipped channels for joints missing from the skeleton: {:?}",
                keys.skipped
            );
        }
        Self {
            name: kind.name().to_string(),
            frame_count,
            frames_per_second: FRAMES_PER_SECOND,
            channels: keys.channels,
        }
    }

    /// Generate every requested clip
    pub fn generate_all(kinds: &[ClipKind], skeleton: &Skeleton) -> Vec<Self> {
        kinds
            .iter()
            .map(|&kind| Self::generate(kind, skeleton))
            .collect()
    }

    /// Length of the loop in frames
    pub fn duration(&self) -> u32 {
        self.frame_count
    }

    /// Length of the loop in seconds
    pub fn duration_in_seconds(&self) -> f32 {
        self.frame_count as f32 / self.frames_per_second
    }

    /// Number of animated joints
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel for `joint`
    pub fn channel(&self, joint: JointId) -> Option<&JointChannel> {
        self.channels.iter().find(|channel| channel.joint == joint)
    }

    /// Whether the last key of every channel repeats its first
    pub fn is_seamless(&self) -> bool {
        self.channels.iter().all(|channel| {
            channel.rotation_keys.first().map(|k| k.value)
                == channel.rotation_keys.last().map(|k| k.value)
                && channel.position_keys.first().map(|k| k.value)
                    == channel.position_keys.last().map(|k| k.value)
        })
    }
}

/// Records keys for one frame at a time, skipping joints the skeleton lacks
struct KeyframeWriter<'a> {
    skeleton: &'a Skeleton,
    frame: u32,
    channels: Vec<JointChannel>,
    skipped: BTreeSet<JointId>,
}

impl<'a> KeyframeWriter<'a> {
    fn new(skeleton: &'a Skeleton) -> Self {
        Self {
            skeleton,
            frame: 0,
            channels: Vec::new(),
            skipped: BTreeSet::new(),
        }
    }

    fn channel(&mut self, joint: JointId) -> Option<&mut JointChannel> {
        if !self.skeleton.contains(joint) {
            self.skipped.insert(joint);
            return None;
        }
        let index = match self.channels.iter().position(|c| c.joint == joint) {
            Some(index) => index,
            None => {
                self.channels.push(JointChannel::new(joint));
                self.channels.len() - 1
            }
        };
        Some(&mut self.channels[index])
    }

    fn rot(&mut self, joint: JointId, rx: f32, ry: f32, rz: f32) {
        let frame = self.frame;
        if let Some(channel) = self.channel(joint) {
            channel.rotation_keys.push(EulerKey {
                frame,
                value: Vector3D::new(rx, ry, rz),
            });
        }
    }

    fn loc(&mut self, joint: JointId, x: f32, y: f32, z: f32) {
        let frame = self.frame;
        if let Some(channel) = self.channel(joint) {
            channel.position_keys.push(VectorKey {
                frame,
                value: Vector3D::new(x, y, z),
            });
        }
    }
}

/// Amplitudes shared by the walk and run cycles
struct Stride {
    upper_leg: f32,
    lower_leg: f32,
    foot: f32,
    upper_arm: f32,
    lower_arm_bend: f32,
    lower_arm: f32,
    spine_pitch: f32,
    spine_twist: f32,
    chest_roll: f32,
    bounce: f32,
    head_twist: f32,
    head_pitch: f32,
}

const WALK: Stride = Stride {
    upper_leg: 0.4,
    lower_leg: 0.5,
    foot: 0.15,
    upper_arm: 0.3,
    lower_arm_bend: -0.2,
    lower_arm: 0.15,
    spine_pitch: 0.0,
    spine_twist: 0.05,
    chest_roll: 0.03,
    bounce: 0.05,
    head_twist: 0.02,
    head_pitch: -0.03,
};

const RUN: Stride = Stride {
    upper_leg: 0.6,
    lower_leg: 0.8,
    foot: 0.25,
    upper_arm: 0.5,
    lower_arm_bend: -0.4,
    lower_arm: 0.25,
    spine_pitch: -0.08,
    spine_twist: 0.06,
    chest_roll: 0.0,
    bounce: 0.08,
    head_twist: 0.03,
    head_pitch: -0.05,
};

fn stride(keys: &mut KeyframeWriter<'_>, p: f32, s: &Stride) {
    use JointId::*;

    let left = p.sin();
    let right = (p + std::f32::consts::PI).sin();

    keys.rot(LeftUpperLeg, left * s.upper_leg, 0.0, 0.0);
    keys.rot(RightUpperLeg, right * s.upper_leg, 0.0, 0.0);
    keys.rot(LeftLowerLeg, left.max(0.0) * s.lower_leg, 0.0, 0.0);
    keys.rot(RightLowerLeg, right.max(0.0) * s.lower_leg, 0.0, 0.0);
    keys.rot(LeftFoot, -left * s.foot, 0.0, 0.0);
    keys.rot(RightFoot, -right * s.foot, 0.0, 0.0);
    keys.rot(LeftUpperArm, -left * s.upper_arm, 0.0, 0.0);
    keys.rot(RightUpperArm, -right * s.upper_arm, 0.0, 0.0);
    keys.rot(LeftLowerArm, s.lower_arm_bend - left.max(0.0) * s.lower_arm, 0.0, 0.0);
    keys.rot(RightLowerArm, s.lower_arm_bend - right.max(0.0) * s.lower_arm, 0.0, 0.0);
    keys.rot(Spine, s.spine_pitch, left * s.spine_twist, 0.0);
    if s.chest_roll != 0.0 {
        keys.rot(Chest, 0.0, 0.0, left * s.chest_roll);
    }
    keys.loc(Hips, 0.0, left.abs() * s.bounce, 0.0);
    keys.rot(Head, s.head_pitch, -left * s.head_twist, 0.0);
}

fn idle(keys: &mut KeyframeWriter<'_>, p: f32) {
    use JointId::*;

    let breath = p.sin() * 0.01;
    keys.rot(Spine, breath, 0.0, 0.0);
    keys.rot(Chest, 0.0, 0.0, (p * 0.5).sin() * 0.005);
    keys.rot(Hips, 0.0, 0.0, (p * 0.3).sin() * 0.015);
    keys.loc(Hips, 0.0, breath * 2.0, 0.0);
    keys.rot(LeftUpperArm, (p * 0.7).sin() * 0.02, 0.0, 0.08);
    keys.rot(RightUpperArm, (p * 0.7 + 0.5).sin() * 0.02, 0.0, -0.08);
    keys.rot(LeftLowerArm, -0.12, 0.0, 0.0);
    keys.rot(RightLowerArm, -0.12, 0.0, 0.0);
    keys.rot(Head, (p * 0.6).sin() * 0.04, (p * 0.4).sin() * 0.12, 0.0);
}

fn work(keys: &mut KeyframeWriter<'_>, p: f32) {
    use JointId::*;

    keys.rot(LeftUpperArm, -1.1 + (p * 2.0).sin() * 0.15, 0.0, 0.15);
    keys.rot(RightUpperArm, -0.9 + (p * 2.0 + 0.5).sin() * 0.18, 0.0, -0.15);
    keys.rot(LeftLowerArm, -0.6 + (p * 3.0).sin() * 0.1, 0.0, 0.0);
    keys.rot(RightLowerArm, -0.5 + (p * 2.5).cos() * 0.12, 0.0, 0.0);
    keys.rot(Spine, -0.08, 0.0, 0.0);
    keys.rot(Chest, 0.0, p.sin() * 0.06, 0.0);
    keys.rot(Head, -0.15, (p * 0.8).sin() * 0.08, 0.0);
    keys.loc(Hips, 0.0, (p * 2.0).sin() * 0.02, 0.0);
}

fn wave(keys: &mut KeyframeWriter<'_>, p: f32) {
    use JointId::*;

    keys.rot(RightUpperArm, -1.4, 0.0, -0.3);
    keys.rot(RightLowerArm, -0.3, 0.0, (p * 2.0).sin() * 0.4);
    keys.rot(LeftUpperArm, 0.0, 0.0, 0.1);
    keys.rot(LeftLowerArm, -0.1, 0.0, 0.0);
    keys.rot(Head, -0.1, 0.15, 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aabb::AABB,
        schema::BoneSchema,
        skeleton::SkeletonSettings,
    };
    use approx::assert_relative_eq;

    fn skeleton() -> Skeleton {
        let bounds = AABB::new(Vector3D::new(-1.0, 0.0, 0.0), Vector3D::new(1.0, 2.0, 0.0));
        Skeleton::build(&BoneSchema::humanoid(), &bounds, &SkeletonSettings::default()).unwrap()
    }

    #[test]
    fn test_every_clip_loops() {
        let skeleton = skeleton();
        for kind in ClipKind::ALL {
            let clip = Clip::generate(kind, &skeleton);
            assert_eq!(clip.name, kind.name());
            assert!(clip.is_seamless(), "{kind} does not loop");
            for channel in &clip.channels {
                let keys = channel.rotation_keys.len().max(channel.position_keys.len());
                assert_eq!(keys as u32, kind.frame_count() + 1);
            }
        }
    }

    #[test]
    fn test_walk_legs_alternate() {
        let clip = Clip::generate(ClipKind::Walk, &skeleton());
        assert_eq!(clip.duration(), 30);
        assert_relative_eq!(clip.duration_in_seconds(), 1.25);
        let left = clip.channel(JointId::LeftUpperLeg).unwrap();
        let right = clip.channel(JointId::RightUpperLeg).unwrap();
        // A quarter cycle in, the left leg is fully forward and the right fully back.
        assert_relative_eq!(left.rotation_at(7).unwrap().x, (7.0 / 30.0 * TAU).sin() * 0.4);
        assert_relative_eq!(
            left.rotation_at(7).unwrap().x,
            -right.rotation_at(7).unwrap().x,
            epsilon = 1e-6
        );
        let hips = clip.channel(JointId::Hips).unwrap();
        assert!(hips.rotation_keys.is_empty());
        assert!(hips.position_at(15).unwrap().y.abs() < 1e-6);
    }

    #[test]
    fn test_idle_hips_have_both_channels() {
        let clip = Clip::generate(ClipKind::Idle, &skeleton());
        let hips = clip.channel(JointId::Hips).unwrap();
        assert_eq!(hips.rotation_keys.len(), 61);
        assert_eq!(hips.position_keys.len(), 61);
        let arm = clip.channel(JointId::LeftLowerArm).unwrap();
        assert_eq!(arm.rotation_at(30), Some(Vector3D::new(-0.12, 0.0, 0.0)));
    }

    #[test]
    fn test_run_has_no_chest_channel() {
        let clip = Clip::generate(ClipKind::Run, &skeleton());
        assert!(clip.channel(JointId::Chest).is_none());
        let spine = clip.channel(JointId::Spine).unwrap();
        assert_relative_eq!(spine.rotation_at(0).unwrap().x, -0.08);
    }

    #[test]
    fn test_missing_joints_are_skipped() {
        let rows = BoneSchema::humanoid()
            .joints()
            .iter()
            .copied()
            .filter(|d| !matches!(d.id, JointId::Head | JointId::HeadTop))
            .collect();
        let bounds = AABB::new(Vector3D::new(-1.0, 0.0, 0.0), Vector3D::new(1.0, 2.0, 0.0));
        let skeleton =
            Skeleton::build(&BoneSchema::new(rows), &bounds, &SkeletonSettings::default()).unwrap();
        let clip = Clip::generate(ClipKind::Wave, &skeleton);
        assert!(clip.channel(JointId::Head).is_none());
        assert_eq!(clip.num_channels(), 4);
    }

    #[test]
    fn test_euler_order() {
        let euler = Vector3D::new(0.3, -0.2, 0.5);
        let expected = Quaternion::from_rotation_z(0.5)
            * Quaternion::from_rotation_y(-0.2)
            * Quaternion::from_rotation_x(0.3);
        let q = euler_to_quaternion(euler);
        assert!(q.abs_diff_eq(expected, 1e-6));
        let key = EulerKey {
            frame: 0,
            value: Vector3D::new(0.4, 0.0, 0.0),
        };
        assert!(key.quaternion().abs_diff_eq(Quaternion::from_rotation_x(0.4), 1e-6));
    }
}
