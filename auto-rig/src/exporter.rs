//! Rig export
//!
//! A [`RigDocument`] is the serializable form of a [`RigOutput`]: joints with
//! their rest segments, per-vertex influences by joint name and the clip
//! library with rotations already converted to quaternions. It is written as
//! RON or JSON through an [`ExportBuilder`].
//!
//! [`PackedSkin`] packs the same weights into fixed four-influence records in
//! the `JOINTS_0` / `WEIGHTS_0` layout glTF skins use.

use std::{fs, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    animation::Clip,
    config::StrategyKind,
    error::{Error, Result},
    pipeline::RigOutput,
    schema::JointId,
    skeleton::Skeleton,
    solver::MAX_INFLUENCES,
    types::to_array,
    weights::{VertexWeights, WeightTable},
};

/// Output text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Ron,
    Json,
}

impl ExportFormat {
    /// All supported formats
    pub const ALL: [ExportFormat; 2] = [ExportFormat::Ron, ExportFormat::Json];

    /// File extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Ron => "ron",
            ExportFormat::Json => "json",
        }
    }

    /// Look up a format by its extension, ignoring case
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }

    /// Pick the format from a file path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| Error::unsupported_format(path.display().to_string()))
    }
}

/// A joint's rest pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRecord {
    pub name: JointId,
    pub head: [f32; 3],
    pub tail: [f32; 3],
    pub parent: Option<JointId>,
    pub connected: bool,
    pub envelope_radius: f32,
}

/// Keys for one joint, rotations as `[x, y, z, w]` quaternions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub joint: JointId,
    pub rotations: Vec<(u32, [f32; 4])>,
    pub translations: Vec<(u32, [f32; 3])>,
}

/// A looping clip ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    pub name: String,
    pub frame_count: u32,
    pub frames_per_second: f32,
    pub channels: Vec<ChannelRecord>,
}

impl From<&Clip> for ClipRecord {
    fn from(clip: &Clip) -> Self {
        Self {
            name: clip.name.clone(),
            frame_count: clip.frame_count,
            frames_per_second: clip.frames_per_second,
            channels: clip
                .channels
                .iter()
                .map(|channel| ChannelRecord {
                    joint: channel.joint,
                    rotations: channel
                        .quaternion_keys()
                        .into_iter()
                        .map(|key| (key.frame, key.value.to_array()))
                        .collect(),
                    translations: channel
                        .position_keys
                        .iter()
                        .map(|key| (key.frame, to_array(key.value)))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Serializable rig: skeleton, weights and clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigDocument {
    pub name: String,
    pub strategy: StrategyKind,
    /// Vertices that needed a forced single-joint fallback
    pub degenerate_vertices: usize,
    pub joints: Vec<JointRecord>,
    pub vertices: Vec<VertexWeights>,
    pub clips: Vec<ClipRecord>,
}

impl RigDocument {
    /// Build a document from pipeline output
    pub fn from_output<S: Into<String>>(name: S, output: &RigOutput) -> Self {
        Self {
            name: name.into(),
            strategy: output.strategy,
            degenerate_vertices: output.degeneracy.total(),
            joints: joint_records(&output.skeleton),
            vertices: output.weights.as_slice().to_vec(),
            clips: output.clips.iter().map(ClipRecord::from).collect(),
        }
    }

    /// Parse a document previously written in `format`
    pub fn parse(text: &str, format: ExportFormat) -> Result<Self> {
        match format {
            ExportFormat::Ron => ron::from_str(text).map_err(Error::serialization),
            ExportFormat::Json => serde_json::from_str(text).map_err(Error::serialization),
        }
    }

    /// Read a document from disk, picking the format from the extension
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = ExportFormat::from_path(path.as_ref())?;
        let text = fs::read_to_string(path)?;
        Self::parse(&text, format)
    }

    /// Find a joint record by name
    pub fn joint(&self, name: JointId) -> Option<&JointRecord> {
        self.joints.iter().find(|joint| joint.name == name)
    }
}

fn joint_records(skeleton: &Skeleton) -> Vec<JointRecord> {
    skeleton
        .iter()
        .map(|joint| JointRecord {
            name: joint.id,
            head: to_array(joint.head),
            tail: to_array(joint.tail),
            parent: joint
                .parent
                .and_then(|index| skeleton.joint(index))
                .map(|parent| parent.id),
            connected: joint.connected,
            envelope_radius: joint.envelope_radius,
        })
        .collect()
}

/// Builder for writing rig documents
#[derive(Debug, Clone, Copy)]
pub struct ExportBuilder {
    format: ExportFormat,
    pretty: bool,
}

impl ExportBuilder {
    /// Create a builder for `format`
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    /// Toggle pretty-printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Serialize a document to text
    pub fn export_to_string(&self, document: &RigDocument) -> Result<String> {
        match (self.format, self.pretty) {
            (ExportFormat::Ron, true) => {
                ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::default())
                    .map_err(Error::serialization)
            }
            (ExportFormat::Ron, false) => ron::to_string(document).map_err(Error::serialization),
            (ExportFormat::Json, true) => {
                serde_json::to_string_pretty(document).map_err(Error::serialization)
            }
            (ExportFormat::Json, false) => {
                serde_json::to_string(document).map_err(Error::serialization)
            }
        }
    }

    /// Serialize a document and write it to `path`
    pub fn export_to_file<P: AsRef<Path>>(&self, document: &RigDocument, path: P) -> Result<()> {
        let text = self.export_to_string(document)?;
        fs::write(path.as_ref(), text)?;
        info!(
            "Wrote {} joints, {} vertices and {} clips to {}",
            document.joints.len(),
            document.vertices.len(),
            document.clips.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// Write pipeline output to `path`, picking the format from the extension
pub fn export_rig<P: AsRef<Path>>(output: &RigOutput, name: &str, path: P) -> Result<()> {
    let format = ExportFormat::from_path(path.as_ref())?;
    let document = RigDocument::from_output(name, output);
    ExportBuilder::new(format).export_to_file(&document, path)
}

/// Four joint indices and weights for one vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct PackedInfluence {
    /// Indices into the skeleton's joint order
    pub joints: [u16; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

/// Skin weights packed as four influences per vertex
///
/// Vertices with more than four influences keep their strongest four,
/// renormalized. Unused slots are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedSkin {
    influences: Vec<PackedInfluence>,
}

impl PackedSkin {
    /// Pack `weights` against the joint order of `skeleton`
    pub fn new(weights: &WeightTable, skeleton: &Skeleton) -> Result<Self> {
        if skeleton.len() > u16::MAX as usize + 1 {
            return Err(Error::invalid_parameter(format!(
                "{} joints do not fit 16-bit joint indices",
                skeleton.len()
            )));
        }
        let influences = weights
            .iter()
            .map(|vertex| -> Result<PackedInfluence> {
                let mut vertex = vertex.clone();
                vertex.truncate_strongest(MAX_INFLUENCES);
                vertex.normalize();

                let mut packed = PackedInfluence::default();
                for (slot, influence) in vertex.iter().enumerate() {
                    let index = skeleton.index_of(influence.joint).ok_or_else(|| {
                        Error::invalid_parameter(format!(
                            "joint {} is not in the skeleton",
                            influence.joint
                        ))
                    })?;
                    packed.joints[slot] = index as u16;
                    packed.weights[slot] = influence.weight;
                }
                Ok(packed)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { influences })
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.influences.len()
    }

    /// Whether no vertex was packed
    pub fn is_empty(&self) -> bool {
        self.influences.is_empty()
    }

    /// Packed records in vertex order
    pub fn influences(&self) -> &[PackedInfluence] {
        &self.influences
    }

    /// The `JOINTS_0` attribute
    pub fn joints_attribute(&self) -> Vec<[u16; MAX_INFLUENCES]> {
        self.influences.iter().map(|i| i.joints).collect()
    }

    /// The `WEIGHTS_0` attribute
    pub fn weights_attribute(&self) -> Vec<[f32; MAX_INFLUENCES]> {
        self.influences.iter().map(|i| i.weights).collect()
    }

    /// Raw bytes of the interleaved records
    #[cfg(feature = "bytemuck")]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.influences)
    }
}
