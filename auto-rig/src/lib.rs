//! # Auto Rig
//!
//! Skeleton construction and vertex-to-bone skin weighting for humanoid meshes.
//!
//! Given a static mesh in its rest pose, this crate fits a 23-joint humanoid
//! skeleton to the mesh bounding box, assigns per-vertex skin weights,
//! verifies that every vertex is covered and generates a small library of
//! looping procedural clips.
//!
//! ## Features
//!
//! - **Typed joint registry**: joints are named by [`JointId`] and linked by index
//! - **Three weighting strategies**: envelope, distance and zone weighting with
//!   an explicit fallback chain
//! - **Deterministic**: identical input produces bit-identical weights, with or
//!   without the `parallel` feature
//! - **Serde everywhere**: settings in RON, rig documents in RON or JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use auto_rig::{AutoRigger, MeshSource, ObjSource, exporter::export_rig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = ObjSource::from_path("character.obj").load_mesh()?;
//! let output = AutoRigger::new().rig(&mesh)?;
//!
//! println!("Weighted {} vertices with {:?}", output.weights.len(), output.strategy);
//! export_rig(&output, mesh.name(), "character.rig.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Coordinates
//!
//! Y is vertical, X is lateral with negative X on the character's left, and Z
//! is depth. Joint heads sit on the depth mid-plane or at Z = 0, depending on
//! [`SkeletonSettings::depth`].

#![forbid(unsafe_code)]

// Re-export common types for convenience
pub use crate::{
    error::{Error, Result},
    types::*,
};

// Re-export the pipeline surface
pub use crate::aabb::AABB;
pub use crate::animation::{Clip, ClipKind, EulerKey, JointChannel, QuaternionKey, VectorKey};
pub use crate::config::{Config, DistanceBlend, DistanceSettings, RigSettings, StrategyKind};
pub use crate::exporter::{ExportBuilder, ExportFormat, PackedInfluence, PackedSkin, RigDocument};
pub use crate::io::ObjSource;
pub use crate::mesh::{Mesh, MeshSource};
pub use crate::pipeline::{AutoRigger, RigOutput, SolveState, StrategyAttempt};
pub use crate::region::{NormalizedCoords, Region, ZoneBone, ZoneProfile, ZoneThresholds};
pub use crate::schema::{BoneSchema, DepthPlacement, JointDef, JointId, JointKind, Side};
pub use crate::skeleton::{Joint, Skeleton, SkeletonSettings};
pub use crate::solver::{
    DegeneracyReason, DegeneracyReport, EnvelopeWeigher, SegmentEnvelope, StrategyFailure,
    StrategyOutcome, WeightSolver,
};
pub use crate::verify::{VerificationIssues, VerificationReport};
pub use crate::weights::{Influence, VertexWeights, WeightTable};

// Core modules
pub mod error;
pub mod types;

// Geometry and input
pub mod aabb;
pub mod io;
pub mod mesh;

// Skeleton
pub mod schema;
pub mod skeleton;

// Weighting
pub mod region;
pub mod solver;
pub mod verify;
pub mod weights;

// Pipeline and output
pub mod animation;
pub mod config;
pub mod exporter;
pub mod pipeline;

/// Version information
pub mod version {
    /// Version of this crate
    pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
}
