//! Error handling for rigging operations

use thiserror::Error;

use crate::{region::Region, schema::JointId};

/// Result type alias for rigging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a skeleton or solving weights
#[derive(Error, Debug)]
pub enum Error {
    /// The input contained no usable mesh data
    #[error("No mesh found: {message}")]
    NoMesh { message: String },

    /// The mesh bounding box is too flat to place joints in
    #[error("Degenerate bounding box: height {height} is not above {epsilon}")]
    DegenerateBounds { height: f32, epsilon: f32 },

    /// A joint names a parent that the schema does not contain
    #[error("Joint {joint} declares unknown parent {parent}")]
    UnknownParent { joint: JointId, parent: JointId },

    /// A joint is listed before the parent it depends on
    #[error("Joint {joint} is declared before its parent {parent}")]
    ParentDeclaredLate { joint: JointId, parent: JointId },

    /// The same joint appears twice in a schema
    #[error("Joint {joint} is declared more than once")]
    DuplicateJoint { joint: JointId },

    /// A schema must have exactly one parentless joint
    #[error("Schema must have exactly one root joint, found {count}")]
    InvalidRoot { count: usize },

    /// A zone profile refers to a joint missing from the skeleton
    #[error("Zone profile for {region} references joint {joint} which is not in the skeleton")]
    UnknownZoneJoint { region: Region, joint: JointId },

    /// Every weighting strategy came back degenerate
    #[error("Weighting failed: {message}")]
    WeightingFailed { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Malformed mesh input
    #[error("Mesh parse error on line {line}: {message}")]
    MeshParse { line: usize, message: String },

    /// Unsupported output format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Settings file could not be parsed
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] ron::error::SpannedError),

    /// Serialization of settings or rig documents failed
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new missing-mesh error
    pub fn no_mesh<S: Into<String>>(message: S) -> Self {
        Self::NoMesh {
            message: message.into(),
        }
    }

    /// Create a new weighting failure
    pub fn weighting_failed<S: Into<String>>(message: S) -> Self {
        Self::WeightingFailed {
            message: message.into(),
        }
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new mesh parse error
    pub fn mesh_parse<S: Into<String>>(line: usize, message: S) -> Self {
        Self::MeshParse {
            line,
            message: message.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<E: std::fmt::Display>(err: E) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }

    /// Whether this error is a configuration error raised before any weights are solved
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoMesh { .. }
                | Self::DegenerateBounds { .. }
                | Self::UnknownParent { .. }
                | Self::ParentDeclaredLate { .. }
                | Self::DuplicateJoint { .. }
                | Self::InvalidRoot { .. }
                | Self::UnknownZoneJoint { .. }
                | Self::InvalidParameter { .. }
                | Self::SettingsParse(_)
        )
    }
}
