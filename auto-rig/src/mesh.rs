//! Mesh representation handed to the rigging pipeline
//!
//! The pipeline only reads vertex positions in the rest pose. Triangles are
//! carried through so a mesh source can hand the same value to an exporter.

use crate::{
    aabb::AABB,
    error::Result,
    types::{Matrix4x4, Vector3D},
};

/// A triangle mesh in its rest/bind pose
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vector3D>,
    triangles: Vec<[u32; 3]>,
    world_transform: Matrix4x4,
}

impl Mesh {
    /// Create a mesh from object-space vertex positions with an identity world transform
    pub fn new<S: Into<String>>(name: S, vertices: Vec<Vector3D>) -> Self {
        Self {
            name: name.into(),
            vertices,
            triangles: Vec::new(),
            world_transform: Matrix4x4::IDENTITY,
        }
    }

    /// Attach triangle indices
    pub fn with_triangles(mut self, triangles: Vec<[u32; 3]>) -> Self {
        self.triangles = triangles;
        self
    }

    /// Set the object-to-world transform
    pub fn with_world_transform(mut self, transform: Matrix4x4) -> Self {
        self.world_transform = transform;
        self
    }

    /// Get the name of the mesh
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of vertices in the mesh
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Check whether the mesh has any vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Object-space vertex positions
    pub fn vertices(&self) -> &[Vector3D] {
        &self.vertices
    }

    /// Triangle vertex indices
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Object-to-world transform
    pub fn world_transform(&self) -> Matrix4x4 {
        self.world_transform
    }

    /// Vertex positions with the world transform applied
    pub fn world_positions(&self) -> Vec<Vector3D> {
        if self.world_transform == Matrix4x4::IDENTITY {
            return self.vertices.clone();
        }
        self.vertices
            .iter()
            .map(|&v| self.world_transform.transform_point3(v))
            .collect()
    }

    /// World-space bounding box of the vertices
    pub fn world_aabb(&self) -> AABB {
        AABB::from_points(self.world_positions())
    }
}

/// Anything that can produce a rest-pose mesh for rigging
///
/// This is the seam to the external mesh I/O collaborator; [`crate::io::ObjSource`]
/// is the reference implementation.
pub trait MeshSource {
    /// Load the mesh
    fn load_mesh(&mut self) -> Result<Mesh>;
}

impl MeshSource for Mesh {
    fn load_mesh(&mut self) -> Result<Mesh> {
        Ok(self.clone())
    }
}
