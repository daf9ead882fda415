//! Wavefront OBJ mesh input
//!
//! Only geometry is read: `v` positions and `f` faces. Faces with more than
//! three corners are fanned into triangles, `v/vt/vn` corner forms keep the
//! position index, and negative indices count back from the latest vertex.
//! Every other record is ignored.

use std::{
    fs::File,
    io::{BufRead, BufReader, Cursor},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    error::{Error, Result},
    mesh::{Mesh, MeshSource},
    types::Vector3D,
};

enum Input {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// Reads a rest-pose mesh from OBJ text
pub struct ObjSource {
    input: Input,
    name: Option<String>,
}

impl ObjSource {
    /// Read from a file on disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            input: Input::Path(path.as_ref().to_path_buf()),
            name: None,
        }
    }

    /// Read from an in-memory buffer
    pub fn from_bytes<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            input: Input::Memory(bytes.into()),
            name: None,
        }
    }

    /// Override the mesh name; otherwise the first `o` record or the file stem is used
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse OBJ text from any buffered reader
    pub fn parse<R: BufRead>(reader: R, default_name: &str) -> Result<Mesh> {
        let mut name: Option<String> = None;
        let mut vertices: Vec<Vector3D> = Vec::new();
        let mut triangles: Vec<[u32; 3]> = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let mut coords = [0.0f32; 3];
                    for coord in &mut coords {
                        let token = tokens.next().ok_or_else(|| {
                            Error::mesh_parse(line_number, "vertex needs three coordinates")
                        })?;
                        *coord = token
                            .parse::<f32>()
                            .ok()
                            .filter(|value| value.is_finite())
                            .ok_or_else(|| {
                                Error::mesh_parse(
                                    line_number,
                                    format!("invalid coordinate `{token}`"),
                                )
                            })?;
                    }
                    vertices.push(Vector3D::from_array(coords));
                }
                Some("f") => {
                    let corners = tokens
                        .map(|token| resolve_index(token, vertices.len(), line_number))
                        .collect::<Result<Vec<u32>>>()?;
                    if corners.len() < 3 {
                        return Err(Error::mesh_parse(
                            line_number,
                            format!("face needs at least three corners, got {}", corners.len()),
                        ));
                    }
                    for pair in corners[1..].windows(2) {
                        triangles.push([corners[0], pair[0], pair[1]]);
                    }
                }
                Some("o") if name.is_none() => {
                    name = tokens.next().map(str::to_string);
                }
                _ => {}
            }
        }

        if vertices.is_empty() {
            return Err(Error::no_mesh("OBJ input contains no vertices"));
        }
        debug!(
            "Parsed OBJ: {} vertices, {} triangles",
            vertices.len(),
            triangles.len()
        );

        let name = name.unwrap_or_else(|| default_name.to_string());
        Ok(Mesh::new(name, vertices).with_triangles(triangles))
    }
}

impl MeshSource for ObjSource {
    fn load_mesh(&mut self) -> Result<Mesh> {
        let mut mesh = match &self.input {
            Input::Path(path) => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("mesh")
                    .to_string();
                Self::parse(BufReader::new(File::open(path)?), &stem)?
            }
            Input::Memory(bytes) => Self::parse(Cursor::new(bytes.as_slice()), "mesh")?,
        };
        if let Some(name) = &self.name {
            mesh = Mesh::new(name.clone(), mesh.vertices().to_vec())
                .with_triangles(mesh.triangles().to_vec());
        }
        Ok(mesh)
    }
}

fn resolve_index(token: &str, vertex_count: usize, line: usize) -> Result<u32> {
    let position = token.split('/').next().unwrap_or(token);
    let index: i64 = position
        .parse()
        .map_err(|_| Error::mesh_parse(line, format!("invalid face index `{token}`")))?;
    let resolved = match index {
        0 => return Err(Error::mesh_parse(line, "face index 0 is not valid")),
        i if i > 0 => i - 1,
        i => vertex_count as i64 + i,
    };
    if resolved < 0 || resolved >= vertex_count as i64 {
        return Err(Error::mesh_parse(
            line,
            format!("face index {index} is out of range for {vertex_count} vertices"),
        ));
    }
    Ok(resolved as u32)
}
