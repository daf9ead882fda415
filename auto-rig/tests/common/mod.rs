//! Shared fixtures for integration tests

#![allow(dead_code)]

use auto_rig::{Mesh, Vector3D};

/// Bounds of the reference character: X in [-0.6, 0.6], Y in [-1.78, 1.47], Z in [-0.2, 0.2]
pub const MIN: [f32; 3] = [-0.6, -1.78, -0.2];
pub const MAX: [f32; 3] = [0.6, 1.47, 0.2];

/// Evenly spaced points filling a box, endpoints included exactly
pub fn box_grid(min: [f32; 3], max: [f32; 3], steps: usize) -> Vec<Vector3D> {
    let axis = |a: f32, b: f32, i: usize| {
        if i + 1 == steps {
            b
        } else {
            a + (b - a) * i as f32 / (steps - 1) as f32
        }
    };
    let mut points = Vec::with_capacity(steps * steps * steps);
    for i in 0..steps {
        for j in 0..steps {
            for k in 0..steps {
                points.push(Vector3D::new(
                    axis(min[0], max[0], i),
                    axis(min[1], max[1], j),
                    axis(min[2], max[2], k),
                ));
            }
        }
    }
    points
}

/// A blocky humanoid point cloud filling the reference bounds
pub fn humanoid_points() -> Vec<Vector3D> {
    let mut points = Vec::new();
    // legs
    points.extend(box_grid([-0.35, -1.78, -0.1], [-0.05, -0.9, 0.1], 5));
    points.extend(box_grid([0.05, -1.78, -0.1], [0.35, -0.9, 0.1], 5));
    // torso
    points.extend(box_grid([-0.3, -0.9, -0.2], [0.3, 0.75, 0.2], 6));
    // arms
    points.extend(box_grid([-0.6, -0.7, -0.1], [-0.4, 0.6, 0.1], 5));
    points.extend(box_grid([0.4, -0.7, -0.1], [0.6, 0.6, 0.1], 5));
    // head
    points.extend(box_grid([-0.15, 0.8, -0.1], [0.15, 1.47, 0.1], 5));
    points
}

/// The reference character as a mesh
pub fn humanoid_mesh() -> Mesh {
    Mesh::new("humanoid", humanoid_points())
}

/// The reference character as OBJ text, two triangles per grid row
pub fn humanoid_obj() -> String {
    let points = humanoid_points();
    let mut text = String::from("# reference character\no humanoid\n");
    for p in &points {
        text.push_str(&format!("v {} {} {}\n", p.x, p.y, p.z));
    }
    for i in (1..points.len() - 2).step_by(3) {
        text.push_str(&format!("f {} {} {} {}\n", i, i + 1, i + 2, i + 3));
    }
    text
}
