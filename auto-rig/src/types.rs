//! Common types and type aliases used throughout the rigging pipeline
//!
//! This module re-exports glam types for all geometric work. Positions are in
//! the mesh's world space with Y as the vertical axis, X lateral (negative X is
//! the character's left) and Z as depth.
//!
//! # Usage
//!
//! ```rust
//! use auto_rig::types::*;
//!
//! let head = Vector3D::new(0.0, 1.0, 0.0);
//! let tail = head + Vector3D::Y * 0.25;
//! assert_eq!(tail.y, 1.25);
//! ```

// Re-export glam types as our primary math types
pub use glam::{EulerRot, Mat4 as Matrix4x4, Quat as Quaternion, Vec3 as Vector3D};

/// Convert a vector to the plain array layout used by serialized rig documents
#[inline]
pub fn to_array(v: Vector3D) -> [f32; 3] {
    v.to_array()
}

/// Convert a plain array back into a vector
#[inline]
pub fn from_array(a: [f32; 3]) -> Vector3D {
    Vector3D::from_array(a)
}

#[cfg(feature = "mint")]
mod mint_integration {
    use super::*;

    /// Trait for converting to mint types
    pub trait ToMint<T> {
        /// Convert this type to a mint type
        fn to_mint(self) -> T;
    }

    /// Trait for converting from mint types
    pub trait FromMint<T> {
        /// Convert from a mint type to this type
        fn from_mint(value: T) -> Self;
    }

    impl FromMint<mint::Vector3<f32>> for Vector3D {
        #[inline]
        fn from_mint(v: mint::Vector3<f32>) -> Self {
            Vector3D::new(v.x, v.y, v.z)
        }
    }

    impl ToMint<mint::Vector3<f32>> for Vector3D {
        #[inline]
        fn to_mint(self) -> mint::Vector3<f32> {
            mint::Vector3 {
                x: self.x,
                y: self.y,
                z: self.z,
            }
        }
    }

    impl FromMint<mint::Quaternion<f32>> for Quaternion {
        #[inline]
        fn from_mint(q: mint::Quaternion<f32>) -> Self {
            Quaternion::from_xyzw(q.v.x, q.v.y, q.v.z, q.s)
        }
    }

    impl ToMint<mint::Quaternion<f32>> for Quaternion {
        #[inline]
        fn to_mint(self) -> mint::Quaternion<f32> {
            mint::Quaternion {
                v: mint::Vector3 {
                    x: self.x,
                    y: self.y,
                    z: self.z,
                },
                s: self.w,
            }
        }
    }
}

#[cfg(feature = "mint")]
pub use mint_integration::{FromMint, ToMint};
