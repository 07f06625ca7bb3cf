//! Core data structures for geocodec
//!
//! This crate provides the in-memory model shared by the geometry codecs:
//! point clouds with optional normals, colors and scalar fields, triangle
//! meshes with materials and texture coordinates, and the global shift
//! metadata that keeps large coordinates reversible.

pub mod point;
pub mod point_cloud;
pub mod scalar_field;
pub mod mesh;
pub mod material;
pub mod shift;
pub mod entity;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use scalar_field::*;
pub use mesh::*;
pub use material::*;
pub use shift::*;
pub use entity::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
