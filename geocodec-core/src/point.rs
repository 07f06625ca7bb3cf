//! Coordinate precision and point types

use nalgebra::{Point3, Vector3};

/// Storage type for point coordinates and normals.
///
/// Single precision unless the crate is built with the `double-precision` feature.
#[cfg(not(feature = "double-precision"))]
pub type Coord = f32;

/// Storage type for point coordinates and normals.
#[cfg(feature = "double-precision")]
pub type Coord = f64;

/// A 3D point in storage precision
pub type Point3c = Point3<Coord>;

/// A 3D vector in storage precision
pub type Vector3c = Vector3<Coord>;

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Texture coordinates (UV mapping)
pub type TexCoord = [f32; 2];

/// RGB color with 8 bits per channel
pub type Rgb = [u8; 3];

/// Whether coordinates are stored with 64 bit floats
pub const fn is_double_precision() -> bool {
    std::mem::size_of::<Coord>() > 4
}

/// Narrow a double precision point to storage precision
pub fn to_storage(p: &Point3d) -> Point3c {
    Point3c::new(p.x as Coord, p.y as Coord, p.z as Coord)
}

/// Widen a stored point to double precision
pub fn to_double(p: &Point3c) -> Point3d {
    Point3d::new(p.x as f64, p.y as f64, p.z as f64)
}
