//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::material::MaterialSet;
use crate::point::*;
use crate::point_cloud::PointCloud;
use serde::{Deserialize, Serialize};

/// A named, contiguous range of triangles (an OBJ `g` group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleGroup {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

impl TriangleGroup {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// A triangle mesh over an owned vertex cloud.
///
/// Per-triangle arrays, when present, hold exactly one entry per triangle.
/// A `None` entry means that triangle has no value for that channel.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: PointCloud,
    pub triangles: Vec<[usize; 3]>,
    /// Shared normals table referenced by `triangle_normals`
    pub normals: Option<Vec<Vector3c>>,
    pub triangle_normals: Option<Vec<Option<[usize; 3]>>>,
    /// Shared texture coordinates table referenced by `triangle_tex_coords`
    pub tex_coords: Option<Vec<TexCoord>>,
    pub triangle_tex_coords: Option<Vec<Option<[usize; 3]>>>,
    pub materials: Option<MaterialSet>,
    pub triangle_materials: Option<Vec<Option<usize>>>,
    pub groups: Vec<TriangleGroup>,
}

impl Mesh {
    /// Create a mesh without triangles over the given vertices
    pub fn new(vertices: PointCloud) -> Self {
        Self {
            vertices,
            ..Self::default()
        }
    }

    /// Create a mesh from vertices and triangles
    pub fn from_vertices_and_triangles(vertices: PointCloud, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            ..Self::default()
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    pub fn has_materials(&self) -> bool {
        self.materials.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn has_triangle_normals(&self) -> bool {
        self.normals.is_some() && self.triangle_normals.is_some()
    }

    pub fn has_tex_coords(&self) -> bool {
        self.tex_coords.is_some() && self.triangle_tex_coords.is_some()
    }

    /// Material index of triangle `index`, if any
    pub fn triangle_material(&self, index: usize) -> Option<usize> {
        self.triangle_materials.as_ref()?.get(index).copied().flatten()
    }

    /// Texture coordinates of the three corners of triangle `index`
    pub fn triangle_uvs(&self, index: usize) -> Option<[TexCoord; 3]> {
        let table = self.tex_coords.as_ref()?;
        let [a, b, c] = self.triangle_tex_coords.as_ref()?.get(index).copied().flatten()?;
        Some([*table.get(a)?, *table.get(b)?, *table.get(c)?])
    }

    /// Remove materials, texture coordinates and their per-triangle indices
    pub fn clear_materials(&mut self) {
        self.materials = None;
        self.triangle_materials = None;
        self.tex_coords = None;
        self.triangle_tex_coords = None;
    }

    /// Verify index bounds and per-triangle array lengths
    pub fn check_topology(&self) -> Result<()> {
        let vertex_count = self.vertex_count();
        for triangle in &self.triangles {
            if let Some(&index) = triangle.iter().find(|&&i| i >= vertex_count) {
                return Err(Error::IndexOutOfRange { index, count: vertex_count });
            }
        }

        let count = self.triangle_count();
        check_aux_len("triangle normals", self.triangle_normals.as_ref().map(Vec::len), count)?;
        check_aux_len("triangle texture coordinates", self.triangle_tex_coords.as_ref().map(Vec::len), count)?;
        check_aux_len("triangle materials", self.triangle_materials.as_ref().map(Vec::len), count)?;

        check_table_refs(self.triangle_normals.as_deref(), self.normals.as_ref().map_or(0, Vec::len))?;
        check_table_refs(self.triangle_tex_coords.as_deref(), self.tex_coords.as_ref().map_or(0, Vec::len))?;

        if let Some(per_triangle) = &self.triangle_materials {
            let material_count = self.materials.as_ref().map_or(0, MaterialSet::len);
            if let Some(index) = per_triangle.iter().flatten().find(|&&m| m >= material_count) {
                return Err(Error::IndexOutOfRange { index: *index, count: material_count });
            }
        }
        Ok(())
    }
}

fn check_aux_len(channel: &str, actual: Option<usize>, expected: usize) -> Result<()> {
    match actual {
        Some(actual) if actual != expected => Err(Error::ChannelLength {
            channel: channel.to_string(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

fn check_table_refs(per_triangle: Option<&[Option<[usize; 3]>]>, table_len: usize) -> Result<()> {
    let Some(per_triangle) = per_triangle else {
        return Ok(());
    };
    for index in per_triangle.iter().flatten().flatten() {
        if *index >= table_len {
            return Err(Error::IndexOutOfRange { index: *index, count: table_len });
        }
    }
    Ok(())
}
