//! Post-decode checks that turn raw containers into a consistent entity

use crate::error::{CodecError, CodecResult};
use crate::session::Warnings;
use geocodec_core::{Entity, Mesh, PointCloud, TriangleGroup, Vector3c};

/// How vertex indices read from a file are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexConvention {
    /// Indices are already 0-based; anything out of range is an error
    Strict,
    /// Indices spanning exactly `1..=count` are shifted down by one
    RepairOneBased,
}

/// Drop per-point channels whose length disagrees with the point count
pub fn check_channels(cloud: &mut PointCloud, warnings: &mut Warnings) {
    let count = cloud.len();

    if cloud.normals.as_ref().is_some_and(|n| n.len() != count) {
        warnings.push(format!(
            "Normals count differs from point count ({}), normals ignored",
            count
        ));
        cloud.normals = None;
    }
    if cloud.colors.as_ref().is_some_and(|c| c.len() != count) {
        warnings.push(format!(
            "Colors count differs from point count ({}), colors ignored",
            count
        ));
        cloud.colors = None;
    }

    let mut kept = Vec::with_capacity(cloud.scalar_fields.len());
    for mut field in std::mem::take(&mut cloud.scalar_fields) {
        if field.len() != count {
            warnings.push(format!(
                "Scalar field '{}' has {} values for {} points, ignored",
                field.name(),
                field.len(),
                count
            ));
            continue;
        }
        field.compute_min_max();
        kept.push(field);
    }
    cloud.scalar_fields = kept;
}

/// Bound-check triangle vertex indices, repairing 1-based numbering if allowed
pub fn check_triangles(
    triangles: &mut [[usize; 3]],
    vertex_count: usize,
    convention: IndexConvention,
    warnings: &mut Warnings,
) -> CodecResult<()> {
    let Some(min) = triangles.iter().flatten().copied().min() else {
        return Ok(());
    };
    let max = triangles.iter().flatten().copied().max().unwrap_or(min);

    if convention == IndexConvention::RepairOneBased && max == vertex_count && min > 0 {
        warnings.push("Vertex indices look 1-based, shifted down by one");
        triangles.iter_mut().flatten().for_each(|i| *i -= 1);
        return Ok(());
    }

    if max >= vertex_count {
        return Err(CodecError::Format(format!(
            "vertex index {} out of range ({} vertices)",
            max, vertex_count
        )));
    }
    Ok(())
}

/// Report faces that were skipped or never reached
pub fn check_face_count(committed: usize, declared: usize, rejected: usize, warnings: &mut Warnings) {
    if rejected > 0 {
        warnings.push(format!("{} non-triangular or invalid face(s) ignored", rejected));
    }
    if committed < declared {
        warnings.push(format!(
            "Mesh has been truncated: {} of {} declared faces kept",
            committed, declared
        ));
    }
}

/// Bound-check per-triangle indices into a normals or texture coordinates table
pub fn check_index_table(
    per_triangle: Option<&[Option<[usize; 3]>]>,
    table_len: usize,
    what: &str,
) -> CodecResult<()> {
    let Some(per_triangle) = per_triangle else {
        return Ok(());
    };
    match per_triangle.iter().flatten().flatten().find(|&&i| i >= table_len) {
        Some(index) => Err(CodecError::Format(format!(
            "{} index {} out of range ({} entries)",
            what,
            index + 1,
            table_len
        ))),
        None => Ok(()),
    }
}

/// Texture coordinates are only kept when some material carries an image
pub fn drop_unresolved_tex_coords(mesh: &mut Mesh, warnings: &mut Warnings) {
    if mesh.tex_coords.is_none() && mesh.triangle_tex_coords.is_none() {
        return;
    }
    let textured = mesh.materials.as_ref().is_some_and(|m| m.texture_count() > 0);
    if !textured {
        warnings.push("Texture coordinates ignored: no texture image could be loaded");
        mesh.tex_coords = None;
        mesh.triangle_tex_coords = None;
    }
}

/// Decide who owns a normals table read from an OBJ file.
///
/// Normals referenced by faces stay on the mesh. Otherwise a table with one
/// normal per vertex becomes per-point normals, and anything else is dropped.
pub fn assign_normal_ownership(mesh: &mut Mesh, normals: Vec<Vector3c>, warnings: &mut Warnings) {
    if normals.is_empty() {
        return;
    }
    if mesh.triangle_normals.is_some() {
        mesh.normals = Some(normals);
    } else if normals.len() == mesh.vertex_count() {
        mesh.vertices.normals = Some(normals);
    } else {
        warnings.push(format!(
            "{} normals not referenced by faces and not one per vertex, ignored",
            normals.len()
        ));
    }
}

/// Remove groups that ended up with no triangle
pub fn prune_groups(groups: &mut Vec<TriangleGroup>, warnings: &mut Warnings) {
    let before = groups.len();
    groups.retain(|g| g.len > 0);
    let dropped = before - groups.len();
    if dropped > 0 {
        warnings.push(format!("{} empty group(s) ignored", dropped));
    }
}

/// A mesh with triangles stays a mesh, anything else is a point cloud.
///
/// The mesh must satisfy [`Mesh::check_topology`].
pub fn into_entity(mesh: Mesh) -> CodecResult<Entity> {
    if mesh.triangles.is_empty() {
        return Ok(Entity::Cloud(mesh.vertices));
    }
    mesh.check_topology()?;
    Ok(Entity::Mesh(mesh))
}

/// What to do with materials a target format cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialPolicy {
    FlattenToVertexColors,
    DropMaterials,
}

/// Summary handed to the handler when materials must be reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialConflict {
    pub material_count: usize,
    pub texture_count: usize,
    pub has_colors: bool,
}

/// Outcome of [`reconcile_materials`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Nothing,
    Kept,
    UniformColor,
    ColorsKept,
    Flattened,
    Dropped,
}

/// Reduce a mesh's materials to what a single-texture format can carry.
///
/// `decide` is only consulted when no rule settles the conflict.
pub fn reconcile_materials<F>(mesh: &mut Mesh, decide: F, warnings: &mut Warnings) -> Reconciliation
where
    F: FnOnce(&MaterialConflict) -> MaterialPolicy,
{
    let (material_count, texture_count) = match &mesh.materials {
        Some(m) => (m.len(), m.texture_count()),
        None => (0, 0),
    };
    let has_colors = mesh.vertices.has_colors();

    if material_count == 0 {
        return Reconciliation::Nothing;
    }

    if material_count == 1 && texture_count <= 1 {
        if texture_count == 1 {
            return Reconciliation::Kept;
        }
        if has_colors {
            warnings.push("Material ignored: the vertices already have colors");
            mesh.clear_materials();
            return Reconciliation::ColorsKept;
        }
        let (name, color) = mesh
            .materials
            .as_ref()
            .and_then(|m| m.get(0))
            .map(|m| (m.name.clone(), m.diffuse_rgb()))
            .unwrap_or_else(|| (String::new(), [255; 3]));
        warnings.push(format!(
            "Material '{}' converted to a uniform vertex color",
            name
        ));
        mesh.vertices.colors = Some(vec![color; mesh.vertex_count()]);
        mesh.clear_materials();
        return Reconciliation::UniformColor;
    }

    if has_colors {
        warnings.push(format!(
            "{} material(s) ignored: the vertices already have colors",
            material_count
        ));
        mesh.clear_materials();
        return Reconciliation::ColorsKept;
    }

    let conflict = MaterialConflict {
        material_count,
        texture_count,
        has_colors,
    };
    match decide(&conflict) {
        MaterialPolicy::FlattenToVertexColors => {
            warnings.push(format!(
                "{} material(s) converted to per-vertex colors",
                material_count
            ));
            flatten_materials(mesh);
            Reconciliation::Flattened
        }
        MaterialPolicy::DropMaterials => {
            warnings.push(format!("{} material(s) dropped", material_count));
            mesh.clear_materials();
            Reconciliation::Dropped
        }
    }
}

/// Bake materials into per-vertex colors, sampling textures at each corner
pub fn flatten_materials(mesh: &mut Mesh) {
    let mut colors = vec![[255u8; 3]; mesh.vertex_count()];
    if let Some(materials) = &mesh.materials {
        for (i, triangle) in mesh.triangles.iter().enumerate() {
            let Some(material) = mesh.triangle_material(i).and_then(|m| materials.get(m)) else {
                continue;
            };
            let uvs = mesh.triangle_uvs(i);
            for (corner, &vertex) in triangle.iter().enumerate() {
                if let Some(color) = colors.get_mut(vertex) {
                    *color = material.color_at(uvs.map(|uv| uv[corner]));
                }
            }
        }
    }
    mesh.vertices.colors = Some(colors);
    mesh.clear_materials();
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocodec_core::{Material, MaterialSet, Point3c, ScalarField, Texture};
    use image::{Rgba, RgbaImage};

    fn cloud(n: usize) -> PointCloud {
        PointCloud::from_points((0..n).map(|i| Point3c::new(i as _, 0.0, 0.0)).collect())
    }

    fn quad() -> Mesh {
        Mesh::from_vertices_and_triangles(cloud(4), vec![[0, 1, 2], [0, 2, 3]])
    }

    fn textured(name: &str, rgb: [u8; 3]) -> Material {
        let image = RgbaImage::from_pixel(2, 2, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        Material::new(name).with_texture(Texture::new(format!("{}.png", name), image))
    }

    #[test]
    fn test_channel_length_checks() {
        let mut c = cloud(3);
        c.normals = Some(vec![Vector3c::z(); 2]);
        c.colors = Some(vec![[1, 2, 3]; 3]);
        c.scalar_fields.push(ScalarField::from_values("ok", vec![1.0, 5.0, 3.0]));
        c.scalar_fields.push(ScalarField::from_values("short", vec![1.0]));

        let mut warnings = Warnings::new();
        check_channels(&mut c, &mut warnings);
        assert!(c.normals.is_none());
        assert!(c.colors.is_some());
        assert_eq!(c.scalar_fields.len(), 1);
        assert_eq!(c.scalar_fields[0].max(), 5.0);
        assert!(warnings.mentions("'short'"));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_one_based_repair() {
        let mut warnings = Warnings::new();
        let mut triangles = vec![[1, 2, 3], [1, 3, 4]];
        check_triangles(&mut triangles, 4, IndexConvention::RepairOneBased, &mut warnings).unwrap();
        assert_eq!(triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert!(warnings.mentions("1-based"));

        // strict numbering never repairs
        let mut triangles = vec![[1, 2, 3], [1, 3, 4]];
        let result = check_triangles(&mut triangles, 4, IndexConvention::Strict, &mut Warnings::new());
        assert!(matches!(result, Err(CodecError::Format(_))));
    }

    #[test]
    fn test_index_beyond_repair() {
        let mut triangles = vec![[0, 1, 2], [2, 3, 5]];
        let result = check_triangles(&mut triangles, 4, IndexConvention::RepairOneBased, &mut Warnings::new());
        assert!(matches!(result, Err(CodecError::Format(_))));
    }

    #[test]
    fn test_normal_ownership() {
        let mut warnings = Warnings::new();
        let mut mesh = quad();
        assign_normal_ownership(&mut mesh, vec![Vector3c::z(); 4], &mut warnings);
        assert!(mesh.vertices.has_normals());

        let mut mesh = quad();
        assign_normal_ownership(&mut mesh, vec![Vector3c::z(); 3], &mut warnings);
        assert!(!mesh.vertices.has_normals());
        assert_eq!(warnings.len(), 1);

        let mut mesh = quad();
        mesh.triangle_normals = Some(vec![Some([0, 0, 0]), None]);
        assign_normal_ownership(&mut mesh, vec![Vector3c::z()], &mut warnings);
        assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(1));
        assert!(!mesh.vertices.has_normals());
    }

    #[test]
    fn test_reconcile_single_texture_kept() {
        let mut mesh = quad();
        let mut set = MaterialSet::new();
        set.push(textured("wood", [10, 20, 30]));
        mesh.materials = Some(set);
        let outcome = reconcile_materials(&mut mesh, |_| MaterialPolicy::DropMaterials, &mut Warnings::new());
        assert_eq!(outcome, Reconciliation::Kept);
        assert!(mesh.has_materials());
    }

    #[test]
    fn test_reconcile_plain_material_becomes_color() {
        let mut mesh = quad();
        let mut set = MaterialSet::new();
        set.push(Material::new("red").with_diffuse([1.0, 0.0, 0.0, 1.0]));
        mesh.materials = Some(set);
        let mut warnings = Warnings::new();
        let outcome = reconcile_materials(&mut mesh, |_| MaterialPolicy::DropMaterials, &mut warnings);
        assert_eq!(outcome, Reconciliation::UniformColor);
        assert_eq!(mesh.vertices.colors, Some(vec![[255, 0, 0]; 4]));
        assert_eq!(warnings.len(), 1);
        assert!(warnings.mentions("uniform vertex color"));
        assert!(!mesh.has_materials());
    }

    #[test]
    fn test_reconcile_existing_colors_win() {
        let mut mesh = quad();
        mesh.vertices.colors = Some(vec![[1, 1, 1]; 4]);
        let mut set = MaterialSet::new();
        set.push(textured("a", [0, 0, 0]));
        set.push(textured("b", [0, 0, 0]));
        mesh.materials = Some(set);
        let mut warnings = Warnings::new();
        let outcome = reconcile_materials(&mut mesh, |_| panic!("not asked"), &mut warnings);
        assert_eq!(outcome, Reconciliation::ColorsKept);
        assert_eq!(mesh.vertices.colors, Some(vec![[1, 1, 1]; 4]));
        assert!(mesh.materials.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_reconcile_flatten_samples_textures() {
        let mut mesh = quad();
        let mut set = MaterialSet::new();
        set.push(textured("a", [200, 0, 0]));
        set.push(textured("b", [0, 0, 200]));
        mesh.materials = Some(set);
        mesh.triangle_materials = Some(vec![Some(0), Some(1)]);
        mesh.tex_coords = Some(vec![[0.5, 0.5]]);
        mesh.triangle_tex_coords = Some(vec![Some([0, 0, 0]), Some([0, 0, 0])]);

        let mut asked = None;
        let outcome = reconcile_materials(
            &mut mesh,
            |conflict| {
                asked = Some(*conflict);
                MaterialPolicy::FlattenToVertexColors
            },
            &mut Warnings::new(),
        );
        assert_eq!(outcome, Reconciliation::Flattened);
        assert_eq!(asked.map(|c| c.texture_count), Some(2));
        let colors = mesh.vertices.colors.clone().unwrap();
        assert_eq!(colors[1], [200, 0, 0]);
        // vertices 0 and 2 are shared, the second triangle wins
        assert_eq!(colors[0], [0, 0, 200]);
        assert_eq!(colors[3], [0, 0, 200]);
        assert!(mesh.tex_coords.is_none());
    }

    #[test]
    fn test_reconcile_drop() {
        let mut mesh = quad();
        let mut set = MaterialSet::new();
        set.push(Material::new("a"));
        set.push(Material::new("b"));
        mesh.materials = Some(set);
        let outcome = reconcile_materials(&mut mesh, |_| MaterialPolicy::DropMaterials, &mut Warnings::new());
        assert_eq!(outcome, Reconciliation::Dropped);
        assert!(!mesh.vertices.has_colors());
        assert!(!mesh.has_materials());
    }

    #[test]
    fn test_entity_decision_and_groups() {
        let mut warnings = Warnings::new();
        let mut groups = vec![
            TriangleGroup { name: "empty".into(), start: 0, len: 0 },
            TriangleGroup { name: "body".into(), start: 0, len: 2 },
        ];
        prune_groups(&mut groups, &mut warnings);
        assert_eq!(groups.len(), 1);
        assert!(warnings.mentions("empty group"));

        assert!(matches!(into_entity(quad()), Ok(Entity::Mesh(_))));
        assert!(matches!(into_entity(Mesh::new(cloud(3))), Ok(Entity::Cloud(_))));

        let mut broken = quad();
        broken.triangle_materials = Some(vec![Some(4); broken.triangle_count()]);
        assert!(matches!(into_entity(broken), Err(CodecError::Semantic(_))));
    }
}
