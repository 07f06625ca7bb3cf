//! OBJ format support

pub mod decode;
pub mod encode;
pub mod mtl;

use crate::error::{CodecError, CodecResult};
use crate::session::{DecodeSession, Warnings};
use crate::validate::{
    assign_normal_ownership, check_index_table, check_triangles, drop_unresolved_tex_coords,
    into_entity, prune_groups, IndexConvention,
};
use crate::{FileFormat, MeshReader, MeshWriter, PointCloudReader, PointCloudWriter};
use decode::RawObj;
use geocodec_core::{Entity, Mesh, PointCloud};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load an OBJ file into a mesh, or a cloud when it has no face
pub(crate) fn load(path: &Path, session: &mut DecodeSession<'_>) -> CodecResult<Entity> {
    let file = File::open(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let raw = decode::decode(BufReader::new(file), dir, session)?;

    info!(
        "Read {} vertices, {} texture coordinates, {} normals and {} triangles from {}",
        raw.points.len(),
        raw.tex_coords.len(),
        raw.normals.len(),
        raw.triangles.len(),
        path.display()
    );
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    assemble(raw, name, session)
}

fn assemble(raw: RawObj, name: String, session: &mut DecodeSession<'_>) -> CodecResult<Entity> {
    if raw.points.is_empty() {
        return Err(CodecError::Format("OBJ file has no vertex".to_string()));
    }
    let global_shift = session.global_shift();
    let warnings = &mut session.warnings;

    let mut cloud = PointCloud::from_points(raw.points);
    cloud.name = name;
    cloud.global_shift = global_shift;

    let mut triangles = raw.triangles;
    check_triangles(&mut triangles, cloud.len(), IndexConvention::Strict, warnings)?;
    check_index_table(
        raw.triangle_tex_coords.as_deref(),
        raw.tex_coords.len(),
        "texture coordinate",
    )?;
    check_index_table(raw.triangle_normals.as_deref(), raw.normals.len(), "normal")?;

    let mut mesh = Mesh::from_vertices_and_triangles(cloud, triangles);
    if !raw.materials.is_empty() {
        mesh.materials = Some(raw.materials);
        mesh.triangle_materials = raw.triangle_materials;
    }
    if raw.triangle_tex_coords.is_some() {
        mesh.tex_coords = Some(raw.tex_coords);
        mesh.triangle_tex_coords = raw.triangle_tex_coords;
    }
    mesh.triangle_normals = raw.triangle_normals;
    assign_normal_ownership(&mut mesh, raw.normals, warnings);
    drop_unresolved_tex_coords(&mut mesh, warnings);

    mesh.groups = raw.groups;
    prune_groups(&mut mesh.groups, warnings);

    into_entity(mesh)
}

/// Non-interactive OBJ reader
pub struct ObjReader;

impl PointCloudReader for ObjReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> CodecResult<PointCloud> {
        Ok(crate::read_as(path.as_ref(), FileFormat::Obj)?.into_cloud())
    }
}

impl MeshReader for ObjReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> CodecResult<Mesh> {
        Ok(match crate::read_as(path.as_ref(), FileFormat::Obj)? {
            Entity::Mesh(mesh) => mesh,
            Entity::Cloud(cloud) => Mesh::new(cloud),
        })
    }
}

pub struct ObjWriter;

impl PointCloudWriter for ObjWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> CodecResult<()> {
        encode::save_cloud(cloud, path.as_ref(), &mut Warnings::new())
    }
}

impl MeshWriter for ObjWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P) -> CodecResult<()> {
        encode::save_mesh(mesh, path.as_ref(), &mut Warnings::new())
    }
}
