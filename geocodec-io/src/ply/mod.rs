//! PLY format support
//!
//! Loading runs in four stages: [`schema::probe`] reads the header,
//! [`resolve::resolve`] maps properties to channels, [`decode::decode`]
//! streams the body into raw containers, and the validation pass assembles
//! the final entity. [`encode`] writes clouds and meshes back.

pub mod decode;
pub mod encode;
pub mod resolve;
pub mod schema;

pub use schema::PlyEncoding;

use crate::error::{CodecError, CodecResult};
use crate::files::load_texture;
use crate::session::{DecodeSession, Warnings};
use crate::validate::{
    check_channels, check_face_count, check_triangles, drop_unresolved_tex_coords, into_entity,
    IndexConvention, MaterialPolicy,
};
use crate::{FileFormat, MeshReader, MeshWriter, PointCloudReader, PointCloudWriter};
use decode::RawPly;
use geocodec_core::{Entity, Material, MaterialSet, Mesh, PointCloud, TexCoord};
use log::info;
use schema::PlyHeader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load a PLY file into a cloud or a mesh
pub(crate) fn load(path: &Path, session: &mut DecodeSession<'_>) -> CodecResult<Entity> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = schema::probe(&mut reader, &mut session.warnings)?;
    let mapping = resolve::resolve(&header, session)?;
    let raw = decode::decode(&mut reader, &header, &mapping, session)?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let entity = assemble(raw, &header, name, dir, session)?;

    let cloud = entity.cloud();
    info!(
        "Loaded {} points ({} scalar fields) and {} triangles from {}",
        cloud.len(),
        cloud.scalar_fields.len(),
        entity.as_mesh().map_or(0, Mesh::triangle_count),
        path.display()
    );
    Ok(entity)
}

fn assemble(
    raw: RawPly,
    header: &PlyHeader,
    name: String,
    dir: &Path,
    session: &mut DecodeSession<'_>,
) -> CodecResult<Entity> {
    if raw.points.is_empty() {
        return Err(CodecError::Semantic("no vertex could be read".to_string()));
    }
    let global_shift = session.global_shift();
    let warnings = &mut session.warnings;

    let mut cloud = PointCloud::from_points(raw.points);
    cloud.name = name;
    cloud.global_shift = global_shift;
    cloud.normals = raw.normals;
    cloud.colors = raw.colors;
    for mut field in raw.scalar_fields {
        let unique = cloud.unique_scalar_field_name(field.name());
        field.set_name(unique);
        cloud.scalar_fields.push(field);
    }
    check_channels(&mut cloud, warnings);

    let Some(mut triangles) = raw.triangles else {
        return Ok(Entity::Cloud(cloud));
    };
    check_face_count(triangles.len(), raw.declared_faces, raw.rejected_faces, warnings);
    if triangles.is_empty() {
        return Err(CodecError::Format(format!(
            "none of the {} declared faces is a triangle",
            raw.declared_faces
        )));
    }
    check_triangles(&mut triangles, cloud.len(), IndexConvention::RepairOneBased, warnings)?;
    let mut mesh = Mesh::from_vertices_and_triangles(cloud, triangles);

    if let Some(tex_coords) = raw.tex_coords {
        if raw.rejected_tex_coords > 0 {
            warnings.push(format!(
                "{} texture coordinate list(s) without 6 values ignored",
                raw.rejected_tex_coords
            ));
        }
        if tex_coords.len() == 3 * mesh.triangle_count() {
            attach_tex_coords(&mut mesh, tex_coords, header, dir, warnings);
        } else {
            warnings.push(format!(
                "{} texture coordinates for {} triangles, texture coordinates ignored",
                tex_coords.len(),
                mesh.triangle_count()
            ));
        }
    }
    drop_unresolved_tex_coords(&mut mesh, warnings);

    into_entity(mesh)
}

/// Corners `3i..3i+3` belong to triangle `i`; the image comes from `TEXTUREFILE`
fn attach_tex_coords(
    mesh: &mut Mesh,
    tex_coords: Vec<TexCoord>,
    header: &PlyHeader,
    dir: &Path,
    warnings: &mut Warnings,
) {
    let count = mesh.triangle_count();
    mesh.triangle_tex_coords = Some((0..count).map(|i| Some([3 * i, 3 * i + 1, 3 * i + 2])).collect());
    mesh.tex_coords = Some(tex_coords);

    let Some(file) = header.texture_file() else {
        return;
    };
    if let Some(texture) = load_texture(&dir.join(file), warnings) {
        let mut materials = MaterialSet::new();
        materials.push(Material::new(mesh.vertices.name.clone()).with_texture(texture));
        mesh.materials = Some(materials);
        mesh.triangle_materials = Some(vec![Some(0); count]);
    }
}

/// Non-interactive PLY reader
pub struct PlyReader;

impl PointCloudReader for PlyReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> CodecResult<PointCloud> {
        Ok(crate::read_as(path.as_ref(), FileFormat::Ply)?.into_cloud())
    }
}

impl MeshReader for PlyReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> CodecResult<Mesh> {
        Ok(match crate::read_as(path.as_ref(), FileFormat::Ply)? {
            Entity::Mesh(mesh) => mesh,
            Entity::Cloud(cloud) => Mesh::new(cloud),
        })
    }
}

/// PLY writer producing ascii files with flattened materials
pub struct PlyWriter;

impl PointCloudWriter for PlyWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> CodecResult<()> {
        encode::save_cloud(cloud, path.as_ref(), PlyEncoding::Ascii, &mut Warnings::new())
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P) -> CodecResult<()> {
        encode::save_mesh(
            mesh,
            path.as_ref(),
            PlyEncoding::Ascii,
            |_| MaterialPolicy::FlattenToVertexColors,
            &mut Warnings::new(),
        )
    }
}
