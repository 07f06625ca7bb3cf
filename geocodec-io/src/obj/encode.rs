//! OBJ export, with an MTL companion for materials

use super::mtl::write_library;
use crate::error::CodecResult;
use crate::files::write_guarded;
use crate::session::Warnings;
use geocodec_core::{Entity, Mesh, PointCloud};
use log::info;
use std::io::{self, Write};
use std::path::Path;

/// Write `entity` to `path`
pub fn save(entity: &Entity, path: &Path, warnings: &mut Warnings) -> CodecResult<()> {
    match entity {
        Entity::Cloud(cloud) => save_cloud(cloud, path, warnings),
        Entity::Mesh(mesh) => save_mesh(mesh, path, warnings),
    }
}

/// A bare cloud becomes `v` and `vn` lines
pub fn save_cloud(cloud: &PointCloud, path: &Path, warnings: &mut Warnings) -> CodecResult<()> {
    report_dropped_channels(cloud, warnings);
    write_guarded(path, |out| {
        writeln!(out, "# geocodec OBJ export")?;
        write_vertices(out, cloud)?;
        if let Some(normals) = &cloud.normals {
            for n in normals {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
        }
        Ok(())
    })?;
    info!("Saved {} points to {}", cloud.len(), path.display());
    Ok(())
}

pub fn save_mesh(mesh: &Mesh, path: &Path, warnings: &mut Warnings) -> CodecResult<()> {
    report_dropped_channels(&mesh.vertices, warnings);

    let mut mtl_name = None;
    if let Some(materials) = mesh.materials.as_ref().filter(|m| !m.is_empty()) {
        let mtl_path = path.with_extension("mtl");
        write_guarded(&mtl_path, |out| write_library(out, materials, &mtl_path, warnings))?;
        mtl_name = mtl_path.file_name().map(|n| n.to_string_lossy().into_owned());
    }

    write_guarded(path, |out| write_mesh(out, mesh, mtl_name.as_deref()))?;
    info!(
        "Saved {} vertices and {} triangles to {}",
        mesh.vertex_count(),
        mesh.triangle_count(),
        path.display()
    );
    Ok(())
}

fn report_dropped_channels(cloud: &PointCloud, warnings: &mut Warnings) {
    if !cloud.scalar_fields.is_empty() {
        warnings.push(format!(
            "OBJ cannot store scalar fields, {} field(s) not saved",
            cloud.scalar_fields.len()
        ));
    }
    if cloud.has_colors() {
        warnings.push("OBJ cannot store per-vertex colors, colors not saved");
    }
}

fn write_vertices<W: Write>(out: &mut W, cloud: &PointCloud) -> io::Result<()> {
    for i in 0..cloud.len() {
        let p = cloud.global_point(i);
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Which normals table the faces reference
#[derive(Clone, Copy)]
enum NormalSource<'a> {
    None,
    PerTriangle(&'a [Option<[usize; 3]>]),
    PerVertex,
}

fn write_mesh<W: Write>(out: &mut W, mesh: &Mesh, mtl_name: Option<&str>) -> io::Result<()> {
    writeln!(out, "# geocodec OBJ export")?;
    if let Some(name) = mtl_name {
        writeln!(out, "mtllib {}", name)?;
    }
    write_vertices(out, &mesh.vertices)?;

    let tex = mesh.tex_coords.as_ref().zip(mesh.triangle_tex_coords.as_deref());
    if let Some((tex_coords, _)) = tex {
        for [u, v] in tex_coords {
            writeln!(out, "vt {} {}", u, v)?;
        }
    }

    let normals = match (&mesh.normals, mesh.triangle_normals.as_deref(), &mesh.vertices.normals) {
        (Some(table), Some(per_triangle), _) => {
            for n in table {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
            NormalSource::PerTriangle(per_triangle)
        }
        (_, _, Some(per_vertex)) => {
            for n in per_vertex {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
            NormalSource::PerVertex
        }
        _ => NormalSource::None,
    };

    let mut current_material = None;
    let mut in_group = false;
    for (i, triangle) in mesh.triangles.iter().enumerate() {
        if let Some(group) = mesh.groups.iter().find(|g| g.start == i && g.len > 0) {
            writeln!(out, "g {}", group.name)?;
            in_group = true;
        } else if in_group && !mesh.groups.iter().any(|g| g.range().contains(&i)) {
            writeln!(out, "g default")?;
            in_group = false;
        }

        let material = mesh.triangle_material(i);
        if material != current_material {
            match material.and_then(|m| mesh.materials.as_ref()?.get(m)) {
                Some(m) => writeln!(out, "usemtl {}", m.name)?,
                // a bare `usemtl` ends the previous material
                None => writeln!(out, "usemtl")?,
            }
            current_material = material;
        }

        let uv = tex.and_then(|(_, per_triangle)| per_triangle.get(i).copied().flatten());
        let normal = match normals {
            NormalSource::None => None,
            NormalSource::PerTriangle(per_triangle) => per_triangle.get(i).copied().flatten(),
            NormalSource::PerVertex => Some(*triangle),
        };

        write!(out, "f")?;
        for corner in 0..3 {
            let v = triangle[corner] + 1;
            match (uv, normal) {
                (None, None) => write!(out, " {}", v)?,
                (Some(t), None) => write!(out, " {}/{}", v, t[corner] + 1)?,
                (None, Some(n)) => write!(out, " {}//{}", v, n[corner] + 1)?,
                (Some(t), Some(n)) => write!(out, " {}/{}/{}", v, t[corner] + 1, n[corner] + 1)?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
