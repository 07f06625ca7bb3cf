//! PLY export of point clouds and meshes

use super::schema::{PlyEncoding, TEXTURE_FILE_COMMENT};
use crate::error::CodecResult;
use crate::files::{save_texture, sibling, write_guarded};
use crate::session::Warnings;
use crate::validate::{reconcile_materials, MaterialConflict, MaterialPolicy};
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use geocodec_core::{is_double_precision, Entity, Mesh, PointCloud};
use log::info;
use ply_rs::{
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::Path;

/// Property name used for a scalar field: `scalar_` prefix, spaces become `_`
pub fn scalar_property_name(field: &str) -> String {
    format!("scalar_{}", field.replace(' ', "_"))
}

/// Write `entity` to `path`.
///
/// Meshes carrying more than one material are reconciled first; `decide`
/// picks the policy when no rule settles it.
pub fn save<F>(
    entity: &Entity,
    path: &Path,
    encoding: PlyEncoding,
    decide: F,
    warnings: &mut Warnings,
) -> CodecResult<()>
where
    F: FnOnce(&MaterialConflict) -> MaterialPolicy,
{
    match entity {
        Entity::Cloud(cloud) => save_cloud(cloud, path, encoding, warnings),
        Entity::Mesh(mesh) => save_mesh(mesh, path, encoding, decide, warnings),
    }
}

pub fn save_cloud(
    cloud: &PointCloud,
    path: &Path,
    encoding: PlyEncoding,
    warnings: &mut Warnings,
) -> CodecResult<()> {
    write(cloud, None, path, encoding, warnings)
}

pub fn save_mesh<F>(
    mesh: &Mesh,
    path: &Path,
    encoding: PlyEncoding,
    decide: F,
    warnings: &mut Warnings,
) -> CodecResult<()>
where
    F: FnOnce(&MaterialConflict) -> MaterialPolicy,
{
    let mesh: Cow<'_, Mesh> = if mesh.has_materials() {
        let mut owned = mesh.clone();
        reconcile_materials(&mut owned, decide, warnings);
        Cow::Owned(owned)
    } else {
        Cow::Borrowed(mesh)
    };
    write(&mesh.vertices, Some(&*mesh), path, encoding, warnings)
}

fn write(
    cloud: &PointCloud,
    mesh: Option<&Mesh>,
    path: &Path,
    encoding: PlyEncoding,
    warnings: &mut Warnings,
) -> CodecResult<()> {
    if mesh.is_some_and(|m| m.triangle_normals.is_some() && m.normals.is_some()) {
        warnings.push("Per-triangle normals not saved: PLY stores normals per vertex");
    }

    // texture coordinates are only written together with their image
    let mut texture_name = None;
    if let Some(mesh) = mesh.filter(|m| m.has_tex_coords()) {
        if let Some(texture) = mesh
            .materials
            .as_ref()
            .and_then(|m| m.first_textured())
            .and_then(|m| m.texture.as_ref())
        {
            let texture_path = sibling(path, "_texture.png");
            if save_texture(texture, &texture_path, warnings) {
                texture_name = texture_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
            } else {
                warnings.push("Texture coordinates not saved: the texture could not be written");
            }
        }
    }

    let mut ply = build(cloud, mesh, texture_name.as_deref());
    ply.header.encoding = match encoding {
        PlyEncoding::Ascii => Encoding::Ascii,
        PlyEncoding::BinaryLittleEndian => Encoding::BinaryLittleEndian,
        PlyEncoding::BinaryBigEndian => Encoding::BinaryBigEndian,
    };

    write_guarded(path, |out| match encoding {
        PlyEncoding::Ascii => Writer::new().write_ply(out, &mut ply).map(|_| ()),
        PlyEncoding::BinaryLittleEndian => write_binary::<_, LittleEndian>(out, &ply),
        PlyEncoding::BinaryBigEndian => write_binary::<_, BigEndian>(out, &ply),
    })?;

    info!(
        "Saved {} points and {} triangles to {}",
        cloud.len(),
        mesh.map_or(0, Mesh::triangle_count),
        path.display()
    );
    Ok(())
}

fn build(cloud: &PointCloud, mesh: Option<&Mesh>, texture_name: Option<&str>) -> Ply<DefaultElement> {
    let mut ply = Ply::<DefaultElement>::new();
    if let Some(name) = texture_name {
        ply.header.comments.push(format!("{} {}", TEXTURE_FILE_COMMENT, name));
    }
    ply.header.comments.push("Author: geocodec".to_string());
    ply.header.obj_infos.push("Generated by geocodec".to_string());

    let double = cloud.is_shifted() || is_double_precision();
    let coord_type = if double { ScalarType::Double } else { ScalarType::Float };
    let coord = |v: f64| {
        if double {
            Property::Double(v)
        } else {
            Property::Float(v as f32)
        }
    };

    // Define vertex element
    let mut vertex_element = ElementDef::new("vertex".to_string());
    vertex_element.count = cloud.len();
    for name in ["x", "y", "z"] {
        add_property(&mut vertex_element, name, PropertyType::Scalar(coord_type.clone()));
    }
    if cloud.has_colors() {
        for name in ["red", "green", "blue"] {
            add_property(&mut vertex_element, name, PropertyType::Scalar(ScalarType::UChar));
        }
    }
    if cloud.has_normals() {
        for name in ["nx", "ny", "nz"] {
            add_property(&mut vertex_element, name, PropertyType::Scalar(coord_type.clone()));
        }
    }
    let field_names: Vec<String> = cloud
        .scalar_fields
        .iter()
        .map(|sf| scalar_property_name(sf.name()))
        .collect();
    for name in &field_names {
        add_property(&mut vertex_element, name, PropertyType::Scalar(ScalarType::Float));
    }
    ply.header.elements.add(vertex_element);

    // Add vertex data
    let mut vertices = Vec::with_capacity(cloud.len());
    for i in 0..cloud.len() {
        let p = cloud.global_point(i);
        let mut vertex = DefaultElement::new();
        vertex.insert("x".to_string(), coord(p.x));
        vertex.insert("y".to_string(), coord(p.y));
        vertex.insert("z".to_string(), coord(p.z));
        if let Some(colors) = &cloud.colors {
            let [r, g, b] = colors[i];
            vertex.insert("red".to_string(), Property::UChar(r));
            vertex.insert("green".to_string(), Property::UChar(g));
            vertex.insert("blue".to_string(), Property::UChar(b));
        }
        if let Some(normals) = &cloud.normals {
            let n = normals[i];
            vertex.insert("nx".to_string(), coord(n.x as f64));
            vertex.insert("ny".to_string(), coord(n.y as f64));
            vertex.insert("nz".to_string(), coord(n.z as f64));
        }
        for (name, field) in field_names.iter().zip(&cloud.scalar_fields) {
            vertex.insert(name.clone(), Property::Float(field.values[i]));
        }
        vertices.push(vertex);
    }
    ply.payload.insert("vertex".to_string(), vertices);

    let Some(mesh) = mesh.filter(|m| !m.triangles.is_empty()) else {
        return ply;
    };

    // Define face element
    let with_uvs = texture_name.is_some();
    let mut face_element = ElementDef::new("face".to_string());
    face_element.count = mesh.triangle_count();
    add_property(
        &mut face_element,
        "vertex_indices",
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    );
    if with_uvs {
        add_property(
            &mut face_element,
            "texcoord",
            PropertyType::List(ScalarType::UChar, ScalarType::Float),
        );
    }
    ply.header.elements.add(face_element);

    // Add face data
    let mut faces = Vec::with_capacity(mesh.triangle_count());
    for (i, triangle) in mesh.triangles.iter().enumerate() {
        let mut face = DefaultElement::new();
        let indices = triangle.iter().map(|&v| v as i32).collect();
        face.insert("vertex_indices".to_string(), Property::ListInt(indices));
        if with_uvs {
            let uvs = match mesh.triangle_uvs(i) {
                Some(corners) => corners.iter().flatten().copied().collect(),
                None => vec![-1.0; 6],
            };
            face.insert("texcoord".to_string(), Property::ListFloat(uvs));
        }
        faces.push(face);
    }
    ply.payload.insert("face".to_string(), faces);
    ply
}

fn add_property(element: &mut ElementDef, name: &str, data_type: PropertyType) {
    element.properties.add(PropertyDef::new(name.to_string(), data_type));
}

fn binary_encoding_name<B: ByteOrder + 'static>() -> &'static str {
    if std::any::TypeId::of::<B>() == std::any::TypeId::of::<BigEndian>() {
        "binary_big_endian"
    } else {
        "binary_little_endian"
    }
}

fn scalar_type_name(t: &ScalarType) -> &'static str {
    match t {
        ScalarType::Char => "char",
        ScalarType::UChar => "uchar",
        ScalarType::Short => "short",
        ScalarType::UShort => "ushort",
        ScalarType::Int => "int",
        ScalarType::UInt => "uint",
        ScalarType::Float => "float",
        ScalarType::Double => "double",
    }
}

/// Binary bodies are written here rather than by `ply_rs`, whose binary
/// writer emits wrong list lengths.
fn write_binary<W: Write, B: ByteOrder + 'static>(out: &mut W, ply: &Ply<DefaultElement>) -> io::Result<()> {
    writeln!(out, "ply")?;
    writeln!(out, "format {} 1.0", binary_encoding_name::<B>())?;
    for comment in &ply.header.comments {
        writeln!(out, "comment {}", comment)?;
    }
    for info in &ply.header.obj_infos {
        writeln!(out, "obj_info {}", info)?;
    }
    for element in ply.header.elements.values() {
        writeln!(out, "element {} {}", element.name, element.count)?;
        for property in element.properties.values() {
            match &property.data_type {
                PropertyType::Scalar(t) => writeln!(out, "property {} {}", scalar_type_name(t), property.name)?,
                PropertyType::List(count, item) => writeln!(
                    out,
                    "property list {} {} {}",
                    scalar_type_name(count),
                    scalar_type_name(item),
                    property.name
                )?,
            }
        }
    }
    writeln!(out, "end_header")?;

    for element in ply.header.elements.values() {
        let Some(rows) = ply.payload.get(&element.name) else {
            continue;
        };
        for row in rows {
            for property in element.properties.values() {
                let value = row.get(&property.name).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("missing property '{}'", property.name),
                    )
                })?;
                write_binary_property::<W, B>(out, value)?;
            }
        }
    }
    Ok(())
}

fn write_binary_property<W: Write, B: ByteOrder>(out: &mut W, value: &Property) -> io::Result<()> {
    match value {
        Property::UChar(v) => out.write_u8(*v),
        Property::Int(v) => out.write_i32::<B>(*v),
        Property::Float(v) => out.write_f32::<B>(*v),
        Property::Double(v) => out.write_f64::<B>(*v),
        Property::ListInt(values) => {
            out.write_u8(list_len(values.len())?)?;
            values.iter().try_for_each(|v| out.write_i32::<B>(*v))
        }
        Property::ListFloat(values) => {
            out.write_u8(list_len(values.len())?)?;
            values.iter().try_for_each(|v| out.write_f32::<B>(*v))
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported binary property {:?}", other),
        )),
    }
}

fn list_len(len: usize) -> io::Result<u8> {
    u8::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "list longer than 255"))
}
