//! MTL companion files

use crate::files::{load_texture, save_texture, sibling};
use crate::session::Warnings;
use geocodec_core::{Material, MaterialSet};
use obj::raw::material::{parse_mtl, Material as MtlMaterial, MtlColor};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

/// Materials of one or more `mtllib` files, keyed by name
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    materials: BTreeMap<String, Material>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Merge the materials of an MTL file; names already known are kept.
    ///
    /// An unreadable file only produces a warning. Texture maps are resolved
    /// relative to the MTL file.
    pub fn load(&mut self, path: &Path, warnings: &mut Warnings) {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warnings.push(format!("Failed to open material file '{}': {}", path.display(), e));
                return;
            }
        };
        let raw = match parse_mtl(BufReader::new(file)) {
            Ok(raw) => raw,
            Err(e) => {
                warnings.push(format!("Failed to parse material file '{}': {}", path.display(), e));
                return;
            }
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut names: Vec<&String> = raw.materials.keys().collect();
        names.sort();
        for name in names {
            if self.materials.contains_key(name) {
                continue;
            }
            let material = convert(name, &raw.materials[name], dir, warnings);
            self.materials.insert(name.clone(), material);
        }
    }

    /// Index of `name` in `set`, moving it out of the library on first use
    pub fn bind(&mut self, name: &str, set: &mut MaterialSet) -> Option<usize> {
        if let Some(index) = set.find(name) {
            return Some(index);
        }
        self.materials.remove(name).map(|material| set.push(material))
    }
}

fn color(value: Option<&MtlColor>, default: [f32; 4]) -> [f32; 4] {
    match value {
        Some(MtlColor::Rgb(r, g, b)) => [*r, *g, *b, 1.0],
        _ => default,
    }
}

fn convert(name: &str, raw: &MtlMaterial, dir: &Path, warnings: &mut Warnings) -> Material {
    let mut material = Material::new(name);
    material.ambient = color(raw.ambient.as_ref(), material.ambient);
    material.diffuse = color(raw.diffuse.as_ref(), material.diffuse);
    material.specular = color(raw.specular.as_ref(), material.specular);
    material.emission = color(raw.emissive.as_ref(), material.emission);
    if let Some(exponent) = raw.specular_exponent {
        material.shininess = exponent;
    }
    if let Some(dissolve) = raw.dissolve {
        material.diffuse[3] = dissolve;
    }
    if let Some(map) = &raw.diffuse_map {
        material.texture = load_texture(&dir.join(&map.file), warnings);
    }
    material
}

/// Write `materials` as an MTL file, saving each texture as a PNG next to it
pub fn write_library<W: Write>(
    out: &mut W,
    materials: &MaterialSet,
    mtl_path: &Path,
    warnings: &mut Warnings,
) -> io::Result<()> {
    writeln!(out, "# geocodec material library")?;
    for (i, material) in materials.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "newmtl {}", material.name)?;
        write_color(out, "Ka", &material.ambient)?;
        write_color(out, "Kd", &material.diffuse)?;
        write_color(out, "Ks", &material.specular)?;
        write_color(out, "Ke", &material.emission)?;
        writeln!(out, "Ns {}", material.shininess)?;
        writeln!(out, "d {}", material.diffuse[3])?;

        if let Some(texture) = &material.texture {
            let texture_path = sibling(mtl_path, &format!("_{}.png", i));
            if save_texture(texture, &texture_path, warnings) {
                if let Some(name) = texture_path.file_name() {
                    writeln!(out, "map_Kd {}", name.to_string_lossy())?;
                }
            } else {
                warnings.push(format!("Texture of material '{}' not referenced", material.name));
            }
        }
    }
    Ok(())
}

fn write_color<W: Write>(out: &mut W, key: &str, c: &[f32; 4]) -> io::Result<()> {
    writeln!(out, "{} {} {} {}", key, c[0], c[1], c[2])
}
