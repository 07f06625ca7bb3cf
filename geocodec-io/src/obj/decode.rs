//! Line-oriented OBJ decoding

use super::mtl::MaterialLibrary;
use crate::error::{CodecError, CodecResult};
use crate::session::{grow, DecodeSession};
use geocodec_core::{Coord, MaterialSet, Point3c, TexCoord, TriangleGroup, Vector3c};
use std::collections::HashSet;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::SplitWhitespace;

/// Normals further than this from unit length are reported as invalid
const NORMAL_TOLERANCE: Coord = 0.05;

/// Containers filled while streaming an OBJ file
#[derive(Debug, Default)]
pub struct RawObj {
    pub points: Vec<Point3c>,
    pub tex_coords: Vec<TexCoord>,
    pub normals: Vec<Vector3c>,
    pub triangles: Vec<[usize; 3]>,
    /// Per-triangle tables stay `None` until a face uses them
    pub triangle_tex_coords: Option<Vec<Option<[usize; 3]>>>,
    pub triangle_normals: Option<Vec<Option<[usize; 3]>>>,
    pub triangle_materials: Option<Vec<Option<usize>>>,
    pub materials: MaterialSet,
    pub groups: Vec<TriangleGroup>,
    pub invalid_normals: usize,
}

/// One face corner, with indices already 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    pub vertex: usize,
    pub tex: Option<usize>,
    pub normal: Option<usize>,
}

/// Resolve a 1-based or negative (relative) index against `count` entries
pub fn resolve_index(token: &str, count: usize, what: &str) -> CodecResult<usize> {
    let value: i64 = token
        .parse()
        .map_err(|_| CodecError::Format(format!("invalid {} index '{}'", what, token)))?;
    if value == 0 {
        return Err(CodecError::Format(format!("{} index 0 is not allowed", what)));
    }
    if value > 0 {
        return Ok(value as usize - 1);
    }
    let back = value.unsigned_abs() as usize;
    if back > count {
        return Err(CodecError::Format(format!(
            "relative {} index {} reaches before the first of {} entries",
            what, value, count
        )));
    }
    Ok(count - back)
}

/// Parse a `v`, `v/t`, `v//n` or `v/t/n` corner
pub fn parse_corner(token: &str, raw: &RawObj) -> CodecResult<Corner> {
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() > 3 {
        return Err(CodecError::Format(format!("malformed face corner '{}'", token)));
    }
    let optional = |part: Option<&&str>, count: usize, what: &str| match part {
        Some(part) if !part.is_empty() => resolve_index(part, count, what).map(Some),
        _ => Ok(None),
    };
    Ok(Corner {
        vertex: resolve_index(parts[0], raw.points.len(), "vertex")?,
        tex: optional(parts.get(1), raw.tex_coords.len(), "texture coordinate")?,
        normal: optional(parts.get(2), raw.normals.len(), "normal")?,
    })
}

fn parse_numbers<const N: usize>(
    tokens: &mut SplitWhitespace<'_>,
    what: &str,
    line: usize,
) -> CodecResult<[f64; N]> {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        let token = tokens
            .next()
            .ok_or_else(|| CodecError::Format(format!("line {}: missing {} component", line, what)))?;
        *value = token.parse().map_err(|_| {
            CodecError::Format(format!("line {}: invalid {} component '{}'", line, what, token))
        })?;
    }
    Ok(values)
}

/// Append to a lazily created per-triangle table, back-filling `None`
fn push_lazy<T: Copy>(
    table: &mut Option<Vec<Option<T>>>,
    index: usize,
    value: Option<T>,
    what: &str,
) -> CodecResult<()> {
    if table.is_none() && value.is_none() {
        return Ok(());
    }
    let table = table.get_or_insert_with(Vec::new);
    if table.len() < index {
        table
            .try_reserve(index - table.len())
            .map_err(|e| CodecError::reserve(what, e))?;
        table.resize(index, None);
    }
    grow(table, what)?;
    table.push(value);
    Ok(())
}

fn pad<T: Clone>(table: &mut Option<Vec<Option<T>>>, len: usize) {
    if let Some(table) = table {
        table.resize(len, None);
    }
}

fn corner_triple(a: Option<usize>, b: Option<usize>, c: Option<usize>) -> Option<[usize; 3]> {
    Some([a?, b?, c?])
}

impl RawObj {
    /// Fan-tessellate a polygon: triangles `(0, i, i + 1)`
    fn push_polygon(&mut self, corners: &[Corner], material: Option<usize>) -> CodecResult<()> {
        let first = corners[0];
        for pair in corners[1..].windows(2) {
            let (b, c) = (pair[0], pair[1]);
            let index = self.triangles.len();
            grow(&mut self.triangles, "triangles")?;
            self.triangles.push([first.vertex, b.vertex, c.vertex]);
            push_lazy(
                &mut self.triangle_tex_coords,
                index,
                corner_triple(first.tex, b.tex, c.tex),
                "texture coordinate indices",
            )?;
            push_lazy(
                &mut self.triangle_normals,
                index,
                corner_triple(first.normal, b.normal, c.normal),
                "normal indices",
            )?;
            push_lazy(&mut self.triangle_materials, index, material, "material indices")?;
        }
        Ok(())
    }

    fn close_group(&mut self, group: Option<TriangleGroup>) {
        if let Some(mut group) = group {
            group.len = self.triangles.len() - group.start;
            self.groups.push(group);
        }
    }
}

fn read_line<R: BufRead>(reader: &mut R, line: &mut String) -> CodecResult<usize> {
    reader.read_line(line).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidData => CodecError::Format("OBJ file is not valid text".to_string()),
        _ => CodecError::Read(e),
    })
}

/// Stream an OBJ body into raw containers. `dir` resolves `mtllib` paths.
pub fn decode<R: BufRead>(mut reader: R, dir: &Path, session: &mut DecodeSession<'_>) -> CodecResult<RawObj> {
    let mut raw = RawObj::default();
    let mut library = MaterialLibrary::new();
    let mut unknown_materials = HashSet::new();
    let mut material = None;
    let mut group = None;
    let mut corners = Vec::new();

    let mut line = String::new();
    let mut line_number = 0;
    loop {
        line.clear();
        if read_line(&mut reader, &mut line)? == 0 {
            break;
        }
        line_number += 1;

        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "v" => {
                let position = parse_numbers::<3>(&mut tokens, "vertex", line_number)?;
                let point = session.position(position)?;
                grow(&mut raw.points, "points")?;
                raw.points.push(point);
            }
            "vt" => {
                let [u, v] = parse_numbers::<2>(&mut tokens, "texture coordinate", line_number)?;
                grow(&mut raw.tex_coords, "texture coordinates")?;
                raw.tex_coords.push([u as f32, v as f32]);
            }
            "vn" => {
                let [x, y, z] = parse_numbers::<3>(&mut tokens, "normal", line_number)?;
                let normal = Vector3c::new(x as Coord, y as Coord, z as Coord);
                if (normal.norm() - 1.0).abs() > NORMAL_TOLERANCE {
                    raw.invalid_normals += 1;
                }
                grow(&mut raw.normals, "normals")?;
                raw.normals.push(normal);
            }
            "f" => {
                corners.clear();
                for token in tokens {
                    corners.push(parse_corner(token, &raw)?);
                }
                if corners.len() < 3 {
                    return Err(CodecError::Format(format!(
                        "line {}: face with {} corner(s)",
                        line_number,
                        corners.len()
                    )));
                }
                raw.push_polygon(&corners, material)?;
            }
            "g" => {
                let name = tokens.collect::<Vec<_>>().join(" ");
                let name = if name.is_empty() { "default".to_string() } else { name };
                raw.close_group(group.take());
                group = Some(TriangleGroup {
                    name,
                    start: raw.triangles.len(),
                    len: 0,
                });
            }
            "mtllib" => {
                let file = tokens.collect::<Vec<_>>().join(" ");
                library.load(&dir.join(file), &mut session.warnings);
            }
            "usemtl" => {
                let name = tokens.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    material = None;
                    session.tick()?;
                    continue;
                }
                material = library.bind(&name, &mut raw.materials);
                if material.is_none() && unknown_materials.insert(name.clone()) {
                    session.warnings.push(format!("Material '{}' not found", name));
                }
            }
            // `#` comments and directives without geometry (`s`, `o`, `l`)
            _ => continue,
        }
        session.tick()?;
    }

    raw.close_group(group);
    let count = raw.triangles.len();
    pad(&mut raw.triangle_tex_coords, count);
    pad(&mut raw.triangle_normals, count);
    pad(&mut raw.triangle_materials, count);

    if raw.invalid_normals > 0 {
        session.warnings.push(format!(
            "{} invalid normals (not unit length)",
            raw.invalid_normals
        ));
    }
    session.report_corrupted_points();
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LoadOptions, NonInteractive};
    use crate::shift::ShiftState;

    fn decode_text(text: &str) -> CodecResult<RawObj> {
        let options = LoadOptions::default();
        let mut state = ShiftState::default();
        let mut handler = NonInteractive;
        let mut session = DecodeSession::new(&options, &mut state, &mut handler);
        decode(text.as_bytes(), Path::new("."), &mut session)
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index("1", 4, "vertex").unwrap(), 0);
        assert_eq!(resolve_index("-1", 4, "vertex").unwrap(), 3);
        assert_eq!(resolve_index("-4", 4, "vertex").unwrap(), 0);
        assert!(resolve_index("-5", 4, "vertex").is_err());
        assert!(resolve_index("0", 4, "vertex").is_err());
        assert!(resolve_index("x", 4, "vertex").is_err());
    }

    #[test]
    fn test_corner_forms() {
        let raw = RawObj {
            points: vec![Point3c::origin(); 3],
            tex_coords: vec![[0.0, 0.0]; 2],
            normals: vec![Vector3c::z(); 2],
            ..RawObj::default()
        };
        let corner = |t| parse_corner(t, &raw).unwrap();
        assert_eq!(corner("2"), Corner { vertex: 1, tex: None, normal: None });
        assert_eq!(corner("2/1"), Corner { vertex: 1, tex: Some(0), normal: None });
        assert_eq!(corner("2//2"), Corner { vertex: 1, tex: None, normal: Some(1) });
        assert_eq!(corner("-1/-1/-1"), Corner { vertex: 2, tex: Some(1), normal: Some(1) });
        assert!(parse_corner("1/1/1/1", &raw).is_err());
        assert!(parse_corner("/1", &raw).is_err());
    }

    #[test]
    fn test_fan_tessellation() {
        let raw = decode_text("v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 1 0\nf 1 2 3 4 5\n").unwrap();
        assert_eq!(raw.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
        assert!(raw.triangle_tex_coords.is_none());
        assert!(raw.triangle_normals.is_none());
    }

    #[test]
    fn test_lazy_tables_are_back_filled() {
        let raw = decode_text(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1 2 3\nf 1//1 2//1 3//1\n",
        )
        .unwrap();
        assert_eq!(raw.triangle_normals, Some(vec![None, Some([0, 0, 0])]));
    }

    #[test]
    fn test_groups_are_ranges() {
        let raw = decode_text(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\ng first\nf 1 2 3\nf 3 2 1\ng\ng last\nf 1 2 3\n",
        )
        .unwrap();
        let groups: Vec<_> = raw.groups.iter().map(|g| (g.name.as_str(), g.start, g.len)).collect();
        assert_eq!(groups, vec![("first", 0, 2), ("default", 2, 0), ("last", 2, 1)]);
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(decode_text("v 0 0\n"), Err(CodecError::Format(_))));
        assert!(matches!(decode_text("v 0 0 0\nv 1 1 1\nf 1 2\n"), Err(CodecError::Format(_))));
        assert!(matches!(decode_text("v 0 0 0\nf 0 1 1\n"), Err(CodecError::Format(_))));
        assert!(matches!(decode_text("v a 0 0\n"), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_invalid_normals_single_warning() {
        let options = LoadOptions::default();
        let mut state = ShiftState::default();
        let mut handler = NonInteractive;
        let mut session = DecodeSession::new(&options, &mut state, &mut handler);
        decode("vn 0 0 2\nvn 3 0 0\nvn 0 1 0\n".as_bytes(), Path::new("."), &mut session).unwrap();
        let warnings = session.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings.mentions("invalid normals"));
    }
}
