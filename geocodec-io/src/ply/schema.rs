//! PLY header parsing into an element/property schema

use crate::error::{CodecError, CodecResult};
use crate::session::Warnings;
use log::debug;
use std::io::BufRead;

/// Comment prefix naming a companion texture image
pub const TEXTURE_FILE_COMMENT: &str = "TEXTUREFILE";

/// PLY body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyEncoding {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(PlyEncoding::Ascii),
            "binary_little_endian" => Some(PlyEncoding::BinaryLittleEndian),
            "binary_big_endian" => Some(PlyEncoding::BinaryBigEndian),
            _ => None,
        }
    }
}

/// Scalar value types a PLY property may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ScalarKind {
    /// Parse both the classic (`uchar`) and sized (`uint8`) spellings
    pub fn parse(name: &str) -> Option<Self> {
        let kind = match name {
            "char" | "int8" => ScalarKind::Int8,
            "uchar" | "uint8" => ScalarKind::UInt8,
            "short" | "int16" => ScalarKind::Int16,
            "ushort" | "uint16" => ScalarKind::UInt16,
            "int" | "int32" => ScalarKind::Int32,
            "uint" | "uint32" => ScalarKind::UInt32,
            "long" | "int64" => ScalarKind::Int64,
            "ulong" | "uint64" => ScalarKind::UInt64,
            "float" | "float32" => ScalarKind::Float32,
            "double" | "float64" => ScalarKind::Float64,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Int8 => "char",
            ScalarKind::UInt8 => "uchar",
            ScalarKind::Int16 => "short",
            ScalarKind::UInt16 => "ushort",
            ScalarKind::Int32 => "int",
            ScalarKind::UInt32 => "uint",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float32 => "float",
            ScalarKind::Float64 => "double",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarKind::Float32 | ScalarKind::Float64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Scalar(ScalarKind),
    List { count: ScalarKind, item: ScalarKind },
}

/// Position of a property inside a [`PlyHeader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyRef {
    pub element: usize,
    pub property: usize,
}

impl PropertyRef {
    pub fn new(element: usize, property: usize) -> Self {
        Self { element, property }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertySchema {
    pub fn is_list(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. })
    }
}

/// Point-like elements carry only scalars, mesh-like ones at least one list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementClass {
    PointLike,
    MeshLike,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSchema {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertySchema>,
}

impl ElementSchema {
    pub fn class(&self) -> ElementClass {
        if self.properties.iter().any(PropertySchema::is_list) {
            ElementClass::MeshLike
        } else {
            ElementClass::PointLike
        }
    }
}

/// Everything declared before `end_header`
#[derive(Debug, Clone, PartialEq)]
pub struct PlyHeader {
    pub encoding: PlyEncoding,
    pub version: String,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
    /// Elements with at least one instance, in declaration order
    pub elements: Vec<ElementSchema>,
}

impl PlyHeader {
    pub fn element(&self, r: PropertyRef) -> &ElementSchema {
        &self.elements[r.element]
    }

    pub fn property(&self, r: PropertyRef) -> &PropertySchema {
        &self.elements[r.element].properties[r.property]
    }

    /// `element.property`, for messages
    pub fn qualified_name(&self, r: PropertyRef) -> String {
        format!("{}.{}", self.element(r).name, self.property(r).name)
    }

    /// Scalar properties of point-like elements, in declaration order
    pub fn point_properties(&self) -> Vec<PropertyRef> {
        self.refs_where(|element, property| {
            element.class() == ElementClass::PointLike && !property.is_list()
        })
    }

    /// List properties of mesh-like elements, in declaration order
    pub fn list_properties(&self) -> Vec<PropertyRef> {
        self.refs_where(|_, property| property.is_list())
    }

    pub fn has_point_like_element(&self) -> bool {
        self.elements.iter().any(|e| e.class() == ElementClass::PointLike)
    }

    /// Texture file named by a `TEXTUREFILE` comment, if any
    pub fn texture_file(&self) -> Option<&str> {
        self.comments.iter().find_map(|comment| {
            let head = comment.get(..TEXTURE_FILE_COMMENT.len())?;
            if !head.eq_ignore_ascii_case(TEXTURE_FILE_COMMENT) {
                return None;
            }
            let name = comment[TEXTURE_FILE_COMMENT.len()..].trim();
            (!name.is_empty()).then_some(name)
        })
    }

    fn refs_where<F>(&self, keep: F) -> Vec<PropertyRef>
    where
        F: Fn(&ElementSchema, &PropertySchema) -> bool,
    {
        let mut refs = Vec::new();
        for (ei, element) in self.elements.iter().enumerate() {
            for (pi, property) in element.properties.iter().enumerate() {
                if keep(element, property) {
                    refs.push(PropertyRef::new(ei, pi));
                }
            }
        }
        refs
    }
}

/// Read the header, leaving `reader` at the first byte of the body.
///
/// Zero-instance elements are skipped with a warning. Scalar properties of
/// mesh-like elements stay in the schema, so the body can be stepped over,
/// but are reported as unhandled.
pub fn probe<R: BufRead>(reader: &mut R, warnings: &mut Warnings) -> CodecResult<PlyHeader> {
    let mut line = String::new();
    // non-UTF-8 input is just another file that is not PLY
    match reader.read_line(&mut line) {
        Ok(n) if n > 0 && line.trim() == "ply" => {}
        _ => {
            return Err(CodecError::UnsupportedFormat(
                "missing 'ply' magic line".to_string(),
            ))
        }
    }

    let mut encoding = None;
    let mut version = String::new();
    let mut comments = Vec::new();
    let mut obj_info = Vec::new();
    let mut declared: Vec<ElementSchema> = Vec::new();
    let mut line_no = 1usize;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(CodecError::Format("unexpected end of file in PLY header".to_string()));
        }
        line_no += 1;

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let parts: Vec<&str> = text.split_whitespace().collect();

        match parts[0] {
            "format" => {
                if parts.len() < 3 {
                    return Err(header_error(line_no, "incomplete format line"));
                }
                encoding = Some(PlyEncoding::parse(parts[1]).ok_or_else(|| {
                    header_error(line_no, &format!("unknown encoding '{}'", parts[1]))
                })?);
                version = parts[2].to_string();
            }
            "comment" => comments.push(rest_of_line(text, "comment")),
            "obj_info" => obj_info.push(rest_of_line(text, "obj_info")),
            "element" => {
                if parts.len() != 3 {
                    return Err(header_error(line_no, "element needs a name and a count"));
                }
                let count = parts[2].parse::<usize>().map_err(|_| {
                    header_error(line_no, &format!("invalid element count '{}'", parts[2]))
                })?;
                declared.push(ElementSchema {
                    name: parts[1].to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            "property" => {
                let element = declared
                    .last_mut()
                    .ok_or_else(|| header_error(line_no, "property declared before any element"))?;
                element.properties.push(parse_property(&parts, line_no)?);
            }
            "end_header" => break,
            other => {
                return Err(header_error(line_no, &format!("unexpected keyword '{}'", other)));
            }
        }
    }

    let encoding = encoding.ok_or_else(|| CodecError::Format("missing format line".to_string()))?;

    let mut elements = Vec::with_capacity(declared.len());
    for element in declared {
        if element.count == 0 {
            warnings.push(format!("Element '{}' has no instance, ignored", element.name));
            continue;
        }
        if element.class() == ElementClass::MeshLike {
            for property in element.properties.iter().filter(|p| !p.is_list()) {
                warnings.push(format!(
                    "Unhandled property '{}.{}' ignored",
                    element.name, property.name
                ));
            }
        }
        elements.push(element);
    }

    if !elements.iter().any(|e| e.class() == ElementClass::PointLike) {
        return Err(CodecError::NothingToLoad(
            "no element with scalar properties".to_string(),
        ));
    }
    debug!("PLY header: {} element(s), {:?}", elements.len(), encoding);
    for comment in &comments {
        debug!("PLY comment: {}", comment);
    }
    for info in &obj_info {
        debug!("PLY obj_info: {}", info);
    }

    Ok(PlyHeader {
        encoding,
        version,
        comments,
        obj_info,
        elements,
    })
}

fn parse_property(parts: &[&str], line_no: usize) -> CodecResult<PropertySchema> {
    let scalar = |token: &str| {
        ScalarKind::parse(token)
            .ok_or_else(|| header_error(line_no, &format!("unknown property type '{}'", token)))
    };

    match parts {
        [_, "list", count, item, name] => Ok(PropertySchema {
            name: name.to_string(),
            kind: PropertyKind::List {
                count: scalar(*count)?,
                item: scalar(*item)?,
            },
        }),
        [_, kind, name] => Ok(PropertySchema {
            name: name.to_string(),
            kind: PropertyKind::Scalar(scalar(*kind)?),
        }),
        _ => Err(header_error(line_no, "malformed property declaration")),
    }
}

fn rest_of_line(text: &str, keyword: &str) -> String {
    text[keyword.len()..].trim().to_string()
}

fn header_error(line_no: usize, message: &str) -> CodecError {
    CodecError::Format(format!("PLY header line {}: {}", line_no, message))
}
