//! Record-by-record decoding of PLY bodies

use super::resolve::FieldMapping;
use super::schema::{PlyEncoding, PlyHeader, PropertyKind, PropertyRef, ScalarKind};
use crate::error::{CodecError, CodecResult};
use crate::session::{grow, with_declared, DecodeSession};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use geocodec_core::{Coord, Point3c, Rgb, ScalarField, TexCoord, Vector3c};
use std::io::BufRead;
use std::marker::PhantomData;

/// Pulls typed values out of a PLY body
pub trait ValueSource {
    fn scalar(&mut self, kind: ScalarKind) -> CodecResult<f64>;
}

/// Whitespace separated tokens, any number per line
pub struct AsciiSource<R> {
    reader: R,
    line: String,
    pos: usize,
    line_no: usize,
}

impl<R: BufRead> AsciiSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pos: 0,
            line_no: 0,
        }
    }

    fn next_token(&mut self) -> CodecResult<&str> {
        loop {
            let rest = &self.line[self.pos..];
            let start = self.pos + (rest.len() - rest.trim_start().len());
            if start < self.line.len() {
                let end = self.line[start..]
                    .find(char::is_whitespace)
                    .map_or(self.line.len(), |offset| start + offset);
                self.pos = end;
                return Ok(&self.line[start..end]);
            }

            self.line.clear();
            self.pos = 0;
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(CodecError::Format(
                    "unexpected end of data in PLY body".to_string(),
                ));
            }
            self.line_no += 1;
        }
    }
}

impl<R: BufRead> ValueSource for AsciiSource<R> {
    fn scalar(&mut self, kind: ScalarKind) -> CodecResult<f64> {
        let line_no = self.line_no;
        let token = self.next_token()?;
        token.parse::<f64>().map_err(|_| {
            CodecError::Format(format!(
                "invalid {} value '{}' near body line {}",
                kind.name(),
                token,
                line_no.max(1)
            ))
        })
    }
}

/// Packed values in the byte order `B`
pub struct BinarySource<R, B> {
    reader: R,
    _order: PhantomData<B>,
}

impl<R: BufRead, B: ByteOrder> BinarySource<R, B> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            _order: PhantomData,
        }
    }
}

impl<R: BufRead, B: ByteOrder> ValueSource for BinarySource<R, B> {
    fn scalar(&mut self, kind: ScalarKind) -> CodecResult<f64> {
        let r = &mut self.reader;
        let value = match kind {
            ScalarKind::Int8 => r.read_i8()? as f64,
            ScalarKind::UInt8 => r.read_u8()? as f64,
            ScalarKind::Int16 => r.read_i16::<B>()? as f64,
            ScalarKind::UInt16 => r.read_u16::<B>()? as f64,
            ScalarKind::Int32 => r.read_i32::<B>()? as f64,
            ScalarKind::UInt32 => r.read_u32::<B>()? as f64,
            ScalarKind::Int64 => r.read_i64::<B>()? as f64,
            ScalarKind::UInt64 => r.read_u64::<B>()? as f64,
            ScalarKind::Float32 => r.read_f32::<B>()? as f64,
            ScalarKind::Float64 => r.read_f64::<B>()?,
        };
        Ok(value)
    }
}

/// Containers filled by the decoder, before validation
#[derive(Debug, Default)]
pub struct RawPly {
    pub points: Vec<Point3c>,
    pub normals: Option<Vec<Vector3c>>,
    pub colors: Option<Vec<Rgb>>,
    pub scalar_fields: Vec<ScalarField>,
    pub triangles: Option<Vec<[usize; 3]>>,
    /// Three corners per committed triangle
    pub tex_coords: Option<Vec<TexCoord>>,
    pub declared_faces: usize,
    pub rejected_faces: usize,
    pub rejected_tex_coords: usize,
}

/// Where a property value goes
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Skip,
    Position(usize),
    Normal(usize),
    Color(usize, bool),
    Intensity(bool),
    Scalar(usize),
    Faces,
    TexCoords,
}

/// Values of the record being read
#[derive(Debug, Default)]
struct RecordScratch {
    point: [f64; 3],
    normal: [f64; 3],
    color: Rgb,
    intensity: u8,
    scalars: Vec<f32>,
    face: Option<[usize; 3]>,
    tex: Option<[TexCoord; 3]>,
}

impl RecordScratch {
    fn reset(&mut self) {
        self.point = [0.0; 3];
        self.normal = [0.0; 3];
        self.color = [0; 3];
        self.intensity = 0;
        self.scalars.iter_mut().for_each(|v| *v = 0.0);
        self.face = None;
        self.tex = None;
    }
}

/// Per element: one slot per property, and which channel groups commit there
struct DispatchPlan {
    slots: Vec<Vec<Slot>>,
    position_element: Option<usize>,
    /// Element of each axis, when the axes are not all in one element
    split_axes: Option<[Option<usize>; 3]>,
    normal_element: Option<usize>,
    color_element: Option<usize>,
    intensity_element: Option<usize>,
    scalar_elements: Vec<usize>,
    face_element: Option<usize>,
    tex_element: Option<usize>,
}

impl DispatchPlan {
    fn new(header: &PlyHeader, mapping: &FieldMapping) -> Self {
        let mut slots: Vec<Vec<Slot>> = header
            .elements
            .iter()
            .map(|e| vec![Slot::Skip; e.properties.len()])
            .collect();
        let mut set = |r: PropertyRef, slot: Slot| slots[r.element][r.property] = slot;
        let is_float = |r: PropertyRef| {
            matches!(header.property(r).kind, PropertyKind::Scalar(kind) if kind.is_float())
        };

        for (axis, r) in mapping.position.iter().enumerate() {
            if let Some(r) = r {
                set(*r, Slot::Position(axis));
            }
        }
        for (axis, r) in mapping.normal.iter().enumerate() {
            if let Some(r) = r {
                set(*r, Slot::Normal(axis));
            }
        }
        for (channel, r) in mapping.color.iter().enumerate() {
            if let Some(r) = r {
                set(*r, Slot::Color(channel, is_float(*r)));
            }
        }
        if let Some(r) = mapping.intensity {
            set(r, Slot::Intensity(is_float(r)));
        }
        for (index, r) in mapping.scalar_fields.iter().enumerate() {
            set(*r, Slot::Scalar(index));
        }
        if let Some(r) = mapping.faces {
            set(r, Slot::Faces);
        }
        if let Some(r) = mapping.tex_coords {
            set(r, Slot::TexCoords);
        }

        let axes = mapping.position.map(|r| r.map(|r| r.element));
        let mut present = axes.iter().flatten();
        let split = present
            .next()
            .map_or(false, |first| present.any(|e| e != first));

        Self {
            slots,
            position_element: first_element(&mapping.position),
            split_axes: split.then_some(axes),
            normal_element: first_element(&mapping.normal),
            color_element: first_element(&mapping.color),
            intensity_element: mapping.intensity.map(|r| r.element),
            scalar_elements: mapping.scalar_fields.iter().map(|r| r.element).collect(),
            face_element: mapping.faces.map(|r| r.element),
            tex_element: mapping.tex_coords.map(|r| r.element),
        }
    }
}

fn first_element(group: &[Option<PropertyRef>; 3]) -> Option<usize> {
    group.iter().flatten().map(|r| r.element).next()
}

/// Scalar field name as written by the encoder: `scalar_` prefix, `_` for spaces
pub fn scalar_field_name(property: &str) -> String {
    let stripped = property
        .get(..7)
        .filter(|head| head.eq_ignore_ascii_case("scalar_"))
        .map_or(property, |_| &property[7..]);
    let name = stripped.replace('_', " ");
    if name.trim().is_empty() {
        property.to_string()
    } else {
        name
    }
}

fn color_component(value: f64, from_float: bool) -> u8 {
    let scaled = if from_float {
        value.clamp(0.0, 1.0) * 255.0
    } else {
        value.clamp(0.0, 255.0)
    };
    scaled.round() as u8
}

fn list_len(value: f64) -> CodecResult<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(CodecError::Format(format!("invalid list length {}", value)));
    }
    Ok(value as usize)
}

fn vertex_index(value: f64) -> Option<usize> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= usize::MAX as f64)
        .then_some(value as usize)
}

/// Decode the body following `header` into raw containers
pub fn decode<R: BufRead>(
    reader: R,
    header: &PlyHeader,
    mapping: &FieldMapping,
    session: &mut DecodeSession<'_>,
) -> CodecResult<RawPly> {
    match header.encoding {
        PlyEncoding::Ascii => run(&mut AsciiSource::new(reader), header, mapping, session),
        PlyEncoding::BinaryLittleEndian => run(
            &mut BinarySource::<R, LittleEndian>::new(reader),
            header,
            mapping,
            session,
        ),
        PlyEncoding::BinaryBigEndian => run(
            &mut BinarySource::<R, BigEndian>::new(reader),
            header,
            mapping,
            session,
        ),
    }
}

fn run<S: ValueSource>(
    source: &mut S,
    header: &PlyHeader,
    mapping: &FieldMapping,
    session: &mut DecodeSession<'_>,
) -> CodecResult<RawPly> {
    let plan = DispatchPlan::new(header, mapping);
    let declared = |element: Option<usize>| element.map_or(0, |e| header.elements[e].count);

    let point_count = declared(plan.position_element);
    let mut raw = RawPly {
        points: with_declared(point_count, "points")?,
        declared_faces: declared(plan.face_element),
        ..RawPly::default()
    };
    if plan.normal_element.is_some() {
        raw.normals = Some(with_declared(declared(plan.normal_element), "normals")?);
    }
    if plan.color_element.is_some() || plan.intensity_element.is_some() {
        let element = plan.color_element.or(plan.intensity_element);
        raw.colors = Some(with_declared(declared(element), "colors")?);
    }
    for (r, element) in mapping.scalar_fields.iter().zip(&plan.scalar_elements) {
        let mut field = ScalarField::new(scalar_field_name(&header.property(*r).name));
        field.values = with_declared(header.elements[*element].count, "scalar field")?;
        raw.scalar_fields.push(field);
    }
    if plan.face_element.is_some() {
        raw.triangles = Some(with_declared(raw.declared_faces, "triangles")?);
    }
    if plan.tex_element.is_some() {
        raw.tex_coords = Some(with_declared(3 * declared(plan.tex_element), "texture coordinates")?);
    }

    // axes from several elements meet by record index
    let mut split_points: Option<Vec<[f64; 3]>> = None;
    if plan.split_axes.is_some() {
        let mut pending = with_declared(point_count, "points")?;
        pending.resize(point_count, [0.0; 3]);
        split_points = Some(pending);
    }

    let total = header
        .elements
        .iter()
        .fold(0u64, |sum, e| sum.saturating_add(e.count as u64));
    session.set_expected(Some(total));

    let mut scratch = RecordScratch {
        scalars: vec![0.0; raw.scalar_fields.len()],
        ..RecordScratch::default()
    };

    for (ei, element) in header.elements.iter().enumerate() {
        let slots = &plan.slots[ei];
        for record in 0..element.count {
            scratch.reset();
            for (property, slot) in element.properties.iter().zip(slots) {
                match property.kind {
                    PropertyKind::Scalar(kind) => {
                        let value = source.scalar(kind)?;
                        dispatch_scalar(*slot, value, &mut scratch);
                    }
                    PropertyKind::List { count, item } => {
                        let len = list_len(source.scalar(count)?)?;
                        dispatch_list(*slot, len, item, source, &mut scratch)?;
                    }
                }
            }
            if let (Some(axes), Some(pending)) = (plan.split_axes, split_points.as_mut()) {
                for (axis, axis_element) in axes.iter().enumerate() {
                    if *axis_element == Some(ei) {
                        pending[record][axis] = scratch.point[axis];
                    }
                }
            }
            commit(ei, &plan, &mut scratch, &mut raw, session)?;
            session.tick()?;
        }
    }

    for point in split_points.into_iter().flatten() {
        let point = session.position(point)?;
        raw.points.push(point);
    }

    session.report_corrupted_points();
    Ok(raw)
}

fn dispatch_scalar(slot: Slot, value: f64, scratch: &mut RecordScratch) {
    match slot {
        Slot::Position(axis) => scratch.point[axis] = value,
        Slot::Normal(axis) => scratch.normal[axis] = value,
        Slot::Color(channel, from_float) => scratch.color[channel] = color_component(value, from_float),
        Slot::Intensity(from_float) => scratch.intensity = color_component(value, from_float),
        Slot::Scalar(index) => scratch.scalars[index] = value as f32,
        Slot::Skip | Slot::Faces | Slot::TexCoords => {}
    }
}

fn dispatch_list<S: ValueSource>(
    slot: Slot,
    len: usize,
    item: ScalarKind,
    source: &mut S,
    scratch: &mut RecordScratch,
) -> CodecResult<()> {
    match slot {
        Slot::Faces if len == 3 => {
            let mut face = [0usize; 3];
            let mut valid = true;
            for index in face.iter_mut() {
                let value = source.scalar(item)?;
                match vertex_index(value) {
                    Some(v) => *index = v,
                    None => valid = false,
                }
            }
            // an unusable index rejects the face like a non-triangle
            scratch.face = valid.then_some(face);
        }
        Slot::TexCoords if len == 6 => {
            let mut corners = [[0.0f32; 2]; 3];
            for corner in corners.iter_mut() {
                corner[0] = source.scalar(item)? as f32;
                corner[1] = source.scalar(item)? as f32;
            }
            scratch.tex = Some(corners);
        }
        _ => {
            for _ in 0..len {
                source.scalar(item)?;
            }
        }
    }
    Ok(())
}

fn commit(
    element: usize,
    plan: &DispatchPlan,
    scratch: &mut RecordScratch,
    raw: &mut RawPly,
    session: &mut DecodeSession<'_>,
) -> CodecResult<()> {
    if plan.split_axes.is_none() && plan.position_element == Some(element) {
        let point = session.position(scratch.point)?;
        grow(&mut raw.points, "points")?;
        raw.points.push(point);
    }
    if plan.normal_element == Some(element) {
        if let Some(normals) = raw.normals.as_mut() {
            let [x, y, z] = scratch.normal;
            grow(normals, "normals")?;
            normals.push(Vector3c::new(x as Coord, y as Coord, z as Coord));
        }
    }
    if let Some(colors) = raw.colors.as_mut() {
        if plan.color_element == Some(element) {
            grow(colors, "colors")?;
            colors.push(scratch.color);
        } else if plan.color_element.is_none() && plan.intensity_element == Some(element) {
            grow(colors, "colors")?;
            colors.push([scratch.intensity; 3]);
        }
    }
    for (index, field_element) in plan.scalar_elements.iter().enumerate() {
        if *field_element == element {
            let values = &mut raw.scalar_fields[index].values;
            grow(values, "scalar field")?;
            values.push(scratch.scalars[index]);
        }
    }

    let mut face_ok = true;
    if plan.face_element == Some(element) {
        match (scratch.face.take(), raw.triangles.as_mut()) {
            (Some(face), Some(triangles)) => {
                grow(triangles, "triangles")?;
                triangles.push(face);
            }
            _ => {
                raw.rejected_faces += 1;
                face_ok = false;
            }
        }
    }
    if plan.tex_element == Some(element) {
        // texture corners follow the triangle they belong to
        let same_record = plan.face_element == Some(element);
        match (scratch.tex.take(), raw.tex_coords.as_mut()) {
            (Some(corners), Some(tex_coords)) if face_ok || !same_record => {
                grow(tex_coords, "texture coordinates")?;
                tex_coords.extend_from_slice(&corners);
            }
            (None, _) => raw.rejected_tex_coords += 1,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ascii_tokens_span_lines() {
        let mut source = AsciiSource::new(Cursor::new("1 2\n  3\n\n-4.5e1 nan\n"));
        let values: Vec<f64> = (0..4)
            .map(|_| source.scalar(ScalarKind::Float32).unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, -45.0]);
        assert!(source.scalar(ScalarKind::Float32).unwrap().is_nan());
        assert!(matches!(source.scalar(ScalarKind::Float32), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_ascii_rejects_garbage() {
        let mut source = AsciiSource::new(Cursor::new("1 two 3\n"));
        assert!(source.scalar(ScalarKind::Int32).is_ok());
        assert!(matches!(source.scalar(ScalarKind::Int32), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_binary_sources() {
        let le: Vec<u8> = [1.5f32.to_le_bytes().to_vec(), (-2i16).to_le_bytes().to_vec(), vec![200u8]].concat();
        let mut source = BinarySource::<_, LittleEndian>::new(Cursor::new(le));
        assert_eq!(source.scalar(ScalarKind::Float32).unwrap(), 1.5);
        assert_eq!(source.scalar(ScalarKind::Int16).unwrap(), -2.0);
        assert_eq!(source.scalar(ScalarKind::UInt8).unwrap(), 200.0);
        assert!(matches!(source.scalar(ScalarKind::Float64), Err(CodecError::Read(_))));

        let be: Vec<u8> = [70000u32.to_be_bytes().to_vec(), 0.25f64.to_be_bytes().to_vec()].concat();
        let mut source = BinarySource::<_, BigEndian>::new(Cursor::new(be));
        assert_eq!(source.scalar(ScalarKind::UInt32).unwrap(), 70000.0);
        assert_eq!(source.scalar(ScalarKind::Float64).unwrap(), 0.25);
    }

    #[test]
    fn test_scalar_field_names() {
        assert_eq!(scalar_field_name("scalar_Return_Number"), "Return Number");
        assert_eq!(scalar_field_name("SCALAR_dist"), "dist");
        assert_eq!(scalar_field_name("quality"), "quality");
        assert_eq!(scalar_field_name("scalar_"), "scalar_");
    }

    #[test]
    fn test_vertex_index_values() {
        assert_eq!(vertex_index(4.0), Some(4));
        assert_eq!(vertex_index(-1.0), None);
        assert_eq!(vertex_index(f64::NAN), None);
        assert_eq!(vertex_index(f64::INFINITY), None);
        assert_eq!(vertex_index(1.5), None);
    }

    #[test]
    fn test_color_components() {
        assert_eq!(color_component(0.5, true), 128);
        assert_eq!(color_component(2.0, true), 255);
        assert_eq!(color_component(300.0, false), 255);
        assert_eq!(color_component(-3.0, false), 0);
        assert_eq!(color_component(f64::NAN, false), 0);
    }
}
