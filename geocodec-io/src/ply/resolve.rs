//! Mapping of PLY properties onto point cloud and mesh channels

use super::schema::{PlyHeader, PropertyRef};
use crate::error::{CodecError, CodecResult};
use crate::session::DecodeSession;
use log::debug;

/// Logical channel a property can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    X,
    Y,
    Z,
    Nx,
    Ny,
    Nz,
    Red,
    Green,
    Blue,
    Intensity,
    ScalarField,
    Faces,
    TexCoords,
}

impl Role {
    /// Faces and texture coordinates are fed by list properties
    pub fn wants_list(&self) -> bool {
        matches!(self, Role::Faces | Role::TexCoords)
    }
}

/// Which property feeds which channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    pub position: [Option<PropertyRef>; 3],
    pub normal: [Option<PropertyRef>; 3],
    pub color: [Option<PropertyRef>; 3],
    pub intensity: Option<PropertyRef>,
    pub scalar_fields: Vec<PropertyRef>,
    pub faces: Option<PropertyRef>,
    pub tex_coords: Option<PropertyRef>,
}

impl FieldMapping {
    /// Build a mapping from explicit `(property, role)` pairs
    pub fn from_roles<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = (PropertyRef, Role)>,
    {
        let mut mapping = Self::default();
        for (r, role) in roles {
            mapping.assign(r, role);
        }
        mapping
    }

    /// Assign `r` to `role`, replacing any previous holder of a single slot
    pub fn assign(&mut self, r: PropertyRef, role: Role) {
        match role {
            Role::X => self.position[0] = Some(r),
            Role::Y => self.position[1] = Some(r),
            Role::Z => self.position[2] = Some(r),
            Role::Nx => self.normal[0] = Some(r),
            Role::Ny => self.normal[1] = Some(r),
            Role::Nz => self.normal[2] = Some(r),
            Role::Red => self.color[0] = Some(r),
            Role::Green => self.color[1] = Some(r),
            Role::Blue => self.color[2] = Some(r),
            Role::Intensity => self.intensity = Some(r),
            Role::ScalarField => {
                if !self.scalar_fields.contains(&r) {
                    self.scalar_fields.push(r)
                }
            }
            Role::Faces => self.faces = Some(r),
            Role::TexCoords => self.tex_coords = Some(r),
        }
    }

    /// Role currently held by `r`
    pub fn role_of(&self, r: PropertyRef) -> Option<Role> {
        self.roles().into_iter().find(|(held, _)| *held == r).map(|(_, role)| role)
    }

    /// Every `(property, role)` pair of the mapping
    pub fn roles(&self) -> Vec<(PropertyRef, Role)> {
        const AXES: [[Role; 3]; 3] = [
            [Role::X, Role::Y, Role::Z],
            [Role::Nx, Role::Ny, Role::Nz],
            [Role::Red, Role::Green, Role::Blue],
        ];
        let mut roles = Vec::new();
        for (slots, names) in [&self.position, &self.normal, &self.color].into_iter().zip(AXES) {
            for (slot, role) in slots.iter().zip(names) {
                if let Some(r) = slot {
                    roles.push((*r, role));
                }
            }
        }
        roles.extend(self.intensity.map(|r| (r, Role::Intensity)));
        roles.extend(self.scalar_fields.iter().map(|r| (*r, Role::ScalarField)));
        roles.extend(self.faces.map(|r| (r, Role::Faces)));
        roles.extend(self.tex_coords.map(|r| (r, Role::TexCoords)));
        roles
    }

    pub fn is_assigned(&self, r: PropertyRef) -> bool {
        self.role_of(r).is_some()
    }

    /// Release `r` from whatever slot holds it
    pub fn unassign(&mut self, r: PropertyRef) {
        let clear = |slot: &mut Option<PropertyRef>| {
            if *slot == Some(r) {
                *slot = None;
            }
        };
        self.position.iter_mut().for_each(clear);
        self.normal.iter_mut().for_each(clear);
        self.color.iter_mut().for_each(clear);
        clear(&mut self.intensity);
        clear(&mut self.faces);
        clear(&mut self.tex_coords);
        self.scalar_fields.retain(|held| *held != r);
    }

    pub fn has_colors(&self) -> bool {
        self.color.iter().any(Option::is_some)
    }

    fn filled_slots(&self) -> usize {
        self.roles().len()
    }
}

/// What the handler sees when the mapping is ambiguous
#[derive(Debug, Clone, Copy)]
pub struct MappingRequest<'a> {
    pub header: &'a PlyHeader,
    pub proposal: &'a FieldMapping,
    pub unmatched: &'a [PropertyRef],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingResponse {
    Mapping(FieldMapping),
    Declined,
    Cancel,
}

/// Heuristic mapping from property and element names
pub fn guess(header: &PlyHeader) -> FieldMapping {
    let mut mapping = FieldMapping::default();

    for r in header.point_properties() {
        let name = header.property(r).name.to_uppercase();
        let element = header.element(r).name.to_uppercase();
        if let Some(role) = point_role(&name, &element, &mapping) {
            mapping.assign(r, role);
        }
    }

    for r in header.list_properties() {
        let name = header.property(r).name.to_uppercase();
        if name.contains("IND") && mapping.faces.is_none() {
            mapping.faces = Some(r);
        } else if name.contains("COORD") && mapping.tex_coords.is_none() {
            mapping.tex_coords = Some(r);
        }
    }
    mapping
}

fn point_role(name: &str, element: &str, mapping: &FieldMapping) -> Option<Role> {
    let suffix = |c: char| name.ends_with(c);
    let free = |slot: &Option<PropertyRef>| slot.is_none();

    if name.contains("SCAL") {
        return Some(Role::ScalarField);
    }

    let normal_axis = if name.contains("NX") || (element.contains("NORM") && suffix('X')) {
        Some(0)
    } else if name.contains("NY") || (element.contains("NORM") && suffix('Y')) {
        Some(1)
    } else if name.contains("NZ") || (element.contains("NORM") && suffix('Z')) {
        Some(2)
    } else {
        None
    };
    if let Some(axis) = normal_axis.filter(|&a| free(&mapping.normal[a])) {
        return Some([Role::Nx, Role::Ny, Role::Nz][axis]);
    }

    let color_channel = if name.contains("RED") || (element.contains("COL") && suffix('R')) {
        Some(0)
    } else if name.contains("GREEN") || (element.contains("COL") && suffix('G')) {
        Some(1)
    } else if name.contains("BLUE") || (element.contains("COL") && suffix('B')) {
        Some(2)
    } else {
        None
    };
    if let Some(channel) = color_channel.filter(|&c| free(&mapping.color[c])) {
        return Some([Role::Red, Role::Green, Role::Blue][channel]);
    }

    let is_intensity = name.contains("INTENSITY")
        || name.contains("GRAY")
        || name.contains("GREY")
        || (element.contains("COL") && suffix('I'));
    if is_intensity && free(&mapping.intensity) {
        return Some(Role::Intensity);
    }

    if element.contains("VERT") || element.contains("POINT") {
        let axis = if suffix('X') {
            Some(0)
        } else if suffix('Y') {
            Some(1)
        } else if suffix('Z') {
            Some(2)
        } else {
            None
        };
        if let Some(axis) = axis.filter(|&a| free(&mapping.position[a])) {
            return Some([Role::X, Role::Y, Role::Z][axis]);
        }
    }

    if name.contains("VAL") {
        return Some(Role::ScalarField);
    }
    None
}

/// Resolve the mapping for `header`, consulting the handler when ambiguous
pub fn resolve(header: &PlyHeader, session: &mut DecodeSession<'_>) -> CodecResult<FieldMapping> {
    let point_properties = header.point_properties();
    if point_properties.len() < 2 {
        return Err(CodecError::Format(format!(
            "only {} usable point propert(ies), at least 2 are needed",
            point_properties.len()
        )));
    }

    let proposal = guess(header);
    let unmatched: Vec<PropertyRef> = point_properties
        .iter()
        .chain(header.list_properties().iter())
        .copied()
        .filter(|r| !proposal.is_assigned(*r))
        .collect();

    let ambiguous = session.interactive() || unmatched.len() > proposal.filled_slots() + 1;
    let mut mapping = if ambiguous {
        debug!(
            "PLY mapping is ambiguous ({} unmatched properties), asking handler",
            unmatched.len()
        );
        let request = MappingRequest {
            header,
            proposal: &proposal,
            unmatched: &unmatched,
        };
        match session.handler.request_field_mapping(&request) {
            MappingResponse::Mapping(manual) => {
                check_manual(header, &manual)?;
                manual
            }
            MappingResponse::Declined => fallback(header, proposal),
            MappingResponse::Cancel => return Err(CodecError::Canceled),
        }
    } else {
        proposal
    };

    if mapping.intensity.is_some() && mapping.has_colors() {
        session
            .warnings
            .push("Intensity ignored because the file also has RGB colors");
        mapping.intensity = None;
    }

    if mapping.position[0].is_none() || mapping.position[1].is_none() {
        return Err(CodecError::Format(
            "no property could be mapped to the X and Y coordinates".to_string(),
        ));
    }

    let counts: Vec<usize> = mapping
        .position
        .iter()
        .flatten()
        .map(|r| header.element(*r).count)
        .collect();
    if counts.windows(2).any(|w| w[0] != w[1]) {
        return Err(CodecError::Semantic(
            "coordinates are spread over elements with different instance counts".to_string(),
        ));
    }

    drop_split_group(&mut mapping.normal, "Normal", session);
    drop_split_group(&mut mapping.color, "Color", session);

    for (r, role) in mapping.roles() {
        debug!("PLY property {} -> {:?}", header.qualified_name(r), role);
    }
    Ok(mapping)
}

/// Keep the heuristic matches and fill in positions and faces by declaration order
fn fallback(header: &PlyHeader, mut mapping: FieldMapping) -> FieldMapping {
    if mapping.position[0].is_none() || mapping.position[1].is_none() {
        let columns: Vec<PropertyRef> = header.point_properties().into_iter().take(3).collect();
        mapping.position = [None; 3];
        for (axis, r) in columns.iter().enumerate() {
            mapping.unassign(*r);
            mapping.position[axis] = Some(*r);
        }
    }
    if mapping.faces.is_none() {
        let first_list = header
            .list_properties()
            .into_iter()
            .find(|r| mapping.tex_coords != Some(*r));
        mapping.faces = first_list;
    }
    mapping
}

fn check_manual(header: &PlyHeader, mapping: &FieldMapping) -> CodecResult<()> {
    for (r, role) in mapping.roles() {
        let property = header
            .elements
            .get(r.element)
            .and_then(|e| e.properties.get(r.property))
            .ok_or_else(|| CodecError::BadArgument(format!("no property at {:?}", r)))?;
        if property.is_list() != role.wants_list() {
            return Err(CodecError::BadArgument(format!(
                "property '{}' cannot be used as {:?}",
                header.qualified_name(r),
                role
            )));
        }
    }
    Ok(())
}

/// A channel group whose components live in different elements cannot be assembled
fn drop_split_group(
    group: &mut [Option<PropertyRef>; 3],
    what: &str,
    session: &mut DecodeSession<'_>,
) {
    let mut elements = group.iter().flatten().map(|r| r.element);
    if let Some(first) = elements.next() {
        if elements.any(|e| e != first) {
            session.warnings.push(format!(
                "{} components are spread over several elements, ignored",
                what
            ));
            *group = [None; 3];
        }
    }
}
