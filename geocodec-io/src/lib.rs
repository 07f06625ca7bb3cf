//! Streaming PLY and OBJ codecs for point clouds and meshes
//!
//! Loading probes the file's declared structure, maps its properties to
//! channels, streams records into containers and validates the result.
//! Recoverable problems are collected as warnings; anything else fails the
//! load with a [`CodecError`] that maps to one [`OutcomeKind`].

pub mod error;
pub mod files;
pub mod obj;
pub mod ply;
pub mod session;
pub mod shift;
pub mod validate;

#[cfg(test)]
mod tests;

pub use error::*;
pub use obj::{ObjReader, ObjWriter};
pub use ply::resolve::{FieldMapping, MappingRequest, MappingResponse, Role};
pub use ply::{PlyEncoding, PlyReader, PlyWriter};
pub use session::{LoadHandler, LoadOptions, NonInteractive, ProgressInfo, Warnings};
pub use shift::{ShiftChoice, ShiftDecision, ShiftRequest, ShiftState};
pub use validate::{MaterialConflict, MaterialPolicy};

use geocodec_core::{Entity, GlobalShift, Mesh, PointCloud};
use session::DecodeSession;
use std::path::Path;

/// Trait for reading point clouds from files
pub trait PointCloudReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> CodecResult<PointCloud>;
}

/// Trait for writing point clouds to files
pub trait PointCloudWriter {
    fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> CodecResult<()>;
}

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> CodecResult<Mesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P) -> CodecResult<()>;
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Ply,
    Obj,
}

/// Pick the format from the file extension (case-insensitive)
pub fn detect_format<P: AsRef<Path>>(path: P) -> CodecResult<FileFormat> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match extension.as_deref() {
        Some("ply") => Ok(FileFormat::Ply),
        Some("obj") => Ok(FileFormat::Obj),
        _ => Err(CodecError::UnsupportedFormat(format!(
            "no codec for '{}'",
            path.display()
        ))),
    }
}

/// A successful load
#[derive(Debug)]
pub struct Loaded {
    pub entity: Entity,
    pub warnings: Warnings,
    /// Shift applied to the stored coordinates, identity if none
    pub global_shift: GlobalShift,
}

/// Load `path`, consulting `handler` whenever `options.interactive` is set.
///
/// `shift_state` carries a shift chosen "for all files" from one load to the
/// next. Nothing built for this file survives a failure; the warnings
/// gathered until then are part of the [`LoadFailure`].
pub fn load_file<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
    shift_state: &mut ShiftState,
    handler: &mut dyn LoadHandler,
) -> std::result::Result<Loaded, LoadFailure> {
    let path = path.as_ref();
    let format = detect_format(path).map_err(|error| LoadFailure {
        error,
        warnings: Warnings::new(),
    })?;
    load_with_format(path, format, options, shift_state, handler)
}

/// Load `path` as `format`, whatever its extension
pub fn load_with_format(
    path: &Path,
    format: FileFormat,
    options: &LoadOptions,
    shift_state: &mut ShiftState,
    handler: &mut dyn LoadHandler,
) -> std::result::Result<Loaded, LoadFailure> {
    let mut session = DecodeSession::new(options, shift_state, handler);
    let result = match format {
        FileFormat::Ply => ply::load(path, &mut session),
        FileFormat::Obj => obj::load(path, &mut session),
    };
    let global_shift = session.global_shift();
    let warnings = session.into_warnings();
    match result {
        Ok(entity) => Ok(Loaded {
            entity,
            warnings,
            global_shift,
        }),
        Err(error) => Err(LoadFailure { error, warnings }),
    }
}

/// Non-interactive load with default options
pub fn read_entity<P: AsRef<Path>>(path: P) -> std::result::Result<Loaded, LoadFailure> {
    load_file(
        path,
        &LoadOptions::default(),
        &mut ShiftState::default(),
        &mut NonInteractive,
    )
}

pub(crate) fn read_as(path: &Path, format: FileFormat) -> CodecResult<Entity> {
    load_with_format(
        path,
        format,
        &LoadOptions::default(),
        &mut ShiftState::default(),
        &mut NonInteractive,
    )
    .map(|loaded| loaded.entity)
    .map_err(|failure| failure.error)
}

/// Output format of [`save_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveFormat {
    Ply(PlyEncoding),
    Obj,
}

impl SaveFormat {
    /// Format from the extension; PLY files are written binary little-endian
    pub fn from_path<P: AsRef<Path>>(path: P) -> CodecResult<Self> {
        Ok(match detect_format(path)? {
            FileFormat::Ply => SaveFormat::Ply(PlyEncoding::BinaryLittleEndian),
            FileFormat::Obj => SaveFormat::Obj,
        })
    }
}

/// Options for [`save_file`]
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Ask the handler how to reconcile materials instead of using `material_policy`
    pub interactive: bool,
    pub material_policy: MaterialPolicy,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            material_policy: MaterialPolicy::FlattenToVertexColors,
        }
    }
}

impl SaveOptions {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    pub fn with_material_policy(mut self, policy: MaterialPolicy) -> Self {
        self.material_policy = policy;
        self
    }
}

/// A successful save
#[derive(Debug, Default)]
pub struct SaveReport {
    pub warnings: Warnings,
}

/// Write `entity` to `path` without consulting anyone
pub fn save_file<P: AsRef<Path>>(
    entity: &Entity,
    path: P,
    format: SaveFormat,
    options: &SaveOptions,
) -> CodecResult<SaveReport> {
    save_file_with_handler(entity, path, format, options, &mut NonInteractive)
}

/// Write `entity` to `path`; with `options.interactive`, material conflicts
/// go to `handler`
pub fn save_file_with_handler<P: AsRef<Path>>(
    entity: &Entity,
    path: P,
    format: SaveFormat,
    options: &SaveOptions,
    handler: &mut dyn LoadHandler,
) -> CodecResult<SaveReport> {
    let path = path.as_ref();
    let mut warnings = Warnings::new();
    match format {
        SaveFormat::Ply(encoding) => {
            let decide = |conflict: &MaterialConflict| {
                if options.interactive {
                    handler.request_material_policy(conflict)
                } else {
                    options.material_policy
                }
            };
            ply::encode::save(entity, path, encoding, decide, &mut warnings)?
        }
        SaveFormat::Obj => obj::encode::save(entity, path, &mut warnings)?,
    }
    Ok(SaveReport { warnings })
}
