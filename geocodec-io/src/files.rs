//! Companion files: texture images and guarded output files

use crate::error::{CodecError, CodecResult};
use crate::session::Warnings;
use geocodec_core::Texture;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Load a texture image, reporting failures as a warning
pub fn load_texture(path: &Path, warnings: &mut Warnings) -> Option<Texture> {
    match image::open(path) {
        Ok(image) => {
            debug!("Loaded texture {}", path.display());
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(Texture::new(file_name, image.to_rgba8()))
        }
        Err(e) => {
            warnings.push(format!("Failed to load texture '{}': {}", path.display(), e));
            None
        }
    }
}

/// Save a texture image, reporting failures as a warning
pub fn save_texture(texture: &Texture, path: &Path, warnings: &mut Warnings) -> bool {
    match texture.image.save(path) {
        Ok(()) => true,
        Err(e) => {
            warnings.push(format!("Failed to save texture '{}': {}", path.display(), e));
            false
        }
    }
}

/// Sibling of `path` named `<stem><suffix>`
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!("{}{}", stem, suffix))
}

/// Create `path` and fill it with `write`. On failure the partial file is removed.
pub fn write_guarded<F>(path: &Path, write: F) -> CodecResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(path).map_err(CodecError::Write)?;
    let mut writer = BufWriter::new(file);
    let result = write(&mut writer).and_then(|_| writer.flush());
    if let Err(e) = result {
        drop(writer);
        let _ = fs::remove_file(path);
        return Err(CodecError::Write(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_failed_write_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.obj");
        let result = write_guarded(&path, |w| {
            w.write_all(b"v 0 0 0\n")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });
        assert!(matches!(result, Err(CodecError::Write(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_texture_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = sibling(&dir.path().join("scan.ply"), "_texture.png");
        assert_eq!(path.file_name().unwrap(), "scan_texture.png");

        let texture = Texture::new("t.png", RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255])));
        let mut warnings = Warnings::new();
        assert!(save_texture(&texture, &path, &mut warnings));
        let loaded = load_texture(&path, &mut warnings).unwrap();
        assert_eq!(loaded.file_name, "scan_texture.png");
        assert_eq!(loaded.image.dimensions(), (3, 2));
        assert!(warnings.is_empty());

        assert!(load_texture(&dir.path().join("missing.png"), &mut warnings).is_none());
        assert_eq!(warnings.len(), 1);
    }
}
