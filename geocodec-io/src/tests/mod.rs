//! End-to-end tests for the PLY and OBJ codecs
//!
//! Each test writes real files into a scratch directory and goes through the
//! public load/save entry points.

mod shift_tests;

use crate::{load_file, LoadFailure, LoadHandler, LoadOptions, Loaded, ShiftState};
use std::path::{Path, PathBuf};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Non-interactive load with a fresh shift state
pub(crate) fn load(path: &Path) -> Result<Loaded, LoadFailure> {
    init_logging();
    crate::read_entity(path)
}

pub(crate) fn load_with(
    path: &Path,
    options: &LoadOptions,
    state: &mut ShiftState,
    handler: &mut dyn LoadHandler,
) -> Result<Loaded, LoadFailure> {
    init_logging();
    load_file(path, options, state, handler)
}
