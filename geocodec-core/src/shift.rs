//! Global coordinate shift metadata

use crate::point::{Point3d, Vector3d};
use serde::{Deserialize, Serialize};

/// Translation and uniform scale applied to coordinates at load time.
///
/// Stored coordinates satisfy `local = (global + translation) * scale`.
/// The shift stays attached to the cloud so exporters can write
/// original-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalShift {
    pub translation: Vector3d,
    pub scale: f64,
}

impl Default for GlobalShift {
    fn default() -> Self {
        Self {
            translation: Vector3d::zeros(),
            scale: 1.0,
        }
    }
}

impl GlobalShift {
    /// Create a shift from a translation and a scale factor
    pub fn new(translation: Vector3d, scale: f64) -> Self {
        Self { translation, scale }
    }

    /// Create a pure translation
    pub fn from_translation(translation: Vector3d) -> Self {
        Self::new(translation, 1.0)
    }

    /// True when applying the shift changes nothing
    pub fn is_identity(&self) -> bool {
        self.translation == Vector3d::zeros() && self.scale == 1.0
    }

    /// Map an original-space point into stored (shifted) space
    pub fn to_local(&self, global: &Point3d) -> Point3d {
        Point3d::from((global.coords + self.translation) * self.scale)
    }

    /// Map a stored point back into original space
    pub fn to_global(&self, local: &Point3d) -> Point3d {
        Point3d::from(local.coords / self.scale - self.translation)
    }
}
