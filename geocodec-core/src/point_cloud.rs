//! Point cloud data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use crate::scalar_field::ScalarField;
use crate::shift::GlobalShift;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A point cloud with optional per-point channels.
///
/// Every optional channel is either absent or exactly `len()` long.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointCloud {
    pub name: String,
    pub points: Vec<Point3c>,
    pub normals: Option<Vec<Vector3c>>,
    pub colors: Option<Vec<Rgb>>,
    pub scalar_fields: Vec<ScalarField>,
    pub global_shift: GlobalShift,
}

impl PointCloud {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<Point3c>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: Point3c) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, Point3c> {
        self.points.iter()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Whether stored coordinates are offset from their original space
    pub fn is_shifted(&self) -> bool {
        !self.global_shift.is_identity()
    }

    /// Set per-point normals; the length must match the point count
    pub fn set_normals(&mut self, normals: Vec<Vector3c>) -> Result<()> {
        self.check_len("normals", normals.len())?;
        self.normals = Some(normals);
        Ok(())
    }

    /// Set per-point colors; the length must match the point count
    pub fn set_colors(&mut self, colors: Vec<Rgb>) -> Result<()> {
        self.check_len("colors", colors.len())?;
        self.colors = Some(colors);
        Ok(())
    }

    /// Attach a scalar field. Its name must be unique and its length must match.
    pub fn add_scalar_field(&mut self, field: ScalarField) -> Result<()> {
        if self.scalar_field(field.name()).is_some() {
            return Err(Error::DuplicateScalarField(field.name().to_string()));
        }
        self.check_len(field.name(), field.len())?;
        self.scalar_fields.push(field);
        Ok(())
    }

    /// Look up a scalar field by name
    pub fn scalar_field(&self, name: &str) -> Option<&ScalarField> {
        self.scalar_fields.iter().find(|sf| sf.name() == name)
    }

    /// Derive a scalar field name that is not used yet, suffixing `#2`, `#3`, ...
    pub fn unique_scalar_field_name(&self, base: &str) -> String {
        if self.scalar_field(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} #{}", base, n))
            .find(|candidate| self.scalar_field(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Point `index` expressed in original (unshifted) coordinates
    pub fn global_point(&self, index: usize) -> Point3d {
        self.global_shift.to_global(&to_double(&self.points[index]))
    }

    fn check_len(&self, channel: &str, actual: usize) -> Result<()> {
        if actual != self.len() {
            return Err(Error::ChannelLength {
                channel: channel.to_string(),
                expected: self.len(),
                actual,
            });
        }
        Ok(())
    }
}

impl Index<usize> for PointCloud {
    type Output = Point3c;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl IndexMut<usize> for PointCloud {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3c;
    type IntoIter = std::slice::Iter<'a, Point3c>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl FromIterator<Point3c> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3c>>(iter: I) -> Self {
        Self::from_points(Vec::from_iter(iter))
    }
}
