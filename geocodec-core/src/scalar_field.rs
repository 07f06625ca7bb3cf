//! Named per-point scalar attributes

use serde::{Deserialize, Serialize};

/// A named array of per-point values with cached bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    name: String,
    pub values: Vec<f32>,
    min: f32,
    max: f32,
}

impl ScalarField {
    /// Create an empty scalar field
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            min: 0.0,
            max: 0.0,
        }
    }

    /// Create a scalar field from existing values, bounds already computed
    pub fn from_values<S: Into<String>>(name: S, values: Vec<f32>) -> Self {
        let mut sf = Self {
            name: name.into(),
            values,
            min: 0.0,
            max: 0.0,
        };
        sf.compute_min_max();
        sf
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cached minimum, valid after [`ScalarField::compute_min_max`]
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Cached maximum, valid after [`ScalarField::compute_min_max`]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Recompute the cached bounds. Non-finite values are skipped.
    pub fn compute_min_max(&mut self) {
        let mut bounds: Option<(f32, f32)> = None;
        for &v in self.values.iter().filter(|v| v.is_finite()) {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        let (min, max) = bounds.unwrap_or((0.0, 0.0));
        self.min = min;
        self.max = max;
    }
}
