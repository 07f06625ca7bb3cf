//! Per-load decoding context: warnings, progress, cancellation and the
//! callbacks used to consult the caller.

use crate::error::{CodecError, CodecResult};
use crate::ply::resolve::{MappingRequest, MappingResponse};
use crate::shift::{self, ShiftDecision, ShiftRequest, ShiftState};
use crate::validate::{MaterialConflict, MaterialPolicy};
use geocodec_core::{to_storage, GlobalShift, Point3c, Point3d};
use log::warn;

/// Containers grow by this many records at a time once the declared size is exhausted
pub const GROWTH_CHUNK: usize = 65_536;

/// Default number of records between progress notifications
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Ordered, human readable warnings collected during a load or save.
///
/// Every pushed warning is also forwarded to the `log` facade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        warn!("{}", message);
        self.0.push(message);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// True if any warning contains `needle`, ignoring case
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.0.iter().any(|w| w.to_lowercase().contains(&needle))
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Options controlling a load
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Consult the handler even when heuristics are confident
    pub interactive: bool,
    /// Records between progress notifications; 0 disables them
    pub progress_interval: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            interactive: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl LoadOptions {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Snapshot passed to [`LoadHandler::progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressInfo {
    pub records: u64,
    pub expected: Option<u64>,
}

/// Callbacks through which a load consults its caller.
///
/// Every method has a non-interactive default, so an empty impl never blocks.
pub trait LoadHandler {
    /// Return `false` to cancel the load
    fn progress(&mut self, _info: &ProgressInfo) -> bool {
        true
    }

    fn request_field_mapping(&mut self, _request: &MappingRequest<'_>) -> MappingResponse {
        MappingResponse::Declined
    }

    fn request_global_shift(&mut self, request: &ShiftRequest) -> ShiftDecision {
        ShiftDecision::accept(request.proposed)
    }

    fn request_material_policy(&mut self, _conflict: &MaterialConflict) -> MaterialPolicy {
        MaterialPolicy::FlattenToVertexColors
    }
}

/// Handler that accepts every default
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl LoadHandler for NonInteractive {}

/// State owned by one decode from open to final entity
pub struct DecodeSession<'a> {
    pub options: &'a LoadOptions,
    pub handler: &'a mut dyn LoadHandler,
    pub warnings: Warnings,
    shift_state: &'a mut ShiftState,
    shift: Option<GlobalShift>,
    records: u64,
    expected: Option<u64>,
    corrupted_points: usize,
}

impl<'a> DecodeSession<'a> {
    pub fn new(
        options: &'a LoadOptions,
        shift_state: &'a mut ShiftState,
        handler: &'a mut dyn LoadHandler,
    ) -> Self {
        Self {
            options,
            handler,
            warnings: Warnings::new(),
            shift_state,
            shift: None,
            records: 0,
            expected: None,
            corrupted_points: 0,
        }
    }

    pub fn interactive(&self) -> bool {
        self.options.interactive
    }

    pub fn set_expected(&mut self, expected: Option<u64>) {
        self.expected = expected;
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Count one record and notify the handler every `progress_interval` records
    pub fn tick(&mut self) -> CodecResult<()> {
        self.records += 1;
        let interval = self.options.progress_interval;
        if interval > 0 && self.records % interval == 0 {
            let info = ProgressInfo {
                records: self.records,
                expected: self.expected,
            };
            if !self.handler.progress(&info) {
                return Err(CodecError::Canceled);
            }
        }
        Ok(())
    }

    /// Convert a decoded position into storage space.
    ///
    /// Non-finite components become zero. The first call decides the
    /// global shift used for every later point of this load.
    pub fn position(&mut self, mut raw: [f64; 3]) -> CodecResult<Point3c> {
        if raw.iter().any(|v| !v.is_finite()) {
            raw.iter_mut().filter(|v| !v.is_finite()).for_each(|v| *v = 0.0);
            self.corrupted_points += 1;
        }
        let point = Point3d::new(raw[0], raw[1], raw[2]);

        let shift = match self.shift {
            Some(shift) => shift,
            None => {
                let shift = shift::decide(
                    &point,
                    &mut *self.shift_state,
                    self.options.interactive,
                    &mut *self.handler,
                )?;
                if !shift.is_identity() {
                    self.warnings.push(format!(
                        "Cloud has been recentered: translation ({}, {}, {}), scale {}",
                        shift.translation.x, shift.translation.y, shift.translation.z, shift.scale
                    ));
                }
                self.shift = Some(shift);
                shift
            }
        };
        Ok(to_storage(&shift.to_local(&point)))
    }

    /// Shift decided for this load, identity if no point was seen
    pub fn global_shift(&self) -> GlobalShift {
        self.shift.unwrap_or_default()
    }

    /// Emit the aggregate warning for points with non-finite coordinates
    pub fn report_corrupted_points(&mut self) {
        if self.corrupted_points > 0 {
            let count = self.corrupted_points;
            self.warnings.push(format!(
                "{} point(s) had non-finite coordinates, replaced by 0",
                count
            ));
            self.corrupted_points = 0;
        }
    }

    pub fn into_warnings(self) -> Warnings {
        self.warnings
    }
}

/// Make room for one more element, growing by [`GROWTH_CHUNK`] when full
pub fn grow<T>(vec: &mut Vec<T>, what: &str) -> CodecResult<()> {
    if vec.len() == vec.capacity() {
        vec.try_reserve(GROWTH_CHUNK)
            .map_err(|e| CodecError::reserve(what, e))?;
    }
    Ok(())
}

/// Allocate a container for a declared record count
pub fn with_declared<T>(count: usize, what: &str) -> CodecResult<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(count)
        .map_err(|e| CodecError::reserve(what, e))?;
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CancelAfter(u64);

    impl LoadHandler for CancelAfter {
        fn progress(&mut self, info: &ProgressInfo) -> bool {
            info.records < self.0
        }
    }

    #[test]
    fn test_warnings_are_ordered() {
        let mut warnings = Warnings::new();
        warnings.push("first");
        warnings.push(String::from("Second one"));
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings.iter().next().map(String::as_str), Some("first"));
        assert!(warnings.mentions("second"));
        assert!(!warnings.mentions("third"));
    }

    #[test]
    fn test_tick_cancels() {
        let options = LoadOptions::default().with_progress_interval(2);
        let mut shift = ShiftState::default();
        let mut handler = CancelAfter(4);
        let mut session = DecodeSession::new(&options, &mut shift, &mut handler);

        assert!(session.tick().is_ok());
        assert!(session.tick().is_ok());
        assert!(session.tick().is_ok());
        assert!(matches!(session.tick(), Err(CodecError::Canceled)));
    }

    #[test]
    fn test_position_replaces_non_finite() {
        let options = LoadOptions::default();
        let mut shift = ShiftState::default();
        let mut handler = NonInteractive;
        let mut session = DecodeSession::new(&options, &mut shift, &mut handler);

        let p = session.position([1.0, f64::NAN, f64::INFINITY]).unwrap();
        assert_eq!(p, Point3c::new(1.0, 0.0, 0.0));
        session.report_corrupted_points();
        assert!(session.warnings.mentions("non-finite"));
        assert!(session.global_shift().is_identity());
    }

    #[test]
    fn test_grow_keeps_capacity() {
        let mut values: Vec<u32> = with_declared(2, "values").unwrap();
        values.push(1);
        values.push(2);
        grow(&mut values, "values").unwrap();
        assert!(values.capacity() >= 2 + GROWTH_CHUNK);
    }
}
