//! Global shift decision for large coordinates.
//!
//! Coordinates beyond [`MAX_SAFE_COORDINATE`] lose precision once narrowed to
//! storage precision. The first decoded point of a load decides whether the
//! whole load is recentered.

use crate::error::{CodecError, CodecResult};
use crate::session::LoadHandler;
use geocodec_core::{is_double_precision, GlobalShift, Point3d, Vector3d};
use log::debug;

/// Largest absolute coordinate stored without recentering
pub const MAX_SAFE_COORDINATE: f64 = if is_double_precision() { 1.0e9 } else { 1.0e5 };

/// Proposed translations are rounded to this step
const SHIFT_STEP: f64 = 100.0;

/// Shift carried across loads so a batch of files shares one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShiftState {
    /// Applied silently to every later load
    pub reuse: Option<GlobalShift>,
    /// Last shift decided, offered to the handler as the previous choice
    pub last: Option<GlobalShift>,
}

impl ShiftState {
    /// Pre-supply a shift for every following load
    pub fn with_shift(shift: GlobalShift) -> Self {
        Self {
            reuse: Some(shift),
            last: Some(shift),
        }
    }
}

/// What the handler sees when a shift is needed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftRequest {
    pub first_point: Point3d,
    pub proposed: GlobalShift,
    pub previous: Option<GlobalShift>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShiftChoice {
    UsePrevious,
    Accept(GlobalShift),
    Decline,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftDecision {
    pub choice: ShiftChoice,
    /// Keep the decided shift for every following load
    pub apply_to_all: bool,
}

impl ShiftDecision {
    pub fn accept(shift: GlobalShift) -> Self {
        Self {
            choice: ShiftChoice::Accept(shift),
            apply_to_all: false,
        }
    }

    pub fn decline() -> Self {
        Self {
            choice: ShiftChoice::Decline,
            apply_to_all: false,
        }
    }

    pub fn cancel() -> Self {
        Self {
            choice: ShiftChoice::Cancel,
            apply_to_all: false,
        }
    }

    pub fn for_all(mut self) -> Self {
        self.apply_to_all = true;
        self
    }
}

/// True when every coordinate of `p` stays below [`MAX_SAFE_COORDINATE`]
pub fn is_safe(p: &Point3d) -> bool {
    p.coords.iter().all(|c| c.abs() < MAX_SAFE_COORDINATE)
}

/// Shift bringing `p` close to the origin
pub fn propose(p: &Point3d) -> GlobalShift {
    let round = |c: f64| -((c / SHIFT_STEP).round() * SHIFT_STEP);
    GlobalShift::from_translation(Vector3d::new(round(p.x), round(p.y), round(p.z)))
}

/// Decide the shift for a load from its first point
pub fn decide(
    first_point: &Point3d,
    state: &mut ShiftState,
    interactive: bool,
    handler: &mut dyn LoadHandler,
) -> CodecResult<GlobalShift> {
    if let Some(shift) = state.reuse {
        debug!("Reusing global shift {:?}", shift.translation);
        return Ok(shift);
    }
    if is_safe(first_point) {
        return Ok(GlobalShift::default());
    }

    let proposed = propose(first_point);
    let decision = if interactive {
        handler.request_global_shift(&ShiftRequest {
            first_point: *first_point,
            proposed,
            previous: state.last,
        })
    } else {
        ShiftDecision::accept(proposed)
    };

    let shift = match decision.choice {
        ShiftChoice::UsePrevious => state.last.unwrap_or(proposed),
        ShiftChoice::Accept(shift) => shift,
        ShiftChoice::Decline => GlobalShift::default(),
        ShiftChoice::Cancel => return Err(CodecError::Canceled),
    };

    if !shift.is_identity() {
        state.last = Some(shift);
    }
    if decision.apply_to_all {
        state.reuse = Some(shift);
    }
    Ok(shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NonInteractive;

    struct Scripted(ShiftDecision);

    impl LoadHandler for Scripted {
        fn request_global_shift(&mut self, _request: &ShiftRequest) -> ShiftDecision {
            self.0
        }
    }

    fn far() -> Point3d {
        Point3d::new(500_123.25, 4_000_010.5, 12.0)
    }

    #[test]
    fn test_safe_point_is_not_shifted() {
        let mut state = ShiftState::default();
        let shift = decide(&Point3d::new(10.0, -20.0, 30.0), &mut state, false, &mut NonInteractive).unwrap();
        assert!(shift.is_identity());
        assert_eq!(state, ShiftState::default());
    }

    #[test]
    fn test_proposal_rounds_to_step() {
        let shift = propose(&far());
        assert_eq!(shift.translation, Vector3d::new(-500_100.0, -4_000_000.0, 0.0));
        assert_eq!(shift.scale, 1.0);
    }

    #[test]
    fn test_non_interactive_accepts_proposal() {
        if is_double_precision() {
            return;
        }
        let mut state = ShiftState::default();
        let shift = decide(&far(), &mut state, false, &mut NonInteractive).unwrap();
        assert_eq!(shift, propose(&far()));
        assert_eq!(state.last, Some(shift));
        assert_eq!(state.reuse, None);
    }

    #[test]
    fn test_presupplied_shift_is_reused() {
        let given = GlobalShift::from_translation(Vector3d::new(-1.0, -2.0, -3.0));
        let mut state = ShiftState::with_shift(given);
        let mut handler = Scripted(ShiftDecision::cancel());
        let shift = decide(&far(), &mut state, true, &mut handler).unwrap();
        assert_eq!(shift, given);
    }

    #[test]
    fn test_interactive_choices() {
        if is_double_precision() {
            return;
        }
        let mut state = ShiftState::default();
        let shift = decide(&far(), &mut state, true, &mut Scripted(ShiftDecision::decline())).unwrap();
        assert!(shift.is_identity());

        let result = decide(&far(), &mut state, true, &mut Scripted(ShiftDecision::cancel()));
        assert!(matches!(result, Err(CodecError::Canceled)));

        let custom = GlobalShift::new(Vector3d::new(-500_000.0, -4_000_000.0, 0.0), 0.5);
        let mut handler = Scripted(ShiftDecision::accept(custom).for_all());
        assert_eq!(decide(&far(), &mut state, true, &mut handler).unwrap(), custom);
        assert_eq!(state.reuse, Some(custom));
    }
}
