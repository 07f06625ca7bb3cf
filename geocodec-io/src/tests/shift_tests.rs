//! Global shift decisions across loads and their removal on export

use super::{load, load_with, write_file};
use crate::{
    save_file, CodecError, LoadHandler, LoadOptions, PlyEncoding, SaveFormat, SaveOptions,
    ShiftDecision, ShiftRequest, ShiftState,
};
use approx::assert_relative_eq;
use geocodec_core::Vector3d;
use std::path::PathBuf;

const FAR_X: f64 = 2_500_000_123.25;
const FAR_Y: f64 = -3_000_000_050.5;

fn far_cloud(dir: &std::path::Path, name: &str) -> PathBuf {
    let text = format!(
        "ply\nformat ascii 1.0\nelement vertex 2\n\
         property double x\nproperty double y\nproperty double z\nend_header\n\
         {} {} 10\n{} {} 11\n",
        FAR_X,
        FAR_Y,
        FAR_X + 1.0,
        FAR_Y - 1.0
    );
    write_file(dir, name, text.as_bytes())
}

#[test]
fn test_far_coordinates_are_recentered() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load(&far_cloud(dir.path(), "far.ply")).unwrap();

    assert!(loaded.warnings.mentions("recentered"));
    assert_eq!(
        loaded.global_shift.translation,
        Vector3d::new(-2_500_000_100.0, 3_000_000_100.0, 0.0)
    );
    let cloud = loaded.entity.into_cloud();
    assert_eq!(cloud.global_shift, loaded.global_shift);
    assert_relative_eq!(cloud.points[0].x as f64, 23.25, epsilon = 1e-3);
    assert_relative_eq!(cloud.points[0].y as f64, 49.5, epsilon = 1e-3);
    assert_relative_eq!(cloud.points[1].z as f64, 11.0, epsilon = 1e-3);
}

#[test]
fn test_shift_is_removed_on_export() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = load(&far_cloud(dir.path(), "far.ply")).unwrap();

    let ply_path = dir.path().join("again.ply");
    save_file(
        &loaded.entity,
        &ply_path,
        SaveFormat::Ply(PlyEncoding::BinaryLittleEndian),
        &SaveOptions::default(),
    )
    .unwrap();
    let reloaded = load(&ply_path).unwrap().entity.into_cloud();
    let p = reloaded.global_point(0);
    assert_relative_eq!(p.x, FAR_X, epsilon = 1e-3);
    assert_relative_eq!(p.y, FAR_Y, epsilon = 1e-3);

    let obj_path = dir.path().join("again.obj");
    save_file(&loaded.entity, &obj_path, SaveFormat::Obj, &SaveOptions::default()).unwrap();
    let text = std::fs::read_to_string(&obj_path).unwrap();
    assert!(text.contains(&format!("v {} {} 10\n", FAR_X, FAR_Y)));
}

/// Accepts every proposal "for all files" and counts how often it is asked
#[derive(Default)]
struct AcceptForAll {
    asked: usize,
}

impl LoadHandler for AcceptForAll {
    fn request_global_shift(&mut self, request: &ShiftRequest) -> ShiftDecision {
        self.asked += 1;
        ShiftDecision::accept(request.proposed).for_all()
    }
}

#[test]
fn test_shift_for_all_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let first = far_cloud(dir.path(), "first.ply");
    let second = far_cloud(dir.path(), "second.ply");

    let options = LoadOptions::interactive();
    let mut state = ShiftState::default();
    let mut handler = AcceptForAll::default();

    let a = load_with(&first, &options, &mut state, &mut handler).unwrap();
    let b = load_with(&second, &options, &mut state, &mut handler).unwrap();
    assert_eq!(handler.asked, 1);
    assert_eq!(a.global_shift, b.global_shift);
    assert_eq!(state.reuse, Some(a.global_shift));
    assert_eq!(state.last, Some(a.global_shift));
}

struct Decline;

impl LoadHandler for Decline {
    fn request_global_shift(&mut self, _request: &ShiftRequest) -> ShiftDecision {
        ShiftDecision::decline()
    }
}

struct CancelShift;

impl LoadHandler for CancelShift {
    fn request_global_shift(&mut self, _request: &ShiftRequest) -> ShiftDecision {
        ShiftDecision::cancel()
    }
}

#[test]
fn test_declined_and_canceled_shift() {
    let dir = tempfile::tempdir().unwrap();
    let path = far_cloud(dir.path(), "far.ply");
    let options = LoadOptions::interactive();

    let loaded = load_with(&path, &options, &mut ShiftState::default(), &mut Decline).unwrap();
    assert!(loaded.global_shift.is_identity());
    assert!(!loaded.warnings.mentions("recentered"));

    let failure =
        load_with(&path, &options, &mut ShiftState::default(), &mut CancelShift).unwrap_err();
    assert!(matches!(failure.error, CodecError::Canceled));
}

#[test]
fn test_obj_vertices_share_the_first_point_shift() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!("v {} {} 0\nv {} {} 0\nv 0 0 0\nf 1 2 3\n", FAR_X, FAR_Y, FAR_X, FAR_Y + 1.0);
    let path = write_file(dir.path(), "far.obj", text.as_bytes());

    let loaded = load(&path).unwrap();
    assert!(!loaded.global_shift.is_identity());
    let mesh = loaded.entity.into_mesh().unwrap();
    assert_relative_eq!(mesh.vertices.points[1].y as f64, 50.5, epsilon = 1e-3);
    // the third vertex is shifted too, far from the origin in local space
    assert_relative_eq!(mesh.vertices.global_point(2).x, 0.0, epsilon = 1e3);
}
