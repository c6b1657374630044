//! End-to-end gravity scenario.
//!
//! A single particle has no neighbors, so no SPH force applies and the
//! trajectory must match ballistic free fall exactly.

use glam::{UVec3, Vec3};
use sph3d::{ForceModel, Solver, SubStepping};

const DT: f32 = 1.0 / 60.0;
const FRAMES: usize = 60;
const GRAVITY: f32 = 9.8;

#[test]
fn test_single_particle_free_fall_matches_closed_form() {
    let mut solver = Solver::new(ForceModel::None, 16, UVec3::splat(8));
    solver.set_sub_stepping(SubStepping::Fixed { count: 1 });
    solver.config_mut().gravity = Vec3::new(0.0, -GRAVITY, 0.0);
    solver.config_mut().set_drag_coefficient(0.0);
    solver.add_particle(Vec3::ZERO, Vec3::ZERO);
    solver.initialize();

    for _ in 0..FRAMES {
        solver.advance_frame(DT);
    }

    let position = solver.data().positions()[0];
    let velocity = solver.data().velocities()[0];
    let t = FRAMES as f32 * DT;

    // Semi-implicit Euler sums v_k = -g k dt, so after N steps the exact
    // discrete position is -g dt^2 N(N+1)/2.
    let n = FRAMES as f32;
    let discrete = -GRAVITY * DT * DT * n * (n + 1.0) / 2.0;
    assert!(
        (position.y - discrete).abs() < 1e-3,
        "discrete free fall mismatch: got {}, expected {}",
        position.y,
        discrete
    );

    // Against the continuous closed form -g t^2 / 2 the error is one
    // half-step, O(g t dt).
    let continuous = -0.5 * GRAVITY * t * t;
    assert!(
        (position.y - continuous).abs() < GRAVITY * t * DT,
        "continuous free fall mismatch: got {}, expected {}",
        position.y,
        continuous
    );

    // Velocity is exact for constant acceleration
    assert!(
        (velocity.y + GRAVITY * t).abs() < 1e-3,
        "velocity mismatch: got {}, expected {}",
        velocity.y,
        -GRAVITY * t
    );

    // Gravity has no lateral component
    assert_eq!(position.x, 0.0);
    assert_eq!(position.z, 0.0);
}

#[test]
fn test_sph_solver_with_lone_particle_also_free_falls() {
    // With zero neighbors the density is far below target, the EOS clamps
    // pressure to zero, and the SPH pipeline degenerates to pure gravity.
    let mut solver = Solver::new(
        ForceModel::WcSph(Default::default()),
        16,
        UVec3::splat(8),
    );
    solver.set_sub_stepping(SubStepping::Fixed { count: 1 });
    solver.config_mut().gravity = Vec3::new(0.0, -GRAVITY, 0.0);
    solver.config_mut().set_drag_coefficient(0.0);
    solver.add_particle(Vec3::ZERO, Vec3::ZERO);

    for _ in 0..FRAMES {
        solver.advance_frame(DT);
    }

    let n = FRAMES as f32;
    let discrete = -GRAVITY * DT * DT * n * (n + 1.0) / 2.0;
    let position = solver.data().positions()[0];
    assert!(
        (position.y - discrete).abs() < 1e-3,
        "SPH lone particle should free fall: got {}, expected {}",
        position.y,
        discrete
    );
}

#[test]
fn test_drag_slows_the_fall() {
    let mut undragged = Solver::new(ForceModel::None, 16, UVec3::splat(8));
    undragged.config_mut().set_drag_coefficient(0.0);
    undragged.add_particle(Vec3::ZERO, Vec3::ZERO);

    let mut dragged = Solver::new(ForceModel::None, 16, UVec3::splat(8));
    dragged.config_mut().set_drag_coefficient(0.5);
    dragged.add_particle(Vec3::ZERO, Vec3::ZERO);

    for _ in 0..FRAMES {
        undragged.advance_frame(DT);
        dragged.advance_frame(DT);
    }

    assert!(
        dragged.data().positions()[0].y > undragged.data().positions()[0].y,
        "drag should reduce the fall distance"
    );
}

#[test]
fn test_box_collider_stops_the_fall() {
    use sph3d::BoxCollider;

    let mut solver = Solver::new(ForceModel::None, 16, UVec3::splat(8));
    solver.config_mut().set_drag_coefficient(0.0);
    solver.set_collider(Box::new(BoxCollider::new(
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::splat(2.0),
    )));
    solver.add_particle(Vec3::new(0.5, 1.0, 0.5), Vec3::ZERO);

    for _ in 0..240 {
        solver.advance_frame(DT);
    }

    let position = solver.data().positions()[0];
    assert!(
        position.y >= 0.0 && position.y < 0.05,
        "particle should come to rest on the floor, got y = {}",
        position.y
    );
}
