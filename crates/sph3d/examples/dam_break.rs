//! Dam-break diagnostic.
//!
//! Drops a column of fluid in a box and prints per-frame metrics so the
//! pressure solvers can be compared without a renderer.
//!
//! Run with: cargo run --release -p sph3d --example dam_break [wcsph|pcisph]

use glam::{UVec3, Vec3};
use sph3d::constants::DEFAULT_MAX_PARTICLES;
use sph3d::{
    BoxCollider, ForceModel, FrameMetrics, PciSphModel, Solver, VolumeEmitter, WcSphModel,
};

const FRAMES: u32 = 120;
const DT: f32 = 1.0 / 60.0;

fn main() {
    env_logger::init();

    let model_name = std::env::args().nth(1).unwrap_or_else(|| "pcisph".into());
    let model = match model_name.as_str() {
        "wcsph" => ForceModel::WcSph(WcSphModel::default()),
        "pcisph" => ForceModel::PciSph(PciSphModel::default()),
        other => {
            eprintln!("unknown model '{}', expected wcsph or pcisph", other);
            std::process::exit(1);
        }
    };

    let mut solver = Solver::new(model, DEFAULT_MAX_PARTICLES, UVec3::splat(32));
    solver.set_collider(Box::new(BoxCollider::new(Vec3::ZERO, Vec3::new(3.0, 3.0, 1.0))));

    // A column against the left wall, half the box high
    let spacing = solver.data().target_spacing();
    let mut emitter = VolumeEmitter::new(
        Vec3::new(0.05, 0.05, 0.05),
        Vec3::new(0.8, 1.5, 0.95),
        spacing,
    );
    emitter.jitter = 0.1;
    solver.set_emitter(emitter);
    solver.initialize();

    println!("model: {}, particles: {}", model_name, solver.particle_count());
    println!("frame |  steps | avg err | max err |  max rho |  avg p   | y spread");
    println!("------|--------|---------|---------|----------|----------|---------");

    for frame in 0..FRAMES {
        let steps = solver.number_of_sub_time_steps(DT);
        solver.advance_frame(DT);

        if frame % 10 == 0 {
            let metrics = FrameMetrics::compute(solver.data());
            println!(
                "{:5} | {:6} | {:7.4} | {:7.4} | {:8.1} | {:8.1} | {:7.3}",
                frame,
                steps,
                metrics.avg_density_error,
                metrics.max_density_error,
                metrics.max_density,
                metrics.avg_pressure,
                metrics.y_spread,
            );
        }
    }

    if let ForceModel::PciSph(model) = solver.force_model() {
        println!(
            "last sub-step: {} iterations, density error ratio {:.4}",
            model.last_number_of_iterations(),
            model.last_max_density_error_ratio()
        );
    }
}
