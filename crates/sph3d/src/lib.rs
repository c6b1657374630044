//! 3D SPH Fluid Simulation
//!
//! A particle-based fluid simulation core: structure-of-arrays particle
//! storage, a parallel hash-grid neighbor index rebuilt every sub-step
//! (bitonic sort + range tables), and pressure solvers layered as strategies
//! over one explicit time integrator (weakly-compressible SPH and
//! predictive-corrective incompressible SPH).
//!
//! Every per-particle pass is a wide data-parallel sweep (rayon); passes are
//! strictly ordered inside a sub-step and never share a writable buffer, so
//! the pipeline reads like a sequence of compute dispatches.
//!
//! # Example
//!
//! ```
//! use sph3d::{BoxCollider, ForceModel, Solver, WcSphModel};
//! use glam::{UVec3, Vec3};
//!
//! let mut solver = Solver::new(
//!     ForceModel::WcSph(WcSphModel::default()),
//!     1_000,
//!     UVec3::splat(16),
//! );
//! solver.set_collider(Box::new(BoxCollider::new(Vec3::ZERO, Vec3::splat(2.0))));
//!
//! // Drop a small block of particles
//! for i in 0..4 {
//!     for j in 0..4 {
//!         let spacing = solver.data().target_spacing();
//!         solver.add_particle(
//!             Vec3::new(1.0 + i as f32 * spacing, 1.5, 1.0 + j as f32 * spacing),
//!             Vec3::ZERO,
//!         );
//!     }
//! }
//!
//! solver.advance_frame(1.0 / 60.0);
//! assert_eq!(solver.particle_count(), 16);
//! ```

pub mod constants;
pub mod emitter;
pub mod hash_grid;
pub mod kernels;
pub mod metrics;
pub mod particles;
pub mod sampling;
pub mod solver;
pub mod sort;

pub use emitter::VolumeEmitter;
pub use glam::{UVec3, Vec3};
pub use hash_grid::SpatialHashGrid;
pub use kernels::{Poly6Kernel, SpikyKernel};
pub use metrics::FrameMetrics;
pub use particles::{ParticleSystemData, SphSystemData};
pub use solver::{
    BoxCollider, Collider, ForceModel, PciSphModel, Solver, SolverConfig, SubStepping, WcSphModel,
};
