//! Particle-system solver composed from a pressure force model and a
//! sub-stepping policy.
//!
//! There is one solver type; what varies is strategy, not hierarchy:
//! [`ForceModel`] selects how internal forces are produced and
//! [`SubStepping`] selects how a frame is divided. Every sub-step runs the
//! same ordered pipeline:
//!
//! 1. Begin: refresh the emitter and sync the grid spacing
//! 2. Accumulate forces: gravity + drag, then the model's internal forces
//! 3. Semi-implicit Euler integration (velocity first, then position)
//! 4. Collision resolution
//! 5. End-of-step bookkeeping (peak-force tracking)

mod collider;
mod pcisph;
mod wcsph;

pub use collider::{BoxCollider, Collider};
pub use pcisph::PciSphModel;
pub use wcsph::WcSphModel;

use crate::constants::{
    GRAVITY, SPEED_OF_SOUND, TIME_STEP_LIMIT_BY_FORCE_FACTOR, TIME_STEP_LIMIT_BY_SPEED_FACTOR,
};
use crate::emitter::VolumeEmitter;
use crate::hash_grid::SpatialHashGrid;
use crate::particles::{ParticleSystemData, SphSystemData};
use glam::{UVec3, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for the internal (non-gravity) forces.
pub enum ForceModel {
    /// External forces only: gravity and drag.
    None,
    /// Weakly-compressible SPH: pressure from an equation of state.
    WcSph(WcSphModel),
    /// Predictive-corrective incompressible SPH: iterated pressure.
    PciSph(PciSphModel),
}

/// Strategy for dividing a frame into sub-steps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum SubStepping {
    /// Fixed number of equal sub-steps per frame.
    Fixed { count: u32 },
    /// CFL-style adaptive count from the speed and force limits.
    Adaptive,
}

/// Solver-lifetime configuration, mutated only through clamping setters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Gravity acceleration; any vector is legal.
    pub gravity: Vec3,
    drag_coefficient: f32,
    restitution: f32,
    viscosity_coefficient: f32,
    speed_of_sound: f32,
    time_step_limit_scale: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
            drag_coefficient: 1e-4,
            restitution: 0.0,
            viscosity_coefficient: 0.01,
            speed_of_sound: SPEED_OF_SOUND,
            time_step_limit_scale: 1.0,
        }
    }
}

impl SolverConfig {
    pub fn drag_coefficient(&self) -> f32 {
        self.drag_coefficient
    }

    /// Linear air-drag coefficient. Clamped to `>= 0`.
    pub fn set_drag_coefficient(&mut self, drag_coefficient: f32) {
        let clamped = drag_coefficient.max(0.0);
        if clamped != drag_coefficient {
            log::warn!("drag coefficient {} clamped to {}", drag_coefficient, clamped);
        }
        self.drag_coefficient = clamped;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Collision bounciness. Clamped to `[0, 1]`.
    pub fn set_restitution(&mut self, restitution: f32) {
        let clamped = restitution.clamp(0.0, 1.0);
        if clamped != restitution {
            log::warn!("restitution {} clamped to {}", restitution, clamped);
        }
        self.restitution = clamped;
    }

    pub fn viscosity_coefficient(&self) -> f32 {
        self.viscosity_coefficient
    }

    /// Viscosity strength. Clamped to `>= 0`.
    pub fn set_viscosity_coefficient(&mut self, viscosity_coefficient: f32) {
        let clamped = viscosity_coefficient.max(0.0);
        if clamped != viscosity_coefficient {
            log::warn!(
                "viscosity coefficient {} clamped to {}",
                viscosity_coefficient,
                clamped
            );
        }
        self.viscosity_coefficient = clamped;
    }

    pub fn speed_of_sound(&self) -> f32 {
        self.speed_of_sound
    }

    /// Artificial speed of sound. Clamped positive.
    pub fn set_speed_of_sound(&mut self, speed_of_sound: f32) {
        let clamped = speed_of_sound.max(f32::EPSILON);
        if clamped != speed_of_sound {
            log::warn!("speed of sound {} clamped to {}", speed_of_sound, clamped);
        }
        self.speed_of_sound = clamped;
    }

    pub fn time_step_limit_scale(&self) -> f32 {
        self.time_step_limit_scale
    }

    /// Multiplier on the adaptive time-step bound. Clamped positive.
    pub fn set_time_step_limit_scale(&mut self, scale: f32) {
        let clamped = scale.max(f32::EPSILON);
        if clamped != scale {
            log::warn!("time step limit scale {} clamped to {}", scale, clamped);
        }
        self.time_step_limit_scale = clamped;
    }
}

/// The particle-system solver.
pub struct Solver {
    data: SphSystemData,
    grid: SpatialHashGrid,
    model: ForceModel,
    sub_stepping: SubStepping,
    config: SolverConfig,
    collider: Option<Box<dyn Collider>>,
    emitter: Option<VolumeEmitter>,
    /// Largest per-particle force magnitude seen in the previous sub-step;
    /// feeds the force-based adaptive time-step bound.
    peak_force: f32,
    initialized: bool,
    frame: u32,
}

impl Solver {
    /// Create a solver with `max_particles` capacity over a neighbor grid of
    /// the given cell resolution. The SPH models default to adaptive
    /// sub-stepping; the plain particle system defaults to one fixed step.
    pub fn new(model: ForceModel, max_particles: usize, grid_resolution: UVec3) -> Self {
        let data = SphSystemData::new(max_particles);
        let grid = SpatialHashGrid::new(grid_resolution, data.kernel_radius(), max_particles);
        let sub_stepping = match model {
            ForceModel::None => SubStepping::Fixed { count: 1 },
            _ => SubStepping::Adaptive,
        };
        Self {
            data,
            grid,
            model,
            sub_stepping,
            config: SolverConfig::default(),
            collider: None,
            emitter: None,
            peak_force: 0.0,
            initialized: false,
            frame: 0,
        }
    }

    // ========== Configuration ==========

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    pub fn sub_stepping(&self) -> SubStepping {
        self.sub_stepping
    }

    pub fn set_sub_stepping(&mut self, sub_stepping: SubStepping) {
        self.sub_stepping = sub_stepping;
    }

    pub fn force_model(&self) -> &ForceModel {
        &self.model
    }

    pub fn force_model_mut(&mut self) -> &mut ForceModel {
        &mut self.model
    }

    pub fn set_collider(&mut self, collider: Box<dyn Collider>) {
        self.collider = Some(collider);
    }

    pub fn set_emitter(&mut self, emitter: VolumeEmitter) {
        self.emitter = Some(emitter);
    }

    // ========== Particle state access ==========

    pub fn data(&self) -> &SphSystemData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SphSystemData {
        &mut self.data
    }

    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3) -> bool {
        self.data.add_particle(position, velocity)
    }

    pub fn particle_count(&self) -> usize {
        self.data.len()
    }

    pub fn grid(&self) -> &SpatialHashGrid {
        &self.grid
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    // ========== Stepping ==========

    /// Establish initial conditions at t = 0: the emitter and collider state
    /// must be current before the first step. Called lazily by the stepping
    /// entry points when the host did not call it.
    pub fn initialize(&mut self) {
        if let Some(emitter) = &mut self.emitter {
            emitter.update(&mut self.data.particles);
        }
        self.peak_force = self.data.mass() * self.config.gravity.length();
        self.initialized = true;
        log::info!(
            "solver initialized: {} particles, mass {:.4} kg, kernel radius {:.3} m",
            self.data.len(),
            self.data.mass(),
            self.data.kernel_radius()
        );
    }

    /// Advance one frame, splitting it into sub-steps per the policy.
    pub fn advance_frame(&mut self, dt: f32) {
        debug_assert!(dt.is_finite() && dt >= 0.0, "invalid frame time: {}", dt);
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        if !self.initialized {
            self.initialize();
        }
        let steps = self.number_of_sub_time_steps(dt);
        let sub_dt = dt / steps as f32;
        for _ in 0..steps {
            self.advance_time_step(sub_dt);
        }
        self.frame += 1;
    }

    /// Sub-steps the policy wants for a frame of length `dt`.
    ///
    /// The adaptive bound combines an acoustic CFL limit (a pressure wave
    /// may cross only a fraction of the kernel radius per step) with a
    /// force limit. The force magnitude is the tracked per-particle peak
    /// from the previous sub-step, floored at the gravity force, rather
    /// than gravity alone: stiff compressions tighten the bound.
    pub fn number_of_sub_time_steps(&self, dt: f32) -> u32 {
        match self.sub_stepping {
            SubStepping::Fixed { count } => count.max(1),
            SubStepping::Adaptive => {
                let kernel_radius = self.data.kernel_radius();
                let mass = self.data.mass();
                let gravity_force = mass * self.config.gravity.length();
                let max_force = self.peak_force.max(gravity_force).max(f32::EPSILON);

                let limit_by_speed =
                    TIME_STEP_LIMIT_BY_SPEED_FACTOR * kernel_radius / self.config.speed_of_sound;
                let limit_by_force =
                    TIME_STEP_LIMIT_BY_FORCE_FACTOR * (kernel_radius * mass / max_force).sqrt();
                let desired = self.config.time_step_limit_scale * limit_by_speed.min(limit_by_force);
                if desired <= 0.0 || !desired.is_finite() {
                    return 1;
                }
                (dt / desired).ceil().max(1.0) as u32
            }
        }
    }

    /// Advance exactly one sub-step. Hosts driving their own sub-step loop
    /// call this once per sub-step.
    pub fn advance_time_step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        if !self.initialized {
            self.initialize();
        }
        self.begin_time_step();
        self.accumulate_forces(dt);
        self.time_integration(dt);
        self.resolve_collision();
        self.end_time_step();
    }

    fn begin_time_step(&mut self) {
        if let Some(emitter) = &mut self.emitter {
            emitter.update(&mut self.data.particles);
        }
        // One ring of cells must cover the kernel support
        self.grid.set_grid_spacing(self.data.kernel_radius());
    }

    fn accumulate_forces(&mut self, dt: f32) {
        let n = self.data.len();
        if n == 0 {
            return;
        }

        // External forces: gravity is mandatory, drag layers on top.
        let mass = self.data.mass();
        let gravity = self.config.gravity;
        let drag_coefficient = self.config.drag_coefficient;
        {
            let ParticleSystemData {
                velocities, forces, ..
            } = &mut self.data.particles;
            let velocities = &velocities[..];
            forces[..n]
                .par_iter_mut()
                .zip(velocities[..n].par_iter())
                .for_each(|(force, velocity)| {
                    *force = mass * gravity - drag_coefficient * *velocity;
                });
        }

        match &mut self.model {
            ForceModel::None => {}
            ForceModel::WcSph(model) => {
                self.grid.build(&self.data.particles.positions, n);
                model.accumulate(
                    &mut self.data,
                    &self.grid,
                    self.config.speed_of_sound,
                    self.config.viscosity_coefficient,
                );
            }
            ForceModel::PciSph(model) => {
                self.grid.build(&self.data.particles.positions, n);
                model.accumulate(
                    &mut self.data,
                    &self.grid,
                    dt,
                    self.config.viscosity_coefficient,
                    self.collider.as_deref(),
                    self.config.restitution,
                );
            }
        }
    }

    fn time_integration(&mut self, dt: f32) {
        let n = self.data.len();
        let inv_mass = 1.0 / self.data.mass();
        let ParticleSystemData {
            positions,
            velocities,
            forces,
            ..
        } = &mut self.data.particles;
        let forces = &forces[..];
        positions[..n]
            .par_iter_mut()
            .zip(velocities[..n].par_iter_mut())
            .zip(forces[..n].par_iter())
            .for_each(|((position, velocity), force)| {
                // Symplectic order: velocity first, then position from the
                // new velocity.
                *velocity += dt * inv_mass * *force;
                *position += dt * *velocity;
            });
    }

    fn resolve_collision(&mut self) {
        let Some(collider) = self.collider.as_deref() else {
            return;
        };
        let n = self.data.len();
        let restitution = self.config.restitution;
        let ParticleSystemData {
            positions,
            velocities,
            ..
        } = &mut self.data.particles;
        positions[..n]
            .par_iter_mut()
            .zip(velocities[..n].par_iter_mut())
            .for_each(|(position, velocity)| {
                collider.resolve(restitution, position, velocity);
            });
    }

    fn end_time_step(&mut self) {
        let n = self.data.len();
        self.peak_force = self.data.particles.forces[..n]
            .par_iter()
            .map(|force| force.length())
            .reduce(|| 0.0, f32::max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_solver() -> Solver {
        Solver::new(ForceModel::None, 64, UVec3::splat(8))
    }

    #[test]
    fn test_config_clamps() {
        let mut solver = plain_solver();
        solver.config_mut().set_restitution(1.7);
        assert_eq!(solver.config().restitution(), 1.0);
        solver.config_mut().set_restitution(-0.3);
        assert_eq!(solver.config().restitution(), 0.0);
        solver.config_mut().set_drag_coefficient(-1.0);
        assert_eq!(solver.config().drag_coefficient(), 0.0);
        solver.config_mut().set_viscosity_coefficient(-2.0);
        assert_eq!(solver.config().viscosity_coefficient(), 0.0);
        solver.config_mut().set_speed_of_sound(0.0);
        assert!(solver.config().speed_of_sound() > 0.0);
    }

    #[test]
    fn test_fixed_sub_stepping_count() {
        let mut solver = plain_solver();
        solver.set_sub_stepping(SubStepping::Fixed { count: 4 });
        assert_eq!(solver.number_of_sub_time_steps(1.0 / 60.0), 4);
        solver.set_sub_stepping(SubStepping::Fixed { count: 0 });
        assert_eq!(solver.number_of_sub_time_steps(1.0 / 60.0), 1);
    }

    #[test]
    fn test_adaptive_sub_stepping_is_positive_and_monotone() {
        let mut solver = plain_solver();
        solver.set_sub_stepping(SubStepping::Adaptive);
        let short = solver.number_of_sub_time_steps(1.0 / 240.0);
        let long = solver.number_of_sub_time_steps(1.0 / 30.0);
        assert!(short >= 1);
        assert!(long >= short, "longer frames need at least as many sub-steps");
    }

    #[test]
    fn test_sph_models_default_to_adaptive() {
        let solver = Solver::new(
            ForceModel::WcSph(WcSphModel::default()),
            64,
            UVec3::splat(8),
        );
        assert!(matches!(solver.sub_stepping(), SubStepping::Adaptive));
        let solver = plain_solver();
        assert!(matches!(solver.sub_stepping(), SubStepping::Fixed { .. }));
    }

    #[test]
    fn test_zero_dt_is_ignored() {
        let mut solver = plain_solver();
        solver.add_particle(Vec3::splat(0.5), Vec3::ZERO);
        solver.initialize();
        let before = solver.data().positions()[0];
        solver.advance_frame(0.0);
        assert_eq!(solver.data().positions()[0], before);
        assert_eq!(solver.frame(), 0);
    }

    #[test]
    fn test_empty_solver_steps_without_panicking() {
        let mut solver = Solver::new(
            ForceModel::WcSph(WcSphModel::default()),
            64,
            UVec3::splat(8),
        );
        solver.advance_frame(1.0 / 60.0);
        assert_eq!(solver.particle_count(), 0);
    }

    #[test]
    fn test_peak_force_tracks_gravity_at_rest() {
        let mut solver = plain_solver();
        solver.config_mut().set_drag_coefficient(0.0);
        solver.add_particle(Vec3::splat(0.5), Vec3::ZERO);
        solver.advance_frame(1.0 / 60.0);
        let expected = solver.data().mass() * solver.config().gravity.length();
        assert!((solver.peak_force - expected).abs() < 1e-3 * expected);
    }
}
