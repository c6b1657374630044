//! Particle state storage.
//!
//! Particles are not objects: a particle is an index into parallel
//! structure-of-arrays attribute buffers. Every buffer is allocated at the
//! fixed capacity given at construction; the live count only moves within
//! that capacity, so no pass ever reallocates mid-frame.

use crate::constants::{
    DEFAULT_RELATIVE_KERNEL_RADIUS, DEFAULT_TARGET_SPACING, WATER_DENSITY,
};
use crate::kernels::Poly6Kernel;
use crate::sampling::reference_neighborhood;
use glam::Vec3;

/// Structure-of-arrays particle attribute storage.
///
/// All arrays share the same fixed length (the capacity); `len()` tracks the
/// live prefix.
pub struct ParticleSystemData {
    pub(crate) max_particles: usize,
    pub(crate) num_particles: usize,
    pub(crate) positions: Vec<Vec3>,
    pub(crate) velocities: Vec<Vec3>,
    pub(crate) forces: Vec<Vec3>,
    pub(crate) densities: Vec<f32>,
    pub(crate) pressures: Vec<f32>,
}

impl ParticleSystemData {
    pub fn new(max_particles: usize) -> Self {
        assert!(max_particles > 0, "particle capacity must be positive");
        Self {
            max_particles,
            num_particles: 0,
            positions: vec![Vec3::ZERO; max_particles],
            velocities: vec![Vec3::ZERO; max_particles],
            forces: vec![Vec3::ZERO; max_particles],
            densities: vec![0.0; max_particles],
            pressures: vec![0.0; max_particles],
        }
    }

    /// Live particle count.
    pub fn len(&self) -> usize {
        self.num_particles
    }

    pub fn is_empty(&self) -> bool {
        self.num_particles == 0
    }

    /// Fixed capacity set at construction.
    pub fn capacity(&self) -> usize {
        self.max_particles
    }

    /// Append one particle. Returns `false` (and leaves the state untouched)
    /// when the capacity is exhausted.
    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3) -> bool {
        if self.num_particles >= self.max_particles {
            return false;
        }
        let i = self.num_particles;
        self.positions[i] = position;
        self.velocities[i] = velocity;
        self.forces[i] = Vec3::ZERO;
        self.densities[i] = 0.0;
        self.pressures[i] = 0.0;
        self.num_particles += 1;
        true
    }

    /// Append a batch of particles; returns how many fit.
    pub fn add_particles(&mut self, positions: &[Vec3], velocities: &[Vec3]) -> usize {
        debug_assert_eq!(
            positions.len(),
            velocities.len(),
            "position/velocity batches must have equal length"
        );
        let mut added = 0;
        for (&p, &v) in positions.iter().zip(velocities) {
            if !self.add_particle(p, v) {
                break;
            }
            added += 1;
        }
        added
    }

    /// Live positions, read-only (for rendering or export).
    pub fn positions(&self) -> &[Vec3] {
        &self.positions[..self.num_particles]
    }

    /// Live velocities, read-only.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities[..self.num_particles]
    }

    /// Live force accumulators, read-only.
    pub fn forces(&self) -> &[Vec3] {
        &self.forces[..self.num_particles]
    }

    /// Live densities, read-only.
    pub fn densities(&self) -> &[f32] {
        &self.densities[..self.num_particles]
    }

    /// Live pressures, read-only.
    pub fn pressures(&self) -> &[f32] {
        &self.pressures[..self.num_particles]
    }
}

/// Particle storage plus the SPH sizing parameters.
///
/// `mass`, `kernel_radius`, `target_spacing` and `relative_kernel_radius`
/// are mutually derived: changing any of them recomputes the others and
/// re-runs the mass calibration.
pub struct SphSystemData {
    pub(crate) particles: ParticleSystemData,
    target_density: f32,
    target_spacing: f32,
    relative_kernel_radius: f32,
    kernel_radius: f32,
    mass: f32,
}

impl SphSystemData {
    pub fn new(max_particles: usize) -> Self {
        let mut data = Self {
            particles: ParticleSystemData::new(max_particles),
            target_density: WATER_DENSITY,
            target_spacing: DEFAULT_TARGET_SPACING,
            relative_kernel_radius: DEFAULT_RELATIVE_KERNEL_RADIUS,
            kernel_radius: DEFAULT_RELATIVE_KERNEL_RADIUS * DEFAULT_TARGET_SPACING,
            mass: 0.0,
        };
        data.update_mass();
        data
    }

    pub fn target_density(&self) -> f32 {
        self.target_density
    }

    /// Rest density of the fluid (kg/m³). Clamped positive.
    pub fn set_target_density(&mut self, target_density: f32) {
        let clamped = target_density.max(f32::EPSILON);
        if clamped != target_density {
            log::warn!(
                "target density {} clamped to {}",
                target_density,
                clamped
            );
        }
        self.target_density = clamped;
        self.update_mass();
    }

    pub fn target_spacing(&self) -> f32 {
        self.target_spacing
    }

    /// Expected particle spacing at rest (m). Clamped positive; also updates
    /// the kernel radius and the calibrated mass.
    pub fn set_target_spacing(&mut self, target_spacing: f32) {
        let clamped = target_spacing.max(f32::EPSILON);
        if clamped != target_spacing {
            log::warn!(
                "target spacing {} clamped to {}",
                target_spacing,
                clamped
            );
        }
        self.target_spacing = clamped;
        self.kernel_radius = self.relative_kernel_radius * clamped;
        self.update_mass();
    }

    pub fn relative_kernel_radius(&self) -> f32 {
        self.relative_kernel_radius
    }

    /// Kernel radius divided by target spacing. Clamped positive; also
    /// updates the kernel radius and the calibrated mass.
    pub fn set_relative_kernel_radius(&mut self, relative_kernel_radius: f32) {
        let clamped = relative_kernel_radius.max(f32::EPSILON);
        if clamped != relative_kernel_radius {
            log::warn!(
                "relative kernel radius {} clamped to {}",
                relative_kernel_radius,
                clamped
            );
        }
        self.relative_kernel_radius = clamped;
        self.kernel_radius = clamped * self.target_spacing;
        self.update_mass();
    }

    pub fn kernel_radius(&self) -> f32 {
        self.kernel_radius
    }

    /// Kernel support radius (m). Clamped positive; re-derives the target
    /// spacing through the relative kernel radius and recalibrates the mass.
    pub fn set_kernel_radius(&mut self, kernel_radius: f32) {
        let clamped = kernel_radius.max(f32::EPSILON);
        if clamped != kernel_radius {
            log::warn!("kernel radius {} clamped to {}", kernel_radius, clamped);
        }
        self.kernel_radius = clamped;
        self.target_spacing = clamped / self.relative_kernel_radius;
        self.update_mass();
    }

    /// Calibrated per-particle mass, shared by every particle.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Calibrate the shared particle mass so a BCC-packed fluid at the
    /// target spacing peaks exactly at the target density.
    fn update_mass(&mut self) {
        let kernel = Poly6Kernel::new(self.kernel_radius);
        let points = reference_neighborhood(self.kernel_radius, self.target_spacing);

        let mut max_number_density = 0.0f32;
        for &center in &points {
            let mut sum = 0.0;
            for &point in &points {
                sum += kernel.value(center.distance(point));
            }
            max_number_density = max_number_density.max(sum);
        }

        debug_assert!(
            max_number_density > 0.0,
            "reference neighborhood produced no kernel overlap"
        );
        if max_number_density > 0.0 {
            self.mass = self.target_density / max_number_density;
        }
        log::debug!(
            "mass calibrated to {} (kernel radius {}, spacing {})",
            self.mass,
            self.kernel_radius,
            self.target_spacing
        );
    }

    // ========== Delegation to the particle store ==========

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.particles.capacity()
    }

    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3) -> bool {
        self.particles.add_particle(position, velocity)
    }

    pub fn add_particles(&mut self, positions: &[Vec3], velocities: &[Vec3]) -> usize {
        self.particles.add_particles(positions, velocities)
    }

    pub fn positions(&self) -> &[Vec3] {
        self.particles.positions()
    }

    pub fn velocities(&self) -> &[Vec3] {
        self.particles.velocities()
    }

    pub fn forces(&self) -> &[Vec3] {
        self.particles.forces()
    }

    pub fn densities(&self) -> &[f32] {
        self.particles.densities()
    }

    pub fn pressures(&self) -> &[f32] {
        self.particles.pressures()
    }
}
