//! Weakly-compressible SPH force model.
//!
//! Pressure comes directly from density through a Tait-style equation of
//! state, so each sub-step is a single density → pressure → force pipeline.
//! The density and viscosity passes are module-level functions so the PCISPH
//! model can delegate to them instead of re-implementing them.

use crate::hash_grid::SpatialHashGrid;
use crate::kernels::{Poly6Kernel, SpikyKernel};
use crate::particles::{ParticleSystemData, SphSystemData};
use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Densities below this are treated as "no neighbors" and skipped instead of
/// divided by.
pub(crate) const DENSITY_EPSILON: f32 = 1e-6;

/// Equation-of-state parameters for weakly-compressible SPH.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WcSphModel {
    eos_exponent: f32,
    negative_pressure_scale: f32,
}

impl Default for WcSphModel {
    fn default() -> Self {
        Self {
            eos_exponent: 7.0,
            negative_pressure_scale: 0.0,
        }
    }
}

impl WcSphModel {
    pub fn eos_exponent(&self) -> f32 {
        self.eos_exponent
    }

    /// Equation-of-state stiffness. Clamped to at least 1.
    pub fn set_eos_exponent(&mut self, eos_exponent: f32) {
        let clamped = eos_exponent.max(1.0);
        if clamped != eos_exponent {
            log::warn!("EOS exponent {} clamped to {}", eos_exponent, clamped);
        }
        self.eos_exponent = clamped;
    }

    pub fn negative_pressure_scale(&self) -> f32 {
        self.negative_pressure_scale
    }

    /// Scale applied to negative (tensile) pressures. Clamped to `[0, 1]`:
    /// 0 keeps the fluid purely repulsive, 1 keeps the raw attractive value.
    pub fn set_negative_pressure_scale(&mut self, scale: f32) {
        let clamped = scale.clamp(0.0, 1.0);
        if clamped != scale {
            log::warn!("negative pressure scale {} clamped to {}", scale, clamped);
        }
        self.negative_pressure_scale = clamped;
    }

    /// Full WCSPH pipeline for one sub-step: density → pressure → pressure
    /// force + viscosity force. The grid must already be built over the
    /// current positions.
    pub(crate) fn accumulate(
        &self,
        data: &mut SphSystemData,
        grid: &SpatialHashGrid,
        speed_of_sound: f32,
        viscosity_coefficient: f32,
    ) {
        update_densities(data, grid);
        self.update_pressures(data, speed_of_sound);
        self.accumulate_pressure_force(data, grid);
        accumulate_viscosity_force(data, grid, viscosity_coefficient);
    }

    /// Evaluate the equation of state over all live particles.
    pub(crate) fn update_pressures(&self, data: &mut SphSystemData, speed_of_sound: f32) {
        let n = data.len();
        let target_density = data.target_density();
        let eos_scale = target_density * speed_of_sound * speed_of_sound;
        let eos_exponent = self.eos_exponent;
        let negative_pressure_scale = self.negative_pressure_scale;

        let ParticleSystemData {
            densities,
            pressures,
            ..
        } = &mut data.particles;
        let densities = &densities[..];
        pressures[..n]
            .par_iter_mut()
            .zip(densities[..n].par_iter())
            .for_each(|(pressure, &density)| {
                *pressure = pressure_from_eos(
                    density,
                    target_density,
                    eos_scale,
                    eos_exponent,
                    negative_pressure_scale,
                );
            });
    }

    fn accumulate_pressure_force(&self, data: &mut SphSystemData, grid: &SpatialHashGrid) {
        let n = data.len();
        let mass_squared = data.mass() * data.mass();
        let kernel = SpikyKernel::new(data.kernel_radius());

        let ParticleSystemData {
            positions,
            forces,
            densities,
            pressures,
            ..
        } = &mut data.particles;
        let positions = &positions[..];
        let densities = &densities[..];
        let pressures = &pressures[..];
        forces[..n].par_iter_mut().enumerate().for_each(|(i, force)| {
            *force += pressure_force_on(
                i,
                positions[i],
                positions,
                densities,
                pressures,
                mass_squared,
                &kernel,
                grid,
            );
        });
    }
}

/// Tait-like equation of state.
///
/// `eos_scale` is `target_density * speed_of_sound²`; dividing by the
/// exponent keeps the stiffness at the reference value for small deviations.
#[inline]
pub(crate) fn pressure_from_eos(
    density: f32,
    target_density: f32,
    eos_scale: f32,
    eos_exponent: f32,
    negative_pressure_scale: f32,
) -> f32 {
    let pressure = eos_scale / eos_exponent * ((density / target_density).powf(eos_exponent) - 1.0);
    if pressure < 0.0 {
        pressure * negative_pressure_scale
    } else {
        pressure
    }
}

/// Poly6 density sum over each particle's neighborhood (self included).
pub(crate) fn update_densities(data: &mut SphSystemData, grid: &SpatialHashGrid) {
    let n = data.len();
    let mass = data.mass();
    let kernel = Poly6Kernel::new(data.kernel_radius());

    let ParticleSystemData {
        positions,
        densities,
        ..
    } = &mut data.particles;
    let positions = &positions[..];
    densities[..n].par_iter_mut().enumerate().for_each(|(i, density)| {
        let origin = positions[i];
        let mut sum = 0.0;
        grid.for_each_nearby(origin, |j| {
            sum += kernel.value(origin.distance(positions[j as usize]));
        });
        *density = mass * sum;
    });
}

/// Symmetric SPH pressure gradient force on particle `i`, evaluated at
/// `origin` with the given attribute views. Shared by WCSPH (accumulating
/// into the force buffer) and PCISPH (writing a dedicated pressure-force
/// buffer each correction pass).
#[allow(clippy::too_many_arguments)]
pub(crate) fn pressure_force_on(
    i: usize,
    origin: Vec3,
    positions: &[Vec3],
    densities: &[f32],
    pressures: &[f32],
    mass_squared: f32,
    kernel: &SpikyKernel,
    grid: &SpatialHashGrid,
) -> Vec3 {
    let radius = kernel.h;
    let density_i = densities[i];
    if density_i < DENSITY_EPSILON {
        // No neighbors: nothing to push against
        return Vec3::ZERO;
    }
    let self_term = pressures[i] / (density_i * density_i);

    let mut force = Vec3::ZERO;
    grid.for_each_nearby(origin, |j| {
        let j = j as usize;
        if j == i {
            return;
        }
        let neighbor = positions[j];
        let distance = origin.distance(neighbor);
        if distance >= radius || distance <= 0.0 {
            return;
        }
        let density_j = densities[j];
        if density_j < DENSITY_EPSILON {
            return;
        }
        let direction = (neighbor - origin) / distance;
        force -= mass_squared
            * (self_term + pressures[j] / (density_j * density_j))
            * kernel.gradient(distance, direction);
    });
    force
}

/// Viscosity force from the Poly6 Laplacian of velocity differences.
pub(crate) fn accumulate_viscosity_force(
    data: &mut SphSystemData,
    grid: &SpatialHashGrid,
    viscosity_coefficient: f32,
) {
    if viscosity_coefficient <= 0.0 {
        return;
    }
    let n = data.len();
    let mass_squared = data.mass() * data.mass();
    let radius = data.kernel_radius();
    let kernel = Poly6Kernel::new(radius);

    let ParticleSystemData {
        positions,
        velocities,
        forces,
        densities,
        ..
    } = &mut data.particles;
    let positions = &positions[..];
    let velocities = &velocities[..];
    let densities = &densities[..];
    forces[..n].par_iter_mut().enumerate().for_each(|(i, force)| {
        let origin = positions[i];
        let velocity = velocities[i];
        let mut sum = Vec3::ZERO;
        grid.for_each_nearby(origin, |j| {
            let j = j as usize;
            if j == i {
                return;
            }
            let distance = origin.distance(positions[j]);
            if distance >= radius {
                return;
            }
            let density_j = densities[j];
            if density_j < DENSITY_EPSILON {
                return;
            }
            sum += (velocities[j] - velocity) / density_j * kernel.second_derivative(distance);
        });
        *force += viscosity_coefficient * mass_squared * sum;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    #[test]
    fn test_eos_zero_at_target_density() {
        let p = pressure_from_eos(1000.0, 1000.0, 1000.0 * 100.0 * 100.0, 7.0, 0.0);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_eos_positive_above_target() {
        for density in [1001.0, 1100.0, 2000.0] {
            let p = pressure_from_eos(density, 1000.0, 1e7, 7.0, 0.0);
            assert!(p > 0.0, "density {} should give positive pressure", density);
        }
    }

    #[test]
    fn test_eos_negative_branch_is_scaled() {
        let raw = pressure_from_eos(900.0, 1000.0, 1e7, 7.0, 1.0);
        assert!(raw < 0.0);
        let scaled = pressure_from_eos(900.0, 1000.0, 1e7, 7.0, 0.25);
        assert!((scaled - 0.25 * raw).abs() < 1e-3 * raw.abs());
        let repulsive_only = pressure_from_eos(900.0, 1000.0, 1e7, 7.0, 0.0);
        assert_eq!(repulsive_only, 0.0);
    }

    #[test]
    fn test_eos_zero_density_is_finite() {
        let p = pressure_from_eos(0.0, 1000.0, 1e7, 7.0, 0.0);
        assert!(p.is_finite());
        assert_eq!(p, 0.0); // raw value is negative, scaled away
    }

    fn build_pair(spacing: f32) -> (SphSystemData, SpatialHashGrid) {
        let mut data = SphSystemData::new(16);
        data.add_particle(Vec3::new(1.0, 1.0, 1.0), Vec3::ZERO);
        data.add_particle(Vec3::new(1.0 + spacing, 1.0, 1.0), Vec3::ZERO);
        let mut grid = SpatialHashGrid::new(UVec3::splat(16), data.kernel_radius(), 16);
        grid.build(data.positions(), data.len());
        (data, grid)
    }

    #[test]
    fn test_two_calibrated_particles_at_rest_spacing_feel_no_pressure() {
        // The calibrated pair is far below the target density, so the EOS
        // clamps pressure to zero on both: the net pressure force vanishes.
        let model = WcSphModel::default();
        let (mut data, grid) = build_pair(0.1);
        assert!((data.target_spacing() - 0.1).abs() < 1e-6);

        model.accumulate(&mut data, &grid, 100.0, 0.0);
        for force in data.forces() {
            assert!(
                force.length() < 1e-4,
                "pressure force should be near zero at rest spacing, got {:?}",
                force
            );
        }
    }

    #[test]
    fn test_pressure_forces_are_equal_and_opposite() {
        // Let the under-dense pair keep its raw negative pressures so the
        // symmetric gradient sum produces a nonzero pair of forces.
        let mut model = WcSphModel::default();
        model.set_negative_pressure_scale(1.0);
        let (mut data, grid) = build_pair(0.05);
        model.accumulate(&mut data, &grid, 100.0, 0.0);
        let forces = data.forces();
        assert!(
            forces[0].length() > 0.0,
            "expected a nonzero pressure force on the pair"
        );
        let net = forces[0] + forces[1];
        assert!(
            net.length() <= 1e-3 * (forces[0].length() + forces[1].length()),
            "momentum leak: {:?} vs {:?}",
            forces[0],
            forces[1]
        );
    }

    #[test]
    fn test_density_includes_self() {
        let mut data = SphSystemData::new(4);
        data.add_particle(Vec3::splat(1.0), Vec3::ZERO);
        let mut grid = SpatialHashGrid::new(UVec3::splat(8), data.kernel_radius(), 4);
        grid.build(data.positions(), 1);
        update_densities(&mut data, &grid);
        let kernel = Poly6Kernel::new(data.kernel_radius());
        let expected = data.mass() * kernel.value(0.0);
        assert!((data.densities()[0] - expected).abs() < 1e-3 * expected);
    }

    #[test]
    fn test_viscosity_damps_relative_motion() {
        // Spacing sits in the outer part of the support, where the Poly6
        // Laplacian is positive and the term acts as diffusion.
        let mut data = SphSystemData::new(4);
        data.add_particle(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        data.add_particle(Vec3::new(1.1, 1.0, 1.0), Vec3::new(-1.0, 0.0, 0.0));
        let mut grid = SpatialHashGrid::new(UVec3::splat(8), data.kernel_radius(), 4);
        grid.build(data.positions(), 2);
        update_densities(&mut data, &grid);
        accumulate_viscosity_force(&mut data, &grid, 0.1);

        let forces = data.forces();
        // Each particle is pulled toward the other's velocity
        assert!(forces[0].x < 0.0, "viscosity should slow particle 0: {:?}", forces[0]);
        assert!(forces[1].x > 0.0, "viscosity should slow particle 1: {:?}", forces[1]);
    }
}
