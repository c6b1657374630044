//! Predictive-corrective incompressible SPH.
//!
//! Instead of a stiff equation of state, pressure is refined iteratively
//! each sub-step until the predicted density error drops below a tolerance.
//! Density and viscosity reuse the WCSPH passes by delegation; only the
//! pressure loop is specific to this model.

use super::wcsph::{self, WcSphModel};
use crate::hash_grid::SpatialHashGrid;
use crate::kernels::{Poly6Kernel, SpikyKernel};
use crate::particles::{ParticleSystemData, SphSystemData};
use crate::sampling::reference_neighborhood;
use crate::solver::Collider;
use glam::Vec3;
use rayon::prelude::*;

/// PCISPH pressure solver state.
///
/// The embedded [`WcSphModel`] carries the equation-of-state fields for
/// hosts that tune them, but the correction loop itself never evaluates the
/// EOS. Scratch buffers live here, not in the particle store: only this
/// model pays for them.
pub struct PciSphModel {
    /// Inherited WCSPH parameter block (EOS exponent, negative pressure
    /// scale); unused by the correction loop.
    pub wcsph: WcSphModel,
    max_density_error_ratio: f32,
    max_number_of_iterations: u32,
    last_number_of_iterations: u32,
    last_max_density_error_ratio: f32,
    temp_positions: Vec<Vec3>,
    temp_velocities: Vec<Vec3>,
    pressure_forces: Vec<Vec3>,
    density_errors: Vec<f32>,
}

impl Default for PciSphModel {
    fn default() -> Self {
        Self {
            wcsph: WcSphModel::default(),
            max_density_error_ratio: 0.01,
            max_number_of_iterations: 5,
            last_number_of_iterations: 0,
            last_max_density_error_ratio: 0.0,
            temp_positions: Vec::new(),
            temp_velocities: Vec::new(),
            pressure_forces: Vec::new(),
            density_errors: Vec::new(),
        }
    }
}

impl PciSphModel {
    pub fn max_density_error_ratio(&self) -> f32 {
        self.max_density_error_ratio
    }

    /// Convergence tolerance on `max |density error| / target density`.
    /// Clamped positive.
    pub fn set_max_density_error_ratio(&mut self, ratio: f32) {
        let clamped = ratio.max(f32::EPSILON);
        if clamped != ratio {
            log::warn!("max density error ratio {} clamped to {}", ratio, clamped);
        }
        self.max_density_error_ratio = clamped;
    }

    pub fn max_number_of_iterations(&self) -> u32 {
        self.max_number_of_iterations
    }

    /// Iteration cap per sub-step. Clamped to at least 1.
    pub fn set_max_number_of_iterations(&mut self, iterations: u32) {
        self.max_number_of_iterations = iterations.max(1);
    }

    /// Correction passes actually run in the last sub-step.
    pub fn last_number_of_iterations(&self) -> u32 {
        self.last_number_of_iterations
    }

    /// Density error ratio left after the last sub-step.
    pub fn last_max_density_error_ratio(&self) -> f32 {
        self.last_max_density_error_ratio
    }

    /// One PCISPH sub-step worth of forces. The grid must already be built
    /// over the current positions; predicted states never touch the real
    /// buffers until the final commit.
    pub(crate) fn accumulate(
        &mut self,
        data: &mut SphSystemData,
        grid: &SpatialHashGrid,
        dt: f32,
        viscosity_coefficient: f32,
        collider: Option<&dyn Collider>,
        restitution: f32,
    ) {
        let n = data.len();
        if n == 0 {
            self.last_number_of_iterations = 0;
            self.last_max_density_error_ratio = 0.0;
            return;
        }

        // Non-pressure SPH state, delegated to the WCSPH passes.
        wcsph::update_densities(data, grid);
        wcsph::accumulate_viscosity_force(data, grid, viscosity_coefficient);

        let mass = data.mass();
        let inv_mass = 1.0 / mass;
        let mass_squared = mass * mass;
        let target_density = data.target_density();
        let radius = data.kernel_radius();
        let poly6 = Poly6Kernel::new(radius);
        let spiky = SpikyKernel::new(radius);
        let delta = compute_delta(radius, data.target_spacing(), mass, target_density, dt);
        let tolerance = self.max_density_error_ratio;
        let max_iterations = self.max_number_of_iterations;

        self.ensure_scratch(data.capacity());
        let temp_positions = &mut self.temp_positions;
        let temp_velocities = &mut self.temp_velocities;
        let pressure_forces = &mut self.pressure_forces;
        let density_errors = &mut self.density_errors;

        // Reset the solver state: pressures restart from zero every sub-step.
        data.particles.pressures[..n]
            .par_iter_mut()
            .for_each(|p| *p = 0.0);
        pressure_forces[..n].par_iter_mut().for_each(|f| *f = Vec3::ZERO);
        density_errors[..n].par_iter_mut().for_each(|e| *e = 0.0);

        let mut iterations = 0;
        let mut max_error_ratio = 0.0f32;
        while iterations < max_iterations {
            iterations += 1;

            // 1. Predict velocities and positions into scratch buffers using
            //    the current (possibly stale) pressure forces.
            {
                let ParticleSystemData {
                    positions,
                    velocities,
                    forces,
                    ..
                } = &data.particles;
                let pressure_forces = &pressure_forces[..];
                temp_positions[..n]
                    .par_iter_mut()
                    .zip(temp_velocities[..n].par_iter_mut())
                    .enumerate()
                    .for_each(|(i, (temp_position, temp_velocity))| {
                        *temp_velocity =
                            velocities[i] + dt * inv_mass * (forces[i] + pressure_forces[i]);
                        *temp_position = positions[i] + dt * *temp_velocity;
                        if let Some(collider) = collider {
                            collider.resolve(restitution, temp_position, temp_velocity);
                        }
                    });
            }

            // 2. Predicted density from predicted positions (neighbor
            //    candidates still come from the sub-step's grid), then the
            //    pressure update. Only positive errors, compression, feed the
            //    correction.
            {
                let ParticleSystemData {
                    positions,
                    pressures,
                    ..
                } = &mut data.particles;
                let positions = &positions[..];
                let temp_positions = &temp_positions[..];
                pressures[..n]
                    .par_iter_mut()
                    .zip(density_errors[..n].par_iter_mut())
                    .enumerate()
                    .for_each(|(i, (pressure, error))| {
                        let mut sum = 0.0;
                        let predicted = temp_positions[i];
                        grid.for_each_nearby(positions[i], |j| {
                            sum += poly6.value(predicted.distance(temp_positions[j as usize]));
                        });
                        let predicted_density = mass * sum;
                        let positive_error = (predicted_density - target_density).max(0.0);
                        *pressure += delta * positive_error;
                        *error = positive_error;
                    });
            }

            // 3. Recompute pressure forces from the updated pressures, over
            //    the committed positions and densities.
            {
                let ParticleSystemData {
                    positions,
                    densities,
                    pressures,
                    ..
                } = &data.particles;
                let positions = &positions[..];
                pressure_forces[..n]
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(i, force)| {
                        *force = wcsph::pressure_force_on(
                            i,
                            positions[i],
                            positions,
                            densities,
                            pressures,
                            mass_squared,
                            &spiky,
                            grid,
                        );
                    });
            }

            // 4. Converged?
            max_error_ratio = density_errors[..n]
                .par_iter()
                .cloned()
                .reduce(|| 0.0, f32::max)
                / target_density;
            if max_error_ratio <= tolerance {
                break;
            }
        }

        if max_error_ratio > tolerance {
            log::debug!(
                "PCISPH hit the iteration cap ({}) at density error ratio {:.4}",
                max_iterations,
                max_error_ratio
            );
        }

        // Commit: fold the converged pressure force into the accumulator.
        {
            let ParticleSystemData { forces, .. } = &mut data.particles;
            forces[..n]
                .par_iter_mut()
                .zip(pressure_forces[..n].par_iter())
                .for_each(|(force, pressure_force)| *force += *pressure_force);
        }

        self.last_number_of_iterations = iterations;
        self.last_max_density_error_ratio = max_error_ratio;
    }

    fn ensure_scratch(&mut self, capacity: usize) {
        if self.temp_positions.len() < capacity {
            self.temp_positions.resize(capacity, Vec3::ZERO);
            self.temp_velocities.resize(capacity, Vec3::ZERO);
            self.pressure_forces.resize(capacity, Vec3::ZERO);
            self.density_errors.resize(capacity, 0.0);
        }
    }
}

/// Pressure-correction gain.
///
/// `beta = 2 (m dt / rho0)^2`; the denominator aggregates the Spiky gradient
/// sums over the reference BCC neighborhood, the same cloud the mass
/// calibration samples.
fn compute_delta(
    kernel_radius: f32,
    target_spacing: f32,
    mass: f32,
    target_density: f32,
    dt: f32,
) -> f32 {
    let beta = 2.0 * (dt * mass / target_density).powi(2);
    if beta <= 0.0 {
        return 0.0;
    }

    let kernel = SpikyKernel::new(kernel_radius);
    let radius_squared = kernel_radius * kernel_radius;
    let mut gradient_sum = Vec3::ZERO;
    let mut dot_sum = 0.0f32;
    for point in reference_neighborhood(kernel_radius, target_spacing) {
        let distance_squared = point.length_squared();
        if distance_squared >= radius_squared || distance_squared <= 0.0 {
            continue;
        }
        let distance = distance_squared.sqrt();
        let gradient = kernel.gradient(distance, point / distance);
        gradient_sum += gradient;
        dot_sum += gradient.dot(gradient);
    }
    let denom = -gradient_sum.dot(gradient_sum) - dot_sum;
    if denom.abs() > 0.0 {
        -1.0 / (beta * denom)
    } else {
        0.0
    }
}
