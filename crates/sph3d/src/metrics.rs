//! Diagnostic metrics for one simulation frame.

use crate::particles::SphSystemData;

/// Read-only statistics over the current particle state.
///
/// Cheap enough to compute every frame, but intended for periodic
/// diagnostics (density drift, collapse detection) rather than control flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameMetrics {
    pub particle_count: usize,
    /// Average |density − target| / target
    pub avg_density_error: f32,
    /// Largest |density − target| / target
    pub max_density_error: f32,
    pub max_density: f32,
    pub min_density: f32,
    pub avg_pressure: f32,
    pub max_pressure: f32,
    /// Y position diagnostics (to detect collapse)
    pub min_y: f32,
    pub max_y: f32,
    pub avg_y: f32,
    /// Y spread = max_y - min_y
    pub y_spread: f32,
}

impl FrameMetrics {
    pub fn compute(data: &SphSystemData) -> Self {
        let n = data.len();
        if n == 0 {
            return Self::default();
        }

        let target = data.target_density();
        let mut avg_density_error = 0.0f32;
        let mut max_density_error = 0.0f32;
        let mut max_density = f32::MIN;
        let mut min_density = f32::MAX;
        for &rho in data.densities() {
            let error = (rho - target).abs() / target;
            avg_density_error += error;
            max_density_error = max_density_error.max(error);
            max_density = max_density.max(rho);
            min_density = min_density.min(rho);
        }
        avg_density_error /= n as f32;

        let mut avg_pressure = 0.0f32;
        let mut max_pressure = f32::MIN;
        for &p in data.pressures() {
            avg_pressure += p;
            max_pressure = max_pressure.max(p);
        }
        avg_pressure /= n as f32;

        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;
        let mut avg_y = 0.0f32;
        for p in data.positions() {
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
            avg_y += p.y;
        }
        avg_y /= n as f32;

        Self {
            particle_count: n,
            avg_density_error,
            max_density_error,
            max_density,
            min_density,
            avg_pressure,
            max_pressure,
            min_y,
            max_y,
            avg_y,
            y_spread: max_y - min_y,
        }
    }
}
