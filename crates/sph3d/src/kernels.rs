//! 3D SPH smoothing kernels (Poly6 and Spiky) with analytic derivatives.
//!
//! The normalization constants are fixed by the requirement that each kernel
//! integrates to 1 over the ball of radius `h`; changing them breaks density
//! conservation.

use glam::Vec3;
use std::f32::consts::PI;

/// Poly6 kernel: `W(r) = 315/(64π h³) · (1 − r²/h²)³` for `r² < h²`.
///
/// Used for density sums and (via its second derivative) viscosity
/// Laplacians. Powers of `h` are precomputed outside the hot path.
#[derive(Clone, Copy, Debug)]
pub struct Poly6Kernel {
    /// Kernel support radius
    pub h: f32,
    h2: f32,
    h3: f32,
    h5: f32,
}

impl Poly6Kernel {
    pub fn new(kernel_radius: f32) -> Self {
        assert!(
            kernel_radius > 0.0,
            "kernel radius must be positive, got {}",
            kernel_radius
        );
        let h = kernel_radius;
        let h2 = h * h;
        let h3 = h2 * h;
        let h5 = h2 * h3;
        Self { h, h2, h3, h5 }
    }

    #[inline]
    pub fn value(&self, distance: f32) -> f32 {
        let d2 = distance * distance;
        if d2 >= self.h2 {
            return 0.0;
        }
        let x = 1.0 - d2 / self.h2;
        315.0 / (64.0 * PI * self.h3) * x * x * x
    }

    #[inline]
    pub fn first_derivative(&self, distance: f32) -> f32 {
        let d2 = distance * distance;
        if d2 >= self.h2 {
            return 0.0;
        }
        let x = 1.0 - d2 / self.h2;
        -945.0 / (32.0 * PI * self.h5) * distance * x * x
    }

    /// Kernel gradient along `direction` (unit vector from the evaluation
    /// point toward the neighbor). Zero distance yields a zero gradient.
    #[inline]
    pub fn gradient(&self, distance: f32, direction: Vec3) -> Vec3 {
        -self.first_derivative(distance) * direction
    }

    #[inline]
    pub fn second_derivative(&self, distance: f32) -> f32 {
        let d2 = distance * distance;
        if d2 >= self.h2 {
            return 0.0;
        }
        let x = d2 / self.h2;
        945.0 / (32.0 * PI * self.h5) * (1.0 - x) * (5.0 * x - 1.0)
    }
}

/// Spiky kernel: `W(r) = 15/(π h³) · (1 − r/h)³` for `r < h`.
///
/// Its gradient does not vanish at `r → 0`, which keeps pressure forces
/// repulsive between nearly coincident particles; used for all pressure
/// gradient sums.
#[derive(Clone, Copy, Debug)]
pub struct SpikyKernel {
    /// Kernel support radius
    pub h: f32,
    h3: f32,
    h4: f32,
    h5: f32,
}

impl SpikyKernel {
    pub fn new(kernel_radius: f32) -> Self {
        assert!(
            kernel_radius > 0.0,
            "kernel radius must be positive, got {}",
            kernel_radius
        );
        let h = kernel_radius;
        let h2 = h * h;
        let h3 = h2 * h;
        let h4 = h2 * h2;
        let h5 = h4 * h;
        Self { h, h3, h4, h5 }
    }

    #[inline]
    pub fn value(&self, distance: f32) -> f32 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        15.0 / (PI * self.h3) * x * x * x
    }

    #[inline]
    pub fn first_derivative(&self, distance: f32) -> f32 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        -45.0 / (PI * self.h4) * x * x
    }

    /// Kernel gradient along `direction` (unit vector from the evaluation
    /// point toward the neighbor). The first derivative does not vanish at
    /// zero distance; degenerate zero-length directions yield a zero vector.
    #[inline]
    pub fn gradient(&self, distance: f32, direction: Vec3) -> Vec3 {
        -self.first_derivative(distance) * direction
    }

    #[inline]
    pub fn second_derivative(&self, distance: f32) -> f32 {
        if distance >= self.h {
            return 0.0;
        }
        let x = 1.0 - distance / self.h;
        90.0 / (PI * self.h5) * x
    }
}
