//! Physical constants and solver tuning defaults.

/// Gravity acceleration (m/s^2) - negative Y direction
pub const GRAVITY: f32 = -9.81;

/// Density of water (kg/m³)
pub const WATER_DENSITY: f32 = 1000.0;

/// Default particle capacity of a solver.
///
/// Per-particle attribute arrays are allocated once at this size;
/// growing past it requires constructing a new solver.
pub const DEFAULT_MAX_PARTICLES: usize = 10_000;

/// Artificial speed of sound (m/s) for the acoustic time-step limit and
/// the WCSPH equation of state. Far below the physical ~1482 m/s: weakly
/// compressible SPH trades acoustic accuracy for larger stable steps.
pub const SPEED_OF_SOUND: f32 = 100.0;

/// Default particle spacing at rest (m).
pub const DEFAULT_TARGET_SPACING: f32 = 0.1;

/// Default kernel radius divided by target spacing.
pub const DEFAULT_RELATIVE_KERNEL_RADIUS: f32 = 1.8;

/// Elements sorted entirely within one task during the bitonic local phase.
/// Must be a power of two; mirrors a GPU work-group size.
pub const BITONIC_BLOCK_SIZE: usize = 512;

/// CFL factor for the speed-based time-step limit: a pressure wave may
/// cross at most this fraction of the kernel radius per sub-step.
pub const TIME_STEP_LIMIT_BY_SPEED_FACTOR: f32 = 0.4;

/// Factor for the force-based time-step limit.
pub const TIME_STEP_LIMIT_BY_FORCE_FACTOR: f32 = 0.25;
