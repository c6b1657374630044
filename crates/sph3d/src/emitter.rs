//! Particle emission from a box volume.

use crate::particles::ParticleSystemData;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Emits particles BCC-lattice-packed inside an axis-aligned box.
///
/// Emission respects the particle capacity: once the store is full the
/// emitter stops and remembers nothing was lost silently (`skipped()`).
/// One-shot by default; a continuous emitter re-fills on every update.
pub struct VolumeEmitter {
    lower: Vec3,
    upper: Vec3,
    spacing: f32,
    /// Velocity assigned to every emitted particle.
    pub initial_velocity: Vec3,
    /// Positional jitter as a fraction of the half spacing, in `[0, 1]`.
    pub jitter: f32,
    /// When true (the default) the emitter fires once and goes dormant.
    pub one_shot: bool,
    /// Upper bound on the total number of particles this emitter produces.
    pub max_emitted: usize,
    emitted: usize,
    skipped: usize,
    rng: StdRng,
}

impl VolumeEmitter {
    pub fn new(lower: Vec3, upper: Vec3, spacing: f32) -> Self {
        Self::with_seed(lower, upper, spacing, 0)
    }

    /// Seeded variant for reproducible jitter.
    pub fn with_seed(lower: Vec3, upper: Vec3, spacing: f32, seed: u64) -> Self {
        assert!(spacing > 0.0, "emitter spacing must be positive, got {}", spacing);
        Self {
            lower,
            upper,
            spacing,
            initial_velocity: Vec3::ZERO,
            jitter: 0.0,
            one_shot: true,
            max_emitted: usize::MAX,
            emitted: 0,
            skipped: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Total particles emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Emissions dropped because the particle store was full or the
    /// emitter's own budget ran out.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Emit into `particles`; returns the number of particles added.
    pub fn update(&mut self, particles: &mut ParticleSystemData) -> usize {
        if self.one_shot && self.emitted > 0 {
            return 0;
        }

        let jitter_radius = self.jitter.clamp(0.0, 1.0) * self.spacing * 0.5;
        let mut added = 0;

        let mut points = Vec::new();
        crate::sampling::for_each_bcc_point(self.lower, self.upper, self.spacing, |p| {
            points.push(p);
            true
        });

        for point in points {
            if self.emitted >= self.max_emitted {
                self.skipped += 1;
                continue;
            }
            let position = if jitter_radius > 0.0 {
                point + jitter_radius * random_direction(&mut self.rng)
            } else {
                point
            };
            if particles.add_particle(position, self.initial_velocity) {
                self.emitted += 1;
                added += 1;
            } else {
                self.skipped += 1;
            }
        }

        if self.skipped > 0 && added > 0 {
            log::debug!(
                "emitter dropped {} particles (capacity {} reached)",
                self.skipped,
                particles.capacity()
            );
        }
        added
    }
}

fn random_direction(rng: &mut StdRng) -> Vec3 {
    // Rejection-sample the unit ball, then normalize; uniform over directions
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_emits_once() {
        let mut particles = ParticleSystemData::new(1000);
        let mut emitter = VolumeEmitter::new(Vec3::ZERO, Vec3::splat(0.5), 0.1);
        let first = emitter.update(&mut particles);
        assert!(first > 0);
        assert_eq!(emitter.update(&mut particles), 0);
        assert_eq!(particles.len(), first);
    }

    #[test]
    fn test_capacity_respected() {
        let mut particles = ParticleSystemData::new(4);
        let mut emitter = VolumeEmitter::new(Vec3::ZERO, Vec3::splat(1.0), 0.1);
        let added = emitter.update(&mut particles);
        assert_eq!(added, 4);
        assert_eq!(particles.len(), 4);
        assert!(emitter.skipped() > 0);
    }

    #[test]
    fn test_emission_budget() {
        let mut particles = ParticleSystemData::new(1000);
        let mut emitter = VolumeEmitter::new(Vec3::ZERO, Vec3::splat(1.0), 0.1);
        emitter.max_emitted = 7;
        assert_eq!(emitter.update(&mut particles), 7);
    }

    #[test]
    fn test_jitter_stays_near_lattice() {
        let mut particles = ParticleSystemData::new(1000);
        let spacing = 0.1;
        let mut emitter = VolumeEmitter::with_seed(Vec3::ZERO, Vec3::splat(0.4), spacing, 42);
        emitter.jitter = 1.0;

        let mut reference = ParticleSystemData::new(1000);
        let mut unjittered = VolumeEmitter::new(Vec3::ZERO, Vec3::splat(0.4), spacing);
        unjittered.update(&mut reference);

        emitter.update(&mut particles);
        assert_eq!(particles.len(), reference.len());
        for (&jittered, &exact) in particles.positions().iter().zip(reference.positions()) {
            assert!(
                jittered.distance(exact) <= spacing * 0.5 + 1e-6,
                "jitter moved a particle more than half a spacing"
            );
        }
    }

    #[test]
    fn test_seeded_emission_is_reproducible() {
        let mut a = ParticleSystemData::new(100);
        let mut b = ParticleSystemData::new(100);
        for data in [&mut a, &mut b] {
            let mut emitter = VolumeEmitter::with_seed(Vec3::ZERO, Vec3::splat(0.3), 0.1, 7);
            emitter.jitter = 0.5;
            emitter.update(data);
        }
        assert_eq!(a.positions(), b.positions());
    }
}
