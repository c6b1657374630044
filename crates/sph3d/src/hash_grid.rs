//! Uniform-grid neighbor index rebuilt from scratch every step.
//!
//! `build` runs three ordered parallel passes over the particle index space:
//! hash fill, bitonic sort, range build. The output is a pair of tables
//! giving, for every flattened grid cell, the half-open range of the sorted
//! (hash, index) array holding that cell's particles. All tables are
//! read-only between builds, so later passes can query them from any lane.

use crate::sort::{padded_len, sort_pairs, HashIndexPair, SENTINEL};
use glam::{UVec3, Vec3};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Marker for an unoccupied cell: `start == end == EMPTY`.
pub const EMPTY: u32 = u32::MAX;

/// Spatial hash grid over a fixed cell resolution.
///
/// Storage is allocated once at construction for `max_particles`; the
/// contents are fully overwritten by every [`SpatialHashGrid::build`] call.
pub struct SpatialHashGrid {
    resolution: UVec3,
    grid_spacing: f32,
    /// Per-cell range starts into `pairs`; written by exactly one lane each
    /// during the range-build pass.
    start_index: Box<[AtomicU32]>,
    end_index: Box<[AtomicU32]>,
    /// (hash, particle index) pairs, power-of-two padded with sentinels.
    pairs: Vec<HashIndexPair>,
    max_particles: usize,
    num_particles: usize,
}

impl SpatialHashGrid {
    /// Create a grid of `resolution.x * y * z` cells.
    ///
    /// `grid_spacing` should match the kernel support radius so a 3×3×3 cell
    /// scan covers every neighbor candidate.
    pub fn new(resolution: UVec3, grid_spacing: f32, max_particles: usize) -> Self {
        assert!(
            resolution.x > 0 && resolution.y > 0 && resolution.z > 0,
            "grid resolution must be positive on every axis, got {:?}",
            resolution
        );
        assert!(
            grid_spacing > 0.0,
            "grid spacing must be positive, got {}",
            grid_spacing
        );
        let cells = resolution.x as usize * resolution.y as usize * resolution.z as usize;
        Self {
            resolution,
            grid_spacing,
            start_index: (0..cells).map(|_| AtomicU32::new(EMPTY)).collect(),
            end_index: (0..cells).map(|_| AtomicU32::new(EMPTY)).collect(),
            pairs: vec![SENTINEL; padded_len(max_particles)],
            max_particles,
            num_particles: 0,
        }
    }

    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    pub fn grid_spacing(&self) -> f32 {
        self.grid_spacing
    }

    /// Update the cell size without reallocating. Values are clamped to be
    /// positive; takes effect at the next build.
    pub fn set_grid_spacing(&mut self, grid_spacing: f32) {
        self.grid_spacing = grid_spacing.max(f32::EPSILON);
    }

    pub fn num_cells(&self) -> usize {
        self.start_index.len()
    }

    /// Flattened cell index of a world position. Cell coordinates wrap
    /// (Euclidean modulo) into the resolution, so positions outside the
    /// nominal domain still hash without branching.
    #[inline]
    pub fn cell_index(&self, position: Vec3) -> u32 {
        hash_position(self.resolution, 1.0 / self.grid_spacing, position)
    }

    #[inline]
    fn flatten(&self, x: u32, y: u32, z: u32) -> u32 {
        flatten(self.resolution, x, y, z)
    }

    /// Rebuild the index over the first `count` entries of `positions`.
    ///
    /// Precondition: `count <= max_particles` (the capacity given at
    /// construction); violating it is a caller contract error and panics.
    /// Zero live particles leaves every range empty.
    pub fn build(&mut self, positions: &[Vec3], count: usize) {
        assert!(
            count <= self.max_particles,
            "particle count {} exceeds grid capacity {}",
            count,
            self.max_particles
        );
        assert!(
            count <= positions.len(),
            "particle count {} exceeds position buffer length {}",
            count,
            positions.len()
        );
        self.num_particles = count;

        // Reset pass: every cell range back to the empty sentinel.
        self.start_index
            .par_iter()
            .zip(self.end_index.par_iter())
            .for_each(|(start, end)| {
                start.store(EMPTY, Ordering::Relaxed);
                end.store(EMPTY, Ordering::Relaxed);
            });

        // Fill pass: hash live particles, sentinel-pad the rest so the
        // padding sorts to the end.
        let resolution = self.resolution;
        let inv_spacing = 1.0 / self.grid_spacing;
        self.pairs.par_iter_mut().enumerate().for_each(|(i, pair)| {
            *pair = if i < count {
                HashIndexPair {
                    hash: hash_position(resolution, inv_spacing, positions[i]),
                    index: i as u32,
                }
            } else {
                SENTINEL
            };
        });

        // Sort pass: order pairs by cell hash.
        sort_pairs(&mut self.pairs);

        // Range-build pass: each sorted slot compares itself with its left
        // neighbor; run boundaries are unique, so every table entry has
        // exactly one writer.
        let pairs = &self.pairs;
        let start_index = &self.start_index;
        let end_index = &self.end_index;
        (0..count).into_par_iter().for_each(|i| {
            let hash = pairs[i].hash;
            if i == 0 || pairs[i - 1].hash != hash {
                start_index[hash as usize].store(i as u32, Ordering::Relaxed);
            }
            if i + 1 == count || pairs[i + 1].hash != hash {
                end_index[hash as usize].store(i as u32 + 1, Ordering::Relaxed);
            }
        });
    }

    /// Number of live particles covered by the last build.
    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    /// Sorted (hash, index) pairs of the last build, live prefix only.
    pub fn sorted_pairs(&self) -> &[HashIndexPair] {
        &self.pairs[..self.num_particles]
    }

    /// Half-open range of sorted slots for one flattened cell.
    pub fn cell_range(&self, cell: u32) -> (u32, u32) {
        let start = self.start_index[cell as usize].load(Ordering::Relaxed);
        if start == EMPTY {
            return (EMPTY, EMPTY);
        }
        (start, self.end_index[cell as usize].load(Ordering::Relaxed))
    }

    /// Number of particles hashed to one flattened cell.
    pub fn particle_count_in(&self, cell: u32) -> usize {
        let (start, end) = self.cell_range(cell);
        if start == EMPTY {
            0
        } else {
            (end - start) as usize
        }
    }

    /// Invoke `f` with the index of every particle in the 3×3×3 cell block
    /// around `origin`. Candidates are not distance-filtered; callers test
    /// squared distance against their own radius.
    pub fn for_each_nearby(&self, origin: Vec3, mut f: impl FnMut(u32)) {
        let inv = 1.0 / self.grid_spacing;
        let cx = (origin.x * inv).floor() as i64;
        let cy = (origin.y * inv).floor() as i64;
        let cz = (origin.z * inv).floor() as i64;

        // Wrapping can alias neighbor cells at tiny resolutions; dedup the
        // candidate list so no particle is visited twice.
        let mut cells = [0u32; 27];
        let mut n_cells = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let x = (cx + dx).rem_euclid(self.resolution.x as i64) as u32;
                    let y = (cy + dy).rem_euclid(self.resolution.y as i64) as u32;
                    let z = (cz + dz).rem_euclid(self.resolution.z as i64) as u32;
                    cells[n_cells] = self.flatten(x, y, z);
                    n_cells += 1;
                }
            }
        }
        let cells = &mut cells[..n_cells];
        cells.sort_unstable();

        let mut previous = u32::MAX;
        for &cell in cells.iter() {
            if cell == previous {
                continue;
            }
            previous = cell;
            let (start, end) = self.cell_range(cell);
            if start == EMPTY {
                continue;
            }
            for slot in start..end {
                f(self.pairs[slot as usize].index);
            }
        }
    }
}

#[inline]
fn flatten(resolution: UVec3, x: u32, y: u32, z: u32) -> u32 {
    (z * resolution.y + y) * resolution.x + x
}

#[inline]
fn hash_position(resolution: UVec3, inv_spacing: f32, position: Vec3) -> u32 {
    let x = (position.x * inv_spacing).floor() as i64;
    let y = (position.y * inv_spacing).floor() as i64;
    let z = (position.z * inv_spacing).floor() as i64;
    flatten(
        resolution,
        x.rem_euclid(resolution.x as i64) as u32,
        y.rem_euclid(resolution.y as i64) as u32,
        z.rem_euclid(resolution.z as i64) as u32,
    )
}
