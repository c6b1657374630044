//! Body-centered-cubic point sampling.
//!
//! BCC packing is the reference arrangement for SPH calibration: it is the
//! densest lattice reachable by jitter-free emission, so kernel sums over it
//! bound what a fluid at rest can produce. Both the particle-mass calibration
//! and the PCISPH delta term sample the same cloud (see
//! [`reference_neighborhood`]).

use glam::Vec3;

/// Visit every BCC lattice point inside `[lower, upper]` at the given
/// spacing. Returning `false` from the callback stops the iteration early.
pub fn for_each_bcc_point(
    lower: Vec3,
    upper: Vec3,
    spacing: f32,
    mut f: impl FnMut(Vec3) -> bool,
) {
    assert!(spacing > 0.0, "spacing must be positive, got {}", spacing);
    let half_spacing = spacing / 2.0;
    let extent = upper - lower;
    if extent.x < 0.0 || extent.y < 0.0 || extent.z < 0.0 {
        return;
    }

    // Layers step by half the spacing; odd layers shift by half the spacing
    // in x and y, producing the body-centered offset.
    let mut k = 0;
    loop {
        let z = k as f32 * half_spacing;
        if z > extent.z {
            break;
        }
        let offset = if k % 2 == 1 { half_spacing } else { 0.0 };

        let mut j = 0;
        loop {
            let y = j as f32 * spacing + offset;
            if y > extent.y {
                break;
            }
            let mut i = 0;
            loop {
                let x = i as f32 * spacing + offset;
                if x > extent.x {
                    break;
                }
                if !f(lower + Vec3::new(x, y, z)) {
                    return;
                }
                i += 1;
            }
            j += 1;
        }
        k += 1;
    }
}

/// Collect every BCC lattice point inside `[lower, upper]`.
pub fn bcc_lattice_points(lower: Vec3, upper: Vec3, spacing: f32) -> Vec<Vec3> {
    let mut points = Vec::new();
    for_each_bcc_point(lower, upper, spacing, |p| {
        points.push(p);
        true
    });
    points
}

/// The shared calibration cloud: BCC points packed at `spacing` inside a box
/// of half-extent `1.5 * kernel_radius` around the origin. Large enough that
/// the kernel support of any interior point is fully populated.
pub fn reference_neighborhood(kernel_radius: f32, spacing: f32) -> Vec<Vec3> {
    let half_extent = 1.5 * kernel_radius;
    bcc_lattice_points(Vec3::splat(-half_extent), Vec3::splat(half_extent), spacing)
}
