//! Deterministic generation of evenly distributed unit directions within
//! a vision cone, used to aim obstacle-avoidance sphere casts.

use glam::Vec3;

/// The golden angle in radians, used to space line-of-sight vectors
/// evenly around the cone.
const GOLDEN_ANGLE: f32 = std::f32::consts::PI * (3.0 - 2.236_068);

/// Gets a line-of-sight vector. Index 0 always points straight forward
/// (+Z in the agent's local frame); subsequent indices spiral outwards
/// until the final index reaches the edge of the vision cone, so casting
/// in index order and taking the first clear direction gives a cheap
/// obstacle-avoidance heading.
pub fn line_of_sight_vector(index: u32, max_casts: u32, vision_angle_radians: f32) -> Vec3 {
    let final_z = vision_angle_radians.cos();
    let theta = GOLDEN_ANGLE * index as f32;

    let t = if max_casts > 1 {
        index as f32 / (max_casts - 1) as f32
    } else {
        0.0 // single cast: straight forward
    };
    // Exact at both endpoints: t = 0 gives z = 1, t = 1 gives z = final_z
    let z = (1.0 - t) + final_z * t;
    let radius = (1.0 - z * z).max(0.0).sqrt();

    Vec3::new(theta.cos() * radius, theta.sin() * radius, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn first_vector_is_always_forward() {
        for max_casts in [1, 2, 7, 64] {
            for angle in [0.3, PI / 2.0, PI] {
                let v = line_of_sight_vector(0, max_casts, angle);
                assert_eq!(v, Vec3::Z, "max_casts={max_casts} angle={angle}");
            }
        }
    }

    #[test]
    fn last_vector_reaches_cone_edge() {
        for max_casts in [2, 5, 33] {
            for angle in [0.4f32, 1.2, 2.5] {
                let v = line_of_sight_vector(max_casts - 1, max_casts, angle);
                assert_eq!(v.z, angle.cos(), "max_casts={max_casts} angle={angle}");
            }
        }
    }

    #[test]
    fn vectors_are_unit_length() {
        for index in 0..16 {
            let v = line_of_sight_vector(index, 16, 2.0);
            assert!((v.length() - 1.0).abs() < 1e-5, "index={index}");
        }
    }

    #[test]
    fn consecutive_vectors_diverge() {
        let a = line_of_sight_vector(1, 8, 1.5);
        let b = line_of_sight_vector(2, 8, 1.5);
        assert!(a.dot(b) < 1.0 - 1e-4);
    }
}
