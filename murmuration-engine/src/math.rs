//! Small vector helpers shared by the behaviour and physics code. All
//! normalization goes through `normalize_or_zero` so degenerate inputs
//! produce zero vectors instead of NaNs.

use glam::{Mat3, Quat, Vec3};

/// Clamps a vector below a maximum magnitude.
pub fn clamp_magnitude(vector: Vec3, max: f32) -> Vec3 {
    let magnitude = vector.length();
    if magnitude > max {
        vector * (max / magnitude)
    } else {
        vector
    }
}

/// Clamps a vector between a minimum and maximum magnitude. A zero
/// vector is returned unchanged; there is no direction to scale up.
pub fn clamp_magnitude_between(vector: Vec3, min: f32, max: f32) -> Vec3 {
    let magnitude = vector.length();
    if magnitude > max {
        vector * (max / magnitude)
    } else if magnitude < min && magnitude > 0.0 {
        vector * (min / magnitude)
    } else {
        vector
    }
}

/// Pursuit-style steering force: the correction that turns `velocity`
/// towards `vector` at full speed, capped by the acceleration limit.
pub fn steer_towards(velocity: Vec3, vector: Vec3, max_speed: f32, acceleration: f32) -> Vec3 {
    clamp_magnitude(vector.normalize_or_zero() * max_speed - velocity, acceleration)
}

/// Orientation looking along `forward` with the given `up` hint.
/// Returns identity when `forward` is degenerate.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let mut right = up.cross(forward);
    if right.length_squared() < 1e-12 {
        // forward is parallel to the up hint; pick any perpendicular axis
        right = Vec3::Y.cross(forward);
        if right.length_squared() < 1e-12 {
            right = Vec3::X.cross(forward);
        }
    }
    let right = right.normalize();
    let up = forward.cross(right);

    Quat::from_mat3(&Mat3::from_cols(right, up, forward))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn clamp_magnitude_caps_length() {
        let v = Vec3::new(3.0, 4.0, 0.0); // length 5
        let clamped = clamp_magnitude(v, 2.0);
        assert!((clamped.length() - 2.0).abs() < EPS);
        // Direction preserved
        assert!(clamped.normalize().dot(v.normalize()) > 1.0 - EPS);
    }

    #[test]
    fn clamp_magnitude_is_identity_under_max() {
        let v = Vec3::new(1.0, 1.0, 0.5);
        assert_eq!(clamp_magnitude(v, 10.0), v);
        assert_eq!(clamp_magnitude(Vec3::ZERO, 10.0), Vec3::ZERO);
    }

    #[test]
    fn clamp_between_raises_short_vectors() {
        let v = Vec3::new(0.1, 0.0, 0.0);
        let clamped = clamp_magnitude_between(v, 1.0, 5.0);
        assert!((clamped.length() - 1.0).abs() < EPS);

        let v = Vec3::new(0.0, 12.0, 0.0);
        let clamped = clamp_magnitude_between(v, 1.0, 5.0);
        assert!((clamped.length() - 5.0).abs() < EPS);

        // Zero stays zero rather than exploding to min
        assert_eq!(clamp_magnitude_between(Vec3::ZERO, 1.0, 5.0), Vec3::ZERO);
    }

    #[test]
    fn steer_is_bounded_by_acceleration() {
        let steer = steer_towards(Vec3::new(0.0, 0.0, 5.0), Vec3::new(100.0, 0.0, 0.0), 5.0, 2.0);
        assert!(steer.length() <= 2.0 + EPS);
        // Steering a zero target produces the braking correction, still bounded
        let steer = steer_towards(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 5.0, 2.0);
        assert!(steer.length() <= 2.0 + EPS);
    }

    #[test]
    fn look_rotation_faces_forward() {
        let rotation = look_rotation(Vec3::new(1.0, 0.0, 0.0), Vec3::Y);
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::X).length() < EPS);

        // Degenerate forward falls back to identity
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::Y), Quat::IDENTITY);

        // Forward parallel to up still yields a valid rotation
        let rotation = look_rotation(Vec3::Y, Vec3::Y);
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::Y).length() < EPS);
    }
}
