//! A static analytic collision world: the externally supplied query
//! surface the engine casts against. Spheres and infinite planes are
//! enough to give flocks terrain and obstacles to avoid without pulling
//! in a physics engine.

use glam::Vec3;
use murmuration_config::ColliderConfig;
use murmuration_engine::{CollisionFilter, CollisionWorld};

struct Sphere {
    center: Vec3,
    radius: f32,
    filter: CollisionFilter,
}

struct Plane {
    normal: Vec3, // unit length
    offset: f32,
    filter: CollisionFilter,
}

pub struct StaticCollisionWorld {
    spheres: Vec<Sphere>,
    planes: Vec<Plane>,
}

impl StaticCollisionWorld {
    pub fn from_config(config: &ColliderConfig) -> Self {
        Self {
            spheres: config
                .spheres
                .iter()
                .map(|sphere| Sphere {
                    center: sphere.center,
                    radius: sphere.radius,
                    filter: sphere.filter,
                })
                .collect(),
            planes: config
                .planes
                .iter()
                .map(|plane| Plane {
                    normal: plane.normal.normalize(),
                    offset: plane.offset,
                    filter: plane.filter,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty() && self.planes.is_empty()
    }
}

impl CollisionWorld for StaticCollisionWorld {
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        filter: CollisionFilter,
    ) -> Option<f32> {
        if max_distance <= 0.0 {
            return None;
        }

        let mut nearest: Option<f32> = None;
        let mut consider = |hit: Option<f32>| {
            if let Some(distance) = hit {
                if distance <= max_distance && nearest.map_or(true, |best| distance < best) {
                    nearest = Some(distance);
                }
            }
        };

        for sphere in &self.spheres {
            if filter.matches(&sphere.filter) {
                consider(cast_sphere(
                    origin,
                    direction,
                    sphere.center,
                    sphere.radius + radius,
                ));
            }
        }
        for plane in &self.planes {
            if filter.matches(&plane.filter) {
                consider(cast_plane(origin, direction, plane, radius));
            }
        }

        nearest.map(|distance| distance / max_distance)
    }
}

/// Distance along the ray to a sphere inflated by the cast radius.
fn cast_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let offset = origin - center;
    let b = offset.dot(direction);
    let c = offset.length_squared() - radius * radius;

    if c <= 0.0 {
        return Some(0.0); // starting inside
    }
    if b > 0.0 {
        return None; // outside and moving away
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let distance = -b - discriminant.sqrt();
    (distance >= 0.0).then_some(distance)
}

/// Distance along the ray to a plane, offset by the cast radius.
fn cast_plane(origin: Vec3, direction: Vec3, plane: &Plane, radius: f32) -> Option<f32> {
    let clearance = plane.normal.dot(origin) - plane.offset - radius;
    if clearance <= 0.0 {
        return Some(0.0); // already touching or behind the plane
    }

    let approach = plane.normal.dot(direction);
    if approach >= -1e-6 {
        return None; // parallel or moving away
    }

    Some(clearance / -approach)
}
