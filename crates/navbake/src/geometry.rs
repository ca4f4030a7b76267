//! The 2D/3D geometry kernel used by contour, polygon and detail mesh construction.
//!
//! Integer predicates operate on the xz-plane of voxel-space [`IVec3`] vertices.
//! Floating point helpers operate on [`Vec3A`] in tile-local world units.
//! All functions are pure.

use glam::{IVec3, Vec2, Vec3A, Vec3Swizzles as _};

/// Twice the signed area of the triangle `(a, b, c)` on the xz-plane.
///
/// Negative when `c` lies to the left of the directed line `a -> b`.
#[inline]
pub fn area2(a: IVec3, b: IVec3, c: IVec3) -> i32 {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)
}

/// Whether `c` is strictly left of the directed line `a -> b`.
#[inline]
pub fn left(a: IVec3, b: IVec3, c: IVec3) -> bool {
    area2(a, b, c) < 0
}

/// Whether `c` is left of or on the directed line `a -> b`.
#[inline]
pub fn left_on(a: IVec3, b: IVec3, c: IVec3) -> bool {
    area2(a, b, c) <= 0
}

/// Whether the three points are collinear on the xz-plane.
#[inline]
pub fn collinear(a: IVec3, b: IVec3, c: IVec3) -> bool {
    area2(a, b, c) == 0
}

/// Whether the two points share the same xz position.
#[inline]
pub fn xz_equal(a: IVec3, b: IVec3) -> bool {
    a.x == b.x && a.z == b.z
}

/// Whether segments `ab` and `cd` properly intersect, meaning they share a
/// point interior to both. Collinear configurations never count.
pub fn intersect_prop(a: IVec3, b: IVec3, c: IVec3, d: IVec3) -> bool {
    if collinear(a, b, c) || collinear(a, b, d) || collinear(c, d, a) || collinear(c, d, b) {
        return false;
    }
    (left(a, b, c) ^ left(a, b, d)) && (left(c, d, a) ^ left(c, d, b))
}

/// Whether `c` lies on the closed segment `ab`.
pub fn between(a: IVec3, b: IVec3, c: IVec3) -> bool {
    if !collinear(a, b, c) {
        return false;
    }
    // If ab not vertical, check betweenness on x; else on z.
    if a.x != b.x {
        (a.x <= c.x && c.x <= b.x) || (a.x >= c.x && c.x >= b.x)
    } else {
        (a.z <= c.z && c.z <= b.z) || (a.z >= c.z && c.z >= b.z)
    }
}

/// Whether the closed segments `ab` and `cd` intersect.
pub fn intersect(a: IVec3, b: IVec3, c: IVec3, d: IVec3) -> bool {
    intersect_prop(a, b, c, d)
        || between(a, b, c)
        || between(a, b, d)
        || between(c, d, a)
        || between(c, d, b)
}

/// Whether `p` lies inside the cone formed at `vertex` by its ring neighbours
/// `prev` and `next`. Works for both convex and reflex corners.
pub fn in_cone(prev: IVec3, vertex: IVec3, next: IVec3, p: IVec3) -> bool {
    // If the corner is a convex vertex.
    if left_on(prev, vertex, next) {
        return left(vertex, p, prev) && left(p, vertex, next);
    }
    // Assume (i, j) is in the reflex cone otherwise.
    !(left_on(vertex, p, next) && left_on(p, vertex, prev))
}

/// Squared distance from `p` to the segment `ab` on the xz-plane, integer inputs.
pub fn distance_squared_point_segment_xz_i(p: IVec3, a: IVec3, b: IVec3) -> f32 {
    distance_squared_point_segment_2d(
        Vec2::new(p.x as f32, p.z as f32),
        Vec2::new(a.x as f32, a.z as f32),
        Vec2::new(b.x as f32, b.z as f32),
    )
}

/// Squared distance from `p` to the segment `ab` on the xz-plane.
#[inline]
pub fn distance_squared_point_segment_xz(p: Vec3A, a: Vec3A, b: Vec3A) -> f32 {
    distance_squared_point_segment_2d(p.xz(), a.xz(), b.xz())
}

/// Squared distance from `p` to the segment `ab` in 2D.
pub fn distance_squared_point_segment_2d(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let len_squared = ab.length_squared();
    let t = if len_squared > 0.0 {
        (ab.dot(ap) / len_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a + ab * t).distance_squared(p)
}

/// Squared distance from `p` to the segment `ab` in 3D.
pub fn distance_squared_point_segment(p: Vec3A, a: Vec3A, b: Vec3A) -> f32 {
    let ab = b - a;
    let ap = p - a;
    let len_squared = ab.length_squared();
    let t = if len_squared > 0.0 {
        (ab.dot(ap) / len_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a + ab * t).distance_squared(p)
}

/// Twice the signed area of `(p1, p2, p3)` on the xz-plane, floating point.
///
/// Positive when `p3` lies to the left of `p1 -> p2` in the x-right / z-up frame.
#[inline]
pub fn cross_xz(p1: Vec3A, p2: Vec3A, p3: Vec3A) -> f32 {
    let u1 = p2.x - p1.x;
    let v1 = p2.z - p1.z;
    let u2 = p3.x - p1.x;
    let v2 = p3.z - p1.z;
    u1 * v2 - v1 * u2
}

/// A circle on the xz-plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// The center, x and z components.
    pub center: Vec2,
    /// The radius.
    pub radius: f32,
}

/// Computes the circumcircle of `(p1, p2, p3)` on the xz-plane.
/// Returns `None` for (nearly) collinear points.
pub fn circumcircle(p1: Vec3A, p2: Vec3A, p3: Vec3A) -> Option<Circle> {
    const EPS: f32 = 1e-6;
    // Calculate the circle relative to p1, to avoid some precision issues.
    let v1 = Vec2::ZERO;
    let v2 = (p2 - p1).xz();
    let v3 = (p3 - p1).xz();

    let cp = (v2.x - v1.x) * (v3.y - v1.y) - (v2.y - v1.y) * (v3.x - v1.x);
    if cp.abs() <= EPS {
        return None;
    }
    let v1_sq = v1.length_squared();
    let v2_sq = v2.length_squared();
    let v3_sq = v3.length_squared();
    let center = Vec2::new(
        (v1_sq * (v2.y - v3.y) + v2_sq * (v3.y - v1.y) + v3_sq * (v1.y - v2.y)) / (2.0 * cp),
        (v1_sq * (v3.x - v2.x) + v2_sq * (v1.x - v3.x) + v3_sq * (v2.x - v1.x)) / (2.0 * cp),
    );
    let radius = center.distance(v1);
    Some(Circle {
        center: center + p1.xz(),
        radius,
    })
}

/// Whether the segments `ab` and `cd` cross on the xz-plane, floating point.
/// Shared endpoints and collinear touching do not count.
pub fn segments_overlap_xz(a: Vec3A, b: Vec3A, c: Vec3A, d: Vec3A) -> bool {
    let a1 = cross_xz(a, b, d);
    let a2 = cross_xz(a, b, c);
    if a1 * a2 < 0.0 {
        let a3 = cross_xz(c, d, a);
        let a4 = a3 + a2 - a1;
        if a3 * a4 < 0.0 {
            return true;
        }
    }
    false
}

/// Signed squared distance from `p` to the polygon outline on the xz-plane:
/// negative inside, positive outside.
pub fn signed_distance_squared_to_polygon_xz(polygon: &[Vec3A], p: Vec3A) -> f32 {
    let mut dmin = f32::MAX;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let vi = polygon[i];
        let vj = polygon[j];
        if ((vi.z > p.z) != (vj.z > p.z))
            && (p.x < (vj.x - vi.x) * (p.z - vi.z) / (vj.z - vi.z) + vi.x)
        {
            inside = !inside;
        }
        dmin = dmin.min(distance_squared_point_segment_xz(p, vj, vi));
        j = i;
    }
    if inside { -dmin } else { dmin }
}

/// Vertical distance from `p` to the triangle `(a, b, c)` if `p` projects
/// onto it on the xz-plane.
pub fn vertical_distance_to_triangle(p: Vec3A, a: Vec3A, b: Vec3A, c: Vec3A) -> Option<f32> {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.xz().dot(v0.xz());
    let dot01 = v0.xz().dot(v1.xz());
    let dot02 = v0.xz().dot(v2.xz());
    let dot11 = v1.xz().dot(v1.xz());
    let dot12 = v1.xz().dot(v2.xz());

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let inv_denom = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    // If point lies inside the triangle, return interpolated y-coord.
    const EPS: f32 = 1.0e-4;
    if u >= -EPS && v >= -EPS && (u + v) <= 1.0 + EPS {
        let y = a.y + v0.y * u + v1.y * v;
        Some((y - p.y).abs())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::ivec3;

    use super::*;

    #[test]
    fn left_follows_xz_orientation() {
        let a = ivec3(0, 0, 0);
        let b = ivec3(0, 0, 1);
        assert!(left(a, b, ivec3(1, 0, 0)));
        assert!(!left(a, b, ivec3(-1, 0, 0)));
        assert!(left_on(a, b, ivec3(0, 0, 5)));
        assert!(collinear(a, b, ivec3(0, 7, 3)));
    }

    #[test]
    fn crossing_segments_intersect() {
        let a = ivec3(0, 0, 0);
        let b = ivec3(4, 0, 4);
        let c = ivec3(0, 0, 4);
        let d = ivec3(4, 0, 0);
        assert!(intersect_prop(a, b, c, d));
        assert!(intersect(a, b, c, d));
        // Touching at an endpoint is not a proper intersection.
        assert!(!intersect_prop(a, b, b, ivec3(8, 0, 0)));
        assert!(intersect(a, b, b, ivec3(8, 0, 0)));
        assert!(!intersect(a, ivec3(1, 0, 0), ivec3(0, 0, 2), ivec3(1, 0, 2)));
    }

    #[test]
    fn between_checks_collinear_span() {
        let a = ivec3(0, 0, 0);
        let b = ivec3(0, 0, 4);
        assert!(between(a, b, ivec3(0, 0, 2)));
        assert!(!between(a, b, ivec3(0, 0, 6)));
        assert!(!between(a, b, ivec3(1, 0, 2)));
    }

    #[test]
    fn point_segment_distance() {
        let d = distance_squared_point_segment_xz_i(ivec3(1, 0, 1), ivec3(0, 0, 0), ivec3(2, 0, 0));
        assert_relative_eq!(d, 1.0);
        // Clamped to the endpoint.
        let d = distance_squared_point_segment(
            Vec3A::new(3.0, 0.0, 0.0),
            Vec3A::ZERO,
            Vec3A::new(1.0, 0.0, 0.0),
        );
        assert_relative_eq!(d, 4.0);
    }

    #[test]
    fn circumcircle_of_right_triangle() {
        let circle = circumcircle(
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(2.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 2.0),
        )
        .unwrap();
        assert_relative_eq!(circle.center.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(circle.center.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(circle.radius, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert!(
            circumcircle(
                Vec3A::ZERO,
                Vec3A::new(1.0, 0.0, 1.0),
                Vec3A::new(2.0, 0.0, 2.0)
            )
            .is_none()
        );
    }

    #[test]
    fn polygon_distance_sign() {
        let square = [
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 4.0),
            Vec3A::new(4.0, 0.0, 4.0),
            Vec3A::new(4.0, 0.0, 0.0),
        ];
        assert_relative_eq!(
            signed_distance_squared_to_polygon_xz(&square, Vec3A::new(2.0, 0.0, 2.0)),
            -4.0
        );
        assert_relative_eq!(
            signed_distance_squared_to_polygon_xz(&square, Vec3A::new(6.0, 0.0, 2.0)),
            4.0
        );
    }

    #[test]
    fn overlapping_float_segments() {
        assert!(segments_overlap_xz(
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(2.0, 0.0, 2.0),
            Vec3A::new(0.0, 0.0, 2.0),
            Vec3A::new(2.0, 0.0, 0.0),
        ));
        assert!(!segments_overlap_xz(
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(1.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 1.0),
            Vec3A::new(1.0, 0.0, 1.0),
        ));
    }

    #[test]
    fn vertical_distance_inside_triangle_only() {
        let a = Vec3A::new(0.0, 0.0, 0.0);
        let b = Vec3A::new(0.0, 0.0, 2.0);
        let c = Vec3A::new(2.0, 0.0, 0.0);
        let d = vertical_distance_to_triangle(Vec3A::new(0.5, 1.5, 0.5), a, b, c);
        assert_relative_eq!(d.unwrap(), 1.5);
        assert!(vertical_distance_to_triangle(Vec3A::new(5.0, 0.0, 5.0), a, b, c).is_none());
    }
}
