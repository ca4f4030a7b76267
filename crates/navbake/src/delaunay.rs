//! Triangulation of the sample points of a single detail polygon.
//!
//! [`triangulate_hull`] fans the outline of the polygon, [`delaunay_hull`] completes a Delaunay
//! triangulation of the outline plus interior samples.

use glam::{Vec3A, Vec3Swizzles as _};

use crate::{
    geometry::{Circle, circumcircle, cross_xz, segments_overlap_xz},
    math::{next, prev},
};

/// The side of an edge that is not covered by a triangle yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Undefined,
    Hull,
    Triangle(usize),
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    s: usize,
    t: usize,
    left: Face,
    right: Face,
}

impl Edge {
    fn update_left_face(&mut self, s: usize, t: usize, face: Face) {
        if self.s == s && self.t == t && self.left == Face::Undefined {
            self.left = face;
        } else if self.t == s && self.s == t && self.right == Face::Undefined {
            self.right = face;
        }
    }
}

/// Triangulates the convex outline `hull` by fanning out from the ear with the shortest perimeter.
///
/// Only the first `original_count` points are real polygon corners; the rest are edge samples
/// and never start a fan.
pub(crate) fn triangulate_hull(
    points: &[Vec3A],
    hull: &[usize],
    original_count: usize,
    triangles: &mut Vec<[usize; 3]>,
) {
    let n = hull.len();
    if n < 3 {
        return;
    }
    let mut start = 0;
    let mut left = 1;
    let mut right = n - 1;

    // Start from an ear with shortest perimeter.
    // This tends to favor well formed triangles as starting point.
    let mut dmin = f32::MAX;
    for i in 0..n {
        if hull[i] >= original_count {
            continue;
        }
        let pi = prev(i, n);
        let ni = next(i, n);
        let pv = points[hull[pi]].xz();
        let cv = points[hull[i]].xz();
        let nv = points[hull[ni]].xz();
        let d = pv.distance(cv) + cv.distance(nv) + nv.distance(pv);
        if d < dmin {
            start = i;
            left = ni;
            right = pi;
            dmin = d;
        }
    }

    triangles.push([hull[start], hull[left], hull[right]]);

    // Walk left or right, whichever closes the shorter triangle.
    while next(left, n) != right {
        let nleft = next(left, n);
        let nright = prev(right, n);

        let cvleft = points[hull[left]].xz();
        let nvleft = points[hull[nleft]].xz();
        let cvright = points[hull[right]].xz();
        let nvright = points[hull[nright]].xz();
        let dleft = cvleft.distance(nvleft) + nvleft.distance(cvright);
        let dright = cvright.distance(nvright) + cvleft.distance(nvright);
        if dleft < dright {
            triangles.push([hull[left], hull[nleft], hull[right]]);
            left = nleft;
        } else {
            triangles.push([hull[left], hull[nright], hull[right]]);
            right = nright;
        }
    }
}

/// Builds a Delaunay triangulation of `points` bounded by the outline `hull`.
///
/// Open edges are completed one at a time with the point whose circumcircle contains no other
/// point. Faces that could not be closed are dropped.
pub(crate) fn delaunay_hull(points: &[Vec3A], hull: &[usize], triangles: &mut Vec<[usize; 3]>) {
    triangles.clear();
    let max_edges = points.len() * 10;
    let mut edges: Vec<Edge> = Vec::with_capacity(max_edges);
    let mut face_count = 0;

    let n = hull.len();
    for i in 0..n {
        add_edge(&mut edges, max_edges, hull[prev(i, n)], hull[i], Face::Hull, Face::Undefined);
    }

    let mut current = 0;
    while current < edges.len() {
        if edges[current].left == Face::Undefined {
            complete_facet(points, &mut edges, max_edges, &mut face_count, current);
        }
        if edges[current].right == Face::Undefined {
            complete_facet(points, &mut edges, max_edges, &mut face_count, current);
        }
        current += 1;
    }

    let mut faces: Vec<[Option<usize>; 3]> = vec![[None; 3]; face_count];
    for edge in &edges {
        if let Face::Triangle(f) = edge.right {
            let face = &mut faces[f];
            if face[0].is_none() {
                face[0] = Some(edge.s);
                face[1] = Some(edge.t);
            } else if face[0] == Some(edge.t) {
                face[2] = Some(edge.s);
            } else if face[1] == Some(edge.s) {
                face[2] = Some(edge.t);
            }
        }
        if let Face::Triangle(f) = edge.left {
            let face = &mut faces[f];
            if face[0].is_none() {
                face[0] = Some(edge.t);
                face[1] = Some(edge.s);
            } else if face[0] == Some(edge.s) {
                face[2] = Some(edge.t);
            } else if face[1] == Some(edge.t) {
                face[2] = Some(edge.s);
            }
        }
    }

    for face in faces {
        match face {
            [Some(a), Some(b), Some(c)] => triangles.push([a, b, c]),
            _ => tracing::warn!("Removing dangling face from the detail triangulation"),
        }
    }
}

fn find_edge(edges: &[Edge], s: usize, t: usize) -> Option<usize> {
    edges
        .iter()
        .position(|e| (e.s == s && e.t == t) || (e.s == t && e.t == s))
}

fn add_edge(edges: &mut Vec<Edge>, max_edges: usize, s: usize, t: usize, left: Face, right: Face) {
    if edges.len() >= max_edges {
        tracing::error!("Too many edges in the detail triangulation ({})", edges.len());
        return;
    }
    if find_edge(edges, s, t).is_none() {
        edges.push(Edge { s, t, left, right });
    }
}

fn overlaps_edges(points: &[Vec3A], edges: &[Edge], s1: usize, t1: usize) -> bool {
    edges.iter().any(|e| {
        let (s0, t0) = (e.s, e.t);
        if s0 == s1 || s0 == t1 || t0 == s1 || t0 == t1 {
            return false;
        }
        segments_overlap_xz(points[s0], points[t0], points[s1], points[t1])
    })
}

fn complete_facet(
    points: &[Vec3A],
    edges: &mut Vec<Edge>,
    max_edges: usize,
    face_count: &mut usize,
    e: usize,
) {
    const EPS: f32 = 1e-5;
    const TOLERANCE: f32 = 0.001;

    let edge = edges[e];
    let (s, t) = if edge.left == Face::Undefined {
        (edge.s, edge.t)
    } else if edge.right == Face::Undefined {
        (edge.t, edge.s)
    } else {
        return;
    };

    // Find the best point on the left of the edge.
    let mut best: Option<(usize, Circle)> = None;
    for u in 0..points.len() {
        if u == s || u == t {
            continue;
        }
        if cross_xz(points[s], points[t], points[u]) <= EPS {
            continue;
        }
        let Some(circle) = circumcircle(points[s], points[t], points[u]) else {
            continue;
        };
        let Some((_, current)) = best else {
            best = Some((u, circle));
            continue;
        };
        let d = current.center.distance(points[u].xz());
        if d > current.radius * (1.0 + TOLERANCE) {
            // Outside the current circumcircle.
            continue;
        } else if d < current.radius * (1.0 - TOLERANCE) {
            best = Some((u, circle));
        } else {
            // Inside the epsilon band, make sure the new edges do not overlap existing ones.
            if overlaps_edges(points, edges, s, u) || overlaps_edges(points, edges, t, u) {
                continue;
            }
            best = Some((u, circle));
        }
    }

    let Some((pt, _)) = best else {
        edges[e].update_left_face(s, t, Face::Hull);
        return;
    };

    let face = Face::Triangle(*face_count);
    edges[e].update_left_face(s, t, face);
    match find_edge(edges, pt, s) {
        Some(other) => edges[other].update_left_face(pt, s, face),
        None => add_edge(edges, max_edges, pt, s, face, Face::Undefined),
    }
    match find_edge(edges, t, pt) {
        Some(other) => edges[other].update_left_face(t, pt, face),
        None => add_edge(edges, max_edges, t, pt, face, Face::Undefined),
    }
    *face_count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec3A> {
        vec![
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 4.0),
            Vec3A::new(4.0, 0.0, 4.0),
            Vec3A::new(4.0, 0.0, 0.0),
        ]
    }

    fn doubled_area(points: &[Vec3A], triangles: &[[usize; 3]]) -> f32 {
        triangles
            .iter()
            .map(|[a, b, c]| cross_xz(points[*a], points[*b], points[*c]).abs())
            .sum()
    }

    #[test]
    fn hull_fan_covers_the_polygon() {
        let points = square();
        let mut triangles = Vec::new();
        triangulate_hull(&points, &[0, 1, 2, 3], 4, &mut triangles);
        assert_eq!(triangles.len(), 2);
        assert!((doubled_area(&points, &triangles) - 32.0).abs() < 1e-4);
    }

    #[test]
    fn edge_samples_never_start_the_fan() {
        let mut points = square();
        points.push(Vec3A::new(0.0, 0.0, 2.0));
        let mut triangles = Vec::new();
        triangulate_hull(&points, &[0, 4, 1, 2, 3], 4, &mut triangles);
        assert_eq!(triangles.len(), 3);
        assert!((doubled_area(&points, &triangles) - 32.0).abs() < 1e-4);
    }

    #[test]
    fn delaunay_with_center_point() {
        let mut points = square();
        points.push(Vec3A::new(2.1, 1.0, 1.9));
        let mut triangles = Vec::new();
        delaunay_hull(&points, &[0, 1, 2, 3], &mut triangles);
        assert_eq!(triangles.len(), 4);
        assert!(triangles.iter().all(|triangle| triangle.contains(&4)));
        assert!((doubled_area(&points, &triangles) - 32.0).abs() < 1e-3);
    }

    #[test]
    fn delaunay_triangles_have_empty_circumcircles() {
        let mut points = square();
        points.extend([
            Vec3A::new(1.1, 0.0, 1.3),
            Vec3A::new(2.9, 0.0, 1.1),
            Vec3A::new(1.7, 0.0, 2.8),
        ]);
        let mut triangles = Vec::new();
        delaunay_hull(&points, &[0, 1, 2, 3], &mut triangles);
        assert_eq!(triangles.len(), 2 * points.len() - 2 - 4);
        for [a, b, c] in &triangles {
            let circle = circumcircle(points[*a], points[*b], points[*c]).unwrap();
            for (i, p) in points.iter().enumerate() {
                if i == *a || i == *b || i == *c {
                    continue;
                }
                assert!(circle.center.distance(p.xz()) >= circle.radius * (1.0 - 1e-3));
            }
        }
    }
}
