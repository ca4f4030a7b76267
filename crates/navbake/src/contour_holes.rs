//! Merging of hole contours into the outline of their region.
//!
//! Each hole is connected to the outline through a bridge edge, which turns the outline and the
//! hole into a single simple polygon that the polygon mesh can triangulate.

use crate::{
    contours::{ContourSet, ContourVertex},
    geometry::{in_cone, intersect, xz_equal},
    math::{next, prev},
    region::RegionId,
};
use glam::IVec3;

struct Hole {
    vertices: Vec<ContourVertex>,
    min_x: i32,
    min_z: i32,
    leftmost: usize,
}

impl Hole {
    fn new(vertices: Vec<ContourVertex>) -> Self {
        let mut hole = Self {
            min_x: vertices[0].position.x,
            min_z: vertices[0].position.z,
            leftmost: 0,
            vertices,
        };
        for (i, vertex) in hole.vertices.iter().enumerate().skip(1) {
            let p = vertex.position;
            if p.x < hole.min_x || (p.x == hole.min_x && p.z < hole.min_z) {
                hole.min_x = p.x;
                hole.min_z = p.z;
                hole.leftmost = i;
            }
        }
        hole
    }
}

impl ContourSet {
    /// Merges every hole into the outline of its region and removes the hole contours.
    ///
    /// Holes without an outline, or without any valid bridge to it, are dropped.
    /// Returns the number of dropped holes.
    pub(crate) fn merge_holes(&mut self, max_region: RegionId) -> usize {
        let region_slots = max_region.0 as usize;
        let mut outlines: Vec<Option<usize>> = vec![None; region_slots];
        let mut holes: Vec<Vec<usize>> = vec![Vec::new(); region_slots];
        let mut hole_count = 0;
        for (i, contour) in self.contours.iter().enumerate() {
            let Some(slot) = outlines.get_mut(contour.region.0 as usize) else {
                tracing::error!("Contour has region {} outside of the region range", contour.region.0);
                continue;
            };
            if contour.is_hole() {
                holes[contour.region.0 as usize].push(i);
                hole_count += 1;
            } else {
                *slot = Some(i);
            }
        }
        if hole_count == 0 {
            return 0;
        }

        let mut dropped = 0;
        let mut consumed = vec![false; self.contours.len()];
        for (region, region_holes) in holes.iter().enumerate() {
            if region_holes.is_empty() {
                continue;
            }
            for &hole in region_holes {
                consumed[hole] = true;
            }
            let Some(outline) = outlines[region] else {
                tracing::error!(
                    "Region {region} has {} holes but no outline, skipping them",
                    region_holes.len()
                );
                dropped += region_holes.len();
                continue;
            };
            let hole_vertices = region_holes
                .iter()
                .map(|&hole| std::mem::take(&mut self.contours[hole].vertices))
                .collect();
            dropped += merge_region_holes(&mut self.contours[outline].vertices, hole_vertices);
        }

        let mut index = 0;
        self.contours.retain(|_| {
            let keep = !consumed[index];
            index += 1;
            keep
        });
        dropped
    }
}

/// Merges the holes into `outline`, leftmost hole first. Returns the number of holes that could not be merged.
fn merge_region_holes(outline: &mut Vec<ContourVertex>, holes: Vec<Vec<ContourVertex>>) -> usize {
    let mut holes: Vec<Hole> = holes
        .into_iter()
        .filter(|vertices| !vertices.is_empty())
        .map(Hole::new)
        .collect();
    holes.sort_by(|a, b| (a.min_x, a.min_z).cmp(&(b.min_x, b.min_z)));

    let mut unmerged = 0;
    let mut diagonals: Vec<(usize, i32)> = Vec::with_capacity(outline.len());
    for i in 0..holes.len() {
        let hole = &holes[i];
        let mut bridge = None;
        let mut hole_vertex = hole.leftmost;
        for _ in 0..hole.vertices.len() {
            // Find potential diagonals from the outline to the hole vertex, closest first.
            let corner = hole.vertices[hole_vertex].position;
            diagonals.clear();
            for k in 0..outline.len() {
                if outline_vertex_sees(outline, k, corner) {
                    let d = outline[k].position - corner;
                    diagonals.push((k, d.x * d.x + d.z * d.z));
                }
            }
            diagonals.sort_by_key(|(_, distance)| *distance);

            // The first diagonal that crosses neither the outline nor the remaining holes wins.
            bridge = diagonals.iter().map(|(k, _)| *k).find(|&k| {
                let pt = outline[k].position;
                !intersects_contour(pt, corner, Some(k), outline)
                    && holes[i..]
                        .iter()
                        .all(|other| !intersects_contour(pt, corner, None, &other.vertices))
            });
            if bridge.is_some() {
                break;
            }
            hole_vertex = (hole_vertex + 1) % hole.vertices.len();
        }

        match bridge {
            Some(outline_vertex) => {
                *outline = merge_contours(outline, &hole.vertices, outline_vertex, hole_vertex);
            }
            None => {
                tracing::warn!("Failed to find a bridge for a contour hole, dropping it");
                unmerged += 1;
            }
        }
    }
    unmerged
}

/// Whether `p` lies within the interior cone of the outline at vertex `k`.
fn outline_vertex_sees(outline: &[ContourVertex], k: usize, p: IVec3) -> bool {
    let n = outline.len();
    in_cone(
        outline[prev(k, n)].position,
        outline[k].position,
        outline[next(k, n)].position,
        p,
    )
}

/// Whether the segment `d0 d1` crosses any edge of `contour`.
/// Edges incident to vertex `skip`, or touching the segment's endpoints, are ignored.
fn intersects_contour(d0: IVec3, d1: IVec3, skip: Option<usize>, contour: &[ContourVertex]) -> bool {
    let n = contour.len();
    for k in 0..n {
        let k1 = next(k, n);
        if skip == Some(k) || skip == Some(k1) {
            continue;
        }
        let p0 = contour[k].position;
        let p1 = contour[k1].position;
        if xz_equal(d0, p0) || xz_equal(d1, p0) || xz_equal(d0, p1) || xz_equal(d1, p1) {
            continue;
        }
        if intersect(d0, d1, p0, p1) {
            return true;
        }
    }
    false
}

/// Splices `hole` into `outline` through the bridge between `outline[ia]` and `hole[ib]`.
///
/// Both bridge vertices appear twice, so the result has `outline.len() + hole.len() + 2` vertices.
pub(crate) fn merge_contours(
    outline: &[ContourVertex],
    hole: &[ContourVertex],
    ia: usize,
    ib: usize,
) -> Vec<ContourVertex> {
    let mut merged = Vec::with_capacity(outline.len() + hole.len() + 2);
    for i in 0..=outline.len() {
        merged.push(outline[(ia + i) % outline.len()]);
    }
    for i in 0..=hole.len() {
        merged.push(hole[(ib + i) % hole.len()]);
    }
    merged
}
