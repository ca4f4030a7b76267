//! Tracing and simplification of region outlines.

use glam::IVec3;

use crate::{
    Aabb3d, AreaType, CompactHeightfield,
    geometry::distance_squared_point_segment_xz_i,
    math::{dir_offset_x, dir_offset_z, rotate_ccw, rotate_cw},
    region::RegionId,
};

/// Upper bound of steps when walking a single region boundary.
const MAX_WALK_STEPS: usize = 0xfffe;

/// Edge length limits at or below this many cells leave contour edges unsplit.
pub const MIN_SPLIT_EDGE_LEN: u16 = 5;

/// Represents a group of related contours.
///
/// All vertices are in voxel space relative to [`ContourSet::aabb`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContourSet {
    /// An array of the contours in the set.
    pub contours: Vec<Contour>,
    /// The AABB in world space
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The width of the set. (Along the x-axis in cell units.)
    pub width: u16,
    /// The height of the set. (Along the z-axis in cell units.)
    pub height: u16,
    /// The maximum deviation of a simplified edge from the raw contour, in cells.
    pub deviation_threshold: f32,
    /// The maximum length of a simplified edge, in cells. Unlimited at or below [`MIN_SPLIT_EDGE_LEN`].
    pub max_edge_len: u16,
    /// The number of contours that could not be built and were dropped.
    pub discarded: usize,
}

/// Represents a simple, non-overlapping contour in voxel space.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Contour {
    /// Simplified contour vertices.
    /// The region of a vertex is the region on the far side of the edge starting at that vertex.
    pub vertices: Vec<ContourVertex>,
    /// Raw contour vertices.
    /// The region of a vertex is the region on the far side of the traced span edge.
    pub raw_vertices: Vec<ContourVertex>,
    /// The region id of the contour.
    pub region: RegionId,
    /// The area type of the contour.
    pub area: AreaType,
}

/// A contour corner in voxel coordinates, tagged with a neighboring region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContourVertex {
    /// The voxel corner. `y` is the floor height at that corner.
    pub position: IVec3,
    /// The neighboring region, see [`Contour::vertices`] and [`Contour::raw_vertices`].
    pub region: RegionId,
}

impl Contour {
    /// The signed area of the simplified contour on the xz-plane, rounded.
    ///
    /// Outlines have a positive area, holes a negative one.
    pub fn signed_area(&self) -> i32 {
        (self.doubled_area() + 1) / 2
    }

    /// Whether the contour is a hole inside another contour of the same region.
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.doubled_area() < 0
    }

    fn doubled_area(&self) -> i32 {
        let n = self.vertices.len();
        let mut area = 0;
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let vi = self.vertices[i].position;
            let vj = self.vertices[j].position;
            area += vi.x * vj.z - vj.x * vi.z;
            j = i;
        }
        area
    }
}

impl CompactHeightfield {
    /// Builds a contour set from the region outlines in the heightfield.
    ///
    /// The raw contours will match the region outlines exactly. The `deviation_threshold` and `max_edge_len`
    /// parameters control how closely the simplified contours will match the raw contours.
    ///
    /// Simplified contours are generated such that the vertices for portals between regions match up.
    /// (They are considered mandatory vertices.)
    ///
    /// Edges are only split when `max_edge_len` is above [`MIN_SPLIT_EDGE_LEN`]; values at or below it disable the
    /// edge length feature.
    pub fn build_contours(&self, deviation_threshold: f32, max_edge_len: u16) -> ContourSet {
        let mut contour_set = ContourSet {
            contours: Vec::new(),
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            width: self.width,
            height: self.height,
            deviation_threshold,
            max_edge_len,
            discarded: 0,
        };
        if self.region_count() == 0 {
            return contour_set;
        }

        // Mark boundaries: a set bit is an edge towards another region.
        let mut flags = vec![0_u8; self.spans.len()];
        for (i, span) in self.spans.iter().enumerate() {
            if span.region.is_none() {
                continue;
            }
            let mut connected = 0_u8;
            for dir in 0..4 {
                let neighbor_region = span
                    .con(dir)
                    .map(|neighbor| self.spans[neighbor].region)
                    .unwrap_or(RegionId::NONE);
                if neighbor_region == span.region {
                    connected |= 1 << dir;
                }
            }
            flags[i] = connected ^ 0xf;
            if flags[i] == 0xf {
                // A single span surrounded by other regions.
                flags[i] = 0;
                contour_set.discarded += 1;
                tracing::warn!("Discarding a single-span contour of region {}", span.region.0);
            }
        }

        let mut raw = Vec::with_capacity(256);
        for (x, z, i) in self.span_indices() {
            let region = self.spans[i].region;
            if region.is_none() || flags[i] == 0 {
                continue;
            }
            let Some(start_dir) = (0..4).find(|dir| flags[i] & (1 << dir) != 0) else {
                continue;
            };

            raw.clear();
            self.walk_contour(x, z, i, start_dir, &mut flags, &mut raw);
            let mut simplified = simplify_contour(&raw, deviation_threshold, max_edge_len);
            remove_degenerate_segments(&mut simplified);

            if simplified.len() < 3 {
                contour_set.discarded += 1;
                tracing::warn!(
                    "Discarding a contour of region {} with {} vertices",
                    region.0,
                    simplified.len()
                );
                continue;
            }
            contour_set.contours.push(Contour {
                vertices: simplified,
                raw_vertices: raw.clone(),
                region,
                area: self.areas[i],
            });
        }

        let unmerged = contour_set.merge_holes(self.max_region);
        contour_set.discarded += unmerged;
        if contour_set.discarded > 0 {
            tracing::warn!("Discarded {} contours", contour_set.discarded);
        }
        contour_set
    }

    /// Walks the region boundary starting at span `i`, emitting a corner for every edge passed.
    /// Clears the edge flags of every edge visited.
    fn walk_contour(
        &self,
        x: u16,
        z: u16,
        start: usize,
        start_dir: u8,
        flags: &mut [u8],
        points: &mut Vec<ContourVertex>,
    ) {
        let (mut x, mut z) = (x as i32, z as i32);
        let mut i = start;
        let mut dir = start_dir;
        for _ in 0..MAX_WALK_STEPS {
            if flags[i] & (1 << dir) != 0 {
                // Choose the edge corner
                let y = self.corner_height(i, dir);
                let (px, pz) = match dir {
                    0 => (x, z + 1),
                    1 => (x + 1, z + 1),
                    2 => (x + 1, z),
                    _ => (x, z),
                };
                let region = self.spans[i]
                    .con(dir)
                    .map(|neighbor| self.spans[neighbor].region)
                    .unwrap_or(RegionId::NONE);
                points.push(ContourVertex {
                    position: IVec3::new(px, y as i32, pz),
                    region,
                });
                // Remove visited edges
                flags[i] &= !(1 << dir);
                dir = rotate_cw(dir);
            } else {
                let Some(neighbor) = self.spans[i].con(dir) else {
                    tracing::error!("Contour walk stepped into a missing neighbor");
                    return;
                };
                i = neighbor;
                x += dir_offset_x(dir);
                z += dir_offset_z(dir);
                dir = rotate_ccw(dir);
            }
            if i == start && dir == start_dir {
                return;
            }
        }
        tracing::warn!("Contour walk did not close");
    }

    /// The highest floor among the up to four spans sharing the corner clockwise of edge `dir`.
    fn corner_height(&self, i: usize, dir: u8) -> u16 {
        let span = &self.spans[i];
        let mut height = span.floor;
        let dir_cw = rotate_cw(dir);
        let mut diagonal = None;

        if let Some(a) = span.con(dir) {
            height = height.max(self.spans[a].floor);
            diagonal = self.spans[a].con(dir_cw);
        }
        if let Some(b) = span.con(dir_cw) {
            height = height.max(self.spans[b].floor);
            if diagonal.is_none() {
                diagonal = self.spans[b].con(dir);
            }
        }
        if let Some(diagonal) = diagonal {
            height = height.max(self.spans[diagonal].floor);
        }
        height
    }
}

/// Simplifies a raw contour. Returns vertices tagged with the region across the following edge.
pub(crate) fn simplify_contour(
    raw: &[ContourVertex],
    deviation_threshold: f32,
    max_edge_len: u16,
) -> Vec<ContourVertex> {
    let n = raw.len();
    if n == 0 {
        return Vec::new();
    }

    // Vertices are paired with their index into `raw` while simplifying.
    let mut simplified: Vec<(IVec3, usize)> = Vec::with_capacity(64);
    for i in 0..n {
        if raw[i].region != raw[(i + 1) % n].region {
            simplified.push((raw[i].position, i));
        }
    }

    if simplified.is_empty() {
        // There are no portals, seed with the lower left and upper right corners.
        let mut lower_left = (raw[0].position, 0);
        let mut upper_right = (raw[0].position, 0);
        for (i, vertex) in raw.iter().enumerate() {
            let p = vertex.position;
            let ll = lower_left.0;
            if p.x < ll.x || (p.x == ll.x && p.z < ll.z) {
                lower_left = (p, i);
            }
            let ur = upper_right.0;
            if p.x > ur.x || (p.x == ur.x && p.z > ur.z) {
                upper_right = (p, i);
            }
        }
        simplified.push(lower_left);
        simplified.push(upper_right);
    }

    insert_max_deviation_vertices(raw, &mut simplified, deviation_threshold);
    if max_edge_len > MIN_SPLIT_EDGE_LEN {
        split_long_edges(raw, &mut simplified, max_edge_len);
    }

    simplified
        .into_iter()
        .map(|(position, source)| ContourVertex {
            position,
            region: raw[(source + 1) % n].region,
        })
        .collect()
}

/// Adds the raw vertex furthest from each simplified edge until every raw vertex is within `deviation_threshold`.
fn insert_max_deviation_vertices(
    raw: &[ContourVertex],
    simplified: &mut Vec<(IVec3, usize)>,
    deviation_threshold: f32,
) {
    let n = raw.len();
    let threshold_squared = deviation_threshold * deviation_threshold;
    let mut a = 0;
    while a < simplified.len() {
        let b = (a + 1) % simplified.len();
        let (mut pa, source_a) = simplified[a];
        let (mut pb, source_b) = simplified[b];

        // Traverse the segment in lexicographic order so that the
        // max deviation is calculated similarly when traversing
        // opposite segments.
        let (mut ci, step, end) = if pb.x > pa.x || (pb.x == pa.x && pb.z > pa.z) {
            ((source_a + 1) % n, 1, source_b)
        } else {
            std::mem::swap(&mut pa, &mut pb);
            ((source_b + n - 1) % n, n - 1, source_a)
        };

        let mut max_deviation = 0.0;
        let mut max_index = None;
        while ci != end {
            let deviation = distance_squared_point_segment_xz_i(raw[ci].position, pa, pb);
            if deviation > max_deviation {
                max_deviation = deviation;
                max_index = Some(ci);
            }
            ci = (ci + step) % n;
        }

        match max_index {
            Some(index) if max_deviation > threshold_squared => {
                simplified.insert(a + 1, (raw[index].position, index));
            }
            _ => a += 1,
        }
    }
}

/// Splits simplified edges longer than `max_edge_len` at the raw vertex halfway along them.
fn split_long_edges(raw: &[ContourVertex], simplified: &mut Vec<(IVec3, usize)>, max_edge_len: u16) {
    let n = raw.len();
    let max_len_squared = max_edge_len as i32 * max_edge_len as i32;
    let mut a = 0;
    while a < simplified.len() {
        let b = (a + 1) % simplified.len();
        let (pa, source_a) = simplified[a];
        let (pb, source_b) = simplified[b];

        let mut split = None;
        let d = pb - pa;
        if d.x * d.x + d.z * d.z > max_len_squared {
            let span = if source_b < source_a {
                source_b + n - source_a
            } else {
                source_b - source_a
            };
            if span > 1 {
                // Round based on the segment direction so opposite segments split identically.
                split = Some(if pb.x > pa.x || (pb.x == pa.x && pb.z > pa.z) {
                    (source_a + span / 2) % n
                } else {
                    (source_a + (span + 1) / 2) % n
                });
            }
        }

        match split {
            Some(index) => simplified.insert(a + 1, (raw[index].position, index)),
            None => a += 1,
        }
    }
}

/// Removes consecutive vertices that share the same xz position.
pub(crate) fn remove_degenerate_segments(vertices: &mut Vec<ContourVertex>) {
    let mut i = 0;
    while i < vertices.len() && vertices.len() > 1 {
        let next = (i + 1) % vertices.len();
        let (a, b) = (vertices[i].position, vertices[next].position);
        if a.x == b.x && a.z == b.z {
            vertices.remove(next);
        } else {
            i += 1;
        }
    }
}
