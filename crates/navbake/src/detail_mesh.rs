use std::collections::VecDeque;

use glam::{Vec3A, Vec3Swizzles as _};
use thiserror::Error;

use crate::{
    Aabb3d, CompactHeightfield, PolygonMesh,
    delaunay::{delaunay_hull, triangulate_hull},
    geometry::{
        distance_squared_point_segment, distance_squared_point_segment_xz,
        signed_distance_squared_to_polygon_xz, vertical_distance_to_triangle,
    },
    math::{dir_offset_x, dir_offset_z, next},
    region::RegionId,
};

/// The most sample points a single polygon may receive.
const MAX_VERTS: usize = 127;
/// Max tris for delaunay is 2n-2-k (n=num verts, k=num hull verts).
const MAX_TRIS: usize = 255;
const MAX_VERTS_PER_EDGE: usize = 32;
const UNSET_HEIGHT: u16 = u16::MAX;

/// Contains triangle meshes that represent detailed height data associated
/// with the polygons in its associated polygon mesh object.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DetailMesh {
    /// The sub-mesh of each polygon, in polygon order.
    pub meshes: Vec<SubMesh>,
    /// The mesh vertices in world space.
    pub vertices: Vec<Vec3A>,
    /// The mesh triangles as indices into [`DetailMesh::vertices`].
    pub triangles: Vec<[u32; 3]>,
    /// The region of the polygon each triangle was built from.
    pub regions: Vec<RegionId>,
    /// The number of polygons that produced no detail triangles.
    pub discarded: usize,
}

/// The part of a [`DetailMesh`] built from a single polygon.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SubMesh {
    /// The index of the first vertex of the sub-mesh.
    pub first_vertex_index: usize,
    /// The number of vertices of the sub-mesh.
    pub vertex_count: usize,
    /// The index of the first triangle of the sub-mesh.
    pub first_triangle_index: usize,
    /// The number of triangles of the sub-mesh.
    pub triangle_count: usize,
}

impl DetailMesh {
    /// The number of triangles in the mesh.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// The corners of a triangle in world space.
    pub fn triangle_vertices(&self, triangle: usize) -> [Vec3A; 3] {
        self.triangles[triangle].map(|i| self.vertices[i as usize])
    }

    /// Builds a detail mesh from the provided polygon mesh.
    ///
    /// `sample_distance` is the spacing of the height samples and `sample_max_error` the largest
    /// vertical deviation from the real surface that is tolerated, both in world units.
    /// A `sample_distance` of 0 disables sampling, so every polygon is triangulated as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the polygon mesh does not belong to the heightfield, or if a polygon
    /// references a vertex that does not exist.
    pub fn new(
        mesh: &PolygonMesh,
        heightfield: &CompactHeightfield,
        sample_distance: f32,
        sample_max_error: f32,
    ) -> Result<Self, DetailMeshError> {
        let mut dmesh = DetailMesh::default();
        if mesh.vertices.is_empty() || mesh.polygon_count() == 0 {
            return Ok(dmesh);
        }
        let chf = heightfield;
        if mesh.cell_size != chf.cell_size || mesh.cell_height != chf.cell_height {
            return Err(DetailMeshError::CellSizeMismatch {
                mesh: (mesh.cell_size, mesh.cell_height),
                heightfield: (chf.cell_size, chf.cell_height),
            });
        }
        let cs = mesh.cell_size;
        let ch = mesh.cell_height;
        let orig = mesh.aabb.min;
        let settings = SampleSettings {
            sample_distance,
            sample_max_error,
            height_search_radius: 1.max(mesh.max_edge_error.ceil() as i32),
            inverse_cell_size: 1.0 / cs,
            cell_size: cs,
            cell_height: ch,
        };

        let mut bounds = Vec::with_capacity(mesh.polygon_count());
        for polygon in 0..mesh.polygon_count() {
            let indices = mesh.polygon_vertices(polygon);
            let mut b = Bounds {
                xmin: chf.width as i32,
                xmax: 0,
                zmin: chf.height as i32,
                zmax: 0,
            };
            for &index in indices {
                let v = mesh.vertices.get(index as usize).ok_or(
                    DetailMeshError::InvalidVertexIndex {
                        polygon,
                        index: index as usize,
                    },
                )?;
                b.xmin = b.xmin.min(v.x);
                b.xmax = b.xmax.max(v.x);
                b.zmin = b.zmin.min(v.z);
                b.zmax = b.zmax.max(v.z);
            }
            b.xmin = 0.max(b.xmin - 1);
            b.xmax = (chf.width as i32).min(b.xmax + 1);
            b.zmin = 0.max(b.zmin - 1);
            b.zmax = (chf.height as i32).min(b.zmax + 1);
            bounds.push(b);
        }

        let mut hp = HeightPatch::default();
        let mut queue = VecDeque::new();
        let mut verts = Vec::with_capacity(MAX_VERTS);
        let mut tris = Vec::with_capacity(MAX_TRIS);
        let mut poly = Vec::with_capacity(mesh.vertices_per_polygon);

        for (i, b) in bounds.iter().enumerate() {
            dmesh.meshes.push(SubMesh {
                first_vertex_index: dmesh.vertices.len(),
                first_triangle_index: dmesh.triangles.len(),
                ..Default::default()
            });

            let indices = mesh.polygon_vertices(i);
            if indices.len() < 3 || b.xmin >= b.xmax || b.zmin >= b.zmax {
                tracing::warn!("Skipping degenerate polygon {i} with {} vertices", indices.len());
                dmesh.discarded += 1;
                continue;
            }

            // Store polygon vertices for processing.
            poly.clear();
            poly.extend(indices.iter().map(|&index| {
                let v = mesh.vertices[index as usize].as_vec3a();
                Vec3A::new(v.x * cs, v.y * ch, v.z * cs)
            }));

            // Get the height data from the area of the polygon.
            hp.reset(b);
            hp.get_height_data(chf, mesh, indices, &mut queue, mesh.regions[i]);

            build_poly_detail(&poly, &settings, &hp, &mut verts, &mut tris);
            if tris.is_empty() {
                tracing::warn!("Could not triangulate polygon {i} ({} verts)", verts.len());
                dmesh.discarded += 1;
                continue;
            }

            let offset = dmesh.vertices.len() as u32;
            dmesh.vertices.extend(verts.iter().map(|v| *v + orig));
            dmesh.triangles.extend(
                tris.iter()
                    .map(|triangle| triangle.map(|index| index as u32 + offset)),
            );
            dmesh
                .regions
                .extend(std::iter::repeat_n(mesh.regions[i], tris.len()));

            if let Some(submesh) = dmesh.meshes.last_mut() {
                submesh.vertex_count = verts.len();
                submesh.triangle_count = tris.len();
            }
        }

        tracing::debug!(
            "Built {} detail triangles for {} polygons",
            dmesh.triangles.len(),
            mesh.polygon_count()
        );
        Ok(dmesh)
    }

    /// The bounding box of all detail vertices, or `None` if the mesh is empty.
    pub fn aabb(&self) -> Option<Aabb3d> {
        Aabb3d::from_verts(&self.vertices)
    }
}

/// Errors that can occur when building a [`DetailMesh`].
#[derive(Error, Debug)]
pub enum DetailMeshError {
    /// A polygon references a vertex that is not part of the polygon mesh.
    #[error("Polygon {polygon} references vertex {index}, which does not exist")]
    InvalidVertexIndex {
        /// The polygon with the bad reference.
        polygon: usize,
        /// The referenced vertex.
        index: usize,
    },
    /// The polygon mesh was built on a different voxel grid than the heightfield.
    #[error("Polygon mesh cells {mesh:?} do not match the heightfield cells {heightfield:?}")]
    CellSizeMismatch {
        /// Cell size and height of the polygon mesh.
        mesh: (f32, f32),
        /// Cell size and height of the heightfield.
        heightfield: (f32, f32),
    },
}

struct SampleSettings {
    sample_distance: f32,
    sample_max_error: f32,
    height_search_radius: i32,
    inverse_cell_size: f32,
    cell_size: f32,
    cell_height: f32,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: i32,
    y: u16,
    z: i32,
    added: bool,
}

/// Samples the edges and the interior of `poly` and triangulates the samples into `tris`.
///
/// `verts` receives the polygon corners first, followed by edge samples and interior samples.
fn build_poly_detail(
    poly: &[Vec3A],
    settings: &SampleSettings,
    hp: &HeightPatch,
    verts: &mut Vec<Vec3A>,
    tris: &mut Vec<[usize; 3]>,
) {
    let nin = poly.len();
    let sample_dist = settings.sample_distance;
    let sample_max_error = settings.sample_max_error;
    let height_at = |p: Vec3A| hp.get_height(p, settings);

    verts.clear();
    verts.extend_from_slice(poly);
    tris.clear();
    let mut hull = Vec::with_capacity(MAX_VERTS);

    let min_extent_squared = poly_min_extent_squared(poly);

    // Tessellate outlines.
    // This is done in separate pass in order to ensure
    // seamless height values across the poly boundaries.
    if sample_dist > 0.0 {
        let mut edge = [Vec3A::ZERO; MAX_VERTS_PER_EDGE + 1];
        let mut j = nin - 1;
        for i in 0..nin {
            let mut vj = poly[j];
            let mut vi = poly[i];
            let mut swapped = false;
            // Make sure the segments are always handled in same order
            // using lexological sort or else there will be seams.
            if (vj.x - vi.x).abs() < 1.0e-6 {
                if vj.z > vi.z {
                    std::mem::swap(&mut vj, &mut vi);
                    swapped = true;
                }
            } else if vj.x > vi.x {
                std::mem::swap(&mut vj, &mut vi);
                swapped = true;
            }
            // Create samples along the edge.
            let dij = vi - vj;
            let d = dij.xz().length();
            let mut nn = 1 + (d / sample_dist).floor() as usize;
            nn = nn.min(MAX_VERTS_PER_EDGE - 1);
            if verts.len() + nn >= MAX_VERTS {
                nn = (MAX_VERTS - 1).saturating_sub(verts.len()).max(1);
            }
            for (k, pos) in edge.iter_mut().enumerate().take(nn + 1) {
                let u = k as f32 / nn as f32;
                *pos = vj + dij * u;
                pos.y = height_at(*pos) as f32 * settings.cell_height;
            }
            // Simplify samples.
            let mut idx = Vec::with_capacity(MAX_VERTS_PER_EDGE);
            idx.extend([0, nn]);
            let mut k = 0;
            while k < idx.len() - 1 {
                let a = idx[k];
                let b = idx[k + 1];
                let va = edge[a];
                let vb = edge[b];
                // Find maximum deviation along the segment.
                let mut maxd = 0.0;
                let mut maxi = None;
                for (m, sample) in edge.iter().enumerate().take(b).skip(a + 1) {
                    let dev = distance_squared_point_segment(*sample, va, vb);
                    if dev > maxd {
                        maxd = dev;
                        maxi = Some(m);
                    }
                }
                // If the max deviation is larger than accepted error,
                // add new point, else continue to next segment.
                if let Some(maxi) = maxi
                    && maxd > sample_max_error * sample_max_error
                {
                    idx.insert(k + 1, maxi);
                } else {
                    k += 1;
                }
            }

            hull.push(j);
            // Add new vertices.
            let inner = &idx[1..idx.len() - 1];
            if swapped {
                for &k in inner.iter().rev() {
                    hull.push(verts.len());
                    verts.push(edge[k]);
                }
            } else {
                for &k in inner {
                    hull.push(verts.len());
                    verts.push(edge[k]);
                }
            }
            j = i;
        }
    } else {
        hull.extend(0..nin);
    }

    // Tessellate the base mesh.
    triangulate_hull(verts, &hull, nin, tris);

    // If the polygon minimum extent is small (sliver or small triangle), do not try to add internal points.
    if sample_dist <= 0.0 || min_extent_squared < (sample_dist * 2.0) * (sample_dist * 2.0) {
        return;
    }
    if tris.is_empty() {
        return;
    }

    // Create sample locations in a grid.
    let mut min = poly[0];
    let mut max = poly[0];
    for p in &poly[1..] {
        min = min.min(*p);
        max = max.max(*p);
    }
    let x0 = (min.x / sample_dist).floor() as i32;
    let x1 = (max.x / sample_dist).ceil() as i32;
    let z0 = (min.z / sample_dist).floor() as i32;
    let z1 = (max.z / sample_dist).ceil() as i32;
    let mut samples = Vec::new();
    for z in z0..z1 {
        for x in x0..x1 {
            let pt = Vec3A::new(
                x as f32 * sample_dist,
                (max.y + min.y) * 0.5,
                z as f32 * sample_dist,
            );
            // Make sure the samples are not too close to the edges.
            if signed_distance_squared_to_polygon_xz(poly, pt) > -sample_dist / 2.0 {
                continue;
            }
            samples.push(Sample {
                x,
                y: height_at(pt),
                z,
                added: false,
            });
        }
    }

    // Add the samples starting from the one that has the most
    // error. The procedure stops when all samples are added
    // or when the max error is within threshold.
    for _ in 0..samples.len() {
        if verts.len() >= MAX_VERTS {
            break;
        }

        // Find sample with most error.
        let mut best: Option<(usize, Vec3A)> = None;
        let mut bestd = 0.0;
        for (i, sample) in samples.iter().enumerate() {
            if sample.added {
                continue;
            }
            // The sample location is jittered to get rid of some bad triangulations
            // which are cause by symmetrical data from the grid structure.
            let pt = Vec3A::new(
                sample.x as f32 * sample_dist + jitter_x(i) * settings.cell_size * 0.1,
                sample.y as f32 * settings.cell_height,
                sample.z as f32 * sample_dist + jitter_z(i) * settings.cell_size * 0.1,
            );
            let Some(d) = distance_to_tri_mesh(pt, verts, tris) else {
                // did not hit the mesh.
                continue;
            };
            if d > bestd {
                bestd = d;
                best = Some((i, pt));
            }
        }
        // If the max error is within accepted threshold, stop tessellating.
        if bestd <= sample_max_error {
            break;
        }
        let Some((besti, bestpt)) = best else {
            break;
        };
        samples[besti].added = true;
        verts.push(bestpt);

        // Create new triangulation.
        delaunay_hull(verts, &hull, tris);
    }

    if tris.len() > MAX_TRIS {
        tracing::error!(
            "Too many detail triangles! Shrinking triangle count from {} to {MAX_TRIS}",
            tris.len()
        );
        tris.truncate(MAX_TRIS);
    }
}

/// The smallest vertical distance from `p` to any triangle it projects onto.
fn distance_to_tri_mesh(p: Vec3A, verts: &[Vec3A], tris: &[[usize; 3]]) -> Option<f32> {
    tris.iter()
        .filter_map(|[a, b, c]| vertical_distance_to_triangle(p, verts[*a], verts[*b], verts[*c]))
        .min_by(f32::total_cmp)
}

fn jitter_x(i: usize) -> f32 {
    ((i.wrapping_mul(0x8da6b343) & 0xffff) as f32 / 65535.0 * 2.0) - 1.0
}

fn jitter_z(i: usize) -> f32 {
    ((i.wrapping_mul(0xd8163841) & 0xffff) as f32 / 65535.0 * 2.0) - 1.0
}

/// The squared width of the polygon at its narrowest.
fn poly_min_extent_squared(verts: &[Vec3A]) -> f32 {
    let n = verts.len();
    let mut min_dist = f32::MAX;
    for i in 0..n {
        let ni = next(i, n);
        let p1 = verts[i];
        let p2 = verts[ni];
        let mut max_edge_dist = 0.0_f32;
        for (j, v) in verts.iter().enumerate() {
            if j == i || j == ni {
                continue;
            }
            max_edge_dist = max_edge_dist.max(distance_squared_point_segment_xz(*v, p1, p2));
        }
        min_dist = min_dist.min(max_edge_dist);
    }
    min_dist
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    xmin: i32,
    xmax: i32,
    zmin: i32,
    zmax: i32,
}

/// Floor heights of the cells below a polygon, in voxels.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct HeightPatch {
    data: Vec<u16>,
    xmin: i32,
    zmin: i32,
    width: i32,
    height: i32,
}

impl HeightPatch {
    fn reset(&mut self, bounds: &Bounds) {
        self.xmin = bounds.xmin;
        self.zmin = bounds.zmin;
        self.width = bounds.xmax - bounds.xmin;
        self.height = bounds.zmax - bounds.zmin;
        self.data.clear();
        self.data
            .resize((self.width * self.height) as usize, UNSET_HEIGHT);
    }

    #[inline]
    fn contains(&self, hx: i32, hz: i32) -> bool {
        hx >= 0 && hz >= 0 && hx < self.width && hz < self.height
    }

    #[inline]
    fn data_at(&self, hx: i32, hz: i32) -> u16 {
        self.data[(hx + hz * self.width) as usize]
    }

    #[inline]
    fn data_at_mut(&mut self, hx: i32, hz: i32) -> &mut u16 {
        &mut self.data[(hx + hz * self.width) as usize]
    }

    /// Fills the patch with the floors of `region`, then floods outwards to the cells of other regions.
    fn get_height_data(
        &mut self,
        chf: &CompactHeightfield,
        mesh: &PolygonMesh,
        polygon: &[u32],
        queue: &mut VecDeque<(i32, i32, usize)>,
        region: RegionId,
    ) {
        queue.clear();
        let mut empty = true;

        // Copy the height from the same region, and mark region borders
        // as seed points to fill the rest.
        if region.is_some() {
            for hz in 0..self.height {
                let z = self.zmin + hz;
                for hx in 0..self.width {
                    let x = self.xmin + hx;
                    let cell = chf.cell_at(x as u16, z as u16);
                    for i in cell.index_range() {
                        let span = &chf.spans[i];
                        if span.region != region {
                            continue;
                        }
                        *self.data_at_mut(hx, hz) = span.floor;
                        empty = false;

                        // If any of the neighbours is not in same region,
                        // add the current location as flood fill start
                        let border = (0..4).any(|dir| {
                            span.con(dir)
                                .is_some_and(|neighbor| chf.spans[neighbor].region != region)
                        });
                        if border {
                            queue.push_back((x, z, i));
                        }
                        break;
                    }
                }
            }
        }

        // If the polygon does not contain any points from the current region (rare, but happens)
        // then use the center as the seed point.
        if empty && !self.seed_with_poly_center(chf, mesh, polygon, queue) {
            return;
        }

        // We assume the seed is centered in the polygon, so a BFS to collect
        // height data will ensure we do not move onto overlapping polygons and
        // sample wrong heights.
        while let Some((cx, cz, ci)) = queue.pop_front() {
            let span = &chf.spans[ci];
            for dir in 0..4 {
                let Some(neighbor) = span.con(dir) else {
                    continue;
                };
                let ax = cx + dir_offset_x(dir);
                let az = cz + dir_offset_z(dir);
                let hx = ax - self.xmin;
                let hz = az - self.zmin;
                if !self.contains(hx, hz) || self.data_at(hx, hz) != UNSET_HEIGHT {
                    continue;
                }
                *self.data_at_mut(hx, hz) = chf.spans[neighbor].floor;
                queue.push_back((ax, az, neighbor));
            }
        }
    }

    /// Walks from the span closest to a polygon corner towards the polygon center
    /// and seeds the flood with the span found there.
    /// Returns `false` if no span lies near the polygon.
    fn seed_with_poly_center(
        &mut self,
        chf: &CompactHeightfield,
        mesh: &PolygonMesh,
        polygon: &[u32],
        queue: &mut VecDeque<(i32, i32, usize)>,
    ) -> bool {
        const OFFSET: [(i32, i32); 9] = [
            (0, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
        ];

        // Find cell closest to a poly vertex
        let mut start = None;
        let mut dmin = i32::MAX;
        'search: for &index in polygon {
            let v = mesh.vertices[index as usize];
            for (ox, oz) in OFFSET {
                let ax = v.x + ox;
                let az = v.z + oz;
                if !self.contains(ax - self.xmin, az - self.zmin) {
                    continue;
                }
                for i in chf.cell_at(ax as u16, az as u16).index_range() {
                    let d = (v.y - chf.spans[i].floor as i32).abs();
                    if d < dmin {
                        start = Some((ax, az, i));
                        dmin = d;
                    }
                }
                if dmin == 0 {
                    break 'search;
                }
            }
        }
        let Some(start) = start else {
            tracing::warn!("Found no span below the polygon to sample heights from");
            return false;
        };

        // Find center of the polygon
        let (sum_x, sum_z) = polygon.iter().fold((0, 0), |(x, z), &index| {
            let v = mesh.vertices[index as usize];
            (x + v.x, z + v.z)
        });
        let pcx = sum_x / polygon.len() as i32;
        let pcz = sum_z / polygon.len() as i32;

        // DFS to move to the center. Intermediate nodes are recorded,
        // as contour simplification can leave dead ends on the direct path.
        let mut stack = vec![start];
        let mut current = start;
        let mut visited = vec![false; self.data.len()];
        let mut dirs = [0, 1, 2, 3];
        while let Some((cx, cz, ci)) = stack.pop() {
            current = (cx, cz, ci);
            if cx == pcx && cz == pcz {
                break;
            }

            // If we are already at the correct X-position, prefer direction
            // directly towards the center in the Z-axis; otherwise prefer
            // direction in the X-axis
            let direct_dir = if cx == pcx {
                if pcz > cz { 1 } else { 3 }
            } else if pcx > cx {
                2
            } else {
                0
            };

            // Push the direct dir last so we start with this on next iteration
            dirs.swap(direct_dir, 3);
            let span = &chf.spans[ci];
            for &dir in &dirs {
                let Some(neighbor) = span.con(dir) else {
                    continue;
                };
                let nx = cx + dir_offset_x(dir);
                let nz = cz + dir_offset_z(dir);
                let hx = nx - self.xmin;
                let hz = nz - self.zmin;
                if !self.contains(hx, hz) || visited[(hx + hz * self.width) as usize] {
                    continue;
                }
                visited[(hx + hz * self.width) as usize] = true;
                stack.push((nx, nz, neighbor));
            }
            dirs.swap(direct_dir, 3);
        }
        if stack.is_empty() && (current.0 != pcx || current.1 != pcz) {
            tracing::warn!("Walk towards polygon center failed to reach center");
        }

        let (cx, cz, ci) = current;
        queue.clear();
        queue.push_back(current);
        *self.data_at_mut(cx - self.xmin, cz - self.zmin) = chf.spans[ci].floor;
        true
    }

    /// The floor height below `p`, in voxels.
    ///
    /// Cells without data fall back to the closest height within the search radius,
    /// stopping at the first ring around the cell that has any data.
    fn get_height(&self, p: Vec3A, settings: &SampleSettings) -> u16 {
        let ix = (p.x * settings.inverse_cell_size + 0.01).floor() as i32;
        let iz = (p.z * settings.inverse_cell_size + 0.01).floor() as i32;
        let ix = (ix - self.xmin).clamp(0, self.width - 1);
        let iz = (iz - self.zmin).clamp(0, self.height - 1);
        let mut h = self.data_at(ix, iz);
        if h != UNSET_HEIGHT {
            return h;
        }

        // Walk adjacent cells in a spiral up to the search radius.
        let mut x = 1;
        let mut z = 0;
        let mut dx = 1;
        let mut dz = 0;
        let max_size = settings.height_search_radius * 2 + 1;
        let max_iter = max_size * max_size - 1;
        let mut next_ring_iter_start = 8;
        let mut next_ring_iters = 16;
        let mut dmin = f32::MAX;
        for i in 0..max_iter {
            let nx = ix + x;
            let nz = iz + z;
            if self.contains(nx, nz) {
                let nh = self.data_at(nx, nz);
                if nh != UNSET_HEIGHT {
                    let d = (nh as f32 * settings.cell_height - p.y).abs();
                    if d < dmin {
                        h = nh;
                        dmin = d;
                    }
                }
            }
            // Stop at the end of the first ring that found a height.
            if i + 1 == next_ring_iter_start {
                if h != UNSET_HEIGHT {
                    break;
                }
                next_ring_iter_start += next_ring_iters;
                next_ring_iters += 8;
            }

            if x == z || (x < 0 && x == -z) || (x > 0 && x == 1 - z) {
                let tmp = dx;
                dx = -dz;
                dz = tmp;
            }
            x += dx;
            z += dz;
        }
        if h == UNSET_HEIGHT { 0 } else { h }
    }
}
