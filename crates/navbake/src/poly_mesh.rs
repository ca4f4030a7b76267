//! Convex polygon mesh built from simplified contours.

use std::collections::{HashMap, hash_map::Entry};

use glam::IVec3;

use crate::{
    Aabb3d, AreaType,
    contours::ContourSet,
    geometry::{in_cone, intersect, left, xz_equal},
    math::{next, prev},
    region::RegionId,
};

/// Represents a polygon mesh suitable for use in building a navigation mesh.
///
/// Vertices are in voxel space relative to [`PolygonMesh::aabb`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonMesh {
    /// The mesh vertices, deduplicated by exact coordinate.
    pub vertices: Vec<IVec3>,
    /// Polygon and neighbor data. [Length: polygon count * 2 * [`Self::vertices_per_polygon`]]
    ///
    /// Each polygon uses `vertices_per_polygon` vertex slots followed by the same number of
    /// neighbor slots. Unused slots hold [`PolygonMesh::NO_INDEX`].
    /// The neighbor in slot `i` shares the edge from vertex `i` to vertex `i + 1`.
    pub polygons: Vec<u32>,
    /// The region id assigned to each polygon.
    pub regions: Vec<RegionId>,
    /// The area id assigned to each polygon.
    pub areas: Vec<AreaType>,
    /// The maximum number of vertices per polygon
    pub vertices_per_polygon: usize,
    /// The bounding box of the mesh in world space.
    pub aabb: Aabb3d,
    /// The size of each cell. (On the xz-plane.)
    pub cell_size: f32,
    /// The height of each cell. (The minimum increment along the y-axis.)
    pub cell_height: f32,
    /// The max error of the polygon edges in the mesh.
    pub max_edge_error: f32,
    /// The number of contours that could not be fully triangulated.
    pub discarded: usize,
}

impl PolygonMesh {
    /// Marks an empty vertex slot or an edge without a neighbor.
    pub const NO_INDEX: u32 = u32::MAX;

    /// The number of polygons in the mesh.
    #[inline]
    pub fn polygon_count(&self) -> usize {
        self.regions.len()
    }

    fn polygon_base(&self, polygon: usize) -> usize {
        polygon * 2 * self.vertices_per_polygon
    }

    /// The vertex indices of a polygon, without the unused slots.
    pub fn polygon_vertices(&self, polygon: usize) -> &[u32] {
        let base = self.polygon_base(polygon);
        let slots = &self.polygons[base..base + self.vertices_per_polygon];
        let len = slots
            .iter()
            .position(|&v| v == Self::NO_INDEX)
            .unwrap_or(slots.len());
        &slots[..len]
    }

    /// The neighbor slots of a polygon, one per edge.
    pub fn polygon_neighbors(&self, polygon: usize) -> &[u32] {
        let count = self.polygon_vertices(polygon).len();
        let base = self.polygon_base(polygon) + self.vertices_per_polygon;
        &self.polygons[base..base + count]
    }

    /// The polygon across `edge` of `polygon`, if any.
    pub fn neighbor(&self, polygon: usize, edge: usize) -> Option<usize> {
        self.polygon_neighbors(polygon)
            .get(edge)
            .filter(|&&n| n != Self::NO_INDEX)
            .map(|&n| n as usize)
    }

    fn push_polygon(&mut self, vertices: &[u32], region: RegionId, area: AreaType) {
        let nvp = self.vertices_per_polygon;
        self.polygons.extend_from_slice(vertices);
        self.polygons
            .extend(std::iter::repeat_n(Self::NO_INDEX, 2 * nvp - vertices.len()));
        self.regions.push(region);
        self.areas.push(area);
    }

    /// Links every pair of polygons sharing an edge through their neighbor slots.
    fn build_adjacency(&mut self) {
        struct EdgeSides {
            first: (usize, usize),
            second: Option<(usize, usize)>,
        }

        let mut edges: HashMap<(u32, u32), EdgeSides> = HashMap::new();
        for polygon in 0..self.polygon_count() {
            let vertices = self.polygon_vertices(polygon);
            let n = vertices.len();
            for slot in 0..n {
                let v0 = vertices[slot];
                let v1 = vertices[next(slot, n)];
                let key = (v0.min(v1), v0.max(v1));
                match edges.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert(EdgeSides {
                            first: (polygon, slot),
                            second: None,
                        });
                    }
                    Entry::Occupied(mut entry) => {
                        let sides = entry.get_mut();
                        if sides.second.is_none() && sides.first.0 != polygon {
                            sides.second = Some((polygon, slot));
                        }
                    }
                }
            }
        }

        let nvp = self.vertices_per_polygon;
        for sides in edges.values() {
            let Some((p1, s1)) = sides.second else {
                continue;
            };
            let (p0, s0) = sides.first;
            let n0 = self.polygon_base(p0) + nvp + s0;
            let n1 = self.polygon_base(p1) + nvp + s1;
            self.polygons[n0] = p1 as u32;
            self.polygons[n1] = p0 as u32;
        }
    }
}

impl ContourSet {
    /// Builds a polygon mesh from the contours.
    ///
    /// Every contour is triangulated by ear clipping, then triangles are merged greedily into convex
    /// polygons of at most `vertices_per_polygon` vertices. Contours that cannot be triangulated
    /// completely keep the triangles found so far and count towards [`PolygonMesh::discarded`].
    ///
    /// `max_edge_error` is stored on the mesh and bounds how far the detail mesh searches for surface heights.
    pub fn build_polygon_mesh(&self, vertices_per_polygon: usize, max_edge_error: f32) -> PolygonMesh {
        let nvp = vertices_per_polygon.max(3);
        let mut mesh = PolygonMesh {
            vertices_per_polygon: nvp,
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            max_edge_error,
            ..Default::default()
        };

        let mut vertex_lookup: HashMap<IVec3, u32> = HashMap::new();
        let mut triangles = Vec::new();
        for contour in &self.contours {
            if contour.vertices.len() < 3 {
                tracing::warn!(
                    "Skipping contour of region {} with only {} vertices",
                    contour.region.0,
                    contour.vertices.len()
                );
                mesh.discarded += 1;
                continue;
            }

            let positions: Vec<IVec3> = contour.vertices.iter().map(|v| v.position).collect();
            triangles.clear();
            if !triangulate(&positions, &mut triangles) {
                tracing::warn!(
                    "Bad triangulation of the contour of region {}, keeping {} triangles",
                    contour.region.0,
                    triangles.len()
                );
                mesh.discarded += 1;
            }

            let indices: Vec<u32> = positions
                .iter()
                .map(|&position| {
                    *vertex_lookup.entry(position).or_insert_with(|| {
                        mesh.vertices.push(position);
                        (mesh.vertices.len() - 1) as u32
                    })
                })
                .collect();

            let mut polygons: Vec<Vec<u32>> = triangles
                .iter()
                .map(|triangle| triangle.map(|i| indices[i]))
                .filter(|[a, b, c]| a != b && a != c && b != c)
                .map(|triangle| triangle.to_vec())
                .collect();
            if nvp > 3 {
                merge_polygons(&mut polygons, &mesh.vertices, nvp);
            }
            for polygon in &polygons {
                mesh.push_polygon(polygon, contour.region, contour.area);
            }
        }

        mesh.build_adjacency();
        tracing::debug!(
            "Built {} polygons from {} contours",
            mesh.polygon_count(),
            self.contours.len()
        );
        mesh
    }
}

/// Ear-clips the simple polygon `vertices` and appends the triangles as vertex indices.
///
/// Returns `false` if no ear was left before the polygon was fully clipped.
/// The triangles found up to that point are kept.
pub(crate) fn triangulate(vertices: &[IVec3], triangles: &mut Vec<[usize; 3]>) -> bool {
    let mut indices: Vec<usize> = (0..vertices.len()).collect();
    let n = indices.len();
    let mut ears: Vec<bool> = vec![false; n];
    for i in 0..n {
        let i1 = next(i, n);
        ears[i1] = diagonal(i, next(i1, n), &indices, vertices);
    }

    while indices.len() > 3 {
        let n = indices.len();
        let mut best: Option<(usize, i32)> = None;
        for i in 0..n {
            let i1 = next(i, n);
            if !ears[i1] {
                continue;
            }
            let p0 = vertices[indices[i]];
            let p2 = vertices[indices[next(i1, n)]];
            let d = p2 - p0;
            let len = d.x * d.x + d.z * d.z;
            if best.is_none_or(|(_, min_len)| len < min_len) {
                best = Some((i, len));
            }
        }
        let Some((i, _)) = best else {
            return false;
        };

        let i1 = next(i, n);
        triangles.push([indices[i], indices[i1], indices[next(i1, n)]]);
        indices.remove(i1);
        ears.remove(i1);

        let n = indices.len();
        let i1 = if i1 >= n { 0 } else { i1 };
        let i = prev(i1, n);
        ears[i] = diagonal(prev(i, n), i1, &indices, vertices);
        ears[i1] = diagonal(i, next(i1, n), &indices, vertices);
    }

    triangles.push([indices[0], indices[1], indices[2]]);
    true
}

/// Whether the segment between the ring positions `i` and `j` is a proper internal diagonal.
fn diagonal(i: usize, j: usize, indices: &[usize], vertices: &[IVec3]) -> bool {
    ring_in_cone(i, j, indices, vertices) && diagonalie(i, j, indices, vertices)
}

fn ring_in_cone(i: usize, j: usize, indices: &[usize], vertices: &[IVec3]) -> bool {
    let n = indices.len();
    in_cone(
        vertices[indices[prev(i, n)]],
        vertices[indices[i]],
        vertices[indices[next(i, n)]],
        vertices[indices[j]],
    )
}

/// Whether the segment between `i` and `j` crosses no ring edge that is not incident to either.
fn diagonalie(i: usize, j: usize, indices: &[usize], vertices: &[IVec3]) -> bool {
    let n = indices.len();
    let d0 = vertices[indices[i]];
    let d1 = vertices[indices[j]];
    for k in 0..n {
        let k1 = next(k, n);
        if k == i || k1 == i || k == j || k1 == j {
            continue;
        }
        let p0 = vertices[indices[k]];
        let p1 = vertices[indices[k1]];
        if xz_equal(d0, p0) || xz_equal(d1, p0) || xz_equal(d0, p1) || xz_equal(d1, p1) {
            continue;
        }
        if intersect(d0, d1, p0, p1) {
            return false;
        }
    }
    true
}

/// Merges polygons pairwise, longest shared edge first, while the result stays convex and within
/// `max_vertices`.
fn merge_polygons(polygons: &mut Vec<Vec<u32>>, vertices: &[IVec3], max_vertices: usize) {
    loop {
        let mut best: Option<(usize, usize, usize, usize, i32)> = None;
        for a in 0..polygons.len() {
            for b in a + 1..polygons.len() {
                let Some((value, ea, eb)) =
                    merge_value(&polygons[a], &polygons[b], vertices, max_vertices)
                else {
                    continue;
                };
                if best.is_none_or(|(.., best_value)| value > best_value) {
                    best = Some((a, b, ea, eb, value));
                }
            }
        }
        let Some((a, b, ea, eb, _)) = best else {
            return;
        };
        let merged = merge_pair(&polygons[a], &polygons[b], ea, eb);
        polygons[a] = merged;
        polygons.swap_remove(b);
    }
}

/// Finds the edge shared by `pa` and `pb` and checks that merging them keeps a convex polygon.
///
/// Returns the squared length of the shared edge and its slot in each polygon.
fn merge_value(
    pa: &[u32],
    pb: &[u32],
    vertices: &[IVec3],
    max_vertices: usize,
) -> Option<(i32, usize, usize)> {
    let na = pa.len();
    let nb = pb.len();
    if na + nb - 2 > max_vertices {
        return None;
    }

    let (ea, eb) = (0..na).find_map(|i| {
        let va0 = pa[i];
        let va1 = pa[next(i, na)];
        (0..nb)
            .find(|&j| pb[j] == va1 && pb[next(j, nb)] == va0)
            .map(|j| (i, j))
    })?;

    let corner = |p: &[u32], q: &[u32], ep: usize, eq: usize| {
        let np = p.len();
        let nq = q.len();
        left(
            vertices[p[prev(ep, np)] as usize],
            vertices[p[ep] as usize],
            vertices[q[(eq + 2) % nq] as usize],
        )
    };
    if !corner(pa, pb, ea, eb) || !corner(pb, pa, eb, ea) {
        return None;
    }

    let d = vertices[pa[next(ea, na)] as usize] - vertices[pa[ea] as usize];
    Some((d.x * d.x + d.z * d.z, ea, eb))
}

/// Splices `pb` into `pa` at their shared edge.
fn merge_pair(pa: &[u32], pb: &[u32], ea: usize, eb: usize) -> Vec<u32> {
    let na = pa.len();
    let nb = pb.len();
    let mut merged = Vec::with_capacity(na + nb - 2);
    merged.extend((0..na - 1).map(|i| pa[(ea + 1 + i) % na]));
    merged.extend((0..nb - 1).map(|i| pb[(eb + 1 + i) % nb]));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contours::{Contour, ContourVertex},
        geometry::left_on,
    };

    fn positions(corners: &[[i32; 2]]) -> Vec<IVec3> {
        corners.iter().map(|[x, z]| IVec3::new(*x, 0, *z)).collect()
    }

    fn contour(region: u16, corners: &[[i32; 2]]) -> Contour {
        Contour {
            vertices: positions(corners)
                .into_iter()
                .map(|position| ContourVertex {
                    position,
                    region: RegionId::NONE,
                })
                .collect(),
            raw_vertices: Vec::new(),
            region: RegionId::from(region),
            area: AreaType::WALKABLE,
        }
    }

    fn contour_set(contours: Vec<Contour>) -> ContourSet {
        ContourSet {
            contours,
            cell_size: 0.5,
            cell_height: 0.25,
            ..Default::default()
        }
    }

    const SQUARE: [[i32; 2]; 4] = [[0, 0], [0, 4], [4, 4], [4, 0]];
    const L_SHAPE: [[i32; 2]; 6] = [[0, 0], [0, 4], [2, 4], [2, 2], [4, 2], [4, 0]];

    #[track_caller]
    fn assert_convex(mesh: &PolygonMesh, polygon: usize) {
        let indices = mesh.polygon_vertices(polygon);
        let n = indices.len();
        for i in 0..n {
            let a = mesh.vertices[indices[prev(i, n)] as usize];
            let b = mesh.vertices[indices[i] as usize];
            let c = mesh.vertices[indices[next(i, n)] as usize];
            assert!(left_on(a, b, c), "polygon {polygon} is reflex at {b}");
        }
    }

    #[test]
    fn ear_clipping_yields_n_minus_two_triangles() {
        for corners in [&SQUARE[..], &L_SHAPE[..]] {
            let vertices = positions(corners);
            let mut triangles = Vec::new();
            assert!(triangulate(&vertices, &mut triangles));
            assert_eq!(triangles.len(), vertices.len() - 2);
        }
    }

    #[test]
    fn square_becomes_one_quad() {
        let mesh = contour_set(vec![contour(1, &SQUARE)]).build_polygon_mesh(6, 1.0);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.polygon_vertices(0).len(), 4);
        assert!(mesh.polygon_neighbors(0).iter().all(|&n| n == PolygonMesh::NO_INDEX));
        assert_eq!(mesh.regions, vec![RegionId::from(1)]);
        assert_eq!(mesh.polygons.len(), 12);
    }

    #[test]
    fn triangles_only_mesh_is_linked() {
        let mesh = contour_set(vec![contour(1, &SQUARE)]).build_polygon_mesh(3, 1.0);
        assert_eq!(mesh.polygon_count(), 2);
        assert_eq!(mesh.neighbor(0, 0).or(mesh.neighbor(0, 1)).or(mesh.neighbor(0, 2)), Some(1));
        assert!((0..3).any(|edge| mesh.neighbor(1, edge) == Some(0)));
    }

    #[test]
    fn concave_outline_is_split_into_convex_polygons() {
        let mesh = contour_set(vec![contour(1, &L_SHAPE)]).build_polygon_mesh(6, 1.0);
        assert!(mesh.polygon_count() >= 2);
        for polygon in 0..mesh.polygon_count() {
            assert_convex(&mesh, polygon);
        }
        assert_eq!(mesh.discarded, 0);
    }

    #[test]
    fn neighboring_contours_share_vertices_and_adjacency() {
        let right = [[4, 0], [4, 4], [8, 4], [8, 0]];
        let mesh = contour_set(vec![contour(1, &SQUARE), contour(2, &right)]).build_polygon_mesh(6, 1.0);
        assert_eq!(mesh.polygon_count(), 2);
        assert_eq!(mesh.vertices.len(), 6);
        for polygon in 0..2 {
            let linked: Vec<_> = (0..4).filter_map(|edge| mesh.neighbor(polygon, edge)).collect();
            assert_eq!(linked, vec![1 - polygon]);
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mesh = contour_set(vec![contour(1, &L_SHAPE)]).build_polygon_mesh(3, 1.0);
        for polygon in 0..mesh.polygon_count() {
            for edge in 0..mesh.polygon_vertices(polygon).len() {
                if let Some(other) = mesh.neighbor(polygon, edge) {
                    let back = mesh.polygon_neighbors(other);
                    assert!(back.contains(&(polygon as u32)));
                }
            }
        }
    }

    #[test]
    fn short_contours_are_discarded() {
        let mesh = contour_set(vec![contour(1, &[[0, 0], [0, 4]]), contour(2, &SQUARE)])
            .build_polygon_mesh(6, 1.0);
        assert_eq!(mesh.discarded, 1);
        assert_eq!(mesh.polygon_count(), 1);
        assert_eq!(mesh.regions, vec![RegionId::from(2)]);
    }

    #[test]
    fn edge_error_comes_from_the_caller() {
        let mut contours = contour_set(vec![contour(1, &SQUARE)]);
        contours.deviation_threshold = 1.3;
        let mesh = contours.build_polygon_mesh(6, 12.0);
        assert_eq!(mesh.max_edge_error, 12.0);
    }
}
