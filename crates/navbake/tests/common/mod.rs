#![allow(dead_code)]

use glam::{IVec3, UVec3, Vec3A};
use navbake::{
    Agent, AreaType, BakeContext, BuildInfo, DetailMesh, NavmeshConfig, PolygonMesh, Stage,
    TileSet, TriMesh,
};

/// A horizontal quad facing up.
pub fn quad(min_x: f32, min_z: f32, max_x: f32, max_z: f32, y: f32, area: AreaType) -> TriMesh {
    TriMesh::with_area(
        vec![
            Vec3A::new(min_x, y, min_z),
            Vec3A::new(min_x, y, max_z),
            Vec3A::new(max_x, y, max_z),
            Vec3A::new(max_x, y, min_z),
        ],
        vec![UVec3::new(0, 1, 2), UVec3::new(0, 2, 3)],
        area,
    )
}

pub fn walkable_quad(min_x: f32, min_z: f32, max_x: f32, max_z: f32, y: f32) -> TriMesh {
    quad(min_x, min_z, max_x, max_z, y, AreaType::WALKABLE)
}

/// A square pyramid with its apex at the center, `height` above the base.
pub fn pyramid(size: f32, height: f32) -> TriMesh {
    let half = size / 2.0;
    let apex = Vec3A::new(half, height, half);
    let corners = [
        Vec3A::new(0.0, 0.0, 0.0),
        Vec3A::new(0.0, 0.0, size),
        Vec3A::new(size, 0.0, size),
        Vec3A::new(size, 0.0, 0.0),
    ];
    let mut vertices = corners.to_vec();
    vertices.push(apex);
    // Each face winds counter-clockwise when seen from above.
    let indices = (0..4)
        .map(|i| UVec3::new(i, (i + 1) % 4, 4))
        .collect();
    TriMesh::with_area(vertices, indices, AreaType::WALKABLE)
}

/// A human-sized agent.
pub fn agent() -> Agent {
    Agent::default()
}

/// Build parameters with contour edge splitting disabled, so flat rectangles stay rectangles.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        cell_size: 0.2,
        cell_height: 0.3,
        max_edge_length: 0,
        ..Default::default()
    }
}

/// Creates a context for the first tile of the scene.
#[track_caller]
pub fn context(mesh: TriMesh, agent: &Agent, build: &BuildInfo) -> BakeContext {
    let aabb = mesh.compute_aabb().expect("scene has no vertices");
    let tiles = TileSet::slice(aabb, build).unwrap();
    assert_eq!(tiles.len(), 1, "fixture should fit into a single tile");
    let tile = tiles.tiles[0];
    let input = mesh.clip_to_tile(&tile.aabb());
    BakeContext::new(NavmeshConfig::from_agent(agent, build), tile, input).unwrap()
}

/// Runs the whole pipeline on the scene.
#[track_caller]
pub fn bake(mesh: TriMesh, agent: &Agent, build: &BuildInfo) -> BakeContext {
    let mut ctx = context(mesh, agent, build);
    ctx.run().unwrap();
    ctx
}

/// Runs the pipeline up to, but not including, `stage`.
#[track_caller]
pub fn bake_until(ctx: &mut BakeContext, stage: Stage) {
    for s in Stage::ALL.into_iter().take_while(|s| *s < stage) {
        ctx.run_stage(s).unwrap();
    }
}

/// Twice the xz-area of a polygon in voxel units, positive for outlines.
pub fn doubled_area(vertices: &[IVec3]) -> i64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let a = vertices[(i + n - 1) % n];
            let b = vertices[i];
            b.x as i64 * a.z as i64 - a.x as i64 * b.z as i64
        })
        .sum()
}

pub fn polygon_positions(mesh: &PolygonMesh, polygon: usize) -> Vec<IVec3> {
    mesh.polygon_vertices(polygon)
        .iter()
        .map(|i| mesh.vertices[*i as usize])
        .collect()
}

/// The summed xz-area of all polygons, doubled.
pub fn doubled_mesh_area(mesh: &PolygonMesh) -> i64 {
    (0..mesh.polygon_count())
        .map(|p| doubled_area(&polygon_positions(mesh, p)).abs())
        .sum()
}

/// Whether every corner of the polygon turns the same way.
pub fn is_convex(vertices: &[IVec3]) -> bool {
    let n = vertices.len();
    let mut sign = 0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];
        let cross = (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z);
        if cross == 0 {
            continue;
        }
        if sign == 0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

#[track_caller]
pub fn assert_adjacency_symmetric(mesh: &PolygonMesh) {
    for p in 0..mesh.polygon_count() {
        for edge in 0..mesh.polygon_vertices(p).len() {
            let Some(q) = mesh.neighbor(p, edge) else {
                continue;
            };
            let back = (0..mesh.polygon_vertices(q).len()).any(|e| mesh.neighbor(q, e) == Some(p));
            assert!(back, "polygon {p} links to {q} over edge {edge}, but not back");
        }
    }
}

/// The world-space triangles of a detail sub-mesh.
pub fn sub_mesh_triangles(detail: &DetailMesh, sub_mesh: usize) -> Vec<[Vec3A; 3]> {
    let sub = &detail.meshes[sub_mesh];
    (sub.first_triangle_index..sub.first_triangle_index + sub.triangle_count)
        .map(|t| detail.triangle_vertices(t))
        .collect()
}
