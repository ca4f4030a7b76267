//! End-to-end bakes of small hand-made scenes.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use navbake::{AreaType, BuildInfo, MIN_SPLIT_EDGE_LEN, RegionId, Stage, TriMesh};

#[test]
fn flat_quad_bakes_into_a_single_polygon() {
    let build = build_info();
    let ctx = bake(walkable_quad(0.0, 0.0, 10.0, 10.0, 0.0), &agent(), &build);

    assert_eq!(ctx.report.regions, 1);
    let contours = ctx.contours.as_ref().unwrap();
    assert_eq!(contours.contours.len(), 1);
    assert_eq!(contours.contours[0].vertices.len(), 4);
    assert_eq!(contours.discarded, 0);

    let polygons = ctx.polygons.as_ref().unwrap();
    assert_eq!(polygons.polygon_count(), 1);
    assert_eq!(polygons.polygon_vertices(0).len(), 4);
    assert_eq!(polygons.regions[0], RegionId::from(1));
    assert_eq!(polygons.areas[0], AreaType::WALKABLE);

    let detail = ctx.detail.as_ref().unwrap();
    assert_eq!(detail.triangle_count(), 2);
    assert_eq!(detail.vertices.len(), 4);
    for vertex in &detail.vertices {
        // Heights snap down to the voxel grid.
        assert_abs_diff_eq!(vertex.y, 0.0, epsilon = build.cell_height + 1e-4);
    }
    assert!(detail.regions.iter().all(|r| *r == RegionId::from(1)));
    assert_eq!(ctx.report.total_discarded(), 0);
}

#[test]
fn flat_quad_with_default_edge_splitting() {
    let build = BuildInfo {
        cell_size: 0.2,
        cell_height: 0.3,
        ..Default::default()
    };
    assert_eq!(build.max_edge_length, 12);
    let ctx = bake(walkable_quad(0.0, 0.0, 10.0, 10.0, 0.0), &agent(), &build);

    assert_eq!(ctx.report.regions, 1);
    let contours = ctx.contours.as_ref().unwrap();
    assert_eq!(contours.contours.len(), 1);
    let contour = &contours.contours[0];
    // Each side of the square is halved, then halved again.
    assert_eq!(contour.vertices.len(), 16);
    let positions: Vec<_> = contour.vertices.iter().map(|v| v.position).collect();
    let min_x = positions.iter().map(|p| p.x).min().unwrap();
    let max_x = positions.iter().map(|p| p.x).max().unwrap();
    let min_z = positions.iter().map(|p| p.z).min().unwrap();
    let max_z = positions.iter().map(|p| p.z).max().unwrap();
    for (i, a) in positions.iter().enumerate() {
        let b = positions[(i + 1) % positions.len()];
        let d = b - *a;
        assert!(d.x * d.x + d.z * d.z <= 12 * 12, "edge {a} -> {b} is too long");
        // The split points stay on the outline.
        assert!(a.x == min_x || a.x == max_x || a.z == min_z || a.z == max_z);
    }

    let polygons = ctx.polygons.as_ref().unwrap();
    assert_eq!(polygons.discarded, 0);
    // Sixteen corners do not fit into one polygon.
    assert!(polygons.polygon_count() > 1);
    for p in 0..polygons.polygon_count() {
        let positions = polygon_positions(polygons, p);
        assert!(positions.len() <= build.vertices_per_poly);
        assert!(is_convex(&positions), "polygon {p} is concave");
    }
    assert_eq!(doubled_mesh_area(polygons), 2 * contour.signed_area() as i64);
    assert_adjacency_symmetric(polygons);

    let detail = ctx.detail.as_ref().unwrap();
    for vertex in &detail.vertices {
        assert_abs_diff_eq!(vertex.y, 0.0, epsilon = build.cell_height + 1e-4);
    }
    assert_eq!(ctx.report.total_discarded(), 0);
}

#[test]
fn short_edge_length_leaves_the_outline_unsplit() {
    for max_edge_length in [1, MIN_SPLIT_EDGE_LEN] {
        let build = BuildInfo {
            max_edge_length,
            ..build_info()
        };
        let mut ctx = context(walkable_quad(0.0, 0.0, 10.0, 10.0, 0.0), &agent(), &build);
        bake_until(&mut ctx, Stage::BuildPolygons);
        let contours = ctx.contours.as_ref().unwrap();
        assert_eq!(contours.contours.len(), 1);
        assert_eq!(
            contours.contours[0].vertices.len(),
            4,
            "max edge length {max_edge_length}"
        );
    }
}

#[test]
fn quad_with_obstacle_merges_the_hole_into_the_outline() {
    let build = build_info();
    let mut scene = walkable_quad(0.0, 0.0, 10.0, 10.0, 0.0);
    // An obstacle one voxel above the floor covers the center.
    scene.extend(quad(4.0, 4.0, 6.0, 6.0, 0.35, AreaType::NOT_WALKABLE));
    let mut ctx = context(scene, &agent(), &build);
    bake_until(&mut ctx, Stage::SegmentRegions);

    // Force a single region so the outline and the hole belong together.
    let config = ctx.config.clone();
    let mut compact = ctx.compact.take().unwrap();
    compact.erode_walkable_area(config.walkable_radius, config.blur_distance_threshold);
    compact.build_distance_field(config.blur_distance_threshold);
    for (span, area) in compact.spans.iter_mut().zip(&compact.areas) {
        span.region = if area.is_walkable() {
            RegionId::from(1)
        } else {
            RegionId::NONE
        };
    }
    compact.max_region = RegionId::from(2);
    ctx.set_segmented(compact);
    ctx.run_from(Stage::TraceContours).unwrap();

    let contours = ctx.contours.as_ref().unwrap();
    assert_eq!(contours.discarded, 0);
    assert_eq!(contours.contours.len(), 1);
    let merged = &contours.contours[0];
    assert_eq!(merged.vertices.len(), 4 + 4 + 2);
    // Both ends of the bridge appear twice.
    let duplicates = merged
        .vertices
        .iter()
        .filter(|v| merged.vertices.iter().filter(|w| w.position == v.position).count() == 2)
        .count();
    assert_eq!(duplicates, 4);

    let polygons = ctx.polygons.as_ref().unwrap();
    assert_eq!(polygons.discarded, 0);
    // A ring cannot be a single convex polygon.
    assert!(polygons.polygon_count() > 1);
    for p in 0..polygons.polygon_count() {
        assert!(is_convex(&polygon_positions(polygons, p)), "polygon {p} is concave");
    }
    assert_eq!(doubled_mesh_area(polygons), 2 * merged.signed_area() as i64);
    assert_adjacency_symmetric(polygons);
}

#[test]
fn separated_quads_stay_separate() {
    let build = build_info();
    let mut scene = walkable_quad(0.0, 0.0, 4.0, 10.0, 0.0);
    scene.extend(walkable_quad(6.0, 0.0, 10.0, 10.0, 0.0));
    let ctx = bake(scene, &agent(), &build);

    assert_eq!(ctx.report.regions, 2);
    let compact = ctx.compact.as_ref().unwrap();
    let connections = compact.region_connections();
    // Both regions only border empty space.
    assert!(connections.iter().flatten().all(|region| region.is_none()));

    let polygons = ctx.polygons.as_ref().unwrap();
    assert!(polygons.polygon_count() >= 2);
    for p in 0..polygons.polygon_count() {
        for edge in 0..polygons.polygon_vertices(p).len() {
            if let Some(q) = polygons.neighbor(p, edge) {
                assert_eq!(polygons.regions[p], polygons.regions[q]);
            }
        }
    }
    // Every polygon lies entirely on one side of the gap.
    let gap = ((5.0 - compact.aabb.min.x) / compact.cell_size) as i32;
    for p in 0..polygons.polygon_count() {
        let positions = polygon_positions(polygons, p);
        let left = positions.iter().all(|v| v.x <= gap);
        let right = positions.iter().all(|v| v.x >= gap);
        assert!(left || right, "polygon {p} crosses the gap");
    }
}

#[test]
fn narrow_strip_erodes_away() {
    let build = build_info();
    let ctx = bake(walkable_quad(0.0, 0.0, 0.3, 10.0, 0.0), &agent(), &build);

    let compact = ctx.compact.as_ref().unwrap();
    assert_eq!(compact.walkable_span_count(), 0);
    assert_eq!(ctx.report.regions, 0);
    assert!(ctx.contours.as_ref().unwrap().contours.is_empty());
    assert_eq!(ctx.polygons.as_ref().unwrap().polygon_count(), 0);
    assert_eq!(ctx.detail.as_ref().unwrap().triangle_count(), 0);
}

#[test]
fn steep_ramp_is_not_walkable() {
    let build = build_info();
    // A 60 degree ramp.
    let rise = 10.0 * 3.0_f32.sqrt();
    let scene = TriMesh::with_area(
        vec![
            [0.0, 0.0, 0.0].into(),
            [0.0, 0.0, 10.0].into(),
            [10.0, rise, 10.0].into(),
            [10.0, rise, 0.0].into(),
        ],
        vec![[0, 1, 2].into(), [0, 2, 3].into()],
        AreaType::WALKABLE,
    );
    let ctx = bake(scene, &agent(), &build);
    assert!(ctx.report.solid_spans > 0);
    assert_eq!(ctx.report.compact_spans, 0);
    assert_eq!(ctx.polygons.as_ref().unwrap().polygon_count(), 0);
}

#[test]
fn area_types_survive_the_pipeline() {
    let build = build_info();
    let scene = quad(0.0, 0.0, 10.0, 10.0, 0.0, AreaType::GRASS);
    let ctx = bake(scene, &agent(), &build);
    let polygons = ctx.polygons.as_ref().unwrap();
    assert!(polygons.polygon_count() > 0);
    assert!(polygons.areas.iter().all(|area| *area == AreaType::GRASS));
}
