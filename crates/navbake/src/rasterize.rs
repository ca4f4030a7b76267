//! Rasterization of triangles into a [`Heightfield`].
//!
//! Each triangle is clipped against the voxel grid one z-row at a time, then one x-column at a time.
//! The y-range of every resulting piece becomes one span in its column.

use glam::Vec3A;
use thiserror::Error;

use crate::{
    Aabb3d, TriMesh,
    heightfield::{Heightfield, SpanInsertion, SpanInsertionError},
    span::{AreaType, SpanBuilder},
};

impl Heightfield {
    /// Rasterizes every triangle of `trimesh`, tagging the spans with the triangle's area type.
    ///
    /// Call [`TriMesh::mark_walkable_triangles`] first so that steep triangles are not walkable.
    pub fn rasterize_triangles(&mut self, trimesh: &TriMesh) -> Result<(), RasterizationError> {
        if trimesh.area_types.len() != trimesh.indices.len() {
            return Err(RasterizationError::AreaTypeCountMismatch {
                triangles: trimesh.indices.len(),
                area_types: trimesh.area_types.len(),
            });
        }
        for (i, (indices, area)) in trimesh
            .indices
            .iter()
            .zip(&trimesh.area_types)
            .enumerate()
        {
            let triangle = trimesh
                .triangle(*indices)
                .ok_or(RasterizationError::InvalidVertexIndex {
                    triangle: i,
                    vertex_count: trimesh.vertices.len(),
                })?;
            self.rasterize_triangle(triangle, *area)?;
        }
        Ok(())
    }

    /// Rasterizes a single triangle.
    pub(crate) fn rasterize_triangle(
        &mut self,
        triangle: [Vec3A; 3],
        area: AreaType,
    ) -> Result<(), RasterizationError> {
        if self.width == 0 || self.height == 0 || self.vertical_cells == 0 {
            return Ok(());
        }
        let Some(triangle_aabb) = Aabb3d::from_verts(&triangle) else {
            return Ok(());
        };
        if !self.aabb.intersects(&triangle_aabb) {
            return Ok(());
        }

        let inverse_cell_size = 1.0 / self.cell_size;
        let inverse_cell_height = 1.0 / self.cell_height;
        let max_x = self.width as i32 - 1;
        let max_y = self.vertical_cells as i32 - 1;
        let max_z = self.height as i32 - 1;

        // Use -1 rather than 0 to cut the polygon properly at the start of the tile.
        let z0 = (((triangle_aabb.min.z - self.aabb.min.z) * inverse_cell_size).floor() as i32)
            .clamp(-1, max_z);
        let z1 = (((triangle_aabb.max.z - self.aabb.min.z) * inverse_cell_size).floor() as i32)
            .clamp(0, max_z);

        let mut remaining = triangle.to_vec();
        let mut row = Vec::with_capacity(7);
        let mut rest = Vec::with_capacity(7);
        let mut cell = Vec::with_capacity(7);
        let mut column_rest = Vec::with_capacity(7);
        let mut column_remaining = Vec::with_capacity(7);

        for z in z0..=z1 {
            let row_max_z = self.aabb.min.z + (z + 1) as f32 * self.cell_size;
            divide_poly(&remaining, &mut row, &mut rest, row_max_z, Axis::Z);
            std::mem::swap(&mut remaining, &mut rest);
            if row.len() < 3 || z < 0 {
                continue;
            }

            let (min_x, max_x_world) = row
                .iter()
                .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.x), max.max(v.x)));
            let x0 = (((min_x - self.aabb.min.x) * inverse_cell_size).floor() as i32)
                .clamp(-1, max_x);
            let x1 = (((max_x_world - self.aabb.min.x) * inverse_cell_size).floor() as i32)
                .clamp(0, max_x);

            column_remaining.clear();
            column_remaining.extend_from_slice(&row);
            for x in x0..=x1 {
                let column_max_x = self.aabb.min.x + (x + 1) as f32 * self.cell_size;
                divide_poly(
                    &column_remaining,
                    &mut cell,
                    &mut column_rest,
                    column_max_x,
                    Axis::X,
                );
                std::mem::swap(&mut column_remaining, &mut column_rest);
                if cell.len() < 3 || x < 0 {
                    continue;
                }

                let (min_y, max_y_world) = cell
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.y), max.max(v.y)));
                if max_y_world < self.aabb.min.y || min_y > self.aabb.max.y {
                    continue;
                }
                let y0 = (((min_y - self.aabb.min.y) * inverse_cell_height).floor() as i32)
                    .clamp(0, max_y);
                let y1 = (((max_y_world - self.aabb.min.y) * inverse_cell_height).floor() as i32)
                    .clamp(y0, max_y);

                self.add_span(SpanInsertion {
                    x: x as u16,
                    z: z as u16,
                    span: SpanBuilder {
                        min: y0 as u16,
                        max: y1 as u16,
                        area,
                        next: None,
                    }
                    .build(),
                })?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Z,
}

impl Axis {
    #[inline]
    fn of(self, v: Vec3A) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Z => v.z,
        }
    }
}

/// Splits a convex polygon along an axis-aligned line.
///
/// `below` receives the part with coordinates at most `offset`, `above` the rest.
/// Vertices on the line go to both.
fn divide_poly(
    polygon: &[Vec3A],
    below: &mut Vec<Vec3A>,
    above: &mut Vec<Vec3A>,
    offset: f32,
    axis: Axis,
) {
    below.clear();
    above.clear();
    let Some(last) = polygon.len().checked_sub(1) else {
        return;
    };
    let delta = |v: Vec3A| offset - axis.of(v);

    let mut j = last;
    for i in 0..polygon.len() {
        let (vi, vj) = (polygon[i], polygon[j]);
        let (di, dj) = (delta(vi), delta(vj));
        let in_a = dj >= 0.0;
        let in_b = di >= 0.0;
        if in_a != in_b {
            let s = dj / (dj - di);
            let intersection = vj + (vi - vj) * s;
            below.push(intersection);
            above.push(intersection);
            // Points on the line were already added as the intersection.
            if di > 0.0 {
                below.push(vi);
            } else if di < 0.0 {
                above.push(vi);
            }
        } else {
            if di >= 0.0 {
                below.push(vi);
                if di != 0.0 {
                    j = i;
                    continue;
                }
            }
            above.push(vi);
        }
        j = i;
    }
}

/// Errors that can occur during rasterization.
#[derive(Error, Debug)]
pub enum RasterizationError {
    /// A triangle references a vertex that does not exist.
    #[error("Triangle {triangle} references a vertex outside of the {vertex_count} vertices")]
    InvalidVertexIndex {
        /// The index of the offending triangle.
        triangle: usize,
        /// The number of vertices in the mesh.
        vertex_count: usize,
    },
    /// The mesh does not have exactly one area type per triangle.
    #[error("Got {area_types} area types for {triangles} triangles")]
    AreaTypeCountMismatch {
        /// The number of triangles.
        triangles: usize,
        /// The number of area types.
        area_types: usize,
    },
    /// A span could not be inserted.
    #[error(transparent)]
    SpanInsertion(#[from] SpanInsertionError),
}

#[cfg(test)]
mod tests {
    use glam::UVec3;

    use super::*;
    use crate::HeightfieldBuilder;

    fn heightfield() -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new([0.0, 0.0, 0.0], [4.0, 4.0, 4.0]),
            cell_size: 1.0,
            cell_height: 0.5,
        }
        .build()
        .unwrap()
    }

    fn flat_quad(min: [f32; 2], max: [f32; 2], y: f32, area: AreaType) -> TriMesh {
        TriMesh::with_area(
            vec![
                Vec3A::new(min[0], y, min[1]),
                Vec3A::new(min[0], y, max[1]),
                Vec3A::new(max[0], y, max[1]),
                Vec3A::new(max[0], y, min[1]),
            ],
            vec![UVec3::new(0, 1, 2), UVec3::new(0, 2, 3)],
            area,
        )
    }

    #[test]
    fn divide_poly_splits_square() {
        let square = [
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 2.0),
            Vec3A::new(2.0, 0.0, 2.0),
            Vec3A::new(2.0, 0.0, 0.0),
        ];
        let mut below = Vec::new();
        let mut above = Vec::new();
        divide_poly(&square, &mut below, &mut above, 1.0, Axis::X);
        assert_eq!(below.len(), 4);
        assert_eq!(above.len(), 4);
        assert!(below.iter().all(|v| v.x <= 1.0));
        assert!(above.iter().all(|v| v.x >= 1.0));
    }

    #[test]
    fn divide_poly_keeps_polygon_on_one_side() {
        let triangle = [
            Vec3A::new(0.0, 0.0, 0.0),
            Vec3A::new(0.0, 0.0, 1.0),
            Vec3A::new(1.0, 0.0, 0.0),
        ];
        let mut below = Vec::new();
        let mut above = Vec::new();
        divide_poly(&triangle, &mut below, &mut above, 3.0, Axis::Z);
        assert_eq!(below.len(), 3);
        assert!(above.is_empty());
    }

    #[test]
    fn rasterizes_flat_quad_into_every_column() {
        let mut heightfield = heightfield();
        let mesh = flat_quad([0.0, 0.0], [4.0, 4.0], 1.2, AreaType::WALKABLE);
        heightfield.rasterize_triangles(&mesh).unwrap();
        for z in 0..4 {
            for x in 0..4 {
                let spans: Vec<_> = heightfield.column(x, z).map(|(_, s)| s.clone()).collect();
                assert_eq!(spans.len(), 1, "column [{x}, {z}]");
                assert_eq!(spans[0].min(), 2);
                assert_eq!(spans[0].max(), 2);
                assert_eq!(spans[0].area(), AreaType::WALKABLE);
            }
        }
    }

    #[test]
    fn partial_quad_covers_only_its_columns() {
        let mut heightfield = heightfield();
        let mesh = flat_quad([0.5, 0.5], [1.5, 1.5], 0.2, AreaType::GRASS);
        heightfield.rasterize_triangles(&mesh).unwrap();
        let covered = (0..4)
            .flat_map(|z| (0..4).map(move |x| (x, z)))
            .filter(|(x, z)| heightfield.span_at(*x, *z).is_some())
            .count();
        assert_eq!(covered, 4);
        assert!(heightfield.span_at(2, 2).is_none());
    }

    #[test]
    fn geometry_outside_of_bounds_is_ignored() {
        let mut heightfield = heightfield();
        let mesh = flat_quad([10.0, 10.0], [12.0, 12.0], 1.0, AreaType::WALKABLE);
        heightfield.rasterize_triangles(&mesh).unwrap();
        assert_eq!(heightfield.span_count(), 0);
        let below = flat_quad([0.0, 0.0], [4.0, 4.0], -3.0, AreaType::WALKABLE);
        heightfield.rasterize_triangles(&below).unwrap();
        assert_eq!(heightfield.span_count(), 0);
    }

    #[test]
    fn rejects_invalid_vertex_index() {
        let mut heightfield = heightfield();
        let mut mesh = flat_quad([0.0, 0.0], [1.0, 1.0], 1.0, AreaType::WALKABLE);
        mesh.indices[0].x = 99;
        assert!(matches!(
            heightfield.rasterize_triangles(&mesh),
            Err(RasterizationError::InvalidVertexIndex { triangle: 0, .. })
        ));
    }
}
