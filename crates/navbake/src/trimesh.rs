//! The triangle soup consumed by [`Heightfield`](crate::Heightfield) rasterization.

use glam::{UVec3, Vec3A};

use crate::{
    math::{Aabb3d, TriangleIndices as _},
    span::AreaType,
};

/// A mesh used as input for [`Heightfield`](crate::Heightfield) rasterization.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMesh {
    /// The vertices composing the mesh.
    /// Follows the convention of a triangle list.
    pub vertices: Vec<Vec3A>,

    /// The indices composing the mesh.
    /// Follows the convention of a triangle list.
    pub indices: Vec<UVec3>,

    /// The area types of the trimesh. Each index corresponds 1:1 to the [`TriMesh::indices`].
    pub area_types: Vec<AreaType>,
}

impl TriMesh {
    /// Creates a trimesh in which every triangle carries `area`.
    ///
    /// This is how a source object tags its surfaces: the tag survives rasterization
    /// only on triangles flat enough to walk on.
    pub fn with_area(vertices: Vec<Vec3A>, indices: Vec<UVec3>, area: AreaType) -> Self {
        let area_types = vec![area; indices.len()];
        Self {
            vertices,
            indices,
            area_types,
        }
    }

    /// Extends the trimesh with the vertices and indices of another trimesh.
    /// The indices of `other` will be offset by the number of vertices in `self`.
    pub fn extend(&mut self, other: TriMesh) {
        let next_vertex_index = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices
            .extend(other.indices.iter().map(|i| i + next_vertex_index));
        self.area_types.extend(other.area_types);
    }

    /// Computes the AABB of the trimesh.
    /// Returns `None` if the trimesh is empty.
    pub fn compute_aabb(&self) -> Option<Aabb3d> {
        Aabb3d::from_verts(&self.vertices)
    }

    /// The number of triangles in the mesh.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Returns a copy containing only the triangles whose xz-footprint overlaps `aabb`.
    ///
    /// Vertices are kept as-is, so indices stay valid. Triangles are not cut;
    /// clipping against the voxel grid happens during rasterization.
    pub fn clip_to_tile(&self, aabb: &Aabb3d) -> TriMesh {
        let mut clipped = TriMesh {
            vertices: self.vertices.clone(),
            ..Default::default()
        };
        for (triangle, area) in self.indices.iter().zip(&self.area_types) {
            let Some(verts) = self.triangle(*triangle) else {
                continue;
            };
            let Some(bounds) = Aabb3d::from_verts(&verts) else {
                continue;
            };
            if bounds.intersects_xz(aabb) {
                clipped.indices.push(*triangle);
                clipped.area_types.push(*area);
            }
        }
        clipped
    }

    /// Marks the triangles as walkable or not based on the threshold angle.
    ///
    /// A triangle keeps its area type if the y-component of its normal is at least
    /// the cosine of the threshold angle. Every other triangle becomes [`AreaType::NOT_WALKABLE`].
    ///
    /// # Arguments
    ///
    /// * `threshold_rad` - The threshold angle in radians.
    ///
    pub fn mark_walkable_triangles(&mut self, threshold_rad: f32) {
        let threshold_cos = threshold_rad.cos();
        for (i, indices) in self.indices.iter().enumerate() {
            // Rasterization reports invalid indices.
            if indices.max_element() as usize >= self.vertices.len() {
                continue;
            }
            let normal = indices.normal(&self.vertices);
            if normal.y < threshold_cos {
                self.area_types[i] = AreaType::NOT_WALKABLE;
            }
        }
    }

    pub(crate) fn triangle(&self, indices: UVec3) -> Option<[Vec3A; 3]> {
        Some([
            *self.vertices.get(indices.x as usize)?,
            *self.vertices.get(indices.y as usize)?,
            *self.vertices.get(indices.z as usize)?,
        ])
    }
}
