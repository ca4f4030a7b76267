//! Small math helpers shared by every stage: bounding boxes, direction offsets and ring indexing.

use glam::{UVec3, Vec3A};

/// An axis-aligned bounding box in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner.
    pub min: Vec3A,
    /// The maximum corner.
    pub max: Vec3A,
}

impl Aabb3d {
    /// Creates a box from its two corners.
    #[inline]
    pub fn new(min: impl Into<Vec3A>, max: impl Into<Vec3A>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// Computes the box enclosing all `verts`.
    /// Returns `None` if `verts` is empty.
    pub fn from_verts(verts: &[Vec3A]) -> Option<Self> {
        let (first, rest) = verts.split_first()?;
        let mut aabb = Self::new(*first, *first);
        for v in rest {
            aabb.min = aabb.min.min(*v);
            aabb.max = aabb.max.max(*v);
        }
        Some(aabb)
    }

    /// The extent of the box along each axis.
    #[inline]
    pub fn size(&self) -> Vec3A {
        self.max - self.min
    }

    /// Whether the two boxes overlap, touching faces included.
    #[inline]
    pub fn intersects(&self, other: &Aabb3d) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// The number of voxels along each axis when the box is divided into cells of
    /// `cell_size` on the xz-plane and `cell_height` along y.
    ///
    /// Every stage derives its grid dimensions from this function so they match exactly.
    pub fn grid_size(&self, cell_size: f32, cell_height: f32) -> UVec3 {
        let size = self.size().max(Vec3A::ZERO);
        UVec3::new(
            (size.x / cell_size).ceil() as u32,
            (size.y / cell_height).ceil() as u32,
            (size.z / cell_size).ceil() as u32,
        )
    }

    /// Whether the footprints of the two boxes on the xz-plane overlap.
    #[inline]
    pub fn intersects_xz(&self, other: &Aabb3d) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

pub(crate) trait TriangleIndices {
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A;
}

impl TriangleIndices for UVec3 {
    #[inline]
    fn normal(&self, vertices: &[Vec3A]) -> Vec3A {
        let a = vertices[self[0] as usize];
        let b = vertices[self[1] as usize];
        let c = vertices[self[2] as usize];
        let ab = b - a;
        let ac = c - a;
        ab.cross(ac).normalize_or_zero()
    }
}

/// Gets the standard width (x-axis) offset for the specified direction.
///
/// Directions are numbered 0 = -x, 1 = +z, 2 = +x, 3 = -z.
#[inline]
pub(crate) fn dir_offset_x(direction: u8) -> i32 {
    const OFFSET: [i32; 4] = [-1, 0, 1, 0];
    OFFSET[direction as usize & 0x03]
}

/// Gets the standard depth (z-axis) offset for the specified direction.
#[inline]
pub(crate) fn dir_offset_z(direction: u8) -> i32 {
    const OFFSET: [i32; 4] = [0, 1, 0, -1];
    OFFSET[direction as usize & 0x03]
}

/// Rotates a direction one step clockwise.
#[inline]
pub(crate) fn rotate_cw(direction: u8) -> u8 {
    (direction + 1) & 0x3
}

/// Rotates a direction one step counter-clockwise.
#[inline]
pub(crate) fn rotate_ccw(direction: u8) -> u8 {
    (direction + 3) & 0x3
}

#[inline]
pub(crate) fn next(i: usize, n: usize) -> usize {
    if i + 1 < n { i + 1 } else { 0 }
}

#[inline]
pub(crate) fn prev(i: usize, n: usize) -> usize {
    if i >= 1 { i - 1 } else { n - 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_are_inverse() {
        for dir in 0..4 {
            assert_eq!(rotate_ccw(rotate_cw(dir)), dir);
            let (dx, dz) = (dir_offset_x(dir), dir_offset_z(dir));
            let cw = rotate_cw(dir);
            // Clockwise rotation on the xz-plane with z pointing up.
            assert_eq!((dir_offset_x(cw), dir_offset_z(cw)), (dz, -dx));
        }
    }

    #[test]
    fn aabb_from_verts() {
        let aabb = Aabb3d::from_verts(&[
            Vec3A::new(1.0, -2.0, 3.0),
            Vec3A::new(-1.0, 5.0, 0.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3A::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3A::new(1.0, 5.0, 3.0));
        assert!(Aabb3d::from_verts(&[]).is_none());
    }

    #[test]
    fn grid_size_rounds_up() {
        let aabb = Aabb3d::new([0.0, -1.0, 0.0], [10.0, 1.0, 10.1]);
        assert_eq!(aabb.grid_size(0.2, 0.3), UVec3::new(50, 7, 51));
    }

    #[test]
    fn ring_indexing_wraps() {
        assert_eq!(next(3, 4), 0);
        assert_eq!(prev(0, 4), 3);
        assert_eq!(next(1, 4), 2);
    }
}
