//! Slicing of a scene into square tiles that are baked independently.

use glam::{UVec3, Vec3A};
use thiserror::Error;

use crate::{Aabb3d, config::BuildInfo};

/// How far the tiles extend above and below the scene geometry, in world units.
pub const TILE_VERTICAL_PADDING: f32 = 10.0;

/// A box of the scene that is baked on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    /// The index of the tile in its [`TileSet`].
    pub id: u32,
    /// The minimum corner of the tile.
    pub min: Vec3A,
    /// The maximum corner of the tile.
    pub max: Vec3A,
}

impl Tile {
    /// Creates a tile from its corners.
    pub fn new(id: u32, min: impl Into<Vec3A>, max: impl Into<Vec3A>) -> Self {
        Self {
            id,
            min: min.into(),
            max: max.into(),
        }
    }

    /// The extent along the x-axis.
    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// The extent along the y-axis.
    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// The extent along the z-axis.
    #[inline]
    pub fn depth(&self) -> f32 {
        self.max.z - self.min.z
    }

    /// The bounds of the tile.
    #[inline]
    pub fn aabb(&self) -> Aabb3d {
        Aabb3d::new(self.min, self.max)
    }

    /// The number of voxels along each axis of the tile.
    #[inline]
    pub fn grid_size(&self, cell_size: f32, cell_height: f32) -> UVec3 {
        self.aabb().grid_size(cell_size, cell_height)
    }
}

/// The tiles covering a scene.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TileSet {
    /// The world size of a tile's side.
    pub tile_size: f32,
    /// The number of tiles along the x-axis.
    pub columns: u32,
    /// The number of tiles along the z-axis.
    pub rows: u32,
    /// Every tile, ordered by row along z and then by column along x.
    pub tiles: Vec<Tile>,
}

impl TileSet {
    /// Covers the xz-bounds of `scene` with square tiles of `tile_size * cell_size` world units.
    ///
    /// Tiles start at the minimum corner of the scene, so the last row and column may reach past it.
    /// Every tile spans the full height of the scene plus [`TILE_VERTICAL_PADDING`] above and below.
    pub fn slice(scene: Aabb3d, build: &BuildInfo) -> Result<Self, TileSetError> {
        let tile_size = build.tile_size as f32 * build.cell_size;
        if tile_size.is_nan() || tile_size <= 0.0 {
            return Err(TileSetError::NonPositiveTileSize(tile_size));
        }
        let size = scene.size();
        if size.cmplt(Vec3A::ZERO).any() || !size.is_finite() {
            return Err(TileSetError::InvalidBounds(scene));
        }

        // An empty extent still gets a single tile.
        let columns = ((size.x / tile_size).ceil() as u32).max(1);
        let rows = ((size.z / tile_size).ceil() as u32).max(1);
        let min_y = scene.min.y - TILE_VERTICAL_PADDING;
        let max_y = scene.max.y + TILE_VERTICAL_PADDING;

        let mut tiles = Vec::with_capacity((columns * rows) as usize);
        for z in 0..rows {
            for x in 0..columns {
                let min_x = scene.min.x + x as f32 * tile_size;
                let min_z = scene.min.z + z as f32 * tile_size;
                tiles.push(Tile::new(
                    z * columns + x,
                    [min_x, min_y, min_z],
                    [min_x + tile_size, max_y, min_z + tile_size],
                ));
            }
        }
        tracing::info!(
            "Sliced scene into {} tiles ({columns}x{rows}) of {tile_size} units",
            tiles.len()
        );
        Ok(Self {
            tile_size,
            columns,
            rows,
            tiles,
        })
    }

    /// Looks up a tile by its id.
    pub fn get(&self, id: u32) -> Option<&Tile> {
        self.tiles.get(id as usize).filter(|tile| tile.id == id)
    }

    /// The number of tiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether there are no tiles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Errors returned by [`TileSet::slice`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TileSetError {
    /// `tile_size * cell_size` is zero, negative or NaN.
    #[error("Tile size must be positive, got {0}")]
    NonPositiveTileSize(f32),
    /// The scene bounds are inverted or not finite.
    #[error("Invalid scene bounds {0:?}")]
    InvalidBounds(Aabb3d),
}
