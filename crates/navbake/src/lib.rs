#![doc = include_str!("../../../readme.md")]

mod compact_cell;
mod compact_heightfield;
mod compact_span;
mod config;
mod context;
mod contour_holes;
mod contours;
mod delaunay;
mod detail_mesh;
mod distance_field;
mod erosion;
pub mod geometry;
mod heightfield;
pub(crate) mod math;
#[cfg(feature = "serialize")]
mod persist;
mod poly_mesh;
mod pre_filter;
mod rasterize;
mod region;
mod region_merging;
mod span;
mod tile;
mod trimesh;
mod watershed;

pub use compact_cell::CompactCell;
pub use compact_heightfield::{CompactHeightfield, CompactHeightfieldError};
pub use compact_span::CompactSpan;
pub use config::{Agent, BuildInfo, NavmeshConfig, NavmeshConfigError};
pub use context::{BakeContext, BakeError, BakeReport, Stage, UnknownStage};
pub use contours::{Contour, ContourSet, ContourVertex, MIN_SPLIT_EDGE_LEN};
pub use detail_mesh::{DetailMesh, DetailMeshError, SubMesh};
pub use heightfield::{Heightfield, HeightfieldBuilder, HeightfieldBuilderError, SpanInsertionError};
pub use math::Aabb3d;
#[cfg(feature = "serialize")]
pub use persist::{ArtifactFormat, ArtifactStore, PersistOptions, TILES_FILE_NAME};
pub use poly_mesh::PolygonMesh;
pub use rasterize::RasterizationError;
pub use region::RegionId;
pub use span::{AreaType, Span, SpanKey, Spans};
pub use tile::{TILE_VERTICAL_PADDING, Tile, TileSet, TileSetError};
pub use trimesh::TriMesh;
