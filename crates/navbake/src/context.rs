//! The per-bake state threaded through every stage of the pipeline.

use std::{fmt, str::FromStr, time::Duration, time::Instant};

use thiserror::Error;

use crate::{
    CompactHeightfield, ContourSet, DetailMesh, DetailMeshError, Heightfield, HeightfieldBuilder,
    HeightfieldBuilderError, PolygonMesh, TriMesh,
    compact_heightfield::CompactHeightfieldError,
    config::{NavmeshConfig, NavmeshConfigError},
    rasterize::RasterizationError,
    region::RegionId,
    tile::Tile,
};

/// A step of the pipeline, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// Rasterizes the input triangles into a [`Heightfield`] and filters it.
    Voxelize,
    /// Packs the walkable spans into a [`CompactHeightfield`].
    Compact,
    /// Erodes the walkable area and partitions it into regions.
    SegmentRegions,
    /// Traces the region outlines into a [`ContourSet`].
    TraceContours,
    /// Triangulates the contours into a [`PolygonMesh`].
    BuildPolygons,
    /// Samples the surface heights into a [`DetailMesh`].
    BuildDetailMesh,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Voxelize,
        Stage::Compact,
        Stage::SegmentRegions,
        Stage::TraceContours,
        Stage::BuildPolygons,
        Stage::BuildDetailMesh,
    ];

    /// The name of the artifact this stage produces.
    pub fn artifact_name(self) -> &'static str {
        match self {
            Stage::Voxelize => "SolidHeightField",
            Stage::Compact => "CompactHeightField",
            Stage::SegmentRegions => "Regions",
            Stage::TraceContours => "Contours",
            Stage::BuildPolygons => "PolyMesh",
            Stage::BuildDetailMesh => "DetailMesh",
        }
    }

    /// The stages whose artifacts must be present to run this stage.
    pub fn inputs(self) -> &'static [Stage] {
        match self {
            Stage::Voxelize => &[],
            Stage::Compact => &[Stage::Voxelize],
            Stage::SegmentRegions => &[Stage::Compact],
            Stage::TraceContours => &[Stage::SegmentRegions],
            Stage::BuildPolygons => &[Stage::TraceContours],
            Stage::BuildDetailMesh => &[Stage::SegmentRegions, Stage::BuildPolygons],
        }
    }

    /// This stage and every stage after it.
    pub fn and_following(self) -> impl Iterator<Item = Stage> {
        Self::ALL.into_iter().filter(move |stage| *stage >= self)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_name())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace(['-', '_'], "").to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| {
                normalized == stage.artifact_name().to_ascii_lowercase()
                    || normalized == format!("{stage:?}").to_ascii_lowercase()
            })
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Returned when parsing a [`Stage`] from an unknown name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown stage `{0}`")]
pub struct UnknownStage(pub String);

/// What happened during a bake.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BakeReport {
    /// The number of spans in the solid heightfield after filtering.
    pub solid_spans: usize,
    /// The number of walkable spans in the compact heightfield.
    pub compact_spans: usize,
    /// The number of spans made unwalkable by the agent radius.
    pub eroded_spans: usize,
    /// The number of regions.
    pub regions: usize,
    /// The number of contours after hole merging.
    pub contours: usize,
    /// The number of contours that were dropped.
    pub discarded_contours: usize,
    /// The number of polygons.
    pub polygons: usize,
    /// The number of contours that could not be fully triangulated.
    pub discarded_polygons: usize,
    /// The number of detail triangles.
    pub detail_triangles: usize,
    /// The number of polygons without detail triangles.
    pub discarded_detail_polygons: usize,
    /// How long each stage took.
    pub timings: Vec<(Stage, Duration)>,
}

impl BakeReport {
    /// Everything that was dropped over the whole bake.
    pub fn total_discarded(&self) -> usize {
        self.discarded_contours + self.discarded_polygons + self.discarded_detail_polygons
    }

    /// The sum of every stage's duration.
    pub fn total_time(&self) -> Duration {
        self.timings.iter().map(|(_, duration)| *duration).sum()
    }
}

/// The state of a single bake: one agent, one tile.
///
/// Each stage reads the output of the stages before it from its slot and writes its own output
/// into the next slot. Slots can also be filled from persisted artifacts to resume a bake.
#[derive(Debug, Clone)]
pub struct BakeContext {
    /// The parameters of the bake.
    pub config: NavmeshConfig,
    /// The tile being baked.
    pub tile: Tile,
    /// The triangles overlapping the tile.
    pub input: TriMesh,
    /// The output of [`Stage::Voxelize`].
    pub heightfield: Option<Heightfield>,
    /// The output of [`Stage::Compact`], updated in place by [`Stage::SegmentRegions`].
    pub compact: Option<CompactHeightfield>,
    /// The output of [`Stage::TraceContours`].
    pub contours: Option<ContourSet>,
    /// The output of [`Stage::BuildPolygons`].
    pub polygons: Option<PolygonMesh>,
    /// The output of [`Stage::BuildDetailMesh`].
    pub detail: Option<DetailMesh>,
    /// Statistics of the stages that ran so far.
    pub report: BakeReport,
    segmented: bool,
}

impl BakeContext {
    /// Creates a context for baking `input` inside `tile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: NavmeshConfig, tile: Tile, input: TriMesh) -> Result<Self, BakeError> {
        config.validate()?;
        Ok(Self {
            config,
            tile,
            input,
            heightfield: None,
            compact: None,
            contours: None,
            polygons: None,
            detail: None,
            report: BakeReport::default(),
            segmented: false,
        })
    }

    /// Drops every stage output and the report.
    pub fn clear(&mut self) {
        self.heightfield = None;
        self.compact = None;
        self.contours = None;
        self.polygons = None;
        self.detail = None;
        self.report = BakeReport::default();
        self.segmented = false;
    }

    /// Clears the context and points it at another tile.
    pub fn load_tile(&mut self, tile: Tile, input: TriMesh) {
        self.clear();
        self.tile = tile;
        self.input = input;
    }

    /// Stores a compact heightfield that already went through [`Stage::SegmentRegions`].
    pub fn set_segmented(&mut self, compact: CompactHeightfield) {
        self.compact = Some(compact);
        self.segmented = true;
    }

    /// Whether the output of `stage` is available.
    pub fn has_output(&self, stage: Stage) -> bool {
        match stage {
            Stage::Voxelize => self.heightfield.is_some(),
            Stage::Compact => self.compact.is_some(),
            Stage::SegmentRegions => self.compact.is_some() && self.segmented,
            Stage::TraceContours => self.contours.is_some(),
            Stage::BuildPolygons => self.polygons.is_some(),
            Stage::BuildDetailMesh => self.detail.is_some(),
        }
    }

    /// Runs the whole pipeline.
    pub fn run(&mut self) -> Result<(), BakeError> {
        self.run_from(Stage::Voxelize)
    }

    /// Runs `from` and every stage after it, reusing the outputs already in the context as inputs.
    pub fn run_from(&mut self, from: Stage) -> Result<(), BakeError> {
        self.run_from_with(from, |_, _| Ok::<_, BakeError>(()))
    }

    /// Like [`BakeContext::run_from`], but calls `after_stage` once each stage is done.
    pub fn run_from_with<E: From<BakeError>>(
        &mut self,
        from: Stage,
        mut after_stage: impl FnMut(&Self, Stage) -> Result<(), E>,
    ) -> Result<(), E> {
        for stage in from.and_following() {
            self.run_stage(stage)?;
            after_stage(self, stage)?;
        }
        Ok(())
    }

    /// Runs a single stage.
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), BakeError> {
        if let Some(missing) = stage.inputs().iter().find(|input| !self.has_output(**input)) {
            return Err(BakeError::MissingInput {
                stage,
                input: *missing,
            });
        }
        tracing::debug!("Agent({}) - tile {}: {stage} start", self.config.agent, self.tile.id);
        let start = Instant::now();
        match stage {
            Stage::Voxelize => self.voxelize()?,
            Stage::Compact => self.compact()?,
            Stage::SegmentRegions => self.segment_regions()?,
            Stage::TraceContours => self.trace_contours()?,
            Stage::BuildPolygons => self.build_polygons()?,
            Stage::BuildDetailMesh => self.build_detail_mesh()?,
        }
        let elapsed = start.elapsed();
        tracing::debug!(
            "Agent({}) - tile {}: {stage} took {} ms",
            self.config.agent,
            self.tile.id,
            elapsed.as_millis()
        );
        self.report.timings.retain(|(s, _)| *s != stage);
        self.report.timings.push((stage, elapsed));
        Ok(())
    }

    fn voxelize(&mut self) -> Result<(), BakeError> {
        let config = &self.config;
        let mut trimesh = self.input.clone();
        trimesh.mark_walkable_triangles(config.walkable_slope_angle);

        let mut heightfield = HeightfieldBuilder {
            aabb: self.tile.aabb(),
            cell_size: config.cell_size,
            cell_height: config.cell_height,
        }
        .build()?;
        heightfield.rasterize_triangles(&trimesh)?;
        heightfield.merge_contiguous_spans();

        // Remove overhangs left by the rasterization and spans the agent cannot stand on.
        heightfield.filter_low_hanging_walkable_obstacles(config.walkable_climb);
        heightfield.filter_ledge_spans(config.walkable_height, config.walkable_climb);
        heightfield.filter_walkable_low_height_spans(config.walkable_height);

        self.report.solid_spans = heightfield.span_count();
        tracing::info!("Summary: solid heightfield span count: {}", self.report.solid_spans);
        self.heightfield = Some(heightfield);
        self.segmented = false;
        Ok(())
    }

    fn compact(&mut self) -> Result<(), BakeError> {
        let heightfield = self.heightfield.clone().ok_or(BakeError::MissingInput {
            stage: Stage::Compact,
            input: Stage::Voxelize,
        })?;
        let compact =
            heightfield.into_compact(self.config.walkable_height, self.config.walkable_climb)?;
        self.report.compact_spans = compact.walkable_span_count();
        tracing::info!("Summary: compact heightfield span count: {}", self.report.compact_spans);
        self.compact = Some(compact);
        self.segmented = false;
        Ok(())
    }

    fn segment_regions(&mut self) -> Result<(), BakeError> {
        let config = &self.config;
        let compact = self.compact.as_mut().ok_or(BakeError::MissingInput {
            stage: Stage::SegmentRegions,
            input: Stage::Compact,
        })?;
        if compact.walkable_span_count() <= config.min_region_size {
            tracing::info!(
                "Only {} walkable spans, not enough for a region",
                compact.walkable_span_count()
            );
            compact.max_region = RegionId::NONE;
            for span in &mut compact.spans {
                span.region = RegionId::NONE;
            }
        } else {
            self.report.eroded_spans =
                compact.erode_walkable_area(config.walkable_radius, config.blur_distance_threshold);
            compact.build_distance_field(config.blur_distance_threshold);
            compact.build_regions(config.min_region_size, config.merge_region_size);
        }
        self.report.regions = compact.region_count();
        tracing::info!("Summary: region count: {}", self.report.regions);
        self.segmented = true;
        Ok(())
    }

    fn trace_contours(&mut self) -> Result<(), BakeError> {
        let compact = self.compact.as_ref().ok_or(BakeError::MissingInput {
            stage: Stage::TraceContours,
            input: Stage::SegmentRegions,
        })?;
        let contours =
            compact.build_contours(self.config.deviation_threshold, self.config.max_edge_len);
        self.report.contours = contours.contours.len();
        self.report.discarded_contours = contours.discarded;
        tracing::info!(
            "Summary: contour count: {}, discarded: {}",
            self.report.contours,
            self.report.discarded_contours
        );
        self.contours = Some(contours);
        Ok(())
    }

    fn build_polygons(&mut self) -> Result<(), BakeError> {
        let contours = self.contours.as_ref().ok_or(BakeError::MissingInput {
            stage: Stage::BuildPolygons,
            input: Stage::TraceContours,
        })?;
        let polygons = contours.build_polygon_mesh(
            self.config.max_vertices_per_polygon,
            self.config.max_edge_error,
        );
        self.report.polygons = polygons.polygon_count();
        self.report.discarded_polygons = polygons.discarded;
        tracing::info!(
            "Summary: polygon count: {}, vertex count: {}, discarded: {}",
            self.report.polygons,
            polygons.vertices.len(),
            self.report.discarded_polygons
        );
        self.polygons = Some(polygons);
        Ok(())
    }

    fn build_detail_mesh(&mut self) -> Result<(), BakeError> {
        let (Some(polygons), Some(compact)) = (&self.polygons, &self.compact) else {
            return Err(BakeError::MissingInput {
                stage: Stage::BuildDetailMesh,
                input: Stage::BuildPolygons,
            });
        };
        let detail = DetailMesh::new(
            polygons,
            compact,
            self.config.detail_sample_dist,
            self.config.detail_sample_max_error,
        )?;
        self.report.detail_triangles = detail.triangle_count();
        self.report.discarded_detail_polygons = detail.discarded;
        tracing::info!(
            "Summary: detail triangle count: {}, discarded polygons: {}",
            self.report.detail_triangles,
            self.report.discarded_detail_polygons
        );
        self.detail = Some(detail);
        Ok(())
    }
}

/// Errors that abort a bake.
#[derive(Error, Debug)]
pub enum BakeError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] NavmeshConfigError),
    /// The heightfield could not be allocated for the tile.
    #[error(transparent)]
    Heightfield(#[from] HeightfieldBuilderError),
    /// The input triangles could not be rasterized.
    #[error(transparent)]
    Rasterization(#[from] RasterizationError),
    /// The compact heightfield could not be built.
    #[error(transparent)]
    Compact(#[from] CompactHeightfieldError),
    /// The detail mesh could not be built.
    #[error(transparent)]
    DetailMesh(#[from] DetailMeshError),
    /// A stage was run before the stages it depends on.
    #[error("Cannot run {stage} without the output of {input}")]
    MissingInput {
        /// The stage that was run.
        stage: Stage,
        /// The missing input.
        input: Stage,
    },
}
