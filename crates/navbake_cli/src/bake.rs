//! Baking every (agent, tile) pair of a scene, and resuming single tiles from saved artifacts.

use std::{fmt, time::Duration};

use anyhow::Context as _;
use navbake::{ArtifactStore, BakeContext, BakeReport, NavmeshConfig, Stage, TileSet, TriMesh};

use crate::settings::BakeSettings;

/// Totals over every tile baked for one agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSummary {
    /// The name of the agent.
    pub agent: String,
    /// Tiles that went through the pipeline.
    pub tiles: usize,
    /// Tiles without any input triangles.
    pub empty_tiles: usize,
    /// The number of polygons over all tiles.
    pub polygons: usize,
    /// The number of detail triangles over all tiles.
    pub detail_triangles: usize,
    /// Contours dropped while tracing or merging holes.
    pub discarded_contours: usize,
    /// Contours that could not be triangulated.
    pub discarded_polygons: usize,
    /// Polygons left without detail triangles.
    pub discarded_detail_polygons: usize,
    /// Time spent in the pipeline stages.
    pub time: Duration,
}

impl AgentSummary {
    fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            ..Default::default()
        }
    }

    fn add(&mut self, report: &BakeReport) {
        self.tiles += 1;
        self.polygons += report.polygons;
        self.detail_triangles += report.detail_triangles;
        self.discarded_contours += report.discarded_contours;
        self.discarded_polygons += report.discarded_polygons;
        self.discarded_detail_polygons += report.discarded_detail_polygons;
        self.time += report.total_time();
    }

    /// Everything that was dropped.
    pub fn total_discarded(&self) -> usize {
        self.discarded_contours + self.discarded_polygons + self.discarded_detail_polygons
    }
}

impl fmt::Display for AgentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Agent {}: {} tiles baked ({} empty) in {:.2?}",
            self.agent, self.tiles, self.empty_tiles, self.time
        )?;
        writeln!(
            f,
            "  {} polygons, {} detail triangles",
            self.polygons, self.detail_triangles
        )?;
        write!(
            f,
            "  discarded: {} contours, {} polygons, {} detail polygons",
            self.discarded_contours, self.discarded_polygons, self.discarded_detail_polygons
        )
    }
}

/// Slices the scene, then bakes and saves every tile for every agent.
///
/// Previous artifacts of the baked agents are removed first.
pub fn bake_scene(
    scene: &TriMesh,
    settings: &BakeSettings,
    store: &ArtifactStore,
) -> anyhow::Result<Vec<AgentSummary>> {
    let aabb = scene.compute_aabb().context("Scene has no vertices")?;
    let tiles = TileSet::slice(aabb, &settings.build)?;
    let path = store.save_tiles(&tiles)?;
    tracing::info!("Wrote {}", path.display());
    let first_tile = *tiles.tiles.first().context("Scene produced no tiles")?;

    let mut summaries = Vec::with_capacity(settings.agents.len());
    for agent in &settings.agents {
        store.clear_agent(&agent.name)?;
        let config = NavmeshConfig::from_agent(agent, &settings.build);
        let mut ctx = BakeContext::new(config, first_tile, TriMesh::default())
            .with_context(|| format!("Invalid settings for agent `{}`", agent.name))?;
        let mut summary = AgentSummary::new(&agent.name);

        for tile in &tiles.tiles {
            let input = scene.clip_to_tile(&tile.aabb());
            if input.triangle_count() == 0 {
                tracing::debug!("Agent({}) - tile {}: empty, skipped", agent.name, tile.id);
                summary.empty_tiles += 1;
                continue;
            }
            ctx.load_tile(*tile, input);
            bake_and_save(&mut ctx, Stage::Voxelize, settings, store)
                .with_context(|| format!("Failed to bake tile {} for agent `{}`", tile.id, agent.name))?;
            summary.add(&ctx.report);
        }
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Loads the artifacts `from` depends on and re-runs the pipeline from there for a single tile.
pub fn resume_tile(
    scene: &TriMesh,
    settings: &BakeSettings,
    store: &ArtifactStore,
    agent: &str,
    tile: u32,
    from: Stage,
) -> anyhow::Result<AgentSummary> {
    let agent = settings.agent(agent)?;
    let tiles = store.load_tiles()?;
    let tile = *tiles
        .get(tile)
        .with_context(|| format!("No tile {tile} in {}", store.tiles_path().display()))?;

    let config = NavmeshConfig::from_agent(agent, &settings.build);
    let input = scene.clip_to_tile(&tile.aabb());
    let mut ctx = BakeContext::new(config, tile, input)?;
    store.load_inputs(&mut ctx, from)?;
    tracing::info!("Agent({}) - tile {}: resuming from {from}", agent.name, tile.id);
    bake_and_save(&mut ctx, from, settings, store)
        .with_context(|| format!("Failed to resume tile {} for agent `{}`", tile.id, agent.name))?;

    let mut summary = AgentSummary::new(&agent.name);
    summary.add(&ctx.report);
    Ok(summary)
}

fn bake_and_save(
    ctx: &mut BakeContext,
    from: Stage,
    settings: &BakeSettings,
    store: &ArtifactStore,
) -> anyhow::Result<()> {
    ctx.run_from_with(from, |ctx, stage| {
        if settings.persist.should_save(stage) {
            store.save_stage(ctx, stage)?;
        }
        anyhow::Ok(())
    })
}
