//! Bakes navigation meshes for OBJ scenes.
//!
//! Set `RUST_LOG` to control the log output, e.g. `RUST_LOG=navbake=debug`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use navbake::{ArtifactFormat, ArtifactStore, Stage, TileSet};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use crate::settings::BakeSettings;

mod bake;
mod scene;
mod settings;
#[cfg(test)]
mod test_support;

/// Bakes walkable navigation meshes from level geometry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bake every tile of a scene for every agent
    Bake {
        /// Scene geometry (OBJ format)
        #[arg(long)]
        scene: PathBuf,
        /// Bake settings (JSON)
        #[arg(long)]
        settings: PathBuf,
        /// Directory receiving the artifacts
        #[arg(long)]
        out: PathBuf,
        /// Encoding of the artifacts
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Re-run a single tile from a saved artifact
    Resume {
        /// Scene geometry (OBJ format)
        #[arg(long)]
        scene: PathBuf,
        /// Bake settings (JSON)
        #[arg(long)]
        settings: PathBuf,
        /// Directory holding the artifacts of a previous bake
        #[arg(long)]
        out: PathBuf,
        /// Encoding of the artifacts
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Name of the agent to resume
        #[arg(long)]
        agent: String,
        /// Id of the tile to resume
        #[arg(long)]
        tile: u32,
        /// First stage to run again, e.g. `Contours` or `build-polygons`
        #[arg(long)]
        from: Stage,
    },
    /// Print how a scene is sliced into tiles
    Tiles {
        /// Scene geometry (OBJ format)
        #[arg(long)]
        scene: PathBuf,
        /// Bake settings (JSON)
        #[arg(long)]
        settings: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Json,
    Binary,
}

impl From<Format> for ArtifactFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ArtifactFormat::Json,
            Format::Binary => ArtifactFormat::Binary,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Bake {
            scene,
            settings,
            out,
            format,
        } => run_bake(&scene, &settings, &out, format.into()),
        Command::Resume {
            scene,
            settings,
            out,
            format,
            agent,
            tile,
            from,
        } => run_resume(&scene, &settings, &out, format.into(), &agent, tile, from),
        Command::Tiles { scene, settings } => print_tiles(&scene, &settings),
    }
}

fn run_bake(scene: &Path, settings: &Path, out: &Path, format: ArtifactFormat) -> Result<()> {
    let settings = BakeSettings::load(settings)?;
    let scene = scene::load_scene(scene, &settings)?;
    let store = ArtifactStore::new(out, format);
    let summaries = bake::bake_scene(&scene, &settings, &store)?;
    for summary in &summaries {
        println!("{summary}");
    }
    let discarded: usize = summaries.iter().map(|s| s.total_discarded()).sum();
    if discarded > 0 {
        tracing::warn!("{discarded} contours or polygons were discarded, see the summaries above");
    }
    println!("Artifacts written to {}", out.display());
    Ok(())
}

fn run_resume(
    scene: &Path,
    settings: &Path,
    out: &Path,
    format: ArtifactFormat,
    agent: &str,
    tile: u32,
    from: Stage,
) -> Result<()> {
    let settings = BakeSettings::load(settings)?;
    let scene = scene::load_scene(scene, &settings)?;
    let store = ArtifactStore::new(out, format);
    let summary = bake::resume_tile(&scene, &settings, &store, agent, tile, from)?;
    println!("{summary}");
    Ok(())
}

fn print_tiles(scene: &Path, settings: &Path) -> Result<()> {
    let settings = BakeSettings::load(settings)?;
    let scene = scene::load_scene(scene, &settings)?;
    let aabb = scene.compute_aabb().context("Scene has no vertices")?;
    let tiles = TileSet::slice(aabb, &settings.build)?;
    println!(
        "{} tiles ({}x{}) of {} units",
        tiles.len(),
        tiles.columns,
        tiles.rows,
        tiles.tile_size
    );
    for tile in &tiles.tiles {
        let triangles = scene.clip_to_tile(&tile.aabb()).triangle_count();
        println!(
            "tile{}: min {} max {} ({triangles} triangles)",
            tile.id, tile.min, tile.max
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_resume() {
        let args = Args::try_parse_from([
            "navbake", "resume", "--scene", "a.obj", "--settings", "s.json", "--out", "out",
            "--agent", "Human", "--tile", "3", "--from", "poly-mesh", "--format", "binary",
        ])
        .unwrap();
        let Command::Resume {
            tile, from, format, ..
        } = args.command
        else {
            panic!("expected resume, got {:?}", args.command);
        };
        assert_eq!(tile, 3);
        assert_eq!(from, Stage::BuildPolygons);
        assert_eq!(ArtifactFormat::from(format), ArtifactFormat::Binary);
    }

    #[test]
    fn rejects_unknown_stage() {
        let result = Args::try_parse_from([
            "navbake", "resume", "--scene", "a.obj", "--settings", "s.json", "--out", "out",
            "--agent", "Human", "--tile", "0", "--from", "Pathfinding",
        ]);
        assert!(result.is_err());
    }
}
