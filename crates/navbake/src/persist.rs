//! Saving and loading of stage outputs, so a bake can be inspected or resumed later.
//!
//! Artifacts are laid out as `<root>/<agent>/<stage>/tile<id>.<ext>`, with the tile set stored
//! next to the agents in `<root>/tiles.json`.

use std::{
    fs,
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    context::{BakeContext, Stage},
    tile::TileSet,
};

/// The name of the file holding the tile set.
pub const TILES_FILE_NAME: &str = "tiles.json";

/// How artifacts are encoded on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// Pretty-printed JSON. Slow and large, but readable.
    #[default]
    Json,
    /// Gzip compressed bincode.
    Binary,
}

impl ArtifactFormat {
    /// The file extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Binary => "bin.gz",
        }
    }

    /// Encodes `value` in this format.
    pub fn encode<T: Serialize>(self, value: &T) -> anyhow::Result<Vec<u8>> {
        match self {
            ArtifactFormat::Json => Ok(serde_json::to_vec_pretty(value)?),
            ArtifactFormat::Binary => {
                let bincode_bytes =
                    bincode::serde::encode_to_vec(value, bincode::config::standard())?;
                let mut gz = GzEncoder::new(Vec::new(), Compression::default());
                gz.write_all(&bincode_bytes)?;
                Ok(gz.finish()?)
            }
        }
    }

    /// Decodes a value previously encoded with [`ArtifactFormat::encode`].
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> anyhow::Result<T> {
        match self {
            ArtifactFormat::Json => Ok(serde_json::from_slice(bytes)?),
            ArtifactFormat::Binary => {
                let mut gz = GzDecoder::new(bytes);
                let mut bincode_bytes = Vec::new();
                gz.read_to_end(&mut bincode_bytes)?;
                let (value, _len): (T, usize) =
                    bincode::serde::decode_from_slice(&bincode_bytes, bincode::config::standard())?;
                Ok(value)
            }
        }
    }
}

/// Which optional artifacts are written during a bake.
///
/// The polygon mesh and the detail mesh are always written.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    /// Write the filtered solid heightfield.
    pub solid: bool,
    /// Write the compact heightfield, before and after region segmentation.
    pub compact: bool,
    /// Write the contour set.
    pub contours: bool,
}

impl PersistOptions {
    /// Saves every artifact.
    pub fn all() -> Self {
        Self {
            solid: true,
            compact: true,
            contours: true,
        }
    }

    /// Whether the output of `stage` should be written.
    pub fn should_save(&self, stage: Stage) -> bool {
        match stage {
            Stage::Voxelize => self.solid,
            Stage::Compact | Stage::SegmentRegions => self.compact,
            Stage::TraceContours => self.contours,
            Stage::BuildPolygons | Stage::BuildDetailMesh => true,
        }
    }
}

/// A directory of baked artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    /// The directory holding every agent's artifacts.
    pub root: PathBuf,
    /// The encoding of the artifacts.
    pub format: ArtifactFormat,
}

impl ArtifactStore {
    /// Creates a store rooted at `root`. Nothing is written until something is saved.
    pub fn new(root: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// The directory holding the artifacts of `agent`.
    pub fn agent_dir(&self, agent: &str) -> PathBuf {
        self.root.join(agent)
    }

    /// The file holding the output of `stage` for a tile.
    pub fn artifact_path(&self, agent: &str, tile: u32, stage: Stage) -> PathBuf {
        self.agent_dir(agent)
            .join(stage.artifact_name())
            .join(format!("tile{tile}.{}", self.format.extension()))
    }

    /// Removes every artifact of `agent`, so a fresh bake does not mix with stale tiles.
    pub fn clear_agent(&self, agent: &str) -> anyhow::Result<()> {
        let dir = self.agent_dir(agent);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }
        Ok(())
    }

    /// Writes `value` to `path`, creating the parent directories.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let bytes = self
            .format
            .encode(value)
            .with_context(|| format!("Failed to encode {}", path.display()))?;
        fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Reads a value written by [`ArtifactStore::save`].
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> anyhow::Result<T> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.format
            .decode(&bytes)
            .with_context(|| format!("Failed to decode {}", path.display()))
    }

    /// Writes the output of `stage` held by the context.
    ///
    /// Returns the path of the written file.
    pub fn save_stage(&self, ctx: &BakeContext, stage: Stage) -> anyhow::Result<PathBuf> {
        let path = self.artifact_path(&ctx.config.agent, ctx.tile.id, stage);
        let missing = || format!("{stage} has no output to save");
        match stage {
            Stage::Voxelize => self.save(&path, ctx.heightfield.as_ref().with_context(missing)?),
            Stage::Compact | Stage::SegmentRegions => {
                self.save(&path, ctx.compact.as_ref().with_context(missing)?)
            }
            Stage::TraceContours => self.save(&path, ctx.contours.as_ref().with_context(missing)?),
            Stage::BuildPolygons => self.save(&path, ctx.polygons.as_ref().with_context(missing)?),
            Stage::BuildDetailMesh => self.save(&path, ctx.detail.as_ref().with_context(missing)?),
        }?;
        tracing::debug!("Saved {}", path.display());
        Ok(path)
    }

    /// Loads the output of `stage` into the context.
    pub fn load_stage(&self, ctx: &mut BakeContext, stage: Stage) -> anyhow::Result<()> {
        let path = self.artifact_path(&ctx.config.agent, ctx.tile.id, stage);
        match stage {
            Stage::Voxelize => ctx.heightfield = Some(self.load(&path)?),
            Stage::Compact => ctx.compact = Some(self.load(&path)?),
            Stage::SegmentRegions => ctx.set_segmented(self.load(&path)?),
            Stage::TraceContours => ctx.contours = Some(self.load(&path)?),
            Stage::BuildPolygons => ctx.polygons = Some(self.load(&path)?),
            Stage::BuildDetailMesh => ctx.detail = Some(self.load(&path)?),
        }
        tracing::debug!("Loaded {}", path.display());
        Ok(())
    }

    /// Loads every artifact `stage` needs, so the bake can continue with [`BakeContext::run_from`].
    pub fn load_inputs(&self, ctx: &mut BakeContext, stage: Stage) -> anyhow::Result<()> {
        for input in stage.inputs() {
            self.load_stage(ctx, *input)
                .with_context(|| format!("Failed to load the input of {stage}"))?;
        }
        Ok(())
    }

    /// The path of the tile set file.
    pub fn tiles_path(&self) -> PathBuf {
        self.root.join(TILES_FILE_NAME)
    }

    /// Writes the tile set as JSON, whatever the artifact format.
    pub fn save_tiles(&self, tiles: &TileSet) -> anyhow::Result<PathBuf> {
        let path = self.tiles_path();
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let json = serde_json::to_string_pretty(tiles)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Reads the tile set written by [`ArtifactStore::save_tiles`].
    pub fn load_tiles(&self) -> anyhow::Result<TileSet> {
        let path = self.tiles_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_per_agent_and_stage() {
        let store = ArtifactStore::new("out", ArtifactFormat::Binary);
        assert_eq!(
            store.artifact_path("Human", 3, Stage::TraceContours),
            Path::new("out/Human/Contours/tile3.bin.gz")
        );
        let store = ArtifactStore::new("out", ArtifactFormat::Json);
        assert_eq!(
            store.artifact_path("Human", 0, Stage::BuildPolygons),
            Path::new("out/Human/PolyMesh/tile0.json")
        );
    }

    #[test]
    fn meshes_are_always_saved() {
        let options = PersistOptions::default();
        assert!(!options.should_save(Stage::Voxelize));
        assert!(!options.should_save(Stage::SegmentRegions));
        assert!(!options.should_save(Stage::TraceContours));
        assert!(options.should_save(Stage::BuildPolygons));
        assert!(options.should_save(Stage::BuildDetailMesh));
        assert!(Stage::ALL.iter().all(|stage| PersistOptions::all().should_save(*stage)));
    }

    #[test]
    fn binary_format_is_compressed() {
        let value = vec![7_u32; 4096];
        let bytes = ArtifactFormat::Binary.encode(&value).unwrap();
        assert!(bytes.len() < 4096);
        let decoded: Vec<u32> = ArtifactFormat::Binary.decode(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result: anyhow::Result<Vec<u32>> = ArtifactFormat::Binary.decode(b"not gzip");
        assert!(result.is_err());
        let result: anyhow::Result<Vec<u32>> = ArtifactFormat::Json.decode(b"{");
        assert!(result.is_err());
    }
}
