//! The bake settings file.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context as _, bail};
use navbake::{Agent, AreaType, BuildInfo, PersistOptions};
use serde::{Deserialize, Serialize};

/// Everything a bake needs besides the scene.
///
/// ```json
/// {
///     "agents": [{ "name": "Human", "height": 2.0, "radius": 0.4 }],
///     "build": { "cell_size": 0.2, "tile_size": 128 },
///     "persist": { "contours": true },
///     "areas": { "Water": 1, "Lawn": 4 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    /// One navigation mesh is baked per agent.
    pub agents: Vec<Agent>,
    /// The parameters shared by every agent.
    pub build: BuildInfo,
    /// Which optional artifacts are written.
    pub persist: PersistOptions,
    /// Area type bits per OBJ object name. Objects not listed are walkable.
    pub areas: HashMap<String, u8>,
}

impl BakeSettings {
    /// Reads and checks a settings file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("Invalid settings {}", path.display()))
    }

    /// Parses settings from JSON. Falls back to the default agent if none is listed.
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        if settings.agents.is_empty() {
            tracing::warn!("No agents configured, baking for the default agent");
            settings.agents.push(Agent::default());
        }
        for (i, agent) in settings.agents.iter().enumerate() {
            if agent.name.is_empty() {
                bail!("Agent #{i} has no name");
            }
            if settings.agents[..i].iter().any(|other| other.name == agent.name) {
                bail!("Agent `{}` is configured twice", agent.name);
            }
        }
        Ok(settings)
    }

    /// Looks up an agent by name.
    pub fn agent(&self, name: &str) -> anyhow::Result<&Agent> {
        self.agents
            .iter()
            .find(|agent| agent.name == name)
            .with_context(|| format!("No agent named `{name}` in the settings"))
    }

    /// The area type of the OBJ object called `name`.
    pub fn area_of(&self, name: &str) -> AreaType {
        self.areas
            .get(name)
            .map(|bits| AreaType::from(*bits))
            .unwrap_or(AreaType::WALKABLE)
    }
}
