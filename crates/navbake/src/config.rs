use thiserror::Error;

/// The movement constraints of a single kind of agent, as authored in world units.
///
/// A bake produces one navigation mesh per agent, converted to voxel units by [`NavmeshConfig::from_agent`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct Agent {
    /// The name of the agent. Used to separate the persisted artifacts of different agents.
    pub name: String,
    /// The height of the agent's cylinder. `[Limit: > 0] [Units: wu]`
    pub height: f32,
    /// The radius of the agent's cylinder. `[Limit: >= 0] [Units: wu]`
    pub radius: f32,
    /// The steepest slope the agent can walk on. `[Limit: 0 <= value < 90] [Units: degrees]`
    pub max_slope: f32,
    /// The highest ledge the agent can step up or down. `[Limit: >= 0] [Units: wu]`
    pub max_step_height: f32,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: "Human".to_string(),
            height: 2.0,
            radius: 0.4,
            max_slope: 45.0,
            max_step_height: 0.7,
        }
    }
}

/// The agent-independent parameters of a bake.
///
/// Usually loaded from a settings file and shared by every agent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct BuildInfo {
    /// The xz-plane voxel size. `[Limit: > 0] [Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Limit: > 0] [Units: wu]`
    pub cell_height: f32,
    /// The width and depth of a tile. `[Limit: > 0] [Units: vx]`
    pub tile_size: u16,
    /// Distances at or below this value are not blurred. `[Limit: >= 0] [Units: distance field]`
    pub blur_distance_threshold: u16,
    /// Isolated regions with fewer spans are removed. `[Limit: >= 0] [Units: spans]`
    pub min_region_size: usize,
    /// Regions with fewer spans are merged into a neighbor. `[Limit: >= 0] [Units: spans]`
    pub merge_region_size: usize,
    /// How far a simplified contour may stray from the raw one. `[Limit: >= 0] [Units: vx]`
    pub deviation_threshold: f32,
    /// The longest edge of a simplified contour. `[Limit: >= 0] [Units: vx]`
    ///
    /// Values up to [`MIN_SPLIT_EDGE_LEN`](crate::MIN_SPLIT_EDGE_LEN) disable edge splitting.
    pub max_edge_length: u16,
    /// How far around a polygon the detail mesh looks for surface heights. `[Limit: >= 1] [Units: vx]`
    pub max_edge_error: f32,
    /// The most vertices a polygon may have. `[Limit: 3..=10]`
    pub vertices_per_poly: usize,
    /// The spacing of the detail height samples. `[Limit: >= 0] [Units: wu]`
    pub sample_distance: f32,
    /// The largest tolerated distance between the detail mesh and the surface. `[Limit: >= 0] [Units: wu]`
    pub max_sample_error: f32,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            cell_size: 0.2,
            cell_height: 0.3,
            tile_size: 128,
            blur_distance_threshold: 2,
            min_region_size: 8,
            merge_region_size: 20,
            deviation_threshold: 1.5,
            max_edge_length: 12,
            max_edge_error: 12.0,
            vertices_per_poly: 6,
            sample_distance: 12.0,
            max_sample_error: 12.0,
        }
    }
}

/// Specifies the configuration used for a single bake. Usually created with [`NavmeshConfig::from_agent`].
///
/// This is an aggregation of the parameters used by the different stages of the pipeline.
/// Units are in voxels (vx) or world units (wu). The size of a voxel is defined by
/// [`NavmeshConfig::cell_size`] and [`NavmeshConfig::cell_height`].
///
/// > Note:
/// >
/// > If your world uses meters as units, a reasonable starting point for a human-sized agent
/// > is a radius of 0.4 and a height of 2.0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NavmeshConfig {
    /// The name of the agent this configuration was derived from.
    pub agent: String,

    /// The xz-plane cell size to use for fields. `[Limit: > 0] [Units: wu]`
    ///
    /// Usually derived from the agent radius, a good starting point is `radius / 2`.
    /// Smaller values increase the resolution of the mesh but the bake time grows quickly.
    pub cell_size: f32,

    /// The y-axis cell size to use for fields. `[Limit: > 0] [Units: wu]`
    ///
    /// Smaller values make sure that small curbs and steps still connect the areas on both sides.
    pub cell_height: f32,

    /// The width and depth of a tile on the xz-plane. `[Limit: > 0] [Units: vx]`
    pub tile_size: u16,

    /// The maximum slope that is considered walkable. `[Limits: 0 <= value < 0.5*π] [Units: Radians]`
    pub walkable_slope_angle: f32,

    /// Minimum floor to 'ceiling' height that will still allow the floor area to be considered walkable. `[Limit: >= 3] [Units: vx]`
    ///
    /// Permits detection of overhangs in the source geometry that make the geometry below un-walkable.
    pub walkable_height: u16,

    /// Maximum ledge height that is considered to still be traversable. `[Limit: >=0] [Units: vx]`
    ///
    /// Allows the mesh to flow over low lying obstructions such as curbs and up/down stairways.
    pub walkable_climb: u16,

    /// The distance to erode the walkable area away from obstructions. `[Limit: >=0] [Units: vx]`
    pub walkable_radius: u16,

    /// Distances at or below this value are left alone by the distance field blur. `[Limit: >= 0] [Units: distance field]`
    pub blur_distance_threshold: u16,

    /// The minimum number of spans allowed to form an isolated island region. `[Limit: >=0] [Units: spans]`
    ///
    /// Any regions that are smaller than this will be removed.
    pub min_region_size: usize,

    /// Any regions with a span count smaller than this value will, if possible, be merged with larger regions. `[Limit: >=0] [Units: spans]`
    pub merge_region_size: usize,

    /// The maximum distance a simplified contour's border edges should deviate from the original raw contour. `[Limit: >=0] [Units: vx]`
    pub deviation_threshold: f32,

    /// The maximum allowed length for contour edges along the border of the mesh. `[Limit: >=0] [Units: vx]`
    ///
    /// Values up to [`MIN_SPLIT_EDGE_LEN`](crate::MIN_SPLIT_EDGE_LEN) disable edge splitting.
    pub max_edge_len: u16,

    /// The largest distance the detail mesh searches around a polygon for a surface height. `[Limit: >= 1] [Units: vx]`
    pub max_edge_error: f32,

    /// The maximum number of vertices allowed for polygons generated during the contour to polygon conversion process. `[Limit: 3..=10]`
    pub max_vertices_per_polygon: usize,

    /// Sets the sampling distance to use when generating the detail mesh. `[Limits: 0 or >= 0.9] [Units: wu]`
    ///
    /// A value of 0 disables interior sampling.
    pub detail_sample_dist: f32,

    /// The maximum distance the detail mesh surface should deviate from heightfield data. `[Limit: >=0] [Units: wu]`
    pub detail_sample_max_error: f32,
}

impl NavmeshConfig {
    /// Converts the authored agent and build parameters into the voxel units used by the pipeline.
    pub fn from_agent(agent: &Agent, build: &BuildInfo) -> Self {
        Self {
            agent: agent.name.clone(),
            cell_size: build.cell_size,
            cell_height: build.cell_height,
            tile_size: build.tile_size,
            walkable_slope_angle: agent.max_slope.abs().to_radians(),
            walkable_height: (agent.height / build.cell_height).ceil() as u16,
            walkable_climb: (agent.max_step_height / build.cell_height).ceil() as u16,
            walkable_radius: (agent.radius / build.cell_size).floor() as u16,
            blur_distance_threshold: build.blur_distance_threshold,
            min_region_size: build.min_region_size,
            merge_region_size: build.merge_region_size,
            deviation_threshold: build.deviation_threshold,
            max_edge_len: build.max_edge_length,
            max_edge_error: build.max_edge_error,
            max_vertices_per_polygon: build.vertices_per_poly,
            detail_sample_dist: build.sample_distance,
            detail_sample_max_error: build.max_sample_error,
        }
    }

    /// The cosine of [`NavmeshConfig::walkable_slope_angle`], the smallest walkable normal y-component.
    #[inline]
    pub fn walkable_slope_cos(&self) -> f32 {
        self.walkable_slope_angle.cos()
    }

    /// Checks that the parameters can be used for a bake.
    pub fn validate(&self) -> Result<(), NavmeshConfigError> {
        if self.cell_size.is_nan() || self.cell_size <= 0.0 {
            return Err(NavmeshConfigError::NonPositiveCellSize {
                name: "cell_size",
                value: self.cell_size,
            });
        }
        if self.cell_height.is_nan() || self.cell_height <= 0.0 {
            return Err(NavmeshConfigError::NonPositiveCellSize {
                name: "cell_height",
                value: self.cell_height,
            });
        }
        if self.tile_size == 0 {
            return Err(NavmeshConfigError::ZeroTileSize);
        }
        if !(3..=10).contains(&self.max_vertices_per_polygon) {
            return Err(NavmeshConfigError::VerticesPerPolygon(
                self.max_vertices_per_polygon,
            ));
        }
        if self.walkable_height == 0 {
            return Err(NavmeshConfigError::ZeroWalkableHeight);
        }
        if !(0.0..std::f32::consts::FRAC_PI_2).contains(&self.walkable_slope_angle) {
            return Err(NavmeshConfigError::SlopeAngle(
                self.walkable_slope_angle.to_degrees(),
            ));
        }
        for (name, value) in [
            ("deviation_threshold", self.deviation_threshold),
            ("max_edge_error", self.max_edge_error),
            ("detail_sample_dist", self.detail_sample_dist),
            ("detail_sample_max_error", self.detail_sample_max_error),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(NavmeshConfigError::Negative { name, value });
            }
        }
        Ok(())
    }
}

impl Default for NavmeshConfig {
    fn default() -> Self {
        Self::from_agent(&Agent::default(), &BuildInfo::default())
    }
}

/// Errors returned by [`NavmeshConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavmeshConfigError {
    /// A voxel dimension is zero, negative or NaN.
    #[error("{name} must be positive, got {value}")]
    NonPositiveCellSize {
        /// The offending parameter.
        name: &'static str,
        /// Its value.
        value: f32,
    },
    /// Tiles must be at least one voxel wide.
    #[error("tile_size must be at least 1")]
    ZeroTileSize,
    /// Polygons must have between 3 and 10 vertices.
    #[error("vertices per polygon must be between 3 and 10, got {0}")]
    VerticesPerPolygon(usize),
    /// The agent is less than a voxel high.
    #[error("walkable_height must be at least 1 voxel")]
    ZeroWalkableHeight,
    /// The slope is outside of `0..90` degrees.
    #[error("max slope must be in 0..90 degrees, got {0}")]
    SlopeAngle(f32),
    /// A distance or tolerance is negative or NaN.
    #[error("{name} must not be negative, got {value}")]
    Negative {
        /// The offending parameter.
        name: &'static str,
        /// Its value.
        value: f32,
    },
}
