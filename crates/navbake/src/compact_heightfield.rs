use crate::{
    Aabb3d,
    compact_cell::CompactCell,
    compact_span::CompactSpan,
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    region::RegionId,
    span::AreaType,
};

/// A packed representation of the walkable surfaces of a [`Heightfield`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactHeightfield {
    /// The width of the heightfield along the x-axis in cell units
    pub width: u16,
    /// The height of the heightfield along the z-axis in cell units
    pub height: u16,
    /// The number of voxel rows along the y-axis
    pub vertical_cells: u16,
    /// The walkable height used during the build of the field
    pub walkable_height: u16,
    /// The walkable climb used during the build of the field.
    pub walkable_climb: u16,
    /// The maximum distance value of any span within the field.
    pub max_distance: u16,
    /// The number of region ids in use, including [`RegionId::NONE`]. Regions are numbered `1..max_region`.
    pub max_region: RegionId,
    /// The AABB of the heightfield
    pub aabb: Aabb3d,
    /// The size of each cell on the xz-plane
    pub cell_size: f32,
    /// The size of each cell along the y-axis
    pub cell_height: f32,
    /// The cells in the heightfield [Size: `width * height`]
    pub cells: Vec<CompactCell>,
    /// All walkable spans in the heightfield
    pub spans: Vec<CompactSpan>,
    /// Vector containing area type data. [Size: `spans.len()`]
    pub areas: Vec<AreaType>,
}

impl Heightfield {
    /// Builds a compact heightfield from the walkable spans of this heightfield
    /// and links every span to its reachable neighbors.
    ///
    /// # Errors
    ///
    /// Returns an error if the heightfield has too many walkable spans to be indexed.
    pub fn into_compact(
        self,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<CompactHeightfield, CompactHeightfieldError> {
        CompactHeightfield::from_heightfield(self, walkable_height, walkable_climb)
    }
}

impl CompactHeightfield {
    /// Builds a compact heightfield from a heightfield.
    ///
    /// # Errors
    ///
    /// Returns an error if the heightfield has too many walkable spans to be indexed.
    pub fn from_heightfield(
        heightfield: Heightfield,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<Self, CompactHeightfieldError> {
        let walkable_span_count = heightfield
            .allocated_spans
            .values()
            .filter(|span| span.area().is_walkable())
            .count();
        if walkable_span_count >= CompactSpan::NOT_CONNECTED as usize {
            return Err(CompactHeightfieldError::TooManySpans {
                span_count: walkable_span_count,
            });
        }

        let mut compact_heightfield = Self {
            width: heightfield.width,
            height: heightfield.height,
            vertical_cells: heightfield.vertical_cells,
            walkable_height,
            walkable_climb,
            aabb: heightfield.aabb,
            max_distance: 0,
            max_region: RegionId::NONE,
            cell_size: heightfield.cell_size,
            cell_height: heightfield.cell_height,
            cells: vec![
                CompactCell::default();
                heightfield.width as usize * heightfield.height as usize
            ],
            spans: Vec::with_capacity(walkable_span_count),
            areas: Vec::with_capacity(walkable_span_count),
        };

        // Fill in cells and spans
        for z in 0..heightfield.height {
            for x in 0..heightfield.width {
                let column_index = heightfield.column_index(x, z);
                let cell = &mut compact_heightfield.cells[column_index];
                cell.set_index(compact_heightfield.spans.len() as u32);

                for (_, span) in heightfield.column(x, z) {
                    if !span.area().is_walkable() {
                        continue;
                    }
                    let floor = span.max();
                    let ceiling = span
                        .next()
                        .map(|next| heightfield.span(next).min())
                        .unwrap_or(heightfield.vertical_cells);
                    compact_heightfield
                        .spans
                        .push(CompactSpan::new(floor, ceiling));
                    compact_heightfield.areas.push(span.area());
                    cell.inc_count();
                }
            }
        }

        compact_heightfield.link_neighbors();
        Ok(compact_heightfield)
    }

    /// Connects each span to the first span of each neighboring column that the agent can
    /// move to: the shared clearance must be at least `walkable_height`
    /// and the floors must differ by at most `walkable_climb`.
    fn link_neighbors(&mut self) {
        let walkable_height = self.walkable_height as i32;
        let walkable_climb = self.walkable_climb as i32;
        for z in 0..self.height {
            for x in 0..self.width {
                let cell = *self.cell_at(x, z);
                for i in cell.index_range() {
                    for dir in 0..4_u8 {
                        self.spans[i].set_con(dir, None);
                        let neighbor_x = x as i32 + dir_offset_x(dir);
                        let neighbor_z = z as i32 + dir_offset_z(dir);
                        // First check that the neighbour cell is in bounds.
                        if !self.contains(neighbor_x, neighbor_z) {
                            continue;
                        }

                        // Iterate over all neighbour spans and check if any of them is
                        // accessible from current cell.
                        let neighbor_cell = *self.cell_at(neighbor_x as u16, neighbor_z as u16);
                        let span = &self.spans[i];
                        let (floor, ceiling) = (span.floor as i32, span.ceiling as i32);
                        let neighbor = neighbor_cell.index_range().find(|k| {
                            let neighbor_span = &self.spans[*k];
                            let bot = floor.max(neighbor_span.floor as i32);
                            let top = ceiling.min(neighbor_span.ceiling as i32);

                            // Check that the gap between the spans is walkable,
                            // and that the climb height between the gaps is not too high.
                            top - bot >= walkable_height
                                && (neighbor_span.floor as i32 - floor).abs() <= walkable_climb
                        });
                        self.spans[i].set_con(dir, neighbor);
                    }
                }
            }
        }
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, z: u16) -> usize {
        x as usize + z as usize * self.width as usize
    }

    #[inline]
    pub(crate) fn contains(&self, x: i32, z: i32) -> bool {
        x >= 0 && x < self.width as i32 && z >= 0 && z < self.height as i32
    }

    /// Returns the cell at the given coordinates. Returns `None` if the coordinates are invalid.
    #[inline]
    pub fn get_cell_at(&self, x: u16, z: u16) -> Option<&CompactCell> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.cells.get(self.column_index(x, z))
    }

    /// Returns the cell at the given coordinates. Panics if the coordinates are invalid.
    #[inline]
    pub fn cell_at(&self, x: u16, z: u16) -> &CompactCell {
        &self.cells[self.column_index(x, z)]
    }

    /// Iterates over all spans as `(x, z, span_index)`, cell by cell in row-major order.
    pub fn span_indices(&self) -> impl Iterator<Item = (u16, u16, usize)> + '_ {
        (0..self.height).flat_map(move |z| {
            (0..self.width).flat_map(move |x| {
                self.cell_at(x, z).index_range().map(move |i| (x, z, i))
            })
        })
    }

    /// The number of spans whose area is walkable.
    pub fn walkable_span_count(&self) -> usize {
        self.areas.iter().filter(|area| area.is_walkable()).count()
    }

    /// The number of regions, not counting [`RegionId::NONE`].
    #[inline]
    pub fn region_count(&self) -> usize {
        (self.max_region.0 as usize).saturating_sub(1)
    }
}

/// Errors that can occur when building a compact heightfield.
#[derive(Debug, thiserror::Error)]
pub enum CompactHeightfieldError {
    /// The heightfield has more walkable spans than can be indexed.
    #[error("Heightfield has too many walkable spans: {span_count}")]
    TooManySpans {
        /// The number of walkable spans.
        span_count: usize,
    },
}
