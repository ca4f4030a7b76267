use crate::region::RegionId;

/// A span in a [`CompactHeightfield`](crate::CompactHeightfield):
/// the open space between the top of a walkable solid span and the bottom of the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactSpan {
    /// The walkable surface, i.e. the top of the solid span. (Measured from the heightfield's base.)
    pub floor: u16,
    /// The bottom of the next solid span, or the top of the voxel grid.
    pub ceiling: u16,
    /// The id of the region the span belongs to. (Or [`RegionId::NONE`] if not in a region.)
    pub region: RegionId,
    /// Distance to the closest border, in units where an axis step is 2 and a diagonal step is 3.
    pub dist_to_border: u16,
    /// `max_distance - dist_to_border`, i.e. the distance to the most central span.
    pub dist_to_core: u16,
    /// Indices of the neighbor spans in each direction.
    neighbors: [u32; 4],
}

impl Default for CompactSpan {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CompactSpan {
    pub(crate) const NOT_CONNECTED: u32 = u32::MAX;

    pub(crate) fn new(floor: u16, ceiling: u16) -> Self {
        Self {
            floor,
            ceiling,
            region: RegionId::NONE,
            dist_to_border: 0,
            dist_to_core: 0,
            neighbors: [Self::NOT_CONNECTED; 4],
        }
    }

    /// Sets the neighbor connection for the given direction.
    /// `None` if the neighbor is not connected.
    #[inline]
    pub fn set_con(&mut self, direction: u8, neighbor: impl Into<Option<usize>>) {
        self.neighbors[direction as usize & 0x3] = neighbor
            .into()
            .map(|index| index as u32)
            .unwrap_or(Self::NOT_CONNECTED);
    }

    /// Returns the index of the connected neighbor span in the given direction.
    /// `None` if the neighbor is not connected.
    #[inline]
    pub fn con(&self, direction: u8) -> Option<usize> {
        let value = self.neighbors[direction as usize & 0x3];
        (value != Self::NOT_CONNECTED).then_some(value as usize)
    }

    /// The vertical clearance of the span.
    #[inline]
    pub fn height(&self) -> u16 {
        self.ceiling.saturating_sub(self.floor)
    }
}
