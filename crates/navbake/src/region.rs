use std::ops::{Deref, DerefMut};

/// A region in a [`CompactHeightfield`](crate::CompactHeightfield).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct RegionId(pub u16);

impl Deref for RegionId {
    type Target = u16;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RegionId {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<u16> for RegionId {
    fn from(value: u16) -> Self {
        RegionId(value)
    }
}

impl From<RegionId> for u16 {
    fn from(value: RegionId) -> Self {
        value.0
    }
}

impl RegionId {
    /// Spans that are not part of any region, i.e. not walkable or not yet assigned.
    pub const NONE: Self = Self(0);

    /// Whether the span is part of a region.
    #[inline]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }

    /// Whether the span is not part of any region.
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}
