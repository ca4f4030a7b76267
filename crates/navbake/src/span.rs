//! Solid spans of a [`Heightfield`](crate::Heightfield) and the area types they carry.

use std::ops::{Deref, DerefMut};

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// A key for a span in [`Spans`].
    pub struct SpanKey;
}

/// The arena owning all solid spans of a heightfield.
/// Columns refer to their lowest span by [`SpanKey`], spans refer to the one above them.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Spans(SlotMap<SpanKey, Span>);

impl Deref for Spans {
    type Target = SlotMap<SpanKey, Span>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Spans {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Spans {
    const DEFAULT_CAPACITY: usize = 1024;

    pub(crate) fn with_min_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(Self::DEFAULT_CAPACITY);
        Self(SlotMap::with_capacity_and_key(capacity))
    }
}

pub(crate) struct SpanBuilder {
    pub(crate) min: u16,
    pub(crate) max: u16,
    pub(crate) area: AreaType,
    pub(crate) next: Option<SpanKey>,
}

impl SpanBuilder {
    pub(crate) fn build(self) -> Span {
        Span {
            min: self.min,
            max: self.max,
            area: self.area,
            next: self.next,
        }
    }
}

impl From<SpanBuilder> for Span {
    fn from(builder: SpanBuilder) -> Self {
        builder.build()
    }
}

/// A solid, inclusive run of voxel rows `[min, max]` in one column.
/// Build with [`SpanBuilder`].
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Lowest solid voxel row.
    min: u16,
    /// Highest solid voxel row. The walkable surface sits on top of it.
    max: u16,
    /// Area type of the top surface.
    area: AreaType,
    /// The key of the next-higher span in the column
    next: Option<SpanKey>,
}

impl Span {
    /// Lowest solid voxel row of the span.
    #[inline]
    pub fn min(&self) -> u16 {
        self.min
    }

    #[inline]
    pub(crate) fn set_min(&mut self, min: u16) {
        self.min = min;
    }

    /// Highest solid voxel row of the span.
    #[inline]
    pub fn max(&self) -> u16 {
        self.max
    }

    #[inline]
    pub(crate) fn set_max(&mut self, max: u16) {
        self.max = max;
    }

    /// Area type of the span's top surface.
    #[inline]
    pub fn area(&self) -> AreaType {
        self.area
    }

    #[inline]
    pub(crate) fn set_area(&mut self, area: impl Into<AreaType>) {
        self.area = area.into();
    }

    /// The span directly above this one in the same column.
    #[inline]
    pub fn next(&self) -> Option<SpanKey> {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: impl Into<Option<SpanKey>>) {
        self.next = next.into();
    }
}

bitflags::bitflags! {
    /// Area classification of a surface.
    ///
    /// [`AreaType::NOT_WALKABLE`] is always `0x1`; every other flag is a mutually
    /// exclusive walkable class. The set is open: callers may use any other bit as
    /// a custom class. When two surfaces compete for the same voxel, the higher
    /// value wins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct AreaType: u8 {
        /// Surfaces an agent can never stand on.
        const NOT_WALKABLE = 0x01;
        /// Generic walkable ground.
        const WALKABLE = 0x02;
        /// Grass.
        const GRASS = 0x04;
        /// Desert.
        const DESERT = 0x08;
        /// Swamp.
        const SWAMP = 0x10;
        /// Forest.
        const FOREST = 0x20;

        const _ = !0;
    }
}

impl Default for AreaType {
    fn default() -> Self {
        Self::NOT_WALKABLE
    }
}

impl From<u8> for AreaType {
    fn from(value: u8) -> Self {
        AreaType::from_bits_retain(value)
    }
}

impl AreaType {
    /// Whether agents may walk on surfaces of this type.
    #[inline]
    pub fn is_walkable(self) -> bool {
        self.bits() > Self::NOT_WALKABLE.bits()
    }

    /// Returns the type that wins when both compete for the same voxel.
    #[inline]
    pub fn max_priority(self, other: AreaType) -> AreaType {
        if other.bits() > self.bits() {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        SpanBuilder {
            min: 2,
            max: 10,
            area: AreaType::GRASS,
            next: None,
        }
        .build()
    }

    #[test]
    fn can_retrieve_span_data_after_building() {
        let span = span();
        assert_eq!(span.min(), 2);
        assert_eq!(span.max(), 10);
        assert_eq!(span.area(), AreaType::GRASS);
        assert_eq!(span.next(), None);
    }

    #[test]
    fn can_retrieve_span_data_after_setting() {
        let mut span = span();
        let mut slotmap = SlotMap::with_key();
        let span_key: SpanKey = slotmap.insert(span.clone());

        span.set_min(1);
        span.set_max(4);
        span.set_area(AreaType::DESERT);
        span.set_next(span_key);

        assert_eq!(span.min(), 1);
        assert_eq!(span.max(), 4);
        assert_eq!(span.area(), AreaType::DESERT);
        assert_eq!(span.next(), Some(span_key));
    }

    #[test]
    fn walkability_and_priority() {
        assert!(!AreaType::NOT_WALKABLE.is_walkable());
        assert!(!AreaType::empty().is_walkable());
        assert!(AreaType::WALKABLE.is_walkable());
        assert!(AreaType::from(0x80).is_walkable());
        assert_eq!(
            AreaType::NOT_WALKABLE.max_priority(AreaType::WALKABLE),
            AreaType::WALKABLE
        );
        assert_eq!(
            AreaType::FOREST.max_priority(AreaType::GRASS),
            AreaType::FOREST
        );
    }
}
