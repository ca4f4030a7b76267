use std::collections::VecDeque;

use crate::{CompactHeightfield, region::RegionId};

/// How many times regions are grown into a distance band before new regions are seeded.
const EXPAND_ITERATIONS: usize = 8;

impl CompactHeightfield {
    /// Partitions the walkable surface into regions using a watershed flood over the distance field.
    ///
    /// Regions smaller than `merge_region_size` spans are merged into a neighbor where possible.
    /// Isolated regions smaller than `min_region_size` spans are removed.
    /// Surviving regions are renumbered to `1..max_region`.
    ///
    /// The distance field must be built with [`CompactHeightfield::build_distance_field`] first.
    pub fn build_regions(&mut self, min_region_size: usize, merge_region_size: usize) {
        for span in &mut self.spans {
            span.region = RegionId::NONE;
        }
        self.max_region = RegionId::NONE;

        let next_id = self.flood_regions();
        if next_id.0 < 2 {
            tracing::debug!("Watershed produced no regions");
            return;
        }
        self.max_region = next_id;
        self.merge_and_filter_regions(min_region_size, merge_region_size);
    }

    /// Assigns a region to every walkable span. Returns the next unused region id.
    fn flood_regions(&mut self) -> RegionId {
        let mut levels = self.distance_levels();
        let mut level_of = vec![usize::MAX; self.spans.len()];
        for (level, spans) in levels.iter().enumerate() {
            for i in spans.iter().flatten() {
                level_of[*i] = level;
            }
        }

        let mut next_id = RegionId::from(1);
        let mut queue = VecDeque::new();
        for (level, spans) in levels.iter_mut().enumerate() {
            if next_id.0 > 1 {
                self.expand_regions(spans, EXPAND_ITERATIONS);
            }

            for &i in spans.iter().flatten() {
                if self.spans[i].region.is_some() {
                    continue;
                }
                let Some(following) = next_id.0.checked_add(1) else {
                    tracing::error!("Ran out of region ids, leaving remaining spans unassigned");
                    return next_id;
                };

                self.spans[i].region = next_id;
                queue.clear();
                queue.push_back(i);
                while let Some(current) = queue.pop_front() {
                    for dir in 0..4 {
                        let Some(neighbor) = self.spans[current].con(dir) else {
                            continue;
                        };
                        if level_of[neighbor] != level || self.spans[neighbor].region.is_some() {
                            continue;
                        }
                        self.spans[neighbor].region = next_id;
                        queue.push_back(neighbor);
                    }
                }
                next_id = RegionId::from(following);
            }
        }
        next_id
    }

    /// Buckets the walkable spans into bands of width 2, from the highest distance to the lowest.
    /// The first band also holds the maximum distance itself.
    fn distance_levels(&self) -> Vec<Vec<Option<usize>>> {
        let max_distance = self.max_distance as i32;
        let top = (max_distance - 1) & !1;
        if top < 0 {
            return Vec::new();
        }
        let mut levels = vec![Vec::new(); top as usize / 2 + 1];
        for (i, span) in self.spans.iter().enumerate() {
            if !self.areas[i].is_walkable() {
                continue;
            }
            let dist = span.dist_to_border as i32;
            let level = if dist >= top {
                0
            } else {
                (top - dist + 1) / 2
            };
            levels[level as usize].push(Some(i));
        }
        levels
    }

    /// Grows existing regions into the spans of a band.
    /// A span joins the region of its last assigned neighbor.
    /// Spans that joined a region are taken out of `spans`.
    fn expand_regions(&mut self, spans: &mut [Option<usize>], max_iterations: usize) {
        let mut assigned = Vec::new();
        let mut iteration = 0;
        loop {
            let mut skipped = 0;
            assigned.clear();
            for entry in spans.iter_mut() {
                let Some(i) = *entry else {
                    skipped += 1;
                    continue;
                };
                let span = &self.spans[i];
                let region = (0..4)
                    .filter_map(|dir| span.con(dir))
                    .map(|neighbor| self.spans[neighbor].region)
                    .filter(|region| region.is_some())
                    .last();
                match region {
                    Some(region) => {
                        *entry = None;
                        assigned.push((i, region));
                    }
                    None => skipped += 1,
                }
            }
            for &(i, region) in &assigned {
                self.spans[i].region = region;
            }

            if skipped == spans.len() {
                break;
            }
            iteration += 1;
            if iteration > max_iterations {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, AreaType, CompactHeightfield, Heightfield, HeightfieldBuilder,
        heightfield::SpanInsertion, region::RegionId, span::SpanBuilder,
    };

    fn heightfield(width: u16, length: u16) -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [width as f32, 10.0, length as f32]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    fn fill(heightfield: &mut Heightfield, xs: std::ops::Range<u16>, zs: std::ops::Range<u16>) {
        for z in zs {
            for x in xs.clone() {
                heightfield
                    .add_span(SpanInsertion {
                        x,
                        z,
                        span: SpanBuilder {
                            min: 0,
                            max: 1,
                            area: AreaType::WALKABLE,
                            next: None,
                        }
                        .build(),
                    })
                    .unwrap();
            }
        }
    }

    fn regions(field: &CompactHeightfield) -> Vec<RegionId> {
        let mut regions: Vec<_> = field.spans.iter().map(|span| span.region).collect();
        regions.sort();
        regions.dedup();
        regions
    }

    #[test]
    fn square_becomes_a_single_region() {
        let mut heightfield = heightfield(12, 12);
        fill(&mut heightfield, 0..12, 0..12);
        let mut field = heightfield.into_compact(2, 1).unwrap();
        field.build_distance_field(2);
        field.build_regions(8, 20);
        assert_eq!(field.max_region, RegionId::from(2));
        assert_eq!(field.region_count(), 1);
        assert!(field.spans.iter().all(|span| span.region == RegionId::from(1)));
    }

    #[test]
    fn separate_islands_get_separate_regions() {
        let mut heightfield = heightfield(20, 8);
        fill(&mut heightfield, 0..8, 0..8);
        fill(&mut heightfield, 12..20, 0..8);
        let mut field = heightfield.into_compact(2, 1).unwrap();
        field.build_distance_field(2);
        field.build_regions(8, 20);
        assert_eq!(field.region_count(), 2);
        let left = field.spans[field.cell_at(3, 3).index() as usize].region;
        let right = field.spans[field.cell_at(15, 3).index() as usize].region;
        assert_ne!(left, right);
        assert!(left.is_some() && right.is_some());
    }

    #[test]
    fn tiny_islands_are_removed() {
        let mut heightfield = heightfield(20, 8);
        fill(&mut heightfield, 0..8, 0..8);
        fill(&mut heightfield, 14..16, 2..4);
        let mut field = heightfield.into_compact(2, 1).unwrap();
        field.build_distance_field(2);
        field.build_regions(8, 20);
        assert_eq!(field.region_count(), 1);
        let island = field.spans[field.cell_at(14, 2).index() as usize].region;
        assert_eq!(island, RegionId::NONE);
    }

    #[test]
    fn unwalkable_spans_stay_unassigned() {
        let mut heightfield = heightfield(10, 10);
        fill(&mut heightfield, 0..10, 0..10);
        let mut field = heightfield.into_compact(2, 1).unwrap();
        field.erode_walkable_area(2, 2);
        field.build_distance_field(2);
        field.build_regions(8, 20);
        for (span, area) in field.spans.iter().zip(&field.areas) {
            assert_eq!(span.region.is_some(), area.is_walkable());
        }
    }

    #[test]
    fn empty_field_has_no_regions() {
        let mut field = heightfield(4, 4).into_compact(2, 1).unwrap();
        field.build_distance_field(2);
        field.build_regions(8, 20);
        assert_eq!(field.max_region, RegionId::NONE);
        assert_eq!(field.region_count(), 0);
    }
}
