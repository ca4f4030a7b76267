use crate::{
    heightfield::Heightfield,
    math::{dir_offset_x, dir_offset_z},
    span::{AreaType, SpanKey},
};

impl Heightfield {
    /// Marks non-walkable spans as walkable if their maximum is within `walkable_climb` of the span below them.
    ///
    /// This removes small obstacles and rasterized overhangs the agent would be able to walk over,
    /// such as curbs. It also allows agents to move up terraced structures like stairs.
    ///
    /// Obstacle spans are marked walkable if: `obstacle_span.max - walkable_span.max < walkable_climb`.
    /// Only the span directly above a walkable span is affected, stacks of obstacles are not promoted.
    pub fn filter_low_hanging_walkable_obstacles(&mut self, walkable_climb: u16) {
        for column_index in 0..self.spans.len() {
            let mut previous: Option<(u16, AreaType)> = None;
            let mut previous_was_walkable = false;

            let mut span_key_iter = self.spans[column_index];
            while let Some(span_key) = span_key_iter {
                let span = self.span_mut(span_key);
                span_key_iter = span.next();
                let walkable = span.area().is_walkable();

                // If current span is not walkable, but there is walkable span just below it and the height difference
                // is small enough for the agent to walk over, mark the current span as walkable too.
                if let Some((previous_max, previous_area)) = previous
                    && !walkable
                    && previous_was_walkable
                    && span.max() as i32 - previous_max as i32 <= walkable_climb as i32
                {
                    span.set_area(previous_area);
                }

                // Copy the original walkable value regardless of whether we changed it.
                // This prevents multiple consecutive non-walkable spans from being erroneously marked as walkable.
                previous_was_walkable = walkable;
                previous = Some((span.max(), span.area()));
            }
        }
    }

    /// Marks spans that are ledges as not-walkable.
    ///
    /// A ledge is a walkable span whose smallest floor difference to any reachable neighbor
    /// surface is more than `walkable_climb`. A neighbor surface is reachable when the gap
    /// between the two floors and their lowest ceiling is at least `walkable_height`.
    /// Spans without any reachable neighbor are ledges too.
    ///
    /// All ledges are detected before any of them is marked, so the result does not depend on iteration order.
    pub fn filter_ledge_spans(&mut self, walkable_height: u16, walkable_climb: u16) {
        let mut ledges: Vec<SpanKey> = Vec::new();
        for z in 0..self.height {
            for x in 0..self.width {
                for (span_key, span) in self.column(x, z) {
                    if !span.area().is_walkable() {
                        continue;
                    }
                    let floor = span.max() as i32;
                    let ceiling = self.ceiling_of(span.next());
                    let mut min_drop = i32::MAX;

                    for dir in 0..4 {
                        let neighbor_x = x as i32 + dir_offset_x(dir);
                        let neighbor_z = z as i32 + dir_offset_z(dir);
                        if !self.contains(neighbor_x, neighbor_z) {
                            continue;
                        }
                        for (_, neighbor) in self.column(neighbor_x as u16, neighbor_z as u16) {
                            if !neighbor.area().is_walkable() {
                                continue;
                            }
                            let neighbor_floor = neighbor.max() as i32;
                            let neighbor_ceiling = self.ceiling_of(neighbor.next());
                            if ceiling.min(neighbor_ceiling) - floor.max(neighbor_floor)
                                >= walkable_height as i32
                            {
                                min_drop = min_drop.min((neighbor_floor - floor).abs());
                            }
                        }
                    }

                    if min_drop > walkable_climb as i32 {
                        ledges.push(span_key);
                    }
                }
            }
        }
        tracing::debug!("Marking {} ledge spans as not walkable", ledges.len());
        for span_key in ledges {
            self.span_mut(span_key).set_area(AreaType::NOT_WALKABLE);
        }
    }

    /// Marks walkable spans as not walkable if the clearance above the span is less than the specified `walkable_height`.
    ///
    /// For this filter, the clearance above the span is the distance from the span's
    /// maximum to the minimum of the next higher span in the same column.
    /// If there is no higher span in the column, the clearance is unlimited.
    pub fn filter_walkable_low_height_spans(&mut self, walkable_height: u16) {
        for column_index in 0..self.spans.len() {
            let mut span_key_iter = self.spans[column_index];
            while let Some(span_key) = span_key_iter {
                let span = self.span(span_key);
                span_key_iter = span.next();
                let Some(next_key) = span.next() else {
                    break;
                };
                let clearance = self.span(next_key).min() as i32 - span.max() as i32;
                if clearance < walkable_height as i32 {
                    self.span_mut(span_key).set_area(AreaType::NOT_WALKABLE);
                }
            }
        }
    }

    #[inline]
    fn ceiling_of(&self, next: Option<SpanKey>) -> i32 {
        next.map(|key| self.span(key).min() as i32)
            .unwrap_or(u16::MAX as i32)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, HeightfieldBuilder,
        heightfield::SpanInsertion,
        span::{AreaType, SpanBuilder},
    };

    use super::*;

    fn heightfield(size: f32) -> Heightfield {
        HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [size, 20.0, size]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap()
    }

    fn insert(heightfield: &mut Heightfield, x: u16, z: u16, min: u16, max: u16, area: AreaType) {
        heightfield
            .add_span(SpanInsertion {
                x,
                z,
                span: SpanBuilder {
                    min,
                    max,
                    area,
                    next: None,
                }
                .build(),
            })
            .unwrap();
    }

    fn areas(heightfield: &Heightfield, x: u16, z: u16) -> Vec<AreaType> {
        heightfield.column(x, z).map(|(_, s)| s.area()).collect()
    }

    fn floor(heightfield: &mut Heightfield, size: u16, max: u16) {
        for z in 0..size {
            for x in 0..size {
                insert(heightfield, x, z, 0, max, AreaType::WALKABLE);
            }
        }
    }

    #[test]
    fn low_hanging_obstacle_becomes_walkable() {
        let mut heightfield = heightfield(1.0);
        insert(&mut heightfield, 0, 0, 0, 2, AreaType::GRASS);
        insert(&mut heightfield, 0, 0, 4, 4, AreaType::NOT_WALKABLE);
        insert(&mut heightfield, 0, 0, 6, 6, AreaType::NOT_WALKABLE);
        heightfield.filter_low_hanging_walkable_obstacles(2);
        assert_eq!(
            areas(&heightfield, 0, 0),
            vec![AreaType::GRASS, AreaType::GRASS, AreaType::NOT_WALKABLE]
        );
    }

    #[test]
    fn high_obstacle_stays_unwalkable() {
        let mut heightfield = heightfield(1.0);
        insert(&mut heightfield, 0, 0, 0, 2, AreaType::WALKABLE);
        insert(&mut heightfield, 0, 0, 6, 6, AreaType::NOT_WALKABLE);
        heightfield.filter_low_hanging_walkable_obstacles(2);
        assert_eq!(
            areas(&heightfield, 0, 0),
            vec![AreaType::WALKABLE, AreaType::NOT_WALKABLE]
        );
    }

    #[test]
    fn flat_floor_has_no_ledges() {
        let mut heightfield = heightfield(3.0);
        floor(&mut heightfield, 3, 1);
        heightfield.filter_ledge_spans(2, 1);
        for z in 0..3 {
            for x in 0..3 {
                assert_eq!(areas(&heightfield, x, z), vec![AreaType::WALKABLE]);
            }
        }
    }

    #[test]
    fn pillar_is_a_ledge() {
        let mut heightfield = heightfield(3.0);
        floor(&mut heightfield, 3, 1);
        insert(&mut heightfield, 1, 1, 0, 8, AreaType::WALKABLE);
        heightfield.filter_ledge_spans(2, 1);
        assert_eq!(areas(&heightfield, 1, 1), vec![AreaType::NOT_WALKABLE]);
        // The floor next to the pillar is still reachable from the other floor cells.
        assert_eq!(areas(&heightfield, 0, 1), vec![AreaType::WALKABLE]);
    }

    #[test]
    fn isolated_column_is_a_ledge() {
        let mut heightfield = heightfield(3.0);
        insert(&mut heightfield, 1, 1, 0, 1, AreaType::WALKABLE);
        heightfield.filter_ledge_spans(2, 1);
        assert_eq!(areas(&heightfield, 1, 1), vec![AreaType::NOT_WALKABLE]);
    }

    #[test]
    fn low_ceiling_is_filtered() {
        let mut heightfield = heightfield(1.0);
        insert(&mut heightfield, 0, 0, 0, 1, AreaType::WALKABLE);
        insert(&mut heightfield, 0, 0, 3, 4, AreaType::WALKABLE);
        insert(&mut heightfield, 0, 0, 10, 11, AreaType::WALKABLE);
        heightfield.filter_walkable_low_height_spans(3);
        assert_eq!(
            areas(&heightfield, 0, 0),
            vec![
                AreaType::NOT_WALKABLE,
                AreaType::WALKABLE,
                AreaType::WALKABLE
            ]
        );
    }
}
