use crate::{CompactHeightfield, span::AreaType};

impl CompactHeightfield {
    /// Erodes the walkable area by the agent radius.
    ///
    /// Uses a distance field where only spans with a missing neighbor count as borders,
    /// then marks every span closer than `walkable_radius` to such a border as [`AreaType::NOT_WALKABLE`].
    /// `walkable_radius` is measured in distance field units.
    ///
    /// Returns the number of spans that were eroded.
    pub fn erode_walkable_area(&mut self, walkable_radius: u16, blur_threshold: u16) -> usize {
        self.calculate_distance_field(false, blur_threshold);
        let mut eroded = 0;
        for (span, area) in self.spans.iter().zip(self.areas.iter_mut()) {
            if span.dist_to_border < walkable_radius && *area != AreaType::NOT_WALKABLE {
                *area = AreaType::NOT_WALKABLE;
                eroded += 1;
            }
        }
        tracing::debug!("Eroded {eroded} spans with a radius of {walkable_radius}");
        eroded
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3A;

    use crate::{
        Aabb3d, AreaType, CompactHeightfield, HeightfieldBuilder, heightfield::SpanInsertion,
        span::SpanBuilder,
    };

    fn strip(width: u16, length: u16) -> CompactHeightfield {
        let mut heightfield = HeightfieldBuilder {
            aabb: Aabb3d::new(Vec3A::ZERO, [width as f32, 10.0, length as f32]),
            cell_size: 1.0,
            cell_height: 1.0,
        }
        .build()
        .unwrap();
        for z in 0..length {
            for x in 0..width {
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
        heightfield.into_compact(2, 1).unwrap()
    }

    #[test]
    fn narrow_strip_is_fully_eroded() {
        let mut field = strip(2, 10);
        let eroded = field.erode_walkable_area(2, 2);
        assert_eq!(eroded, 20);
        assert_eq!(field.walkable_span_count(), 0);
    }

    #[test]
    fn erosion_keeps_the_interior() {
        let mut field = strip(7, 7);
        field.erode_walkable_area(2, 2);
        // Only the outer ring touches the border.
        assert_eq!(field.walkable_span_count(), 25);
        let center = field.cell_at(3, 3).index() as usize;
        assert_eq!(field.areas[center], AreaType::WALKABLE);
        let edge = field.cell_at(0, 3).index() as usize;
        assert_eq!(field.areas[edge], AreaType::NOT_WALKABLE);
    }

    #[test]
    fn zero_radius_erodes_nothing() {
        let mut field = strip(3, 3);
        assert_eq!(field.erode_walkable_area(0, 2), 0);
        assert_eq!(field.walkable_span_count(), 9);
    }
}
