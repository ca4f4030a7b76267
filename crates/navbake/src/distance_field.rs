//! Distance-to-border field over the walkable surface, computed with a two-pass chamfer (Saito) transform.
//!
//! Axis steps cost 2 and diagonal steps cost 3, so distances are roughly twice the distance in cells.

use crate::CompactHeightfield;

/// Direction indices as seen from a span.
const LEFT: u8 = 0;
const FORWARD: u8 = 1;
const RIGHT: u8 = 2;
const BACK: u8 = 3;

impl CompactHeightfield {
    /// Prepares for region partitioning by calculating the distance field along the walkable surface.
    ///
    /// Spans next to a missing neighbor or to a neighbor of another area type are borders.
    /// Sets [`CompactSpan::dist_to_border`](crate::CompactSpan::dist_to_border),
    /// [`CompactSpan::dist_to_core`](crate::CompactSpan::dist_to_core) and [`CompactHeightfield::max_distance`].
    pub fn build_distance_field(&mut self, blur_threshold: u16) {
        self.calculate_distance_field(true, blur_threshold);
        self.max_distance = self
            .spans
            .iter()
            .map(|span| span.dist_to_border)
            .max()
            .unwrap_or_default();
        let max_distance = self.max_distance;
        for span in &mut self.spans {
            span.dist_to_core = max_distance - span.dist_to_border;
        }
    }

    /// Writes the blurred distance to the closest border into every span.
    ///
    /// If `area_aware` is false, only spans with a missing neighbor count as borders.
    pub(crate) fn calculate_distance_field(&mut self, area_aware: bool, blur_threshold: u16) {
        let mut dist = vec![u16::MAX; self.spans.len()];

        // Mark boundary cells.
        for (i, span) in self.spans.iter().enumerate() {
            let is_border = (0..4).any(|dir| match span.con(dir) {
                None => true,
                Some(neighbor) => area_aware && self.areas[neighbor] != self.areas[i],
            });
            if is_border {
                dist[i] = 0;
            }
        }

        self.chamfer_pass(&mut dist);
        let blurred = self.box_blur(&dist, blur_threshold);
        for (span, dist) in self.spans.iter_mut().zip(blurred) {
            span.dist_to_border = dist;
        }
    }

    fn chamfer_pass(&self, dist: &mut [u16]) {
        let relax = |dist: &mut [u16], i: usize, neighbor: usize, cost: u16| {
            let candidate = dist[neighbor].saturating_add(cost);
            if candidate < dist[i] {
                dist[i] = candidate;
            }
        };

        // Pass 1: left, left-back, back, back-right.
        for cell in &self.cells {
            for i in cell.index_range() {
                if dist[i] == 0 {
                    continue;
                }
                let span = &self.spans[i];
                if let Some(left) = span.con(LEFT) {
                    relax(dist, i, left, 2);
                    if let Some(left_back) = self.spans[left].con(BACK) {
                        relax(dist, i, left_back, 3);
                    }
                }
                if let Some(back) = span.con(BACK) {
                    relax(dist, i, back, 2);
                    if let Some(back_right) = self.spans[back].con(RIGHT) {
                        relax(dist, i, back_right, 3);
                    }
                }
            }
        }

        // Pass 2: right, right-forward, forward, forward-left.
        for cell in self.cells.iter().rev() {
            for i in cell.index_range().rev() {
                if dist[i] == 0 {
                    continue;
                }
                let span = &self.spans[i];
                if let Some(right) = span.con(RIGHT) {
                    relax(dist, i, right, 2);
                    if let Some(right_forward) = self.spans[right].con(FORWARD) {
                        relax(dist, i, right_forward, 3);
                    }
                }
                if let Some(forward) = span.con(FORWARD) {
                    relax(dist, i, forward, 2);
                    if let Some(forward_left) = self.spans[forward].con(LEFT) {
                        relax(dist, i, forward_left, 3);
                    }
                }
            }
        }
    }

    /// Averages every distance above `threshold` with its 8 neighbors.
    /// Missing neighbors count as the span's own distance.
    fn box_blur(&self, src: &[u16], threshold: u16) -> Vec<u16> {
        let mut dst = vec![0_u16; src.len()];
        for (i, span) in self.spans.iter().enumerate() {
            let cd = src[i] as u32;
            if cd <= threshold as u32 {
                dst[i] = src[i];
                continue;
            }
            let mut d = cd;
            for dir in 0..4 {
                let Some(a) = span.con(dir) else {
                    d += cd * 2;
                    continue;
                };
                d += src[a] as u32;
                let dir2 = (dir + 1) & 0x3;
                d += match self.spans[a].con(dir2) {
                    Some(b) => src[b] as u32,
                    None => cd,
                };
            }
            dst[i] = ((d + 5) / 9).min(u16::MAX as u32) as u16;
        }
        dst
    }
}
