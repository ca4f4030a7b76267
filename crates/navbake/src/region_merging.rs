//! Cleanup after the watershed flood: small regions are merged into their neighbors,
//! isolated small regions are removed and the surviving ids are made dense.

use crate::{
    CompactHeightfield,
    math::{rotate_ccw, rotate_cw},
    region::RegionId,
};

/// Bookkeeping for a single region id while merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Region {
    /// The id this region currently maps to. Merged regions share the id of their target.
    pub(crate) id: RegionId,
    pub(crate) span_count: usize,
    /// Neighboring regions in boundary order. [`RegionId::NONE`] marks an edge without a neighbor.
    pub(crate) connections: Vec<RegionId>,
    /// Regions with spans stacked above spans of this region.
    pub(crate) overlaps: Vec<RegionId>,
}

impl Region {
    fn new(id: RegionId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn reset_with_id(&mut self, id: RegionId) {
        self.id = id;
        self.span_count = 0;
        self.connections.clear();
        self.overlaps.clear();
    }

    fn replace_neighbor(&mut self, old: RegionId, new: RegionId) {
        let mut connections_changed = false;
        for connection in &mut self.connections {
            if *connection == old {
                *connection = new;
                connections_changed = true;
            }
        }
        for overlap in &mut self.overlaps {
            if *overlap == old {
                *overlap = new;
            }
        }
        if connections_changed {
            self.remove_adjacent_duplicate_connections();
        }
    }

    fn remove_adjacent_duplicate_connections(&mut self) {
        let mut i = 0;
        while i < self.connections.len() && self.connections.len() > 1 {
            let next = (i + 1) % self.connections.len();
            if self.connections[i] == self.connections[next] {
                self.connections.remove(next);
            } else {
                i += 1;
            }
        }
    }

    /// True for regions that only border unwalkable space.
    fn is_island(&self) -> bool {
        self.connections.is_empty() || self.connections == [RegionId::NONE]
    }
}

/// Whether `a` and `b` share exactly one boundary and are not stacked on each other.
pub(crate) fn can_merge(a: &Region, b: &Region) -> bool {
    let shared = a
        .connections
        .iter()
        .filter(|connection| **connection == b.id)
        .count();
    shared == 1 && !a.overlaps.contains(&b.id) && !b.overlaps.contains(&a.id)
}

/// Stitches the connection lists of two regions together at their shared boundary
/// and moves the spans and overlaps of `candidate` into `target`.
///
/// Returns `false` if the regions are not connected.
pub(crate) fn merge_regions(target: &mut Region, candidate: &Region) -> bool {
    let Some(candidate_index) = target
        .connections
        .iter()
        .position(|connection| *connection == candidate.id)
    else {
        return false;
    };
    let Some(target_index) = candidate
        .connections
        .iter()
        .position(|connection| *connection == target.id)
    else {
        return false;
    };

    let target_len = target.connections.len();
    let candidate_len = candidate.connections.len();
    let mut connections = Vec::with_capacity(target_len + candidate_len);
    for i in 0..target_len - 1 {
        connections.push(target.connections[(candidate_index + 1 + i) % target_len]);
    }
    for i in 0..candidate_len - 1 {
        connections.push(candidate.connections[(target_index + 1 + i) % candidate_len]);
    }
    target.connections = connections;
    target.remove_adjacent_duplicate_connections();

    for overlap in &candidate.overlaps {
        if !target.overlaps.contains(overlap) {
            target.overlaps.push(*overlap);
        }
    }
    target.span_count += candidate.span_count;
    true
}

impl CompactHeightfield {
    pub(crate) fn merge_and_filter_regions(
        &mut self,
        min_region_size: usize,
        merge_region_size: usize,
    ) {
        let mut regions: Vec<Region> = (0..self.max_region.0)
            .map(|id| Region::new(RegionId::from(id)))
            .collect();
        self.collect_region_adjacency(&mut regions);

        let merged = merge_small_regions(&mut regions, merge_region_size);
        let removed = remove_small_islands(&mut regions, min_region_size);
        let region_count = remap_region_ids(&mut regions);

        for span in &mut self.spans {
            span.region = regions[span.region.0 as usize].id;
        }
        self.max_region = RegionId::from(region_count + 1);
        tracing::debug!(
            "Merged {merged} regions and removed {removed} islands, {region_count} regions remain"
        );
    }

    /// The neighbors of every region in boundary order, indexed by region id.
    /// [`RegionId::NONE`] entries mark edges that border no region.
    pub fn region_connections(&self) -> Vec<Vec<RegionId>> {
        let mut regions: Vec<Region> = (0..self.max_region.0)
            .map(|id| Region::new(RegionId::from(id)))
            .collect();
        self.collect_region_adjacency(&mut regions);
        regions
            .into_iter()
            .map(|region| region.connections)
            .collect()
    }

    /// Counts the spans of every region and records its neighbors and overlaps.
    pub(crate) fn collect_region_adjacency(&self, regions: &mut [Region]) {
        for (x, z, i) in self.span_indices() {
            let region_id = self.spans[i].region;
            if region_id.is_none() {
                continue;
            }
            let region = &mut regions[region_id.0 as usize];
            region.span_count += 1;

            let column_end = self.cell_at(x, z).index_range().end;
            for above in &self.spans[i + 1..column_end] {
                if above.region.is_some() && !region.overlaps.contains(&above.region) {
                    region.overlaps.push(above.region);
                }
            }

            if !region.connections.is_empty() {
                continue;
            }
            if let Some(dir) = self.region_edge_direction(i) {
                region.connections = self.walk_region_connections(i, dir);
            }
        }
    }

    /// The first direction in which the span borders a different region or no span at all.
    fn region_edge_direction(&self, i: usize) -> Option<u8> {
        (0..4).find(|&dir| self.is_region_edge(i, dir))
    }

    fn is_region_edge(&self, i: usize, dir: u8) -> bool {
        match self.spans[i].con(dir) {
            Some(neighbor) => self.spans[neighbor].region != self.spans[i].region,
            None => true,
        }
    }

    /// Follows the boundary of the region containing span `start`, recording the region
    /// across every edge whenever it changes.
    fn walk_region_connections(&self, start: usize, start_dir: u8) -> Vec<RegionId> {
        let region_across = |i: usize, dir: u8| {
            self.spans[i]
                .con(dir)
                .map(|neighbor| self.spans[neighbor].region)
                .unwrap_or(RegionId::NONE)
        };

        let mut connections = vec![region_across(start, start_dir)];
        let mut i = start;
        let mut dir = start_dir;
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations >= 0xffff {
                tracing::warn!("Region boundary walk did not close");
                break;
            }
            if self.is_region_edge(i, dir) {
                let across = region_across(i, dir);
                if connections.last() != Some(&across) {
                    connections.push(across);
                }
                dir = rotate_cw(dir);
            } else {
                match self.spans[i].con(dir) {
                    Some(neighbor) => i = neighbor,
                    None => {
                        tracing::error!("Region boundary walk stepped into a missing neighbor");
                        break;
                    }
                }
                dir = rotate_ccw(dir);
            }
            if i == start && dir == start_dir {
                break;
            }
        }

        if connections.len() > 1 && connections.first() == connections.last() {
            connections.pop();
        }
        connections
    }
}

/// Merges every region of at most `merge_region_size` spans into its smallest mergeable neighbor,
/// repeating until nothing changes. Returns the number of merges.
fn merge_small_regions(regions: &mut [Region], merge_region_size: usize) -> usize {
    let mut total = 0;
    loop {
        let mut merges = 0;
        for i in 0..regions.len() {
            let region = &regions[i];
            if region.id.is_none() || region.span_count == 0 {
                continue;
            }
            if region.span_count > merge_region_size {
                continue;
            }

            let mut target = None;
            let mut smallest = usize::MAX;
            for &neighbor_id in &region.connections {
                if neighbor_id.is_none() {
                    continue;
                }
                let neighbor = &regions[neighbor_id.0 as usize];
                if neighbor.span_count < smallest && can_merge(region, neighbor) {
                    smallest = neighbor.span_count;
                    target = Some(neighbor_id.0 as usize);
                }
            }
            let Some(target) = target else {
                continue;
            };

            let candidate = regions[i].clone();
            if !merge_regions(&mut regions[target], &candidate) {
                continue;
            }
            let old_id = candidate.id;
            let new_id = regions[target].id;
            regions[i].reset_with_id(new_id);
            for region in regions.iter_mut() {
                if region.id.is_none() {
                    continue;
                }
                if region.id == old_id {
                    region.id = new_id;
                } else {
                    region.replace_neighbor(old_id, new_id);
                }
            }
            merges += 1;
        }
        total += merges;
        if merges == 0 {
            return total;
        }
    }
}

/// Removes regions smaller than `min_region_size` spans that only border unwalkable space.
/// Every slot that was merged into a removed region is removed with it.
/// Returns the number of removed regions.
fn remove_small_islands(regions: &mut [Region], min_region_size: usize) -> usize {
    let mut removed = 0;
    for i in 1..regions.len() {
        let region = &regions[i];
        if region.span_count == 0 || region.id.is_none() {
            continue;
        }
        if !region.is_island() || region.span_count >= min_region_size {
            continue;
        }
        let old_id = region.id;
        for region in regions.iter_mut() {
            if region.id == old_id {
                region.reset_with_id(RegionId::NONE);
            }
        }
        removed += 1;
    }
    removed
}

/// Renumbers the surviving ids to `1..=n` in slot order and returns `n`.
fn remap_region_ids(regions: &mut [Region]) -> u16 {
    let mut remap: Vec<bool> = regions.iter().map(|region| region.id.is_some()).collect();
    let mut next = 0_u16;
    for i in 0..regions.len() {
        if !remap[i] {
            continue;
        }
        next += 1;
        let old_id = regions[i].id;
        for (j, region) in regions.iter_mut().enumerate().skip(i) {
            if remap[j] && region.id == old_id {
                region.id = RegionId::from(next);
                remap[j] = false;
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: u16, span_count: usize, connections: &[u16]) -> Region {
        Region {
            id: RegionId::from(id),
            span_count,
            connections: connections.iter().map(|id| RegionId::from(*id)).collect(),
            overlaps: Vec::new(),
        }
    }

    #[test]
    fn can_merge_requires_a_single_shared_edge() {
        let a = region(1, 5, &[0, 2]);
        let b = region(2, 5, &[0, 1]);
        assert!(can_merge(&a, &b));

        let twice = region(1, 5, &[2, 0, 2, 3]);
        assert!(!can_merge(&twice, &b));
    }

    #[test]
    fn overlapping_regions_cannot_merge() {
        let mut a = region(1, 5, &[0, 2]);
        let b = region(2, 5, &[0, 1]);
        a.overlaps.push(RegionId::from(2));
        assert!(!can_merge(&a, &b));
        assert!(!can_merge(&b, &a));
    }

    #[test]
    fn merging_stitches_connections() {
        let mut target = region(1, 10, &[0, 2, 3]);
        let candidate = region(2, 4, &[4, 1]);
        assert!(merge_regions(&mut target, &candidate));
        assert_eq!(target.span_count, 14);
        assert_eq!(
            target.connections,
            vec![RegionId::from(3), RegionId::from(0), RegionId::from(4)]
        );
    }

    #[test]
    fn merging_collapses_duplicate_connections() {
        let mut target = region(1, 10, &[0, 2]);
        let candidate = region(2, 4, &[0, 1]);
        assert!(merge_regions(&mut target, &candidate));
        assert_eq!(target.connections, vec![RegionId::NONE]);
    }

    #[test]
    fn merging_unconnected_regions_fails() {
        let mut target = region(1, 10, &[0]);
        let candidate = region(2, 4, &[0]);
        assert!(!merge_regions(&mut target, &candidate));
        assert_eq!(target.span_count, 10);
    }

    #[test]
    fn small_region_merges_into_neighbor() {
        let mut regions = vec![
            region(0, 0, &[]),
            region(1, 50, &[0, 2]),
            region(2, 5, &[0, 1]),
        ];
        assert_eq!(merge_small_regions(&mut regions, 20), 1);
        assert_eq!(regions[2].id, RegionId::from(1));
        assert_eq!(regions[1].span_count, 55);
        assert_eq!(regions[1].connections, vec![RegionId::NONE]);
    }

    #[test]
    fn removing_an_island_removes_merged_slots() {
        let mut regions = vec![
            region(0, 0, &[]),
            region(1, 4, &[0]),
            region(1, 0, &[]),
            region(3, 30, &[0]),
        ];
        assert_eq!(remove_small_islands(&mut regions, 8), 1);
        assert_eq!(regions[1].id, RegionId::NONE);
        assert_eq!(regions[2].id, RegionId::NONE);
        assert_eq!(regions[3].id, RegionId::from(3));
    }

    #[test]
    fn remapping_makes_ids_dense() {
        let mut regions = vec![
            region(0, 0, &[]),
            region(0, 0, &[]),
            region(5, 10, &[]),
            region(5, 0, &[]),
            region(7, 10, &[]),
        ];
        assert_eq!(remap_region_ids(&mut regions), 2);
        let ids: Vec<u16> = regions.iter().map(|region| region.id.0).collect();
        assert_eq!(ids, vec![0, 0, 1, 1, 2]);
    }
}
