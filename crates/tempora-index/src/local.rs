//! All similarity groups for one fixed sub-sequence length.

use std::io::{self, Write};

use tracing::debug;

use tempora_dataset::Dataset;
use tempora_dtw::{BandRatio, DistanceKind, SeqView, Value, cascade_distance};

use crate::error::IndexError;
use crate::group::{Group, MemberMap};
use crate::serial::Tokens;

/// The group space for sub-sequences of a single length `L`: the ordered
/// group list and the shared membership arena.
///
/// Built once during indexing, read-only afterwards.
#[derive(Debug)]
pub(crate) struct LengthSpace {
    length: usize,
    sub_count: usize,
    groups: Vec<Group>,
    members: MemberMap,
}

impl LengthSpace {
    pub(crate) fn new(dataset: &Dataset, length: usize) -> Self {
        let sub_count = dataset.item_length() - length + 1;
        Self {
            length,
            sub_count,
            groups: Vec::new(),
            members: MemberMap::new(dataset.item_count(), sub_count),
        }
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn members(&self) -> &MemberMap {
        &self.members
    }

    pub(crate) fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Greedy online grouping of every sub-sequence of this length.
    ///
    /// Coordinates are visited start-major, then row. Each sub-sequence joins
    /// the group with the nearest centroid under the pairwise kernel (the
    /// running best doubling as the kernel dropout); if the nearest centroid
    /// is farther than `threshold / 2`, the sub-sequence founds a new group
    /// and becomes its centroid. With a metric kernel this keeps any two
    /// members of one group within `threshold` of each other. Ties keep the
    /// earliest group.
    pub(crate) fn generate_groups(
        &mut self,
        dataset: &Dataset,
        kind: DistanceKind,
        band: BandRatio,
        threshold: Value,
    ) -> Result<usize, IndexError> {
        for start in 0..self.sub_count {
            for row in 0..dataset.item_count() {
                let candidate = dataset.sub_sequence(row, start, start + self.length)?;

                let mut best = Value::INFINITY;
                let mut best_group = None;
                for (i, group) in self.groups.iter().enumerate() {
                    let distance = kind.pairwise(group.centroid(), &candidate, best, band)?;
                    if distance < best {
                        best = distance;
                        best_group = Some(i);
                    }
                }

                let chosen = match best_group {
                    Some(i) if best <= threshold / 2.0 => i,
                    _ => {
                        let group_index = self.groups.len();
                        self.groups.push(Group::new(
                            group_index,
                            self.length,
                            candidate.to_sequence(),
                        ));
                        group_index
                    }
                };
                self.groups[chosen].add_member(&mut self.members, (row, start));
            }
        }

        debug!(
            length = self.length,
            groups = self.groups.len(),
            "length space grouped"
        );
        Ok(self.groups.len())
    }

    /// Return the group whose centroid is nearest to the query under the
    /// cascade distance, if any beats the given dropout.
    ///
    /// The returned distance is the winning centroid distance, or the
    /// incoming dropout when no group improved on it.
    pub(crate) fn best_group(
        &self,
        query: &SeqView<'_>,
        dropout: Value,
        band: BandRatio,
    ) -> (Option<&Group>, Value) {
        let mut best_dist = dropout;
        let mut best = None;
        for group in &self.groups {
            let distance = cascade_distance(group.centroid(), query, best_dist, band);
            if distance < best_dist {
                best_dist = distance;
                best = Some(group);
            }
        }
        (best, best_dist)
    }

    /// Write the group count, then either per-group sizes (compact) or the
    /// full centroid and membership of each group.
    pub(crate) fn save<W: Write>(&self, writer: &mut W, compact: bool) -> io::Result<()> {
        writeln!(writer, "{}", self.groups.len())?;
        if compact {
            for (i, group) in self.groups.iter().enumerate() {
                if i > 0 {
                    write!(writer, " ")?;
                }
                write!(writer, "{}", group.count())?;
            }
            writeln!(writer)?;
        } else {
            for group in &self.groups {
                group.save(&self.members, writer)?;
            }
        }
        Ok(())
    }

    /// Rebuild a length space from the token stream, returning it with the
    /// number of groups read.
    pub(crate) fn load(
        tokens: &mut Tokens<'_>,
        dataset: &Dataset,
        length: usize,
    ) -> Result<(Self, usize), IndexError> {
        let mut space = Self::new(dataset, length);
        let group_count: usize = tokens.parse("group count")?;
        for group_index in 0..group_count {
            let group = Group::load(tokens, group_index, length, dataset, &mut space.members)?;
            space.groups.push(group);
        }
        Ok((space, group_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: Value = 1e-9;

    fn spec_dataset() -> Dataset {
        Dataset::from_rows(vec![
            (1..=10).map(|v| v as Value).collect(),
            (2..=11).map(|v| v as Value).collect(),
            (2..=11).rev().map(|v| v as Value).collect(),
        ])
        .unwrap()
    }

    #[test]
    fn every_coordinate_lands_in_exactly_one_group() {
        let dataset = spec_dataset();
        let band = BandRatio::default();
        for length in 2..=dataset.item_length() {
            let mut space = LengthSpace::new(&dataset, length);
            space
                .generate_groups(&dataset, DistanceKind::Euclidean, band, 0.5)
                .unwrap();

            let expected = dataset.item_count() * (dataset.item_length() - length + 1);
            let total: usize = space.groups().iter().map(Group::count).sum();
            assert_eq!(total, expected, "length {length} member counts");

            // Each coordinate appears once in its recorded group's chain.
            for row in 0..dataset.item_count() {
                for start in 0..space.sub_count {
                    let owner = space.members().group_of((row, start));
                    let members = space.groups()[owner].members(space.members());
                    let occurrences = members.iter().filter(|&&c| c == (row, start)).count();
                    assert_eq!(occurrences, 1, "coordinate ({row}, {start}) at {length}");
                }
            }
        }
    }

    #[test]
    fn members_stay_within_half_threshold_of_centroid() {
        let dataset = spec_dataset();
        let band = BandRatio::default();
        let threshold: Value = 0.5;
        let length = 4;

        let mut space = LengthSpace::new(&dataset, length);
        space
            .generate_groups(&dataset, DistanceKind::Euclidean, band, threshold)
            .unwrap();

        for group in space.groups() {
            for (row, start) in group.members(space.members()) {
                let member = dataset.sub_sequence(row, start, start + length).unwrap();
                let d = DistanceKind::Euclidean
                    .pairwise(group.centroid(), &member, Value::INFINITY, band)
                    .unwrap();
                assert!(
                    d <= threshold / 2.0 + EPS,
                    "member ({row}, {start}) at distance {d}"
                );
            }
        }
    }

    #[test]
    fn tie_break_prefers_earliest_group() {
        // Two identical rows: at every length the second row's sub-sequences
        // must join the groups founded by the first row, never found new ones.
        let dataset =
            Dataset::from_rows(vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
        let mut space = LengthSpace::new(&dataset, 2);
        let created = space
            .generate_groups(&dataset, DistanceKind::Euclidean, BandRatio::default(), 0.5)
            .unwrap();

        assert_eq!(created, 3);
        for group in space.groups() {
            assert_eq!(group.count(), 2);
        }
    }

    #[test]
    fn best_group_returns_dropout_when_nothing_beats_it() {
        let dataset = spec_dataset();
        let mut space = LengthSpace::new(&dataset, 3);
        space
            .generate_groups(&dataset, DistanceKind::Euclidean, BandRatio::default(), 0.5)
            .unwrap();

        let query_row = [1.0, 2.0, 3.0];
        let query = SeqView::from_slice(&query_row).unwrap();
        let (group, dist) = space.best_group(&query, 0.0, BandRatio::default());
        assert!(group.is_none());
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn best_group_finds_containing_group() {
        let dataset = spec_dataset();
        let band = BandRatio::new(1.0).unwrap();
        let mut space = LengthSpace::new(&dataset, 5);
        space
            .generate_groups(&dataset, DistanceKind::Euclidean, band, 0.5)
            .unwrap();

        let query = dataset.sub_sequence(0, 2, 7).unwrap();
        let (group, dist) = space.best_group(&query, Value::INFINITY, band);
        let group = group.expect("a group must contain the query itself");
        assert!(dist < EPS);
        let candidate = group
            .best_match(&dataset, space.members(), &query, band)
            .unwrap();
        assert!(candidate.distance < EPS);
    }
}
