//! Similarity groups and the shared per-length membership arena.

use std::io::{self, Write};

use tempora_dataset::Dataset;
use tempora_dtw::{BandRatio, SeqView, Sequence, Series, Value, cascade_distance};

use crate::error::IndexError;
use crate::serial::Tokens;

/// Coordinate of a sub-sequence at a fixed length: `(row, start)`.
pub(crate) type MemberCoord = (usize, usize);

/// One entry of the membership arena: which group a coordinate belongs to
/// and the coordinate added to that group just before it.
#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    group: usize,
    prev: Option<MemberCoord>,
}

/// Dense membership arena for all sub-sequences of one length.
///
/// Indexed by `row * sub_count + start`. Each occupied slot threads its group
/// as a singly-linked list, newest member first, so groups need no dynamic
/// containers: appends are O(1) and enumeration walks the chain.
#[derive(Debug)]
pub(crate) struct MemberMap {
    sub_count: usize,
    slots: Vec<Slot>,
}

impl MemberMap {
    pub(crate) fn new(item_count: usize, sub_count: usize) -> Self {
        Self {
            sub_count,
            slots: vec![Slot::default(); item_count * sub_count],
        }
    }

    fn slot_index(&self, (row, start): MemberCoord) -> usize {
        row * self.sub_count + start
    }

    fn record(&mut self, coord: MemberCoord, group: usize, prev: Option<MemberCoord>) {
        let index = self.slot_index(coord);
        self.slots[index] = Slot { group, prev };
    }

    pub(crate) fn prev_of(&self, coord: MemberCoord) -> Option<MemberCoord> {
        self.slots[self.slot_index(coord)].prev
    }

    pub(crate) fn group_of(&self, coord: MemberCoord) -> usize {
        self.slots[self.slot_index(coord)].group
    }
}

/// A group of mutually similar sub-sequences of one length, represented by
/// an owned centroid.
///
/// The group stores only its centroid and the head of its member chain;
/// member data is reconstructed on demand from the dataset, which must
/// outlive every query against the group.
#[derive(Debug)]
pub(crate) struct Group {
    group_index: usize,
    member_length: usize,
    centroid: Sequence,
    count: usize,
    last_member: Option<MemberCoord>,
}

impl Group {
    pub(crate) fn new(group_index: usize, member_length: usize, centroid: Sequence) -> Self {
        Self {
            group_index,
            member_length,
            centroid,
            count: 0,
            last_member: None,
        }
    }

    pub(crate) fn centroid(&self) -> &Sequence {
        &self.centroid
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Append a member coordinate to the head of the chain.
    pub(crate) fn add_member(&mut self, map: &mut MemberMap, coord: MemberCoord) {
        self.count += 1;
        map.record(coord, self.group_index, self.last_member);
        self.last_member = Some(coord);
    }

    /// Enumerate member coordinates, newest first.
    pub(crate) fn members(&self, map: &MemberMap) -> Vec<MemberCoord> {
        let mut coords = Vec::with_capacity(self.count);
        let mut current = self.last_member;
        while let Some(coord) = current {
            coords.push(coord);
            current = map.prev_of(coord);
        }
        coords
    }

    /// Linearly scan the member chain for the sub-sequence closest to the
    /// query under the cascade distance, with a shrinking dropout.
    pub(crate) fn best_match<'a>(
        &self,
        dataset: &'a Dataset,
        map: &MemberMap,
        query: &SeqView<'_>,
        band: BandRatio,
    ) -> Result<Candidate<'a>, IndexError> {
        let mut best_dist = Value::INFINITY;
        let mut best_coord = self.last_member;

        let mut current = self.last_member;
        while let Some((row, start)) = current {
            let member = dataset.sub_sequence(row, start, start + self.member_length)?;
            let distance = cascade_distance(query, &member, best_dist, band);
            if distance < best_dist {
                best_dist = distance;
                best_coord = Some((row, start));
            }
            current = map.prev_of((row, start));
        }

        let (row, start) = best_coord.ok_or_else(|| IndexError::Corrupt {
            detail: format!("group {} has no members", self.group_index),
        })?;
        let series = dataset.sub_sequence(row, start, start + self.member_length)?;
        Ok(Candidate {
            series,
            distance: best_dist,
        })
    }

    /// Write the centroid values, then the member count and the coordinate
    /// pairs oldest first, so that replaying `add_member` on load rebuilds
    /// the identical newest-first chain.
    pub(crate) fn save<W: Write>(&self, map: &MemberMap, writer: &mut W) -> io::Result<()> {
        for (i, value) in self.centroid.values().iter().enumerate() {
            if i > 0 {
                write!(writer, " ")?;
            }
            write!(writer, "{value}")?;
        }
        writeln!(writer)?;

        write!(writer, "{}", self.count)?;
        for (row, start) in self.members(map).into_iter().rev() {
            write!(writer, " {row} {start}")?;
        }
        writeln!(writer)
    }

    /// Reconstruct a group from the token stream, replaying `add_member` in
    /// the stored order.
    pub(crate) fn load(
        tokens: &mut Tokens<'_>,
        group_index: usize,
        member_length: usize,
        dataset: &Dataset,
        map: &mut MemberMap,
    ) -> Result<Self, IndexError> {
        let mut values = Vec::with_capacity(member_length);
        for _ in 0..member_length {
            values.push(tokens.parse::<Value>("centroid value")?);
        }
        let centroid = Sequence::new(values).map_err(|e| IndexError::Corrupt {
            detail: format!("invalid centroid for group {group_index}: {e}"),
        })?;

        let count: usize = tokens.parse("member count")?;
        if count == 0 {
            return Err(IndexError::Corrupt {
                detail: format!("group {group_index} has no members"),
            });
        }

        let sub_count = dataset.item_length() - member_length + 1;
        let mut group = Self::new(group_index, member_length, centroid);
        for _ in 0..count {
            let row: usize = tokens.parse("member row")?;
            let start: usize = tokens.parse("member start")?;
            if row >= dataset.item_count() || start >= sub_count {
                return Err(IndexError::Corrupt {
                    detail: format!(
                        "member ({row}, {start}) out of range for length {member_length}"
                    ),
                });
            }
            group.add_member(map, (row, start));
        }
        Ok(group)
    }
}

/// A query result: the matched sub-sequence and its distance to the query.
#[derive(Debug)]
pub struct Candidate<'a> {
    /// View of the matched sub-sequence within its dataset.
    pub series: SeqView<'a>,
    /// Cascade distance from the query to the matched sub-sequence.
    pub distance: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid(values: &[Value]) -> Sequence {
        Sequence::new(values.to_vec()).unwrap()
    }

    #[test]
    fn chain_is_newest_first() {
        let mut map = MemberMap::new(3, 4);
        let mut group = Group::new(0, 2, centroid(&[1.0, 2.0]));
        group.add_member(&mut map, (0, 0));
        group.add_member(&mut map, (1, 2));
        group.add_member(&mut map, (2, 3));

        assert_eq!(group.count(), 3);
        assert_eq!(group.members(&map), vec![(2, 3), (1, 2), (0, 0)]);
    }

    #[test]
    fn map_tracks_group_of_each_coordinate() {
        let mut map = MemberMap::new(2, 3);
        let mut first = Group::new(0, 2, centroid(&[0.0, 0.0]));
        let mut second = Group::new(1, 2, centroid(&[5.0, 5.0]));
        first.add_member(&mut map, (0, 1));
        second.add_member(&mut map, (1, 2));

        assert_eq!(map.group_of((0, 1)), 0);
        assert_eq!(map.group_of((1, 2)), 1);
    }

    #[test]
    fn save_load_preserves_chain_order() {
        let dataset = Dataset::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![9.0, 8.0, 7.0, 6.0],
        ])
        .unwrap();
        let mut map = MemberMap::new(2, 3);
        let mut group = Group::new(0, 2, centroid(&[1.0, 2.0]));
        group.add_member(&mut map, (0, 0));
        group.add_member(&mut map, (1, 2));
        group.add_member(&mut map, (0, 1));

        let mut buffer = Vec::new();
        group.save(&map, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut tokens = Tokens::new(&text);
        let mut reloaded_map = MemberMap::new(2, 3);
        let reloaded = Group::load(&mut tokens, 0, 2, &dataset, &mut reloaded_map).unwrap();

        assert_eq!(reloaded.count(), group.count());
        assert_eq!(reloaded.members(&reloaded_map), group.members(&map));
    }

    #[test]
    fn best_match_finds_exact_member() {
        let dataset = Dataset::from_rows(vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![9.0, 8.0, 7.0, 6.0],
        ])
        .unwrap();
        let mut map = MemberMap::new(2, 3);
        let mut group = Group::new(0, 2, centroid(&[1.0, 2.0]));
        group.add_member(&mut map, (0, 0));
        group.add_member(&mut map, (0, 2));
        group.add_member(&mut map, (1, 1));

        let query_row = [3.0, 4.0];
        let query = SeqView::from_slice(&query_row).unwrap();
        let band = BandRatio::new(1.0).unwrap();
        let candidate = group.best_match(&dataset, &map, &query, band).unwrap();

        assert_eq!(candidate.series.index(), 0);
        assert_eq!(candidate.series.start(), 2);
        assert!(candidate.distance.abs() < 1e-9);
    }
}
