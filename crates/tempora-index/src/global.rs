//! The global group space: one length space per sub-sequence length, the
//! query-time length traversal, and index serialization.

use std::io::{self, Write};

use tracing::{debug, info, instrument};

use tempora_dataset::Dataset;
use tempora_dtw::{BandRatio, DistanceKind, SeqView, Series, Value};

use crate::error::IndexError;
use crate::group::{Candidate, Group};
use crate::local::LengthSpace;
use crate::serial::Tokens;

/// Order in which sub-sequence lengths are visited for a query of
/// `query_length` against an index covering lengths up to `total_length`.
///
/// Starts at the query length and extends outward, alternating one step down
/// and one step up. A shorter length `low` stays in the order while
/// `low + radius(query_length) >= query_length`; a longer length `high`
/// while `query_length + radius(high) >= high`. Lengths beyond those cannot
/// reach the query under the warping band, so the warped distance to any of
/// their sub-sequences would be infinite.
#[must_use]
pub fn traverse_order(query_length: usize, total_length: usize, band: BandRatio) -> Vec<usize> {
    let mut order = vec![query_length];
    let mut low = query_length.saturating_sub(1);
    let mut high = query_length + 1;
    let mut low_stop = false;
    let mut high_stop = false;

    while !(low_stop && high_stop) {
        if low < 2 {
            low_stop = true;
        }
        if high > total_length {
            high_stop = true;
        }

        if !low_stop {
            if low + band.radius(query_length) >= query_length {
                order.push(low);
                low -= 1;
            } else {
                low_stop = true;
            }
        }

        if !high_stop {
            if query_length + band.radius(high) >= high {
                order.push(high);
                high += 1;
            } else {
                high_stop = true;
            }
        }
    }

    order
}

/// Group spaces for every sub-sequence length `2..=M`, plus the distance and
/// threshold the index was built with.
#[derive(Debug)]
pub struct GroupIndex {
    /// Indexed by length; entries 0 and 1 are always `None`.
    spaces: Vec<Option<LengthSpace>>,
    kind: DistanceKind,
    threshold: Value,
    band: BandRatio,
    group_count: usize,
}

impl GroupIndex {
    /// Build the full index: one greedy grouping pass per length.
    ///
    /// # Errors
    ///
    /// Propagates view construction and kernel errors from the build.
    #[instrument(skip(dataset), fields(
        items = dataset.item_count(),
        item_length = dataset.item_length(),
        distance = %kind,
        threshold = threshold as f64,
    ))]
    pub fn build(
        dataset: &Dataset,
        kind: DistanceKind,
        band: BandRatio,
        threshold: Value,
    ) -> Result<Self, IndexError> {
        let item_length = dataset.item_length();
        let mut spaces: Vec<Option<LengthSpace>> = (0..=item_length).map(|_| None).collect();
        let mut group_count = 0usize;

        for length in 2..=item_length {
            let mut space = LengthSpace::new(dataset, length);
            group_count += space.generate_groups(dataset, kind, band, threshold)?;
            spaces[length] = Some(space);
        }

        info!(group_count, "index built");
        Ok(Self {
            spaces,
            kind,
            threshold,
            band,
            group_count,
        })
    }

    /// Total number of groups across all lengths.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// The distance the index was built with.
    #[must_use]
    pub fn distance_kind(&self) -> DistanceKind {
        self.kind
    }

    /// The similarity threshold the index was built with.
    #[must_use]
    pub fn threshold(&self) -> Value {
        self.threshold
    }

    /// Find the stored sub-sequence most similar to the query.
    ///
    /// Lengths are visited in traversal order; at each length the local
    /// space nominates its best group by centroid distance, with the running
    /// best acting as the dropout across lengths, across centroids, and
    /// inside every cascade evaluation. The winning group is then scanned
    /// member by member.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IndexError::QueryTooShort`] | query has fewer than 2 points |
    /// | [`IndexError::UnreachableLength`] | no indexed length within the band of the query length |
    #[instrument(skip(self, dataset, query), fields(query = %query))]
    pub fn best_match<'a>(
        &self,
        dataset: &'a Dataset,
        query: &SeqView<'_>,
    ) -> Result<Candidate<'a>, IndexError> {
        if query.len() < 2 {
            return Err(IndexError::QueryTooShort { len: query.len() });
        }

        let total_length = self.spaces.len() - 1;
        let mut best_dist = Value::INFINITY;
        let mut best: Option<(&LengthSpace, &Group)> = None;

        for length in traverse_order(query.len(), total_length, self.band) {
            let Some(space) = self.spaces.get(length).and_then(Option::as_ref) else {
                continue;
            };
            let (group, dist) = space.best_group(query, best_dist, self.band);
            if let Some(group) = group {
                best_dist = dist;
                best = Some((space, group));
            }
        }

        let Some((space, group)) = best else {
            return Err(IndexError::UnreachableLength {
                len: query.len(),
                item_length: total_length,
            });
        };

        debug!(
            length = space.length(),
            centroid_distance = best_dist as f64,
            "best group selected"
        );
        group.best_match(dataset, space.members(), query, self.band)
    }

    /// Write the length range, the distance name, and every length space.
    pub(crate) fn save<W: Write>(&self, writer: &mut W, compact: bool) -> io::Result<()> {
        let len_from = self.spaces.iter().position(Option::is_some).unwrap_or(2);
        let len_to = self
            .spaces
            .iter()
            .rposition(Option::is_some)
            .map_or(len_from, |last| last + 1);
        writeln!(writer, "{len_from} {len_to}")?;
        writeln!(writer, "{}", self.kind.name())?;
        for space in self.spaces.iter().flatten() {
            space.save(writer, compact)?;
        }
        Ok(())
    }

    /// Read an index body (everything after the header line) against the
    /// given dataset.
    pub(crate) fn load(
        tokens: &mut Tokens<'_>,
        dataset: &Dataset,
        threshold: Value,
        band: BandRatio,
    ) -> Result<Self, IndexError> {
        let len_from: usize = tokens.parse("first length")?;
        let len_to: usize = tokens.parse("length limit")?;
        if len_from < 2 || len_to > dataset.item_length() + 1 {
            return Err(IndexError::Corrupt {
                detail: format!(
                    "length range [{len_from}, {len_to}) invalid for item length {}",
                    dataset.item_length()
                ),
            });
        }

        let kind = DistanceKind::from_name(tokens.next_str("distance name")?)?;

        let mut spaces: Vec<Option<LengthSpace>> =
            (0..=dataset.item_length()).map(|_| None).collect();
        let mut group_count = 0usize;
        for length in len_from..len_to {
            let (space, count) = LengthSpace::load(tokens, dataset, length)?;
            group_count += count;
            spaces[length] = Some(space);
        }

        info!(group_count, "index loaded");
        Ok(Self {
            spaces,
            kind,
            threshold,
            band,
            group_count,
        })
    }
}
