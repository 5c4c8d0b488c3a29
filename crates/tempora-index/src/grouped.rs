//! The public aggregate: a dataset paired with its group index.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, instrument};

use tempora_dataset::Dataset;
use tempora_dtw::{BandRatio, DistanceKind, SeqView, Value};

use crate::error::IndexError;
use crate::global::GroupIndex;
use crate::group::Candidate;
use crate::serial::{INDEX_FILE_VERSION, Tokens};

/// A dataset that can be indexed for sub-sequence similarity search.
///
/// Owns both the matrix and the index built over it, so a group can never
/// outlive the rows its members point into. Queries run against whichever
/// index was last built or loaded.
#[derive(Debug)]
pub struct GroupedDataset {
    dataset: Dataset,
    index: Option<GroupIndex>,
    band: BandRatio,
}

impl GroupedDataset {
    /// Wrap a dataset for indexing under the given warping band.
    #[must_use]
    pub fn new(dataset: Dataset, band: BandRatio) -> Self {
        Self {
            dataset,
            index: None,
            band,
        }
    }

    /// Return the underlying dataset.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Return the underlying dataset for mutation.
    ///
    /// Any existing index is discarded: the transforms that mutate a dataset
    /// (normalize, PAA) rewrite the buffer the index's members point into.
    pub fn dataset_mut(&mut self) -> &mut Dataset {
        self.index = None;
        &mut self.dataset
    }

    /// Return the warping band the aggregate was created with.
    #[must_use]
    pub fn band(&self) -> BandRatio {
        self.band
    }

    /// Return true if an index is present.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Build (or rebuild) the index with the given distance and threshold,
    /// returning the total number of groups.
    ///
    /// # Errors
    ///
    /// Propagates kernel and view errors from the build.
    #[instrument(skip(self), fields(distance = %kind, threshold = threshold as f64))]
    pub fn build_index(&mut self, kind: DistanceKind, threshold: Value) -> Result<usize, IndexError> {
        self.index = None;
        let index = GroupIndex::build(&self.dataset, kind, self.band, threshold)?;
        let count = index.group_count();
        self.index = Some(index);
        Ok(count)
    }

    /// Write the index to a text file. The compact form records only group
    /// sizes and cannot be loaded back; the full form round-trips.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IndexError::NotIndexed`] | no index has been built or loaded |
    /// | [`IndexError::Io`] | the file cannot be created or written |
    #[instrument(skip(self), fields(path = %path.as_ref().display(), compact))]
    pub fn save_index(&self, path: impl AsRef<Path>, compact: bool) -> Result<(), IndexError> {
        let index = self.index.as_ref().ok_or(IndexError::NotIndexed)?;
        let path = path.as_ref();
        let io_err = |e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        writeln!(
            writer,
            "{} {} {} {}",
            INDEX_FILE_VERSION,
            index.threshold(),
            self.dataset.item_count(),
            self.dataset.item_length(),
        )
        .map_err(io_err)?;
        index.save(&mut writer, compact).map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        info!(groups = index.group_count(), "index saved");
        Ok(())
    }

    /// Load an index previously written by [`save_index`](Self::save_index)
    /// in full form, returning the total number of groups.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IndexError::Io`] | the file cannot be opened or read |
    /// | [`IndexError::VersionMismatch`] | the file format version differs |
    /// | [`IndexError::ShapeMismatch`] | the file's dataset dimensions differ |
    /// | [`IndexError::Corrupt`] | the file content is malformed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load_index(&mut self, path: impl AsRef<Path>) -> Result<usize, IndexError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| IndexError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut tokens = Tokens::new(&text);

        let version: u32 = tokens.parse("format version")?;
        if version != INDEX_FILE_VERSION {
            return Err(IndexError::VersionMismatch {
                expected: INDEX_FILE_VERSION,
                found: version,
            });
        }

        let threshold: Value = tokens.parse("threshold")?;
        let file_items: usize = tokens.parse("item count")?;
        let file_length: usize = tokens.parse("item length")?;
        if file_items != self.dataset.item_count() || file_length != self.dataset.item_length() {
            return Err(IndexError::ShapeMismatch {
                file_items,
                file_length,
                items: self.dataset.item_count(),
                length: self.dataset.item_length(),
            });
        }

        let index = GroupIndex::load(&mut tokens, &self.dataset, threshold, self.band)?;
        let count = index.group_count();
        self.index = Some(index);
        Ok(count)
    }

    /// Find the stored sub-sequence most similar to the query.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IndexError::NotIndexed`] | no index has been built or loaded |
    /// | [`IndexError::QueryTooShort`] | query has fewer than 2 points |
    /// | [`IndexError::UnreachableLength`] | no indexed length within the band |
    pub fn best_match(&self, query: &SeqView<'_>) -> Result<Candidate<'_>, IndexError> {
        let index = self.index.as_ref().ok_or(IndexError::NotIndexed)?;
        index.best_match(&self.dataset, query)
    }
}
