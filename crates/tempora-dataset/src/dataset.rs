//! The dataset matrix: `N` items of equal length `M` in one contiguous
//! buffer.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, instrument};

use tempora_dtw::{BandRatio, DistanceKind, SeqView, Series, Value};

use crate::error::DatasetError;

/// An owned `N x M` matrix of time series, loaded from a text table or built
/// programmatically.
///
/// The buffer is row-major and every stored value is finite. Whole-dataset
/// transforms (`normalize`, `paa`) rewrite the buffer in place; everything
/// else reads it through borrowed [`SeqView`] windows.
#[derive(Debug, Clone)]
pub struct Dataset {
    item_count: usize,
    item_length: usize,
    data: Vec<Value>,
    normalized: bool,
}

impl Dataset {
    /// Read a text table where each line is one item and fields are split on
    /// any character of `separators`.
    ///
    /// The first line fixes the field count. Fields before `start_col` are
    /// discarded. `max_rows == 0` reads every line; otherwise at most
    /// `max_rows` lines are read.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DatasetError::Io`] | file cannot be opened or read |
    /// | [`DatasetError::InconsistentRow`] | a line's field count differs from the first line |
    /// | [`DatasetError::Unparsable`] | a field is not a number |
    /// | [`DatasetError::OutOfRange`] | a field parses to a non-finite value |
    /// | [`DatasetError::EmptyDataset`] | no lines, or no fields after `start_col` |
    #[instrument(skip_all, fields(path = %path.as_ref().display(), max_rows, start_col))]
    pub fn load(
        path: impl AsRef<Path>,
        max_rows: usize,
        start_col: usize,
        separators: &str,
    ) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let mut data: Vec<Value> = Vec::new();
        let mut expected_fields = 0usize;
        let mut item_count = 0usize;

        for (row, line) in reader.lines().enumerate() {
            if max_rows != 0 && item_count == max_rows {
                break;
            }
            let line = line.map_err(|e| DatasetError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let fields: Vec<&str> = line
                .trim_end_matches('\r')
                .split(|c| separators.contains(c))
                .filter(|f| !f.is_empty())
                .collect();

            if row == 0 {
                expected_fields = fields.len();
            } else if fields.len() != expected_fields {
                return Err(DatasetError::InconsistentRow {
                    row,
                    expected: expected_fields,
                    got: fields.len(),
                });
            }

            for (col, field) in fields.iter().enumerate().skip(start_col) {
                let value: Value = field.parse().map_err(|_| DatasetError::Unparsable {
                    row,
                    col,
                    raw: (*field).to_string(),
                })?;
                if !value.is_finite() {
                    return Err(DatasetError::OutOfRange {
                        row,
                        col,
                        raw: (*field).to_string(),
                    });
                }
                data.push(value);
            }
            item_count += 1;
        }

        if item_count == 0 || expected_fields <= start_col {
            return Err(DatasetError::EmptyDataset);
        }

        let item_length = expected_fields - start_col;
        info!(item_count, item_length, "dataset loaded");

        Ok(Self {
            item_count,
            item_length,
            data,
            normalized: false,
        })
    }

    /// Build a dataset from rows that are already in memory.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DatasetError::EmptyDataset`] | zero rows, or a zero-length first row |
    /// | [`DatasetError::InconsistentRow`] | a row's length differs from the first |
    /// | [`DatasetError::OutOfRange`] | a value is NaN or infinite |
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Self, DatasetError> {
        let item_count = rows.len();
        let item_length = rows.first().map_or(0, Vec::len);
        if item_count == 0 || item_length == 0 {
            return Err(DatasetError::EmptyDataset);
        }

        let mut data = Vec::with_capacity(item_count * item_length);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != item_length {
                return Err(DatasetError::InconsistentRow {
                    row,
                    expected: item_length,
                    got: values.len(),
                });
            }
            if let Some(col) = values.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::OutOfRange {
                    row,
                    col,
                    raw: values[col].to_string(),
                });
            }
            data.extend(values);
        }

        Ok(Self {
            item_count,
            item_length,
            data,
            normalized: false,
        })
    }

    /// Write the matrix as a text table, one item per line, fields joined by
    /// `separator`. Values round-trip through their shortest decimal form.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Io`] if the file cannot be created or written.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>, separator: char) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let io_err = |e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        for row in 0..self.item_count {
            let fields = &self.data[row * self.item_length..(row + 1) * self.item_length];
            for (col, value) in fields.iter().enumerate() {
                if col > 0 {
                    write!(writer, "{separator}").map_err(io_err)?;
                }
                write!(writer, "{value}").map_err(io_err)?;
            }
            writeln!(writer).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;

        info!(items = self.item_count, "dataset saved");
        Ok(())
    }

    /// Return the number of items (`N`).
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Return the length of each item (`M`).
    #[must_use]
    pub fn item_length(&self) -> usize {
        self.item_length
    }

    /// Return true once [`normalize`](Self::normalize) has run.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Borrow one whole item as a view.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidRow`] if `index` is out of range.
    pub fn time_series(&self, index: usize) -> Result<SeqView<'_>, DatasetError> {
        self.sub_sequence(index, 0, self.item_length)
    }

    /// Borrow the window `[start, end)` of one item as a view.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DatasetError::InvalidRow`] | `index >= item_count` |
    /// | [`DatasetError::InvalidWindow`] | `start >= end` or `end > item_length` |
    pub fn sub_sequence(
        &self,
        index: usize,
        start: usize,
        end: usize,
    ) -> Result<SeqView<'_>, DatasetError> {
        if index >= self.item_count {
            return Err(DatasetError::InvalidRow {
                index,
                rows: self.item_count,
            });
        }
        if start >= end || end > self.item_length {
            return Err(DatasetError::InvalidWindow {
                start,
                end,
                item_length: self.item_length,
            });
        }
        let offset = index * self.item_length;
        Ok(SeqView::new(
            &self.data[offset + start..offset + end],
            index,
            start,
        )?)
    }

    /// Linearly rescale the whole matrix to `[0, 1]` in place and return the
    /// observed `(min, max)`.
    ///
    /// A constant matrix is zeroed, unless the constant is already zero, in
    /// which case the buffer is left untouched.
    #[instrument(skip(self))]
    pub fn normalize(&mut self) -> (Value, Value) {
        let mut min = Value::INFINITY;
        let mut max = Value::NEG_INFINITY;
        for &v in &self.data {
            min = min.min(v);
            max = max.max(v);
        }

        let range = max - min;
        if range == 0.0 {
            if max != 0.0 {
                self.data.fill(0.0);
            }
        } else {
            for v in &mut self.data {
                *v = (*v - min) / range;
            }
        }

        self.normalized = true;
        debug!(min = min as f64, max = max as f64, "matrix normalized");
        (min, max)
    }

    /// Piecewise Aggregate Approximation: replace every run of `block`
    /// consecutive values with their mean, shrinking each item to
    /// `ceil(M / block)` values. The trailing partial block is averaged over
    /// its actual count.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidBlockSize`] if `block` is zero.
    #[instrument(skip(self))]
    pub fn paa(&mut self, block: usize) -> Result<(), DatasetError> {
        if block == 0 {
            return Err(DatasetError::InvalidBlockSize);
        }

        let old_length = self.item_length;
        let new_length = (old_length - 1) / block + 1;
        let mut compressed = Vec::with_capacity(self.item_count * new_length);

        for row in 0..self.item_count {
            let item = &self.data[row * old_length..(row + 1) * old_length];
            for chunk in item.chunks(block) {
                let sum: Value = chunk.iter().sum();
                compressed.push(sum / chunk.len() as Value);
            }
        }

        self.data = compressed;
        self.item_length = new_length;
        debug!(old_length, new_length, "matrix down-sampled");
        Ok(())
    }

    /// Convenience: distance from the window `[start, start + length)` of
    /// item `index` to `other`, using the named kernel with no dropout.
    ///
    /// # Errors
    ///
    /// Propagates view construction errors and
    /// [`DistanceError::ShapeMismatch`](tempora_dtw::DistanceError::ShapeMismatch)
    /// from the Euclidean kernel.
    pub fn distance_between(
        &self,
        index: usize,
        start: usize,
        length: usize,
        other: &impl Series,
        kind: DistanceKind,
        band: BandRatio,
    ) -> Result<Value, DatasetError> {
        let window = self.sub_sequence(index, start, start + length)?;
        Ok(kind.pairwise(&window, other, Value::INFINITY, band)?)
    }
}
