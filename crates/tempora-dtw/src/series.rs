//! Owned and borrowed sequence types with interior envelope caching.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::ops::Index;

use crate::Value;
use crate::envelope::Envelope;
use crate::error::DistanceError;

/// Common surface of owned and borrowed sequences, as consumed by the
/// distance kernels.
pub trait Series {
    /// Return the underlying values.
    fn values(&self) -> &[Value];

    /// Return the number of points.
    fn len(&self) -> usize {
        self.values().len()
    }

    /// Return true if the sequence has no points. Validated constructors
    /// never produce an empty sequence.
    fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Return the Keogh envelope for the given warping radius.
    ///
    /// The envelope is cached in a single slot keyed by the effective radius
    /// `min(radius, len - 1)`; asking for a different radius recomputes it.
    fn envelope(&self, radius: usize) -> Ref<'_, Envelope>;
}

/// Single-slot envelope cache keyed by the effective radius it was built for.
#[derive(Debug, Clone, Default)]
struct EnvelopeCache(RefCell<Option<(usize, Envelope)>>);

impl EnvelopeCache {
    fn get_or_compute(&self, values: &[Value], radius: usize) -> Ref<'_, Envelope> {
        let effective = radius.min(values.len() - 1);
        let stale = !matches!(&*self.0.borrow(), Some((r, _)) if *r == effective);
        if stale {
            *self.0.borrow_mut() = Some((effective, Envelope::compute(values, effective)));
        }
        Ref::map(self.0.borrow(), |slot| {
            let (_, envelope) = slot.as_ref().expect("cache slot filled above");
            envelope
        })
    }

    fn invalidate(&self) {
        *self.0.borrow_mut() = None;
    }
}

/// Owned, validated sequence. Guaranteed non-empty with all finite values.
///
/// Owned sequences are the exception in the engine: they exist for group
/// centroids and programmatic input; everything else borrows dataset rows
/// through [`SeqView`].
#[derive(Debug, Clone)]
pub struct Sequence {
    values: Vec<Value>,
    cache: EnvelopeCache,
}

impl Sequence {
    /// Create a sequence, validating that it is non-empty and all finite.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `values` is empty |
    /// | [`DistanceError::NonFiniteValue`] | Any value is NaN or infinite |
    pub fn new(values: Vec<Value>) -> Result<Self, DistanceError> {
        if values.is_empty() {
            return Err(DistanceError::EmptySeries);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DistanceError::NonFiniteValue { index });
        }
        Ok(Self {
            values,
            cache: EnvelopeCache::default(),
        })
    }

    /// Construct from values that are known to be validated already.
    pub(crate) fn from_validated(values: Vec<Value>) -> Self {
        Self {
            values,
            cache: EnvelopeCache::default(),
        }
    }

    /// Overwrite one point. Invalidates the cached envelope.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds, matching slice indexing.
    pub fn set(&mut self, index: usize, value: Value) {
        self.values[index] = value;
        self.cache.invalidate();
    }

    /// Pointwise addition of another sequence. Invalidates the cached
    /// envelope.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::ShapeMismatch`] | `other` has a different length |
    pub fn accumulate(&mut self, other: &impl Series) -> Result<(), DistanceError> {
        if other.len() != self.values.len() {
            return Err(DistanceError::ShapeMismatch {
                left: self.values.len(),
                right: other.len(),
            });
        }
        for (dst, src) in self.values.iter_mut().zip(other.values()) {
            *dst += *src;
        }
        self.cache.invalidate();
        Ok(())
    }

    /// Consume and return the inner vector.
    #[must_use]
    pub fn into_inner(self) -> Vec<Value> {
        self.values
    }
}

impl Series for Sequence {
    fn values(&self) -> &[Value] {
        &self.values
    }

    fn envelope(&self, radius: usize) -> Ref<'_, Envelope> {
        self.cache.get_or_compute(&self.values, radius)
    }
}

impl Index<usize> for Sequence {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl AsRef<[Value]> for Sequence {
    fn as_ref(&self) -> &[Value] {
        &self.values
    }
}

/// Borrowed, non-owning window `[start, end)` over one row of a dataset.
///
/// Carries the coordinate of the window (`index` = row, `start` = offset)
/// so that a query result can name the sub-sequence it matched. The window
/// slice itself must come from an already-validated buffer; only emptiness
/// is checked here.
#[derive(Debug, Clone)]
pub struct SeqView<'a> {
    values: &'a [Value],
    index: usize,
    start: usize,
    cache: EnvelopeCache,
}

impl<'a> SeqView<'a> {
    /// Create a view over a window of a validated buffer.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `values` is empty |
    pub fn new(values: &'a [Value], index: usize, start: usize) -> Result<Self, DistanceError> {
        if values.is_empty() {
            return Err(DistanceError::EmptySeries);
        }
        Ok(Self {
            values,
            index,
            start,
            cache: EnvelopeCache::default(),
        })
    }

    /// Create a view over a free-standing slice, with zero coordinates.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::EmptySeries`] | `values` is empty |
    pub fn from_slice(values: &'a [Value]) -> Result<Self, DistanceError> {
        Self::new(values, 0, 0)
    }

    /// Return the row index of the owning dataset item.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the starting offset of the window within its row.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Return the exclusive end offset of the window within its row.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }

    /// Copy the window into an owned [`Sequence`].
    #[must_use]
    pub fn to_sequence(&self) -> Sequence {
        Sequence::from_validated(self.values.to_vec())
    }
}

impl Series for SeqView<'_> {
    fn values(&self) -> &[Value] {
        self.values
    }

    fn envelope(&self, radius: usize) -> Ref<'_, Envelope> {
        self.cache.get_or_compute(self.values, radius)
    }
}

impl Index<usize> for SeqView<'_> {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl AsRef<[Value]> for SeqView<'_> {
    fn as_ref(&self) -> &[Value] {
        self.values
    }
}

impl fmt::Display for SeqView<'_> {
    /// Textual identifier of the window: `<row> [<start>, <end>]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.index, self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_vec() {
        assert!(matches!(
            Sequence::new(vec![]),
            Err(DistanceError::EmptySeries)
        ));
    }

    #[test]
    fn rejects_nan() {
        assert!(matches!(
            Sequence::new(vec![1.0, Value::NAN, 3.0]),
            Err(DistanceError::NonFiniteValue { index: 1 })
        ));
    }

    #[test]
    fn rejects_infinity() {
        assert!(matches!(
            Sequence::new(vec![1.0, 2.0, Value::INFINITY]),
            Err(DistanceError::NonFiniteValue { index: 2 })
        ));
    }

    #[test]
    fn view_rejects_empty_slice() {
        assert!(matches!(
            SeqView::from_slice(&[]),
            Err(DistanceError::EmptySeries)
        ));
    }

    #[test]
    fn view_coordinates_and_identifier() {
        let row = [1.0, 2.0, 3.0, 4.0, 5.0];
        let view = SeqView::new(&row[1..4], 7, 1).unwrap();
        assert_eq!(view.index(), 7);
        assert_eq!(view.start(), 1);
        assert_eq!(view.end(), 4);
        assert_eq!(view.len(), 3);
        assert_eq!(view.to_string(), "7 [1, 4]");
    }

    #[test]
    fn view_indexing() {
        let data = [10.0, 20.0, 30.0];
        let view = SeqView::from_slice(&data).unwrap();
        assert_eq!(view[0], 10.0);
        assert_eq!(view[2], 30.0);
    }

    #[test]
    fn accumulate_adds_pointwise() {
        let mut seq = Sequence::new(vec![1.0, 2.0, 3.0]).unwrap();
        let other = Sequence::new(vec![10.0, 20.0, 30.0]).unwrap();
        seq.accumulate(&other).unwrap();
        assert_eq!(seq.values(), &[11.0, 22.0, 33.0]);
    }

    #[test]
    fn accumulate_length_mismatch() {
        let mut seq = Sequence::new(vec![1.0, 2.0, 3.0]).unwrap();
        let other = Sequence::new(vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            seq.accumulate(&other),
            Err(DistanceError::ShapeMismatch { left: 3, right: 2 })
        ));
    }

    #[test]
    fn envelope_cache_reused_for_same_radius() {
        let seq = Sequence::new(vec![3.0, 1.0, 4.0, 1.0, 5.0]).unwrap();
        let first: Vec<Value> = seq.envelope(1).upper().to_vec();
        let second: Vec<Value> = seq.envelope(1).upper().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn envelope_recomputed_for_new_radius() {
        let seq = Sequence::new(vec![3.0, 1.0, 4.0, 1.0, 5.0]).unwrap();
        let narrow: Vec<Value> = seq.envelope(0).upper().to_vec();
        let wide: Vec<Value> = seq.envelope(4).upper().to_vec();
        assert_eq!(narrow, vec![3.0, 1.0, 4.0, 1.0, 5.0]);
        assert_eq!(wide, vec![5.0; 5]);
    }

    #[test]
    fn envelope_radius_clipped_to_length() {
        let seq = Sequence::new(vec![2.0, 7.0]).unwrap();
        // Radius 10 and radius 1 are the same effective envelope for length 2,
        // so the cache must treat them as one key.
        let a: Vec<Value> = seq.envelope(10).upper().to_vec();
        let b: Vec<Value> = seq.envelope(1).upper().to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn set_invalidates_envelope() {
        let mut seq = Sequence::new(vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(seq.envelope(2).upper(), &[1.0, 1.0, 1.0]);
        seq.set(1, 9.0);
        assert_eq!(seq.envelope(2).upper(), &[9.0, 9.0, 9.0]);
    }

    #[test]
    fn accumulate_invalidates_envelope() {
        let mut seq = Sequence::new(vec![1.0, 1.0]).unwrap();
        assert_eq!(seq.envelope(1).upper(), &[1.0, 1.0]);
        let bump = Sequence::new(vec![0.0, 5.0]).unwrap();
        seq.accumulate(&bump).unwrap();
        assert_eq!(seq.envelope(1).upper(), &[6.0, 6.0]);
    }
}
