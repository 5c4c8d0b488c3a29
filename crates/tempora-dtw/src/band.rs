//! Sakoe-Chiba warping band configuration.

use crate::error::DistanceError;

/// Warping band width as a fraction of sequence length.
///
/// A DTW cost cell `(i, j)` is admissible only if `|i - j| <= radius`, where
/// the radius is derived from the longer of the two sequences being compared.
/// The ratio is fixed at construction and threaded explicitly through the
/// kernels and the index; it is never mutated mid-query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRatio(f64);

impl BandRatio {
    /// Create a band ratio, validating that it lies in `(0, 1]`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::InvalidBandRatio`] | `ratio <= 0`, `ratio > 1`, or not finite |
    pub fn new(ratio: f64) -> Result<Self, DistanceError> {
        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
            return Err(DistanceError::InvalidBandRatio { ratio });
        }
        Ok(Self(ratio))
    }

    /// Return the raw ratio.
    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Return the Sakoe-Chiba radius for a sequence of the given length:
    /// `floor(length * ratio)` clipped to `length - 1`.
    #[must_use]
    pub fn radius(self, length: usize) -> usize {
        let radius = (length as f64 * self.0).floor() as usize;
        radius.min(length.saturating_sub(1))
    }
}

impl Default for BandRatio {
    /// The conventional default of one tenth of the sequence length.
    fn default() -> Self {
        Self(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ratio_is_one_tenth() {
        assert_eq!(BandRatio::default().get(), 0.1);
    }

    #[test]
    fn radius_floors_the_product() {
        let band = BandRatio::new(0.4).unwrap();
        assert_eq!(band.radius(3), 1);
        assert_eq!(band.radius(4), 1);
        assert_eq!(band.radius(5), 2);
    }

    #[test]
    fn radius_clipped_to_length_minus_one() {
        let band = BandRatio::new(1.0).unwrap();
        assert_eq!(band.radius(2), 1);
        assert_eq!(band.radius(10), 9);
    }

    #[test]
    fn radius_of_unit_length_is_zero() {
        let band = BandRatio::new(1.0).unwrap();
        assert_eq!(band.radius(1), 0);
    }

    #[test]
    fn rejects_zero_ratio() {
        assert!(matches!(
            BandRatio::new(0.0),
            Err(DistanceError::InvalidBandRatio { .. })
        ));
    }

    #[test]
    fn rejects_ratio_above_one() {
        assert!(matches!(
            BandRatio::new(1.5),
            Err(DistanceError::InvalidBandRatio { .. })
        ));
    }

    #[test]
    fn rejects_nan_ratio() {
        assert!(matches!(
            BandRatio::new(f64::NAN),
            Err(DistanceError::InvalidBandRatio { .. })
        ));
    }
}
