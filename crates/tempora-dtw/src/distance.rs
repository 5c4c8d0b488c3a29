//! Distance kernels: pairwise Euclidean, band-constrained DTW, lower bounds,
//! and the pruning cascade.
//!
//! Every kernel takes an early-abandon upper bound (`dropout`) expressed in
//! the normalized output domain and converts it internally to its cumulative
//! sum domain. A kernel that can prove its result exceeds the dropout returns
//! `Value::INFINITY` instead of finishing the computation.

use crate::Value;
use crate::band::BandRatio;
use crate::error::DistanceError;
use crate::series::Series;

#[inline]
fn sq(x: Value, y: Value) -> Value {
    (x - y) * (x - y)
}

/// Length-normalized Euclidean distance between equal-length sequences.
///
/// Accumulates squared pointwise differences, abandoning once the sum exceeds
/// `dropout^2 * len`. The result is `sqrt(sum / len)`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`DistanceError::ShapeMismatch`] | operand lengths differ |
pub fn pairwise_distance(
    a: &impl Series,
    b: &impl Series,
    dropout: Value,
) -> Result<Value, DistanceError> {
    if a.len() != b.len() {
        return Err(DistanceError::ShapeMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let max_len = a.len().max(b.len()) as Value;
    let limit = dropout * dropout * max_len;

    let mut total: Value = 0.0;
    for (&x, &y) in a.values().iter().zip(b.values()) {
        total += sq(x, y);
        if total > limit {
            return Ok(Value::INFINITY);
        }
    }
    Ok((total / max_len).sqrt())
}

/// Dynamic Time Warping distance constrained to a Sakoe-Chiba band.
///
/// The radius is `band.radius(max(m, n))`. Cells outside the band keep an
/// infinite cost, so a band too narrow to connect the two corners yields
/// `Value::INFINITY`; length pairs outside the band are unreachable by
/// construction. After each row the row minimum is compared against
/// `(dropout * 2 * max_len)^2`; exceeding it abandons the computation.
/// The result is `sqrt(cost[m-1][n-1]) / (2 * max_len)`.
#[must_use]
pub fn warped_distance(a: &impl Series, b: &impl Series, dropout: Value, band: BandRatio) -> Value {
    let av = a.values();
    let bv = b.values();
    let m = av.len();
    let n = bv.len();
    let max_len = m.max(n);
    let r = band.radius(max_len);

    // Base intervals need no matrix.
    if m == 1 && n == 1 {
        return (av[0] - bv[0]).abs() / 2.0;
    }

    let norm = (2 * max_len) as Value;
    let limit = {
        let scaled = dropout * norm;
        scaled * scaled
    };

    let mut cost = vec![Value::INFINITY; m * n];
    cost[0] = sq(av[0], bv[0]);

    // Boundary column and row, inside the band only. Everything else starts
    // at infinity, which is what an out-of-band predecessor must read as.
    for i in 1..m.min(r + 1) {
        cost[i * n] = cost[(i - 1) * n] + sq(av[i], bv[0]);
    }
    for j in 1..n.min(r + 1) {
        cost[j] = cost[j - 1] + sq(av[0], bv[j]);
    }

    for i in 1..m {
        let lo = i.saturating_sub(r).max(1);
        let hi = (i + r).min(n - 1);
        let mut row_min = Value::INFINITY;

        for j in lo..=hi {
            let above = cost[(i - 1) * n + j];
            let left = cost[i * n + j - 1];
            let diag = cost[(i - 1) * n + j - 1];
            let cell = diag.min(above).min(left) + sq(av[i], bv[j]);
            cost[i * n + j] = cell;
            row_min = row_min.min(cell);
        }

        if row_min > limit {
            return Value::INFINITY;
        }
    }

    cost[m * n - 1].sqrt() / norm
}

/// Constant-time boundary lower bound on DTW from the first and last 1, 2,
/// and 3 points of each sequence (Kim).
///
/// Kept implemented and tested, but not part of [`cascade_distance`]: its
/// staged comparisons mix the squared-sum and normalized domains, so its
/// pruning is unreliable and it is excluded from the query path.
#[must_use]
pub fn kim_lower_bound(a: &impl Series, b: &impl Series, dropout: Value) -> Value {
    let av = a.values();
    let bv = b.values();
    let al = av.len();
    let bl = bv.len();
    let l = al.min(bl);

    if l == 1 {
        return sq(av[0], bv[0]);
    }

    let mut lb = sq(av[0], bv[0]) + sq(av[al - 1], bv[bl - 1]);
    if lb > dropout {
        return Value::INFINITY;
    }

    lb += sq(av[0], bv[1]).min(sq(av[1], bv[1])).min(sq(av[1], bv[0]));
    if lb > dropout {
        return Value::INFINITY;
    }

    lb += sq(av[al - 1], bv[bl - 2])
        .min(sq(av[al - 2], bv[bl - 2]))
        .min(sq(av[al - 2], bv[bl - 1]));
    if lb >= dropout {
        return Value::INFINITY;
    }

    // With four points the two-point stages already cover both ends; with
    // fewer than three the three-point stages have nothing to read.
    if l == 4 || l < 3 {
        return lb;
    }

    lb += sq(av[0], bv[2])
        .min(sq(av[1], bv[2]))
        .min(sq(av[2], bv[2]))
        .min(sq(av[2], bv[1]))
        .min(sq(av[2], bv[0]));
    if lb > dropout {
        return Value::INFINITY;
    }

    lb += sq(av[al - 1], bv[bl - 3])
        .min(sq(av[al - 2], bv[bl - 3]))
        .min(sq(av[al - 3], bv[bl - 3]))
        .min(sq(av[al - 3], bv[bl - 2]))
        .min(sq(av[al - 3], bv[bl - 1]));
    lb
}

/// LB_Keogh lower bound on DTW: `b` against the cached envelopes of `a`.
///
/// For each position up to the shorter length, a value of `b` outside `a`'s
/// envelope contributes its squared distance to the nearest envelope bound.
/// Accumulation stops once the sum exceeds `(dropout * 2 * max_len)^2`; the
/// normalized partial sum is still returned, so an abandoned bound lands
/// above the dropout without being infinite. The result is
/// `sqrt(sum) / (2 * max_len)`.
#[must_use]
pub fn keogh_lower_bound(
    a: &impl Series,
    b: &impl Series,
    dropout: Value,
    band: BandRatio,
) -> Value {
    let len = a.len().min(b.len());
    let max_len = a.len().max(b.len());
    let radius = band.radius(max_len);

    let envelope = a.envelope(radius);
    let upper = envelope.upper();
    let lower = envelope.lower();
    let bv = b.values();

    let norm = (2 * max_len) as Value;
    let limit = {
        let scaled = dropout * norm;
        scaled * scaled
    };

    let mut lb: Value = 0.0;
    for i in 0..len {
        if lb >= limit {
            break;
        }
        let x = bv[i];
        if x > upper[i] {
            lb += sq(x, upper[i]);
        } else if x < lower[i] {
            lb += sq(x, lower[i]);
        }
    }
    lb.sqrt() / norm
}

/// Symmetric Keogh bound: `max(keogh(a, b), keogh(b, a))`, with an early exit
/// to `Value::INFINITY` if the first direction already exceeds the dropout.
#[must_use]
pub fn cross_keogh_lower_bound(
    a: &impl Series,
    b: &impl Series,
    dropout: Value,
    band: BandRatio,
) -> Value {
    let lb = keogh_lower_bound(a, b, dropout, band);
    if lb > dropout {
        return Value::INFINITY;
    }
    lb.max(keogh_lower_bound(b, a, dropout, band))
}

/// The pruning pipeline used wherever the index is queried: cross-Keogh
/// first, full warped DTW only if the bound stays under the dropout.
#[must_use]
pub fn cascade_distance(a: &impl Series, b: &impl Series, dropout: Value, band: BandRatio) -> Value {
    let lb = cross_keogh_lower_bound(a, b, dropout, band);
    if lb > dropout {
        return Value::INFINITY;
    }
    warped_distance(a, b, dropout, band)
}

/// The closed set of distances an index can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceKind {
    /// Length-normalized Euclidean distance over equal-length sub-sequences.
    Euclidean,
    /// Band-constrained DTW, tolerant of length differences within the band.
    EuclideanDtw,
}

impl DistanceKind {
    /// Look up a kernel by its serialized name.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::UnknownDistance`] | name is not `euclidean` or `euclidean_dtw` |
    pub fn from_name(name: &str) -> Result<Self, DistanceError> {
        match name {
            "euclidean" => Ok(Self::Euclidean),
            "euclidean_dtw" => Ok(Self::EuclideanDtw),
            _ => Err(DistanceError::UnknownDistance {
                name: name.to_string(),
            }),
        }
    }

    /// Return the serialized name of the kernel.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::EuclideanDtw => "euclidean_dtw",
        }
    }

    /// Invoke the pairwise form of this kernel.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DistanceError::ShapeMismatch`] | Euclidean kernel with unequal lengths |
    pub fn pairwise(
        self,
        a: &impl Series,
        b: &impl Series,
        dropout: Value,
        band: BandRatio,
    ) -> Result<Value, DistanceError> {
        match self {
            Self::Euclidean => pairwise_distance(a, b, dropout),
            Self::EuclideanDtw => Ok(warped_distance(a, b, dropout, band)),
        }
    }
}

impl std::fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeqView;

    const EPS: Value = 1e-9;

    fn view(values: &[Value]) -> SeqView<'_> {
        SeqView::from_slice(values).unwrap()
    }

    fn full_band() -> BandRatio {
        BandRatio::new(1.0).unwrap()
    }

    #[test]
    fn pairwise_identical_is_zero() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let d = pairwise_distance(&view(&a), &view(&a), Value::INFINITY).unwrap();
        assert!(d.abs() < EPS);
    }

    #[test]
    fn pairwise_normalizes_by_length() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [11.0, 2.0, 3.0, 4.0, 5.0];
        let d = pairwise_distance(&view(&a), &view(&b), Value::INFINITY).unwrap();
        assert!((d - (100.0 as Value / 5.0).sqrt()).abs() < EPS);
    }

    #[test]
    fn pairwise_shape_mismatch() {
        let a = [1.0, 2.0];
        let b = [1.0, 2.0, 3.0];
        assert!(matches!(
            pairwise_distance(&view(&a), &view(&b), Value::INFINITY),
            Err(DistanceError::ShapeMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn pairwise_abandons_past_dropout() {
        let a = [0.0, 0.0, 0.0];
        let b = [10.0, 0.0, 0.0];
        let d = pairwise_distance(&view(&a), &view(&b), 1.0).unwrap();
        assert!(d.is_infinite());
    }

    #[test]
    fn warped_single_point_fast_path() {
        let d = warped_distance(&view(&[5.0]), &view(&[3.0]), Value::INFINITY, full_band());
        assert!((d - 1.0).abs() < EPS);
    }

    #[test]
    fn warped_two_points() {
        let a = [1.0, 2.0];
        let b = [11.0, 2.0];
        let d = warped_distance(&view(&a), &view(&b), Value::INFINITY, full_band());
        assert!((d - (100.0 as Value).sqrt() / 4.0).abs() < EPS);
    }

    #[test]
    fn warped_absorbs_repeated_points() {
        let a = [2.0, 4.0];
        let b = [2.0, 2.0, 2.0, 4.0, 4.0];
        let d = warped_distance(&view(&a), &view(&b), Value::INFINITY, full_band());
        assert!(d.abs() < EPS);
    }

    #[test]
    fn warped_hand_computed_length_four() {
        let a = [1.0, 2.0, 2.0, 4.0];
        let b = [1.0, 2.0, 4.0, 5.0];
        let d = warped_distance(&view(&a), &view(&b), Value::INFINITY, full_band());
        assert!((d - 1.0 / 8.0).abs() < EPS);
    }

    #[test]
    fn warped_hand_computed_length_seven() {
        let a = [4.0, 3.0, 5.0, 3.0, 5.0, 3.0, 4.0];
        let b = [4.0, 3.0, 3.0, 1.0, 1.0, 3.0, 4.0];
        let d = warped_distance(&view(&a), &view(&b), Value::INFINITY, full_band());
        assert!((d - (12.0 as Value).sqrt() / 14.0).abs() < EPS);
    }

    #[test]
    fn warped_symmetric() {
        let a = [1.0, 3.0, 5.0, 2.0, 4.0];
        let b = [2.0, 4.0, 1.0, 3.0];
        let band = full_band();
        let d_ab = warped_distance(&view(&a), &view(&b), Value::INFINITY, band);
        let d_ba = warped_distance(&view(&b), &view(&a), Value::INFINITY, band);
        assert!((d_ab - d_ba).abs() < EPS);
    }

    #[test]
    fn warped_unreachable_corner_is_infinite() {
        // Radius floor(10 * 0.1) = 1 cannot connect lengths 10 and 2.
        let a = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = [0.0, 1.0];
        let d = warped_distance(&view(&a), &view(&b), Value::INFINITY, BandRatio::default());
        assert!(d.is_infinite());
    }

    #[test]
    fn warped_abandons_past_dropout() {
        let a = [0.0, 0.0, 0.0, 0.0];
        let b = [100.0, 100.0, 100.0, 100.0];
        let d = warped_distance(&view(&a), &view(&b), 0.5, full_band());
        assert!(d.is_infinite());
    }

    #[test]
    fn warped_dropout_leaves_small_distances_alone() {
        let a = [2.0, 4.0];
        let b = [2.0, 2.0, 2.0, 4.0, 4.0];
        let d = warped_distance(&view(&a), &view(&b), 5.0, full_band());
        assert!(d.abs() < EPS);
    }

    #[test]
    fn kim_identical_is_zero() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let d = kim_lower_bound(&view(&a), &view(&a), Value::INFINITY);
        assert!(d.abs() < EPS);
    }

    #[test]
    fn kim_single_point_is_squared_difference() {
        let d = kim_lower_bound(&view(&[3.0]), &view(&[1.0]), Value::INFINITY);
        assert!((d - 4.0).abs() < EPS);
    }

    #[test]
    fn kim_abandons_past_dropout() {
        let a = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let b = [10.0, 0.0, 0.0, 0.0, 0.0, 10.0];
        let d = kim_lower_bound(&view(&a), &view(&b), 1.0);
        assert!(d.is_infinite());
    }

    #[test]
    fn keogh_hand_computed() {
        // Envelopes of `a` at radius floor(10 * 0.2) = 2; positions of `b`
        // outside them contribute 25 + 1 + 4 + 1 = 31.
        let a = [0.0, 2.0, 3.0, 5.0, 8.0, 6.0, 3.0, 2.0, 3.0, 5.0];
        let b = [8.0, 4.0, 6.0, 1.0, 5.0, 10.0, 9.0];
        let band = BandRatio::new(0.2).unwrap();
        let d = keogh_lower_bound(&view(&a), &view(&b), 10.0, band);
        assert!((d - (31.0 as Value).sqrt() / 20.0).abs() < EPS);
    }

    #[test]
    fn keogh_bounds_warped() {
        let pairs: [(&[Value], &[Value]); 3] = [
            (&[1.0, 2.0, 3.0, 4.0, 5.0], &[5.0, 4.0, 3.0, 2.0, 1.0]),
            (&[0.0, 0.0, 0.0, 0.0], &[1.0, 2.0, 3.0, 4.0]),
            (&[1.0, 3.0, 2.0, 5.0, 4.0], &[2.0, 1.0, 4.0, 3.0, 6.0]),
        ];
        let band = full_band();
        for (a, b) in pairs {
            let lb = keogh_lower_bound(&view(a), &view(b), Value::INFINITY, band);
            let d = warped_distance(&view(a), &view(b), Value::INFINITY, band);
            assert!(lb <= d + EPS, "keogh {lb} exceeds warped {d}");
        }
    }

    #[test]
    fn cross_keogh_is_symmetric() {
        let a = [1.0, 5.0, 2.0, 8.0, 3.0];
        let b = [2.0, 4.0, 7.0, 1.0, 6.0];
        let band = BandRatio::default();
        let d_ab = cross_keogh_lower_bound(&view(&a), &view(&b), Value::INFINITY, band);
        let d_ba = cross_keogh_lower_bound(&view(&b), &view(&a), Value::INFINITY, band);
        assert!((d_ab - d_ba).abs() < EPS);
    }

    #[test]
    fn cascade_matches_warped_with_infinite_dropout() {
        let a = [4.0, 3.0, 5.0, 3.0, 5.0, 3.0, 4.0];
        let b = [4.0, 3.0, 3.0, 1.0, 1.0, 3.0, 4.0];
        let band = full_band();
        let cascade = cascade_distance(&view(&a), &view(&b), Value::INFINITY, band);
        let warped = warped_distance(&view(&a), &view(&b), Value::INFINITY, band);
        assert!((cascade - warped).abs() < EPS);
    }

    #[test]
    fn cascade_prunes_distant_pairs() {
        let a = [0.0, 0.0, 0.0, 0.0];
        let b = [50.0, 50.0, 50.0, 50.0];
        let d = cascade_distance(&view(&a), &view(&b), 0.1, full_band());
        assert!(d.is_infinite());
    }

    #[test]
    fn kind_from_name_round_trips() {
        assert_eq!(
            DistanceKind::from_name("euclidean").unwrap(),
            DistanceKind::Euclidean
        );
        assert_eq!(
            DistanceKind::from_name("euclidean_dtw").unwrap(),
            DistanceKind::EuclideanDtw
        );
        assert_eq!(DistanceKind::Euclidean.name(), "euclidean");
        assert_eq!(DistanceKind::EuclideanDtw.to_string(), "euclidean_dtw");
    }

    #[test]
    fn kind_unknown_name_rejected() {
        assert!(matches!(
            DistanceKind::from_name("oracle"),
            Err(DistanceError::UnknownDistance { .. })
        ));
    }

    #[test]
    fn kind_pairwise_dispatch() {
        let a = [1.0, 2.0];
        let b = [11.0, 2.0];
        let band = full_band();
        let euc = DistanceKind::Euclidean
            .pairwise(&view(&a), &view(&b), Value::INFINITY, band)
            .unwrap();
        let dtw = DistanceKind::EuclideanDtw
            .pairwise(&view(&a), &view(&b), Value::INFINITY, band)
            .unwrap();
        assert!((euc - (100.0 as Value / 2.0).sqrt()).abs() < EPS);
        assert!((dtw - 2.5).abs() < EPS);
    }
}
