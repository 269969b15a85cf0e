//! Axis-aligned hyperrectangles.

use dg_core::{
    ensure, ensure_construct,
    errors::{Error, Result},
    Real,
};
use serde::{Deserialize, Serialize};

/// A closed real interval `[min, max]` with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    min: Real,
    max: Real,
}

impl Interval {
    /// Create an interval; fails unless `min <= max`.
    pub fn new(min: Real, max: Real) -> Result<Self> {
        ensure_construct!(
            min <= max,
            "interval lower limit {min} must not exceed upper limit {max}"
        );
        Ok(Self { min, max })
    }

    /// Lower limit.
    pub fn min(&self) -> Real {
        self.min
    }

    /// Upper limit.
    pub fn max(&self) -> Real {
        self.max
    }

    /// `max - min`.
    pub fn length(&self) -> Real {
        self.max - self.min
    }

    /// `(min + max) / 2`.
    pub fn midpoint(&self) -> Real {
        0.5 * (self.min + self.max)
    }

    /// Length of the intersection with another interval (0 if disjoint).
    pub fn overlap_length(&self, other: &Interval) -> Real {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        if hi > lo {
            hi - lo
        } else {
            0.0
        }
    }
}

/// A K-dimensional axis-aligned box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    intervals: Vec<Interval>,
}

impl BoundingBox {
    /// Create a box from its per-dimension intervals.
    pub fn new(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }

    /// Create a box from `(min, max)` pairs.
    pub fn from_limits(limits: &[(Real, Real)]) -> Result<Self> {
        let intervals = limits
            .iter()
            .map(|&(lo, hi)| Interval::new(lo, hi))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { intervals })
    }

    /// The box `[0, 1]^dim`.
    pub fn unit_box(dim: usize) -> Self {
        Self {
            intervals: vec![Interval { min: 0.0, max: 1.0 }; dim],
        }
    }

    /// The box `[-1, 1]^dim`.
    pub fn size_two_box(dim: usize) -> Self {
        Self {
            intervals: vec![Interval { min: -1.0, max: 1.0 }; dim],
        }
    }

    /// The box `(-inf, inf)^dim`.
    pub fn all_space(dim: usize) -> Self {
        Self {
            intervals: vec![
                Interval {
                    min: f64::NEG_INFINITY,
                    max: f64::INFINITY,
                };
                dim
            ],
        }
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.intervals.len()
    }

    /// Per-dimension intervals.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Interval along dimension `i`.
    pub fn interval(&self, i: usize) -> Result<&Interval> {
        let size = self.intervals.len();
        self.intervals
            .get(i)
            .ok_or(Error::IndexOutOfRange { index: i, size })
    }

    /// Product of the interval lengths (1 for a zero-dimensional box).
    pub fn volume(&self) -> Real {
        self.intervals.iter().map(Interval::length).product()
    }

    /// Center of the box.
    pub fn midpoint(&self) -> Vec<Real> {
        self.intervals.iter().map(Interval::midpoint).collect()
    }

    // ── Containment ──────────────────────────────────────────────────────────

    /// `true` if `min <= x < max` along every dimension.
    pub fn is_inside(&self, x: &[Real]) -> Result<bool> {
        self.is_inside_lower(x)
    }

    /// `true` if `min <= x < max` along every dimension.
    pub fn is_inside_lower(&self, x: &[Real]) -> Result<bool> {
        self.check_point(x)?;
        Ok(self
            .intervals
            .iter()
            .zip(x)
            .all(|(iv, &v)| iv.min <= v && v < iv.max))
    }

    /// `true` if `min < x <= max` along every dimension.
    pub fn is_inside_upper(&self, x: &[Real]) -> Result<bool> {
        self.check_point(x)?;
        Ok(self
            .intervals
            .iter()
            .zip(x)
            .all(|(iv, &v)| iv.min < v && v <= iv.max))
    }

    /// `true` if `min <= x <= max` along every dimension.
    pub fn is_inside_with_bounds(&self, x: &[Real]) -> Result<bool> {
        self.check_point(x)?;
        Ok(self
            .intervals
            .iter()
            .zip(x)
            .all(|(iv, &v)| iv.min <= v && v <= iv.max))
    }

    // ── Overlap ──────────────────────────────────────────────────────────────

    /// Volume of the intersection with another box of the same dimension.
    pub fn overlap_volume(&self, other: &BoundingBox) -> Result<Real> {
        self.check_dim(other.dim())?;
        Ok(self
            .intervals
            .iter()
            .zip(&other.intervals)
            .map(|(a, b)| a.overlap_length(b))
            .product())
    }

    /// Fraction of this box's volume covered by `other` (0 for a box of
    /// zero volume).
    pub fn overlap_fraction(&self, other: &BoundingBox) -> Result<Real> {
        let overlap = self.overlap_volume(other)?;
        let volume = self.volume();
        Ok(if volume > 0.0 { overlap / volume } else { 0.0 })
    }

    // ── Transforms ───────────────────────────────────────────────────────────

    /// Scale every side by `factor` keeping the midpoint fixed.
    pub fn expand(&self, factor: Real) -> Result<Self> {
        self.expand_each(&vec![factor; self.dim()])
    }

    /// Scale each side by its own factor keeping the midpoint fixed.
    pub fn expand_each(&self, factors: &[Real]) -> Result<Self> {
        self.check_dim(factors.len())?;
        let intervals = self
            .intervals
            .iter()
            .zip(factors)
            .map(|(iv, &f)| {
                ensure_construct!(f >= 0.0, "expansion factor {f} must be non-negative");
                let mid = iv.midpoint();
                let half = 0.5 * iv.length() * f;
                Ok(Interval {
                    min: mid - half,
                    max: mid + half,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { intervals })
    }

    /// Multiply the limits (not the sides) by per-dimension factors.
    ///
    /// The midpoint moves unless it is at the origin. Negative factors swap
    /// the limits.
    pub fn scale(&self, factors: &[Real]) -> Result<Self> {
        self.check_dim(factors.len())?;
        let intervals = self
            .intervals
            .iter()
            .zip(factors)
            .map(|(iv, &f)| {
                let (a, b) = (iv.min * f, iv.max * f);
                Interval {
                    min: a.min(b),
                    max: a.max(b),
                }
            })
            .collect();
        Ok(Self { intervals })
    }

    /// Translate by `delta`.
    pub fn shift(&self, delta: &[Real]) -> Result<Self> {
        self.check_dim(delta.len())?;
        let intervals = self
            .intervals
            .iter()
            .zip(delta)
            .map(|(iv, &d)| Interval {
                min: iv.min + d,
                max: iv.max + d,
            })
            .collect();
        Ok(Self { intervals })
    }

    /// Translate so that the midpoint lands at the origin.
    pub fn move_to_origin(&self) -> Self {
        let intervals = self
            .intervals
            .iter()
            .map(|iv| {
                let mid = iv.midpoint();
                Interval {
                    min: iv.min - mid,
                    max: iv.max - mid,
                }
            })
            .collect();
        Self { intervals }
    }

    // ── Index space mapping ──────────────────────────────────────────────────

    /// Coordinates of the center of bin `index` when the box is divided
    /// into `shape` equal bins.
    pub fn bin_center(&self, shape: &[usize], index: &[usize]) -> Result<Vec<Real>> {
        self.check_dim(shape.len())?;
        self.check_dim(index.len())?;
        self.intervals
            .iter()
            .zip(shape.iter().zip(index))
            .map(|(iv, (&n, &i))| {
                ensure!(n > 0, "bin count must be positive");
                if i >= n {
                    return Err(Error::IndexOutOfRange { index: i, size: n });
                }
                Ok(iv.min + (i as Real + 0.5) * iv.length() / n as Real)
            })
            .collect()
    }

    /// Inverse of [`bin_center`](Self::bin_center): fractional array index
    /// of `x`, suitable for `NdArray::interpolate1` / `interpolate3`.
    pub fn fractional_index(&self, shape: &[usize], x: &[Real]) -> Result<Vec<Real>> {
        self.check_dim(shape.len())?;
        self.check_point(x)?;
        self.intervals
            .iter()
            .zip(shape.iter().zip(x))
            .map(|(iv, (&n, &v))| {
                ensure!(n > 0, "bin count must be positive");
                ensure!(iv.length() > 0.0, "cannot index a degenerate interval");
                Ok((v - iv.min) / iv.length() * n as Real - 0.5)
            })
            .collect()
    }

    fn check_dim(&self, n: usize) -> Result<()> {
        if n != self.dim() {
            return Err(Error::ShapeMismatch(format!(
                "argument of dimension {n} used with a box of dimension {}",
                self.dim()
            )));
        }
        Ok(())
    }

    fn check_point(&self, x: &[Real]) -> Result<()> {
        self.check_dim(x.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_box() -> BoundingBox {
        BoundingBox::from_limits(&[(0.0, 2.0), (-1.0, 3.0)]).unwrap()
    }

    #[test]
    fn volume_and_midpoint() {
        let b = sample_box();
        assert_eq!(b.volume(), 8.0);
        assert_eq!(b.midpoint(), vec![1.0, 1.0]);
        assert_eq!(BoundingBox::unit_box(3).volume(), 1.0);
        assert_eq!(BoundingBox::size_two_box(2).volume(), 4.0);
        assert!(BoundingBox::all_space(1).volume().is_infinite());
    }

    #[test]
    fn reversed_interval_rejected() {
        assert!(matches!(
            Interval::new(1.0, 0.0),
            Err(Error::Construction(_))
        ));
    }

    #[test]
    fn containment_conventions() {
        let b = BoundingBox::unit_box(1);
        assert!(b.is_inside(&[0.0]).unwrap());
        assert!(!b.is_inside(&[1.0]).unwrap());
        assert!(b.is_inside_lower(&[0.0]).unwrap());
        assert!(!b.is_inside_upper(&[0.0]).unwrap());
        assert!(b.is_inside_upper(&[1.0]).unwrap());
        assert!(b.is_inside_with_bounds(&[0.0]).unwrap());
        assert!(b.is_inside_with_bounds(&[1.0]).unwrap());
        assert!(b.is_inside(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn overlap() {
        let a = BoundingBox::unit_box(2);
        let b = a.shift(&[0.5, 0.5]).unwrap();
        assert_abs_diff_eq!(a.overlap_volume(&b).unwrap(), 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(a.overlap_fraction(&b).unwrap(), 0.25, epsilon = 1e-15);
        let far = a.shift(&[5.0, 0.0]).unwrap();
        assert_eq!(a.overlap_volume(&far).unwrap(), 0.0);
    }

    #[test]
    fn transforms() {
        let b = sample_box();
        let e = b.expand(2.0).unwrap();
        assert_eq!(e.midpoint(), b.midpoint());
        assert_eq!(e.volume(), 32.0);

        let s = b.scale(&[2.0, -1.0]).unwrap();
        assert_eq!(s.interval(0).unwrap(), &Interval::new(0.0, 4.0).unwrap());
        assert_eq!(s.interval(1).unwrap(), &Interval::new(-3.0, 1.0).unwrap());

        let o = b.move_to_origin();
        assert_eq!(o.midpoint(), vec![0.0, 0.0]);
        assert_eq!(o.volume(), b.volume());
        assert!(b.expand(-1.0).is_err());
    }

    #[test]
    fn bin_center_and_fractional_index() {
        let b = sample_box();
        let shape = [4, 8];
        let c = b.bin_center(&shape, &[1, 3]).unwrap();
        assert_abs_diff_eq!(c[0], 0.75, epsilon = 1e-15);
        assert_abs_diff_eq!(c[1], 0.75, epsilon = 1e-15);
        let f = b.fractional_index(&shape, &c).unwrap();
        assert_abs_diff_eq!(f[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f[1], 3.0, epsilon = 1e-12);
        assert!(b.bin_center(&shape, &[4, 0]).is_err());
    }
}
