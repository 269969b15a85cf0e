//! 1D root finding for monotone functions.
//!
//! [`invert_increasing`] solves `f(x) = target` for a non-decreasing `f` on
//! a bracket and stops on a relative criterion, so probability-scale
//! inversions (cdf from quantile, conditional quantile maps) stay accurate
//! near 0.

use dg_core::{
    errors::{Error, Result},
    Real,
};

const MAX_MONOTONE_ITERATIONS: u32 = 2000;

// ── Monotone inversion ───────────────────────────────────────────────────────

/// Solve `f(x) = target` for a non-decreasing `f` on `[lo, hi]`.
///
/// Targets at or below `f(lo)` return `lo`; targets at or above `f(hi)`
/// return `hi`. Otherwise the bracket is halved until
/// `(hi - lo) / (|hi| + |lo| + eps) <= 2 eps`, or until it can no longer be
/// split in floating point. Errors from `f` are propagated.
pub fn invert_increasing<F>(mut f: F, target: Real, lo: Real, hi: Real) -> Result<Real>
where
    F: FnMut(Real) -> Result<Real>,
{
    if lo.is_nan() || hi.is_nan() || lo > hi || target.is_nan() {
        return Err(Error::NumericDomain(format!(
            "invalid inversion bracket [{lo}, {hi}] for target {target}"
        )));
    }
    let flo = f(lo)?;
    if target <= flo {
        return Ok(lo);
    }
    let fhi = f(hi)?;
    if target >= fhi {
        return Ok(hi);
    }

    let eps = f64::EPSILON;
    let (mut a, mut b) = (lo, hi);
    for _ in 0..MAX_MONOTONE_ITERATIONS {
        if (b - a) / (b.abs() + a.abs() + eps) <= 2.0 * eps {
            break;
        }
        let mid = 0.5 * (a + b);
        if mid <= a || mid >= b {
            break;
        }
        if f(mid)? >= target {
            b = mid;
        } else {
            a = mid;
        }
    }
    Ok(0.5 * (a + b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_cube() {
        let x = invert_increasing(|x| Ok(x * x * x), 0.125, 0.0, 1.0).unwrap();
        assert!((x - 0.5).abs() < 1e-14);
    }

    #[test]
    fn invert_small_probability_relative_accuracy() {
        let x = invert_increasing(|x| Ok(x), 1e-12, 0.0, 1.0).unwrap();
        assert!(((x - 1e-12) / 1e-12).abs() < 1e-10);
    }

    #[test]
    fn invert_clamps_to_bracket() {
        assert_eq!(invert_increasing(|x| Ok(x), -1.0, 0.0, 1.0).unwrap(), 0.0);
        assert_eq!(invert_increasing(|x| Ok(x), 2.0, 0.0, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn invert_propagates_errors() {
        let err = invert_increasing(
            |_| Err(Error::NumericDomain("bad".into())),
            0.5,
            0.0,
            1.0,
        )
        .unwrap_err();
        assert!(err.is_numeric_domain());
    }
}
