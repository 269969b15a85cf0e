//! Interpolation between univariate distributions by averaging quantiles.
//!
//! The interpolated quantile function is the weighted mean of the
//! constituent quantile functions. The cdf is obtained by inverting it and
//! the density from a central difference of the quantile in probability
//! space.

use crate::distribution::Distribution1D;
use crate::distributions1d::check_probability;
use dg_core::{
    ensure, ensure_domain,
    errors::{Error, Result},
    Real,
};
use dg_math::solvers1d::invert_increasing;
use std::sync::Arc;

/// Weighted quantile average of 1-D distributions.
///
/// Weights need not sum to one; they are divided by their total once at
/// least `n_expected` distributions have been added and automatic
/// normalization is enabled. Queries are refused before that point.
#[derive(Debug, Clone)]
pub struct InterpolatedDistribution1D {
    entries: Vec<(Arc<dyn Distribution1D>, Real)>,
    n_expected: usize,
    wsum: Real,
    xmin: Real,
    xmax: Real,
    auto_normalize: bool,
}

impl InterpolatedDistribution1D {
    /// Create an empty interpolator expecting `n_expected` distributions.
    pub fn new(n_expected: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n_expected),
            n_expected,
            wsum: 0.0,
            xmin: 0.0,
            xmax: 0.0,
            auto_normalize: true,
        }
    }

    /// Append a distribution with the given weight.
    pub fn add(&mut self, d: Arc<dyn Distribution1D>, weight: Real) -> Result<()> {
        self.entries.push((d, weight));
        self.normalize_if_complete()
    }

    /// Replace entry `i`.
    pub fn replace(&mut self, i: usize, d: Arc<dyn Distribution1D>, weight: Real) -> Result<()> {
        let size = self.entries.len();
        let slot = self
            .entries
            .get_mut(i)
            .ok_or(Error::IndexOutOfRange { index: i, size })?;
        *slot = (d, weight);
        self.normalize_if_complete()
    }

    /// Change the weight of entry `i`.
    pub fn set_weight(&mut self, i: usize, weight: Real) -> Result<()> {
        let size = self.entries.len();
        let slot = self
            .entries
            .get_mut(i)
            .ok_or(Error::IndexOutOfRange { index: i, size })?;
        slot.1 = weight;
        self.normalize_if_complete()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.wsum = 0.0;
        self.xmin = 0.0;
        self.xmax = 0.0;
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries required before queries are allowed.
    pub fn expected_size(&self) -> usize {
        self.n_expected
    }

    /// Enable or suspend automatic normalization. Re-enabling normalizes
    /// immediately when enough entries are present.
    pub fn normalize_automatically(&mut self, allow: bool) -> Result<()> {
        self.auto_normalize = allow;
        self.normalize_if_complete()
    }

    /// Support lower and upper limits of the interpolated distribution.
    pub fn support(&self) -> Result<(Real, Real)> {
        self.check_ready()?;
        Ok((self.xmin, self.xmax))
    }

    fn normalize_if_complete(&mut self) -> Result<()> {
        if !self.auto_normalize || self.entries.len() < self.n_expected {
            return Ok(());
        }
        self.wsum = 0.0;
        let mut sw = 0.0;
        let mut sxmin = 0.0;
        let mut sxmax = 0.0;
        for (d, w) in &self.entries {
            let w = *w;
            ensure_domain!(w >= 0.0, "negative interpolation weight {w}");
            if w == 0.0 {
                continue;
            }
            sw += w;
            sxmin += w * d.quantile(0.0)?;
            sxmax += w * d.quantile(1.0)?;
        }
        ensure_domain!(sw > 0.0, "sum of interpolation weights is not positive");
        self.wsum = sw;
        self.xmin = sxmin / sw;
        self.xmax = sxmax / sw;
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        ensure!(
            self.auto_normalize,
            "interpolated distribution queried while normalization is suspended"
        );
        ensure!(
            !self.entries.is_empty() && self.entries.len() >= self.n_expected,
            "interpolated distribution has {} of {} expected entries",
            self.entries.len(),
            self.n_expected
        );
        ensure!(
            self.wsum > 0.0,
            "interpolation weights have not been normalized"
        );
        Ok(())
    }

    fn weighted_quantile(&self, p: Real) -> Result<Real> {
        let mut q = 0.0;
        for (d, w) in &self.entries {
            if *w != 0.0 {
                q += w * d.quantile(p)?;
            }
        }
        Ok(q / self.wsum)
    }

    /// Density and cdf at `x` in one pass.
    pub fn density_and_cdf(&self, x: Real) -> Result<(Real, Real)> {
        self.check_ready()?;
        if x <= self.xmin {
            return Ok((0.0, 0.0));
        }
        if x >= self.xmax {
            return Ok((0.0, 1.0));
        }
        let y = invert_increasing(|p| self.weighted_quantile(p), x, 0.0, 1.0)?;
        Ok((self.density_at_probability(y)?, y))
    }

    fn density_at_probability(&self, y: Real) -> Result<Real> {
        let mut h = 2.0 * f64::EPSILON.sqrt();
        if y + h >= 1.0 {
            h = (1.0 - y) / 2.0;
        }
        if y - h <= 0.0 {
            h = y / 2.0;
        }
        if h == 0.0 {
            return Ok(0.0);
        }
        let (yp, ym) = (y + h, y - h);
        let dq = (self.weighted_quantile(yp)? - self.weighted_quantile(ym)?) / (yp - ym);
        Ok(if dq > 0.0 { 1.0 / dq } else { f64::MAX })
    }
}

impl Distribution1D for InterpolatedDistribution1D {
    fn density(&self, x: Real) -> Result<Real> {
        Ok(self.density_and_cdf(x)?.0)
    }

    fn cdf(&self, x: Real) -> Result<Real> {
        self.check_ready()?;
        if x <= self.xmin {
            return Ok(0.0);
        }
        if x >= self.xmax {
            return Ok(1.0);
        }
        invert_increasing(|p| self.weighted_quantile(p), x, 0.0, 1.0)
    }

    fn quantile(&self, p: Real) -> Result<Real> {
        self.check_ready()?;
        check_probability(p)?;
        self.weighted_quantile(p)
    }

    fn clone_box(&self) -> Box<dyn Distribution1D> {
        Box::new(self.clone())
    }
}
