//! Univariate distributions used as marginals.
//!
//! Normal and beta functions are delegated to `statrs`.

use crate::archive::MarginalSpec;
use crate::distribution::Distribution1D;
use dg_core::{
    ensure_construct, ensure_domain,
    errors::{Error, Result},
    Real,
};
use dg_math::{Interval, NdArray};
use statrs::distribution::{Beta, Continuous, ContinuousCDF};
use std::f64::consts::SQRT_2;

// ── Standard normal helpers ───────────────────────────────────────────────────

/// Standard normal cdf Φ(z).
#[inline]
pub fn std_normal_cdf(z: Real) -> Real {
    0.5 * statrs::function::erf::erfc(-z / SQRT_2)
}

/// Standard normal density φ(z).
#[inline]
pub fn std_normal_pdf(z: Real) -> Real {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Inverse standard normal cdf Φ⁻¹(p), with Φ⁻¹(0) = -inf and Φ⁻¹(1) = inf.
#[inline]
pub fn std_normal_quantile(p: Real) -> Real {
    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else {
        -SQRT_2 * statrs::function::erf::erfc_inv(2.0 * p)
    }
}

pub(crate) fn check_probability(p: Real) -> Result<()> {
    ensure_domain!(
        (0.0..=1.0).contains(&p),
        "probability argument {p} is outside [0, 1]"
    );
    Ok(())
}

// ── Uniform ───────────────────────────────────────────────────────────────────

/// Uniform distribution on `[lo, hi]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform1D {
    lo: Real,
    hi: Real,
}

impl Uniform1D {
    /// Create a uniform distribution; requires finite `lo < hi`.
    pub fn new(lo: Real, hi: Real) -> Result<Self> {
        ensure_construct!(
            lo.is_finite() && hi.is_finite() && lo < hi,
            "invalid uniform support [{lo}, {hi}]"
        );
        Ok(Self { lo, hi })
    }

    /// Lower limit.
    pub fn lo(&self) -> Real {
        self.lo
    }

    /// Upper limit.
    pub fn hi(&self) -> Real {
        self.hi
    }
}

impl Distribution1D for Uniform1D {
    fn density(&self, x: Real) -> Result<Real> {
        Ok(if x >= self.lo && x <= self.hi {
            1.0 / (self.hi - self.lo)
        } else {
            0.0
        })
    }

    fn cdf(&self, x: Real) -> Result<Real> {
        Ok(((x - self.lo) / (self.hi - self.lo)).clamp(0.0, 1.0))
    }

    fn exceedance(&self, x: Real) -> Result<Real> {
        Ok(((self.hi - x) / (self.hi - self.lo)).clamp(0.0, 1.0))
    }

    fn quantile(&self, p: Real) -> Result<Real> {
        check_probability(p)?;
        Ok(self.lo + p * (self.hi - self.lo))
    }

    fn clone_box(&self) -> Box<dyn Distribution1D> {
        Box::new(self.clone())
    }

    fn spec(&self) -> Option<MarginalSpec> {
        Some(MarginalSpec::Uniform {
            lo: self.lo,
            hi: self.hi,
        })
    }
}

// ── Gaussian ──────────────────────────────────────────────────────────────────

/// Normal distribution with mean `mean` and standard deviation `sigma`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauss1D {
    mean: Real,
    sigma: Real,
}

impl Gauss1D {
    /// Create a normal distribution; `sigma` must be positive.
    pub fn new(mean: Real, sigma: Real) -> Result<Self> {
        ensure_construct!(
            mean.is_finite() && sigma.is_finite() && sigma > 0.0,
            "invalid normal parameters mean = {mean}, sigma = {sigma}"
        );
        Ok(Self { mean, sigma })
    }

    /// Mean.
    pub fn mean(&self) -> Real {
        self.mean
    }

    /// Standard deviation.
    pub fn sigma(&self) -> Real {
        self.sigma
    }
}

impl Distribution1D for Gauss1D {
    fn density(&self, x: Real) -> Result<Real> {
        Ok(std_normal_pdf((x - self.mean) / self.sigma) / self.sigma)
    }

    fn cdf(&self, x: Real) -> Result<Real> {
        Ok(std_normal_cdf((x - self.mean) / self.sigma))
    }

    fn exceedance(&self, x: Real) -> Result<Real> {
        Ok(std_normal_cdf((self.mean - x) / self.sigma))
    }

    fn quantile(&self, p: Real) -> Result<Real> {
        check_probability(p)?;
        Ok(self.mean + self.sigma * std_normal_quantile(p))
    }

    fn clone_box(&self) -> Box<dyn Distribution1D> {
        Box::new(self.clone())
    }

    fn spec(&self) -> Option<MarginalSpec> {
        Some(MarginalSpec::Gauss {
            mean: self.mean,
            sigma: self.sigma,
        })
    }
}

// ── Beta ──────────────────────────────────────────────────────────────────────

/// Beta(α, β) distribution on `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Beta1D {
    inner: Beta,
    alpha: Real,
    beta: Real,
}

impl Beta1D {
    /// Create a Beta(α, β) distribution.
    pub fn new(alpha: Real, beta: Real) -> Result<Self> {
        let inner = Beta::new(alpha, beta).map_err(|e| {
            Error::Construction(format!("invalid beta parameters ({alpha}, {beta}): {e}"))
        })?;
        Ok(Self { inner, alpha, beta })
    }

    /// Shape parameter α.
    pub fn alpha(&self) -> Real {
        self.alpha
    }

    /// Shape parameter β.
    pub fn beta(&self) -> Real {
        self.beta
    }
}

impl Distribution1D for Beta1D {
    fn density(&self, x: Real) -> Result<Real> {
        Ok(if (0.0..=1.0).contains(&x) {
            self.inner.pdf(x)
        } else {
            0.0
        })
    }

    fn cdf(&self, x: Real) -> Result<Real> {
        Ok(self.inner.cdf(x.clamp(0.0, 1.0)))
    }

    fn quantile(&self, p: Real) -> Result<Real> {
        check_probability(p)?;
        Ok(if p == 0.0 {
            0.0
        } else if p == 1.0 {
            1.0
        } else {
            self.inner.inverse_cdf(p)
        })
    }

    fn clone_box(&self) -> Box<dyn Distribution1D> {
        Box::new(self.clone())
    }

    fn spec(&self) -> Option<MarginalSpec> {
        Some(MarginalSpec::Beta {
            alpha: self.alpha,
            beta: self.beta,
        })
    }
}

// ── Tabulated ─────────────────────────────────────────────────────────────────

/// Piecewise-constant density over an interval split into equal bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Tabulated1D {
    support: Interval,
    bin_width: Real,
    // Normalized bin densities.
    density: Vec<Real>,
    // cdf at the bin edges: cdf[0] = 0, cdf[n] = 1.
    cdf: Vec<Real>,
}

impl Tabulated1D {
    /// Create from a rank-1 array of non-negative bin heights (normalized
    /// internally) and the interval they cover.
    pub fn new(values: &NdArray<Real>, support: Interval) -> Result<Self> {
        ensure_construct!(
            values.is_shape_known() && values.rank() == 1,
            "tabulated density requires a rank-1 array"
        );
        ensure_construct!(support.length() > 0.0, "tabulated support must have positive length");
        ensure_construct!(
            values.is_density()?,
            "tabulated density values must be finite and non-negative"
        );
        let total: Real = values.sum()?;
        ensure_construct!(total > 0.0, "tabulated density must have positive mass");

        let n = values.len();
        let bin_width = support.length() / n as Real;
        let cum = values.cdf_array::<Real>(1.0)?;
        let last = *cum.linear_value(n);
        let cdf: Vec<Real> = cum.iter().map(|c| c / last).collect();
        let density = values.iter().map(|v| v / (total * bin_width)).collect();
        Ok(Self {
            support,
            bin_width,
            density,
            cdf,
        })
    }

    /// Create from a plain vector of bin heights.
    pub fn from_values(values: Vec<Real>, lo: Real, hi: Real) -> Result<Self> {
        let n = values.len();
        Self::new(&NdArray::from_vec(&[n], values)?, Interval::new(lo, hi)?)
    }

    /// Covered interval.
    pub fn support(&self) -> &Interval {
        &self.support
    }

    /// Normalized bin densities.
    pub fn bin_densities(&self) -> &[Real] {
        &self.density
    }

    fn bin_of(&self, x: Real) -> usize {
        let n = self.density.len();
        (((x - self.support.min()) / self.bin_width).floor() as usize).min(n - 1)
    }
}

impl Distribution1D for Tabulated1D {
    fn density(&self, x: Real) -> Result<Real> {
        if x < self.support.min() || x > self.support.max() {
            return Ok(0.0);
        }
        Ok(self.density[self.bin_of(x)])
    }

    fn cdf(&self, x: Real) -> Result<Real> {
        if x <= self.support.min() {
            return Ok(0.0);
        }
        if x >= self.support.max() {
            return Ok(1.0);
        }
        let j = self.bin_of(x);
        let left = self.support.min() + j as Real * self.bin_width;
        Ok((self.cdf[j] + (x - left) * self.density[j]).min(1.0))
    }

    fn quantile(&self, p: Real) -> Result<Real> {
        check_probability(p)?;
        let n = self.density.len();
        let mut j = self.cdf.partition_point(|&c| c <= p).saturating_sub(1).min(n - 1);
        while j > 0 && self.cdf[j + 1] <= self.cdf[j] {
            j -= 1;
        }
        let mass = self.cdf[j + 1] - self.cdf[j];
        let frac = if mass > 0.0 {
            ((p - self.cdf[j]) / mass).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(self.support.min() + (j as Real + frac) * self.bin_width)
    }

    fn clone_box(&self) -> Box<dyn Distribution1D> {
        Box::new(self.clone())
    }

    fn spec(&self) -> Option<MarginalSpec> {
        Some(MarginalSpec::Tabulated {
            lo: self.support.min(),
            hi: self.support.max(),
            values: self.density.clone(),
        })
    }
}
