//! Copulas as distributions on the unit cube.
//!
//! Copulas describe the dependence structure between random variables,
//! independent of their marginal distributions. Every copula here is a
//! [`DistributionNode`] whose marginals are uniform on `[0, 1]` and whose
//! `unit_map` is a chain of conditional quantiles.

use crate::archive::{CopulaSpec, NodeSpec, Record};
use crate::distribution::{check_point, check_unit_map_args, DistributionNode};
use crate::distributions1d::{std_normal_cdf, std_normal_quantile};
use dg_core::{
    ensure_construct,
    errors::{Error, Result},
    Real,
};
use nalgebra::{DMatrix, DVector};

// Φ⁻¹ of probabilities at (or numerically indistinguishable from) 0 and 1
// is clamped to this magnitude; Φ(±40) rounds to 0 / 1.
const Z_LIMIT: Real = 40.0;

fn inside_unit_cube(u: &[Real]) -> bool {
    u.iter().all(|&v| (0.0..=1.0).contains(&v))
}

// ── Independence ──────────────────────────────────────────────────────────────

/// Independence copula: uniform density on `[0, 1]^dim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndependenceCopula {
    dim: usize,
}

impl IndependenceCopula {
    /// Create an independence copula of the given dimension.
    pub fn new(dim: usize) -> Result<Self> {
        ensure_construct!(dim > 0, "copula dimension must be positive");
        Ok(Self { dim })
    }
}

impl DistributionNode for IndependenceCopula {
    fn dim(&self) -> usize {
        self.dim
    }

    fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim, x)?;
        Ok(if inside_unit_cube(x) { 1.0 } else { 0.0 })
    }

    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_unit_map_args(self.dim, u, x)?;
        for (xi, &ui) in x.iter_mut().zip(u) {
            *xi = ui.clamp(0.0, 1.0);
        }
        Ok(())
    }

    fn mapped_by_quantiles(&self) -> bool {
        true
    }

    fn clone_node(&self) -> Box<dyn DistributionNode> {
        Box::new(*self)
    }

    fn record(&self) -> Result<Record> {
        NodeSpec::Copula(CopulaSpec::Independence { dim: self.dim }).to_record()
    }
}

// ── Gaussian ──────────────────────────────────────────────────────────────────

/// Gaussian copula with a given correlation matrix.
///
/// Density: `c(u) = |R|^{-1/2} exp(-½ zᵀ (R⁻¹ − I) z)` with `z = Φ⁻¹(u)`.
/// The unit map is `Φ(L Φ⁻¹(u))`, `L` the lower Cholesky factor of `R`.
#[derive(Debug, Clone)]
pub struct GaussianCopula {
    correlation: DMatrix<Real>,
    cholesky_l: DMatrix<Real>,
    // R⁻¹ − I
    quad_form: DMatrix<Real>,
    norm: Real,
}

impl GaussianCopula {
    /// Create from a symmetric positive-definite matrix with unit diagonal.
    pub fn new(correlation: DMatrix<Real>) -> Result<Self> {
        let n = correlation.nrows();
        ensure_construct!(
            n > 0 && correlation.ncols() == n,
            "correlation matrix must be square and non-empty"
        );
        for i in 0..n {
            ensure_construct!(
                (correlation[(i, i)] - 1.0).abs() < 1e-12,
                "correlation matrix diagonal must be 1"
            );
            for j in 0..i {
                ensure_construct!(
                    (correlation[(i, j)] - correlation[(j, i)]).abs() < 1e-12,
                    "correlation matrix must be symmetric"
                );
            }
        }
        let chol = correlation.clone().cholesky().ok_or_else(|| {
            Error::Construction("correlation matrix is not positive definite".into())
        })?;
        let cholesky_l = chol.l();
        let det: Real = cholesky_l.diagonal().iter().map(|d| d * d).product();
        let quad_form = chol.inverse() - DMatrix::<Real>::identity(n, n);
        Ok(Self {
            correlation,
            cholesky_l,
            quad_form,
            norm: 1.0 / det.sqrt(),
        })
    }

    /// Bivariate Gaussian copula with correlation `rho` in `(-1, 1)`.
    pub fn bivariate(rho: Real) -> Result<Self> {
        ensure_construct!(
            rho > -1.0 && rho < 1.0,
            "correlation must be in (-1, 1), got {rho}"
        );
        Self::new(DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0]))
    }

    /// Correlation matrix.
    pub fn correlation(&self) -> &DMatrix<Real> {
        &self.correlation
    }
}

impl DistributionNode for GaussianCopula {
    fn dim(&self) -> usize {
        self.correlation.nrows()
    }

    fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim(), x)?;
        if !x.iter().all(|&u| u > 0.0 && u < 1.0) {
            return Ok(0.0);
        }
        let z = DVector::from_iterator(x.len(), x.iter().map(|&u| std_normal_quantile(u)));
        let q = (z.transpose() * &self.quad_form * &z)[(0, 0)];
        Ok(self.norm * (-0.5 * q).exp())
    }

    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_unit_map_args(self.dim(), u, x)?;
        let z: Vec<Real> = u
            .iter()
            .map(|&p| std_normal_quantile(p.clamp(0.0, 1.0)).clamp(-Z_LIMIT, Z_LIMIT))
            .collect();
        for (i, xi) in x.iter_mut().enumerate() {
            let s: Real = (0..=i).map(|j| self.cholesky_l[(i, j)] * z[j]).sum();
            *xi = std_normal_cdf(s);
        }
        Ok(())
    }

    fn mapped_by_quantiles(&self) -> bool {
        true
    }

    fn clone_node(&self) -> Box<dyn DistributionNode> {
        Box::new(self.clone())
    }

    fn record(&self) -> Result<Record> {
        let n = self.dim();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| self.correlation[(i, j)]).collect())
            .collect();
        NodeSpec::Copula(CopulaSpec::Gaussian { correlation: rows }).to_record()
    }
}

// ── Farlie–Gumbel–Morgenstern ─────────────────────────────────────────────────

/// Bivariate Farlie–Gumbel–Morgenstern copula.
///
/// `c(u, v) = 1 + θ (1 − 2u)(1 − 2v)` with `θ ∈ [−1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FgmCopula {
    theta: Real,
}

impl FgmCopula {
    /// Create an FGM copula with parameter `θ ∈ [−1, 1]`.
    pub fn new(theta: Real) -> Result<Self> {
        ensure_construct!(
            (-1.0..=1.0).contains(&theta),
            "FGM parameter must be in [-1, 1], got {theta}"
        );
        Ok(Self { theta })
    }

    /// The parameter θ.
    pub fn theta(&self) -> Real {
        self.theta
    }
}

impl DistributionNode for FgmCopula {
    fn dim(&self) -> usize {
        2
    }

    fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(2, x)?;
        if !inside_unit_cube(x) {
            return Ok(0.0);
        }
        Ok(1.0 + self.theta * (1.0 - 2.0 * x[0]) * (1.0 - 2.0 * x[1]))
    }

    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_unit_map_args(2, u, x)?;
        let u0 = u[0].clamp(0.0, 1.0);
        x[0] = u0;
        if u.len() > 1 {
            // Conditional cdf v (1 + a (1 - v)) = p, solved in the
            // cancellation-free form of the quadratic root.
            let p = u[1].clamp(0.0, 1.0);
            let a = self.theta * (1.0 - 2.0 * u0);
            let b = 1.0 + a;
            let disc = (b * b - 4.0 * a * p).max(0.0);
            let denom = b + disc.sqrt();
            x[1] = if denom > 0.0 {
                (2.0 * p / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        Ok(())
    }

    fn mapped_by_quantiles(&self) -> bool {
        true
    }

    fn clone_node(&self) -> Box<dyn DistributionNode> {
        Box::new(*self)
    }

    fn record(&self) -> Result<Record> {
        NodeSpec::Copula(CopulaSpec::Fgm { theta: self.theta }).to_record()
    }
}
