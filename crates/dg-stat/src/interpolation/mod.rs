//! Strategies for interpolating between distribution nodes.
//!
//! A strategy receives the corner nodes of a grid cell together with their
//! multilinear weights and answers density and unit-map queries for the
//! interpolated distribution.

pub mod copula;
pub mod unit_map;

pub use copula::CopulaInterpolation;
pub use unit_map::ConditionalQuantileInterpolation;

use crate::distribution::DistributionNode;
use dg_core::{errors::Result, Real};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which interpolation method a grid uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Average the nodes' conditional quantile functions.
    ConditionalQuantile,
    /// Interpolate marginals and copulas separately.
    Copula,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::ConditionalQuantile => write!(f, "conditional quantile"),
            StrategyKind::Copula => write!(f, "copula"),
        }
    }
}

/// An interpolation strategy, dispatched by [`StrategyKind`].
#[derive(Debug, Clone)]
pub enum InterpolationStrategy {
    /// See [`ConditionalQuantileInterpolation`].
    ConditionalQuantile(ConditionalQuantileInterpolation),
    /// See [`CopulaInterpolation`].
    Copula(CopulaInterpolation),
}

fn no_marginals() -> dg_core::Error {
    dg_core::Error::Precondition(
        "marginals are only available when interpolating copulas".to_string(),
    )
}

impl InterpolationStrategy {
    /// Build an empty strategy for `dim`-dimensional nodes that expects
    /// `n_expected` corners.
    pub fn new(kind: StrategyKind, dim: usize, n_expected: usize) -> Result<Self> {
        Ok(match kind {
            StrategyKind::ConditionalQuantile => InterpolationStrategy::ConditionalQuantile(
                ConditionalQuantileInterpolation::new(dim, n_expected),
            ),
            StrategyKind::Copula => {
                InterpolationStrategy::Copula(CopulaInterpolation::new(dim, n_expected)?)
            }
        })
    }

    /// The strategy's kind.
    pub fn kind(&self) -> StrategyKind {
        match self {
            InterpolationStrategy::ConditionalQuantile(_) => StrategyKind::ConditionalQuantile,
            InterpolationStrategy::Copula(_) => StrategyKind::Copula,
        }
    }

    /// Dimensionality of the interpolated distribution.
    pub fn dim(&self) -> usize {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.dim(),
            InterpolationStrategy::Copula(s) => s.dim(),
        }
    }

    /// Append a corner node.
    pub fn add(&mut self, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.add(node, weight),
            InterpolationStrategy::Copula(s) => s.add(node, weight),
        }
    }

    /// Replace corner `i`.
    pub fn replace(&mut self, i: usize, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.replace(i, node, weight),
            InterpolationStrategy::Copula(s) => s.replace(i, node, weight),
        }
    }

    /// Change the weight of corner `i`.
    pub fn set_weight(&mut self, i: usize, weight: Real) -> Result<()> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.set_weight(i, weight),
            InterpolationStrategy::Copula(s) => s.set_weight(i, weight),
        }
    }

    /// Remove all corners.
    pub fn clear(&mut self) {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.clear(),
            InterpolationStrategy::Copula(s) => s.clear(),
        }
    }

    /// Number of corners added so far.
    pub fn size(&self) -> usize {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.size(),
            InterpolationStrategy::Copula(s) => s.size(),
        }
    }

    /// Enable or suspend automatic weight normalization.
    pub fn normalize_automatically(&mut self, allow: bool) -> Result<()> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.normalize_automatically(allow),
            InterpolationStrategy::Copula(s) => s.normalize_automatically(allow),
        }
    }

    /// Interpolated density at `x`.
    pub fn density(&self, x: &[Real]) -> Result<Real> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.density(x),
            InterpolationStrategy::Copula(s) => s.density(x),
        }
    }

    /// Map a point of the unit cube to the interpolated distribution.
    pub fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        match self {
            InterpolationStrategy::ConditionalQuantile(s) => s.unit_map(u, x),
            InterpolationStrategy::Copula(s) => s.unit_map(u, x),
        }
    }

    /// `true` when `unit_map` is a chain of conditional quantiles.
    pub fn mapped_by_quantiles(&self) -> bool {
        matches!(self, InterpolationStrategy::ConditionalQuantile(_))
    }

    fn copula(&self) -> Result<&CopulaInterpolation> {
        match self {
            InterpolationStrategy::Copula(s) => Ok(s),
            InterpolationStrategy::ConditionalQuantile(_) => Err(no_marginals()),
        }
    }

    /// Interpolated copula density.
    pub fn copula_density(&self, x: &[Real]) -> Result<Real> {
        self.copula()?.copula_density(x)
    }

    /// Product of the interpolated marginal densities.
    pub fn product_of_the_marginals(&self, x: &[Real]) -> Result<Real> {
        self.copula()?.product_of_the_marginals(x)
    }

    /// Density of interpolated marginal `i`.
    pub fn marginal_density(&self, i: usize, x: Real) -> Result<Real> {
        self.copula()?.marginal_density(i, x)
    }

    /// Cdf of interpolated marginal `i`.
    pub fn marginal_cdf(&self, i: usize, x: Real) -> Result<Real> {
        self.copula()?.marginal_cdf(i, x)
    }

    /// Exceedance of interpolated marginal `i`.
    pub fn marginal_exceedance(&self, i: usize, x: Real) -> Result<Real> {
        self.copula()?.marginal_exceedance(i, x)
    }

    /// Quantile of interpolated marginal `i`.
    pub fn marginal_quantile(&self, i: usize, p: Real) -> Result<Real> {
        self.copula()?.marginal_quantile(i, p)
    }
}
