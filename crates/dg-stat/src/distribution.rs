//! Distribution capability traits.
//!
//! [`Distribution1D`] is the univariate interface used for marginals.
//! [`DistributionNode`] is what a grid cell holds: a K-dimensional density
//! together with a map from the unit cube onto its support.

use crate::archive::Record;
use dg_core::{
    errors::{Error, Result},
    Real,
};
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// A univariate continuous distribution.
pub trait Distribution1D: fmt::Debug + Send + Sync {
    /// Probability density at `x`.
    fn density(&self, x: Real) -> Result<Real>;

    /// Cumulative distribution function at `x`.
    fn cdf(&self, x: Real) -> Result<Real>;

    /// `1 - cdf(x)`.
    fn exceedance(&self, x: Real) -> Result<Real> {
        Ok(1.0 - self.cdf(x)?)
    }

    /// Inverse of the cdf. `p` must lie in `[0, 1]`.
    fn quantile(&self, p: Real) -> Result<Real>;

    /// Deep copy behind a fresh box.
    fn clone_box(&self) -> Box<dyn Distribution1D>;

    /// Serializable description, for types the archive knows how to store.
    fn spec(&self) -> Option<crate::archive::MarginalSpec> {
        None
    }
}

impl Clone for Box<dyn Distribution1D> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Copula / marginal split of a multivariate distribution.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Dependence structure on the unit cube.
    pub copula: Arc<dyn DistributionNode>,
    /// One marginal per dimension.
    pub marginals: Vec<Arc<dyn Distribution1D>>,
}

/// A K-dimensional distribution usable as a grid node.
///
/// `unit_map` maps a point of the unit cube onto the support. When
/// [`mapped_by_quantiles`](Self::mapped_by_quantiles) is `true`, coordinate
/// `i` of the image depends only on `u[0..=i]` and is the conditional
/// quantile of `x[i]` given the earlier coordinates; such nodes accept a
/// leading prefix of `u` and fill the same-length prefix of `x`.
pub trait DistributionNode: fmt::Debug + Send + Sync {
    /// Dimensionality K.
    fn dim(&self) -> usize;

    /// Probability density at `x` (length K).
    fn density(&self, x: &[Real]) -> Result<Real>;

    /// Map `u` from the unit cube to `x` (same length, at most K).
    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()>;

    /// `true` if `unit_map` is a chain of conditional quantile functions.
    fn mapped_by_quantiles(&self) -> bool;

    /// Deep copy behind a fresh box.
    fn clone_node(&self) -> Box<dyn DistributionNode>;

    /// Copula and marginals, for nodes that have such a split.
    fn decompose(&self) -> Option<Decomposition> {
        None
    }

    /// Archive record describing this node.
    fn record(&self) -> Result<Record> {
        Err(Error::Archive(format!(
            "distribution {self:?} has no archive representation"
        )))
    }
}

impl Clone for Box<dyn DistributionNode> {
    fn clone(&self) -> Self {
        self.clone_node()
    }
}

/// Check that `u` and `x` have equal lengths in `1..=dim`.
pub(crate) fn check_unit_map_args(dim: usize, u: &[Real], x: &[Real]) -> Result<()> {
    if u.is_empty() || u.len() > dim || u.len() != x.len() {
        return Err(Error::Precondition(format!(
            "unit map of a {dim}-dimensional distribution called with \
             {} random numbers and an output buffer of length {}",
            u.len(),
            x.len()
        )));
    }
    Ok(())
}

/// Check that `u` and `x` both have length `dim`.
pub(crate) fn check_full_unit_map_args(dim: usize, u: &[Real], x: &[Real]) -> Result<()> {
    if u.len() != dim || x.len() != dim {
        return Err(Error::Precondition(format!(
            "unit map of a {dim}-dimensional distribution called with \
             {} random numbers and an output buffer of length {}",
            u.len(),
            x.len()
        )));
    }
    Ok(())
}

/// Check that a density argument has length `dim`.
pub(crate) fn check_point(dim: usize, x: &[Real]) -> Result<()> {
    if x.len() != dim {
        return Err(Error::Precondition(format!(
            "point of dimension {} passed to a {dim}-dimensional distribution",
            x.len()
        )));
    }
    Ok(())
}

/// Draw one point from `node` by mapping a uniform point of the unit cube.
pub fn sample<R: Rng + ?Sized>(node: &dyn DistributionNode, rng: &mut R) -> Result<Vec<Real>> {
    let dim = node.dim();
    let u: Vec<Real> = (0..dim).map(|_| rng.gen::<Real>()).collect();
    let mut x = vec![0.0; dim];
    node.unit_map(&u, &mut x)?;
    Ok(x)
}
