//! Multivariate distributions assembled from 1-D marginals.

use crate::archive::{copula_spec_of, marginal_specs, NodeSpec, Record};
use crate::copulas::IndependenceCopula;
use crate::distribution::{
    check_point, check_unit_map_args, Decomposition, Distribution1D, DistributionNode,
};
use crate::distributions1d::Uniform1D;
use dg_core::{
    ensure_construct,
    errors::{Error, Result},
    Real,
};
use dg_math::BoundingBox;
use std::sync::Arc;

fn deep_copy(marginals: &[Arc<dyn Distribution1D>]) -> Vec<Arc<dyn Distribution1D>> {
    marginals.iter().map(|m| Arc::from(m.clone_box())).collect()
}

// ── Product ───────────────────────────────────────────────────────────────────

/// Product of independent marginals.
#[derive(Debug, Clone)]
pub struct ProductDistribution {
    marginals: Vec<Arc<dyn Distribution1D>>,
}

impl ProductDistribution {
    /// Create from one marginal per dimension.
    pub fn new(marginals: Vec<Box<dyn Distribution1D>>) -> Result<Self> {
        ensure_construct!(
            !marginals.is_empty(),
            "a product distribution needs at least one marginal"
        );
        Ok(Self {
            marginals: marginals.into_iter().map(Arc::from).collect(),
        })
    }

    /// Uniform distribution over a box with positive side lengths.
    pub fn uniform(bbox: &BoundingBox) -> Result<Self> {
        let marginals = bbox
            .intervals()
            .iter()
            .map(|iv| -> Result<Box<dyn Distribution1D>> {
                Ok(Box::new(Uniform1D::new(iv.min(), iv.max())?))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(marginals)
    }

    /// Marginal along dimension `i`.
    pub fn marginal(&self, i: usize) -> Result<&dyn Distribution1D> {
        let size = self.marginals.len();
        self.marginals
            .get(i)
            .map(|m| m.as_ref())
            .ok_or(Error::IndexOutOfRange { index: i, size })
    }
}

impl DistributionNode for ProductDistribution {
    fn dim(&self) -> usize {
        self.marginals.len()
    }

    fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim(), x)?;
        let mut prod = 1.0;
        for (m, &xi) in self.marginals.iter().zip(x) {
            prod *= m.density(xi)?;
            if prod == 0.0 {
                break;
            }
        }
        Ok(prod)
    }

    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_unit_map_args(self.dim(), u, x)?;
        for ((xi, &ui), m) in x.iter_mut().zip(u).zip(&self.marginals) {
            *xi = m.quantile(ui.clamp(0.0, 1.0))?;
        }
        Ok(())
    }

    fn mapped_by_quantiles(&self) -> bool {
        true
    }

    fn clone_node(&self) -> Box<dyn DistributionNode> {
        Box::new(Self {
            marginals: deep_copy(&self.marginals),
        })
    }

    fn decompose(&self) -> Option<Decomposition> {
        let copula = IndependenceCopula::new(self.dim()).ok()?;
        Some(Decomposition {
            copula: Arc::new(copula),
            marginals: self.marginals.clone(),
        })
    }

    fn record(&self) -> Result<Record> {
        NodeSpec::Product {
            marginals: marginal_specs(&self.marginals)?,
        }
        .to_record()
    }
}

// ── Composite ─────────────────────────────────────────────────────────────────

/// A copula combined with arbitrary marginals.
///
/// Density: `c(F₁(x₁), …, F_K(x_K)) · Π f_i(x_i)`.
#[derive(Debug, Clone)]
pub struct CompositeDistribution {
    copula: Arc<dyn DistributionNode>,
    marginals: Vec<Arc<dyn Distribution1D>>,
}

impl CompositeDistribution {
    /// Combine a copula with one marginal per dimension.
    pub fn new(
        copula: Box<dyn DistributionNode>,
        marginals: Vec<Box<dyn Distribution1D>>,
    ) -> Result<Self> {
        ensure_construct!(
            copula.dim() == marginals.len(),
            "copula dimension {} does not match the number of marginals {}",
            copula.dim(),
            marginals.len()
        );
        Ok(Self {
            copula: Arc::from(copula),
            marginals: marginals.into_iter().map(Arc::from).collect(),
        })
    }

    /// The copula.
    pub fn copula(&self) -> &dyn DistributionNode {
        self.copula.as_ref()
    }

    /// Marginal along dimension `i`.
    pub fn marginal(&self, i: usize) -> Result<&dyn Distribution1D> {
        let size = self.marginals.len();
        self.marginals
            .get(i)
            .map(|m| m.as_ref())
            .ok_or(Error::IndexOutOfRange { index: i, size })
    }
}

impl DistributionNode for CompositeDistribution {
    fn dim(&self) -> usize {
        self.marginals.len()
    }

    fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim(), x)?;
        let mut prod = 1.0;
        let mut u = Vec::with_capacity(x.len());
        for (m, &xi) in self.marginals.iter().zip(x) {
            prod *= m.density(xi)?;
            if prod == 0.0 {
                return Ok(0.0);
            }
            u.push(m.cdf(xi)?);
        }
        Ok(prod * self.copula.density(&u)?)
    }

    fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_unit_map_args(self.dim(), u, x)?;
        self.copula.unit_map(u, x)?;
        for (xi, m) in x.iter_mut().zip(&self.marginals) {
            *xi = m.quantile(xi.clamp(0.0, 1.0))?;
        }
        Ok(())
    }

    fn mapped_by_quantiles(&self) -> bool {
        self.copula.mapped_by_quantiles()
    }

    fn clone_node(&self) -> Box<dyn DistributionNode> {
        Box::new(Self {
            copula: Arc::from(self.copula.clone_node()),
            marginals: deep_copy(&self.marginals),
        })
    }

    fn decompose(&self) -> Option<Decomposition> {
        Some(Decomposition {
            copula: Arc::clone(&self.copula),
            marginals: self.marginals.clone(),
        })
    }

    fn record(&self) -> Result<Record> {
        NodeSpec::Composite {
            copula: copula_spec_of(self.copula.as_ref())?,
            marginals: marginal_specs(&self.marginals)?,
        }
        .to_record()
    }
}
