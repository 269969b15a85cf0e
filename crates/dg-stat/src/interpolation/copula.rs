//! Interpolation of copula/marginal decompositions.
//!
//! Marginals are interpolated by quantile averaging; copula densities are
//! averaged with the same weights. Sampling picks one corner copula at
//! random in proportion to its weight.

use crate::distribution::{
    check_full_unit_map_args, check_point, Distribution1D, DistributionNode,
};
use crate::marginal::InterpolatedDistribution1D;
use dg_core::{
    ensure, ensure_construct, ensure_domain,
    errors::{Error, Result},
    Real,
};
use std::sync::Arc;

/// Interpolator over nodes that split into a copula and marginals.
#[derive(Debug, Clone)]
pub struct CopulaInterpolation {
    dim: usize,
    n_expected: usize,
    copulas: Vec<(Arc<dyn DistributionNode>, Real)>,
    marginals: Vec<InterpolatedDistribution1D>,
    w_cdf: Vec<Real>,
    wsum: Real,
    auto_normalize: bool,
}

impl CopulaInterpolation {
    /// Interpolator for `dim`-dimensional nodes (`dim >= 2`), queried once
    /// `n_expected` nodes have been added.
    pub fn new(dim: usize, n_expected: usize) -> Result<Self> {
        ensure_construct!(
            dim >= 2,
            "copula interpolation needs at least two dimensions, got {dim}"
        );
        Ok(Self {
            dim,
            n_expected,
            copulas: Vec::with_capacity(n_expected),
            marginals: (0..dim)
                .map(|_| InterpolatedDistribution1D::new(n_expected))
                .collect(),
            w_cdf: Vec::with_capacity(n_expected),
            wsum: 0.0,
            auto_normalize: true,
        })
    }

    /// Dimensionality of the interpolated distribution.
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn split(
        &self,
        node: &dyn DistributionNode,
    ) -> Result<(Arc<dyn DistributionNode>, Vec<Arc<dyn Distribution1D>>)> {
        ensure!(
            node.dim() == self.dim,
            "node of dimension {} added to a {}-dimensional interpolator",
            node.dim(),
            self.dim
        );
        let parts = node.decompose().ok_or_else(|| {
            Error::Precondition(format!(
                "copula interpolation requires decomposable nodes, got {node:?}"
            ))
        })?;
        ensure!(
            parts.copula.dim() == self.dim && parts.marginals.len() == self.dim,
            "decomposition does not match the interpolator dimension {}",
            self.dim
        );
        Ok((parts.copula, parts.marginals))
    }

    /// Append a node with the given weight.
    pub fn add(&mut self, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        let (copula, marginals) = self.split(node.as_ref())?;
        for (interp, m) in self.marginals.iter_mut().zip(marginals) {
            interp.add(m, weight)?;
        }
        self.copulas.push((copula, weight));
        self.normalize_if_complete()
    }

    /// Replace entry `i`.
    pub fn replace(&mut self, i: usize, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        let size = self.copulas.len();
        if i >= size {
            return Err(Error::IndexOutOfRange { index: i, size });
        }
        let (copula, marginals) = self.split(node.as_ref())?;
        for (interp, m) in self.marginals.iter_mut().zip(marginals) {
            interp.replace(i, m, weight)?;
        }
        self.copulas[i] = (copula, weight);
        self.normalize_if_complete()
    }

    /// Change the weight of entry `i`.
    pub fn set_weight(&mut self, i: usize, weight: Real) -> Result<()> {
        let size = self.copulas.len();
        let slot = self
            .copulas
            .get_mut(i)
            .ok_or(Error::IndexOutOfRange { index: i, size })?;
        slot.1 = weight;
        for interp in &mut self.marginals {
            interp.set_weight(i, weight)?;
        }
        self.normalize_if_complete()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.copulas.clear();
        self.w_cdf.clear();
        self.wsum = 0.0;
        for interp in &mut self.marginals {
            interp.clear();
        }
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.copulas.len()
    }

    /// Enable or suspend automatic normalization, here and in the marginal
    /// interpolators.
    pub fn normalize_automatically(&mut self, allow: bool) -> Result<()> {
        self.auto_normalize = allow;
        for interp in &mut self.marginals {
            interp.normalize_automatically(allow)?;
        }
        self.normalize_if_complete()
    }

    fn normalize_if_complete(&mut self) -> Result<()> {
        if !self.auto_normalize || self.copulas.len() < self.n_expected {
            return Ok(());
        }
        self.w_cdf.clear();
        self.wsum = 0.0;
        let mut sw = 0.0;
        for (_, w) in &self.copulas {
            ensure_domain!(*w >= 0.0, "negative interpolation weight {w}");
            sw += w;
            self.w_cdf.push(sw);
        }
        ensure_domain!(sw > 0.0, "sum of interpolation weights is not positive");
        for c in &mut self.w_cdf {
            *c /= sw;
        }
        self.wsum = sw;
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        ensure!(
            self.auto_normalize,
            "interpolator queried while normalization is suspended"
        );
        ensure!(
            !self.copulas.is_empty() && self.copulas.len() >= self.n_expected,
            "interpolator has {} of {} expected nodes",
            self.copulas.len(),
            self.n_expected
        );
        ensure!(
            self.wsum > 0.0,
            "interpolation weights have not been normalized"
        );
        Ok(())
    }

    fn marginal_at(&self, i: usize) -> Result<&InterpolatedDistribution1D> {
        self.marginals.get(i).ok_or(Error::IndexOutOfRange {
            index: i,
            size: self.dim,
        })
    }

    fn weighted_copula_density(&self, u: &[Real]) -> Result<Real> {
        let mut sum = 0.0;
        for (c, w) in &self.copulas {
            if *w != 0.0 {
                sum += w * c.density(u)?;
            }
        }
        Ok(sum / self.wsum)
    }

    /// Interpolated copula density at the copula coordinates of `x`.
    pub fn copula_density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim, x)?;
        self.check_ready()?;
        let u = x
            .iter()
            .zip(&self.marginals)
            .map(|(&xi, m)| m.cdf(xi))
            .collect::<Result<Vec<_>>>()?;
        self.weighted_copula_density(&u)
    }

    /// Product of the interpolated marginal densities at `x`.
    pub fn product_of_the_marginals(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim, x)?;
        self.check_ready()?;
        let mut prod = 1.0;
        for (m, &xi) in self.marginals.iter().zip(x) {
            prod *= m.density(xi)?;
            if prod == 0.0 {
                break;
            }
        }
        Ok(prod)
    }

    /// Interpolated density at `x`.
    pub fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim, x)?;
        self.check_ready()?;
        let mut prod = 1.0;
        let mut u = Vec::with_capacity(self.dim);
        for (m, &xi) in self.marginals.iter().zip(x) {
            let (d, c) = m.density_and_cdf(xi)?;
            prod *= d;
            if prod == 0.0 {
                return Ok(0.0);
            }
            u.push(c);
        }
        Ok(prod * self.weighted_copula_density(&u)?)
    }

    /// Map `u` to a point of the interpolated distribution.
    ///
    /// `u[0]` first selects a corner copula according to the weights and
    /// is then rescaled within the selected bin and reused.
    pub fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_full_unit_map_args(self.dim, u, x)?;
        self.check_ready()?;

        let r = u[0];
        let (ibin, rescaled) = if r < 1.0 {
            let r = r.max(0.0);
            let ibin = self
                .w_cdf
                .partition_point(|&c| c <= r)
                .min(self.w_cdf.len() - 1);
            let base = if ibin == 0 { 0.0 } else { self.w_cdf[ibin - 1] };
            let width = self.w_cdf[ibin] - base;
            let t = if width > 0.0 { (r - base) / width } else { 0.0 };
            (ibin, t)
        } else {
            let last = self
                .copulas
                .iter()
                .rposition(|(_, w)| *w > 0.0)
                .unwrap_or(self.copulas.len() - 1);
            (last, 1.0)
        };

        let mut v = u.to_vec();
        v[0] = rescaled;
        self.copulas[ibin].0.unit_map(&v, x)?;
        for (xi, m) in x.iter_mut().zip(&self.marginals) {
            *xi = m.quantile(xi.clamp(0.0, 1.0))?;
        }
        Ok(())
    }

    /// Density of the interpolated marginal `i`.
    pub fn marginal_density(&self, i: usize, x: Real) -> Result<Real> {
        self.check_ready()?;
        self.marginal_at(i)?.density(x)
    }

    /// Cdf of the interpolated marginal `i`.
    pub fn marginal_cdf(&self, i: usize, x: Real) -> Result<Real> {
        self.check_ready()?;
        self.marginal_at(i)?.cdf(x)
    }

    /// Exceedance of the interpolated marginal `i`.
    pub fn marginal_exceedance(&self, i: usize, x: Real) -> Result<Real> {
        self.check_ready()?;
        self.marginal_at(i)?.exceedance(x)
    }

    /// Quantile of the interpolated marginal `i`.
    pub fn marginal_quantile(&self, i: usize, p: Real) -> Result<Real> {
        self.check_ready()?;
        self.marginal_at(i)?.quantile(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copulas::{FgmCopula, GaussianCopula};
    use crate::distributions1d::{Gauss1D, Uniform1D};
    use crate::multivariate::{CompositeDistribution, ProductDistribution};
    use approx::assert_abs_diff_eq;
    use dg_math::{integrate_box, BoundingBox};

    fn fgm_node(theta: f64, lo0: f64, hi0: f64, lo1: f64, hi1: f64) -> Arc<dyn DistributionNode> {
        Arc::new(
            CompositeDistribution::new(
                Box::new(FgmCopula::new(theta).unwrap()),
                vec![
                    Box::new(Uniform1D::new(lo0, hi0).unwrap()),
                    Box::new(Uniform1D::new(lo1, hi1).unwrap()),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn needs_two_dimensions() {
        assert!(matches!(
            CopulaInterpolation::new(1, 2),
            Err(Error::Construction(_))
        ));
    }

    #[test]
    fn density_integrates_to_one() {
        let mut interp = CopulaInterpolation::new(2, 2).unwrap();
        interp.add(fgm_node(0.8, 0.0, 1.0, 0.0, 2.0), 0.25).unwrap();
        interp.add(fgm_node(-0.5, 1.0, 3.0, 1.0, 3.0), 0.75).unwrap();

        // marginal supports are [0.75, 2.5] and [0.75, 2.75]
        let b = BoundingBox::from_limits(&[(0.75, 2.5), (0.75, 2.75)]).unwrap();
        let v = integrate_box(|x| interp.density(x), &b, 8).unwrap();
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn marginals_and_copula_density() {
        let mut interp = CopulaInterpolation::new(2, 2).unwrap();
        interp.add(fgm_node(0.6, 0.0, 1.0, 0.0, 1.0), 0.5).unwrap();
        interp.add(fgm_node(0.2, 0.0, 1.0, 0.0, 1.0), 0.5).unwrap();

        assert_abs_diff_eq!(interp.marginal_cdf(0, 0.3).unwrap(), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(interp.marginal_exceedance(1, 0.3).unwrap(), 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(interp.marginal_quantile(1, 0.4).unwrap(), 0.4, epsilon = 1e-15);
        assert_abs_diff_eq!(interp.marginal_density(0, 0.5).unwrap(), 1.0, epsilon = 1e-6);
        assert!(interp.marginal_cdf(2, 0.5).is_err());

        // average of the two FGM densities is FGM with theta 0.4
        let x = [0.2, 0.9];
        let expected = 1.0 + 0.4 * (1.0 - 0.4) * (1.0 - 1.8);
        assert_abs_diff_eq!(interp.copula_density(&x).unwrap(), expected, epsilon = 1e-10);
        assert_abs_diff_eq!(interp.product_of_the_marginals(&x).unwrap(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(interp.density(&x).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn unit_map_selects_copula_by_weight() {
        let gauss: Arc<dyn DistributionNode> = Arc::new(
            CompositeDistribution::new(
                Box::new(GaussianCopula::bivariate(0.5).unwrap()),
                vec![
                    Box::new(Gauss1D::new(0.0, 1.0).unwrap()),
                    Box::new(Gauss1D::new(0.0, 1.0).unwrap()),
                ],
            )
            .unwrap(),
        );
        let mut interp = CopulaInterpolation::new(2, 2).unwrap();
        interp.add(Arc::clone(&gauss), 0.0).unwrap();
        interp.add(gauss, 1.0).unwrap();

        let mut x = [0.0; 2];
        interp.unit_map(&[0.5, 0.5], &mut x).unwrap();
        assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-9);
        interp.unit_map(&[1.0, 0.5], &mut x).unwrap();
        assert!(x[0] > 5.0);
    }

    #[test]
    fn bad_indices_and_short_points() {
        let mut interp = CopulaInterpolation::new(2, 2).unwrap();
        interp.add(fgm_node(0.5, 0.0, 1.0, 0.0, 1.0), 0.5).unwrap();
        assert_eq!(
            interp.replace(1, fgm_node(0.1, 0.0, 1.0, 0.0, 1.0), 0.5),
            Err(Error::IndexOutOfRange { index: 1, size: 1 })
        );
        assert_eq!(
            interp.set_weight(3, 0.5),
            Err(Error::IndexOutOfRange { index: 3, size: 1 })
        );
        interp.add(fgm_node(-0.5, 0.0, 1.0, 0.0, 1.0), 0.5).unwrap();

        let mut short = [0.0];
        assert!(matches!(
            interp.unit_map(&[0.5], &mut short),
            Err(Error::Precondition(_))
        ));
        let mut x = [0.0; 2];
        interp.unit_map(&[0.25, 0.5], &mut x).unwrap();
    }

    #[test]
    fn rejects_nodes_without_decomposition() {
        #[derive(Debug)]
        struct Opaque;
        impl DistributionNode for Opaque {
            fn dim(&self) -> usize {
                2
            }
            fn density(&self, _x: &[Real]) -> Result<Real> {
                Ok(1.0)
            }
            fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
                x.copy_from_slice(u);
                Ok(())
            }
            fn mapped_by_quantiles(&self) -> bool {
                true
            }
            fn clone_node(&self) -> Box<dyn DistributionNode> {
                Box::new(Opaque)
            }
        }
        let mut interp = CopulaInterpolation::new(2, 1).unwrap();
        assert!(matches!(
            interp.add(Arc::new(Opaque), 1.0),
            Err(Error::Precondition(_))
        ));
        let product: Arc<dyn DistributionNode> = Arc::new(
            ProductDistribution::new(vec![
                Box::new(Uniform1D::new(0.0, 1.0).unwrap()),
                Box::new(Uniform1D::new(0.0, 1.0).unwrap()),
            ])
            .unwrap(),
        );
        interp.add(product, 1.0).unwrap();
        assert_abs_diff_eq!(interp.density(&[0.5, 0.5]).unwrap(), 1.0, epsilon = 1e-6);
    }
}
