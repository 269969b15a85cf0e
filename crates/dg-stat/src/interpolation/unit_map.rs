//! Interpolation by averaging conditional quantile functions.

use crate::distribution::{check_full_unit_map_args, check_point, DistributionNode};
use dg_core::{
    ensure, ensure_domain,
    errors::{Error, Result},
    Real,
};
use dg_math::solvers1d::invert_increasing;
use std::sync::Arc;

/// Weighted average of the unit maps of quantile-mapped nodes.
///
/// The interpolated unit map sends `u` to `Σ w_k T_k(u) / Σ w_k`. Because
/// every `T_k` is a chain of conditional quantiles, so is the average, and
/// the density follows from inverting it one coordinate at a time.
#[derive(Debug, Clone)]
pub struct ConditionalQuantileInterpolation {
    dim: usize,
    n_expected: usize,
    entries: Vec<(Arc<dyn DistributionNode>, Real)>,
    wsum: Real,
    auto_normalize: bool,
}

impl ConditionalQuantileInterpolation {
    /// Interpolator for `dim`-dimensional nodes, queried once
    /// `n_expected` nodes have been added.
    pub fn new(dim: usize, n_expected: usize) -> Self {
        Self {
            dim,
            n_expected,
            entries: Vec::with_capacity(n_expected),
            wsum: 0.0,
            auto_normalize: true,
        }
    }

    /// Dimensionality of the interpolated distribution.
    pub fn dim(&self) -> usize {
        self.dim
    }

    fn check_node(&self, node: &dyn DistributionNode) -> Result<()> {
        ensure!(
            node.dim() == self.dim,
            "node of dimension {} added to a {}-dimensional interpolator",
            node.dim(),
            self.dim
        );
        ensure!(
            node.mapped_by_quantiles(),
            "conditional quantile interpolation requires nodes mapped by quantiles"
        );
        Ok(())
    }

    /// Append a node with the given weight.
    pub fn add(&mut self, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        self.check_node(node.as_ref())?;
        self.entries.push((node, weight));
        self.normalize_if_complete()
    }

    /// Replace entry `i`.
    pub fn replace(&mut self, i: usize, node: Arc<dyn DistributionNode>, weight: Real) -> Result<()> {
        self.check_node(node.as_ref())?;
        let size = self.entries.len();
        let slot = self
            .entries
            .get_mut(i)
            .ok_or(Error::IndexOutOfRange { index: i, size })?;
        *slot = (node, weight);
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
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Enable or suspend automatic normalization.
    pub fn normalize_automatically(&mut self, allow: bool) -> Result<()> {
        self.auto_normalize = allow;
        self.normalize_if_complete()
    }

    fn normalize_if_complete(&mut self) -> Result<()> {
        if !self.auto_normalize || self.entries.len() < self.n_expected {
            return Ok(());
        }
        self.wsum = 0.0;
        let mut sw = 0.0;
        for (_, w) in &self.entries {
            ensure_domain!(*w >= 0.0, "negative interpolation weight {w}");
            sw += w;
        }
        ensure_domain!(sw > 0.0, "sum of interpolation weights is not positive");
        self.wsum = sw;
        Ok(())
    }

    fn check_ready(&self) -> Result<()> {
        ensure!(
            self.auto_normalize,
            "interpolator queried while normalization is suspended"
        );
        ensure!(
            !self.entries.is_empty() && self.entries.len() >= self.n_expected,
            "interpolator has {} of {} expected nodes",
            self.entries.len(),
            self.n_expected
        );
        ensure!(
            self.wsum > 0.0,
            "interpolation weights have not been normalized"
        );
        Ok(())
    }

    /// Weighted average of the node maps of the prefix `u`, written to `x`.
    fn average_map(&self, u: &[Real], x: &mut [Real], scratch: &mut [Real]) -> Result<()> {
        x.fill(0.0);
        for (node, w) in &self.entries {
            if *w == 0.0 {
                continue;
            }
            node.unit_map(u, scratch)?;
            for (xi, si) in x.iter_mut().zip(scratch.iter()) {
                *xi += w * si;
            }
        }
        for xi in x.iter_mut() {
            *xi /= self.wsum;
        }
        Ok(())
    }

    /// Interpolated density at `x`.
    pub fn density(&self, x: &[Real]) -> Result<Real> {
        check_point(self.dim, x)?;
        self.check_ready()?;

        let mut p = vec![0.0; self.dim];
        let mut buf = vec![0.0; self.dim];
        let mut scratch = vec![0.0; self.dim];
        let mut dens = 1.0;

        for idim in 0..self.dim {
            let n = idim + 1;
            let target = x[idim];

            p[idim] = 0.0;
            self.average_map(&p[..n], &mut buf[..n], &mut scratch[..n])?;
            let xmin = buf[idim];
            p[idim] = 1.0;
            self.average_map(&p[..n], &mut buf[..n], &mut scratch[..n])?;
            let xmax = buf[idim];
            if target <= xmin || target >= xmax {
                return Ok(0.0);
            }

            let mut coordinate = |t: Real| -> Result<Real> {
                p[idim] = t;
                self.average_map(&p[..n], &mut buf[..n], &mut scratch[..n])?;
                Ok(buf[idim])
            };
            let y = invert_increasing(&mut coordinate, target, 0.0, 1.0)?;

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
            let qp = coordinate(yp)?;
            let qm = coordinate(ym)?;
            let deriv = (qp - qm) / (yp - ym);
            ensure_domain!(
                deriv > 0.0,
                "interpolated conditional quantile is not increasing along axis {idim}"
            );
            dens /= deriv;
            p[idim] = y;
        }
        Ok(dens)
    }

    /// Interpolated unit map. `u` and `x` must both have the distribution
    /// dimensionality.
    pub fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        check_full_unit_map_args(self.dim, u, x)?;
        self.check_ready()?;
        let mut scratch = vec![0.0; self.dim];
        self.average_map(u, x, &mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copulas::FgmCopula;
    use crate::distributions1d::{Gauss1D, Uniform1D};
    use crate::multivariate::{CompositeDistribution, ProductDistribution};
    use approx::assert_abs_diff_eq;

    fn gauss_pair(m0: f64, s0: f64, m1: f64, s1: f64) -> Arc<dyn DistributionNode> {
        Arc::new(
            ProductDistribution::new(vec![
                Box::new(Gauss1D::new(m0, s0).unwrap()),
                Box::new(Gauss1D::new(m1, s1).unwrap()),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn identical_nodes_reproduce_the_node() {
        let node: Arc<dyn DistributionNode> = Arc::new(
            CompositeDistribution::new(
                Box::new(FgmCopula::new(0.5).unwrap()),
                vec![
                    Box::new(Gauss1D::new(1.0, 2.0).unwrap()),
                    Box::new(Uniform1D::new(0.0, 3.0).unwrap()),
                ],
            )
            .unwrap(),
        );
        let mut interp = ConditionalQuantileInterpolation::new(2, 2);
        interp.add(Arc::clone(&node), 0.3).unwrap();
        interp.add(Arc::clone(&node), 0.7).unwrap();

        for x in [[0.5, 1.0], [2.0, 2.5], [-1.0, 0.2]] {
            assert_abs_diff_eq!(
                interp.density(&x).unwrap(),
                node.density(&x).unwrap(),
                epsilon = 1e-6
            );
        }
        let mut a = [0.0; 2];
        let mut b = [0.0; 2];
        interp.unit_map(&[0.3, 0.8], &mut a).unwrap();
        node.unit_map(&[0.3, 0.8], &mut b).unwrap();
        assert_abs_diff_eq!(a[0], b[0], epsilon = 1e-14);
        assert_abs_diff_eq!(a[1], b[1], epsilon = 1e-14);

        let mut short = [0.0];
        assert!(matches!(
            interp.unit_map(&[0.3], &mut short),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn gaussians_average_by_quantile() {
        let mut interp = ConditionalQuantileInterpolation::new(2, 2);
        interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 0.5).unwrap();
        interp.add(gauss_pair(2.0, 3.0, 4.0, 1.0), 0.5).unwrap();
        let expected = gauss_pair(1.0, 2.0, 2.0, 1.0);
        for x in [[1.0, 2.0], [0.0, 1.5], [3.0, 2.7]] {
            assert_abs_diff_eq!(
                interp.density(&x).unwrap(),
                expected.density(&x).unwrap(),
                epsilon = 1e-7
            );
        }
    }

    #[test]
    fn queries_wait_for_expected_nodes() {
        let mut interp = ConditionalQuantileInterpolation::new(2, 2);
        interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 1.0).unwrap();
        assert!(matches!(interp.density(&[0.0, 0.0]), Err(Error::Precondition(_))));
        interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 1.0).unwrap();
        assert!(interp.density(&[0.0, 0.0]).is_ok());
        interp.normalize_automatically(false).unwrap();
        assert!(matches!(interp.density(&[0.0, 0.0]), Err(Error::Precondition(_))));
    }

    #[test]
    fn rejects_wrong_nodes_and_weights() {
        let mut interp = ConditionalQuantileInterpolation::new(3, 1);
        assert!(interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 1.0).is_err());

        let mut interp = ConditionalQuantileInterpolation::new(2, 2);
        interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 0.0).unwrap();
        let err = interp.add(gauss_pair(0.0, 1.0, 0.0, 1.0), 0.0).unwrap_err();
        assert!(err.is_numeric_domain());
    }

    #[test]
    fn outside_support_is_zero() {
        let node: Arc<dyn DistributionNode> = Arc::new(
            ProductDistribution::new(vec![
                Box::new(Uniform1D::new(0.0, 1.0).unwrap()),
                Box::new(Uniform1D::new(0.0, 1.0).unwrap()),
            ])
            .unwrap(),
        );
        let mut interp = ConditionalQuantileInterpolation::new(2, 1);
        interp.add(node, 1.0).unwrap();
        assert_eq!(interp.density(&[1.5, 0.5]).unwrap(), 0.0);
        assert_eq!(interp.density(&[0.5, -0.5]).unwrap(), 0.0);
        assert_abs_diff_eq!(interp.density(&[0.5, 0.5]).unwrap(), 1.0, epsilon = 1e-6);
    }
}
