//! Numerical integration.
//!
//! Gauss–Legendre rules on `[-1, 1]` computed by the Golub–Welsch method,
//! and their tensor product over a [`BoundingBox`].

use crate::array::next_index;
use crate::bounding_box::BoundingBox;
use dg_core::{
    ensure,
    errors::{Error, Result},
    Real,
};
use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss–Legendre quadrature on [−1, 1].
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    x: Vec<Real>,
    w: Vec<Real>,
}

impl GaussLegendre {
    /// Build a rule with `order` points (exact for polynomials of degree
    /// `2 * order - 1`).
    pub fn new(order: usize) -> Result<Self> {
        ensure!(order > 0, "Gauss-Legendre order must be positive");
        if order == 1 {
            return Ok(Self {
                x: vec![0.0],
                w: vec![2.0],
            });
        }
        // Jacobi matrix of the Legendre recurrence: zero diagonal,
        // off-diagonal k / sqrt(4k^2 - 1).
        let mut jacobi = DMatrix::<Real>::zeros(order, order);
        for k in 1..order {
            let kf = k as Real;
            let b = kf / (4.0 * kf * kf - 1.0).sqrt();
            jacobi[(k, k - 1)] = b;
            jacobi[(k - 1, k)] = b;
        }
        let eig = SymmetricEigen::new(jacobi);
        let mut pairs: Vec<(Real, Real)> = (0..order)
            .map(|i| {
                let v0 = eig.eigenvectors[(0, i)];
                (eig.eigenvalues[i], 2.0 * v0 * v0)
            })
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (x, w) = pairs.into_iter().unzip();
        Ok(Self { x, w })
    }

    /// Quadrature nodes on [−1, 1], ascending.
    pub fn x(&self) -> &[Real] {
        &self.x
    }

    /// Quadrature weights.
    pub fn w(&self) -> &[Real] {
        &self.w
    }

    /// Number of quadrature points.
    pub fn order(&self) -> usize {
        self.x.len()
    }

    /// Integrate `f` on `[a, b]`.
    pub fn integrate<F: FnMut(Real) -> Real>(&self, mut f: F, a: Real, b: Real) -> Real {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.x
            .iter()
            .zip(&self.w)
            .map(|(&xi, &wi)| wi * f(mid + half * xi))
            .sum::<Real>()
            * half
    }
}

/// Tensor-product Gauss–Legendre integral of `f` over a finite box, with
/// `order` points per dimension. Errors returned by `f` are propagated.
pub fn integrate_box<F>(mut f: F, bbox: &BoundingBox, order: usize) -> Result<Real>
where
    F: FnMut(&[Real]) -> Result<Real>,
{
    let dim = bbox.dim();
    ensure!(dim > 0, "cannot integrate over a zero-dimensional box");
    if bbox.intervals().iter().any(|iv| !iv.length().is_finite()) {
        return Err(Error::NumericDomain(
            "cannot integrate over an infinite box".into(),
        ));
    }
    let rule = GaussLegendre::new(order)?;
    let halves: Vec<Real> = bbox.intervals().iter().map(|iv| 0.5 * iv.length()).collect();
    let mids = bbox.midpoint();
    let jacobian: Real = halves.iter().product();

    let shape = vec![order; dim];
    let mut idx = vec![0usize; dim];
    let mut point = vec![0.0; dim];
    let mut sum = 0.0;
    loop {
        let mut w = 1.0;
        for d in 0..dim {
            point[d] = mids[d] + halves[d] * rule.x[idx[d]];
            w *= rule.w[idx[d]];
        }
        sum += w * f(&point)?;
        if !next_index(&mut idx, &shape) {
            break;
        }
    }
    Ok(sum * jacobian)
}
