//! Interpolation on array indices.
//!
//! Coordinates are expressed in index units: `x[i] = 2.5` lies halfway
//! between the elements at positions 2 and 3 along dimension `i`.
//! Coordinates outside `[0, span - 1]` are clamped to the nearest edge.

use super::{cast, ArrayShape, NdArray};
use dg_core::errors::{Error, Result};
use dg_core::MAX_INTERPOLATION_RANK;
use num_traits::Float;
use smallvec::SmallVec;

/// Up to four (index, coefficient) pairs along one dimension.
type Stencil = SmallVec<[(usize, f64); 4]>;

impl<T: Float> NdArray<T> {
    /// Value at the nearest grid point (coordinates rounded and clamped).
    pub fn closest(&self, x: &[f64]) -> Result<T> {
        self.check_point(x)?;
        let mut l = 0;
        for ((&xi, &n), &s) in x.iter().zip(&self.shape).zip(&self.strides) {
            let i = if xi <= 0.0 {
                0
            } else {
                ((xi + 0.5).floor() as usize).min(n - 1)
            };
            l += i * s;
        }
        Ok(self.data[l])
    }

    /// Multilinear interpolation.
    ///
    /// Dimensions of span 1 contribute their single value regardless of
    /// the coordinate.
    pub fn interpolate1(&self, x: &[f64]) -> Result<T> {
        self.check_point(x)?;
        if self.rank() > MAX_INTERPOLATION_RANK {
            return Err(Error::Precondition(format!(
                "multilinear interpolation supports at most {MAX_INTERPOLATION_RANK} dimensions"
            )));
        }
        let rank = self.rank();
        let mut base = ArrayShape::with_capacity(rank);
        let mut frac: SmallVec<[f64; 10]> = SmallVec::with_capacity(rank);
        for (&xi, &n) in x.iter().zip(&self.shape) {
            let (b, f) = if n == 1 || xi <= 0.0 {
                (0, 0.0)
            } else if xi >= (n - 1) as f64 {
                (n - 2, 1.0)
            } else {
                let b = xi.floor();
                (b as usize, xi - b)
            };
            base.push(b);
            frac.push(f);
        }

        let mut sum = T::zero();
        'corners: for mask in 0..(1usize << rank) {
            let mut w = 1.0;
            let mut l = 0;
            for d in 0..rank {
                if mask & (1 << d) != 0 {
                    if frac[d] == 0.0 {
                        continue 'corners;
                    }
                    w *= frac[d];
                    l += (base[d] + 1) * self.strides[d];
                } else {
                    w *= 1.0 - frac[d];
                    l += base[d] * self.strides[d];
                }
            }
            if w != 0.0 {
                sum = sum + cast::<T, f64>(w)? * self.data[l];
            }
        }
        Ok(sum)
    }

    /// Tensor-product Lagrange interpolation of up to cubic order.
    ///
    /// Along each dimension the stencil is: constant for span 1, linear for
    /// span 2, quadratic through all three points for span 3, and a cubic
    /// through four consecutive points otherwise (shifted inward at the
    /// edges).
    pub fn interpolate3(&self, x: &[f64]) -> Result<T> {
        self.check_point(x)?;
        let stencils: SmallVec<[Stencil; 10]> = x
            .iter()
            .zip(&self.shape)
            .map(|(&xi, &n)| lagrange_stencil(xi, n))
            .collect();

        let rank = self.rank();
        let lens: ArrayShape = stencils.iter().map(|s| s.len()).collect();
        let mut pos = ArrayShape::from_elem(0, rank);
        let mut sum = T::zero();
        loop {
            let mut w = 1.0;
            let mut l = 0;
            for d in 0..rank {
                let (i, c) = stencils[d][pos[d]];
                w *= c;
                l += i * self.strides[d];
            }
            if w != 0.0 {
                sum = sum + cast::<T, f64>(w)? * self.data[l];
            }
            if !super::next_index(&mut pos, &lens) {
                break;
            }
        }
        Ok(sum)
    }

    fn check_point(&self, x: &[f64]) -> Result<()> {
        self.check_shaped()?;
        if x.len() != self.rank() {
            return Err(Error::ShapeMismatch(format!(
                "point of dimension {} used with an array of rank {}",
                x.len(),
                self.rank()
            )));
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(Error::NumericDomain("interpolation coordinate is NaN".into()));
        }
        Ok(())
    }
}

fn lagrange_stencil(x: f64, n: usize) -> Stencil {
    let mut st = Stencil::new();
    let t = x.clamp(0.0, (n - 1) as f64);
    match n {
        1 => st.push((0, 1.0)),
        2 => {
            st.push((0, 1.0 - t));
            st.push((1, t));
        }
        3 => {
            st.push((0, 0.5 * (t - 1.0) * (t - 2.0)));
            st.push((1, -t * (t - 2.0)));
            st.push((2, 0.5 * t * (t - 1.0)));
        }
        _ => {
            let i = t.floor() as usize;
            let start = if i == 0 {
                0
            } else if i >= n - 2 {
                n - 4
            } else {
                i - 1
            };
            let u = t - start as f64;
            st.push((start, -(u - 1.0) * (u - 2.0) * (u - 3.0) / 6.0));
            st.push((start + 1, 0.5 * u * (u - 2.0) * (u - 3.0)));
            st.push((start + 2, -0.5 * u * (u - 1.0) * (u - 3.0)));
            st.push((start + 3, u * (u - 1.0) * (u - 2.0) / 6.0));
        }
    }
    st
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multilinear_on_plane_is_exact() {
        let a = NdArray::from_fn(&[3, 4], |i| 2.0 * i[0] as f64 + 3.0 * i[1] as f64 + 1.0).unwrap();
        let v = a.interpolate1(&[0.25, 1.5]).unwrap();
        assert!((v - (0.5 + 4.5 + 1.0)).abs() < 1e-12);
        // grid points are reproduced
        assert_eq!(a.interpolate1(&[2.0, 3.0]).unwrap(), *a.value(&[2, 3]));
    }

    #[test]
    fn multilinear_clamps_outside() {
        let a = NdArray::from_vec(&[2], vec![1.0, 3.0]).unwrap();
        assert_eq!(a.interpolate1(&[-5.0]).unwrap(), 1.0);
        assert_eq!(a.interpolate1(&[7.0]).unwrap(), 3.0);
    }

    #[test]
    fn span_one_dimension_is_constant() {
        let a = NdArray::from_vec(&[1, 2], vec![4.0, 6.0]).unwrap();
        assert_eq!(a.interpolate1(&[0.7, 0.5]).unwrap(), 5.0);
        assert_eq!(a.interpolate3(&[0.7, 0.5]).unwrap(), 5.0);
    }

    #[test]
    fn cubic_reproduces_cubic_polynomial() {
        let f = |x: f64| x * x * x - 2.0 * x * x + 0.5 * x - 1.0;
        let a = NdArray::from_fn(&[7], |i| f(i[0] as f64)).unwrap();
        for &x in &[0.3, 1.7, 3.2, 5.5, 5.9] {
            let v = a.interpolate3(&[x]).unwrap();
            assert!((v - f(x)).abs() < 1e-10, "x = {x}: {v} vs {}", f(x));
        }
    }

    #[test]
    fn quadratic_on_span_three() {
        let f = |x: f64| 3.0 * x * x - x;
        let a = NdArray::from_fn(&[3], |i| f(i[0] as f64)).unwrap();
        assert!((a.interpolate3(&[1.25]).unwrap() - f(1.25)).abs() < 1e-12);
    }

    #[test]
    fn cubic_tensor_product_2d() {
        let f = |x: f64, y: f64| x * x * y - y * y + 2.0;
        let a = NdArray::from_fn(&[5, 6], |i| f(i[0] as f64, i[1] as f64)).unwrap();
        let v = a.interpolate3(&[2.4, 3.1]).unwrap();
        assert!((v - f(2.4, 3.1)).abs() < 1e-10);
    }

    #[test]
    fn closest_rounds_and_clamps() {
        let a = NdArray::from_fn(&[3, 3], |i| (3 * i[0] + i[1]) as f64).unwrap();
        assert_eq!(a.closest(&[1.4, 1.6]).unwrap(), 5.0);
        assert_eq!(a.closest(&[-2.0, 9.0]).unwrap(), 2.0);
    }

    #[test]
    fn nan_coordinate_is_rejected() {
        let a = NdArray::from_vec(&[2], vec![1.0, 2.0]).unwrap();
        assert!(a.interpolate1(&[f64::NAN]).unwrap_err().is_numeric_domain());
    }
}
