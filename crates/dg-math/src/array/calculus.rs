//! Reductions, finite-difference derivatives, and cumulative sums.
//!
//! `derivative` and `cdf_array` are mutually inverse up to the boundary
//! terms: `cdf_array(derivative(a))` recovers `a` minus its inclusion–
//! exclusion boundary, and `derivative(cdf_array(a)) == a` exactly.

use super::{cast, compute_strides, next_index, validated_length, ArrayShape, NdArray};
use dg_core::errors::{Error, Result};
use dg_core::MAX_INTERPOLATION_RANK;
use num_traits::{Float, NumCast, ToPrimitive, Zero};
use std::ops::{AddAssign, Mul};

impl<T: Copy> NdArray<T> {
    /// Sum of all elements, accumulated in `A`.
    pub fn sum<A>(&self) -> Result<A>
    where
        A: Zero + AddAssign + From<T>,
    {
        self.check_shaped()?;
        let mut acc = A::zero();
        for &v in self.data.iter() {
            acc += A::from(v);
        }
        Ok(acc)
    }

    /// Sum of squared elements, accumulated in `A`.
    pub fn sumsq<A>(&self) -> Result<A>
    where
        A: Zero + AddAssign + Mul<Output = A> + Copy + From<T>,
    {
        self.check_shaped()?;
        let mut acc = A::zero();
        for &v in self.data.iter() {
            let a = A::from(v);
            acc += a * a;
        }
        Ok(acc)
    }
}

impl<T: Copy + NumCast> NdArray<T> {
    /// Mixed finite difference over all dimensions, multiplied by `scale`.
    ///
    /// Each output element is the inclusion–exclusion sum over the 2^rank
    /// corners of the unit cell starting at that index. The output has one
    /// fewer point along every dimension; every span must be at least 2.
    pub fn derivative<A: Float>(&self, scale: f64) -> Result<NdArray<T>> {
        self.check_shaped()?;
        let rank = self.rank();
        if rank == 0 || rank > MAX_INTERPOLATION_RANK {
            return Err(Error::Precondition(format!(
                "derivative requires rank in [1, {MAX_INTERPOLATION_RANK}], got {rank}"
            )));
        }
        if let Some(&n) = self.shape.iter().find(|&&n| n < 2) {
            return Err(Error::ShapeMismatch(format!(
                "derivative requires at least 2 points per dimension, found span {n}"
            )));
        }
        let out_shape: ArrayShape = self.shape.iter().map(|&n| n - 1).collect();
        let scale: A = cast(scale)?;

        let corners: Vec<(usize, bool)> = (0..(1usize << rank))
            .map(|mask| {
                let off = (0..rank)
                    .filter(|d| mask & (1 << d) != 0)
                    .map(|d| self.strides[d])
                    .sum();
                let negative = (rank - mask.count_ones() as usize) % 2 == 1;
                (off, negative)
            })
            .collect();

        let mut data = Vec::with_capacity(validated_length(&out_shape)?);
        let mut idx = ArrayShape::from_elem(0, rank);
        loop {
            let base: usize = idx.iter().zip(&self.strides).map(|(&i, &s)| i * s).sum();
            let mut acc = A::zero();
            for &(off, negative) in &corners {
                let v: A = cast(self.data[base + off])?;
                if negative {
                    acc = acc - v;
                } else {
                    acc = acc + v;
                }
            }
            data.push(cast(acc * scale)?);
            if !next_index(&mut idx, &out_shape) {
                break;
            }
        }
        NdArray::from_vec(&out_shape, data)
    }

    /// Multi-dimensional cumulative sum, multiplied by `scale`.
    ///
    /// The output has one more point along every dimension. Its elements at
    /// index 0 along any dimension are zero, and the element at `i + 1`
    /// (component-wise) equals the sum of the input over the box `[0, i]`.
    pub fn cdf_array<A: Float>(&self, scale: f64) -> Result<NdArray<T>> {
        self.check_shaped()?;
        let rank = self.rank();
        let out_shape: ArrayShape = self.shape.iter().map(|&n| n + 1).collect();
        let out_strides = compute_strides(&out_shape);
        let out_len = validated_length(&out_shape)?;

        let mut buf = vec![A::zero(); out_len];
        let mut idx = ArrayShape::from_elem(0, rank);
        for &v in self.data.iter() {
            let off: usize = idx
                .iter()
                .zip(&out_strides)
                .map(|(&i, &s)| (i + 1) * s)
                .sum();
            buf[off] = cast(v)?;
            next_index(&mut idx, &self.shape);
        }

        for d in 0..rank {
            let stride = out_strides[d];
            let span = out_shape[d];
            for p in 0..out_len {
                if (p / stride) % span != 0 {
                    let prev = buf[p - stride];
                    buf[p] = buf[p] + prev;
                }
            }
        }

        let scale: A = cast(scale)?;
        let data = buf
            .into_iter()
            .map(|a| cast(a * scale))
            .collect::<Result<Vec<T>>>()?;
        NdArray::from_vec(&out_shape, data)
    }

    /// Sum of the elements over the box `[0, index]` (inclusive), in `A`.
    pub fn cdf_value<A: Float>(&self, index: &[usize]) -> Result<A> {
        self.linear_index(index)?;
        let upper: ArrayShape = index.iter().map(|&i| i + 1).collect();
        let mut idx = ArrayShape::from_elem(0, index.len());
        let mut acc = A::zero();
        loop {
            let v: A = cast(*self.value(&idx))?;
            acc = acc + v;
            if !next_index(&mut idx, &upper) {
                break;
            }
        }
        Ok(acc)
    }
}

impl<T: Copy + ToPrimitive> NdArray<T> {
    /// `true` if every element is finite and non-negative.
    pub fn is_density(&self) -> Result<bool> {
        self.check_shaped()?;
        Ok(self
            .data
            .iter()
            .all(|v| v.to_f64().is_some_and(|x| x.is_finite() && x >= 0.0)))
    }
}
