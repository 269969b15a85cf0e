//! Slicing and projection.
//!
//! A slice fixes a subset of dimensions at given indices and exposes the
//! remaining ones, in their original order. Projection reduces the fixed
//! dimensions instead of pinning them.

use super::{next_index, ArrayShape, NdArray};
use dg_core::errors::{Error, Result};
use num_traits::Zero;
use std::ops::AddAssign;

/// Accumulator used by [`NdArray::project`].
///
/// For every element of the projected array the projector is cleared, fed
/// all array values along the projected dimensions, and asked for a result.
pub trait ArrayProjector<T, R> {
    /// Reset the accumulator.
    fn clear(&mut self);
    /// Feed one value. `index` is the position within the projected
    /// dimensions; `linear_index` is the position in the source array.
    fn process(&mut self, index: &[usize], linear_index: usize, value: &T);
    /// Result accumulated since the last `clear`.
    fn result(&mut self) -> R;
}

/// Projector that sums values in the accumulator type `A`.
#[derive(Debug, Clone)]
pub struct SumProjector<A> {
    acc: A,
}

impl<A: Zero> Default for SumProjector<A> {
    fn default() -> Self {
        Self { acc: A::zero() }
    }
}

impl<A: Zero> SumProjector<A> {
    /// Create a summing projector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, A> ArrayProjector<T, A> for SumProjector<A>
where
    T: Copy,
    A: Zero + Copy + AddAssign + From<T>,
{
    fn clear(&mut self) {
        self.acc = A::zero();
    }

    fn process(&mut self, _index: &[usize], _linear_index: usize, value: &T) {
        self.acc += A::from(*value);
    }

    fn result(&mut self) -> A {
        self.acc
    }
}

/// Layout of a slice: which source dimensions are free and where the
/// fixed part of the offset lands.
struct SliceLayout {
    free_dims: ArrayShape,
    free_shape: ArrayShape,
    base: usize,
}

impl<T> NdArray<T> {
    /// Shape that results from fixing the dimensions listed in `fixed`.
    ///
    /// Fixing every dimension yields the rank-0 shape.
    pub fn slice_shape(&self, fixed: &[usize]) -> Result<ArrayShape> {
        self.check_shaped()?;
        validate_fixed(fixed, self.rank())?;
        Ok((0..self.rank())
            .filter(|d| !fixed.contains(d))
            .map(|d| self.shape[d])
            .collect())
    }

    fn slice_layout(&self, fixed: &[usize], values: &[usize]) -> Result<SliceLayout> {
        self.check_shaped()?;
        validate_fixed(fixed, self.rank())?;
        if fixed.len() != values.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} fixed dimensions but {} fixed values",
                fixed.len(),
                values.len()
            )));
        }
        let mut base = 0;
        for (&d, &v) in fixed.iter().zip(values) {
            if v >= self.shape[d] {
                return Err(Error::IndexOutOfRange {
                    index: v,
                    size: self.shape[d],
                });
            }
            base += v * self.strides[d];
        }
        let free_dims: ArrayShape = (0..self.rank()).filter(|d| !fixed.contains(d)).collect();
        let free_shape = free_dims.iter().map(|&d| self.shape[d]).collect();
        Ok(SliceLayout {
            free_dims,
            free_shape,
            base,
        })
    }

    /// Visit every (slice position, source position) pair in slice row-major
    /// order.
    fn for_each_slice_offset<F>(&self, layout: &SliceLayout, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        let mut idx = ArrayShape::from_elem(0, layout.free_dims.len());
        let mut k = 0;
        loop {
            let off: usize = idx
                .iter()
                .zip(&layout.free_dims)
                .map(|(&i, &d)| i * self.strides[d])
                .sum();
            f(k, layout.base + off);
            k += 1;
            if !next_index(&mut idx, &layout.free_shape) {
                break;
            }
        }
    }
}

impl<T: Clone> NdArray<T> {
    /// Extract a slice as a new array.
    ///
    /// `fixed` lists the dimensions to pin and `values` their indices.
    pub fn slice(&self, fixed: &[usize], values: &[usize]) -> Result<NdArray<T>> {
        let layout = self.slice_layout(fixed, values)?;
        let mut data = Vec::with_capacity(layout.free_shape.iter().product());
        self.for_each_slice_offset(&layout, |_, src| data.push(self.data[src].clone()));
        NdArray::from_vec(&layout.free_shape, data)
    }

    /// Copy a slice into an existing array whose shape must equal
    /// [`slice_shape`](Self::slice_shape).
    pub fn export_slice(
        &self,
        slice: &mut NdArray<T>,
        fixed: &[usize],
        values: &[usize],
    ) -> Result<()> {
        let layout = self.slice_layout(fixed, values)?;
        slice.check_shaped()?;
        ensure_slice_shape(slice, &layout.free_shape)?;
        self.for_each_slice_offset(&layout, |k, src| {
            slice.data[k] = self.data[src].clone();
        });
        Ok(())
    }

    /// Overwrite the slice of this array with the contents of `slice`.
    pub fn import_slice(
        &mut self,
        slice: &NdArray<T>,
        fixed: &[usize],
        values: &[usize],
    ) -> Result<()> {
        let layout = self.slice_layout(fixed, values)?;
        slice.check_shaped()?;
        ensure_slice_shape(slice, &layout.free_shape)?;
        let mut targets = Vec::with_capacity(slice.len());
        self.for_each_slice_offset(&layout, |_, dst| targets.push(dst));
        for (k, dst) in targets.into_iter().enumerate() {
            self.data[dst] = slice.data[k].clone();
        }
        Ok(())
    }

    /// Reduce the dimensions listed in `projected` with `projector`.
    ///
    /// The result has the shape of [`slice_shape(projected)`](Self::slice_shape);
    /// each of its elements is the projector output over the corresponding
    /// sub-array spanned by the projected dimensions.
    pub fn project<R, P>(&self, projected: &[usize], projector: &mut P) -> Result<NdArray<R>>
    where
        P: ArrayProjector<T, R>,
    {
        let out_shape = self.slice_shape(projected)?;
        let proj_shape: ArrayShape = projected.iter().map(|&d| self.shape[d]).collect();
        let out_dims: ArrayShape = (0..self.rank()).filter(|d| !projected.contains(d)).collect();

        let mut out_idx = ArrayShape::from_elem(0, out_dims.len());
        let mut data = Vec::with_capacity(out_shape.iter().product());
        loop {
            let base: usize = out_idx
                .iter()
                .zip(&out_dims)
                .map(|(&i, &d)| i * self.strides[d])
                .sum();
            projector.clear();
            let mut p_idx = ArrayShape::from_elem(0, projected.len());
            loop {
                let off: usize = p_idx
                    .iter()
                    .zip(projected)
                    .map(|(&i, &d)| i * self.strides[d])
                    .sum();
                let l = base + off;
                projector.process(&p_idx, l, &self.data[l]);
                if !next_index(&mut p_idx, &proj_shape) {
                    break;
                }
            }
            data.push(projector.result());
            if !next_index(&mut out_idx, &out_shape) {
                break;
            }
        }
        NdArray::from_vec(&out_shape, data)
    }
}

fn validate_fixed(fixed: &[usize], rank: usize) -> Result<()> {
    for (i, &d) in fixed.iter().enumerate() {
        if d >= rank {
            return Err(Error::IndexOutOfRange {
                index: d,
                size: rank,
            });
        }
        if fixed[..i].contains(&d) {
            return Err(Error::Precondition(format!(
                "dimension {d} is listed more than once"
            )));
        }
    }
    Ok(())
}

fn ensure_slice_shape<T>(slice: &NdArray<T>, expected: &[usize]) -> Result<()> {
    if slice.shape() != expected {
        return Err(Error::ShapeMismatch(format!(
            "slice has shape {:?}, expected {:?}",
            slice.shape(),
            expected
        )));
    }
    Ok(())
}
