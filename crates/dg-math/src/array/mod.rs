//! `NdArray<T>`: a dense, rank-generic array with row-major layout.
//!
//! The array owns a contiguous buffer together with its shape and the
//! derived strides. The same type serves scalars (rank 0), density tables,
//! and parameter grids whose elements are distribution handles.
//!
//! Small arrays keep their shape, strides, and data inline; larger ones
//! spill to the heap transparently (`smallvec`). This is purely a storage
//! detail and has no effect on the public behaviour.
//!
//! An array created with [`NdArray::uninitialized`] (or `Default`) has no
//! shape. Such an array can only be reshaped, assigned from a shaped array,
//! or queried with [`NdArray::is_shape_known`]; everything else reports
//! [`Error::UninitializedArray`].

mod arith;
mod calculus;
mod interpolate;
mod slice;

pub use slice::{ArrayProjector, SumProjector};

use dg_core::errors::{Error, Result};
use num_traits::{NumCast, ToPrimitive};
use smallvec::SmallVec;

/// Number of dimensions kept inline before shape/stride storage moves to
/// the heap.
pub const INLINE_RANK: usize = 10;

/// Number of elements kept inline before data storage moves to the heap.
pub const INLINE_LEN: usize = 4;

/// Shape (or stride, or multi-index) container.
pub type ArrayShape = SmallVec<[usize; INLINE_RANK]>;

/// A dense multidimensional array of `T` in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray<T> {
    data: SmallVec<[T; INLINE_LEN]>,
    shape: ArrayShape,
    strides: ArrayShape,
    shape_known: bool,
}

impl<T> Default for NdArray<T> {
    fn default() -> Self {
        Self::uninitialized()
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

impl<T> NdArray<T> {
    /// Create an array without a shape.
    pub fn uninitialized() -> Self {
        Self {
            data: SmallVec::new(),
            shape: ArrayShape::new(),
            strides: ArrayShape::new(),
            shape_known: false,
        }
    }

    /// Create an array from a shape and a row-major data buffer.
    ///
    /// # Errors
    /// `Construction` if any span is zero; `ShapeMismatch` if the buffer
    /// length differs from the product of the spans.
    pub fn from_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let len = validated_length(shape)?;
        if data.len() != len {
            return Err(Error::ShapeMismatch(format!(
                "data length {} is incompatible with shape {:?} (length {len})",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            data: SmallVec::from_vec(data),
            shape: ArrayShape::from_slice(shape),
            strides: compute_strides(shape),
            shape_known: true,
        })
    }

    /// Create an array whose elements are generated from their multi-index.
    pub fn from_fn<F>(shape: &[usize], mut f: F) -> Result<Self>
    where
        F: FnMut(&[usize]) -> T,
    {
        let len = validated_length(shape)?;
        let mut data = SmallVec::with_capacity(len);
        let mut index = ArrayShape::from_elem(0, shape.len());
        for _ in 0..len {
            data.push(f(&index));
            next_index(&mut index, shape);
        }
        Ok(Self {
            data,
            shape: ArrayShape::from_slice(shape),
            strides: compute_strides(shape),
            shape_known: true,
        })
    }

    /// Rank-0 array holding a single value.
    pub fn scalar(value: T) -> Self {
        let mut data = SmallVec::new();
        data.push(value);
        Self {
            data,
            shape: ArrayShape::new(),
            strides: ArrayShape::new(),
            shape_known: true,
        }
    }

    /// Return the array to the unshaped state, dropping its contents.
    pub fn uninitialize(&mut self) {
        *self = Self::uninitialized();
    }

    /// `true` once the array has a shape.
    pub fn is_shape_known(&self) -> bool {
        self.shape_known
    }

    pub(crate) fn check_shaped(&self) -> Result<()> {
        if self.shape_known {
            Ok(())
        } else {
            Err(Error::UninitializedArray)
        }
    }
}

impl<T: Clone> NdArray<T> {
    /// Create an array of the given shape with every element set to `value`.
    pub fn filled(shape: &[usize], value: T) -> Result<Self> {
        let len = validated_length(shape)?;
        Ok(Self {
            data: SmallVec::from_elem(value, len),
            shape: ArrayShape::from_slice(shape),
            strides: compute_strides(shape),
            shape_known: true,
        })
    }

    /// Set every element to `value`.
    pub fn const_fill(&mut self, value: T) -> Result<&mut Self> {
        self.check_shaped()?;
        for v in self.data.iter_mut() {
            *v = value.clone();
        }
        Ok(self)
    }

    /// Assign from another array.
    ///
    /// An unshaped receiver takes the shape of `other`; a shaped receiver
    /// must have the same shape. Assigning from an unshaped array is not
    /// allowed unless the receiver is unshaped too.
    pub fn assign(&mut self, other: &NdArray<T>) -> Result<&mut Self> {
        if !self.shape_known {
            *self = other.clone();
            return Ok(self);
        }
        other.check_shaped()?;
        self.ensure_same_shape(other)?;
        self.data.clone_from_slice(&other.data);
        Ok(self)
    }
}

impl<T: Default + Clone> NdArray<T> {
    /// Create an array of the given shape filled with `T::default()`.
    pub fn new(shape: &[usize]) -> Result<Self> {
        Self::filled(shape, T::default())
    }

    /// Give the array a new shape.
    ///
    /// Contents are kept when the total length does not change, and reset
    /// to `T::default()` otherwise.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<&mut Self> {
        let len = validated_length(shape)?;
        if !self.shape_known || self.data.len() != len {
            self.data = SmallVec::from_elem(T::default(), len);
        }
        self.shape = ArrayShape::from_slice(shape);
        self.strides = compute_strides(shape);
        self.shape_known = true;
        Ok(self)
    }

    /// Reset every element to `T::default()`.
    pub fn clear(&mut self) -> Result<&mut Self> {
        self.const_fill(T::default())
    }
}

// ── Shape inspection ──────────────────────────────────────────────────────────

impl<T> NdArray<T> {
    /// Array shape (empty for rank-0 and for unshaped arrays).
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major strides.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Span of dimension `dim`.
    pub fn span(&self, dim: usize) -> Result<usize> {
        self.check_shaped()?;
        self.shape
            .get(dim)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index: dim,
                size: self.shape.len(),
            })
    }

    /// Total number of elements (0 for an unshaped array).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the array holds no elements (only when unshaped).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The elements in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the elements in row-major order.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the array and return its elements in row-major order.
    pub fn into_vec(self) -> Vec<T> {
        self.data.into_vec()
    }

    /// Iterator over the elements in row-major order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// `true` if `shape` matches this array's shape.
    pub fn is_compatible(&self, shape: &[usize]) -> bool {
        self.shape_known && self.shape.as_slice() == shape
    }

    /// `true` if both arrays are shaped and have identical shapes.
    pub fn is_shape_compatible<U>(&self, other: &NdArray<U>) -> bool {
        self.shape_known && other.shape_known && self.shape == other.shape
    }

    pub(crate) fn ensure_same_shape<U>(&self, other: &NdArray<U>) -> Result<()> {
        self.check_shaped()?;
        other.check_shaped()?;
        if self.shape != other.shape {
            return Err(Error::ShapeMismatch(format!(
                "{:?} vs {:?}",
                self.shape.as_slice(),
                other.shape.as_slice()
            )));
        }
        Ok(())
    }
}

// ── Indexing ──────────────────────────────────────────────────────────────────

impl<T> NdArray<T> {
    /// Linear (row-major) position of a multi-index, with range checks.
    pub fn linear_index(&self, index: &[usize]) -> Result<usize> {
        self.check_shaped()?;
        if index.len() != self.shape.len() {
            return Err(Error::ShapeMismatch(format!(
                "index of length {} used with an array of rank {}",
                index.len(),
                self.shape.len()
            )));
        }
        let mut l = 0;
        for ((&i, &n), &s) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= n {
                return Err(Error::IndexOutOfRange { index: i, size: n });
            }
            l += i * s;
        }
        Ok(l)
    }

    /// Write the multi-index corresponding to linear position `l` into
    /// `index` (whose length must equal the rank).
    pub fn convert_linear_index(&self, l: usize, index: &mut [usize]) -> Result<()> {
        self.check_shaped()?;
        if index.len() != self.shape.len() {
            return Err(Error::ShapeMismatch(format!(
                "index buffer of length {} used with an array of rank {}",
                index.len(),
                self.shape.len()
            )));
        }
        if l >= self.data.len() {
            return Err(Error::IndexOutOfRange {
                index: l,
                size: self.data.len(),
            });
        }
        let mut rem = l;
        for (slot, &s) in index.iter_mut().zip(&self.strides) {
            *slot = rem / s;
            rem -= *slot * s;
        }
        Ok(())
    }

    /// Multi-index corresponding to linear position `l`.
    pub fn multi_index(&self, l: usize) -> Result<ArrayShape> {
        let mut index = ArrayShape::from_elem(0, self.shape.len());
        self.convert_linear_index(l, &mut index)?;
        Ok(index)
    }

    /// Unchecked element access by multi-index.
    ///
    /// Per-axis ranges are only verified in debug builds. An index whose
    /// component exceeds its span but whose linear position stays inside the
    /// buffer silently addresses a different element; use
    /// [`value_at`](Self::value_at) when the index is not known to be valid.
    #[inline]
    pub fn value(&self, index: &[usize]) -> &T {
        &self.data[self.unchecked_offset(index)]
    }

    /// Unchecked mutable element access by multi-index (see [`value`](Self::value)).
    #[inline]
    pub fn value_mut(&mut self, index: &[usize]) -> &mut T {
        let l = self.unchecked_offset(index);
        &mut self.data[l]
    }

    /// Checked element access by multi-index.
    pub fn value_at(&self, index: &[usize]) -> Result<&T> {
        let l = self.linear_index(index)?;
        Ok(&self.data[l])
    }

    /// Checked mutable element access by multi-index.
    pub fn value_at_mut(&mut self, index: &[usize]) -> Result<&mut T> {
        let l = self.linear_index(index)?;
        Ok(&mut self.data[l])
    }

    /// Unchecked element access by linear position.
    #[inline]
    pub fn linear_value(&self, l: usize) -> &T {
        &self.data[l]
    }

    /// Unchecked mutable element access by linear position.
    #[inline]
    pub fn linear_value_mut(&mut self, l: usize) -> &mut T {
        &mut self.data[l]
    }

    /// Checked element access by linear position.
    pub fn linear_value_at(&self, l: usize) -> Result<&T> {
        self.check_shaped()?;
        let size = self.data.len();
        self.data
            .get(l)
            .ok_or(Error::IndexOutOfRange { index: l, size })
    }

    /// Checked mutable element access by linear position.
    pub fn linear_value_at_mut(&mut self, l: usize) -> Result<&mut T> {
        self.check_shaped()?;
        let size = self.data.len();
        self.data
            .get_mut(l)
            .ok_or(Error::IndexOutOfRange { index: l, size })
    }

    #[inline]
    fn unchecked_offset(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.shape.len());
        debug_assert!(index.iter().zip(&self.shape).all(|(&i, &n)| i < n));
        index.iter().zip(&self.strides).map(|(&i, &s)| i * s).sum()
    }
}

// ── Element-wise transforms and extrema ──────────────────────────────────────

impl<T> NdArray<T> {
    /// Build a new array of the same shape by applying `f` to every element.
    pub fn map<U, F>(&self, f: F) -> Result<NdArray<U>>
    where
        F: FnMut(&T) -> U,
    {
        self.check_shaped()?;
        Ok(NdArray {
            data: self.data.iter().map(f).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            shape_known: true,
        })
    }

    /// Replace every element by `f(element)`.
    pub fn apply<F>(&mut self, mut f: F) -> Result<&mut Self>
    where
        F: FnMut(&T) -> T,
    {
        self.check_shaped()?;
        for v in self.data.iter_mut() {
            *v = f(v);
        }
        Ok(self)
    }
}

impl<T: Copy + PartialOrd> NdArray<T> {
    /// Smallest element and its multi-index (first occurrence).
    pub fn min_with_index(&self) -> Result<(T, ArrayShape)> {
        let l = self.extremum_position(|a, b| a < b)?;
        Ok((self.data[l], self.multi_index(l)?))
    }

    /// Largest element and its multi-index (first occurrence).
    pub fn max_with_index(&self) -> Result<(T, ArrayShape)> {
        let l = self.extremum_position(|a, b| a > b)?;
        Ok((self.data[l], self.multi_index(l)?))
    }

    /// Smallest element.
    pub fn min(&self) -> Result<T> {
        Ok(self.data[self.extremum_position(|a, b| a < b)?])
    }

    /// Largest element.
    pub fn max(&self) -> Result<T> {
        Ok(self.data[self.extremum_position(|a, b| a > b)?])
    }

    fn extremum_position<F: Fn(&T, &T) -> bool>(&self, better: F) -> Result<usize> {
        self.check_shaped()?;
        let mut best = 0;
        for (i, v) in self.data.iter().enumerate().skip(1) {
            if better(v, &self.data[best]) {
                best = i;
            }
        }
        Ok(best)
    }
}

impl<T: Copy + ToPrimitive> NdArray<T> {
    /// Largest absolute element-wise difference with another array.
    pub fn max_abs_difference(&self, other: &NdArray<T>) -> Result<f64> {
        self.ensure_same_shape(other)?;
        let mut dmax = 0.0_f64;
        for (&a, &b) in self.data.iter().zip(&other.data) {
            let d = (to_f64(a)? - to_f64(b)?).abs();
            if d > dmax {
                dmax = d;
            }
        }
        Ok(dmax)
    }

    /// Equivalent to `max_abs_difference(other) <= eps`.
    pub fn is_close(&self, other: &NdArray<T>, eps: f64) -> Result<bool> {
        Ok(self.max_abs_difference(other)? <= eps)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Validate a shape and return its total length.
pub(crate) fn validated_length(shape: &[usize]) -> Result<usize> {
    let mut len = 1usize;
    for (i, &n) in shape.iter().enumerate() {
        if n == 0 {
            return Err(Error::Construction(format!(
                "span of dimension {i} must be positive in shape {shape:?}"
            )));
        }
        len = len.checked_mul(n).ok_or_else(|| {
            Error::Construction(format!("array of shape {shape:?} is too large"))
        })?;
    }
    Ok(len)
}

/// Row-major strides for `shape`.
pub(crate) fn compute_strides(shape: &[usize]) -> ArrayShape {
    let mut strides = ArrayShape::from_elem(1, shape.len());
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Advance a row-major multi-index by one position.
///
/// Returns `false` (with `index` wrapped back to all zeros) once every
/// position has been visited.
pub(crate) fn next_index(index: &mut [usize], shape: &[usize]) -> bool {
    for d in (0..index.len()).rev() {
        index[d] += 1;
        if index[d] < shape[d] {
            return true;
        }
        index[d] = 0;
    }
    false
}

pub(crate) fn cast<U: NumCast, V: ToPrimitive + Copy>(v: V) -> Result<U> {
    U::from(v).ok_or_else(|| Error::NumericDomain("numeric conversion out of range".into()))
}

fn to_f64<V: ToPrimitive + Copy>(v: V) -> Result<f64> {
    v.to_f64()
        .ok_or_else(|| Error::NumericDomain("value is not representable as f64".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: &[usize]) -> NdArray<f64> {
        let mut k = 0.0;
        NdArray::from_fn(shape, |_| {
            k += 1.0;
            k - 1.0
        })
        .unwrap()
    }

    #[test]
    fn strides_are_row_major() {
        let a = NdArray::<f64>::new(&[2, 3, 4]).unwrap();
        assert_eq!(a.strides(), &[12, 4, 1]);
        assert_eq!(a.len(), 24);
        assert_eq!(a.rank(), 3);
    }

    #[test]
    fn zero_span_is_rejected() {
        let err = NdArray::<f64>::new(&[3, 0]).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn from_vec_checks_length() {
        let err = NdArray::from_vec(&[2, 2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn checked_access_out_of_range() {
        let a = iota(&[5]);
        assert_eq!(
            a.value_at(&[5]).unwrap_err(),
            Error::IndexOutOfRange { index: 5, size: 5 }
        );
        assert_eq!(
            a.linear_value_at(5).unwrap_err(),
            Error::IndexOutOfRange { index: 5, size: 5 }
        );
        assert_eq!(*a.value_at(&[4]).unwrap(), 4.0);
    }

    #[test]
    fn unshaped_array_rejects_access() {
        let a = NdArray::<f64>::uninitialized();
        assert!(!a.is_shape_known());
        assert_eq!(a.value_at(&[]).unwrap_err(), Error::UninitializedArray);
        assert_eq!(a.linear_value_at(0).unwrap_err(), Error::UninitializedArray);
        assert!(a.map(|x| *x).is_err());
    }

    #[test]
    fn reshape_and_assign_from_shaped() {
        let mut a = NdArray::<f64>::default();
        a.reshape(&[2, 2]).unwrap();
        assert_eq!(a.shape(), &[2, 2]);

        let b = iota(&[2, 3]);
        let mut c = NdArray::<f64>::uninitialized();
        c.assign(&b).unwrap();
        assert_eq!(c, b);
        assert!(a.assign(&b).is_err());
    }

    #[test]
    fn scalar_array() {
        let s = NdArray::scalar(3.5);
        assert_eq!(s.rank(), 0);
        assert_eq!(s.len(), 1);
        assert_eq!(*s.value_at(&[]).unwrap(), 3.5);
    }

    #[test]
    fn linear_index_round_trip() {
        let a = iota(&[3, 4, 5]);
        for l in 0..a.len() {
            let idx = a.multi_index(l).unwrap();
            assert_eq!(a.linear_index(&idx).unwrap(), l);
            assert_eq!(*a.value(&idx), l as f64);
        }
    }

    #[test]
    fn min_max_with_index() {
        let a = NdArray::from_vec(&[2, 2], vec![3.0, -1.0, 7.0, 2.0]).unwrap();
        let (vmin, imin) = a.min_with_index().unwrap();
        let (vmax, imax) = a.max_with_index().unwrap();
        assert_eq!(vmin, -1.0);
        assert_eq!(imin.as_slice(), &[0, 1]);
        assert_eq!(vmax, 7.0);
        assert_eq!(imax.as_slice(), &[1, 0]);
    }

    #[test]
    fn large_arrays_spill_to_heap() {
        let a = NdArray::filled(&[50, 40], 1.0).unwrap();
        assert_eq!(a.len(), 2000);
        assert!(a.data().iter().all(|&x| x == 1.0));
    }

    #[test]
    fn max_abs_difference_and_is_close() {
        let a = iota(&[2, 3]);
        let mut b = a.clone();
        *b.value_mut(&[1, 2]) += 0.25;
        assert_eq!(a.max_abs_difference(&b).unwrap(), 0.25);
        assert!(a.is_close(&b, 0.3).unwrap());
        assert!(!a.is_close(&b, 0.2).unwrap());
    }
}
