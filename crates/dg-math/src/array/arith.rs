//! Element-wise arithmetic.
//!
//! Array–array operations require identical shapes and are fallible.
//! Array–scalar operations go through the standard operator traits, which
//! only `debug_assert!` that the array is shaped; the `try_*_scalar`
//! methods report [`Error::UninitializedArray`](dg_core::errors::Error)
//! instead.

use super::NdArray;
use dg_core::errors::Result;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

macro_rules! array_binop {
    ($assign:ident, $try_op:ident, $bound:ident, $op:tt, $doc:literal) => {
        impl<T: Copy + $bound> NdArray<T> {
            #[doc = concat!("In-place element-wise ", $doc, " by another array of the same shape.")]
            pub fn $assign(&mut self, other: &NdArray<T>) -> Result<&mut Self> {
                self.ensure_same_shape(other)?;
                for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
                    *a $op b;
                }
                Ok(self)
            }

            #[doc = concat!("Element-wise ", $doc, " returning a new array.")]
            pub fn $try_op(&self, other: &NdArray<T>) -> Result<NdArray<T>> {
                let mut out = self.clone();
                out.$assign(other)?;
                Ok(out)
            }
        }
    };
}

array_binop!(add_assign_array, try_add, AddAssign, +=, "addition");
array_binop!(sub_assign_array, try_sub, SubAssign, -=, "subtraction");
array_binop!(mul_assign_array, try_mul, MulAssign, *=, "multiplication");
array_binop!(div_assign_array, try_div, DivAssign, /=, "division");

macro_rules! scalar_assign {
    ($trait:ident, $method:ident, $try_method:ident, $op:tt, $doc:literal) => {
        impl<T: Copy + $trait> $trait<T> for NdArray<T> {
            fn $method(&mut self, rhs: T) {
                debug_assert!(self.shape_known, "scalar {} on an unshaped array", $doc);
                for a in self.data.iter_mut() {
                    *a $op rhs;
                }
            }
        }

        impl<T: Copy + $trait> NdArray<T> {
            #[doc = concat!("In-place scalar ", $doc, "; fails on an unshaped array.")]
            pub fn $try_method(&mut self, rhs: T) -> Result<&mut Self> {
                self.check_shaped()?;
                for a in self.data.iter_mut() {
                    *a $op rhs;
                }
                Ok(self)
            }
        }
    };
}

scalar_assign!(AddAssign, add_assign, try_add_scalar, +=, "addition");
scalar_assign!(SubAssign, sub_assign, try_sub_scalar, -=, "subtraction");
scalar_assign!(MulAssign, mul_assign, try_mul_scalar, *=, "multiplication");
scalar_assign!(DivAssign, div_assign, try_div_scalar, /=, "division");

macro_rules! scalar_binop {
    ($trait:ident, $method:ident, $op:tt) => {
        impl<T: Copy + $trait<Output = T>> $trait<T> for &NdArray<T> {
            type Output = NdArray<T>;

            fn $method(self, rhs: T) -> NdArray<T> {
                debug_assert!(self.shape_known, "scalar operation on an unshaped array");
                let mut out = self.clone();
                for a in out.data.iter_mut() {
                    *a = *a $op rhs;
                }
                out
            }
        }

        impl<T: Copy + $trait<Output = T>> $trait<T> for NdArray<T> {
            type Output = NdArray<T>;

            fn $method(mut self, rhs: T) -> NdArray<T> {
                debug_assert!(self.shape_known, "scalar operation on an unshaped array");
                for a in self.data.iter_mut() {
                    *a = *a $op rhs;
                }
                self
            }
        }
    };
}

scalar_binop!(Add, add, +);
scalar_binop!(Sub, sub, -);
scalar_binop!(Mul, mul, *);
scalar_binop!(Div, div, /);

impl<T: Copy + Neg<Output = T>> Neg for &NdArray<T> {
    type Output = NdArray<T>;

    fn neg(self) -> NdArray<T> {
        let mut out = self.clone();
        for a in out.data.iter_mut() {
            *a = -*a;
        }
        out
    }
}

impl<T: Copy + Neg<Output = T>> Neg for NdArray<T> {
    type Output = NdArray<T>;

    fn neg(mut self) -> NdArray<T> {
        for a in self.data.iter_mut() {
            *a = -*a;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_core::errors::Error;

    fn arr(v: Vec<f64>) -> NdArray<f64> {
        NdArray::from_vec(&[2, 2], v).unwrap()
    }

    #[test]
    fn array_array_ops() {
        let a = arr(vec![1.0, 2.0, 3.0, 4.0]);
        let b = arr(vec![4.0, 3.0, 2.0, 1.0]);
        assert_eq!(a.try_add(&b).unwrap().data(), &[5.0; 4]);
        assert_eq!(a.try_sub(&b).unwrap().data(), &[-3.0, -1.0, 1.0, 3.0]);
        assert_eq!(a.try_mul(&b).unwrap().data(), &[4.0, 6.0, 6.0, 4.0]);
        assert_eq!(a.try_div(&b).unwrap().data(), &[0.25, 2.0 / 3.0, 1.5, 4.0]);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut a = arr(vec![1.0; 4]);
        let b = NdArray::from_vec(&[4], vec![1.0; 4]).unwrap();
        assert!(matches!(a.add_assign_array(&b), Err(Error::ShapeMismatch(_))));
        let u = NdArray::<f64>::uninitialized();
        assert_eq!(a.try_mul(&u).unwrap_err(), Error::UninitializedArray);
    }

    #[test]
    fn scalar_ops() {
        let mut a = arr(vec![1.0, 2.0, 3.0, 4.0]);
        a *= 2.0;
        a += 1.0;
        assert_eq!(a.data(), &[3.0, 5.0, 7.0, 9.0]);
        let b = &a / 2.0;
        assert_eq!(b.data(), &[1.5, 2.5, 3.5, 4.5]);
        let c = -(b - 0.5);
        assert_eq!(c.data(), &[-1.0, -2.0, -3.0, -4.0]);
    }

    #[test]
    fn checked_scalar_ops() {
        let mut a = arr(vec![1.0, 2.0, 3.0, 4.0]);
        a.try_sub_scalar(1.0).unwrap().try_div_scalar(2.0).unwrap();
        assert_eq!(a.data(), &[0.0, 0.5, 1.0, 1.5]);

        let mut u = NdArray::<f64>::uninitialized();
        assert_eq!(u.try_add_scalar(1.0).unwrap_err(), Error::UninitializedArray);
        assert_eq!(u.try_mul_scalar(2.0).unwrap_err(), Error::UninitializedArray);
    }
}
