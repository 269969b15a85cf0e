//! Error types for densgrid.
//!
//! Every fallible operation in the workspace reports one of the variants
//! below. The variants follow four broad classes: construction errors
//! (malformed input at build time), precondition violations (calls made in
//! the wrong state or with incompatible arguments), numeric domain errors
//! (legitimately pathological input that a caller may choose to skip), and
//! checked-access errors on arrays.
//!
//! The `ensure!`, `ensure_construct!`, `ensure_domain!`, and `fail!` macros
//! are shorthands for early returns with the matching variant.

use thiserror::Error;

/// The top-level error type used throughout densgrid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Malformed shape, non-increasing breakpoints, bad dimensionality,
    /// and similar problems detected while building an object.
    #[error("construction error: {0}")]
    Construction(String),

    /// An operation was called in a state or with arguments it does not
    /// support (query before setup, empty grid cell, wrong point length).
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Non-positive weight total, negative weights, failed root bracketing,
    /// and other numerically ill-posed input.
    #[error("numeric domain error: {0}")]
    NumericDomain(String),

    /// Index out of range on a checked accessor.
    #[error("index ({index}) out of range [0, {size})")]
    IndexOutOfRange {
        /// The index that was out of range.
        index: usize,
        /// The size of the container (or span of the axis).
        size: usize,
    },

    /// Two arrays (or an array and an index) have incompatible shapes.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An operation other than reshape/assignment was attempted on an
    /// array whose shape has not been set.
    #[error("array shape is not initialized")]
    UninitializedArray,

    /// Failure at the persistence boundary (missing or duplicate key,
    /// unknown type tag, malformed payload, unsupported version).
    #[error("archive error: {0}")]
    Archive(String),

    /// General runtime failure.
    #[error("{0}")]
    Runtime(String),
}

impl Error {
    /// Return `true` for errors a numerical loop may reasonably skip over.
    pub fn is_numeric_domain(&self) -> bool {
        matches!(self, Error::NumericDomain(_))
    }
}

/// Shorthand `Result` type used throughout densgrid.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Return `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use dg_core::{ensure, errors::Error};
/// fn positive(x: f64) -> dg_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(matches!(positive(-1.0), Err(Error::Precondition(_))));
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Return `Err(Error::Construction(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use dg_core::{ensure_construct, errors::Error};
/// fn spans(n: usize) -> dg_core::errors::Result<usize> {
///     ensure_construct!(n > 0, "span must be positive");
///     Ok(n)
/// }
/// assert!(matches!(spans(0), Err(Error::Construction(_))));
/// ```
#[macro_export]
macro_rules! ensure_construct {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Construction(
                format!($($msg)*)
            ));
        }
    };
}

/// Return `Err(Error::NumericDomain(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use dg_core::{ensure_domain, errors::Error};
/// fn total(w: &[f64]) -> dg_core::errors::Result<f64> {
///     let s: f64 = w.iter().sum();
///     ensure_domain!(s > 0.0, "sum of weights is not positive");
///     Ok(s)
/// }
/// assert!(total(&[0.5, 0.5]).is_ok());
/// assert!(total(&[0.0]).unwrap_err().is_numeric_domain());
/// ```
#[macro_export]
macro_rules! ensure_domain {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::NumericDomain(
                format!($($msg)*)
            ));
        }
    };
}

/// Return `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use dg_core::{fail, errors::Error};
/// fn always_err() -> dg_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = Error::IndexOutOfRange { index: 5, size: 5 };
        assert_eq!(e.to_string(), "index (5) out of range [0, 5)");
        assert_eq!(
            Error::UninitializedArray.to_string(),
            "array shape is not initialized"
        );
    }

    #[test]
    fn numeric_domain_classification() {
        assert!(Error::NumericDomain("x".into()).is_numeric_domain());
        assert!(!Error::Precondition("x".into()).is_numeric_domain());
    }
}
