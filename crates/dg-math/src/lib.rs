//! # dg-math
//!
//! Numerical building blocks: the rank-generic [`NdArray`], axis-aligned
//! [`BoundingBox`]es, non-uniform [`AxisLookup`] grids, monotone inversion, and
//! Gauss–Legendre quadrature.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Dense multidimensional arrays.
pub mod array;

/// Non-uniform 1-D coordinate grids.
pub mod axis;

/// Axis-aligned hyperrectangles.
pub mod bounding_box;

/// Numerical integration.
pub mod integrals;

/// Monotone 1D root finding.
pub mod solvers1d;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::{ArrayProjector, ArrayShape, NdArray, SumProjector};
pub use axis::{AxisLookup, AxisSpec};
pub use bounding_box::{BoundingBox, Interval};
pub use integrals::{integrate_box, GaussLegendre};
