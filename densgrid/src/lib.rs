//! # densgrid
//!
//! Rank-generic dense arrays and multivariate distributions interpolated
//! over a rectangular parameter grid.
//!
//! This crate is a **façade** that re-exports all public items from the
//! underlying workspace crates. Application code should depend on this
//! crate rather than the individual `dg-*` crates.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! densgrid = "0.1"
//! ```
//!
//! ```rust
//! use densgrid::math::AxisLookup;
//! use densgrid::stat::{
//!     DistributionNode, GridInterpolatedDistribution, ProductDistribution, StrategyKind,
//!     Uniform1D,
//! };
//!
//! fn uniform(lo: f64, hi: f64) -> Box<dyn DistributionNode> {
//!     let marginal: Box<dyn densgrid::stat::Distribution1D> =
//!         Box::new(Uniform1D::new(lo, hi).unwrap());
//!     Box::new(ProductDistribution::new(vec![marginal]).unwrap())
//! }
//!
//! let axis = AxisLookup::new(vec![0.0, 1.0]).unwrap();
//! let mut grid =
//!     GridInterpolatedDistribution::new(vec![axis], 1, StrategyKind::ConditionalQuantile, false)
//!         .unwrap();
//! grid.set_grid_distro(&[0], uniform(0.0, 1.0)).unwrap();
//! grid.set_grid_distro(&[1], uniform(10.0, 11.0)).unwrap();
//!
//! grid.set_grid_coords(&[0.5]).unwrap();
//! let mut x = [0.0];
//! grid.unit_map(&[0.5], &mut x).unwrap();
//! assert!((x[0] - 5.5).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use dg_core as core;

/// Arrays, bounding boxes, axes, solvers, and quadrature.
pub use dg_math as math;

/// Distributions, interpolation strategies, grids, and archives.
pub use dg_stat as stat;
