//! # dg-stat
//!
//! Distribution nodes, interpolation strategies, and the
//! [`GridInterpolatedDistribution`] orchestrator.
//!
//! A grid stores one multivariate distribution per grid point. Selecting a
//! point in parameter space yields either the nearest stored distribution
//! or an interpolation between the `2^N` corners of the enclosing cell, by
//! averaging conditional quantile functions
//! ([`StrategyKind::ConditionalQuantile`]) or by interpolating marginals and
//! copulas separately ([`StrategyKind::Copula`]).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Keyed persistence of nodes and grids.
pub mod archive;

/// Construction-time grid configuration.
pub mod config;

/// Copulas on the unit cube.
pub mod copulas;

/// Distribution capability traits.
pub mod distribution;

/// Univariate distributions.
pub mod distributions1d;

/// The grid orchestrator.
pub mod grid;

/// Interpolation strategies.
pub mod interpolation;

/// Quantile-averaged univariate interpolation.
pub mod marginal;

/// Product and copula-composite multivariate distributions.
pub mod multivariate;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use archive::{
    read_grid, write_grid, Archive, CopulaSpec, MarginalSpec, MemoryArchive, NodeRegistry,
    NodeSpec, Record,
};
pub use config::GridConfig;
pub use copulas::{FgmCopula, GaussianCopula, IndependenceCopula};
pub use distribution::{sample, Decomposition, Distribution1D, DistributionNode};
pub use distributions1d::{Beta1D, Gauss1D, Tabulated1D, Uniform1D};
pub use grid::GridInterpolatedDistribution;
pub use interpolation::{InterpolationStrategy, StrategyKind};
pub use marginal::InterpolatedDistribution1D;
pub use multivariate::{CompositeDistribution, ProductDistribution};
