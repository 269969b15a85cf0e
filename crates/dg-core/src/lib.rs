//! # dg-core
//!
//! Core types and error definitions for densgrid.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace: type aliases and the error hierarchy with
//! its `ensure!`-family macros.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure!` / `ensure_construct!` / `ensure_domain!` /
/// `fail!` macros.
pub mod errors;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// Largest supported number of grid axes (and array rank for the
/// multilinear interpolation routines which enumerate 2^rank corners).
pub const MAX_INTERPOLATION_RANK: usize = 16;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
