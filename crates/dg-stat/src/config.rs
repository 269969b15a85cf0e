//! Construction-time configuration of a grid.

use crate::interpolation::StrategyKind;
use dg_core::errors::{Error, Result};
use dg_math::AxisLookup;
use serde::{Deserialize, Serialize};

/// Everything needed to build an empty
/// [`GridInterpolatedDistribution`](crate::grid::GridInterpolatedDistribution).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Grid axes, one per parameter.
    pub axes: Vec<AxisLookup>,
    /// Dimensionality of the distributions at the grid points.
    pub distribution_dim: usize,
    /// Interpolation method.
    pub strategy: StrategyKind,
    /// Use the nearest grid point instead of interpolating.
    #[serde(default)]
    pub single_cell: bool,
}

impl GridConfig {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::Construction(format!("invalid grid configuration: {e}")))
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Runtime(format!("cannot serialize grid configuration: {e}")))
    }
}
