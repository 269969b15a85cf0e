//! Non-uniform 1-D coordinate grids.
//!
//! An [`AxisLookup`] maps a coordinate to the grid cell that contains it
//! together with the linear-interpolation weight of the cell's lower
//! breakpoint.

use dg_core::{
    ensure_construct, ensure_domain,
    errors::{Error, Result},
    Real,
};
use serde::{Deserialize, Serialize};

/// Serialized form of an [`AxisLookup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Strictly increasing breakpoints.
    pub breakpoints: Vec<Real>,
    /// Optional axis label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Compute weights on `ln x` instead of `x`.
    #[serde(default)]
    pub log_space: bool,
}

/// A strictly increasing sequence of at least two breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisSpec", into = "AxisSpec")]
pub struct AxisLookup {
    breakpoints: Vec<Real>,
    // Breakpoints in the space where weights are computed.
    coords: Vec<Real>,
    label: Option<String>,
    log_space: bool,
}

impl AxisLookup {
    /// Create an axis from strictly increasing finite breakpoints.
    pub fn new(breakpoints: Vec<Real>) -> Result<Self> {
        Self::build(breakpoints, None, false)
    }

    /// Create a labelled axis.
    pub fn with_label(breakpoints: Vec<Real>, label: impl Into<String>) -> Result<Self> {
        Self::build(breakpoints, Some(label.into()), false)
    }

    /// Create an axis whose weights are linear in `ln x`. All breakpoints
    /// must be positive.
    pub fn log_spaced(breakpoints: Vec<Real>) -> Result<Self> {
        Self::build(breakpoints, None, true)
    }

    fn build(breakpoints: Vec<Real>, label: Option<String>, log_space: bool) -> Result<Self> {
        ensure_construct!(
            breakpoints.len() >= 2,
            "an axis needs at least 2 breakpoints, got {}",
            breakpoints.len()
        );
        ensure_construct!(
            breakpoints.iter().all(|b| b.is_finite()),
            "axis breakpoints must be finite"
        );
        ensure_construct!(
            breakpoints.windows(2).all(|w| w[0] < w[1]),
            "axis breakpoints must be strictly increasing"
        );
        let coords = if log_space {
            ensure_construct!(
                breakpoints[0] > 0.0,
                "log-spaced axis breakpoints must be positive"
            );
            breakpoints.iter().map(|b| b.ln()).collect()
        } else {
            breakpoints.clone()
        };
        Ok(Self {
            breakpoints,
            coords,
            label,
            log_space,
        })
    }

    /// Attach or replace the label.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Breakpoints in the original coordinate.
    pub fn breakpoints(&self) -> &[Real] {
        &self.breakpoints
    }

    /// Breakpoint `i`.
    pub fn coordinate(&self, i: usize) -> Result<Real> {
        let size = self.breakpoints.len();
        self.breakpoints
            .get(i)
            .copied()
            .ok_or(Error::IndexOutOfRange { index: i, size })
    }

    /// Number of breakpoints.
    pub fn n_coords(&self) -> usize {
        self.breakpoints.len()
    }

    /// Number of cells (`n_coords - 1`).
    pub fn n_intervals(&self) -> usize {
        self.breakpoints.len() - 1
    }

    /// First breakpoint.
    pub fn min(&self) -> Real {
        self.breakpoints[0]
    }

    /// Last breakpoint.
    pub fn max(&self) -> Real {
        self.breakpoints[self.breakpoints.len() - 1]
    }

    /// Axis label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// `true` if weights are computed on `ln x`.
    pub fn uses_log_space(&self) -> bool {
        self.log_space
    }

    /// `true` if `min <= x <= max`.
    pub fn is_within(&self, x: Real) -> bool {
        x >= self.min() && x <= self.max()
    }

    /// Cell containing `x` and the weight of its lower breakpoint.
    ///
    /// The weight is 1 at the lower breakpoint and 0 at the upper one.
    /// Coordinates outside the axis clamp to the edge cell: below the first
    /// breakpoint the result is `(0, 1)` and above the last one it is
    /// `(n - 2, 0)`.
    pub fn get_interval(&self, x: Real) -> Result<(usize, Real)> {
        let t = self.transform(x)?;
        let c = &self.coords;
        let n = c.len();
        if t <= c[0] {
            if t < c[0] {
                log::trace!("axis coordinate {x} clamped to the lower edge");
            }
            return Ok((0, 1.0));
        }
        if t >= c[n - 1] {
            if t > c[n - 1] {
                log::trace!("axis coordinate {x} clamped to the upper edge");
            }
            return Ok((n - 2, 0.0));
        }
        let i = locate(c, t);
        Ok((i, 1.0 - (t - c[i]) / (c[i + 1] - c[i])))
    }

    /// Like [`get_interval`](Self::get_interval) inside the axis, but the
    /// edge cell's weight is extrapolated linearly outside it (so the weight
    /// exceeds 1 below the first breakpoint and is negative above the last).
    pub fn linear_interval(&self, x: Real) -> Result<(usize, Real)> {
        let t = self.transform(x)?;
        let c = &self.coords;
        let n = c.len();
        let i = if t <= c[0] {
            0
        } else if t >= c[n - 1] {
            n - 2
        } else {
            locate(c, t)
        };
        Ok((i, 1.0 - (t - c[i]) / (c[i + 1] - c[i])))
    }

    fn transform(&self, x: Real) -> Result<Real> {
        ensure_domain!(!x.is_nan(), "axis coordinate is NaN");
        if self.log_space {
            ensure_domain!(
                x > 0.0,
                "log-spaced axis requires a positive coordinate, got {x}"
            );
            Ok(x.ln())
        } else {
            Ok(x)
        }
    }
}

/// Index `i` such that `xs[i] <= x < xs[i + 1]`, for `xs[0] < x < xs[n-1]`.
#[inline]
fn locate(xs: &[Real], x: Real) -> usize {
    let pos = xs.partition_point(|&b| b <= x);
    pos.saturating_sub(1).min(xs.len() - 2)
}

impl TryFrom<AxisSpec> for AxisLookup {
    type Error = Error;

    fn try_from(spec: AxisSpec) -> Result<Self> {
        Self::build(spec.breakpoints, spec.label, spec.log_space)
    }
}

impl From<AxisLookup> for AxisSpec {
    fn from(axis: AxisLookup) -> Self {
        AxisSpec {
            breakpoints: axis.breakpoints,
            label: axis.label,
            log_space: axis.log_space,
        }
    }
}
