//! Distributions interpolated over a rectangular parameter grid.
//!
//! Every grid point holds a [`DistributionNode`]. Before querying, the
//! caller selects a point in parameter space with
//! [`GridInterpolatedDistribution::set_grid_coords`]; the distribution at
//! that point is then either the node of the nearest grid point
//! (single-cell mode) or a multilinear blend of the `2^N` corner nodes of
//! the enclosing cell, produced by the configured
//! [`InterpolationStrategy`].

use crate::config::GridConfig;
use crate::distribution::{Decomposition, Distribution1D, DistributionNode};
use crate::interpolation::{InterpolationStrategy, StrategyKind};
use dg_core::{
    ensure, ensure_construct,
    errors::{Error, Result},
    Real, MAX_INTERPOLATION_RANK,
};
use dg_math::{AxisLookup, NdArray};
use rand::Rng;
use std::sync::Arc;

type Cell = Option<Arc<dyn DistributionNode>>;

#[derive(Debug)]
enum QueryState {
    Unset,
    SingleCell(Arc<dyn DistributionNode>),
    Interpolated,
}

/// A family of distributions indexed by grid coordinates.
#[derive(Debug)]
pub struct GridInterpolatedDistribution {
    axes: Vec<AxisLookup>,
    cells: NdArray<Cell>,
    dim: usize,
    kind: StrategyKind,
    single_cell: bool,
    strategy: Option<InterpolationStrategy>,
    state: QueryState,
    point: Vec<Real>,
    cell: Vec<usize>,
    weights: Vec<Real>,
}

impl GridInterpolatedDistribution {
    /// Create an empty grid.
    ///
    /// `axes` define the grid (one to [`MAX_INTERPOLATION_RANK`] of them);
    /// `dim` is the dimensionality of the distributions stored at the grid
    /// points.
    pub fn new(
        axes: Vec<AxisLookup>,
        dim: usize,
        kind: StrategyKind,
        single_cell: bool,
    ) -> Result<Self> {
        ensure_construct!(
            (1..=MAX_INTERPOLATION_RANK).contains(&axes.len()),
            "number of grid axes must be in [1, {MAX_INTERPOLATION_RANK}], got {}",
            axes.len()
        );
        ensure_construct!(dim > 0, "distribution dimensionality must be positive");
        let shape: Vec<usize> = axes.iter().map(AxisLookup::n_coords).collect();
        let cells = NdArray::new(&shape)?;
        let strategy = Self::build_strategy(kind, dim, axes.len(), single_cell)?;
        let n_axes = axes.len();
        Ok(Self {
            axes,
            cells,
            dim,
            kind,
            single_cell,
            strategy,
            state: QueryState::Unset,
            point: Vec::with_capacity(n_axes),
            cell: Vec::with_capacity(n_axes),
            weights: Vec::with_capacity(n_axes),
        })
    }

    /// Create an empty grid from a configuration.
    pub fn from_config(config: &GridConfig) -> Result<Self> {
        Self::new(
            config.axes.clone(),
            config.distribution_dim,
            config.strategy,
            config.single_cell,
        )
    }

    /// The configuration this grid was built with.
    pub fn config(&self) -> GridConfig {
        GridConfig {
            axes: self.axes.clone(),
            distribution_dim: self.dim,
            strategy: self.kind,
            single_cell: self.single_cell,
        }
    }

    fn build_strategy(
        kind: StrategyKind,
        dim: usize,
        n_axes: usize,
        single_cell: bool,
    ) -> Result<Option<InterpolationStrategy>> {
        if single_cell {
            return Ok(None);
        }
        InterpolationStrategy::new(kind, dim, 1 << n_axes).map(Some)
    }

    // ── Grid contents ─────────────────────────────────────────────────────────

    fn check_node(&self, node: &dyn DistributionNode) -> Result<()> {
        ensure!(
            node.dim() == self.dim,
            "distribution of dimension {} stored in a grid of {}-dimensional distributions",
            node.dim(),
            self.dim
        );
        Ok(())
    }

    /// Store a distribution at the grid point `cell`.
    pub fn set_grid_distro(&mut self, cell: &[usize], node: Box<dyn DistributionNode>) -> Result<()> {
        self.check_node(node.as_ref())?;
        *self.cells.value_at_mut(cell)? = Some(Arc::from(node));
        self.invalidate();
        Ok(())
    }

    /// Store a distribution at row-major grid index `idx`.
    pub fn set_linear_distro(&mut self, idx: usize, node: Box<dyn DistributionNode>) -> Result<()> {
        self.check_node(node.as_ref())?;
        *self.cells.linear_value_at_mut(idx)? = Some(Arc::from(node));
        self.invalidate();
        Ok(())
    }

    /// The distribution at grid point `cell`, if one has been stored.
    pub fn grid_distro(&self, cell: &[usize]) -> Result<Option<&dyn DistributionNode>> {
        Ok(self.cells.value_at(cell)?.as_deref())
    }

    /// The distribution at row-major grid index `idx`, if one has been stored.
    pub fn linear_distro(&self, idx: usize) -> Result<Option<&dyn DistributionNode>> {
        Ok(self.cells.linear_value_at(idx)?.as_deref())
    }

    /// `true` once every grid point holds a distribution.
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// Switch between copula and conditional quantile interpolation.
    /// Resets the query state.
    pub fn set_interpolate_copulas(&mut self, interpolate_copulas: bool) -> Result<()> {
        let kind = if interpolate_copulas {
            StrategyKind::Copula
        } else {
            StrategyKind::ConditionalQuantile
        };
        self.strategy = Self::build_strategy(kind, self.dim, self.axes.len(), self.single_cell)?;
        self.kind = kind;
        self.invalidate();
        Ok(())
    }

    /// Switch between nearest-grid-point lookup and interpolation. Resets
    /// the query state. Single-cell grids hold no interpolator.
    pub fn set_use_single_cell(&mut self, single_cell: bool) -> Result<()> {
        self.strategy = Self::build_strategy(self.kind, self.dim, self.axes.len(), single_cell)?;
        self.single_cell = single_cell;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.state = QueryState::Unset;
        self.cell.clear();
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Number of grid axes.
    pub fn n_axes(&self) -> usize {
        self.axes.len()
    }

    /// Axis `i`.
    pub fn axis(&self, i: usize) -> Result<&AxisLookup> {
        self.axes.get(i).ok_or(Error::IndexOutOfRange {
            index: i,
            size: self.axes.len(),
        })
    }

    /// All axes.
    pub fn axes(&self) -> &[AxisLookup] {
        &self.axes
    }

    /// Number of grid points.
    pub fn n_distros(&self) -> usize {
        self.cells.len()
    }

    /// Number of grid points along each axis.
    pub fn grid_shape(&self) -> &[usize] {
        self.cells.shape()
    }

    /// Dimensionality of the stored distributions.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Current interpolation method.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.kind
    }

    /// `true` when copulas and marginals are interpolated separately.
    pub fn interpolating_copulas(&self) -> bool {
        self.kind == StrategyKind::Copula
    }

    /// `true` in nearest-grid-point mode.
    pub fn using_single_cell(&self) -> bool {
        self.single_cell
    }

    /// The point last passed to a successful
    /// [`set_grid_coords`](Self::set_grid_coords).
    pub fn grid_coords(&self) -> Option<&[Real]> {
        match self.state {
            QueryState::Unset => None,
            _ => Some(&self.point),
        }
    }

    // ── Point selection ───────────────────────────────────────────────────────

    fn node_at(&self, index: &[usize]) -> Result<Arc<dyn DistributionNode>> {
        self.cells.value_at(index)?.clone().ok_or_else(|| {
            Error::Precondition(format!("no distribution stored at grid point {index:?}"))
        })
    }

    /// Select the point in parameter space at which the distribution is
    /// queried. Coordinates outside an axis range are clamped to it.
    pub fn set_grid_coords(&mut self, point: &[Real]) -> Result<()> {
        ensure!(
            point.len() == self.axes.len(),
            "grid point of dimension {} passed to a grid with {} axes",
            point.len(),
            self.axes.len()
        );
        let result = if self.single_cell {
            self.select_single_cell(point)
        } else {
            self.interpolate_corners(point)
        };
        match result {
            Ok(()) => {
                self.point.clear();
                self.point.extend_from_slice(point);
                Ok(())
            }
            Err(e) => {
                self.invalidate();
                Err(e)
            }
        }
    }

    fn select_single_cell(&mut self, point: &[Real]) -> Result<()> {
        let mut index = Vec::with_capacity(self.axes.len());
        for (axis, &x) in self.axes.iter().zip(point) {
            let (cell, weight) = axis.get_interval(x)?;
            index.push(if weight < 0.5 { cell + 1 } else { cell });
        }
        let node = self.node_at(&index)?;
        log::trace!("grid point {point:?} resolved to node {index:?}");
        self.state = QueryState::SingleCell(node);
        Ok(())
    }

    fn corner_weight(&self, corner: usize) -> Real {
        self.weights
            .iter()
            .enumerate()
            .map(|(i, &w)| if corner & (1 << i) != 0 { 1.0 - w } else { w })
            .product()
    }

    fn interpolate_corners(&mut self, point: &[Real]) -> Result<()> {
        let mut cell = Vec::with_capacity(self.axes.len());
        self.weights.clear();
        for (axis, &x) in self.axes.iter().zip(point) {
            let (c, w) = axis.get_interval(x)?;
            cell.push(c);
            self.weights.push(w);
        }
        let n_corners = 1usize << self.axes.len();
        let corner_weights: Vec<Real> = (0..n_corners).map(|c| self.corner_weight(c)).collect();

        if matches!(self.state, QueryState::Interpolated) && cell == self.cell {
            let strategy = self.strategy.as_mut().ok_or_else(Self::no_strategy)?;
            strategy.normalize_automatically(false)?;
            for (corner, &w) in corner_weights.iter().enumerate() {
                strategy.set_weight(corner, w)?;
            }
            strategy.normalize_automatically(true)?;
            log::trace!("updated corner weights in cell {cell:?}");
        } else {
            let mut nodes = Vec::with_capacity(n_corners);
            let mut index = vec![0; cell.len()];
            for corner in 0..n_corners {
                for (i, (slot, &c)) in index.iter_mut().zip(&cell).enumerate() {
                    *slot = c + ((corner >> i) & 1);
                }
                nodes.push(self.node_at(&index)?);
            }
            let strategy = self.strategy.as_mut().ok_or_else(Self::no_strategy)?;
            strategy.clear();
            strategy.normalize_automatically(true)?;
            for (node, &w) in nodes.into_iter().zip(&corner_weights) {
                strategy.add(node, w)?;
            }
            log::debug!(
                "rebuilt {} interpolator from {n_corners} corners of cell {cell:?}",
                self.kind
            );
            self.cell = cell;
        }
        self.state = QueryState::Interpolated;
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    fn unset() -> Error {
        Error::Precondition("grid coordinates have not been set".to_string())
    }

    fn no_strategy() -> Error {
        Error::Precondition("grid is in single-cell mode and does not interpolate".to_string())
    }

    fn interpolator(&self) -> Result<&InterpolationStrategy> {
        self.strategy.as_ref().ok_or_else(Self::no_strategy)
    }

    fn decomposition(node: &dyn DistributionNode) -> Result<Decomposition> {
        node.decompose().ok_or_else(|| {
            Error::Precondition(format!(
                "distribution {node:?} has no copula/marginal decomposition"
            ))
        })
    }

    fn check_point(&self, x: &[Real]) -> Result<()> {
        ensure!(
            x.len() == self.dim,
            "point of dimension {} passed to a grid of {}-dimensional distributions",
            x.len(),
            self.dim
        );
        Ok(())
    }

    fn check_marginal_index(&self, i: usize) -> Result<()> {
        if i >= self.dim {
            return Err(Error::IndexOutOfRange {
                index: i,
                size: self.dim,
            });
        }
        Ok(())
    }

    /// Density at `x` of the distribution at the selected grid point.
    pub fn density(&self, x: &[Real]) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => node.density(x),
            QueryState::Interpolated => self.interpolator()?.density(x),
        }
    }

    /// Map a point of the unit cube to the distribution at the selected
    /// grid point. `u` and `x` must both have the distribution
    /// dimensionality.
    pub fn unit_map(&self, u: &[Real], x: &mut [Real]) -> Result<()> {
        ensure!(
            u.len() == self.dim && x.len() == self.dim,
            "unit map of a grid of {}-dimensional distributions called with \
             {} random numbers and an output buffer of length {}",
            self.dim,
            u.len(),
            x.len()
        );
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => node.unit_map(u, x),
            QueryState::Interpolated => self.interpolator()?.unit_map(u, x),
        }
    }

    /// Draw a random point from the distribution at the selected grid point.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Real>> {
        let u: Vec<Real> = (0..self.dim).map(|_| rng.gen::<Real>()).collect();
        let mut x = vec![0.0; self.dim];
        self.unit_map(&u, &mut x)?;
        Ok(x)
    }

    /// Whether the current `unit_map` is a chain of conditional quantiles.
    pub fn mapped_by_quantiles(&self) -> Result<bool> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => Ok(node.mapped_by_quantiles()),
            QueryState::Interpolated => Ok(self.interpolator()?.mapped_by_quantiles()),
        }
    }

    /// Copula density at the copula coordinates of `x`.
    pub fn copula_density(&self, x: &[Real]) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => {
                self.check_point(x)?;
                let d = Self::decomposition(node.as_ref())?;
                let u = d
                    .marginals
                    .iter()
                    .zip(x)
                    .map(|(m, &xi)| m.cdf(xi))
                    .collect::<Result<Vec<_>>>()?;
                d.copula.density(&u)
            }
            QueryState::Interpolated => self.interpolator()?.copula_density(x),
        }
    }

    /// Product of the marginal densities at `x`.
    pub fn product_of_the_marginals(&self, x: &[Real]) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => {
                self.check_point(x)?;
                let d = Self::decomposition(node.as_ref())?;
                let mut prod = 1.0;
                for (m, &xi) in d.marginals.iter().zip(x) {
                    prod *= m.density(xi)?;
                }
                Ok(prod)
            }
            QueryState::Interpolated => self.interpolator()?.product_of_the_marginals(x),
        }
    }

    fn single_marginal<F>(&self, node: &dyn DistributionNode, i: usize, f: F) -> Result<Real>
    where
        F: FnOnce(&dyn Distribution1D) -> Result<Real>,
    {
        self.check_marginal_index(i)?;
        let d = Self::decomposition(node)?;
        f(d.marginals[i].as_ref())
    }

    /// Density of marginal `i`.
    pub fn marginal_density(&self, i: usize, x: Real) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => self.single_marginal(node.as_ref(), i, |m| m.density(x)),
            QueryState::Interpolated => self.interpolator()?.marginal_density(i, x),
        }
    }

    /// Cdf of marginal `i`.
    pub fn marginal_cdf(&self, i: usize, x: Real) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => self.single_marginal(node.as_ref(), i, |m| m.cdf(x)),
            QueryState::Interpolated => self.interpolator()?.marginal_cdf(i, x),
        }
    }

    /// Exceedance of marginal `i`.
    pub fn marginal_exceedance(&self, i: usize, x: Real) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => {
                self.single_marginal(node.as_ref(), i, |m| m.exceedance(x))
            }
            QueryState::Interpolated => self.interpolator()?.marginal_exceedance(i, x),
        }
    }

    /// Quantile of marginal `i`.
    pub fn marginal_quantile(&self, i: usize, p: Real) -> Result<Real> {
        match &self.state {
            QueryState::Unset => Err(Self::unset()),
            QueryState::SingleCell(node) => self.single_marginal(node.as_ref(), i, |m| m.quantile(p)),
            QueryState::Interpolated => self.interpolator()?.marginal_quantile(i, p),
        }
    }
}

impl Clone for GridInterpolatedDistribution {
    /// Deep copy: grid nodes are cloned through
    /// [`DistributionNode::clone_node`] and the selected grid point is
    /// re-applied to the copy.
    fn clone(&self) -> Self {
        let mut cells = self.cells.clone();
        for slot in cells.data_mut() {
            let copy = slot.as_ref().map(|n| Arc::from(n.clone_node()));
            *slot = copy;
        }
        let mut copy = Self {
            axes: self.axes.clone(),
            cells,
            dim: self.dim,
            kind: self.kind,
            single_cell: self.single_cell,
            strategy: self.strategy.clone(),
            state: QueryState::Unset,
            point: Vec::with_capacity(self.point.len()),
            cell: Vec::with_capacity(self.cell.len()),
            weights: Vec::with_capacity(self.weights.len()),
        };
        if let Some(strategy) = copy.strategy.as_mut() {
            strategy.clear();
        }
        if let Some(point) = self.grid_coords() {
            if let Err(e) = copy.set_grid_coords(point) {
                log::warn!("grid copy could not restore grid point {point:?}: {e}");
            }
        }
        copy
    }
}
