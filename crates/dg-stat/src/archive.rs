//! Persistence of distribution nodes and grids.
//!
//! An [`Archive`] maps string keys to tagged [`Record`]s. Nodes describe
//! themselves through [`DistributionNode::record`] and are rebuilt by a
//! [`NodeRegistry`], which maps type tags to decoder functions. Built-in
//! nodes use the serde representation [`NodeSpec`] with a JSON payload.
//!
//! A grid is stored under a name as a header record followed by one record
//! per grid point in row-major order:
//!
//! ```text
//! <name>/header
//! <name>/cell/0
//! <name>/cell/1
//! ...
//! ```

use crate::copulas::{FgmCopula, GaussianCopula, IndependenceCopula};
use crate::distribution::{Distribution1D, DistributionNode};
use crate::distributions1d::{Beta1D, Gauss1D, Tabulated1D, Uniform1D};
use crate::grid::GridInterpolatedDistribution;
use crate::interpolation::StrategyKind;
use crate::multivariate::{CompositeDistribution, ProductDistribution};
use dg_core::{
    errors::{Error, Result},
    Real,
};
use dg_math::AxisLookup;
use nalgebra::DMatrix;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Version written into grid headers; readers reject anything else.
pub const FORMAT_VERSION: u32 = 1;

/// Type tag of a [`NodeSpec::Product`] record.
pub const PRODUCT_TAG: &str = "densgrid.product";
/// Type tag of a [`NodeSpec::Composite`] record.
pub const COMPOSITE_TAG: &str = "densgrid.composite";
/// Type tag of a [`NodeSpec::Copula`] record.
pub const COPULA_TAG: &str = "densgrid.copula";
/// Type tag of a grid header record.
pub const GRID_HEADER_TAG: &str = "densgrid.grid";

fn archive_error(what: impl std::fmt::Display) -> Error {
    Error::Archive(what.to_string())
}

// ── Records and archives ──────────────────────────────────────────────────────

/// A tagged, opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifies the decoder for `payload`.
    pub type_tag: String,
    /// Encoded object.
    pub payload: Vec<u8>,
}

impl Record {
    /// Serialize `value` as a JSON payload under `type_tag`.
    pub fn json<T: Serialize>(type_tag: &str, value: &T) -> Result<Self> {
        let payload = serde_json::to_vec(value).map_err(archive_error)?;
        Ok(Self {
            type_tag: type_tag.to_string(),
            payload,
        })
    }

    /// Decode the JSON payload.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload).map_err(|e| {
            Error::Archive(format!("malformed \"{}\" payload: {e}", self.type_tag))
        })
    }
}

/// Keyed record storage.
pub trait Archive {
    /// Store `record` under `key`. Keys may only be written once.
    fn store(&mut self, key: &str, record: Record) -> Result<()>;

    /// Retrieve the record stored under `key`.
    fn fetch(&self, key: &str) -> Result<Record>;

    /// `true` if a record is stored under `key`.
    fn contains(&self, key: &str) -> bool;
}

/// In-memory [`Archive`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryArchive {
    records: BTreeMap<String, Record>,
}

impl MemoryArchive {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}

impl Archive for MemoryArchive {
    fn store(&mut self, key: &str, record: Record) -> Result<()> {
        if self.records.contains_key(key) {
            return Err(Error::Archive(format!("duplicate key \"{key}\"")));
        }
        log::trace!("storing \"{}\" record under \"{key}\"", record.type_tag);
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Record> {
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Archive(format!("no record under key \"{key}\"")))
    }

    fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }
}

// ── Serializable node descriptions ────────────────────────────────────────────

/// Description of a built-in univariate distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginalSpec {
    /// [`Uniform1D`].
    Uniform {
        /// Lower limit.
        lo: Real,
        /// Upper limit.
        hi: Real,
    },
    /// [`Gauss1D`].
    Gauss {
        /// Mean.
        mean: Real,
        /// Standard deviation.
        sigma: Real,
    },
    /// [`Beta1D`].
    Beta {
        /// First shape parameter.
        alpha: Real,
        /// Second shape parameter.
        beta: Real,
    },
    /// [`Tabulated1D`].
    Tabulated {
        /// Lower support limit.
        lo: Real,
        /// Upper support limit.
        hi: Real,
        /// Bin heights.
        values: Vec<Real>,
    },
}

impl MarginalSpec {
    /// Build the described distribution.
    pub fn build(&self) -> Result<Box<dyn Distribution1D>> {
        let marginal: Box<dyn Distribution1D> = match self {
            MarginalSpec::Uniform { lo, hi } => Box::new(Uniform1D::new(*lo, *hi)?),
            MarginalSpec::Gauss { mean, sigma } => Box::new(Gauss1D::new(*mean, *sigma)?),
            MarginalSpec::Beta { alpha, beta } => Box::new(Beta1D::new(*alpha, *beta)?),
            MarginalSpec::Tabulated { lo, hi, values } => {
                Box::new(Tabulated1D::from_values(values.clone(), *lo, *hi)?)
            }
        };
        Ok(marginal)
    }
}

/// Description of a built-in copula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopulaSpec {
    /// [`IndependenceCopula`].
    Independence {
        /// Dimensionality.
        dim: usize,
    },
    /// [`GaussianCopula`].
    Gaussian {
        /// Correlation matrix, row by row.
        correlation: Vec<Vec<Real>>,
    },
    /// [`FgmCopula`].
    Fgm {
        /// Dependence parameter.
        theta: Real,
    },
}

impl CopulaSpec {
    /// Build the described copula.
    pub fn build(&self) -> Result<Box<dyn DistributionNode>> {
        let copula: Box<dyn DistributionNode> = match self {
            CopulaSpec::Independence { dim } => Box::new(IndependenceCopula::new(*dim)?),
            CopulaSpec::Gaussian { correlation } => {
                let n = correlation.len();
                if correlation.iter().any(|row| row.len() != n) {
                    return Err(Error::Archive(
                        "correlation matrix rows have unequal lengths".to_string(),
                    ));
                }
                let m = DMatrix::from_fn(n, n, |i, j| correlation[i][j]);
                Box::new(GaussianCopula::new(m)?)
            }
            CopulaSpec::Fgm { theta } => Box::new(FgmCopula::new(*theta)?),
        };
        Ok(copula)
    }
}

/// Description of a built-in distribution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpec {
    /// [`ProductDistribution`].
    Product {
        /// One marginal per dimension.
        marginals: Vec<MarginalSpec>,
    },
    /// [`CompositeDistribution`].
    Composite {
        /// The copula.
        copula: CopulaSpec,
        /// One marginal per dimension.
        marginals: Vec<MarginalSpec>,
    },
    /// A copula on its own.
    Copula(CopulaSpec),
}

impl NodeSpec {
    /// Type tag used for records of this variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            NodeSpec::Product { .. } => PRODUCT_TAG,
            NodeSpec::Composite { .. } => COMPOSITE_TAG,
            NodeSpec::Copula(_) => COPULA_TAG,
        }
    }

    /// Encode as a record.
    pub fn to_record(&self) -> Result<Record> {
        Record::json(self.type_tag(), self)
    }

    /// Build the described node.
    pub fn build(&self) -> Result<Box<dyn DistributionNode>> {
        let node: Box<dyn DistributionNode> = match self {
            NodeSpec::Product { marginals } => {
                Box::new(ProductDistribution::new(build_marginals(marginals)?)?)
            }
            NodeSpec::Composite { copula, marginals } => Box::new(CompositeDistribution::new(
                copula.build()?,
                build_marginals(marginals)?,
            )?),
            NodeSpec::Copula(c) => c.build()?,
        };
        Ok(node)
    }
}

fn build_marginals(specs: &[MarginalSpec]) -> Result<Vec<Box<dyn Distribution1D>>> {
    specs.iter().map(MarginalSpec::build).collect()
}

/// Specs of every marginal, or an archive error naming the first marginal
/// without one.
pub fn marginal_specs(marginals: &[Arc<dyn Distribution1D>]) -> Result<Vec<MarginalSpec>> {
    marginals
        .iter()
        .map(|m| {
            m.spec()
                .ok_or_else(|| Error::Archive(format!("marginal {m:?} has no archive representation")))
        })
        .collect()
}

/// Spec of a copula node.
pub fn copula_spec_of(copula: &dyn DistributionNode) -> Result<CopulaSpec> {
    match copula.record()?.decode_json::<NodeSpec>()? {
        NodeSpec::Copula(spec) => Ok(spec),
        other => Err(Error::Archive(format!(
            "expected a copula record, found \"{}\"",
            other.type_tag()
        ))),
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Rebuilds a node from a record payload.
pub type NodeDecoder = fn(&[u8]) -> Result<Box<dyn DistributionNode>>;

fn decode_builtin(payload: &[u8]) -> Result<Box<dyn DistributionNode>> {
    let spec: NodeSpec = serde_json::from_slice(payload)
        .map_err(|e| Error::Archive(format!("malformed node payload: {e}")))?;
    spec.build()
}

/// Maps record type tags to decoders.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    decoders: HashMap<String, NodeDecoder>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// A registry that knows the built-in node types.
    pub fn new() -> Self {
        let mut decoders: HashMap<String, NodeDecoder> = HashMap::new();
        for tag in [PRODUCT_TAG, COMPOSITE_TAG, COPULA_TAG] {
            decoders.insert(tag.to_string(), decode_builtin);
        }
        Self { decoders }
    }

    /// A registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `decoder` for `tag`. A tag can be registered only once.
    pub fn register(&mut self, tag: &str, decoder: NodeDecoder) -> Result<()> {
        if self.decoders.contains_key(tag) {
            return Err(Error::Archive(format!("type tag \"{tag}\" is already registered")));
        }
        self.decoders.insert(tag.to_string(), decoder);
        Ok(())
    }

    /// `true` if a decoder is registered for `tag`.
    pub fn knows(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Rebuild the node described by `record`.
    pub fn decode(&self, record: &Record) -> Result<Box<dyn DistributionNode>> {
        let decoder = self
            .decoders
            .get(&record.type_tag)
            .ok_or_else(|| Error::Archive(format!("unknown type tag \"{}\"", record.type_tag)))?;
        decoder(&record.payload)
    }
}

// ── Grids ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GridHeader {
    format_version: u32,
    distribution_dim: usize,
    strategy: StrategyKind,
    single_cell: bool,
    axes: Vec<AxisLookup>,
    n_cells: usize,
}

fn header_key(name: &str) -> String {
    format!("{name}/header")
}

fn cell_key(name: &str, i: usize) -> String {
    format!("{name}/cell/{i}")
}

/// Store `grid` under `name`. Every grid point must hold a node.
pub fn write_grid<A: Archive + ?Sized>(
    archive: &mut A,
    name: &str,
    grid: &GridInterpolatedDistribution,
) -> Result<()> {
    if !grid.is_complete() {
        return Err(Error::Archive(format!(
            "grid \"{name}\" has grid points without a distribution"
        )));
    }
    let header = GridHeader {
        format_version: FORMAT_VERSION,
        distribution_dim: grid.dim(),
        strategy: grid.strategy_kind(),
        single_cell: grid.using_single_cell(),
        axes: grid.axes().to_vec(),
        n_cells: grid.n_distros(),
    };
    archive.store(&header_key(name), Record::json(GRID_HEADER_TAG, &header)?)?;
    for i in 0..grid.n_distros() {
        let node = grid.linear_distro(i)?.ok_or_else(|| {
            Error::Archive(format!("grid \"{name}\" has no distribution at index {i}"))
        })?;
        archive.store(&cell_key(name, i), node.record()?)?;
    }
    log::debug!(
        "stored grid \"{name}\" with {} distributions on a {:?} grid",
        grid.n_distros(),
        grid.grid_shape()
    );
    Ok(())
}

/// Load the grid stored under `name`.
pub fn read_grid<A: Archive + ?Sized>(
    archive: &A,
    name: &str,
    registry: &NodeRegistry,
) -> Result<GridInterpolatedDistribution> {
    let record = archive.fetch(&header_key(name))?;
    if record.type_tag != GRID_HEADER_TAG {
        return Err(Error::Archive(format!(
            "\"{}\" is not a grid header (type tag \"{}\")",
            header_key(name),
            record.type_tag
        )));
    }
    let header: GridHeader = record.decode_json()?;
    if header.format_version != FORMAT_VERSION {
        return Err(Error::Archive(format!(
            "unsupported grid format version {} (expected {FORMAT_VERSION})",
            header.format_version
        )));
    }
    let mut grid = GridInterpolatedDistribution::new(
        header.axes,
        header.distribution_dim,
        header.strategy,
        header.single_cell,
    )?;
    if grid.n_distros() != header.n_cells {
        return Err(Error::Archive(format!(
            "grid header lists {} distributions but the axes define {}",
            header.n_cells,
            grid.n_distros()
        )));
    }
    for i in 0..header.n_cells {
        let node = registry.decode(&archive.fetch(&cell_key(name, i))?)?;
        grid.set_linear_distro(i, node)?;
    }
    log::debug!("loaded grid \"{name}\" with {} distributions", header.n_cells);
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn round_trip(node: &dyn DistributionNode) -> Box<dyn DistributionNode> {
        NodeRegistry::new().decode(&node.record().unwrap()).unwrap()
    }

    #[test]
    fn nodes_survive_a_record_round_trip() {
        let composite = CompositeDistribution::new(
            Box::new(GaussianCopula::bivariate(0.3).unwrap()),
            vec![
                Box::new(Beta1D::new(2.0, 3.0).unwrap()),
                Box::new(Tabulated1D::from_values(vec![1.0, 3.0, 2.0], 0.0, 3.0).unwrap()),
            ],
        )
        .unwrap();
        let back = round_trip(&composite);
        let x = [0.4, 1.2];
        assert_abs_diff_eq!(
            back.density(&x).unwrap(),
            composite.density(&x).unwrap(),
            epsilon = 1e-12
        );

        let fgm = FgmCopula::new(-0.4).unwrap();
        let back = round_trip(&fgm);
        assert_eq!(back.density(&[0.2, 0.7]).unwrap(), fgm.density(&[0.2, 0.7]).unwrap());
    }

    #[test]
    fn copula_spec_extraction() {
        let spec = copula_spec_of(&IndependenceCopula::new(3).unwrap()).unwrap();
        assert_eq!(spec, CopulaSpec::Independence { dim: 3 });
        let product = ProductDistribution::new(vec![Box::new(Gauss1D::new(0.0, 1.0).unwrap())])
            .unwrap();
        assert!(matches!(copula_spec_of(&product), Err(Error::Archive(_))));
    }

    #[test]
    fn memory_archive_keys() {
        let mut a = MemoryArchive::new();
        let r = NodeSpec::Copula(CopulaSpec::Fgm { theta: 0.1 }).to_record().unwrap();
        a.store("x", r.clone()).unwrap();
        assert!(matches!(a.store("x", r), Err(Error::Archive(_))));
        assert!(matches!(a.fetch("y"), Err(Error::Archive(_))));
        assert!(a.contains("x"));
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn registry_rejects_unknown_and_duplicate_tags() {
        let mut reg = NodeRegistry::empty();
        let r = NodeSpec::Copula(CopulaSpec::Fgm { theta: 0.1 }).to_record().unwrap();
        assert!(matches!(reg.decode(&r), Err(Error::Archive(_))));
        reg.register(COPULA_TAG, decode_builtin).unwrap();
        assert!(reg.knows(COPULA_TAG));
        assert!(reg.decode(&r).is_ok());
        assert!(reg.register(COPULA_TAG, decode_builtin).is_err());

        let bad = Record {
            type_tag: COPULA_TAG.to_string(),
            payload: b"not json".to_vec(),
        };
        assert!(matches!(reg.decode(&bad), Err(Error::Archive(_))));
    }

    #[test]
    fn spec_json_is_externally_tagged() {
        let spec = NodeSpec::Product {
            marginals: vec![MarginalSpec::Uniform { lo: 0.0, hi: 1.0 }],
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"product":{"marginals":[{"uniform":{"lo":0.0,"hi":1.0}}]}}"#);
    }
}
