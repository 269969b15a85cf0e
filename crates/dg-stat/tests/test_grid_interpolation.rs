//! Integration tests for `GridInterpolatedDistribution`.
//!
//! Covers both interpolation strategies, single-cell lookup, deep copies,
//! sampling, and archive round trips.

use approx::assert_abs_diff_eq;
use dg_core::Error;
use dg_math::{integrate_box, AxisLookup, BoundingBox};
use dg_stat::archive::{GRID_HEADER_TAG, PRODUCT_TAG};
use dg_stat::{
    read_grid, sample, write_grid, Archive, CompositeDistribution, DistributionNode, FgmCopula,
    Gauss1D, GridConfig, GridInterpolatedDistribution, MemoryArchive, NodeRegistry,
    ProductDistribution, Record, StrategyKind, Uniform1D,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn uniform_node(lo: f64, hi: f64) -> Box<dyn DistributionNode> {
    Box::new(ProductDistribution::new(vec![Box::new(Uniform1D::new(lo, hi).unwrap())]).unwrap())
}

fn fgm_node(theta: f64, m0: (f64, f64), m1: (f64, f64)) -> Box<dyn DistributionNode> {
    Box::new(
        CompositeDistribution::new(
            Box::new(FgmCopula::new(theta).unwrap()),
            vec![
                Box::new(Uniform1D::new(m0.0, m0.1).unwrap()),
                Box::new(Uniform1D::new(m1.0, m1.1).unwrap()),
            ],
        )
        .unwrap(),
    )
}

fn unit_square_axes() -> Vec<AxisLookup> {
    vec![
        AxisLookup::new(vec![0.0, 1.0]).unwrap(),
        AxisLookup::new(vec![0.0, 1.0]).unwrap(),
    ]
}

/// 2x2 grid of FGM composites whose parameters vary by corner.
fn fgm_grid(kind: StrategyKind) -> GridInterpolatedDistribution {
    let mut g = GridInterpolatedDistribution::new(unit_square_axes(), 2, kind, false).unwrap();
    let nodes = [
        fgm_node(0.9, (0.0, 1.0), (0.0, 2.0)),
        fgm_node(-0.3, (1.0, 2.0), (0.5, 1.5)),
        fgm_node(0.2, (-1.0, 3.0), (0.0, 1.0)),
        fgm_node(-0.8, (0.5, 1.0), (1.0, 4.0)),
    ];
    for (i, node) in nodes.into_iter().enumerate() {
        g.set_linear_distro(i, node).unwrap();
    }
    g
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn halfway_between_two_uniforms() {
    let axis = AxisLookup::new(vec![0.0, 1.0]).unwrap();
    let mut g =
        GridInterpolatedDistribution::new(vec![axis], 1, StrategyKind::ConditionalQuantile, false)
            .unwrap();
    g.set_grid_distro(&[0], uniform_node(0.0, 1.0)).unwrap();
    g.set_grid_distro(&[1], uniform_node(10.0, 11.0)).unwrap();
    g.set_grid_coords(&[0.5]).unwrap();

    let mut x = [0.0];
    g.unit_map(&[0.5], &mut x).unwrap();
    assert_abs_diff_eq!(x[0], 5.5, epsilon = 1e-12);
    let d = g.density(&[5.5]).unwrap();
    assert!(d > 0.0);
    assert_abs_diff_eq!(d, 1.0, epsilon = 1e-6);
    assert_eq!(g.density(&[-1.0]).unwrap(), 0.0);
}

#[test]
fn queries_before_grid_coords_fail() {
    let g = fgm_grid(StrategyKind::Copula);
    assert!(matches!(g.density(&[0.5, 0.5]), Err(Error::Precondition(_))));
    let mut x = [0.0; 2];
    assert!(matches!(
        g.unit_map(&[0.5, 0.5], &mut x),
        Err(Error::Precondition(_))
    ));
    assert!(matches!(g.mapped_by_quantiles(), Err(Error::Precondition(_))));
    assert!(matches!(g.marginal_cdf(0, 0.5), Err(Error::Precondition(_))));
}

#[test]
fn unit_map_needs_a_full_length_point() {
    for kind in [StrategyKind::ConditionalQuantile, StrategyKind::Copula] {
        for single_cell in [false, true] {
            let mut g = fgm_grid(kind);
            g.set_use_single_cell(single_cell).unwrap();
            g.set_grid_coords(&[0.3, 0.3]).unwrap();

            let mut short = [0.0];
            assert!(matches!(
                g.unit_map(&[0.5], &mut short),
                Err(Error::Precondition(_))
            ));
            assert_eq!(short[0], 0.0);
            let mut long = [0.0; 3];
            assert!(matches!(
                g.unit_map(&[0.5; 3], &mut long),
                Err(Error::Precondition(_))
            ));
            let mut x = [0.0; 2];
            assert!(matches!(
                g.unit_map(&[0.5], &mut x),
                Err(Error::Precondition(_))
            ));
            g.unit_map(&[0.5, 0.5], &mut x).unwrap();
        }
    }
}

#[test]
fn identical_corners_reproduce_the_node() {
    let make = || -> Box<dyn DistributionNode> {
        Box::new(
            CompositeDistribution::new(
                Box::new(FgmCopula::new(0.5).unwrap()),
                vec![
                    Box::new(Gauss1D::new(1.0, 2.0).unwrap()),
                    Box::new(Uniform1D::new(0.0, 3.0).unwrap()),
                ],
            )
            .unwrap(),
        )
    };
    let reference = make();
    let mut g = GridInterpolatedDistribution::new(
        unit_square_axes(),
        2,
        StrategyKind::ConditionalQuantile,
        false,
    )
    .unwrap();
    for i in 0..4 {
        g.set_linear_distro(i, make()).unwrap();
    }
    g.set_grid_coords(&[0.3, 0.6]).unwrap();
    for x in [[1.0, 1.5], [-2.0, 0.3], [4.0, 2.9]] {
        assert_abs_diff_eq!(
            g.density(&x).unwrap(),
            reference.density(&x).unwrap(),
            epsilon = 1e-6
        );
    }
}

#[test]
fn copula_interpolation_density_is_normalized() {
    let mut g = fgm_grid(StrategyKind::Copula);
    for point in [[0.3, 0.6], [0.9, 0.1], [0.5, 0.5]] {
        g.set_grid_coords(&point).unwrap();
        let limits: Vec<(f64, f64)> = (0..2)
            .map(|i| {
                (
                    g.marginal_quantile(i, 0.0).unwrap(),
                    g.marginal_quantile(i, 1.0).unwrap(),
                )
            })
            .collect();
        let b = BoundingBox::from_limits(&limits).unwrap();
        let v = integrate_box(|x| g.density(x), &b, 8).unwrap();
        assert_abs_diff_eq!(v, 1.0, epsilon = 1e-5);
        assert!(!g.mapped_by_quantiles().unwrap());
    }
}

#[test]
fn density_factorizes_in_copula_mode() {
    let mut g = fgm_grid(StrategyKind::Copula);
    g.set_grid_coords(&[0.3, 0.6]).unwrap();
    let x = [0.8, 1.2];
    let d = g.density(&x).unwrap();
    let f = g.product_of_the_marginals(&x).unwrap();
    let c = g.copula_density(&x).unwrap();
    assert_abs_diff_eq!(d, f * c, epsilon = 1e-10);
    assert_abs_diff_eq!(
        g.marginal_cdf(0, x[0]).unwrap() + g.marginal_exceedance(0, x[0]).unwrap(),
        1.0,
        epsilon = 1e-15
    );
    assert!(g.marginal_density(1, x[1]).unwrap() > 0.0);
}

#[test]
fn single_cell_mode_uses_nearest_node() {
    let mut g = fgm_grid(StrategyKind::Copula);
    g.set_use_single_cell(true).unwrap();
    g.set_grid_coords(&[0.2, 0.9]).unwrap();
    // nearest grid point is (0, 1), linear index 1
    let node = fgm_node(-0.3, (1.0, 2.0), (0.5, 1.5));
    let x = [1.5, 1.0];
    assert_eq!(g.density(&x).unwrap(), node.density(&x).unwrap());
    assert_abs_diff_eq!(g.marginal_quantile(0, 0.5).unwrap(), 1.5, epsilon = 1e-15);
    assert_abs_diff_eq!(g.copula_density(&x).unwrap(), 1.0, epsilon = 1e-15);
    assert!(g.mapped_by_quantiles().unwrap());
}

#[test]
fn switching_strategy_resets_the_query_state() {
    let mut g = fgm_grid(StrategyKind::Copula);
    g.set_grid_coords(&[0.5, 0.5]).unwrap();
    g.set_interpolate_copulas(false).unwrap();
    assert!(g.density(&[1.0, 1.0]).is_err());
    g.set_grid_coords(&[0.5, 0.5]).unwrap();
    assert!(g.mapped_by_quantiles().unwrap());
    assert!(g.marginal_cdf(0, 1.0).is_err());
}

#[test]
fn moving_within_a_cell_matches_a_fresh_grid() {
    let mut moved = fgm_grid(StrategyKind::ConditionalQuantile);
    moved.set_grid_coords(&[0.1, 0.8]).unwrap();
    moved.set_grid_coords(&[0.6, 0.3]).unwrap();
    let mut fresh = fgm_grid(StrategyKind::ConditionalQuantile);
    fresh.set_grid_coords(&[0.6, 0.3]).unwrap();

    let x = [0.9, 1.1];
    assert_abs_diff_eq!(
        moved.density(&x).unwrap(),
        fresh.density(&x).unwrap(),
        epsilon = 1e-12
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn conditional_quantile_maps_into_the_support(
        p0 in 0.0f64..1.0,
        p1 in 0.0f64..1.0,
        u0 in 0.01f64..0.99,
        u1 in 0.01f64..0.99,
    ) {
        let mut g = fgm_grid(StrategyKind::ConditionalQuantile);
        g.set_grid_coords(&[p0, p1]).unwrap();
        let mut x = [0.0; 2];
        g.unit_map(&[u0, u1], &mut x).unwrap();
        prop_assert!(g.density(&x).unwrap() > 0.0);
    }
}

// ── Copies and sampling ──────────────────────────────────────────────────────

#[test]
fn clone_is_independent() {
    let mut g = fgm_grid(StrategyKind::Copula);
    g.set_grid_coords(&[0.3, 0.6]).unwrap();
    let copy = g.clone();
    let x = [0.8, 1.2];
    let before = g.density(&x).unwrap();
    assert_eq!(copy.density(&x).unwrap(), before);

    g.set_grid_coords(&[0.9, 0.9]).unwrap();
    assert_eq!(copy.density(&x).unwrap(), before);
    assert_eq!(copy.grid_coords(), Some(&[0.3, 0.6][..]));

    let unset = fgm_grid(StrategyKind::Copula).clone();
    assert!(unset.density(&x).is_err());
}

#[test]
fn samples_stay_within_the_support() {
    let mut rng = StdRng::seed_from_u64(42);
    for kind in [StrategyKind::Copula, StrategyKind::ConditionalQuantile] {
        let mut g = fgm_grid(kind);
        g.set_grid_coords(&[0.5, 0.5]).unwrap();
        let n = 2000;
        let mut mean = [0.0; 2];
        for _ in 0..n {
            let x = g.random(&mut rng).unwrap();
            assert!(g.density(&x).unwrap() >= 0.0);
            mean[0] += x[0] / n as f64;
            mean[1] += x[1] / n as f64;
        }
        // both strategies average the marginal quantiles alike:
        // dimension 0 is uniform on [0.125, 1.75]
        assert_abs_diff_eq!(mean[0], 0.9375, epsilon = 0.06);
    }

    let node = fgm_node(0.4, (2.0, 3.0), (-1.0, 0.0));
    for _ in 0..100 {
        let x = sample(node.as_ref(), &mut rng).unwrap();
        assert!((2.0..=3.0).contains(&x[0]));
        assert!((-1.0..=0.0).contains(&x[1]));
    }
}

// ── Configuration and archives ───────────────────────────────────────────────

#[test]
fn grid_from_config() {
    let cfg = GridConfig::from_json(
        r#"{
            "axes": [{"breakpoints": [0.0, 0.5, 1.0]}, {"breakpoints": [1.0, 2.0]}],
            "distribution_dim": 2,
            "strategy": "conditional_quantile",
            "single_cell": true
        }"#,
    )
    .unwrap();
    let g = GridInterpolatedDistribution::from_config(&cfg).unwrap();
    assert_eq!(g.grid_shape(), &[3, 2]);
    assert!(g.using_single_cell());
    assert!(!g.interpolating_copulas());
    assert_eq!(g.config(), cfg);
}

#[test]
fn archive_round_trip() {
    let mut g = fgm_grid(StrategyKind::Copula);
    let mut archive = MemoryArchive::new();
    write_grid(&mut archive, "fgm", &g).unwrap();
    assert_eq!(archive.len(), 5);
    assert!(archive.contains("fgm/header"));
    assert!(archive.contains("fgm/cell/3"));

    let mut back = read_grid(&archive, "fgm", &NodeRegistry::new()).unwrap();
    assert_eq!(back.grid_shape(), g.grid_shape());
    assert!(back.interpolating_copulas());

    g.set_grid_coords(&[0.3, 0.6]).unwrap();
    back.set_grid_coords(&[0.3, 0.6]).unwrap();
    let x = [0.8, 1.2];
    assert_abs_diff_eq!(
        back.density(&x).unwrap(),
        g.density(&x).unwrap(),
        epsilon = 1e-14
    );

    assert!(matches!(
        write_grid(&mut archive, "fgm", &g),
        Err(Error::Archive(_))
    ));
}

#[test]
fn archive_failures() {
    let mut archive = MemoryArchive::new();
    let registry = NodeRegistry::new();

    assert!(matches!(
        read_grid(&archive, "missing", &registry),
        Err(Error::Archive(_))
    ));

    let mut incomplete =
        GridInterpolatedDistribution::new(unit_square_axes(), 2, StrategyKind::Copula, false)
            .unwrap();
    incomplete
        .set_linear_distro(0, fgm_node(0.1, (0.0, 1.0), (0.0, 1.0)))
        .unwrap();
    assert!(matches!(
        write_grid(&mut archive, "partial", &incomplete),
        Err(Error::Archive(_))
    ));

    let header = serde_json::json!({
        "format_version": 99,
        "distribution_dim": 1,
        "strategy": "conditional_quantile",
        "single_cell": false,
        "axes": [{"breakpoints": [0.0, 1.0]}],
        "n_cells": 2
    });
    archive
        .store(
            "future/header",
            Record {
                type_tag: GRID_HEADER_TAG.to_string(),
                payload: serde_json::to_vec(&header).unwrap(),
            },
        )
        .unwrap();
    assert!(matches!(
        read_grid(&archive, "future", &registry),
        Err(Error::Archive(_))
    ));
}

fn decode_point_mass(_payload: &[u8]) -> dg_core::Result<Box<dyn DistributionNode>> {
    Ok(uniform_node(0.0, 1.0))
}

#[test]
fn custom_type_tags_need_registration() {
    let mut archive = MemoryArchive::new();
    let header = serde_json::json!({
        "format_version": 1,
        "distribution_dim": 1,
        "strategy": "conditional_quantile",
        "single_cell": false,
        "axes": [{"breakpoints": [0.0, 1.0]}],
        "n_cells": 2
    });
    archive
        .store(
            "custom/header",
            Record {
                type_tag: GRID_HEADER_TAG.to_string(),
                payload: serde_json::to_vec(&header).unwrap(),
            },
        )
        .unwrap();
    archive
        .store(
            "custom/cell/0",
            Record {
                type_tag: "custom.unit".to_string(),
                payload: Vec::new(),
            },
        )
        .unwrap();
    archive
        .store(
            "custom/cell/1",
            uniform_node(2.0, 3.0).record().unwrap(),
        )
        .unwrap();
    assert_eq!(
        archive.fetch("custom/cell/1").unwrap().type_tag,
        PRODUCT_TAG
    );

    let mut registry = NodeRegistry::new();
    assert!(matches!(
        read_grid(&archive, "custom", &registry),
        Err(Error::Archive(_))
    ));
    registry.register("custom.unit", decode_point_mass).unwrap();
    let mut g = read_grid(&archive, "custom", &registry).unwrap();
    g.set_grid_coords(&[0.5]).unwrap();
    let mut x = [0.0];
    g.unit_map(&[0.5], &mut x).unwrap();
    assert_abs_diff_eq!(x[0], 1.5, epsilon = 1e-12);
}
