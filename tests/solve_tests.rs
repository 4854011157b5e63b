//! Solve tests for the risk-capped optimizer.
//!
//! Cases are defined as data with their analytic optimum, then run
//! programmatically. With a diagonal risk model the optimum of
//! `max rᵀw s.t. Σσ_i²w_i² <= R², lo <= w <= hi` is `w_i = clamp(t·r_i/σ_i²)`
//! for the `t` that puts the risk exactly on the cap.

use maxret::prelude::*;
use nalgebra::{DMatrix, DVector};

/// Tolerance for comparing weights
const TOL: f64 = 1e-4;

/// Slack allowed on the risk cap
const RISK_EPS: f64 = 1e-6;

/// A test case definition
struct TestCase {
    name: &'static str,
    /// Builds the problem and returns it with the expected weights
    build: fn() -> (PortfolioProblem, Vec<f64>),
}

fn diagonal(r: &[f64], sigma: &[f64], max_risk: f64, bounds: &[(f64, f64)]) -> PortfolioProblem {
    PortfolioProblem::maximize_return(r)
        .asset_risk(sigma)
        .max_risk(max_risk)
        .bounds(bounds.iter().copied())
        .build()
        .expect("valid problem")
}

fn test_cases() -> Vec<TestCase> {
    vec![
        // ========== Risk cap binds, interior weights ==========
        TestCase {
            name: "two_assets_cap_binds",
            build: || {
                // w ∝ r/σ² = (1.92, 3.5556); risk² of the direction 0.5148
                let t = 0.18 / (0.0625_f64 * 1.92 * 1.92 + 0.0225 * (0.08 / 0.0225_f64).powi(2)).sqrt();
                let expected = vec![t * 0.12 / 0.0625, t * 0.08 / 0.0225];
                (
                    diagonal(&[0.12, 0.08], &[0.25, 0.15], 0.18, &[(0.0, 1.0), (0.0, 1.0)]),
                    expected,
                )
            },
        },
        TestCase {
            name: "single_asset_cap_binds",
            build: || {
                // σ = 0.3 > R/hi = 0.15: w = R/σ
                (diagonal(&[0.1], &[0.3], 0.15, &[(0.0, 1.0)]), vec![0.5])
            },
        },

        // ========== Bounds and cap both active ==========
        TestCase {
            name: "upper_bound_then_cap",
            build: || {
                // Asset 0 saturates at 1.0 using 0.01 of variance; asset 1 takes the rest.
                let w1 = (0.12_f64 * 0.12 - 0.01).sqrt() / 0.3;
                (
                    diagonal(&[0.2, 0.05], &[0.1, 0.3], 0.12, &[(0.0, 1.0), (0.0, 1.0)]),
                    vec![1.0, w1],
                )
            },
        },
        TestCase {
            name: "negative_return_stays_at_lower_bound",
            build: || {
                (
                    diagonal(&[0.1, -0.05], &[0.2, 0.1], 0.1, &[(0.0, 1.0), (0.0, 1.0)]),
                    vec![0.5, 0.0],
                )
            },
        },
        TestCase {
            name: "positive_lower_bound_on_loser",
            build: || {
                // Asset 1 is forced to 0.2 (risk 0.02); asset 0 gets sqrt(0.0036 - 0.0004)/0.2.
                let w0 = (0.06_f64 * 0.06 - 0.02 * 0.02).sqrt() / 0.2;
                (
                    diagonal(&[0.1, -0.05], &[0.2, 0.1], 0.06, &[(0.0, 1.0), (0.2, 1.0)]),
                    vec![w0, 0.2],
                )
            },
        },

        // ========== Risk cap inactive ==========
        TestCase {
            name: "single_asset_capped_by_upper_bound",
            build: || {
                // σ = 0.3 < R/hi = 0.375: w = hi
                (diagonal(&[0.1], &[0.3], 0.15, &[(0.0, 0.4)]), vec![0.4])
            },
        },
        TestCase {
            name: "loose_cap_goes_to_bounds",
            build: || {
                (
                    diagonal(&[0.1, 0.2, -0.1], &[0.1, 0.1, 0.1], 1.0, &[(0.0, 1.0); 3]),
                    vec![1.0, 1.0, 0.0],
                )
            },
        },
        TestCase {
            name: "zero_volatility_assets",
            build: || {
                (
                    diagonal(&[0.03, 0.04], &[0.0, 0.0], 0.01, &[(0.0, 1.0); 2]),
                    vec![1.0, 1.0],
                )
            },
        },
    ]
}

fn assert_feasible(name: &str, problem: &PortfolioProblem, result: &OptimizationResult) {
    for (i, (w, b)) in result
        .weights
        .iter()
        .zip(&problem.constraints().bounds)
        .enumerate()
    {
        assert!(
            b.contains(*w, 1e-9),
            "Problem '{}': weight {} = {} outside [{}, {}]",
            name,
            i,
            w,
            b.lower,
            b.upper
        );
    }
    let w = DVector::from_vec(result.weights.clone());
    let vol = problem.risk_model().volatility(&w);
    assert!(
        vol <= problem.max_risk() + RISK_EPS,
        "Problem '{}': risk {} exceeds cap {}",
        name,
        vol,
        problem.max_risk()
    );
}

// ============================================================================
// Test runner
// ============================================================================

#[test]
fn test_analytic_optima() {
    for case in test_cases() {
        let (problem, expected) = (case.build)();

        let result = problem.solve();
        assert!(result.is_ok(), "Problem '{}' should solve: {:?}", case.name, result.err());
        let result = result.unwrap();

        assert!(result.converged, "Problem '{}' should converge", case.name);
        assert_feasible(case.name, &problem, &result);

        for (i, (got, want)) in result.weights.iter().zip(&expected).enumerate() {
            assert!(
                (got - want).abs() < TOL,
                "Problem '{}': weight {} expected {}, got {}",
                case.name,
                i,
                want,
                got
            );
        }
    }
}

#[test]
fn test_two_asset_example_hits_cap() {
    let result = optimize(&[0.12, 0.08], &[0.25, 0.15], 0.18, &[Bounds::default(); 2]).unwrap();
    assert!((result.volatility - 0.18).abs() < RISK_EPS);
    assert!(result.risk_binding());
    // Weights are not forced to sum to one.
    assert!(result.invested() > 1.0);
}

#[test]
fn test_active_set_reporting() {
    let bounds = [Bounds::default(); 3];
    let result = optimize(&[0.2, 0.05, -0.01], &[0.1, 0.3, 0.2], 0.12, &bounds).unwrap();
    assert_eq!(result.at_upper(&bounds), vec![0]);
    assert_eq!(result.at_lower(&bounds), vec![2]);
    assert!(result.risk_binding());
    assert!(result.multipliers.upper[0] > 0.0);
    assert!(result.multipliers.lower[2] > 0.0);
}

#[test]
fn test_small_caps_scale_the_optimum() {
    // With lower bounds at 0 the optimum is w = t·r/σ², whose risk is
    // t·‖r/σ‖₂; r/σ = (0.5, 0.6667) so t = R / (5/6).
    let bounds = [Bounds::default(); 2];
    for &cap in &[1e-2, 1e-4, 1e-5, 1e-6] {
        let result = optimize(&[0.1, 0.2], &[0.2, 0.3], cap, &bounds);
        assert!(result.is_ok(), "cap {}: {:?}", cap, result.err());
        let result = result.unwrap();

        let t = cap * 6.0 / 5.0;
        let expected = [t * 0.1 / 0.04, t * 0.2 / 0.09];
        for (got, want) in result.weights.iter().zip(&expected) {
            assert!(
                ((got - want) / want).abs() < TOL,
                "cap {}: expected {:?}, got {:?}",
                cap,
                expected,
                result.weights
            );
        }
        assert!(result.volatility <= cap * (1.0 + 1e-6));
    }
}

#[test]
fn test_monotone_in_max_risk() {
    let r = [0.15, 0.10, 0.07, 0.22, 0.05];
    let sigma = [0.30, 0.20, 0.12, 0.45, 0.08];
    let bounds = [Bounds::default(); 5];

    let mut previous = f64::NEG_INFINITY;
    for k in 1..=12 {
        let max_risk = 0.05 * k as f64;
        let result = optimize(&r, &sigma, max_risk, &bounds).unwrap();
        assert!(
            result.expected_return >= previous - 1e-8,
            "return dropped from {} to {} at cap {}",
            previous,
            result.expected_return,
            max_risk
        );
        previous = result.expected_return;
    }
}

#[test]
fn test_infeasible_cap() {
    let bounds = [Bounds::new(0.5, 1.0).unwrap(); 2];
    match optimize(&[0.1, 0.1], &[0.2, 0.2], 0.1, &bounds) {
        Err(PortfolioError::Convergence { diagnostic }) => {
            assert!(diagnostic.contains("infeasible"), "{}", diagnostic)
        }
        other => panic!("expected infeasibility, got {:?}", other),
    }
}

#[test]
fn test_invalid_inputs() {
    let bounds = [Bounds::default(); 2];
    assert!(matches!(
        optimize(&[0.1, 0.1], &[0.2, 0.2], 0.0, &bounds),
        Err(PortfolioError::InvalidConstraint(_))
    ));
    assert!(matches!(
        optimize(&[0.1, 0.1], &[0.2, -0.2], 0.1, &bounds),
        Err(PortfolioError::InvalidConstraint(_))
    ));
    assert!(matches!(
        optimize(&[0.1, 0.1], &[0.2, 0.2], 0.1, &[(0.5, 0.2).into(), Bounds::default()]),
        Err(PortfolioError::InvalidConstraint(_))
    ));
    assert!(matches!(
        optimize(&[0.1, 0.1], &[0.2, 0.2], 0.1, &bounds[..1]),
        Err(PortfolioError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_kkt_multipliers_are_consistent() {
    // Stationarity on free assets: r_i = λ σ_i² w_i / s.
    let result = optimize(&[0.12, 0.08], &[0.25, 0.15], 0.18, &[Bounds::default(); 2]).unwrap();
    let lambda = result.multipliers.risk;
    for (i, (r, sigma)) in [(0.12, 0.25), (0.08, 0.15)].iter().enumerate() {
        let grad = sigma * sigma * result.weights[i] / result.volatility;
        assert!((r - lambda * grad).abs() < 1e-5, "asset {}", i);
    }
    assert!(result.kkt_residual <= Settings::default().tolerance);
}

#[test]
fn test_full_covariance_interior_optimum() {
    // With no active bounds the optimum is w = t Σ⁻¹r with risk on the cap.
    let sigma = DMatrix::<f64>::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
    let r = DVector::from_vec(vec![0.10, 0.12]);
    let direction = sigma.clone().try_inverse().unwrap() * &r;
    let t = 0.15 / r.dot(&direction).sqrt();
    let expected = direction * t;

    let result = PortfolioProblem::maximize_return(vec![0.10, 0.12])
        .risk_model(CovarianceRisk::new(sigma).unwrap())
        .max_risk(0.15)
        .solve()
        .unwrap();

    for i in 0..2 {
        assert!(
            (result.weights[i] - expected[i]).abs() < TOL,
            "weight {}: expected {}, got {}",
            i,
            expected[i],
            result.weights[i]
        );
    }
    assert!((result.volatility - 0.15).abs() < RISK_EPS);
}

#[test]
fn test_correlation_lowers_allocation() {
    // Positive correlation makes the same weights riskier, so less is invested.
    let vols = [0.2, 0.2];
    let uncorrelated = optimize(&[0.1, 0.1], &vols, 0.15, &[Bounds::default(); 2]).unwrap();

    let sigma = DMatrix::from_row_slice(2, 2, &[0.04, 0.03, 0.03, 0.04]);
    let correlated = PortfolioProblem::maximize_return(vec![0.1, 0.1])
        .risk_model(CovarianceRisk::new(sigma).unwrap())
        .max_risk(0.15)
        .solve()
        .unwrap();

    assert!(correlated.invested() < uncorrelated.invested());
    assert!((correlated.volatility - 0.15).abs() < RISK_EPS);
}

#[test]
fn test_solve_batch_keeps_order() {
    let problems: Vec<PortfolioProblem> = [0.05, 0.1, 0.15, 0.2]
        .iter()
        .map(|&cap| {
            PortfolioProblem::maximize_return(vec![0.1])
                .asset_risk(vec![0.4])
                .max_risk(cap)
                .build()
                .unwrap()
        })
        .collect();

    let results = solve_batch(&problems, &Settings::default());
    assert_eq!(results.len(), 4);
    for (problem, result) in problems.iter().zip(results) {
        let w = result.unwrap().weights[0];
        assert!((w - problem.max_risk() / 0.4).abs() < TOL);
    }
}

#[test]
fn test_efficient_frontier() {
    let problem = PortfolioProblem::maximize_return(vec![0.12, 0.08, 0.05])
        .asset_risk(vec![0.25, 0.15, 0.05])
        .max_risk(0.1)
        .build()
        .unwrap();
    let levels = [0.05, 0.1, 0.15, 0.2, 0.25];
    let frontier = efficient_frontier(&problem, &levels, &Settings::default()).unwrap();

    assert_eq!(frontier.len(), levels.len());
    for pair in frontier.windows(2) {
        assert!(pair[1].expected_return >= pair[0].expected_return - 1e-8);
    }
    for point in &frontier {
        assert!(point.volatility <= point.max_risk + RISK_EPS);
    }
}

#[test]
fn test_iteration_budget_failure_is_an_error() {
    let settings = Settings {
        max_iter: 1,
        ..Settings::default()
    };
    let result = optimize_with(&[0.12, 0.08], &[0.25, 0.15], 0.18, &[Bounds::default(); 2], &settings);
    assert!(matches!(result, Err(PortfolioError::Convergence { .. })));
}

#[test]
fn test_settings_from_partial_config() {
    let settings: Settings = serde_json::from_str(r#"{ "max_iter": 25, "tolerance": 1e-7 }"#).unwrap();
    assert_eq!(settings.max_iter, 25);
    assert_eq!(settings.tolerance, 1e-7);
    assert_eq!(settings.qp_max_iter, Settings::default().qp_max_iter);
}

#[test]
fn test_default_settings_round_trip() {
    let json = serde_json::to_string(&Settings::default()).unwrap();
    let back: Settings = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Settings::default());

    let limited = Settings {
        time_limit: Some(2.5),
        ..Settings::default()
    };
    let back: Settings = serde_json::from_str(&serde_json::to_string(&limited).unwrap()).unwrap();
    assert_eq!(back.time_limit, Some(2.5));
}

#[test]
fn test_time_limit_stops_iterations() {
    let settings = Settings {
        time_limit: Some(0.0),
        ..Settings::default()
    };
    match optimize_with(&[0.12, 0.08], &[0.25, 0.15], 0.18, &[Bounds::default(); 2], &settings) {
        Err(PortfolioError::Convergence { diagnostic }) => {
            assert!(diagnostic.contains("time limit"), "{}", diagnostic)
        }
        other => panic!("expected time limit error, got {:?}", other),
    }
}

#[test]
fn test_time_limit_does_not_affect_inactive_cap() {
    // The bound optimum is returned before any iteration starts.
    let settings = Settings {
        time_limit: Some(0.0),
        ..Settings::default()
    };
    let result = optimize_with(&[0.1, 0.2], &[0.1, 0.1], 1.0, &[Bounds::default(); 2], &settings).unwrap();
    assert_eq!(result.weights, vec![1.0, 1.0]);
}
