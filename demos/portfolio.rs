//! Risk-Capped Portfolio Example
//!
//! Estimates annualized return and volatility from a year of synthetic daily
//! prices, then solves
//!
//! maximize    r' w                  (expected return)
//! subject to  sqrt(w' Σ w) <= 20%   (risk cap)
//!             0 <= w <= 1           (long-only, no leverage per asset)

use chrono::{Duration, NaiveDate};
use maxret::prelude::*;

/// Deterministic daily closes with a drift and a few overlapping cycles.
fn synthetic_prices(start: f64, drift: f64, swing: f64, phase: f64) -> Vec<f64> {
    let mut price = start;
    (0..252)
        .map(|t| {
            let t = t as f64;
            let shock = swing * ((0.7 * t + phase).sin() + 0.5 * (1.9 * t + 2.0 * phase).cos());
            price *= 1.0 + drift + shock;
            price
        })
        .collect()
}

fn main() {
    println!("=== Risk-Capped Return Maximization ===\n");

    let start = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
    let universe = [
        ("AAPL", 185.0, 0.0009, 0.012, 0.0),
        ("MSFT", 370.0, 0.0008, 0.010, 1.1),
        ("GOOG", 140.0, 0.0006, 0.014, 2.3),
        ("AMZN", 150.0, 0.0010, 0.016, 3.7),
        ("TSLA", 250.0, -0.0004, 0.030, 5.2),
    ];

    let series: Vec<PriceSeries> = universe
        .iter()
        .map(|&(ticker, p0, drift, swing, phase)| {
            let closes = synthetic_prices(p0, drift, swing, phase);
            PriceSeries::from_pairs(
                ticker,
                closes
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (start + Duration::days(i as i64), c)),
            )
        })
        .collect();

    let table = PriceTable::from_series(&series);
    let profile = estimate(&table).expect("Failed to estimate");

    println!("Asset estimates (annualized):");
    for asset in &profile.assets {
        println!(
            "  {}: return {:>7.2}%  volatility {:>6.2}%",
            asset.ticker,
            asset.expected_return * 100.0,
            asset.volatility * 100.0
        );
    }

    // Solve
    let max_risk = 0.20;
    let problem = PortfolioProblem::maximize_return(profile.expected_returns())
        .asset_risk(profile.volatilities())
        .max_risk(max_risk)
        .build()
        .expect("Invalid problem");
    let result = problem.solve().expect("Failed to solve");

    println!("\nOptimal Portfolio (max risk {:.0}%):", max_risk * 100.0);
    let allocation = Allocation::from_result(&profile.tickers(), &result).expect("Shape mismatch");
    for line in allocation.to_string().lines() {
        println!("  {}", line);
    }

    println!("\nPortfolio Statistics:");
    println!("  Expected return: {:.2}%", result.expected_return * 100.0);
    println!("  Risk (std dev): {:.2}%", result.volatility * 100.0);
    println!("  Iterations: {}", result.iterations);
    println!("  {}", result.diagnostic);

    // Same caps under the full sample covariance
    let covariance = Estimator::default()
        .sample_covariance(&table)
        .expect("Failed to estimate covariance");
    let correlated = PortfolioProblem::maximize_return(profile.expected_returns())
        .risk_model(covariance)
        .max_risk(max_risk)
        .solve()
        .expect("Failed to solve");
    println!(
        "\nWith correlations: return {:.2}%, invested {:.2}%",
        correlated.expected_return * 100.0,
        correlated.invested() * 100.0
    );

    // Efficient frontier
    println!("\n--- Efficient Frontier ---\n");

    let levels = [0.05, 0.10, 0.15, 0.20, 0.25, 0.30];
    let frontier =
        efficient_frontier(&problem, &levels, &Settings::default()).expect("Failed to solve");
    for point in frontier {
        println!(
            "  Risk cap: {:.0}%  →  Return: {:.2}%  (risk {:.2}%)",
            point.max_risk * 100.0,
            point.expected_return * 100.0,
            point.volatility * 100.0
        );
    }

    println!("\nA looser cap never lowers the attainable return.");
}
