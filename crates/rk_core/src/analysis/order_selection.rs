//! # Order Selector
//!
//! Grid search over ARIMA (and optionally seasonal) orders. Each candidate
//! is an independent pure fit, so the grid fans out on the rayon pool and
//! the results are reduced in candidate order. The winner is therefore the
//! same whether the search ran in parallel or not.
//!
//! ## Ranking
//!
//! 1. Lowest criterion score
//! 2. Fewest estimated parameters
//! 3. Lexicographically smallest (order, seasonal order)

use super::arima::{fit, FitOptions, FittedModel};
use crate::config::OrderSearchConfig;
use crate::error::{ForecastError, Result};
use crate::models::{ModelSpec, Order, SeasonalOrder, TimeSeries};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, info};

pub type Candidate = (Order, Option<SeasonalOrder>);

/// All orders allowed by `config`, in lexicographic order.
pub fn candidate_grid(config: &OrderSearchConfig) -> Vec<Candidate> {
    let seasonal_orders: Vec<Option<SeasonalOrder>> = match &config.seasonal {
        None => vec![None],
        Some(s) => {
            let mut orders = Vec::new();
            for p in 0..=s.max_p {
                for d in 0..=s.max_d {
                    for q in 0..=s.max_q {
                        let order = SeasonalOrder::new(p, d, q, s.period);
                        orders.push((!order.is_trivial()).then_some(order));
                    }
                }
            }
            orders
        }
    };

    let mut grid = Vec::new();
    for p in 0..=config.max_p {
        for d in 0..=config.max_d {
            for q in 0..=config.max_q {
                if p + d + q > config.max_total_order {
                    continue;
                }
                for seasonal in &seasonal_orders {
                    grid.push((Order::new(p, d, q), *seasonal));
                }
            }
        }
    }
    grid
}

fn fit_options(config: &OrderSearchConfig) -> FitOptions {
    FitOptions {
        criterion: config.criterion,
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
    }
}

fn fit_candidate(values: &[f64], candidate: &Candidate, options: &FitOptions) -> Option<FittedModel> {
    let (order, seasonal) = *candidate;
    match fit(values, order, seasonal, options) {
        Ok(model) if model.spec.score.is_finite() => {
            debug!(model = %model.spec, score = model.spec.score, "candidate fitted");
            Some(model)
        }
        Ok(model) => {
            debug!(model = %model.spec, "candidate score not finite, skipped");
            None
        }
        Err(err) => {
            debug!(error = %err, "candidate skipped");
            None
        }
    }
}

/// Deterministic ranking; `Less` means `a` is preferred.
fn compare(a: &FittedModel, b: &FittedModel) -> Ordering {
    a.spec
        .score
        .total_cmp(&b.spec.score)
        .then_with(|| a.parameter_count().cmp(&b.parameter_count()))
        .then_with(|| (a.spec.order, a.spec.seasonal).cmp(&(b.spec.order, b.spec.seasonal)))
}

/// Best model under the ranking; `None` when `models` is empty.
fn best_of(models: impl IntoIterator<Item = FittedModel>) -> Option<FittedModel> {
    models.into_iter().min_by(compare)
}

/// Fit the whole grid and return the best converged model.
pub fn select_model(values: &[f64], config: &OrderSearchConfig) -> Result<FittedModel> {
    let grid = candidate_grid(config);
    let options = fit_options(config);

    let fitted: Vec<Option<FittedModel>> = if config.parallel {
        grid.par_iter()
            .map(|candidate| fit_candidate(values, candidate, &options))
            .collect()
    } else {
        grid.iter()
            .map(|candidate| fit_candidate(values, candidate, &options))
            .collect()
    };

    let converged = fitted.iter().filter(|m| m.is_some()).count();
    let best = best_of(fitted.into_iter().flatten()).ok_or_else(|| {
        ForecastError::ModelFit(format!(
            "none of {} candidate orders converged on {} observations",
            grid.len(),
            values.len()
        ))
    })?;

    info!(
        model = %best.spec,
        criterion = %best.spec.criterion,
        score = best.spec.score,
        converged,
        candidates = grid.len(),
        "order selected"
    );
    Ok(best)
}

/// Best model specification for `series`.
pub fn select_order(series: &TimeSeries, config: &OrderSearchConfig) -> Result<ModelSpec> {
    select_model(&series.values(), config).map(|model| model.spec)
}
