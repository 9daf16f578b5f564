//! Classical additive decomposition: observed = trend + seasonal + residual.

use crate::models::{Decomposition, TimeSeries};
use tracing::debug;

/// Decompose `series` with seasonal `period`.
///
/// Series shorter than two full periods get a zero seasonal component and a
/// centred 3-point trend, reported with `period = None`. Trend and residual
/// are `None` at the edges where the moving average is undefined.
pub fn decompose(series: &TimeSeries, period: usize) -> Decomposition {
    let observed = series.values();
    let n = observed.len();

    if period < 2 || n < 2 * period {
        debug!(len = n, period, "series too short for seasonal decomposition");
        let trend = centred_average(&observed, 3);
        let residual = residual_of(&observed, &trend, &vec![0.0; n]);
        return Decomposition {
            period: None,
            seasonal: vec![0.0; n],
            observed,
            trend,
            residual,
        };
    }

    let trend = centred_average(&observed, period);

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, (value, t)) in observed.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            sums[i % period] += value - t;
            counts[i % period] += 1;
        }
    }
    let mut index: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let level = index.iter().sum::<f64>() / period as f64;
    for v in &mut index {
        *v -= level;
    }

    let seasonal: Vec<f64> = (0..n).map(|i| index[i % period]).collect();
    let residual = residual_of(&observed, &trend, &seasonal);

    Decomposition {
        period: Some(period),
        observed,
        trend,
        seasonal,
        residual,
    }
}

/// Centred moving average; even windows use the 2×m weighting.
fn centred_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = window / 2;
    let mut out = vec![None; n];
    if window == 0 || n < window + (1 - window % 2) {
        return out;
    }

    for (i, slot) in out.iter_mut().enumerate().take(n - half).skip(half) {
        let avg = if window % 2 == 1 {
            values[i - half..=i + half].iter().sum::<f64>() / window as f64
        } else {
            let inner: f64 = values[i - half + 1..i + half].iter().sum();
            (inner + 0.5 * (values[i - half] + values[i + half])) / window as f64
        };
        *slot = Some(avg);
    }
    out
}

fn residual_of(observed: &[f64], trend: &[Option<f64>], seasonal: &[f64]) -> Vec<Option<f64>> {
    observed
        .iter()
        .zip(trend)
        .zip(seasonal)
        .map(|((o, t), s)| t.map(|t| o - t - s))
        .collect()
}
