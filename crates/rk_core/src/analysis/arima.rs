//! # Seasonal ARIMA estimation
//!
//! Multiplicative SARIMA(p,d,q)(P,D,Q)s fitted by conditional sum of squares.
//!
//! ## Parameterisation
//!
//! The optimiser works on unconstrained values that are squashed into
//! partial autocorrelations (`tanh`) and expanded with the Durbin-Levinson
//! recursion. Every AR polynomial produced this way is stationary and every
//! MA polynomial invertible, so no root checks are needed after the fit.
//!
//! ## Conventions
//!
//! - AR: `w_t = Σ a_j w_{t-j} + e_t + ...`
//! - MA: `... + Σ m_j e_{t-j}`
//! - A constant is estimated (as the sample mean) only without differencing.

use super::optimize::nelder_mead;
use super::stats::normal_quantile;
use crate::error::{ForecastError, Result};
use crate::models::{Criterion, ModelSpec, Order, SeasonalOrder};
use std::f64::consts::PI;

/// Floor on the innovation variance so exact fits keep a finite likelihood.
const MIN_VARIANCE: f64 = 1e-10;
/// Keeps squashed partial autocorrelations off the unit circle.
const MAX_PACF: f64 = 0.9999;
const SIMPLEX_STEP: f64 = 0.5;

/// Estimation settings for a single fit.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub criterion: Criterion,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            criterion: Criterion::Aic,
            max_iterations: 2_000,
            tolerance: 1e-9,
        }
    }
}

/// A converged SARIMA fit over a history of observations.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub intercept: f64,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub n_effective: usize,
    pub iterations: usize,
    history: Vec<f64>,
    /// Innovations aligned to `history` (zero where conditioned away)
    residuals: Vec<f64>,
    /// Expanded AR coefficients on the differenced scale
    expanded_ar: Vec<f64>,
    /// Expanded MA coefficients
    expanded_ma: Vec<f64>,
    /// `(1-B)^d (1-B^s)^D`
    differencing: Vec<f64>,
}

/// Point forecasts with their standard errors, before any clipping.
#[derive(Debug, Clone)]
pub struct RawForecast {
    pub mean: Vec<f64>,
    pub std_err: Vec<f64>,
}

impl RawForecast {
    /// Two-sided interval half-widths at `level`.
    pub fn half_widths(&self, level: f64) -> Vec<f64> {
        let z = normal_quantile(0.5 + level / 2.0);
        self.std_err.iter().map(|s| z * s).collect()
    }
}

// ============================================================================
// Polynomial helpers
// ============================================================================

pub fn difference(values: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || values.len() <= lag {
        return Vec::new();
    }
    (lag..values.len()).map(|i| values[i] - values[i - lag]).collect()
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign * Σ c_i B^(lag * i)` as a dense coefficient vector.
fn lag_poly(coefs: &[f64], lag: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * lag + 1];
    poly[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        poly[(i + 1) * lag] = sign * c;
    }
    poly
}

fn differencing_poly(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    for _ in 0..seasonal_d {
        poly = poly_mul(&poly, &lag_poly(&[1.0], period, -1.0));
    }
    poly
}

/// Map unconstrained values to stationary AR coefficients.
pub fn constrain_stationary(raw: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = Vec::with_capacity(raw.len());
    for &x in raw {
        let r = x.tanh().clamp(-MAX_PACF, MAX_PACF);
        let k = phi.len();
        let mut next: Vec<f64> = (0..k).map(|j| phi[j] - r * phi[k - 1 - j]).collect();
        next.push(r);
        phi = next;
    }
    phi
}

/// Expanded `a_j` of `(1 - Σφ B^i)(1 - ΣΦ B^{s k})`.
fn expand_ar(ar: &[f64], seasonal_ar: &[f64], period: usize) -> Vec<f64> {
    let poly = poly_mul(&lag_poly(ar, 1, -1.0), &lag_poly(seasonal_ar, period.max(1), -1.0));
    poly.iter().skip(1).map(|c| -c).collect()
}

/// Expanded `m_j` of `(1 + Σθ B^i)(1 + ΣΘ B^{s k})`.
fn expand_ma(ma: &[f64], seasonal_ma: &[f64], period: usize) -> Vec<f64> {
    let poly = poly_mul(&lag_poly(ma, 1, 1.0), &lag_poly(seasonal_ma, period.max(1), 1.0));
    poly.into_iter().skip(1).collect()
}

/// Conditional residuals; the first `ar.len()` positions are conditioned away.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let start = ar.len();
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut pred = 0.0;
        for (j, a) in ar.iter().enumerate() {
            pred += a * w[t - j - 1];
        }
        for (j, m) in ma.iter().enumerate() {
            if t > j {
                pred += m * e[t - j - 1];
            }
        }
        e[t] = w[t] - pred;
    }
    e
}

// ============================================================================
// Fitting
// ============================================================================

struct Layout {
    p: usize,
    q: usize,
    sp: usize,
    sq: usize,
}

impl Layout {
    fn len(&self) -> usize {
        self.p + self.q + self.sp + self.sq
    }

    /// Split raw optimiser values into (φ, θ, Φ, Θ).
    fn unpack(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let (ar_raw, rest) = x.split_at(self.p);
        let (ma_raw, rest) = rest.split_at(self.q);
        let (sar_raw, sma_raw) = rest.split_at(self.sp);
        let flip = |v: Vec<f64>| v.into_iter().map(|c| -c).collect::<Vec<f64>>();
        (
            constrain_stationary(ar_raw),
            flip(constrain_stationary(ma_raw)),
            constrain_stationary(sar_raw),
            flip(constrain_stationary(&sma_raw[..self.sq])),
        )
    }
}

/// Fit SARIMA(`order`)(`seasonal`) to `values`.
///
/// Fails with [`ForecastError::ModelFit`] when differencing leaves too few
/// observations for the parameter count or the optimiser does not converge.
pub fn fit(
    values: &[f64],
    order: Order,
    seasonal: Option<SeasonalOrder>,
    options: &FitOptions,
) -> Result<FittedModel> {
    let seasonal = seasonal.filter(|s| !s.is_trivial());
    let (sp, sd, sq, period) = seasonal
        .map(|s| (s.p, s.d, s.q, s.period))
        .unwrap_or((0, 0, 0, 1));
    let label = ModelSpec::fixed(order, seasonal).to_string();

    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelFit(format!("{label}: non-finite input")));
    }

    let mut w = values.to_vec();
    for _ in 0..sd {
        w = difference(&w, period);
    }
    for _ in 0..order.d {
        w = difference(&w, 1);
    }

    let has_intercept = order.d + sd == 0;
    let intercept = if has_intercept && !w.is_empty() {
        w.iter().sum::<f64>() / w.len() as f64
    } else {
        0.0
    };
    let centered: Vec<f64> = w.iter().map(|v| v - intercept).collect();

    let layout = Layout {
        p: order.p,
        q: order.q,
        sp,
        sq,
    };
    let ar_lags = order.p + period * sp;
    let k = layout.len() + usize::from(has_intercept) + 1;
    let n_eff = centered.len().saturating_sub(ar_lags);
    if n_eff <= k + 1 {
        return Err(ForecastError::ModelFit(format!(
            "{label}: {n_eff} usable observations for {k} parameters"
        )));
    }

    let sse_of = |x: &[f64]| -> f64 {
        let (ar, ma, sar, sma) = layout.unpack(x);
        let a = expand_ar(&ar, &sar, period);
        let m = expand_ma(&ma, &sma, period);
        let e = css_residuals(&centered, &a, &m);
        let sse: f64 = e[ar_lags..].iter().map(|v| v * v).sum();
        if sse.is_finite() {
            sse
        } else {
            f64::INFINITY
        }
    };

    let start = vec![0.0; layout.len()];
    let min = nelder_mead(
        sse_of,
        &start,
        SIMPLEX_STEP,
        options.max_iterations,
        options.tolerance,
    );
    if !min.converged || !min.value.is_finite() {
        return Err(ForecastError::ModelFit(format!(
            "{label}: optimiser stopped after {} iterations without converging",
            min.iterations
        )));
    }

    let (ar, ma, seasonal_ar, seasonal_ma) = layout.unpack(&min.x);
    let expanded_ar = expand_ar(&ar, &seasonal_ar, period);
    let expanded_ma = expand_ma(&ma, &seasonal_ma, period);
    let w_residuals = css_residuals(&centered, &expanded_ar, &expanded_ma);

    let sigma2 = (min.value / n_eff as f64).max(MIN_VARIANCE);
    let n = n_eff as f64;
    let log_likelihood = -0.5 * n * ((2.0 * PI * sigma2).ln() + 1.0);

    let offset = values.len() - w.len();
    let mut residuals = vec![0.0; values.len()];
    residuals[offset..].copy_from_slice(&w_residuals);

    let mut model = FittedModel {
        spec: ModelSpec {
            order,
            seasonal,
            criterion: options.criterion,
            score: f64::NAN,
        },
        ar,
        ma,
        seasonal_ar,
        seasonal_ma,
        intercept,
        sigma2,
        log_likelihood,
        n_effective: n_eff,
        iterations: min.iterations,
        history: values.to_vec(),
        residuals,
        expanded_ar,
        expanded_ma,
        differencing: differencing_poly(order.d, sd, period),
    };
    model.spec.score = model.score(options.criterion);
    Ok(model)
}

impl FittedModel {
    /// Estimated parameters, innovation variance included.
    pub fn parameter_count(&self) -> usize {
        self.spec.parameter_count() + usize::from(self.has_intercept()) + 1
    }

    pub fn has_intercept(&self) -> bool {
        self.differencing.len() == 1
    }

    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood + 2.0 * self.parameter_count() as f64
    }

    pub fn bic(&self) -> f64 {
        let k = self.parameter_count() as f64;
        -2.0 * self.log_likelihood + k * (self.n_effective as f64).ln()
    }

    pub fn aicc(&self) -> f64 {
        let k = self.parameter_count() as f64;
        let n = self.n_effective as f64;
        let denom = n - k - 1.0;
        if denom <= 0.0 {
            return f64::INFINITY;
        }
        self.aic() + 2.0 * k * (k + 1.0) / denom
    }

    pub fn score(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Aic => self.aic(),
            Criterion::Aicc => self.aicc(),
            Criterion::Bic => self.bic(),
        }
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// AR coefficients on the level scale: ARMA AR part times differencing.
    fn level_ar(&self) -> Vec<f64> {
        let poly = poly_mul(&lag_poly(&self.expanded_ar, 1, -1.0), &self.differencing);
        poly.iter().skip(1).map(|c| -c).collect()
    }

    /// MA(∞) weights ψ_0..ψ_{h-1} of the integrated process.
    pub fn psi_weights(&self, horizon: usize) -> Vec<f64> {
        let phi = self.level_ar();
        let mut psi = Vec::with_capacity(horizon);
        for j in 0..horizon {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = self.expanded_ma.get(j - 1).copied().unwrap_or(0.0);
            for (i, c) in phi.iter().enumerate().take(j) {
                value += c * psi[j - i - 1];
            }
            psi.push(value);
        }
        psi
    }

    /// Forecast `horizon` steps past the end of the history.
    pub fn forecast(&self, horizon: usize) -> RawForecast {
        let phi = self.level_ar();
        let n = self.history.len();
        let mut z: Vec<f64> = self.history.iter().map(|v| v - self.intercept).collect();

        let mut mean = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let t = n + h - 1;
            let mut pred = 0.0;
            for (j, c) in phi.iter().enumerate() {
                if let Some(value) = t.checked_sub(j + 1).map(|idx| z[idx]) {
                    pred += c * value;
                }
            }
            for (j, m) in self.expanded_ma.iter().enumerate() {
                let lag = j + 1;
                if lag >= h {
                    if let Some(idx) = t.checked_sub(lag) {
                        pred += m * self.residuals[idx];
                    }
                }
            }
            z.push(pred);
            mean.push(pred + self.intercept);
        }

        let psi = self.psi_weights(horizon);
        let mut cumulative = 0.0;
        let std_err = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        RawForecast { mean, std_err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand::Rng;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let e = noise(n, seed);
        let mut y = vec![0.0; n];
        for t in 1..n {
            y[t] = phi * y[t - 1] + e[t];
        }
        y.iter().map(|v| v + 10.0).collect()
    }

    #[test]
    fn test_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&[1.0, 2.0, 3.0, 5.0, 7.0], 2), vec![2.0, 3.0, 4.0]);
        assert!(difference(&[1.0], 1).is_empty());
    }

    #[test]
    fn test_constrained_coefficients_are_stationary() {
        // A single coefficient equals its partial autocorrelation
        let phi = constrain_stationary(&[0.5]);
        assert!((phi[0] - 0.5f64.tanh()).abs() < 1e-12);

        // AR(2) stationarity triangle
        for raw in [[3.0, 3.0], [-3.0, 2.0], [0.2, -4.0]] {
            let phi = constrain_stationary(&raw);
            assert!(phi[1].abs() < 1.0);
            assert!(phi[0] + phi[1] < 1.0);
            assert!(phi[1] - phi[0] < 1.0);
        }
    }

    #[test]
    fn test_seasonal_expansion() {
        // (1 - 0.5B)(1 - 0.4B^4) = 1 - 0.5B - 0.4B^4 + 0.2B^5
        let a = expand_ar(&[0.5], &[0.4], 4);
        assert_eq!(a.len(), 5);
        assert!((a[0] - 0.5).abs() < 1e-12);
        assert!((a[3] - 0.4).abs() < 1e-12);
        assert!((a[4] + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_ar1_recovers_coefficient() {
        let y = ar1_series(0.6, 400, 7);
        let model = fit(&y, Order::new(1, 0, 0), None, &FitOptions::default()).unwrap();
        assert!((model.ar[0] - 0.6).abs() < 0.1, "phi = {}", model.ar[0]);
        assert!((model.intercept - 10.0).abs() < 0.5);
        assert!(model.aic().is_finite());
    }

    #[test]
    fn test_white_noise_prefers_fewer_parameters_by_bic() {
        let y: Vec<f64> = noise(300, 11).iter().map(|v| v + 5.0).collect();
        let options = FitOptions {
            criterion: Criterion::Bic,
            ..FitOptions::default()
        };
        let m0 = fit(&y, Order::new(0, 0, 0), None, &options).unwrap();
        let m2 = fit(&y, Order::new(2, 0, 0), None, &options).unwrap();
        assert!(m0.spec.score < m2.spec.score);
    }

    #[test]
    fn test_random_walk_forecast_is_flat_with_growing_error() {
        let mut y = vec![0.0; 200];
        let e = noise(200, 3);
        for t in 1..200 {
            y[t] = y[t - 1] + e[t];
        }
        let model = fit(&y, Order::new(0, 1, 0), None, &FitOptions::default()).unwrap();
        let fc = model.forecast(10);
        for value in &fc.mean {
            assert!((value - y[199]).abs() < 1e-9);
        }
        // Random walk: Var(h) = h σ²
        let ratio = fc.std_err[3] / fc.std_err[0];
        assert!((ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_psi_weights_ar1() {
        let y = ar1_series(0.5, 300, 21);
        let model = fit(&y, Order::new(1, 0, 0), None, &FitOptions::default()).unwrap();
        let psi = model.psi_weights(4);
        let phi = model.ar[0];
        assert!((psi[0] - 1.0).abs() < 1e-12);
        assert!((psi[2] - phi * phi).abs() < 1e-12);
    }

    #[test]
    fn test_too_short_series_fails() {
        let err = fit(&[1.0, 2.0, 3.0], Order::new(2, 1, 2), None, &FitOptions::default())
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelFit(_)));
    }

    #[test]
    fn test_constant_series_fits_exactly() {
        let y = vec![1.0; 20];
        let model = fit(&y, Order::new(0, 0, 0), None, &FitOptions::default()).unwrap();
        assert!((model.sigma2 - MIN_VARIANCE).abs() < 1e-20);
        let fc = model.forecast(3);
        assert!(fc.mean.iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_seasonal_fit_runs() {
        let y: Vec<f64> = (0..72)
            .map(|i| 5.0 + 3.0 * ((i % 12) as f64 / 12.0 * 2.0 * PI).sin())
            .zip(noise(72, 5))
            .map(|(s, e)| s + 0.2 * e)
            .collect();
        let model = fit(
            &y,
            Order::new(1, 0, 0),
            Some(SeasonalOrder::new(1, 0, 0, 12)),
            &FitOptions::default(),
        )
        .unwrap();
        assert!(model.seasonal_ar[0] > 0.5);
        let fc = model.forecast(12);
        assert_eq!(fc.mean.len(), 12);
    }
}
