//! # Frontier Data Utilities
//!
//! $$
//! \hat\Sigma = \frac{1}{T-1}\sum_{t=1}^{T}(\mathbf r_t-\hat\mu)(\mathbf r_t-\hat\mu)^\top
//! $$
//!
//! Helpers that turn per-asset price or return series into `(Σ, μ)` inputs.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::error::FrontierError;
use super::error::Result;

/// Convert close prices to log-return series.
pub fn log_returns_series(closes: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
  for i in 1..closes.len() {
    if closes[i - 1] > 0.0 && closes[i] > 0.0 {
      out.push((closes[i] / closes[i - 1]).ln());
    }
  }
  out
}

/// Align return series to their common tail length, one asset per row.
pub fn align_return_series(all_returns: &[Vec<f64>]) -> Array2<f64> {
  let min_len = all_returns.iter().map(|r| r.len()).min().unwrap_or(0);
  Array2::from_shape_fn((all_returns.len(), min_len), |(i, t)| {
    let series = &all_returns[i];
    series[series.len() - min_len + t]
  })
}

/// Sample covariance (`ddof = 1`) and mean returns of aligned series.
///
/// `returns` holds one asset per row and one observation per column.
pub fn sample_moments(returns: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
  let observations = returns.ncols();
  if returns.nrows() == 0 {
    return Err(FrontierError::DimensionMismatch {
      rows: 0,
      cols: 0,
      len: 0,
    });
  }
  if observations < 2 {
    return Err(FrontierError::InsufficientObservations { observations });
  }

  let mu = returns
    .mean_axis(Axis(1))
    .ok_or(FrontierError::InsufficientObservations { observations })?;
  let cov = returns
    .cov(1.0)
    .map_err(|_| FrontierError::InsufficientObservations { observations })?;

  Ok((cov, mu))
}
