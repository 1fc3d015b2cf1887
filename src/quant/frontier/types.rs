//! # Frontier Types
//!
//! $$
//! \mathcal F = \{(r_k, \mathbf w_k, \mathbf w_k^\top \Sigma \mathbf w_k)\}_{k=1}^{K}
//! $$
//!
//! Shared enums, sweep specifications and result records for frontier solves.

use impl_new_derive::ImplNew;
use ndarray::Array1;
use tracing::warn;

/// Numerical tolerance `ε` for the budget and target-return constraints.
///
/// Every point returned by a solve satisfies
/// `|Σwᵢ - 1| <= ε·max(1, ‖w‖₁)` and `|wᵀμ - r| <= ε·max(1, ‖w‖₁·‖μ‖∞)`.
/// For well-scaled inputs this is an absolute bound of `1e-9`.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// One point on the efficient frontier.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  /// Requested portfolio expected return.
  pub target_return: f64,
  /// Minimum-variance weights, one per asset, summing to one.
  pub weights: Array1<f64>,
  /// Portfolio variance `wᵀΣw`.
  pub risk: f64,
}

impl FrontierPoint {
  /// Portfolio standard deviation.
  pub fn volatility(&self) -> f64 {
    self.risk.sqrt()
  }

  /// Realised expected return `wᵀμ` for the supplied mean vector.
  pub fn expected_return(&self, mu: &Array1<f64>) -> f64 {
    self.weights.dot(mu)
  }

  /// Sharpe ratio computed as `(wᵀμ - risk_free) / volatility`.
  pub fn sharpe(&self, mu: &Array1<f64>, risk_free: f64) -> f64 {
    let volatility = self.volatility();
    if volatility > 1e-15 {
      (self.expected_return(mu) - risk_free) / volatility
    } else {
      0.0
    }
  }
}

/// How a sweep reacts to a target return that cannot be solved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
  /// Abort the sweep on the first failing target.
  FailFast,
  /// Keep going and report failures next to the solved points.
  #[default]
  BestEffort,
}

impl ErrorPolicy {
  /// Parse a string into an [`ErrorPolicy`].
  ///
  /// Unrecognised names fall back to [`ErrorPolicy::BestEffort`] with a warning.
  pub fn from_str(s: &str) -> Self {
    match s.trim().to_lowercase().replace('_', "-").as_str() {
      "fail-fast" | "failfast" | "strict" => Self::FailFast,
      "best-effort" | "besteffort" | "lenient" => Self::BestEffort,
      other => {
        warn!(policy = other, "unrecognised error policy, using best-effort");
        Self::BestEffort
      }
    }
  }
}

/// Scheduling of the per-target solves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Execution {
  /// Plain loop on the calling thread.
  Sequential,
  /// Rayon parallel map over the targets.
  #[default]
  Parallel,
}

/// Specification of the target returns to sweep over.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetSweep {
  /// `count` evenly spaced targets from `min` to `max` inclusive.
  Linspace { min: f64, max: f64, count: usize },
  /// Targets given verbatim, in order.
  Explicit(Vec<f64>),
}

impl TargetSweep {
  /// Evenly spaced targets between the smallest and largest mean return.
  pub fn observed(mu: &Array1<f64>, count: usize) -> Self {
    if mu.is_empty() {
      return Self::Linspace {
        min: 0.0,
        max: 0.0,
        count: 0,
      };
    }
    let min = mu.iter().copied().fold(f64::INFINITY, f64::min);
    let max = mu.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Self::Linspace { min, max, count }
  }

  /// Expand into the ordered list of target returns.
  pub fn targets(&self) -> Vec<f64> {
    match self {
      Self::Linspace { min, max, count } => match *count {
        0 => Vec::new(),
        1 => vec![*min],
        n => Array1::linspace(*min, *max, n).to_vec(),
      },
      Self::Explicit(targets) => targets.clone(),
    }
  }

  /// Number of targets the sweep expands to.
  pub fn len(&self) -> usize {
    match self {
      Self::Linspace { count, .. } => *count,
      Self::Explicit(targets) => targets.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
