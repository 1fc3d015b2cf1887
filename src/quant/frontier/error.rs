//! # Frontier Errors
//!
//! Error taxonomy shared by system construction, per-target solves and sweeps.

use thiserror::Error;

/// Error type for frontier construction and solves.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrontierError {
  /// Covariance is not square, disagrees with the mean vector, or is empty.
  #[error("dimension mismatch: covariance is {rows}x{cols}, mean vector has {len} entries")]
  DimensionMismatch { rows: usize, cols: usize, len: usize },

  /// Covariance or mean vector contains NaN or an infinity.
  #[error("covariance and mean returns must contain only finite values")]
  NonFiniteInput,

  /// Covariance differs from its transpose beyond tolerance.
  #[error("covariance is not symmetric at ({row}, {col})")]
  AsymmetricCovariance { row: usize, col: usize },

  /// Covariance has a materially negative eigenvalue.
  #[error("covariance is not positive semi-definite (min eigenvalue {min_eigenvalue:e})")]
  NotPositiveSemiDefinite { min_eigenvalue: f64 },

  /// Lagrangian system cannot be solved for this target return.
  #[error("Lagrangian system is singular for target return {target_return}")]
  SingularSystem { target_return: f64 },

  /// Target return is non-finite or too far out for a trustworthy solve.
  #[error("target return {target_return} is outside the solvable range")]
  InvalidTargetRange { target_return: f64 },

  /// Too few observations to estimate sample moments.
  #[error("at least 2 observations are required, got {observations}")]
  InsufficientObservations { observations: usize },
}

impl FrontierError {
  /// Target return a per-point failure refers to, if any.
  pub fn target_return(&self) -> Option<f64> {
    match self {
      Self::SingularSystem { target_return } | Self::InvalidTargetRange { target_return } => {
        Some(*target_return)
      }
      _ => None,
    }
  }
}

/// Result type for frontier operations.
pub type Result<T> = std::result::Result<T, FrontierError>;
