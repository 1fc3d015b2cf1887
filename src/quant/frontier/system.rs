//! # Frontier System
//!
//! $$
//! \begin{bmatrix} 2\Sigma & \mu & \mathbf 1 \\ \mu^\top & 0 & 0 \\ \mathbf 1^\top & 0 & 0 \end{bmatrix}
//! \begin{bmatrix} \mathbf w \\ -\lambda \\ -\gamma \end{bmatrix}
//! =
//! \begin{bmatrix} \mathbf 0 \\ r \\ 1 \end{bmatrix}
//! $$
//!
//! First-order conditions of `min wᵀΣw` subject to `wᵀμ = r` and `Σwᵢ = 1`.
//! The augmented matrix does not depend on `r`, so it is factored once and the
//! resulting [`FrontierSystem`] is shared read-only by every target solve.

use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use super::error::FrontierError;
use super::error::Result;
use super::types::DEFAULT_TOLERANCE;
use super::types::FrontierPoint;

#[derive(Clone, Debug)]
enum Factorization {
  /// Inverse of the full `(n+2)` system.
  Full(DMatrix<f64>),
  /// Inverse of the budget-only `(n+1)` system used when `μ` is constant.
  /// Only `common_return` is attainable.
  BudgetOnly {
    inverse: DMatrix<f64>,
    common_return: f64,
  },
  Singular,
}

/// Target-independent part of the Lagrangian system for one `(Σ, μ)` pair.
///
/// Immutable after construction and `Send + Sync`, so a single instance can be
/// borrowed by a rayon pool or shared through an `Arc`.
#[derive(Clone, Debug)]
pub struct FrontierSystem {
  cov: Array2<f64>,
  mu: Array1<f64>,
  tolerance: f64,
  /// `max|μᵢ|`; the factored system works in units of `μ / return_scale`.
  return_scale: f64,
  factorization: Factorization,
}

/// Build the system with [`DEFAULT_TOLERANCE`].
pub fn build_system(cov: &Array2<f64>, mu: &Array1<f64>) -> Result<FrontierSystem> {
  build_system_with_tolerance(cov, mu, DEFAULT_TOLERANCE)
}

/// Validate `(Σ, μ)` and factor the augmented matrix once.
pub fn build_system_with_tolerance(
  cov: &Array2<f64>,
  mu: &Array1<f64>,
  tolerance: f64,
) -> Result<FrontierSystem> {
  let (rows, cols) = cov.dim();
  let n = mu.len();
  if n == 0 || rows != cols || rows != n {
    return Err(FrontierError::DimensionMismatch {
      rows,
      cols,
      len: n,
    });
  }

  if !cov.iter().chain(mu.iter()).all(|v| v.is_finite()) {
    return Err(FrontierError::NonFiniteInput);
  }

  let scale = max_abs(cov.iter()).max(1.0);
  for i in 0..n {
    for j in (i + 1)..n {
      if (cov[[i, j]] - cov[[j, i]]).abs() > tolerance * scale {
        return Err(FrontierError::AsymmetricCovariance { row: i, col: j });
      }
    }
  }

  let cov = (cov + &cov.t()) * 0.5;
  let sigma = DMatrix::from_fn(n, n, |i, j| cov[[i, j]]);
  let min_eigenvalue = sigma.symmetric_eigenvalues().min();
  if min_eigenvalue < -tolerance * scale {
    return Err(FrontierError::NotPositiveSemiDefinite { min_eigenvalue });
  }

  // Rescaling Σ and μ to unit magnitude leaves the minimizer unchanged and
  // keeps the rank cutoff independent of the return units.
  let risk_scale = unit_scale(max_abs(cov.iter()));
  let return_scale = unit_scale(max_abs(mu.iter()));
  let scaled_sigma = &sigma / risk_scale;
  let scaled_mu = mu / return_scale;

  let factorization = match invert(augmented_matrix(&scaled_sigma, &scaled_mu)) {
    Some(inverse) => Factorization::Full(inverse),
    None if is_constant(mu, tolerance) => match invert(budget_matrix(&scaled_sigma)) {
      Some(inverse) => Factorization::BudgetOnly {
        inverse,
        common_return: mu.mean().unwrap_or(0.0),
      },
      None => Factorization::Singular,
    },
    None => Factorization::Singular,
  };

  match &factorization {
    Factorization::Full(_) => debug!(assets = n, "built full frontier system"),
    Factorization::BudgetOnly { common_return, .. } => debug!(
      assets = n,
      common_return, "mean returns are constant, only the common return is attainable"
    ),
    Factorization::Singular => {
      warn!(assets = n, "Lagrangian system is singular, every target will fail")
    }
  }

  Ok(FrontierSystem {
    cov,
    mu: mu.clone(),
    tolerance,
    return_scale,
    factorization,
  })
}

/// Minimum-variance portfolio for a single target return.
pub fn solve_for_return(system: &FrontierSystem, target_return: f64) -> Result<FrontierPoint> {
  system.solve_for_return(target_return)
}

impl FrontierSystem {
  /// Number of assets `n`.
  pub fn assets(&self) -> usize {
    self.mu.len()
  }

  /// Symmetrized covariance the system was built from.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.cov
  }

  pub fn mean_returns(&self) -> &Array1<f64> {
    &self.mu
  }

  pub fn tolerance(&self) -> f64 {
    self.tolerance
  }

  /// True when `μ` is constant and the return constraint collapses into the budget.
  pub fn is_degenerate(&self) -> bool {
    matches!(self.factorization, Factorization::BudgetOnly { .. })
  }

  /// True when no target return can be solved.
  pub fn is_singular(&self) -> bool {
    matches!(self.factorization, Factorization::Singular)
  }

  /// Solve `A x = [0, …, 0, r, 1]` and keep the first `n` components as weights.
  ///
  /// `A` and `r` are expressed in the rescaled units chosen at build time.
  pub fn solve_for_return(&self, target_return: f64) -> Result<FrontierPoint> {
    if !target_return.is_finite() {
      return Err(FrontierError::InvalidTargetRange { target_return });
    }

    let n = self.assets();
    let x = match &self.factorization {
      Factorization::Full(inverse) => {
        let mut rhs = DVector::zeros(n + 2);
        rhs[n] = target_return / self.return_scale;
        rhs[n + 1] = 1.0;
        inverse * rhs
      }
      Factorization::BudgetOnly {
        inverse,
        common_return,
      } => {
        if (target_return - common_return).abs() > self.tolerance * common_return.abs().max(1.0) {
          return Err(FrontierError::SingularSystem { target_return });
        }
        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = 1.0;
        inverse * rhs
      }
      Factorization::Singular => return Err(FrontierError::SingularSystem { target_return }),
    };

    let weights: Array1<f64> = x.iter().take(n).copied().collect();
    self.check_constraints(target_return, &weights)?;

    let risk = weights.dot(&self.cov.dot(&weights)).max(0.0);
    Ok(FrontierPoint::new(target_return, weights, risk))
  }

  /// Lazily solve each target in order.
  pub fn sweep<'a, I>(&'a self, targets: I) -> impl Iterator<Item = Result<FrontierPoint>> + 'a
  where
    I: IntoIterator<Item = f64>,
    I::IntoIter: 'a,
  {
    targets.into_iter().map(move |r| self.solve_for_return(r))
  }

  /// Return of the global minimum-variance portfolio.
  ///
  /// Weights are affine in the target, `w(r) = r·a + c`, so the risk is the
  /// quadratic `r²·aᵀΣa + 2r·aᵀΣc + cᵀΣc`. `None` when the risk is flat in `r`
  /// or the system is singular.
  pub fn minimum_variance_return(&self) -> Option<f64> {
    match &self.factorization {
      Factorization::Full(inverse) => {
        let n = self.assets();
        let a: Array1<f64> = (0..n).map(|i| inverse[(i, n)]).collect();
        let c: Array1<f64> = (0..n).map(|i| inverse[(i, n + 1)]).collect();
        let sigma_a = self.cov.dot(&a);
        let quad = a.dot(&sigma_a);
        let floor = f64::EPSILON * max_abs(self.cov.iter()) * a.dot(&a);
        if quad > floor {
          Some(-self.return_scale * sigma_a.dot(&c) / quad)
        } else {
          None
        }
      }
      Factorization::BudgetOnly { common_return, .. } => Some(*common_return),
      Factorization::Singular => None,
    }
  }

  /// Global minimum-variance point, when it exists.
  pub fn minimum_variance_point(&self) -> Option<FrontierPoint> {
    self
      .minimum_variance_return()
      .and_then(|r| self.solve_for_return(r).ok())
  }

  fn check_constraints(&self, target_return: f64, weights: &Array1<f64>) -> Result<()> {
    if !weights.iter().all(|w| w.is_finite()) {
      return Err(FrontierError::InvalidTargetRange { target_return });
    }

    let l1: f64 = weights.iter().map(|w| w.abs()).sum();
    let budget_gap = (weights.sum() - 1.0).abs();
    let return_gap = (weights.dot(&self.mu) - target_return).abs();
    let mu_inf = max_abs(self.mu.iter());

    if budget_gap > self.tolerance * l1.max(1.0)
      || return_gap > self.tolerance * (l1 * mu_inf).max(1.0)
    {
      warn!(
        target_return,
        budget_gap, return_gap, "solve violates constraints beyond tolerance"
      );
      return Err(FrontierError::InvalidTargetRange { target_return });
    }

    Ok(())
  }
}

fn augmented_matrix(sigma: &DMatrix<f64>, mu: &Array1<f64>) -> DMatrix<f64> {
  let n = mu.len();
  let mut a = DMatrix::zeros(n + 2, n + 2);
  for i in 0..n {
    for j in 0..n {
      a[(i, j)] = 2.0 * sigma[(i, j)];
    }
    a[(i, n)] = mu[i];
    a[(i, n + 1)] = 1.0;
    a[(n, i)] = mu[i];
    a[(n + 1, i)] = 1.0;
  }
  a
}

fn budget_matrix(sigma: &DMatrix<f64>) -> DMatrix<f64> {
  let n = sigma.nrows();
  let mut b = DMatrix::zeros(n + 1, n + 1);
  for i in 0..n {
    for j in 0..n {
      b[(i, j)] = 2.0 * sigma[(i, j)];
    }
    b[(i, n)] = 1.0;
    b[(n, i)] = 1.0;
  }
  b
}

/// SVD-based inverse; `None` when the numerical rank is deficient.
fn invert(matrix: DMatrix<f64>) -> Option<DMatrix<f64>> {
  let dim = matrix.nrows();
  let svd = matrix.svd(true, true);
  let sigma_max = svd.singular_values.max();
  let cutoff = f64::EPSILON * dim as f64 * sigma_max;
  if sigma_max <= 0.0 || svd.rank(cutoff) < dim {
    return None;
  }
  svd.pseudo_inverse(cutoff).ok()
}

fn unit_scale(magnitude: f64) -> f64 {
  if magnitude > 0.0 { magnitude } else { 1.0 }
}

fn is_constant(mu: &Array1<f64>, tolerance: f64) -> bool {
  let min = mu.iter().copied().fold(f64::INFINITY, f64::min);
  let max = mu.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  max - min <= tolerance * max_abs(mu.iter()).max(1.0)
}

fn max_abs<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
  values.fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;

  fn three_assets() -> (Array2<f64>, Array1<f64>) {
    let cov = array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.16]];
    let mu = array![0.08, 0.1, 0.12];
    (cov, mu)
  }

  fn assert_constraints(point: &FrontierPoint, mu: &Array1<f64>) {
    assert_abs_diff_eq!(point.weights.sum(), 1.0, epsilon = DEFAULT_TOLERANCE);
    assert_abs_diff_eq!(
      point.weights.dot(mu),
      point.target_return,
      epsilon = DEFAULT_TOLERANCE
    );
    assert!(point.risk >= 0.0);
  }

  #[test]
  fn two_uncorrelated_assets_split_evenly() {
    let cov = Array2::eye(2);
    let mu = array![0.01, 0.05];
    let system = build_system(&cov, &mu).unwrap();
    let point = system.solve_for_return(0.03).unwrap();

    assert_abs_diff_eq!(point.weights[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(point.weights[1], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(point.risk, 0.5, epsilon = 1e-12);
    assert_constraints(&point, &mu);
  }

  #[test]
  fn three_asset_points_satisfy_constraints() {
    let (cov, mu) = three_assets();
    let system = build_system(&cov, &mu).unwrap();

    for r in [0.06, 0.08, 0.095, 0.11, 0.12, 0.14] {
      let point = system.solve_for_return(r).unwrap();
      assert_constraints(&point, &mu);
    }
  }

  #[test]
  fn solve_is_pure() {
    let (cov, mu) = three_assets();
    let system = build_system(&cov, &mu).unwrap();

    let first = solve_for_return(&system, 0.1).unwrap();
    let second = solve_for_return(&system, 0.1).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn risk_is_convex_along_an_even_sweep() {
    let (cov, mu) = three_assets();
    let system = build_system(&cov, &mu).unwrap();
    let targets = Array1::linspace(0.05, 0.15, 21);
    let risks: Vec<f64> = system
      .sweep(targets.iter().copied())
      .map(|p| p.unwrap().risk)
      .collect();

    for w in risks.windows(3) {
      assert!(w[0] - 2.0 * w[1] + w[2] >= -1e-12);
    }
  }

  #[test]
  fn efficient_branch_risk_grows_with_return() {
    let (cov, mu) = three_assets();
    let system = build_system(&cov, &mu).unwrap();
    let gmv = system.minimum_variance_point().unwrap();
    let targets = Array1::linspace(gmv.target_return, 0.2, 10);
    let points: Vec<FrontierPoint> = system
      .sweep(targets.iter().copied())
      .map(|p| p.unwrap())
      .collect();

    for pair in points.windows(2) {
      assert!(pair[1].risk >= pair[0].risk - 1e-15);
    }
    assert!(points.iter().all(|p| p.risk >= gmv.risk - 1e-15));
  }

  #[test]
  fn minimum_variance_of_identity_is_equal_weight() {
    let system = build_system(&Array2::eye(2), &array![0.01, 0.05]).unwrap();
    let r = system.minimum_variance_return().unwrap();
    let point = system.minimum_variance_point().unwrap();

    assert_abs_diff_eq!(r, 0.03, epsilon = 1e-12);
    assert_abs_diff_eq!(point.risk, 0.5, epsilon = 1e-12);
  }

  #[test]
  fn single_asset_only_attains_its_own_return() {
    let cov = array![[0.09]];
    let mu = array![0.07];
    let system = build_system(&cov, &mu).unwrap();

    assert!(system.is_degenerate());
    let point = system.solve_for_return(0.07).unwrap();
    assert_abs_diff_eq!(point.weights[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(point.risk, 0.09, epsilon = 1e-12);

    assert_eq!(
      system.solve_for_return(0.08),
      Err(FrontierError::SingularSystem {
        target_return: 0.08
      })
    );
    assert_abs_diff_eq!(system.minimum_variance_return().unwrap(), 0.07);
  }

  #[test]
  fn zero_covariance_two_assets_is_riskless() {
    let mu = array![0.01, 0.05];
    let system = build_system(&Array2::zeros((2, 2)), &mu).unwrap();

    for r in [0.01, 0.02, 0.04, 0.05] {
      let point = system.solve_for_return(r).unwrap();
      assert_eq!(point.risk, 0.0);
      assert_constraints(&point, &mu);
    }
    assert_eq!(system.minimum_variance_return(), None);
  }

  #[traced_test]
  #[test]
  fn zero_covariance_three_assets_is_singular() {
    let system = build_system(&Array2::zeros((3, 3)), &array![0.01, 0.02, 0.03]).unwrap();

    assert!(system.is_singular());
    assert!(logs_contain("singular"));
    assert_eq!(
      system.solve_for_return(0.02),
      Err(FrontierError::SingularSystem {
        target_return: 0.02
      })
    );
    assert!(system.minimum_variance_point().is_none());
  }

  #[test]
  fn dimension_mismatch_is_rejected() {
    let err = build_system(&Array2::eye(3), &array![0.1, 0.2]).unwrap_err();
    assert_eq!(
      err,
      FrontierError::DimensionMismatch {
        rows: 3,
        cols: 3,
        len: 2
      }
    );

    let err = build_system(&Array2::zeros((0, 0)), &Array1::zeros(0)).unwrap_err();
    assert!(matches!(err, FrontierError::DimensionMismatch { len: 0, .. }));

    let err = build_system(&Array2::zeros((2, 3)), &array![0.1, 0.2]).unwrap_err();
    assert!(matches!(err, FrontierError::DimensionMismatch { .. }));
  }

  #[test]
  fn invalid_covariances_are_rejected() {
    let mu = array![0.01, 0.02];

    let asymmetric = array![[1.0, 0.5], [0.1, 1.0]];
    assert_eq!(
      build_system(&asymmetric, &mu).unwrap_err(),
      FrontierError::AsymmetricCovariance { row: 0, col: 1 }
    );

    let indefinite = array![[1.0, 2.0], [2.0, 1.0]];
    assert!(matches!(
      build_system(&indefinite, &mu).unwrap_err(),
      FrontierError::NotPositiveSemiDefinite { .. }
    ));

    let non_finite = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
    assert_eq!(
      build_system(&non_finite, &mu).unwrap_err(),
      FrontierError::NonFiniteInput
    );
  }

  #[test]
  fn non_finite_target_is_out_of_range() {
    let system = build_system(&Array2::eye(2), &array![0.01, 0.05]).unwrap();

    assert_eq!(
      system.solve_for_return(f64::INFINITY),
      Err(FrontierError::InvalidTargetRange {
        target_return: f64::INFINITY
      })
    );
    assert!(system.solve_for_return(f64::NAN).is_err());
  }

  #[test]
  fn overflowing_target_yields_invalid_range() {
    let system = build_system(&Array2::eye(2), &array![0.01, 0.05]).unwrap();

    assert_eq!(
      system.solve_for_return(1e308),
      Err(FrontierError::InvalidTargetRange {
        target_return: 1e308
      })
    );
  }

  #[traced_test]
  #[test]
  fn constraint_residuals_beyond_tolerance_are_rejected() {
    let system = build_system(&Array2::eye(2), &array![0.01, 0.05]).unwrap();

    assert!(system.check_constraints(0.03, &array![0.5, 0.5]).is_ok());
    assert_eq!(
      system.check_constraints(0.03, &array![0.5, 0.6]),
      Err(FrontierError::InvalidTargetRange {
        target_return: 0.03
      })
    );
    assert_eq!(
      system.check_constraints(0.04, &array![0.5, 0.5]),
      Err(FrontierError::InvalidTargetRange {
        target_return: 0.04
      })
    );
    assert!(logs_contain("violates constraints"));
  }

  #[test]
  fn tiny_units_keep_full_precision() {
    let cov = Array2::eye(3) * 1e-12;
    let mu = array![1e-6, 2e-6, 3e-6];
    let system = build_system(&cov, &mu).unwrap();
    let point = system.solve_for_return(2e-6).unwrap();

    for w in point.weights.iter() {
      assert_abs_diff_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(point.risk, 1e-12 / 3.0, epsilon = 1e-24);
  }

  #[test]
  fn singularity_does_not_depend_on_units() {
    let cov = Array2::eye(3) * 1e-30;
    let mu = array![1e-9, 2e-9, 3e-9];
    let system = build_system(&cov, &mu).unwrap();

    assert!(!system.is_singular());
    let point = system.solve_for_return(2e-9).unwrap();
    for w in point.weights.iter() {
      assert_abs_diff_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(
      system.minimum_variance_return().unwrap(),
      2e-9,
      epsilon = 1e-20
    );
  }
}
