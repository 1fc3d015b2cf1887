//! # Frontier Engine
//!
//! $$
//! \mathcal F = \{\operatorname{solve}(A^{-1}, r_k)\}_{k=1}^{K}
//! $$
//!
//! High-level sweep API: one shared system, many independent target solves.

use std::sync::Arc;

use ndarray::Array1;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;
use tracing::warn;

use super::error::FrontierError;
use super::error::Result;
use super::system::FrontierSystem;
use super::system::build_system_with_tolerance;
use super::types::DEFAULT_TOLERANCE;
use super::types::ErrorPolicy;
use super::types::Execution;
use super::types::FrontierPoint;
use super::types::TargetSweep;

/// Runtime configuration for [`FrontierEngine`].
#[derive(Clone, Debug)]
pub struct FrontierEngineConfig {
  /// Reaction to a target that cannot be solved.
  pub error_policy: ErrorPolicy,
  /// Sequential loop or rayon worker pool.
  pub execution: Execution,
  /// Constraint tolerance, see [`DEFAULT_TOLERANCE`].
  pub tolerance: f64,
}

impl Default for FrontierEngineConfig {
  fn default() -> Self {
    Self {
      error_policy: ErrorPolicy::BestEffort,
      execution: Execution::Parallel,
      tolerance: DEFAULT_TOLERANCE,
    }
  }
}

/// Ordered outcomes of a sweep, one per requested target.
#[derive(Clone, Debug)]
pub struct Frontier {
  outcomes: Vec<Result<FrontierPoint>>,
}

impl Frontier {
  /// Per-target outcomes in input order.
  pub fn outcomes(&self) -> &[Result<FrontierPoint>] {
    &self.outcomes
  }

  pub fn len(&self) -> usize {
    self.outcomes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outcomes.is_empty()
  }

  /// Solved points in input order.
  pub fn points(&self) -> impl Iterator<Item = &FrontierPoint> {
    self.outcomes.iter().filter_map(|o| o.as_ref().ok())
  }

  /// Failed targets in input order.
  pub fn failures(&self) -> impl Iterator<Item = &FrontierError> {
    self.outcomes.iter().filter_map(|o| o.as_ref().err())
  }

  /// True when every target was solved.
  pub fn is_complete(&self) -> bool {
    self.outcomes.iter().all(|o| o.is_ok())
  }

  /// All points, or the first failure in input order.
  pub fn into_points(self) -> Result<Vec<FrontierPoint>> {
    self.outcomes.into_iter().collect()
  }

  /// Points on the efficient branch: at or above the return of the lowest-risk point.
  pub fn efficient_points(&self) -> Vec<&FrontierPoint> {
    let Some(floor) = self.points().min_by(|a, b| a.risk.total_cmp(&b.risk)) else {
      return Vec::new();
    };
    self
      .points()
      .filter(|p| p.target_return >= floor.target_return)
      .collect()
  }
}

/// Sweep engine holding one shared [`FrontierSystem`].
///
/// Cloning the engine shares the system through its `Arc`.
#[derive(Clone, Debug)]
pub struct FrontierEngine {
  config: FrontierEngineConfig,
  system: Arc<FrontierSystem>,
}

impl FrontierEngine {
  /// Validate inputs and factor the system once.
  pub fn new(config: FrontierEngineConfig, cov: &Array2<f64>, mu: &Array1<f64>) -> Result<Self> {
    let system = build_system_with_tolerance(cov, mu, config.tolerance)?;
    Ok(Self::from_system(config, Arc::new(system)))
  }

  /// Reuse an already built system.
  pub fn from_system(config: FrontierEngineConfig, system: Arc<FrontierSystem>) -> Self {
    Self { config, system }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &FrontierEngineConfig {
    &self.config
  }

  pub fn system(&self) -> &Arc<FrontierSystem> {
    &self.system
  }

  /// Solve a single target.
  pub fn solve(&self, target_return: f64) -> Result<FrontierPoint> {
    self.system.solve_for_return(target_return)
  }

  /// Solve every target independently, keeping input order.
  ///
  /// Under [`ErrorPolicy::FailFast`] a sequential run reports the first failing
  /// target in input order, a parallel run reports whichever failure rayon
  /// observes first.
  pub fn run(&self, targets: &[f64]) -> Result<Frontier> {
    let system = self.system.as_ref();
    let solve = |&r: &f64| system.solve_for_return(r);
    let report = |err: FrontierError| {
      warn!(%err, "frontier sweep aborted");
      err
    };

    let outcomes: Vec<Result<FrontierPoint>> =
      match (self.config.execution, self.config.error_policy) {
        (Execution::Sequential, ErrorPolicy::BestEffort) => targets.iter().map(solve).collect(),
        (Execution::Parallel, ErrorPolicy::BestEffort) => targets.par_iter().map(solve).collect(),
        (Execution::Sequential, ErrorPolicy::FailFast) => targets
          .iter()
          .map(solve)
          .collect::<Result<Vec<_>>>()
          .map_err(report)?
          .into_iter()
          .map(Ok)
          .collect(),
        (Execution::Parallel, ErrorPolicy::FailFast) => targets
          .par_iter()
          .map(solve)
          .collect::<Result<Vec<_>>>()
          .map_err(report)?
          .into_iter()
          .map(Ok)
          .collect(),
      };

    let frontier = Frontier { outcomes };
    let failed = frontier.failures().count();
    if failed > 0 {
      warn!(
        targets = frontier.len(),
        failed, "frontier sweep finished with failed targets"
      );
    } else {
      info!(targets = frontier.len(), "frontier sweep finished");
    }

    Ok(frontier)
  }

  /// Expand a [`TargetSweep`] and run it.
  pub fn run_sweep(&self, sweep: &TargetSweep) -> Result<Frontier> {
    self.run(&sweep.targets())
  }

  /// Global minimum-variance point of the shared system.
  pub fn minimum_variance_point(&self) -> Option<FrontierPoint> {
    self.system.minimum_variance_point()
  }
}

/// Build the system once and solve every target with the default configuration.
pub fn frontier(cov: &Array2<f64>, mu: &Array1<f64>, targets: &[f64]) -> Result<Frontier> {
  frontier_with_config(FrontierEngineConfig::default(), cov, mu, targets)
}

/// [`frontier`] with an explicit configuration.
pub fn frontier_with_config(
  config: FrontierEngineConfig,
  cov: &Array2<f64>,
  mu: &Array1<f64>,
  targets: &[f64],
) -> Result<Frontier> {
  FrontierEngine::new(config, cov, mu)?.run(targets)
}
