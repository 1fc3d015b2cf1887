//! # Efficient Frontier
//!
//! $$
//! \min_{\mathbf w}\ \mathbf w^\top \Sigma \mathbf w
//! \quad\text{s.t.}\quad \mathbf w^\top\mu = r,\ \ \mathbf 1^\top\mathbf w = 1
//! $$
//!
//! Markowitz minimum-variance portfolios swept over target expected returns.

pub mod data;
pub mod engine;
pub mod error;
pub mod system;
pub mod types;

pub use data::align_return_series;
pub use data::log_returns_series;
pub use data::sample_moments;
pub use engine::Frontier;
pub use engine::FrontierEngine;
pub use engine::FrontierEngineConfig;
pub use engine::frontier;
pub use engine::frontier_with_config;
pub use error::FrontierError;
pub use error::Result;
pub use system::FrontierSystem;
pub use system::build_system;
pub use system::build_system_with_tolerance;
pub use system::solve_for_return;
pub use types::DEFAULT_TOLERANCE;
pub use types::ErrorPolicy;
pub use types::Execution;
pub use types::FrontierPoint;
pub use types::TargetSweep;
