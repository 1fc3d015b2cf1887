//! # Quant
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Portfolio construction building blocks.

pub mod frontier;
