//! # frontier-rs
//!
//! Markowitz efficient frontier solver. The Lagrangian system for a fixed
//! covariance matrix and mean-return vector is factored once, then every target
//! return is solved independently, sequentially or on a rayon pool.

pub mod quant;
