//! nbodysim - Newtonian N-body gravity on host cores and on the GPU.
//!
//! The crate advances point masses one time step at a time on either of two
//! interchangeable backends: a rayon-parallel host engine and a wgpu compute
//! engine. Both can run side by side for cross-checking, and a benchmark
//! harness sweeps body counts and logs timing to CSV.

pub mod bench;
pub mod cli;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gpu;
pub mod host;
pub mod metrics;
pub mod presentation;
pub mod simulation;
pub mod state;
pub mod vector;
