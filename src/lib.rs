//! Evaluation core for allocating early-exit network layers onto the cores of
//! a heterogeneous accelerator.
//!
//! A search proposes one core per flexible layer group. [`alloc`] turns the
//! proposal into per-node costs, hands a private copy of the workload to a
//! [`sched::Scheduler`], and reports `(energy, latency)`; [`stages`] splits
//! the finished schedule into exit stages.

pub mod alloc;
pub mod config;
pub mod cost;
pub mod error;
pub mod hardware;
pub mod ids;
pub mod report;
pub mod sched;
pub mod stages;
pub mod timeq;
pub mod workload;

pub use error::EvalError;

#[cfg(test)]
mod unit_tests;
