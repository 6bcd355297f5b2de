//! Sparse feature lists and eligibility traces for linear value function approximation

/// Learners driving a value function and a trace engine
pub mod algo;

/// Data structures
pub mod ds;

/// Environment
pub mod env;

/// Sparse feature lists and dense weight tables
pub mod feature;

/// Eligibility trace engines
pub mod traces;

/// Value function traits and feature calculators
pub mod value;

mod error;
mod util;

pub use error::{Error, Result};
