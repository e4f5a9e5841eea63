//! Parallel Support Vector Machine training and inference
//!
//! Fits C-SVC, nu-SVC, one-class, epsilon-SVR and nu-SVR models with a
//! second-order SMO solver. Kernel rows are computed in parallel blocks and
//! kept in an LRU row cache; gradient updates and working-set scans are
//! split across the same blocks.
//!
//! ```rust,no_run
//! use parsvm::{Model, Parameter, Problem};
//!
//! # fn main() -> parsvm::Result<()> {
//! let mut param = Parameter::default().with_c(10.0);
//! let problem = Problem::load("train.libsvm", &mut param)?;
//! let model = Model::train(&problem, &param)?;
//! model.dump("train.model")?;
//!
//! let label = model.predict(problem.x(0));
//! # let _ = label;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod parallel;
pub mod probability;
pub mod qmatrix;
pub mod solver;
pub mod trainer;
pub mod utils;
pub mod validation;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, RowCache};
pub use crate::core::error::{Result, SVMError};
pub use crate::core::params::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::Problem;
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::model::Model;
pub use crate::solver::{Solution, Solver, WorkingSetStrategy};
pub use crate::trainer::{train_one, Decision};
pub use crate::validation::{cross_validation, cross_validation_report, CrossValidationReport};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
