//! Problem loading
//!
//! Reads labeled examples in the libsvm text format into a [`Problem`],
//! the training input of every SVM formulation.

pub mod libsvm;

pub use self::libsvm::*;
