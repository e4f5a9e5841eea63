//! Error types for SVM training, prediction and persistence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported kernel type: {0}")]
    UnsupportedKernel(String),

    #[error("Unsupported svm type: {0}")]
    UnsupportedSvmType(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Parse error at line {line}: {message} (token `{token}`)")]
    ParseError {
        line: usize,
        token: String,
        message: String,
    },

    #[error("Invalid model file: {0}")]
    ModelFormat(String),

    #[error("Model has no probability information for this svm type")]
    ProbabilityUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SVMError {
    pub(crate) fn parse(line: usize, token: &str, message: impl Into<String>) -> Self {
        SVMError::ParseError {
            line,
            token: token.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
