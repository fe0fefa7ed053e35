use thiserror::Error;

/// Top-level error for checkpoint I/O.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed checkpoint: {0}")]
    Format(#[from] FormatError),

    /// JSON has no representation for NaN or infinity, so such a value
    /// cannot be written without losing it.
    #[error("parameter {key} holds non-finite value {value} at index {index}")]
    NonFiniteValue { key: String, index: usize, value: f64 },
}

/// Ways a persisted record can fail to describe a valid checkpoint.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Syntax error, truncation, wrong field type, missing field, or an
    /// architecture / tensor that failed validation while parsing.
    #[error("{0}")]
    Json(#[source] serde_json::Error),

    #[error("unknown format tag {0:?}")]
    UnknownFormat(String),

    #[error("unsupported checkpoint version {0}")]
    UnsupportedVersion(u32),

    #[error("parameters do not match the recorded architecture: {0}")]
    Parameters(ShapeMismatch),
}

/// Rejected hyperparameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArchitectureError {
    #[error("input_size must be positive")]
    ZeroInputSize,

    #[error("output_size must be positive")]
    ZeroOutputSize,

    #[error("hidden_sizes[{index}] must be positive")]
    ZeroHiddenSize { index: usize },

    #[error("drop_p must lie in [0, 1), got {0}")]
    InvalidDropout(f64),

    /// Some weight tensor, or the total parameter count, does not fit in `usize`.
    #[error("layer sizes overflow the parameter count")]
    ParameterCountOverflow,
}

/// One key on which a parameter set and a target layout disagree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterMismatch {
    #[error("size mismatch for {key}: provided shape {provided:?}, expected {expected:?}")]
    Shape {
        key: String,
        expected: Vec<usize>,
        provided: Vec<usize>,
    },

    #[error("missing key {key} (expected shape {expected:?})")]
    Missing { key: String, expected: Vec<usize> },

    #[error("unexpected key {key} (shape {provided:?})")]
    Unexpected { key: String, provided: Vec<usize> },
}

impl ParameterMismatch {
    pub fn key(&self) -> &str {
        match self {
            ParameterMismatch::Shape { key, .. }
            | ParameterMismatch::Missing { key, .. }
            | ParameterMismatch::Unexpected { key, .. } => key,
        }
    }
}

/// Every disagreement found when assigning a parameter set into a layout.
///
/// Never empty when returned as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error(s) assigning parameters:{}", list(.mismatches))]
pub struct ShapeMismatch {
    pub mismatches: Vec<ParameterMismatch>,
}

fn list(mismatches: &[ParameterMismatch]) -> String {
    mismatches.iter().map(|m| format!("\n\t{m}")).collect()
}

impl ShapeMismatch {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.mismatches.iter().map(ParameterMismatch::key)
    }
}
