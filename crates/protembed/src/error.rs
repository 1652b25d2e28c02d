use std::error::Error;
use std::fmt;
use std::io;

/// Errors surfaced by the extraction pipeline.
#[derive(Debug)]
pub enum ExtractError {
    /// Invalid flag combination, caught before any I/O.
    Validation(String),
    /// Model name not in the registry.
    UnknownModel(String),
    /// Checkpoint fetch or weight load failure.
    ModelLoad(String),
    /// FASTA syntax error with a 1-based line number.
    Parse { line: usize, message: String },
    /// Substring table problems.
    Substring(String),
    /// Tensor math failure while pooling or stacking.
    Tensor(String),
    Io(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExtractError::Validation(msg) => write!(f, "invalid arguments: {}", msg),
            ExtractError::UnknownModel(name) => write!(f, "unknown model '{}'", name),
            ExtractError::ModelLoad(msg) => write!(f, "failed to load model: {}", msg),
            ExtractError::Parse { line, message } => {
                write!(f, "FASTA parse error at line {}: {}", line, message)
            }
            ExtractError::Substring(msg) => write!(f, "substring table error: {}", msg),
            ExtractError::Tensor(msg) => write!(f, "tensor error: {}", msg),
            ExtractError::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl Error for ExtractError {}

impl From<io::Error> for ExtractError {
    fn from(err: io::Error) -> Self {
        ExtractError::Io(err.to_string())
    }
}
