use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum NNError {
    // Setup related errors
    InvalidConfiguration(String),

    // Invocation related errors
    ShapeMismatch(String),

    // Profiling related errors
    MissingColumn(String),

    // File operations
    IoError(std::io::Error),
    SerializationError(Box<bincode::ErrorKind>),
    JsonError(serde_json::Error),
    CsvError(csv::Error),

    ShapeError(ndarray::ShapeError),

    Other(String),
}

impl fmt::Display for NNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NNError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            NNError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            NNError::MissingColumn(name) => write!(f, "Missing column: {}", name),
            NNError::IoError(err) => write!(f, "I/O error: {}", err),
            NNError::SerializationError(err) => write!(f, "Serialization error: {}", err),
            NNError::JsonError(err) => write!(f, "JSON error: {}", err),
            NNError::CsvError(err) => write!(f, "CSV error: {}", err),
            NNError::ShapeError(err) => write!(f, "Shape error: {}", err),
            NNError::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl From<std::io::Error> for NNError {
    fn from(err: std::io::Error) -> NNError {
        NNError::IoError(err)
    }
}

impl From<Box<bincode::ErrorKind>> for NNError {
    fn from(err: Box<bincode::ErrorKind>) -> NNError {
        NNError::SerializationError(err)
    }
}

impl From<serde_json::Error> for NNError {
    fn from(err: serde_json::Error) -> NNError {
        NNError::JsonError(err)
    }
}

impl From<csv::Error> for NNError {
    fn from(err: csv::Error) -> NNError {
        NNError::CsvError(err)
    }
}

impl From<ndarray::ShapeError> for NNError {
    fn from(err: ndarray::ShapeError) -> NNError {
        NNError::ShapeError(err)
    }
}

impl Error for NNError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NNError::IoError(err) => Some(err),
            NNError::SerializationError(err) => Some(err),
            NNError::JsonError(err) => Some(err),
            NNError::CsvError(err) => Some(err),
            NNError::ShapeError(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NNError>;
