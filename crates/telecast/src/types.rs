// crates/telecast/src/types.rs
use std::fmt;
use std::error;
use televar::Error as VarError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// An error occurred within the underlying wire value layer.
    Var(VarError),
    /// The host value cannot satisfy the expected signature.
    TypeMismatch {
        expected: String,
        got: String,
    },
    /// An element of a list/vector failed conversion. `index` is zero-based.
    Element {
        index: usize,
        source: Box<Error>,
    },
    /// The argument count does not match the signature count.
    Arity {
        expected: usize,
        actual: usize,
    },
}

impl From<VarError> for Error {
    fn from(err: VarError) -> Self {
        Error::Var(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Var(e) => write!(f, "Wire value error: {}", e),
            Error::TypeMismatch { expected, got } => write!(f, "Type mismatch: expected {}, got {}", expected, got),
            Error::Element { index, source } => write!(f, "Element {}: {}", index, source),
            Error::Arity { expected, actual } => write!(f, "Arity mismatch: expected {} values, got {}", expected, actual),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Var(e) => Some(e),
            Error::Element { source, .. } => Some(source),
            _ => None,
        }
    }
}
