//! Errors surfaced by hashtable operations.

use std::fmt;

use crate::dtype::DataType;
use crate::tensor::TensorError;

/// Recoverable hashtable failures.
///
/// The engine treats mismatched key/value shapes as a caller bug and panics
/// (see [`crate::tensor::matching_flat_size`]); the op kernels check shapes
/// up front and return [`LookupError::ShapeMismatch`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// `lookup` ran before any successful `import`.
    NotInitialized,
    /// The factory has no table for this key/value pair.
    UnsupportedTypes { key: DataType, value: DataType },
    /// No table is filed under this resource id.
    MissingResource(i32),
    /// The handle tensor does not hold exactly one id; carries its shape.
    InvalidHandle(Vec<usize>),
    /// Tensor dtypes do not match the table.
    TypeMismatch {
        expected: (DataType, DataType),
        actual: (DataType, DataType),
    },
    /// Key and value tensor shapes differ.
    ShapeMismatch { keys: Vec<usize>, values: Vec<usize> },
    /// The default value tensor has no elements.
    EmptyDefault,
    Tensor(TensorError),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotInitialized => {
                write!(f, "hashtable need to be initialized before using")
            }
            LookupError::UnsupportedTypes { key, value } => {
                write!(f, "unsupported hashtable types: key {}, value {}", key, value)
            }
            LookupError::MissingResource(id) => write!(f, "no hashtable resource with id {}", id),
            LookupError::InvalidHandle(shape) => {
                write!(f, "resource handle must hold a single id, got shape {:?}", shape)
            }
            LookupError::TypeMismatch { expected, actual } => write!(
                f,
                "hashtable expects ({}, {}) tensors, got ({}, {})",
                expected.0, expected.1, actual.0, actual.1
            ),
            LookupError::ShapeMismatch { keys, values } => {
                write!(f, "key shape {:?} does not match value shape {:?}", keys, values)
            }
            LookupError::EmptyDefault => write!(f, "default value tensor is empty"),
            LookupError::Tensor(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LookupError::Tensor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TensorError> for LookupError {
    fn from(e: TensorError) -> Self {
        LookupError::Tensor(e)
    }
}
