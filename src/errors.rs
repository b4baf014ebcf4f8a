//! Error types reported by shape, selection and block access operations.

use std::error::Error as StdError;

use smallvec::SmallVec;
use thiserror::Error;

use crate::broadcast::Shape;

/// Coordinates of a block within the grid of blocks that partition an array.
pub type BlockCoords = SmallVec<[usize; 4]>;

/// Shapes are incompatible for broadcasting, or array metadata is
/// inconsistent.
///
/// These errors are always detected before any block is read or written.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShapeError {
    /// Shapes cannot be combined in a binary operation.
    #[error("shapes {lhs:?} and {rhs:?} cannot be broadcast together")]
    Incompatible { lhs: Shape, rhs: Shape },

    /// A shape cannot be stretched to a target shape.
    #[error("shape {from:?} cannot be broadcast to {to:?}")]
    NotBroadcastable { from: Shape, to: Shape },

    /// The block shape of an array does not have one non-zero size per axis.
    #[error("block shape {block_shape:?} is invalid for array shape {shape:?}")]
    InvalidBlockShape { shape: Shape, block_shape: Shape },

    /// The number of elements supplied does not match a shape.
    #[error("data length {len} does not match shape {shape:?}")]
    DataLength { shape: Shape, len: usize },
}

/// An index expression is invalid for the shape it is applied to.
///
/// These errors are detected while resolving a [`Selection`](crate::Selection),
/// before any block is touched.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum IndexError {
    /// The expression has more entries than the shape has axes.
    #[error("too many indices: {given} given for {ndim} axes")]
    TooManyAxes { given: usize, ndim: usize },

    /// An integer index is out of bounds after negative values are resolved.
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    OutOfBounds {
        axis: usize,
        index: isize,
        size: usize,
    },

    /// A slice has a step of zero.
    #[error("slice step cannot be zero (axis {axis})")]
    ZeroStep { axis: usize },

    /// An index expression string could not be parsed.
    #[error("invalid index expression: {0}")]
    Parse(String),
}

/// Opaque error reported by a [`BlockProvider`](crate::BlockProvider).
///
/// The error is passed through unchanged. It is not retried or interpreted.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ProviderError(Box<dyn StdError + Send + Sync + 'static>);

impl ProviderError {
    /// Wrap an error, or a message, reported by a block provider.
    pub fn new<E: Into<Box<dyn StdError + Send + Sync + 'static>>>(err: E) -> ProviderError {
        ProviderError(err.into())
    }

    /// Return the wrapped error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.0
    }
}

/// Errors from reading or writing a view of a block-partitioned array.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Reading or writing a block failed. Nothing was written by the
    /// operation that returned this error.
    #[error("block {block:?}: {source}")]
    Provider {
        block: BlockCoords,
        #[source]
        source: ProviderError,
    },

    /// A write failed after some blocks had already been updated.
    ///
    /// Writes are not transactional. `written` blocks of `total` hold the
    /// new values, the others hold their previous values.
    #[error(
        "write to block {failed:?} failed after {written} of {total} blocks were written (last written: {last_written:?}): {source}"
    )]
    PartialWrite {
        written: usize,
        total: usize,
        last_written: Option<BlockCoords>,
        failed: BlockCoords,
        #[source]
        source: ProviderError,
    },
}

impl Error {
    /// Return true if this error left the destination partially updated.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, Error::PartialWrite { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::{Error, IndexError, ProviderError, ShapeError};

    #[test]
    fn test_error_messages() {
        let err = ShapeError::NotBroadcastable {
            from: smallvec![5, 4],
            to: smallvec![5, 1],
        };
        assert_eq!(
            err.to_string(),
            "shape [5, 4] cannot be broadcast to [5, 1]"
        );

        let err = IndexError::TooManyAxes { given: 2, ndim: 1 };
        assert_eq!(err.to_string(), "too many indices: 2 given for 1 axes");

        let err = Error::Provider {
            block: smallvec![1, 0],
            source: ProviderError::new("worker unavailable"),
        };
        assert_eq!(err.to_string(), "block [1, 0]: worker unavailable");
        assert!(!err.is_partial_write());
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = IndexError::ZeroStep { axis: 0 }.into();
        assert!(matches!(err, Error::Index(IndexError::ZeroStep { axis: 0 })));
    }
}
