//! rten-blocks implements numpy-style broadcasting and basic indexing for
//! arrays that are partitioned into rectangular blocks.
//!
//! The blocks of an array may live in local memory or be owned by remote
//! workers. This crate only deals with shapes and selections. It reads and
//! writes block contents through the [`BlockProvider`] trait, and never
//! needs the whole array in memory unless a caller asks for it.
//!
//! # Broadcasting
//!
//! The [`broadcast`] module implements the two broadcasting rules used by
//! numpy-like libraries. [`broadcast_shape`] combines the shapes of the
//! operands of an element-wise operation. [`broadcast_shape_to`] checks that
//! a value can be assigned to a region, which is a directional rule that
//! never truncates the value.
//!
//! # Selections and views
//!
//! An index expression, made from integers, Rust ranges and
//! [`SliceRange`]s, is resolved against a shape to produce a [`Selection`].
//! A [`View`] pairs an array with a selection:
//!
//! ```
//! use rten_blocks::{select, BlockArray, SliceRange};
//! use rten_tensor::prelude::*;
//! use rten_tensor::Tensor;
//!
//! let data = Tensor::from_data(&[4, 3], (0..12).collect::<Vec<i32>>());
//! let array = BlockArray::from_tensor(data.view(), &[2, 2]).unwrap();
//!
//! // Select every other row, in reverse, then the last column.
//! let view = select(&array, SliceRange::new(None, None, Some(-2))).unwrap();
//! let column = view.select((.., -1)).unwrap();
//! assert_eq!(column.materialize().unwrap().to_vec(), [11, 5]);
//!
//! // Assign to the first column, broadcasting a single value.
//! let view = select(&array, (.., 0)).unwrap();
//! view.assign(.., &Tensor::from_data(&[1], vec![-1])).unwrap();
//! assert_eq!(array.to_tensor().unwrap().to_vec()[..4], [-1, 1, 2, -1]);
//! ```
//!
//! Indexing a view composes its selection with the new index expression,
//! which is resolved against the view's shape. No blocks are touched until
//! [`View::materialize`] or [`View::assign`] is called.
//!
//! ## Threading
//!
//! Blocks are fetched and written one at a time by default. If
//! [`AccessOptions::parallel`] is set, block accesses run on a Rayon
//! [ThreadPool](https://docs.rs/rayon/latest/rayon/struct.ThreadPool.html)
//! which is sized to match the number of physical cores. See
//! [`thread_pool`].
//!
//! ## Environment variables
//!
//! - `RTEN_BLOCKS_PARALLEL` sets the default for [`AccessOptions::parallel`].
//! - `RTEN_BLOCKS_NUM_THREADS` sets the size of the block access thread pool.
//!
//! # Logging
//!
//! Reads and writes emit [tracing](https://docs.rs/tracing) events. The
//! library does not install a subscriber.

mod block_array;
mod block_grid;
mod env;
mod errors;
mod options;
mod provider;
mod selection;
mod slice_range;
mod threading;
mod view;

pub mod broadcast;

pub use block_array::BlockArray;
pub use block_grid::{BlockAccess, BlockGrid, BlockRegion, LocalRange};
pub use broadcast::{
    broadcast_shape, broadcast_shape_to, broadcast_shape_to_alt, can_broadcast_shape_to,
    can_broadcast_shapes, Shape,
};
pub use errors::{BlockCoords, Error, IndexError, ProviderError, Result, ShapeError};
pub use options::AccessOptions;
pub use provider::BlockProvider;
pub use selection::{AxisSelector, Selection};
pub use slice_range::{
    parse_index_expr, to_index_expr, AxisIndex, IndexExpr, IntoIndexExpr, SliceRange,
};
pub use threading::{thread_pool, ThreadPool};
pub use view::{assign, materialize, select, AssignSource, View};

/// This module provides a convenient way to import the most common traits
/// from this library via a glob import.
pub mod prelude {
    pub use super::{AssignSource, BlockProvider, IntoIndexExpr};
}
