//! Lazy, composable windows onto block-partitioned arrays.
//!
//! A [`View`] pairs a reference to a [`BlockProvider`] with a [`Selection`]
//! over the provider's shape. Indexing a view composes selections without
//! touching any block. Blocks are only read by [`View::materialize`], and
//! only written by [`View::assign`].

use rayon::prelude::*;
use rten_tensor::prelude::*;
use rten_tensor::{CowTensor, DynIndices, Tensor, TensorView};
use tracing::{debug, trace, warn};

use crate::block_array::BlockArray;
use crate::block_grid::BlockAccess;
use crate::broadcast::{broadcast_index, broadcast_shape_to, Shape};
use crate::errors::{BlockCoords, Error, IndexError, ProviderError, Result};
use crate::options::AccessOptions;
use crate::provider::BlockProvider;
use crate::selection::Selection;
use crate::slice_range::IntoIndexExpr;
use crate::threading::thread_pool;

/// A selection of elements from a block-partitioned array.
///
/// Views are cheap to create and copy. They hold the array by reference, and
/// chained indexing only combines selector arithmetic. Indexing a view does
/// not keep a reference to the parent view. The result holds the same array
/// and a single selection composed over the array's full shape, so a chain
/// of views is read in one pass. See the [module docs](self).
pub struct View<'a, P: BlockProvider + ?Sized> {
    provider: &'a P,

    /// Selection over the provider's full shape.
    selection: Selection,
}

impl<P: BlockProvider + ?Sized> Clone for View<'_, P> {
    fn clone(&self) -> Self {
        View {
            provider: self.provider,
            selection: self.selection.clone(),
        }
    }
}

impl<P: BlockProvider + ?Sized> std::fmt::Debug for View<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("array_shape", &self.provider.shape())
            .field("selection", &self.selection)
            .finish()
    }
}

impl<'a, P: BlockProvider + ?Sized> View<'a, P> {
    /// Create a view of every element of an array.
    pub fn new(provider: &'a P) -> View<'a, P> {
        View {
            provider,
            selection: Selection::full(provider.shape()),
        }
    }

    /// Create a view of an array with a selection that was resolved against
    /// the array's shape.
    ///
    /// Panics if the selection's input shape differs from the array's shape.
    pub fn with_selection(provider: &'a P, selection: Selection) -> View<'a, P> {
        assert_eq!(
            selection.input_shape(),
            provider.shape(),
            "selection does not match array shape"
        );
        View {
            provider,
            selection,
        }
    }

    /// Return the array this view selects from.
    pub fn provider(&self) -> &'a P {
        self.provider
    }

    /// Return this view's selection over the whole array.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Return the shape of this view, ie. the shape of the tensor that
    /// [`materialize`](View::materialize) returns.
    pub fn shape(&self) -> Shape {
        self.selection.output_shape()
    }

    pub fn ndim(&self) -> usize {
        self.selection.output_shape().len()
    }

    /// Return the number of elements in this view.
    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Index this view.
    ///
    /// `index` is resolved against this view's shape, not the shape of the
    /// underlying array. No block is read.
    pub fn select<R: IntoIndexExpr>(
        &self,
        index: R,
    ) -> std::result::Result<View<'a, P>, IndexError> {
        Ok(View {
            provider: self.provider,
            selection: self.selection.select(index)?,
        })
    }
}

/// Map a provider error for the block at `coords` into an [`Error`].
fn provider_error(coords: &BlockCoords, source: ProviderError) -> Error {
    Error::Provider {
        block: coords.clone(),
        source,
    }
}

/// Copy the elements of `block` selected by `access` into `output`.
fn copy_from_block<T: Clone>(output: &mut Tensor<T>, access: &BlockAccess, block: &Tensor<T>) {
    for region_index in DynIndices::from_shape(&access.region.shape()) {
        let local = access.region.local_index(&region_index);
        let out_index = access.output_index(&region_index);
        output[out_index] = block[local].clone();
    }
}

/// Outcome of a sequence of block writes.
struct WriteProgress {
    written: usize,
    last_written: Option<BlockCoords>,
    failure: Option<(BlockCoords, ProviderError)>,
}

impl WriteProgress {
    fn into_result(self, total: usize) -> Result<()> {
        let Some((failed, source)) = self.failure else {
            return Ok(());
        };
        if self.written == 0 {
            return Err(Error::Provider {
                block: failed,
                source,
            });
        }
        warn!(
            written = self.written,
            total,
            failed = ?failed,
            last_written = ?self.last_written,
            "block write failed after other blocks were updated"
        );
        Err(Error::PartialWrite {
            written: self.written,
            total,
            last_written: self.last_written,
            failed,
            source,
        })
    }
}

impl<'a, P> View<'a, P>
where
    P: BlockProvider + ?Sized,
    P::Elem: Clone + Default + Send + Sync,
{
    /// Read the selected elements into a new tensor.
    ///
    /// Uses [`AccessOptions::default`].
    pub fn materialize(&self) -> Result<Tensor<P::Elem>> {
        self.materialize_with(&AccessOptions::default())
    }

    /// Read the selected elements into a new tensor, with the given options.
    ///
    /// Each block that overlaps the selection is fetched once. If any fetch
    /// fails, the error is returned along with the block's coordinates.
    pub fn materialize_with(&self, opts: &AccessOptions) -> Result<Tensor<P::Elem>> {
        let grid = self.provider.grid()?;
        let accesses = grid.accesses(&self.selection);
        let out_shape = self.selection.output_shape();
        debug!(
            selection = %self.selection,
            shape = ?out_shape.as_slice(),
            blocks = accesses.len(),
            parallel = opts.parallel,
            "materialize view"
        );

        let mut output = Tensor::zeros(out_shape.as_slice());
        let fetch = |access: &BlockAccess| -> Result<Tensor<P::Elem>> {
            trace!(block = ?access.coords.as_slice(), "fetch block");
            let block = self
                .provider
                .get_block(&access.coords)
                .map_err(|err| provider_error(&access.coords, err))?;
            let extent = grid.block_extent(&access.coords);
            if block.shape() != extent.as_slice() {
                let err = ProviderError::new(format!(
                    "block has shape {:?} but expected {:?}",
                    block.shape(),
                    extent.as_slice()
                ));
                return Err(provider_error(&access.coords, err));
            }
            Ok(block)
        };

        if opts.parallel {
            let blocks: Vec<Tensor<P::Elem>> =
                thread_pool().run(|| accesses.par_iter().map(fetch).collect::<Result<_>>())?;
            for (access, block) in accesses.iter().zip(&blocks) {
                copy_from_block(&mut output, access, block);
            }
        } else {
            for access in &accesses {
                let block = fetch(access)?;
                copy_from_block(&mut output, access, &block);
            }
        }

        Ok(output)
    }

    /// Assign `value` to the elements selected by `index`.
    ///
    /// Uses [`AccessOptions::default`]. See [`assign_with`](View::assign_with).
    pub fn assign<R: IntoIndexExpr, S: AssignSource<P::Elem> + ?Sized>(
        &self,
        index: R,
        value: &S,
    ) -> Result<()> {
        self.assign_with(index, value, &AccessOptions::default())
    }

    /// Assign `value` to the elements selected by `index`, which is resolved
    /// against this view's shape.
    ///
    /// The shape of `value` must be broadcastable to the shape of the
    /// selection. Otherwise a [`ShapeError`](crate::ShapeError) is returned
    /// and nothing is written. If `value` is a view, it is read in full
    /// before any block is written, so the source and destination may
    /// overlap.
    ///
    /// Writes are not transactional. If writing a block fails after other
    /// blocks have been written, [`Error::PartialWrite`] is returned.
    pub fn assign_with<R: IntoIndexExpr, S: AssignSource<P::Elem> + ?Sized>(
        &self,
        index: R,
        value: &S,
        opts: &AccessOptions,
    ) -> Result<()> {
        let target = self.selection.select(index)?;
        let target_shape = target.output_shape();
        let src_shape = value.source_shape();
        broadcast_shape_to(&src_shape, &target_shape)?;

        let grid = self.provider.grid()?;
        let accesses = grid.accesses(&target);
        debug!(
            selection = %target,
            shape = ?target_shape.as_slice(),
            src_shape = ?src_shape.as_slice(),
            blocks = accesses.len(),
            parallel = opts.parallel,
            "assign to view"
        );
        if accesses.is_empty() {
            return Ok(());
        }

        let src = value.source_data(opts)?;
        let write = |access: &BlockAccess| {
            trace!(block = ?access.coords.as_slice(), "write block");
            let data = Tensor::from_fn(access.region.shape().as_slice(), |region_index: &[usize]| {
                let out_index = access.output_index(region_index);
                src[broadcast_index(&out_index, &src_shape)].clone()
            });
            self.provider
                .set_block_region(&access.coords, &access.region, data.view())
        };

        let progress = if opts.parallel {
            let results: Vec<_> =
                thread_pool().run(|| accesses.par_iter().map(write).collect());
            let mut progress = WriteProgress {
                written: 0,
                last_written: None,
                failure: None,
            };
            for (access, result) in accesses.iter().zip(results) {
                match result {
                    Ok(()) => {
                        progress.written += 1;
                        progress.last_written = Some(access.coords.clone());
                    }
                    Err(err) => {
                        if progress.failure.is_none() {
                            progress.failure = Some((access.coords.clone(), err));
                        }
                    }
                }
            }
            progress
        } else {
            let mut progress = WriteProgress {
                written: 0,
                last_written: None,
                failure: None,
            };
            for access in &accesses {
                if let Err(err) = write(access) {
                    progress.failure = Some((access.coords.clone(), err));
                    break;
                }
                progress.written += 1;
                progress.last_written = Some(access.coords.clone());
            }
            progress
        };

        progress.into_result(accesses.len())
    }

    /// Copy the selected elements into a new in-memory array with a given
    /// block shape.
    pub fn to_block_array(&self, block_shape: &[usize]) -> Result<BlockArray<P::Elem>> {
        let tensor = self.materialize()?;
        Ok(BlockArray::from_tensor(tensor.view(), block_shape)?)
    }
}

/// Source of values for [`View::assign`].
///
/// The source's shape must be broadcastable to the shape of the selection
/// being assigned to.
pub trait AssignSource<T> {
    /// Return the shape of the source.
    fn source_shape(&self) -> Shape;

    /// Return the source's elements.
    ///
    /// This is only called after the source's shape has been checked.
    fn source_data(&self, opts: &AccessOptions) -> Result<CowTensor<'_, T>>;
}

impl<T: Clone> AssignSource<T> for Tensor<T> {
    fn source_shape(&self) -> Shape {
        Shape::from_slice(self.shape())
    }

    fn source_data(&self, _opts: &AccessOptions) -> Result<CowTensor<'_, T>> {
        Ok(self.as_cow())
    }
}

impl<T: Clone> AssignSource<T> for TensorView<'_, T> {
    fn source_shape(&self) -> Shape {
        Shape::from_slice(self.shape())
    }

    fn source_data(&self, _opts: &AccessOptions) -> Result<CowTensor<'_, T>> {
        Ok(self.as_cow())
    }
}

impl<T, Q> AssignSource<T> for View<'_, Q>
where
    Q: BlockProvider<Elem = T> + ?Sized,
    T: Clone + Default + Send + Sync + 'static,
{
    fn source_shape(&self) -> Shape {
        self.shape()
    }

    fn source_data(&self, opts: &AccessOptions) -> Result<CowTensor<'_, T>> {
        Ok(self.materialize_with(opts)?.into_cow())
    }
}

/// Index a block-partitioned array.
///
/// This is the entry point for reading part of an array. The result is
/// materialized with [`materialize`] or [`View::materialize`].
pub fn select<P: BlockProvider + ?Sized, R: IntoIndexExpr>(
    provider: &P,
    index: R,
) -> std::result::Result<View<'_, P>, IndexError> {
    View::new(provider).select(index)
}

/// Assign `value` to the elements of `view` selected by `index`.
///
/// See [`View::assign_with`].
pub fn assign<P, R, S>(view: &View<'_, P>, index: R, value: &S) -> Result<()>
where
    P: BlockProvider + ?Sized,
    P::Elem: Clone + Default + Send + Sync,
    R: IntoIndexExpr,
    S: AssignSource<P::Elem> + ?Sized,
{
    view.assign(index, value)
}

/// Read the elements of `view` into a new tensor.
pub fn materialize<P>(view: &View<'_, P>) -> Result<Tensor<P::Elem>>
where
    P: BlockProvider + ?Sized,
    P::Elem: Clone + Default + Send + Sync,
{
    view.materialize()
}
