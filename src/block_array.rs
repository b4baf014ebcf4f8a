use std::sync::RwLock;

use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use crate::block_grid::{BlockGrid, BlockRegion};
use crate::errors::{ProviderError, Result, ShapeError};
use crate::provider::BlockProvider;
use crate::view::View;

/// Array partitioned into blocks that are held in local memory.
///
/// Each block is stored as a separate tensor behind its own lock, so that
/// different blocks can be read and written concurrently.
pub struct BlockArray<T> {
    grid: BlockGrid,

    /// Blocks in row-major order of their grid coordinates.
    blocks: Vec<RwLock<Tensor<T>>>,
}

impl<T: Clone> BlockArray<T> {
    /// Split a tensor into blocks with a given nominal shape.
    pub fn from_tensor(
        tensor: TensorView<'_, T>,
        block_shape: &[usize],
    ) -> std::result::Result<BlockArray<T>, ShapeError> {
        let grid = BlockGrid::new(tensor.shape(), block_shape)?;
        let blocks = grid
            .block_coords()
            .map(|coords| {
                let start = grid.block_start(&coords);
                let extent = grid.block_extent(&coords);
                let block = Tensor::<T>::from_fn(extent.as_slice(), |index: &[usize]| {
                    let src_index: Vec<usize> =
                        index.iter().zip(start.iter()).map(|(i, s)| i + s).collect();
                    tensor[src_index.as_slice()].clone()
                });
                RwLock::new(block)
            })
            .collect();
        Ok(BlockArray { grid, blocks })
    }

    /// Create an array with the given shape and block shape, where every
    /// element is `value`.
    pub fn full(
        shape: &[usize],
        block_shape: &[usize],
        value: T,
    ) -> std::result::Result<BlockArray<T>, ShapeError> {
        let grid = BlockGrid::new(shape, block_shape)?;
        let blocks = grid
            .block_coords()
            .map(|coords| RwLock::new(Tensor::full(
                    grid.block_extent(&coords).as_slice(),
                    value.clone(),
                )))
            .collect();
        Ok(BlockArray { grid, blocks })
    }

    /// Create an array from a flat vector of elements in row-major order.
    pub fn from_data(
        shape: &[usize],
        block_shape: &[usize],
        data: Vec<T>,
    ) -> std::result::Result<BlockArray<T>, ShapeError> {
        let len: usize = shape.iter().product();
        if len != data.len() {
            return Err(ShapeError::DataLength {
                shape: shape.into(),
                len: data.len(),
            });
        }
        let tensor = Tensor::from_data(shape, data);
        BlockArray::from_tensor(tensor.view(), block_shape)
    }
}

impl<T: Clone + Default> BlockArray<T> {
    /// Create an array where every element has its default value.
    pub fn zeros(
        shape: &[usize],
        block_shape: &[usize],
    ) -> std::result::Result<BlockArray<T>, ShapeError> {
        BlockArray::full(shape, block_shape, T::default())
    }
}

impl<T> BlockArray<T> {
    /// Return the grid of blocks that partitions this array.
    pub fn block_grid(&self) -> &BlockGrid {
        &self.grid
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block(
        &self,
        coords: &[usize],
    ) -> std::result::Result<&RwLock<Tensor<T>>, ProviderError> {
        let in_grid = coords.len() == self.grid.ndim()
            && coords
                .iter()
                .zip(self.grid.grid_shape().iter())
                .all(|(coord, size)| coord < size);
        if !in_grid {
            return Err(ProviderError::new(format!(
                "block coordinates {:?} are outside grid {:?}",
                coords,
                self.grid.grid_shape()
            )));
        }
        Ok(&self.blocks[self.grid.block_offset(coords)])
    }
}

impl<T: Clone + Default + Send + Sync> BlockArray<T> {
    /// Copy the whole array into a single tensor.
    pub fn to_tensor(&self) -> Result<Tensor<T>> {
        View::new(self).materialize()
    }
}

impl<T: Clone + Send + Sync> BlockProvider for BlockArray<T> {
    type Elem = T;

    fn shape(&self) -> &[usize] {
        self.grid.shape()
    }

    fn block_shape(&self) -> &[usize] {
        self.grid.block_shape()
    }

    fn get_block(&self, coords: &[usize]) -> std::result::Result<Tensor<T>, ProviderError> {
        let block = self
            .block(coords)?
            .read()
            .map_err(|_| ProviderError::new("block lock poisoned"))?;
        Ok(block.clone())
    }

    fn set_block_region(
        &self,
        coords: &[usize],
        region: &BlockRegion,
        data: TensorView<'_, T>,
    ) -> std::result::Result<(), ProviderError> {
        if data.shape() != region.shape().as_slice() {
            return Err(ProviderError::new(format!(
                "data shape {:?} does not match region shape {:?}",
                data.shape(),
                region.shape()
            )));
        }

        let mut block = self
            .block(coords)?
            .write()
            .map_err(|_| ProviderError::new("block lock poisoned"))?;
        let extent = block.shape().to_vec();
        let in_block = region.ranges().len() == extent.len()
            && (region.is_empty()
                || region.ranges().iter().zip(extent.iter()).all(|(range, &size)| {
                    range.position(0) < size && range.position(range.count - 1) < size
                }));
        if !in_block {
            return Err(ProviderError::new(format!(
                "region {:?} is outside block of shape {:?}",
                region, extent
            )));
        }

        for index in rten_tensor::DynIndices::from_shape(data.shape()) {
            let local = region.local_index(&index);
            block[local.as_slice()] = data[index.as_slice()].clone();
        }
        Ok(())
    }
}
