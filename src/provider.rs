use rten_tensor::{Tensor, TensorView};

use crate::block_grid::{BlockGrid, BlockRegion};
use crate::errors::{ProviderError, ShapeError};

/// Source and destination of the blocks that make up a partitioned array.
///
/// Implementations own the physical placement of blocks, which may be in
/// local memory or on remote workers. Reads and writes of different blocks
/// are independent, and callers may issue them in any order or concurrently.
/// Writes therefore take `&self`, and implementations are responsible for
/// synchronizing access to an individual block.
pub trait BlockProvider: Sync {
    /// Type of element stored in the array.
    type Elem;

    /// Return the shape of the whole array.
    fn shape(&self) -> &[usize];

    /// Return the nominal shape of each block. Blocks at the end of an axis
    /// may be smaller.
    fn block_shape(&self) -> &[usize];

    /// Fetch the full contents of the block at `coords`.
    fn get_block(&self, coords: &[usize]) -> Result<Tensor<Self::Elem>, ProviderError>;

    /// Overwrite part of the block at `coords`.
    ///
    /// `data` has the shape of `region` (see [`BlockRegion::shape`]), and
    /// element `data[i]` is written to position `region.local_index(i)` of the
    /// block.
    fn set_block_region(
        &self,
        coords: &[usize],
        region: &BlockRegion,
        data: TensorView<'_, Self::Elem>,
    ) -> Result<(), ProviderError>;

    /// Return the grid of blocks that partitions this array.
    fn grid(&self) -> Result<BlockGrid, ShapeError> {
        BlockGrid::new(self.shape(), self.block_shape())
    }
}
