//! Mapping of selections onto the blocks that partition an array.
//!
//! An array of shape `S` with block shape `B` is split into a grid of
//! `ceil(S[i] / B[i])` blocks along each axis. Blocks at the end of an axis
//! may be shorter than `B[i]`. Blocks are addressed by their coordinates in
//! this grid.

use rten_tensor::DynIndices;
use smallvec::SmallVec;

use crate::broadcast::Shape;
use crate::errors::{BlockCoords, ShapeError};
use crate::selection::{AxisSelector, Selection};

/// Stepped range of positions along one axis of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalRange {
    /// First position, relative to the start of the block.
    pub start: usize,

    /// Step between positions. May be negative.
    pub step: isize,

    /// Number of positions.
    pub count: usize,
}

impl LocalRange {
    /// Return the `n`th position in this range.
    #[inline]
    pub fn position(&self, n: usize) -> usize {
        (self.start as isize + n as isize * self.step) as usize
    }
}

/// The part of a block touched by a selection.
///
/// A region has one [`LocalRange`] per axis of the block, including axes that
/// were selected with a single index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRegion {
    ranges: SmallVec<[LocalRange; 4]>,
}

impl BlockRegion {
    pub fn new(ranges: &[LocalRange]) -> BlockRegion {
        BlockRegion {
            ranges: SmallVec::from_slice(ranges),
        }
    }

    /// Return a region that covers the whole of a block with a given shape.
    pub fn full(block_shape: &[usize]) -> BlockRegion {
        BlockRegion {
            ranges: block_shape
                .iter()
                .map(|&count| LocalRange {
                    start: 0,
                    step: 1,
                    count,
                })
                .collect(),
        }
    }

    pub fn ranges(&self) -> &[LocalRange] {
        &self.ranges
    }

    /// Return the shape of the box of positions covered by this region.
    pub fn shape(&self) -> Shape {
        self.ranges.iter().map(|r| r.count).collect()
    }

    /// Return the number of positions in this region.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.count).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map an index into the region's [shape](BlockRegion::shape) to an index
    /// into the block.
    pub fn local_index(&self, index: &[usize]) -> Shape {
        self.ranges
            .iter()
            .zip(index)
            .map(|(range, &n)| range.position(n))
            .collect()
    }
}

/// One block touched by a selection, and how it is touched.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockAccess {
    /// Coordinates of the block in the grid.
    pub coords: BlockCoords,

    /// Block-relative positions of the selected elements.
    pub region: BlockRegion,

    /// Offset in the selection's output at which the region's elements
    /// start. This has one entry per output axis, ie. axes of the region which
    /// correspond to an index selector are skipped.
    pub output_offset: Shape,

    /// Whether each axis of the region is an axis of the output.
    output_axes: SmallVec<[bool; 4]>,
}

impl BlockAccess {
    /// Map an index into the region's shape to an index into the output of
    /// the selection.
    pub fn output_index(&self, region_index: &[usize]) -> Shape {
        let mut index = self.output_offset.clone();
        let out_pos = region_index
            .iter()
            .zip(&self.output_axes)
            .filter(|(_, &is_output)| is_output)
            .map(|(&n, _)| n);
        for (dst, n) in index.iter_mut().zip(out_pos) {
            *dst += n;
        }
        index
    }
}

/// Contiguous run of selected positions along one axis that fall in the same
/// block.
#[derive(Clone, Copy, Debug, PartialEq)]
struct AxisSegment {
    block: usize,
    local: LocalRange,
    out_start: usize,
}

/// Split the positions selected on an axis into per-block segments.
///
/// Selected positions are monotonic, so each block along the axis appears in
/// at most one segment.
fn axis_segments(axis: &AxisSelector, block_size: usize) -> SmallVec<[AxisSegment; 4]> {
    let mut segments = SmallVec::new();
    let len = axis.len();
    let step = axis.step();

    let mut n = 0;
    while n < len {
        let pos = axis.position(n);
        let block = pos / block_size;
        let block_start = block * block_size;

        let remaining_in_block = if step > 0 {
            (block_start + block_size - 1 - pos) / step as usize + 1
        } else {
            (pos - block_start) / step.unsigned_abs() + 1
        };
        let count = remaining_in_block.min(len - n);

        segments.push(AxisSegment {
            block,
            local: LocalRange {
                start: pos - block_start,
                step,
                count,
            },
            out_start: n,
        });
        n += count;
    }

    segments
}

/// Partitioning of an array's shape into blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockGrid {
    shape: Shape,
    block_shape: Shape,
}

impl BlockGrid {
    /// Create a grid for an array of shape `shape` split into blocks of
    /// `block_shape`.
    ///
    /// The block shape must have one entry per axis, and must be non-zero
    /// along axes of non-zero size.
    pub fn new(shape: &[usize], block_shape: &[usize]) -> Result<BlockGrid, ShapeError> {
        let valid = shape.len() == block_shape.len()
            && shape
                .iter()
                .zip(block_shape)
                .all(|(&size, &block_size)| block_size > 0 || size == 0);
        if !valid {
            return Err(ShapeError::InvalidBlockShape {
                shape: Shape::from_slice(shape),
                block_shape: Shape::from_slice(block_shape),
            });
        }
        Ok(BlockGrid {
            shape: Shape::from_slice(shape),
            block_shape: Shape::from_slice(block_shape),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn block_shape(&self) -> &[usize] {
        &self.block_shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of blocks along each axis.
    pub fn grid_shape(&self) -> Shape {
        self.shape
            .iter()
            .zip(&self.block_shape)
            .map(|(&size, &block_size)| {
                if size == 0 {
                    0
                } else {
                    size.div_ceil(block_size)
                }
            })
            .collect()
    }

    /// Return the total number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.grid_shape().iter().product()
    }

    /// Return an iterator over the coordinates of all blocks, in row-major
    /// order.
    pub fn block_coords(&self) -> DynIndices {
        DynIndices::from_shape(&self.grid_shape())
    }

    /// Return the row-major position of the block with coordinates `coords`.
    pub fn block_offset(&self, coords: &[usize]) -> usize {
        let grid_shape = self.grid_shape();
        coords
            .iter()
            .zip(grid_shape.iter())
            .fold(0, |offset, (&coord, &size)| offset * size + coord)
    }

    /// Return the position of the first element of a block in the array.
    pub fn block_start(&self, coords: &[usize]) -> Shape {
        coords
            .iter()
            .zip(&self.block_shape)
            .map(|(&coord, &block_size)| coord * block_size)
            .collect()
    }

    /// Return the shape of a block. Blocks at the end of an axis may be
    /// shorter than the nominal block size.
    pub fn block_extent(&self, coords: &[usize]) -> Shape {
        coords
            .iter()
            .zip(self.shape.iter().zip(&self.block_shape))
            .map(|(&coord, (&size, &block_size))| {
                let start = coord * block_size;
                block_size.min(size.saturating_sub(start))
            })
            .collect()
    }

    /// Return the blocks touched by a selection over this grid's shape, and
    /// how each is touched.
    ///
    /// Each touched block appears exactly once. Blocks that contain no
    /// selected element are omitted. The result depends only on the
    /// selection and block shape, so the accesses can be performed in any
    /// order.
    ///
    /// Panics if `selection` was resolved against a different shape.
    pub fn accesses(&self, selection: &Selection) -> Vec<BlockAccess> {
        assert_eq!(
            selection.input_shape(),
            self.shape(),
            "selection does not match array shape"
        );

        let segments: SmallVec<[_; 4]> = selection
            .axes()
            .iter()
            .zip(&self.block_shape)
            .map(|(axis, &block_size)| axis_segments(axis, block_size))
            .collect();
        let segment_counts: Shape = segments.iter().map(|s| s.len()).collect();

        let output_axes: SmallVec<[bool; 4]> =
            selection.axes().iter().map(|axis| !axis.is_index()).collect();

        DynIndices::from_shape(&segment_counts)
            .map(|segment_index| {
                let mut coords = BlockCoords::new();
                let mut ranges = SmallVec::<[LocalRange; 4]>::new();
                let mut output_offset = Shape::new();

                for ((axis_segments, &i), &is_output) in
                    segments.iter().zip(segment_index.iter()).zip(&output_axes)
                {
                    let segment = axis_segments[i];
                    coords.push(segment.block);
                    ranges.push(segment.local);
                    if is_output {
                        output_offset.push(segment.out_start);
                    }
                }

                BlockAccess {
                    coords,
                    region: BlockRegion { ranges },
                    output_offset,
                    output_axes: output_axes.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rten_testing::TestCases;

    use super::{BlockGrid, BlockRegion, LocalRange};
    use crate::broadcast::Shape;
    use crate::errors::ShapeError;
    use crate::selection::Selection;
    use crate::slice_range::parse_index_expr;

    #[test]
    fn test_grid_shape() {
        let grid = BlockGrid::new(&[7, 5, 3], &[4, 3, 2]).unwrap();
        assert_eq!(grid.grid_shape().as_slice(), &[2, 2, 2]);
        assert_eq!(grid.num_blocks(), 8);
        assert_eq!(grid.block_extent(&[1, 1, 1]).as_slice(), &[3, 2, 1]);
        assert_eq!(grid.block_extent(&[0, 0, 0]).as_slice(), &[4, 3, 2]);
        assert_eq!(grid.block_start(&[1, 0, 1]).as_slice(), &[4, 0, 2]);
        assert_eq!(grid.block_offset(&[1, 0, 1]), 5);
        assert_eq!(grid.block_coords().count(), 8);

        let grid = BlockGrid::new(&[0, 4], &[0, 2]).unwrap();
        assert_eq!(grid.grid_shape().as_slice(), &[0, 2]);
        assert_eq!(grid.num_blocks(), 0);

        let grid = BlockGrid::new(&[], &[]).unwrap();
        assert_eq!(grid.num_blocks(), 1);
    }

    #[test]
    fn test_invalid_block_shape() {
        assert_eq!(
            BlockGrid::new(&[4, 4], &[2]),
            Err(ShapeError::InvalidBlockShape {
                shape: Shape::from_slice(&[4, 4]),
                block_shape: Shape::from_slice(&[2]),
            })
        );
        assert!(BlockGrid::new(&[4], &[0]).is_err());
    }

    #[test]
    fn test_accesses_1d() {
        #[derive(Debug)]
        struct Case {
            index: &'static str,
            // (block, local start, step, count, output offset)
            expected: Vec<(usize, usize, isize, usize, usize)>,
        }

        let cases = [
            Case {
                index: "1:4",
                expected: vec![(0, 1, 1, 2, 0), (1, 0, 1, 1, 2)],
            },
            Case {
                index: ":",
                expected: vec![(0, 0, 1, 3, 0), (1, 0, 1, 2, 3)],
            },
            Case {
                index: "::-1",
                expected: vec![(1, 1, -1, 2, 0), (0, 2, -1, 3, 2)],
            },
            Case {
                index: "::4",
                expected: vec![(0, 0, 4, 1, 0), (1, 1, 4, 1, 1)],
            },
            Case {
                index: "3:3",
                expected: vec![],
            },
            Case {
                index: "4",
                expected: vec![(1, 1, 1, 1, 0)],
            },
        ];

        let grid = BlockGrid::new(&[5], &[3]).unwrap();

        cases.test_each(|case| {
            let index = parse_index_expr(case.index).unwrap();
            let sel = Selection::from_subscript(&[5], index.as_slice()).unwrap();
            let accesses: Vec<_> = grid
                .accesses(&sel)
                .into_iter()
                .map(|access| {
                    let range = access.region.ranges()[0];
                    (
                        access.coords[0],
                        range.start,
                        range.step,
                        range.count,
                        access.output_offset.first().copied().unwrap_or(0),
                    )
                })
                .collect();
            assert_eq!(accesses, case.expected);
        })
    }

    // Every selected element must be covered by exactly one access, at the
    // right output position.
    #[test]
    fn test_accesses_cover_selection() {
        #[derive(Debug)]
        struct Case {
            shape: Vec<usize>,
            block_shape: Vec<usize>,
            index: &'static str,
        }

        let cases = [
            Case {
                shape: vec![7, 5, 3],
                block_shape: vec![4, 3, 2],
                index: "1:6, ::-2, 1",
            },
            Case {
                shape: vec![7, 5, 3],
                block_shape: vec![4, 3, 2],
                index: "",
            },
            Case {
                shape: vec![9, 4],
                block_shape: vec![2, 4],
                index: "-1:0:-3, 2:",
            },
            Case {
                shape: vec![6],
                block_shape: vec![1],
                index: "::5",
            },
        ];

        cases.test_each(|case| {
            let grid = BlockGrid::new(&case.shape, &case.block_shape).unwrap();
            let index = parse_index_expr(case.index).unwrap();
            let sel = Selection::from_subscript(&case.shape, index.as_slice()).unwrap();
            let accesses = grid.accesses(&sel);

            let blocks: HashSet<_> = accesses.iter().map(|a| a.coords.clone()).collect();
            assert_eq!(blocks.len(), accesses.len(), "block visited twice");

            let mut seen = HashSet::new();
            for access in &accesses {
                let start = grid.block_start(&access.coords);
                let extent = grid.block_extent(&access.coords);
                for region_index in rten_tensor::DynIndices::from_shape(&access.region.shape()) {
                    let local = access.region.local_index(&region_index);
                    assert!(local.iter().zip(extent.iter()).all(|(i, size)| i < size));

                    // Check that the global position is the one the selection
                    // maps this output index to.
                    let out_index = access.output_index(&region_index);
                    let mut out_axes = out_index.iter();
                    for (axis, (&local_pos, &block_start)) in
                        sel.axes().iter().zip(local.iter().zip(start.iter()))
                    {
                        let global = block_start + local_pos;
                        let expected = if axis.is_index() {
                            axis.position(0)
                        } else {
                            axis.position(*out_axes.next().unwrap())
                        };
                        assert_eq!(global, expected);
                    }
                    assert!(seen.insert(out_index), "output index written twice");
                }
            }
            assert_eq!(seen.len(), sel.len());
        })
    }

    #[test]
    fn test_region_local_index() {
        let region = BlockRegion::new(&[
            LocalRange {
                start: 2,
                step: -1,
                count: 3,
            },
            LocalRange {
                start: 1,
                step: 2,
                count: 2,
            },
        ]);
        assert_eq!(region.shape().as_slice(), &[3, 2]);
        assert_eq!(region.len(), 6);
        assert_eq!(region.local_index(&[0, 0]).as_slice(), &[2, 1]);
        assert_eq!(region.local_index(&[2, 1]).as_slice(), &[0, 3]);

        let full = BlockRegion::full(&[2, 3]);
        assert_eq!(full.local_index(&[1, 2]).as_slice(), &[1, 2]);
    }
}
