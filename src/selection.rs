//! Resolved per-axis selections of an array.
//!
//! A [`Selection`] is the result of applying a raw index expression (see
//! [`AxisIndex`]) to a specific shape. All negative indices, `None` bounds and
//! out-of-range slice endpoints have been resolved, so downstream code only
//! deals with concrete positions.

use std::fmt;

use smallvec::SmallVec;

use crate::broadcast::Shape;
use crate::errors::IndexError;
use crate::slice_range::{slice_len, AxisIndex, IntoIndexExpr};

/// Resolved selection of one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisSelector {
    /// A single position. The axis does not appear in the output shape.
    Index(usize),

    /// Positions `start, start + step, ...` up to but excluding `stop`.
    ///
    /// `step` is non-zero. For negative steps `stop` may be negative, as a
    /// slice that ends after position 0 has `stop == -1`.
    Slice { start: isize, stop: isize, step: isize },
}

impl AxisSelector {
    /// Resolve the raw index `item` for axis `axis` of size `size`.
    fn resolve(axis: usize, item: &AxisIndex, size: usize) -> Result<AxisSelector, IndexError> {
        match *item {
            AxisIndex::Index(index) => {
                let pos_index = if index < 0 {
                    index + size as isize
                } else {
                    index
                };
                if pos_index < 0 || pos_index >= size as isize {
                    return Err(IndexError::OutOfBounds { axis, index, size });
                }
                Ok(AxisSelector::Index(pos_index as usize))
            }
            AxisIndex::Slice(range) => {
                let (start, stop, step) = range
                    .indices(size)
                    .ok_or(IndexError::ZeroStep { axis })?;
                Ok(AxisSelector::Slice { start, stop, step })
            }
        }
    }

    /// Return a selector for the whole of an axis of size `size`.
    pub fn full(size: usize) -> AxisSelector {
        AxisSelector::Slice {
            start: 0,
            stop: size as isize,
            step: 1,
        }
    }

    /// Return true if this selector removes its axis from the output.
    pub fn is_index(&self) -> bool {
        matches!(self, AxisSelector::Index(_))
    }

    /// Return the number of positions selected.
    pub fn len(&self) -> usize {
        match *self {
            AxisSelector::Index(_) => 1,
            AxisSelector::Slice { start, stop, step } => slice_len(start, stop, step),
        }
    }

    /// Return true if no positions are selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the step between successive selected positions.
    pub fn step(&self) -> isize {
        match *self {
            AxisSelector::Index(_) => 1,
            AxisSelector::Slice { step, .. } => step,
        }
    }

    /// Return the `n`th selected position.
    ///
    /// `n` must be less than [`len`](AxisSelector::len).
    #[inline]
    pub fn position(&self, n: usize) -> usize {
        match *self {
            AxisSelector::Index(index) => index,
            AxisSelector::Slice { start, step, .. } => (start + n as isize * step) as usize,
        }
    }

    /// Return an iterator over the selected positions, in selection order.
    pub fn positions(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        (0..self.len()).map(move |n| self.position(n))
    }

    /// Restrict this selector by `child`, which was resolved against an axis
    /// of size `self.len()`.
    fn compose(&self, child: &AxisSelector) -> AxisSelector {
        match *child {
            AxisSelector::Index(index) => AxisSelector::Index(self.position(index)),
            AxisSelector::Slice { .. } if child.is_empty() => AxisSelector::Slice {
                start: 0,
                stop: 0,
                step: 1,
            },
            AxisSelector::Slice {
                start: child_start,
                step: child_step,
                ..
            } => {
                let start = self.position(child_start as usize) as isize;
                let len = child.len();

                // With at most one position the step only needs its sign.
                let step = if len <= 1 {
                    self.step().signum() * child_step.signum()
                } else {
                    self.step() * child_step
                };
                AxisSelector::Slice {
                    start,
                    stop: start + len as isize * step,
                    step,
                }
            }
        }
    }
}

impl fmt::Display for AxisSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSelector::Index(index) => write!(f, "{}", index),
            AxisSelector::Slice { start, stop, step } => write!(f, "{}:{}:{}", start, stop, step),
        }
    }
}

/// A resolved index expression for a particular shape.
///
/// A selection has exactly one [`AxisSelector`] per axis of the shape it was
/// resolved against. Axes selected with an index are dropped from the
/// [output shape](Selection::output_shape), while slice axes contribute the
/// number of positions they select, in their original order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    /// Shape which this selection was resolved against.
    shape: Shape,
    axes: SmallVec<[AxisSelector; 4]>,
}

impl Selection {
    /// Return a selection of every element of an array with a given shape.
    pub fn full(shape: &[usize]) -> Selection {
        Selection {
            shape: Shape::from_slice(shape),
            axes: shape.iter().map(|&size| AxisSelector::full(size)).collect(),
        }
    }

    /// Resolve an index expression against an array of a given shape.
    ///
    /// Integer indices may be negative, in which case they count back from
    /// the end of the axis, and must be in bounds after this adjustment.
    /// Slices follow Python's rules, so out-of-range endpoints are clamped.
    /// If `index` has fewer entries than `shape` has axes, the remaining
    /// axes are selected in full.
    pub fn from_subscript<R: IntoIndexExpr>(
        shape: &[usize],
        index: R,
    ) -> Result<Selection, IndexError> {
        let index = index.into_index_expr();
        let index = index.as_ref();
        if index.len() > shape.len() {
            return Err(IndexError::TooManyAxes {
                given: index.len(),
                ndim: shape.len(),
            });
        }

        let axes = shape
            .iter()
            .enumerate()
            .map(|(axis, &size)| match index.get(axis) {
                Some(item) => AxisSelector::resolve(axis, item, size),
                None => Ok(AxisSelector::full(size)),
            })
            .collect::<Result<_, _>>()?;

        Ok(Selection {
            shape: Shape::from_slice(shape),
            axes,
        })
    }

    /// Return the shape which this selection was resolved against.
    pub fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    /// Return the per-axis selectors.
    pub fn axes(&self) -> &[AxisSelector] {
        &self.axes
    }

    /// Return the number of axes in the input shape.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Return the shape of the array produced by applying this selection.
    pub fn output_shape(&self) -> Shape {
        self.axes
            .iter()
            .filter(|axis| !axis.is_index())
            .map(|axis| axis.len())
            .collect()
    }

    /// Return true if this selection contains no elements.
    pub fn is_empty(&self) -> bool {
        self.axes.iter().any(|axis| axis.is_empty())
    }

    /// Return the number of elements selected.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|axis| axis.len()).product()
    }

    /// Return true if this selection selects every element of its input, in
    /// order.
    pub fn is_full(&self) -> bool {
        self.axes
            .iter()
            .zip(self.shape.iter())
            .all(|(axis, &size)| *axis == AxisSelector::full(size))
    }

    /// Resolve `index` against this selection's output shape and return the
    /// combined selection over the original input shape.
    ///
    /// This is equivalent to materializing this selection and then indexing
    /// the result, but only involves arithmetic on the selectors.
    pub fn select<R: IntoIndexExpr>(&self, index: R) -> Result<Selection, IndexError> {
        let child = Selection::from_subscript(&self.output_shape(), index)?;
        Ok(self.compose(&child))
    }

    /// Combine this selection with `child`, a selection that was resolved
    /// against this selection's output shape.
    ///
    /// Panics if `child` was resolved against a different shape.
    pub fn compose(&self, child: &Selection) -> Selection {
        assert_eq!(
            child.input_shape(),
            self.output_shape().as_slice(),
            "child selection does not match output shape"
        );

        let mut child_axes = child.axes.iter();
        let axes = self
            .axes
            .iter()
            .map(|axis| match axis {
                AxisSelector::Index(_) => *axis,
                AxisSelector::Slice { .. } => {
                    // The assert above guarantees one child axis per slice axis.
                    let child_axis = child_axes.next().unwrap();
                    axis.compose(child_axis)
                }
            })
            .collect();

        Selection {
            shape: self.shape.clone(),
            axes,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, axis) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", axis)?;
        }
        write!(f, "]")
    }
}
