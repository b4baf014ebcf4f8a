use std::fmt;
use std::fmt::Debug;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::str::FromStr;

use smallvec::SmallVec;

use crate::errors::IndexError;

/// Specifies the subset of one axis to select when indexing an array or view.
///
/// Can be constructed from an integer or range using `index_or_range.into()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisIndex {
    /// Select a single position. The axis is removed from the output. If the
    /// index is negative, it counts back from the end of the axis.
    Index(isize),

    /// Select a stepped range of positions. The axis is retained.
    Slice(SliceRange),
}

impl AxisIndex {
    /// Return an item that selects the whole of an axis.
    #[inline]
    pub fn full() -> AxisIndex {
        AxisIndex::Slice(SliceRange::full())
    }

    /// Return an item that selects `start..stop` with a given step, where
    /// `None` values take on defaults that depend on the direction of the
    /// step.
    #[inline]
    pub fn slice(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> AxisIndex {
        AxisIndex::Slice(SliceRange::new(start, stop, step))
    }
}

// This conversion exists to avoid ambiguity when indexing with a numeric
// literal of unspecified type (eg. `view.select((0, 1))`).
impl From<i32> for AxisIndex {
    #[inline]
    fn from(value: i32) -> Self {
        AxisIndex::Index(value as isize)
    }
}

impl From<isize> for AxisIndex {
    #[inline]
    fn from(value: isize) -> Self {
        AxisIndex::Index(value)
    }
}

impl From<usize> for AxisIndex {
    #[inline]
    fn from(value: usize) -> Self {
        AxisIndex::Index(value as isize)
    }
}

impl<R: Into<SliceRange>> From<R> for AxisIndex {
    fn from(value: R) -> Self {
        AxisIndex::Slice(value.into())
    }
}

impl fmt::Display for AxisIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisIndex::Index(index) => write!(f, "{}", index),
            AxisIndex::Slice(range) => write!(f, "{}", range),
        }
    }
}

impl FromStr for AxisIndex {
    type Err = IndexError;

    /// Parse a NumPy-style subscript for one axis, such as `2`, `-1`, `1:4`,
    /// `::-1` or `:`.
    fn from_str(s: &str) -> Result<AxisIndex, IndexError> {
        let s = s.trim();
        if !s.contains(':') {
            return parse_bound(s)?
                .map(AxisIndex::Index)
                .ok_or_else(|| IndexError::Parse("empty index".to_string()));
        }

        let parts: SmallVec<[&str; 3]> = s.split(':').collect();
        if parts.len() > 3 {
            return Err(IndexError::Parse(format!("too many ':' in \"{}\"", s)));
        }
        let start = parse_bound(parts[0])?;
        let stop = parse_bound(parts[1])?;
        let step = match parts.get(2) {
            Some(step) => parse_bound(step)?,
            None => None,
        };
        Ok(AxisIndex::slice(start, stop, step))
    }
}

fn parse_bound(s: &str) -> Result<Option<isize>, IndexError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|_| IndexError::Parse(format!("invalid integer \"{}\"", s)))
}

/// Parse a comma-separated NumPy-style index expression, such as
/// `"1:4, -1, ::2"`.
///
/// An empty string selects nothing explicitly, which is equivalent to
/// selecting every axis in full.
pub fn parse_index_expr(s: &str) -> Result<IndexExpr, IndexError> {
    if s.trim().is_empty() {
        return Ok(IndexExpr::new());
    }
    s.split(',').map(AxisIndex::from_str).collect()
}

/// Used to convert sequences of indices and/or ranges into a uniform
/// `[AxisIndex]` array that can be used to index an array.
///
/// This trait is implemented for:
///
///  - Individual indices and ranges (types satisfying `Into<AxisIndex>`)
///  - Arrays of indices or ranges
///  - Tuples of indices and/or ranges
///  - `[AxisIndex]` slices (use `expr.as_slice()` for an [`IndexExpr`])
///
/// Ranges can be specified using regular Rust ranges (eg. `start..end`,
/// `start..`, `..end`, `..`) or a [`SliceRange`], which extends regular Rust
/// ranges with steps and optional endpoints that behave like Python's
/// `slice(start, stop, step)`.
pub trait IntoIndexExpr {
    type Array: AsRef<[AxisIndex]>;

    fn into_index_expr(self) -> Self::Array;
}

impl<'a> IntoIndexExpr for &'a [AxisIndex] {
    type Array = &'a [AxisIndex];

    fn into_index_expr(self) -> &'a [AxisIndex] {
        self
    }
}

impl<const N: usize, T: Into<AxisIndex>> IntoIndexExpr for [T; N] {
    type Array = [AxisIndex; N];

    fn into_index_expr(self) -> [AxisIndex; N] {
        self.map(|x| x.into())
    }
}

impl<T: Into<AxisIndex>> IntoIndexExpr for T {
    type Array = [AxisIndex; 1];

    fn into_index_expr(self) -> [AxisIndex; 1] {
        [self.into()]
    }
}

impl<T1: Into<AxisIndex>> IntoIndexExpr for (T1,) {
    type Array = [AxisIndex; 1];

    fn into_index_expr(self) -> [AxisIndex; 1] {
        [self.0.into()]
    }
}

impl<T1: Into<AxisIndex>, T2: Into<AxisIndex>> IntoIndexExpr for (T1, T2) {
    type Array = [AxisIndex; 2];

    fn into_index_expr(self) -> [AxisIndex; 2] {
        [self.0.into(), self.1.into()]
    }
}

impl<T1: Into<AxisIndex>, T2: Into<AxisIndex>, T3: Into<AxisIndex>> IntoIndexExpr
    for (T1, T2, T3)
{
    type Array = [AxisIndex; 3];

    fn into_index_expr(self) -> [AxisIndex; 3] {
        [self.0.into(), self.1.into(), self.2.into()]
    }
}

impl<T1: Into<AxisIndex>, T2: Into<AxisIndex>, T3: Into<AxisIndex>, T4: Into<AxisIndex>>
    IntoIndexExpr for (T1, T2, T3, T4)
{
    type Array = [AxisIndex; 4];

    fn into_index_expr(self) -> [AxisIndex; 4] {
        [self.0.into(), self.1.into(), self.2.into(), self.3.into()]
    }
}

/// Dynamically sized index expression, which avoids allocating in the
/// common case where the number of axes is small.
pub type IndexExpr = SmallVec<[AxisIndex; 5]>;

/// Convert a slice of indices or ranges into an [`IndexExpr`].
pub fn to_index_expr<T: Clone + Into<AxisIndex>>(index: &[T]) -> IndexExpr {
    index.iter().map(|x| x.clone().into()).collect()
}

/// A Python-style slice of an axis.
///
/// This differs from [`Range`] in that:
///
/// - A non-zero step between indices can be specified. The step can be
///   negative, in which case the axis is traversed in reverse order.
/// - The `start` and `stop` indices can be negative, in which case they count
///   back from the end of the axis.
/// - Any of the fields can be `None`. A missing step is 1. A missing start or
///   stop refers to the first or last position in the direction of travel.
///
/// Out of range endpoints are clamped rather than treated as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceRange {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl SliceRange {
    #[inline]
    pub fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> SliceRange {
        SliceRange { start, stop, step }
    }

    /// Return a range that covers a whole axis, like `::` in NumPy.
    #[inline]
    pub fn full() -> SliceRange {
        SliceRange::new(None, None, None)
    }

    /// Resolve this range for an axis of size `dim_size`, following Python's
    /// `slice.indices`.
    ///
    /// Returns `(start, stop, step)`, where `start` and `stop` are clamped to
    /// `[0, dim_size]` for positive steps and `[-1, dim_size - 1]` for
    /// negative steps. Returns `None` if the step is zero.
    pub fn indices(&self, dim_size: usize) -> Option<(isize, isize, isize)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return None;
        }

        let len = dim_size as isize;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

        let clamp = |index: isize| {
            if index < 0 {
                (index + len).max(lower)
            } else {
                index.min(upper)
            }
        };

        let start = match self.start {
            Some(start) => clamp(start),
            None if step > 0 => lower,
            None => upper,
        };
        let stop = match self.stop {
            Some(stop) => clamp(stop),
            None if step > 0 => upper,
            None => lower,
        };

        Some((start, stop, step))
    }

    /// Return the number of positions this range selects from an axis of size
    /// `dim_size`, or `None` if the step is zero.
    pub fn steps(&self, dim_size: usize) -> Option<usize> {
        self.indices(dim_size)
            .map(|(start, stop, step)| slice_len(start, stop, step))
    }
}

/// Return the number of positions in the resolved slice `start..stop` with
/// non-zero step `step`.
pub(crate) fn slice_len(start: isize, stop: isize, step: isize) -> usize {
    if step > 0 && stop > start {
        (stop - start - 1) as usize / step as usize + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) as usize / step.unsigned_abs() + 1
    } else {
        0
    }
}

impl fmt::Display for SliceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{}", start)?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{}", stop)?;
        }
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

impl<T> From<Range<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: Range<T>) -> SliceRange {
        let start = r.start.try_into().unwrap();
        let stop = r.end.try_into().unwrap();
        SliceRange::new(Some(start), Some(stop), None)
    }
}

impl<T> From<RangeTo<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: RangeTo<T>) -> SliceRange {
        let stop = r.end.try_into().unwrap();
        SliceRange::new(None, Some(stop), None)
    }
}

impl<T> From<RangeFrom<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: RangeFrom<T>) -> SliceRange {
        let start = r.start.try_into().unwrap();
        SliceRange::new(Some(start), None, None)
    }
}

impl From<RangeFull> for SliceRange {
    #[inline]
    fn from(_: RangeFull) -> SliceRange {
        SliceRange::full()
    }
}
