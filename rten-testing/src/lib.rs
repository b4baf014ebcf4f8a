//! Internal testing utilities for the rten-blocks crate.
//!
//! This provides a harness for table-driven tests, and simple reference
//! implementations of broadcasting and Python slicing rules that tests can
//! check optimized code against.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// To create a table driven test, define a `Debug` struct named `Case` that
/// holds the data for one test case, create a collection of cases and call
/// `cases.test_each` with the test function.
///
/// All cases are run, catching panics. If any case fails, `test_each` panics
/// with the count and debug representations of the failing cases.
///
/// ```
/// use rten_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     shape: Vec<usize>,
///     len: usize,
/// }
///
/// let cases = [
///     Case { shape: vec![2, 3], len: 6 },
///     Case { shape: vec![], len: 1 },
/// ];
///
/// cases.test_each(|case| {
///     assert_eq!(case.shape.iter().product::<usize>(), case.len);
/// });
/// ```
///
/// Test cases, and any values captured by the test function, must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Values which are not, such as types with interior mutability, should be
/// created inside the test function instead.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with a reference to each test case.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes each test
    /// case to the test function by value.
    ///
    /// Each case is formatted before the test function is called, so it can
    /// be reported if the test fails.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

fn report_failures<F: Debug>(failures: Vec<F>) {
    assert!(
        failures.is_empty(),
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<String> = self
            .into_iter()
            .filter_map(|case| {
                let case_str = format!("{:?}", case);
                std::panic::catch_unwind(move || test(case))
                    .is_err()
                    .then_some(case_str)
            })
            .collect();
        report_failures(failures);
    }
}

/// Return every shape with at most `max_rank` axes, where each axis has a
/// size between 0 and `max_size` inclusive.
///
/// Shapes are returned in order of increasing rank, starting with the scalar
/// shape `[]`.
pub fn all_shapes(max_rank: usize, max_size: usize) -> Vec<Vec<usize>> {
    let mut shapes = vec![Vec::new()];
    let mut prev_rank = vec![Vec::new()];
    for _ in 0..max_rank {
        let next_rank: Vec<Vec<usize>> = prev_rank
            .iter()
            .flat_map(|shape| {
                (0..=max_size).map(move |size| {
                    let mut next = shape.clone();
                    next.push(size);
                    next
                })
            })
            .collect();
        shapes.extend(next_rank.iter().cloned());
        prev_rank = next_rank;
    }
    shapes
}

/// Left-pad `shape` with 1s until it has `rank` axes.
fn pad_shape(shape: &[usize], rank: usize) -> Vec<usize> {
    let mut padded = vec![1; rank.saturating_sub(shape.len())];
    padded.extend_from_slice(shape);
    padded
}

/// Reference implementation of the binary broadcasting rule.
///
/// Returns the shape that results from combining shapes `a` and `b` in an
/// element-wise operation, or `None` if they are incompatible.
pub fn reference_broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let a = pad_shape(a, rank);
    let b = pad_shape(b, rank);
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let size = match (a[i], b[i]) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
        out.push(size);
    }
    Some(out)
}

/// Reference implementation of the assignment broadcasting rule.
///
/// Returns true if a value with shape `from` can be assigned to a region of
/// shape `to`. Each axis of `from` must match `to` or be 1. Axes which
/// `from` has in excess of `to` must all be 1.
pub fn reference_broadcast_to(from: &[usize], to: &[usize]) -> bool {
    let surplus = from.len().saturating_sub(to.len());
    if from[..surplus].iter().any(|&size| size != 1) {
        return false;
    }
    let from = pad_shape(&from[surplus..], to.len());
    from.iter()
        .zip(to)
        .all(|(&from_size, &to_size)| from_size == to_size || from_size == 1)
}

/// Python-style slice parameters, as `(start, stop, step)`.
pub type SliceParams = (Option<isize>, Option<isize>, Option<isize>);

/// Return all combinations of slice parameters where the start and stop are
/// `None` or in `[-bound, bound]`, and the step is one of `steps`.
pub fn slice_params(bound: isize, steps: &[Option<isize>]) -> Vec<SliceParams> {
    let endpoints: Vec<Option<isize>> = std::iter::once(None)
        .chain((-bound..=bound).map(Some))
        .collect();
    let mut params = Vec::new();
    for &start in &endpoints {
        for &stop in &endpoints {
            for &step in steps {
                params.push((start, stop, step));
            }
        }
    }
    params
}

/// Return the positions selected by the Python expression
/// `range(size)[start:stop:step]`.
///
/// Panics if `step` is zero.
pub fn py_slice_indices(
    size: usize,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> Vec<usize> {
    let size = size as isize;
    let step = step.unwrap_or(1);
    assert!(step != 0, "slice step cannot be zero");

    let (lower, upper) = if step > 0 { (0, size) } else { (-1, size - 1) };
    let clamp = |index: isize| {
        if index < 0 {
            (index + size).max(lower)
        } else {
            index.min(upper)
        }
    };
    let start = start.map(clamp).unwrap_or(if step > 0 { lower } else { upper });
    let stop = stop.map(clamp).unwrap_or(if step > 0 { upper } else { lower });

    let mut positions = Vec::new();
    let mut pos = start;
    while (step > 0 && pos < stop) || (step < 0 && pos > stop) {
        positions.push(pos as usize);
        match pos.checked_add(step) {
            Some(next) => pos = next,
            None => break,
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::{
        all_shapes, py_slice_indices, reference_broadcast_shape, reference_broadcast_to,
        slice_params, TestCases,
    };

    #[test]
    fn test_test_cases_success() {
        #[derive(Clone, Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.clone().test_each(|case| _ = case.x);
        cases.test_each_value(|case| _ = case.x);
    }

    #[test]
    #[should_panic(expected = "1 test cases failed")]
    fn test_test_each_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each(|case| assert_eq!(case.x, 1))
    }

    #[test]
    #[should_panic(expected = "2 test cases failed")]
    fn test_test_each_value_failure() {
        #[derive(Debug)]
        struct Case {
            x: i32,
        }

        let cases = [Case { x: 1 }, Case { x: 2 }];
        cases.test_each_value(|case| {
            _ = case.x;
            panic!("oh no");
        })
    }

    #[test]
    fn test_all_shapes() {
        let shapes = all_shapes(2, 1);
        assert_eq!(
            shapes,
            vec![
                vec![],
                vec![0],
                vec![1],
                vec![0, 0],
                vec![0, 1],
                vec![1, 0],
                vec![1, 1]
            ]
        );
        assert_eq!(all_shapes(3, 3).len(), 1 + 4 + 16 + 64);
    }

    #[test]
    fn test_reference_broadcast() {
        assert_eq!(reference_broadcast_shape(&[5, 1], &[1, 4]), Some(vec![5, 4]));
        assert_eq!(reference_broadcast_shape(&[0], &[1]), Some(vec![0]));
        assert_eq!(reference_broadcast_shape(&[2], &[3]), None);

        assert!(reference_broadcast_to(&[5, 1], &[5, 4]));
        assert!(!reference_broadcast_to(&[5, 4], &[5, 1]));
        assert!(reference_broadcast_to(&[1, 1, 3], &[3]));
        assert!(!reference_broadcast_to(&[2, 3], &[3]));
    }

    #[test]
    fn test_slice_params() {
        let params = slice_params(1, &[None, Some(-1)]);
        assert_eq!(params.len(), 4 * 4 * 2);
        assert_eq!(params[0], (None, None, None));
        assert!(params.contains(&(Some(-1), Some(1), Some(-1))));
    }

    #[test]
    fn test_py_slice_indices() {
        assert_eq!(py_slice_indices(5, Some(1), Some(4), None), [1, 2, 3]);
        assert_eq!(py_slice_indices(5, None, None, Some(-1)), [4, 3, 2, 1, 0]);
        assert_eq!(py_slice_indices(5, Some(-2), None, None), [3, 4]);
        assert_eq!(py_slice_indices(5, Some(10), Some(-10), Some(-2)), [4, 2, 0]);
        assert_eq!(py_slice_indices(5, Some(-10), Some(3), Some(2)), [0, 2]);
        assert!(py_slice_indices(0, None, None, Some(-3)).is_empty());
        assert!(py_slice_indices(5, Some(3), Some(1), None).is_empty());
        assert_eq!(py_slice_indices(5, Some(4), None, Some(isize::MAX)), [4]);
        assert_eq!(py_slice_indices(5, None, None, Some(isize::MIN)), [4]);
    }
}
