//! Functions for computing whether, and how, shapes can be broadcast.
//!
//! There are two broadcasting rules:
//!
//! - Binary operations ([`broadcast_shape`]). Shapes are aligned from the
//!   trailing axis and left-padded with 1s. Each pair of sizes must be equal
//!   or one of them must be 1.
//! - Assignment ([`broadcast_shape_to`]). This is directional. The source can
//!   be stretched along size-1 axes, or given new leading axes, but never
//!   truncated.
//!
//! See <https://numpy.org/doc/stable/user/basics.broadcasting.html>.

use std::iter::{repeat, zip};

use smallvec::SmallVec;

use crate::errors::ShapeError;

/// Sizes of the axes of an array. An empty shape denotes a scalar.
pub type Shape = SmallVec<[usize; 4]>;

/// Combine a pair of aligned axis sizes under the binary broadcasting rule.
fn combine_dims(a: usize, b: usize) -> Option<usize> {
    if a == b {
        Some(a)
    } else if a == 1 {
        Some(b)
    } else if b == 1 {
        Some(a)
    } else {
        None
    }
}

/// Iterate over pairs of sizes of `a` and `b`, starting from the trailing
/// axis, with the shorter shape padded with 1s.
fn aligned_dims<'a>(a: &'a [usize], b: &'a [usize]) -> impl Iterator<Item = (usize, usize)> + 'a {
    let a_pad = b.len().saturating_sub(a.len());
    let b_pad = a.len().saturating_sub(b.len());

    let a_iter = a.iter().copied().rev().chain(repeat(1).take(a_pad));
    let b_iter = b.iter().copied().rev().chain(repeat(1).take(b_pad));

    zip(a_iter, b_iter)
}

/// Return true if arrays with shapes `a` and `b` can be combined in a binary
/// operation.
pub fn can_broadcast_shapes(a: &[usize], b: &[usize]) -> bool {
    if a == b {
        return true;
    }
    aligned_dims(a, b).all(|(a, b)| combine_dims(a, b).is_some())
}

/// Return the shape that results from combining arrays with shapes `a` and `b`
/// in a binary operation.
///
/// The result has as many axes as the longer of the two shapes. Each axis is
/// the common size of the aligned input axes, where a size of 1 takes on the
/// size of the other input. Note this means that combining 1 with 0 yields 0.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Shape, ShapeError> {
    let mut result = Shape::with_capacity(a.len().max(b.len()));
    for (a_size, b_size) in aligned_dims(a, b) {
        let size = combine_dims(a_size, b_size).ok_or_else(|| ShapeError::Incompatible {
            lhs: Shape::from_slice(a),
            rhs: Shape::from_slice(b),
        })?;
        result.push(size);
    }
    result.reverse();
    Ok(result)
}

/// Return true if an array of shape `from` can be broadcast to exactly
/// `to`, as happens when assigning `from` into a region of shape `to`.
///
/// Each axis of `from`, aligned from the trailing axis, must either equal the
/// corresponding axis of `to` or be 1. `from` may have fewer axes than `to`.
/// It may only have more axes if the surplus leading axes are all 1.
pub fn can_broadcast_shape_to(from: &[usize], to: &[usize]) -> bool {
    if from == to {
        return true;
    }

    let surplus = from.len().saturating_sub(to.len());
    let (leading, from) = from.split_at(surplus);
    if leading.iter().any(|&size| size != 1) {
        return false;
    }

    let target_dims = to[to.len() - from.len()..].iter().copied();
    zip(from.iter().copied(), target_dims).all(|(from, to)| from == to || from == 1)
}

/// Return `to` if an array of shape `from` can be broadcast to it, or an
/// error otherwise.
///
/// See [`can_broadcast_shape_to`].
pub fn broadcast_shape_to(from: &[usize], to: &[usize]) -> Result<Shape, ShapeError> {
    if can_broadcast_shape_to(from, to) {
        Ok(Shape::from_slice(to))
    } else {
        Err(ShapeError::NotBroadcastable {
            from: Shape::from_slice(from),
            to: Shape::from_slice(to),
        })
    }
}

/// Alternate derivation of [`broadcast_shape_to`].
///
/// This removes any surplus leading 1-sized axes from `from`, combines the
/// result with `to` using the binary rule and checks that the combination
/// did not grow `to`. It agrees with [`broadcast_shape_to`] for all inputs and
/// exists as a cross-check of the directional rule.
pub fn broadcast_shape_to_alt(from: &[usize], to: &[usize]) -> Result<Shape, ShapeError> {
    let not_broadcastable = || ShapeError::NotBroadcastable {
        from: Shape::from_slice(from),
        to: Shape::from_slice(to),
    };

    let mut trimmed = from;
    while trimmed.len() > to.len() && trimmed[0] == 1 {
        trimmed = &trimmed[1..];
    }

    match broadcast_shape(trimmed, to) {
        Ok(combined) if combined.as_slice() == to => Ok(combined),
        _ => Err(not_broadcastable()),
    }
}

/// Map an index into an array of shape `to` onto the element of a source with
/// shape `src_shape` that is repeated there when broadcasting.
///
/// `src_shape` must be broadcastable to the shape `index` was taken from.
/// Surplus leading source axes, which are all of size 1, map to 0.
pub fn broadcast_index(index: &[usize], src_shape: &[usize]) -> Shape {
    let mut src_index = Shape::with_capacity(src_shape.len());
    let surplus = src_shape.len().saturating_sub(index.len());
    let pad = index.len().saturating_sub(src_shape.len());
    for (dim, &size) in src_shape.iter().enumerate() {
        if dim < surplus || size == 1 {
            src_index.push(0);
        } else {
            src_index.push(index[dim - surplus + pad]);
        }
    }
    src_index
}

#[cfg(test)]
mod tests {
    use rten_testing::{all_shapes, reference_broadcast_shape, reference_broadcast_to, TestCases};
    use smallvec::smallvec;

    use super::{
        broadcast_index, broadcast_shape, broadcast_shape_to, broadcast_shape_to_alt,
        can_broadcast_shape_to, can_broadcast_shapes, Shape,
    };
    use crate::errors::ShapeError;

    #[test]
    fn test_broadcast_shape() {
        #[derive(Debug)]
        struct Case {
            a: Vec<usize>,
            b: Vec<usize>,
            expected: Option<Vec<usize>>,
        }

        let cases = [
            Case {
                a: vec![5, 1],
                b: vec![1, 4],
                expected: Some(vec![5, 4]),
            },
            Case {
                a: vec![],
                b: vec![2, 3],
                expected: Some(vec![2, 3]),
            },
            Case {
                a: vec![1, 5],
                b: vec![2, 1, 1],
                expected: Some(vec![2, 1, 5]),
            },
            // Zero-sized axes combine with 1 but not with other sizes.
            Case {
                a: vec![0],
                b: vec![1],
                expected: Some(vec![0]),
            },
            Case {
                a: vec![0],
                b: vec![3],
                expected: None,
            },
            Case {
                a: vec![2, 3],
                b: vec![3, 2],
                expected: None,
            },
        ];

        cases.test_each(|case| {
            let result = broadcast_shape(&case.a, &case.b);
            assert_eq!(
                result.as_ref().ok().map(|s| s.to_vec()),
                case.expected,
                "{:?} with {:?}",
                case.a,
                case.b
            );
            assert_eq!(can_broadcast_shapes(&case.a, &case.b), result.is_ok());
            assert_eq!(can_broadcast_shapes(&case.b, &case.a), result.is_ok());
        })
    }

    #[test]
    fn test_broadcast_shape_error() {
        let err = broadcast_shape(&[2, 3], &[4]).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Incompatible {
                lhs: smallvec![2, 3],
                rhs: smallvec![4],
            }
        );
    }

    #[test]
    fn test_broadcast_shape_to() {
        #[derive(Debug)]
        struct Case {
            from: Vec<usize>,
            to: Vec<usize>,
            ok: bool,
        }

        let cases = [
            Case {
                from: vec![5, 1],
                to: vec![5, 4],
                ok: true,
            },
            Case {
                from: vec![5, 4],
                to: vec![5, 1],
                ok: false,
            },
            Case {
                from: vec![],
                to: vec![3, 2],
                ok: true,
            },
            Case {
                from: vec![1],
                to: vec![3],
                ok: true,
            },
            Case {
                from: vec![1],
                to: vec![0],
                ok: true,
            },
            Case {
                from: vec![0],
                to: vec![1],
                ok: false,
            },
            // Surplus leading axes must be 1.
            Case {
                from: vec![1, 1, 3],
                to: vec![3],
                ok: true,
            },
            Case {
                from: vec![2, 3],
                to: vec![3],
                ok: false,
            },
            Case {
                from: vec![1],
                to: vec![],
                ok: true,
            },
            Case {
                from: vec![2],
                to: vec![],
                ok: false,
            },
        ];

        cases.test_each(|case| {
            let Case { from, to, ok } = case;
            assert_eq!(can_broadcast_shape_to(from, to), *ok);

            let result = broadcast_shape_to(from, to);
            let alt_result = broadcast_shape_to_alt(from, to);
            assert_eq!(result, alt_result);
            if *ok {
                assert_eq!(result.unwrap().as_slice(), to.as_slice());
            } else {
                assert_eq!(
                    result,
                    Err(ShapeError::NotBroadcastable {
                        from: Shape::from_slice(from),
                        to: Shape::from_slice(to),
                    })
                );
            }
        })
    }

    // Check every pair of shapes with up to 3 axes of sizes 0-3 against a
    // reference implementation.
    #[test]
    fn test_broadcast_all_shape_pairs() {
        let shapes = all_shapes(3, 3);
        for a in &shapes {
            for b in &shapes {
                let expected = reference_broadcast_shape(a, b);
                let result = broadcast_shape(a, b);
                assert_eq!(can_broadcast_shapes(a, b), result.is_ok());
                assert_eq!(
                    result.as_ref().ok().map(|s| s.to_vec()),
                    expected,
                    "{:?} with {:?}",
                    a,
                    b
                );
                if let Ok(shape) = result {
                    assert_eq!(shape.len(), a.len().max(b.len()));
                }

                let expected_to = reference_broadcast_to(a, b);
                let to = broadcast_shape_to(a, b);
                let alt = broadcast_shape_to_alt(a, b);
                assert_eq!(can_broadcast_shape_to(a, b), to.is_ok());
                assert_eq!(to.is_ok(), expected_to, "{:?} to {:?}", a, b);
                assert_eq!(to, alt, "{:?} to {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_broadcast_index() {
        // Trailing alignment, size-1 axes repeat.
        assert_eq!(broadcast_index(&[4, 2], &[1, 3]).as_slice(), &[0, 2]);
        // Missing leading axes.
        assert_eq!(broadcast_index(&[4, 2], &[3]).as_slice(), &[2]);
        // Surplus leading axes of size 1.
        assert_eq!(broadcast_index(&[2], &[1, 1, 3]).as_slice(), &[0, 0, 2]);
        // Scalar source.
        assert!(broadcast_index(&[1, 2], &[]).is_empty());
    }
}
