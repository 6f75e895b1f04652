//! Shape utilities
//!
//! Padding, broadcasting and permutation arithmetic used by the translators.

use crate::error::{ConvertError, ConvertResult};

/// Calculate total number of elements from shape
pub fn numel(shape: &[i64]) -> usize {
    if shape.is_empty() {
        1 // scalar
    } else {
        shape.iter().map(|&d| d.max(0) as usize).product()
    }
}

/// Check if shape contains dynamic dimensions (negative values)
pub fn is_dynamic(shape: &[i64]) -> bool {
    shape.iter().any(|&d| d < 0)
}

/// Padding pair giving an output size of `ceil(input_size / stride)`
///
/// Returns `(pad_before, pad_after)`; odd totals put the extra pixel after.
pub fn same_padding(input_size: i64, kernel_size: i64, stride: i64) -> (i64, i64) {
    let new_size = (input_size + stride - 1) / stride;
    let total = ((new_size - 1) * stride + kernel_size - input_size).max(0);
    let before = total / 2;
    (before, total - before)
}

/// Reshape target for the operand of an elementwise op
///
/// `y_shape` belongs to the operand of lower (or equal) rank. If it is not a
/// trailing suffix of `x_shape`, its leading singleton dims are stripped
/// until it is one. Returns `Some(new_shape)` when a reshape is needed.
///
/// Only suffix matching is done, not numpy-style broadcasting.
pub fn resolve_broadcast(x_shape: &[i64], y_shape: &[i64]) -> Option<Vec<i64>> {
    let mut start = 0;
    while start < y_shape.len()
        && !x_shape.ends_with(&y_shape[start..])
        && y_shape[start] == 1
    {
        start += 1;
    }

    if start > 0 && start < y_shape.len() {
        Some(y_shape[start..].to_vec())
    } else {
        None
    }
}

/// Spatial output size of a transposed convolution
pub fn conv_transpose_output_size(
    input_size: i64,
    stride: i64,
    padding: i64,
    dilation: i64,
    kernel_size: i64,
    output_padding: i64,
) -> i64 {
    (input_size - 1) * stride - 2 * padding + dilation * (kernel_size - 1) + 1 + output_padding
}

/// Output shape of `Gather(data, indices, axis)`
pub fn gather_output_shape(data: &[i64], indices: &[i64], axis: usize) -> Vec<i64> {
    let mut shape = Vec::with_capacity(data.len() + indices.len());
    shape.extend_from_slice(&data[..axis]);
    shape.extend_from_slice(indices);
    shape.extend_from_slice(&data[axis + 1..]);
    shape
}

/// Permutation moving `axis` to the front, keeping the others in order
pub fn axis_to_front_perm(rank: usize, axis: usize) -> Vec<i64> {
    let mut perm = Vec::with_capacity(rank);
    perm.push(axis as i64);
    perm.extend((0..rank).filter(|&d| d != axis).map(|d| d as i64));
    perm
}

/// Inverse of a permutation
pub fn inverse_perm(perm: &[i64]) -> Vec<i64> {
    let mut inverse = vec![0i64; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inverse[p as usize] = i as i64;
    }
    inverse
}

/// Normalize axis to positive index
pub fn normalize_axis(axis: i64, ndim: usize) -> ConvertResult<usize> {
    let ndim_i64 = ndim as i64;
    let normalized = if axis < 0 { axis + ndim_i64 } else { axis };

    if normalized < 0 || normalized >= ndim_i64 {
        return Err(ConvertError::Internal(format!(
            "Axis {} out of bounds for ndim {}",
            axis, ndim
        )));
    }

    Ok(normalized as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        assert_eq!(numel(&[2, 3, 4]), 24);
        assert_eq!(numel(&[]), 1); // scalar
    }

    #[test]
    fn test_is_dynamic() {
        assert!(!is_dynamic(&[1, 3, 224, 224]));
        assert!(is_dynamic(&[-1, 3, 224, 224]));
    }

    #[test]
    fn test_same_padding() {
        assert_eq!(same_padding(7, 3, 2), (1, 1));
        assert_eq!(same_padding(10, 3, 3), (1, 1));
        assert_eq!(same_padding(224, 7, 2), (2, 3));
        assert_eq!(same_padding(4, 1, 1), (0, 0));
    }

    #[test]
    fn test_resolve_broadcast_suffix_needs_nothing() {
        assert_eq!(resolve_broadcast(&[2, 3, 4], &[3, 4]), None);
        assert_eq!(resolve_broadcast(&[2, 3, 4], &[2, 3, 4]), None);
    }

    #[test]
    fn test_resolve_broadcast_strips_leading_ones() {
        assert_eq!(resolve_broadcast(&[2, 3, 4], &[1, 3, 4]), Some(vec![3, 4]));
        assert_eq!(
            resolve_broadcast(&[8, 16, 7, 7], &[1, 1, 16]),
            Some(vec![16])
        );
        assert_eq!(resolve_broadcast(&[5, 4], &[1, 1, 4]), Some(vec![4]));
    }

    #[test]
    fn test_resolve_broadcast_exhausted() {
        assert_eq!(resolve_broadcast(&[3, 4], &[1, 1]), None);
        assert_eq!(resolve_broadcast(&[3, 4], &[5]), None);
    }

    #[test]
    fn test_conv_transpose_output_size() {
        // 7x7, stride 2, pad 1, kernel 3, output_padding 1 -> 14
        assert_eq!(conv_transpose_output_size(7, 2, 1, 1, 3, 1), 14);
        assert_eq!(conv_transpose_output_size(4, 1, 0, 1, 3, 0), 6);
    }

    #[test]
    fn test_gather_output_shape() {
        assert_eq!(gather_output_shape(&[5, 6, 7], &[2, 3], 1), vec![5, 2, 3, 7]);
        assert_eq!(gather_output_shape(&[5, 6], &[4], 0), vec![4, 6]);
    }

    #[test]
    fn test_permutations() {
        assert_eq!(axis_to_front_perm(4, 1), vec![1, 0, 2, 3]);
        assert_eq!(axis_to_front_perm(4, 2), vec![2, 0, 1, 3]);
        assert_eq!(inverse_perm(&[2, 0, 1, 3]), vec![1, 2, 0, 3]);
        assert_eq!(inverse_perm(&[1, 0, 2, 3]), vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis(0, 4).unwrap(), 0);
        assert_eq!(normalize_axis(-1, 4).unwrap(), 3);
        assert!(normalize_axis(4, 4).is_err());
        assert!(normalize_axis(-5, 4).is_err());
    }
}
