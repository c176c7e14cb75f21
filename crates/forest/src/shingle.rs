//! Sliding-window embedding of a series into fixed-width points
//!
//! A shingle of size `W` over a series of length `T` yields the `T - W + 1`
//! contiguous windows `series[i..i + W]` in chronological order.

use std::iter::FusedIterator;
use std::slice::Windows;

use crate::errors::{RcfError, Result};

/// Restartable iterator over the windows of a series
///
/// Clone before consuming to replay the same sequence.
#[derive(Debug, Clone)]
pub struct Shingles<'a, T> {
    windows: Windows<'a, T>,
    size: usize,
}

impl<'a, T> Shingles<'a, T> {
    /// Window width
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<'a, T> Iterator for Shingles<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        self.windows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

impl<T> ExactSizeIterator for Shingles<'_, T> {}

impl<T> FusedIterator for Shingles<'_, T> {}

fn check_size(len: usize, size: usize) -> Result<()> {
    if size < 1 {
        return Err(RcfError::InvalidArgument(
            "shingle size must be at least 1".to_string(),
        ));
    }
    if size > len {
        return Err(RcfError::InvalidArgument(format!(
            "shingle size {size} exceeds series length {len}"
        )));
    }
    Ok(())
}

/// Borrow the overlapping windows of `series`
pub fn shingle<T>(series: &[T], size: usize) -> Result<Shingles<'_, T>> {
    check_size(series.len(), size)?;
    Ok(Shingles {
        windows: series.windows(size),
        size,
    })
}

/// Collect the windows of a scalar series as owned points
pub fn shingle_points(series: &[f64], size: usize) -> Result<Vec<Vec<f64>>> {
    Ok(shingle(series, size)?.map(<[f64]>::to_vec).collect())
}

/// Shingle a multivariate series; each point concatenates `size` consecutive rows
pub fn shingle_rows(rows: &[Vec<f64>], size: usize) -> Result<Vec<Vec<f64>>> {
    check_size(rows.len(), size)?;

    let width = rows[0].len();
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(RcfError::InvalidArgument(format!(
            "row {idx} has {} columns, expected {width}",
            row.len()
        )));
    }

    Ok(rows
        .windows(size)
        .map(|window| window.iter().flatten().copied().collect())
        .collect())
}
