//! Row-wise execution for the reference kernel.
//!
//! With the `parallel` feature, disjoint matrix rows are handed to rayon once
//! the matrix is large enough; otherwise rows run in order on the caller's
//! thread.

use crate::backend::ParallelMode;

/// Minimum number of elements to justify splitting rows across threads.
#[cfg(feature = "parallel")]
pub(crate) const MIN_PARALLEL_LEN: usize = 1 << 15;

/// Rows `0..rows` of a row-major region, each `cols` long and `ld` apart.
#[cfg(feature = "parallel")]
fn row_region<T>(data: &mut [T], offset: usize, ld: usize, rows: usize, cols: usize) -> &mut [T] {
    let end = offset + (rows - 1) * ld + cols;
    &mut data[offset..end]
}

/// Visit rows one after another by index. Rows overlap when `ld < cols`, and
/// a later row then sees the writes of the earlier ones.
fn rows_in_order<T, F>(data: &mut [T], offset: usize, ld: usize, rows: usize, cols: usize, f: F)
where
    F: Fn(usize, &mut [T]),
{
    for r in 0..rows {
        let start = offset + r * ld;
        f(r, &mut data[start..start + cols]);
    }
}

/// Call `f(r, row)` for every row of a validated `(rows, cols, offset, ld)` matrix.
#[cfg(feature = "parallel")]
pub(crate) fn for_each_row<T, F>(
    data: &mut [T],
    offset: usize,
    ld: usize,
    rows: usize,
    cols: usize,
    f: F,
) where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    use rayon::prelude::*;

    if ld >= cols && rows > 1 && rows * cols >= MIN_PARALLEL_LEN {
        row_region(data, offset, ld, rows, cols)
            .par_chunks_mut(ld)
            .enumerate()
            .for_each(|(r, row)| f(r, &mut row[..cols]));
    } else {
        rows_in_order(data, offset, ld, rows, cols, f);
    }
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn for_each_row<T, F>(
    data: &mut [T],
    offset: usize,
    ld: usize,
    rows: usize,
    cols: usize,
    f: F,
) where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    rows_in_order(data, offset, ld, rows, cols, f);
}

pub(crate) fn mode() -> ParallelMode {
    if cfg!(feature = "parallel") {
        ParallelMode::Thread
    } else {
        ParallelMode::Sequential
    }
}

#[cfg(feature = "parallel")]
pub(crate) fn num_threads() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn num_threads() -> usize {
    1
}
