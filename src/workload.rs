//! CPU-bound busy work for the profilers to sample

use std::hint::black_box;

/// Sum the integers `0..=n` one at a time.
///
/// `black_box` keeps the compiler from folding the loop into `n(n+1)/2`,
/// which would leave the profiler nothing to sample.
#[inline(never)]
pub fn sum_numbers(n: u64) -> u64 {
    let mut sum: u64 = 0;
    let mut i: u64 = 0;
    while i <= n {
        sum = black_box(sum.wrapping_add(i));
        if i == u64::MAX {
            break;
        }
        i += 1;
    }
    sum
}

/// Closed form of [`sum_numbers`], wrapping on overflow the same way
pub fn triangular(n: u64) -> u64 {
    let n = n as u128;
    (n * (n + 1) / 2) as u64
}
