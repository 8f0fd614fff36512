//! Batch arithmetic shared by the embedding client and its callers.

/// Split `items` into consecutive sub-slices of at most `max_size` elements.
///
/// A `max_size` of zero is treated as one.
#[must_use]
pub fn split_batches<T>(items: &[T], max_size: usize) -> Vec<&[T]> {
    items.chunks(max_size.max(1)).collect()
}

/// Divide `total` tokens across `n` texts as evenly as integers allow.
///
/// The remainder goes to the first texts, so the shares always sum to `total`.
#[must_use]
pub fn apportion_tokens(total: u64, n: usize) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }
    let n64 = u64::try_from(n).unwrap_or(u64::MAX);
    let base = total / n64;
    let remainder = total % n64;
    (0..n64)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}
