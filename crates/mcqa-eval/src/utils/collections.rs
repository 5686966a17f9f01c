/// Index of the first maximum. `None` on empty input.
///
/// Only a strictly greater value moves the index, so ties keep the earliest
/// position. Resolution and threshold selection both rely on that.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let (first, rest) = values.split_first()?;
    let mut best = (0, *first);
    for (idx, &value) in rest.iter().enumerate() {
        if value > best.1 {
            best = (idx + 1, value);
        }
    }
    Some(best.0)
}

/// Sorted copy of `values` with exact duplicates removed.
pub fn sorted_unique(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    values
}

/// Keeps the items whose mask position is `true`.
///
/// A mask shorter than `data` drops the tail, like a zip.
pub fn reduce_by_mask<T: Clone>(data: &[T], mask: &[bool]) -> Vec<T> {
    data.iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(item, _)| item.clone())
        .collect()
}
