//! Exhaustive squared-Euclidean nearest-neighbour scan.

/// Squared L2 distance; slices must have equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| { let d = x - y; d * d }).sum()
}

/// Positions and distances of the `top_k` rows of `data` closest to `query`.
///
/// `data` holds rows of `dim` floats back to back. Results are sorted by
/// ascending distance; equal distances keep ascending row position.
pub fn nearest(data: &[f32], dim: usize, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
    if dim == 0 || top_k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f32)> = data
        .chunks_exact(dim)
        .enumerate()
        .map(|(pos, row)| (pos, squared_l2(row, query)))
        .collect();
    let by_distance = |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
    if top_k < scored.len() {
        scored.select_nth_unstable_by(top_k - 1, by_distance);
        scored.truncate(top_k);
    }
    scored.sort_by(by_distance);
    scored
}
