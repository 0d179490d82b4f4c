//! Brute-force nearest-neighbour search

use std::cmp::Ordering;

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn by_distance(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then(a.0.cmp(&b.0))
}

/// The `k` points closest to `query`, nearest first
///
/// Returns `(index, squared distance)` pairs. Ties are broken by index so
/// results are deterministic. `exclude` skips one index (the query itself).
pub fn nearest<'a, I>(points: I, query: &[f64], k: usize, exclude: Option<usize>) -> Vec<(usize, f64)>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut candidates: Vec<(usize, f64)> = points
        .into_iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, p)| (i, squared_distance(p, query)))
        .collect();
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, by_distance);
        candidates.truncate(k);
    }
    candidates.sort_by(by_distance);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_excludes_self_and_orders() {
        let points: Vec<Vec<f64>> = vec![vec![0.0], vec![1.0], vec![3.0], vec![1.0], vec![10.0]];
        let found = nearest(points.iter().map(Vec::as_slice), &[0.0], 3, Some(0));
        let idx: Vec<usize> = found.iter().map(|(i, _)| *i).collect();
        assert_eq!(idx, vec![1, 3, 2]);
        assert_eq!(found[0].1, 1.0);
    }

    #[test]
    fn test_k_larger_than_points() {
        let points: Vec<Vec<f64>> = vec![vec![0.0, 0.0], vec![3.0, 4.0]];
        let found = nearest(points.iter().map(Vec::as_slice), &[0.0, 0.0], 5, None);
        assert_eq!(found, vec![(0, 0.0), (1, 25.0)]);
    }
}
