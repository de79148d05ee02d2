//! Percentile ranks over a column with gaps.

/// Percentile rank of each present value among all present values.
///
/// Ranks are 1-based; tied values share the average of the ranks they
/// span; the rank is divided by the number of present values, so the
/// largest value gets `1.0`. Missing values stay missing and do not count
/// toward the denominator.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|v| !v.is_nan()).map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| a.1.total_cmp(&b.1));

    let count = present.len() as f64;
    let mut ranks = vec![None; values.len()];

    let mut start = 0;
    while start < present.len() {
        let value = present[start].1;
        let end = present[start..]
            .iter()
            .position(|(_, v)| v.total_cmp(&value).is_ne())
            .map_or(present.len(), |offset| start + offset);

        // Positions start..end hold ranks start+1..=end.
        let average_rank = (start + 1 + end) as f64 / 2.0;
        for &(index, _) in &present[start..end] {
            ranks[index] = Some(average_rank / count);
        }

        start = end;
    }

    ranks
}
