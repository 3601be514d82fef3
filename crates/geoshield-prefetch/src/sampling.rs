use geoshield_core::LocationGroup;
use rand::seq::SliceRandom;
use rand::Rng;

/// Number of groups to warm for a percentage of `total`.
///
/// Always at least one when the population is non-empty, never more than
/// `total`. Negative or NaN percentages select a single group.
pub fn sample_count(percentage: f64, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    if !percentage.is_finite() {
        return if percentage == f64::INFINITY { total } else { 1 };
    }

    let wanted = (percentage / 100.0 * total as f64).round();
    if wanted < 1.0 {
        1
    } else {
        (wanted as usize).min(total)
    }
}

/// Draw distinct groups uniformly without replacement.
pub fn sample_groups<R: Rng + ?Sized>(
    groups: &[LocationGroup],
    percentage: f64,
    rng: &mut R,
) -> Vec<LocationGroup> {
    let count = sample_count(percentage, groups.len());
    groups.choose_multiple(rng, count).cloned().collect()
}
