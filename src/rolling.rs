//! Shift-by-one rolling means and the fallback order shared by team and player features.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FallbackTier {
    Trailing,
    SeasonToDate,
    GlobalFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingValue {
    pub value: f64,
    pub tier: FallbackTier,
}

pub fn resolve(trailing: Option<f64>, season: Option<f64>, global: Option<f64>) -> RollingValue {
    if let Some(value) = trailing.filter(|v| v.is_finite()) {
        return RollingValue {
            value,
            tier: FallbackTier::Trailing,
        };
    }
    if let Some(value) = season.filter(|v| v.is_finite()) {
        return RollingValue {
            value,
            tier: FallbackTier::SeasonToDate,
        };
    }
    RollingValue {
        value: global.filter(|v| v.is_finite()).unwrap_or(0.0),
        tier: FallbackTier::GlobalFallback,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorMeans {
    pub trailing: Option<f64>,
    pub season: Option<f64>,
    pub games_prior: usize,
}

/// For each row of a week-ordered group, the means over rows from strictly
/// earlier weeks. Rows sharing a week never see each other.
pub fn prior_means(weeks: &[u32], values: &[Option<f64>], window: usize) -> Vec<PriorMeans> {
    debug_assert_eq!(weeks.len(), values.len());
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut season_sum = 0.0;
    let mut season_n = 0usize;
    let mut folded = 0usize;

    for (i, week) in weeks.iter().enumerate() {
        while folded < i && weeks[folded] < *week {
            if let Some(v) = values[folded] {
                season_sum += v;
                season_n += 1;
            }
            folded += 1;
        }

        let start = folded.saturating_sub(window);
        let (sum, n) = values[start..folded]
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

        out.push(PriorMeans {
            trailing: (n > 0).then(|| sum / n as f64),
            season: (season_n > 0).then(|| season_sum / season_n as f64),
            games_prior: folded,
        });
    }

    out
}

#[derive(Debug, Clone, Default)]
pub struct LeaguePrior {
    // Cumulative (sums, counts) through each key, sorted by key.
    steps: Vec<((i32, u32), Vec<f64>, Vec<usize>)>,
    columns: usize,
}

impl LeaguePrior {
    pub fn new<I>(columns: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = ((i32, u32), Vec<Option<f64>>)>,
    {
        let mut rows = rows.into_iter().collect::<Vec<_>>();
        rows.sort_by_key(|(key, _)| *key);

        let mut steps: Vec<((i32, u32), Vec<f64>, Vec<usize>)> = Vec::new();
        let mut sums = vec![0.0; columns];
        let mut counts = vec![0usize; columns];

        for (key, values) in rows {
            for (c, v) in values.iter().enumerate().take(columns) {
                if let Some(v) = v.filter(|v| v.is_finite()) {
                    sums[c] += v;
                    counts[c] += 1;
                }
            }
            match steps.last_mut() {
                Some(last) if last.0 == key => {
                    last.1.clone_from(&sums);
                    last.2.clone_from(&counts);
                }
                _ => steps.push((key, sums.clone(), counts.clone())),
            }
        }

        Self { steps, columns }
    }

    pub fn mean_before(&self, key: (i32, u32), column: usize) -> Option<f64> {
        if column >= self.columns {
            return None;
        }
        let idx = self.steps.partition_point(|(k, _, _)| *k < key);
        let (_, sums, counts) = self.steps.get(idx.checked_sub(1)?)?;
        (counts[column] > 0).then(|| sums[column] / counts[column] as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_order_is_trailing_then_season_then_global() {
        let r = resolve(Some(1.5), Some(2.0), Some(3.0));
        assert_eq!(r.tier, FallbackTier::Trailing);
        assert_eq!(r.value, 1.5);

        let r = resolve(None, Some(2.0), Some(3.0));
        assert_eq!(r.tier, FallbackTier::SeasonToDate);
        assert_eq!(r.value, 2.0);

        let r = resolve(Some(f64::NAN), None, Some(3.0));
        assert_eq!(r.tier, FallbackTier::GlobalFallback);
        assert_eq!(r.value, 3.0);

        let r = resolve(None, None, Some(f64::INFINITY));
        assert_eq!(r.tier, FallbackTier::GlobalFallback);
        assert_eq!(r.value, 0.0);
    }

    #[test]
    fn prior_means_are_shifted_by_one() {
        let values = [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)];
        let out = prior_means(&[1, 2, 3, 4, 5], &values, 3);
        assert_eq!(out[0].trailing, None);
        assert_eq!(out[0].season, None);
        assert_eq!(out[0].games_prior, 0);
        assert_eq!(out[1].trailing, Some(1.0));
        assert_eq!(out[3].trailing, Some(2.0));
        assert_eq!(out[4].trailing, Some(3.0));
        assert_eq!(out[4].season, Some(2.5));
        assert_eq!(out[4].games_prior, 4);
    }

    #[test]
    fn missing_values_are_skipped() {
        let values = [Some(2.0), None, None, None, None];
        let out = prior_means(&[1, 2, 4, 5, 7], &values, 3);
        assert_eq!(out[3].trailing, Some(2.0));
        assert_eq!(out[4].trailing, None);
        assert_eq!(out[4].season, Some(2.0));
    }

    #[test]
    fn same_week_rows_are_not_history() {
        let values = [Some(1.0), Some(3.0), Some(10.0), Some(20.0)];
        let out = prior_means(&[1, 2, 2, 3], &values, 3);
        assert_eq!(out[1], out[2]);
        assert_eq!(out[2].games_prior, 1);
        assert_eq!(out[2].trailing, Some(1.0));
        assert_eq!(out[3].games_prior, 3);
        assert_eq!(out[3].season, Some(14.0 / 3.0));
    }

    #[test]
    fn league_prior_only_sees_earlier_keys() {
        let prior = LeaguePrior::new(
            1,
            vec![
                ((2023, 2), vec![Some(4.0)]),
                ((2023, 1), vec![Some(2.0)]),
                ((2023, 1), vec![Some(0.0)]),
                ((2023, 3), vec![None]),
            ],
        );
        assert_eq!(prior.mean_before((2023, 1), 0), None);
        assert_eq!(prior.mean_before((2023, 2), 0), Some(1.0));
        assert_eq!(prior.mean_before((2023, 3), 0), Some(2.0));
        assert_eq!(prior.mean_before((2024, 1), 0), Some(2.0));
        assert_eq!(prior.mean_before((2024, 1), 3), None);
    }
}
