use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::rolling::{LeaguePrior, RollingValue, prior_means, resolve};
use crate::tables::{TeamGameRecord, TeamOutcome};

pub const TEAM_OUTCOME_COLUMNS: [&str; 4] =
    ["td_scored", "td_allowed", "points_scored", "points_allowed"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamRates {
    pub td_scored: RollingValue,
    pub td_allowed: RollingValue,
    pub points_scored: RollingValue,
    pub points_allowed: RollingValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamFeatureRow {
    pub record: TeamGameRecord,
    pub games_prior: usize,
    pub rates: TeamRates,
}

#[derive(Debug, Clone, Default)]
pub struct TeamFeatureTable {
    rows: Vec<TeamFeatureRow>,
    index: HashMap<(i32, u32, String), usize>,
}

impl TeamFeatureTable {
    pub fn rows(&self) -> &[TeamFeatureRow] {
        &self.rows
    }

    pub fn get(&self, season: i32, week: u32, team: &str) -> Option<&TeamFeatureRow> {
        self.index
            .get(&(season, week, team.to_string()))
            .map(|idx| &self.rows[*idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn outcome_values(outcome: Option<TeamOutcome>) -> [Option<f64>; 4] {
    match outcome {
        Some(o) => [
            Some(o.td_scored),
            Some(o.td_allowed),
            Some(o.points_scored),
            Some(o.points_allowed),
        ],
        None => [None; 4],
    }
}

pub fn build_team_features(records: &[TeamGameRecord], window: usize) -> TeamFeatureTable {
    let league = LeaguePrior::new(
        TEAM_OUTCOME_COLUMNS.len(),
        records
            .iter()
            .filter(|r| !r.is_placeholder)
            .map(|r| ((r.season, r.week), outcome_values(r.outcome).to_vec())),
    );

    let mut groups: BTreeMap<(String, i32), Vec<&TeamGameRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.team.clone(), record.season))
            .or_default()
            .push(record);
    }

    let mut rows = Vec::with_capacity(records.len());
    for group in groups.values_mut() {
        group.sort_by_key(|r| (r.week, r.is_placeholder));

        let weeks = group.iter().map(|r| r.week).collect::<Vec<_>>();
        let per_column = (0..TEAM_OUTCOME_COLUMNS.len())
            .map(|c| {
                let values = group
                    .iter()
                    .map(|r| outcome_values(r.outcome)[c])
                    .collect::<Vec<_>>();
                prior_means(&weeks, &values, window)
            })
            .collect::<Vec<_>>();

        for (i, record) in group.iter().enumerate() {
            let key = (record.season, record.week);
            let rate = |c: usize| {
                let m = per_column[c][i];
                resolve(m.trailing, m.season, league.mean_before(key, c))
            };
            rows.push(TeamFeatureRow {
                record: (*record).clone(),
                games_prior: per_column[0][i].games_prior,
                rates: TeamRates {
                    td_scored: rate(0),
                    td_allowed: rate(1),
                    points_scored: rate(2),
                    points_allowed: rate(3),
                },
            });
        }
    }

    rows.sort_by(|a, b| {
        (a.record.season, a.record.week, &a.record.team).cmp(&(
            b.record.season,
            b.record.week,
            &b.record.team,
        ))
    });

    let mut index = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        index
            .entry((row.record.season, row.record.week, row.record.team.clone()))
            .or_insert(idx);
    }

    TeamFeatureTable { rows, index }
}
