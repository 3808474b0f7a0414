//! Per-player rolling usage features joined with team and opponent rates.

use std::collections::BTreeMap;

use crate::positions::Position;
use crate::rolling::{LeaguePrior, RollingValue, prior_means, resolve};
use crate::tables::{PlayerGameRecord, PlayerStats};
use crate::team_features::TeamFeatureTable;

pub const STAT_COUNT: usize = 10;

pub const STAT_NAMES: [&str; STAT_COUNT] = [
    "rush_att",
    "rush_yds",
    "rush_long",
    "targets",
    "rec",
    "rec_yds",
    "rec_long",
    "fantasy_points_ppr",
    "touches",
    "total_td",
];

const TOTAL_TD: usize = 9;

pub const FEATURE_COLUMNS: [&str; 2 * STAT_COUNT + 6] = [
    "rush_att_trailing",
    "rush_yds_trailing",
    "rush_long_trailing",
    "targets_trailing",
    "rec_trailing",
    "rec_yds_trailing",
    "rec_long_trailing",
    "fantasy_points_ppr_trailing",
    "touches_trailing",
    "total_td_trailing",
    "rush_att_season",
    "rush_yds_season",
    "rush_long_season",
    "targets_season",
    "rec_season",
    "rec_yds_season",
    "rec_long_season",
    "fantasy_points_ppr_season",
    "touches_season",
    "total_td_season",
    "games_prior",
    "is_home",
    "team_td_rate",
    "team_pts_rate",
    "opp_td_allowed_rate",
    "opp_pts_allowed_rate",
];

fn stat_values(stats: Option<PlayerStats>, position: Option<Position>) -> [Option<f64>; STAT_COUNT] {
    let Some(s) = stats else {
        return [None; STAT_COUNT];
    };
    [
        Some(s.rush_att),
        Some(s.rush_yds),
        Some(s.rush_long),
        Some(s.targets),
        Some(s.rec),
        Some(s.rec_yds),
        Some(s.rec_long),
        Some(s.fantasy_points_ppr),
        Some(s.touches()),
        Some(s.total_td(position)),
    ]
}

pub fn is_eligible(record: &PlayerGameRecord) -> bool {
    if record.season_week().is_none() || record.position.is_none() {
        return false;
    }
    if record.is_placeholder {
        return true;
    }
    record.stats.is_some_and(|s| s.touches() > 0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub record: PlayerGameRecord,
    pub season: i32,
    pub week: u32,
    pub games_prior: usize,
    pub trailing: [RollingValue; STAT_COUNT],
    pub season_avg: [RollingValue; STAT_COUNT],
    pub season_td_rate: Option<f64>,
    pub team_td_rate: f64,
    pub team_pts_rate: f64,
    pub opp_td_allowed_rate: f64,
    pub opp_pts_allowed_rate: f64,
    pub scored_td: Option<bool>,
}

impl FeatureRow {
    pub fn is_placeholder(&self) -> bool {
        self.record.is_placeholder
    }

    pub fn features(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(FEATURE_COLUMNS.len());
        out.extend(self.trailing.iter().map(|v| v.value));
        out.extend(self.season_avg.iter().map(|v| v.value));
        out.push(self.games_prior as f64);
        out.push(if self.record.home { 1.0 } else { 0.0 });
        out.push(self.team_td_rate);
        out.push(self.team_pts_rate);
        out.push(self.opp_td_allowed_rate);
        out.push(self.opp_pts_allowed_rate);
        for v in &mut out {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        out
    }

    pub fn total_td(&self) -> Option<f64> {
        self.record
            .stats
            .map(|s| s.total_td(self.record.position))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerFeatureStats {
    pub input_rows: usize,
    pub ineligible: usize,
    pub missing_team_join: usize,
    pub missing_opponent_join: usize,
}

pub fn build_player_features(
    records: &[PlayerGameRecord],
    teams: &TeamFeatureTable,
    window: usize,
) -> (Vec<FeatureRow>, PlayerFeatureStats) {
    let mut stats = PlayerFeatureStats {
        input_rows: records.len(),
        ..PlayerFeatureStats::default()
    };

    let eligible = records
        .iter()
        .filter(|r| {
            let ok = is_eligible(r);
            if !ok {
                stats.ineligible += 1;
            }
            ok
        })
        .collect::<Vec<_>>();

    let league = LeaguePrior::new(
        STAT_COUNT,
        eligible
            .iter()
            .filter(|r| !r.is_placeholder)
            .filter_map(|r| {
                let key = r.season_week()?;
                Some((key, stat_values(r.stats, r.position).to_vec()))
            }),
    );

    let mut groups: BTreeMap<(String, i32), Vec<&PlayerGameRecord>> = BTreeMap::new();
    for record in &eligible {
        let Some(season) = record.season else {
            continue;
        };
        groups
            .entry((record.player_id.clone(), season))
            .or_default()
            .push(record);
    }

    let mut rows = Vec::with_capacity(eligible.len());
    for ((_, season), group) in groups.iter_mut() {
        group.sort_by(|a, b| {
            (a.week, a.is_placeholder, &a.game_id).cmp(&(b.week, b.is_placeholder, &b.game_id))
        });

        let weeks = group
            .iter()
            .map(|r| r.week.unwrap_or_default())
            .collect::<Vec<_>>();
        let per_stat = (0..STAT_COUNT)
            .map(|c| {
                let values = group
                    .iter()
                    .map(|r| stat_values(r.stats, r.position)[c])
                    .collect::<Vec<_>>();
                prior_means(&weeks, &values, window)
            })
            .collect::<Vec<_>>();

        for (i, record) in group.iter().enumerate() {
            let week = record.week.unwrap_or_default();
            let key = (*season, week);
            let trailing: [RollingValue; STAT_COUNT] = std::array::from_fn(|c| {
                let m = per_stat[c][i];
                resolve(m.trailing, m.season, league.mean_before(key, c))
            });
            let season_avg: [RollingValue; STAT_COUNT] = std::array::from_fn(|c| {
                let m = per_stat[c][i];
                resolve(None, m.season, league.mean_before(key, c))
            });

            let own = teams.get(*season, week, &record.team);
            let opp = teams.get(*season, week, &record.opponent_team);
            if own.is_none() {
                stats.missing_team_join += 1;
            }
            if opp.is_none() {
                stats.missing_opponent_join += 1;
            }

            rows.push(FeatureRow {
                record: (*record).clone(),
                season: *season,
                week,
                games_prior: per_stat[0][i].games_prior,
                trailing,
                season_avg,
                season_td_rate: per_stat[TOTAL_TD][i].season,
                team_td_rate: own.map(|t| t.rates.td_scored.value).unwrap_or(0.0),
                team_pts_rate: own.map(|t| t.rates.points_scored.value).unwrap_or(0.0),
                opp_td_allowed_rate: opp.map(|t| t.rates.td_allowed.value).unwrap_or(0.0),
                opp_pts_allowed_rate: opp.map(|t| t.rates.points_allowed.value).unwrap_or(0.0),
                scored_td: record
                    .stats
                    .map(|s| s.total_td(record.position) > 0.0),
            });
        }
    }

    rows.sort_by(|a, b| {
        (a.season, a.week, &a.record.team, &a.record.player_id).cmp(&(
            b.season,
            b.week,
            &b.record.team,
            &b.record.player_id,
        ))
    });

    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarterback_touchdowns_exclude_receiving() {
        let stats = PlayerStats {
            rush_td: 1.0,
            rec_td: 1.0,
            ..PlayerStats::default()
        };
        assert_eq!(stats.total_td(Some(Position::QB)), 1.0);
        assert_eq!(stats.total_td(Some(Position::WR)), 2.0);
    }

    #[test]
    fn feature_columns_match_vector_width() {
        let row = FeatureRow {
            record: PlayerGameRecord {
                player: "P".to_string(),
                player_id: "1".to_string(),
                position: Some(Position::RB),
                team: "KC".to_string(),
                opponent_team: "LV".to_string(),
                season: Some(2023),
                week: Some(2),
                home: true,
                game_id: "2023_02_LV_KC".to_string(),
                stats: None,
                is_placeholder: true,
            },
            season: 2023,
            week: 2,
            games_prior: 1,
            trailing: [resolve(Some(f64::NAN), None, None); STAT_COUNT],
            season_avg: [resolve(None, Some(1.0), None); STAT_COUNT],
            season_td_rate: Some(1.0),
            team_td_rate: f64::NAN,
            team_pts_rate: 20.0,
            opp_td_allowed_rate: 2.0,
            opp_pts_allowed_rate: 24.0,
            scored_td: None,
        };
        let x = row.features();
        assert_eq!(x.len(), FEATURE_COLUMNS.len());
        assert!(x.iter().all(|v| v.is_finite()));
        assert_eq!(x[FEATURE_COLUMNS.iter().position(|c| *c == "is_home").unwrap()], 1.0);
    }
}
