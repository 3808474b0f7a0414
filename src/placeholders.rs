//! Forward-looking rows for games that have not been played yet.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use crate::dataset::Target;
use crate::player_features::is_eligible;
use crate::tables::{GameKey, PlayerGameRecord, ScheduledGame, TeamGameRecord};

pub fn team_placeholders(
    records: &[TeamGameRecord],
    schedule: &[ScheduledGame],
    target: Target,
) -> Vec<TeamGameRecord> {
    let teams = schedule
        .iter()
        .flat_map(|g| [g.home_team.as_str(), g.away_team.as_str()])
        .collect::<BTreeSet<_>>();

    let mut out = Vec::new();
    for team in teams {
        let in_season = records
            .iter()
            .filter(|r| !r.is_placeholder && r.team == team && r.season == target.season);

        if in_season.clone().any(|r| r.week == target.week) {
            debug!(team = %team, "team already has a row for the target week");
            continue;
        }
        let Some(latest) = in_season
            .filter(|r| r.week < target.week)
            .max_by_key(|r| r.week)
        else {
            debug!(team = %team, "no prior game this season, skipping team placeholder");
            continue;
        };

        out.push(TeamGameRecord {
            team: latest.team.clone(),
            season: target.season,
            week: target.week,
            outcome: None,
            is_placeholder: true,
        });
    }

    info!(count = out.len(), "injected team placeholders");
    out
}

/// A player belongs to the team of their most recent eligible game this season
/// before the target week. Players without such a game, or who already have a
/// row in the target week, are not projected.
pub fn player_placeholders(
    records: &[PlayerGameRecord],
    schedule: &[ScheduledGame],
    target: Target,
) -> Vec<PlayerGameRecord> {
    let mut latest: BTreeMap<&str, &PlayerGameRecord> = BTreeMap::new();
    let mut already_played: HashSet<&str> = HashSet::new();

    for record in records {
        if record.is_placeholder || !is_eligible(record) {
            continue;
        }
        let Some((season, week)) = record.season_week() else {
            continue;
        };
        if season != target.season {
            continue;
        }
        if week >= target.week {
            if week == target.week {
                already_played.insert(record.player_id.as_str());
            }
            continue;
        }
        latest
            .entry(record.player_id.as_str())
            .and_modify(|cur| {
                if (record.week, &record.game_id) > (cur.week, &cur.game_id) {
                    *cur = record;
                }
            })
            .or_insert(record);
    }

    let mut placed: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for game in schedule {
        let game_id = GameKey {
            season: target.season,
            week: target.week,
            away: game.away_team.clone(),
            home: game.home_team.clone(),
        }
        .game_id();

        let sides = [
            (&game.home_team, &game.away_team, true),
            (&game.away_team, &game.home_team, false),
        ];
        for (team, opponent, home) in sides {
            for (player_id, row) in &latest {
                if row.team != *team
                    || already_played.contains(player_id)
                    || !placed.insert(*player_id)
                {
                    continue;
                }
                out.push(PlayerGameRecord {
                    player: row.player.clone(),
                    player_id: row.player_id.clone(),
                    position: row.position,
                    team: team.clone(),
                    opponent_team: opponent.clone(),
                    season: Some(target.season),
                    week: Some(target.week),
                    home,
                    game_id: game_id.clone(),
                    stats: None,
                    is_placeholder: true,
                });
            }
        }
    }

    info!(
        count = out.len(),
        games = schedule.len(),
        "injected player placeholders"
    );
    out
}
