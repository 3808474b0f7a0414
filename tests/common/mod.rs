#![allow(dead_code)]

use anytime_td::dataset::Target;
use anytime_td::pipeline::PipelineInputs;
use anytime_td::positions::Position;
use anytime_td::tables::{
    GameKey, PlayerGameRecord, PlayerStats, RosterEntry, ScheduledGame, TeamGameLogRow,
};

/// (away, home) pairs; sides swap on even weeks.
pub const MATCHUPS: [(&str, &str); 2] = [("LV", "KC"), ("MIA", "BUF")];

pub const TARGET: Target = Target {
    season: 2023,
    week: 5,
};

pub struct SyntheticPlayer {
    pub id: &'static str,
    pub name: &'static str,
    pub team: &'static str,
    pub position: Position,
    /// Carries its position in the player table; otherwise only the roster knows it.
    pub position_in_source: bool,
}

pub fn roster_players() -> Vec<SyntheticPlayer> {
    let mut out = Vec::new();
    let spec: [(&str, [(&str, &str, Position); 3]); 4] = [
        (
            "KC",
            [
                ("kc-rb", "Isiah Pacheco", Position::RB),
                ("kc-te", "Travis Kelce", Position::TE),
                ("kc-qb", "Patrick Mahomes", Position::QB),
            ],
        ),
        (
            "LV",
            [
                ("lv-rb", "Josh Jacobs", Position::RB),
                ("lv-wr", "Davante Adams", Position::WR),
                ("lv-qb", "Jimmy Garoppolo", Position::QB),
            ],
        ),
        (
            "BUF",
            [
                ("buf-rb", "James Cook", Position::RB),
                ("buf-wr", "Stefon Diggs", Position::WR),
                ("buf-qb", "Josh Allen", Position::QB),
            ],
        ),
        (
            "MIA",
            [
                ("mia-rb", "Raheem Mostert", Position::RB),
                ("mia-wr", "Tyreek Hill", Position::WR),
                ("mia-qb", "Tua Tagovailoa", Position::QB),
            ],
        ),
    ];
    for (team, players) in spec {
        for (i, (id, name, position)) in players.into_iter().enumerate() {
            out.push(SyntheticPlayer {
                id,
                name,
                team,
                position,
                position_in_source: i != 1,
            });
        }
    }
    out
}

/// Deterministic box score. Running backs get heavy usage and score often.
pub fn stats_for(position: Position, season: i32, week: u32, salt: usize) -> PlayerStats {
    let k = (season as usize * 7 + week as usize * 3 + salt) % 5;
    let (rush_att, targets, rec) = match position {
        Position::RB | Position::FB => (14.0 + k as f64, 3.0, 2.0),
        Position::WR | Position::TE => (0.0, 7.0 + k as f64, 5.0),
        Position::QB => (4.0, 0.0, 0.0),
    };
    let scores = match position {
        Position::RB | Position::FB => k >= 2,
        Position::WR | Position::TE => k >= 4,
        Position::QB => k == 0,
    };
    PlayerStats {
        rush_att,
        rush_yds: rush_att * 4.2,
        rush_long: rush_att * 1.1,
        targets,
        rec,
        rec_yds: rec * 11.0,
        rec_long: rec * 3.0,
        fantasy_points_ppr: rush_att * 0.5 + rec * 2.0 + if scores { 6.0 } else { 0.0 },
        rush_td: if scores && rush_att > 0.0 { 1.0 } else { 0.0 },
        rec_td: if scores && rush_att == 0.0 { 1.0 } else { 0.0 },
    }
}

pub fn sides(week: u32) -> Vec<(&'static str, &'static str)> {
    MATCHUPS
        .iter()
        .map(|(a, h)| if week % 2 == 0 { (*h, *a) } else { (*a, *h) })
        .collect()
}

pub fn game_id(season: i32, week: u32, away: &str, home: &str) -> String {
    GameKey {
        season,
        week,
        away: away.to_string(),
        home: home.to_string(),
    }
    .game_id()
}

pub fn player_row(
    p: &SyntheticPlayer,
    season: i32,
    week: u32,
    salt: usize,
) -> Option<PlayerGameRecord> {
    let (away, home) = sides(week)
        .into_iter()
        .find(|(a, h)| *a == p.team || *h == p.team)?;
    let is_home = home == p.team;
    let opponent = if is_home { away } else { home };
    Some(PlayerGameRecord {
        player: p.name.to_string(),
        player_id: p.id.to_string(),
        position: p.position_in_source.then_some(p.position),
        team: p.team.to_string(),
        opponent_team: opponent.to_string(),
        season: Some(season),
        week: Some(week),
        home: is_home,
        game_id: game_id(season, week, away, home),
        stats: Some(stats_for(p.position, season, week, salt)),
        is_placeholder: false,
    })
}

/// Two seasons of games: all of 2022 weeks 1-6 and 2023 through `last_week`.
pub fn league(last_week: u32) -> PipelineInputs {
    let players = roster_players();
    let mut player_rows = Vec::new();
    let mut team_log = Vec::new();
    let weeks = (1..=6u32)
        .map(|w| (2022, w))
        .chain((1..=last_week).map(|w| (2023, w)));

    for (season, week) in weeks {
        for (away, home) in sides(week) {
            let team_td = |team: &str| {
                players
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.team == team)
                    .map(|(i, p)| stats_for(p.position, season, week, i).total_td(Some(p.position)))
                    .sum::<f64>()
            };
            let home_td = team_td(home);
            let away_td = team_td(away);
            team_log.push(TeamGameLogRow {
                game_id: game_id(season, week, away, home),
                home_pass_td: 1.0,
                home_rush_td: home_td,
                away_pass_td: 1.0,
                away_rush_td: away_td,
                home_pts_off: 7.0 * (home_td + 1.0) + 3.0,
                away_pts_off: 7.0 * (away_td + 1.0),
            });
        }
        for (i, p) in players.iter().enumerate() {
            player_rows.extend(player_row(p, season, week, i));
        }
    }

    PipelineInputs {
        players: player_rows,
        team_log,
        roster: roster(&players, 2023),
        schedule: sides(TARGET.week)
            .into_iter()
            .map(|(away, home)| ScheduledGame {
                home_team: home.to_string(),
                away_team: away.to_string(),
            })
            .collect(),
    }
}

pub fn roster(players: &[SyntheticPlayer], season: i64) -> Vec<RosterEntry> {
    players
        .iter()
        .map(|p| RosterEntry {
            season: Some(season),
            week: Some(1),
            game_type: "REG".to_string(),
            full_name: p.name.to_string(),
            position: p.position.to_string(),
            team: p.team.to_string(),
            player_id: Some(p.id.to_string()),
        })
        .collect()
}
