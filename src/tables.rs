//! Input tables and their column contracts.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::error::TableError;
use crate::positions::Position;

pub const PLAYER_GAME_COLUMNS: &[&str] = &[
    "player",
    "player_id",
    "team",
    "opponent_team",
    "season",
    "week",
    "home",
    "game_id",
    "rush_att",
    "rush_yds",
    "rush_long",
    "targets",
    "rec",
    "rec_yds",
    "rec_long",
    "fantasy_points_ppr",
    "rush_td",
    "rec_td",
];

pub const TEAM_LOG_COLUMNS: &[&str] = &[
    "game_id",
    "home_pass_td",
    "home_rush_td",
    "away_pass_td",
    "away_rush_td",
    "home_pts_off",
    "away_pts_off",
];

pub const ROSTER_COLUMNS: &[&str] = &["season", "week", "game_type", "full_name", "position", "team"];

pub const SCHEDULE_COLUMNS: &[&str] = &["home_team", "away_team"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerStats {
    pub rush_att: f64,
    pub rush_yds: f64,
    pub rush_long: f64,
    pub targets: f64,
    pub rec: f64,
    pub rec_yds: f64,
    pub rec_long: f64,
    pub fantasy_points_ppr: f64,
    pub rush_td: f64,
    pub rec_td: f64,
}

impl PlayerStats {
    pub fn touches(&self) -> f64 {
        self.rush_att + self.targets + self.rec
    }

    /// Rushing plus receiving scores. Quarterbacks count rushing scores only,
    /// since their passing touchdowns are not what the label measures.
    pub fn total_td(&self, position: Option<Position>) -> f64 {
        match position {
            Some(Position::QB) => self.rush_td,
            _ => self.rush_td + self.rec_td,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerGameRecord {
    pub player: String,
    pub player_id: String,
    pub position: Option<Position>,
    pub team: String,
    pub opponent_team: String,
    pub season: Option<i32>,
    pub week: Option<u32>,
    pub home: bool,
    pub game_id: String,
    pub stats: Option<PlayerStats>,
    pub is_placeholder: bool,
}

impl PlayerGameRecord {
    pub fn season_week(&self) -> Option<(i32, u32)> {
        Some((self.season?, self.week?))
    }
}

#[derive(Debug, Deserialize)]
struct RawPlayerGame {
    player: String,
    player_id: String,
    #[serde(default)]
    position: Option<String>,
    team: String,
    #[serde(default)]
    opponent_team: Option<String>,
    #[serde(deserialize_with = "blank_as_none_int")]
    season: Option<i64>,
    #[serde(deserialize_with = "blank_as_none_int")]
    week: Option<i64>,
    #[serde(deserialize_with = "home_flag")]
    home: bool,
    game_id: String,
    #[serde(deserialize_with = "blank_as_zero")]
    rush_att: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rush_yds: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rush_long: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    targets: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rec: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rec_yds: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rec_long: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    fantasy_points_ppr: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rush_td: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    rec_td: f64,
}

impl From<RawPlayerGame> for PlayerGameRecord {
    fn from(raw: RawPlayerGame) -> Self {
        Self {
            player: raw.player.trim().to_string(),
            player_id: raw.player_id.trim().to_string(),
            position: raw.position.as_deref().and_then(|p| p.parse().ok()),
            team: raw.team.trim().to_string(),
            opponent_team: raw.opponent_team.unwrap_or_default().trim().to_string(),
            season: raw.season.and_then(|s| i32::try_from(s).ok()),
            week: raw.week.and_then(|w| u32::try_from(w).ok()),
            home: raw.home,
            game_id: raw.game_id.trim().to_string(),
            stats: Some(PlayerStats {
                rush_att: raw.rush_att,
                rush_yds: raw.rush_yds,
                rush_long: raw.rush_long,
                targets: raw.targets,
                rec: raw.rec,
                rec_yds: raw.rec_yds,
                rec_long: raw.rec_long,
                fantasy_points_ppr: raw.fantasy_points_ppr,
                rush_td: raw.rush_td,
                rec_td: raw.rec_td,
            }),
            is_placeholder: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamOutcome {
    pub td_scored: f64,
    pub td_allowed: f64,
    pub points_scored: f64,
    pub points_allowed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamGameRecord {
    pub team: String,
    pub season: i32,
    pub week: u32,
    pub outcome: Option<TeamOutcome>,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamGameLogRow {
    pub game_id: String,
    #[serde(deserialize_with = "blank_as_zero")]
    pub home_pass_td: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    pub home_rush_td: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    pub away_pass_td: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    pub away_rush_td: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    pub home_pts_off: f64,
    #[serde(deserialize_with = "blank_as_zero")]
    pub away_pts_off: f64,
}

/// `{season}_{week}_{away}_{home}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameKey {
    pub season: i32,
    pub week: u32,
    pub away: String,
    pub home: String,
}

impl FromStr for GameKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = raw.trim().split('_').collect::<Vec<_>>();
        let [season, week, away, home] = parts.as_slice() else {
            return Err(format!("game id {raw:?} is not season_week_away_home"));
        };
        let season = season
            .parse::<i32>()
            .map_err(|_| format!("game id {raw:?} has a non-numeric season"))?;
        let week = week
            .parse::<u32>()
            .map_err(|_| format!("game id {raw:?} has a non-numeric week"))?;
        if away.is_empty() || home.is_empty() {
            return Err(format!("game id {raw:?} is missing a team"));
        }
        Ok(Self {
            season,
            week,
            away: away.to_string(),
            home: home.to_string(),
        })
    }
}

impl GameKey {
    pub fn game_id(&self) -> String {
        format!("{}_{:02}_{}_{}", self.season, self.week, self.away, self.home)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    #[serde(deserialize_with = "blank_as_none_int")]
    pub season: Option<i64>,
    #[serde(deserialize_with = "blank_as_none_int")]
    pub week: Option<i64>,
    #[serde(default)]
    pub game_type: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduledGame {
    pub home_team: String,
    pub away_team: String,
}

pub fn load_player_games(path: &Path) -> Result<Vec<PlayerGameRecord>, TableError> {
    let rows: Vec<RawPlayerGame> = read_path("player-game", path, PLAYER_GAME_COLUMNS)?;
    let records = rows.into_iter().map(PlayerGameRecord::from).collect::<Vec<_>>();
    info!(rows = records.len(), path = %path.display(), "loaded player-game table");
    Ok(records)
}

pub fn parse_player_games<R: Read>(reader: R) -> Result<Vec<PlayerGameRecord>, TableError> {
    let rows: Vec<RawPlayerGame> =
        read_rows("player-game", PathBuf::from("<memory>"), reader, PLAYER_GAME_COLUMNS)?;
    Ok(rows.into_iter().map(PlayerGameRecord::from).collect())
}

pub fn load_team_log(path: &Path) -> Result<Vec<TeamGameLogRow>, TableError> {
    let rows = read_path("team-game log", path, TEAM_LOG_COLUMNS)?;
    info!(rows = rows.len(), path = %path.display(), "loaded team-game log");
    Ok(rows)
}

pub fn parse_team_log<R: Read>(reader: R) -> Result<Vec<TeamGameLogRow>, TableError> {
    read_rows("team-game log", PathBuf::from("<memory>"), reader, TEAM_LOG_COLUMNS)
}

pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>, TableError> {
    let rows = read_path("roster", path, ROSTER_COLUMNS)?;
    info!(rows = rows.len(), path = %path.display(), "loaded roster table");
    Ok(rows)
}

pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<RosterEntry>, TableError> {
    read_rows("roster", PathBuf::from("<memory>"), reader, ROSTER_COLUMNS)
}

pub fn load_schedule(path: &Path) -> Result<Vec<ScheduledGame>, TableError> {
    let rows: Vec<ScheduledGame> = read_path("schedule", path, SCHEDULE_COLUMNS)?;
    Ok(rows
        .into_iter()
        .map(|g| ScheduledGame {
            home_team: g.home_team.trim().to_string(),
            away_team: g.away_team.trim().to_string(),
        })
        .collect())
}

pub fn dedup_player_games(records: &[PlayerGameRecord]) -> (Vec<PlayerGameRecord>, usize) {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        if seen.insert((r.player_id.as_str(), r.season, r.week, r.game_id.as_str())) {
            out.push(r.clone());
        }
    }
    let dropped = records.len() - out.len();
    if dropped > 0 {
        warn!(dropped, "duplicate player-game rows dropped");
    }
    (out, dropped)
}

pub fn dedup_team_log(rows: &[TeamGameLogRow]) -> (Vec<TeamGameLogRow>, usize) {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for r in rows {
        if seen.insert(r.game_id.trim()) {
            out.push(r.clone());
        }
    }
    let dropped = rows.len() - out.len();
    if dropped > 0 {
        warn!(dropped, "duplicate team log rows dropped");
    }
    (out, dropped)
}

pub fn pivot_team_log(rows: &[TeamGameLogRow]) -> (Vec<TeamGameRecord>, usize) {
    let mut out = Vec::with_capacity(rows.len() * 2);
    let mut skipped = 0usize;

    for row in rows {
        let key = match row.game_id.parse::<GameKey>() {
            Ok(key) => key,
            Err(err) => {
                warn!("skipping team log row: {err}");
                skipped += 1;
                continue;
            }
        };
        let home_td = row.home_pass_td + row.home_rush_td;
        let away_td = row.away_pass_td + row.away_rush_td;

        out.push(TeamGameRecord {
            team: key.home.clone(),
            season: key.season,
            week: key.week,
            outcome: Some(TeamOutcome {
                td_scored: home_td,
                td_allowed: away_td,
                points_scored: row.home_pts_off,
                points_allowed: row.away_pts_off,
            }),
            is_placeholder: false,
        });
        out.push(TeamGameRecord {
            team: key.away,
            season: key.season,
            week: key.week,
            outcome: Some(TeamOutcome {
                td_scored: away_td,
                td_allowed: home_td,
                points_scored: row.away_pts_off,
                points_allowed: row.home_pts_off,
            }),
            is_placeholder: false,
        });
    }

    (out, skipped)
}

pub fn schedule_from_log(rows: &[TeamGameLogRow], season: i32, week: u32) -> Vec<ScheduledGame> {
    rows.iter()
        .filter_map(|row| row.game_id.parse::<GameKey>().ok())
        .filter(|key| key.season == season && key.week == week)
        .map(|key| ScheduledGame {
            home_team: key.home,
            away_team: key.away,
        })
        .collect()
}

fn read_path<T: DeserializeOwned>(
    table: &'static str,
    path: &Path,
    required: &[&str],
) -> Result<Vec<T>, TableError> {
    let file = std::fs::File::open(path).map_err(|err| TableError::Csv {
        table,
        path: path.to_path_buf(),
        source: csv::Error::from(err),
    })?;
    read_rows(table, path.to_path_buf(), file, required)
}

fn read_rows<R: Read, T: DeserializeOwned>(
    table: &'static str,
    path: PathBuf,
    reader: R,
    required: &[&str],
) -> Result<Vec<T>, TableError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(source) => return Err(TableError::Csv { table, path, source }),
    };
    let missing = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(TableError::MissingColumns {
            table,
            path,
            missing,
        });
    }

    let mut out = Vec::new();
    for row in rdr.deserialize::<T>() {
        match row {
            Ok(row) => out.push(row),
            Err(source) => return Err(TableError::Csv { table, path, source }),
        }
    }
    Ok(out)
}

fn is_blank(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "na" | "nan" | "null" | "none"
    )
}

fn blank_as_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw {
        Some(s) if !is_blank(&s) => s.trim().parse::<f64>().map_err(de::Error::custom),
        _ => Ok(0.0),
    }
}

// Accepts "2023" and "2023.0", since upstream exports sometimes float-cast.
fn blank_as_none_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    let Some(s) = raw.filter(|s| !is_blank(s)) else {
        return Ok(None);
    };
    let s = s.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Ok(Some(v));
    }
    let v = s.parse::<f64>().map_err(de::Error::custom)?;
    if v.fract() != 0.0 || !v.is_finite() {
        return Err(de::Error::custom(format!("{s:?} is not a whole number")));
    }
    Ok(Some(v as i64))
}

fn home_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    let Some(s) = raw else {
        return Ok(false);
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "home" | "h" => Ok(true),
        "" | "0" | "0.0" | "false" | "f" | "no" | "away" | "a" => Ok(false),
        other => Err(de::Error::custom(format!("unrecognized home flag {other:?}"))),
    }
}
