use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use crate::tables::{PlayerGameRecord, RosterEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    FB,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QB" => Ok(Self::QB),
            "RB" => Ok(Self::RB),
            "WR" => Ok(Self::WR),
            "TE" => Ok(Self::TE),
            "FB" => Ok(Self::FB),
            other => Err(format!("unsupported position {other:?}")),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QB => "QB",
            Self::RB => "RB",
            Self::WR => "WR",
            Self::TE => "TE",
            Self::FB => "FB",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub total: usize,
    pub from_source: usize,
    pub by_id: usize,
    pub by_name: usize,
    pub unresolved: usize,
}

impl ResolutionStats {
    pub fn resolved(&self) -> usize {
        self.from_source + self.by_id + self.by_name
    }

    pub fn resolution_rate(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.resolved() as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionResolver {
    by_id: HashMap<String, Position>,
    by_name: HashMap<String, Position>,
}

impl PositionResolver {
    pub fn from_roster(roster: &[RosterEntry], reference_season: i32) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for entry in roster {
            if entry.season != Some(reference_season as i64) {
                continue;
            }
            if !entry.game_type.trim().eq_ignore_ascii_case("REG") {
                continue;
            }
            if !entry.week.is_some_and(|w| (1..=18).contains(&w)) {
                continue;
            }
            let Ok(position) = entry.position.parse::<Position>() else {
                continue;
            };

            if let Some(id) = entry.player_id.as_deref().map(str::trim)
                && !id.is_empty()
            {
                by_id.entry(id.to_string()).or_insert(position);
            }
            let name = normalize_name(&entry.full_name);
            if !name.is_empty() {
                by_name.entry(name).or_insert(position);
            }
        }

        Self { by_id, by_name }
    }

    pub fn lookup(&self, player_id: &str, name: &str) -> Option<(Position, Source)> {
        if let Some(p) = self.by_id.get(player_id.trim()) {
            return Some((*p, Source::Id));
        }
        self.by_name
            .get(&normalize_name(name))
            .map(|p| (*p, Source::Name))
    }

    pub fn resolve(&self, rows: &[PlayerGameRecord]) -> (Vec<PlayerGameRecord>, ResolutionStats) {
        let mut stats = ResolutionStats {
            total: rows.len(),
            ..ResolutionStats::default()
        };

        let out = rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if row.position.is_some() {
                    stats.from_source += 1;
                    return row;
                }
                match self.lookup(&row.player_id, &row.player) {
                    Some((position, Source::Id)) => {
                        stats.by_id += 1;
                        row.position = Some(position);
                    }
                    Some((position, Source::Name)) => {
                        stats.by_name += 1;
                        row.position = Some(position);
                    }
                    None => stats.unresolved += 1,
                }
                row
            })
            .collect::<Vec<_>>();

        info!(
            total = stats.total,
            unresolved = stats.unresolved,
            rate = format!("{:.3}", stats.resolution_rate()),
            "resolved player positions"
        );
        (out, stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Id,
    Name,
}

pub fn normalize_name(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(name: &str, id: Option<&str>, pos: &str, season: i64, week: i64, kind: &str) -> RosterEntry {
        RosterEntry {
            season: Some(season),
            week: Some(week),
            game_type: kind.to_string(),
            full_name: name.to_string(),
            position: pos.to_string(),
            team: "KC".to_string(),
            player_id: id.map(str::to_string),
        }
    }

    fn row(id: &str, name: &str, position: Option<Position>) -> PlayerGameRecord {
        PlayerGameRecord {
            player: name.to_string(),
            player_id: id.to_string(),
            position,
            team: "KC".to_string(),
            opponent_team: "DEN".to_string(),
            season: Some(2023),
            week: Some(1),
            home: true,
            game_id: "2023_01_DEN_KC".to_string(),
            stats: None,
            is_placeholder: false,
        }
    }

    #[test]
    fn id_wins_over_name_and_name_is_case_insensitive() {
        let resolver = PositionResolver::from_roster(
            &[
                roster("Travis Kelce", Some("00-1"), "TE", 2023, 3, "REG"),
                roster("Isiah  Pacheco", None, "RB", 2023, 4, "REG"),
                roster("Playoff Only", Some("00-9"), "WR", 2023, 19, "POST"),
                roster("Old Season", Some("00-8"), "WR", 2021, 2, "REG"),
            ],
            2023,
        );

        let rows = vec![
            row("00-1", "Somebody Else", None),
            row("00-2", "isiah pacheco", None),
            row("00-9", "Playoff Only", None),
            row("00-8", "Old Season", None),
            row("00-3", "Patrick Mahomes", Some(Position::QB)),
        ];
        let (out, stats) = resolver.resolve(&rows);

        assert_eq!(out[0].position, Some(Position::TE));
        assert_eq!(out[1].position, Some(Position::RB));
        assert_eq!(out[2].position, None);
        assert_eq!(out[3].position, None);
        assert_eq!(out[4].position, Some(Position::QB));
        assert_eq!(
            stats,
            ResolutionStats {
                total: 5,
                from_source: 1,
                by_id: 1,
                by_name: 1,
                unresolved: 2,
            }
        );
        assert!((stats.resolution_rate() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn unknown_positions_do_not_parse() {
        assert_eq!("wr".parse::<Position>(), Ok(Position::WR));
        assert!("K".parse::<Position>().is_err());
        assert!("".parse::<Position>().is_err());
    }
}
