mod common;

use std::io::Write;

use anytime_td::error::TableError;
use anytime_td::pipeline::{InputPaths, PipelineInputs};
use anytime_td::positions::{Position, PositionResolver};
use anytime_td::tables::{load_player_games, load_schedule, load_team_log, parse_roster, pivot_team_log};

use common::{league, roster, roster_players};

fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    path
}

#[test]
fn missing_columns_fail_fast_and_name_every_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "players.csv",
        "player,player_id,team,season,week,home,game_id,rush_att,rush_yds,rush_long,targets,rec,rec_yds,rec_long,fantasy_points_ppr,rush_td\n\
         A,1,KC,2023,1,1,2023_01_LV_KC,1,1,1,1,1,1,1,1,0\n",
    );

    let err = load_player_games(&path).unwrap_err();
    match &err {
        TableError::MissingColumns {
            table,
            path: reported,
            missing,
        } => {
            assert_eq!(*table, "player-game");
            assert_eq!(reported, &path);
            assert_eq!(missing, &vec!["opponent_team".to_string(), "rec_td".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("opponent_team") && msg.contains("rec_td"));
    assert!(msg.contains("players.csv"));
}

#[test]
fn malformed_game_ids_are_skipped_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "log.csv",
        "game_id,home_pass_td,home_rush_td,away_pass_td,away_rush_td,home_pts_off,away_pts_off\n\
         2023_01_LV_KC,2,1,1,0,24,10\n\
         garbage,1,1,1,1,7,7\n",
    );
    let rows = load_team_log(&path).unwrap();
    assert_eq!(rows.len(), 2);
    let (records, skipped) = pivot_team_log(&rows);
    assert_eq!(skipped, 1);
    assert_eq!(records.len(), 2);
}

#[test]
fn schedule_values_are_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "schedule.csv", "home_team,away_team\n KC ,LV\n");
    let games = load_schedule(&path).unwrap();
    assert_eq!(games[0].home_team, "KC");
    assert_eq!(games[0].away_team, "LV");
}

#[test]
fn pipeline_inputs_report_which_table_failed() {
    let dir = tempfile::tempdir().unwrap();
    let players = write_file(&dir, "players.csv", "player\nA\n");
    let err = PipelineInputs::load(&InputPaths {
        players,
        team_log: dir.path().join("log.csv"),
        roster: dir.path().join("roster.csv"),
        schedule: None,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("loading player-game table"));
}

#[test]
fn positions_resolve_by_id_then_name() {
    let inputs = league(2);
    let resolver = PositionResolver::from_roster(&inputs.roster, 2023);
    let (resolved, stats) = resolver.resolve(&inputs.players);

    assert_eq!(stats.unresolved, 0);
    assert_eq!(stats.resolution_rate(), 1.0);
    assert_eq!(stats.by_id, inputs.players.iter().filter(|r| r.position.is_none()).count());
    let kelce = resolved.iter().find(|r| r.player_id == "kc-te").unwrap();
    assert_eq!(kelce.position, Some(Position::TE));

    let mut by_name = roster(&roster_players(), 2023);
    for entry in &mut by_name {
        entry.player_id = None;
        entry.full_name = format!("  {}  ", entry.full_name.to_uppercase());
    }
    let (_, stats) = PositionResolver::from_roster(&by_name, 2023).resolve(&inputs.players);
    assert_eq!(stats.by_id, 0);
    assert_eq!(stats.by_name, stats.total - stats.from_source);
}

#[test]
fn roster_outside_reference_season_is_ignored() {
    let inputs = league(2);
    let (_, stats) = PositionResolver::from_roster(&inputs.roster, 2022).resolve(&inputs.players);
    assert!(stats.unresolved > 0);
    assert!(stats.resolution_rate() < 1.0);
}

#[test]
fn roster_rows_outside_regular_season_are_ignored() {
    let csv = "season,week,game_type,full_name,position,team,player_id\n\
               2023,19,POST,Travis Kelce,TE,KC,kc-te\n\
               2023,3,REG,Josh Jacobs,RB,LV,\n";
    let entries = parse_roster(csv.as_bytes()).unwrap();
    let resolver = PositionResolver::from_roster(&entries, 2023);
    assert_eq!(resolver.lookup("kc-te", "Travis Kelce"), None);
    assert_eq!(
        resolver.lookup("", "josh  jacobs").map(|(p, _)| p),
        Some(Position::RB)
    );
}
