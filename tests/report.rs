use std::collections::HashMap;

use anytime_td::odds::american_odds_string;
use anytime_td::report::{
    Prediction, build_report, dedup_predictions, write_predictions_csv, write_report_csv,
};

fn pred(player: &str, opp: &str, model: &str, p: f64) -> Prediction {
    Prediction {
        player: player.to_string(),
        player_id: player.to_lowercase(),
        team: "BUF".to_string(),
        opponent_team: opp.to_string(),
        model: model.to_string(),
        probability: p,
        american_odds: american_odds_string(p),
        season: 2023,
        upcoming_week: 5,
    }
}

fn sample() -> Vec<Prediction> {
    vec![
        pred("James Cook", "MIA", "forest", 0.31),
        pred("James Cook", "MIA", "forest", 0.44),
        pred("Josh Allen", "MIA", "forest", 0.44),
        pred("Stefon Diggs", "MIA", "logistic", 0.29),
        pred("James Cook", "MIA", "logistic", 0.38),
        pred("Stefon Diggs", "MIA", "logistic", 0.35),
        pred("James Cook", "NYJ", "forest", 0.2),
    ]
}

#[test]
fn dedup_keeps_the_highest_row_per_matchup() {
    let out = dedup_predictions(sample());
    assert_eq!(out.len(), 5);

    let forest = out.iter().filter(|p| p.model == "forest").collect::<Vec<_>>();
    assert_eq!(forest[0].player, "James Cook");
    assert_eq!(forest[0].probability, 0.44);
    assert_eq!(forest[1].player, "Josh Allen");
    assert_eq!(forest[2].opponent_team, "NYJ");

    let diggs = out
        .iter()
        .find(|p| p.model == "logistic" && p.player == "Stefon Diggs")
        .unwrap();
    assert_eq!(diggs.probability, 0.35);
}

#[test]
fn dedup_is_idempotent() {
    let once = dedup_predictions(sample());
    let twice = dedup_predictions(once.clone());
    assert_eq!(once, twice);

    let mut shuffled = sample();
    shuffled.reverse();
    assert_eq!(dedup_predictions(shuffled), once);
}

#[test]
fn writers_emit_the_documented_columns() {
    let dir = tempfile::tempdir().unwrap();
    let preds = dedup_predictions(sample());
    let report = build_report(&preds, &HashMap::new());

    let pred_path = dir.path().join("predictions.csv");
    write_predictions_csv(&pred_path, &preds).unwrap();
    let text = std::fs::read_to_string(&pred_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("player,team,opponent_team,model,probability,american_odds,upcoming_week")
    );
    assert_eq!(lines.next(), Some("James Cook,BUF,MIA,forest,0.440000,+127,5"));

    let report_path = dir.path().join("report.csv");
    write_report_csv(&report_path, &report).unwrap();
    let mut rdr = csv::Reader::from_path(&report_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "forest_probability"));
    assert!(headers.iter().any(|h| h == "highest_model"));
    assert_eq!(rdr.records().count(), report.len());
}
