//! Probability to American odds conversion.

pub const PROB_EPSILON: f64 = 1e-4;

pub fn clip_probability(p: f64) -> f64 {
    if p.is_nan() {
        return PROB_EPSILON;
    }
    p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
}

pub fn american_odds_f64(p: f64) -> f64 {
    let p = clip_probability(p);
    if p >= 0.5 {
        -100.0 * p / (1.0 - p)
    } else {
        100.0 * (1.0 - p) / p
    }
}

pub fn american_odds(p: f64) -> i64 {
    american_odds_f64(p).round() as i64
}

pub fn format_american(odds: i64) -> String {
    if odds >= 0 {
        format!("+{odds}")
    } else {
        odds.to_string()
    }
}

pub fn american_odds_string(p: f64) -> String {
    format_american(american_odds(p))
}

pub fn implied_probability(odds: f64) -> f64 {
    if odds < 0.0 {
        -odds / (-odds + 100.0)
    } else if odds > 0.0 {
        100.0 / (odds + 100.0)
    } else {
        0.5
    }
}
