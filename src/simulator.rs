//! Poisson count simulation of touchdowns for rows with no outcome yet.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson, PoissonError};
use serde::Serialize;
use tracing::debug;

use crate::dataset::LeagueBaselines;
use crate::error::SimulationError;
use crate::player_features::FeatureRow;

pub const MIN_SAMPLES: usize = 10_000;
pub const LAMBDA_FLOOR: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedOutcome {
    pub lambda: f64,
    pub p_at_least_one: f64,
    pub p_at_least_two: f64,
}

pub fn rate_factor(rate: f64, league_average: f64) -> f64 {
    if league_average <= 0.0 || !league_average.is_finite() {
        return 1.0;
    }
    let ratio = rate / league_average;
    if ratio.is_finite() { ratio } else { 1.0 }
}

/// Expected touchdowns for one row: the player's season rate scaled by the
/// team and opponent factors, floored at [`LAMBDA_FLOOR`].
pub fn lambda_for(row: &FeatureRow, baselines: &LeagueBaselines) -> f64 {
    let player_rate = row
        .season_td_rate
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(baselines.player_td_rate);
    let lambda = player_rate
        * rate_factor(row.team_td_rate, baselines.team_td_rate)
        * rate_factor(row.opp_td_allowed_rate, baselines.opp_td_allowed_rate);
    if lambda.is_finite() {
        lambda.max(LAMBDA_FLOOR)
    } else {
        LAMBDA_FLOOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoissonSimulator {
    samples: usize,
    seed: u64,
}

impl PoissonSimulator {
    pub const NAME: &'static str = "poisson_sim";

    pub fn new(samples: usize, seed: u64) -> Self {
        Self {
            samples: samples.max(MIN_SAMPLES),
            seed,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn simulate_lambda(
        &self,
        lambda: f64,
        rng: &mut StdRng,
    ) -> Result<(u64, u64), PoissonError> {
        let dist = Poisson::new(lambda)?;
        let mut at_least_one = 0u64;
        let mut at_least_two = 0u64;
        for _ in 0..self.samples {
            let count: f64 = dist.sample(rng);
            if count >= 1.0 {
                at_least_one += 1;
            }
            if count >= 2.0 {
                at_least_two += 1;
            }
        }
        Ok((at_least_one, at_least_two))
    }

    pub fn run(
        &self,
        rows: &[FeatureRow],
        baselines: &LeagueBaselines,
    ) -> Result<Vec<SimulatedOutcome>, SimulationError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = self.samples as f64;
        let out = rows
            .iter()
            .map(|row| {
                let lambda = lambda_for(row, baselines);
                let (one, two) = self.simulate_lambda(lambda, &mut rng).map_err(|_| {
                    SimulationError::InvalidRate {
                        player: row.record.player.clone(),
                        lambda,
                    }
                })?;
                Ok(SimulatedOutcome {
                    lambda,
                    p_at_least_one: one as f64 / n,
                    p_at_least_two: two as f64 / n,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(rows = out.len(), samples = self.samples, "simulation complete");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors_fall_back_to_neutral() {
        assert_eq!(rate_factor(2.0, 0.0), 1.0);
        assert_eq!(rate_factor(2.0, -1.0), 1.0);
        assert_eq!(rate_factor(f64::NAN, 2.0), 1.0);
        assert_eq!(rate_factor(3.0, 2.0), 1.5);
    }

    #[test]
    fn sample_count_has_a_floor() {
        assert_eq!(PoissonSimulator::new(10, 0).samples(), MIN_SAMPLES);
        assert_eq!(PoissonSimulator::new(20_000, 0).samples(), 20_000);
    }

    #[test]
    fn invalid_rate_is_rejected_by_the_sampler() {
        let sim = PoissonSimulator::new(MIN_SAMPLES, 0);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(sim.simulate_lambda(0.0, &mut rng).is_err());
    }
}
