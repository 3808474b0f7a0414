use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::DatasetBundle;
use crate::metrics::{ValidationReport, validation_report};
use crate::models::Classifier;
use crate::report::{MatchupKey, Prediction};
use crate::simulator::PoissonSimulator;

pub enum Component {
    Classifier(Box<dyn Classifier>),
    Simulator(PoissonSimulator),
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classifier(c) => c.name(),
            Self::Simulator(_) => PoissonSimulator::NAME,
        }
    }

    fn run(self, bundle: &DatasetBundle) -> Result<ComponentOutput> {
        let started = Instant::now();
        let name = self.name();
        let validation_labels = bundle.validation_labels();

        let (validation_probs, upcoming, at_least_two) = match self {
            Self::Classifier(mut model) => {
                model
                    .fit(&bundle.train_matrix(), &bundle.train_labels())
                    .with_context(|| format!("{name}: fit failed"))?;
                let validation = model
                    .predict_proba(&bundle.validation_matrix())
                    .with_context(|| format!("{name}: validation inference failed"))?;
                let upcoming = model
                    .predict_proba(&bundle.upcoming_matrix())
                    .with_context(|| format!("{name}: upcoming inference failed"))?;
                (validation, upcoming, None)
            }
            Self::Simulator(sim) => {
                let baselines = bundle.baselines();
                let validation = sim
                    .run(bundle.validation(), &baselines)
                    .with_context(|| format!("{name}: validation simulation failed"))?;
                let upcoming = sim
                    .run(bundle.upcoming(), &baselines)
                    .with_context(|| format!("{name}: upcoming simulation failed"))?;
                (
                    validation.iter().map(|o| o.p_at_least_one).collect(),
                    upcoming.iter().map(|o| o.p_at_least_one).collect(),
                    Some(upcoming.iter().map(|o| o.p_at_least_two).collect()),
                )
            }
        };

        let validation = validation_report(&validation_probs, &validation_labels);
        Ok(ComponentOutput {
            name,
            validation,
            upcoming,
            at_least_two,
            elapsed: started.elapsed(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ComponentOutput {
    pub name: &'static str,
    pub validation: ValidationReport,
    pub upcoming: Vec<f64>,
    pub at_least_two: Option<Vec<f64>>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedComponent {
    pub name: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnsembleOutcome {
    pub outputs: Vec<ComponentOutput>,
    pub omitted: Vec<OmittedComponent>,
}

/// Runs `components` in parallel and waits at most `deadline` for all of them.
///
/// Outputs keep the order of `components`. Threads still running at the
/// deadline are detached and their results dropped.
pub fn run_components(
    bundle: Arc<DatasetBundle>,
    components: Vec<Component>,
    deadline: Duration,
) -> EnsembleOutcome {
    let (tx, rx) = mpsc::channel::<(usize, Result<ComponentOutput>)>();
    let names = components.iter().map(Component::name).collect::<Vec<_>>();
    let mut omitted = Vec::new();
    let mut pending = vec![false; names.len()];

    for (idx, component) in components.into_iter().enumerate() {
        let tx = tx.clone();
        let bundle = Arc::clone(&bundle);
        let spawned = thread::Builder::new()
            .name(format!("component-{}", names[idx]))
            .spawn(move || {
                let result = component.run(&bundle);
                // The receiver may have given up at the deadline.
                let _ = tx.send((idx, result));
            });
        match spawned {
            Ok(_) => pending[idx] = true,
            Err(err) => omitted.push(OmittedComponent {
                name: names[idx],
                reason: format!("failed to start thread: {err}"),
            }),
        }
    }
    drop(tx);

    let until = Instant::now() + deadline;
    let mut slots: Vec<Option<ComponentOutput>> = vec![None; names.len()];
    let mut disconnected = false;

    while pending.iter().any(|p| *p) {
        let remaining = until.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((idx, result)) => {
                pending[idx] = false;
                match result {
                    Ok(output) => {
                        info!(
                            component = output.name,
                            elapsed_ms = output.elapsed.as_millis() as u64,
                            upcoming = output.upcoming.len(),
                            "component finished"
                        );
                        slots[idx] = Some(output);
                    }
                    Err(err) => omitted.push(OmittedComponent {
                        name: names[idx],
                        reason: format!("{err:#}"),
                    }),
                }
            }
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => {
                disconnected = true;
                break;
            }
        }
    }

    for (idx, still_pending) in pending.iter().enumerate() {
        if *still_pending {
            omitted.push(OmittedComponent {
                name: names[idx],
                reason: if disconnected {
                    "component thread exited without a result".to_string()
                } else {
                    format!("no result within {}s", deadline.as_secs_f64())
                },
            });
        }
    }
    for o in &omitted {
        warn!(component = o.name, reason = %o.reason, "component omitted from report");
    }

    EnsembleOutcome {
        outputs: slots.into_iter().flatten().collect(),
        omitted,
    }
}

pub fn collect_predictions(
    bundle: &DatasetBundle,
    outputs: &[ComponentOutput],
) -> (Vec<Prediction>, HashMap<MatchupKey, f64>) {
    let rows = bundle.upcoming();
    let mut predictions = Vec::with_capacity(rows.len() * outputs.len());
    let mut at_least_two = HashMap::new();

    for output in outputs {
        for (row, p) in rows.iter().zip(&output.upcoming) {
            predictions.push(Prediction::new(row, output.name, *p));
        }
        if let Some(two) = &output.at_least_two {
            for (row, p) in rows.iter().zip(two) {
                let key = (
                    row.record.player.clone(),
                    row.record.team.clone(),
                    row.record.opponent_team.clone(),
                );
                at_least_two
                    .entry(key)
                    .and_modify(|cur: &mut f64| *cur = cur.max(*p))
                    .or_insert(*p);
            }
        }
    }
    (predictions, at_least_two)
}
