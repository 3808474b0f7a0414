use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinaryMetrics {
    pub samples: usize,
    pub positives: usize,
    pub accuracy: f64,
    pub roc_auc: Option<f64>,
    pub log_loss: f64,
    pub brier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationReport {
    Scored {
        metrics: BinaryMetrics,
        calibration: Vec<CalibrationBin>,
    },
    Empty,
}

impl ValidationReport {
    pub fn metrics(&self) -> Option<&BinaryMetrics> {
        match self {
            Self::Scored { metrics, .. } => Some(metrics),
            Self::Empty => None,
        }
    }
}

const CALIBRATION_BINS: usize = 10;

pub fn validation_report(probs: &[f64], labels: &[bool]) -> ValidationReport {
    match evaluate_binary(probs, labels) {
        Some(metrics) => ValidationReport::Scored {
            metrics,
            calibration: calibration_bins(probs, labels, CALIBRATION_BINS),
        },
        None => ValidationReport::Empty,
    }
}

pub fn evaluate_binary(probs: &[f64], labels: &[bool]) -> Option<BinaryMetrics> {
    if probs.is_empty() || probs.len() != labels.len() {
        return None;
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;
    for (p, y) in probs.iter().zip(labels) {
        let p = p.clamp(0.0, 1.0);
        let target = if *y { 1.0 } else { 0.0 };
        brier_sum += (p - target).powi(2);

        let actual_prob = if *y { p } else { 1.0 - p }.clamp(1e-15, 1.0);
        log_loss_sum += -actual_prob.ln();

        if (p >= 0.5) == *y {
            correct += 1;
        }
    }

    let n = probs.len() as f64;
    Some(BinaryMetrics {
        samples: probs.len(),
        positives: labels.iter().filter(|y| **y).count(),
        accuracy: correct as f64 / n,
        roc_auc: roc_auc(probs, labels),
        log_loss: log_loss_sum / n,
        brier: brier_sum / n,
    })
}

pub fn roc_auc(probs: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|y| **y).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 || probs.len() != labels.len() {
        return None;
    }

    let mut order = (0..probs.len()).collect::<Vec<_>>();
    order.sort_by(|a, b| probs[*a].total_cmp(&probs[*b]));

    let mut rank_sum_pos = 0.0_f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the average.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in &order[i..=j] {
            if labels[*k] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let u = rank_sum_pos - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

pub fn calibration_bins(probs: &[f64], labels: &[bool], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, y) in probs.iter().zip(labels) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if *y {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_handles_perfect_and_tied_rankings() {
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[false, false, true, true]), Some(1.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[false, true]), Some(0.5));
        assert_eq!(roc_auc(&[0.3, 0.7], &[true, true]), None);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let m = evaluate_binary(&[0.8, 0.4], &[true, false]).unwrap();
        assert_eq!(m.samples, 2);
        assert_eq!(m.accuracy, 1.0);
        assert!((m.brier - (0.04 + 0.16) / 2.0).abs() < 1e-12);
        assert!((m.log_loss - (-(0.8_f64.ln()) - 0.6_f64.ln()) / 2.0).abs() < 1e-12);
        assert!(evaluate_binary(&[], &[]).is_none());
    }

    #[test]
    fn calibration_buckets_cover_unit_interval() {
        let bins = calibration_bins(&[0.05, 0.95, 1.0], &[false, true, true], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
    }
}
