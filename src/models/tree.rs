//! Histogram regression trees on gradient/hessian pairs.
//!
//! Boosting feeds logistic-loss gradients; the forest feeds `g = -y, h = 1`,
//! which turns the split gain into variance reduction and the leaf value into
//! the mean label.

use rand::Rng;
use rand::seq::index::sample;

use crate::dataset::FeatureMatrix;

pub const MAX_BINS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct BinEdges {
    cuts: Vec<Vec<f64>>,
}

impl BinEdges {
    pub fn fit(x: &FeatureMatrix) -> Self {
        let cuts = (0..x.n_cols())
            .map(|j| {
                let mut values = x.column(j).filter(|v| v.is_finite()).collect::<Vec<_>>();
                values.sort_by(f64::total_cmp);
                values.dedup();
                column_cuts(&values)
            })
            .collect();
        Self { cuts }
    }

    pub fn n_cols(&self) -> usize {
        self.cuts.len()
    }

    fn bin_of(&self, j: usize, v: f64) -> u8 {
        let cuts = &self.cuts[j];
        if !v.is_finite() {
            return cuts.len() as u8;
        }
        cuts.partition_point(|c| *c < v) as u8
    }

    pub fn bin(&self, x: &FeatureMatrix) -> BinnedMatrix {
        let mut bins = Vec::with_capacity(x.n_rows() * x.n_cols());
        for row in x.rows() {
            for (j, v) in row.iter().enumerate() {
                bins.push(self.bin_of(j, *v));
            }
        }
        BinnedMatrix {
            n_cols: x.n_cols(),
            bins,
            n_bins: self.cuts.iter().map(|c| c.len() + 1).collect(),
        }
    }

    fn threshold(&self, j: usize, bin: u8) -> f64 {
        self.cuts[j][bin as usize]
    }
}

// Midpoints between distinct values, thinned to at most MAX_BINS - 1 cuts.
fn column_cuts(sorted_unique: &[f64]) -> Vec<f64> {
    if sorted_unique.len() < 2 {
        return Vec::new();
    }
    let mids = sorted_unique
        .windows(2)
        .map(|w| 0.5 * (w[0] + w[1]))
        .collect::<Vec<_>>();
    if mids.len() < MAX_BINS {
        return mids;
    }
    let step = mids.len() as f64 / (MAX_BINS - 1) as f64;
    let mut out = (0..MAX_BINS - 1)
        .map(|k| mids[((k as f64 + 0.5) * step) as usize])
        .collect::<Vec<_>>();
    out.dedup();
    out
}

/// Row-major bin indices. A value `v` sits in bin `b` when `v <= cuts[b]` and
/// `v > cuts[b - 1]`.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    n_cols: usize,
    bins: Vec<u8>,
    n_bins: Vec<usize>,
}

impl BinnedMatrix {
    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 { 0 } else { self.bins.len() / self.n_cols }
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> u8 {
        self.bins[row * self.n_cols + col]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub alpha: f64,
    pub min_split_gain: f64,
    pub features_per_node: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        bin: u8,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    g: f64,
    h: f64,
    n: usize,
}

fn soft_threshold(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

fn leaf_score(g: f64, h: f64, p: &TreeParams) -> f64 {
    let t = soft_threshold(g, p.alpha);
    t * t / (h + p.lambda).max(1e-12)
}

fn leaf_value(g: f64, h: f64, p: &TreeParams) -> f64 {
    -soft_threshold(g, p.alpha) / (h + p.lambda).max(1e-12)
}

struct Builder<'a, R: Rng> {
    x: &'a BinnedMatrix,
    edges: &'a BinEdges,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

impl<R: Rng> Builder<'_, R> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let (g, h) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &r| (g + self.grad[r], h + self.hess[r]));
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: leaf_value(g, h, &self.params),
        });

        if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_samples_leaf.max(1) {
            return idx;
        }
        let Some((feature, bin, _gain)) = self.best_split(&rows, g, h) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| self.x.get(r, feature) <= bin);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature,
            bin,
            threshold: self.edges.threshold(feature, bin),
            left,
            right,
        };
        idx
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        match self.params.features_per_node {
            Some(k) if k < self.features.len() => sample(&mut *self.rng, self.features.len(), k.max(1))
                .into_iter()
                .map(|i| self.features[i])
                .collect(),
            _ => self.features.to_vec(),
        }
    }

    fn best_split(&mut self, rows: &[usize], g: f64, h: f64) -> Option<(usize, u8, f64)> {
        let p = self.params;
        let parent = leaf_score(g, h, &p);
        let mut best: Option<(usize, u8, f64)> = None;

        for feature in self.candidate_features() {
            let n_bins = self.x.n_bins[feature];
            if n_bins < 2 {
                continue;
            }
            let mut hist = vec![Bucket::default(); n_bins];
            for &r in rows {
                let b = &mut hist[self.x.get(r, feature) as usize];
                b.g += self.grad[r];
                b.h += self.hess[r];
                b.n += 1;
            }

            let mut left = Bucket::default();
            for (bin, bucket) in hist.iter().enumerate().take(n_bins - 1) {
                left.g += bucket.g;
                left.h += bucket.h;
                left.n += bucket.n;
                let right_n = rows.len() - left.n;
                let right_h = h - left.h;
                if left.n < p.min_samples_leaf || right_n < p.min_samples_leaf {
                    continue;
                }
                if left.h < p.min_child_weight || right_h < p.min_child_weight {
                    continue;
                }
                let gain = leaf_score(left.g, left.h, &p) + leaf_score(g - left.g, right_h, &p) - parent;
                if gain > p.min_split_gain && best.is_none_or(|(_, _, b)| gain > b) {
                    best = Some((feature, bin as u8, gain));
                }
            }
        }
        best
    }
}

impl Tree {
    #[allow(clippy::too_many_arguments)]
    pub fn fit<R: Rng>(
        x: &BinnedMatrix,
        edges: &BinEdges,
        grad: &[f64],
        hess: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut builder = Builder {
            x,
            edges,
            grad,
            hess,
            features,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.grow(rows, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict_binned(&self, x: &BinnedMatrix, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    bin,
                    left,
                    right,
                    ..
                } => {
                    idx = if x.get(row, *feature) <= *bin { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}
