//! Pluggable per-market classifiers.
//!
//! The engine only needs `predict_proba`; the default implementation is a multinomial
//! logistic regression over standardised features, fitted with full-batch gradient descent.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub trait Classifier: Send + Sync {
    fn n_classes(&self) -> usize;

    /// Probability per class, summing to 1.
    fn predict_proba(&self, features: &[f64]) -> Vec<f64>;

    fn predict(&self, features: &[f64]) -> usize {
        self.predict_proba(features)
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (class, &p)| if p > best.1 { (class, p) } else { best })
            .0
    }
}

pub trait ClassifierTrainer {
    type Model: Classifier + Serialize + for<'de> Deserialize<'de>;

    fn fit(&self, rows: &[Vec<f64>], labels: &[usize], n_classes: usize) -> EngineResult<Self::Model>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    /// One row per class: bias followed by one weight per feature.
    weights: Vec<Vec<f64>>,
}

impl SoftmaxModel {
    /// Checks internal dimensions after deserialisation.
    pub fn validate(&self, n_features: usize, n_classes: usize) -> EngineResult<()> {
        if self.means.len() != n_features || self.scales.len() != n_features {
            return Err(EngineError::SchemaMismatch {
                expected: n_features,
                found: self.means.len(),
            });
        }
        if self.weights.len() != n_classes || self.weights.iter().any(|w| w.len() != n_features + 1) {
            return Err(EngineError::InvalidModel(format!(
                "expected {} classes of {} weights",
                n_classes,
                n_features + 1
            )));
        }
        Ok(())
    }
}

impl Classifier for SoftmaxModel {
    fn n_classes(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .map(|w| {
                w[0] + features
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .zip(&w[1..])
                    .map(|((x, (mean, scale)), weight)| weight * (x - mean) / scale)
                    .sum::<f64>()
            })
            .collect();
        softmax(&logits)
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[derive(Debug, Clone)]
pub struct SoftmaxTrainer {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for SoftmaxTrainer {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 1e-3,
        }
    }
}

impl ClassifierTrainer for SoftmaxTrainer {
    type Model = SoftmaxModel;

    fn fit(&self, rows: &[Vec<f64>], labels: &[usize], n_classes: usize) -> EngineResult<SoftmaxModel> {
        if rows.is_empty() {
            return Err(EngineError::TrainingData("no rows to fit".to_string()));
        }
        if rows.len() != labels.len() {
            return Err(EngineError::TrainingData(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l >= n_classes) {
            return Err(EngineError::TrainingData(format!(
                "label {} outside {} classes",
                bad, n_classes
            )));
        }

        let n = rows.len();
        let d = rows[0].len();
        if rows.iter().any(|r| r.len() != d) {
            return Err(EngineError::SchemaMismatch {
                expected: d,
                found: rows.iter().map(Vec::len).find(|&len| len != d).unwrap_or(d),
            });
        }

        let (means, scales) = standardisation(rows, d);

        // Design matrix with a leading bias column.
        let x = DMatrix::from_fn(n, d + 1, |i, j| {
            if j == 0 {
                1.0
            } else {
                (rows[i][j - 1] - means[j - 1]) / scales[j - 1]
            }
        });
        let y = DMatrix::from_fn(n, n_classes, |i, c| if labels[i] == c { 1.0 } else { 0.0 });
        let xt = x.transpose();

        let mut w = DMatrix::<f64>::zeros(d + 1, n_classes);
        let inv_n = 1.0 / n as f64;

        for _ in 0..self.epochs {
            let mut probs = &x * &w;
            for mut row in probs.row_iter_mut() {
                let max = row.max();
                row.apply(|z| *z = (*z - max).exp());
                let sum = row.sum();
                row /= sum;
            }

            let mut grad = (&xt * (probs - &y)) * inv_n;
            let mut penalty = w.clone() * self.l2;
            penalty.row_mut(0).fill(0.0);
            grad += penalty;

            w -= grad * self.learning_rate;
        }

        let weights = (0..n_classes)
            .map(|c| w.column(c).iter().copied().collect())
            .collect();

        Ok(SoftmaxModel {
            means,
            scales,
            weights,
        })
    }
}

fn standardisation(rows: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let means: Vec<f64> = (0..d).map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n).collect();
    let scales = (0..d)
        .map(|j| {
            let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
            let sd = var.sqrt();
            if sd > 1e-12 {
                sd
            } else {
                1.0
            }
        })
        .collect();
    (means, scales)
}
