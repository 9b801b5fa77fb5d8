//! Linear classification models
//!
//! Three flavors share the [`LinearModel`] scoring contract:
//!
//! - [`StringModel`]: closed vocabulary of string features, trained in batch.
//! - [`SparseModel`]: features are already integer ids, no string resolution.
//! - [`OnlineModel`]: vocabularies and weights grow while training.
//!
//! Feature id 0 is the bias row of every model. It is never produced by a
//! vocabulary and always contributes to the scores.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::feature::FeatureVector;
use crate::sparse::SparseVector;
use crate::vocab::{Dictionary, FeatureMap};

mod codec;
mod linear;
mod online;
mod sparse_model;
mod string_model;

pub use self::online::OnlineModel;
pub use self::sparse_model::SparseModel;
pub use self::string_model::StringModel;

/// The algorithm a model was trained with, persisted as a single byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Solver {
    /// Dual coordinate descent, L2-regularized L1-loss SVM
    #[default]
    L1Svm = 0,
    /// Dual coordinate descent, L2-regularized L2-loss SVM
    L2Svm = 1,
    /// Dual coordinate descent, L2-regularized logistic regression
    DualLogistic = 2,
    /// AdaGrad with hinge loss
    AdaGradHinge = 3,
    /// AdaGrad with logistic regression
    AdaGradLogistic = 4,
    /// AdaGrad with the multi-class margin hinge loss
    AdaGradMargin = 5,
}

impl Solver {
    pub const ALL: [Solver; 6] = [
        Solver::L1Svm,
        Solver::L2Svm,
        Solver::DualLogistic,
        Solver::AdaGradHinge,
        Solver::AdaGradLogistic,
        Solver::AdaGradMargin,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Solver::L1Svm => "l1-svm",
            Solver::L2Svm => "l2-svm",
            Solver::DualLogistic => "dual-lr",
            Solver::AdaGradHinge => "adagrad-hinge",
            Solver::AdaGradLogistic => "adagrad-lr",
            Solver::AdaGradMargin => "adagrad-margin",
        }
    }

    /// Returns `true` for the AdaGrad family
    pub fn is_adagrad(self) -> bool {
        matches!(
            self,
            Solver::AdaGradHinge | Solver::AdaGradLogistic | Solver::AdaGradMargin
        )
    }

    /// How raw scores of a model trained by this solver turn into probabilities
    pub fn calibration(self) -> Calibration {
        match self {
            Solver::DualLogistic => Calibration::Sigmoid,
            Solver::AdaGradLogistic => Calibration::Softmax,
            _ => Calibration::None,
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Solver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|solver| solver.name() == s)
            .ok_or_else(|| Error::Configuration(format!("unsupported solver: {}", s)))
    }
}

/// Score normalization applied before predictions are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calibration {
    /// Raw scores
    None,
    /// Per-label sigmoid, normalized to sum to one
    Sigmoid,
    /// Softmax over all labels
    Softmax,
}

impl Calibration {
    pub fn apply(self, scores: &mut [f64]) {
        match self {
            Calibration::None => {}
            Calibration::Sigmoid => {
                if scores.len() == 2 {
                    let p = sigmoid(scores[0]);
                    scores[0] = p;
                    scores[1] = 1.0 - p;
                    return;
                }
                let mut sum = 0.0;
                for s in scores.iter_mut() {
                    *s = sigmoid(*s);
                    sum += *s;
                }
                if sum > 0.0 {
                    scores.iter_mut().for_each(|s| *s /= sum);
                }
            }
            Calibration::Softmax => softmax(scores),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// In-place softmax, shifted by the maximum score for numerical stability
pub(crate) fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    scores.iter_mut().for_each(|s| *s /= sum);
}

/// A label with its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction<'a> {
    /// Label id
    pub id: u32,
    /// Label string
    pub label: &'a str,
    /// Raw or calibrated score
    pub score: f64,
}

/// Scoring and prediction over sparse feature vectors
pub trait LinearModel {
    /// The solver the weights were produced by
    fn solver(&self) -> Solver;

    /// The label vocabulary
    fn labels(&self) -> &Dictionary;

    /// Number of weight rows, including the bias row
    fn num_features(&self) -> usize;

    /// Raw scores of all labels, indexed by label id
    ///
    /// Features outside `0 < id < num_features` contribute nothing.
    fn scores(&self, x: &SparseVector) -> Vec<f64>;

    fn num_labels(&self) -> usize {
        self.labels().len()
    }

    fn is_binary(&self) -> bool {
        self.num_labels() == 2
    }

    fn label_id(&self, label: &str) -> Option<u32> {
        self.labels().get(label)
    }

    fn is_range(&self, id: u32) -> bool {
        id > 0 && (id as usize) < self.num_features()
    }

    /// Predictions in label-id order, calibrated for logistic solvers
    fn predictions(&self, x: &SparseVector) -> Vec<Prediction<'_>> {
        let mut scores = self.scores(x);
        self.solver().calibration().apply(&mut scores);
        self.labels()
            .iter()
            .zip(scores)
            .map(|((label, id), score)| Prediction { id, label, score })
            .collect()
    }

    /// The highest scoring prediction; the lowest label id wins ties
    fn predict_best(&self, x: &SparseVector) -> Option<Prediction<'_>> {
        let mut best: Option<Prediction<'_>> = None;
        for p in self.predictions(x) {
            match best {
                Some(b) if b.score >= p.score => {}
                _ => best = Some(p),
            }
        }
        best
    }

    /// The best and second best predictions
    fn predict_two(&self, x: &SparseVector) -> Option<(Prediction<'_>, Prediction<'_>)> {
        let list = self.predictions(x);
        if list.len() < 2 {
            return None;
        }
        let (mut fst, mut snd) = if list[0].score < list[1].score {
            (list[1], list[0])
        } else {
            (list[0], list[1])
        };
        for &p in &list[2..] {
            if fst.score < p.score {
                snd = fst;
                fst = p;
            } else if snd.score < p.score {
                snd = p;
            }
        }
        Some((fst, snd))
    }

    /// All predictions sorted by descending score
    fn predict_all(&self, x: &SparseVector) -> Vec<Prediction<'_>> {
        let mut list = self.predictions(x);
        list.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        list
    }
}

/// A model that resolves string features through its own vocabulary
pub trait FeatureModel: LinearModel {
    /// The feature vocabulary
    fn features(&self) -> &FeatureMap;

    /// Resolve string features to ids
    ///
    /// Out-of-vocabulary features are dropped; a feature repeated in `x` is
    /// kept at its first occurrence only.
    fn to_sparse_vector(&self, x: &FeatureVector) -> SparseVector {
        let features = self.features();
        let mut sparse = SparseVector::with_capacity(x.len(), x.has_weight());
        let mut seen = HashSet::with_capacity(x.len());
        for feature in x {
            if let Some(id) = features.get(&feature.ftype, &feature.value) {
                if !seen.insert(id) {
                    continue;
                }
                if x.has_weight() {
                    sparse.push_weighted(id, feature.weight);
                } else {
                    sparse.push(id);
                }
            }
        }
        sparse
    }

    fn predict_best_features(&self, x: &FeatureVector) -> Option<Prediction<'_>> {
        self.predict_best(&self.to_sparse_vector(x))
    }

    fn predict_two_features(
        &self,
        x: &FeatureVector,
    ) -> Option<(Prediction<'_>, Prediction<'_>)> {
        self.predict_two(&self.to_sparse_vector(x))
    }

    fn predict_all_features(&self, x: &FeatureVector) -> Vec<Prediction<'_>> {
        self.predict_all(&self.to_sparse_vector(x))
    }
}

/// A batch model whose weights are produced by a trainer
pub trait TrainableModel: LinearModel {
    /// Install a trained weight array
    ///
    /// `values` is either `num_features * num_labels` long (row-major), or,
    /// for a two-label model, `num_features` long. A two-label array of
    /// `num_features * 2` values is folded into the binary form.
    fn set_weights(&mut self, solver: Solver, values: Vec<f64>) -> Result<()>;
}
