use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use super::super::space::TrainingSpace;
use super::{AdaGrad, Trainer, TrainingAlgorithm};
use crate::error::{Error, Result};
use crate::model::{softmax, LinearModel, OnlineModel, Solver};
use crate::sparse::SparseVector;
use crate::weights::WeightMatrix;

/// Loss functions of the AdaGrad trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaGradLoss {
    /// Multi-class hinge loss against the best and second best labels
    MarginHinge,
    /// Hinge loss with the gold score shifted down by one
    Hinge,
    /// Multinomial logistic regression
    Logistic,
}

impl AdaGradLoss {
    /// The solver id models trained with this loss are saved with
    pub fn solver(self) -> Solver {
        match self {
            AdaGradLoss::MarginHinge => Solver::AdaGradMargin,
            AdaGradLoss::Hinge => Solver::AdaGradHinge,
            AdaGradLoss::Logistic => Solver::AdaGradLogistic,
        }
    }

    pub fn from_solver(solver: Solver) -> Option<Self> {
        match solver {
            Solver::AdaGradMargin => Some(AdaGradLoss::MarginHinge),
            Solver::AdaGradHinge => Some(AdaGradLoss::Hinge),
            Solver::AdaGradLogistic => Some(AdaGradLoss::Logistic),
            _ => None,
        }
    }
}

/// AdaGrad training parameters.
#[derive(Debug, Clone)]
pub struct AdaGradParams {
    loss: AdaGradLoss,
    alpha: f64,
    rho: f64,
    iterations: usize,
    shuffle_seed: Option<u64>,
}

impl Default for AdaGradParams {
    fn default() -> Self {
        Self {
            loss: AdaGradLoss::MarginHinge,
            alpha: 0.01,
            rho: 0.1,
            iterations: 10,
            shuffle_seed: None,
        }
    }
}

impl AdaGradParams {
    pub fn loss(&self) -> AdaGradLoss {
        self.loss
    }

    pub fn set_loss(&mut self, loss: AdaGradLoss) {
        self.loss = loss;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        if alpha <= 0.0 {
            return Err(Error::parameter("alpha must be positive"));
        }
        self.alpha = alpha;
        Ok(())
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn set_rho(&mut self, rho: f64) -> Result<()> {
        if rho < 0.0 {
            return Err(Error::parameter("rho must be non-negative"));
        }
        self.rho = rho;
        Ok(())
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations < 1 {
            return Err(Error::parameter("iterations must be at least 1"));
        }
        self.iterations = iterations;
        Ok(())
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

/// One AdaGrad learner over a weight matrix and its squared-gradient sums
///
/// For every touched coordinate the squared sub-gradient is added to the
/// accumulator first, and the step size `alpha / (rho + sqrt(g))` is computed
/// from the updated sum. Only rows of active features are updated; the bias
/// row contributes to scores but is never trained here.
pub(crate) struct AdaGradStep<'a> {
    weights: &'a mut WeightMatrix,
    accum: &'a mut WeightMatrix,
    alpha: f64,
    rho: f64,
}

impl<'a> AdaGradStep<'a> {
    pub fn new(
        weights: &'a mut WeightMatrix,
        accum: &'a mut WeightMatrix,
        alpha: f64,
        rho: f64,
    ) -> Self {
        debug_assert_eq!(weights.rows(), accum.rows());
        debug_assert_eq!(weights.labels(), accum.labels());
        Self {
            weights,
            accum,
            alpha,
            rho,
        }
    }

    fn step(&mut self, x: &SparseVector, label: usize, coef: f64) {
        let rows = self.weights.rows();
        for (id, v) in x.iter() {
            let f = id as usize;
            if f == 0 || f >= rows {
                continue;
            }
            let g = coef * v;
            self.accum.add(f, label, g * g);
            let rate = self.alpha / (self.rho + self.accum.get(f, label).sqrt());
            self.weights.add(f, label, rate * g);
        }
    }

    /// Forget all squared-gradient sums
    pub fn reset(&mut self) {
        self.accum.clear();
    }

    fn step_pair(&mut self, x: &SparseVector, gold: usize, other: usize) {
        self.step(x, gold, 1.0);
        self.step(x, other, -1.0);
    }

    /// Learn from one instance
    ///
    /// Returns `true` when the instance was already classified correctly
    /// before the update.
    pub fn update(&mut self, loss: AdaGradLoss, gold: usize, x: &SparseVector) -> bool {
        let mut scores = self.weights.scores(x);
        let (top1, top2) = top_two(&scores);
        let correct = top1 == gold;

        match loss {
            AdaGradLoss::MarginHinge => {
                if let Some(top2) = top2 {
                    if !correct {
                        self.step_pair(x, gold, top1);
                    } else if scores[top1] - scores[top2] < 1.0 {
                        self.step_pair(x, gold, top2);
                    }
                }
            }
            AdaGradLoss::Hinge => {
                scores[gold] -= 1.0;
                let best = argmax(&scores);
                if best != gold {
                    self.step_pair(x, gold, best);
                }
            }
            AdaGradLoss::Logistic => {
                softmax(&mut scores);
                for (label, p) in scores.into_iter().enumerate() {
                    let coef = if label == gold { 1.0 - p } else { -p };
                    if coef != 0.0 {
                        self.step(x, label, coef);
                    }
                }
            }
        }
        correct
    }
}

/// Best and second best label
///
/// Labels 0 and 1 are ordered first, with label 1 ahead on a tie; any later
/// label must score strictly higher to move up.
fn top_two(scores: &[f64]) -> (usize, Option<usize>) {
    if scores.len() < 2 {
        return (0, None);
    }
    let (mut fst, mut snd) = if scores[0] > scores[1] { (0, 1) } else { (1, 0) };
    for label in 2..scores.len() {
        if scores[fst] < scores[label] {
            snd = fst;
            fst = label;
        } else if scores[snd] < scores[label] {
            snd = label;
        }
    }
    (fst, Some(snd))
}

/// Best label; the lowest id wins ties
fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for label in 1..scores.len() {
        if scores[best] < scores[label] {
            best = label;
        }
    }
    best
}

impl TrainingAlgorithm for AdaGrad {
    type Params = AdaGradParams;

    fn solver(params: &Self::Params) -> Solver {
        params.loss.solver()
    }

    fn fit<M: LinearModel + ?Sized>(
        trainer: &Trainer<Self>,
        space: &TrainingSpace,
        model: &M,
    ) -> Result<Vec<f64>> {
        let mut weights = WeightMatrix::new(model.num_features(), model.num_labels());
        let mut accum = WeightMatrix::new(model.num_features(), model.num_labels());
        trainer.run_epochs(space, &mut weights, &mut accum, true);
        Ok(weights.into_values())
    }
}

impl Trainer<AdaGrad> {
    /// Continue training an online model in place
    ///
    /// The space must have been built against `model`'s vocabularies, e.g.
    /// with [`OnlineModel::build_space`]. Accumulated squared gradients carry
    /// over from earlier calls and across epochs.
    ///
    /// The trainer's `alpha` and `rho` are used for these epochs and replace
    /// the model's own rates, so later [`OnlineModel::update`] calls continue
    /// with them.
    pub fn update(&self, space: &TrainingSpace, model: &mut OnlineModel) -> Result<()> {
        self.check_space(space, &*model)?;
        model.set_rates(self.params.alpha, self.params.rho);
        let (weights, accum) = model.arrays_mut();
        self.run_epochs(space, weights, accum, false);
        model.set_solver(self.params.loss.solver());
        Ok(())
    }

    /// Run all epochs; with `reset`, the squared-gradient sums start from
    /// zero in every epoch
    fn run_epochs(
        &self,
        space: &TrainingSpace,
        weights: &mut WeightMatrix,
        accum: &mut WeightMatrix,
        reset: bool,
    ) {
        let params = &self.params;
        let mut rng = match params.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut learner = AdaGradStep::new(weights, accum, params.alpha, params.rho);
        let mut indices: Vec<usize> = (0..space.len()).collect();
        let mut accuracy = 0.0;

        for epoch in 0..params.iterations {
            if reset {
                learner.reset();
            }
            indices.shuffle(&mut rng);
            let mut correct = 0;
            for &i in &indices {
                if learner.update(params.loss, space.label(i) as usize, space.vector(i)) {
                    correct += 1;
                }
            }
            accuracy = 100.0 * correct as f64 / space.len().max(1) as f64;
            debug!(epoch = epoch + 1, accuracy, "adagrad epoch");
        }
        info!(
            loss = ?params.loss,
            epochs = params.iterations,
            instances = space.len(),
            accuracy,
            "adagrad training finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_two() {
        assert_eq!(top_two(&[1.0]), (0, None));
        assert_eq!(top_two(&[1.0, 1.0]), (1, Some(0)));
        assert_eq!(top_two(&[0.0, 0.0, 0.0]), (1, Some(0)));
        assert_eq!(top_two(&[2.0, 1.0, 1.0]), (0, Some(1)));
        assert_eq!(top_two(&[1.0, 1.0, 2.0]), (2, Some(1)));
        assert_eq!(top_two(&[0.0, 2.0, 1.0]), (1, Some(2)));
        assert_eq!(top_two(&[3.0, 2.0, 5.0]), (2, Some(0)));
    }

    #[test]
    fn test_argmax_prefers_lowest_id() {
        assert_eq!(argmax(&[1.0, 1.0]), 0);
        assert_eq!(argmax(&[0.0, 2.0, 2.0]), 1);
    }

    #[test]
    fn test_accumulator_updated_before_step() {
        let mut weights = WeightMatrix::new(2, 2);
        let mut accum = WeightMatrix::new(2, 2);
        let mut learner = AdaGradStep::new(&mut weights, &mut accum, 0.5, 0.0);
        let x = SparseVector::from_parts(vec![1], Some(vec![2.0]));

        // tie on zero scores: label 1 is predicted, so gold 0 is a mistake
        assert!(!learner.update(AdaGradLoss::MarginHinge, 0, &x));
        // g = 4 for both touched coordinates, rate = 0.5 / sqrt(4)
        assert_eq!(accum.get(1, 1), 4.0);
        assert_eq!(accum.get(1, 0), 4.0);
        assert!((weights.get(1, 0) - 0.5).abs() < 1e-12);
        assert!((weights.get(1, 1) + 0.5).abs() < 1e-12);
        assert_eq!(weights.get(0, 0), 0.0);
    }

    #[test]
    fn test_margin_update_when_correct_but_close() {
        let mut weights = WeightMatrix::new(2, 3);
        weights.set(1, 0, 0.5);
        let mut accum = WeightMatrix::new(2, 3);
        let mut learner = AdaGradStep::new(&mut weights, &mut accum, 1.0, 0.0);
        let x = SparseVector::from_parts(vec![1], None);

        assert!(learner.update(AdaGradLoss::MarginHinge, 0, &x));
        // margin 0.5 < 1 against the second best label 1
        assert_eq!(accum.get(1, 0), 1.0);
        assert_eq!(accum.get(1, 1), 1.0);
        assert_eq!(accum.get(1, 2), 0.0);
    }

    #[test]
    fn test_logistic_touches_all_labels() {
        let mut weights = WeightMatrix::new(2, 3);
        let mut accum = WeightMatrix::new(2, 3);
        let mut learner = AdaGradStep::new(&mut weights, &mut accum, 1.0, 0.0);
        let x = SparseVector::from_parts(vec![1], None);
        learner.update(AdaGradLoss::Logistic, 2, &x);

        for label in 0..3 {
            assert!(accum.get(1, label) > 0.0);
        }
        assert!(weights.get(1, 2) > 0.0);
        assert!(weights.get(1, 0) < 0.0);
        assert_eq!(weights.get(1, 0), weights.get(1, 1));
    }

    #[test]
    fn test_margin_tie_breaks_toward_label_one() {
        let mut weights = WeightMatrix::new(2, 3);
        let mut accum = WeightMatrix::new(2, 3);
        let mut learner = AdaGradStep::new(&mut weights, &mut accum, 1.0, 0.0);
        let x = SparseVector::from_parts(vec![1], None);

        // all scores tie at zero, so label 1 is predicted and gold 1 is
        // correct but within the margin of label 0
        assert!(learner.update(AdaGradLoss::MarginHinge, 1, &x));
        assert_eq!(weights.get(1, 1), 1.0);
        assert_eq!(weights.get(1, 0), -1.0);
        assert_eq!(weights.get(1, 2), 0.0);
    }

    #[test]
    fn test_hinge_tie_picks_lowest_other_label() {
        let mut weights = WeightMatrix::new(2, 3);
        let mut accum = WeightMatrix::new(2, 3);
        let mut learner = AdaGradStep::new(&mut weights, &mut accum, 1.0, 0.0);
        let x = SparseVector::from_parts(vec![1], None);

        learner.update(AdaGradLoss::Hinge, 2, &x);
        assert_eq!(weights.get(1, 2), 1.0);
        assert_eq!(weights.get(1, 0), -1.0);
        assert_eq!(weights.get(1, 1), 0.0);
    }

    #[test]
    fn test_fit_resets_accumulator_every_epoch() {
        let mut space = TrainingSpace::new();
        space.push(0, SparseVector::from_parts(vec![1], None));
        let mut model = crate::model::SparseModel::new();
        for label in ["A", "B", "C"] {
            model.add_label(label);
        }
        model.add_features(&[1]);

        let trainer = Trainer::adagrad()
            .with_loss(AdaGradLoss::Hinge)
            .with_alpha(0.1)
            .unwrap()
            .with_rho(0.1)
            .unwrap()
            .with_iterations(2)
            .unwrap()
            .with_seed(1);
        let values = trainer.fit(&space, &model).unwrap();
        // epoch 1 pushes label 0 against label 1, epoch 2 against label 2,
        // both with the step 0.1 / (0.1 + sqrt(1))
        let step = 0.1 / 1.1;
        assert!((values[3] - 2.0 * step).abs() < 1e-12);
        assert!((values[4] + step).abs() < 1e-12);
        assert!((values[5] + step).abs() < 1e-12);
        assert!(values[..3].iter().all(|&w| w == 0.0));
    }
}
