use super::space::TrainingSpace;
use crate::error::{Error, Result};
use crate::model::{LinearModel, Solver, TrainableModel};

mod adagrad;
mod dual;

pub(crate) use self::adagrad::AdaGradStep;
pub use self::adagrad::{AdaGradLoss, AdaGradParams};
pub use self::dual::{DualLoss, DualParams, DualSolution};

/// Training algorithm marker for dual coordinate descent (one-vs-rest SVM and
/// logistic regression).
#[derive(Debug, Clone, Copy)]
pub struct DualCoordinateDescent;

/// Training algorithm marker for AdaGrad.
#[derive(Debug, Clone, Copy)]
pub struct AdaGrad;

/// Training algorithm interface.
pub trait TrainingAlgorithm {
    type Params: Default;

    /// The solver id of models trained with `params`
    fn solver(params: &Self::Params) -> Solver;

    /// Produce a weight array for `model` from an already checked space
    fn fit<M: LinearModel + ?Sized>(
        trainer: &Trainer<Self>,
        space: &TrainingSpace,
        model: &M,
    ) -> Result<Vec<f64>>
    where
        Self: Sized;
}

/// Linear model trainer
///
/// A trainer only holds parameters; the same trainer can fit any number of
/// spaces. Fitting never mutates the space.
#[derive(Debug, Clone)]
pub struct Trainer<A: TrainingAlgorithm> {
    /// Training parameters
    params: A::Params,
}

impl<A: TrainingAlgorithm> Trainer<A> {
    /// Create a new trainer with default parameters
    pub fn new() -> Self {
        Self {
            params: A::Params::default(),
        }
    }

    /// Get training parameters
    pub fn params(&self) -> &A::Params {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut A::Params {
        &mut self.params
    }

    /// The solver id models trained by this trainer are saved with
    pub fn solver(&self) -> Solver {
        A::solver(&self.params)
    }

    /// Compute a weight array for `model` from `space`
    ///
    /// The array is row-major with one row per feature of `model`. Whether
    /// it holds one column per label or a single signed column for a
    /// two-label model depends on the algorithm.
    pub fn fit<M: LinearModel + ?Sized>(
        &self,
        space: &TrainingSpace,
        model: &M,
    ) -> Result<Vec<f64>> {
        self.check_space(space, model)?;
        A::fit(self, space, model)
    }

    /// Fit `model` on `space` and install the resulting weights
    pub fn train<M: TrainableModel + ?Sized>(
        &self,
        space: &TrainingSpace,
        model: &mut M,
    ) -> Result<()> {
        let weights = self.fit(space, &*model)?;
        model.set_weights(self.solver(), weights)
    }

    fn check_space<M: LinearModel + ?Sized>(
        &self,
        space: &TrainingSpace,
        model: &M,
    ) -> Result<()> {
        if space.is_empty() {
            return Err(Error::input("no training data"));
        }
        if model.num_labels() == 0 {
            return Err(Error::input("model has no labels"));
        }
        space.check_dimensions(model.num_labels(), model.num_features())
    }
}

impl Trainer<DualCoordinateDescent> {
    /// Create a new dual coordinate descent trainer
    pub fn dual() -> Self {
        Self::new()
    }

    /// Set the loss (builder pattern)
    pub fn with_loss(mut self, loss: DualLoss) -> Self {
        self.params.set_loss(loss);
        self
    }

    /// Set the cost C (builder pattern)
    pub fn with_cost(mut self, cost: f64) -> Result<Self> {
        self.params.set_cost(cost)?;
        Ok(self)
    }

    /// Set the stopping tolerance (builder pattern)
    pub fn with_eps(mut self, eps: f64) -> Result<Self> {
        self.params.set_eps(eps)?;
        Ok(self)
    }

    /// Set the bias feature value (builder pattern)
    pub fn with_bias(mut self, bias: f64) -> Result<Self> {
        self.params.set_bias(bias)?;
        Ok(self)
    }

    /// Set the cost ratio of negative instances (builder pattern)
    pub fn with_negative_cost_ratio(mut self, ratio: f64) -> Result<Self> {
        self.params.set_negative_cost_ratio(ratio)?;
        Ok(self)
    }

    /// Set the shuffle seed (builder pattern)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.set_shuffle_seed(Some(seed));
        self
    }
}

impl Trainer<AdaGrad> {
    /// Create a new AdaGrad trainer
    pub fn adagrad() -> Self {
        Self::new()
    }

    /// Set the loss (builder pattern)
    pub fn with_loss(mut self, loss: AdaGradLoss) -> Self {
        self.params.set_loss(loss);
        self
    }

    /// Set the learning rate (builder pattern)
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self> {
        self.params.set_alpha(alpha)?;
        Ok(self)
    }

    /// Set the smoothing denominator (builder pattern)
    pub fn with_rho(mut self, rho: f64) -> Result<Self> {
        self.params.set_rho(rho)?;
        Ok(self)
    }

    /// Set the number of epochs (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.params.set_iterations(iterations)?;
        Ok(self)
    }

    /// Set the shuffle seed (builder pattern)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.set_shuffle_seed(Some(seed));
        self
    }
}

impl<A: TrainingAlgorithm> Default for Trainer<A> {
    fn default() -> Self {
        Self::new()
    }
}
