use std::path::Path;

use serde::Deserialize;

use super::space::{SpaceBuilder, TrainingSpace};
use super::trainer::{AdaGrad, AdaGradLoss, DualCoordinateDescent, DualLoss, Trainer};
use crate::error::{Error, Result};
use crate::model::{OnlineModel, Solver, StringModel, TrainableModel};

/// Training configuration as handed over by an outer pipeline
///
/// Every field has a default, so a partial document deserializes. Only the
/// parameters of the selected solver family are used.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Solver name, e.g. `l2-svm` or `adagrad-lr`
    pub solver: String,
    /// Dual coordinate descent cost C
    pub cost: f64,
    /// Dual coordinate descent stopping tolerance
    pub eps: f64,
    /// Value of the implicit bias feature, `0` disables it
    pub bias: f64,
    /// Cost ratio of negative instances for the SVM solvers
    pub negative_cost_ratio: f64,
    /// AdaGrad learning rate
    pub alpha: f64,
    /// AdaGrad smoothing denominator
    pub rho: f64,
    /// AdaGrad epochs
    pub iterations: usize,
    /// Shuffle seed
    pub seed: Option<u64>,
    /// Worker threads for corpus scanning
    pub threads: usize,
    pub label_cutoff: usize,
    pub feature_cutoff: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            solver: Solver::default().name().to_string(),
            cost: 0.1,
            eps: 0.1,
            bias: 0.0,
            negative_cost_ratio: 1.0,
            alpha: 0.01,
            rho: 0.1,
            iterations: 10,
            seed: None,
            threads: 1,
            label_cutoff: 0,
            feature_cutoff: 0,
        }
    }
}

impl TrainConfig {
    /// Parse the solver name
    pub fn solver(&self) -> Result<Solver> {
        self.solver.parse()
    }

    /// A dual coordinate descent trainer for `loss` with validated parameters
    pub fn dual_trainer(&self, loss: DualLoss) -> Result<Trainer<DualCoordinateDescent>> {
        let mut trainer = Trainer::dual()
            .with_loss(loss)
            .with_cost(self.cost)?
            .with_eps(self.eps)?
            .with_bias(self.bias)?
            .with_negative_cost_ratio(self.negative_cost_ratio)?;
        trainer.params_mut().set_shuffle_seed(self.seed);
        Ok(trainer)
    }

    /// An AdaGrad trainer for `loss` with validated parameters
    pub fn adagrad_trainer(&self, loss: AdaGradLoss) -> Result<Trainer<AdaGrad>> {
        let mut trainer = Trainer::adagrad()
            .with_loss(loss)
            .with_alpha(self.alpha)?
            .with_rho(self.rho)?
            .with_iterations(self.iterations)?;
        trainer.params_mut().set_shuffle_seed(self.seed);
        Ok(trainer)
    }

    /// A space builder using the configured cutoffs
    pub fn space_builder(&self) -> SpaceBuilder {
        SpaceBuilder::with_cutoffs(self.label_cutoff, self.feature_cutoff)
    }

    /// Scan instance files with the configured thread count and cutoffs
    pub fn build_space<P>(
        &self,
        paths: &[P],
        weighted: bool,
    ) -> Result<(StringModel, TrainingSpace)>
    where
        P: AsRef<Path> + Sync,
    {
        self.check_threads()?;
        let mut builder = self.space_builder();
        builder.scan_files(paths, self.threads, weighted)?;
        builder.build()
    }

    /// Train `model` on `space` with the configured solver
    ///
    /// The solver name and its parameters are validated before any
    /// training work starts.
    pub fn fit<M: TrainableModel + ?Sized>(
        &self,
        space: &TrainingSpace,
        model: &mut M,
    ) -> Result<()> {
        self.check_threads()?;
        let solver = self.solver()?;
        if let Some(loss) = DualLoss::from_solver(solver) {
            self.dual_trainer(loss)?.train(space, model)
        } else if let Some(loss) = AdaGradLoss::from_solver(solver) {
            self.adagrad_trainer(loss)?.train(space, model)
        } else {
            Err(Error::Configuration(format!("unsupported solver: {}", solver)))
        }
    }

    /// Continue training an online model with the configured AdaGrad solver
    ///
    /// The configured `alpha` and `rho` become the model's rates.
    pub fn update(&self, space: &TrainingSpace, model: &mut OnlineModel) -> Result<()> {
        let solver = self.solver()?;
        let loss = AdaGradLoss::from_solver(solver).ok_or_else(|| {
            Error::Configuration(format!("online models cannot be trained with {}", solver))
        })?;
        self.adagrad_trainer(loss)?.update(space, model)
    }

    fn check_threads(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::Configuration(
                "thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
