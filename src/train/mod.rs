//! Training spaces and trainers
//!
//! A [`TrainingSpace`] holds resolved instances; a [`Trainer`] turns it into
//! the weight array of a model. [`SpaceBuilder`] resolves string instances
//! and applies count cutoffs, and [`TrainConfig`] selects a trainer by
//! solver name.

mod config;
mod space;
mod trainer;

pub use self::config::TrainConfig;
pub use self::space::{SpaceBuilder, TrainingSpace};
pub(crate) use self::trainer::AdaGradStep;
pub use self::trainer::{
    AdaGrad, AdaGradLoss, AdaGradParams, DualCoordinateDescent, DualLoss, DualParams,
    DualSolution, Trainer, TrainingAlgorithm,
};
