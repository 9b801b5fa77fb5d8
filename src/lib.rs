//! Sparse linear classifiers for NLP pipelines
//!
//! This library provides multi-class linear models over sparse features,
//! trained in batch with dual coordinate descent (L1/L2-loss SVM, logistic
//! regression) or online with AdaGrad.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use lincls::train::{SpaceBuilder, Trainer, DualLoss};
//! use lincls::FeatureVector;
//!
//! let mut builder = SpaceBuilder::new();
//! builder.add("NOUN", FeatureVector::parse("w:dog s:og", false)?);
//! builder.add("VERB", FeatureVector::parse("w:runs s:ns", false)?);
//! let (mut model, space) = builder.build()?;
//!
//! let trainer = Trainer::dual().with_loss(DualLoss::L2Hinge).with_cost(0.1)?;
//! trainer.train(&space, &mut model)?;
//! model.save_to_path("pos.model")?;
//! # Ok::<(), lincls::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use lincls::{FeatureModel, FeatureVector, StringModel};
//!
//! let model = StringModel::load_from_path("pos.model")?;
//! let x = FeatureVector::parse("w:dog s:og", false)?;
//! if let Some(best) = model.predict_best_features(&x) {
//!     println!("{} {}", best.label, best.score);
//! }
//! # Ok::<(), lincls::Error>(())
//! ```

mod error;
mod feature;
mod model;
mod sparse;
mod vocab;
mod weights;

/// Training spaces, trainers and configuration
pub mod train;

pub use self::error::{Error, Result};
pub use self::feature::{Feature, FeatureVector, FIELD_DELIM};
pub use self::model::{
    Calibration, FeatureModel, LinearModel, OnlineModel, Prediction, Solver, SparseModel,
    StringModel, TrainableModel,
};
pub use self::sparse::SparseVector;
pub use self::vocab::{Dictionary, FeatureMap};
pub use self::weights::{fold_binary, WeightMatrix};
