use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::feature::FeatureVector;
use crate::sparse::SparseVector;
use crate::train::{AdaGradLoss, AdaGradStep, TrainingSpace};
use crate::vocab::{Dictionary, FeatureMap};
use crate::weights::WeightMatrix;

use super::codec::{self, ModelReader};
use super::{FeatureModel, LinearModel, Solver};

/// A string model whose vocabularies and weights grow while it learns
///
/// Every new label appends a zero column and every new feature a zero row,
/// both to the weights and to the AdaGrad squared-gradient sums, so ids
/// handed out earlier keep pointing at the same weights. The model never
/// switches to the binary layout.
#[derive(Debug, Clone)]
pub struct OnlineModel {
    solver: Solver,
    labels: Dictionary,
    features: FeatureMap,
    weights: WeightMatrix,
    accum: WeightMatrix,
    alpha: f64,
    rho: f64,
}

impl OnlineModel {
    /// Create an empty model learning with rate `alpha` and smoothing `rho`
    pub fn new(alpha: f64, rho: f64) -> Result<Self> {
        if alpha <= 0.0 {
            return Err(Error::parameter("alpha must be positive"));
        }
        if rho < 0.0 {
            return Err(Error::parameter("rho must be non-negative"));
        }
        Ok(Self {
            solver: Solver::AdaGradHinge,
            labels: Dictionary::new(),
            features: FeatureMap::new(),
            weights: WeightMatrix::new(1, 0),
            accum: WeightMatrix::new(1, 0),
            alpha,
            rho,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Replace the rates used by later updates
    pub(crate) fn set_rates(&mut self, alpha: f64, rho: f64) {
        self.alpha = alpha;
        self.rho = rho;
    }

    /// Get or create the id of a label, growing the weights for a new one
    pub fn add_label(&mut self, label: &str) -> u32 {
        if let Some(id) = self.labels.get(label) {
            return id;
        }
        self.weights.push_label();
        self.accum.push_label();
        self.labels.intern(label)
    }

    /// Get or create the id of a feature, growing the weights for a new one
    pub fn add_feature(&mut self, ftype: &str, value: &str) -> u32 {
        let (id, created) = self.features.intern(ftype, value);
        if created {
            self.weights.push_row();
            self.accum.push_row();
        }
        id
    }

    /// Add every feature of `x`
    pub fn add_features(&mut self, x: &FeatureVector) {
        for feature in x {
            self.add_feature(&feature.ftype, &feature.value);
        }
    }

    /// Weight of one `(feature, label)` pair, `0.0` when out of range
    pub fn weight(&self, feature: u32, label: u32) -> f64 {
        let (f, l) = (feature as usize, label as usize);
        if f < self.weights.rows() && l < self.weights.labels() {
            self.weights.get(f, l)
        } else {
            0.0
        }
    }

    /// Learn from a single instance with one hinge-loss AdaGrad step
    ///
    /// Unknown labels and features are added first. The step uses the
    /// model's current rates, which the last epoch-based update through a
    /// trainer may have replaced. Returns `true` if the instance was already
    /// classified correctly.
    pub fn update(&mut self, label: &str, x: &FeatureVector) -> bool {
        let gold = self.add_label(label) as usize;
        self.add_features(x);
        let sparse = self.to_sparse_vector(x);
        let mut learner =
            AdaGradStep::new(&mut self.weights, &mut self.accum, self.alpha, self.rho);
        learner.update(AdaGradLoss::Hinge, gold, &sparse)
    }

    /// Intern the labels and features of `instances` and resolve them to a
    /// training space for [`crate::train::Trainer::update`]
    pub fn build_space<'a, I>(&mut self, instances: I) -> TrainingSpace
    where
        I: IntoIterator<Item = (&'a str, &'a FeatureVector)>,
    {
        let mut space = TrainingSpace::new();
        for (label, x) in instances {
            let y = self.add_label(label);
            self.add_features(x);
            space.push(y, self.to_sparse_vector(x));
        }
        space
    }

    pub(crate) fn arrays_mut(&mut self) -> (&mut WeightMatrix, &mut WeightMatrix) {
        (&mut self.weights, &mut self.accum)
    }

    pub(crate) fn set_solver(&mut self, solver: Solver) {
        self.solver = solver;
    }

    /// Write the model with one line of weights per feature row
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        codec::write_header(&mut writer, self.solver, &self.labels)?;
        codec::write_features(&mut writer, &self.features)?;
        codec::write_weight_rows(&mut writer, &self.weights)?;
        writer.flush()?;
        info!(
            labels = self.labels.len(),
            features = self.features.num_features(),
            "saved online model"
        );
        Ok(())
    }

    /// Read a model written by [`OnlineModel::save`]
    ///
    /// Squared-gradient sums are not persisted and start from zero.
    pub fn load<R: BufRead>(reader: R, alpha: f64, rho: f64) -> Result<Self> {
        let mut model = Self::new(alpha, rho)?;
        let mut reader = ModelReader::new(reader);
        model.solver = reader.read_solver()?;
        model.labels = reader.read_labels()?;
        let num_features = reader.read_feature_count()?;
        model.features = reader.read_features(num_features)?;

        let num_labels = model.labels.len();
        let values = reader.read_weights(num_features * num_labels)?;
        model.weights = WeightMatrix::from_values(num_features, num_labels, values)
            .ok_or_else(|| Error::format(0, "weight array does not match its dimensions"))?;
        model.accum = WeightMatrix::new(num_features, num_labels);
        info!(
            solver = %model.solver,
            labels = num_labels,
            features = num_features,
            "loaded online model"
        );
        Ok(model)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(BufWriter::new(File::create(path)?))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P, alpha: f64, rho: f64) -> Result<Self> {
        Self::load(BufReader::new(File::open(path)?), alpha, rho)
    }
}

impl LinearModel for OnlineModel {
    fn solver(&self) -> Solver {
        self.solver
    }

    fn labels(&self) -> &Dictionary {
        &self.labels
    }

    fn num_features(&self) -> usize {
        self.features.num_features()
    }

    fn scores(&self, x: &SparseVector) -> Vec<f64> {
        self.weights.scores(x)
    }
}

impl FeatureModel for OnlineModel {
    fn features(&self) -> &FeatureMap {
        &self.features
    }
}
