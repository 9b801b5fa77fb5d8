use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::sparse::SparseVector;
use crate::vocab::Dictionary;

use super::codec::{self, ModelReader};
use super::linear::LinearCore;
use super::{LinearModel, Solver, TrainableModel};

/// A batch model whose features are integer ids assigned by the caller
///
/// There is no feature vocabulary; the persisted form carries the feature
/// count instead of a per-type dump.
#[derive(Debug, Clone)]
pub struct SparseModel {
    core: LinearCore,
    num_features: usize,
}

impl Default for SparseModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseModel {
    /// Create an empty model holding only the bias row
    pub fn new() -> Self {
        Self {
            core: LinearCore::new(),
            num_features: 1,
        }
    }

    /// Get or create the id of a label
    pub fn add_label(&mut self, label: &str) -> u32 {
        self.core.add_label(label)
    }

    /// Grow the feature count to cover every id in `ids`, padding allocated
    /// weights with zero rows
    pub fn add_features(&mut self, ids: &[u32]) {
        if let Some(&max) = ids.iter().max() {
            self.num_features = self.num_features.max(max as usize + 1);
        }
        self.core.grow_rows(self.num_features);
    }

    /// Allocate zero weights sized to the current label and feature counts
    pub fn init_weights(&mut self) {
        self.core.init_weights(self.num_features);
    }

    /// Overwrite the weights of one label, one value per feature row
    pub fn set_label_weights(&mut self, label: u32, values: &[f64]) -> Result<()> {
        self.core.set_label_weights(label, values)
    }

    /// Weight of one `(feature, label)` pair
    pub fn weight(&self, feature: u32, label: u32) -> f64 {
        self.core.weight(feature, label)
    }

    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        codec::write_header(&mut writer, self.core.solver, &self.core.labels)?;
        writeln!(writer, "{}", self.num_features)?;
        self.core.write_weights(&mut writer, self.num_features)?;
        writer.flush()?;
        info!(
            labels = self.num_labels(),
            features = self.num_features,
            "saved sparse model"
        );
        Ok(())
    }

    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = ModelReader::new(reader);
        let mut core = LinearCore::new();
        core.solver = reader.read_solver()?;
        core.labels = reader.read_labels()?;
        let num_features = reader.read_feature_count()?;
        core.read_weights(&mut reader, num_features)?;
        info!(
            solver = %core.solver,
            labels = core.labels.len(),
            features = num_features,
            "loaded sparse model"
        );
        Ok(Self { core, num_features })
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(BufWriter::new(File::create(path)?))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(BufReader::new(File::open(path)?))
    }
}

impl LinearModel for SparseModel {
    fn solver(&self) -> Solver {
        self.core.solver
    }

    fn labels(&self) -> &Dictionary {
        &self.core.labels
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn scores(&self, x: &SparseVector) -> Vec<f64> {
        self.core.scores(x)
    }
}

impl TrainableModel for SparseModel {
    fn set_weights(&mut self, solver: Solver, values: Vec<f64>) -> Result<()> {
        self.core.set_weights(solver, self.num_features, values)
    }
}
