use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::sparse::SparseVector;
use crate::vocab::{Dictionary, FeatureMap};

use super::codec::{self, ModelReader};
use super::linear::LinearCore;
use super::{FeatureModel, LinearModel, Solver, TrainableModel};

/// A batch model over a closed vocabulary of string features
///
/// The vocabularies are filled first, then [`StringModel::init_weights`] or a
/// trainer allocates the weight array. Two-label models store a single
/// signed weight per feature.
#[derive(Debug, Clone, Default)]
pub struct StringModel {
    core: LinearCore,
    features: FeatureMap,
}

impl StringModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self {
            core: LinearCore::new(),
            features: FeatureMap::new(),
        }
    }

    /// Get or create the id of a label; allocated weights gain a zero
    /// column for a new one
    pub fn add_label(&mut self, label: &str) -> u32 {
        self.core.add_label(label)
    }

    /// Get or create the id of a feature; allocated weights gain a zero row
    /// for a new one
    pub fn add_feature(&mut self, ftype: &str, value: &str) -> u32 {
        let (id, created) = self.features.intern(ftype, value);
        if created {
            self.core.grow_rows(self.features.num_features());
        }
        id
    }

    /// Allocate zero weights sized to the current vocabularies
    pub fn init_weights(&mut self) {
        self.core.init_weights(self.features.num_features());
    }

    /// Overwrite the weights of one label, one value per feature row
    pub fn set_label_weights(&mut self, label: u32, values: &[f64]) -> Result<()> {
        self.core.set_label_weights(label, values)
    }

    /// Weight of one `(feature, label)` pair
    pub fn weight(&self, feature: u32, label: u32) -> f64 {
        self.core.weight(feature, label)
    }

    /// Write the model in its text form
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        codec::write_header(&mut writer, self.core.solver, &self.core.labels)?;
        codec::write_features(&mut writer, &self.features)?;
        self.core.write_weights(&mut writer, self.features.num_features())?;
        writer.flush()?;
        info!(
            labels = self.num_labels(),
            features = self.num_features(),
            "saved string model"
        );
        Ok(())
    }

    /// Read a model written by [`StringModel::save`]
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = ModelReader::new(reader);
        let mut core = LinearCore::new();
        core.solver = reader.read_solver()?;
        core.labels = reader.read_labels()?;
        let num_features = reader.read_feature_count()?;
        let features = reader.read_features(num_features)?;
        core.read_weights(&mut reader, num_features)?;
        info!(
            solver = %core.solver,
            labels = core.labels.len(),
            features = num_features,
            "loaded string model"
        );
        Ok(Self { core, features })
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save(BufWriter::new(File::create(path)?))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(BufReader::new(File::open(path)?))
    }
}

impl LinearModel for StringModel {
    fn solver(&self) -> Solver {
        self.core.solver
    }

    fn labels(&self) -> &Dictionary {
        &self.core.labels
    }

    fn num_features(&self) -> usize {
        self.features.num_features()
    }

    fn scores(&self, x: &SparseVector) -> Vec<f64> {
        self.core.scores(x)
    }
}

impl FeatureModel for StringModel {
    fn features(&self) -> &FeatureMap {
        &self.features
    }
}

impl TrainableModel for StringModel {
    fn set_weights(&mut self, solver: Solver, values: Vec<f64>) -> Result<()> {
        self.core.set_weights(solver, self.features.num_features(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feature::FeatureVector;

    const TOLERANCE: f64 = 1e-9;

    fn base_weights(scale: f64) -> Vec<f64> {
        [1.0, 0.1, 0.01, 0.001, 0.0001, 0.00001, 0.000001]
            .iter()
            .map(|w| w * scale)
            .collect()
    }

    fn add_vocabulary(model: &mut StringModel) {
        assert_eq!(model.add_feature("0", "F00"), 1);
        assert_eq!(model.add_feature("0", "F01"), 2);
        assert_eq!(model.add_feature("1", "F10"), 3);
        assert_eq!(model.add_feature("2", "F20"), 4);
        assert_eq!(model.add_feature("2", "F21"), 5);
        assert_eq!(model.add_feature("2", "F22"), 6);
        assert_eq!(model.add_feature("0", "F00"), 1);
    }

    fn multi_model() -> StringModel {
        let mut model = StringModel::new();
        model.add_label("A");
        model.add_label("B");
        model.add_label("B");
        model.add_label("C");
        add_vocabulary(&mut model);
        model.init_weights();
        model.set_label_weights(0, &base_weights(1.0)).unwrap();
        model.set_label_weights(1, &base_weights(3.0)).unwrap();
        model.set_label_weights(2, &base_weights(2.0)).unwrap();
        model
    }

    fn binary_model() -> StringModel {
        let mut model = StringModel::new();
        model.add_label("A");
        model.add_label("B");
        add_vocabulary(&mut model);
        model.init_weights();
        model.set_label_weights(0, &base_weights(1.0)).unwrap();
        model
    }

    fn test_vector() -> FeatureVector {
        let mut x = FeatureVector::new();
        x.add("0", "F00");
        x.add("1", "F10");
        x.add("2", "F21");
        x.add("2", "F22");
        x.add("2", "F23");
        x.add("3", "F00");
        x
    }

    fn weighted_vector() -> FeatureVector {
        let mut x = FeatureVector::with_weights();
        x.add_weighted("0", "F00", 1.0);
        x.add_weighted("1", "F10", 2.0);
        x.add_weighted("2", "F21", 3.0);
        x.add_weighted("2", "F22", 4.0);
        x
    }

    #[test]
    fn test_multi_class() {
        let model = multi_model();
        assert_eq!(model.num_labels(), 3);
        assert_eq!(model.num_features(), 7);

        let x = model.to_sparse_vector(&test_vector());
        assert_eq!(x.to_string(), "1 3 5 6");

        let list = model.predict_all(&x);
        assert_eq!(list[0].label, "B");
        assert!((list[0].score - 3.303033).abs() < TOLERANCE);
        assert_eq!(list[1].label, "C");
        assert!((list[1].score - 2.202022).abs() < TOLERANCE);
        assert_eq!(list[2].label, "A");
        assert!((list[2].score - 1.101011).abs() < TOLERANCE);

        let best = model.predict_best_features(&test_vector()).unwrap();
        assert_eq!(best.label, "B");

        let (fst, snd) = model.predict_two(&x).unwrap();
        assert_eq!((fst.label, snd.label), ("B", "C"));

        let list = model.predict_all_features(&weighted_vector());
        assert_eq!(list[2].label, "A");
        assert!((list[2].score - 1.102034).abs() < TOLERANCE);
    }

    #[test]
    fn test_binary() {
        let model = binary_model();
        let list = model.predict_all_features(&test_vector());
        assert_eq!(list[0].label, "A");
        assert!((list[0].score - 1.101011).abs() < TOLERANCE);
        assert_eq!(list[1].label, "B");
        assert!((list[1].score + 1.101011).abs() < TOLERANCE);

        let best = model.predict_best_features(&weighted_vector()).unwrap();
        assert_eq!(best.label, "A");
        assert!((best.score - 1.102034).abs() < TOLERANCE);

        let (fst, snd) = model.predict_two_features(&test_vector()).unwrap();
        assert_eq!((fst.label, snd.label), ("A", "B"));
    }

    #[test]
    fn test_round_trip() {
        for model in [multi_model(), binary_model()] {
            let mut buf = Vec::new();
            model.save(&mut buf).unwrap();
            let loaded = StringModel::load(&buf[..]).unwrap();

            let x = model.to_sparse_vector(&test_vector());
            assert_eq!(loaded.to_sparse_vector(&test_vector()), x);
            assert_eq!(loaded.scores(&x), model.scores(&x));
            assert_eq!(loaded.solver(), model.solver());
            assert_eq!(loaded.labels().names(), model.labels().names());

            let mut again = Vec::new();
            loaded.save(&mut again).unwrap();
            assert_eq!(again, buf);
        }
    }

    #[test]
    fn test_load_rejects_malformed() {
        let mut buf = Vec::new();
        multi_model().save(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        // drop the weight line
        let truncated: Vec<&str> = text.lines().collect();
        let truncated = truncated[..truncated.len() - 1].join("\n");
        let err = StringModel::load(truncated.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));

        let bad_count = text.replacen("\n21\n", "\n20\n", 1);
        assert!(matches!(
            StringModel::load(bad_count.as_bytes()),
            Err(Error::Format { .. })
        ));

        assert!(matches!(
            StringModel::load(&b"9\n"[..]),
            Err(Error::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_oov_dropped() {
        let model = multi_model();
        let mut with_oov = FeatureVector::new();
        with_oov.add("0", "F00");
        with_oov.add("9", "unseen");
        with_oov.add("2", "F20");
        let mut without = FeatureVector::new();
        without.add("0", "F00");
        without.add("2", "F20");

        let a = model.to_sparse_vector(&with_oov);
        let b = model.to_sparse_vector(&without);
        assert_eq!(a.len(), b.len());
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_weights_folds_two_labels() {
        let mut model = StringModel::new();
        model.add_label("yes");
        model.add_label("no");
        model.add_feature("w", "a");
        let values = vec![0.2, -0.2, 1.0, -1.0];
        model.set_weights(Solver::L2Svm, values).unwrap();
        assert_eq!(model.solver(), Solver::L2Svm);
        assert!((model.weight(1, 0) - 1.0).abs() < TOLERANCE);
        assert!((model.weight(1, 1) + 1.0).abs() < TOLERANCE);
        assert!((model.weight(0, 0) - 0.2).abs() < TOLERANCE);
    }

    #[test]
    fn test_vocabulary_growth_after_init_round_trips() {
        let mut model = StringModel::new();
        for label in ["A", "B", "C"] {
            model.add_label(label);
        }
        model.add_feature("w", "a");
        model.init_weights();
        model.set_label_weights(1, &[0.0, 2.0]).unwrap();

        assert_eq!(model.add_feature("w", "b"), 2);
        assert_eq!(model.add_label("D"), 3);
        model.set_label_weights(3, &[0.0, 0.0, 1.5]).unwrap();

        let mut x = FeatureVector::new();
        x.add("w", "a");
        x.add("w", "b");
        let sparse = model.to_sparse_vector(&x);
        assert_eq!(model.scores(&sparse), vec![0.0, 2.0, 0.0, 1.5]);
        assert_eq!(model.predict_all(&sparse).len(), 4);

        let mut buf = Vec::new();
        model.save(&mut buf).unwrap();
        let loaded = StringModel::load(&buf[..]).unwrap();
        assert_eq!(loaded.num_features(), 3);
        assert_eq!(loaded.scores(&sparse), model.scores(&sparse));
    }
}
