use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::sparse::SparseVector;
use crate::vocab::Dictionary;
use crate::weights::{fold_binary, WeightMatrix};

use super::codec::{self, ModelReader};
use super::Solver;

/// Weight storage of a batch model
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WeightArray {
    /// One signed weight per feature; scores are `[s, -s]`
    Binary(Vec<f64>),
    /// One weight per `(feature, label)`
    Multi(WeightMatrix),
}

impl WeightArray {
    fn rows(&self) -> usize {
        match self {
            WeightArray::Binary(w) => w.len(),
            WeightArray::Multi(m) => m.rows(),
        }
    }

    /// Re-layout for one more label, `labels` counting the new one
    ///
    /// Existing labels keep their scores. Going from one label to two
    /// switches to the binary layout, where the new label scores as the
    /// negation of label 0; going from two to three expands the signed
    /// column into `[w, -w, 0]`.
    fn with_label(self, labels: usize) -> Self {
        match self {
            WeightArray::Binary(w) => {
                let mut m = WeightMatrix::new(w.len(), labels);
                for (feature, &v) in w.iter().enumerate() {
                    m.set(feature, 0, v);
                    m.set(feature, 1, -v);
                }
                WeightArray::Multi(m)
            }
            WeightArray::Multi(m) if labels == 2 => {
                WeightArray::Binary((0..m.rows()).map(|f| m.get(f, 0)).collect())
            }
            WeightArray::Multi(mut m) => {
                m.push_label();
                WeightArray::Multi(m)
            }
        }
    }
}

/// Label vocabulary, solver and weights shared by the batch models
#[derive(Debug, Clone, Default)]
pub(crate) struct LinearCore {
    pub(crate) solver: Solver,
    pub(crate) labels: Dictionary,
    pub(crate) weights: Option<WeightArray>,
}

impl LinearCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the id of a label; allocated weights gain its column
    pub fn add_label(&mut self, label: &str) -> u32 {
        if let Some(id) = self.labels.get(label) {
            return id;
        }
        let id = self.labels.intern(label);
        if let Some(weights) = self.weights.take() {
            self.weights = Some(weights.with_label(self.labels.len()));
        }
        id
    }

    /// Append zero rows to allocated weights until they cover `rows` features
    pub fn grow_rows(&mut self, rows: usize) {
        match &mut self.weights {
            Some(WeightArray::Binary(w)) if w.len() < rows => w.resize(rows, 0.0),
            Some(WeightArray::Multi(m)) => {
                while m.rows() < rows {
                    m.push_row();
                }
            }
            _ => {}
        }
    }

    /// Allocate zero weights for `rows` features in the layout the label count calls for
    pub fn init_weights(&mut self, rows: usize) {
        let weights = if self.labels.len() == 2 {
            WeightArray::Binary(vec![0.0; rows])
        } else {
            WeightArray::Multi(WeightMatrix::new(rows, self.labels.len()))
        };
        self.weights = Some(weights);
    }

    /// Install a trained array of `rows` features
    pub fn set_weights(&mut self, solver: Solver, rows: usize, values: Vec<f64>) -> Result<()> {
        let num_labels = self.labels.len();
        let weights = if num_labels == 2 {
            if values.len() == rows {
                WeightArray::Binary(values)
            } else if values.len() == rows * 2 {
                WeightArray::Binary(fold_binary(&values, rows))
            } else {
                return Err(Error::input(format!(
                    "expected {} or {} weights for a binary model, found {}",
                    rows,
                    rows * 2,
                    values.len()
                )));
            }
        } else {
            let len = values.len();
            let matrix = WeightMatrix::from_values(rows, num_labels, values).ok_or_else(|| {
                Error::input(format!(
                    "expected {} weights for {} features and {} labels, found {}",
                    rows * num_labels,
                    rows,
                    num_labels,
                    len
                ))
            })?;
            WeightArray::Multi(matrix)
        };
        self.solver = solver;
        self.weights = Some(weights);
        Ok(())
    }

    /// Overwrite the weights of one label, one value per feature row
    ///
    /// For a binary model, setting label 1 stores the negated values.
    pub fn set_label_weights(&mut self, label: u32, values: &[f64]) -> Result<()> {
        if label as usize >= self.labels.len() {
            return Err(Error::input(format!("unknown label id {}", label)));
        }
        match &self.weights {
            Some(w) if w.rows() == values.len() => {}
            Some(w) => {
                return Err(Error::input(format!(
                    "expected {} weights, found {}",
                    w.rows(),
                    values.len()
                )))
            }
            None => self.init_weights(values.len()),
        }
        match &mut self.weights {
            Some(WeightArray::Binary(w)) => {
                let sign = if label == 0 { 1.0 } else { -1.0 };
                for (dst, v) in w.iter_mut().zip(values) {
                    *dst = sign * v;
                }
            }
            Some(WeightArray::Multi(m)) => {
                for (feature, &v) in values.iter().enumerate() {
                    m.set(feature, label as usize, v);
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Weight of one `(feature, label)` pair, `0.0` when out of range
    pub fn weight(&self, feature: u32, label: u32) -> f64 {
        let (f, l) = (feature as usize, label as usize);
        match &self.weights {
            Some(WeightArray::Binary(w)) if f < w.len() && l < 2 => {
                if l == 0 {
                    w[f]
                } else {
                    -w[f]
                }
            }
            Some(WeightArray::Multi(m)) if f < m.rows() && l < m.labels() => m.get(f, l),
            _ => 0.0,
        }
    }

    pub fn scores(&self, x: &SparseVector) -> Vec<f64> {
        match &self.weights {
            None => vec![0.0; self.labels.len()],
            Some(WeightArray::Binary(w)) => {
                let mut s = w.first().copied().unwrap_or(0.0);
                for (id, v) in x.iter() {
                    let id = id as usize;
                    if id > 0 && id < w.len() {
                        s += w[id] * v;
                    }
                }
                vec![s, -s]
            }
            Some(WeightArray::Multi(m)) => m.scores(x),
        }
    }

    /// Weight count a `rows`-feature model persists
    pub fn persisted_len(&self, rows: usize) -> usize {
        if self.labels.len() == 2 {
            rows
        } else {
            rows * self.labels.len()
        }
    }

    pub fn write_weights<W: Write>(&self, w: &mut W, rows: usize) -> Result<()> {
        match &self.weights {
            Some(WeightArray::Binary(values)) => codec::write_weights(w, values),
            Some(WeightArray::Multi(m)) => codec::write_weights(w, &m.clone().into_values()),
            None => codec::write_weights(w, &vec![0.0; self.persisted_len(rows)]),
        }
    }

    /// Read the weight block of a model whose header has been read already
    pub fn read_weights<R: BufRead>(
        &mut self,
        reader: &mut ModelReader<R>,
        rows: usize,
    ) -> Result<()> {
        let values = reader.read_weights(self.persisted_len(rows))?;
        self.set_weights(self.solver, rows, values)
    }
}
