use crate::sparse::SparseVector;

/// Dense row-major weight storage: one row per feature, one column per label
///
/// Rows are laid out with a `stride` that may exceed the number of labels so
/// that labels can be appended without moving every row. Slots beyond the
/// current label count are kept at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    values: Vec<f64>,
    rows: usize,
    labels: usize,
    stride: usize,
}

impl WeightMatrix {
    /// Zero-initialized matrix of `rows` features by `labels` labels
    pub fn new(rows: usize, labels: usize) -> Self {
        Self {
            values: vec![0.0; rows * labels],
            rows,
            labels,
            stride: labels,
        }
    }

    /// Wrap a compact row-major array of length `rows * labels`
    pub fn from_values(rows: usize, labels: usize, values: Vec<f64>) -> Option<Self> {
        if values.len() != rows * labels {
            return None;
        }
        Some(Self {
            values,
            rows,
            labels,
            stride: labels,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn labels(&self) -> usize {
        self.labels
    }

    #[inline]
    pub fn index(&self, feature: usize, label: usize) -> usize {
        debug_assert!(feature < self.rows && label < self.labels);
        feature * self.stride + label
    }

    #[inline]
    pub fn get(&self, feature: usize, label: usize) -> f64 {
        self.values[self.index(feature, label)]
    }

    #[inline]
    pub fn add(&mut self, feature: usize, label: usize, delta: f64) {
        let i = self.index(feature, label);
        self.values[i] += delta;
    }

    #[inline]
    pub fn set(&mut self, feature: usize, label: usize, value: f64) {
        let i = self.index(feature, label);
        self.values[i] = value;
    }

    /// Weights of all labels for one feature
    #[inline]
    pub fn row(&self, feature: usize) -> &[f64] {
        let start = feature * self.stride;
        &self.values[start..start + self.labels]
    }

    /// Set every weight to zero
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Append a zero row for a new feature
    pub fn push_row(&mut self) {
        self.values.resize(self.values.len() + self.stride, 0.0);
        self.rows += 1;
    }

    /// Append a zero column for a new label
    ///
    /// The stride doubles when it runs out, so repeated label insertions only
    /// re-layout the rows a logarithmic number of times.
    pub fn push_label(&mut self) {
        if self.labels < self.stride {
            self.labels += 1;
            return;
        }
        let stride = (self.stride * 2).max(1);
        let mut values = vec![0.0; self.rows * stride];
        for feature in 0..self.rows {
            let src = feature * self.stride;
            let dst = feature * stride;
            values[dst..dst + self.labels].copy_from_slice(&self.values[src..src + self.labels]);
        }
        self.values = values;
        self.stride = stride;
        self.labels += 1;
    }

    /// Score every label: the bias row plus the rows of in-range features
    pub fn scores(&self, x: &SparseVector) -> Vec<f64> {
        if self.rows == 0 {
            return vec![0.0; self.labels];
        }
        let mut scores = self.row(0).to_vec();
        for (id, v) in x.iter() {
            let f = id as usize;
            if f > 0 && f < self.rows {
                for (s, w) in scores.iter_mut().zip(self.row(f)) {
                    *s += w * v;
                }
            }
        }
        scores
    }

    /// Compact row-major array of length `rows * labels`
    pub fn into_values(self) -> Vec<f64> {
        if self.stride == self.labels {
            return self.values;
        }
        let mut values = Vec::with_capacity(self.rows * self.labels);
        for feature in 0..self.rows {
            let start = feature * self.stride;
            values.extend_from_slice(&self.values[start..start + self.labels]);
        }
        values
    }
}

/// Fold a two-label `rows x 2` array into a single signed weight per feature
///
/// The folded score `s` satisfies `s = (score(label 0) - score(label 1)) / 2`,
/// so scoring it as `[s, -s]` preserves the ranking of both labels.
pub fn fold_binary(values: &[f64], rows: usize) -> Vec<f64> {
    (0..rows)
        .map(|f| (values[f * 2] - values[f * 2 + 1]) / 2.0)
        .collect()
}
