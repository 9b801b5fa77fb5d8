use std::fmt;

/// An integer-indexed feature vector
///
/// Ids refer to rows of a model's weight array. A vector either carries one
/// weight per id or none at all, in which case every weight is `1.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    ids: Vec<u32>,
    weights: Option<Vec<f64>>,
}

impl SparseVector {
    /// Create an empty, unweighted vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty weighted vector
    pub fn with_weights() -> Self {
        Self {
            ids: Vec::new(),
            weights: Some(Vec::new()),
        }
    }

    pub(crate) fn with_capacity(cap: usize, weighted: bool) -> Self {
        Self {
            ids: Vec::with_capacity(cap),
            weights: if weighted {
                Some(Vec::with_capacity(cap))
            } else {
                None
            },
        }
    }

    /// Build a vector from parallel id and weight arrays
    ///
    /// # Panics
    ///
    /// Panics if `weights` is given and its length differs from `ids.len()`.
    pub fn from_parts(ids: Vec<u32>, weights: Option<Vec<f64>>) -> Self {
        if let Some(w) = &weights {
            assert_eq!(ids.len(), w.len(), "ids and weights must have equal length");
        }
        Self { ids, weights }
    }

    pub fn has_weight(&self) -> bool {
        self.weights.is_some()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Append a feature id; on a weighted vector its weight is `1.0`
    pub fn push(&mut self, id: u32) {
        self.ids.push(id);
        if let Some(w) = &mut self.weights {
            w.push(1.0);
        }
    }

    /// Append a weighted feature id
    pub fn push_weighted(&mut self, id: u32, weight: f64) {
        let ids = self.ids.len();
        let w = self.weights.get_or_insert_with(|| vec![1.0; ids]);
        self.ids.push(id);
        w.push(weight);
    }

    /// Iterate over `(id, weight)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.ids.iter().enumerate().map(move |(i, &id)| {
            let weight = match &self.weights {
                Some(w) => w[i],
                None => 1.0,
            };
            (id, weight)
        })
    }

    /// Squared euclidean norm
    pub fn squared_norm(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().map(|v| v * v).sum(),
            None => self.ids.len() as f64,
        }
    }
}

impl fmt::Display for SparseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (id, weight)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if self.has_weight() {
                write!(f, "{}:{}", id, weight)?;
            } else {
                write!(f, "{}", id)?;
            }
        }
        Ok(())
    }
}
