use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bstr::io::BufReadExt;
use bstr::ByteSlice;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::feature::FeatureVector;
use crate::model::{FeatureModel, LinearModel, StringModel};
use crate::sparse::SparseVector;

/// Training instances resolved to ids: one label and one sparse vector each
///
/// A space becomes weighted with its first weighted vector and stays so;
/// unweighted vectors in a weighted space read as all-ones.
#[derive(Debug, Clone, Default)]
pub struct TrainingSpace {
    weighted: bool,
    ys: Vec<u32>,
    xs: Vec<SparseVector>,
}

impl TrainingSpace {
    /// Create an empty space
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty space whose vectors carry weights
    pub fn with_weights() -> Self {
        Self {
            weighted: true,
            ..Self::default()
        }
    }

    pub fn has_weight(&self) -> bool {
        self.weighted
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    /// Append an instance
    pub fn push(&mut self, label: u32, x: SparseVector) {
        self.weighted |= x.has_weight();
        self.ys.push(label);
        self.xs.push(x);
    }

    pub fn label(&self, i: usize) -> u32 {
        self.ys[i]
    }

    pub fn vector(&self, i: usize) -> &SparseVector {
        &self.xs[i]
    }

    /// Labels of all instances in order
    pub fn labels(&self) -> &[u32] {
        &self.ys
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SparseVector)> + '_ {
        self.ys.iter().copied().zip(self.xs.iter())
    }

    /// Append all instances of `other`
    pub fn merge(&mut self, other: TrainingSpace) {
        self.weighted |= other.weighted;
        self.ys.extend(other.ys);
        self.xs.extend(other.xs);
    }

    /// Check that every label id is below `num_labels` and every feature id
    /// lies in `1..num_features`
    pub fn check_dimensions(&self, num_labels: usize, num_features: usize) -> Result<()> {
        if let Some((i, y)) = self
            .ys
            .iter()
            .enumerate()
            .find(|&(_, &y)| y as usize >= num_labels)
        {
            return Err(Error::input(format!(
                "instance {} has label id {} but the model has {} labels",
                i, y, num_labels
            )));
        }
        self.check_features(num_features)
    }

    /// Check that every feature id lies in `1..num_features`
    pub fn check_features(&self, num_features: usize) -> Result<()> {
        for (i, x) in self.xs.iter().enumerate() {
            if let Some(&id) = x
                .ids()
                .iter()
                .find(|&&id| id == 0 || id as usize >= num_features)
            {
                return Err(Error::input(format!(
                    "instance {} has feature id {} outside [1, {})",
                    i, id, num_features
                )));
            }
        }
        Ok(())
    }

    /// Build one space per shard on a pool of `threads` workers and merge
    /// them in shard order
    ///
    /// Workers share nothing; the first failing shard's error is returned
    /// once every worker has finished.
    pub fn collect_shards<T, F>(shards: &[T], threads: usize, scan: F) -> Result<Self>
    where
        T: Sync,
        F: Fn(&T) -> Result<TrainingSpace> + Sync,
    {
        let mut space = TrainingSpace::new();
        for shard in run_shards(shards, threads, scan)? {
            space.merge(shard);
        }
        Ok(space)
    }
}

/// Run `scan` over every shard on a dedicated pool and join all results
fn run_shards<T, S, F>(shards: &[T], threads: usize, scan: F) -> Result<Vec<S>>
where
    T: Sync,
    S: Send,
    F: Fn(&T) -> Result<S> + Sync,
{
    if threads == 0 {
        return Err(Error::Configuration(
            "thread count must be at least 1".to_string(),
        ));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Configuration(e.to_string()))?;
    let results: Vec<Result<S>> = pool.install(|| shards.par_iter().map(&scan).collect());
    results.into_iter().collect()
}

/// Collects string instances, counts labels and features, and resolves
/// them into a [`StringModel`] vocabulary and a [`TrainingSpace`]
///
/// Labels and features are kept only when they occur more often than their
/// cutoff. Ids are assigned in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SpaceBuilder {
    instances: Vec<(String, FeatureVector)>,
    label_counts: HashMap<String, usize>,
    feature_counts: HashMap<(String, String), usize>,
    label_cutoff: usize,
    feature_cutoff: usize,
}

impl SpaceBuilder {
    /// Create an empty builder keeping every label and feature
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder with count cutoffs
    pub fn with_cutoffs(label_cutoff: usize, feature_cutoff: usize) -> Self {
        Self {
            label_cutoff,
            feature_cutoff,
            ..Self::default()
        }
    }

    pub fn label_cutoff(&self) -> usize {
        self.label_cutoff
    }

    pub fn set_label_cutoff(&mut self, cutoff: usize) {
        self.label_cutoff = cutoff;
    }

    pub fn feature_cutoff(&self) -> usize {
        self.feature_cutoff
    }

    pub fn set_feature_cutoff(&mut self, cutoff: usize) {
        self.feature_cutoff = cutoff;
    }

    /// Number of collected instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Add one instance
    pub fn add(&mut self, label: &str, x: FeatureVector) {
        *self.label_counts.entry(label.to_string()).or_default() += 1;
        for feature in &x {
            *self
                .feature_counts
                .entry((feature.ftype.clone(), feature.value.clone()))
                .or_default() += 1;
        }
        self.instances.push((label.to_string(), x));
    }

    /// Add one instance from its text form: the label followed by features
    pub fn add_line(&mut self, line: &str, weighted: bool) -> Result<()> {
        let line = line.trim();
        let (label, features) = match line.split_once(char::is_whitespace) {
            Some((label, rest)) => (label, rest),
            None if !line.is_empty() => (line, ""),
            None => return Err(Error::input("empty instance line")),
        };
        let x = FeatureVector::parse(features, weighted)?;
        self.add(label, x);
        Ok(())
    }

    /// Append the instances and counts of another builder
    pub fn merge(&mut self, other: SpaceBuilder) {
        for (label, count) in other.label_counts {
            *self.label_counts.entry(label).or_default() += count;
        }
        for (feature, count) in other.feature_counts {
            *self.feature_counts.entry(feature).or_default() += count;
        }
        self.instances.extend(other.instances);
    }

    /// Read one shard per file on `threads` workers and merge the shards
    /// in file order
    ///
    /// Every non-empty line is one instance. I/O and parse errors are
    /// returned after all files have been read.
    pub fn scan_files<P>(&mut self, paths: &[P], threads: usize, weighted: bool) -> Result<()>
    where
        P: AsRef<Path> + Sync,
    {
        let shards = run_shards(paths, threads, |path| scan_file(path.as_ref(), weighted))?;
        for shard in shards {
            self.merge(shard);
        }
        Ok(())
    }

    /// Resolve the collected instances
    ///
    /// Returns a model holding the kept vocabularies with zero weights and
    /// the training space built against it. Instances whose label was cut
    /// are skipped.
    pub fn build(&self) -> Result<(StringModel, TrainingSpace)> {
        if self.instances.is_empty() {
            return Err(Error::input("no training instances"));
        }
        let mut model = StringModel::new();
        for (label, x) in &self.instances {
            if self.label_counts.get(label).copied().unwrap_or(0) > self.label_cutoff {
                model.add_label(label);
            }
            for feature in x {
                let key = (feature.ftype.clone(), feature.value.clone());
                if self.feature_counts.get(&key).copied().unwrap_or(0) > self.feature_cutoff {
                    model.add_feature(&feature.ftype, &feature.value);
                }
            }
        }
        model.init_weights();

        let mut space = TrainingSpace::new();
        for (label, x) in &self.instances {
            if let Some(y) = model.label_id(label) {
                space.push(y, model.to_sparse_vector(x));
            }
        }
        info!(
            labels = model.num_labels(),
            features = model.num_features(),
            instances = space.len(),
            "built training space"
        );
        Ok((model, space))
    }
}

fn scan_file(path: &Path, weighted: bool) -> Result<SpaceBuilder> {
    let reader = BufReader::new(File::open(path)?);
    let mut shard = SpaceBuilder::new();
    for (n, line) in reader.byte_lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line.to_str().map_err(|_| {
            Error::input(format!("{}:{}: invalid UTF-8", path.display(), n + 1))
        })?;
        shard.add_line(line, weighted).map_err(|e| {
            Error::input(format!("{}:{}: {}", path.display(), n + 1, e))
        })?;
    }
    debug!(path = %path.display(), instances = shard.len(), "scanned shard");
    Ok(shard)
}
