use std::collections::HashMap;

/// A bidirectional dictionary between label strings and dense ids
///
/// Ids are assigned in first-seen order starting from 0 and never change.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    /// Map from string to ID
    str_to_id: HashMap<String, u32>,
    /// Map from ID to string
    id_to_str: Vec<String>,
}

impl Dictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries in the dictionary
    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    /// Returns `true` if the dictionary contains no entries
    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    /// Get or create an ID for a string
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.str_to_id.get(s) {
            id
        } else {
            let id = self.id_to_str.len() as u32;
            self.str_to_id.insert(s.to_string(), id);
            self.id_to_str.push(s.to_string());
            id
        }
    }

    /// Look up the ID of a string
    pub fn get(&self, s: &str) -> Option<u32> {
        self.str_to_id.get(s).copied()
    }

    /// Look up the string of an ID
    pub fn name(&self, id: u32) -> Option<&str> {
        self.id_to_str.get(id as usize).map(String::as_str)
    }

    /// All entries ordered by ID
    pub fn names(&self) -> &[String] {
        &self.id_to_str
    }

    /// Iterate over all (string, id) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id as u32))
    }
}

/// The feature vocabulary: `(type, value)` pairs mapped to dense ids
///
/// Id 0 is the bias row and is never assigned to a pair, so ids handed out
/// start at 1 and [`FeatureMap::num_features`] counts the bias row too.
#[derive(Debug, Clone)]
pub struct FeatureMap {
    types: HashMap<String, HashMap<String, u32>>,
    next_id: u32,
}

impl Default for FeatureMap {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureMap {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of weight rows the vocabulary spans, including the bias row
    pub fn num_features(&self) -> usize {
        self.next_id as usize
    }

    /// Number of distinct feature types
    pub fn num_types(&self) -> usize {
        self.types.len()
    }

    /// Look up the id of a feature
    pub fn get(&self, ftype: &str, value: &str) -> Option<u32> {
        self.types.get(ftype).and_then(|values| values.get(value)).copied()
    }

    /// Get or create the id of a feature
    ///
    /// Returns the id and whether it was newly created.
    pub fn intern(&mut self, ftype: &str, value: &str) -> (u32, bool) {
        if let Some(id) = self.get(ftype, value) {
            return (id, false);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.types
            .entry(ftype.to_string())
            .or_default()
            .insert(value.to_string(), id);
        (id, true)
    }

    /// Restore an entry read from a persisted model
    pub(crate) fn insert_raw(&mut self, ftype: &str, value: &str, id: u32) {
        self.types
            .entry(ftype.to_string())
            .or_default()
            .insert(value.to_string(), id);
        self.next_id = self.next_id.max(id + 1);
    }

    pub(crate) fn set_num_features(&mut self, num_features: usize) {
        self.next_id = num_features as u32;
    }

    /// Entries grouped by type, types sorted by name and values sorted by id
    pub fn entries_by_type(&self) -> Vec<(&str, Vec<(&str, u32)>)> {
        let mut types: Vec<_> = self
            .types
            .iter()
            .map(|(ftype, values)| {
                let mut values: Vec<_> = values.iter().map(|(v, &id)| (v.as_str(), id)).collect();
                values.sort_by_key(|&(_, id)| id);
                (ftype.as_str(), values)
            })
            .collect();
        types.sort_by(|a, b| a.0.cmp(b.0));
        types
    }
}
