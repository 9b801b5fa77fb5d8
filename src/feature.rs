use std::fmt;

use crate::error::{Error, Result};

/// Separator between the fields of a feature in its text form.
pub const FIELD_DELIM: char = ':';

/// A string feature: a `(type, value)` pair with an optional real weight
///
/// Features are produced by pipeline components (taggers, parsers, labelers)
/// and resolved against a model vocabulary before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature type, e.g. the template that produced the feature
    pub ftype: String,
    /// Feature value
    pub value: String,
    /// Weight of the feature, `1.0` for binary features
    pub weight: f64,
}

impl Feature {
    /// Create a binary feature
    pub fn new<T: Into<String>, V: Into<String>>(ftype: T, value: V) -> Self {
        Self {
            ftype: ftype.into(),
            value: value.into(),
            weight: 1.0,
        }
    }

    /// Create a weighted feature
    pub fn weighted<T: Into<String>, V: Into<String>>(ftype: T, value: V, weight: f64) -> Self {
        Self {
            ftype: ftype.into(),
            value: value.into(),
            weight,
        }
    }

    /// Parse `type:value`, or `type:value:weight` when `weighted` is set.
    ///
    /// The type ends at the first separator; the weight starts after the last one,
    /// so values may themselves contain separators.
    pub fn parse(s: &str, weighted: bool) -> Result<Self> {
        let (ftype, rest) = s
            .split_once(FIELD_DELIM)
            .ok_or_else(|| Error::input(format!("feature without type: {:?}", s)))?;
        if !weighted {
            return Ok(Self::new(ftype, rest));
        }
        let (value, weight) = rest
            .rsplit_once(FIELD_DELIM)
            .ok_or_else(|| Error::input(format!("feature without weight: {:?}", s)))?;
        let weight = weight
            .parse::<f64>()
            .map_err(|_| Error::input(format!("invalid feature weight: {:?}", s)))?;
        Ok(Self::weighted(ftype, value, weight))
    }
}

impl<T: Into<String>, V: Into<String>> From<(T, V)> for Feature {
    fn from((ftype, value): (T, V)) -> Self {
        Self::new(ftype, value)
    }
}

impl<T: Into<String>, V: Into<String>> From<(T, V, f64)> for Feature {
    fn from((ftype, value, weight): (T, V, f64)) -> Self {
        Self::weighted(ftype, value, weight)
    }
}

/// An ordered list of string features
///
/// A vector is either weighted or not; weights of an unweighted vector are
/// all `1.0` and are not written in its text form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    features: Vec<Feature>,
    weighted: bool,
}

impl FeatureVector {
    /// Create an empty, unweighted vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty vector whose features carry weights
    pub fn with_weights() -> Self {
        Self {
            features: Vec::new(),
            weighted: true,
        }
    }

    pub fn has_weight(&self) -> bool {
        self.weighted
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Append a binary feature
    pub fn add<T: Into<String>, V: Into<String>>(&mut self, ftype: T, value: V) {
        self.features.push(Feature::new(ftype, value));
    }

    /// Append a weighted feature; the vector becomes weighted
    pub fn add_weighted<T: Into<String>, V: Into<String>>(
        &mut self,
        ftype: T,
        value: V,
        weight: f64,
    ) {
        self.weighted = true;
        self.features.push(Feature::weighted(ftype, value, weight));
    }

    pub fn push(&mut self, feature: Feature) {
        if feature.weight != 1.0 {
            self.weighted = true;
        }
        self.features.push(feature);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Parse space separated features
    pub fn parse(s: &str, weighted: bool) -> Result<Self> {
        let mut vector = Self {
            features: Vec::new(),
            weighted,
        };
        for token in s.split_whitespace() {
            vector.features.push(Feature::parse(token, weighted)?);
        }
        Ok(vector)
    }
}

impl<'a> IntoIterator for &'a FeatureVector {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

impl<F: Into<Feature>> FromIterator<F> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for feature in iter {
            vector.push(feature.into());
        }
        vector
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, feature) in self.features.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}{}{}", feature.ftype, FIELD_DELIM, feature.value)?;
            if self.weighted {
                write!(f, "{}{}", FIELD_DELIM, feature.weight)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector() {
        let mut vector = FeatureVector::new();
        vector.add("0", "A");
        vector.push(Feature::parse("1:B", false).unwrap());

        assert_eq!(vector.len(), 2);
        assert_eq!(vector.iter().nth(1).unwrap().value, "B");
        assert_eq!(vector.to_string(), "0:A 1:B");
    }

    #[test]
    fn test_weighted_feature_vector() {
        let mut vector = FeatureVector::with_weights();
        vector.add_weighted("0", "A", 0.1);
        vector.push(Feature::parse("1:B:0.2", true).unwrap());

        assert!(vector.has_weight());
        assert_eq!(vector.iter().nth(1).unwrap().weight, 0.2);
        assert_eq!(vector.to_string(), "0:A:0.1 1:B:0.2");
    }

    #[test]
    fn test_value_with_separator() {
        let feature = Feature::parse("w:a:b:0.5", true).unwrap();
        assert_eq!(feature.ftype, "w");
        assert_eq!(feature.value, "a:b");
        assert_eq!(feature.weight, 0.5);

        let feature = Feature::parse("w:a:b", false).unwrap();
        assert_eq!(feature.value, "a:b");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Feature::parse("novalue", false).is_err());
        assert!(Feature::parse("t:v", true).is_err());
        assert!(Feature::parse("t:v:heavy", true).is_err());
        assert!(FeatureVector::parse("0:A bad", false).is_err());
    }

    #[test]
    fn test_from_iterator() {
        let vector: FeatureVector = vec![("0", "A"), ("1", "B")].into_iter().collect();
        assert!(!vector.has_weight());
        assert_eq!(vector.to_string(), "0:A 1:B");
    }
}
