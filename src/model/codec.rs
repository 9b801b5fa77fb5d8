//! Line-oriented text format shared by all models
//!
//! ```text
//! <solver id>
//! <label count>
//! <labels separated by spaces>
//! <feature count>                  string and online models:
//! <type count>                     |
//! <type>                           | repeated per type
//! <value count>                    |
//! <value> <id>                     | repeated per value
//! <weight count>
//! <weights separated by spaces>    one line, or one line per row for online models
//! ```

use std::collections::HashSet;
use std::io::{BufRead, Write};

use bstr::io::{BufReadExt, ByteLines};
use bstr::ByteSlice;

use crate::error::{Error, Result};
use crate::vocab::{Dictionary, FeatureMap};
use crate::weights::WeightMatrix;

use super::Solver;

pub(crate) fn write_header<W: Write>(w: &mut W, solver: Solver, labels: &Dictionary) -> Result<()> {
    writeln!(w, "{}", solver.id())?;
    writeln!(w, "{}", labels.len())?;
    writeln!(w, "{}", labels.names().join(" "))?;
    Ok(())
}

pub(crate) fn write_features<W: Write>(w: &mut W, features: &FeatureMap) -> Result<()> {
    writeln!(w, "{}", features.num_features())?;
    let entries = features.entries_by_type();
    writeln!(w, "{}", entries.len())?;
    for (ftype, values) in entries {
        writeln!(w, "{}", ftype)?;
        writeln!(w, "{}", values.len())?;
        for (value, id) in values {
            writeln!(w, "{} {}", value, id)?;
        }
    }
    Ok(())
}

/// Write a weight array on a single line
pub(crate) fn write_weights<W: Write>(w: &mut W, values: &[f64]) -> Result<()> {
    writeln!(w, "{}", values.len())?;
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            w.write_all(b" ")?;
        }
        write!(w, "{}", v)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Write a weight matrix with one line per feature row
pub(crate) fn write_weight_rows<W: Write>(w: &mut W, matrix: &WeightMatrix) -> Result<()> {
    writeln!(w, "{}", matrix.rows() * matrix.labels())?;
    for feature in 0..matrix.rows() {
        for (i, v) in matrix.row(feature).iter().enumerate() {
            if i > 0 {
                w.write_all(b" ")?;
            }
            write!(w, "{}", v)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Reads a persisted model line by line, tracking line numbers for errors
pub(crate) struct ModelReader<R> {
    lines: ByteLines<R>,
    line: usize,
}

impl<R: BufRead> ModelReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.byte_lines(),
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<Vec<u8>> {
        self.line += 1;
        match self.lines.next() {
            Some(line) => Ok(line?),
            None => Err(Error::format(self.line, "unexpected end of model")),
        }
    }

    fn next_str(&mut self) -> Result<String> {
        let line = self.next_line()?;
        line.to_str()
            .map(str::to_string)
            .map_err(|_| Error::format(self.line, "invalid UTF-8"))
    }

    fn next_usize(&mut self, what: &str) -> Result<usize> {
        let line = self.next_line()?;
        parse_field(line.trim(), self.line, what)
    }

    pub fn read_solver(&mut self) -> Result<Solver> {
        let line = self.next_line()?;
        let id: u8 = parse_field(line.trim(), self.line, "solver id")?;
        Solver::from_id(id)
            .ok_or_else(|| Error::format(self.line, format!("unknown solver id {}", id)))
    }

    pub fn read_labels(&mut self) -> Result<Dictionary> {
        let count = self.next_usize("label count")?;
        let line = self.next_str()?;
        let mut labels = Dictionary::new();
        for label in line.split_whitespace() {
            if labels.get(label).is_some() {
                return Err(Error::format(self.line, format!("duplicate label {:?}", label)));
            }
            labels.intern(label);
        }
        if labels.len() != count {
            return Err(Error::format(
                self.line,
                format!("expected {} labels, found {}", count, labels.len()),
            ));
        }
        Ok(labels)
    }

    pub fn read_feature_count(&mut self) -> Result<usize> {
        let count = self.next_usize("feature count")?;
        if count == 0 {
            return Err(Error::format(self.line, "feature count must include the bias row"));
        }
        Ok(count)
    }

    /// Read the per-type vocabulary that follows the feature count
    pub fn read_features(&mut self, num_features: usize) -> Result<FeatureMap> {
        let num_types = self.next_usize("type count")?;
        let mut features = FeatureMap::new();
        let mut seen = HashSet::new();
        for _ in 0..num_types {
            let ftype = self.next_str()?;
            let num_values = self.next_usize("value count")?;
            for _ in 0..num_values {
                let line = self.next_str()?;
                let (value, id) = line
                    .rsplit_once(' ')
                    .ok_or_else(|| Error::format(self.line, "expected `<value> <id>`"))?;
                let id: u32 = parse_field(id.as_bytes(), self.line, "feature id")?;
                if id == 0 || id as usize >= num_features {
                    return Err(Error::format(
                        self.line,
                        format!("feature id {} outside [1, {})", id, num_features),
                    ));
                }
                if !seen.insert(id) {
                    return Err(Error::format(self.line, format!("duplicate feature id {}", id)));
                }
                features.insert_raw(&ftype, value, id);
            }
        }
        features.set_num_features(num_features);
        Ok(features)
    }

    /// Read a weight block and check it holds exactly `expected` values
    pub fn read_weights(&mut self, expected: usize) -> Result<Vec<f64>> {
        let count = self.next_usize("weight count")?;
        if count != expected {
            return Err(Error::format(
                self.line,
                format!("expected {} weights, found count {}", expected, count),
            ));
        }
        let mut values = Vec::with_capacity(count);
        while values.len() < count {
            let line = self.next_line()?;
            for field in line.fields() {
                if values.len() == count {
                    return Err(Error::format(self.line, "too many weights"));
                }
                values.push(parse_field(field, self.line, "weight")?);
            }
        }
        Ok(values)
    }
}

fn parse_field<T: std::str::FromStr>(field: &[u8], line: usize, what: &str) -> Result<T> {
    field
        .to_str()
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::format(line, format!("invalid {}: {:?}", what, field.as_bstr())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_weights_across_lines() {
        let data = b"4\n1 2\n3 4\n";
        let mut reader = ModelReader::new(&data[..]);
        assert_eq!(reader.read_weights(4).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_truncated_weights() {
        let data = b"4\n1 2 3\n";
        let mut reader = ModelReader::new(&data[..]);
        let err = reader.read_weights(4).unwrap_err();
        assert!(matches!(err, Error::Format { line: 3, .. }));
    }

    #[test]
    fn test_weight_count_mismatch() {
        let data = b"3\n1 2 3\n";
        let mut reader = ModelReader::new(&data[..]);
        assert!(matches!(
            reader.read_weights(4),
            Err(Error::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_labels_count_mismatch() {
        let data = b"3\nA B\n";
        let mut reader = ModelReader::new(&data[..]);
        assert!(reader.read_labels().is_err());
    }

    #[test]
    fn test_feature_id_out_of_range() {
        let data = b"1\nt\n1\nv 3\n";
        let mut reader = ModelReader::new(&data[..]);
        assert!(reader.read_features(3).is_err());
    }

    #[test]
    fn test_value_with_space() {
        let data = b"1\nt\n1\nnew york 1\n";
        let mut reader = ModelReader::new(&data[..]);
        let features = reader.read_features(2).unwrap();
        assert_eq!(features.get("t", "new york"), Some(1));
    }
}
