use crate::{Error, Result};
use indexmap::IndexMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Range of variation of a quantitative parameter.
///
/// `lower` may be larger than `upper`: samples are then scaled in decreasing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

impl ParameterRange {
    /// Value at the position `x` of the unit interval
    pub fn scale(&self, x: f64) -> f64 {
        self.lower + x * (self.upper - self.lower)
    }

    /// Position in the unit interval of a scaled value
    pub fn unscale(&self, value: f64) -> f64 {
        (value - self.lower) / (self.upper - self.lower)
    }
}

/// Ordered collection of parameter ranges.
///
/// The insertion order defines the column order of the samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: IndexMap<String, ParameterRange>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; a range of zero width or a duplicated name is rejected
    pub fn add(&mut self, name: &str, lower: f64, upper: f64) -> Result<&mut Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "Range of '{}' must be finite, got [{}, {}]",
                name, lower, upper
            )));
        }
        if lower == upper {
            return Err(Error::InvalidParameter(format!(
                "Range of '{}' has zero width",
                name
            )));
        }
        if self.params.contains_key(name) {
            return Err(Error::InvalidParameter(format!(
                "Parameter '{}' is defined twice",
                name
            )));
        }
        self.params.insert(
            name.to_string(),
            ParameterRange {
                name: name.to_string(),
                lower,
                upper,
            },
        );
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterRange> {
        self.params.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    pub fn ranges(&self) -> impl Iterator<Item = &ParameterRange> {
        self.params.values()
    }

    /// Scale samples drawn in the unit hypercube to the parameter ranges
    pub fn scale_samples(&self, unit_samples: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_columns(unit_samples)?;
        let mut scaled = unit_samples.clone();
        for (mut column, range) in scaled.columns_mut().into_iter().zip(self.ranges()) {
            column.mapv_inplace(|x| range.scale(x));
        }
        Ok(scaled)
    }

    /// Inverse of [`ParameterSet::scale_samples`]
    pub fn unscale_samples(&self, samples: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_columns(samples)?;
        let mut unit = samples.clone();
        for (mut column, range) in unit.columns_mut().into_iter().zip(self.ranges()) {
            column.mapv_inplace(|x| range.unscale(x));
        }
        Ok(unit)
    }

    fn check_columns(&self, samples: &Array2<f64>) -> Result<()> {
        if samples.ncols() != self.len() {
            return Err(Error::InvalidParameter(format!(
                "Expected {} columns of samples, got {}",
                self.len(),
                samples.ncols()
            )));
        }
        Ok(())
    }

    /// Read a range file with one `name lower upper` line per parameter.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn read_range_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let parse_error = |line: usize, message: String| Error::ParseError {
            path: path.display().to_string(),
            line,
            message,
        };

        let mut params = Self::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::io(path, e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(parse_error(
                    index + 1,
                    format!("expected 'name lower upper', got '{}'", line),
                ));
            }
            let bound = |field: &str| {
                field.parse::<f64>().map_err(|e| {
                    parse_error(index + 1, format!("invalid bound '{}': {}", field, e))
                })
            };
            params.add(fields[0], bound(fields[1])?, bound(fields[2])?)?;
        }
        Ok(params)
    }

    pub fn write_range_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        for range in self.ranges() {
            writeln!(writer, "{} {} {}", range.name, range.lower, range.upper)
                .map_err(|e| Error::io(path, e))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn params() -> ParameterSet {
        let mut params = ParameterSet::new();
        params
            .add("Smin", 1e-4, 0.99e-2)
            .unwrap()
            .add("growth_rate", 0.5e-2, 0.5e-4)
            .unwrap();
        params
    }

    #[test]
    fn test_order_is_preserved() {
        assert_eq!(params().names(), vec!["Smin", "growth_rate"]);
    }

    #[test]
    fn test_invalid_ranges() {
        let mut params = params();
        assert!(params.add("Smin", 0.0, 1.0).is_err());
        assert!(params.add("flat", 1.0, 1.0).is_err());
        assert!(params.add("infinite", 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_scale_inverted_bounds() {
        let params = params();
        let scaled = params.scale_samples(&array![[0.0, 0.0], [1.0, 1.0]]).unwrap();
        assert_relative_eq!(scaled[[0, 1]], 0.5e-2);
        assert_relative_eq!(scaled[[1, 1]], 0.5e-4);
        assert_relative_eq!(scaled[[1, 0]], 0.99e-2);

        let unit = params.unscale_samples(&scaled).unwrap();
        assert_relative_eq!(unit[[1, 1]], 1.0);

        assert!(params.scale_samples(&array![[0.0]]).is_err());
    }

    #[test]
    fn test_range_file_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("param_range_SA.txt");
        params().write_range_file(&path).unwrap();
        assert_eq!(ParameterSet::read_range_file(&path).unwrap(), params());
    }

    #[test]
    fn test_malformed_range_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ranges.txt");
        std::fs::write(&path, "# comment\nSmax 0.01 1.0\nSmin 0.001\n").unwrap();
        match ParameterSet::read_range_file(&path) {
            Err(Error::ParseError { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
