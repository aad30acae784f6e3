//! Experimental designs crossing Morris samples with qualitative parameters

use crate::{Error, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A parameter taking a few discrete values (a year of weather, a variety).
///
/// Values are encoded as numbers so that they share the design matrix with the quantitative
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeParameter {
    pub name: String,
    pub default: f64,
    pub values: Vec<f64>,
}

impl QualitativeParameter {
    pub fn new(name: &str, default: f64, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            default,
            values,
        }
    }
}

/// Repeat each sample for the qualitative parameters.
///
/// Every sample is first run with all qualitative parameters at their default. It is then
/// repeated for each non-default value of each qualitative parameter, the others staying at
/// their default. Rows are `[i_sample, qualitative values..., sample...]`.
pub fn full_design(samples: &Array2<f64>, qualitative: &[QualitativeParameter]) -> Array2<f64> {
    let defaults: Vec<f64> = qualitative.iter().map(|q| q.default).collect();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for sample in samples.rows() {
        rows.push(design_row(&defaults, sample));
        for (index, parameter) in qualitative.iter().enumerate() {
            for value in parameter.values.iter().filter(|v| **v != parameter.default) {
                let mut combination = defaults.clone();
                combination[index] = *value;
                rows.push(design_row(&combination, sample));
            }
        }
    }

    let ncols = 1 + qualitative.len() + samples.ncols();
    let mut design = Array2::zeros((rows.len(), ncols));
    for (i_sample, row) in rows.iter().enumerate() {
        design[[i_sample, 0]] = i_sample as f64;
        for (j, value) in row.iter().enumerate() {
            design[[i_sample, j + 1]] = *value;
        }
    }
    design
}

fn design_row(qualitative: &[f64], sample: ArrayView1<f64>) -> Vec<f64> {
    qualitative.iter().copied().chain(sample.iter().copied()).collect()
}

/// Sample indices of the rows where `name` equals `value` and the other qualitative
/// parameters are at their default, in design order.
pub fn select(
    design: &Array2<f64>,
    qualitative: &[QualitativeParameter],
    name: &str,
    value: f64,
) -> Result<Vec<usize>> {
    let column = qualitative
        .iter()
        .position(|q| q.name == name)
        .ok_or_else(|| {
            Error::InvalidParameter(format!("Unknown qualitative parameter '{}'", name))
        })?;
    if design.ncols() < 1 + qualitative.len() {
        return Err(Error::InvalidParameter(format!(
            "Design has {} columns, expected at least {}",
            design.ncols(),
            1 + qualitative.len()
        )));
    }

    let selected = design
        .rows()
        .into_iter()
        .filter(|row| {
            qualitative.iter().enumerate().all(|(j, q)| {
                let expected = if j == column { value } else { q.default };
                row[j + 1] == expected
            })
        })
        .map(|row| row[0] as usize)
        .collect();
    Ok(selected)
}

/// Quantitative part of the design rows
pub fn quantitative_columns(design: &Array2<f64>, nb_qualitative: usize) -> Array2<f64> {
    design
        .slice(ndarray::s![.., (1 + nb_qualitative).min(design.ncols())..])
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn qualitative() -> Vec<QualitativeParameter> {
        vec![
            QualitativeParameter::new("year", 2004.0, vec![1998.0, 2003.0, 2004.0]),
            QualitativeParameter::new("variety", 1.0, vec![1.0, 2.0, 3.0, 4.0]),
        ]
    }

    #[test]
    fn test_full_design_rows() {
        let samples = array![[0.1, 0.2], [0.3, 0.4]];
        let design = full_design(&samples, &qualitative());
        // default + 2 years + 3 varieties per sample
        assert_eq!(design.dim(), (12, 5));
        assert_eq!(design.row(0).to_vec(), vec![0.0, 2004.0, 1.0, 0.1, 0.2]);
        assert_eq!(design.row(1).to_vec(), vec![1.0, 1998.0, 1.0, 0.1, 0.2]);
        assert_eq!(design.row(3).to_vec(), vec![3.0, 2004.0, 2.0, 0.1, 0.2]);
        assert_eq!(design.row(6).to_vec(), vec![6.0, 2004.0, 1.0, 0.3, 0.4]);

        assert_eq!(
            quantitative_columns(&design, 2),
            array![
                [0.1, 0.2],
                [0.1, 0.2],
                [0.1, 0.2],
                [0.1, 0.2],
                [0.1, 0.2],
                [0.1, 0.2],
                [0.3, 0.4],
                [0.3, 0.4],
                [0.3, 0.4],
                [0.3, 0.4],
                [0.3, 0.4],
                [0.3, 0.4]
            ]
        );
    }

    #[test]
    fn test_select_one_per_sample() {
        let samples = array![[0.1], [0.3], [0.5]];
        let qualitative = qualitative();
        let design = full_design(&samples, &qualitative);

        assert_eq!(select(&design, &qualitative, "year", 2004.0).unwrap(), vec![0, 6, 12]);
        assert_eq!(select(&design, &qualitative, "year", 2003.0).unwrap(), vec![2, 8, 14]);
        assert_eq!(select(&design, &qualitative, "variety", 4.0).unwrap(), vec![5, 11, 17]);
        assert!(select(&design, &qualitative, "soil", 1.0).is_err());
    }
}
