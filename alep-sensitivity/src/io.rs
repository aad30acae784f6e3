//! Plain text matrices, one row per line with space separated values

use crate::{Error, Result};
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub fn write_matrix<P: AsRef<Path>>(path: P, matrix: &Array2<f64>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for row in matrix.rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{:e}", v)).collect();
        writeln!(writer, "{}", line.join(" ")).map_err(|e| Error::io(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;

    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|field| {
                field.parse::<f64>().map_err(|e| Error::ParseError {
                    path: path.display().to_string(),
                    line: index + 1,
                    message: format!("invalid value '{}': {}", field, e),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(Error::ParseError {
                    path: path.display().to_string(),
                    line: index + 1,
                    message: format!("expected {} values, got {}", n, row.len()),
                })
            }
            Some(_) => {}
        }
        values.extend(row);
        nrows += 1;
    }
    Array2::from_shape_vec((nrows, ncols.unwrap_or(0)), values)
        .map_err(|e| Error::SamplingError(e.to_string()))
}

pub fn write_vector<P: AsRef<Path>>(path: P, vector: &Array1<f64>) -> Result<()> {
    let column = vector.clone().insert_axis(ndarray::Axis(1));
    write_matrix(path, &column)
}

/// Read a single column file
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<Array1<f64>> {
    let matrix = read_matrix(path)?;
    if matrix.ncols() > 1 {
        return Err(Error::AnalysisError(format!(
            "Expected a single column, got {}",
            matrix.ncols()
        )));
    }
    Ok(matrix.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matrix_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("septo_morris_input.txt");
        let matrix = array![[0.0, 1e-3, 420.0], [1.0, 0.5, f64::NAN]];
        write_matrix(&path, &matrix).unwrap();

        let read = read_matrix(&path).unwrap();
        assert_eq!(read.dim(), (2, 3));
        assert_eq!(read[[0, 1]], 1e-3);
        assert!(read[[1, 2]].is_nan());
    }

    #[test]
    fn test_ragged_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ragged.txt");
        std::fs::write(&path, "1 2\n3\n").unwrap();
        assert!(matches!(
            read_matrix(&path),
            Err(Error::ParseError { line: 2, .. })
        ));
    }

    #[test]
    fn test_vector_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("output.txt");
        write_vector(&path, &array![0.25, 0.5]).unwrap();
        assert_eq!(read_vector(&path).unwrap(), array![0.25, 0.5]);
    }
}
