use std::path::Path;

use nalgebra::{DMatrix, DVector};

use super::LoadError;

/// Reads a headerless CSV file into a dense row-major matrix.
pub fn read_matrix(path: &Path) -> Result<DMatrix<f64>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

    let mut data = Vec::new();
    let mut rows = 0;
    let mut cols = None;

    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        match cols {
            None => cols = Some(record.len()),
            Some(expected) if expected != record.len() => {
                return Err(LoadError::Ragged {
                    path: path.to_path_buf(),
                });
            }
            Some(_) => {}
        }
        for field in record.iter() {
            let value = field.parse::<f64>().map_err(|_| LoadError::Number {
                path: path.to_path_buf(),
                value: field.to_string(),
            })?;
            data.push(value);
        }
        rows += 1;
    }

    let cols = cols.ok_or_else(|| LoadError::EmptyTable {
        path: path.to_path_buf(),
    })?;
    Ok(DMatrix::from_row_slice(rows, cols, &data))
}

/// Reads a single-column CSV file into a vector.
pub fn read_vector(path: &Path) -> Result<DVector<f64>, LoadError> {
    let matrix = read_matrix(path)?;
    if matrix.ncols() != 1 {
        return Err(LoadError::WeightShape {
            path: path.to_path_buf(),
        });
    }
    Ok(matrix.column(0).clone_owned())
}

/// Reads an experiment table of `(value, uncertainty)` rows.
pub fn read_experiment(path: &Path) -> Result<(DVector<f64>, DVector<f64>), LoadError> {
    let matrix = read_matrix(path)?;
    if matrix.ncols() != 2 {
        return Err(LoadError::ExperimentShape {
            path: path.to_path_buf(),
        });
    }
    Ok((matrix.column(0).clone_owned(), matrix.column(1).clone_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn matrix_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "m.csv", "1.0,2.5\n-3.0,4.0e-2\n");
        let matrix = read_matrix(&path).unwrap();
        assert_eq!(matrix.shape(), (2, 2));
        assert_relative_eq!(matrix[(0, 1)], 2.5);
        assert_relative_eq!(matrix[(1, 1)], 0.04);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "m.csv", "1.0,2.0\n3.0\n");
        assert!(matches!(read_matrix(&path), Err(LoadError::Ragged { .. })));
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "m.csv", "1.0,abc\n");
        assert!(matches!(read_matrix(&path), Err(LoadError::Number { value, .. }) if value == "abc"));
    }

    #[test]
    fn empty_tables_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "m.csv", "");
        assert!(matches!(read_matrix(&path), Err(LoadError::EmptyTable { .. })));
    }

    #[test]
    fn vectors_require_a_single_column() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(&dir, "v.csv", "0.25\n0.75\n");
        let vector = read_vector(&good).unwrap();
        assert_eq!(vector.len(), 2);
        assert_relative_eq!(vector.sum(), 1.0);

        let bad = write_file(&dir, "w.csv", "0.25,0.75\n");
        assert!(matches!(read_vector(&bad), Err(LoadError::WeightShape { .. })));
    }

    #[test]
    fn experiments_require_value_and_uncertainty() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(&dir, "e.csv", "1.5,0.3\n2.0,0.4\n");
        let (values, sigmas) = read_experiment(&good).unwrap();
        assert_relative_eq!(values[1], 2.0);
        assert_relative_eq!(sigmas[0], 0.3);

        let bad = write_file(&dir, "f.csv", "1.5\n");
        assert!(matches!(
            read_experiment(&bad),
            Err(LoadError::ExperimentShape { .. })
        ));
    }
}
