//! Initial-condition binary I/O.
//!
//! The runtime's boundary format: a flat little-endian f64 file holding, per
//! condition, a pressure scalar and a state vector of `neq` entries.
//!
//! ```text
//! RowMajor    ("C"):  [P, phi_0 .. phi_{neq-1}] per condition, interleaved
//! ColumnMajor ("F"):  all pressures, then phi stored [field][condition]
//! ```
//!
//! Validation output files are raw little-endian f64 dumps of one array each.

use std::io::Write;
use std::path::Path;

use crate::layout::DataOrder;

/// Errors from reading or writing condition files.
#[derive(Debug, thiserror::Error)]
pub enum ConditionsError {
    #[error("i/o error on condition file: {0}")]
    Io(#[from] std::io::Error),

    /// The file holds fewer conditions than requested
    #[error("condition file too short: need {expected} bytes for {count} conditions, found {actual}")]
    ShortFile {
        count: usize,
        expected: usize,
        actual: usize,
    },
}

/// A batch of initial conditions in a particular storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub count: usize,
    pub neq: usize,
    pub order: DataOrder,
    /// State vectors, `count * neq` values laid out per `order`.
    pub phi: Vec<f64>,
    /// One pressure per condition.
    pub pressure: Vec<f64>,
}

/// Read `count` conditions with `neq`-entry state vectors from `path`.
pub fn read_initial_conditions(
    path: &Path,
    count: usize,
    neq: usize,
    order: DataOrder,
) -> Result<Conditions, ConditionsError> {
    let bytes = std::fs::read(path)?;
    let expected = count * (1 + neq) * std::mem::size_of::<f64>();
    if bytes.len() < expected {
        return Err(ConditionsError::ShortFile {
            count,
            expected,
            actual: bytes.len(),
        });
    }

    let values: Vec<f64> = bytes[..expected]
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();

    let mut phi = vec![0.0f64; count * neq];
    let mut pressure = vec![0.0f64; count];

    match order {
        DataOrder::RowMajor => {
            for cond in 0..count {
                let record = &values[cond * (1 + neq)..(cond + 1) * (1 + neq)];
                pressure[cond] = record[0];
                phi[cond * neq..(cond + 1) * neq].copy_from_slice(&record[1..]);
            }
        }
        DataOrder::ColumnMajor => {
            pressure.copy_from_slice(&values[..count]);
            phi.copy_from_slice(&values[count..count * (1 + neq)]);
        }
    }

    Ok(Conditions {
        count,
        neq,
        order,
        phi,
        pressure,
    })
}

/// Write conditions back out in their own storage order (the reader's
/// inverse; used by tooling and tests).
pub fn write_initial_conditions(path: &Path, data: &Conditions) -> Result<(), ConditionsError> {
    let mut file = std::fs::File::create(path)?;
    match data.order {
        DataOrder::RowMajor => {
            for cond in 0..data.count {
                file.write_all(&data.pressure[cond].to_le_bytes())?;
                for field in 0..data.neq {
                    file.write_all(&data.phi[cond * data.neq + field].to_le_bytes())?;
                }
            }
        }
        DataOrder::ColumnMajor => {
            for value in &data.pressure {
                file.write_all(&value.to_le_bytes())?;
            }
            for value in &data.phi {
                file.write_all(&value.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

/// Dump one output array as raw little-endian f64 (validation mode).
pub fn write_output_array(path: &Path, data: &[f64]) -> Result<(), ConditionsError> {
    let mut file = std::fs::File::create(path)?;
    for value in data {
        file.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(order: DataOrder) -> Conditions {
        // 3 conditions, neq = 2
        let (phi, pressure) = match order {
            DataOrder::RowMajor => (
                vec![300.0, 1.0, 400.0, 2.0, 500.0, 3.0],
                vec![101325.0, 202650.0, 303975.0],
            ),
            DataOrder::ColumnMajor => (
                vec![300.0, 400.0, 500.0, 1.0, 2.0, 3.0],
                vec![101325.0, 202650.0, 303975.0],
            ),
        };
        Conditions {
            count: 3,
            neq: 2,
            order,
            phi,
            pressure,
        }
    }

    #[test]
    fn row_major_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ic_c.bin");
        let data = sample(DataOrder::RowMajor);

        write_initial_conditions(&path, &data).unwrap();
        let back = read_initial_conditions(&path, 3, 2, DataOrder::RowMajor).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn column_major_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ic_f.bin");
        let data = sample(DataOrder::ColumnMajor);

        write_initial_conditions(&path, &data).unwrap();
        let back = read_initial_conditions(&path, 3, 2, DataOrder::ColumnMajor).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn reading_more_conditions_than_stored_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ic_short.bin");
        write_initial_conditions(&path, &sample(DataOrder::RowMajor)).unwrap();

        let err = read_initial_conditions(&path, 10, 2, DataOrder::RowMajor).unwrap_err();
        assert!(matches!(err, ConditionsError::ShortFile { count: 10, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_initial_conditions(
            Path::new("/nonexistent/ic.bin"),
            1,
            1,
            DataOrder::RowMajor,
        )
        .unwrap_err();
        assert!(matches!(err, ConditionsError::Io(_)));
    }

    #[test]
    fn output_array_dump_is_raw_le_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dphi.bin");
        write_output_array(&path, &[1.5, -2.5]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(f64::from_le_bytes(bytes[..8].try_into().unwrap()), 1.5);
        assert_eq!(f64::from_le_bytes(bytes[8..].try_into().unwrap()), -2.5);
    }
}
