//! Binary snapshots of simulation objects

use crate::errors::{AlepError, AlepResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write `value` to `path` with bincode.
///
/// The snapshot is written next to `path` and renamed once complete, so concurrent readers
/// never see a partial file.
pub fn save<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> AlepResult<()> {
    let path = path.as_ref();
    let partial = partial_path(path);
    let file = File::create(&partial).map_err(|e| AlepError::io(&partial, e))?;
    let mut writer = BufWriter::new(file);

    bincode::serialize_into(&mut writer, value)?;

    writer.flush().map_err(|e| AlepError::io(&partial, e))?;
    drop(writer);
    std::fs::rename(&partial, path).map_err(|e| AlepError::io(path, e))?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{}.{}.{:?}.partial",
        name,
        std::process::id(),
        std::thread::current().id()
    ))
}

/// Read a value written by [`save`]
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> AlepResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AlepError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let value = bincode::deserialize_from(&mut reader)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001.bin");
        save(&vec![1.0f64, 2.0], &path).unwrap();
        save(&vec![3.0f64], &path).unwrap();
        let value: Vec<f64> = load(&path).unwrap();
        assert_eq!(value, vec![3.0]);
        // only the snapshot remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let result: AlepResult<Vec<f64>> = load(dir.path().join("none.bin"));
        assert!(matches!(result, Err(AlepError::Io { .. })));
    }
}
