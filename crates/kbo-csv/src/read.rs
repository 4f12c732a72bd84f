//! Lazy, single-pass record readers.

use std::{fs::File, io, path::Path};

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// A lazy iterator of typed records. A missing file yields the empty
/// sequence; any other I/O or decode problem surfaces per record.
pub struct RecordIter<T> {
  inner: Option<csv::DeserializeRecordsIntoIter<File, T>>,
}

impl<T: DeserializeOwned> Iterator for RecordIter<T> {
  type Item = Result<T>;

  fn next(&mut self) -> Option<Self::Item> {
    let inner = self.inner.as_mut()?;
    inner.next().map(|r| r.map_err(Error::from))
  }
}

/// Open `path` as a headered CSV of `T` records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<RecordIter<T>> {
  let file = match File::open(path) {
    Ok(f) => f,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Ok(RecordIter { inner: None });
    }
    Err(e) => return Err(e.into()),
  };

  let reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
  Ok(RecordIter { inner: Some(reader.into_deserialize()) })
}

/// Read a single named column — the shape of every `<table>_delete.csv`,
/// which carries only the key of the rows to remove.
pub fn read_keys(path: &Path, column: &str) -> Result<Vec<String>> {
  let file = match File::open(path) {
    Ok(f) => f,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(e.into()),
  };

  let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
  let index = reader
    .headers()?
    .iter()
    .position(|h| h == column)
    .ok_or_else(|| Error::MissingColumn {
      file:   path.to_owned(),
      column: column.to_owned(),
    })?;

  let mut keys = Vec::new();
  for record in reader.records() {
    let record = record?;
    if let Some(key) = record.get(index) {
      keys.push(key.to_owned());
    }
  }
  Ok(keys)
}
