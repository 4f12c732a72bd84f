//! Serde support for the bundle's `dd-MM-yyyy` date fields.
//!
//! An empty field means "no date". Use with
//! `#[serde(deserialize_with = "date::optional")]`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

pub const FORMAT: &str = "%d-%m-%Y";

pub fn optional<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  if raw.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(&raw, FORMAT)
    .map(Some)
    .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
  use serde::Deserialize;

  use super::*;

  #[derive(Deserialize)]
  struct Row {
    #[serde(deserialize_with = "optional")]
    date: Option<NaiveDate>,
  }

  fn parse(value: &str) -> Result<Option<NaiveDate>, csv::Error> {
    let data = format!("date\n{value}\n");
    let mut rdr = csv::Reader::from_reader(data.as_bytes());
    let row: Row = rdr.deserialize().next().unwrap()?;
    Ok(row.date)
  }

  #[test]
  fn parses_day_month_year() {
    assert_eq!(
      parse("09-01-1935").unwrap(),
      NaiveDate::from_ymd_opt(1935, 1, 9)
    );
  }

  #[test]
  fn empty_means_absent() {
    assert_eq!(parse("").unwrap(), None);
  }

  #[test]
  fn rejects_iso_order() {
    assert!(parse("1935-01-09").is_err());
  }
}
