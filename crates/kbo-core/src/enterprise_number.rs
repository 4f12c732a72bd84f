//! The 10-digit Belgian enterprise number.
//!
//! Parsing accepts any textual rendering — `0403.199.702`, `0403199702`,
//! `BE 0403 199 702` — keeps the decimal digits, and requires exactly ten of
//! them. Validity additionally requires the modulus-97 checksum: the last
//! two digits must equal `97 - (first_eight_digits % 97)`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A validated enterprise number, stored as its 10-digit decimal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnterpriseNumber(u64);

impl EnterpriseNumber {
  /// Parse from any string containing exactly ten decimal digits with a
  /// valid checksum.
  pub fn parse(s: &str) -> Result<Self> {
    let digits: String = s.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 10 {
      return Err(Error::InvalidIdentifier(s.to_owned()));
    }
    let value: u64 = digits
      .parse()
      .map_err(|_| Error::InvalidIdentifier(s.to_owned()))?;

    let head = value / 100;
    let chk = value % 100;
    if chk != 97 - (head % 97) {
      return Err(Error::InvalidIdentifier(s.to_owned()));
    }
    Ok(Self(value))
  }

  /// The raw 10-digit value; fits the store's 64-bit integer domain.
  pub fn value(self) -> u64 { self.0 }

  /// Rebuild from a value previously stored with [`Self::value`].
  ///
  /// The checksum is re-verified so a corrupted store surfaces as
  /// [`Error::InvalidIdentifier`] rather than a malformed identifier.
  pub fn from_value(value: i64) -> Result<Self> {
    if value < 0 {
      return Err(Error::InvalidIdentifier(value.to_string()));
    }
    Self::parse(&format!("{:010}", value))
  }

  /// Canonical dotted form `NNNN.NNN.NNN`.
  pub fn format_dotted(self) -> String {
    format!(
      "{:04}.{:03}.{:03}",
      self.0 / 1_000_000,
      (self.0 / 1_000) % 1_000,
      self.0 % 1_000
    )
  }
}

/// Display is the unformatted 10-digit string with leading zeros.
impl fmt::Display for EnterpriseNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:010}", self.0)
  }
}

impl FromStr for EnterpriseNumber {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl Serialize for EnterpriseNumber {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.format_dotted())
  }
}

impl<'de> Deserialize<'de> for EnterpriseNumber {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse(&s).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_dotted_form() {
    let n = EnterpriseNumber::parse("0403.199.702").unwrap();
    assert_eq!(n.value(), 403_199_702);
  }

  #[test]
  fn parses_with_noise() {
    let n = EnterpriseNumber::parse("BE 0403 199 702").unwrap();
    assert_eq!(n.format_dotted(), "0403.199.702");
  }

  #[test]
  fn rejects_wrong_digit_count() {
    assert!(EnterpriseNumber::parse("123").is_err());
    assert!(EnterpriseNumber::parse("04031997021").is_err());
    assert!(EnterpriseNumber::parse("").is_err());
  }

  #[test]
  fn rejects_bad_checksum() {
    // Valid shape, last two digits off by one.
    assert!(EnterpriseNumber::parse("0403.199.703").is_err());
  }

  #[test]
  fn round_trips_through_canonical_form() {
    for s in ["0403.199.702", "0203.201.340", "0401.574.852"] {
      let n = EnterpriseNumber::parse(s).unwrap();
      assert_eq!(n.format_dotted(), s);
      assert_eq!(EnterpriseNumber::parse(&n.format_dotted()).unwrap(), n);
    }
  }

  #[test]
  fn display_is_ten_digits_with_leading_zeros() {
    let n = EnterpriseNumber::parse("0403.199.702").unwrap();
    assert_eq!(n.to_string(), "0403199702");
  }

  #[test]
  fn from_value_verifies_checksum() {
    assert!(EnterpriseNumber::from_value(403_199_702).is_ok());
    assert!(EnterpriseNumber::from_value(403_199_703).is_err());
    assert!(EnterpriseNumber::from_value(-1).is_err());
  }
}
