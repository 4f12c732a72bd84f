//! Code vocabulary — the closed reference tables shipped in `code.csv`.
//!
//! The registry models every enumerated attribute (legal form, address type,
//! NACE activity, …) as a `(category, code_value)` pair with per-language
//! descriptions. Categories are a closed set; the spellings below are the
//! exact strings used in the source file and in the `code.category` column.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Categories ──────────────────────────────────────────────────────────────

/// The known code categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeCategory {
  Language,
  TypeOfEnterprise,
  JuridicalSituation,
  JuridicalForm,
  ActivityGroup,
  TypeOfDenomination,
  Nace2003,
  Nace2008,
  Nace2025,
  TypeOfAddress,
  Classification,
  EntityContact,
  ContactType,
}

impl CodeCategory {
  /// Every category, in the order they appear in the reference file.
  pub const ALL: [CodeCategory; 13] = [
    Self::Language,
    Self::TypeOfEnterprise,
    Self::JuridicalSituation,
    Self::JuridicalForm,
    Self::ActivityGroup,
    Self::TypeOfDenomination,
    Self::Nace2003,
    Self::Nace2008,
    Self::Nace2025,
    Self::TypeOfAddress,
    Self::Classification,
    Self::EntityContact,
    Self::ContactType,
  ];

  /// The spelling used in `code.csv` and the `code.category` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Language => "Language",
      Self::TypeOfEnterprise => "TypeOfEnterprise",
      Self::JuridicalSituation => "JuridicalSituation",
      Self::JuridicalForm => "JuridicalForm",
      Self::ActivityGroup => "ActivityGroup",
      Self::TypeOfDenomination => "TypeOfDenomination",
      Self::Nace2003 => "Nace2003",
      Self::Nace2008 => "Nace2008",
      Self::Nace2025 => "Nace2025",
      Self::TypeOfAddress => "TypeOfAddress",
      Self::Classification => "Classification",
      Self::EntityContact => "EntityContact",
      Self::ContactType => "ContactType",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|c| c.as_str() == s)
      .ok_or_else(|| Error::UnknownCategory(s.to_owned()))
  }

  /// The NACE nomenclature category for a `NaceVersion` field value, if the
  /// value is one of the supported vintages.
  pub fn for_nace_version(version: &str) -> Option<Self> {
    match version {
      "2003" => Some(Self::Nace2003),
      "2008" => Some(Self::Nace2008),
      "2025" => Some(Self::Nace2025),
      _ => None,
    }
  }
}

// ─── Languages ───────────────────────────────────────────────────────────────

/// The registry's denomination/description languages.
///
/// `code.csv` assigns single-digit code values to languages; descriptions in
/// `code.csv` itself use the two-letter tags. Both spellings are fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
  Unknown,
  Fr,
  Nl,
  De,
  En,
}

impl Language {
  /// Map a `Language` code value (`"0"`–`"4"`) to its language.
  pub fn from_code_value(code_value: &str) -> Option<Self> {
    match code_value {
      "0" => Some(Self::Unknown),
      "1" => Some(Self::Fr),
      "2" => Some(Self::Nl),
      "3" => Some(Self::De),
      "4" => Some(Self::En),
      _ => None,
    }
  }

  /// The two-letter tag used in document payloads and description columns.
  pub fn tag(self) -> &'static str {
    match self {
      Self::Unknown => "UNKNOWN",
      Self::Fr => "FR",
      Self::Nl => "NL",
      Self::De => "DE",
      Self::En => "EN",
    }
  }
}

// ─── Description fallback ────────────────────────────────────────────────────

/// The language preference chain for resolving a description: the requested
/// language first, then Dutch, French, English, German. The first non-empty
/// candidate wins.
pub fn fallback_chain(requested: Option<&str>) -> Vec<String> {
  let mut chain = Vec::with_capacity(5);
  if let Some(lang) = requested {
    let upper = lang.to_uppercase();
    if !upper.is_empty() {
      chain.push(upper);
    }
  }
  for tag in ["NL", "FR", "EN", "DE"] {
    if !chain.iter().any(|c| c == tag) {
      chain.push(tag.to_owned());
    }
  }
  chain
}

/// Resolve a description map against the fallback chain.
pub fn resolve_description<'a>(
  descriptions: &'a std::collections::BTreeMap<String, String>,
  requested: Option<&str>,
) -> Option<&'a str> {
  for lang in fallback_chain(requested) {
    if let Some(d) = descriptions.get(&lang)
      && !d.is_empty()
    {
      return Some(d);
    }
  }
  None
}
