//! The caller-facing company shape — the language-projected view the lookup
//! planner derives from a stored document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Map a `TypeOfDenomination` code value to the caller-facing name kind.
pub fn name_kind(type_of_denomination: &str) -> &'static str {
  match type_of_denomination {
    "001" => "name",
    "002" => "abbreviation",
    "003" => "commercialName",
    "004" => "branchName",
    _ => "unknown",
  }
}

/// A classified name in the caller's language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyName {
  #[serde(rename = "type")]
  pub kind: String,
  pub name: String,
}

/// A single-language address. Children without an address get the
/// all-empty sentinel via `Default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAddress {
  pub street: String,
  pub house_number: String,
  pub box_number: String,
  pub postal_code: String,
  pub city: String,
  pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyContact {
  pub contact_type: String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyActivity {
  pub nace_version: String,
  pub nace_code: String,
  pub classification: String,
  /// Description in the caller's language, after fallback.
  pub description: String,
}

/// An establishment or branch as presented to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyUnit {
  pub number: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  pub names: Vec<CompanyName>,
  pub address: CompanyAddress,
}

/// The lookup API's answer for one enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
  /// Canonical dotted enterprise number.
  pub enterprise_number: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  pub names: Vec<CompanyName>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub juridical_situation: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub type_of_enterprise: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub juridical_form: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<CompanyAddress>,
  pub contacts: Vec<CompanyContact>,
  pub activities: Vec<CompanyActivity>,
  pub establishments: Vec<CompanyUnit>,
  pub branches: Vec<CompanyUnit>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn denomination_type_mapping() {
    assert_eq!(name_kind("001"), "name");
    assert_eq!(name_kind("002"), "abbreviation");
    assert_eq!(name_kind("003"), "commercialName");
    assert_eq!(name_kind("004"), "branchName");
    assert_eq!(name_kind("099"), "unknown");
  }

  #[test]
  fn name_serializes_with_type_key() {
    let n = CompanyName { kind: "name".into(), name: "KBC GROEP".into() };
    let json = serde_json::to_value(&n).unwrap();
    assert_eq!(json["type"], "name");
    assert_eq!(json["name"], "KBC GROEP");
  }
}
