//! The per-enterprise JSON document — the read projection behind the lookup
//! API and the source of the full-text index.
//!
//! Serialization must be deterministic so the ETag is stable across rebuilds
//! of unchanged data: property order is frozen by struct declaration order,
//! language maps are `BTreeMap`s, and every array is sorted by a stable key
//! before the payload is serialized. No timestamps live inside the payload.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Bumped whenever the payload shape changes incompatibly.
pub const JSON_VERSION: i64 = 1;

// ─── Codes ───────────────────────────────────────────────────────────────────

/// A code value with its multilingual descriptions, keyed by language tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeRef {
  pub code:         String,
  pub descriptions: BTreeMap<String, String>,
}

// ─── Array entries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenominationEntry {
  /// Language tag (`NL`, `FR`, `DE`, `EN`, `UNKNOWN`).
  pub language: String,
  /// Raw `TypeOfDenomination` code value (`001`–`004`).
  pub type_of_denomination: String,
  pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressEntry {
  /// Raw `TypeOfAddress` code value.
  pub type_of_address: String,
  pub country_nl: String,
  pub country_fr: String,
  pub zipcode: String,
  pub municipality_nl: String,
  pub municipality_fr: String,
  pub street_nl: String,
  pub street_fr: String,
  pub house_number: String,
  pub box_number: String,
  pub extra_info: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date_striking_off: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEntry {
  /// Raw `EntityContact` code value (e.g. `ENT`, `EST`).
  pub entity_contact: String,
  /// Raw `ContactType` code value (e.g. `TEL`, `WEB`, `EMAIL`).
  pub contact_type: String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
  /// Raw `ActivityGroup` code value.
  pub activity_group: String,
  /// NACE vintage: `2003`, `2008`, or `2025`.
  pub nace_version: String,
  pub nace_code: String,
  /// Raw `Classification` code value (`MAIN`, `SECO`, `ANCI`).
  pub classification: String,
  /// NACE code descriptions keyed by language tag.
  pub descriptions: BTreeMap<String, String>,
}

/// An establishment or branch nested under its enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildUnit {
  /// Establishment number or branch identifier.
  pub number: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  pub denominations: Vec<DenominationEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub address: Option<AddressEntry>,
}

// ─── Full-text subtree ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LangPair {
  pub nl: String,
  pub fr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityText {
  pub nl: String,
  pub fr: String,
  pub de: String,
  pub en: String,
}

/// The flattened `fts` sub-object the index builder reads with
/// `json_extract`. Field names are part of the on-disk contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtsFields {
  pub company_name: String,
  pub commercial_name: String,
  pub street: LangPair,
  pub city: LangPair,
  pub postal_code: String,
  pub activity: ActivityText,
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The complete document payload for one enterprise.
///
/// Declaration order here is the serialized property order; do not reorder
/// fields without bumping [`JSON_VERSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPayload {
  /// Canonical dotted form, e.g. `0403.199.702`.
  pub enterprise_number: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  pub juridical_situation: CodeRef,
  pub type_of_enterprise: CodeRef,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub juridical_form: Option<CodeRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub juridical_form_cac: Option<CodeRef>,
  pub denominations: Vec<DenominationEntry>,
  pub addresses: Vec<AddressEntry>,
  pub contacts: Vec<ContactEntry>,
  pub activities: Vec<ActivityEntry>,
  pub establishments: Vec<ChildUnit>,
  pub branches: Vec<ChildUnit>,
  pub fts: FtsFields,
}

impl CompanyPayload {
  /// Sort every array by its stable key. Builders call this once before
  /// serializing; ETag stability depends on it.
  pub fn normalize(&mut self) {
    let denom_key = |d: &DenominationEntry| {
      (d.type_of_denomination.clone(), d.language.clone(), d.value.clone())
    };
    self.denominations.sort_by_key(denom_key);
    self
      .addresses
      .sort_by_key(|a| a.type_of_address.clone());
    self.contacts.sort_by_key(|c| {
      (c.entity_contact.clone(), c.contact_type.clone(), c.value.clone())
    });
    self.activities.sort_by_key(|a| {
      (
        a.nace_version.clone(),
        a.nace_code.clone(),
        a.classification.clone(),
        a.activity_group.clone(),
      )
    });
    for child in self
      .establishments
      .iter_mut()
      .chain(self.branches.iter_mut())
    {
      child.denominations.sort_by_key(denom_key);
    }
    self.establishments.sort_by_key(|c| c.number.clone());
    self.branches.sort_by_key(|c| c.number.clone());
  }

  /// Serialize with the frozen property order.
  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_json(payload: &str) -> Result<Self> {
    Ok(serde_json::from_str(payload)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> CompanyPayload {
    CompanyPayload {
      enterprise_number: "0403.199.702".into(),
      start_date: NaiveDate::from_ymd_opt(1935, 1, 9),
      juridical_situation: CodeRef {
        code: "000".into(),
        descriptions: [("NL".to_string(), "Normale toestand".to_string())].into(),
      },
      type_of_enterprise: CodeRef {
        code: "2".into(),
        descriptions: [("NL".to_string(), "Rechtspersoon".to_string())].into(),
      },
      juridical_form: None,
      juridical_form_cac: None,
      denominations: vec![
        DenominationEntry {
          language: "FR".into(),
          type_of_denomination: "001".into(),
          value: "GROUPE KBC".into(),
        },
        DenominationEntry {
          language: "NL".into(),
          type_of_denomination: "001".into(),
          value: "KBC GROEP".into(),
        },
      ],
      addresses: vec![],
      contacts: vec![],
      activities: vec![],
      establishments: vec![],
      branches: vec![],
      fts: FtsFields::default(),
    }
  }

  #[test]
  fn serialization_is_deterministic() {
    let mut a = sample();
    let mut b = sample();
    // Same data, different insertion order.
    b.denominations.reverse();
    a.normalize();
    b.normalize();
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
  }

  #[test]
  fn payload_round_trips() {
    let mut p = sample();
    p.normalize();
    let json = p.to_json().unwrap();
    assert_eq!(CompanyPayload::from_json(&json).unwrap(), p);
  }

  #[test]
  fn fts_fields_use_contract_names() {
    let json = serde_json::to_value(FtsFields::default()).unwrap();
    let obj = json.as_object().unwrap();
    for key in ["companyName", "commercialName", "street", "city", "postalCode", "activity"] {
      assert!(obj.contains_key(key), "missing {key}");
    }
  }
}
