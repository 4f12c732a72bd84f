//! The lookup planner — hydrates a [`Company`] from its stored document and
//! projects it for the caller's language.

use kbo_core::{
  EnterpriseNumber,
  code::resolve_description,
  company::{
    Company, CompanyActivity, CompanyAddress, CompanyContact, CompanyName,
    CompanyUnit, name_kind,
  },
  document::{AddressEntry, CompanyPayload, DenominationEntry},
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::Result;

/// Fetch and project one enterprise; `None` when no document exists.
pub fn get_company(
  conn: &Connection,
  number: EnterpriseNumber,
  language: Option<&str>,
) -> Result<Option<Company>> {
  get_company_by_value(conn, number.value() as i64, language)
}

/// Hydrate from the raw stored key — the free-text planner resolves matches
/// through the sidecar map and already holds the integer form.
pub fn get_company_by_value(
  conn: &Connection,
  number: i64,
  language: Option<&str>,
) -> Result<Option<Company>> {
  let payload: Option<String> = conn
    .query_row(
      "SELECT payload FROM company_document WHERE enterprise_number = ?1",
      params![number],
      |r| r.get(0),
    )
    .optional()?;

  let Some(payload) = payload else { return Ok(None) };
  let document = CompanyPayload::from_json(&payload)?;
  Ok(Some(project(document, language)))
}

/// Project a document into the caller-facing shape for `language`.
pub fn project(document: CompanyPayload, language: Option<&str>) -> Company {
  Company {
    enterprise_number: document.enterprise_number,
    start_date: document.start_date,
    names: select_names(&document.denominations, language),
    juridical_situation: resolve_description(
      &document.juridical_situation.descriptions,
      language,
    )
    .map(str::to_owned),
    type_of_enterprise: resolve_description(
      &document.type_of_enterprise.descriptions,
      language,
    )
    .map(str::to_owned),
    juridical_form: document
      .juridical_form
      .as_ref()
      .and_then(|form| resolve_description(&form.descriptions, language))
      .map(str::to_owned),
    // The first address wins; the builder sorted them by address type.
    address: document
      .addresses
      .first()
      .map(|a| project_address(a, language)),
    contacts: document
      .contacts
      .into_iter()
      .map(|c| CompanyContact { contact_type: c.contact_type, value: c.value })
      .collect(),
    activities: document
      .activities
      .into_iter()
      .map(|a| CompanyActivity {
        description: resolve_description(&a.descriptions, language)
          .unwrap_or_default()
          .to_owned(),
        nace_version: a.nace_version,
        nace_code: a.nace_code,
        classification: a.classification,
      })
      .collect(),
    establishments: document
      .establishments
      .into_iter()
      .map(|child| project_child(child, language))
      .collect(),
    branches: document
      .branches
      .into_iter()
      .map(|child| project_child(child, language))
      .collect(),
  }
}

fn project_child(
  child: kbo_core::document::ChildUnit,
  language: Option<&str>,
) -> CompanyUnit {
  CompanyUnit {
    names: select_names(&child.denominations, language),
    // Children with no address map to the empty-address sentinel.
    address: child
      .address
      .as_ref()
      .map(|a| project_address(a, language))
      .unwrap_or_default(),
    number: child.number,
    start_date: child.start_date,
  }
}

/// Classify denominations by type and pick one value per type through the
/// language fallback chain. A type whose languages all fall outside the
/// chain (e.g. only `UNKNOWN`) still surfaces its first value.
fn select_names(
  denominations: &[DenominationEntry],
  language: Option<&str>,
) -> Vec<CompanyName> {
  let mut kinds: Vec<&str> = denominations
    .iter()
    .map(|d| d.type_of_denomination.as_str())
    .collect();
  kinds.sort_unstable();
  kinds.dedup();

  let chain = kbo_core::code::fallback_chain(language);
  let mut names = Vec::with_capacity(kinds.len());
  for kind in kinds {
    let of_kind = || {
      denominations
        .iter()
        .filter(move |d| d.type_of_denomination == kind)
    };
    let chosen = chain
      .iter()
      .find_map(|lang| {
        of_kind().find(|d| d.language == *lang && !d.value.is_empty())
      })
      .or_else(|| of_kind().next());
    if let Some(denomination) = chosen {
      names.push(CompanyName {
        kind: name_kind(kind).to_owned(),
        name: denomination.value.clone(),
      });
    }
  }
  names
}

/// Pick the language-specific street/city/country columns with the same
/// fallback order as code descriptions (only NL and FR exist for addresses).
fn project_address(address: &AddressEntry, language: Option<&str>) -> CompanyAddress {
  let pick = |nl: &str, fr: &str| -> String {
    for lang in kbo_core::code::fallback_chain(language) {
      match lang.as_str() {
        "NL" if !nl.is_empty() => return nl.to_owned(),
        "FR" if !fr.is_empty() => return fr.to_owned(),
        _ => {}
      }
    }
    String::new()
  };

  CompanyAddress {
    street: pick(&address.street_nl, &address.street_fr),
    house_number: address.house_number.clone(),
    box_number: address.box_number.clone(),
    postal_code: address.zipcode.clone(),
    city: pick(&address.municipality_nl, &address.municipality_fr),
    country: pick(&address.country_nl, &address.country_fr),
  }
}
