//! One record type per source file, field names matching the official
//! column headers. Text fields decode the empty string as-is; date fields
//! decode it as `None`.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::date;

/// `meta.csv` — snapshot metadata (extract timestamp, version, …).
#[derive(Debug, Clone, Deserialize)]
pub struct MetaRecord {
  #[serde(rename = "Variable")]
  pub variable: String,
  #[serde(rename = "Value")]
  pub value: String,
}

/// `code.csv` — one row per (category, code, language) description.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeRecord {
  #[serde(rename = "Category")]
  pub category: String,
  #[serde(rename = "Code")]
  pub code: String,
  #[serde(rename = "Language")]
  pub language: String,
  #[serde(rename = "Description")]
  pub description: String,
}

/// `enterprise.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnterpriseRecord {
  #[serde(rename = "EnterpriseNumber")]
  pub enterprise_number: String,
  #[serde(rename = "JuridicalSituation")]
  pub juridical_situation: String,
  #[serde(rename = "TypeOfEnterprise")]
  pub type_of_enterprise: String,
  #[serde(rename = "JuridicalForm", default)]
  pub juridical_form: String,
  #[serde(rename = "JuridicalFormCAC", default)]
  pub juridical_form_cac: String,
  #[serde(rename = "StartDate", deserialize_with = "date::optional", default)]
  pub start_date: Option<NaiveDate>,
}

/// `establishment.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct EstablishmentRecord {
  #[serde(rename = "EstablishmentNumber")]
  pub establishment_number: String,
  #[serde(rename = "StartDate", deserialize_with = "date::optional", default)]
  pub start_date: Option<NaiveDate>,
  #[serde(rename = "EnterpriseNumber")]
  pub enterprise_number: String,
}

/// `branch.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchRecord {
  #[serde(rename = "Id")]
  pub id: String,
  #[serde(rename = "StartDate", deserialize_with = "date::optional", default)]
  pub start_date: Option<NaiveDate>,
  #[serde(rename = "EnterpriseNumber")]
  pub enterprise_number: String,
}

/// `address.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressRecord {
  #[serde(rename = "EntityNumber")]
  pub entity_number: String,
  #[serde(rename = "TypeOfAddress")]
  pub type_of_address: String,
  #[serde(rename = "CountryNL", default)]
  pub country_nl: String,
  #[serde(rename = "CountryFR", default)]
  pub country_fr: String,
  #[serde(rename = "Zipcode", default)]
  pub zipcode: String,
  #[serde(rename = "MunicipalityNL", default)]
  pub municipality_nl: String,
  #[serde(rename = "MunicipalityFR", default)]
  pub municipality_fr: String,
  #[serde(rename = "StreetNL", default)]
  pub street_nl: String,
  #[serde(rename = "StreetFR", default)]
  pub street_fr: String,
  #[serde(rename = "HouseNumber", default)]
  pub house_number: String,
  #[serde(rename = "Box", default)]
  pub box_number: String,
  #[serde(rename = "ExtraAddressInfo", default)]
  pub extra_info: String,
  #[serde(
    rename = "DateStrikingOff",
    deserialize_with = "date::optional",
    default
  )]
  pub date_striking_off: Option<NaiveDate>,
}

/// `denomination.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct DenominationRecord {
  #[serde(rename = "EntityNumber")]
  pub entity_number: String,
  #[serde(rename = "Language")]
  pub language: String,
  #[serde(rename = "TypeOfDenomination")]
  pub type_of_denomination: String,
  #[serde(rename = "Denomination")]
  pub value: String,
}

/// `contact.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRecord {
  #[serde(rename = "EntityNumber")]
  pub entity_number: String,
  #[serde(rename = "EntityContact")]
  pub entity_contact: String,
  #[serde(rename = "ContactType")]
  pub contact_type: String,
  #[serde(rename = "Value")]
  pub value: String,
}

/// `activity.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRecord {
  #[serde(rename = "EntityNumber")]
  pub entity_number: String,
  #[serde(rename = "ActivityGroup")]
  pub activity_group: String,
  #[serde(rename = "NaceVersion")]
  pub nace_version: String,
  #[serde(rename = "NaceCode")]
  pub nace_code: String,
  #[serde(rename = "Classification")]
  pub classification: String,
}
