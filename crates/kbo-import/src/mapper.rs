//! Row mappers — validate one CSV record into one table row, resolving code
//! references through the [`CodeCache`].
//!
//! Mapping is total and deterministic: a row either produces its target or a
//! list of human-readable error strings; it never aborts the step. Rows that
//! fail are counted and skipped.

use kbo_core::{CodeCategory, EnterpriseNumber};
use kbo_csv::records::{
  ActivityRecord, AddressRecord, BranchRecord, ContactRecord,
  DenominationRecord, EnterpriseRecord, EstablishmentRecord,
};
use kbo_store_sqlite::bulk::{
  ActivityRow, AddressRow, BranchRow, ContactRow, DenominationRow,
  EnterpriseRow, EstablishmentRow,
};

use crate::cache::CodeCache;

/// A mapped row, or the reasons it was rejected.
pub type MapResult<T> = Result<T, Vec<String>>;

pub struct Mapper<'a> {
  cache: &'a CodeCache,
}

impl<'a> Mapper<'a> {
  pub fn new(cache: &'a CodeCache) -> Self { Self { cache } }

  fn resolve(
    &self,
    category: CodeCategory,
    code_value: &str,
    errors: &mut Vec<String>,
  ) -> Option<i64> {
    match self.cache.try_get(category, code_value) {
      Some(id) => Some(id),
      None => {
        errors.push(format!("unknown {} code {code_value:?}", category.as_str()));
        None
      }
    }
  }

  fn parse_number(value: &str, errors: &mut Vec<String>) -> Option<i64> {
    match EnterpriseNumber::parse(value) {
      Ok(n) => Some(n.value() as i64),
      Err(_) => {
        errors.push(format!("invalid enterprise number {value:?}"));
        None
      }
    }
  }

  pub fn enterprise(&self, record: &EnterpriseRecord) -> MapResult<EnterpriseRow> {
    let mut errors = Vec::new();

    let number = Self::parse_number(&record.enterprise_number, &mut errors);
    let situation = self.resolve(
      CodeCategory::JuridicalSituation,
      &record.juridical_situation,
      &mut errors,
    );
    let enterprise_type = self.resolve(
      CodeCategory::TypeOfEnterprise,
      &record.type_of_enterprise,
      &mut errors,
    );
    // Optional in the source; when present, resolution is required.
    let form = if record.juridical_form.is_empty() {
      None
    } else {
      self.resolve(CodeCategory::JuridicalForm, &record.juridical_form, &mut errors)
    };
    let form_cac = if record.juridical_form_cac.is_empty() {
      None
    } else {
      self.resolve(
        CodeCategory::JuridicalForm,
        &record.juridical_form_cac,
        &mut errors,
      )
    };

    if let (Some(number), Some(situation), Some(enterprise_type)) =
      (number, situation, enterprise_type)
      && errors.is_empty()
    {
      return Ok(EnterpriseRow {
        enterprise_number:      number,
        juridical_situation_id: situation,
        type_of_enterprise_id:  enterprise_type,
        juridical_form_id:      form,
        juridical_form_cac_id:  form_cac,
        start_date:             record.start_date,
      });
    }
    Err(errors)
  }

  /// Establishments carry no code references; only the owner's identifier
  /// is validated.
  pub fn establishment(
    &self,
    record: &EstablishmentRecord,
  ) -> MapResult<EstablishmentRow> {
    let mut errors = Vec::new();
    if record.establishment_number.is_empty() {
      errors.push("missing establishment number".to_owned());
    }
    let owner = Self::parse_number(&record.enterprise_number, &mut errors);

    if let Some(owner) = owner
      && errors.is_empty()
    {
      return Ok(EstablishmentRow {
        establishment_number: record.establishment_number.clone(),
        start_date:           record.start_date,
        enterprise_number:    owner,
      });
    }
    Err(errors)
  }

  pub fn branch(&self, record: &BranchRecord) -> MapResult<BranchRow> {
    let mut errors = Vec::new();
    if record.id.is_empty() {
      errors.push("missing branch id".to_owned());
    }
    let owner = Self::parse_number(&record.enterprise_number, &mut errors);

    if let Some(owner) = owner
      && errors.is_empty()
    {
      return Ok(BranchRow {
        id:                record.id.clone(),
        start_date:        record.start_date,
        enterprise_number: owner,
      });
    }
    Err(errors)
  }

  pub fn address(&self, record: &AddressRecord) -> MapResult<AddressRow> {
    let mut errors = Vec::new();
    let address_type = self.resolve(
      CodeCategory::TypeOfAddress,
      &record.type_of_address,
      &mut errors,
    );

    let Some(address_type) = address_type else {
      return Err(errors);
    };
    Ok(AddressRow {
      entity_number:      record.entity_number.clone(),
      type_of_address_id: address_type,
      country_nl:         record.country_nl.clone(),
      country_fr:         record.country_fr.clone(),
      zipcode:            record.zipcode.clone(),
      municipality_nl:    record.municipality_nl.clone(),
      municipality_fr:    record.municipality_fr.clone(),
      street_nl:          record.street_nl.clone(),
      street_fr:          record.street_fr.clone(),
      house_number:       record.house_number.clone(),
      box_number:         record.box_number.clone(),
      extra_info:         record.extra_info.clone(),
      date_striking_off:  record.date_striking_off,
    })
  }

  pub fn denomination(&self, record: &DenominationRecord) -> MapResult<DenominationRow> {
    let mut errors = Vec::new();
    let language = self.resolve(CodeCategory::Language, &record.language, &mut errors);
    let kind = self.resolve(
      CodeCategory::TypeOfDenomination,
      &record.type_of_denomination,
      &mut errors,
    );

    if let (Some(language), Some(kind)) = (language, kind) {
      return Ok(DenominationRow {
        entity_number:           record.entity_number.clone(),
        language_id:             language,
        type_of_denomination_id: kind,
        value:                   record.value.clone(),
      });
    }
    Err(errors)
  }

  pub fn contact(&self, record: &ContactRecord) -> MapResult<ContactRow> {
    let mut errors = Vec::new();
    let entity_contact = self.resolve(
      CodeCategory::EntityContact,
      &record.entity_contact,
      &mut errors,
    );
    let contact_type =
      self.resolve(CodeCategory::ContactType, &record.contact_type, &mut errors);

    if let (Some(entity_contact), Some(contact_type)) = (entity_contact, contact_type) {
      return Ok(ContactRow {
        entity_number:     record.entity_number.clone(),
        entity_contact_id: entity_contact,
        contact_type_id:   contact_type,
        value:             record.value.clone(),
      });
    }
    Err(errors)
  }

  pub fn activity(&self, record: &ActivityRecord) -> MapResult<ActivityRow> {
    let mut errors = Vec::new();
    let group = self.resolve(
      CodeCategory::ActivityGroup,
      &record.activity_group,
      &mut errors,
    );
    let classification = self.resolve(
      CodeCategory::Classification,
      &record.classification,
      &mut errors,
    );
    let nace = match CodeCategory::for_nace_version(&record.nace_version) {
      Some(category) => self.resolve(category, &record.nace_code, &mut errors),
      None => {
        errors.push(format!("unknown NACE version {:?}", record.nace_version));
        None
      }
    };

    if let (Some(group), Some(classification), Some(nace)) =
      (group, classification, nace)
    {
      return Ok(ActivityRow {
        entity_number:     record.entity_number.clone(),
        activity_group_id: group,
        classification_id: classification,
        nace_code_id:      nace,
      });
    }
    Err(errors)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cache_with(codes: &[(&str, &str)]) -> CodeCache {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE code (id INTEGER PRIMARY KEY AUTOINCREMENT,
                            category TEXT, code_value TEXT)",
      )
      .unwrap();
    for (category, value) in codes {
      conn
        .execute(
          "INSERT INTO code (category, code_value) VALUES (?1, ?2)",
          rusqlite::params![category, value],
        )
        .unwrap();
    }
    CodeCache::load(&conn).unwrap()
  }

  fn enterprise_record() -> EnterpriseRecord {
    EnterpriseRecord {
      enterprise_number:   "0403.199.702".into(),
      juridical_situation: "000".into(),
      type_of_enterprise:  "2".into(),
      juridical_form:      "".into(),
      juridical_form_cac:  "".into(),
      start_date:          None,
    }
  }

  #[test]
  fn maps_a_valid_enterprise() {
    let cache = cache_with(&[
      ("JuridicalSituation", "000"),
      ("TypeOfEnterprise", "2"),
    ]);
    let row = Mapper::new(&cache)
      .enterprise(&enterprise_record())
      .unwrap();
    assert_eq!(row.enterprise_number, 403_199_702);
    assert_eq!(row.juridical_form_id, None);
  }

  #[test]
  fn accumulates_all_errors() {
    let cache = cache_with(&[]);
    let mut record = enterprise_record();
    record.enterprise_number = "123".into();
    record.juridical_form = "014".into();

    let errors = Mapper::new(&cache).enterprise(&record).unwrap_err();
    // Bad identifier, two unresolved mandatory codes, one unresolved
    // optional-but-present code.
    assert_eq!(errors.len(), 4);
    assert!(errors[0].contains("invalid enterprise number"));
  }

  #[test]
  fn mapping_is_deterministic() {
    let cache = cache_with(&[("JuridicalSituation", "000")]);
    let mut record = enterprise_record();
    record.type_of_enterprise = "9".into();

    let mapper = Mapper::new(&cache);
    let a = mapper.enterprise(&record).unwrap_err();
    let b = mapper.enterprise(&record).unwrap_err();
    assert_eq!(a, b);
  }

  #[test]
  fn activity_requires_known_nace_version() {
    let cache = cache_with(&[
      ("ActivityGroup", "001"),
      ("Classification", "MAIN"),
      ("Nace2008", "62010"),
    ]);
    let mapper = Mapper::new(&cache);

    let record = ActivityRecord {
      entity_number:  "0403.199.702".into(),
      activity_group: "001".into(),
      nace_version:   "2008".into(),
      nace_code:      "62010".into(),
      classification: "MAIN".into(),
    };
    assert!(mapper.activity(&record).is_ok());

    let mut bad = record.clone();
    bad.nace_version = "1993".into();
    let errors = mapper.activity(&bad).unwrap_err();
    assert!(errors[0].contains("NACE version"));

    let mut wrong_table = record.clone();
    wrong_table.nace_version = "2025".into();
    // 62010 exists under Nace2008 only; the 2025 lookup must fail.
    assert!(mapper.activity(&wrong_table).is_err());
  }
}
