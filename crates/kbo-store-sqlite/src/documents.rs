//! The company-document builder — regenerates the JSON read projection from
//! the relational tables, en masse after a full import or for an impacted
//! subset after an incremental one.
//!
//! Everything happens inside one immediate transaction. The payload is
//! assembled deterministically (fixed property order, sorted arrays, BTreeMap
//! language maps) so the ETag is stable across rebuilds of unchanged data.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use kbo_core::{
  EnterpriseNumber, Language,
  document::{
    ActivityEntry, AddressEntry, ChildUnit, CodeRef, CompanyPayload,
    ContactEntry, DenominationEntry, FtsFields, JSON_VERSION,
  },
};
use rusqlite::{Connection, Statement, TransactionBehavior, params};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::{Result, schema};

/// Which enterprises to regenerate.
#[derive(Debug, Clone)]
pub enum DocumentScope {
  /// Drop the projection and rebuild every enterprise.
  All,
  /// Regenerate (or remove) only these enterprise numbers.
  Subset(Vec<i64>),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentsOutcome {
  pub written:   u64,
  /// Documents removed because their enterprise no longer exists.
  pub removed:   u64,
  pub cancelled: bool,
}

/// Rebuild `company_document` for `scope` in one transaction.
///
/// Cancellation is checked between enterprises; a cancelled rebuild rolls
/// back entirely.
pub fn rebuild_documents(
  conn: &mut Connection,
  scope: &DocumentScope,
  source_import_id: Option<&str>,
  cancel: &CancellationToken,
  progress: &mut dyn FnMut(u64),
) -> Result<DocumentsOutcome> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut outcome = DocumentsOutcome::default();

  let targets: Vec<i64> = match scope {
    DocumentScope::All => {
      tx.execute_batch("DROP TABLE IF EXISTS company_document")?;
      tx.execute_batch(schema::COMPANY_DOCUMENT_DDL)?;
      let mut stmt =
        tx.prepare("SELECT enterprise_number FROM enterprise ORDER BY enterprise_number")?;
      let rows = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows
    }
    DocumentScope::Subset(numbers) => {
      tx.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS doc_scope (enterprise_number INTEGER PRIMARY KEY);
         DELETE FROM doc_scope;",
      )?;
      {
        let mut insert =
          tx.prepare("INSERT OR IGNORE INTO doc_scope (enterprise_number) VALUES (?1)")?;
        for n in numbers {
          insert.execute(params![n])?;
        }
      }
      // Enterprises that vanished take their document with them.
      outcome.removed = tx.execute(
        "DELETE FROM company_document
         WHERE enterprise_number IN (SELECT enterprise_number FROM doc_scope)
           AND enterprise_number NOT IN (SELECT enterprise_number FROM enterprise)",
        [],
      )? as u64;

      let mut stmt = tx.prepare(
        "SELECT e.enterprise_number FROM enterprise e
         JOIN doc_scope s ON s.enterprise_number = e.enterprise_number
         ORDER BY e.enterprise_number",
      )?;
      let rows = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows
    }
  };

  let updated_at = Utc::now().to_rfc3339();
  {
    let mut assembler = Assembler::prepare(&tx)?;
    let mut upsert = tx.prepare(
      "INSERT INTO company_document (
         enterprise_number, payload, json_version, etag, updated_at, source_import_id
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       ON CONFLICT (enterprise_number) DO UPDATE SET
         payload = excluded.payload,
         json_version = excluded.json_version,
         etag = excluded.etag,
         updated_at = excluded.updated_at,
         source_import_id = excluded.source_import_id",
    )?;

    for number in targets {
      if cancel.is_cancelled() {
        outcome.cancelled = true;
        return Ok(outcome);
      }

      let Some(payload) = assembler.assemble(number)? else {
        continue;
      };
      let json = payload.to_json()?;
      let etag = hex::encode(Sha256::digest(json.as_bytes()));

      upsert.execute(params![
        number,
        json,
        JSON_VERSION,
        etag,
        updated_at,
        source_import_id,
      ])?;
      outcome.written += 1;
      progress(outcome.written);
    }
  }

  tx.commit()?;
  Ok(outcome)
}

// ─── Assembly ────────────────────────────────────────────────────────────────

struct Assembler<'tx> {
  enterprise:     Statement<'tx>,
  code:           Statement<'tx>,
  denominations:  Statement<'tx>,
  addresses:      Statement<'tx>,
  contacts:       Statement<'tx>,
  activities:     Statement<'tx>,
  descriptions:   Statement<'tx>,
  establishments: Statement<'tx>,
  branches:       Statement<'tx>,
}

/// An activity joined to its NACE code, before description resolution.
struct RawActivity {
  activity_group: String,
  nace_category:  String,
  nace_code:      String,
  classification: String,
  nace_code_id:   i64,
}

impl<'tx> Assembler<'tx> {
  fn prepare(tx: &'tx rusqlite::Transaction<'_>) -> Result<Self> {
    Ok(Self {
      enterprise: tx.prepare(
        "SELECT juridical_situation_id, type_of_enterprise_id,
                juridical_form_id, juridical_form_cac_id, start_date
         FROM enterprise WHERE enterprise_number = ?1",
      )?,
      code: tx.prepare(
        "SELECT c.code_value, d.language, d.description
         FROM code c LEFT JOIN code_description d ON d.code_id = c.id
         WHERE c.id = ?1",
      )?,
      denominations: tx.prepare(
        "SELECT l.code_value, t.code_value, d.value
         FROM denomination d
         JOIN code l ON l.id = d.language_id
         JOIN code t ON t.id = d.type_of_denomination_id
         WHERE d.entity_number = ?1",
      )?,
      addresses: tx.prepare(
        "SELECT t.code_value, a.country_nl, a.country_fr, a.zipcode,
                a.municipality_nl, a.municipality_fr, a.street_nl, a.street_fr,
                a.house_number, a.box_number, a.extra_info, a.date_striking_off
         FROM address a
         JOIN code t ON t.id = a.type_of_address_id
         WHERE a.entity_number = ?1",
      )?,
      contacts: tx.prepare(
        "SELECT ec.code_value, ct.code_value, c.value
         FROM contact c
         JOIN code ec ON ec.id = c.entity_contact_id
         JOIN code ct ON ct.id = c.contact_type_id
         WHERE c.entity_number = ?1",
      )?,
      activities: tx.prepare(
        "SELECT g.code_value, n.category, n.code_value, cl.code_value, n.id
         FROM activity a
         JOIN code g ON g.id = a.activity_group_id
         JOIN code cl ON cl.id = a.classification_id
         JOIN code n ON n.id = a.nace_code_id
         WHERE a.entity_number = ?1",
      )?,
      descriptions: tx.prepare(
        "SELECT language, description FROM code_description WHERE code_id = ?1",
      )?,
      establishments: tx.prepare(
        "SELECT establishment_number, start_date FROM establishment
         WHERE enterprise_number = ?1 ORDER BY establishment_number",
      )?,
      branches: tx.prepare(
        "SELECT id, start_date FROM branch
         WHERE enterprise_number = ?1 ORDER BY id",
      )?,
    })
  }

  /// Build the payload for one enterprise; `None` if the row is gone.
  fn assemble(&mut self, number: i64) -> Result<Option<CompanyPayload>> {
    use rusqlite::OptionalExtension as _;

    let identity = self
      .enterprise
      .query_row(params![number], |r| {
        Ok((
          r.get::<_, i64>(0)?,
          r.get::<_, i64>(1)?,
          r.get::<_, Option<i64>>(2)?,
          r.get::<_, Option<i64>>(3)?,
          r.get::<_, Option<NaiveDate>>(4)?,
        ))
      })
      .optional()?;
    let Some((situation_id, type_id, form_id, form_cac_id, start_date)) = identity
    else {
      return Ok(None);
    };

    let enterprise_number = EnterpriseNumber::from_value(number)?;
    let entity_number = enterprise_number.format_dotted();

    let mut payload = CompanyPayload {
      enterprise_number: entity_number.clone(),
      start_date,
      juridical_situation: self.code_ref(situation_id)?,
      type_of_enterprise: self.code_ref(type_id)?,
      juridical_form: form_id.map(|id| self.code_ref(id)).transpose()?,
      juridical_form_cac: form_cac_id.map(|id| self.code_ref(id)).transpose()?,
      denominations: self.denominations_for(&entity_number)?,
      addresses: self.addresses_for(&entity_number)?,
      contacts: self.contacts_for(&entity_number)?,
      activities: self.activities_for(&entity_number)?,
      establishments: Vec::new(),
      branches: Vec::new(),
      fts: FtsFields::default(),
    };

    // Children carry their own names and first address; their activities
    // only feed the full-text fields.
    let mut child_activities = Vec::new();

    let child_rows = |stmt: &mut Statement<'_>| -> Result<Vec<(String, Option<NaiveDate>)>> {
      let rows = stmt
        .query_map(params![number], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    };

    let establishment_rows = child_rows(&mut self.establishments)?;
    let branch_rows = child_rows(&mut self.branches)?;

    for (child_number, child_start) in establishment_rows {
      let unit = self.child_unit(child_number, child_start, &mut child_activities)?;
      payload.establishments.push(unit);
    }
    for (child_number, child_start) in branch_rows {
      let unit = self.child_unit(child_number, child_start, &mut child_activities)?;
      payload.branches.push(unit);
    }

    payload.fts = fts_fields(&payload, &child_activities);
    payload.normalize();
    Ok(Some(payload))
  }

  fn child_unit(
    &mut self,
    number: String,
    start_date: Option<NaiveDate>,
    child_activities: &mut Vec<ActivityEntry>,
  ) -> Result<ChildUnit> {
    let denominations = self.denominations_for(&number)?;
    let mut addresses = self.addresses_for(&number)?;
    addresses.sort_by(|a, b| a.type_of_address.cmp(&b.type_of_address));
    child_activities.extend(self.activities_for(&number)?);

    Ok(ChildUnit {
      number,
      start_date,
      denominations,
      address: addresses.into_iter().next(),
    })
  }

  fn code_ref(&mut self, code_id: i64) -> Result<CodeRef> {
    let mut code_ref = CodeRef::default();
    let rows = self
      .code
      .query_map(params![code_id], |r| {
        Ok((
          r.get::<_, String>(0)?,
          r.get::<_, Option<String>>(1)?,
          r.get::<_, Option<String>>(2)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    for (code_value, language, description) in rows {
      code_ref.code = code_value;
      if let (Some(language), Some(description)) = (language, description) {
        code_ref.descriptions.insert(language, description);
      }
    }
    Ok(code_ref)
  }

  fn denominations_for(&mut self, entity_number: &str) -> Result<Vec<DenominationEntry>> {
    let rows = self
      .denominations
      .query_map(params![entity_number], |r| {
        Ok((
          r.get::<_, String>(0)?,
          r.get::<_, String>(1)?,
          r.get::<_, String>(2)?,
        ))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(
      rows
        .into_iter()
        .map(|(language_code, kind, value)| DenominationEntry {
          language: Language::from_code_value(&language_code)
            .map(Language::tag)
            .unwrap_or("UNKNOWN")
            .to_owned(),
          type_of_denomination: kind,
          value,
        })
        .collect(),
    )
  }

  fn addresses_for(&mut self, entity_number: &str) -> Result<Vec<AddressEntry>> {
    let rows = self
      .addresses
      .query_map(params![entity_number], |r| {
        Ok(AddressEntry {
          type_of_address:   r.get(0)?,
          country_nl:        r.get(1)?,
          country_fr:        r.get(2)?,
          zipcode:           r.get(3)?,
          municipality_nl:   r.get(4)?,
          municipality_fr:   r.get(5)?,
          street_nl:         r.get(6)?,
          street_fr:         r.get(7)?,
          house_number:      r.get(8)?,
          box_number:        r.get(9)?,
          extra_info:        r.get(10)?,
          date_striking_off: r.get(11)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn contacts_for(&mut self, entity_number: &str) -> Result<Vec<ContactEntry>> {
    let rows = self
      .contacts
      .query_map(params![entity_number], |r| {
        Ok(ContactEntry {
          entity_contact: r.get(0)?,
          contact_type:   r.get(1)?,
          value:          r.get(2)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn activities_for(&mut self, entity_number: &str) -> Result<Vec<ActivityEntry>> {
    let raw = self
      .activities
      .query_map(params![entity_number], |r| {
        Ok(RawActivity {
          activity_group: r.get(0)?,
          nace_category:  r.get(1)?,
          nace_code:      r.get(2)?,
          classification: r.get(3)?,
          nace_code_id:   r.get(4)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut entries = Vec::with_capacity(raw.len());
    for activity in raw {
      let descriptions = self
        .descriptions
        .query_map(params![activity.nace_code_id], |r| {
          Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<std::collections::BTreeMap<_, _>>>()?;
      entries.push(ActivityEntry {
        activity_group: activity.activity_group,
        nace_version: activity
          .nace_category
          .strip_prefix("Nace")
          .unwrap_or(&activity.nace_category)
          .to_owned(),
        nace_code: activity.nace_code,
        classification: activity.classification,
        descriptions,
      });
    }
    Ok(entries)
  }
}

// ─── Full-text fields ────────────────────────────────────────────────────────

/// Derive the flattened `fts` subtree from the assembled payload plus the
/// children's activities. Each field is a distinct-sorted, space-joined set
/// so rebuilds are deterministic.
fn fts_fields(payload: &CompanyPayload, child_activities: &[ActivityEntry]) -> FtsFields {
  let mut names = BTreeSet::new();
  let mut commercial = BTreeSet::new();
  let mut streets_nl = BTreeSet::new();
  let mut streets_fr = BTreeSet::new();
  let mut cities_nl = BTreeSet::new();
  let mut cities_fr = BTreeSet::new();
  let mut postals = BTreeSet::new();
  let mut act_nl = BTreeSet::new();
  let mut act_fr = BTreeSet::new();
  let mut act_de = BTreeSet::new();
  let mut act_en = BTreeSet::new();

  let mut add = |set: &mut BTreeSet<String>, value: &str| {
    if !value.is_empty() {
      set.insert(value.to_owned());
    }
  };

  let denominations = payload.denominations.iter().chain(
    payload
      .establishments
      .iter()
      .chain(payload.branches.iter())
      .flat_map(|c| c.denominations.iter()),
  );
  for d in denominations {
    match d.type_of_denomination.as_str() {
      "003" | "004" => add(&mut commercial, &d.value),
      _ => add(&mut names, &d.value),
    }
  }

  let addresses = payload.addresses.iter().chain(
    payload
      .establishments
      .iter()
      .chain(payload.branches.iter())
      .filter_map(|c| c.address.as_ref()),
  );
  for a in addresses {
    add(&mut streets_nl, &a.street_nl);
    add(&mut streets_fr, &a.street_fr);
    add(&mut cities_nl, &a.municipality_nl);
    add(&mut cities_fr, &a.municipality_fr);
    add(&mut postals, &a.zipcode);
  }

  for a in payload.activities.iter().chain(child_activities) {
    for (language, set) in [
      ("NL", &mut act_nl),
      ("FR", &mut act_fr),
      ("DE", &mut act_de),
      ("EN", &mut act_en),
    ] {
      if let Some(description) = a.descriptions.get(language) {
        if !description.is_empty() {
          set.insert(description.clone());
        }
      }
    }
  }

  let join = |set: BTreeSet<String>| set.into_iter().collect::<Vec<_>>().join(" ");

  FtsFields {
    company_name: join(names),
    commercial_name: join(commercial),
    street: kbo_core::document::LangPair { nl: join(streets_nl), fr: join(streets_fr) },
    city: kbo_core::document::LangPair { nl: join(cities_nl), fr: join(cities_fr) },
    postal_code: join(postals),
    activity: kbo_core::document::ActivityText {
      nl: join(act_nl),
      fr: join(act_fr),
      de: join(act_de),
      en: join(act_en),
    },
  }
}
