//! Integration tests for the store against an in-memory database: seed the
//! relational tables directly, rebuild the projections, and exercise the
//! read planners.

use kbo_core::EnterpriseNumber;
use tokio_util::sync::CancellationToken;

use crate::{
  SqliteStore, StructuredCriteria,
  bulk::{self, TableRow as _},
  documents::{self, DocumentScope},
  fts, locations,
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory().await.expect("in-memory store")
}

// ─── Seed helpers ────────────────────────────────────────────────────────────

/// Code ids the fixtures need, created once per test database.
#[derive(Debug, Clone, Copy)]
struct BaseCodes {
  lang_nl:          i64,
  lang_fr:          i64,
  denom_name:       i64,
  denom_commercial: i64,
  situation:        i64,
  enterprise_type:  i64,
  address_type:     i64,
  activity_group:   i64,
  classification:   i64,
  nace_software:    i64,
}

fn insert_code(
  conn: &rusqlite::Connection,
  category: &str,
  code_value: &str,
  descriptions: &[(&str, &str)],
) -> crate::Result<i64> {
  conn.execute(
    "INSERT INTO code (category, code_value) VALUES (?1, ?2)",
    rusqlite::params![category, code_value],
  )?;
  let code_id = conn.last_insert_rowid();
  for (language, description) in descriptions {
    conn.execute(
      "INSERT INTO code_description (code_id, language, description)
       VALUES (?1, ?2, ?3)",
      rusqlite::params![code_id, language, description],
    )?;
  }
  Ok(code_id)
}

fn base_codes(conn: &rusqlite::Connection) -> crate::Result<BaseCodes> {
  Ok(BaseCodes {
    lang_nl: insert_code(conn, "Language", "2", &[("NL", "Nederlands")])?,
    lang_fr: insert_code(conn, "Language", "1", &[("FR", "Français")])?,
    denom_name: insert_code(conn, "TypeOfDenomination", "001", &[])?,
    denom_commercial: insert_code(conn, "TypeOfDenomination", "003", &[])?,
    situation: insert_code(
      conn,
      "JuridicalSituation",
      "000",
      &[("NL", "Normale toestand"), ("FR", "Situation normale")],
    )?,
    enterprise_type: insert_code(
      conn,
      "TypeOfEnterprise",
      "2",
      &[("NL", "Rechtspersoon"), ("FR", "Personne morale")],
    )?,
    address_type: insert_code(conn, "TypeOfAddress", "REGO", &[("NL", "Maatschappelijke zetel")])?,
    activity_group: insert_code(conn, "ActivityGroup", "001", &[])?,
    classification: insert_code(conn, "Classification", "MAIN", &[])?,
    nace_software: insert_code(
      conn,
      "Nace2008",
      "62010",
      &[
        ("NL", "Ontwikkelen van computerprogramma's"),
        ("FR", "Programmation informatique"),
      ],
    )?,
  })
}

fn insert_enterprise(
  conn: &rusqlite::Connection,
  number: &str,
  codes: &BaseCodes,
) -> crate::Result<i64> {
  let value = EnterpriseNumber::parse(number)?.value() as i64;
  let row = bulk::EnterpriseRow {
    enterprise_number:      value,
    juridical_situation_id: codes.situation,
    type_of_enterprise_id:  codes.enterprise_type,
    juridical_form_id:      None,
    juridical_form_cac_id:  None,
    start_date:             chrono::NaiveDate::from_ymd_opt(1999, 3, 1),
  };
  let mut stmt = conn.prepare(bulk::EnterpriseRow::INSERT_SQL)?;
  row.insert(&mut stmt)?;
  Ok(value)
}

fn insert_denomination(
  conn: &rusqlite::Connection,
  entity_number: &str,
  language_id: i64,
  type_id: i64,
  value: &str,
) -> crate::Result<()> {
  let row = bulk::DenominationRow {
    entity_number:           entity_number.to_owned(),
    language_id,
    type_of_denomination_id: type_id,
    value:                   value.to_owned(),
  };
  let mut stmt = conn.prepare(bulk::DenominationRow::INSERT_SQL)?;
  row.insert(&mut stmt)?;
  Ok(())
}

#[allow(clippy::too_many_arguments)]
fn insert_address(
  conn: &rusqlite::Connection,
  entity_number: &str,
  type_id: i64,
  zipcode: &str,
  city_nl: &str,
  city_fr: &str,
  street_nl: &str,
  house_number: &str,
) -> crate::Result<()> {
  let row = bulk::AddressRow {
    entity_number: entity_number.to_owned(),
    type_of_address_id: type_id,
    country_nl: "België".to_owned(),
    country_fr: "Belgique".to_owned(),
    zipcode: zipcode.to_owned(),
    municipality_nl: city_nl.to_owned(),
    municipality_fr: city_fr.to_owned(),
    street_nl: street_nl.to_owned(),
    street_fr: street_nl.to_owned(),
    house_number: house_number.to_owned(),
    ..Default::default()
  };
  let mut stmt = conn.prepare(bulk::AddressRow::INSERT_SQL)?;
  row.insert(&mut stmt)?;
  Ok(())
}

fn insert_activity(
  conn: &rusqlite::Connection,
  entity_number: &str,
  codes: &BaseCodes,
) -> crate::Result<()> {
  let row = bulk::ActivityRow {
    entity_number:     entity_number.to_owned(),
    activity_group_id: codes.activity_group,
    classification_id: codes.classification,
    nace_code_id:      codes.nace_software,
  };
  let mut stmt = conn.prepare(bulk::ActivityRow::INSERT_SQL)?;
  row.insert(&mut stmt)?;
  Ok(())
}

fn rebuild_all(conn: &mut rusqlite::Connection) -> crate::Result<()> {
  let cancel = CancellationToken::new();
  documents::rebuild_documents(
    conn,
    &DocumentScope::All,
    None,
    &cancel,
    &mut |_| {},
  )?;
  locations::rebuild_locations(conn, &cancel)?;
  fts::rebuild_fts(conn, &cancel)?;
  Ok(())
}

/// Scenario-3 world: two enterprises named ALBERT HEIJN, one in 3500
/// Hasselt, one in 1000 Brussel.
const HASSELT: &str = "0403.199.702";
const BRUSSELS: &str = "0417.497.106";

async fn seed_albert_heijn(s: &SqliteStore) {
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    insert_enterprise(conn, HASSELT, &codes)?;
    insert_denomination(conn, HASSELT, codes.lang_nl, codes.denom_name, "ALBERT HEIJN")?;
    insert_address(
      conn, HASSELT, codes.address_type, "3500", "Hasselt", "Hasselt",
      "Koning Albertstraat", "16",
    )?;
    insert_activity(conn, HASSELT, &codes)?;

    insert_enterprise(conn, BRUSSELS, &codes)?;
    insert_denomination(conn, BRUSSELS, codes.lang_nl, codes.denom_name, "ALBERT HEIJN")?;
    insert_address(
      conn, BRUSSELS, codes.address_type, "1000", "Brussel", "Bruxelles",
      "Nieuwstraat", "111",
    )?;

    rebuild_all(conn)
  })
  .await
  .unwrap();
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn basic_lookup_projects_names() {
  let s = store().await;
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    insert_enterprise(conn, "0403.199.702", &codes)?;
    insert_denomination(conn, "0403.199.702", codes.lang_nl, codes.denom_name, "KBC GROEP")?;
    rebuild_all(conn)
  })
  .await
  .unwrap();

  let company = s
    .get_company(
      EnterpriseNumber::parse("0403.199.702").unwrap(),
      Some("NL".into()),
    )
    .await
    .unwrap()
    .unwrap();

  assert_eq!(company.enterprise_number, "0403.199.702");
  assert_eq!(company.names.len(), 1);
  assert_eq!(company.names[0].kind, "name");
  assert_eq!(company.names[0].name, "KBC GROEP");
  assert_eq!(company.juridical_situation.as_deref(), Some("Normale toestand"));
}

#[tokio::test]
async fn lookup_missing_company_is_none() {
  let s = store().await;
  let company = s
    .get_company(EnterpriseNumber::parse("0403.199.702").unwrap(), None)
    .await
    .unwrap();
  assert!(company.is_none());
}

#[tokio::test]
async fn language_fallback_chain_applies() {
  let s = store().await;
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    insert_enterprise(conn, "0403.199.702", &codes)?;
    // French denomination only; a request for EN walks NL → FR.
    insert_denomination(conn, "0403.199.702", codes.lang_fr, codes.denom_name, "GROUPE KBC")?;
    rebuild_all(conn)
  })
  .await
  .unwrap();

  let company = s
    .get_company(
      EnterpriseNumber::parse("0403.199.702").unwrap(),
      Some("EN".into()),
    )
    .await
    .unwrap()
    .unwrap();

  assert_eq!(company.names[0].name, "GROUPE KBC");
  // Descriptions fall back the same way.
  assert_eq!(company.juridical_situation.as_deref(), Some("Normale toestand"));
}

#[tokio::test]
async fn establishment_without_address_gets_empty_sentinel() {
  let s = store().await;
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    let owner = insert_enterprise(conn, "0403.199.702", &codes)?;
    let row = bulk::EstablishmentRow {
      establishment_number: "2.123.456.789".to_owned(),
      start_date:           None,
      enterprise_number:    owner,
    };
    let mut stmt = conn.prepare(bulk::EstablishmentRow::INSERT_SQL)?;
    row.insert(&mut stmt)?;
    drop(stmt);
    rebuild_all(conn)
  })
  .await
  .unwrap();

  let company = s
    .get_company(EnterpriseNumber::parse("0403.199.702").unwrap(), None)
    .await
    .unwrap()
    .unwrap();

  assert_eq!(company.establishments.len(), 1);
  assert_eq!(company.establishments[0].number, "2.123.456.789");
  assert_eq!(company.establishments[0].address.city, "");
  assert_eq!(company.establishments[0].address.street, "");
}

// ─── Document coverage and determinism ───────────────────────────────────────

#[tokio::test]
async fn every_enterprise_gets_exactly_one_document() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  assert_eq!(s.table_count("enterprise").await.unwrap(), 2);
  assert_eq!(s.table_count("company_document").await.unwrap(), 2);

  let missing: i64 = s
    .with_connection(|conn| {
      Ok(conn.query_row(
        "SELECT COUNT(*) FROM enterprise e
         WHERE NOT EXISTS (SELECT 1 FROM company_document d
                           WHERE d.enterprise_number = e.enterprise_number)",
        [],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(missing, 0);
}

#[tokio::test]
async fn rebuilding_unchanged_data_keeps_etags() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  async fn etags(s: &SqliteStore) -> Vec<(i64, String)> {
    s.with_connection(|conn| {
      let mut stmt = conn.prepare(
        "SELECT enterprise_number, etag FROM company_document ORDER BY enterprise_number",
      )?;
      let rows = stmt
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap()
  }

  let before = etags(&s).await;
  s.with_connection(rebuild_all).await.unwrap();
  let after = etags(&s).await;

  assert_eq!(before, after);
  assert_eq!(before.len(), 2);
}

#[tokio::test]
async fn changed_data_changes_the_etag() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  async fn etag_of(s: &SqliteStore, number: i64) -> String {
    s.with_connection(move |conn| {
      Ok(conn.query_row(
        "SELECT etag FROM company_document WHERE enterprise_number = ?1",
        rusqlite::params![number],
        |r| r.get::<_, String>(0),
      )?)
    })
    .await
    .unwrap()
  }

  let hasselt = EnterpriseNumber::parse(HASSELT).unwrap().value() as i64;
  let before = etag_of(&s, hasselt).await;

  s.with_connection(move |conn| {
    conn.execute(
      "DELETE FROM denomination WHERE entity_number = ?1",
      rusqlite::params![HASSELT],
    )?;
    let cancel = CancellationToken::new();
    documents::rebuild_documents(
      conn,
      &DocumentScope::Subset(vec![hasselt]),
      None,
      &cancel,
      &mut |_| {},
    )?;
    fts::rebuild_fts(conn, &cancel)?;
    Ok(())
  })
  .await
  .unwrap();

  let after = etag_of(&s, hasselt).await;
  assert_ne!(before, after);

  // Still retrievable by identifier, but gone from free-text results.
  let company = s
    .get_company(EnterpriseNumber::parse(HASSELT).unwrap(), None)
    .await
    .unwrap()
    .unwrap();
  assert!(company.names.is_empty());

  let hits = s
    .search_fulltext("albert".into(), None, 0, 10)
    .await
    .unwrap();
  assert!(hits.iter().all(|c| c.enterprise_number != HASSELT));
}

// ─── FTS alignment ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fts_and_map_rows_align() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  let (fts_rows, map_rows, ordered) = s
    .with_connection(|conn| {
      let fts_rows: i64 =
        conn.query_row("SELECT COUNT(rowid) FROM company_fts", [], |r| r.get(0))?;
      let map_rows: i64 =
        conn.query_row("SELECT COUNT(*) FROM company_fts_map", [], |r| r.get(0))?;
      let mut stmt = conn.prepare(
        "SELECT enterprise_number FROM company_fts_map ORDER BY rowid",
      )?;
      let ordered = stmt
        .query_map([], |r| r.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok((fts_rows, map_rows, ordered))
    })
    .await
    .unwrap();

  assert_eq!(fts_rows, map_rows);
  let mut sorted = ordered.clone();
  sorted.sort_unstable();
  assert_eq!(ordered, sorted, "map row ids must follow enterprise order");
}

// ─── Free-text search ────────────────────────────────────────────────────────

#[tokio::test]
async fn postal_code_and_city_rank_the_right_branch_first() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  let hits = s
    .search_fulltext("albert heijn 3500 hasselt".into(), Some("NL".into()), 0, 10)
    .await
    .unwrap();

  assert_eq!(hits.len(), 2);
  assert_eq!(hits[0].enterprise_number, HASSELT);
  assert_eq!(hits[1].enterprise_number, BRUSSELS);
}

#[tokio::test]
async fn bank_statement_noise_is_stripped() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  let hits = s
    .search_fulltext(
      "Betaling Bancontact 29/03/25 ALBERT HEIJN 3500 HASS - HASSELT \
       Kaartnummer 5229 62XX XXXX 0390"
        .into(),
      Some("NL".into()),
      0,
      10,
    )
    .await
    .unwrap();

  assert!(!hits.is_empty());
  assert_eq!(hits[0].enterprise_number, HASSELT);
}

#[tokio::test]
async fn empty_query_returns_no_results() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  for query in ["", "a 1 12 123", "29/03/25 + ..."] {
    let hits = s
      .search_fulltext(query.into(), None, 0, 10)
      .await
      .unwrap();
    assert!(hits.is_empty(), "query {query:?} should match nothing");
  }
}

#[tokio::test]
async fn activity_descriptions_are_searchable() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  // Only the Hasselt enterprise has the software-development activity.
  let hits = s
    .search_fulltext("programmation".into(), Some("FR".into()), 0, 10)
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].enterprise_number, HASSELT);
}

#[tokio::test]
async fn higher_weighted_column_outranks_lower() {
  let s = store().await;
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    // One enterprise carries the token in its name (weight 5.0), the other
    // in its street (weight 1.0).
    insert_enterprise(conn, "0203.201.340", &codes)?;
    insert_address(
      conn, "0203.201.340", codes.address_type, "2000", "Antwerpen",
      "Anvers", "Zilverberk", "1",
    )?;

    insert_enterprise(conn, "0401.574.852", &codes)?;
    insert_denomination(conn, "0401.574.852", codes.lang_nl, codes.denom_name, "ZILVERBERK")?;
    rebuild_all(conn)
  })
  .await
  .unwrap();

  let hits = s
    .search_fulltext("zilverberk".into(), None, 0, 10)
    .await
    .unwrap();
  assert_eq!(hits.len(), 2);
  assert_eq!(hits[0].enterprise_number, "0401.574.852");
}

#[tokio::test]
async fn take_is_clamped() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  let hits = s
    .search_fulltext("albert".into(), None, 0, 10_000)
    .await
    .unwrap();
  assert!(hits.len() <= 25);

  let none = s
    .search_fulltext("albert".into(), None, 0, -3)
    .await
    .unwrap();
  assert!(none.is_empty());
}

// ─── Structured search ───────────────────────────────────────────────────────

#[tokio::test]
async fn structured_search_composes_criteria() {
  let s = store().await;
  seed_albert_heijn(&s).await;

  let hits = s
    .search_structured(
      StructuredCriteria {
        name: Some("albert".into()),
        city: Some("hasselt".into()),
        ..Default::default()
      },
      Some("NL".into()),
      0,
      10,
    )
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].enterprise_number, HASSELT);

  let by_name_only = s
    .search_structured(
      StructuredCriteria { name: Some("ALBERT".into()), ..Default::default() },
      None,
      0,
      10,
    )
    .await
    .unwrap();
  assert_eq!(by_name_only.len(), 2);

  let empty = s
    .search_structured(StructuredCriteria::default(), None, 0, 10)
    .await
    .unwrap();
  assert!(empty.is_empty());
}

// ─── Bulk helpers ────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_table_preserves_indexes() {
  let s = store().await;
  s.with_connection(|conn| {
    bulk::reset_table(conn, "code")?;
    // The unique (category, code_value) index must survive the reset.
    insert_code(conn, "Language", "2", &[])?;
    let dup = conn.execute(
      "INSERT INTO code (category, code_value) VALUES ('Language', '2')",
      [],
    );
    assert!(dup.is_err(), "unique index should have been recreated");
    Ok(())
  })
  .await
  .unwrap();
}

#[tokio::test]
async fn reset_unknown_table_is_schema_mismatch() {
  let s = store().await;
  let err = s
    .with_connection(|conn| bulk::reset_table(conn, "no_such_table"))
    .await
    .unwrap_err();
  assert!(matches!(err, crate::Error::SchemaMismatch(_)));
}

#[tokio::test]
async fn delete_by_key_uses_single_statement_semantics() {
  let s = store().await;
  s.with_connection(|conn| {
    let codes = base_codes(conn)?;
    insert_denomination(conn, "0403.199.702", codes.lang_nl, codes.denom_name, "A")?;
    insert_denomination(conn, "0417.497.106", codes.lang_nl, codes.denom_name, "B")?;
    insert_denomination(conn, "2.123.456.789", codes.lang_nl, codes.denom_name, "C")?;

    let deleted = bulk::delete_by_text_key(
      conn,
      "denomination",
      "entity_number",
      &["0403.199.702".to_owned(), "2.123.456.789".to_owned()],
    )?;
    assert_eq!(deleted, 2);

    let left: i64 =
      conn.query_row("SELECT COUNT(*) FROM denomination", [], |r| r.get(0))?;
    assert_eq!(left, 1);
    Ok(())
  })
  .await
  .unwrap();
}
