//! End-to-end pipeline tests: CSV fixtures on disk, an in-memory store, and
//! a collector task draining the event channel.

use std::{fs, path::Path};

use kbo_core::{EnterpriseNumber, event::PipelineEvent};
use kbo_import::{Error, ImportStep, Importer, Reporter};
use kbo_store_sqlite::SqliteStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const HASSELT: &str = "0403.199.702";
const BRUSSELS: &str = "0417.497.106";

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn write_file(dir: &Path, name: &str, content: &str) {
  fs::write(dir.join(name), content).unwrap();
}

fn write_code_csv(dir: &Path, situation_nl: &str, with_language_fr: bool) {
  let mut rows = String::from("Category,Code,Language,Description\n");
  if with_language_fr {
    rows.push_str("Language,1,FR,Frans\n");
  }
  rows.push_str("Language,2,NL,Nederlands\n");
  rows.push_str("TypeOfDenomination,001,NL,Naam\n");
  rows.push_str(&format!("JuridicalSituation,000,NL,{situation_nl}\n"));
  rows.push_str("JuridicalSituation,000,FR,Situation normale\n");
  rows.push_str("TypeOfEnterprise,2,NL,Rechtspersoon\n");
  rows.push_str("TypeOfAddress,REGO,NL,Maatschappelijke zetel\n");
  rows.push_str("ActivityGroup,001,NL,Activiteiten\n");
  rows.push_str("Classification,MAIN,NL,Hoofdactiviteit\n");
  rows.push_str("Nace2008,62010,NL,Ontwikkelen van computerprogramma's\n");
  rows.push_str("Nace2008,62010,FR,Programmation informatique\n");
  rows.push_str("EntityContact,ENT,NL,Onderneming\n");
  rows.push_str("ContactType,TEL,NL,Telefoon\n");
  write_file(dir, "code.csv", &rows);
}

/// The full monthly bundle — except `branch.csv`, which is deliberately
/// absent to exercise the missing-file path.
fn full_bundle(dir: &Path, denomination_rows: usize) {
  write_file(dir, "meta.csv", "Variable,Value\nSnapshotDate,01-06-2025\nExtractNumber,140\n");
  write_code_csv(dir, "Normale toestand", true);
  write_file(
    dir,
    "enterprise.csv",
    "EnterpriseNumber,JuridicalSituation,TypeOfEnterprise,JuridicalForm,JuridicalFormCAC,StartDate\n\
     0403.199.702,000,2,,,09-01-1935\n\
     0417.497.106,000,2,,,12-12-1968\n",
  );
  write_file(
    dir,
    "establishment.csv",
    "EstablishmentNumber,StartDate,EnterpriseNumber\n\
     2.123.456.789,01-01-2000,0403.199.702\n",
  );
  write_file(
    dir,
    "address.csv",
    "EntityNumber,TypeOfAddress,CountryNL,CountryFR,Zipcode,MunicipalityNL,MunicipalityFR,StreetNL,StreetFR,HouseNumber,Box,ExtraAddressInfo,DateStrikingOff\n\
     0403.199.702,REGO,,,3500,Hasselt,Hasselt,Koning Albertstraat,Rue Albert,16,,,\n\
     0417.497.106,REGO,,,1000,Brussel,Bruxelles,Nieuwstraat,Rue Neuve,111,,,\n\
     2.123.456.789,REGO,,,3500,Hasselt,Hasselt,Demerstraat,Rue du Demer,1,,,\n",
  );

  let mut denominations =
    String::from("EntityNumber,Language,TypeOfDenomination,Denomination\n");
  denominations.push_str("0403.199.702,2,001,ALBERT HEIJN\n");
  denominations.push_str("0417.497.106,2,001,ALBERT HEIJN\n");
  for i in 2..denomination_rows {
    denominations.push_str(&format!("0403.199.702,2,001,HANDELSNAAM {i}\n"));
  }
  write_file(dir, "denomination.csv", &denominations);

  write_file(
    dir,
    "contact.csv",
    "EntityNumber,EntityContact,ContactType,Value\n0403.199.702,ENT,TEL,011223344\n",
  );
  write_file(
    dir,
    "activity.csv",
    "EntityNumber,ActivityGroup,NaceVersion,NaceCode,Classification\n\
     0403.199.702,001,2008,62010,MAIN\n",
  );
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Run {
  store:     SqliteStore,
  importer:  Importer,
  collector: JoinHandle<Vec<PipelineEvent>>,
}

/// Spawn a collector; `on_event` runs for every received event (used by the
/// cancellation test to pull the trigger mid-step).
async fn run_harness(
  on_event: impl Fn(&PipelineEvent) + Send + 'static,
) -> Run {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let (reporter, mut rx) = Reporter::channel();
  let collector = tokio::spawn(async move {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
      on_event(&event);
      events.push(event);
    }
    events
  });
  let importer = Importer::new(store.clone(), reporter);
  Run { store, importer, collector }
}

fn planned_labels(events: &[PipelineEvent]) -> Vec<String> {
  events
    .iter()
    .filter_map(|e| match e {
      PipelineEvent::TaskPlanned { label, .. } => Some(label.clone()),
      _ => None,
    })
    .collect()
}

fn completed(events: &[PipelineEvent], label: &str) -> Option<(u64, u64, i64, bool)> {
  events.iter().find_map(|e| match e {
    PipelineEvent::TaskCompleted { label: l, imported, deleted, errors, cancelled, .. }
      if l == label =>
    {
      Some((*imported, *deleted, *errors, *cancelled))
    }
    _ => None,
  })
}

// ─── Full import ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_import_builds_documents_and_serves_search() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  let summary = run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap();
  drop(run.importer);
  let events = run.collector.await.unwrap();

  assert!(!summary.cancelled);
  assert_eq!(run.store.table_count("enterprise").await.unwrap(), 2);
  assert_eq!(run.store.table_count("company_document").await.unwrap(), 2);
  assert_eq!(run.store.table_count("company_fts_map").await.unwrap(), 2);

  // Event stream shape: Plan first, Completed last, every step planned in
  // the declared order before it completes.
  assert!(matches!(events.first(), Some(PipelineEvent::Plan { tasks, .. }) if tasks.len() == 12));
  assert!(matches!(events.last(), Some(PipelineEvent::Completed { cancelled: false, .. })));
  let labels = planned_labels(&events);
  let expected: Vec<String> = ImportStep::FULL_ORDER
    .iter()
    .map(|s| s.label().to_owned())
    .collect();
  assert_eq!(labels, expected);
  for label in &labels {
    let planned = events
      .iter()
      .position(|e| {
        matches!(e, PipelineEvent::TaskPlanned { label: l, .. } if l == label)
      })
      .unwrap();
    let done = events
      .iter()
      .position(|e| {
        matches!(e, PipelineEvent::TaskCompleted { label: l, .. } if l == label)
      })
      .unwrap();
    assert!(planned < done, "{label} completed before it was planned");
  }

  // branch.csv is absent: warned, reported as -1, run continued.
  assert_eq!(completed(&events, "ImportBranches").unwrap().2, -1);
  assert_eq!(summary.errors, 0);

  // Lookup end to end.
  let company = run
    .store
    .get_company(EnterpriseNumber::parse(HASSELT).unwrap(), Some("NL".into()))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(company.names[0].name, "ALBERT HEIJN");
  assert_eq!(company.establishments.len(), 1);
  assert_eq!(company.establishments[0].address.city, "Hasselt");

  // Ranked search end to end.
  let hits = run
    .store
    .search_fulltext("albert heijn 3500 hasselt".into(), Some("NL".into()), 0, 10)
    .await
    .unwrap();
  assert_eq!(hits[0].enterprise_number, HASSELT);

  // The documents carry the snapshot's extract number.
  let import_id: Option<String> = run
    .store
    .with_connection(|conn| {
      Ok(conn.query_row(
        "SELECT source_import_id FROM company_document LIMIT 1",
        [],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(import_id.as_deref(), Some("140"));
}

#[tokio::test]
async fn full_import_requires_empty_store() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap();

  let err = run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotEmpty));
}

#[tokio::test]
async fn limit_caps_rows_per_file() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .full_import(dir.path(), false, Some(1), &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(run.store.table_count("enterprise").await.unwrap(), 1);
  assert_eq!(run.store.table_count("company_document").await.unwrap(), 1);
}

// ─── Incremental ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn incremental_delete_rebuilds_only_impacted_documents() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap();

  let hasselt = EnterpriseNumber::parse(HASSELT).unwrap().value() as i64;
  let etag_before = etag_of(&run.store, hasselt).await;
  let brussels = EnterpriseNumber::parse(BRUSSELS).unwrap().value() as i64;
  let brussels_updated_before = updated_at_of(&run.store, brussels).await;

  // The update bundle removes the Hasselt name and adds nothing back.
  let update = tempfile::tempdir().unwrap();
  write_file(
    update.path(),
    "denomination_delete.csv",
    "EntityNumber\n0403.199.702\n",
  );
  write_file(
    update.path(),
    "denomination_insert.csv",
    "EntityNumber,Language,TypeOfDenomination,Denomination\n",
  );

  let summary = run
    .importer
    .full_import(update.path(), true, None, &CancellationToken::new())
    .await
    .unwrap();
  assert!(!summary.cancelled);

  // Only the Brussels row still carries the name.
  assert_eq!(run.store.table_count("denomination").await.unwrap(), 1);

  // Hasselt: gone from free-text results, still retrievable by number, new
  // ETag. Brussels: untouched by the subset rebuild.
  let hits = run
    .store
    .search_fulltext("albert".into(), None, 0, 10)
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].enterprise_number, BRUSSELS);

  let company = run
    .store
    .get_company(EnterpriseNumber::parse(HASSELT).unwrap(), None)
    .await
    .unwrap()
    .unwrap();
  assert!(company.names.is_empty());

  assert_ne!(etag_of(&run.store, hasselt).await, etag_before);
  assert_eq!(updated_at_of(&run.store, brussels).await, brussels_updated_before);
}

async fn etag_of(store: &SqliteStore, number: i64) -> String {
  store
    .with_connection(move |conn| {
      Ok(conn.query_row(
        "SELECT etag FROM company_document WHERE enterprise_number = ?1",
        rusqlite::params![number],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

async fn updated_at_of(store: &SqliteStore, number: i64) -> String {
  store
    .with_connection(move |conn| {
      Ok(conn.query_row(
        "SELECT updated_at FROM company_document WHERE enterprise_number = ?1",
        rusqlite::params![number],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_rolls_back_the_running_step() {
  let dir = tempfile::tempdir().unwrap();
  // A denomination file large enough that cancellation lands mid-loop.
  full_bundle(dir.path(), 20_000);

  let token = CancellationToken::new();
  let trigger = token.clone();
  let run = run_harness(move |event| {
    if let PipelineEvent::Progress { label, .. } = event
      && label == "ImportDenominations"
    {
      trigger.cancel();
    }
  })
  .await;

  let summary = run
    .importer
    .full_import(dir.path(), false, None, &token)
    .await
    .unwrap();
  drop(run.importer);
  let events = run.collector.await.unwrap();

  assert!(summary.cancelled);

  // The cancelled step rolled back: no denominations at all. Previously
  // committed steps persist.
  assert_eq!(run.store.table_count("denomination").await.unwrap(), 0);
  assert_eq!(run.store.table_count("address").await.unwrap(), 3);

  let (_, _, _, cancelled) = completed(&events, "ImportDenominations").unwrap();
  assert!(cancelled);

  // Nothing after the cancelled step was planned.
  let labels = planned_labels(&events);
  assert_eq!(labels.last().map(String::as_str), Some("ImportDenominations"));
  assert!(matches!(
    events.last(),
    Some(PipelineEvent::Completed { cancelled: true, .. })
  ));
}

// ─── Rebuild and subsets ─────────────────────────────────────────────────────

#[tokio::test]
async fn rebuild_cache_restores_dropped_projections() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap();

  run
    .store
    .with_connection(|conn| {
      conn.execute_batch(
        "DROP TABLE company_fts; DROP TABLE company_fts_map;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  run
    .importer
    .rebuild_cache(false, true, &CancellationToken::new())
    .await
    .unwrap();

  let hits = run
    .store
    .search_fulltext("albert".into(), None, 0, 10)
    .await
    .unwrap();
  assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn import_files_subset_still_derives_projections() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .import_files(
      dir.path(),
      &[ImportStep::Meta, ImportStep::Codes, ImportStep::Enterprises],
      false,
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(run.store.table_count("enterprise").await.unwrap(), 2);
  assert_eq!(run.store.table_count("denomination").await.unwrap(), 0);
  // The derivation steps ran over what was loaded.
  assert_eq!(run.store.table_count("company_document").await.unwrap(), 2);
}

#[tokio::test]
async fn codes_step_reconciles_changed_and_vanished_codes() {
  let dir = tempfile::tempdir().unwrap();
  full_bundle(dir.path(), 2);

  let run = run_harness(|_| {}).await;
  run
    .importer
    .full_import(dir.path(), false, None, &CancellationToken::new())
    .await
    .unwrap();

  // New reference file: one description changed, the (unreferenced) French
  // language code dropped.
  let update = tempfile::tempdir().unwrap();
  write_code_csv(update.path(), "Gewijzigde toestand", false);

  run
    .importer
    .import_files(
      update.path(),
      &[ImportStep::Codes],
      true,
      None,
      &CancellationToken::new(),
    )
    .await
    .unwrap();

  let (description, fr_count) = run
    .store
    .with_connection(|conn| {
      let description: String = conn.query_row(
        "SELECT d.description FROM code_description d
         JOIN code c ON c.id = d.code_id
         WHERE c.category = 'JuridicalSituation' AND c.code_value = '000'
           AND d.language = 'NL'",
        [],
        |r| r.get(0),
      )?;
      let fr_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM code WHERE category = 'Language' AND code_value = '1'",
        [],
        |r| r.get(0),
      )?;
      Ok((description, fr_count))
    })
    .await
    .unwrap();

  assert_eq!(description, "Gewijzigde toestand");
  assert_eq!(fr_count, 0);
}
