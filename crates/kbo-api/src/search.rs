//! Handler for `GET /companies/search` — the ranked free-text path.

use axum::{
  Json,
  extract::{Query, State},
};
use kbo_core::company::Company;
use kbo_store_sqlite::SqliteStore;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  /// Free-form query text; noise (dates, card numbers, short fragments) is
  /// stripped by the planner.
  pub q:        String,
  pub language: Option<String>,
  #[serde(default)]
  pub skip:     i64,
  #[serde(default = "default_take")]
  pub take:     i64,
}

fn default_take() -> i64 { 10 }

/// `GET /companies/search?q=…[&language=…][&skip=…][&take=…]`
pub async fn handler(
  State(store): State<SqliteStore>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Company>>, ApiError> {
  let companies = store
    .search_fulltext(params.q, params.language, params.skip, params.take)
    .await?;
  Ok(Json(companies))
}
