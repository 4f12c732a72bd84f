//! Handlers for `/companies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/companies/{number}` | 400 on a malformed number, 404 if unknown |
//! | `GET`  | `/companies` | Structured `LIKE` search over optional criteria |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use kbo_core::{EnterpriseNumber, company::Company};
use kbo_store_sqlite::{SqliteStore, StructuredCriteria};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct LanguageParam {
  pub language: Option<String>,
}

/// `GET /companies/{number}[?language=nl]`
pub async fn get_one(
  State(store): State<SqliteStore>,
  Path(number): Path<String>,
  Query(params): Query<LanguageParam>,
) -> Result<Json<Company>, ApiError> {
  let number = EnterpriseNumber::parse(&number)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let company = store
    .get_company(number, params.language)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("company {number} not found")))?;
  Ok(Json(company))
}

// ─── Structured search ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub name:         Option<String>,
  pub street:       Option<String>,
  pub house_number: Option<String>,
  pub postal_code:  Option<String>,
  pub city:         Option<String>,
  pub language:     Option<String>,
  #[serde(default)]
  pub skip:         i64,
  #[serde(default = "default_take")]
  pub take:         i64,
}

fn default_take() -> i64 { 10 }

/// `GET /companies[?name=…][&street=…][&postal_code=…][&city=…]`
pub async fn list(
  State(store): State<SqliteStore>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Company>>, ApiError> {
  let criteria = StructuredCriteria {
    name:         params.name,
    street:       params.street,
    house_number: params.house_number,
    postal_code:  params.postal_code,
    city:         params.city,
  };
  if criteria.is_empty() {
    return Err(ApiError::BadRequest(
      "at least one search criterion is required".to_owned(),
    ));
  }

  let companies = store
    .search_structured(criteria, params.language, params.skip, params.take)
    .await?;
  Ok(Json(companies))
}
