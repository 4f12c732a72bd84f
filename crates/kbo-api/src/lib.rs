//! JSON read API for the KBO store.
//!
//! Exposes an axum [`Router`] over a [`SqliteStore`]. Transport, TLS, and
//! process wiring are the caller's responsibility; every handler is a thin
//! translation onto the store's read planners.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = kbo_api::router(store.clone());
//! axum::serve(listener, app).await?;
//! ```

pub mod companies;
pub mod error;
pub mod search;

use axum::{Router, routing::get};
use kbo_store_sqlite::SqliteStore;

pub use error::ApiError;

/// Build the read-API router for `store`.
pub fn router(store: SqliteStore) -> Router<()> {
  Router::new()
    .route("/companies", get(companies::list))
    .route("/companies/search", get(search::handler))
    .route("/companies/{number}", get(companies::get_one))
    .with_state(store)
}
