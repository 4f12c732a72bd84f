//! Core types for the KBO registry store.
//!
//! This crate is deliberately free of database and HTTP dependencies.
//! All other crates depend on it; it depends on nothing heavier than serde.

pub mod code;
pub mod company;
pub mod document;
pub mod enterprise_number;
pub mod entity_number;
pub mod error;
pub mod event;

pub use code::{CodeCategory, Language};
pub use enterprise_number::EnterpriseNumber;
pub use error::{Error, Result};
