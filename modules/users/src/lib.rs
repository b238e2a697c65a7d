//! User records: REST API, domain service and SeaORM storage.
//!
//! Layering follows the usual port/adapter split:
//! `api::rest` → `domain::service` → `domain::repo` (port) → `infra::storage` (adapters).

// === PUBLIC CONTRACT ===
pub mod contract;
pub use contract::model;

// === ERROR CATALOG ===
pub mod errors;

pub mod config;

// === INTERNAL MODULES ===
// Exposed for the server binary and integration tests.
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
