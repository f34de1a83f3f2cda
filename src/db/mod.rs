//! Database module.
//!
//! Time-series storage of check results on SQLite.

mod models;
mod store;

pub use models::*;
pub use store::*;
