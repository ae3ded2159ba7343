//! SQLite persistence collaborator for the reconciliation engine.
//!
//! Implements [`romshelf_core::GameStore`] over rusqlite (bundled). Only
//! the slice of the collection schema the engine consumes lives here:
//! game records and the file locations that link content identities to
//! them. The wider CRUD backend owns the rest of the schema.

pub mod schema;
pub mod store;

pub use schema::{open_database, open_memory};
pub use store::SqliteStore;
