//! SQLite backend for the Liqwik engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
