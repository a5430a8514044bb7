//! Parlor Store — PostgreSQL implementation of the store seams.

mod pg_store;

pub use pg_store::PgStore;
