//! Persistent audit storage for the CLI.

mod store;

pub use store::SqliteAuditSink;
