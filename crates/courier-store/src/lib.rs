//! # courier-store
//!
//! Durable local storage for the Courier client, backed by SQLite.
//!
//! The client persists exactly one thing across restarts: the session
//! token. It lives in a `credentials` table keyed by a fixed name so that
//! the schema can hold other named secrets later without a migration.

pub mod credentials;
pub mod database;
pub mod migrations;

mod error;

pub use credentials::Credential;
pub use database::Database;
pub use error::StoreError;
