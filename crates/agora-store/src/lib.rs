//! # agora-store
//!
//! SQLite persistence for the Agora server. The crate exposes a synchronous
//! [`Database`] handle that wraps a `rusqlite::Connection` and provides typed
//! CRUD helpers for every domain model; migrations run before any other
//! operation.

pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
