//! Persistence layer (§3 "Data model", §5 "Database concurrency").
//!
//! A thin wrapper around `sqlx`'s Postgres pool: connection setup, a
//! `SERIALIZABLE`-transaction-with-retry helper (every mutation in §3
//! happens inside one such transaction), an advisory-lock helper for
//! the loader's single-writer-per-tenant guarantee (§4.1 "exit code 2
//! if an advisory lock cannot be acquired"), and one query module per
//! entity. Queries are written against `sqlx::query_as` rather than the
//! `query_as!` compile-time macro, since there is no live database to
//! check them against at build time.

pub mod advisory;
pub mod build;
pub mod package;
pub mod pool;
pub mod repository;
pub mod service;
pub mod tenant;
pub mod tx;

pub use advisory::{release_advisory_lock, try_advisory_lock};
pub use pool::{DbConfig, connect};
pub use tx::serializable_transaction;

pub type Db = sqlx::PgPool;
