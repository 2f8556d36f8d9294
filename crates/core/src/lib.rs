//! The sqlyard execution core.
//!
//! Everything with real invariants lives here:
//! - **Cache keys** ([`cache::fingerprint`]): deterministic fingerprints over
//!   (database, normalized query, canonical parameters).
//! - **Result cache** ([`cache::ResultCache`]): capacity-bounded, TTL-aware,
//!   LRU-evicting store for read-query results.
//! - **Connection registry** ([`registry::ConnectionRegistry`]): one
//!   long-lived SQLite handle per database name, serialized per handle.
//! - **Execution coordinator** ([`engine::QueryEngine`]): async submission
//!   onto a bounded worker pool, lifecycle tracking in the result store.
//! - **Expiry sweeper** ([`sweeper::ExpirySweeper`]): background purge of
//!   expired cache entries.

pub mod cache;
pub mod engine;
pub mod extensions;
pub mod registry;
pub mod row;
pub mod store;
pub mod sweeper;

pub use cache::{fingerprint, CacheConfig, CacheStats, ResultCache};
pub use engine::{EngineOptions, QueryEngine};
pub use extensions::{discover_extensions, native_library_suffix, DiscoveredExtension};
pub use registry::{validate_db_name, ConnectionRegistry};
pub use row::{Row, SqlValue};
pub use store::ResultStore;
pub use sweeper::ExpirySweeper;
