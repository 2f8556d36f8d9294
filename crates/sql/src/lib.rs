//! SQL dialect tooling for sqlyard.
//!
//! Pure, stateless text transforms over SQL statements: dialect-to-dialect
//! conversion and normalization. Parsing is delegated to `sqlparser`; no
//! execution state is held here.

mod dialect;

pub use dialect::{optimize, resolve_dialect, transpile};
