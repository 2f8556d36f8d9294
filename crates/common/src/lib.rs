//! Common utilities, types, and configuration shared across sqlyard crates.
//!
//! This crate contains the base building blocks for the sqlyard service:
//! - **Configuration**: Strongly typed application configuration (`config`).
//! - **Models**: Request/response shapes and the submission lifecycle record (`models`).
//! - **Telemetry**: Logging setup (`telemetry`).
pub mod config;
pub mod models;
pub mod telemetry;
