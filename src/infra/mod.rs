//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod telemetry;
pub mod templates;
