//! Document store with a single-flight template-resolving cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
