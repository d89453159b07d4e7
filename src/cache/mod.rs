//! Document resolution cache.
//!
//! Documents are addressed by id or by name ([`DocumentKey`]); the two
//! addressings are separate entries. Misses go through a [`DocumentLoader`]
//! that reads the store and attaches the fetched template. Concurrent misses
//! on one key share a single load.
//!
//! ```toml
//! [cache]
//! capacity = 1000
//! load_timeout_ms = 10000
//! ```

mod config;
mod error;
mod keys;
mod loader;
mod lock;
mod store;

pub use config::CacheConfig;
pub use error::CacheError;
pub use keys::DocumentKey;
pub use loader::{DocumentLoader, LoaderError, StoreDocumentLoader};
pub use store::{
    DocumentCache, METRIC_COALESCED, METRIC_EVICT, METRIC_HIT, METRIC_INVALIDATE,
    METRIC_LOAD_FAILURE, METRIC_LOAD_MS, METRIC_MISS,
};
