//! Wax catalog synchronization and deduplication engine.
//!
//! Two entry points, both driven by thin CLI binaries:
//!
//! - [`sync::sync_collection`] mirrors a user's Discogs collection into the
//!   local catalog, page by page, under the provider's rate limit.
//! - [`dedupe::consolidate_duplicates`] collapses locally-duplicated records
//!   (left behind by repeated manual entry or partial syncs) into one
//!   canonical record per item.
//!
//! Both share the fill-empty merge semantics in [`merge`] and isolate
//! failures at the smallest unit that preserves forward progress: one
//! remote item for sync, one duplicate group for consolidation.

pub mod config;
pub mod dedupe;
pub mod error;
pub mod matching;
pub mod merge;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;

pub use config::Config;
pub use dedupe::consolidate_duplicates;
pub use error::{EngineError, Result};
pub use store::PgStore;
pub use sync::{sync_collection, sync_collection_limited};
