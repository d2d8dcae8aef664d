//! Query cache shared by every view.
//!
//! This module provides:
//! - Keyed query results with a freshness window and stale-while-revalidate reads
//! - Retention of unused entries for a bounded time
//! - A static table mapping each mutation to the queries it makes stale
//! - A persisted snapshot of the long-lived queries, restored on startup

mod invalidation;
mod key;
mod layer;
mod storage;
mod traits;

pub use invalidation::{Mutation, MutationKind};
pub use key::{KeyPattern, QueryKey, QueryKind};
pub use layer::QueryCache;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource};
