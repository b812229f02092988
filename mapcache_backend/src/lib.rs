//! Connection pooling, distributed locking, cache backends, multi-tier
//! composition, and the fetch-or-render tile pipeline.

pub mod backend;
pub mod locker;
pub mod multitier;
pub mod pipeline;
pub mod pool;

pub use backend::{CacheBackend, CacheOutcome};
pub use locker::{LockOutcome, LockToken, Locker};
pub use multitier::MultiTierCache;
pub use pipeline::{Renderer, TilePipeline};
pub use pool::{ConnectionPool, PoolConfig, PoolRegistry};
