//! Shared building blocks for MapCache: the tile data model, the per-request
//! error ledger, and the resource-naming rules used by cache backends and
//! lockers to turn a tile/lock resource into a safe on-disk or memcache key.

pub mod context;
pub mod resource;
pub mod types;

pub use context::{CacheError, ErrorCode, ErrorSnapshot, RequestContext};
pub use resource::canonicalize_resource_name;
pub use types::*;
