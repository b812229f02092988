//! The cache backend interface and its concrete variants.

mod filesystem;
mod sqlite;
mod stub;

pub use filesystem::FileSystemBackend;
pub use sqlite::SqliteBackend;
pub use stub::StubBackend;

use mapcache_core::{CacheError, RequestContext, Tile};

/// Outcome of a `get`: distinguishing a definitive miss from a backend
/// failure is mandatory — the pipeline treats [`CacheOutcome::Miss`] as "go
/// render this tile" and [`CacheOutcome::Failure`] as "short-circuit to an
/// error response".
#[derive(Debug)]
pub enum CacheOutcome {
	Success,
	Miss,
	Failure(CacheError),
}

impl CacheOutcome {
	#[must_use]
	pub fn is_success(&self) -> bool {
		matches!(self, CacheOutcome::Success)
	}

	#[must_use]
	pub fn is_miss(&self) -> bool {
		matches!(self, CacheOutcome::Miss)
	}
}

/// A named cache backend exposing get/set/exists/delete, with `multi_set`
/// defaulting to repeated `set` calls.
///
/// Implementations populate `tile.encoded_data` and `tile.mtime` on a
/// successful `get`; they must never leave `encoded_data` set after a
/// [`CacheOutcome::Miss`] or [`CacheOutcome::Failure`].
pub trait CacheBackend: Send + Sync {
	fn name(&self) -> &str;

	fn exists(&self, ctx: &RequestContext, tile: &Tile) -> bool;

	fn get(&self, ctx: &RequestContext, tile: &mut Tile) -> CacheOutcome;

	fn set(&self, ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError>;

	fn multi_set(&self, ctx: &RequestContext, tiles: &[Tile]) -> Result<(), CacheError> {
		for tile in tiles {
			self.set(ctx, tile)?;
		}
		Ok(())
	}

	fn delete(&self, ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError>;
}
