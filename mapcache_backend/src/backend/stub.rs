use super::{CacheBackend, CacheOutcome};
use mapcache_core::{CacheError, RequestContext, Tile};

/// A named placeholder for a remote-driver backend (memcache, Riak,
/// Azure/Google/S3 blob, TIFF bundle) whose wire protocol is out of scope.
///
/// `StubBackend` exists so multi-tier configuration validation and alias
/// routing can reference a declared cache by name and kind without special-
/// casing "not implemented" as a distinct error path: every operation
/// reports [`mapcache_core::ErrorCode::Unavailable`], exactly the status a
/// real driver would report if its upstream were unreachable.
pub struct StubBackend {
	name: String,
	kind: String,
}

impl StubBackend {
	#[must_use]
	pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
		Self { name: name.into(), kind: kind.into() }
	}

	fn unavailable(&self) -> CacheError {
		CacheError::unavailable(format!("cache backend '{}' of kind '{}' is not implemented", self.name, self.kind))
			.with_source(self.name.clone())
	}
}

impl CacheBackend for StubBackend {
	fn name(&self) -> &str {
		&self.name
	}

	fn exists(&self, _ctx: &RequestContext, _tile: &Tile) -> bool {
		false
	}

	fn get(&self, _ctx: &RequestContext, _tile: &mut Tile) -> CacheOutcome {
		CacheOutcome::Failure(self.unavailable())
	}

	fn set(&self, _ctx: &RequestContext, _tile: &Tile) -> Result<(), CacheError> {
		Err(self.unavailable())
	}

	fn delete(&self, _ctx: &RequestContext, _tile: &Tile) -> Result<(), CacheError> {
		Err(self.unavailable())
	}
}
