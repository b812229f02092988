use super::{LockOutcome, LockToken, LockTokenKind, Locker};
use mapcache_core::{CacheError, ErrorCode, RequestContext};
use std::time::Duration;

/// The minimal memcache operations the locker needs. The wire protocol to
/// the memcache servers themselves is out of scope; this trait lets the
/// locking state machine be built and tested without one.
pub trait MemcacheClient: Send + Sync {
	/// Create-only set: succeeds only if `key` is absent. `ttl` is seconds.
	fn add(&self, key: &str, value: &str, ttl: u64) -> Result<bool, CacheError>;
	/// Returns the value if `key` is present.
	fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
	fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Locks a resource with an `add` (create-only) memcache entry, keyed by an
/// optional prefix plus the canonicalized resource name.
pub struct MemcacheLocker {
	client: Box<dyn MemcacheClient>,
	key_prefix: String,
	retry_interval: Duration,
	timeout: Duration,
}

impl MemcacheLocker {
	pub fn new(client: Box<dyn MemcacheClient>, key_prefix: impl Into<String>) -> Self {
		Self { client, key_prefix: key_prefix.into(), retry_interval: Duration::from_millis(100), timeout: Duration::from_secs(120) }
	}

	#[must_use]
	pub fn with_timing(mut self, retry_interval: Duration, timeout: Duration) -> Self {
		self.retry_interval = retry_interval;
		self.timeout = timeout;
		self
	}

	fn lock_key(&self, resource: &str) -> String {
		format!("{}_gc_lock{resource}.lck", self.key_prefix)
	}

	fn key_from_token<'a>(&self, token: &'a LockToken) -> Result<&'a str, CacheError> {
		match &token.kind {
			LockTokenKind::Memcache { key } => Ok(key),
			_ => Err(CacheError::new(ErrorCode::Internal, "memcache locker received a token from another locker kind")),
		}
	}
}

impl Locker for MemcacheLocker {
	fn acquire(&self, _ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError> {
		let key = self.lock_key(resource);
		let token = LockToken { resource: resource.to_string(), kind: LockTokenKind::Memcache { key: key.clone() } };
		let created = self.client.add(&key, "1", self.timeout.as_secs())?;
		Ok((if created { LockOutcome::Acquired } else { LockOutcome::Locked }, token))
	}

	fn ping(&self, _ctx: &RequestContext, token: &LockToken) -> Result<LockOutcome, CacheError> {
		let key = self.key_from_token(token)?;
		Ok(if self.client.get(key)?.is_some() { LockOutcome::Locked } else { LockOutcome::Noent })
	}

	fn release(&self, _ctx: &RequestContext, token: &LockToken) -> Result<(), CacheError> {
		let key = self.key_from_token(token)?;
		self.client.delete(key)
	}

	fn retry_interval(&self) -> Duration {
		self.retry_interval
	}

	fn timeout(&self) -> Duration {
		self.timeout
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use std::collections::HashMap;

	#[derive(Default)]
	struct InMemoryMemcacheClient {
		store: Mutex<HashMap<String, String>>,
	}

	impl MemcacheClient for InMemoryMemcacheClient {
		fn add(&self, key: &str, value: &str, _ttl: u64) -> Result<bool, CacheError> {
			let mut store = self.store.lock();
			if store.contains_key(key) {
				Ok(false)
			} else {
				store.insert(key.to_string(), value.to_string());
				Ok(true)
			}
		}

		fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
			Ok(self.store.lock().get(key).cloned())
		}

		fn delete(&self, key: &str) -> Result<(), CacheError> {
			self.store.lock().remove(key);
			Ok(())
		}
	}

	#[test]
	fn add_create_only_semantics() {
		let locker = MemcacheLocker::new(Box::new(InMemoryMemcacheClient::default()), "mc_");
		let ctx = RequestContext::new();

		let (outcome1, token1) = locker.acquire(&ctx, "layer#grid#3#0#0").unwrap();
		assert_eq!(outcome1, LockOutcome::Acquired);

		let (outcome2, _) = locker.acquire(&ctx, "layer#grid#3#0#0").unwrap();
		assert_eq!(outcome2, LockOutcome::Locked);

		locker.release(&ctx, &token1).unwrap();
		assert_eq!(locker.ping(&ctx, &token1).unwrap(), LockOutcome::Noent);
	}

	#[test]
	fn lock_key_carries_configured_prefix() {
		let locker = MemcacheLocker::new(Box::new(InMemoryMemcacheClient::default()), "mc_");
		assert_eq!(locker.lock_key("layer#grid#0#0#0"), "mc__gc_locklayer#grid#0#0#0.lck");
	}
}
