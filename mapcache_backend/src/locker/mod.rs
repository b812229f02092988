//! Distributed locking: disk, memcache, and fallback-composite lockers, plus
//! the `lock_or_wait` routine that serializes the render-then-write critical
//! section across workers.

mod disk;
mod fallback;
mod memcache;

pub use disk::DiskLocker;
pub use fallback::FallbackLocker;
pub use memcache::{MemcacheClient, MemcacheLocker};

use log::warn;
use mapcache_core::{CacheError, RequestContext, canonicalize_resource_name};
use std::thread;
use std::time::{Duration, Instant};

/// Result of an `acquire` or `ping` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
	/// This call created the lock; the caller owns the critical section.
	Acquired,
	/// Another worker holds the lock.
	Locked,
	/// The lock is absent: either never held, or the holder finished and
	/// released it.
	Noent,
}

/// Identifies which concrete locker produced a token and what it needs to
/// ping/release it.
#[derive(Debug, Clone)]
pub enum LockTokenKind {
	Disk { path: std::path::PathBuf },
	Memcache { key: String },
	Fallback { child_index: usize, inner: Box<LockToken> },
}

/// Opaque handle returned by [`Locker::acquire`], reused for `ping` and
/// `release`. Carries the canonicalized resource name for diagnostics.
#[derive(Debug, Clone)]
pub struct LockToken {
	pub resource: String,
	pub kind: LockTokenKind,
}

/// Common contract every locker variant satisfies.
pub trait Locker: Send + Sync {
	fn acquire(&self, ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError>;
	fn ping(&self, ctx: &RequestContext, token: &LockToken) -> Result<LockOutcome, CacheError>;
	fn release(&self, ctx: &RequestContext, token: &LockToken) -> Result<(), CacheError>;

	fn retry_interval(&self) -> Duration {
		Duration::from_millis(100)
	}

	fn timeout(&self) -> Duration {
		Duration::from_secs(120)
	}
}

/// Acquire the lock for `resource`, or wait for the current holder to finish.
///
/// Returns `Some(token)` when the caller now owns the critical section (the
/// caller must eventually call `locker.release(ctx, &token)`). Returns `None`
/// when someone else performed the protected work — the caller must re-read
/// the cache — or when the wait timed out.
///
/// On timeout we deliberately do **not** call `release` on a lock this
/// worker never acquired: that would delete another worker's still-valid
/// lock (on memcache, another worker's key outright). Instead we let the
/// lock's own `timeout` act as its TTL and proceed as if the work must be
/// redone.
pub fn lock_or_wait(ctx: &RequestContext, locker: &dyn Locker, resource: &str) -> Option<LockToken> {
	let resource = canonicalize_resource_name(resource);

	let (outcome, token) = match locker.acquire(ctx, &resource) {
		Ok(pair) => pair,
		Err(err) => {
			ctx.set_error(err.code, err.message.clone());
			return None;
		}
	};

	match outcome {
		LockOutcome::Acquired => return Some(token),
		LockOutcome::Noent => return None,
		LockOutcome::Locked => {}
	}

	let deadline = Instant::now() + locker.timeout();
	loop {
		if Instant::now() >= deadline {
			warn!("lock on resource '{resource}' timed out after {:?}; proceeding without forcing release", locker.timeout());
			return None;
		}
		thread::sleep(locker.retry_interval());
		match locker.ping(ctx, &token) {
			Ok(LockOutcome::Noent) => return None,
			Ok(LockOutcome::Locked) => continue,
			Ok(LockOutcome::Acquired) => return None,
			Err(err) => {
				ctx.set_error(err.code, err.message.clone());
				return None;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// A locker whose second `ping` reports `Noent`, to exercise the waiting
	/// branch of `lock_or_wait` without a real filesystem or memcache.
	struct ScriptedLocker {
		ping_calls: AtomicUsize,
		noent_after: usize,
	}

	impl Locker for ScriptedLocker {
		fn acquire(&self, _ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError> {
			Ok((LockOutcome::Locked, LockToken { resource: resource.to_string(), kind: LockTokenKind::Memcache { key: resource.to_string() } }))
		}

		fn ping(&self, _ctx: &RequestContext, _token: &LockToken) -> Result<LockOutcome, CacheError> {
			let n = self.ping_calls.fetch_add(1, Ordering::SeqCst) + 1;
			Ok(if n >= self.noent_after { LockOutcome::Noent } else { LockOutcome::Locked })
		}

		fn release(&self, _ctx: &RequestContext, _token: &LockToken) -> Result<(), CacheError> {
			Ok(())
		}

		fn retry_interval(&self) -> Duration {
			Duration::from_millis(1)
		}

		fn timeout(&self) -> Duration {
			Duration::from_secs(5)
		}
	}

	#[test]
	fn waits_then_observes_noent_and_returns_none() {
		let locker = ScriptedLocker { ping_calls: AtomicUsize::new(0), noent_after: 3 };
		let ctx = RequestContext::new();
		let result = lock_or_wait(&ctx, &locker, "tileset/grid/3/4/5");
		assert!(result.is_none());
		assert_eq!(locker.ping_calls.load(Ordering::SeqCst), 3);
	}

	struct AlwaysLockedLocker;
	impl Locker for AlwaysLockedLocker {
		fn acquire(&self, _ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError> {
			Ok((LockOutcome::Locked, LockToken { resource: resource.to_string(), kind: LockTokenKind::Memcache { key: resource.to_string() } }))
		}
		fn ping(&self, _ctx: &RequestContext, _token: &LockToken) -> Result<LockOutcome, CacheError> {
			Ok(LockOutcome::Locked)
		}
		fn release(&self, _ctx: &RequestContext, _token: &LockToken) -> Result<(), CacheError> {
			Ok(())
		}
		fn retry_interval(&self) -> Duration {
			Duration::from_millis(1)
		}
		fn timeout(&self) -> Duration {
			Duration::from_millis(10)
		}
	}

	#[test]
	fn times_out_without_releasing_and_returns_none() {
		let locker = AlwaysLockedLocker;
		let ctx = RequestContext::new();
		let result = lock_or_wait(&ctx, &locker, "tileset/grid/3/4/5");
		assert!(result.is_none());
	}
}
