//! A generic connection pool keyed by a backend name, matching the pooled
//! handles `r2d2` hands out but generalized to any resource type since
//! MapCache pools things `r2d2` itself doesn't know how to construct
//! (memcache clients, HTTP keep-alive handles, ...).

mod registry;

pub use registry::PoolRegistry;

use mapcache_core::{CacheError, ErrorCode};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Pool sizing/aging policy. Field names mirror the host configuration
/// directives `MapCacheConnectionPool{Min,SMax,HMax,TTL}`.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
	pub min: usize,
	pub smax: usize,
	pub hmax: usize,
	pub ttl: Duration,
	pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self { min: 0, smax: 5, hmax: 200, ttl: Duration::from_secs(60), acquire_timeout: Duration::from_secs(5) }
	}
}

struct IdleEntry<T> {
	resource: T,
	last_used: Instant,
	created_at: Instant,
}

struct State<T> {
	idle: VecDeque<IdleEntry<T>>,
	live_count: usize,
}

/// A pool of exclusively-borrowed resources of type `T`, identified by a
/// single string key for the lifetime of the pool (the pool does not itself
/// fan out by key; a [`PoolRegistry`] holds one `ConnectionPool` per key).
pub struct ConnectionPool<T> {
	key: String,
	config: PoolConfig,
	state: Mutex<State<T>>,
	available: Condvar,
}

impl<T> ConnectionPool<T> {
	#[must_use]
	pub fn new(key: impl Into<String>, config: PoolConfig) -> Arc<Self> {
		Arc::new(Self { key: key.into(), config, state: Mutex::new(State { idle: VecDeque::new(), live_count: 0 }), available: Condvar::new() })
	}

	#[must_use]
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Borrow a connection, constructing a fresh one with `ctor` if no idle
	/// connection is available and the hard cap allows it. Blocks until a
	/// slot frees up or `config.acquire_timeout` elapses, in which case it
	/// fails with [`ErrorCode::Unavailable`] (503).
	pub fn get(self: &Arc<Self>, ctor: impl Fn() -> Result<T, CacheError>) -> Result<PooledConnection<T>, CacheError> {
		let deadline = Instant::now() + self.config.acquire_timeout;
		let mut state = self.state.lock().unwrap();

		loop {
			self.retire_expired(&mut state);

			if let Some(entry) = state.idle.pop_front() {
				return Ok(PooledConnection { pool: Arc::clone(self), resource: Some(entry.resource), created_at: entry.created_at, returned: false });
			}

			if state.live_count < self.config.hmax {
				state.live_count += 1;
				drop(state);
				return match ctor() {
					Ok(resource) => {
						let now = Instant::now();
						Ok(PooledConnection { pool: Arc::clone(self), resource: Some(resource), created_at: now, returned: false })
					}
					Err(err) => {
						let mut state = self.state.lock().unwrap();
						state.live_count -= 1;
						Err(err)
					}
				};
			}

			let now = Instant::now();
			if now >= deadline {
				return Err(CacheError::new(
					ErrorCode::Unavailable,
					format!("pool '{}' exhausted: {} connections in use (hmax={})", self.key, state.live_count, self.config.hmax),
				));
			}
			let (guard, _timeout_result) = self.available.wait_timeout(state, deadline - now).unwrap();
			state = guard;
		}
	}

	/// Return a connection to the idle set. Called by [`PooledConnection`]'s
	/// `Drop` unless the borrower invalidated it first.
	fn release(&self, resource: T, created_at: Instant) {
		let mut state = self.state.lock().unwrap();
		state.idle.push_back(IdleEntry { resource, last_used: Instant::now(), created_at });
		self.retire_expired(&mut state);
		drop(state);
		self.available.notify_one();
	}

	/// Drop a connection without returning it to the idle set — the pool
	/// treats the slot as freed so a new connection can be constructed.
	fn invalidate(&self) {
		let mut state = self.state.lock().unwrap();
		state.live_count = state.live_count.saturating_sub(1);
		drop(state);
		self.available.notify_one();
	}

	/// Enforce `ttl` against idle connections above `smax`, and drop
	/// anything over-age down to the `min` reserve.
	fn retire_expired(&self, state: &mut State<T>) {
		let now = Instant::now();
		let mut kept = VecDeque::with_capacity(state.idle.len());
		while let Some(entry) = state.idle.pop_front() {
			let expired = now.duration_since(entry.last_used) > self.config.ttl;
			let above_soft_cap = kept.len() + state.idle.len() >= self.config.smax;
			let below_min_reserve = kept.len() < self.config.min;
			if expired && above_soft_cap && !below_min_reserve {
				state.live_count = state.live_count.saturating_sub(1);
				continue;
			}
			kept.push_back(entry);
		}
		state.idle = kept;
	}

	#[must_use]
	pub fn live_count(&self) -> usize {
		self.state.lock().unwrap().live_count
	}

	#[must_use]
	pub fn idle_count(&self) -> usize {
		self.state.lock().unwrap().idle.len()
	}
}

/// An exclusively-borrowed pooled resource. Returned to the pool on drop
/// unless [`PooledConnection::invalidate`] was called first.
pub struct PooledConnection<T> {
	pool: Arc<ConnectionPool<T>>,
	resource: Option<T>,
	created_at: Instant,
	returned: bool,
}

impl<T> std::fmt::Debug for PooledConnection<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PooledConnection").field("created_at", &self.created_at).field("returned", &self.returned).finish()
	}
}

impl<T> PooledConnection<T> {
	#[must_use]
	pub fn get(&self) -> &T {
		self.resource.as_ref().expect("resource taken before drop")
	}

	#[must_use]
	pub fn get_mut(&mut self) -> &mut T {
		self.resource.as_mut().expect("resource taken before drop")
	}

	/// Mark this connection as poisoned: the pool will not reuse it and the
	/// failure is treated as an `Internal` backend error by callers that
	/// catch it, per the propagation policy for pool-borrow failures during
	/// backend I/O.
	pub fn invalidate(mut self) {
		self.resource.take();
		self.returned = true;
		self.pool.invalidate();
	}
}

impl<T> Drop for PooledConnection<T> {
	fn drop(&mut self) {
		if !self.returned {
			if let Some(resource) = self.resource.take() {
				self.pool.release(resource, self.created_at);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn reuses_idle_connection_instead_of_constructing_new() {
		let pool = ConnectionPool::<u32>::new("k", PoolConfig::default());
		let constructed = AtomicUsize::new(0);
		let ctor = || {
			constructed.fetch_add(1, Ordering::SeqCst);
			Ok(42u32)
		};

		let conn = pool.get(ctor).unwrap();
		drop(conn);
		let conn2 = pool.get(ctor).unwrap();
		assert_eq!(*conn2.get(), 42);
		assert_eq!(constructed.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn hmax_bounds_live_connections() {
		let config = PoolConfig { hmax: 1, acquire_timeout: Duration::from_millis(50), ..PoolConfig::default() };
		let pool = ConnectionPool::<u32>::new("k", config);
		let _first = pool.get(|| Ok(1u32)).unwrap();
		let second = pool.get(|| Ok(2u32));
		assert!(second.is_err());
		assert_eq!(second.unwrap_err().code, mapcache_core::ErrorCode::Unavailable);
	}

	#[test]
	fn invalidate_frees_the_slot_without_reuse() {
		let pool = ConnectionPool::<u32>::new("k", PoolConfig::default());
		let conn = pool.get(|| Ok(1u32)).unwrap();
		conn.invalidate();
		assert_eq!(pool.live_count(), 0);
		assert_eq!(pool.idle_count(), 0);
	}

	#[test]
	fn released_connection_becomes_idle() {
		let pool = ConnectionPool::<u32>::new("k", PoolConfig::default());
		let conn = pool.get(|| Ok(1u32)).unwrap();
		drop(conn);
		assert_eq!(pool.idle_count(), 1);
	}
}
