//! Per-request error ledger and scratch arena.
//!
//! MapCache never unwinds on a backend failure: every fallible operation
//! carries its context along and reports failure by setting a single
//! "current error" on the [`RequestContext`], which the dispatcher inspects
//! once the cache/render pipeline has run its course. Speculative code paths
//! (try one backend, fall back to the next) save and restore this slot with
//! [`RequestContext::push_errors`] / [`RequestContext::pop_errors`] instead of
//! using `catch_unwind`.

mod arena;
mod error;

pub use arena::Arena;
pub use error::{CacheError, ErrorCode};

use parking_lot::Mutex;
use std::sync::Arc;

/// A simple ordered header view; agnostic of whatever HTTP crate the host
/// embedding MapCache uses.
pub type HeaderMap = Vec<(String, String)>;

/// Opaque snapshot returned by [`RequestContext::push_errors`] and consumed by
/// [`RequestContext::pop_errors`]. Callers must not inspect its contents.
#[derive(Debug, Default)]
pub struct ErrorSnapshot(Option<CacheError>);

/// Per-request scratch state threaded through the cache/render pipeline.
///
/// A `RequestContext` owns a scratch [`Arena`] and a single "current error"
/// slot. It is cheap to [`RequestContext::child`]: the child gets its own
/// arena, but that arena's lifetime is registered with the parent so that
/// dropping the parent releases every child transitively, mirroring the
/// pool-allocated sub-request arenas of the system this crate replaces.
pub struct RequestContext {
	arena: Arc<Arena>,
	children: Mutex<Vec<Arc<Arena>>>,
	error: Mutex<Option<CacheError>>,
	error_stack: Mutex<Vec<Option<CacheError>>>,
	/// Inbound request headers, lowercase-keyed.
	pub headers_in: HeaderMap,
	/// Hint: can the caller follow an HTTP redirect (some WMTS/TMS clients cannot).
	pub supports_redirects: bool,
}

impl RequestContext {
	#[must_use]
	pub fn new() -> Self {
		Self {
			arena: Arc::new(Arena::new()),
			children: Mutex::new(Vec::new()),
			error: Mutex::new(None),
			error_stack: Mutex::new(Vec::new()),
			headers_in: HeaderMap::new(),
			supports_redirects: true,
		}
	}

	#[must_use]
	pub fn with_headers(headers_in: HeaderMap) -> Self {
		let mut ctx = Self::new();
		ctx.headers_in = headers_in;
		ctx
	}

	/// Borrow this request's scratch arena.
	#[must_use]
	pub fn arena(&self) -> &Arena {
		&self.arena
	}

	/// Clone the `Arc` handle to this request's arena, so its release state
	/// can be observed after the context itself has dropped.
	#[must_use]
	pub fn arena_handle(&self) -> Arc<Arena> {
		self.arena.clone()
	}

	/// Spawn an independent child context for sub-work (e.g. probing one tier
	/// of a multi-tier cache). The child's arena is released when `self` is
	/// dropped, even if the child handle outlives this call.
	#[must_use]
	pub fn child(&self) -> RequestContext {
		let child_arena = Arc::new(Arena::new());
		self.children.lock().push(child_arena.clone());
		RequestContext {
			arena: child_arena,
			children: Mutex::new(Vec::new()),
			error: Mutex::new(None),
			error_stack: Mutex::new(Vec::new()),
			headers_in: self.headers_in.clone(),
			supports_redirects: self.supports_redirects,
		}
	}

	/// Set the current error, overwriting any previous one.
	pub fn set_error(&self, code: ErrorCode, message: impl Into<String>) {
		*self.error.lock() = Some(CacheError::new(code, message));
	}

	/// True if a current error is set.
	#[must_use]
	pub fn has_error(&self) -> bool {
		self.error.lock().is_some()
	}

	/// Clear the current error slot.
	pub fn clear_errors(&self) {
		*self.error.lock() = None;
	}

	/// Take the current error, leaving the slot empty.
	pub fn take_error(&self) -> Option<CacheError> {
		self.error.lock().take()
	}

	/// Peek at the current error without clearing it.
	#[must_use]
	pub fn current_error(&self) -> Option<CacheError> {
		self.error.lock().clone()
	}

	/// Save the current error slot onto an internal stack and clear it, so a
	/// speculative code path (e.g. "try backend A, else backend B") can run
	/// without clobbering an error a caller already cared about.
	pub fn push_errors(&self) -> ErrorSnapshot {
		let saved = self.error.lock().take();
		self.error_stack.lock().push(saved.clone());
		ErrorSnapshot(saved)
	}

	/// Restore the error slot saved by the matching [`push_errors`] call,
	/// discarding whatever error (if any) was set in between.
	pub fn pop_errors(&self, snapshot: ErrorSnapshot) {
		self.error_stack.lock().pop();
		*self.error.lock() = snapshot.0;
	}
}

impl Default for RequestContext {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for RequestContext {
	fn drop(&mut self) {
		for child in self.children.lock().drain(..) {
			child.release();
		}
		self.arena.release();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_has_clear_error() {
		let ctx = RequestContext::new();
		assert!(!ctx.has_error());
		ctx.set_error(ErrorCode::NotFound, "no such tile");
		assert!(ctx.has_error());
		assert_eq!(ctx.current_error().unwrap().code, ErrorCode::NotFound);
		ctx.clear_errors();
		assert!(!ctx.has_error());
	}

	#[test]
	fn push_pop_errors_restores_speculative_state() {
		let ctx = RequestContext::new();
		ctx.set_error(ErrorCode::Internal, "tier 0 failed");
		let snapshot = ctx.push_errors();
		assert!(!ctx.has_error(), "push_errors must clear the slot for the speculative attempt");

		ctx.set_error(ErrorCode::NotFound, "tier 1 miss");
		ctx.pop_errors(snapshot);

		let restored = ctx.current_error().unwrap();
		assert_eq!(restored.code, ErrorCode::Internal);
		assert_eq!(restored.message, "tier 0 failed");
	}

	#[test]
	fn child_arena_released_when_parent_drops() {
		let child_arena;
		{
			let parent = RequestContext::new();
			let child = parent.child();
			child.arena().alloc_string("scratch");
			child_arena = child.arena_handle();
			assert!(!child_arena.is_released());
			// parent drops here, child already dropped above but its arena is
			// also tracked by the parent's registry.
		}
		assert!(child_arena.is_released());
	}
}
