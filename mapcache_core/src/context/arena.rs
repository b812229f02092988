use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Scratch storage for the strings a single request builds up along the way
/// (canonicalized resource names, formatted cache keys, and the like).
///
/// Arenas are cheap and request-scoped: nothing here is freed piecemeal, the
/// whole arena is released at once when its owning [`super::RequestContext`]
/// (or the parent that adopted it as a child) drops.
pub struct Arena {
	scratch: Mutex<Vec<String>>,
	released: AtomicBool,
}

impl Arena {
	#[must_use]
	pub fn new() -> Self {
		Self { scratch: Mutex::new(Vec::new()), released: AtomicBool::new(false) }
	}

	/// Hand the arena ownership of a string, keeping it alive for the life of
	/// the request. Returns the index it was stored at.
	pub fn alloc_string(&self, value: impl Into<String>) -> usize {
		let mut scratch = self.scratch.lock();
		scratch.push(value.into());
		scratch.len() - 1
	}

	/// Number of strings currently held.
	#[must_use]
	pub fn len(&self) -> usize {
		self.scratch.lock().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Release all scratch storage. Idempotent.
	pub fn release(&self) {
		self.scratch.lock().clear();
		self.released.store(true, Ordering::Release);
	}

	#[must_use]
	pub fn is_released(&self) -> bool {
		self.released.load(Ordering::Acquire)
	}
}

impl Default for Arena {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn alloc_and_release() {
		let arena = Arena::new();
		assert!(arena.is_empty());
		arena.alloc_string("tile/1/2/3.png");
		assert_eq!(arena.len(), 1);
		assert!(!arena.is_released());
		arena.release();
		assert!(arena.is_released());
		assert!(arena.is_empty());
	}
}
