use super::{LockOutcome, LockToken, LockTokenKind, Locker};
use mapcache_core::{CacheError, ErrorCode, RequestContext};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locks a resource by exclusively creating `<dir>/_gc_lock<canonical>.lck`.
/// The created file holds the owner process id as a debugging aid.
pub struct DiskLocker {
	dir: PathBuf,
	retry_interval: Duration,
	timeout: Duration,
}

impl DiskLocker {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		let dir = dir.into();
		fs::create_dir_all(&dir).ok();
		Self { dir, retry_interval: Duration::from_millis(100), timeout: Duration::from_secs(120) }
	}

	#[must_use]
	pub fn with_timing(mut self, retry_interval: Duration, timeout: Duration) -> Self {
		self.retry_interval = retry_interval;
		self.timeout = timeout;
		self
	}

	fn lock_path(&self, resource: &str) -> PathBuf {
		self.dir.join(format!("_gc_lock{resource}.lck"))
	}

	fn path_from_token<'a>(&self, token: &'a LockToken) -> Result<&'a Path, CacheError> {
		match &token.kind {
			LockTokenKind::Disk { path } => Ok(path),
			_ => Err(CacheError::new(ErrorCode::Internal, "disk locker received a token from another locker kind")),
		}
	}
}

impl Locker for DiskLocker {
	fn acquire(&self, _ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError> {
		let path = self.lock_path(resource);
		let token = LockToken { resource: resource.to_string(), kind: LockTokenKind::Disk { path: path.clone() } };

		match OpenOptions::new().write(true).create_new(true).open(&path) {
			Ok(mut file) => {
				let _ = write!(file, "{}", std::process::id());
				Ok((LockOutcome::Acquired, token))
			}
			Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok((LockOutcome::Locked, token)),
			Err(e) => Err(CacheError::new(ErrorCode::Internal, format!("creating lock file {path:?}: {e}"))),
		}
	}

	fn ping(&self, _ctx: &RequestContext, token: &LockToken) -> Result<LockOutcome, CacheError> {
		let path = self.path_from_token(token)?;
		Ok(if path.exists() { LockOutcome::Locked } else { LockOutcome::Noent })
	}

	fn release(&self, _ctx: &RequestContext, token: &LockToken) -> Result<(), CacheError> {
		let path = self.path_from_token(token)?;
		match fs::remove_file(path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(CacheError::new(ErrorCode::Internal, format!("removing lock file {path:?}: {e}"))),
		}
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

	/// Callers go through [`super::lock_or_wait`] in production, which
	/// canonicalizes the resource name (stripping `/` among other
	/// characters) before it ever reaches a locker. Tests exercise the
	/// locker directly with an already-canonicalized name.
	const RESOURCE: &str = "layer#grid#3#0#0";

	#[test]
	fn first_acquire_succeeds_second_observes_locked() {
		let dir = tempfile::tempdir().unwrap();
		let locker = DiskLocker::new(dir.path());
		let ctx = RequestContext::new();

		let (outcome1, token1) = locker.acquire(&ctx, RESOURCE).unwrap();
		assert_eq!(outcome1, LockOutcome::Acquired);

		let (outcome2, _token2) = locker.acquire(&ctx, RESOURCE).unwrap();
		assert_eq!(outcome2, LockOutcome::Locked);

		locker.release(&ctx, &token1).unwrap();
		assert_eq!(locker.ping(&ctx, &token1).unwrap(), LockOutcome::Noent);
	}

	#[test]
	fn release_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let locker = DiskLocker::new(dir.path());
		let ctx = RequestContext::new();
		let (_, token) = locker.acquire(&ctx, RESOURCE).unwrap();
		locker.release(&ctx, &token).unwrap();
		locker.release(&ctx, &token).unwrap();
	}

	#[test]
	fn lock_file_name_is_prefixed_and_suffixed() {
		let dir = tempfile::tempdir().unwrap();
		let locker = DiskLocker::new(dir.path());
		let path = locker.lock_path(RESOURCE);
		assert_eq!(path.file_name().unwrap().to_str().unwrap(), "_gc_locklayer#grid#3#0#0.lck");
	}
}
