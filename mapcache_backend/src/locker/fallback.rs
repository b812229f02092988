use super::{LockOutcome, LockToken, LockTokenKind, Locker};
use mapcache_core::{CacheError, ErrorCode, RequestContext};
use std::time::Duration;

/// An ordered list of child lockers. `acquire` tries each in turn; the first
/// child that returns without error wins, and its token is wrapped with the
/// winning child's index so `ping`/`release` reach the right child. Errors
/// from earlier children are suppressed — via the context's speculative
/// error-slot save/restore — as long as a later child succeeds.
///
/// Each child's `acquire` call is atomic (it either fully succeeds or fully
/// fails), so trying children in sequence can never leave a partially-held
/// lock behind: at most one child ever holds a lock for a given `acquire`
/// call, and its index is recorded in the token so `release` always reaches
/// exactly that child.
pub struct FallbackLocker {
	children: Vec<Box<dyn Locker>>,
}

impl FallbackLocker {
	#[must_use]
	pub fn new(children: Vec<Box<dyn Locker>>) -> Self {
		Self { children }
	}

	fn child_and_inner<'a>(&self, token: &'a LockToken) -> Result<(&dyn Locker, &'a LockToken), CacheError> {
		match &token.kind {
			LockTokenKind::Fallback { child_index, inner } => {
				let child = self
					.children
					.get(*child_index)
					.ok_or_else(|| CacheError::new(ErrorCode::Internal, format!("fallback locker: no child at index {child_index}")))?;
				Ok((child.as_ref(), inner))
			}
			_ => Err(CacheError::new(ErrorCode::Internal, "fallback locker received a token from another locker kind")),
		}
	}
}

impl Locker for FallbackLocker {
	fn acquire(&self, ctx: &RequestContext, resource: &str) -> Result<(LockOutcome, LockToken), CacheError> {
		let snapshot = ctx.push_errors();
		for (index, child) in self.children.iter().enumerate() {
			match child.acquire(ctx, resource) {
				Ok((outcome, inner_token)) => {
					ctx.pop_errors(snapshot);
					let token = LockToken { resource: resource.to_string(), kind: LockTokenKind::Fallback { child_index: index, inner: Box::new(inner_token) } };
					return Ok((outcome, token));
				}
				Err(_) => continue,
			}
		}
		ctx.pop_errors(snapshot);
		Err(CacheError::unavailable(format!("fallback locker: all {} children failed to acquire '{resource}'", self.children.len())))
	}

	fn ping(&self, ctx: &RequestContext, token: &LockToken) -> Result<LockOutcome, CacheError> {
		let (child, inner) = self.child_and_inner(token)?;
		child.ping(ctx, inner)
	}

	fn release(&self, ctx: &RequestContext, token: &LockToken) -> Result<(), CacheError> {
		let (child, inner) = self.child_and_inner(token)?;
		child.release(ctx, inner)
	}

	fn retry_interval(&self) -> Duration {
		self.children.first().map_or(Duration::from_millis(100), |c| c.retry_interval())
	}

	fn timeout(&self) -> Duration {
		self.children.first().map_or(Duration::from_secs(120), |c| c.timeout())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use super::super::{LockOutcome as Outcome, LockToken as Token};

	struct FailingLocker;
	impl Locker for FailingLocker {
		fn acquire(&self, _ctx: &RequestContext, _resource: &str) -> Result<(Outcome, Token), CacheError> {
			Err(CacheError::internal("upstream locker unreachable"))
		}
		fn ping(&self, _ctx: &RequestContext, _token: &Token) -> Result<Outcome, CacheError> {
			Err(CacheError::internal("unreachable"))
		}
		fn release(&self, _ctx: &RequestContext, _token: &Token) -> Result<(), CacheError> {
			Err(CacheError::internal("unreachable"))
		}
	}

	struct SucceedingLocker;
	impl Locker for SucceedingLocker {
		fn acquire(&self, _ctx: &RequestContext, resource: &str) -> Result<(Outcome, Token), CacheError> {
			Ok((Outcome::Acquired, Token { resource: resource.to_string(), kind: LockTokenKind::Memcache { key: resource.to_string() } }))
		}
		fn ping(&self, _ctx: &RequestContext, _token: &Token) -> Result<Outcome, CacheError> {
			Ok(Outcome::Noent)
		}
		fn release(&self, _ctx: &RequestContext, _token: &Token) -> Result<(), CacheError> {
			Ok(())
		}
	}

	#[test]
	fn second_child_wins_after_first_fails() {
		let locker = FallbackLocker::new(vec![Box::new(FailingLocker), Box::new(SucceedingLocker)]);
		let ctx = RequestContext::new();

		let (outcome, token) = locker.acquire(&ctx, "layer#grid#0#0#0").unwrap();
		assert_eq!(outcome, Outcome::Acquired);
		assert!(!ctx.has_error(), "earlier child's error must be suppressed");

		assert_eq!(locker.ping(&ctx, &token).unwrap(), Outcome::Noent);
		locker.release(&ctx, &token).unwrap();
	}

	#[test]
	fn all_children_failing_is_an_error() {
		let locker = FallbackLocker::new(vec![Box::new(FailingLocker), Box::new(FailingLocker)]);
		let ctx = RequestContext::new();
		assert!(locker.acquire(&ctx, "layer#grid#0#0#0").is_err());
	}
}
