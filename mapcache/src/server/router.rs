//! Alias routing (§4.H) tying the host configuration to live, constructed
//! tileset caches/lockers, and the pool-sharing decision.

use crate::config::{AliasConfig, HostConfig, match_endpoint};
use anyhow::{Context, Result};
use mapcache_backend::locker::Locker;
use mapcache_backend::{MultiTierCache, PoolConfig};
use mapcache_core::Tileset;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One alias, resolved into its live backend/locker/tileset, ready to be
/// driven by a [`super::dispatch::Dispatcher`] classification.
///
/// `concurrency` bounds in-flight tile requests per alias at
/// `pool_config.hmax`, failing over capacity with the same `Unavailable`
/// classification a pool-exhausted connection acquire would produce. The
/// proxy request path additionally borrows a `reqwest::Client` from a real
/// [`mapcache_backend::pool::PoolRegistry`], keyed by [`Self::pool_key`] and
/// bounded by the same `pool_config`.
pub struct ResolvedAlias {
	pub endpoint: String,
	pub cache: MultiTierCache,
	pub locker: Box<dyn Locker>,
	pub tileset: Tileset,
	pub pool_config: PoolConfig,
	pub pool_sharing: bool,
	pub concurrency: Arc<Semaphore>,
}

/// Built once at boot from a validated [`HostConfig`]: the list of resolved
/// aliases in registration order, plus the pool-sharing keying decision
/// per-alias (shared pools use the host name as key; per-alias pools key on
/// the alias endpoint — see [`ResolvedAlias::pool_key`]).
pub struct AliasRouter {
	aliases: Vec<ResolvedAlias>,
}

impl ResolvedAlias {
	/// The key used to resolve this alias's connection pool in a
	/// [`mapcache_backend::pool::PoolRegistry`]: shared pools collapse to one
	/// key across the whole host, per-alias pools key on the endpoint.
	#[must_use]
	pub fn pool_key(&self, shared: bool) -> String {
		if shared { "shared".to_string() } else { self.endpoint.clone() }
	}
}

impl AliasRouter {
	pub fn build(host: &HostConfig) -> Result<Self> {
		host.validate()?;
		let aliases = host
			.aliases
			.iter()
			.map(|alias| resolve_alias(host, alias).with_context(|| format!("resolving alias '{}'", alias.endpoint)))
			.collect::<Result<Vec<_>>>()?;
		Ok(Self { aliases })
	}

	/// Find the alias matching `path`, returning it plus the path-info
	/// suffix handed to the [`super::dispatch::Dispatcher`].
	#[must_use]
	pub fn match_path(&self, path: &str) -> Option<(&ResolvedAlias, String)> {
		for alias in &self.aliases {
			if let Some(path_info) = match_endpoint(&alias.endpoint, path) {
				return Some((alias, path_info));
			}
		}
		None
	}

	#[must_use]
	pub fn aliases(&self) -> &[ResolvedAlias] {
		&self.aliases
	}
}

fn resolve_alias(host: &HostConfig, alias: &AliasConfig) -> Result<ResolvedAlias> {
	let pool_overrides = host.pool_overrides_for(alias);
	let pool_config = pool_overrides.resolve();
	Ok(ResolvedAlias {
		endpoint: alias.endpoint.clone(),
		cache: alias.tileset.build_cache()?,
		locker: alias.tileset.build_locker()?,
		tileset: alias.tileset.to_tileset(),
		concurrency: Arc::new(Semaphore::new(pool_config.hmax.max(1))),
		pool_sharing: pool_overrides.sharing_enabled(),
		pool_config,
	})
}
