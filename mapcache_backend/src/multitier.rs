//! Composes N backends into one: read-promotion on hit, single writer tier.

use crate::backend::{CacheBackend, CacheOutcome};
use anyhow::{Result, bail};
use log::warn;
use mapcache_core::{CacheError, RequestContext, Tile};

struct Child {
	backend: Box<dyn CacheBackend>,
	is_writer: bool,
}

/// An ordered stack of cache backends. Reads descend tier 0..N-1 and stop at
/// the first `Success`, promoting the hit into every tier above it. Writes
/// (`set`/`multi_set`) go only to the configured writer tier; `delete` and
/// `exists` fan out to every tier.
pub struct MultiTierCache {
	name: String,
	children: Vec<Child>,
	write_tier_index: usize,
}

impl MultiTierCache {
	/// Build a multi-tier cache from an ordered list of `(backend,
	/// write)` pairs, honoring the config rules from the tile-pipeline
	/// specification: at most one `write=true`; if none is marked, the last
	/// child without an explicit `write=false` becomes the writer; an empty
	/// child list is a configuration error.
	pub fn build(name: impl Into<String>, children: Vec<(Box<dyn CacheBackend>, Option<bool>)>) -> Result<Self> {
		let name = name.into();
		if children.is_empty() {
			bail!("multi-tier cache '{name}' must declare at least one child cache");
		}

		let explicit_writers: Vec<usize> =
			children.iter().enumerate().filter(|(_, (_, write))| *write == Some(true)).map(|(i, _)| i).collect();
		if explicit_writers.len() > 1 {
			bail!("multi-tier cache '{name}' must declare at most one write=\"true\" child");
		}

		let write_tier_index = if let Some(index) = explicit_writers.first() {
			*index
		} else {
			children
				.iter()
				.enumerate()
				.rev()
				.find(|(_, (_, write))| *write != Some(false))
				.map(|(i, _)| i)
				.ok_or_else(|| anyhow::anyhow!("multi-tier cache '{name}' has no eligible writer tier"))?
		};

		let children = children.into_iter().enumerate().map(|(i, (backend, _))| Child { backend, is_writer: i == write_tier_index }).collect();

		Ok(Self { name, children, write_tier_index })
	}

	#[must_use]
	pub fn write_tier_index(&self) -> usize {
		self.write_tier_index
	}
}

impl CacheBackend for MultiTierCache {
	fn name(&self) -> &str {
		&self.name
	}

	fn exists(&self, ctx: &RequestContext, tile: &Tile) -> bool {
		self.children.iter().any(|child| child.backend.exists(ctx, tile))
	}

	fn get(&self, ctx: &RequestContext, tile: &mut Tile) -> CacheOutcome {
		for (tier_index, child) in self.children.iter().enumerate() {
			match child.backend.get(ctx, tile) {
				CacheOutcome::Success => {
					if tier_index > 0 {
						promote(ctx, &self.children[..tier_index], tile);
					}
					return CacheOutcome::Success;
				}
				CacheOutcome::Miss => continue,
				CacheOutcome::Failure(err) => return CacheOutcome::Failure(err),
			}
		}
		CacheOutcome::Miss
	}

	fn set(&self, ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError> {
		self.children[self.write_tier_index].backend.set(ctx, tile)
	}

	fn multi_set(&self, ctx: &RequestContext, tiles: &[Tile]) -> Result<(), CacheError> {
		self.children[self.write_tier_index].backend.multi_set(ctx, tiles)
	}

	fn delete(&self, ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError> {
		for child in &self.children {
			if let Err(err) = child.backend.delete(ctx, tile) {
				warn!("multi-tier '{}': delete failed on tier '{}': {err}", self.name, child.backend.name());
			}
		}
		Ok(())
	}
}

/// Copy a tile into every tier strictly above the one that served the hit,
/// nearest-to-client last. Promotion failures are logged and swallowed: the
/// read that triggered this still returns `Success`.
fn promote(ctx: &RequestContext, tiers_above: &[Child], tile: &Tile) {
	for child in tiers_above.iter().rev() {
		if let Err(err) = child.backend.set(ctx, tile) {
			warn!("multi-tier promotion into tier '{}' failed: {err}", child.backend.name());
		}
	}
}
