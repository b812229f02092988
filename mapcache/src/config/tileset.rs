use anyhow::{Result, bail};
use mapcache_backend::backend::{FileSystemBackend, StubBackend};
use mapcache_backend::locker::{DiskLocker, FallbackLocker, Locker};
use mapcache_backend::{CacheBackend, MultiTierCache};
use mapcache_core::GridLink;
use serde::Deserialize;
use std::path::PathBuf;

/// One tier of a tileset's cache, in the order it should be tried on read.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
	pub name: String,
	pub kind: CacheKind,
	/// Required for `filesystem`/`sqlite`.
	pub path: Option<PathBuf>,
	/// Explicit writer-tier selection (§4.E); at most one `true` per tileset.
	#[serde(default)]
	pub write: Option<bool>,
	/// Opt in to compressing a rendered uniform-color tile to the 5-byte
	/// blank sentinel before this tier writes it. Per-tier, not per-tileset:
	/// a slow origin tier may want it while a fast local tier doesn't.
	#[serde(default)]
	pub detect_blank: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
	Filesystem,
	Sqlite,
	/// Named external backend (memcache/Riak/S3/...) whose wire protocol is
	/// out of scope; reports `Unavailable` so config-time wiring can still
	/// reference it.
	Stub,
}

impl CacheConfig {
	fn build(&self) -> Result<Box<dyn CacheBackend>> {
		let detect_blank = self.detect_blank.unwrap_or(false);
		match self.kind {
			CacheKind::Filesystem => {
				let path = self.path.clone().ok_or_else(|| anyhow::anyhow!("cache '{}': filesystem kind requires 'path'", self.name))?;
				Ok(Box::new(FileSystemBackend::new(self.name.clone(), path, detect_blank)))
			}
			CacheKind::Sqlite => {
				let path = self.path.clone().ok_or_else(|| anyhow::anyhow!("cache '{}': sqlite kind requires 'path'", self.name))?;
				Ok(Box::new(mapcache_backend::backend::SqliteBackend::open(self.name.clone(), &path, detect_blank)?))
			}
			CacheKind::Stub => Ok(Box::new(StubBackend::new(self.name.clone(), "stub"))),
		}
	}
}

/// Distributed-locking configuration for a tileset's render coalescing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LockerConfig {
	pub kind: LockerKind,
	/// Required for `disk`.
	pub path: Option<PathBuf>,
	/// Required for `fallback`; tried in order.
	#[serde(default)]
	pub children: Vec<LockerConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockerKind {
	Disk,
	/// Wire protocol out of scope; configuring one without a real
	/// `MemcacheClient` registered is a boot-time error.
	Memcache,
	Fallback,
}

impl LockerConfig {
	fn build(&self) -> Result<Box<dyn Locker>> {
		match self.kind {
			LockerKind::Disk => {
				let path = self.path.clone().ok_or_else(|| anyhow::anyhow!("disk locker requires 'path'"))?;
				Ok(Box::new(DiskLocker::new(path)))
			}
			LockerKind::Memcache => bail!("memcache locker requires a registered MemcacheClient; configure a disk or fallback locker instead"),
			LockerKind::Fallback => {
				if self.children.is_empty() {
					bail!("fallback locker requires at least one child");
				}
				let children = self.children.iter().map(LockerConfig::build).collect::<Result<Vec<_>>>()?;
				Ok(Box::new(FallbackLocker::new(children)))
			}
		}
	}
}

/// A grid binding as it appears in YAML: the grid's name plus optional zoom
/// bounds, mirroring [`mapcache_core::GridLink`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
	pub name: String,
	pub min_zoom: Option<u32>,
	pub max_zoom: Option<u32>,
}

impl From<&GridConfig> for GridLink {
	fn from(config: &GridConfig) -> Self {
		let mut link = GridLink::new(config.name.clone());
		link.min_zoom = config.min_zoom;
		link.max_zoom = config.max_zoom;
		link
	}
}

/// One served layer: format, metatiling, cache tiers, locker, and the grids
/// it is exposed through.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TilesetConfig {
	pub name: String,
	pub format: String,
	#[serde(default)]
	pub caches: Vec<CacheConfig>,
	#[serde(default)]
	pub locker: Option<LockerConfig>,
	#[serde(default)]
	pub grids: Vec<GridConfig>,
	pub metatile_cols: Option<u32>,
	pub metatile_rows: Option<u32>,
	pub expires: Option<u64>,
	/// Upstream WMS/tile source URL, consulted by the proxy request handler.
	#[serde(default)]
	pub source: Option<String>,
}

impl TilesetConfig {
	/// Validate the multi-tier writer-selection rules from §4.E without
	/// actually constructing backends (cheap, used at boot-time aggregate
	/// validation before any I/O).
	pub fn validate_tier_config(&self) -> Result<()> {
		if self.caches.is_empty() {
			bail!("declares no cache tiers");
		}
		let explicit_writers = self.caches.iter().filter(|c| c.write == Some(true)).count();
		if explicit_writers > 1 {
			bail!("more than one cache tier marked write=true");
		}
		Ok(())
	}

	/// Build the live [`MultiTierCache`] and [`mapcache_core::Tileset`] for
	/// this configuration, opening filesystem/SQLite backends as needed.
	pub fn build_cache(&self) -> Result<MultiTierCache> {
		self.validate_tier_config()?;
		let children = self.caches.iter().map(|c| Ok((c.build()?, c.write))).collect::<Result<Vec<_>>>()?;
		MultiTierCache::build(self.name.clone(), children)
	}

	pub fn build_locker(&self) -> Result<Box<dyn Locker>> {
		match &self.locker {
			Some(cfg) => cfg.build(),
			None => bail!("tileset '{}' declares no locker", self.name),
		}
	}

	#[must_use]
	pub fn to_tileset(&self) -> mapcache_core::Tileset {
		mapcache_core::Tileset {
			name: self.name.clone(),
			cache_name: self.name.clone(),
			grids: self.grids.iter().map(GridLink::from).collect(),
			format: self.format.clone(),
			metatile_cols: self.metatile_cols.unwrap_or(1),
			metatile_rows: self.metatile_rows.unwrap_or(1),
			metabuffer: 0,
			watermark: None,
			expires: self.expires,
			read_only: false,
			source: self.source.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> TilesetConfig {
		TilesetConfig {
			name: "osm".into(),
			format: "image/png".into(),
			caches: vec![CacheConfig { name: "disk".into(), kind: CacheKind::Filesystem, path: Some("/tmp/mapcache-test".into()), write: None, detect_blank: Some(true) }],
			locker: Some(LockerConfig { kind: LockerKind::Disk, path: Some("/tmp/mapcache-test-locks".into()), children: vec![] }),
			grids: vec![GridConfig { name: "webmercator".into(), min_zoom: None, max_zoom: None }],
			metatile_cols: Some(4),
			metatile_rows: Some(4),
			expires: Some(3600),
			source: None,
		}
	}

	#[test]
	fn empty_cache_list_fails_validation() {
		let mut tileset = sample();
		tileset.caches.clear();
		assert!(tileset.validate_tier_config().is_err());
	}

	#[test]
	fn two_explicit_writers_fails_validation() {
		let mut tileset = sample();
		tileset.caches.push(CacheConfig { name: "disk2".into(), kind: CacheKind::Filesystem, path: Some("/tmp/mapcache-test2".into()), write: Some(true), detect_blank: None });
		tileset.caches[0].write = Some(true);
		assert!(tileset.validate_tier_config().is_err());
	}

	#[test]
	fn to_tileset_carries_configured_fields() {
		let tileset = sample().to_tileset();
		assert_eq!(tileset.metatile_cols, 4);
		assert_eq!(tileset.expires, Some(3600));
	}

	#[test]
	fn build_cache_honors_per_tier_detect_blank() {
		let dir = tempfile::tempdir().unwrap();
		let mut tileset = sample();
		tileset.caches[0].path = Some(dir.path().to_path_buf());
		tileset.caches[0].detect_blank = Some(true);
		tileset.build_cache().unwrap();
	}

	#[test]
	fn build_cache_opens_a_single_tier() {
		let dir = tempfile::tempdir().unwrap();
		let mut tileset = sample();
		tileset.caches[0].path = Some(dir.path().to_path_buf());
		tileset.build_cache().unwrap();
	}
}
