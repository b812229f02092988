//! Host and per-alias configuration (§4.H, §4.K): YAML-deserialized structs,
//! `override_optional_*` merge helpers, and the boot-time validation pass
//! that aggregates every problem into one error instead of failing on the
//! first one found.

mod alias;
mod host;
mod pool;
mod tileset;

pub use alias::AliasConfig;
pub use host::HostConfig;
pub(crate) use host::{match_endpoint, normalize_slashes};
pub use pool::PoolOverrides;
pub use tileset::{CacheConfig, CacheKind, GridConfig, LockerConfig, LockerKind, TilesetConfig};

use anyhow::{Result, bail};
use mapcache_derive::context;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

impl HostConfig {
	#[context("parsing host config from reader (YAML)")]
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	#[context("parsing host config from string (YAML)")]
	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	#[context("reading host config file '{}'", path.display())]
	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path)?;
		let cfg = Self::from_reader(BufReader::new(file))?;
		cfg.validate()?;
		Ok(cfg)
	}

	/// Validate every alias, aggregating every violation into one error
	/// rather than stopping at the first.
	pub fn validate(&self) -> Result<()> {
		let mut problems = Vec::new();

		if self.aliases.is_empty() {
			problems.push("host config declares no aliases".to_string());
		}

		for alias in &self.aliases {
			if alias.endpoint.trim_matches('/').is_empty() {
				problems.push(format!("alias '{}' has an empty endpoint", alias.endpoint));
			}
			if let Err(err) = alias.tileset.validate_tier_config() {
				problems.push(format!("alias '{}': {err}", alias.endpoint));
			}
		}

		if !problems.is_empty() {
			bail!("host config validation failed:\n  - {}", problems.join("\n  - "));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_config_has_no_aliases_and_fails_validation() {
		let cfg = HostConfig::from_string("aliases: []").unwrap();
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn parses_minimal_single_alias_config() {
		let yaml = r#"
aliases:
  - endpoint: /osm
    tileset:
      name: osm
      format: image/png
      caches:
        - name: disk
          kind: filesystem
          path: /tmp/mapcache-osm
"#;
		let cfg = HostConfig::from_string(yaml).unwrap();
		assert_eq!(cfg.aliases.len(), 1);
		assert_eq!(cfg.aliases[0].endpoint, "/osm");
		cfg.validate().unwrap();
	}
}
