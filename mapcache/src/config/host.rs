use super::{AliasConfig, PoolOverrides};
use serde::Deserialize;

/// Top-level host configuration: pool defaults plus an ordered list of
/// aliases, scanned in registration order at request time (§4.H).
// `deny_unknown_fields` is incompatible with `#[serde(flatten)]`, which
// `pool_defaults` below relies on.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct HostConfig {
	#[serde(flatten)]
	pub pool_defaults: PoolOverrides,

	#[serde(default)]
	pub aliases: Vec<AliasConfig>,
}

impl HostConfig {
	/// Pool configuration for one alias, with the alias's own overrides
	/// layered over the host defaults.
	#[must_use]
	pub fn pool_overrides_for(&self, alias: &AliasConfig) -> PoolOverrides {
		self.pool_defaults.merged_with(&alias.pool)
	}

	/// Find the alias whose endpoint matches `path`, treating runs of `/` as
	/// equivalent to a single separator, returning the alias and the
	/// remaining (normalized) path-info suffix.
	#[must_use]
	pub fn match_alias(&self, path: &str) -> Option<(&AliasConfig, String)> {
		for alias in &self.aliases {
			if let Some(path_info) = match_endpoint(&alias.endpoint, path) {
				return Some((alias, path_info));
			}
		}
		None
	}
}

/// Normalize runs of `/` to one, then check `path` starts with `endpoint`
/// (also normalized) on a segment boundary, returning the remainder.
///
/// `pub(crate)` so [`super::super::server::router::AliasRouter`] can apply
/// the same rule to its live-alias list instead of re-implementing it.
pub(crate) fn match_endpoint(endpoint: &str, path: &str) -> Option<String> {
	let normalized_endpoint = normalize_slashes(endpoint);
	let trimmed_endpoint = normalized_endpoint.trim_matches('/');
	let normalized_path = normalize_slashes(path);
	let trimmed_path = normalized_path.trim_start_matches('/');

	let rest = trimmed_path.strip_prefix(trimmed_endpoint)?;
	if rest.is_empty() || rest.starts_with('/') {
		Some(rest.to_string())
	} else {
		None
	}
}

pub(crate) fn normalize_slashes(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let mut last_was_slash = false;
	for c in value.chars() {
		if c == '/' {
			if !last_was_slash {
				out.push('/');
			}
			last_was_slash = true;
		} else {
			out.push(c);
			last_was_slash = false;
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::TilesetConfig;

	fn alias(endpoint: &str) -> AliasConfig {
		AliasConfig {
			endpoint: endpoint.to_string(),
			pool: PoolOverrides::default(),
			tileset: TilesetConfig { name: "basemap".into(), format: "image/png".into(), caches: vec![], locker: None, grids: vec![], metatile_cols: None, metatile_rows: None, expires: None, source: None },
		}
	}

	#[test]
	fn matches_exact_endpoint_with_empty_path_info() {
		let host = HostConfig { pool_defaults: PoolOverrides::default(), aliases: vec![alias("/osm")] };
		let (matched, path_info) = host.match_alias("/osm").unwrap();
		assert_eq!(matched.endpoint, "/osm");
		assert_eq!(path_info, "");
	}

	#[test]
	fn matches_with_path_info_suffix() {
		let host = HostConfig { pool_defaults: PoolOverrides::default(), aliases: vec![alias("/osm")] };
		let (_, path_info) = host.match_alias("/osm/wmts/1.0.0/tile").unwrap();
		assert_eq!(path_info, "/wmts/1.0.0/tile");
	}

	#[test]
	fn collapses_duplicate_slashes_on_both_sides() {
		let host = HostConfig { pool_defaults: PoolOverrides::default(), aliases: vec![alias("//osm//")] };
		assert!(host.match_alias("/osm/tile").is_some());
	}

	#[test]
	fn first_registered_alias_wins_on_overlap() {
		let host = HostConfig { pool_defaults: PoolOverrides::default(), aliases: vec![alias("/osm"), alias("/osm/special")] };
		let (matched, _) = host.match_alias("/osm/special/x").unwrap();
		assert_eq!(matched.endpoint, "/osm");
	}

	#[test]
	fn no_match_for_unrelated_path() {
		let host = HostConfig { pool_defaults: PoolOverrides::default(), aliases: vec![alias("/osm")] };
		assert!(host.match_alias("/other").is_none());
	}
}
