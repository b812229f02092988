use mapcache_backend::PoolConfig;
use serde::Deserialize;
use std::time::Duration;

/// Pool sizing knobs as they appear in YAML: every field is optional so an
/// absent value means "inherit from whatever this is merged over", matching
/// the `Option<T>`-as-is-set-bit convention used throughout the host config.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PoolOverrides {
	pub pool_min: Option<usize>,
	pub pool_smax: Option<usize>,
	pub pool_hmax: Option<usize>,
	/// Seconds.
	pub pool_ttl: Option<u64>,
	pub pool_sharing: Option<bool>,
}

impl PoolOverrides {
	pub fn override_optional_pool_min(&mut self, value: &Option<usize>) {
		if value.is_some() {
			self.pool_min = *value;
		}
	}
	pub fn override_optional_pool_smax(&mut self, value: &Option<usize>) {
		if value.is_some() {
			self.pool_smax = *value;
		}
	}
	pub fn override_optional_pool_hmax(&mut self, value: &Option<usize>) {
		if value.is_some() {
			self.pool_hmax = *value;
		}
	}
	pub fn override_optional_pool_ttl(&mut self, value: &Option<u64>) {
		if value.is_some() {
			self.pool_ttl = *value;
		}
	}
	pub fn override_optional_pool_sharing(&mut self, value: &Option<bool>) {
		if value.is_some() {
			self.pool_sharing = *value;
		}
	}

	/// Layer `self` (host defaults) with `other` (a per-alias override)
	/// winning wherever it is set.
	#[must_use]
	pub fn merged_with(&self, other: &PoolOverrides) -> PoolOverrides {
		let mut merged = self.clone();
		merged.override_optional_pool_min(&other.pool_min);
		merged.override_optional_pool_smax(&other.pool_smax);
		merged.override_optional_pool_hmax(&other.pool_hmax);
		merged.override_optional_pool_ttl(&other.pool_ttl);
		merged.override_optional_pool_sharing(&other.pool_sharing);
		merged
	}

	/// Resolve into a concrete [`PoolConfig`], filling any still-unset field
	/// from `PoolConfig::default()`.
	#[must_use]
	pub fn resolve(&self) -> PoolConfig {
		let default = PoolConfig::default();
		PoolConfig {
			min: self.pool_min.unwrap_or(default.min),
			smax: self.pool_smax.unwrap_or(default.smax),
			hmax: self.pool_hmax.unwrap_or(default.hmax),
			ttl: self.pool_ttl.map_or(default.ttl, Duration::from_secs),
			acquire_timeout: default.acquire_timeout,
		}
	}

	#[must_use]
	pub fn sharing_enabled(&self) -> bool {
		self.pool_sharing.unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn per_alias_override_wins_over_host_default() {
		let host_default = PoolOverrides { pool_min: Some(1), pool_smax: Some(5), ..Default::default() };
		let alias_override = PoolOverrides { pool_smax: Some(20), ..Default::default() };
		let merged = host_default.merged_with(&alias_override);
		assert_eq!(merged.pool_min, Some(1));
		assert_eq!(merged.pool_smax, Some(20));
	}

	#[test]
	fn unset_fields_fall_back_to_pool_config_default() {
		let overrides = PoolOverrides::default();
		let resolved = overrides.resolve();
		assert_eq!(resolved.min, PoolConfig::default().min);
	}
}
