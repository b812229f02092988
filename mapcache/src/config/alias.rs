use super::{PoolOverrides, TilesetConfig};
use serde::Deserialize;

/// One mounted endpoint: the path prefix it's matched under, its own pool
/// overrides, and the tileset it serves.
// `deny_unknown_fields` is incompatible with `#[serde(flatten)]`, which
// `pool` below relies on.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AliasConfig {
	pub endpoint: String,

	#[serde(flatten, default)]
	pub pool: PoolOverrides,

	pub tileset: TilesetConfig,
}
