//! CLI subcommand implementations (§4.L), one module per subcommand,
//! mirroring this codebase's own `tools::{convert, probe, serve}` layout.

pub mod clean;
pub mod seed;
pub mod serve;

use crate::config::{AliasConfig, HostConfig};
use anyhow::{Context, Result, bail};

/// Resolve `alias_endpoint`/`grid_name` against a parsed host config, for the
/// `seed`/`clean` tools that operate on one alias's tile range rather than
/// the whole router.
fn find_alias<'a>(host: &'a HostConfig, alias_endpoint: &str) -> Result<&'a AliasConfig> {
	host.aliases.iter().find(|a| a.endpoint == alias_endpoint).with_context(|| format!("no alias '{alias_endpoint}' in this host config"))
}

fn zoom_range(min_zoom: u32, max_zoom: u32) -> Result<std::ops::RangeInclusive<u32>> {
	if min_zoom > max_zoom {
		bail!("min-zoom {min_zoom} is greater than max-zoom {max_zoom}");
	}
	Ok(min_zoom..=max_zoom)
}
