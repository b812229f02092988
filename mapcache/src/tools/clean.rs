//! `mapcache clean` (§4.L): walk a tile range and delete every matching tile
//! from the configured cache, fanning out to every tier.

use super::{find_alias, zoom_range};
use crate::config::HostConfig;
use anyhow::Result;
use mapcache_backend::CacheBackend;
use mapcache_core::{Dimensions, RequestContext, Tile, TileCoord};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Path to the host configuration file (YAML).
	#[arg(short = 'c', long, value_name = "FILE")]
	pub config: PathBuf,

	/// Endpoint of the alias to purge, e.g. "/osm".
	#[arg(long)]
	pub alias: String,

	/// Grid to purge tiles for.
	#[arg(long)]
	pub grid: String,

	#[arg(long, default_value_t = 0)]
	pub min_zoom: u32,
	#[arg(long)]
	pub max_zoom: u32,

	#[arg(long, default_value_t = 0)]
	pub min_x: u32,
	#[arg(long)]
	pub max_x: u32,
	#[arg(long, default_value_t = 0)]
	pub min_y: u32,
	#[arg(long)]
	pub max_y: u32,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let host = HostConfig::from_path(&arguments.config)?;
	let alias = find_alias(&host, &arguments.alias)?;
	let cache = alias.tileset.build_cache()?;
	let ctx = RequestContext::new();

	let mut deleted = 0usize;
	let mut failed = 0usize;
	for z in zoom_range(arguments.min_zoom, arguments.max_zoom)? {
		for x in arguments.min_x..=arguments.max_x {
			for y in arguments.min_y..=arguments.max_y {
				let coord = TileCoord::new(z, x, y);
				let tile = Tile::new(&alias.tileset.name, &arguments.grid, coord, Dimensions::new());
				match cache.delete(&ctx, &tile) {
					Ok(()) => deleted += 1,
					Err(err) => {
						log::warn!("delete {z}/{x}/{y} failed: {err}");
						failed += 1;
					}
				}
			}
		}
	}
	log::info!("deleted {deleted} tiles, {failed} failures, for alias '{}'", arguments.alias);
	Ok(())
}
