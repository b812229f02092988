//! `mapcache seed` (§4.L): walk a tile range and populate the cache via the
//! tile pipeline, rendering on miss exactly like a live GET_TILE request
//! would.

use super::{find_alias, zoom_range};
use crate::config::HostConfig;
use crate::server::StubRenderer;
use anyhow::Result;
use mapcache_backend::pipeline::{FetchOutcome, TilePipeline};
use mapcache_core::{Dimensions, RequestContext, TileCoord};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Path to the host configuration file (YAML).
	#[arg(short = 'c', long, value_name = "FILE")]
	pub config: PathBuf,

	/// Endpoint of the alias to seed, e.g. "/osm".
	#[arg(long)]
	pub alias: String,

	/// Grid to seed tiles for.
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
	let locker = alias.tileset.build_locker()?;
	let tileset = alias.tileset.to_tileset();
	let renderer = StubRenderer;
	let pipeline = TilePipeline::new(&cache, &*locker, &renderer);

	let mut seeded = 0usize;
	let mut failed = 0usize;
	for z in zoom_range(arguments.min_zoom, arguments.max_zoom)? {
		for x in arguments.min_x..=arguments.max_x {
			for y in arguments.min_y..=arguments.max_y {
				let ctx = RequestContext::new();
				let coord = TileCoord::new(z, x, y);
				match pipeline.fetch(&ctx, &tileset, &arguments.grid, coord, &Dimensions::new()) {
					FetchOutcome::Hit(_) => seeded += 1,
					FetchOutcome::Failure(err) => {
						log::warn!("seed {z}/{x}/{y} failed: {err}");
						failed += 1;
					}
				}
			}
		}
	}
	log::info!("seeded {seeded} tiles, {failed} failures, for alias '{}'", arguments.alias);
	Ok(())
}
