//! The stand-in [`Renderer`] this binary wires into [`TilePipeline`] when no
//! real tile-image generator is registered.
//!
//! Tile-image generation is out of scope (see the pipeline module's own
//! doc comment); `StubRenderer` keeps every cache/lock/pool code path fully
//! reachable from an HTTP request without requiring one, reporting
//! `Unavailable` exactly like [`mapcache_backend::backend::StubBackend`]
//! does for an unimplemented cache driver.

use mapcache_backend::pipeline::Renderer;
use mapcache_core::{CacheError, Dimensions, RequestContext, Tile, TileCoord, Tileset};

pub struct StubRenderer;

impl Renderer for StubRenderer {
	fn render_metatile(
		&self,
		_ctx: &RequestContext,
		tileset: &Tileset,
		_grid_name: &str,
		_metatile_origin: TileCoord,
		_dimensions: &Dimensions,
	) -> Result<Vec<Tile>, CacheError> {
		Err(CacheError::unavailable(format!("no renderer registered for tileset '{}'", tileset.name)))
	}
}
