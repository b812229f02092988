//! Fetch-or-render pipeline (§4.F): cache lookup, metatile-aligned lock
//! coalescing, external-render invocation, and blank-tile detection.

use crate::backend::{CacheBackend, CacheOutcome};
use crate::locker::{Locker, lock_or_wait};
use mapcache_core::{CacheError, Dimensions, ErrorCode, RequestContext, Tile, TileCoord, Tileset};
use std::time::SystemTime;

/// The external renderer is out of scope (tile-image generation); the
/// pipeline depends on this trait so coalescing/locking/caching is fully
/// exercised against a fake implementation.
pub trait Renderer: Send + Sync {
	/// Render every tile of the metatile whose lower-left corner is
	/// `metatile_origin`, returning one [`Tile`] per child position with
	/// `encoded_data` populated.
	fn render_metatile(
		&self,
		ctx: &RequestContext,
		tileset: &Tileset,
		grid_name: &str,
		metatile_origin: TileCoord,
		dimensions: &Dimensions,
	) -> Result<Vec<Tile>, CacheError>;
}

/// Drives the `get → miss → lock → get → render → set → unlock` sequence
/// for one tileset against one cache backend and locker.
pub struct TilePipeline<'a> {
	pub cache: &'a dyn CacheBackend,
	pub locker: &'a dyn Locker,
	pub renderer: &'a dyn Renderer,
}

/// Outcome of [`TilePipeline::fetch`], carrying enough to build the HTTP
/// response (bytes + MIME + Last-Modified) or the error to surface.
pub enum FetchOutcome {
	Hit(Tile),
	Failure(CacheError),
}

impl<'a> TilePipeline<'a> {
	#[must_use]
	pub fn new(cache: &'a dyn CacheBackend, locker: &'a dyn Locker, renderer: &'a dyn Renderer) -> Self {
		Self { cache, locker, renderer }
	}

	/// Fetch one tile, rendering its metatile on a cache miss.
	pub fn fetch(&self, ctx: &RequestContext, tileset: &Tileset, grid_name: &str, coord: TileCoord, dimensions: &Dimensions) -> FetchOutcome {
		let mut tile = Tile::new(tileset.name.clone(), grid_name.to_string(), coord, dimensions.clone());

		match self.cache.get(ctx, &mut tile) {
			CacheOutcome::Success => {
				if tile.mime_type.is_none() {
					tile.mime_type = Some(tileset.format.clone());
				}
				return FetchOutcome::Hit(tile);
			}
			CacheOutcome::Failure(err) => return FetchOutcome::Failure(err),
			CacheOutcome::Miss => {}
		}

		let metatile_origin = coord.metatile_origin(tileset.metatile_cols.max(1), tileset.metatile_rows.max(1));
		let resource = Tile::new(tileset.name.clone(), grid_name.to_string(), metatile_origin, dimensions.clone()).resource_key();

		match lock_or_wait(ctx, self.locker, &resource) {
			Some(token) => {
				let result = self.render_and_store(ctx, tileset, grid_name, metatile_origin, dimensions, &mut tile);
				if let Err(err) = self.locker.release(ctx, &token) {
					log::warn!("releasing render lock for '{resource}' failed: {err}");
				}
				match result {
					Ok(()) => FetchOutcome::Hit(tile),
					Err(err) => FetchOutcome::Failure(err),
				}
			}
			None => {
				// Another worker rendered (or the wait timed out); one
				// coalescing re-read is permitted before giving up.
				match self.cache.get(ctx, &mut tile) {
					CacheOutcome::Success => {
						if tile.mime_type.is_none() {
							tile.mime_type = Some(tileset.format.clone());
						}
						FetchOutcome::Hit(tile)
					}
					CacheOutcome::Miss => FetchOutcome::Failure(CacheError::not_found(format!("tile '{}' still missing after coalesced render", tile.resource_key()))),
					CacheOutcome::Failure(err) => FetchOutcome::Failure(err),
				}
			}
		}
	}

	fn render_and_store(
		&self,
		ctx: &RequestContext,
		tileset: &Tileset,
		grid_name: &str,
		metatile_origin: TileCoord,
		dimensions: &Dimensions,
		requested: &mut Tile,
	) -> Result<(), CacheError> {
		let rendered = self.renderer.render_metatile(ctx, tileset, grid_name, metatile_origin, dimensions)?;

		self.cache.multi_set(ctx, &rendered)?;

		let requested_key = requested.resource_key();
		if let Some(mut found) = rendered.into_iter().find(|t| t.resource_key() == requested_key) {
			found.expand_rendered_blank();
			requested.encoded_data = found.encoded_data;
			requested.mime_type = found.mime_type.or_else(|| Some(tileset.format.clone()));
			requested.nodata = found.nodata;
			requested.mtime = Some(SystemTime::now());
			Ok(())
		} else {
			Err(CacheError::new(ErrorCode::Internal, format!("renderer did not produce requested tile '{requested_key}'")))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::FileSystemBackend;
	use crate::locker::DiskLocker;
	use mapcache_core::{Blob, GridLink};
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingRenderer {
		calls: AtomicUsize,
	}

	impl Renderer for CountingRenderer {
		fn render_metatile(
			&self,
			_ctx: &RequestContext,
			tileset: &Tileset,
			grid_name: &str,
			metatile_origin: TileCoord,
			dimensions: &Dimensions,
		) -> Result<Vec<Tile>, CacheError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			let mut tile = Tile::new(tileset.name.clone(), grid_name.to_string(), metatile_origin, dimensions.clone());
			tile.encoded_data = Some(Blob::from(vec![1, 2, 3]));
			Ok(vec![tile])
		}
	}

	fn sample_tileset() -> Tileset {
		Tileset {
			name: "basemap".into(),
			cache_name: "disk".into(),
			grids: vec![GridLink::new("webmercator")],
			format: "image/png".into(),
			metatile_cols: 1,
			metatile_rows: 1,
			metabuffer: 0,
			watermark: None,
			expires: None,
			read_only: false,
			source: None,
		}
	}

	#[test]
	fn cold_miss_renders_once_and_caches() {
		let dir = tempfile::tempdir().unwrap();
		let cache = FileSystemBackend::new("disk", dir.path().join("tiles"), false);
		let locker = DiskLocker::new(dir.path().join("locks"));
		let renderer = CountingRenderer { calls: AtomicUsize::new(0) };
		let pipeline = TilePipeline::new(&cache, &locker, &renderer);
		let ctx = RequestContext::new();
		let tileset = sample_tileset();

		match pipeline.fetch(&ctx, &tileset, "webmercator", TileCoord::new(3, 4, 5), &Dimensions::new()) {
			FetchOutcome::Hit(tile) => assert_eq!(tile.encoded_data.unwrap().as_slice(), &[1, 2, 3]),
			FetchOutcome::Failure(err) => panic!("expected a hit, got {err}"),
		}
		assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);

		// Second request for the same tile is now a cache hit; no re-render.
		match pipeline.fetch(&ctx, &tileset, "webmercator", TileCoord::new(3, 4, 5), &Dimensions::new()) {
			FetchOutcome::Hit(_) => {}
			FetchOutcome::Failure(err) => panic!("expected a hit, got {err}"),
		}
		assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
	}

	struct BlankRenderer;

	impl Renderer for BlankRenderer {
		fn render_metatile(
			&self,
			_ctx: &RequestContext,
			tileset: &Tileset,
			grid_name: &str,
			metatile_origin: TileCoord,
			dimensions: &Dimensions,
		) -> Result<Vec<Tile>, CacheError> {
			let mut tile = Tile::new(tileset.name.clone(), grid_name.to_string(), metatile_origin, dimensions.clone());
			tile.encoded_data = Some(Blob::from(vec![9, 9, 9, 0]));
			Ok(vec![tile])
		}
	}

	#[test]
	fn blank_tile_is_compressed_to_sentinel_in_storage_and_expanded_on_response() {
		let dir = tempfile::tempdir().unwrap();
		let cache = FileSystemBackend::new("disk", dir.path().join("tiles"), true);
		let locker = DiskLocker::new(dir.path().join("locks"));
		let renderer = BlankRenderer;
		let pipeline = TilePipeline::new(&cache, &locker, &renderer);
		let ctx = RequestContext::new();
		let tileset = sample_tileset();

		match pipeline.fetch(&ctx, &tileset, "webmercator", TileCoord::new(0, 0, 0), &Dimensions::new()) {
			FetchOutcome::Hit(tile) => {
				assert!(tile.nodata);
				assert_eq!(tile.mime_type.as_deref(), Some(mapcache_core::BLANK_TILE_MIME));
				let data = tile.encoded_data.unwrap();
				assert_eq!(data.len(), 256 * 256 * 4);
				assert_eq!(&data.as_slice()[0..4], &[9, 9, 9, 0]);
			}
			FetchOutcome::Failure(err) => panic!("expected a hit, got {err}"),
		}

		// The backend itself stored only the 5-byte sentinel, not a full tile.
		let tiles_dir = dir.path().join("tiles");
		let entry = std::fs::read_dir(&tiles_dir).unwrap().next().unwrap().unwrap();
		assert_eq!(std::fs::metadata(entry.path()).unwrap().len(), 5);
	}
}
