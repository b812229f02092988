use super::{Blob, Dimensions};
use std::time::SystemTime;

/// MIME type assigned to a blank-tile sentinel, compressed or expanded.
pub const BLANK_TILE_MIME: &str = "image/mapcache-rgba";

/// Side length (in pixels) a blank tile is expanded to on read. Without a
/// live grid-geometry registry to resolve a grid name's real tile size from
/// (grid geometry math is out of scope), every grid is treated as using the
/// standard WMTS/TMS tile size.
const STANDARD_TILE_SIDE: u32 = 256;

/// Coordinates identifying a tile's position within a grid: zoom level and
/// column/row, using the grid's native origin convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
	pub z: u32,
	pub x: u32,
	pub y: u32,
}

impl TileCoord {
	#[must_use]
	pub fn new(z: u32, x: u32, y: u32) -> Self {
		Self { z, x, y }
	}

	/// The lower-left corner of the metatile of the given size (in tiles)
	/// that contains this coordinate. All tiles sharing a metatile coalesce
	/// under one render lock.
	#[must_use]
	pub fn metatile_origin(&self, metatile_cols: u32, metatile_rows: u32) -> TileCoord {
		let cols = metatile_cols.max(1);
		let rows = metatile_rows.max(1);
		TileCoord { z: self.z, x: (self.x / cols) * cols, y: (self.y / rows) * rows }
	}
}

/// A tile's identity is `(tileset, grid, x, y, z, dimensions)`; its payload
/// (`encoded_data`, `mtime`, `nodata`) is mutated in place by cache backends
/// and the renderer as the request progresses.
#[derive(Debug, Clone)]
pub struct Tile {
	pub tileset: String,
	pub grid: String,
	pub coord: TileCoord,
	pub dimensions: Dimensions,

	/// Opaque encoded bytes (e.g. PNG/JPEG), or the blank-tile sentinel.
	pub encoded_data: Option<Blob>,
	/// MIME type of `encoded_data`.
	pub mime_type: Option<String>,
	/// Wall-clock last-modified time, populated by a cache hit.
	pub mtime: Option<SystemTime>,
	/// Set when `encoded_data` is (or was reconstructed from) the blank-tile
	/// sentinel: the tile is a single uniform color.
	pub nodata: bool,
}

impl Tile {
	#[must_use]
	pub fn new(tileset: impl Into<String>, grid: impl Into<String>, coord: TileCoord, dimensions: Dimensions) -> Self {
		Self {
			tileset: tileset.into(),
			grid: grid.into(),
			coord,
			dimensions,
			encoded_data: None,
			mime_type: None,
			mtime: None,
			nodata: false,
		}
	}

	/// The resource key used for cache storage and lock coalescing:
	/// `tileset + grid + z + x + y + dimension_signature`. Callers that need
	/// the metatile-coalesced variant should pass a `coord` already snapped to
	/// its metatile origin.
	#[must_use]
	pub fn resource_key(&self) -> String {
		let dims = self.dimensions.signature();
		if dims.is_empty() {
			format!("{}/{}/{}/{}/{}", self.tileset, self.grid, self.coord.z, self.coord.x, self.coord.y)
		} else {
			format!("{}/{}/{}/{}/{}/{}", self.tileset, self.grid, self.coord.z, self.coord.x, self.coord.y, dims)
		}
	}

	/// If `encoded_data` is exactly a 4-byte RGBA payload — this pipeline's
	/// convention for a renderer-reported uniform-color tile, since decoding
	/// a real raw image to check its pixels is out of scope — replace it
	/// with the 5-byte blank-tile sentinel for compact storage.
	pub fn compress_if_blank(&mut self) {
		if let Some(rgba) = self.raw_marker_rgba() {
			self.encoded_data = Some(Blob::blank_sentinel(rgba));
			self.mime_type = Some(BLANK_TILE_MIME.to_string());
			self.nodata = true;
		}
	}

	/// If `encoded_data` is a freshly-rendered uniform-color marker (the
	/// same convention [`Tile::compress_if_blank`] looks for), realize it
	/// into a full blank tile instead of the compact sentinel — for a tile
	/// about to be served to a client, not written to a backend.
	pub fn expand_rendered_blank(&mut self) {
		if let Some(rgba) = self.raw_marker_rgba() {
			self.realize_blank(rgba);
		}
	}

	/// If `encoded_data` is the on-disk blank-tile sentinel, expand it back
	/// to a full blank tile ("on read, expand back to a blank tile of the
	/// grid's tile size").
	pub fn expand_stored_blank(&mut self) {
		if let Some(rgba) = self.encoded_data.as_ref().and_then(Blob::as_blank_sentinel) {
			self.realize_blank(rgba);
		}
	}

	fn raw_marker_rgba(&self) -> Option<[u8; 4]> {
		match self.encoded_data.as_ref()?.as_slice() {
			[r, g, b, a] => Some([*r, *g, *b, *a]),
			_ => None,
		}
	}

	fn realize_blank(&mut self, rgba: [u8; 4]) {
		self.encoded_data = Some(Blob::expand_blank(rgba, STANDARD_TILE_SIDE, STANDARD_TILE_SIDE));
		self.mime_type = Some(BLANK_TILE_MIME.to_string());
		self.nodata = true;
	}
}
