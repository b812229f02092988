use super::GridLink;

/// Names a logical layer: its cache/source, the grids it is served through,
/// its expiration policy, format, and metatiling. Immutable once configured
/// (populated at boot, never mutated by request handling).
#[derive(Debug, Clone)]
pub struct Tileset {
	pub name: String,
	pub cache_name: String,
	pub grids: Vec<GridLink>,
	pub format: String,
	/// Metatile factor in tile columns/rows; `(1, 1)` disables metatiling.
	pub metatile_cols: u32,
	pub metatile_rows: u32,
	/// Extra tiles rendered around the metatile to avoid rendering seams.
	pub metabuffer: u32,
	pub watermark: Option<String>,
	/// Seconds until a served tile is considered stale for `Cache-Control`.
	pub expires: Option<u64>,
	pub read_only: bool,
	/// Upstream WMS/tile source URL, for tilesets that proxy instead of (or
	/// in addition to) rendering locally.
	pub source: Option<String>,
}

impl Tileset {
	#[must_use]
	pub fn grid_link(&self, grid_name: &str) -> Option<&GridLink> {
		self.grids.iter().find(|link| link.grid_name == grid_name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Tileset {
		Tileset {
			name: "basemap".into(),
			cache_name: "disk".into(),
			grids: vec![GridLink::new("webmercator")],
			format: "image/png".into(),
			metatile_cols: 5,
			metatile_rows: 5,
			metabuffer: 1,
			watermark: None,
			expires: Some(3600),
			read_only: false,
			source: None,
		}
	}

	#[test]
	fn finds_declared_grid_link() {
		let tileset = sample();
		assert!(tileset.grid_link("webmercator").is_some());
		assert!(tileset.grid_link("nonexistent").is_none());
	}
}
