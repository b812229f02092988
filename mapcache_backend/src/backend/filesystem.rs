use super::{CacheBackend, CacheOutcome};
use mapcache_core::{Blob, CacheError, ErrorCode, RequestContext, Tile};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Stores each tile as one file under a root directory, keyed by a
/// percent-encoded form of the tile's resource key so arbitrary tileset/grid
/// names never escape the cache directory or collide with reserved
/// characters.
pub struct FileSystemBackend {
	name: String,
	root: PathBuf,
	/// Opt-in (§6's `cache` node): compress a rendered uniform-color tile to
	/// the 5-byte blank sentinel before writing it.
	detect_blank: bool,
}

impl FileSystemBackend {
	pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, detect_blank: bool) -> Self {
		let root = root.into();
		fs::create_dir_all(&root).ok();
		Self { name: name.into(), root, detect_blank }
	}

	fn entry_path(&self, tile: &Tile) -> PathBuf {
		let encoded = percent_encode(&tile.resource_key());
		self.root.join(format!("{encoded}.tile"))
	}
}

/// Percent-encode everything but ASCII alphanumerics and a small set of
/// filename-safe punctuation, so the resulting string is always a valid
/// single path segment regardless of what the tile/grid/tileset names
/// contain.
fn percent_encode(key: &str) -> String {
	key.bytes()
		.map(|b| {
			if (b as char).is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b',') {
				(b as char).to_string()
			} else {
				format!("%{b:02x}")
			}
		})
		.collect()
}

impl CacheBackend for FileSystemBackend {
	fn name(&self) -> &str {
		&self.name
	}

	fn exists(&self, _ctx: &RequestContext, tile: &Tile) -> bool {
		self.entry_path(tile).exists()
	}

	fn get(&self, _ctx: &RequestContext, tile: &mut Tile) -> CacheOutcome {
		let path = self.entry_path(tile);
		if !path.exists() {
			return CacheOutcome::Miss;
		}
		match read_tile_file(&path) {
			Ok((data, mtime)) => {
				tile.encoded_data = Some(data);
				tile.mtime = Some(mtime);
				tile.expand_stored_blank();
				CacheOutcome::Success
			}
			Err(err) => CacheOutcome::Failure(CacheError::new(ErrorCode::Internal, err.to_string()).with_source(self.name.clone())),
		}
	}

	fn set(&self, _ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError> {
		let mut stored = tile.clone();
		if self.detect_blank {
			stored.compress_if_blank();
		}
		let Some(data) = &stored.encoded_data else {
			return Err(CacheError::new(ErrorCode::Internal, "set called with no encoded_data").with_source(self.name.clone()));
		};
		let path = self.entry_path(&stored);
		fs::write(&path, data.as_slice())
			.map_err(|e| CacheError::new(ErrorCode::Internal, e.to_string()).with_source(self.name.clone()))
	}

	fn delete(&self, _ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError> {
		let path = self.entry_path(tile);
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(CacheError::new(ErrorCode::Internal, e.to_string()).with_source(self.name.clone())),
		}
	}
}

fn read_tile_file(path: &Path) -> std::io::Result<(Blob, SystemTime)> {
	let mut file = File::open(path)?;
	let mtime = file.metadata()?.modified()?;
	let mut buf = Vec::new();
	file.read_to_end(&mut buf)?;
	Ok((Blob::from(buf), mtime))
}
