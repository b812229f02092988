use super::{CacheBackend, CacheOutcome};
use mapcache_core::{Blob, CacheError, ErrorCode, RequestContext, Tile};
use r2d2::Pool;
use r2d2_sqlite::{SqliteConnectionManager, rusqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stores tiles in a single SQLite database, one row per resource key,
/// borrowing connections from an `r2d2` pool the way this codebase's MBTiles
/// reader borrows connections for tile lookups.
pub struct SqliteBackend {
	name: String,
	pool: Pool<SqliteConnectionManager>,
	/// Opt-in (§6's `cache` node): compress a rendered uniform-color tile to
	/// the 5-byte blank sentinel before writing it.
	detect_blank: bool,
}

impl SqliteBackend {
	pub fn open(name: impl Into<String>, path: &Path, detect_blank: bool) -> Result<Self, CacheError> {
		let manager = SqliteConnectionManager::file(path);
		let pool = Pool::builder()
			.max_size(10)
			.build(manager)
			.map_err(|e| CacheError::new(ErrorCode::Internal, format!("opening sqlite cache: {e}")))?;

		let conn = pool
			.get()
			.map_err(|e| CacheError::new(ErrorCode::Internal, format!("borrowing sqlite connection: {e}")))?;
		conn.execute(
			"CREATE TABLE IF NOT EXISTS tiles (key TEXT PRIMARY KEY, data BLOB NOT NULL, mtime INTEGER NOT NULL)",
			[],
		)
		.map_err(|e| CacheError::new(ErrorCode::Internal, format!("creating tiles table: {e}")))?;

		Ok(Self { name: name.into(), pool, detect_blank })
	}

	fn borrow(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, CacheError> {
		self.pool
			.get()
			.map_err(|e| CacheError::unavailable(format!("sqlite pool exhausted: {e}")).with_source(self.name.clone()))
	}
}

impl CacheBackend for SqliteBackend {
	fn name(&self) -> &str {
		&self.name
	}

	fn exists(&self, _ctx: &RequestContext, tile: &Tile) -> bool {
		let Ok(conn) = self.borrow() else { return false };
		conn.query_row("SELECT 1 FROM tiles WHERE key = ?1", [tile.resource_key()], |_| Ok(()))
			.is_ok()
	}

	fn get(&self, _ctx: &RequestContext, tile: &mut Tile) -> CacheOutcome {
		let conn = match self.borrow() {
			Ok(conn) => conn,
			Err(err) => return CacheOutcome::Failure(err),
		};
		let row = conn.query_row("SELECT data, mtime FROM tiles WHERE key = ?1", [tile.resource_key()], |row| {
			let data: Vec<u8> = row.get(0)?;
			let mtime: i64 = row.get(1)?;
			Ok((data, mtime))
		});
		match row {
			Ok((data, mtime)) => {
				tile.encoded_data = Some(Blob::from(data));
				tile.mtime = Some(UNIX_EPOCH + std::time::Duration::from_secs(mtime.max(0) as u64));
				tile.expand_stored_blank();
				CacheOutcome::Success
			}
			Err(rusqlite::Error::QueryReturnedNoRows) => CacheOutcome::Miss,
			Err(e) => CacheOutcome::Failure(CacheError::new(ErrorCode::Internal, e.to_string()).with_source(self.name.clone())),
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
		let conn = self.borrow()?;
		let mtime = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
		conn.execute(
			"INSERT INTO tiles (key, data, mtime) VALUES (?1, ?2, ?3)
			 ON CONFLICT(key) DO UPDATE SET data = excluded.data, mtime = excluded.mtime",
			rusqlite::params![stored.resource_key(), data.as_slice(), mtime],
		)
		.map_err(|e| CacheError::new(ErrorCode::Internal, e.to_string()).with_source(self.name.clone()))?;
		Ok(())
	}

	fn delete(&self, _ctx: &RequestContext, tile: &Tile) -> Result<(), CacheError> {
		let conn = self.borrow()?;
		conn.execute("DELETE FROM tiles WHERE key = ?1", [tile.resource_key()])
			.map_err(|e| CacheError::new(ErrorCode::Internal, e.to_string()).with_source(self.name.clone()))?;
		Ok(())
	}
}
