//! Turns a [`FetchOutcome`]/[`CacheError`]/[`ProxyResponse`] into the HTTP
//! response the dispatcher's caller actually sends, including the
//! conditional-GET (`If-Modified-Since` → 304) and `Cache-Control` handling
//! named in the external-interfaces surface.

use super::proxy::ProxyResponse;
use axum::body::Body;
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use mapcache_backend::pipeline::FetchOutcome;
use mapcache_core::{CacheError, Tile, Tileset};
use std::time::SystemTime;

/// Build the response for a successful or failed tile fetch, honoring
/// `if_modified_since` against the tile's `mtime`.
pub fn tile_response(outcome: FetchOutcome, tileset: &Tileset, if_modified_since: Option<SystemTime>) -> Response {
	match outcome {
		FetchOutcome::Hit(tile) => ok_or_not_modified(&tile, tileset, if_modified_since),
		FetchOutcome::Failure(err) => error_response(&err),
	}
}

fn ok_or_not_modified(tile: &Tile, tileset: &Tileset, if_modified_since: Option<SystemTime>) -> Response {
	let Some(data) = &tile.encoded_data else {
		return error_response(&CacheError::internal(format!("tile '{}' has no payload after a reported hit", tile.resource_key())));
	};

	if let (Some(mtime), Some(since)) = (tile.mtime, if_modified_since) {
		if mtime <= since {
			return with_common_headers(Response::builder().status(StatusCode::NOT_MODIFIED), tile, tileset).body(Body::empty()).unwrap();
		}
	}

	with_common_headers(Response::builder().status(StatusCode::OK), tile, tileset).body(Body::from(data.as_slice().to_vec())).unwrap()
}

fn with_common_headers(mut builder: axum::http::response::Builder, tile: &Tile, tileset: &Tileset) -> axum::http::response::Builder {
	if let Some(mime) = &tile.mime_type {
		builder = builder.header(header::CONTENT_TYPE, mime);
	}
	if let Some(mtime) = tile.mtime {
		builder = builder.header(header::LAST_MODIFIED, httpdate::fmt_http_date(mtime));
	}
	if let Some(expires) = tileset.expires {
		builder = builder.header(header::CACHE_CONTROL, format!("max-age={expires}"));
	}
	if tile.nodata {
		builder = builder.header(HeaderName::from_static("x-mapcache-nodata"), "true");
	}
	builder
}

/// Map a [`CacheError`] onto its HTTP status 1:1 (§7), with the message as
/// the plain-text body — a real service-format error artifact (error tile
/// image, WMS `ServiceException` XML) is out of scope.
pub fn error_response(err: &CacheError) -> Response {
	let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	(status, err.message.clone()).into_response()
}

/// Relay an upstream proxy response verbatim.
pub fn proxy_response(response: ProxyResponse) -> Response {
	let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
	let mut builder = Response::builder().status(status);
	for (name, value) in response.headers {
		builder = builder.header(name, value);
	}
	builder.body(Body::from(response.body)).unwrap()
}

/// Response for a dispatcher classification whose downstream rendering
/// (WMS image compositing, capabilities-document serialization,
/// feature-info source delegation) is out of scope.
pub fn not_implemented(what: &str) -> Response {
	(StatusCode::NOT_IMPLEMENTED, format!("{what} is not implemented by this build")).into_response()
}
