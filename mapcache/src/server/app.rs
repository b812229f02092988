//! HTTP server lifecycle: composes the `Dispatcher`/`AliasRouter`/`TilePipeline`
//! into one `axum::Router`, applies the cross-cutting middleware stack
//! (timeouts, concurrency limiting, panic catching), and owns the
//! listen/graceful-shutdown cycle.

use super::dispatch::{self, Dispatcher, ParsedRequest, default_dispatcher};
use super::proxy::{self, ProxyRequest};
use super::response;
use super::router::AliasRouter;
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method as AxumMethod, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{BoxError, Router};
use mapcache_backend::pipeline::{Renderer, TilePipeline};
use mapcache_backend::PoolRegistry;
use mapcache_core::{CacheError, RequestContext};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

#[derive(Clone)]
pub struct AppState {
	pub router: Arc<AliasRouter>,
	pub dispatcher: Arc<Dispatcher>,
	pub renderer: Arc<dyn Renderer>,
	/// HTTP clients used for proxied requests, pooled per alias (or shared
	/// across the host when `pool_sharing` is set) instead of one
	/// `reqwest::Client` per request.
	pub http_pool: Arc<PoolRegistry<Client>>,
	pub server_name: String,
}

/// Owns the listening socket and the graceful-shutdown handshake, mirroring
/// this codebase's own server lifecycle type: idempotent `start`/`stop`,
/// in-flight requests drained before the listener task exits.
pub struct MapCacheServer {
	ip: String,
	port: u16,
	state: AppState,
	exit_signal: Option<oneshot::Sender<()>>,
	join: Option<tokio::task::JoinHandle<()>>,
}

impl MapCacheServer {
	#[must_use]
	pub fn new(ip: impl Into<String>, port: u16, state: AppState) -> Self {
		Self { ip: ip.into(), port, state, exit_signal: None, join: None }
	}

	pub async fn start(&mut self) -> Result<()> {
		if self.exit_signal.is_some() || self.join.is_some() {
			self.stop().await;
		}

		log::info!("starting server");

		let overload_handler = axum::error_handling::HandleErrorLayer::new(|_err: BoxError| async move {
			let mut resp = (StatusCode::SERVICE_UNAVAILABLE, "service overloaded, try later").into_response();
			resp.headers_mut().insert("Retry-After", "2".parse().unwrap());
			Ok::<_, std::convert::Infallible>(resp)
		});

		let protection = ServiceBuilder::new()
			.layer(overload_handler)
			.layer(CatchPanicLayer::new())
			.layer(tower::timeout::TimeoutLayer::new(Duration::from_secs(30)))
			.layer(tower::buffer::BufferLayer::new(512))
			.layer(tower::limit::ConcurrencyLimitLayer::new(1024))
			.layer(tower::load_shed::LoadShedLayer::new());

		let router = Router::new().route("/{*path}", any(handle)).with_state(self.state.clone()).layer(protection);

		let addr = format!("{}:{}", self.ip, self.port);
		log::info!("server binding on {addr}");
		let listener = TcpListener::bind(&addr).await?;
		if self.port == 0 {
			self.port = listener.local_addr()?.port();
		}

		let (tx, rx) = oneshot::channel::<()>();
		let handle = tokio::spawn(async move {
			if let Err(err) = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await
			{
				log::error!("server task exited with error: {err}");
			}
		});

		self.exit_signal = Some(tx);
		self.join = Some(handle);
		Ok(())
	}

	pub async fn stop(&mut self) {
		if self.exit_signal.is_none() && self.join.is_none() {
			return;
		}
		log::info!("stopping server");
		if let Some(tx) = self.exit_signal.take() {
			let _ = tx.send(());
		}
		if let Some(handle) = self.join.take() {
			match tokio::time::timeout(Duration::from_secs(10), handle).await {
				Ok(join_result) => {
					if let Err(err) = join_result {
						log::warn!("server task join error: {err}");
					}
				}
				Err(_) => log::warn!("server task did not shut down within timeout; continuing"),
			}
		}
	}

	#[must_use]
	pub fn port(&self) -> u16 {
		self.port
	}
}

async fn handle(State(state): State<AppState>, ConnectInfo(addr): ConnectInfo<SocketAddr>, method: AxumMethod, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
	let path = uri.path().to_string();
	let query = parse_query(uri.query());

	let Some((alias, path_info)) = state.router.match_path(&path) else {
		return (StatusCode::NOT_FOUND, "no alias matches this path").into_response();
	};

	let parsed = match state.dispatcher.dispatch(to_dispatch_method(&method), &path_info, &query) {
		Ok(Some(parsed)) => parsed,
		Ok(None) => return (StatusCode::NOT_FOUND, "no service handles this path").into_response(),
		Err(err) => return response::error_response(&err),
	};

	match parsed {
		ParsedRequest::GetTile { grid, coord, dimensions, .. } => {
			let permit = match alias.concurrency.clone().try_acquire_owned() {
				Ok(permit) => permit,
				Err(_) => return response::error_response(&CacheError::unavailable(format!("alias '{}' has reached its concurrency limit", alias.endpoint))),
			};

			let if_modified_since = parse_if_modified_since(&headers);
			let header_pairs = header_pairs(&headers);
			let tileset_for_response = alias.tileset.clone();
			let router = Arc::clone(&state.router);
			let renderer = Arc::clone(&state.renderer);
			let path_for_blocking = path.clone();

			let result = tokio::task::spawn_blocking(move || {
				let _permit = permit;
				let (alias, _) = router.match_path(&path_for_blocking).expect("alias matched before dispatching to blocking task");
				let ctx = RequestContext::with_headers(header_pairs);
				let pipeline = TilePipeline::new(&alias.cache, &*alias.locker, &*renderer);
				pipeline.fetch(&ctx, &alias.tileset, &grid, coord, &dimensions)
			})
			.await;

			match result {
				Ok(outcome) => response::tile_response(outcome, &tileset_for_response, if_modified_since),
				Err(join_err) => response::error_response(&CacheError::internal(format!("tile task panicked: {join_err}"))),
			}
		}
		ParsedRequest::Proxy { .. } => {
			let Some(upstream_base) = alias.tileset.source.clone() else {
				return response::error_response(&CacheError::internal(format!("alias '{}' has no configured upstream 'source'", alias.endpoint)));
			};
			let request = ProxyRequest {
				method: to_reqwest_method(&method),
				upstream_url: upstream_base,
				query,
				headers: header_pairs(&headers),
				body: body.to_vec(),
				client_addr: addr.ip().to_string(),
				inbound_host: headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()).unwrap_or_default().to_string(),
				server_name: state.server_name.clone(),
				max_post_len: 10 * 1024 * 1024,
			};

			let http_pool = Arc::clone(&state.http_pool);
			let pool_key = alias.pool_key(alias.pool_sharing);
			let pool_config = alias.pool_config;
			let client = tokio::task::spawn_blocking(move || -> Result<Client, CacheError> {
				let pool = http_pool.resolve(&pool_key, pool_config);
				let pooled = pool.get(|| Ok(Client::new()))?;
				Ok(pooled.get().clone())
			})
			.await;

			let client = match client {
				Ok(Ok(client)) => client,
				Ok(Err(err)) => return response::error_response(&err),
				Err(join_err) => return response::error_response(&CacheError::internal(format!("http client pool task panicked: {join_err}"))),
			};

			match proxy::forward(&client, request).await {
				Ok(resp) => response::proxy_response(resp),
				Err(err) => response::error_response(&err),
			}
		}
		ParsedRequest::GetMap { .. } => response::not_implemented("WMS GetMap image compositing"),
		ParsedRequest::GetCapabilities { .. } => response::not_implemented("capabilities-document serialization"),
		ParsedRequest::GetFeatureInfo { .. } => response::not_implemented("feature-info source delegation"),
	}
}

fn to_dispatch_method(method: &AxumMethod) -> dispatch::Method {
	match *method {
		AxumMethod::GET => dispatch::Method::Get,
		AxumMethod::POST => dispatch::Method::Post,
		_ => dispatch::Method::Other,
	}
}

fn to_reqwest_method(method: &AxumMethod) -> reqwest::Method {
	reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET)
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
	headers.iter().filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))).collect()
}

fn parse_if_modified_since(headers: &HeaderMap) -> Option<SystemTime> {
	let raw = headers.get(axum::http::header::IF_MODIFIED_SINCE)?.to_str().ok()?;
	httpdate::parse_http_date(raw).ok()
}

/// Minimal `application/x-www-form-urlencoded`-style query parser; MapCache
/// query params never carry the full grammar (arrays, nested keys) a
/// general-purpose URL crate would buy us.
fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
	let Some(raw) = raw else { return Vec::new() };
	raw.split('&')
		.filter(|pair| !pair.is_empty())
		.map(|pair| {
			let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
			(decode(key), decode(value))
		})
		.collect()
}

fn decode(value: &str) -> String {
	urlencoding::decode(&value.replace('+', " ")).map(|s| s.into_owned()).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{CacheConfig, CacheKind, HostConfig, LockerConfig, LockerKind, PoolOverrides, TilesetConfig};

	#[test]
	fn parses_simple_query_string() {
		let query = parse_query(Some("a=1&b=hello%20world"));
		assert_eq!(query, vec![("a".to_string(), "1".to_string()), ("b".to_string(), "hello world".to_string())]);
	}

	#[test]
	fn empty_query_is_empty_vec() {
		assert!(parse_query(None).is_empty());
		assert!(parse_query(Some("")).is_empty());
	}

	#[test]
	fn plus_decodes_to_space() {
		assert_eq!(decode("a+b"), "a b");
	}

	fn test_host(dir: &std::path::Path) -> HostConfig {
		HostConfig {
			pool_defaults: PoolOverrides::default(),
			aliases: vec![crate::config::AliasConfig {
				endpoint: "/osm".into(),
				pool: PoolOverrides { pool_hmax: Some(1), ..Default::default() },
				tileset: TilesetConfig {
					name: "osm".into(),
					format: "image/png".into(),
					caches: vec![CacheConfig { name: "disk".into(), kind: CacheKind::Filesystem, path: Some(dir.join("tiles")), write: None, detect_blank: None }],
					locker: Some(LockerConfig { kind: LockerKind::Disk, path: Some(dir.join("locks")), children: vec![] }),
					grids: vec![],
					metatile_cols: None,
					metatile_rows: None,
					expires: Some(60),
					source: None,
				},
			}],
		}
	}

	/// Integration test for routing, tile fetch, and shutdown, mirroring this
	/// codebase's own real-listener server test style.
	#[tokio::test]
	async fn server_routes_a_tile_request_through_the_stub_renderer() {
		const IP: &str = "127.0.0.1";
		let dir = tempfile::tempdir().unwrap();
		let router = Arc::new(AliasRouter::build(&test_host(dir.path())).unwrap());
		let state = AppState {
			router,
			dispatcher: Arc::new(default_dispatcher()),
			renderer: Arc::new(super::super::render::StubRenderer),
			http_pool: Arc::new(PoolRegistry::new()),
			server_name: "mapcache-test".into(),
		};

		let mut server = MapCacheServer::new(IP, 0, state);
		server.start().await.unwrap();
		let port = server.port();

		let response = reqwest::get(format!("http://{IP}:{port}/osm/wmts/osm/webmercator/3/4/5.png")).await.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		let not_found = reqwest::get(format!("http://{IP}:{port}/nope")).await.unwrap();
		assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

		server.stop().await;
	}
}
