//! Request dispatcher (§4.G): classifies an inbound request into one of
//! GET_TILE/GET_MAP/GET_CAPABILITIES/GET_FEATURE_INFO/PROXY via a
//! service-specific [`ServiceParser`], selected by the leading path segment.

use mapcache_core::{CacheError, Dimensions, ErrorCode, TileCoord};
use std::collections::HashMap;

/// HTTP method as seen by the dispatcher; only GET and POST are meaningful,
/// everything else is rejected with 405 before a parser is even consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
	Other,
}

/// The classified outcome of parsing one request (§4.G).
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRequest {
	GetTile { tileset: String, grid: String, coord: TileCoord, dimensions: Dimensions, format: String },
	GetMap { tileset: String, params: Vec<(String, String)> },
	GetCapabilities { tileset: String },
	GetFeatureInfo { tileset: String, params: Vec<(String, String)> },
	Proxy { tileset: String },
}

/// Parses one service's path grammar. Returning `Ok(None)` means "decline" —
/// the dispatcher falls through as if no service matched at all.
pub trait ServiceParser: Send + Sync {
	fn service_name(&self) -> &str;
	fn parse(&self, method: Method, path_info: &str, query: &[(String, String)]) -> Result<Option<ParsedRequest>, CacheError>;
}

/// Registers one [`ServiceParser`] per leading path segment (`wmts`, `tms`,
/// `wms`, ...) and routes a request to the matching one.
pub struct Dispatcher {
	parsers: HashMap<String, Box<dyn ServiceParser>>,
}

impl Dispatcher {
	#[must_use]
	pub fn new() -> Self {
		Self { parsers: HashMap::new() }
	}

	pub fn register(&mut self, parser: Box<dyn ServiceParser>) {
		self.parsers.insert(parser.service_name().to_string(), parser);
	}

	/// `path_info` is everything after the matched alias endpoint, with the
	/// leading `/` stripped. Returns `None` on decline (unknown service
	/// segment, or the parser itself declines).
	pub fn dispatch(&self, method: Method, path_info: &str, query: &[(String, String)]) -> Result<Option<ParsedRequest>, CacheError> {
		if !matches!(method, Method::Get | Method::Post) {
			return Err(CacheError::new(ErrorCode::MethodNotAllowed, "only GET and POST are accepted"));
		}

		let trimmed = path_info.trim_start_matches('/');
		let (service, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

		match self.parsers.get(service) {
			Some(parser) => parser.parse(method, rest, query),
			None => Ok(None),
		}
	}
}

impl Default for Dispatcher {
	fn default() -> Self {
		Self::new()
	}
}

/// Concrete WMTS/TMS-flavored RESTful path grammar, sufficient to exercise
/// GET_TILE/GET_CAPABILITIES/GET_FEATURE_INFO/PROXY classification:
///
/// - `<tileset>/<grid>/<z>/<x>/<y>.<format>` → `GetTile`
/// - `<tileset>/<grid>/capabilities`         → `GetCapabilities`
/// - `<tileset>/<grid>/featureinfo/<z>/<x>/<y>` → `GetFeatureInfo`
/// - `<tileset>/proxy`                       → `Proxy`
///
/// WMS-style `?request=GetMap` query parameters are also recognized,
/// regardless of path shape, matching how WMS layers requests over query
/// strings rather than RESTful path segments.
pub struct RestTileParser {
	service_name: String,
}

impl RestTileParser {
	#[must_use]
	pub fn new(service_name: impl Into<String>) -> Self {
		Self { service_name: service_name.into() }
	}
}

impl ServiceParser for RestTileParser {
	fn service_name(&self) -> &str {
		&self.service_name
	}

	fn parse(&self, _method: Method, path_info: &str, query: &[(String, String)]) -> Result<Option<ParsedRequest>, CacheError> {
		let segments: Vec<&str> = path_info.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

		if let Some(request) = query.iter().find(|(k, _)| k.eq_ignore_ascii_case("request")) {
			let tileset = segments.first().map(|s| s.to_string()).unwrap_or_default();
			return Ok(Some(match request.1.to_ascii_lowercase().as_str() {
				"getmap" => ParsedRequest::GetMap { tileset, params: query.to_vec() },
				"getcapabilities" => ParsedRequest::GetCapabilities { tileset },
				"getfeatureinfo" => ParsedRequest::GetFeatureInfo { tileset, params: query.to_vec() },
				_ => return Ok(None),
			}));
		}

		match segments.as_slice() {
			[tileset, _grid, "proxy"] => Ok(Some(ParsedRequest::Proxy { tileset: (*tileset).to_string() })),
			[tileset, _grid, "capabilities"] => Ok(Some(ParsedRequest::GetCapabilities { tileset: (*tileset).to_string() })),
			[tileset, _grid, "featureinfo", z, x, y] => {
				let coord = parse_coord(z, x, y)?;
				let mut params = query.to_vec();
				params.push(("z".into(), coord.z.to_string()));
				params.push(("x".into(), coord.x.to_string()));
				params.push(("y".into(), coord.y.to_string()));
				Ok(Some(ParsedRequest::GetFeatureInfo { tileset: (*tileset).to_string(), params }))
			}
			[tileset, grid, z, x, last] => {
				let (y, format) = last.split_once('.').ok_or_else(|| CacheError::new(ErrorCode::BadRequest, format!("tile request '{last}' is missing a format extension")))?;
				let coord = parse_coord(z, x, y)?;
				let dimensions = query.iter().cloned().collect::<Dimensions>();
				Ok(Some(ParsedRequest::GetTile { tileset: (*tileset).to_string(), grid: (*grid).to_string(), coord, dimensions, format: format.to_string() }))
			}
			_ => Ok(None),
		}
	}
}

fn parse_coord(z: &str, x: &str, y: &str) -> Result<TileCoord, CacheError> {
	let parse_one = |s: &str| s.parse::<u32>().map_err(|_| CacheError::new(ErrorCode::BadRequest, format!("invalid tile coordinate component '{s}'")));
	Ok(TileCoord::new(parse_one(z)?, parse_one(x)?, parse_one(y)?))
}

/// A named service (`wms`, `kml`, `ve`, `demo`, `mapguide`) whose
/// request-format parsing is out of scope; always declines, leaving room for
/// a real parser without touching [`Dispatcher`].
pub struct DecliningParser {
	service_name: String,
}

impl DecliningParser {
	#[must_use]
	pub fn new(service_name: impl Into<String>) -> Self {
		Self { service_name: service_name.into() }
	}
}

impl ServiceParser for DecliningParser {
	fn service_name(&self) -> &str {
		&self.service_name
	}

	fn parse(&self, _method: Method, _path_info: &str, _query: &[(String, String)]) -> Result<Option<ParsedRequest>, CacheError> {
		Ok(None)
	}
}

/// The dispatcher this binary actually serves with: `wmts`/`tms` get the
/// concrete REST grammar, the remaining named services decline.
#[must_use]
pub fn default_dispatcher() -> Dispatcher {
	let mut dispatcher = Dispatcher::new();
	dispatcher.register(Box::new(RestTileParser::new("wmts")));
	dispatcher.register(Box::new(RestTileParser::new("tms")));
	for service in ["wms", "kml", "ve", "demo", "mapguide"] {
		dispatcher.register(Box::new(DecliningParser::new(service)));
	}
	dispatcher
}
