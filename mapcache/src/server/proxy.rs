//! Reverse-proxy request handler (§4.I): forwards a request to a configured
//! upstream URL, appending the standard `X-Forwarded-*` headers and
//! enforcing a POST body size limit.

use mapcache_core::{CacheError, ErrorCode};
use reqwest::{Client, Method as ReqwestMethod};

/// Everything the proxy handler needs from the inbound request, already
/// extracted from whatever HTTP framework is driving the dispatcher.
pub struct ProxyRequest {
	pub method: ReqwestMethod,
	pub upstream_url: String,
	pub query: Vec<(String, String)>,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
	pub client_addr: String,
	pub inbound_host: String,
	pub server_name: String,
	pub max_post_len: usize,
}

#[derive(Debug)]
pub struct ProxyResponse {
	pub status: u16,
	pub headers: Vec<(String, String)>,
	pub body: Vec<u8>,
}

/// Forward `request` to its configured upstream, returning the upstream's
/// response verbatim (status, headers, body) or a [`CacheError`] if the body
/// exceeds `max_post_len` or the upstream is unreachable.
pub async fn forward(client: &Client, request: ProxyRequest) -> Result<ProxyResponse, CacheError> {
	if request.body.len() > request.max_post_len {
		return Err(CacheError::new(ErrorCode::PayloadTooLarge, format!("request body of {} bytes exceeds max_post_len of {}", request.body.len(), request.max_post_len)));
	}

	let mut builder = client.request(request.method, &request.upstream_url).query(&request.query);

	for (name, value) in &request.headers {
		builder = builder.header(name, value);
	}
	builder = builder.header("X-Forwarded-For", append_header_value(&request.headers, "X-Forwarded-For", &request.client_addr));
	builder = builder.header("X-Forwarded-Host", append_header_value(&request.headers, "X-Forwarded-Host", &request.inbound_host));
	builder = builder.header("X-Forwarded-Server", append_header_value(&request.headers, "X-Forwarded-Server", &request.server_name));

	if !request.body.is_empty() {
		builder = builder.body(request.body);
	}

	let response = builder.send().await.map_err(|e| CacheError::unavailable(format!("proxying to upstream failed: {e}")))?;

	let status = response.status().as_u16();
	let headers = response
		.headers()
		.iter()
		.filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
		.collect();
	let body = response.bytes().await.map_err(|e| CacheError::unavailable(format!("reading upstream response body failed: {e}")))?.to_vec();

	Ok(ProxyResponse { status, headers, body })
}

/// Append `value` to the existing value of `name` in `existing` (comma
/// separated, matching the conventional `X-Forwarded-For` chaining), or
/// just `value` if the header was absent.
fn append_header_value(existing: &[(String, String)], name: &str, value: &str) -> String {
	match existing.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
		Some((_, prior)) => format!("{prior}, {value}"),
		None => value.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn oversized_body_is_rejected_before_any_request_is_built() {
		let request = ProxyRequest {
			method: ReqwestMethod::POST,
			upstream_url: "http://upstream.invalid/wms".into(),
			query: vec![],
			headers: vec![],
			body: vec![0u8; 10],
			client_addr: "10.0.0.1".into(),
			inbound_host: "maps.example.org".into(),
			server_name: "mapcache-01".into(),
			max_post_len: 5,
		};
		let err = forward(&Client::new(), request).await.unwrap_err();
		assert_eq!(err.code, ErrorCode::PayloadTooLarge);
	}

	#[test]
	fn appends_to_an_existing_forwarded_for_header() {
		let existing = vec![("X-Forwarded-For".to_string(), "1.2.3.4".to_string())];
		assert_eq!(append_header_value(&existing, "X-Forwarded-For", "5.6.7.8"), "1.2.3.4, 5.6.7.8");
	}

	#[test]
	fn starts_a_fresh_header_when_absent() {
		assert_eq!(append_header_value(&[], "X-Forwarded-Host", "maps.example.org"), "maps.example.org");
	}
}
