use thiserror::Error;

/// Coarse classification of a cache failure, chosen to map directly onto the
/// HTTP status code the dispatcher sends back (see [`ErrorCode::http_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	/// Malformed request parameters (bad bbox, unknown format, ...).
	BadRequest,
	/// No such tileset/alias/grid, or a cache miss with no fallback left.
	NotFound,
	/// Request method not allowed for the matched endpoint.
	MethodNotAllowed,
	/// Request body exceeded a configured limit (e.g. `max_post_len`).
	PayloadTooLarge,
	/// Backend, pool, or locker failure with no more specific classification.
	Internal,
	/// Backend temporarily unavailable (pool exhausted, lock timed out).
	Unavailable,
}

impl ErrorCode {
	/// The HTTP status code this error classification corresponds to.
	#[must_use]
	pub fn http_status(self) -> u16 {
		match self {
			ErrorCode::BadRequest => 400,
			ErrorCode::NotFound => 404,
			ErrorCode::MethodNotAllowed => 405,
			ErrorCode::PayloadTooLarge => 413,
			ErrorCode::Internal => 500,
			ErrorCode::Unavailable => 503,
		}
	}
}

/// A classified, request-scoped error.
///
/// `CacheError` is the currency of the error ledger: it is cheap to clone so
/// it can be stashed in [`super::RequestContext`] and inspected without
/// consuming it, and it carries an optional `source_marker` identifying which
/// tier/backend/locker raised it, for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CacheError {
	pub code: ErrorCode,
	pub message: String,
	pub source_marker: Option<String>,
}

impl CacheError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into(), source_marker: None }
	}

	#[must_use]
	pub fn with_source(mut self, marker: impl Into<String>) -> Self {
		self.source_marker = Some(marker.into());
		self
	}

	#[must_use]
	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::NotFound, message)
	}

	#[must_use]
	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::Internal, message)
	}

	#[must_use]
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::Unavailable, message)
	}
}

impl From<anyhow::Error> for CacheError {
	fn from(err: anyhow::Error) -> Self {
		match err.downcast::<CacheError>() {
			Ok(cache_error) => cache_error,
			Err(err) => CacheError::new(ErrorCode::Internal, err.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn http_status_mapping() {
		assert_eq!(ErrorCode::BadRequest.http_status(), 400);
		assert_eq!(ErrorCode::NotFound.http_status(), 404);
		assert_eq!(ErrorCode::MethodNotAllowed.http_status(), 405);
		assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
		assert_eq!(ErrorCode::Internal.http_status(), 500);
		assert_eq!(ErrorCode::Unavailable.http_status(), 503);
	}

	#[test]
	fn anyhow_roundtrip_preserves_cache_error() {
		let original = CacheError::not_found("no such tile").with_source("disk-tier");
		let wrapped: anyhow::Error = anyhow::Error::new(original.clone());
		let recovered: CacheError = wrapped.into();
		assert_eq!(recovered.code, ErrorCode::NotFound);
		assert_eq!(recovered.source_marker.as_deref(), Some("disk-tier"));
	}

	#[test]
	fn foreign_error_becomes_internal() {
		let wrapped = anyhow::anyhow!("disk full");
		let recovered: CacheError = wrapped.into();
		assert_eq!(recovered.code, ErrorCode::Internal);
	}
}
