use std::collections::BTreeMap;
use std::fmt::Write as _;

/// An ordered mapping from dimension name (e.g. `TIME`, `ELEVATION`) to its
/// string value, part of a tile's identity alongside tileset/grid/x/y/z.
///
/// Backed by a `BTreeMap` so that two requests naming the same dimensions in
/// a different order still produce the same [`Dimensions::signature`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dimensions(BTreeMap<String, String>);

impl Dimensions {
	#[must_use]
	pub fn new() -> Self {
		Self(BTreeMap::new())
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.0.insert(name.into(), value.into());
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// A deterministic string form used to build the lock/resource key and
	/// cache key for a tile, stable regardless of insertion order.
	#[must_use]
	pub fn signature(&self) -> String {
		let mut out = String::new();
		for (name, value) in &self.0 {
			if !out.is_empty() {
				out.push('&');
			}
			let _ = write!(out, "{name}={value}");
		}
		out
	}
}

impl FromIterator<(String, String)> for Dimensions {
	fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn signature_is_order_independent() {
		let mut a = Dimensions::new();
		a.insert("TIME", "2020");
		a.insert("ELEVATION", "10");

		let mut b = Dimensions::new();
		b.insert("ELEVATION", "10");
		b.insert("TIME", "2020");

		assert_eq!(a.signature(), b.signature());
		assert_eq!(a.signature(), "ELEVATION=10&TIME=2020");
	}

	#[test]
	fn empty_dimensions_have_empty_signature() {
		assert_eq!(Dimensions::new().signature(), "");
	}
}
