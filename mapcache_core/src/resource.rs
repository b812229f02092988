//! Resource-name canonicalization shared by disk and memcache lockers (and by
//! cache backends that derive a filesystem path or memcache key from a tile
//! resource name).
//!
//! A resource name is built from tileset/grid/z/x/y/format components joined
//! with `/`. Canonicalizing it collapses it to a single safe path segment (or
//! memcache key) by replacing every character that would otherwise behave
//! unpredictably — including `/` itself, so a canonicalized resource name
//! never introduces nested directories.

/// Characters replaced with `#` by [`canonicalize_resource_name`].
const UNSAFE_CHARS: [char; 10] = [
	' ', '/', '~', '.', '\r', '\n', '\t', '\x0C', // form feed
	'\x1B', // ESC
	'\x07', // BEL
];

/// Replace filesystem- and memcache-unsafe characters in a resource name with
/// `#`: space, `/`, `~`, `.`, and the control characters that corrupt
/// memcache's text protocol or behave unpredictably across filesystems.
#[must_use]
pub fn canonicalize_resource_name(name: &str) -> String {
	name.chars()
		.map(|c| if UNSAFE_CHARS.contains(&c) || c == '\x08' { '#' } else { c })
		.collect()
}
