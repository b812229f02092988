//! The tile data model: [`Tile`], [`Tileset`], [`Grid`]/[`GridLink`],
//! [`Dimensions`], and the [`Blob`] byte-buffer wrapper cache backends read
//! and write.

mod blob;
mod dimensions;
mod grid;
mod tile;
mod tileset;

pub use blob::Blob;
pub use dimensions::Dimensions;
pub use grid::{Grid, GridLink};
pub use tile::{BLANK_TILE_MIME, Tile, TileCoord};
pub use tileset::Tileset;
