//! The HTTP-facing half of this crate (§4.G-§4.I): request dispatch, alias
//! routing, reverse-proxying, the render stub, response assembly, and the
//! server lifecycle that ties them together behind one `axum::Router`.

mod app;
mod dispatch;
mod proxy;
mod render;
mod response;
mod router;

pub use app::{AppState, MapCacheServer};
pub use dispatch::{Dispatcher, Method, ParsedRequest, default_dispatcher};
pub use render::StubRenderer;
pub use router::AliasRouter;
