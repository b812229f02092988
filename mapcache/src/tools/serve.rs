//! `mapcache serve` (§4.L): load host configuration, build the alias router,
//! and run the HTTP server until the process is signaled to stop.

use crate::config::HostConfig;
use crate::server::{AliasRouter, AppState, MapCacheServer, StubRenderer, default_dispatcher};
use anyhow::Result;
use mapcache_backend::PoolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Path to the host configuration file (YAML).
	#[arg(short = 'c', long, value_name = "FILE")]
	pub config: PathBuf,

	/// Serve via socket ip.
	#[arg(short = 'i', long, default_value = "0.0.0.0")]
	pub ip: String,

	/// Serve via port.
	#[arg(short = 'p', long, default_value_t = 8080)]
	pub port: u16,

	/// Identity reported in the `X-Forwarded-Server` header on proxied
	/// requests.
	#[arg(long, default_value = "mapcache")]
	pub server_name: String,

	/// Shut down automatically after this many milliseconds, for tests.
	#[arg(long)]
	pub auto_shutdown: Option<u64>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let host = HostConfig::from_path(&arguments.config)?;
	let router = Arc::new(AliasRouter::build(&host)?);
	for alias in router.aliases() {
		log::info!("serving tileset '{}' at endpoint '{}'", alias.tileset.name, alias.endpoint);
	}

	let state = AppState {
		router,
		dispatcher: Arc::new(default_dispatcher()),
		renderer: Arc::new(StubRenderer),
		http_pool: Arc::new(PoolRegistry::new()),
		server_name: arguments.server_name.clone(),
	};

	let mut server = MapCacheServer::new(arguments.ip.clone(), arguments.port, state);
	server.start().await?;
	log::info!("listening on {}:{}", arguments.ip, server.port());

	if let Some(millis) = arguments.auto_shutdown {
		tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
	} else {
		signal::ctrl_c().await?;
	}

	server.stop().await;
	Ok(())
}
