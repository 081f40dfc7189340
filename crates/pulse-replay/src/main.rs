// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Replays a script of browser signals through the tracker against a real
//! collector, or prints the batches with `--dry-run`.

mod replay;
mod script;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use pulse_tracker::{HttpTransport, Transport, TrackerConfig, TrackerConfigLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use replay::{origin_of, ReplaySummary, Replayer, StdoutTransport};

#[derive(Parser, Debug)]
#[command(name = "pulse-replay", version, about)]
struct Args {
	/// Script of JSON lines to replay
	#[arg(long)]
	script: PathBuf,

	/// Tracker configuration file (TOML)
	#[arg(long, env = "PULSE_TRACKER_CONFIG")]
	config: Option<PathBuf>,

	/// Collector endpoint, overriding the configuration
	#[arg(long)]
	endpoint: Option<String>,

	/// Origin used to resolve a relative endpoint. Defaults to the origin of --url
	#[arg(long)]
	base_url: Option<String>,

	/// URL of the first page load
	#[arg(long, default_value = "http://localhost:8000/")]
	url: String,

	/// Mirror sent batches to local storage and log at debug level
	#[arg(long)]
	debug: bool,

	/// Print batches as JSON lines instead of sending them
	#[arg(long)]
	dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let default_level = if args.debug { "debug" } else { "info" };
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.init();

	let overrides = TrackerConfigLayer {
		endpoint: args.endpoint.clone(),
		debug: args.debug.then_some(true),
		..TrackerConfigLayer::default()
	};
	let config = TrackerConfig::load_with_overrides(args.config.as_deref(), overrides)
		.context("failed to load tracker configuration")?;

	let steps = script::load(&args.script)?;
	info!(script = %args.script.display(), steps = steps.len(), "Loaded replay script");

	if args.dry_run {
		let transport = Arc::new(StdoutTransport::new());
		let summary = replay(config, transport.clone(), &args.url, &steps).await?;
		info!(batches = transport.batches(), "Dry run finished");
		// stdout carries the batches
		eprintln!("{}", serde_json::to_string_pretty(&summary)?);
		return Ok(());
	}

	let base_url = args.base_url.clone().or_else(|| origin_of(&args.url));
	let transport = HttpTransport::from_config(&config, base_url.as_deref())
		.context("failed to configure collector transport")?;
	info!(url = transport.url(), "Sending events to collector");
	let summary = replay(config, Arc::new(transport), &args.url, &steps).await?;
	println!("{}", serde_json::to_string_pretty(&summary)?);
	Ok(())
}

async fn replay<T: Transport + 'static>(
	config: TrackerConfig,
	transport: Arc<T>,
	url: &str,
	steps: &[script::Step],
) -> Result<ReplaySummary> {
	Replayer::new(config, transport, Utc::now())
		.run(url, steps)
		.await
}
