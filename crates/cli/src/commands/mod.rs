//! Command dispatch.

mod interact;
mod page;
mod query;
mod targets;

use tabwire::{ClientConfig, Target, TargetDirectory};
use tracing::debug;

use crate::cli::{Cli, Commands, PageArgs};
use crate::error::{CliError, Result};

pub async fn run(cli: Cli) -> Result<()> {
	let config = load_config(&cli)?;
	debug!(target = "tabwire", address = %config.address(), "using debugger");
	let directory = TargetDirectory::new(config)?;

	match cli.command {
		Commands::Targets { action } => targets::run(&directory, action).await,
		Commands::Query(args) => query::run(&directory, args).await,
		Commands::Click(args) => interact::click(&directory, args).await,
		Commands::Submit(args) => interact::submit(&directory, args).await,
		Commands::Eval { page, expression } => page::eval(&directory, &page, &expression).await,
		Commands::Navigate { page, url, activate } => page::navigate(&directory, &page, &url, activate).await,
	}
}

/// File, then environment, then flags.
pub fn load_config(cli: &Cli) -> Result<ClientConfig> {
	let base = match &cli.config {
		Some(path) => ClientConfig::from_file(path)?,
		None => ClientConfig::default(),
	};
	let mut config = base.with_env_overrides()?;
	if let Some(host) = &cli.host {
		config.host.clone_from(host);
	}
	if let Some(port) = cli.port {
		config.port = port;
	}
	Ok(config)
}

pub(crate) async fn resolve_page(directory: &TargetDirectory, page: &PageArgs) -> Result<Target> {
	if let Some(id) = &page.id {
		return Ok(directory.require_by_id(id).await?);
	}
	if let Some(url) = &page.url {
		let timeout = directory.config().open_timeout();
		return Ok(directory.find_or_open(url, timeout, false).await?);
	}
	directory.list().await?.into_iter().next().ok_or(CliError::NoTarget)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use clap::Parser;

	use super::*;

	#[test]
	fn flags_override_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"host": "10.0.0.2", "port": 9300, "pollIntervalMs": 25}}"#).unwrap();
		let path = file.path().to_str().unwrap();

		let cli = Cli::try_parse_from(["tabwire", "--config", path, "--port", "9222", "targets", "list"]).unwrap();
		let config = load_config(&cli).unwrap();
		assert_eq!(config.port, 9222);
		assert_eq!(config.poll_interval_ms, 25);
		if std::env::var_os("TABWIRE_HOST").is_none() {
			assert_eq!(config.host, "10.0.0.2");
		}
	}
}
