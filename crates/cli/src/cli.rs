use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tabwire::ClickStrategy;

#[derive(Parser, Debug)]
#[command(name = "tabwire")]
#[command(about = "Drive pages of an already-running browser over its debugging port")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Debugger host (overrides config and TABWIRE_HOST)
	#[arg(long, global = true)]
	pub host: Option<String>,

	/// Debugger port (overrides config and TABWIRE_PORT)
	#[arg(long, global = true)]
	pub port: Option<u16>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List, open, close or focus pages
	#[command(alias = "t")]
	Targets {
		#[command(subcommand)]
		action: TargetsAction,
	},

	/// Find elements by XPath, waiting for them to appear
	#[command(alias = "q")]
	Query(QueryArgs),

	/// Click the single element matching a locator
	Click(ClickArgs),

	/// Replace an input's value and submit it with Enter
	Submit(SubmitArgs),

	/// Evaluate a JavaScript expression and print its value
	Eval {
		#[command(flatten)]
		page: PageArgs,
		expression: String,
	},

	/// Navigate a page to a URL
	#[command(alias = "nav")]
	Navigate {
		#[command(flatten)]
		page: PageArgs,
		#[arg(id = "target_url", value_name = "URL")]
		url: String,
		/// Bring the page to the foreground afterwards
		#[arg(long)]
		activate: bool,
	},
}

#[derive(Subcommand, Debug)]
pub enum TargetsAction {
	/// Print every open page
	#[command(alias = "ls")]
	List,

	/// Open a page unless one already starts with the URL
	Open {
		url: String,
		/// Always open a new page
		#[arg(long)]
		new: bool,
		/// Bring an already open page to the foreground
		#[arg(long, conflicts_with = "new")]
		activate: bool,
	},

	/// Close a page by id
	Close { id: String },

	/// Bring a page to the foreground
	Activate { id: String },
}

/// Which page a command runs against. Defaults to the first listed page.
#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
	/// Page id
	#[arg(long = "id", value_name = "ID", conflicts_with = "url")]
	pub id: Option<String>,

	/// Page URL prefix; the page is opened when none matches
	#[arg(long = "url", value_name = "URL")]
	pub url: Option<String>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
	#[command(flatten)]
	pub page: PageArgs,

	/// XPath locator
	pub locator: String,

	/// How long to wait for a match (milliseconds)
	#[arg(long)]
	pub timeout_ms: Option<u64>,

	/// Include outer HTML of each match
	#[arg(long)]
	pub html: bool,

	/// Include text content of each match
	#[arg(long)]
	pub text: bool,
}

#[derive(Args, Debug)]
pub struct ClickArgs {
	#[command(flatten)]
	pub page: PageArgs,

	/// XPath locator
	pub locator: String,

	#[arg(long, value_enum, default_value = "auto")]
	pub strategy: ClickMode,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
	#[command(flatten)]
	pub page: PageArgs,

	/// XPath locator of the input
	pub locator: String,

	/// Text to submit
	pub text: String,

	/// Give up after this long (milliseconds)
	#[arg(long, default_value = "10000")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClickMode {
	Auto,
	Geometric,
	Scripted,
}

impl From<ClickMode> for ClickStrategy {
	fn from(mode: ClickMode) -> Self {
		match mode {
			ClickMode::Auto => ClickStrategy::Auto,
			ClickMode::Geometric => ClickStrategy::Geometric,
			ClickMode::Scripted => ClickStrategy::Scripted,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn global_flags_apply_after_subcommand() {
		let cli = Cli::try_parse_from(["tabwire", "query", "//main//p", "--port", "9222", "-vv", "--text"]).unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.port, Some(9222));
		let Commands::Query(args) = cli.command else {
			panic!("expected query");
		};
		assert_eq!(args.locator, "//main//p");
		assert!(args.text && !args.html);
	}

	#[test]
	fn page_id_and_url_conflict() {
		let err = Cli::try_parse_from(["tabwire", "eval", "--id", "A", "--url", "https://a.com", "1"]).unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
	}

	#[test]
	fn click_strategy_maps_to_library() {
		let cli = Cli::try_parse_from(["tabwire", "click", "//button", "--strategy", "scripted"]).unwrap();
		let Commands::Click(args) = cli.command else {
			panic!("expected click");
		};
		assert_eq!(ClickStrategy::from(args.strategy), ClickStrategy::Scripted);
	}

	#[test]
	fn activate_flags_parse() {
		let cli = Cli::try_parse_from(["tabwire", "nav", "--id", "A", "https://b.com", "--activate"]).unwrap();
		let Commands::Navigate { page, url, activate } = cli.command else {
			panic!("expected navigate");
		};
		assert_eq!(page.id.as_deref(), Some("A"));
		assert_eq!(url, "https://b.com");
		assert!(activate);

		let cli = Cli::try_parse_from(["tabwire", "targets", "open", "https://b.com", "--activate"]).unwrap();
		assert!(matches!(
			cli.command,
			Commands::Targets {
				action: TargetsAction::Open { activate: true, new: false, .. }
			}
		));

		let err = Cli::try_parse_from(["tabwire", "targets", "open", "https://b.com", "--new", "--activate"]).unwrap_err();
		assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
	}
}
