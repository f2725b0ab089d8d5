use tabwire::TargetDirectory;
use tracing::info;

use super::resolve_page;
use crate::cli::PageArgs;
use crate::error::Result;
use crate::output::{TargetSummary, print_json};

pub(super) async fn eval(directory: &TargetDirectory, page: &PageArgs, expression: &str) -> Result<()> {
	let target = resolve_page(directory, page).await?;
	let value = target.evaluate(expression).await?;
	print_json(&value)
}

pub(super) async fn navigate(directory: &TargetDirectory, page: &PageArgs, url: &str, activate: bool) -> Result<()> {
	let target = resolve_page(directory, page).await?;
	info!(target = "tabwire", id = %target.id(), %url, activate, "navigate");
	target.navigate(url, activate).await?;
	print_json(&TargetSummary::from(&target))
}
