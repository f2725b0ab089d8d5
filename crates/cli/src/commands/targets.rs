use tabwire::TargetDirectory;
use tracing::info;

use crate::cli::TargetsAction;
use crate::error::Result;
use crate::output::{TargetSummary, print_json};

pub(super) async fn run(directory: &TargetDirectory, action: TargetsAction) -> Result<()> {
	match action {
		TargetsAction::List => {
			let targets = directory.list().await?;
			let summaries: Vec<TargetSummary> = targets.iter().map(TargetSummary::from).collect();
			print_json(&summaries)
		}
		TargetsAction::Open { url, new, activate } => {
			let timeout = directory.config().open_timeout();
			let target = if new {
				directory.open_new(&url, timeout).await?
			} else {
				directory.find_or_open(&url, timeout, activate).await?
			};
			print_json(&TargetSummary::from(&target))
		}
		TargetsAction::Close { id } => {
			let target = directory.require_by_id(&id).await?;
			directory.close(&target).await?;
			info!(target = "tabwire", id = %id, "close requested");
			Ok(())
		}
		TargetsAction::Activate { id } => {
			let target = directory.require_by_id(&id).await?;
			directory.activate(&target).await?;
			Ok(())
		}
	}
}
