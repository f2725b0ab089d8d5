use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Tabwire(#[from] tabwire::Error),

	#[error("no page is open")]
	NoTarget,

	#[error("{action} did not finish within {ms}ms")]
	TimedOut { action: &'static str, ms: u64 },

	#[error("failed to encode output: {0}")]
	Output(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
