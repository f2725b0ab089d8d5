//! Drive an already-running browser over its remote debugging protocol.
//!
//! [`TargetDirectory`] discovers open pages and hands out [`Target`]
//! handles. A target opens its page connection lazily; commands go through
//! [`Target::invoke`], and DOM work through [`Target::search`], which polls
//! until elements appear and yields [`DomNode`] proxies.
//!
//! ```ignore
//! let directory = TargetDirectory::new(ClientConfig::default())?;
//! let target = directory.find_or_open("https://example.com", Duration::from_secs(5), false).await?;
//! let input = target.search("//textarea").require_single().await?;
//! input.submit_input("hello").await?;
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod locator;
mod markup;
pub mod node;
mod query;
pub mod target;
pub mod wait;

pub use config::ClientConfig;
pub use directory::TargetDirectory;
pub use error::{Error, Result};
pub use locator::{Filtered, NodeSet, Search, poll_candidates};
pub use node::{ClickStrategy, DomNode};
pub use tabwire_protocol::{Event, Params, PseudoType};
pub use tabwire_runtime::{CommandError, Connector};
pub use target::{Target, TargetInfo};
pub use wait::{BlockingWaiter, TokioWaiter, Waiter};
