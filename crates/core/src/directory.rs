//! Discovery of remote pages over the debugger's HTTP listing endpoint.
//!
//! The directory keeps one [`Target`] per page id. Re-listing updates those
//! handles in place, so anything a caller holds keeps working unless the
//! page's debugger endpoint rotated, in which case its connection is closed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tabwire_protocol::TargetDescriptor;
use tabwire_runtime::{Connector, WebSocketConnector};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::locator::poll_candidates;
use crate::target::Target;
use crate::wait::{TokioWaiter, Waiter};

pub struct TargetDirectory {
	config: Arc<ClientConfig>,
	base_url: String,
	http: reqwest::Client,
	connector: Arc<dyn Connector>,
	waiter: Arc<dyn Waiter>,
	targets: Mutex<Vec<Target>>,
}

impl std::fmt::Debug for TargetDirectory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TargetDirectory")
			.field("base_url", &self.base_url)
			.field("targets", &self.targets.lock().len())
			.finish()
	}
}

impl TargetDirectory {
	/// Directory for the browser at `config.address()`. Page connections use
	/// WebSockets.
	pub fn new(config: ClientConfig) -> Result<Self> {
		tabwire_runtime::request_id::init();
		let http = reqwest::Client::builder()
			.timeout(config.connect_timeout())
			.no_proxy()
			.build()?;
		let connector = Arc::new(WebSocketConnector::new(config.connect_timeout()));
		Ok(Self {
			base_url: format!("http://{}", config.address()),
			config: Arc::new(config),
			http,
			connector,
			waiter: Arc::new(TokioWaiter),
			targets: Mutex::new(Vec::new()),
		})
	}

	/// Replaces how page connections are opened.
	pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = connector;
		self
	}

	/// Replaces how polling loops suspend. Applies to targets created after
	/// this call.
	pub fn with_waiter(mut self, waiter: Arc<dyn Waiter>) -> Self {
		self.waiter = waiter;
		self
	}

	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Fetches the listing and reconciles it with the known targets by id.
	pub async fn list(&self) -> Result<Vec<Target>> {
		let descriptors: Vec<TargetDescriptor> = self
			.http
			.get(format!("{}/json", self.base_url))
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;
		Ok(self.reconcile(descriptors.iter().filter(|descriptor| descriptor.is_page())))
	}

	fn reconcile<'a>(&self, descriptors: impl Iterator<Item = &'a TargetDescriptor>) -> Vec<Target> {
		let mut known = self.targets.lock();
		let mut next = Vec::new();
		for descriptor in descriptors {
			let target = match known.iter().position(|target| target.id() == descriptor.id) {
				Some(index) => {
					let target = known.swap_remove(index);
					target.update(descriptor);
					target
				}
				None => {
					debug!(target_id = %descriptor.id, url = %descriptor.url, "new target");
					Target::with_waiter(
						descriptor,
						Arc::clone(&self.connector),
						Arc::clone(&self.config),
						Arc::clone(&self.waiter),
					)
				}
			};
			next.push(target);
		}

		for gone in known.drain(..) {
			debug!(target_id = %gone.id(), "target no longer listed");
			gone.close_connection();
		}
		*known = next.clone();
		next
	}

	/// Targets as of the last listing, without a round trip.
	pub fn known(&self) -> Vec<Target> {
		self.targets.lock().clone()
	}

	pub async fn find_all_by_url_prefix(&self, prefix: &str) -> Result<Vec<Target>> {
		Ok(self
			.list()
			.await?
			.into_iter()
			.filter(|target| target.url().starts_with(prefix))
			.collect())
	}

	/// The most specific target whose url starts with `prefix`.
	pub async fn find_by_url_prefix(&self, prefix: &str) -> Result<Option<Target>> {
		Ok(longest_url(self.find_all_by_url_prefix(prefix).await?))
	}

	/// The most specific target whose url mentions `domain`.
	pub async fn find_by_domain(&self, domain: &str) -> Result<Option<Target>> {
		let matching = self.list().await?.into_iter().filter(|target| target.url().contains(domain));
		Ok(longest_url(matching))
	}

	pub async fn require_by_id(&self, id: &str) -> Result<Target> {
		self.list()
			.await?
			.into_iter()
			.find(|target| target.id() == id)
			.ok_or_else(|| Error::TargetNotFound(id.to_string()))
	}

	/// Whether `target` is still in a fresh listing.
	pub async fn is_alive(&self, target: &Target) -> Result<bool> {
		Ok(self.list().await?.iter().any(|listed| listed.id() == target.id()))
	}

	/// An existing target for `url`, or a freshly opened one. With `activate`,
	/// an existing target is also brought to the foreground; a new page
	/// already opens there.
	pub async fn find_or_open(&self, url: &str, timeout: Duration, activate: bool) -> Result<Target> {
		if let Some(target) = self.find_by_url_prefix(url).await? {
			if activate {
				self.activate(&target).await?;
			}
			return Ok(target);
		}
		self.open_new(url, timeout).await
	}

	/// Asks the browser to open `url` and waits for the new id to be listed.
	pub async fn open_new(&self, url: &str, timeout: Duration) -> Result<Target> {
		let before: HashSet<String> = self.list().await?.iter().map(|target| target.id().to_string()).collect();

		info!(%url, "opening new target");
		self.http
			.put(format!("{}/json/new?{}", self.base_url, urlencoding::encode(url)))
			.send()
			.await?
			.error_for_status()?;

		let before = &before;
		let appeared = poll_candidates(
			vec![()],
			timeout,
			self.config.poll_interval(),
			self.waiter.as_ref(),
			|_| async move {
				let fresh: Vec<Target> = self
					.list()
					.await?
					.into_iter()
					.filter(|target| !before.contains(target.id()))
					.collect();
				Ok(fresh)
			},
		)
		.await?;

		let preferred = appeared.iter().find(|target| target.url().starts_with(url)).cloned();
		preferred
			.or_else(|| appeared.into_iter().next())
			.ok_or_else(|| Error::TargetNotFound(url.to_string()))
	}

	/// Requests remote closure and drops the local connection. Does not wait
	/// for the page to disappear from the listing.
	pub async fn close(&self, target: &Target) -> Result<()> {
		info!(target_id = %target.id(), "closing target");
		target.close_connection();
		self.targets.lock().retain(|known| known.id() != target.id());
		self.http
			.get(format!("{}/json/close/{}", self.base_url, target.id()))
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}

	/// Brings the target's page to the foreground.
	pub async fn activate(&self, target: &Target) -> Result<()> {
		debug!(target_id = %target.id(), "activating target");
		self.http
			.get(format!("{}/json/activate/{}", self.base_url, target.id()))
			.send()
			.await?
			.error_for_status()?;
		Ok(())
	}
}

fn longest_url(targets: impl IntoIterator<Item = Target>) -> Option<Target> {
	targets.into_iter().max_by_key(|target| target.url().len())
}
