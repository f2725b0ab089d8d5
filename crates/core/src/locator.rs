//! Polling locator engine.
//!
//! A search starts from a set of candidates (the document root, or nodes a
//! caller already holds) and repeats a zero-wait query against the
//! candidates that have not matched yet. Matched candidates drop out of the
//! next round, so a fan-out search only keeps polling the slow ones.
//! Running out of time is not an error: the result is whatever matched.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};
use crate::node::DomNode;
use crate::query;
use crate::target::Target;
use crate::wait::Waiter;

/// Runs `query` against each candidate until every candidate matched or
/// `timeout` elapsed, sleeping `interval` between rounds.
///
/// Results are returned in candidate order. A candidate whose query times
/// out counts as unmatched for that round; any other error ends the search.
pub async fn poll_candidates<C, T, F, Fut>(
	candidates: Vec<C>,
	timeout: Duration,
	interval: Duration,
	waiter: &dyn Waiter,
	mut query: F,
) -> Result<Vec<T>>
where
	F: FnMut(&C) -> Fut,
	Fut: Future<Output = Result<Vec<T>>>,
{
	let deadline = Instant::now() + timeout;
	let mut slots: Vec<Option<Vec<T>>> = candidates.iter().map(|_| None).collect();
	let mut pending: Vec<(usize, C)> = candidates.into_iter().enumerate().collect();
	let mut round = 0u32;

	loop {
		round += 1;
		let mut unmatched = Vec::with_capacity(pending.len());
		for (slot, candidate) in pending {
			match query(&candidate).await {
				Ok(found) if !found.is_empty() => slots[slot] = Some(found),
				Ok(_) => unmatched.push((slot, candidate)),
				Err(err) if err.is_timeout() => {
					debug!(round, error = %err, "candidate query timed out");
					unmatched.push((slot, candidate));
				}
				Err(err) => return Err(err),
			}
		}
		pending = unmatched;

		let now = Instant::now();
		if pending.is_empty() || now >= deadline {
			debug!(round, unmatched = pending.len(), "search finished");
			return Ok(slots.into_iter().flatten().flatten().collect());
		}
		waiter.wait(interval.min(deadline - now)).await;
	}
}

/// Where a search round starts.
#[derive(Debug, Clone)]
enum Scope {
	Document,
	Node(DomNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
	Scoped,
	FollowingSibling,
}

/// A pending polling search. Configure it, then pick a cardinality.
#[derive(Debug, Clone)]
pub struct Search {
	target: Target,
	locator: String,
	scopes: Vec<Scope>,
	origin: Vec<String>,
	timeout: Duration,
	interval: Duration,
	axis: Axis,
}

impl Search {
	pub(crate) fn from_document(target: Target, locator: &str) -> Self {
		Self::build(target, vec![Scope::Document], locator.to_string(), vec!["document".into()], Axis::Scoped)
	}

	pub(crate) fn from_nodes(target: Target, nodes: Vec<DomNode>, locator: &str, origin: Vec<String>) -> Self {
		let scopes = nodes.into_iter().map(Scope::Node).collect();
		Self::build(target, scopes, locator.to_string(), origin, Axis::Scoped)
	}

	pub(crate) fn following_siblings(
		target: Target,
		nodes: Vec<DomNode>,
		node_test: Option<&str>,
		origin: Vec<String>,
	) -> Self {
		let scopes = nodes.into_iter().map(Scope::Node).collect();
		let locator = node_test.unwrap_or("*").to_string();
		Self::build(target, scopes, locator, origin, Axis::FollowingSibling)
	}

	fn build(target: Target, scopes: Vec<Scope>, locator: String, origin: Vec<String>, axis: Axis) -> Self {
		let config = target.config();
		let (timeout, interval) = (config.find_timeout(), config.poll_interval());
		Self {
			target,
			locator,
			scopes,
			origin,
			timeout,
			interval,
			axis,
		}
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Locator as shown in diagnostics.
	pub fn locator(&self) -> String {
		match self.axis {
			Axis::Scoped => self.locator.clone(),
			Axis::FollowingSibling => format!("following-sibling::{}", self.locator),
		}
	}

	fn path_for(&self, scope: &Scope) -> String {
		match (scope, self.axis) {
			(Scope::Document, _) => self.locator.clone(),
			(Scope::Node(node), Axis::Scoped) => query::scoped_path(node.path(), &self.locator),
			(Scope::Node(node), Axis::FollowingSibling) => query::following_sibling_path(node.path(), Some(&self.locator)),
		}
	}

	/// Every match found before the timeout. Possibly empty.
	pub async fn all(self) -> Result<NodeSet> {
		let Self {
			target,
			scopes,
			timeout,
			interval,
			origin,
			..
		} = &self;
		debug!(target_id = %target.id(), locator = %self.locator(), candidates = scopes.len(), "searching");

		let nodes = poll_candidates(scopes.clone(), *timeout, *interval, target.waiter(), |scope| {
			let path = self.path_for(scope);
			async move {
				let hits = query::find(target, &path).await?;
				Ok(hits.into_iter().map(|hit| hit.into_node(target)).collect::<Vec<_>>())
			}
		})
		.await?;

		Ok(NodeSet {
			target: target.clone(),
			nodes,
			locator: self.locator(),
			origin: origin.clone(),
			timeout: *timeout,
		})
	}

	/// At least one match, or [`Error::NotFound`].
	pub async fn require(self) -> Result<NodeSet> {
		let set = self.all().await?;
		if set.is_empty() {
			return Err(set.not_found());
		}
		Ok(set)
	}

	/// The first match, if any.
	pub async fn first_or_none(self) -> Result<Option<DomNode>> {
		Ok(self.all().await?.first())
	}

	/// At most one match. More than one is [`Error::TooManyMatches`].
	pub async fn single(self) -> Result<Option<DomNode>> {
		let set = self.all().await?;
		match set.len() {
			0 => Ok(None),
			1 => Ok(set.first()),
			count => Err(set.too_many(count)),
		}
	}

	/// Exactly one match.
	pub async fn require_single(self) -> Result<DomNode> {
		let set = self.all().await?;
		match set.len() {
			0 => Err(set.not_found()),
			1 => set.first().ok_or_else(|| set.not_found()),
			count => Err(set.too_many(count)),
		}
	}
}

/// Ordered search result, tagged with how it was reached.
#[derive(Debug, Clone)]
pub struct NodeSet {
	target: Target,
	nodes: Vec<DomNode>,
	locator: String,
	origin: Vec<String>,
	timeout: Duration,
}

impl NodeSet {
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, DomNode> {
		self.nodes.iter()
	}

	pub fn nodes(&self) -> &[DomNode] {
		&self.nodes
	}

	pub fn into_nodes(self) -> Vec<DomNode> {
		self.nodes
	}

	pub fn locator(&self) -> &str {
		&self.locator
	}

	/// Derivation chain, outermost first, e.g. `document > //main`.
	pub fn origin(&self) -> String {
		self.origin.join(" > ")
	}

	fn chain(&self) -> Vec<String> {
		let mut chain = self.origin.clone();
		chain.push(self.locator.clone());
		chain
	}

	fn not_found(&self) -> Error {
		Error::NotFound {
			locator: self.locator.clone(),
			origin: self.origin(),
			timeout: self.timeout,
		}
	}

	fn too_many(&self, count: usize) -> Error {
		Error::TooManyMatches {
			locator: self.locator.clone(),
			origin: self.origin(),
			count,
		}
	}

	pub fn first(&self) -> Option<DomNode> {
		self.nodes.first().cloned()
	}

	/// Node at `index`. Negative indices count from the end.
	pub fn at(&self, index: isize) -> Result<DomNode> {
		let len = self.nodes.len();
		let resolved = if index < 0 { len.checked_sub(index.unsigned_abs()) } else { Some(index.unsigned_abs()) };
		resolved
			.and_then(|i| self.nodes.get(i))
			.cloned()
			.ok_or_else(|| Error::IndexOutOfRange {
				index,
				len,
				origin: self.chain().join(" > "),
			})
	}

	/// Lazily filters by a predicate over cached node fields. The predicate
	/// is described by its call site.
	#[track_caller]
	pub fn filter<F>(&self, predicate: F) -> Filtered<'_, F>
	where
		F: Fn(&DomNode) -> bool,
	{
		let caller = Location::caller();
		let description = format!("closure@{}:{}:{}", caller.file(), caller.line(), caller.column());
		Filtered {
			set: self,
			predicate,
			description,
		}
	}

	pub fn filter_named<F>(&self, name: impl Into<String>, predicate: F) -> Filtered<'_, F>
	where
		F: Fn(&DomNode) -> bool,
	{
		Filtered {
			set: self,
			predicate,
			description: name.into(),
		}
	}

	/// Chains a locator below every node in the set.
	pub fn search(&self, locator: &str) -> Search {
		Search::from_nodes(self.target.clone(), self.nodes.clone(), locator, self.chain())
	}

	pub fn following_siblings(&self, node_test: Option<&str>) -> Search {
		Search::following_siblings(self.target.clone(), self.nodes.clone(), node_test, self.chain())
	}
}

impl<'a> IntoIterator for &'a NodeSet {
	type Item = &'a DomNode;
	type IntoIter = std::slice::Iter<'a, DomNode>;

	fn into_iter(self) -> Self::IntoIter {
		self.nodes.iter()
	}
}

/// A [`NodeSet`] seen through a predicate. Nothing is evaluated until
/// iterated or collected.
pub struct Filtered<'a, F> {
	set: &'a NodeSet,
	predicate: F,
	description: String,
}

impl<F> fmt::Debug for Filtered<'_, F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Filtered")
			.field("locator", &self.set.locator)
			.field("predicate", &self.description)
			.finish()
	}
}

impl<F> Filtered<'_, F>
where
	F: Fn(&DomNode) -> bool,
{
	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
		self.set.nodes.iter().filter(|node| (self.predicate)(node))
	}

	pub fn first(&self) -> Option<DomNode> {
		self.iter().next().cloned()
	}

	/// Materializes the filter into a new set whose origin records it.
	pub fn collect(&self) -> NodeSet {
		let mut origin = self.set.origin.clone();
		origin.push(self.set.locator.clone());
		NodeSet {
			target: self.set.target.clone(),
			nodes: self.iter().cloned().collect(),
			locator: format!("filter({})", self.description),
			origin,
			timeout: self.set.timeout,
		}
	}
}
