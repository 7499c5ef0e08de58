//! One load at a time: every new load cancels the previous one, and only the
//! latest uncanceled result is ever turned into view data.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use super::{QueryClient, QueryTemplates, View, ViewData, YearFilter};
use crate::error::FetchError;
use crate::graph::{GraphModelBuilder, Row};
use crate::summary;

/// Rows shown in the severity table.
pub const TOP_CVES: usize = 5;

/// Identity and cancellation handle of one load.
#[derive(Clone, Debug)]
pub struct RequestContext {
	id: u64,
	view: View,
	filter: YearFilter,
	token: CancellationToken,
}

impl RequestContext {
	/// Monotonically increasing request number.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// View being loaded.
	pub fn view(&self) -> View {
		self.view
	}

	/// Year filter of the load.
	pub fn filter(&self) -> YearFilter {
		self.filter
	}

	/// `true` once a newer load superseded this one.
	pub fn is_canceled(&self) -> bool {
		self.token.is_cancelled()
	}
}

#[derive(Debug)]
enum RawRows {
	Unified(Vec<Row>),
	Split { logs: Vec<Row>, cves: Vec<Row> },
	Counts(Vec<Row>),
	Stats { top: Vec<Row>, counts: Vec<Row> },
}

/// A started load that has not been awaited yet.
pub struct PendingLoad<C> {
	client: Rc<C>,
	queries: Rc<QueryTemplates>,
	page_size: Option<usize>,
	context: RequestContext,
}

/// A load that finished fetching; hand it to [`FetchOrchestrator::finish`].
#[derive(Debug)]
pub struct CompletedLoad {
	context: RequestContext,
	result: Result<RawRows, FetchError>,
}

impl CompletedLoad {
	/// Context the load ran under.
	pub fn context(&self) -> &RequestContext {
		&self.context
	}
}

/// What a finished load produced.
#[derive(Debug)]
pub enum LoadOutcome {
	/// Fresh data for the requested view.
	Loaded(ViewData),
	/// Superseded by a newer load; nothing to show.
	Canceled,
	/// The relay failed; the view stays empty.
	Failed(FetchError),
}

impl<C: QueryClient> PendingLoad<C> {
	/// Context of this load.
	pub fn context(&self) -> &RequestContext {
		&self.context
	}

	/// Fetch every query of the view, in parallel where there are several.
	/// Resolves early with [`FetchError::Canceled`] once superseded.
	pub async fn run(self) -> CompletedLoad {
		let token = self.context.token.clone();
		let result = tokio::select! {
			biased;
			_ = token.cancelled() => Err(FetchError::Canceled),
			rows = self.fetch() => rows,
		};
		CompletedLoad {
			context: self.context,
			result,
		}
	}

	async fn fetch(&self) -> Result<RawRows, FetchError> {
		let q = &self.queries;
		match (self.context.view, self.context.filter) {
			(View::Graph, YearFilter::All) => {
				let query = q.logs_with_cves();
				Ok(RawRows::Unified(self.rows(&query).await?))
			}
			(View::Graph, YearFilter::Year(year)) => {
				let (log_query, cve_query) = (q.log_events(), q.cve_products_by_year(year));
				let (logs, cves) = tokio::try_join!(self.rows(&log_query), self.rows(&cve_query))?;
				Ok(RawRows::Split { logs, cves })
			}
			(View::Bubble, _) => {
				let query = q.cve_count_per_product();
				Ok(RawRows::Counts(self.rows(&query).await?))
			}
			(View::Stats, _) => {
				let (top_query, count_query) = (q.top_severity(TOP_CVES), q.cve_count_per_product());
				let (top, counts) = tokio::try_join!(
					self.client.run_query(&top_query),
					self.rows(&count_query)
				)?;
				Ok(RawRows::Stats { top, counts })
			}
		}
	}

	async fn rows(&self, query: &str) -> Result<Vec<Row>, FetchError> {
		match self.page_size {
			Some(size) => self.client.run_query_paged(query, size).await,
			None => self.client.run_query(query).await,
		}
	}
}

/// Issues loads and decides which results may reach the views.
pub struct FetchOrchestrator<C> {
	client: Rc<C>,
	queries: Rc<QueryTemplates>,
	page_size: Option<usize>,
	next_id: u64,
	current: Option<RequestContext>,
}

impl<C: QueryClient> FetchOrchestrator<C> {
	/// Orchestrator sending `queries` through `client`.
	pub fn new(client: C, queries: QueryTemplates) -> Self {
		Self {
			client: Rc::new(client),
			queries: Rc::new(queries),
			page_size: None,
			next_id: 0,
			current: None,
		}
	}

	/// Fetch unbounded queries in pages of `page_size` rows.
	pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
		self.page_size = page_size.filter(|&n| n > 0);
		self
	}

	/// Query collaborator.
	pub fn client(&self) -> &C {
		&self.client
	}

	/// Cancel whatever is in flight and start a load of `view`.
	pub fn begin(&mut self, view: View, filter: YearFilter) -> PendingLoad<C> {
		self.cancel();
		self.next_id += 1;
		let context = RequestContext {
			id: self.next_id,
			view,
			filter,
			token: CancellationToken::new(),
		};
		debug!("request {} started: {} ({filter})", context.id, view.key());
		self.current = Some(context.clone());
		PendingLoad {
			client: Rc::clone(&self.client),
			queries: Rc::clone(&self.queries),
			page_size: self.page_size,
			context,
		}
	}

	/// Cancel the in-flight load, if any.
	pub fn cancel(&mut self) {
		if let Some(previous) = self.current.take() {
			previous.token.cancel();
			debug!("request {} canceled", previous.id);
		}
	}

	/// A load is in flight.
	pub fn is_loading(&self) -> bool {
		self.current.is_some()
	}

	/// Consume a completed load. Anything but the latest uncanceled request
	/// is dropped here, whatever its result.
	pub fn finish(&mut self, completed: CompletedLoad) -> LoadOutcome {
		let CompletedLoad { context, result } = completed;
		let is_current = self.current.as_ref().is_some_and(|c| c.id == context.id);
		if !is_current || context.is_canceled() {
			debug!("request {} discarded", context.id);
			return LoadOutcome::Canceled;
		}
		self.current = None;

		match result {
			Ok(raw) => {
				let data = process(raw);
				info!("request {} loaded: {}", context.id, context.view.key());
				LoadOutcome::Loaded(data)
			}
			Err(err) if err.is_canceled() => {
				debug!("request {} canceled", context.id);
				LoadOutcome::Canceled
			}
			Err(err) => {
				error!("loading {} view failed: {err}", context.view.key());
				LoadOutcome::Failed(err)
			}
		}
	}

	/// [`begin`](Self::begin), await, [`finish`](Self::finish). The cell is
	/// not borrowed across the await, so other loads may start meanwhile.
	pub async fn load(this: &RefCell<Self>, view: View, filter: YearFilter) -> LoadOutcome {
		let pending = this.borrow_mut().begin(view, filter);
		let completed = pending.run().await;
		this.borrow_mut().finish(completed)
	}
}

fn process(raw: RawRows) -> ViewData {
	match raw {
		RawRows::Unified(rows) => {
			let (graph, report) = GraphModelBuilder::build(&rows);
			ViewData::Graph { graph, report }
		}
		RawRows::Split { logs, cves } => {
			let mut builder = GraphModelBuilder::new();
			builder.ingest(&logs);
			let mut cve_builder = GraphModelBuilder::new();
			cve_builder.ingest(&cves);
			builder.merge(cve_builder);
			let linked = builder.correlate_packages();
			debug!("{linked} package links added by correlation");
			let (graph, report) = builder.finish();
			ViewData::Graph { graph, report }
		}
		RawRows::Counts(rows) => ViewData::Bubble(summary::product_counts(&rows)),
		RawRows::Stats { top, counts } => ViewData::Stats {
			top: summary::top_cves(&top, TOP_CVES),
			counts: summary::product_counts(&counts),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::Relation;

	struct Script<F>(F);

	impl<F: Fn(&str) -> Result<Vec<Row>, FetchError>> QueryClient for Script<F> {
		async fn run_query(&self, query: &str) -> Result<Vec<Row>, FetchError> {
			(self.0)(query)
		}
	}

	fn orchestrator<F>(f: F) -> FetchOrchestrator<Script<F>>
	where
		F: Fn(&str) -> Result<Vec<Row>, FetchError>,
	{
		FetchOrchestrator::new(Script(f), QueryTemplates::new("http://localhost:8890/linpack"))
	}

	fn log_row() -> Row {
		Row::from_pairs([
			("log", "http://www.semanticweb.org/logs-ontology-v2#event_3"),
			("type", "http://www.semanticweb.org/logs-ontology-v2#StateEvent"),
			("package_name", "openssl"),
			("package_version", "1.1.1f"),
			("package_architecture", "amd64"),
		])
	}

	fn cve_row() -> Row {
		Row::from_pairs([
			("cve", "http://purl.org/cyber/cve#CVE-2022-0778"),
			("base_score", "7.5"),
			("product_name", "openssl"),
			("version_interval", "http://purl.org/cyber/cve#openssl_1_1_1"),
			("version_min", "1.1.1"),
			("version_max", "1.1.1m"),
		])
	}

	#[test]
	fn begin_cancels_previous_request() {
		let mut orch = orchestrator(|_| Ok(Vec::new()));
		let first = orch.begin(View::Graph, YearFilter::All);
		let second = orch.begin(View::Bubble, YearFilter::All);
		assert!(first.context().is_canceled());
		assert!(!second.context().is_canceled());
		assert!(second.context().id() > first.context().id());
		assert!(orch.is_loading());
	}

	#[tokio::test]
	async fn stale_result_never_loads() {
		let mut orch = orchestrator(|_| Ok(vec![cve_row()]));
		let first = orch.begin(View::Graph, YearFilter::All);
		let completed_first = first.run().await;
		assert!(completed_first.result.is_ok());

		let second = orch.begin(View::Bubble, YearFilter::All);
		assert!(matches!(orch.finish(completed_first), LoadOutcome::Canceled));
		let outcome = orch.finish(second.run().await);
		assert!(matches!(outcome, LoadOutcome::Loaded(ViewData::Bubble(_))));
		assert!(!orch.is_loading());
	}

	#[tokio::test]
	async fn canceled_run_resolves_without_fetching() {
		let mut orch = orchestrator(|_| panic!("canceled load must not query"));
		let pending = orch.begin(View::Stats, YearFilter::All);
		orch.cancel();
		let completed = pending.run().await;
		assert!(matches!(completed.result, Err(FetchError::Canceled)));
		assert!(matches!(orch.finish(completed), LoadOutcome::Canceled));
	}

	#[tokio::test]
	async fn network_failure_is_reported() {
		let orch = RefCell::new(orchestrator(|_| {
			Err(FetchError::Network {
				status: 502,
				body: "store unreachable".into(),
			})
		}));
		let outcome = FetchOrchestrator::load(&orch, View::Graph, YearFilter::All).await;
		match outcome {
			LoadOutcome::Failed(FetchError::Network { status, body }) => {
				assert_eq!(status, 502);
				assert_eq!(body, "store unreachable");
			}
			other => panic!("unexpected outcome {other:?}"),
		}
	}

	#[tokio::test]
	async fn year_view_merges_and_correlates() {
		let orch = RefCell::new(orchestrator(|query| {
			if query.contains("STRSTARTS") {
				Ok(vec![cve_row()])
			} else if query.contains("ORDER BY ?timestamp") {
				Ok(vec![log_row()])
			} else {
				Ok(Vec::new())
			}
		}));
		let outcome = FetchOrchestrator::load(&orch, View::Graph, YearFilter::Year(2022)).await;
		let LoadOutcome::Loaded(ViewData::Graph { graph, report }) = outcome else {
			panic!("graph expected");
		};
		assert_eq!(report.rows, 2);
		assert!(graph.has_edge("event_3", "openssl-1.1.1f-amd64", Relation::HasPackage));
		assert!(graph.has_edge("openssl-1.1.1f-amd64", "prod_openssl", Relation::PackageOfProduct));
		assert!(graph.has_edge("openssl-1.1.1f-amd64", "openssl_1_1_1", Relation::VersionMatches));
	}

	#[tokio::test]
	async fn stats_view_runs_both_queries() {
		let orch = RefCell::new(orchestrator(|query| {
			if query.contains("DESC(?base_score)") {
				Ok(vec![cve_row()])
			} else {
				Ok(vec![Row::from_pairs([("product_name", "openssl"), ("cve_count", "9")])])
			}
		}));
		let outcome = FetchOrchestrator::load(&orch, View::Stats, YearFilter::All).await;
		let LoadOutcome::Loaded(ViewData::Stats { top, counts }) = outcome else {
			panic!("stats expected");
		};
		assert_eq!(top[0].id, "CVE-2022-0778");
		assert_eq!(counts[0].count, 9);
	}
}
