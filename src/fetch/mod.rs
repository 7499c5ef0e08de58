//! Loading view data from the query relay.

mod client;
mod orchestrator;
pub mod queries;

use std::fmt;

pub use client::RelayClient;
pub use orchestrator::{CompletedLoad, FetchOrchestrator, LoadOutcome, PendingLoad, RequestContext};
pub use queries::QueryTemplates;

use crate::error::FetchError;
use crate::graph::{BuildReport, Graph, Row};
use crate::summary::{CveSummary, ProductCount};

/// Runs one query and returns its rows.
#[allow(async_fn_in_trait)]
pub trait QueryClient {
	/// Run `query` once.
	async fn run_query(&self, query: &str) -> Result<Vec<Row>, FetchError>;

	/// Run `query` in `LIMIT`/`OFFSET` pages of `page_size` rows until a
	/// short page comes back, concatenating the results. `query` must end in
	/// an `ORDER BY` that totally orders its rows, or pages may overlap.
	async fn run_query_paged(&self, query: &str, page_size: usize) -> Result<Vec<Row>, FetchError> {
		if page_size == 0 {
			return self.run_query(query).await;
		}
		let mut rows = Vec::new();
		let mut offset = 0;
		loop {
			let page = self
				.run_query(&format!("{query}\nLIMIT {page_size}\nOFFSET {offset}"))
				.await?;
			let len = page.len();
			rows.extend(page);
			if len < page_size {
				return Ok(rows);
			}
			offset += page_size;
		}
	}
}

/// Which presentation a load feeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum View {
	/// Collapsible node-link graph.
	#[default]
	Graph,
	/// CVE count per product.
	Bubble,
	/// Highest severity CVEs.
	Stats,
}

impl View {
	/// All views, in menu order.
	pub const ALL: [View; 3] = [View::Graph, View::Bubble, View::Stats];

	/// Stable key used in the view selector.
	pub fn key(self) -> &'static str {
		match self {
			View::Graph => "graph",
			View::Bubble => "bubble",
			View::Stats => "stats",
		}
	}

	/// Human readable name.
	pub fn title(self) -> &'static str {
		match self {
			View::Graph => "Graph",
			View::Bubble => "CVEs per product",
			View::Stats => "Top CVEs",
		}
	}

	/// Inverse of [`key`](Self::key).
	pub fn from_key(key: &str) -> Option<View> {
		View::ALL.into_iter().find(|v| v.key() == key)
	}
}

/// Publication year restriction on the graph view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum YearFilter {
	/// Every CVE.
	#[default]
	All,
	/// CVEs published in the given year.
	Year(u16),
}

impl YearFilter {
	/// Parse a selector value: `all` or a four digit year.
	pub fn parse(value: &str) -> Option<YearFilter> {
		match value.trim() {
			"all" | "" => Some(YearFilter::All),
			year => year.parse().ok().map(YearFilter::Year),
		}
	}
}

impl fmt::Display for YearFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			YearFilter::All => f.write_str("all"),
			YearFilter::Year(y) => write!(f, "{y}"),
		}
	}
}

/// Processed result of a load, ready for its view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewData {
	/// Graph view.
	Graph {
		/// Built and merged graph.
		graph: Graph,
		/// Row counters of the build.
		report: BuildReport,
	},
	/// Bubble view.
	Bubble(Vec<ProductCount>),
	/// Statistics view.
	Stats {
		/// Highest scoring CVEs.
		top: Vec<CveSummary>,
		/// CVE counts per product.
		counts: Vec<ProductCount>,
	},
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use super::*;

	struct Pages {
		total: usize,
		seen: RefCell<Vec<String>>,
	}

	impl QueryClient for Pages {
		async fn run_query(&self, query: &str) -> Result<Vec<Row>, FetchError> {
			self.seen.borrow_mut().push(query.to_owned());
			let offset: usize = query
				.rsplit("OFFSET ")
				.next()
				.and_then(|o| o.trim().parse().ok())
				.unwrap_or(0);
			let limit: usize = query
				.split("LIMIT ")
				.nth(1)
				.and_then(|l| l.lines().next())
				.and_then(|l| l.trim().parse().ok())
				.unwrap_or(self.total);
			let end = (offset + limit).min(self.total);
			Ok((offset..end)
				.map(|i| Row::from_pairs([("n", i.to_string())]))
				.collect())
		}
	}

	#[tokio::test]
	async fn paging_stops_on_short_page() {
		let client = Pages {
			total: 25,
			seen: RefCell::new(Vec::new()),
		};
		let rows = client.run_query_paged("SELECT *", 10).await.unwrap();
		assert_eq!(rows.len(), 25);
		assert_eq!(rows[24].get("n"), Some("24"));
		assert_eq!(client.seen.borrow().len(), 3);
	}

	#[tokio::test]
	async fn exact_multiple_needs_one_empty_page() {
		let client = Pages {
			total: 20,
			seen: RefCell::new(Vec::new()),
		};
		let rows = client.run_query_paged("SELECT *", 10).await.unwrap();
		assert_eq!(rows.len(), 20);
		assert_eq!(client.seen.borrow().len(), 3);
	}

	#[test]
	fn selector_values_round_trip() {
		for view in View::ALL {
			assert_eq!(View::from_key(view.key()), Some(view));
		}
		assert_eq!(View::from_key("topCVEs"), None);
		assert_eq!(YearFilter::parse("all"), Some(YearFilter::All));
		assert_eq!(YearFilter::parse("2021"), Some(YearFilter::Year(2021)));
		assert_eq!(YearFilter::parse("20x1"), None);
		assert_eq!(YearFilter::Year(2019).to_string(), "2019");
	}
}
