use log::debug;
use reqwest::header::ACCEPT;

use super::QueryClient;
use crate::error::FetchError;
use crate::graph::{Row, rows_from_json};

const SPARQL_JSON: &str = "application/sparql-results+json";

/// [`QueryClient`] that sends queries through the HTTP relay.
#[derive(Clone, Debug)]
pub struct RelayClient {
	http: reqwest::Client,
	endpoint: String,
}

impl RelayClient {
	/// Client for the relay at `endpoint`, e.g. `http://localhost:3001/sparql`.
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			endpoint: endpoint.into(),
		}
	}

	/// Relay URL.
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

impl QueryClient for RelayClient {
	async fn run_query(&self, query: &str) -> Result<Vec<Row>, FetchError> {
		let response = self
			.http
			.get(&self.endpoint)
			.query(&[("query", query)])
			.header(ACCEPT, SPARQL_JSON)
			.send()
			.await?;
		let status = response.status();
		let body = response.text().await?;
		if !status.is_success() {
			return Err(FetchError::Network {
				status: status.as_u16(),
				body,
			});
		}
		let rows = rows_from_json(&body)?;
		debug!("relay returned {} rows", rows.len());
		Ok(rows)
	}
}
