//! Runtime configuration: compile-time defaults, optionally overridden by a
//! JSON document embedded in the host page.

use log::{info, warn};
use serde::Deserialize;

use crate::components::force_graph::LayoutConfig;
use crate::error::ConfigError;
use crate::fetch::QueryTemplates;

/// Relay endpoint unless overridden.
pub const DEFAULT_RELAY_URL: &str = match option_env!("CVE_GRAPH_RELAY_URL") {
	Some(url) => url,
	None => "http://localhost:3001/sparql",
};

/// Named graph holding log data unless overridden.
pub const DEFAULT_GRAPH_IRI: &str = match option_env!("CVE_GRAPH_IRI") {
	Some(iri) => iri,
	None => "http://localhost:8890/linpack",
};

/// Id of the `<script type="application/json">` element read at startup.
pub const CONFIG_ELEMENT_ID: &str = "cve-graph-config";

/// Application settings.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
	/// Query relay URL.
	pub relay_url: String,
	/// Named graph with log events.
	pub graph_iri: String,
	/// Page size for unbounded queries; `None` fetches in one request.
	pub page_size: Option<usize>,
	/// Years offered by the year filter, newest first.
	pub years: Vec<u16>,
	/// Force simulation tunables.
	pub layout: LayoutConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
	relay_url: Option<String>,
	graph_iri: Option<String>,
	page_size: Option<usize>,
	years: Option<Vec<u16>>,
	layout: Option<LayoutConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			relay_url: DEFAULT_RELAY_URL.to_owned(),
			graph_iri: DEFAULT_GRAPH_IRI.to_owned(),
			page_size: None,
			years: (2015..=2025).rev().collect(),
			layout: LayoutConfig::default(),
		}
	}
}

impl Config {
	/// Parse a JSON override and merge it over the defaults.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let raw: RawConfig = serde_json::from_str(json)?;
		Self::default().merge(raw)
	}

	/// Read the override from the host page. Missing element means defaults;
	/// a broken one is logged and ignored.
	pub fn load_from_document() -> Self {
		let text = web_sys::window()
			.and_then(|w| w.document())
			.and_then(|d| d.get_element_by_id(CONFIG_ELEMENT_ID))
			.and_then(|e| e.text_content());
		let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
			return Self::default();
		};
		match Self::from_json(&text) {
			Ok(config) => {
				info!("config loaded, relay at {}", config.relay_url);
				config
			}
			Err(err) => {
				warn!("ignoring #{CONFIG_ELEMENT_ID}: {err}");
				Self::default()
			}
		}
	}

	/// Query templates for the configured graph.
	pub fn queries(&self) -> QueryTemplates {
		QueryTemplates::new(self.graph_iri.clone())
	}

	fn merge(mut self, raw: RawConfig) -> Result<Self, ConfigError> {
		if let Some(url) = raw.relay_url {
			if !(url.starts_with("http://") || url.starts_with("https://")) {
				return Err(ConfigError::Invalid {
					field: "relay_url",
					reason: format!("`{url}` is not an http(s) URL"),
				});
			}
			self.relay_url = url;
		}
		if let Some(iri) = raw.graph_iri {
			if iri.trim().is_empty() {
				return Err(ConfigError::Invalid {
					field: "graph_iri",
					reason: "must not be empty".into(),
				});
			}
			self.graph_iri = iri;
		}
		if let Some(size) = raw.page_size {
			if size == 0 {
				return Err(ConfigError::Invalid {
					field: "page_size",
					reason: "must be positive".into(),
				});
			}
			self.page_size = Some(size);
		}
		if let Some(mut years) = raw.years {
			years.sort_unstable_by(|a, b| b.cmp(a));
			years.dedup();
			self.years = years;
		}
		if let Some(layout) = raw.layout {
			self.layout = layout.validated();
		}
		Ok(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_keeps_defaults() {
		let config = Config::from_json("{}").unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.relay_url, DEFAULT_RELAY_URL);
	}

	#[test]
	fn fields_override_defaults() {
		let config = Config::from_json(
			r#"{
				"relay_url": "https://relay.example.org/sparql",
				"page_size": 500,
				"years": [2020, 2023, 2020],
				"layout": { "rest_distance": 80.0 }
			}"#,
		)
		.unwrap();
		assert_eq!(config.relay_url, "https://relay.example.org/sparql");
		assert_eq!(config.graph_iri, DEFAULT_GRAPH_IRI);
		assert_eq!(config.page_size, Some(500));
		assert_eq!(config.years, [2023, 2020]);
		assert_eq!(config.layout.rest_distance, 80.0);
		assert_eq!(config.layout.alpha_decay, LayoutConfig::default().alpha_decay);
	}

	#[test]
	fn invalid_values_are_rejected() {
		assert!(matches!(
			Config::from_json(r#"{"relay_url": "ftp://x"}"#),
			Err(ConfigError::Invalid {
				field: "relay_url",
				..
			})
		));
		assert!(matches!(
			Config::from_json(r#"{"page_size": 0}"#),
			Err(ConfigError::Invalid {
				field: "page_size",
				..
			})
		));
		assert!(matches!(
			Config::from_json(r#"{"relay": "typo"}"#),
			Err(ConfigError::Parse(_))
		));
		assert!(matches!(Config::from_json("not json"), Err(ConfigError::Parse(_))));
	}
}
