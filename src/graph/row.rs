//! Flat result rows as returned by the SPARQL relay.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::FetchError;

/// One binding value of a SPARQL JSON result.
#[derive(Clone, Debug, Deserialize)]
pub struct BindingValue {
	/// `uri`, `literal` or `bnode`.
	#[serde(rename = "type", default)]
	pub kind: Option<String>,
	/// Lexical value.
	pub value: String,
	/// Literal datatype IRI, if any.
	#[serde(default)]
	pub datatype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
	results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
	bindings: Vec<HashMap<String, BindingValue>>,
}

/// A single result record: field name to value. An unbound field is absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
	fields: HashMap<String, String>,
}

impl Row {
	/// Build a row from `(field, value)` pairs.
	pub fn from_pairs<K, V, I>(pairs: I) -> Self
	where
		K: Into<String>,
		V: Into<String>,
		I: IntoIterator<Item = (K, V)>,
	{
		Self {
			fields: pairs
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}

	/// Value of `field`; blank values count as unbound.
	pub fn get(&self, field: &str) -> Option<&str> {
		self.fields
			.get(field)
			.map(String::as_str)
			.filter(|v| !v.trim().is_empty())
	}

	/// Numeric value of `field`, if bound and parseable.
	pub fn get_number(&self, field: &str) -> Option<f64> {
		self.get(field)?.trim().parse().ok()
	}

	/// Local name of an IRI-valued `field` (see [`local_name`]).
	pub fn get_local(&self, field: &str) -> Option<&str> {
		self.get(field).map(local_name).filter(|v| !v.is_empty())
	}

	/// Bind `field` to `value`.
	pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
		self.fields.insert(field.into(), value.into());
	}

	/// Number of bound fields.
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// `true` if no field is bound.
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

impl From<HashMap<String, BindingValue>> for Row {
	fn from(binding: HashMap<String, BindingValue>) -> Self {
		Self {
			fields: binding.into_iter().map(|(k, v)| (k, v.value)).collect(),
		}
	}
}

/// Decode a `application/sparql-results+json` document into rows.
pub fn rows_from_json(body: &str) -> Result<Vec<Row>, FetchError> {
	let parsed: SparqlResults =
		serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
	Ok(parsed.results.bindings.into_iter().map(Row::from).collect())
}

/// Fragment after the last `#` or `/` of an IRI; the input itself if it has neither.
pub fn local_name(uri: &str) -> &str {
	match uri.rfind(['#', '/']) {
		Some(idx) => &uri[idx + 1..],
		None => uri,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_bindings() {
		let body = r#"{
			"head": { "vars": ["cve", "base_score"] },
			"results": { "bindings": [
				{
					"cve": { "type": "uri", "value": "http://purl.org/cyber/cve#CVE-2021-23017" },
					"base_score": { "type": "literal", "value": "7.7", "datatype": "http://www.w3.org/2001/XMLSchema#decimal" }
				},
				{ "cve": { "type": "uri", "value": "http://purl.org/cyber/cve#CVE-2019-9511" } }
			] }
		}"#;
		let rows = rows_from_json(body).unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0].get_local("cve"), Some("CVE-2021-23017"));
		assert_eq!(rows[0].get_number("base_score"), Some(7.7));
		assert_eq!(rows[1].get("base_score"), None);
	}

	#[test]
	fn rejects_non_result_documents() {
		let err = rows_from_json(r#"{"error": "boom"}"#).unwrap_err();
		assert!(matches!(err, FetchError::Decode(_)));
	}

	#[test]
	fn blank_values_are_unbound() {
		let row = Row::from_pairs([("version_min", "  "), ("version_max", "1.17.0")]);
		assert_eq!(row.get("version_min"), None);
		assert_eq!(row.get("version_max"), Some("1.17.0"));
	}

	#[test]
	fn local_names() {
		assert_eq!(local_name("http://example.org/logs#event_42"), "event_42");
		assert_eq!(local_name("http://example.org/versions/v_17"), "v_17");
		assert_eq!(local_name("plain"), "plain");
		assert_eq!(local_name("http://example.org/"), "");
	}
}
