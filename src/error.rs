//! Error types shared by the fetch pipeline, the graph builder and the
//! version matcher.

use thiserror::Error;

/// Failure of one load against the query relay.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The relay answered with a non-2xx status.
	#[error("relay returned HTTP {status}: {body}")]
	Network {
		/// HTTP status code.
		status: u16,
		/// Response body, usually the store's error text.
		body: String,
	},

	/// The request never produced a response.
	#[error("transport error: {0}")]
	Transport(String),

	/// The response body was not a SPARQL JSON result document.
	#[error("malformed query response: {0}")]
	Decode(String),

	/// The load was superseded before its result was consumed.
	#[error("request canceled")]
	Canceled,
}

impl FetchError {
	/// Cancellation is expected and never reported as a failure.
	pub fn is_canceled(&self) -> bool {
		matches!(self, FetchError::Canceled)
	}
}

impl From<reqwest::Error> for FetchError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			FetchError::Decode(err.to_string())
		} else {
			FetchError::Transport(err.to_string())
		}
	}
}

/// A row that lacks the field identifying its primary entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataShapeError {
	/// Required field is unbound or blank.
	#[error("row {row} is missing `{field}`")]
	MissingField {
		/// Position of the row in its result set.
		row: usize,
		/// Name of the missing binding.
		field: &'static str,
	},
}

/// A version string that does not follow `digit (alnum | '.' | '-')*`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
	/// Empty or whitespace-only input.
	#[error("empty version string")]
	Empty,

	/// First character is not an ASCII digit.
	#[error("version '{0}' does not start with a digit")]
	LeadingNonDigit(String),

	/// Character outside alphanumerics, `.` and `-`.
	#[error("version '{version}' contains invalid character {ch:?}")]
	InvalidChar {
		/// Offending input.
		version: String,
		/// First rejected character.
		ch: char,
	},
}

/// Invalid runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The configuration document is not valid JSON for [`crate::config::Config`].
	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),

	/// A field parsed but holds an unusable value.
	#[error("invalid config field `{field}`: {reason}")]
	Invalid {
		/// Field name.
		field: &'static str,
		/// Why it was rejected.
		reason: String,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn network_error_carries_status_and_body() {
		let err = FetchError::Network {
			status: 502,
			body: "Virtuoso 37000 Error".into(),
		};
		let msg = err.to_string();
		assert!(msg.contains("502"));
		assert!(msg.contains("Virtuoso 37000"));
		assert!(!err.is_canceled());
	}

	#[test]
	fn canceled_is_recognised() {
		assert!(FetchError::Canceled.is_canceled());
	}

	#[test]
	fn data_shape_display_names_field() {
		let err = DataShapeError::MissingField { row: 3, field: "cve" };
		assert_eq!(err.to_string(), "row 3 is missing `cve`");
	}
}
