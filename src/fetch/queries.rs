//! SPARQL text sent through the relay.
//!
//! Projected variable names are the row field names the graph builder and the
//! summary decoders read.

const PREFIXES: &str = "PREFIX logs: <http://www.semanticweb.org/logs-ontology-v2#>
PREFIX cve:  <http://purl.org/cyber/cve#>
PREFIX rdf:  <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
";

const EVENT_PATTERN: &str = "
    ?log rdf:type ?type .
    FILTER(?type IN (logs:StateEvent, logs:ActionEvent, logs:ConffileEvent, logs:StartupEvent))
    ?log logs:timestamp ?timestamp .
    OPTIONAL { ?log logs:action   ?action }
    OPTIONAL { ?log logs:state    ?state }
    OPTIONAL { ?log logs:decision ?decision }
    OPTIONAL { ?log logs:context  ?context }
    OPTIONAL { ?log logs:command  ?command }";

const CVE_PATTERN: &str = "
  ?cve a cve:CVE ;
       cve:description ?description ;
       cve:base_score ?base_score ;
       cve:base_severity ?base_severity ;
       cve:cvss_version ?cvss_version ;
       cve:cvss_code ?cvss_code ;
       cve:has_affected_product ?product .
  OPTIONAL { ?cve cve:pub_date ?pub_date }
  OPTIONAL {
    ?cve cve:has_references ?reference_node .
    ?reference_node cve:url ?reference .
  }

  ?product a cve:Product ;
           cve:product_name ?product_name ;
           cve:has_version_interval ?version_interval .
  OPTIONAL {
    ?product cve:has_vendor ?vendor .
    ?vendor cve:vendor_name ?vendor_name .
  }

  ?version_interval a cve:Versions ;
                    cve:has_cve_affecting_product ?cve .
  OPTIONAL { ?version_interval cve:min ?version_min }
  OPTIONAL { ?version_interval cve:max ?version_max }";

// total order over a CVE row, paged queries depend on it
const CVE_ORDER: &str = "?cve ?product ?version_interval ?vendor ?reference";

const CVE_VARS: &str = "?cve ?description ?base_score ?base_severity ?cvss_version ?cvss_code ?pub_date ?reference
  ?product ?product_name ?vendor ?vendor_name
  ?version_interval ?version_min ?version_max";

/// Query builders bound to one named graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTemplates {
	graph_iri: String,
}

impl QueryTemplates {
	/// Templates reading log data from `graph_iri`.
	pub fn new(graph_iri: impl Into<String>) -> Self {
		Self {
			graph_iri: graph_iri.into(),
		}
	}

	/// Named graph holding the log events.
	pub fn graph_iri(&self) -> &str {
		&self.graph_iri
	}

	/// Every log event with its installed package, if any.
	pub fn log_events(&self) -> String {
		format!(
			"{PREFIXES}
SELECT ?log ?type ?timestamp ?action ?state ?decision ?context ?command
       ?package ?package_name ?package_version ?package_architecture ?installed ?replaced_by
FROM <{graph}>
WHERE {{{EVENT_PATTERN}
    OPTIONAL {{
      ?log logs:has_package ?package .
      ?package logs:package_name ?package_name ;
               logs:current_version ?package_version ;
               logs:package_architecture ?package_architecture .
      OPTIONAL {{ ?package logs:installed ?installed }}
      OPTIONAL {{ ?package logs:replaced_by ?replaced_by }}
    }}
}}
ORDER BY ?timestamp ?log ?package",
			graph = self.graph_iri
		)
	}

	/// CVEs with their products, vendors and affected version intervals.
	pub fn cve_products(&self) -> String {
		format!(
			"{PREFIXES}
SELECT DISTINCT {CVE_VARS}
WHERE {{{CVE_PATTERN}
}}
ORDER BY {CVE_ORDER}"
		)
	}

	/// [`cve_products`](Self::cve_products) limited to CVEs published in `year`.
	pub fn cve_products_by_year(&self, year: u16) -> String {
		format!(
			"{PREFIXES}
SELECT DISTINCT {CVE_VARS}
WHERE {{{CVE_PATTERN}
  FILTER (BOUND(?pub_date) && STRSTARTS(STR(?pub_date), \"{year}\"))
}}
ORDER BY {CVE_ORDER}"
		)
	}

	/// Log events joined with the CVEs of the product their package is named
	/// after. Version ranges are checked client side.
	pub fn logs_with_cves(&self) -> String {
		format!(
			"{PREFIXES}
SELECT DISTINCT ?log ?type ?timestamp ?action ?state ?decision ?context ?command
       ?package ?package_name ?package_version ?package_architecture ?installed ?replaced_by
       {CVE_VARS}
WHERE {{
  GRAPH <{graph}> {{{EVENT_PATTERN}
    ?log logs:has_package ?package .
    ?package logs:package_name ?package_name ;
             logs:current_version ?package_version ;
             logs:package_architecture ?package_architecture .
    OPTIONAL {{ ?package logs:installed ?installed }}
    OPTIONAL {{ ?package logs:replaced_by ?replaced_by }}
  }}
{CVE_PATTERN}
  FILTER (STR(?product_name) = STR(?package_name))
}}
ORDER BY ?timestamp ?log ?package {CVE_ORDER}",
			graph = self.graph_iri
		)
	}

	/// The `limit` CVEs with the highest base score.
	pub fn top_severity(&self, limit: usize) -> String {
		format!(
			"{PREFIXES}
SELECT ?cve ?description ?base_score ?base_severity ?cvss_version ?cvss_code
WHERE {{
  ?cve a cve:CVE ;
       cve:description ?description ;
       cve:base_score ?base_score ;
       cve:base_severity ?base_severity ;
       cve:cvss_version ?cvss_version ;
       cve:cvss_code ?cvss_code .
}}
ORDER BY DESC(?base_score)
LIMIT {limit}"
		)
	}

	/// Number of CVEs per product name.
	pub fn cve_count_per_product(&self) -> String {
		format!(
			"{PREFIXES}
SELECT ?product_name (COUNT(DISTINCT ?cve) AS ?cve_count)
WHERE {{
  ?cve cve:has_affected_product ?product .
  ?product rdf:type cve:Product ;
           cve:product_name ?product_name .
}}
GROUP BY ?product_name
ORDER BY DESC(?cve_count) ?product_name"
		)
	}
}
