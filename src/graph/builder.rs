//! Turns relay rows into a deduplicated [`Graph`].
//!
//! Two row shapes are accepted, alone or mixed:
//!
//! - log rows: one event, optionally with an embedded package;
//! - CVE rows: one CVE × product × version interval tuple, optionally joined
//!   with an installed package and the event that installed it.
//!
//! When a CVE row carries both a package version and a version interval, the
//! package must lie inside the interval or the whole row is dropped before
//! anything is emitted for it.

use log::{debug, info};

use super::model::{Graph, Node, NodeId, NodeKind, Relation};
use super::row::{Row, local_name};
use crate::error::DataShapeError;
use crate::version;

/// Counters of one build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
	/// Rows seen.
	pub rows: usize,
	/// Rows skipped because their primary id was missing.
	pub skipped: usize,
	/// Rows dropped by the version-range gate.
	pub filtered: usize,
}

impl BuildReport {
	fn absorb(&mut self, other: BuildReport) {
		self.rows += other.rows;
		self.skipped += other.skipped;
		self.filtered += other.filtered;
	}
}

/// What happened to a single row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOutcome {
	/// Contributed nodes and edges.
	Accepted,
	/// Package version outside the row's interval; nothing emitted.
	Filtered,
}

struct PackageRef<'a> {
	id: NodeId,
	name: &'a str,
	version: Option<&'a str>,
}

impl<'a> PackageRef<'a> {
	fn from_row(row: &'a Row) -> Option<Self> {
		let name = row.get("package_name")?;
		let version = row.get("package_version");
		let id = [Some(name), version, row.get("package_architecture")]
			.into_iter()
			.flatten()
			.collect::<Vec<_>>()
			.join("-");
		Some(Self { id, name, version })
	}
}

/// Accumulates rows into a graph.
#[derive(Debug, Default)]
pub struct GraphModelBuilder {
	graph: Graph,
	report: BuildReport,
}

impl GraphModelBuilder {
	/// Empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a graph from one row set.
	pub fn build<'a>(rows: impl IntoIterator<Item = &'a Row>) -> (Graph, BuildReport) {
		let mut builder = Self::new();
		builder.ingest(rows);
		builder.finish()
	}

	/// Feed rows; malformed rows are counted and skipped.
	pub fn ingest<'a>(&mut self, rows: impl IntoIterator<Item = &'a Row>) {
		let offset = self.report.rows;
		for (i, row) in rows.into_iter().enumerate() {
			self.report.rows += 1;
			match self.ingest_row(offset + i, row) {
				Ok(RowOutcome::Accepted) => {}
				Ok(RowOutcome::Filtered) => self.report.filtered += 1,
				Err(err) => {
					debug!("skipping row: {err}");
					self.report.skipped += 1;
				}
			}
		}
	}

	/// Apply a single row.
	pub fn ingest_row(&mut self, index: usize, row: &Row) -> Result<RowOutcome, DataShapeError> {
		if row.get("cve").is_some() {
			self.ingest_cve_row(index, row)
		} else if row.get("log").is_some() {
			self.ingest_log_row(index, row)
		} else {
			Err(DataShapeError::MissingField {
				row: index,
				field: "cve or log",
			})
		}
	}

	/// Union another builder's graph into this one.
	pub fn merge(&mut self, other: GraphModelBuilder) {
		self.graph.merge(other.graph);
		self.report.absorb(other.report);
	}

	/// Link packages to products of the same name and to every interval of
	/// that product which contains the package version. Returns the number
	/// of edges added.
	pub fn correlate_packages(&mut self) -> usize {
		let candidates: Vec<(NodeId, NodeId, Option<String>)> = self
			.graph
			.nodes_of_kind(NodeKind::Package)
			.filter_map(|pkg| {
				let name = pkg.text("package_name")?;
				let product = format!("prod_{name}");
				self.graph.contains(&product).then(|| {
					(
						pkg.id.clone(),
						product,
						pkg.text("current_version").map(str::to_owned),
					)
				})
			})
			.collect();

		let mut added = 0;
		for (pkg, product, pkg_version) in candidates {
			if self.graph.add_edge(&pkg, &product, Relation::PackageOfProduct) {
				added += 1;
			}
			let matching: Vec<NodeId> = self
				.graph
				.outgoing(&product)
				.filter(|e| e.relation == Relation::HasVersion)
				.filter_map(|e| self.graph.node(&e.target))
				.filter(|v| version::in_range(pkg_version.as_deref(), v.text("min"), v.text("max")))
				.map(|v| v.id.clone())
				.collect();
			for version_id in matching {
				if self.graph.add_edge(&pkg, &version_id, Relation::VersionMatches) {
					added += 1;
				}
			}
		}
		added
	}

	/// The graph built so far and its counters.
	pub fn finish(self) -> (Graph, BuildReport) {
		info!(
			"graph built: {} nodes, {} edges from {} rows ({} skipped, {} outside version range)",
			self.graph.node_count(),
			self.graph.edge_count(),
			self.report.rows,
			self.report.skipped,
			self.report.filtered
		);
		(self.graph, self.report)
	}

	fn ingest_log_row(&mut self, index: usize, row: &Row) -> Result<RowOutcome, DataShapeError> {
		let event = self.upsert_event(row).ok_or(DataShapeError::MissingField {
			row: index,
			field: "log",
		})?;
		if let Some(pkg) = PackageRef::from_row(row) {
			self.upsert_package(&pkg, row);
			self.graph.add_edge(&event, &pkg.id, Relation::HasPackage);
		}
		Ok(RowOutcome::Accepted)
	}

	fn ingest_cve_row(&mut self, index: usize, row: &Row) -> Result<RowOutcome, DataShapeError> {
		let cve = row.get_local("cve").ok_or(DataShapeError::MissingField {
			row: index,
			field: "cve",
		})?;
		let package = PackageRef::from_row(row);
		let interval = row.get_local("version_interval");
		let (min, max) = (row.get("version_min"), row.get("version_max"));

		if let (Some(pkg_version), Some(_)) = (package.as_ref().and_then(|p| p.version), interval)
			&& !version::in_range(Some(pkg_version), min, max)
		{
			return Ok(RowOutcome::Filtered);
		}

		self.graph.upsert_node(
			Node::new(cve, NodeKind::Cve)
				.with_text("uri", row.get("cve"))
				.with_text("description", row.get("description"))
				.with_number("base_score", row.get_number("base_score"))
				.with_text("base_severity", row.get("base_severity"))
				.with_text("cvss_version", row.get("cvss_version"))
				.with_text("cvss_code", row.get("cvss_code"))
				.with_text("pub_date", row.get("pub_date")),
		);
		if let Some(reference) = row.get("reference") {
			let id = format!("ref_{reference}");
			self.graph.upsert_node(
				Node::new(id.clone(), NodeKind::Reference).with_text("url", Some(reference)),
			);
			self.graph.add_edge(cve, &id, Relation::HasReference);
		}

		let product = row.get("product_name").map(|name| self.upsert_product(name, row));

		let version_node = interval.map(|interval| {
			self.graph.upsert_node(
				Node::new(interval, NodeKind::Version)
					.with_text("uri", row.get("version_interval"))
					.with_text("min", min)
					.with_text("max", max),
			);
			if let Some(product) = &product {
				self.graph.add_edge(product, interval, Relation::HasVersion);
			}
			self.graph.add_edge(interval, cve, Relation::Affects);
			interval
		});

		if let Some(product) = &product {
			self.graph.add_edge(cve, product, Relation::HasAffectedProduct);
		}

		if let Some(pkg) = package {
			self.upsert_package(&pkg, row);
			// only a checked version may claim a match
			if let (Some(version), Some(_)) = (version_node, pkg.version) {
				self.graph.add_edge(&pkg.id, version, Relation::VersionMatches);
			}
			if let Some(product) = &product {
				self.graph.add_edge(&pkg.id, product, Relation::PackageOfProduct);
			}
			if let Some(event) = self.upsert_event(row) {
				self.graph.add_edge(&event, &pkg.id, Relation::HasPackage);
			}
		}

		Ok(RowOutcome::Accepted)
	}

	fn upsert_event(&mut self, row: &Row) -> Option<NodeId> {
		let id = row.get_local("log")?.to_owned();
		let event_type = row.get("type").map(local_name);
		self.graph.upsert_node(
			Node::new(id.clone(), NodeKind::LogEvent)
				.with_text("uri", row.get("log"))
				.with_text("event_type", event_type)
				.with_text("timestamp", row.get("timestamp"))
				.with_text("action", row.get("action"))
				.with_text("state", row.get("state"))
				.with_text("decision", row.get("decision"))
				.with_text("context", row.get("context"))
				.with_text("command", row.get("command")),
		);
		Some(id)
	}

	fn upsert_package(&mut self, pkg: &PackageRef<'_>, row: &Row) {
		let installed = row
			.get("installed")
			.map(|v| if v == "true" || v == "1" { "true" } else { "false" });
		self.graph.upsert_node(
			Node::new(pkg.id.clone(), NodeKind::Package)
				.with_text("uri", row.get("package"))
				.with_text("package_name", Some(pkg.name))
				.with_text("current_version", pkg.version)
				.with_text("package_architecture", row.get("package_architecture"))
				.with_text("installed", installed)
				.with_text("replaced_by", row.get("replaced_by").map(local_name)),
		);
	}

	fn upsert_product(&mut self, name: &str, row: &Row) -> NodeId {
		let id = format!("prod_{name}");
		let vendor = row.get("vendor_name");
		self.graph.upsert_node(
			Node::new(id.clone(), NodeKind::Product)
				.with_text("uri", row.get("product"))
				.with_text("name", Some(name))
				.with_text("vendor", vendor),
		);
		if let Some(vendor) = vendor {
			let vendor_id = format!("vendor_{vendor}");
			self.graph.upsert_node(
				Node::new(vendor_id.clone(), NodeKind::Vendor)
					.with_text("uri", row.get("vendor"))
					.with_text("name", Some(vendor)),
			);
			self.graph.add_edge(&id, &vendor_id, Relation::HasVendor);
		}
		id
	}
}
