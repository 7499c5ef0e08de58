use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use serde::Serialize;

/// Deterministic composite key of a node.
pub type NodeId = String;

/// Closed set of entity kinds in the exploration graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeKind {
	/// A dpkg log event (action, state, conffile or startup).
	LogEvent,
	/// An installed package, keyed by name, version and architecture.
	Package,
	/// A product named by the CVE knowledge base.
	Product,
	/// The vendor of a product.
	Vendor,
	/// A version interval of a product affected by a CVE.
	Version,
	/// A vulnerability.
	Cve,
	/// An external reference attached to a CVE.
	Reference,
}

impl NodeKind {
	/// Label used in tooltips and logs.
	pub fn label(self) -> &'static str {
		match self {
			NodeKind::LogEvent => "Event",
			NodeKind::Package => "Package",
			NodeKind::Product => "Product",
			NodeKind::Vendor => "Vendor",
			NodeKind::Version => "Version",
			NodeKind::Cve => "CVE",
			NodeKind::Reference => "Reference",
		}
	}
}

/// Attribute value carried by a node.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
	/// Free text.
	Text(String),
	/// Numeric literal such as a CVSS base score.
	Number(f64),
}

impl AttrValue {
	/// Empty text is a gap that later rows may fill.
	pub fn is_blank(&self) -> bool {
		match self {
			AttrValue::Text(s) => s.trim().is_empty(),
			AttrValue::Number(n) => !n.is_finite(),
		}
	}

	/// Text view of the value.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			AttrValue::Text(s) => Some(s),
			AttrValue::Number(_) => None,
		}
	}

	/// Numeric view of the value.
	pub fn as_number(&self) -> Option<f64> {
		match self {
			AttrValue::Number(n) => Some(*n),
			AttrValue::Text(s) => s.trim().parse().ok(),
		}
	}
}

impl fmt::Display for AttrValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AttrValue::Text(s) => f.write_str(s),
			AttrValue::Number(n) => write!(f, "{n}"),
		}
	}
}

/// A graph vertex.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
	/// Composite key, unique within a graph.
	pub id: NodeId,
	/// Entity kind.
	pub kind: NodeKind,
	/// Field name to value; absent means not known.
	pub attributes: BTreeMap<String, AttrValue>,
}

impl Node {
	/// Node without attributes.
	pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
		Self {
			id: id.into(),
			kind,
			attributes: BTreeMap::new(),
		}
	}

	/// Set a text attribute when `value` is present and not blank.
	pub fn with_text(mut self, key: &str, value: Option<&str>) -> Self {
		if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
			self.attributes
				.insert(key.to_owned(), AttrValue::Text(v.to_owned()));
		}
		self
	}

	/// Set a numeric attribute when `value` is present and finite.
	pub fn with_number(mut self, key: &str, value: Option<f64>) -> Self {
		if let Some(v) = value.filter(|v| v.is_finite()) {
			self.attributes.insert(key.to_owned(), AttrValue::Number(v));
		}
		self
	}

	/// Attribute lookup.
	pub fn attr(&self, key: &str) -> Option<&AttrValue> {
		self.attributes.get(key)
	}

	/// Text attribute lookup.
	pub fn text(&self, key: &str) -> Option<&str> {
		self.attr(key).and_then(AttrValue::as_text)
	}

	/// Fill gaps from `other`; present values are never overwritten.
	pub fn absorb(&mut self, other: Node) {
		if other.kind != self.kind {
			debug!(
				"node {} seen as {:?} and {:?}, keeping the first",
				self.id, self.kind, other.kind
			);
		}
		for (key, value) in other.attributes {
			if value.is_blank() {
				continue;
			}
			match self.attributes.get_mut(&key) {
				Some(existing) if !existing.is_blank() => {}
				Some(existing) => *existing = value,
				None => {
					self.attributes.insert(key, value);
				}
			}
		}
	}
}

/// Tag of a directed edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
	/// LogEvent → Package.
	HasPackage,
	/// Product → Version.
	HasVersion,
	/// Version → CVE.
	Affects,
	/// CVE → Product.
	HasAffectedProduct,
	/// Package → Version whose interval contains the package version.
	VersionMatches,
	/// Package → Product of the same name.
	PackageOfProduct,
	/// Product → Vendor.
	HasVendor,
	/// CVE → Reference.
	HasReference,
}

impl Relation {
	/// Wire name of the tag.
	pub fn as_str(self) -> &'static str {
		match self {
			Relation::HasPackage => "has_package",
			Relation::HasVersion => "has_version",
			Relation::Affects => "affects",
			Relation::HasAffectedProduct => "has_affected_product",
			Relation::VersionMatches => "version_matches",
			Relation::PackageOfProduct => "package_of_product",
			Relation::HasVendor => "has_vendor",
			Relation::HasReference => "has_reference",
		}
	}

	/// Whether an edge of this relation between these kinds is a
	/// parent → child link in the disclosure tree.
	pub fn is_hierarchical(self, source: NodeKind, target: NodeKind) -> bool {
		matches!(
			(self, source, target),
			(Relation::HasVersion, NodeKind::Product, NodeKind::Version)
				| (Relation::Affects, NodeKind::Version, NodeKind::Cve)
				| (Relation::HasPackage, NodeKind::LogEvent, NodeKind::Package)
		)
	}
}

impl fmt::Display for Relation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A directed, tagged edge. Identity is the `(source, target, relation)` triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
	/// Source node id.
	pub source: NodeId,
	/// Target node id.
	pub target: NodeId,
	/// Relation tag.
	pub relation: Relation,
}

impl Edge {
	/// Edge from `source` to `target`.
	pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, relation: Relation) -> Self {
		Self {
			source: source.into(),
			target: target.into(),
			relation,
		}
	}
}

/// Deduplicated property graph. Every stored edge references stored nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Graph {
	nodes: BTreeMap<NodeId, Node>,
	edges: BTreeSet<Edge>,
}

impl Graph {
	/// Empty graph.
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert `node`, or merge its attributes into the node with the same id.
	pub fn upsert_node(&mut self, node: Node) -> &mut Node {
		match self.nodes.entry(node.id.clone()) {
			std::collections::btree_map::Entry::Occupied(entry) => {
				let existing = entry.into_mut();
				existing.absorb(node);
				existing
			}
			std::collections::btree_map::Entry::Vacant(entry) => entry.insert(node),
		}
	}

	/// Insert an edge. Returns `false` if an endpoint is unknown (the edge is
	/// dropped) or the triple is already present.
	pub fn add_edge(&mut self, source: &str, target: &str, relation: Relation) -> bool {
		if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
			debug!("dropping {relation} edge {source} -> {target}: unknown endpoint");
			return false;
		}
		self.edges.insert(Edge::new(source, target, relation))
	}

	/// Union of `self` and `other`. Nodes keep first-seen attributes, filled
	/// by `other` where missing; edges are a set union.
	pub fn merge(&mut self, other: Graph) {
		for (_, node) in other.nodes {
			self.upsert_node(node);
		}
		for edge in other.edges {
			self.edges.insert(edge);
		}
	}

	/// `a` merged with `b`.
	pub fn merged(mut a: Graph, b: Graph) -> Graph {
		a.merge(b);
		a
	}

	/// Node by id.
	pub fn node(&self, id: &str) -> Option<&Node> {
		self.nodes.get(id)
	}

	/// `true` if a node with `id` exists.
	pub fn contains(&self, id: &str) -> bool {
		self.nodes.contains_key(id)
	}

	/// Nodes in id order.
	pub fn nodes(&self) -> impl Iterator<Item = &Node> {
		self.nodes.values()
	}

	/// Edges in `(source, target, relation)` order.
	pub fn edges(&self) -> impl Iterator<Item = &Edge> {
		self.edges.iter()
	}

	/// `true` if the exact triple is stored.
	pub fn has_edge(&self, source: &str, target: &str, relation: Relation) -> bool {
		self.edges.contains(&Edge::new(source, target, relation))
	}

	/// Number of nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Number of edges.
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	/// `true` if there are no nodes.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Nodes of one kind.
	pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
		self.nodes.values().filter(move |n| n.kind == kind)
	}

	/// Edges leaving `id`.
	pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
		self.edges.iter().filter(move |e| e.source == id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn package(id: &str) -> Node {
		Node::new(id, NodeKind::Package)
	}

	#[test]
	fn upsert_fills_gaps_without_overwriting() {
		let mut g = Graph::new();
		g.upsert_node(
			package("nginx-1.18.0-amd64")
				.with_text("package_name", Some("nginx"))
				.with_text("installed", Some("")),
		);
		g.upsert_node(
			package("nginx-1.18.0-amd64")
				.with_text("package_name", Some("nginx-core"))
				.with_text("installed", Some("true"))
				.with_text("replaced_by", Some("nginx-1.20.0-amd64")),
		);

		let node = g.node("nginx-1.18.0-amd64").unwrap();
		assert_eq!(g.node_count(), 1);
		assert_eq!(node.text("package_name"), Some("nginx"));
		assert_eq!(node.text("installed"), Some("true"));
		assert_eq!(node.text("replaced_by"), Some("nginx-1.20.0-amd64"));
	}

	#[test]
	fn blank_text_fills_nothing() {
		let mut a = package("p");
		a.attributes
			.insert("arch".into(), AttrValue::Text("amd64".into()));
		let mut b = package("p");
		b.attributes.insert("arch".into(), AttrValue::Text(" ".into()));
		a.absorb(b);
		assert_eq!(a.text("arch"), Some("amd64"));
	}

	#[test]
	fn edges_to_unknown_nodes_are_dropped() {
		let mut g = Graph::new();
		g.upsert_node(package("a"));
		assert!(!g.add_edge("a", "missing", Relation::VersionMatches));
		assert_eq!(g.edge_count(), 0);
	}

	#[test]
	fn duplicate_triples_collapse() {
		let mut g = Graph::new();
		g.upsert_node(Node::new("v1", NodeKind::Version));
		g.upsert_node(Node::new("CVE-1", NodeKind::Cve));
		assert!(g.add_edge("v1", "CVE-1", Relation::Affects));
		assert!(!g.add_edge("v1", "CVE-1", Relation::Affects));
		assert!(g.add_edge("CVE-1", "v1", Relation::Affects));
		assert_eq!(g.edge_count(), 2);
	}

	#[test]
	fn merge_is_idempotent_and_commutative() {
		let mut a = Graph::new();
		a.upsert_node(Node::new("prod_nginx", NodeKind::Product));
		a.upsert_node(Node::new("v1", NodeKind::Version));
		a.add_edge("prod_nginx", "v1", Relation::HasVersion);

		let mut b = Graph::new();
		b.upsert_node(Node::new("v1", NodeKind::Version));
		b.upsert_node(Node::new("CVE-1", NodeKind::Cve));
		b.add_edge("v1", "CVE-1", Relation::Affects);

		assert_eq!(Graph::merged(a.clone(), a.clone()), a);
		assert_eq!(
			Graph::merged(a.clone(), b.clone()),
			Graph::merged(b.clone(), a.clone())
		);
	}

	#[test]
	fn hierarchy_is_kind_checked() {
		assert!(Relation::HasVersion.is_hierarchical(NodeKind::Product, NodeKind::Version));
		assert!(Relation::Affects.is_hierarchical(NodeKind::Version, NodeKind::Cve));
		assert!(Relation::HasPackage.is_hierarchical(NodeKind::LogEvent, NodeKind::Package));
		assert!(!Relation::HasAffectedProduct.is_hierarchical(NodeKind::Cve, NodeKind::Product));
		assert!(!Relation::Affects.is_hierarchical(NodeKind::Cve, NodeKind::Version));
	}
}
