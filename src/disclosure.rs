//! Expand/collapse state over the hierarchical part of the graph.
//!
//! Hierarchy edges are `Product → Version`, `Version → CVE` and
//! `Event → Package`. A node reachable through several of them keeps the
//! first one (in edge order) as its parent; the others stay ordinary edges
//! that show up whenever both endpoints are visible.

use std::collections::{HashMap, HashSet};

use crate::graph::{Edge, Graph, NodeId};

/// Disclosure state of a single node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disclosure {
	/// Children hidden.
	Collapsed,
	/// Children shown.
	Expanded,
}

/// The part of the graph currently on screen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleSubgraph {
	/// Visible nodes in pre-order from the roots.
	pub nodes: Vec<NodeId>,
	/// Hierarchical parent of every visible non-root node.
	pub parents: HashMap<NodeId, NodeId>,
	/// Graph edges whose endpoints are both visible.
	pub edges: Vec<Edge>,
	/// Disclosure generation this snapshot was taken at.
	pub generation: u64,
}

impl VisibleSubgraph {
	/// `true` if `id` is part of the snapshot.
	pub fn contains(&self, id: &str) -> bool {
		self.nodes.iter().any(|n| n == id)
	}
}

/// Owns the per-node collapsed/expanded map and derives the visible set.
#[derive(Clone, Debug, Default)]
pub struct DisclosureController {
	children: HashMap<NodeId, Vec<NodeId>>,
	parent: HashMap<NodeId, NodeId>,
	roots: Vec<NodeId>,
	expanded: HashSet<NodeId>,
	generation: u64,
}

impl DisclosureController {
	/// Controller for `graph` with every node collapsed.
	pub fn new(graph: &Graph) -> Self {
		let mut controller = Self::default();
		controller.reset(graph);
		controller
	}

	/// Rebuild the hierarchy from `graph` and collapse everything.
	pub fn reset(&mut self, graph: &Graph) {
		self.children.clear();
		self.parent.clear();
		self.expanded.clear();

		for edge in graph.edges() {
			let (Some(source), Some(target)) = (graph.node(&edge.source), graph.node(&edge.target))
			else {
				continue;
			};
			if !edge.relation.is_hierarchical(source.kind, target.kind)
				|| self.parent.contains_key(&edge.target)
			{
				continue;
			}
			self.parent
				.insert(edge.target.clone(), edge.source.clone());
			self.children
				.entry(edge.source.clone())
				.or_default()
				.push(edge.target.clone());
		}

		self.roots = graph
			.nodes()
			.filter(|n| !self.parent.contains_key(&n.id))
			.map(|n| n.id.clone())
			.collect();
		self.generation += 1;
	}

	/// Flip `id` between collapsed and expanded. Leaves and unknown ids are
	/// left alone; returns the new state when something changed.
	pub fn toggle(&mut self, id: &str) -> Option<Disclosure> {
		if !self.has_children(id) {
			return None;
		}
		self.generation += 1;
		if self.expanded.remove(id) {
			Some(Disclosure::Collapsed)
		} else {
			self.expanded.insert(id.to_owned());
			Some(Disclosure::Expanded)
		}
	}

	/// Current state of `id`.
	pub fn state(&self, id: &str) -> Disclosure {
		if self.expanded.contains(id) {
			Disclosure::Expanded
		} else {
			Disclosure::Collapsed
		}
	}

	/// `true` if `id` has at least one hierarchical child.
	pub fn has_children(&self, id: &str) -> bool {
		self.children.get(id).is_some_and(|c| !c.is_empty())
	}

	/// Hierarchical children of `id`, in edge order.
	pub fn children(&self, id: &str) -> &[NodeId] {
		self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Hierarchical parent of `id`.
	pub fn parent(&self, id: &str) -> Option<&NodeId> {
		self.parent.get(id)
	}

	/// Nodes without a hierarchical parent.
	pub fn roots(&self) -> &[NodeId] {
		&self.roots
	}

	/// Bumped on every reset and every effective toggle.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// `true` if every ancestor of `id` is expanded.
	pub fn is_visible(&self, id: &str) -> bool {
		let mut current = id;
		while let Some(parent) = self.parent.get(current) {
			if !self.expanded.contains(parent) {
				return false;
			}
			current = parent;
		}
		self.roots.iter().any(|r| r == current)
	}

	/// Visible nodes in pre-order: each root, then the children of expanded nodes.
	pub fn visible_nodes(&self) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<&NodeId> = self.roots.iter().rev().collect();
		while let Some(id) = stack.pop() {
			out.push(id.clone());
			if self.expanded.contains(id) {
				stack.extend(self.children(id).iter().rev());
			}
		}
		out
	}

	/// Snapshot of visible nodes and every edge between them.
	pub fn visible(&self, graph: &Graph) -> VisibleSubgraph {
		let nodes = self.visible_nodes();
		let set: HashSet<&str> = nodes.iter().map(String::as_str).collect();
		let parents = nodes
			.iter()
			.filter_map(|n| self.parent.get(n).map(|p| (n.clone(), p.clone())))
			.collect();
		let edges = graph
			.edges()
			.filter(|e| set.contains(e.source.as_str()) && set.contains(e.target.as_str()))
			.cloned()
			.collect();
		VisibleSubgraph {
			nodes,
			parents,
			edges,
			generation: self.generation,
		}
	}
}
