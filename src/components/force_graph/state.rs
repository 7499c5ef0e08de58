use std::collections::HashSet;

use log::debug;

use super::layout::{LayoutConfig, LayoutEngine};
use super::types::{EdgeSprite, GraphCommand, NodeSprite, RenderSurface, Tooltip};
use super::viewport::ViewportController;
use crate::disclosure::{Disclosure, DisclosureController, VisibleSubgraph};
use crate::graph::{Graph, Node, NodeId, NodeKind};

/// Drawn node radius in graph units.
pub const NODE_RADIUS: f64 = 8.0;
/// Pick radius in graph units.
pub const HIT_RADIUS: f64 = 12.0;
/// Pointer travel in screen pixels under which a press and release is a click.
pub const CLICK_SLOP: f64 = 4.0;

pub(crate) fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Debug, Default)]
struct DragState {
	node: Option<NodeId>,
	start_x: f64,
	start_y: f64,
	node_start_x: f64,
	node_start_y: f64,
	moved: bool,
}

/// Hovered node, its visible neighbours and the fade animation.
#[derive(Clone, Debug, Default)]
pub struct HoverState {
	/// Node under the pointer.
	pub node: Option<NodeId>,
	/// Visible nodes sharing an edge with `node`.
	pub neighbors: HashSet<NodeId>,
	/// Fade progress in `[0, 1]`.
	pub highlight_t: f64,
	/// Node fading out after the pointer left it.
	pub prev_node: Option<NodeId>,
	/// Neighbours fading out with `prev_node`.
	pub prev_neighbors: HashSet<NodeId>,
	delay_t: f64,
}

/// Everything the canvas needs between frames: the graph, what is expanded,
/// where things are and how the view is panned.
pub struct ForceGraphState {
	graph: Graph,
	disclosure: DisclosureController,
	layout: LayoutEngine,
	viewport: ViewportController,
	visible: VisibleSubgraph,
	drag: DragState,
	/// Hover highlight.
	pub hover: HoverState,
	/// Layout steps run on [`tick`](Self::tick).
	pub animation_running: bool,
	/// Seconds of animation so far, drives the edge dash flow.
	pub flow_time: f64,
}

impl ForceGraphState {
	/// State for `graph` in a `width` × `height` viewport, roots only.
	pub fn new(graph: Graph, width: f64, height: f64, config: LayoutConfig) -> Self {
		let viewport = ViewportController::new(width, height);
		let disclosure = DisclosureController::new(&graph);
		let visible = disclosure.visible(&graph);
		let mut layout = LayoutEngine::new(config, viewport.center());
		layout.restart(&visible);
		Self {
			graph,
			disclosure,
			layout,
			viewport,
			visible,
			drag: DragState::default(),
			hover: HoverState::default(),
			animation_running: true,
			flow_time: 0.0,
		}
	}

	/// Swap in a freshly loaded graph: collapse everything and lay out anew.
	pub fn replace_graph(&mut self, graph: Graph) {
		self.graph = graph;
		self.disclosure.reset(&self.graph);
		self.visible = self.disclosure.visible(&self.graph);
		self.layout.restart(&self.visible);
		self.drag = DragState::default();
		self.hover = HoverState::default();
		debug!(
			"graph replaced: {} nodes, {} roots",
			self.graph.node_count(),
			self.disclosure.roots().len()
		);
	}

	/// Current graph.
	pub fn graph(&self) -> &Graph {
		&self.graph
	}

	/// Expand/collapse state.
	pub fn disclosure(&self) -> &DisclosureController {
		&self.disclosure
	}

	/// Node positions.
	pub fn layout(&self) -> &LayoutEngine {
		&self.layout
	}

	/// Pan and zoom.
	pub fn viewport(&self) -> &ViewportController {
		&self.viewport
	}

	/// Currently visible subgraph.
	pub fn visible(&self) -> &VisibleSubgraph {
		&self.visible
	}

	/// Apply one command. Returns `true` if anything changed.
	pub fn apply(&mut self, command: GraphCommand) -> bool {
		match command {
			GraphCommand::Toggle(id) => self.toggle(&id).is_some(),
			GraphCommand::Pin { id, x, y } => self.layout.pin(&id, x, y),
			GraphCommand::Release(id) => self.layout.release(&id),
			GraphCommand::Pan(transform) => self.viewport.set_transform(transform),
			GraphCommand::ZoomAt { x, y, factor } => self.viewport.zoom_at(x, y, factor),
		}
	}

	fn toggle(&mut self, id: &str) -> Option<Disclosure> {
		let state = self.disclosure.toggle(id)?;
		self.resync();
		debug!("{id} {state:?}");
		Some(state)
	}

	/// Bring the visible set and the layout up to date with the disclosure state.
	fn resync(&mut self) {
		if self.visible.generation == self.disclosure.generation() {
			return;
		}
		self.visible = self.disclosure.visible(&self.graph);
		self.layout.sync(&self.visible);

		let hidden = |id: &Option<NodeId>| id.as_ref().is_some_and(|n| !self.visible.contains(n));
		if hidden(&self.hover.node) || hidden(&self.hover.prev_node) {
			self.hover = HoverState::default();
		}
		if hidden(&self.drag.node) {
			self.drag = DragState::default();
		}
	}

	/// Pointer pressed at screen position `(sx, sy)`: grab a node or start a pan.
	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		match self.node_at_position(sx, sy) {
			Some(id) => {
				let (node_start_x, node_start_y) = self.layout.position(&id).unwrap_or_default();
				self.drag = DragState {
					node: Some(id),
					start_x: sx,
					start_y: sy,
					node_start_x,
					node_start_y,
					moved: false,
				};
			}
			None => self.viewport.begin_pan(sx, sy),
		}
	}

	/// Pointer moved: update hover, then drag the grabbed node or pan.
	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		if self.drag.node.is_none() {
			let hovered = self.node_at_position(sx, sy);
			self.set_hover(hovered);
		}

		if let Some(id) = self.drag.node.clone() {
			let (dx, dy) = (sx - self.drag.start_x, sy - self.drag.start_y);
			if !self.drag.moved && (dx * dx + dy * dy).sqrt() < CLICK_SLOP {
				return;
			}
			self.drag.moved = true;
			let k = self.viewport.transform().k;
			self.apply(GraphCommand::Pin {
				id,
				x: self.drag.node_start_x + dx / k,
				y: self.drag.node_start_y + dy / k,
			});
		} else if self.viewport.is_panning() {
			self.viewport.pan_to(sx, sy);
		}
	}

	/// Pointer released. A press and release on a node without travel
	/// toggles it; the new disclosure state is returned.
	pub fn pointer_up(&mut self) -> Option<Disclosure> {
		self.viewport.end_pan();
		let drag = std::mem::take(&mut self.drag);
		let id = drag.node?;
		if drag.moved {
			self.apply(GraphCommand::Release(id));
			None
		} else {
			self.toggle(&id)
		}
	}

	/// Pointer left the canvas: drop any gesture and the hover.
	pub fn pointer_leave(&mut self) {
		self.viewport.end_pan();
		let drag = std::mem::take(&mut self.drag);
		if let (Some(id), true) = (drag.node, drag.moved) {
			self.apply(GraphCommand::Release(id));
		}
		self.set_hover(None);
	}

	/// One wheel notch at screen position `(sx, sy)`.
	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		self.viewport.wheel(sx, sy, delta_y);
	}

	/// `true` while a node is being dragged.
	pub fn is_dragging(&self) -> bool {
		self.drag.moved
	}

	/// Visible node closest to screen position `(sx, sy)` within [`HIT_RADIUS`].
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<NodeId> {
		let (gx, gy) = self.viewport.screen_to_graph(sx, sy);
		// HIT_RADIUS is in world-space, scales with zoom like nodes
		self.layout
			.iter()
			.map(|(id, s)| (id, ((s.x - gx).powi(2) + (s.y - gy).powi(2)).sqrt()))
			.filter(|(_, d)| *d < HIT_RADIUS)
			.min_by(|a, b| a.1.total_cmp(&b.1))
			.map(|(id, _)| id.clone())
	}

	/// Highlight `node` and its visible neighbours.
	pub fn set_hover(&mut self, node: Option<NodeId>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// keep the old highlight around to fade it out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.neighbors.clear();
		if let Some(id) = &node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for edge in &self.visible.edges {
				if &edge.source == id {
					self.hover.neighbors.insert(edge.target.clone());
				} else if &edge.target == id {
					self.hover.neighbors.insert(edge.source.clone());
				}
			}
		}
		self.hover.node = node;
	}

	/// Part of the current or fading highlight.
	pub fn is_highlighted(&self, id: &str) -> bool {
		self.is_hovered(id)
			|| self.hover.neighbors.contains(id)
			|| self.hover.prev_neighbors.contains(id)
	}

	/// The hovered node, or the one fading out.
	pub fn is_hovered(&self, id: &str) -> bool {
		self.hover.node.as_deref() == Some(id) || self.hover.prev_node.as_deref() == Some(id)
	}

	/// A highlight is showing or fading.
	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	/// Advance layout and animations by `dt` seconds.
	pub fn tick(&mut self, dt: f64) {
		self.resync();
		if self.animation_running {
			self.layout.tick(dt);
		}
		self.flow_time += dt;

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	/// Resize the viewport.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.viewport.resize(width, height);
	}

	/// Tooltip text for a node: title, type, then the fields of its kind.
	pub fn tooltip_lines(&self, id: &str) -> Vec<String> {
		let Some(node) = self.graph.node(id) else {
			return Vec::new();
		};
		let kind = match (node.kind, node.text("event_type")) {
			(NodeKind::LogEvent, Some(event_type)) => event_type,
			(kind, _) => kind.label(),
		};
		let mut lines = vec![node.id.clone(), format!("Type: {kind}")];
		let field = |label: &str, key: &str| format!("{label}: {}", attr_or_na(node, key));

		match node.kind {
			NodeKind::LogEvent => {
				lines.push(field("Timestamp", "timestamp"));
				for (label, key) in [
					("Action", "action"),
					("State", "state"),
					("Decision", "decision"),
					("Context", "context"),
					("Command", "command"),
				] {
					if node.attr(key).is_some() {
						lines.push(field(label, key));
					}
				}
			}
			NodeKind::Package => {
				lines.extend(
					node.attributes
						.iter()
						.filter(|(key, _)| key.as_str() != "uri")
						.map(|(key, value)| format!("{}: {value}", key.replace('_', " "))),
				);
			}
			NodeKind::Cve => {
				lines.push(field("Description", "description"));
				lines.push(field("Base Score", "base_score"));
				lines.push(field("Base Severity", "base_severity"));
				lines.push(field("CVSS Version", "cvss_version"));
				lines.push(field("CVSS Code", "cvss_code"));
			}
			NodeKind::Product => {
				lines.push(field("Product", "name"));
				lines.push(field("Vendor", "vendor"));
			}
			NodeKind::Version => {
				lines.push(field("Min", "min"));
				lines.push(field("Max", "max"));
			}
			NodeKind::Vendor => lines.push(field("Vendor", "name")),
			NodeKind::Reference => lines.push(field("URL", "url")),
		}
		lines
	}

	/// Visible edges with their highlight styling.
	pub fn edge_sprites(&self) -> Vec<EdgeSprite> {
		let t = ease_out_cubic(self.hover.highlight_t);
		self.visible
			.edges
			.iter()
			.filter_map(|edge| {
				let from = self.layout.position(&edge.source)?;
				let to = self.layout.position(&edge.target)?;
				let hierarchical = match (self.graph.node(&edge.source), self.graph.node(&edge.target)) {
					(Some(s), Some(t)) => edge.relation.is_hierarchical(s.kind, t.kind),
					_ => false,
				};
				// t=0: all edges at base, t=1: highlighted brighten, others dim
				let (alpha, width_scale) =
					if self.is_highlighted(&edge.source) && self.is_highlighted(&edge.target) {
						(0.6 + 0.3 * t, 1.0 + 0.3 * t)
					} else {
						(0.6 - 0.45 * t, 1.0 - 0.3 * t)
					};
				Some(EdgeSprite {
					from,
					to,
					relation: edge.relation,
					hierarchical,
					alpha,
					width_scale,
				})
			})
			.collect()
	}

	/// Visible nodes, dimmed ones first and the hovered one last so the
	/// highlight draws on top.
	pub fn node_sprites(&self) -> Vec<NodeSprite> {
		let (has_highlight, t) = (
			self.has_active_highlight(),
			ease_out_cubic(self.hover.highlight_t),
		);
		let mut sprites: Vec<((bool, bool), NodeSprite)> = self
			.layout
			.iter()
			.filter_map(|(id, pos)| {
				let node = self.graph.node(id)?;
				let highlighted = has_highlight && self.is_highlighted(id);
				let hovered = highlighted && self.is_hovered(id);
				let (alpha, radius, glow) = if !has_highlight {
					(1.0, NODE_RADIUS, 0.0)
				} else if hovered {
					(1.0, NODE_RADIUS * (1.0 + 0.35 * t), NODE_RADIUS * (1.8 + 1.2 * t))
				} else if highlighted {
					(1.0, NODE_RADIUS * (1.0 + 0.2 * t), NODE_RADIUS * (1.4 + 0.6 * t))
				} else {
					(1.0 - 0.7 * t, NODE_RADIUS * (1.0 - 0.15 * t), 0.0)
				};
				Some((
					(highlighted, hovered),
					NodeSprite {
						id: id.clone(),
						kind: node.kind,
						label: display_label(node),
						x: pos.x,
						y: pos.y,
						radius,
						alpha,
						glow,
						hovered,
						expandable: self.disclosure.has_children(id),
						expanded: self.disclosure.state(id) == Disclosure::Expanded,
					},
				))
			})
			.collect();
		sprites.sort_by_key(|(order, _)| *order);
		sprites.into_iter().map(|(_, s)| s).collect()
	}

	/// Hover card for the node under the pointer.
	pub fn tooltip(&self) -> Option<Tooltip> {
		let id = self.hover.node.as_deref()?;
		let (gx, gy) = self.layout.position(id)?;
		let (sx, sy) = self.viewport.graph_to_screen(gx, gy);
		let offset = NODE_RADIUS * self.viewport.transform().k + 10.0;
		Some(Tooltip {
			x: sx + offset,
			y: sy + offset,
			lines: self.tooltip_lines(id),
		})
	}

	/// Draw one frame onto `surface`.
	pub fn render(&self, surface: &mut impl RenderSurface) {
		let (width, height) = self.viewport.size();
		surface.begin_frame(width, height, &self.viewport.transform());
		surface.draw_edges(&self.edge_sprites(), self.flow_time);
		surface.draw_nodes(&self.node_sprites());
		if let Some(tooltip) = self.tooltip() {
			surface.draw_tooltip(&tooltip);
		}
		surface.end_frame();
	}
}

fn attr_or_na(node: &Node, key: &str) -> String {
	node.attr(key)
		.map(ToString::to_string)
		.unwrap_or_else(|| "N/A".to_owned())
}

fn display_label(node: &Node) -> String {
	match node.kind {
		NodeKind::Product | NodeKind::Vendor => node.text("name").unwrap_or(&node.id).to_owned(),
		_ => node.id.clone(),
	}
}
