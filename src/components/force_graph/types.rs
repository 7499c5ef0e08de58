use crate::graph::{NodeId, NodeKind, Relation};

use super::viewport::ViewTransform;

/// User intent, decoupled from the input device that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphCommand {
	/// Expand or collapse a node.
	Toggle(NodeId),
	/// Hold a node at a graph-space position.
	Pin {
		/// Node to hold.
		id: NodeId,
		/// Graph-space x.
		x: f64,
		/// Graph-space y.
		y: f64,
	},
	/// Let a pinned node move again.
	Release(NodeId),
	/// Replace the view transform.
	Pan(ViewTransform),
	/// Zoom around a screen position.
	ZoomAt {
		/// Screen x.
		x: f64,
		/// Screen y.
		y: f64,
		/// Scale multiplier.
		factor: f64,
	},
}

/// One edge ready to be drawn, in graph space.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeSprite {
	/// Start point.
	pub from: (f64, f64),
	/// End point.
	pub to: (f64, f64),
	/// Relation the edge stands for.
	pub relation: Relation,
	/// Part of the expand/collapse tree.
	pub hierarchical: bool,
	/// Opacity in `[0, 1]`.
	pub alpha: f64,
	/// Multiplier on the base stroke width.
	pub width_scale: f64,
}

/// One node ready to be drawn, in graph space.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSprite {
	/// Node id.
	pub id: NodeId,
	/// Node kind, decides the fill.
	pub kind: NodeKind,
	/// Text drawn next to the node.
	pub label: String,
	/// Center x.
	pub x: f64,
	/// Center y.
	pub y: f64,
	/// Radius.
	pub radius: f64,
	/// Opacity in `[0, 1]`.
	pub alpha: f64,
	/// Radius of the hover glow, `0.0` for none.
	pub glow: f64,
	/// Under the pointer.
	pub hovered: bool,
	/// Has hidden or shown children.
	pub expandable: bool,
	/// Children are shown.
	pub expanded: bool,
}

/// Hover card anchored at a screen position.
#[derive(Clone, Debug, PartialEq)]
pub struct Tooltip {
	/// Screen x.
	pub x: f64,
	/// Screen y.
	pub y: f64,
	/// Lines of text, first one is the title.
	pub lines: Vec<String>,
}

/// Rendering port: the state hands finished sprites over, the surface owns
/// the pixels.
pub trait RenderSurface {
	/// Clear and set up a frame.
	fn begin_frame(&mut self, width: f64, height: f64, transform: &ViewTransform);
	/// Draw visible edges under the nodes.
	fn draw_edges(&mut self, edges: &[EdgeSprite], flow_time: f64);
	/// Draw visible nodes, back to front.
	fn draw_nodes(&mut self, nodes: &[NodeSprite]);
	/// Draw a hover card in screen space.
	fn draw_tooltip(&mut self, _tooltip: &Tooltip) {}
	/// Finish the frame.
	fn end_frame(&mut self) {}
}
