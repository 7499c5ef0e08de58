use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::NODE_RADIUS;
use super::types::{EdgeSprite, NodeSprite, RenderSurface, Tooltip};
use super::viewport::ViewTransform;
use crate::graph::NodeKind;

fn kind_color(kind: NodeKind) -> &'static str {
	match kind {
		NodeKind::Package => "steelblue",
		NodeKind::LogEvent => "green",
		NodeKind::Cve => "crimson",
		NodeKind::Product => "darkcyan",
		NodeKind::Version => "goldenrod",
		NodeKind::Vendor => "slategray",
		NodeKind::Reference => "lightgray",
	}
}

/// [`RenderSurface`] over a 2D canvas context.
pub struct CanvasSurface<'a> {
	ctx: &'a CanvasRenderingContext2d,
	k: f64,
}

impl<'a> CanvasSurface<'a> {
	/// Surface drawing into `ctx`.
	pub fn new(ctx: &'a CanvasRenderingContext2d) -> Self {
		Self { ctx, k: 1.0 }
	}

	fn draw_glow(&self, node: &NodeSprite) {
		let ctx = self.ctx;
		let Ok(gradient) =
			ctx.create_radial_gradient(node.x, node.y, node.radius * 0.3, node.x, node.y, node.glow)
		else {
			return;
		};
		let alpha = if node.hovered { 0.35 } else { 0.2 };
		let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", alpha));
		let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
		let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
		ctx.begin_path();
		let _ = ctx.arc(node.x, node.y, node.glow, 0.0, 2.0 * PI);
		#[allow(deprecated)]
		ctx.set_fill_style(&gradient);
		ctx.fill();
	}
}

impl RenderSurface for CanvasSurface<'_> {
	fn begin_frame(&mut self, width: f64, height: f64, transform: &ViewTransform) {
		let ctx = self.ctx;
		ctx.set_fill_style_str("#1a1a2e");
		ctx.fill_rect(0.0, 0.0, width, height);
		ctx.save();
		let _ = ctx.translate(transform.x, transform.y);
		let _ = ctx.scale(transform.k, transform.k);
		self.k = transform.k;
	}

	fn draw_edges(&mut self, edges: &[EdgeSprite], flow_time: f64) {
		let (ctx, k) = (self.ctx, self.k);
		let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
		let dash_offset = -(flow_time * 30.0) % (dash + gap);

		for edge in edges {
			let ((x1, y1), (x2, y2)) = (edge.from, edge.to);
			let (dx, dy) = (x2 - x1, y2 - y1);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist < 0.001 {
				continue;
			}

			ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", edge.alpha));
			ctx.set_line_width(line_width * edge.width_scale);
			// tree edges solid, cross links flow
			if edge.hierarchical {
				let _ = ctx.set_line_dash(&js_sys::Array::new());
			} else {
				let _ = ctx.set_line_dash(&js_sys::Array::of2(
					&JsValue::from_f64(dash),
					&JsValue::from_f64(gap),
				));
				ctx.set_line_dash_offset(dash_offset);
			}

			let (ux, uy) = (dx / dist, dy / dist);
			ctx.begin_path();
			ctx.move_to(x1 + ux * NODE_RADIUS, y1 + uy * NODE_RADIUS);
			ctx.line_to(
				x2 - ux * (NODE_RADIUS + arrow_size),
				y2 - uy * (NODE_RADIUS + arrow_size),
			);
			ctx.stroke();

			let _ = ctx.set_line_dash(&js_sys::Array::new());
			ctx.set_fill_style_str(&format!(
				"rgba(100, 180, 255, {})",
				(edge.alpha + 0.2).min(1.0)
			));
			let (tip_x, tip_y) = (x2 - ux * NODE_RADIUS, y2 - uy * NODE_RADIUS);
			let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
			let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
			ctx.begin_path();
			ctx.move_to(tip_x, tip_y);
			ctx.line_to(back_x + px, back_y + py);
			ctx.line_to(back_x - px, back_y - py);
			ctx.close_path();
			ctx.fill();
		}
		let _ = ctx.set_line_dash(&js_sys::Array::new());
	}

	fn draw_nodes(&mut self, nodes: &[NodeSprite]) {
		let (ctx, k) = (self.ctx, self.k);
		for node in nodes {
			if node.glow > 0.0 {
				self.draw_glow(node);
			}

			ctx.set_global_alpha(node.alpha);
			ctx.begin_path();
			let _ = ctx.arc(node.x, node.y, node.radius, 0.0, 2.0 * PI);
			ctx.set_fill_style_str(kind_color(node.kind));
			ctx.fill();

			// collapsed nodes with children get a ring
			if node.expandable && !node.expanded {
				ctx.begin_path();
				let _ = ctx.arc(node.x, node.y, node.radius + 2.0 / k, 0.0, 2.0 * PI);
				ctx.set_stroke_style_str("rgba(255, 255, 255, 0.6)");
				ctx.set_line_width(1.0 / k);
				ctx.stroke();
			}

			if node.hovered {
				ctx.begin_path();
				let _ = ctx.arc(node.x, node.y, node.radius + 4.0 / k, 0.0, 2.0 * PI);
				ctx.set_stroke_style_str("rgba(255, 255, 255, 0.7)");
				ctx.set_line_width(1.5 / k);
				ctx.stroke();
			}

			ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", node.alpha * 0.8));
			ctx.set_font(&format!("{}px sans-serif", 10.0 / k.max(0.5)));
			let _ = ctx.fill_text(&node.label, node.x + node.radius + 3.0, node.y + 3.0);
			ctx.set_global_alpha(1.0);
		}
	}

	fn draw_tooltip(&mut self, tooltip: &Tooltip) {
		let ctx = self.ctx;
		ctx.save();
		let _ = ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
		ctx.set_font("12px sans-serif");

		let (line_height, padding) = (16.0, 6.0);
		let width = tooltip
			.lines
			.iter()
			.filter_map(|line| ctx.measure_text(line).ok())
			.map(|m| m.width())
			.fold(0.0, f64::max);
		let height = line_height * tooltip.lines.len() as f64;

		ctx.set_fill_style_str("rgba(20, 20, 35, 0.92)");
		ctx.fill_rect(tooltip.x, tooltip.y, width + 2.0 * padding, height + 2.0 * padding);
		for (i, line) in tooltip.lines.iter().enumerate() {
			ctx.set_fill_style_str(if i == 0 { "white" } else { "#c8d2e6" });
			let _ = ctx.fill_text(
				line,
				tooltip.x + padding,
				tooltip.y + padding + line_height * (i as f64 + 0.75),
			);
		}
		ctx.restore();
	}

	fn end_frame(&mut self) {
		self.ctx.restore();
	}
}
