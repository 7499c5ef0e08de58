use std::collections::{HashMap, HashSet};
use std::f64::consts::{PI, TAU};

use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::{debug, warn};
use serde::Deserialize;

use crate::disclosure::VisibleSubgraph;
use crate::graph::NodeId;

const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Tunables of the force simulation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Preferred length of a visible edge.
	pub rest_distance: f64,
	/// Strength of the rest-distance correction per step.
	pub link_strength: f64,
	/// Spring constant handed to the integrator.
	pub spring: f64,
	/// Pairwise repulsion handed to the integrator.
	pub charge: f64,
	/// Pull of the whole set toward the viewport center.
	pub center_strength: f64,
	/// Nodes closer than twice this are pushed apart.
	pub collision_radius: f64,
	/// Fraction of the remaining temperature shed per step.
	pub alpha_decay: f64,
	/// Temperature below which the layout is settled.
	pub alpha_min: f64,
	/// Temperature after a disclosure change.
	pub restart_alpha: f64,
	/// Temperature held while a node is dragged.
	pub drag_alpha_target: f64,
	/// Velocity retained between integrator steps.
	pub damping: f64,
	/// Largest force the integrator applies.
	pub max_force: f64,
	/// Largest distance per second a node may travel.
	pub max_speed: f64,
	/// Node mass.
	pub mass: f64,
	/// Radius of the first ring of revealed children.
	pub radial_base: f64,
	/// Extra ring radius per child.
	pub radial_step: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			rest_distance: 120.0,
			link_strength: 0.3,
			spring: 0.05,
			charge: 150.0,
			center_strength: 0.05,
			collision_radius: 18.0,
			alpha_decay: 0.05,
			alpha_min: 0.001,
			restart_alpha: 0.5,
			drag_alpha_target: 0.3,
			damping: 0.9,
			max_force: 100.0,
			max_speed: 3000.0,
			mass: 10.0,
			radial_base: 50.0,
			radial_step: 10.0,
		}
	}
}

impl LayoutConfig {
	/// Replace non-finite or negative values with defaults and clamp ratios to `[0, 1]`.
	pub fn validated(self) -> Self {
		let d = Self::default();
		let pos = |v: f64, default: f64| if v.is_finite() && v >= 0.0 { v } else { default };
		let unit = |v: f64, default: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { default };
		Self {
			rest_distance: pos(self.rest_distance, d.rest_distance),
			link_strength: unit(self.link_strength, d.link_strength),
			spring: pos(self.spring, d.spring),
			charge: pos(self.charge, d.charge),
			center_strength: unit(self.center_strength, d.center_strength),
			collision_radius: pos(self.collision_radius, d.collision_radius),
			alpha_decay: unit(self.alpha_decay, d.alpha_decay),
			alpha_min: unit(self.alpha_min, d.alpha_min),
			restart_alpha: unit(self.restart_alpha, d.restart_alpha),
			drag_alpha_target: unit(self.drag_alpha_target, d.drag_alpha_target),
			damping: unit(self.damping, d.damping),
			max_force: pos(self.max_force, d.max_force),
			max_speed: pos(self.max_speed, d.max_speed),
			mass: if self.mass.is_finite() && self.mass > 0.0 { self.mass } else { d.mass },
			radial_base: pos(self.radial_base, d.radial_base),
			radial_step: pos(self.radial_step, d.radial_step),
		}
	}

	fn parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: self.charge as f32,
			force_spring: self.spring as f32,
			force_max: self.max_force as f32,
			node_speed: self.max_speed as f32,
			damping_factor: self.damping as f32,
		}
	}
}

/// Position and motion of one visible node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutState {
	/// Graph-space x.
	pub x: f64,
	/// Graph-space y.
	pub y: f64,
	/// Last x velocity, per second.
	pub vx: f64,
	/// Last y velocity, per second.
	pub vy: f64,
	/// Held in place by a drag gesture.
	pub pinned: bool,
}

impl LayoutState {
	fn at(x: f64, y: f64) -> Self {
		Self {
			x,
			y,
			vx: 0.0,
			vy: 0.0,
			pinned: false,
		}
	}
}

#[derive(Clone, Debug, Default)]
struct LayoutSlot {
	id: NodeId,
}

/// Where a hidden node was, so it can come back to the same spot.
#[derive(Clone, Debug)]
enum Retained {
	Offset { parent: NodeId, dx: f64, dy: f64 },
	At { x: f64, y: f64 },
}

/// Positions the visible subgraph.
///
/// Charge and spring forces are integrated by [`ForceGraph`]; on top of that
/// each step applies rest-distance, centering and collision corrections
/// scaled by the current temperature, and clamps every displacement so
/// positions stay finite.
pub struct LayoutEngine {
	config: LayoutConfig,
	sim: ForceGraph<LayoutSlot, ()>,
	states: HashMap<NodeId, LayoutState>,
	order: Vec<NodeId>,
	parents: HashMap<NodeId, NodeId>,
	links: Vec<(NodeId, NodeId)>,
	retained: HashMap<NodeId, Retained>,
	alpha: f64,
	alpha_target: f64,
	center: (f64, f64),
	generation: Option<u64>,
}

impl LayoutEngine {
	/// Idle engine pulling toward `center`.
	pub fn new(config: LayoutConfig, center: (f64, f64)) -> Self {
		let config = config.validated();
		Self {
			sim: ForceGraph::new(config.parameters()),
			config,
			states: HashMap::new(),
			order: Vec::new(),
			parents: HashMap::new(),
			links: Vec::new(),
			retained: HashMap::new(),
			alpha: 0.0,
			alpha_target: 0.0,
			center,
			generation: None,
		}
	}

	/// Forget every position and lay out `visible` from scratch.
	pub fn restart(&mut self, visible: &VisibleSubgraph) {
		self.states.clear();
		self.parents.clear();
		self.retained.clear();
		self.generation = None;
		self.sync(visible);
		self.alpha = 1.0;
		self.alpha_target = 0.0;
	}

	/// Adopt the latest visible set. Hidden nodes lose their state, new ones
	/// are seeded next to their parent; untouched nodes keep their position.
	/// Returns `false` if `visible` was already adopted.
	pub fn sync(&mut self, visible: &VisibleSubgraph) -> bool {
		if self.generation == Some(visible.generation) {
			return false;
		}
		self.generation = Some(visible.generation);

		let keep: HashSet<&str> = visible.nodes.iter().map(String::as_str).collect();
		let hidden: Vec<NodeId> = self
			.states
			.keys()
			.filter(|id| !keep.contains(id.as_str()))
			.cloned()
			.collect();
		for id in &hidden {
			let retained = self.retain(id);
			self.retained.insert(id.clone(), retained);
		}
		for id in &hidden {
			self.states.remove(id);
		}
		// a hidden node cannot be released, so its drag target goes with it
		if !self.states.values().any(|s| s.pinned) {
			self.alpha_target = 0.0;
		}

		self.parents = visible.parents.clone();
		self.order = visible.nodes.clone();
		self.seed_new_nodes();

		let mut seen = HashSet::new();
		self.links = visible
			.edges
			.iter()
			.filter(|e| e.source != e.target)
			.filter_map(|e| {
				let key = if e.source < e.target {
					(e.source.clone(), e.target.clone())
				} else {
					(e.target.clone(), e.source.clone())
				};
				seen.insert(key.clone()).then_some(key)
			})
			.collect();

		self.rebuild_simulation();
		self.alpha = self.alpha.max(self.config.restart_alpha);
		debug!(
			"layout synced: {} nodes, {} links, {} hidden",
			self.order.len(),
			self.links.len(),
			hidden.len()
		);
		true
	}

	/// Advance one step of `dt` seconds. Returns `true` while still moving.
	pub fn tick(&mut self, dt: f64) -> bool {
		if self.order.is_empty() || self.is_settled() || !(dt.is_finite() && dt > 0.0) {
			return false;
		}

		let before: HashMap<NodeId, (f64, f64)> = self
			.states
			.iter()
			.map(|(id, s)| (id.clone(), (s.x, s.y)))
			.collect();

		self.sim.update((dt * self.alpha) as f32);
		let states = &mut self.states;
		let mut diverged = false;
		self.sim.visit_nodes(|node| {
			if let Some(s) = states.get_mut(&node.data.user_data.id)
				&& !s.pinned
			{
				let (x, y) = (node.x() as f64, node.y() as f64);
				if x.is_finite() && y.is_finite() {
					s.x = x;
					s.y = y;
				} else {
					diverged = true;
				}
			}
		});

		self.apply_links();
		self.apply_centering();
		self.apply_collisions();

		let max_step = self.config.max_speed * dt;
		for (id, s) in self.states.iter_mut() {
			let Some(&(x0, y0)) = before.get(id) else {
				continue;
			};
			if s.pinned {
				s.vx = 0.0;
				s.vy = 0.0;
				continue;
			}
			let (mut dx, mut dy) = (s.x - x0, s.y - y0);
			if !(dx.is_finite() && dy.is_finite()) {
				dx = 0.0;
				dy = 0.0;
			}
			let len = (dx * dx + dy * dy).sqrt();
			if len > max_step {
				dx *= max_step / len;
				dy *= max_step / len;
			}
			s.x = x0 + dx;
			s.y = y0 + dy;
			s.vx = dx / dt;
			s.vy = dy / dt;
		}

		if diverged {
			// integrator velocities are unrecoverable; start it over from the clamped positions
			warn!("layout integrator diverged, rebuilding");
			self.rebuild_simulation();
		} else {
			let states = &self.states;
			self.sim.visit_nodes_mut(|node| {
				if let Some(s) = states.get(&node.data.user_data.id) {
					node.data.x = s.x as f32;
					node.data.y = s.y as f32;
				}
			});
		}

		self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
		!self.is_settled()
	}

	/// Hold `id` at `(x, y)` until [`release`](Self::release).
	pub fn pin(&mut self, id: &str, x: f64, y: f64) -> bool {
		if !(x.is_finite() && y.is_finite()) {
			return false;
		}
		let Some(s) = self.states.get_mut(id) else {
			return false;
		};
		s.x = x;
		s.y = y;
		s.vx = 0.0;
		s.vy = 0.0;
		s.pinned = true;
		self.sim.visit_nodes_mut(|node| {
			if node.data.user_data.id == id {
				node.data.x = x as f32;
				node.data.y = y as f32;
				node.data.is_anchor = true;
			}
		});
		self.alpha_target = self.config.drag_alpha_target;
		self.alpha = self.alpha.max(self.alpha_target);
		true
	}

	/// Return `id` to free movement.
	pub fn release(&mut self, id: &str) -> bool {
		let Some(s) = self.states.get_mut(id) else {
			return false;
		};
		s.pinned = false;
		self.sim.visit_nodes_mut(|node| {
			if node.data.user_data.id == id {
				node.data.is_anchor = false;
			}
		});
		if !self.states.values().any(|s| s.pinned) {
			self.alpha_target = 0.0;
		}
		true
	}

	/// Move the centering target.
	pub fn set_center(&mut self, x: f64, y: f64) {
		if x.is_finite() && y.is_finite() {
			self.center = (x, y);
		}
	}

	/// Position of a visible node.
	pub fn position(&self, id: &str) -> Option<(f64, f64)> {
		self.states.get(id).map(|s| (s.x, s.y))
	}

	/// Layout state of a visible node.
	pub fn state(&self, id: &str) -> Option<&LayoutState> {
		self.states.get(id)
	}

	/// Visible nodes in disclosure order with their state.
	pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &LayoutState)> {
		self.order
			.iter()
			.filter_map(|id| self.states.get(id).map(|s| (id, s)))
	}

	/// Number of laid out nodes.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	/// `true` if nothing is laid out.
	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Current temperature.
	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	/// Cooled below the threshold with no drag in progress.
	pub fn is_settled(&self) -> bool {
		self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min
	}

	/// Active configuration.
	pub fn config(&self) -> &LayoutConfig {
		&self.config
	}

	fn retain(&self, id: &str) -> Retained {
		let s = &self.states[id];
		match self
			.parents
			.get(id)
			.and_then(|p| self.states.get(p).map(|ps| (p, ps)))
		{
			Some((parent, ps)) => Retained::Offset {
				parent: parent.clone(),
				dx: s.x - ps.x,
				dy: s.y - ps.y,
			},
			None => Retained::At { x: s.x, y: s.y },
		}
	}

	fn seed_new_nodes(&mut self) {
		let mut siblings: HashMap<&str, Vec<&str>> = HashMap::new();
		let mut roots = Vec::new();
		for id in &self.order {
			match self.parents.get(id) {
				Some(p) => siblings.entry(p.as_str()).or_default().push(id),
				None => roots.push(id.as_str()),
			}
		}

		let mut seeded = Vec::new();
		for id in &self.order {
			if self.states.contains_key(id) {
				continue;
			}
			let parent = self.parents.get(id);
			let parent_pos = parent.and_then(|p| {
				self.states
					.get(p)
					.map(|s| (s.x, s.y))
					.or_else(|| seeded.iter().find(|(sid, _)| sid == p).map(|(_, pos)| *pos))
			});

			let pos = match (self.retained.get(id), parent, parent_pos) {
				(Some(Retained::Offset { parent: was, dx, dy }), Some(p), Some((px, py)))
					if was == p =>
				{
					(px + dx, py + dy)
				}
				(Some(Retained::At { x, y }), None, _) => (*x, *y),
				(_, Some(p), Some((px, py))) => {
					let ring = siblings.get(p.as_str()).map(Vec::as_slice).unwrap_or(&[]);
					self.radial(ring, id, (px, py))
				}
				_ => self.ring(&roots, id),
			};
			seeded.push((id.clone(), pos));
		}

		for (id, (x, y)) in seeded {
			self.retained.remove(&id);
			self.states.insert(id, LayoutState::at(x, y));
		}
	}

	/// Children evenly spaced on a circle around the parent.
	fn radial(&self, ring: &[&str], id: &str, (px, py): (f64, f64)) -> (f64, f64) {
		let n = ring.len().max(1);
		let i = ring.iter().position(|c| *c == id).unwrap_or(0);
		let r = self.config.radial_base + self.config.radial_step * n as f64;
		let angle = i as f64 * TAU / n as f64;
		(px + r * angle.cos(), py + r * angle.sin())
	}

	/// Roots evenly spaced on a circle around the center.
	fn ring(&self, roots: &[&str], id: &str) -> (f64, f64) {
		let n = roots.len().max(1);
		let i = roots.iter().position(|r| *r == id).unwrap_or(0);
		let r = (n as f64 * self.config.collision_radius / PI).max(100.0);
		let angle = i as f64 * TAU / n as f64;
		(self.center.0 + r * angle.cos(), self.center.1 + r * angle.sin())
	}

	fn rebuild_simulation(&mut self) {
		let mut sim = ForceGraph::new(self.config.parameters());
		let mut index = HashMap::new();
		for id in &self.order {
			let Some(s) = self.states.get(id) else {
				continue;
			};
			let idx = sim.add_node(NodeData {
				x: s.x as f32,
				y: s.y as f32,
				mass: self.config.mass as f32,
				is_anchor: s.pinned,
				user_data: LayoutSlot { id: id.clone() },
			});
			index.insert(id.as_str(), idx);
		}
		for (a, b) in &self.links {
			if let (Some(&ia), Some(&ib)) = (index.get(a.as_str()), index.get(b.as_str())) {
				sim.add_edge(ia, ib, EdgeData::default());
			}
		}
		self.sim = sim;
	}

	fn apply_links(&mut self) {
		let strength = self.config.link_strength * self.alpha;
		for (a, b) in &self.links {
			let (Some(sa), Some(sb)) = (self.states.get(a), self.states.get(b)) else {
				continue;
			};
			let (dx, dy) = (sb.x - sa.x, sb.y - sa.y);
			let len = (dx * dx + dy * dy).sqrt();
			if len < 1e-6 {
				continue;
			}
			let k = (len - self.config.rest_distance) / len * strength;
			let (wa, wb) = split(sa.pinned, sb.pinned);
			let (sx, sy) = (dx * k, dy * k);
			if let Some(s) = self.states.get_mut(a) {
				s.x += sx * wa;
				s.y += sy * wa;
			}
			if let Some(s) = self.states.get_mut(b) {
				s.x -= sx * wb;
				s.y -= sy * wb;
			}
		}
	}

	fn apply_centering(&mut self) {
		let n = self.states.len() as f64;
		if n == 0.0 {
			return;
		}
		let (sum_x, sum_y) = self
			.states
			.values()
			.fold((0.0, 0.0), |(x, y), s| (x + s.x, y + s.y));
		let k = self.config.center_strength * self.alpha;
		let (shift_x, shift_y) = ((self.center.0 - sum_x / n) * k, (self.center.1 - sum_y / n) * k);
		for s in self.states.values_mut().filter(|s| !s.pinned) {
			s.x += shift_x;
			s.y += shift_y;
		}
	}

	fn apply_collisions(&mut self) {
		let min = 2.0 * self.config.collision_radius;
		if min <= 0.0 {
			return;
		}
		for i in 0..self.order.len() {
			for j in (i + 1)..self.order.len() {
				let (a, b) = (&self.order[i], &self.order[j]);
				let (Some(sa), Some(sb)) = (self.states.get(a), self.states.get(b)) else {
					continue;
				};
				let (mut dx, mut dy) = (sb.x - sa.x, sb.y - sa.y);
				let mut len = (dx * dx + dy * dy).sqrt();
				if len >= min {
					continue;
				}
				if len < 1e-6 {
					let angle = (i * 31 + j) as f64 * GOLDEN_ANGLE;
					(dx, dy, len) = (angle.cos(), angle.sin(), 1.0);
				}
				let push = (min - len) / len * 0.5;
				let (wa, wb) = split(sa.pinned, sb.pinned);
				let (px, py) = (dx * push, dy * push);
				if let Some(s) = self.states.get_mut(a) {
					s.x -= px * wa;
					s.y -= py * wa;
				}
				if let Some(s) = self.states.get_mut(b) {
					s.x += px * wb;
					s.y += py * wb;
				}
			}
		}
	}
}

/// Share of a correction each endpoint takes; a pinned end takes none.
fn split(a_pinned: bool, b_pinned: bool) -> (f64, f64) {
	match (a_pinned, b_pinned) {
		(false, false) => (1.0, 1.0),
		(true, false) => (0.0, 2.0),
		(false, true) => (2.0, 0.0),
		(true, true) => (0.0, 0.0),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::disclosure::DisclosureController;
	use crate::graph::{Graph, Node, NodeKind, Relation};

	fn product_graph(versions: usize) -> Graph {
		let mut g = Graph::new();
		g.upsert_node(Node::new("prod_openssl", NodeKind::Product));
		g.upsert_node(Node::new("e1", NodeKind::LogEvent));
		g.upsert_node(Node::new("pkg", NodeKind::Package));
		g.add_edge("e1", "pkg", Relation::HasPackage);
		for i in 0..versions {
			let v = format!("v{i}");
			let c = format!("CVE-{i}");
			g.upsert_node(Node::new(v.clone(), NodeKind::Version));
			g.upsert_node(Node::new(c.clone(), NodeKind::Cve));
			g.add_edge("prod_openssl", &v, Relation::HasVersion);
			g.add_edge(&v, &c, Relation::Affects);
			g.add_edge(&c, "prod_openssl", Relation::HasAffectedProduct);
		}
		g
	}

	fn all_finite(engine: &LayoutEngine) -> bool {
		engine
			.iter()
			.all(|(_, s)| s.x.is_finite() && s.y.is_finite() && s.vx.is_finite() && s.vy.is_finite())
	}

	#[test]
	fn restart_seeds_every_visible_node() {
		let g = product_graph(3);
		let d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		assert_eq!(engine.len(), 2);
		assert_eq!(engine.alpha(), 1.0);
		assert_ne!(engine.position("e1"), engine.position("prod_openssl"));
	}

	#[test]
	fn expanded_children_start_on_a_circle_around_parent() {
		let g = product_graph(4);
		let mut d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		let (px, py) = engine.position("prod_openssl").unwrap();

		d.toggle("prod_openssl");
		assert!(engine.sync(&d.visible(&g)));

		let expected_r = 50.0 + 10.0 * 4.0;
		for i in 0..4 {
			let (x, y) = engine.position(&format!("v{i}")).unwrap();
			let r = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
			assert!((r - expected_r).abs() < 1e-9, "v{i} at radius {r}");
		}
		assert_eq!(engine.position("prod_openssl"), Some((px, py)));
	}

	#[test]
	fn sync_is_idempotent_per_generation() {
		let g = product_graph(1);
		let d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		let vis = d.visible(&g);
		assert!(engine.sync(&vis));
		assert!(!engine.sync(&vis));
	}

	#[test]
	fn collapse_discards_state_and_keeps_others() {
		let g = product_graph(2);
		let mut d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		d.toggle("prod_openssl");
		engine.restart(&d.visible(&g));
		for _ in 0..10 {
			engine.tick(0.016);
		}
		let e1 = engine.position("e1");

		d.toggle("prod_openssl");
		engine.sync(&d.visible(&g));
		assert!(engine.state("v0").is_none());
		assert_eq!(engine.position("e1"), e1);
		assert!(engine.tick(0.016) || engine.is_settled());
		assert!(all_finite(&engine));
	}

	#[test]
	fn re_expanding_restores_relative_positions() {
		let g = product_graph(2);
		let mut d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		d.toggle("prod_openssl");
		engine.restart(&d.visible(&g));
		for _ in 0..20 {
			engine.tick(0.016);
		}
		let (px, py) = engine.position("prod_openssl").unwrap();
		let (vx, vy) = engine.position("v1").unwrap();

		d.toggle("prod_openssl");
		engine.sync(&d.visible(&g));
		d.toggle("prod_openssl");
		engine.sync(&d.visible(&g));

		let (px2, py2) = engine.position("prod_openssl").unwrap();
		let (vx2, vy2) = engine.position("v1").unwrap();
		assert!(((vx2 - px2) - (vx - px)).abs() < 1e-9);
		assert!(((vy2 - py2) - (vy - py)).abs() < 1e-9);
	}

	#[test]
	fn pinned_node_does_not_move() {
		let g = product_graph(3);
		let mut d = DisclosureController::new(&g);
		d.toggle("prod_openssl");
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		assert!(engine.pin("v1", 250.0, -40.0));
		for _ in 0..30 {
			engine.tick(0.016);
		}
		assert_eq!(engine.position("v1"), Some((250.0, -40.0)));
		assert!(!engine.is_settled());

		assert!(engine.release("v1"));
		assert!(!engine.state("v1").unwrap().pinned);
	}

	#[test]
	fn settles_after_pinned_node_is_hidden() {
		let g = product_graph(2);
		let mut d = DisclosureController::new(&g);
		d.toggle("prod_openssl");
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		assert!(engine.pin("v0", 40.0, 40.0));

		d.toggle("prod_openssl");
		assert!(engine.sync(&d.visible(&g)));
		assert!(engine.state("v0").is_none());
		assert!(!engine.release("v0"));

		let mut steps = 0;
		while engine.tick(0.016) {
			steps += 1;
			assert!(steps < 10_000, "layout never settled");
		}
		assert!(engine.is_settled());
	}

	#[test]
	fn hiding_one_pin_keeps_the_other_dragging() {
		let g = product_graph(2);
		let mut d = DisclosureController::new(&g);
		d.toggle("prod_openssl");
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		assert!(engine.pin("v0", 40.0, 40.0));
		assert!(engine.pin("e1", -40.0, 0.0));

		d.toggle("prod_openssl");
		engine.sync(&d.visible(&g));
		for _ in 0..500 {
			engine.tick(0.016);
		}
		assert!(!engine.is_settled());
		assert_eq!(engine.position("e1"), Some((-40.0, 0.0)));
	}

	#[test]
	fn pin_rejects_non_finite_and_unknown() {
		let g = product_graph(1);
		let d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		assert!(!engine.pin("e1", f64::NAN, 0.0));
		assert!(!engine.pin("e1", 0.0, f64::INFINITY));
		assert!(!engine.pin("v0", 0.0, 0.0));
		assert!(!engine.release("v0"));
	}

	#[test]
	fn cools_down_and_settles() {
		let g = product_graph(2);
		let d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		let mut steps = 0;
		while engine.tick(0.016) {
			steps += 1;
			assert!(steps < 10_000, "layout never settled");
		}
		assert!(engine.is_settled());
		assert!(all_finite(&engine));
	}

	#[test]
	fn coincident_nodes_are_separated() {
		let g = product_graph(2);
		let mut d = DisclosureController::new(&g);
		d.toggle("prod_openssl");
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));
		engine.pin("v0", 10.0, 10.0);
		engine.pin("v1", 10.0, 10.0);
		engine.release("v1");
		for _ in 0..5 {
			engine.tick(0.016);
		}
		assert_ne!(engine.position("v0"), engine.position("v1"));
		assert!(all_finite(&engine));
	}

	#[test]
	fn stays_finite_under_random_gestures() {
		let g = product_graph(6);
		let mut d = DisclosureController::new(&g);
		let mut engine = LayoutEngine::new(LayoutConfig::default(), (0.0, 0.0));
		engine.restart(&d.visible(&g));

		let ids = ["prod_openssl", "v0", "v3", "e1", "v5"];
		let mut seed: u64 = 0x2545_f491;
		for step in 0..400 {
			seed ^= seed << 13;
			seed ^= seed >> 7;
			seed ^= seed << 17;
			let id = ids[(seed % ids.len() as u64) as usize];
			match seed % 4 {
				0 => {
					d.toggle(id);
				}
				1 => {
					let x = ((seed >> 8) % 2000) as f64 - 1000.0;
					let y = ((seed >> 20) % 2000) as f64 - 1000.0;
					engine.pin(id, x, y);
				}
				2 => {
					engine.release(id);
				}
				_ => {}
			}
			engine.sync(&d.visible(&g));
			engine.tick(0.016);
			assert!(all_finite(&engine), "non-finite position after step {step}");
		}
	}

	#[test]
	fn config_validation_replaces_garbage() {
		let cfg = LayoutConfig {
			rest_distance: f64::NAN,
			alpha_decay: 7.0,
			mass: 0.0,
			charge: -3.0,
			..LayoutConfig::default()
		}
		.validated();
		assert_eq!(cfg.rest_distance, 120.0);
		assert_eq!(cfg.alpha_decay, 1.0);
		assert_eq!(cfg.mass, 10.0);
		assert_eq!(cfg.charge, 150.0);
	}
}
