//! Pan and zoom of the whole scene.

/// Smallest allowed zoom factor.
pub const MIN_SCALE: f64 = 0.1;
/// Largest allowed zoom factor.
pub const MAX_SCALE: f64 = 4.0;

/// Uniform affine transform: `screen = graph * k + (x, y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	/// Horizontal offset in screen pixels.
	pub x: f64,
	/// Vertical offset in screen pixels.
	pub y: f64,
	/// Scale factor.
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	/// Graph-space point under screen position `(sx, sy)`.
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	/// Screen position of graph-space point `(gx, gy)`.
	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		(gx * self.k + self.x, gy * self.k + self.y)
	}

	fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite() && self.k.is_finite()
	}
}

#[derive(Clone, Debug, Default)]
struct PanState {
	active: bool,
	start_x: f64,
	start_y: f64,
	transform_start_x: f64,
	transform_start_y: f64,
}

/// Owns the view transform and the background pan gesture.
#[derive(Clone, Debug)]
pub struct ViewportController {
	transform: ViewTransform,
	pan: PanState,
	width: f64,
	height: f64,
}

impl ViewportController {
	/// Viewport of the given size with graph origin at its center.
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			pan: PanState::default(),
			width,
			height,
		}
	}

	/// Current transform.
	pub fn transform(&self) -> ViewTransform {
		self.transform
	}

	/// Replace the transform, clamping scale. Non-finite transforms are ignored.
	pub fn set_transform(&mut self, transform: ViewTransform) -> bool {
		if !transform.is_finite() || transform.k <= 0.0 {
			return false;
		}
		self.transform = ViewTransform {
			k: transform.k.clamp(MIN_SCALE, MAX_SCALE),
			..transform
		};
		true
	}

	/// Start dragging the background at screen position `(sx, sy)`.
	pub fn begin_pan(&mut self, sx: f64, sy: f64) {
		self.pan = PanState {
			active: true,
			start_x: sx,
			start_y: sy,
			transform_start_x: self.transform.x,
			transform_start_y: self.transform.y,
		};
	}

	/// Follow the pointer while panning. Returns `false` when no pan is active.
	pub fn pan_to(&mut self, sx: f64, sy: f64) -> bool {
		if !self.pan.active || !(sx.is_finite() && sy.is_finite()) {
			return false;
		}
		self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
		self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
		true
	}

	/// Finish the pan gesture.
	pub fn end_pan(&mut self) {
		self.pan.active = false;
	}

	/// `true` while the background is being dragged.
	pub fn is_panning(&self) -> bool {
		self.pan.active
	}

	/// Multiply the scale by `factor`, keeping the graph point under
	/// `(sx, sy)` fixed on screen.
	pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) -> bool {
		if !(factor.is_finite() && factor > 0.0 && sx.is_finite() && sy.is_finite()) {
			return false;
		}
		let new_k = (self.transform.k * factor).clamp(MIN_SCALE, MAX_SCALE);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
		true
	}

	/// Zoom one wheel notch; positive `delta_y` zooms out.
	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) -> bool {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		self.zoom_at(sx, sy, factor)
	}

	/// Resize the viewport, keeping the same graph point at its center.
	pub fn resize(&mut self, width: f64, height: f64) {
		if !(width.is_finite() && height.is_finite()) {
			return;
		}
		self.transform.x += (width - self.width) / 2.0;
		self.transform.y += (height - self.height) / 2.0;
		self.width = width;
		self.height = height;
	}

	/// Viewport size in screen pixels.
	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Graph-space point at the middle of the screen.
	pub fn center(&self) -> (f64, f64) {
		self.transform
			.screen_to_graph(self.width / 2.0, self.height / 2.0)
	}

	/// See [`ViewTransform::screen_to_graph`].
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		self.transform.screen_to_graph(sx, sy)
	}

	/// See [`ViewTransform::graph_to_screen`].
	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		self.transform.graph_to_screen(gx, gy)
	}
}
