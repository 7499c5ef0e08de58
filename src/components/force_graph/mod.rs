mod component;
mod layout;
mod render;
mod state;
mod types;
mod viewport;

pub use component::ForceGraphCanvas;
pub use layout::{LayoutConfig, LayoutEngine, LayoutState};
pub use state::{CLICK_SLOP, ForceGraphState, HIT_RADIUS, HoverState, NODE_RADIUS};
pub use types::{EdgeSprite, GraphCommand, NodeSprite, RenderSurface, Tooltip};
pub use viewport::{MAX_SCALE, MIN_SCALE, ViewTransform, ViewportController};
