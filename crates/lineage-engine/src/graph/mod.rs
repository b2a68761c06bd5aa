pub mod explain;
pub mod layout;
pub mod model;
pub mod state;

pub use layout::{layout, Layout, LayoutConfig, LayoutDirection};
pub use model::{normalize, GraphModel, LineageEdge, LineageNode, NodeKind};
pub use state::{InteractionState, NodeVisual};
