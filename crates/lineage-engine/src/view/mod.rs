pub mod minimap;
pub mod viewport;

pub use minimap::{MinimapConfig, MinimapProjection};
pub use viewport::{ViewTransform, Viewport};
