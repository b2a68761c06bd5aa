//! Interaction engine for data-lineage graphs: normalization, layered layout,
//! viewport and minimap math, highlight state and a keyed query cache over the
//! lineage REST backend.

pub mod engine;
pub mod export;
pub mod graph;
pub mod query;
pub mod util;
pub mod view;

pub use engine::{LineageView, ViewOptions};
