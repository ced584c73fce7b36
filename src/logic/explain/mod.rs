//! Explain Module - SHAP attribution for the positive class
//!
//! TreeSHAP over the loaded ensemble, a consistency check against the
//! predicted probability, and the SVG force plot.

pub mod engine;
pub mod render;
pub mod tree_shap;
pub mod types;

pub use engine::explain_checked;
pub use render::force_plot_svg;
pub use types::Explanation;
