//! Data models

pub mod advice;
pub mod features;

pub use advice::*;
pub use features::*;
