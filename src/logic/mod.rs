//! Core logic: feature layout, model inference, SHAP explanation,
//! session state machine.

pub mod explain;
pub mod layout;
pub mod model;
pub mod reference;
pub mod session;
