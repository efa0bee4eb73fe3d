//! Acceptance policies and the Evaluator that feeds them, per spec.md §4.5/§4.6.

pub mod acceptance;
pub mod evaluator;

pub use acceptance::{AcceptancePolicy, Dlas, Lahc};
pub use evaluator::{evaluate_dual, evaluate_single, DualEvaluation, RenderCaches};
