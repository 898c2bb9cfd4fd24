//! Boolean rule expressions for the automation hub
//!
//! Rule conditions are Jinja expressions (built on minijinja) evaluated
//! against an [`EvalSnapshot`]:
//!
//! - `devices` - map of device id (`"node.id"`) to that device's state
//! - `rules` - map of rule uuid to its current active flag
//! - `daily("HH:MM", "HH:MM")` - whether the local time is inside the window
//!
//! # Example
//!
//! ```ignore
//! use hub_expression::{EvalSnapshot, ExpressionEvaluator, JinjaEvaluator};
//!
//! let evaluator = JinjaEvaluator::new();
//! let on = evaluator.evaluate(
//!     r#"devices["node.lamp"].on and rules["night-mode"]"#,
//!     &snapshot,
//! )?;
//! ```

mod engine;
mod error;
mod functions;

pub use engine::{EvalSnapshot, ExpressionEvaluator, JinjaEvaluator};
pub use error::{ExpressionError, ExpressionResult};
pub use functions::in_time_span;
