// storefront-core/src/flow/mod.rs

//! A small named-step pipeline engine.
//!
//! Checkout is a strictly ordered sequence of awaits where any failure must stop
//! everything after it. Each flow is declared once as a `Pipeline` of named
//! steps, and the HTTP layer runs it through a `FlowRegistry` keyed by the
//! context type.

pub mod context_data;
pub mod control;
pub mod execution;
pub mod handler;
pub mod pipeline;
pub mod registry;
pub mod step;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use handler::Handler;
pub use pipeline::Pipeline;
pub use registry::FlowRegistry;
pub use step::{skip_when, SkipCondition, StepDef};
