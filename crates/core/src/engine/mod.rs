//! Image operation engine.
//!
//! The engine owns everything about image transformations: the operation
//! registry, parameter validation and coercion, the pixel work itself, and
//! the comparison metrics computed between an original and a processed
//! image. The job orchestrator treats all of this as an opaque collaborator
//! behind the [`ImageEngine`] trait.

mod error;
mod ops;
mod registry;
mod traits;
mod types;

pub use error::EngineError;
pub use ops::OpsEngine;
pub use registry::{canonical_operation_id, list_operations, prepare_params, requires_reference};
pub use traits::ImageEngine;
pub use types::{MetricMap, OperationSpec, ParamKind, ParamSpec};
