//! Types for the engine module.

use serde::Serialize;

/// Numeric metrics reported by operations and comparisons.
pub type MetricMap = std::collections::HashMap<String, f64>;

/// Describes one operation for the frontend registry.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSpec {
    /// Wire-stable operation id.
    pub id: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Whether a second (reference) artifact is mandatory.
    pub requires_reference: bool,
    /// Accepted parameters.
    pub params: Vec<ParamSpec>,
}

/// Describes one accepted parameter of an operation.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
}

/// Parameter kind with default and bounds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    Float {
        default: f64,
        min: f64,
        max: f64,
    },
    Int {
        default: i64,
        min: i64,
        max: i64,
    },
    Choice {
        default: &'static str,
        choices: &'static [&'static str],
    },
}

impl ParamSpec {
    pub fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float { default, min, max },
        }
    }

    pub fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int { default, min, max },
        }
    }

    pub fn choice(
        name: &'static str,
        default: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Choice { default, choices },
        }
    }
}
