//! Operation registry and parameter validation.
//!
//! Every operation the engine supports is declared here, together with its
//! parameter schema. Validation and coercion happen at this boundary; the
//! job core never inspects params.

use serde_json::{Map, Value};

use super::error::EngineError;
use super::types::{OperationSpec, ParamKind, ParamSpec};

/// Full registry of supported operations.
pub fn list_operations() -> Vec<OperationSpec> {
    vec![
        OperationSpec {
            id: "negative",
            label: "Negative",
            requires_reference: false,
            params: vec![],
        },
        OperationSpec {
            id: "log",
            label: "Log transform",
            requires_reference: false,
            params: vec![ParamSpec::float("gain", 1.0, 0.1, 10.0)],
        },
        OperationSpec {
            id: "gamma",
            label: "Gamma correction",
            requires_reference: false,
            params: vec![
                ParamSpec::float("gamma", 1.0, 0.01, 10.0),
                ParamSpec::float("gain", 1.0, 0.1, 10.0),
            ],
        },
        OperationSpec {
            id: "histogram",
            label: "Histogram equalization",
            requires_reference: false,
            params: vec![ParamSpec::choice("method", "global", &["global"])],
        },
        OperationSpec {
            id: "histogram_match",
            label: "Histogram matching",
            requires_reference: true,
            params: vec![ParamSpec::choice("mode", "rgb", &["rgb", "grayscale"])],
        },
        OperationSpec {
            id: "gaussian",
            label: "Gaussian blur",
            requires_reference: false,
            params: vec![ParamSpec::float("sigma", 1.0, 0.1, 25.0)],
        },
        OperationSpec {
            id: "median",
            label: "Median filter",
            requires_reference: false,
            params: vec![ParamSpec::int("kernel", 3, 1, 15)],
        },
        OperationSpec {
            id: "sharpen",
            label: "Unsharp mask",
            requires_reference: false,
            params: vec![
                ParamSpec::float("amount", 1.0, 0.0, 5.0),
                ParamSpec::float("radius", 1.0, 0.1, 10.0),
            ],
        },
        OperationSpec {
            id: "edge",
            label: "Edge detection",
            requires_reference: false,
            params: vec![ParamSpec::choice("method", "sobel", &["sobel", "prewitt"])],
        },
        OperationSpec {
            id: "threshold_global",
            label: "Global threshold",
            requires_reference: false,
            params: vec![
                ParamSpec::int("threshold", 128, 0, 255),
                ParamSpec::int("max_value", 255, 1, 255),
            ],
        },
        OperationSpec {
            id: "threshold_adaptive",
            label: "Adaptive threshold",
            requires_reference: false,
            params: vec![
                ParamSpec::choice("mode", "mean", &["mean", "otsu"]),
                ParamSpec::int("block_size", 11, 3, 51),
                ParamSpec::int("constant", 2, -50, 50),
            ],
        },
        OperationSpec {
            id: "brightness",
            label: "Brightness",
            requires_reference: false,
            params: vec![ParamSpec::int("value", 0, -255, 255)],
        },
        OperationSpec {
            id: "contrast",
            label: "Contrast",
            requires_reference: false,
            params: vec![ParamSpec::float("amount", 0.0, -100.0, 100.0)],
        },
        OperationSpec {
            id: "grayscale",
            label: "Grayscale",
            requires_reference: false,
            params: vec![],
        },
        OperationSpec {
            id: "rotate",
            label: "Rotate",
            requires_reference: false,
            params: vec![ParamSpec::choice("degrees", "90", &["90", "180", "270"])],
        },
    ]
}

/// Resolve an operation id, accepting a few legacy aliases.
pub fn canonical_operation_id(operation: &str) -> Result<&'static str, EngineError> {
    let canonical = match operation {
        "negative" => "negative",
        "log" => "log",
        "gamma" => "gamma",
        "histogram" | "hist_eq" => "histogram",
        "histogram_match" | "hist_match" => "histogram_match",
        "gaussian" => "gaussian",
        "median" => "median",
        "sharpen" => "sharpen",
        "edge" | "edges" => "edge",
        "threshold_global" | "threshold-global" => "threshold_global",
        "threshold_adaptive" | "threshold-adaptive" => "threshold_adaptive",
        "brightness" => "brightness",
        "contrast" => "contrast",
        "grayscale" => "grayscale",
        "rotate" => "rotate",
        other => return Err(EngineError::UnknownOperation(other.to_string())),
    };
    Ok(canonical)
}

/// Whether the operation needs a second artifact to work against.
pub fn requires_reference(operation: &str) -> bool {
    matches!(operation, "histogram_match")
}

/// Validate and coerce a raw params blob against the operation's schema.
///
/// Returns the canonical params object: every declared parameter present,
/// numeric values clamped into range, unknown keys dropped. Type mismatches
/// and unknown choice values are rejected.
pub fn prepare_params(operation: &str, params: &Value) -> Result<Value, EngineError> {
    let canonical = canonical_operation_id(operation)?;
    let spec = list_operations()
        .into_iter()
        .find(|op| op.id == canonical)
        .ok_or_else(|| EngineError::UnknownOperation(canonical.to_string()))?;

    let input = match params {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => {
            return Err(EngineError::InvalidParam {
                name: "params".to_string(),
                reason: "expected an object".to_string(),
            })
        }
    };

    let mut out = Map::new();
    for param in &spec.params {
        let value = coerce_param(param, input.get(param.name))?;
        out.insert(param.name.to_string(), value);
    }

    Ok(Value::Object(out))
}

fn coerce_param(spec: &ParamSpec, provided: Option<&Value>) -> Result<Value, EngineError> {
    match &spec.kind {
        ParamKind::Float { default, min, max } => {
            let value = match provided {
                None | Some(Value::Null) => *default,
                Some(v) => v.as_f64().ok_or_else(|| EngineError::InvalidParam {
                    name: spec.name.to_string(),
                    reason: "expected a number".to_string(),
                })?,
            };
            let clamped = value.clamp(*min, *max);
            Ok(Value::from(clamped))
        }
        ParamKind::Int { default, min, max } => {
            let value = match provided {
                None | Some(Value::Null) => *default,
                // Accept floats from JSON clients, truncating toward zero.
                Some(v) => v
                    .as_i64()
                    .or_else(|| v.as_f64().map(|f| f as i64))
                    .ok_or_else(|| EngineError::InvalidParam {
                        name: spec.name.to_string(),
                        reason: "expected an integer".to_string(),
                    })?,
            };
            let clamped = value.clamp(*min, *max);
            Ok(Value::from(clamped))
        }
        ParamKind::Choice { default, choices } => {
            let value = match provided {
                None | Some(Value::Null) => (*default).to_string(),
                Some(Value::String(s)) => s.clone(),
                Some(_) => {
                    return Err(EngineError::InvalidParam {
                        name: spec.name.to_string(),
                        reason: "expected a string".to_string(),
                    })
                }
            };
            if !choices.contains(&value.as_str()) {
                return Err(EngineError::InvalidParam {
                    name: spec.name.to_string(),
                    reason: format!("must be one of {:?}", choices),
                });
            }
            Ok(Value::from(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_contains_all_operations() {
        let ops = list_operations();
        assert_eq!(ops.len(), 15);
        assert!(ops.iter().any(|op| op.id == "negative"));
        assert!(ops.iter().any(|op| op.id == "histogram_match"));
    }

    #[test]
    fn test_histogram_match_requires_reference() {
        assert!(requires_reference("histogram_match"));
        assert!(!requires_reference("negative"));
        let spec = list_operations()
            .into_iter()
            .find(|op| op.id == "histogram_match")
            .unwrap();
        assert!(spec.requires_reference);
    }

    #[test]
    fn test_canonical_id_accepts_aliases() {
        assert_eq!(canonical_operation_id("edges").unwrap(), "edge");
        assert_eq!(
            canonical_operation_id("threshold-global").unwrap(),
            "threshold_global"
        );
        assert!(canonical_operation_id("emboss").is_err());
    }

    #[test]
    fn test_prepare_params_fills_defaults() {
        let params = prepare_params("gamma", &Value::Null).unwrap();
        assert_eq!(params["gamma"], json!(1.0));
        assert_eq!(params["gain"], json!(1.0));
    }

    #[test]
    fn test_prepare_params_clamps_out_of_range() {
        let params = prepare_params("gamma", &json!({"gamma": 0.0})).unwrap();
        assert_eq!(params["gamma"], json!(0.01));

        let params = prepare_params("threshold_global", &json!({"threshold": 999})).unwrap();
        assert_eq!(params["threshold"], json!(255));
    }

    #[test]
    fn test_prepare_params_drops_unknown_keys() {
        let params = prepare_params("negative", &json!({"bogus": true})).unwrap();
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_prepare_params_rejects_bad_types() {
        let result = prepare_params("gamma", &json!({"gamma": "high"}));
        assert!(matches!(result, Err(EngineError::InvalidParam { .. })));

        let result = prepare_params("edge", &json!({"method": "scharr"}));
        assert!(matches!(result, Err(EngineError::InvalidParam { .. })));
    }

    #[test]
    fn test_prepare_params_unknown_operation() {
        let result = prepare_params("emboss", &Value::Null);
        assert!(matches!(result, Err(EngineError::UnknownOperation(_))));
    }
}
