//! Raw artifact normalization.
//!
//! Two raw shapes are accepted:
//!
//! ```text
//! [ { "name": "suite", "tests": [ { "name": "t", "count": 1.0 }, ... ] }, ... ]
//! { "suite": [ { "name": "t", "count": 1.0 }, ... ], ... }
//! ```
//!
//! Both produce the same [`BenchmarkResult`]. Object keys keep their document
//! order (serde_json is built with `preserve_order`).

use crate::result::{BenchmarkResult, Suite, TestMeasurement};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Schema violations in a raw result artifact.
#[derive(Debug, Error)]
pub enum MalformedResultError {
    /// The artifact is not JSON at all.
    #[error("Result artifact is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The top-level value is neither an array nor an object.
    #[error("Unsupported result shape: expected an array of suites or an object keyed by suite name, found {found}")]
    UnsupportedShape {
        /// JSON type that was found.
        found: &'static str,
    },

    /// A required field is absent.
    #[error("Missing field '{field}' at {location}")]
    MissingField {
        /// JSON path of the enclosing object.
        location: String,
        /// Field name.
        field: &'static str,
    },

    /// A field has the wrong JSON type.
    #[error("Field '{field}' at {location} must be {expected}")]
    InvalidField {
        /// JSON path of the enclosing value.
        location: String,
        /// Field name.
        field: &'static str,
        /// Human-readable expected type.
        expected: &'static str,
    },

    /// A count is negative or not finite.
    #[error("Invalid count {value} at {location}: must be a finite non-negative number")]
    InvalidCount {
        /// JSON path of the test object.
        location: String,
        /// Offending value.
        value: f64,
    },

    /// Two suites, or two tests in one suite, share a name.
    #[error("Duplicate {kind} name '{name}' at {location}")]
    Duplicate {
        /// `suite` or `test`.
        kind: &'static str,
        /// The repeated name.
        name: String,
        /// JSON path of the second occurrence.
        location: String,
    },
}

/// Result type for normalization.
pub type Result<T> = std::result::Result<T, MalformedResultError>;

/// Parse and normalize a raw artifact from text.
pub fn normalize_str(raw: &str) -> Result<BenchmarkResult> {
    let value: Value = serde_json::from_str(raw)?;
    normalize(&value)
}

/// Parse and normalize a raw artifact from bytes.
pub fn normalize_slice(raw: &[u8]) -> Result<BenchmarkResult> {
    let value: Value = serde_json::from_slice(raw)?;
    normalize(&value)
}

/// Normalize an already parsed raw artifact.
pub fn normalize(raw: &Value) -> Result<BenchmarkResult> {
    let suites = match raw {
        Value::Array(items) => normalize_suite_list(items)?,
        Value::Object(map) => normalize_suite_map(map)?,
        other => {
            return Err(MalformedResultError::UnsupportedShape {
                found: json_type(other),
            })
        }
    };
    Ok(BenchmarkResult::new(suites))
}

fn normalize_suite_list(items: &[Value]) -> Result<Vec<Suite>> {
    let mut seen = HashSet::new();
    let mut suites = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let location = format!("$[{}]", i);
        let obj = item
            .as_object()
            .ok_or_else(|| MalformedResultError::InvalidField {
                location: "$".to_string(),
                field: "suite",
                expected: "an object",
            })?;
        let name = required_str(obj, "name", &location)?;
        let tests = obj
            .get("tests")
            .ok_or_else(|| MalformedResultError::MissingField {
                location: location.clone(),
                field: "tests",
            })?
            .as_array()
            .ok_or_else(|| MalformedResultError::InvalidField {
                location: location.clone(),
                field: "tests",
                expected: "an array",
            })?;
        if !seen.insert(name.to_string()) {
            return Err(MalformedResultError::Duplicate {
                kind: "suite",
                name: name.to_string(),
                location,
            });
        }
        let tests = normalize_tests(tests, &format!("{}.tests", location))?;
        suites.push(Suite::new(name, tests));
    }
    Ok(suites)
}

fn normalize_suite_map(map: &Map<String, Value>) -> Result<Vec<Suite>> {
    let mut suites = Vec::with_capacity(map.len());
    for (name, tests) in map {
        let location = format!("$[{:?}]", name);
        let tests = tests
            .as_array()
            .ok_or_else(|| MalformedResultError::InvalidField {
                location: "$".to_string(),
                field: "suite",
                expected: "an array of tests",
            })?;
        let tests = normalize_tests(tests, &location)?;
        suites.push(Suite::new(name.clone(), tests));
    }
    Ok(suites)
}

fn normalize_tests(items: &[Value], parent: &str) -> Result<Vec<TestMeasurement>> {
    let mut seen = HashSet::new();
    let mut tests = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let location = format!("{}[{}]", parent, i);
        let obj = item
            .as_object()
            .ok_or_else(|| MalformedResultError::InvalidField {
                location: parent.to_string(),
                field: "test",
                expected: "an object",
            })?;
        let name = required_str(obj, "name", &location)?;
        let count = obj
            .get("count")
            .ok_or_else(|| MalformedResultError::MissingField {
                location: location.clone(),
                field: "count",
            })?
            .as_f64()
            .ok_or_else(|| MalformedResultError::InvalidField {
                location: location.clone(),
                field: "count",
                expected: "a number",
            })?;
        if !count.is_finite() || count < 0.0 {
            return Err(MalformedResultError::InvalidCount {
                location,
                value: count,
            });
        }
        if !seen.insert(name.to_string()) {
            return Err(MalformedResultError::Duplicate {
                kind: "test",
                name: name.to_string(),
                location,
            });
        }
        tests.push(TestMeasurement::new(name, count));
    }
    Ok(tests)
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    location: &str,
) -> Result<&'a str> {
    obj.get(field)
        .ok_or_else(|| MalformedResultError::MissingField {
            location: location.to_string(),
            field,
        })?
        .as_str()
        .ok_or_else(|| MalformedResultError::InvalidField {
            location: location.to_string(),
            field,
            expected: "a string",
        })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_shape() {
        let result = normalize(&json!([
            { "name": "parse", "tests": [
                { "name": "small", "count": 1500.5 },
                { "name": "large", "count": 20 }
            ]},
            { "name": "render", "tests": [] }
        ]))
        .unwrap();
        assert_eq!(result.suites.len(), 2);
        assert_eq!(result.suites[0].name, "parse");
        assert_eq!(result.suites[0].tests[0], TestMeasurement::new("small", 1500.5));
        assert_eq!(result.suites[0].tests[1].count, 20.0);
        assert!(result.suites[1].tests.is_empty());
    }

    #[test]
    fn test_map_shape_keeps_document_order() {
        let result = normalize_str(
            r#"{ "zeta": [ { "name": "b", "count": 2 }, { "name": "a", "count": 1 } ],
                 "alpha": [ { "name": "x", "count": 3 } ] }"#,
        )
        .unwrap();
        let names: Vec<_> = result.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        let tests: Vec<_> = result.suites[0].tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tests, ["b", "a"]);
    }

    #[test]
    fn test_both_shapes_normalize_identically() {
        let from_array = normalize(&json!([
            { "name": "suiteA", "tests": [ { "name": "t1", "count": 1000 } ] }
        ]))
        .unwrap();
        let from_map = normalize(&json!({ "suiteA": [ { "name": "t1", "count": 1000 } ] })).unwrap();
        assert_eq!(from_array, from_map);
    }

    #[test]
    fn test_missing_fields() {
        let err = normalize(&json!([{ "tests": [] }])).unwrap_err();
        assert!(matches!(err, MalformedResultError::MissingField { field: "name", .. }));

        let err = normalize(&json!([{ "name": "s" }])).unwrap_err();
        assert!(matches!(err, MalformedResultError::MissingField { field: "tests", .. }));

        let err = normalize(&json!({ "s": [ { "name": "t" } ] })).unwrap_err();
        assert!(matches!(err, MalformedResultError::MissingField { field: "count", .. }));
        assert!(err.to_string().contains(r#"$["s"][0]"#));
    }

    #[test]
    fn test_invalid_counts() {
        let err = normalize(&json!({ "s": [ { "name": "t", "count": -1 } ] })).unwrap_err();
        assert!(matches!(err, MalformedResultError::InvalidCount { .. }));

        let err = normalize(&json!({ "s": [ { "name": "t", "count": "12" } ] })).unwrap_err();
        assert!(matches!(err, MalformedResultError::InvalidField { field: "count", .. }));

        let err = normalize(&json!({ "s": [ { "name": "t", "count": null } ] })).unwrap_err();
        assert!(matches!(err, MalformedResultError::InvalidField { field: "count", .. }));
    }

    #[test]
    fn test_zero_count_is_valid() {
        let result = normalize(&json!({ "s": [ { "name": "t", "count": 0 } ] })).unwrap();
        assert_eq!(result.suites[0].tests[0].count, 0.0);
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = normalize(&json!([
            { "name": "s", "tests": [] },
            { "name": "s", "tests": [] }
        ]))
        .unwrap_err();
        assert!(matches!(err, MalformedResultError::Duplicate { kind: "suite", .. }));

        let err = normalize(&json!({ "s": [
            { "name": "t", "count": 1 },
            { "name": "t", "count": 2 }
        ] }))
        .unwrap_err();
        assert!(matches!(err, MalformedResultError::Duplicate { kind: "test", .. }));
    }

    #[test]
    fn test_unsupported_shapes() {
        let err = normalize(&json!(42)).unwrap_err();
        assert!(matches!(err, MalformedResultError::UnsupportedShape { found: "a number" }));
        assert!(matches!(
            normalize_str("not json"),
            Err(MalformedResultError::InvalidJson(_))
        ));
        assert!(normalize(&json!({ "s": { "name": "t" } })).is_err());
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let result = normalize_slice(
            br#"[{ "name": "s", "hz": 3, "tests": [ { "name": "t", "count": 5, "rme": 0.4 } ] }]"#,
        )
        .unwrap();
        assert_eq!(result.test_count(), 1);
    }
}
