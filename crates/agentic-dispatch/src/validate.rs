//! Argument validation against a capability's declared argument list.

use serde_json::{Map, Number, Value};

use crate::arguments::Arguments;
use crate::capability::{ArgumentKind, ArgumentSpec};
use crate::error::{DispatchError, DispatchResult, FieldError};

/// What to do with arguments the descriptor does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownArguments {
    #[default]
    Reject,
    Ignore,
}

/// Validate `raw` against `specs`.
///
/// Missing optional arguments receive their declared default; `null` counts
/// as absent. All failures are collected, one [`FieldError`] per field.
pub fn validate_arguments(
    specs: &[ArgumentSpec],
    raw: Option<Value>,
    unknown: UnknownArguments,
) -> DispatchResult<Arguments> {
    let mut supplied = match raw {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(DispatchError::InvalidArguments(vec![FieldError::new(
                "arguments",
                format!("expected an object, got {}", type_name(&other)),
            )]));
        }
    };

    let mut errors = Vec::new();
    let mut validated = Map::new();

    for spec in specs {
        match supplied.remove(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => match coerce(spec.kind, value) {
                Ok(v) => {
                    validated.insert(spec.name.clone(), v);
                }
                Err(reason) => errors.push(FieldError::new(&spec.name, reason)),
            },
            None => {
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    errors.push(FieldError::new(&spec.name, "required argument missing"));
                }
            }
        }
    }

    // Whatever is left was not declared.
    for name in supplied.keys() {
        match unknown {
            UnknownArguments::Reject => errors.push(FieldError::new(name, "unknown argument")),
            UnknownArguments::Ignore => tracing::debug!(argument = %name, "Ignoring undeclared argument"),
        }
    }

    if errors.is_empty() {
        Ok(Arguments::new(validated))
    } else {
        Err(DispatchError::InvalidArguments(errors))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce(kind: ArgumentKind, value: Value) -> Result<Value, String> {
    let mismatch = |v: &Value| format!("expected {}, got {}", kind_name(kind), type_name(v));

    match (kind, value) {
        (ArgumentKind::Any, v) => Ok(v),

        (ArgumentKind::String, v @ Value::String(_)) => Ok(v),
        (ArgumentKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ArgumentKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ArgumentKind::Integer, Value::Number(n)) => integer_from_number(&n)
            .map(Value::from)
            .ok_or_else(|| format!("expected integer, got {n}")),
        (ArgumentKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected integer, got \"{s}\"")),

        (ArgumentKind::Number, v @ Value::Number(_)) => Ok(v),
        (ArgumentKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("expected number, got \"{s}\"")),

        (ArgumentKind::Boolean, v @ Value::Bool(_)) => Ok(v),
        (ArgumentKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{s}\"")),
        },

        (ArgumentKind::Array, v @ Value::Array(_)) => Ok(v),
        (ArgumentKind::Object, v @ Value::Object(_)) => Ok(v),

        (_, v) => Err(mismatch(&v)),
    }
}

fn integer_from_number(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        // Above i64::MAX.
        return None;
    }
    let f = n.as_f64()?;
    // 2^63 is exactly representable as f64 but not as i64, hence the open bound.
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

fn kind_name(kind: ArgumentKind) -> &'static str {
    kind.json_type().unwrap_or("any")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<ArgumentSpec> {
        vec![
            ArgumentSpec::string("name").required(),
            ArgumentSpec::integer("count").default_value(json!(1)),
            ArgumentSpec::boolean("verbose"),
        ]
    }

    fn field_errors(err: DispatchError) -> Vec<FieldError> {
        match err {
            DispatchError::InvalidArguments(fields) => fields,
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let args = validate_arguments(&specs(), Some(json!({"name": "x"})), UnknownArguments::Reject)
            .unwrap();
        assert_eq!(args.get_i64("count"), Some(1));
        assert!(!args.contains("verbose"));
    }

    #[test]
    fn test_missing_required_reported() {
        let fields = field_errors(
            validate_arguments(&specs(), None, UnknownArguments::Reject).unwrap_err(),
        );
        assert_eq!(fields, vec![FieldError::new("name", "required argument missing")]);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let err = validate_arguments(&specs(), Some(json!({"name": null})), UnknownArguments::Reject)
            .unwrap_err();
        assert_eq!(field_errors(err)[0].field, "name");
    }

    #[test]
    fn test_coercion_from_strings() {
        let args = validate_arguments(
            &specs(),
            Some(json!({"name": 7, "count": "12", "verbose": "TRUE"})),
            UnknownArguments::Reject,
        )
        .unwrap();
        assert_eq!(args.get_str("name"), Some("7"));
        assert_eq!(args.get_i64("count"), Some(12));
        assert_eq!(args.get_bool("verbose"), Some(true));
    }

    #[test]
    fn test_integral_float_accepted_as_integer() {
        let args = validate_arguments(
            &specs(),
            Some(json!({"name": "a", "count": 3.0})),
            UnknownArguments::Reject,
        )
        .unwrap();
        assert_eq!(args.get_i64("count"), Some(3));
    }

    #[test]
    fn test_integer_out_of_i64_range_rejected() {
        for count in [json!(9_223_372_036_854_775_808u64), json!(9_223_372_036_854_775_808.0f64)] {
            let fields = field_errors(
                validate_arguments(
                    &specs(),
                    Some(json!({"name": "a", "count": count})),
                    UnknownArguments::Reject,
                )
                .unwrap_err(),
            );
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "count");
        }

        let args = validate_arguments(
            &specs(),
            Some(json!({"name": "a", "count": i64::MAX})),
            UnknownArguments::Reject,
        )
        .unwrap();
        assert_eq!(args.get_i64("count"), Some(i64::MAX));
    }

    #[test]
    fn test_type_errors_collected_per_field() {
        let fields = field_errors(
            validate_arguments(
                &specs(),
                Some(json!({"name": ["x"], "count": 2.5, "verbose": "maybe"})),
                UnknownArguments::Reject,
            )
            .unwrap_err(),
        );
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["name", "count", "verbose"]);
    }

    #[test]
    fn test_unknown_rejected_or_ignored() {
        let raw = json!({"name": "a", "extra": 1});
        let fields = field_errors(
            validate_arguments(&specs(), Some(raw.clone()), UnknownArguments::Reject).unwrap_err(),
        );
        assert_eq!(fields[0], FieldError::new("extra", "unknown argument"));

        let args = validate_arguments(&specs(), Some(raw), UnknownArguments::Ignore).unwrap();
        assert!(!args.contains("extra"));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let fields = field_errors(
            validate_arguments(&specs(), Some(json!([1, 2])), UnknownArguments::Reject).unwrap_err(),
        );
        assert_eq!(fields[0].field, "arguments");
    }
}
