//! Semantic validation of parsed queries against the field registry.
//!
//! Checks field existence, operator compatibility per field type, value
//! types, and enum whitelists, for both the filter expression and the
//! ORDER BY terms. A query that passes here always compiles to SQL.

use crate::ast::{CompareOp, Expr, Query, Value};
use crate::error::ValidationError;
use crate::fields::{self, FieldSpec, FieldType};

/// Validate a parsed query. Returns the first violation found.
pub fn validate(query: &Query) -> Result<(), ValidationError> {
    if let Some(filter) = &query.filter {
        validate_expr(filter)?;
    }
    for term in &query.order_by {
        if fields::lookup(&term.field).is_none() {
            return Err(unknown_field(&term.field));
        }
    }
    Ok(())
}

fn validate_expr(expr: &Expr) -> Result<(), ValidationError> {
    match expr {
        Expr::Binary { left, right, .. } => {
            validate_expr(left)?;
            validate_expr(right)
        }
        Expr::Not(inner) => validate_expr(inner),
        Expr::Compare { field, op, value } => {
            let spec = fields::lookup(field).ok_or_else(|| unknown_field(field))?;
            validate_comparison(spec, field, *op, value)
        }
        Expr::In { field, values, .. } => {
            let spec = fields::lookup(field).ok_or_else(|| unknown_field(field))?;
            if matches!(spec.field_type, FieldType::Bool | FieldType::Date) {
                return Err(ValidationError::InNotAllowed {
                    field: field.clone(),
                    field_type: spec.field_type.as_str(),
                });
            }
            for value in values {
                validate_comparison(spec, field, CompareOp::Eq, value)?;
            }
            Ok(())
        }
    }
}

/// Operator-compatibility matrix by field type.
fn validate_comparison(
    spec: &FieldSpec,
    field: &str,
    op: CompareOp,
    value: &Value,
) -> Result<(), ValidationError> {
    let op_allowed = match spec.field_type {
        FieldType::Bool | FieldType::Enum => matches!(op, CompareOp::Eq | CompareOp::NotEq),
        FieldType::String => matches!(
            op,
            CompareOp::Eq | CompareOp::NotEq | CompareOp::Contains | CompareOp::NotContains
        ),
        FieldType::Priority => true,
        FieldType::Date => !matches!(op, CompareOp::Contains | CompareOp::NotContains),
    };
    if !op_allowed {
        return Err(ValidationError::OperatorNotAllowed {
            field: field.to_string(),
            field_type: spec.field_type.as_str(),
            op: op.to_string(),
        });
    }

    match spec.field_type {
        FieldType::Bool => expect_kind(field, "bool", value, |v| matches!(v, Value::Bool { .. })),
        FieldType::Priority => expect_kind(field, "priority", value, |v| {
            matches!(v, Value::Priority { .. })
        }),
        // Quoted absolute dates arrive as strings and are bound verbatim.
        FieldType::Date => expect_kind(field, "date", value, |v| {
            matches!(v, Value::Date { .. } | Value::String { .. })
        }),
        FieldType::String => {
            expect_kind(field, "string", value, |v| matches!(v, Value::String { .. }))
        }
        FieldType::Enum => {
            expect_kind(field, "string", value, |v| matches!(v, Value::String { .. }))?;
            if !spec
                .allowed
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(value.raw()))
            {
                return Err(ValidationError::InvalidEnumValue {
                    field: field.to_string(),
                    value: value.raw().to_string(),
                    allowed: spec.allowed.iter().map(|s| s.to_string()).collect(),
                });
            }
            Ok(())
        }
    }
}

fn expect_kind(
    field: &str,
    expected: &'static str,
    value: &Value,
    check: impl Fn(&Value) -> bool,
) -> Result<(), ValidationError> {
    if check(value) {
        Ok(())
    } else {
        Err(ValidationError::ValueMismatch {
            field: field.to_string(),
            expected,
            found: value.kind_name(),
            raw: value.raw().to_string(),
        })
    }
}

fn unknown_field(field: &str) -> ValidationError {
    ValidationError::UnknownField {
        field: field.to_string(),
        valid_fields: fields::field_names(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn check(input: &str) -> Result<(), ValidationError> {
        validate(&Parser::parse(input).unwrap())
    }

    #[test]
    fn test_valid_queries_pass() {
        for input in [
            "type = bug",
            "type != chore and status = open",
            "status in (open, in_progress)",
            "priority >= p1",
            "priority in (p0, p1)",
            "title ~ parser",
            "label ~ urgent",
            "labels = backend",
            "blocked = true",
            "ready != false",
            "created > -7d",
            "updated <= today",
            "closed > \"2026-01-01\"",
            "assignee != alice",
            "id in (\"a\", \"b\")",
            "order by priority desc, updated",
            "not (type = bug or type = chore)",
        ] {
            assert!(check(input).is_ok(), "query {:?}: {:?}", input, check(input));
        }
    }

    #[test]
    fn test_unknown_field() {
        let err = check("foo = bar").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown field 'foo'"), "{}", msg);
        assert!(msg.contains("status"), "{}", msg);
    }

    #[test]
    fn test_unknown_field_in_order_by() {
        assert!(check("order by foo").is_err());
    }

    #[test]
    fn test_operator_matrix() {
        // Exhaustive: every field type against every operator.
        let cases: &[(&str, &str, &[&str])] = &[
            // (field, value, allowed operators)
            ("blocked", "true", &["=", "!="]),
            ("status", "open", &["=", "!="]),
            ("title", "\"x\"", &["=", "!=", "~", "!~"]),
            ("priority", "p1", &["=", "!=", "<", ">", "<=", ">="]),
            ("created", "-7d", &["=", "!=", "<", ">", "<=", ">="]),
        ];
        let all_ops = ["=", "!=", "<", ">", "<=", ">=", "~", "!~"];

        for (field, value, allowed) in cases {
            for op in all_ops {
                let input = format!("{} {} {}", field, op, value);
                let result = check(&input);
                if allowed.contains(&op) {
                    assert!(result.is_ok(), "expected ok: {:?} -> {:?}", input, result);
                } else {
                    assert!(
                        matches!(result, Err(ValidationError::OperatorNotAllowed { .. })),
                        "expected operator rejection: {:?} -> {:?}",
                        input,
                        result
                    );
                }
            }
        }
    }

    #[test]
    fn test_enum_whitelist() {
        let err = check("type = urgent").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEnumValue { .. }));
        assert!(err.to_string().contains("bug"));

        let err = check("status = done").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_enum_value_case_insensitive() {
        assert!(check("type = BUG").is_ok());
    }

    #[test]
    fn test_value_type_mismatches() {
        assert!(matches!(
            check("blocked = open").unwrap_err(),
            ValidationError::ValueMismatch { .. }
        ));
        assert!(matches!(
            check("priority = 3").unwrap_err(),
            ValidationError::ValueMismatch { .. }
        ));
        assert!(matches!(
            check("created > 7").unwrap_err(),
            ValidationError::ValueMismatch { .. }
        ));
    }

    #[test]
    fn test_in_not_allowed_for_bool_and_date() {
        assert!(matches!(
            check("blocked in (true, false)").unwrap_err(),
            ValidationError::InNotAllowed { .. }
        ));
        assert!(matches!(
            check("created in (-7d, -14d)").unwrap_err(),
            ValidationError::InNotAllowed { .. }
        ));
    }

    #[test]
    fn test_in_values_validated_individually() {
        let err = check("status in (open, done)").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_nested_expression_validated() {
        let err = check("type = bug and (foo = 1 or status = open)").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField { .. }));
    }
}
