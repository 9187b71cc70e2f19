//! Compiles a validated AST into a parameterized SQL WHERE clause and
//! ORDER BY clause (SQLite dialect).
//!
//! The compiler is a pure function: no store access, no state. Binary and
//! NOT nodes are parenthesized explicitly so SQL precedence always matches
//! the AST. Pseudo-fields (`blocked`, `ready`, `label`/`labels`) compile to
//! membership tests instead of column references. Relative dates compile to
//! SQLite `date('now', ...)` / `datetime('now', ...)` expressions; porting
//! to another dialect means swapping `relative_date_expr` only.

use crate::ast::{BoolOp, CompareOp, Expr, Query, Value};
use crate::fields::{self, FieldType};

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

/// A compiled query: WHERE clause (empty when the query has no filter),
/// ORDER BY clause, and the parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub where_clause: String,
    pub order_by: String,
    pub params: Vec<SqlParam>,
}

/// Compile a validated query.
pub fn compile(query: &Query) -> SqlQuery {
    let mut where_clause = String::new();
    let mut params = Vec::new();
    if let Some(filter) = &query.filter {
        compile_expr(filter, &mut where_clause, &mut params);
    }

    let order_by = if query.order_by.is_empty() {
        "issues.updated_at DESC".to_string()
    } else {
        query
            .order_by
            .iter()
            .map(|term| {
                let dir = if term.descending { "DESC" } else { "ASC" };
                format!("{} {}", fields::column_for(&term.field), dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    SqlQuery {
        where_clause,
        order_by,
        params,
    }
}

fn compile_expr(expr: &Expr, sql: &mut String, params: &mut Vec<SqlParam>) {
    match expr {
        Expr::Binary { left, op, right } => {
            sql.push('(');
            compile_expr(left, sql, params);
            match op {
                BoolOp::And => sql.push_str(" AND "),
                BoolOp::Or => sql.push_str(" OR "),
            }
            compile_expr(right, sql, params);
            sql.push(')');
        }
        Expr::Not(inner) => {
            sql.push_str("NOT (");
            compile_expr(inner, sql, params);
            sql.push(')');
        }
        Expr::Compare { field, op, value } => match field.as_str() {
            "blocked" => compile_cache_membership("blocked_cache", *op, value, sql),
            "ready" => compile_cache_membership("ready_cache", *op, value, sql),
            "label" | "labels" => compile_label(*op, value, sql, params),
            _ => compile_column_comparison(field, *op, value, sql, params),
        },
        Expr::In {
            field,
            values,
            negated,
        } => match field.as_str() {
            "label" | "labels" => compile_label_in(values, *negated, sql, params),
            _ => compile_column_in(field, values, *negated, sql, params),
        },
    }
}

/// `blocked`/`ready` compile to membership in a precomputed cache relation;
/// the boolean value and operator together choose IN vs NOT IN. Zero
/// parameters.
fn compile_cache_membership(table: &str, op: CompareOp, value: &Value, sql: &mut String) {
    let truthy = matches!(value, Value::Bool { value: true, .. });
    let include = truthy == (op != CompareOp::NotEq);
    let membership = if include { "IN" } else { "NOT IN" };
    sql.push_str(&format!(
        "issues.id {} (SELECT issue_id FROM {})",
        membership, table
    ));
}

/// `label`/`labels` compile to membership in the labels join relation, with
/// the inner predicate chosen by the operator. One parameter per value.
fn compile_label(op: CompareOp, value: &Value, sql: &mut String, params: &mut Vec<SqlParam>) {
    let (membership, predicate, param) = match op {
        CompareOp::NotEq => ("NOT IN", "label = ?", value.raw().to_string()),
        CompareOp::Contains => ("IN", "label LIKE ?", format!("%{}%", value.raw())),
        CompareOp::NotContains => ("NOT IN", "label LIKE ?", format!("%{}%", value.raw())),
        _ => ("IN", "label = ?", value.raw().to_string()),
    };
    sql.push_str(&format!(
        "issues.id {} (SELECT issue_id FROM labels WHERE {})",
        membership, predicate
    ));
    params.push(SqlParam::Text(param));
}

fn compile_label_in(values: &[Value], negated: bool, sql: &mut String, params: &mut Vec<SqlParam>) {
    let membership = if negated { "NOT IN" } else { "IN" };
    let placeholders = vec!["?"; values.len()].join(", ");
    sql.push_str(&format!(
        "issues.id {} (SELECT issue_id FROM labels WHERE label IN ({}))",
        membership, placeholders
    ));
    for value in values {
        params.push(SqlParam::Text(value.raw().to_string()));
    }
}

fn compile_column_comparison(
    field: &str,
    op: CompareOp,
    value: &Value,
    sql: &mut String,
    params: &mut Vec<SqlParam>,
) {
    let column = fields::column_for(field);

    // Relative dates become inline SQL expressions against the store's
    // "now" and bind nothing.
    if let Value::Date { normalized, .. } = value {
        if let Some(expr) = relative_date_expr(normalized) {
            sql.push_str(&format!("{} {} {}", column, sql_op(op), expr));
            return;
        }
    }

    match op {
        CompareOp::Contains => {
            sql.push_str(&format!("{} LIKE ?", column));
            params.push(SqlParam::Text(format!("%{}%", value.raw())));
        }
        CompareOp::NotContains => {
            sql.push_str(&format!("{} NOT LIKE ?", column));
            params.push(SqlParam::Text(format!("%{}%", value.raw())));
        }
        _ => {
            sql.push_str(&format!("{} {} ?", column, sql_op(op)));
            params.push(bind_value(field, value));
        }
    }
}

fn compile_column_in(
    field: &str,
    values: &[Value],
    negated: bool,
    sql: &mut String,
    params: &mut Vec<SqlParam>,
) {
    let column = fields::column_for(field);
    let membership = if negated { "NOT IN" } else { "IN" };
    let placeholders = vec!["?"; values.len()].join(", ");
    sql.push_str(&format!("{} {} ({})", column, membership, placeholders));
    for value in values {
        params.push(bind_value(field, value));
    }
}

/// Bind a value as a parameter. Priorities bind their integer level; enum
/// values bind their canonical lowercase form; anything else binds verbatim.
fn bind_value(field: &str, value: &Value) -> SqlParam {
    match value {
        Value::Int { value, .. } => SqlParam::Int(*value),
        Value::Bool { value, .. } => SqlParam::Int(*value as i64),
        Value::Priority { level, .. } => SqlParam::Int(*level as i64),
        Value::Date { normalized, .. } => SqlParam::Text(normalized.clone()),
        Value::String { raw } => {
            let is_enum = fields::lookup(field)
                .is_some_and(|spec| spec.field_type == FieldType::Enum);
            if is_enum {
                SqlParam::Text(raw.to_ascii_lowercase())
            } else {
                SqlParam::Text(raw.clone())
            }
        }
    }
}

fn sql_op(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::NotEq => "!=",
        CompareOp::Lt => "<",
        CompareOp::Gt => ">",
        CompareOp::LtEq => "<=",
        CompareOp::GtEq => ">=",
        CompareOp::Contains => "LIKE",
        CompareOp::NotContains => "NOT LIKE",
    }
}

/// SQLite expression for a normalized relative date, or None when the text
/// is an absolute date to bind as a parameter. Hour offsets use
/// `datetime()` for finer precision; day and month offsets use `date()`.
fn relative_date_expr(normalized: &str) -> Option<String> {
    match normalized {
        "today" => return Some("date('now')".to_string()),
        "yesterday" => return Some("date('now', '-1 day')".to_string()),
        _ => {}
    }

    let (digits, unit) = normalized.split_at(normalized.len().checked_sub(1)?);
    let amount: i64 = digits.parse().ok()?;
    let magnitude = amount.unsigned_abs();
    let sign = if amount < 0 { '-' } else { '+' };
    match unit {
        "d" => Some(format!("date('now', '{}{} days')", sign, magnitude)),
        "h" => Some(format!("datetime('now', '{}{} hours')", sign, magnitude)),
        "m" => Some(format!("date('now', '{}{} months')", sign, magnitude)),
        _ => None,
    }
}
