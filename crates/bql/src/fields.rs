//! Field registry: the closed set of filterable/orderable field names,
//! their types, enum whitelists, and column mappings.

use crate::domain::{IssueType, Status};

/// Type of a registered field, driving operator and value checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Enum,
    Priority,
    Bool,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Enum => "enum",
            FieldType::Priority => "priority",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
        }
    }
}

/// A registered field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    /// Column the field maps to; None for pseudo-fields compiled to
    /// membership tests instead of a column reference.
    pub column: Option<&'static str>,
    /// Legal values for Enum fields, empty otherwise.
    pub allowed: &'static [&'static str],
}

/// The field registry. `label`/`labels`, `blocked` and `ready` are
/// pseudo-fields with no direct column.
const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "id",
        field_type: FieldType::String,
        column: Some("issues.id"),
        allowed: &[],
    },
    FieldSpec {
        name: "title",
        field_type: FieldType::String,
        column: Some("issues.title"),
        allowed: &[],
    },
    FieldSpec {
        name: "description",
        field_type: FieldType::String,
        column: Some("issues.description"),
        allowed: &[],
    },
    FieldSpec {
        name: "type",
        field_type: FieldType::Enum,
        column: Some("issues.issue_type"),
        allowed: &IssueType::ALL,
    },
    FieldSpec {
        name: "status",
        field_type: FieldType::Enum,
        column: Some("issues.status"),
        allowed: &Status::ALL,
    },
    FieldSpec {
        name: "priority",
        field_type: FieldType::Priority,
        column: Some("issues.priority"),
        allowed: &[],
    },
    FieldSpec {
        name: "assignee",
        field_type: FieldType::String,
        column: Some("issues.assignee"),
        allowed: &[],
    },
    FieldSpec {
        name: "label",
        field_type: FieldType::String,
        column: None,
        allowed: &[],
    },
    FieldSpec {
        name: "labels",
        field_type: FieldType::String,
        column: None,
        allowed: &[],
    },
    FieldSpec {
        name: "blocked",
        field_type: FieldType::Bool,
        column: None,
        allowed: &[],
    },
    FieldSpec {
        name: "ready",
        field_type: FieldType::Bool,
        column: None,
        allowed: &[],
    },
    FieldSpec {
        name: "created",
        field_type: FieldType::Date,
        column: Some("issues.created_at"),
        allowed: &[],
    },
    FieldSpec {
        name: "updated",
        field_type: FieldType::Date,
        column: Some("issues.updated_at"),
        allowed: &[],
    },
    FieldSpec {
        name: "closed",
        field_type: FieldType::Date,
        column: Some("issues.closed_at"),
        allowed: &[],
    },
];

/// Look up a field by name (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    FIELDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// All registered field names, sorted, for error messages.
pub fn field_names() -> Vec<String> {
    let mut names: Vec<String> = FIELDS.iter().map(|spec| spec.name.to_string()).collect();
    names.sort();
    names
}

/// Column reference for a field. Unmapped names fall back to the
/// conventional `issues.<name>` reference.
pub fn column_for(name: &str) -> String {
    match lookup(name).and_then(|spec| spec.column) {
        Some(column) => column.to_string(),
        None => format!("issues.{}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert!(lookup("Status").is_some());
        assert!(lookup("PRIORITY").is_some());
        assert!(lookup("foo").is_none());
    }

    #[test]
    fn test_enum_whitelists() {
        let spec = lookup("type").unwrap();
        assert_eq!(spec.field_type, FieldType::Enum);
        assert!(spec.allowed.contains(&"bug"));
        assert!(spec.allowed.contains(&"chore"));

        let spec = lookup("status").unwrap();
        assert!(spec.allowed.contains(&"in_progress"));
    }

    #[test]
    fn test_pseudo_fields_have_no_column() {
        for name in ["label", "labels", "blocked", "ready"] {
            assert!(lookup(name).unwrap().column.is_none(), "field {}", name);
        }
    }

    #[test]
    fn test_column_fallback() {
        assert_eq!(column_for("created"), "issues.created_at");
        assert_eq!(column_for("label"), "issues.label");
    }

    #[test]
    fn test_field_names_sorted() {
        let names = field_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"blocked".to_string()));
    }
}
