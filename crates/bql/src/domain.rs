//! Core domain types for the issue store.
//!
//! Defines the issue record the query engine returns, together with the
//! enumerations used both by the store schema and by the query validator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

impl IssueType {
    /// All legal wire values, in declaration order.
    pub const ALL: [&'static str; 5] = ["bug", "feature", "task", "epic", "chore"];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
        }
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(IssueType::Bug),
            "feature" => Ok(IssueType::Feature),
            "task" => Ok(IssueType::Task),
            "epic" => Ok(IssueType::Epic),
            "chore" => Ok(IssueType::Chore),
            other => Err(format!("unknown issue type: {}", other)),
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Closed,
    Blocked,
}

impl Status {
    /// All legal wire values, in declaration order.
    pub const ALL: [&'static str; 4] = ["open", "in_progress", "closed", "blocked"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Closed => "closed",
            Status::Blocked => "blocked",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Status::Open),
            "in_progress" => Ok(Status::InProgress),
            "closed" => Ok(Status::Closed),
            "blocked" => Ok(Status::Blocked),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level, P0 (most urgent) through P4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    /// Numeric level stored in the database (0..=4).
    pub fn level(&self) -> i64 {
        *self as i64
    }

    /// Build a priority from its stored numeric level.
    pub fn from_level(level: i64) -> Result<Self, String> {
        match level {
            0 => Ok(Priority::P0),
            1 => Ok(Priority::P1),
            2 => Ok(Priority::P2),
            3 => Ok(Priority::P3),
            4 => Ok(Priority::P4),
            other => Err(format!("priority level out of range: {}", other)),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p0" => Ok(Priority::P0),
            "p1" => Ok(Priority::P1),
            "p2" => Ok(Priority::P2),
            "p3" => Ok(Priority::P3),
            "p4" => Ok(Priority::P4),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.level())
    }
}

/// Kind of a dependency edge.
///
/// Edges are directed subject → object: a `BlockedBy` edge points from the
/// blocked issue to its blocker, a `ParentChild` edge from the child to its
/// parent, and a `DiscoveredFrom` edge from the discovery to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    BlockedBy,
    ParentChild,
    DiscoveredFrom,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::BlockedBy => "blocked-by",
            RelationType::ParentChild => "parent-child",
            RelationType::DiscoveredFrom => "discovered-from",
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked-by" => Ok(RelationType::BlockedBy),
            "parent-child" => Ok(RelationType::ParentChild),
            "discovered-from" => Ok(RelationType::DiscoveredFrom),
            other => Err(format!("unknown relation type: {}", other)),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency references attached to an issue, grouped by relation.
///
/// `blocked_by` and `blocks` are the two ends of `BlockedBy` edges,
/// `children` collects the child ends of `ParentChild` edges pointing at
/// this issue, and `discovered` the issues discovered from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub children: Vec<String>,
    pub discovered: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.blocked_by.is_empty()
            && self.blocks.is_empty()
            && self.children.is_empty()
            && self.discovered.is_empty()
    }
}

/// An issue record as returned by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (UUID or slug such as "perles-123")
    pub id: String,
    /// Short summary
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Issue category
    pub issue_type: IssueType,
    /// Current lifecycle status
    pub status: Status,
    /// Priority level
    pub priority: Priority,
    /// Assigned person or agent, if any
    pub assignee: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
    /// Close timestamp, if closed
    pub closed_at: Option<DateTime<Utc>>,
    /// Labels attached to this issue
    pub labels: Vec<String>,
    /// Dependency references grouped by relation
    pub dependencies: Dependencies,
    /// Number of comments on this issue
    pub comment_count: i64,
}

impl Issue {
    /// Create a new open task with default priority and a generated ID.
    pub fn new(title: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            issue_type: IssueType::Task,
            status: Status::Open,
            priority: Priority::P2,
            assignee: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            labels: Vec::new(),
            dependencies: Dependencies::default(),
            comment_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_follows_level() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P3 < Priority::P4);
        assert_eq!(Priority::P2.level(), 2);
    }

    #[test]
    fn test_priority_parse_case_insensitive() {
        assert_eq!(Priority::from_str("p0").unwrap(), Priority::P0);
        assert_eq!(Priority::from_str("P4").unwrap(), Priority::P4);
        assert!(Priority::from_str("P5").is_err());
    }

    #[test]
    fn test_status_round_trip() {
        for s in Status::ALL {
            assert_eq!(Status::from_str(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_issue_type_round_trip() {
        for t in IssueType::ALL {
            assert_eq!(IssueType::from_str(t).unwrap().as_str(), t);
        }
    }

    #[test]
    fn test_relation_type_round_trip() {
        for r in ["blocked-by", "parent-child", "discovered-from"] {
            assert_eq!(RelationType::from_str(r).unwrap().as_str(), r);
        }
    }

    #[test]
    fn test_new_issue_defaults() {
        let issue = Issue::new("Fix lexer".to_string(), "Details".to_string());
        assert_eq!(issue.issue_type, IssueType::Task);
        assert_eq!(issue.status, Status::Open);
        assert_eq!(issue.priority, Priority::P2);
        assert!(issue.dependencies.is_empty());
        assert_eq!(issue.comment_count, 0);
    }
}
