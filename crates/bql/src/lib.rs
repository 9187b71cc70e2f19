//! BQL: a boolean query language for filtering, ordering, and
//! graph-expanding issues stored in a relational dependency graph.
//!
//! The pipeline runs strictly downward per query:
//!
//! 1. **Lexer** turns raw text into positioned tokens.
//! 2. **Parser** builds a typed AST (recursive descent, current/peek).
//! 3. **Validator** checks fields, operators, and values against the
//!    field registry.
//! 4. **SQL compiler** emits a parameterized WHERE/ORDER BY pair.
//! 5. **Executor** runs the scan, batch-attaches labels, dependency
//!    references, and comment counts, and optionally expands the result
//!    set through the cached dependency graph (bounded BFS).
//!
//! # Examples
//!
//! ```no_run
//! use bql::{Executor, SqliteStore};
//!
//! # fn example() -> Result<(), bql::BqlError> {
//! let store = SqliteStore::open_in_memory()?;
//! let executor = Executor::new(store);
//!
//! let bugs = executor.execute("type = bug and priority <= p1")?;
//! let tree = executor.execute("id = \"perles-123\" expand down depth 2")?;
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod cache;
pub mod domain;
pub mod error;
pub mod executor;
pub mod fields;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod sql;
pub mod store;
pub mod validate;

// Re-export commonly used types
pub use ast::{Depth, Direction, ExpandClause, Query};
pub use domain::{Dependencies, Issue, IssueType, Priority, RelationType, Status};
pub use error::{BqlError, ExecutionError, ParseError, StoreError, ValidationError};
pub use executor::{build_id_query, is_bql_query, CancelToken, Executor};
pub use graph::{DependencyGraph, ExpandResult};
pub use store::{IssueStore, SqliteStore};
