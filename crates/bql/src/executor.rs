//! Query execution: parse → validate → compile → scan → batch-attach →
//! expand.
//!
//! The executor owns two read-through caches as explicit fields: query
//! results keyed by the literal query text, and the dependency graph under
//! a fixed sentinel key. Both are flushed by `invalidate_caches`, the hook
//! the store layer calls on mutation. Parsing, validation, and compilation
//! are pure; the only blocking work is the store calls and the in-memory
//! BFS, so concurrent callers are safe and identical concurrent misses
//! collapse to one store round-trip.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::ast::Query;
use crate::cache::QueryCache;
use crate::domain::Issue;
use crate::error::{BqlError, ExecutionError};
use crate::graph::DependencyGraph;
use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;
use crate::sql;
use crate::store::IssueStore;
use crate::validate;

/// Sentinel cache key for the dependency graph.
const GRAPH_CACHE_KEY: &str = "dependency-graph";

const QUERY_CACHE_TTL: Duration = Duration::from_secs(30);
const GRAPH_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cooperative cancellation handle.
///
/// Checked between pipeline stages; an in-flight store call is not
/// interrupted, so cancellation latency is bounded by one store call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The query engine's public entry point.
pub struct Executor<S: IssueStore> {
    store: S,
    query_cache: QueryCache<String, Vec<Issue>>,
    graph_cache: QueryCache<&'static str, DependencyGraph>,
}

impl<S: IssueStore> Executor<S> {
    pub fn new(store: S) -> Self {
        Executor {
            store,
            query_cache: QueryCache::new(),
            graph_cache: QueryCache::new(),
        }
    }

    /// Parse, validate, and run a query, returning the matched issues with
    /// labels, dependency references, and comment counts attached, plus
    /// any issues reached by the expand clause appended after the base
    /// results.
    pub fn execute(&self, text: &str) -> Result<Vec<Issue>, BqlError> {
        self.execute_with_cancel(text, &CancelToken::new())
    }

    /// `execute` with cooperative cancellation.
    pub fn execute_with_cancel(
        &self,
        text: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<Issue>, BqlError> {
        check_cancelled(cancel)?;
        let query = Parser::parse(text)?;
        validate::validate(&query)?;

        check_cancelled(cancel)?;
        let base = self.fetch_matching(text, &query)?;

        let expand = match query.expand {
            Some(expand) => expand,
            None => return Ok(base.as_ref().clone()),
        };

        check_cancelled(cancel)?;
        let graph = self.load_graph()?;
        let base_ids: Vec<String> = base.iter().map(|issue| issue.id.clone()).collect();
        let result = graph.expand(&base_ids, expand.direction, expand.depth);
        if result.truncated {
            warn!(query = text, "graph expansion hit the iteration ceiling");
        }

        let base_id_set: HashSet<&String> = base_ids.iter().collect();
        let mut delta: Vec<String> = result
            .ids
            .into_iter()
            .filter(|id| !base_id_set.contains(id))
            .collect();
        delta.sort();

        let mut combined = base.as_ref().clone();
        if !delta.is_empty() {
            check_cancelled(cancel)?;
            let id_query_text = build_id_query(&delta);
            let id_query = Parser::parse(&id_query_text)?;
            let expanded = self.fetch_matching(&id_query_text, &id_query)?;
            combined.extend(expanded.iter().cloned());
        }
        Ok(combined)
    }

    /// Flush the query-result cache and the cached dependency graph. The
    /// store layer calls this on mutation.
    pub fn invalidate_caches(&self) {
        self.query_cache.invalidate_all();
        self.graph_cache.invalidate(&GRAPH_CACHE_KEY);
    }

    /// Run the compiled scan and attach side data, through the query-result
    /// cache keyed by the literal query text. Exactly three batch queries
    /// attach dependencies, labels, and comment counts regardless of
    /// result size.
    fn fetch_matching(&self, cache_key: &str, query: &Query) -> Result<Arc<Vec<Issue>>, BqlError> {
        let loaded = self
            .query_cache
            .get_with_refresh(cache_key.to_string(), QUERY_CACHE_TTL, || {
                debug!(query = cache_key, "query cache miss");
                let compiled = sql::compile(query);
                let mut issues = self
                    .store
                    .query_issues(&compiled)
                    .map_err(ExecutionError::from)?;

                let ids: Vec<String> = issues.iter().map(|issue| issue.id.clone()).collect();
                let mut dependencies = self
                    .store
                    .fetch_dependencies(&ids)
                    .map_err(ExecutionError::from)?;
                let mut labels = self.store.fetch_labels(&ids).map_err(ExecutionError::from)?;
                let counts = self
                    .store
                    .fetch_comment_counts(&ids)
                    .map_err(ExecutionError::from)?;

                for issue in &mut issues {
                    if let Some(deps) = dependencies.remove(&issue.id) {
                        issue.dependencies = deps;
                    }
                    if let Some(issue_labels) = labels.remove(&issue.id) {
                        issue.labels = issue_labels;
                    }
                    issue.comment_count = counts.get(&issue.id).copied().unwrap_or(0);
                }
                Ok::<_, ExecutionError>(issues)
            });
        loaded.map_err(BqlError::from)
    }

    /// Load the dependency graph through its cache.
    fn load_graph(&self) -> Result<Arc<DependencyGraph>, BqlError> {
        let loaded = self
            .graph_cache
            .get_with_refresh(GRAPH_CACHE_KEY, GRAPH_CACHE_TTL, || {
                let rows = self.store.fetch_all_edges().map_err(ExecutionError::from)?;
                debug!(edges = rows.len(), "loaded dependency graph");
                Ok::<_, ExecutionError>(DependencyGraph::from_rows(rows))
            });
        loaded.map_err(BqlError::from)
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<(), BqlError> {
    if cancel.is_cancelled() {
        Err(ExecutionError::Cancelled.into())
    } else {
        Ok(())
    }
}

/// Render an ID set as a query fragment that re-enters the pipeline:
/// `id = "x"` for one ID, `id in ("a", "b")` for several. An empty set
/// renders a query that matches nothing.
pub fn build_id_query(ids: &[String]) -> String {
    match ids {
        [] => r#"id = """#.to_string(),
        [only] => format!(r#"id = "{}""#, only),
        many => {
            let quoted: Vec<String> = many.iter().map(|id| format!(r#""{}""#, id)).collect();
            format!("id in ({})", quoted.join(", "))
        }
    }
}

/// Heuristic for distinguishing structured queries from free-text search:
/// true when the text lexes to any operator, parenthesis, or clause
/// keyword. Plain words (including `and`, `or`, `not`, `in`, which are
/// common in prose) do not qualify; a well-formed IN query always carries
/// parentheses anyway.
pub fn is_bql_query(text: &str) -> bool {
    Lexer::tokenize(text).iter().any(|token| {
        token.kind.is_comparison_op()
            || matches!(
                token.kind,
                TokenKind::LParen | TokenKind::RParen | TokenKind::Order | TokenKind::Expand
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_id_query_single() {
        assert_eq!(build_id_query(&["x".to_string()]), r#"id = "x""#);
    }

    #[test]
    fn test_build_id_query_many() {
        assert_eq!(
            build_id_query(&["a".to_string(), "b".to_string()]),
            r#"id in ("a", "b")"#
        );
    }

    #[test]
    fn test_build_id_query_empty_matches_nothing() {
        let text = build_id_query(&[]);
        assert!(Parser::parse(&text).is_ok());
    }

    #[test]
    fn test_build_id_query_round_trips_through_parser() {
        let text = build_id_query(&["perles-123".to_string(), "perles-456".to_string()]);
        assert!(Parser::parse(&text).is_ok());
    }

    #[test]
    fn test_is_bql_query() {
        assert!(is_bql_query("type = bug"));
        assert!(is_bql_query("status in (open)"));
        assert!(is_bql_query("order by priority"));
        assert!(is_bql_query("expand down"));
        assert!(is_bql_query("priority >= p1"));

        assert!(!is_bql_query("fix the parser bug"));
        assert!(!is_bql_query("not done yet"));
        assert!(!is_bql_query("crash and burn"));
        assert!(!is_bql_query(""));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }
}
