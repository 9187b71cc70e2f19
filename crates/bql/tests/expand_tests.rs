//! End-to-end graph expansion scenarios: depth and direction semantics,
//! cycle safety, cache invalidation, and truncation.


use bql::{BqlError, RelationType};
use harness::TestHarness;

#[test]
fn test_expand_down_depth_two_over_parent_child_chain() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.child_chain("root", 3); // root ← c1 ← c2 ← c3

    let mut ids = h.ids(r#"id = "root" expand down depth 2"#);
    ids.sort();
    assert_eq!(ids, vec!["root", "root-c1", "root-c2"]);
}

#[test]
fn test_expand_depth_defaults_to_one() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.child_chain("root", 2);

    let mut ids = h.ids(r#"id = "root" expand down"#);
    ids.sort();
    assert_eq!(ids, vec!["root", "root-c1"]);
}

#[test]
fn test_expand_up_walks_toward_blockers() {
    let h = TestHarness::new();
    h.issue("leaf").save();
    h.issue("mid").save();
    h.issue("top").save();
    h.link("leaf", "mid", RelationType::BlockedBy);
    h.link("mid", "top", RelationType::BlockedBy);

    let mut ids = h.ids(r#"id = "leaf" expand blockers depth 2"#);
    ids.sort();
    assert_eq!(ids, vec!["leaf", "mid", "top"]);

    // One level only
    let mut ids = h.ids(r#"id = "leaf" expand up"#);
    ids.sort();
    assert_eq!(ids, vec!["leaf", "mid"]);
}

#[test]
fn test_expand_all_unlimited_over_cycle() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.issue("x").save();
    h.link("root", "x", RelationType::BlockedBy);
    h.link("x", "root", RelationType::BlockedBy);

    let ids = h.ids(r#"id = "root" expand all depth *"#);
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["root", "x"]);
    // Exactly once each, despite the cycle appearing in both directions.
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_expand_depth_boundary_over_chain_of_twelve() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.child_chain("root", 11); // 12 issues total

    let ids = h.ids(r#"id = "root" expand down depth 10"#);
    assert_eq!(ids.len(), 11);
    assert!(!ids.contains(&"root-c11".to_string()));
}

#[test]
fn test_expand_depth_eleven_rejected_by_parser() {
    let h = TestHarness::new();
    h.issue("root").save();
    let err = h
        .executor
        .execute(r#"id = "root" expand down depth 11"#)
        .unwrap_err();
    assert!(matches!(err, BqlError::Parse(_)));
    assert!(err.to_string().contains("between 1 and 10"));
}

#[test]
fn test_expanded_issues_appended_after_base() {
    let h = TestHarness::new();
    h.issue("base-b").save();
    h.issue("base-a").save();
    h.issue("extra").save();
    h.link("extra", "base-a", RelationType::ParentChild);

    let ids = h.ids(r#"id in ("base-a", "base-b") expand down order by id asc"#);
    // Base order preserved, expansion delta appended after.
    assert_eq!(ids, vec!["base-a", "base-b", "extra"]);
}

#[test]
fn test_expand_produces_no_duplicates() {
    let h = TestHarness::new();
    h.issue("a").save();
    h.issue("b").save();
    h.link("b", "a", RelationType::ParentChild);

    // Both endpoints already match the base filter; expansion adds nothing.
    let mut ids = h.ids(r#"id in ("a", "b") expand all depth *"#);
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn test_expanded_issues_carry_side_data() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.issue("kid").label("backend").save();
    h.link("kid", "root", RelationType::ParentChild);
    h.comment("kid", "hello");

    let issues = h.executor.execute(r#"id = "root" expand down"#).unwrap();
    let kid = issues.iter().find(|i| i.id == "kid").unwrap();
    assert_eq!(kid.labels, vec!["backend"]);
    assert_eq!(kid.comment_count, 1);

    let root = issues.iter().find(|i| i.id == "root").unwrap();
    assert_eq!(root.dependencies.children, vec!["kid"]);
}

#[test]
fn test_expansion_skips_deleted_issues() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.issue("gone").save();
    h.link("gone", "root", RelationType::ParentChild);
    h.store.soft_delete("gone").unwrap();
    h.executor.invalidate_caches();

    assert_eq!(h.ids(r#"id = "root" expand down"#), vec!["root"]);
}

#[test]
fn test_graph_cache_serves_stale_until_invalidated() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.issue("kid").save();

    // Prime the graph cache with no edges.
    assert_eq!(h.ids(r#"id = "root" expand down"#), vec!["root"]);

    // Mutate behind the executor's back: the cached graph still answers.
    h.store
        .add_dependency("kid", "root", RelationType::ParentChild)
        .unwrap();
    assert_eq!(h.ids(r#"id = "root" expand down"#), vec!["root"]);

    // The store layer's invalidation hook makes the edge visible.
    h.executor.invalidate_caches();
    let mut ids = h.ids(r#"id = "root" expand down"#);
    ids.sort();
    assert_eq!(ids, vec!["kid", "root"]);
}

#[test]
fn test_unlimited_depth_is_truncated_at_ceiling() {
    let h = TestHarness::new();
    h.issue("root").save();
    // Chain longer than the 100-round ceiling.
    h.child_chain("root", 104);

    let ids = h.ids(r#"id = "root" expand down depth *"#);
    // Root plus one level per round; the walk stops at the ceiling.
    assert_eq!(ids.len(), 101);
}

#[test]
fn test_direction_words_map_to_same_traversal() {
    let h = TestHarness::new();
    h.issue("root").save();
    h.child_chain("root", 1);

    for query in [
        r#"id = "root" expand down"#,
        r#"id = "root" expand children"#,
        r#"id = "root" expand downstream"#,
    ] {
        let mut ids = h.ids(query);
        ids.sort();
        assert_eq!(ids, vec!["root", "root-c1"], "query {:?}", query);
    }
}
