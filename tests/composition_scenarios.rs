//! Composition Scenario Tests
//!
//! End-to-end behaviour over two heterogeneous tables:
//! - Unordered sequences concatenate sources in order
//! - Ordered sequences interleave by value
//! - Windows, counts and get() agree with the materialized sequence
//! - Bulk update and delete reach every source

use std::collections::BTreeMap;
use std::sync::Arc;

use query_sequence::planner::Criteria;
use query_sequence::{Composition, FieldValue, MemoryTable, QueryError, Record, Schema};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

struct Library {
    books: Arc<MemoryTable>,
    articles: Arc<MemoryTable>,
}

fn make_library() -> Library {
    let book = Schema::new("Book")
        .with_fields(["title", "pages", "release"])
        .with_latest_by("release")
        .shared();
    let article = Schema::new("Article")
        .with_fields(["title", "pages", "release"])
        .with_latest_by("release")
        .shared();

    let books = MemoryTable::new(&book);
    let articles = MemoryTable::new(&article);

    books.insert(
        Record::new(&book)
            .with("id", 1)
            .with("title", "Fiction")
            .with("pages", 10)
            .with("release", chrono::NaiveDate::from_ymd_opt(2001, 6, 12).unwrap()),
    );
    books.insert(
        Record::new(&book)
            .with("id", 2)
            .with("title", "Biography")
            .with("pages", 20)
            .with("release", chrono::NaiveDate::from_ymd_opt(1998, 3, 4).unwrap()),
    );
    articles.insert(
        Record::new(&article)
            .with("id", 1)
            .with("title", "Django Rocks")
            .with("pages", Option::<i64>::None)
            .with("release", chrono::NaiveDate::from_ymd_opt(2014, 1, 20).unwrap()),
    );
    articles.insert(
        Record::new(&article)
            .with("id", 2)
            .with("title", "Alice in Django-land")
            .with("pages", Option::<i64>::None)
            .with("release", chrono::NaiveDate::from_ymd_opt(2012, 8, 3).unwrap()),
    );

    Library { books, articles }
}

fn make_sequence(lib: &Library) -> Composition {
    Composition::new(vec![lib.books.query(), lib.articles.query()])
}

fn titles(seq: &Composition) -> Vec<String> {
    seq.iter()
        .unwrap()
        .map(|t| t.unwrap().get("title").unwrap().as_text())
        .collect()
}

// =============================================================================
// Iteration Tests
// =============================================================================

/// Unordered sequences yield each source in turn.
#[test]
fn test_unordered_iteration_concatenates() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    assert_eq!(
        titles(&seq),
        vec!["Fiction", "Biography", "Django Rocks", "Alice in Django-land"]
    );
    let sources: Vec<usize> = seq.iter().unwrap().map(|t| t.unwrap().source().0).collect();
    assert_eq!(sources, vec![0, 0, 1, 1]);
}

/// Ordering by a shared field interleaves sources.
#[test]
fn test_order_by_title_interleaves() {
    let lib = make_library();
    let seq = make_sequence(&lib).order_by(["title"]).unwrap();

    assert_eq!(
        titles(&seq),
        vec!["Alice in Django-land", "Biography", "Django Rocks", "Fiction"]
    );
    assert_eq!(
        titles(&seq.reverse().unwrap()),
        vec!["Fiction", "Django Rocks", "Biography", "Alice in Django-land"]
    );
}

/// Nulls sort after populated values by default.
#[test]
fn test_order_by_nullable_field() {
    let lib = make_library();
    let seq = make_sequence(&lib).order_by(["-pages", "title"]).unwrap();

    assert_eq!(
        titles(&seq),
        vec!["Alice in Django-land", "Django Rocks", "Biography", "Fiction"]
    );
}

/// Slicing picks positions from the ordered sequence.
#[test]
fn test_ordered_window() {
    let lib = make_library();
    let seq = make_sequence(&lib).order_by(["title"]).unwrap();

    assert_eq!(titles(&seq.slice(1, Some(3))), vec!["Biography", "Django Rocks"]);
    assert_eq!(seq.slice(1, Some(3)).count().unwrap(), 2);
    assert_eq!(seq.get_index(3).unwrap().get("title").unwrap().as_text(), "Fiction");
}

// =============================================================================
// Count and Existence Tests
// =============================================================================

/// count() is the sum of source counts, clamped to the window.
#[test]
fn test_count_sums_sources() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    assert_eq!(seq.count().unwrap(), 4);
    assert_eq!(seq.slice(3, None).count().unwrap(), 1);
    assert_eq!(seq.slice(10, None).count().unwrap(), 0);
    assert_eq!(seq.len().unwrap(), 4);
}

/// exists() stops at the first non-empty source.
#[test]
fn test_exists_short_circuits() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    assert!(seq.exists().unwrap());
    assert_eq!(lib.books.stats().exists_checks, 1);
    assert_eq!(lib.articles.stats().exists_checks, 0);

    let nothing = seq.filter(&Criteria::new().and("title", json!("Atlas"))).unwrap();
    assert!(!nothing.exists().unwrap());
    assert!(nothing.is_empty().unwrap());
}

/// all() gives an independent, uncached copy.
#[test]
fn test_all_is_idempotent() {
    let lib = make_library();
    let seq = make_sequence(&lib).order_by(["title"]).unwrap();

    assert_eq!(titles(&seq.all()), titles(&seq));
    assert_eq!(titles(&seq.all().all()), titles(&seq));
    assert_eq!(seq.none().count().unwrap(), 0);
}

// =============================================================================
// Filter Tests
// =============================================================================

/// Field filters are pushed down to every source.
#[test]
fn test_filter_on_fields() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let django = seq
        .filter(&Criteria::new().and("title__icontains", json!("django")))
        .unwrap();
    assert_eq!(titles(&django), vec!["Django Rocks", "Alice in Django-land"]);

    let long = seq.filter(&Criteria::new().and("pages__gte", json!(15))).unwrap();
    assert_eq!(titles(&long), vec!["Biography"]);

    let recent = seq
        .exclude(&Criteria::new().and("release__lt", json!("2010-01-01")))
        .unwrap();
    assert_eq!(titles(&recent), vec!["Django Rocks", "Alice in Django-land"]);
}

/// Source index filters select whole sources.
#[test]
fn test_filter_on_source_index() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let articles = seq.filter(&Criteria::new().and("#__gt", json!(0))).unwrap();
    assert_eq!(titles(&articles), vec!["Django Rocks", "Alice in Django-land"]);

    let books = seq.exclude(&Criteria::new().and("#", json!("1"))).unwrap();
    assert_eq!(titles(&books), vec!["Fiction", "Biography"]);
}

// =============================================================================
// Single Record Tests
// =============================================================================

/// get() requires exactly one match.
#[test]
fn test_get_single_record() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let found = seq
        .get(&Criteria::new().and("title", json!("Biography")))
        .unwrap();
    assert_eq!(found.source().0, 0);
    assert_eq!(found.get("pages").unwrap(), FieldValue::Int(20));

    let missing = seq.get(&Criteria::new().and("title", json!("Atlas"))).unwrap_err();
    assert!(matches!(missing, QueryError::DoesNotExist(_)));

    let many = seq.get(&Criteria::new().and("id", json!(1))).unwrap_err();
    assert_eq!(many, QueryError::MultipleObjectsReturned { found: 2 });
}

/// first() and last() follow the sequence order.
#[test]
fn test_first_and_last() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    assert_eq!(seq.first().unwrap().unwrap().get("title").unwrap().as_text(), "Fiction");
    assert_eq!(
        seq.last().unwrap().unwrap().get("title").unwrap().as_text(),
        "Alice in Django-land"
    );

    let ordered = seq.order_by(["title"]).unwrap();
    assert_eq!(
        ordered.first().unwrap().unwrap().get("title").unwrap().as_text(),
        "Alice in Django-land"
    );
    assert_eq!(ordered.last().unwrap().unwrap().get("title").unwrap().as_text(), "Fiction");
}

/// earliest() and latest() use the shared latest-by field.
#[test]
fn test_earliest_and_latest() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    assert_eq!(seq.earliest(&[]).unwrap().get("title").unwrap().as_text(), "Biography");
    assert_eq!(seq.latest(&[]).unwrap().get("title").unwrap().as_text(), "Django Rocks");
    assert_eq!(seq.latest(&["pages"]).unwrap().get("title").unwrap().as_text(), "Django Rocks");

    let err = seq.none().earliest(&["title"]).unwrap_err();
    assert!(matches!(err, QueryError::DoesNotExist(_)));
}

// =============================================================================
// Projection Tests
// =============================================================================

/// values() includes the source index.
#[test]
fn test_values_projection() {
    let lib = make_library();
    let seq = make_sequence(&lib).order_by(["title"]).unwrap();

    let rows: Vec<_> = seq
        .values(&["title"])
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows[0], json!({"#": 1, "title": "Alice in Django-land"}).as_object().unwrap().clone());
    assert_eq!(rows[1], json!({"#": 0, "title": "Biography"}).as_object().unwrap().clone());

    let full = seq.values(&[]).unwrap().next().unwrap().unwrap();
    assert_eq!(full.get("release"), Some(&json!("2012-08-03")));
    assert_eq!(full.get("pages"), Some(&json!(null)));
}

// =============================================================================
// Bulk Operation Tests
// =============================================================================

/// update() reaches every source and reports the total.
#[test]
fn test_update_every_source() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let mut assignments = BTreeMap::new();
    assignments.insert("pages".to_string(), FieldValue::Int(99));
    assert_eq!(seq.update(&assignments).unwrap(), 4);

    let pages: Vec<FieldValue> = seq
        .all()
        .iter()
        .unwrap()
        .map(|t| t.unwrap().get("pages").unwrap())
        .collect();
    assert!(pages.iter().all(|p| *p == FieldValue::Int(99)));

    let err = seq.slice(0, Some(1)).update(&assignments).unwrap_err();
    assert_eq!(err, QueryError::SliceTaken("update"));
}

/// delete() reports per-schema counts.
#[test]
fn test_delete_reports_per_schema() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let summary = seq
        .filter(&Criteria::new().and("title__startswith", json!("D")))
        .unwrap()
        .delete()
        .unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.per_schema.get("Article"), Some(&1));
    assert_eq!(summary.per_schema.get("Book"), Some(&0));

    assert_eq!(lib.articles.len(), 1);
    assert_eq!(seq.all().count().unwrap(), 3);
}

// =============================================================================
// Explain Tests
// =============================================================================

/// explain() names the plan and every source.
#[test]
fn test_explain_lists_plan_and_sources() {
    let lib = make_library();
    let seq = make_sequence(&lib);

    let concat = seq.slice(1, Some(3)).explain();
    assert_eq!(concat.plan, "CONCAT");
    assert!(concat.trimmed);

    let merge = seq.order_by(["title"]).unwrap().explain();
    assert_eq!(merge.plan, "MERGE");
    assert_eq!(merge.ordering, vec!["title".to_string()]);

    let text = seq.order_by(["-#"]).unwrap().explain().to_string();
    assert!(text.contains("Plan: SOURCE_ORDERED"));
    assert!(text.contains("Sources: last to first"));
    assert!(text.contains("#1 Article"));
}
