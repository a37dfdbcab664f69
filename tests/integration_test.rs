/// End-to-end integration tests for the ingestion and query pipeline.
///
/// Tests the complete flow:
///   Config → markdown corpus → Indexer → Db → query operations → rendering
use graphql_docs_mcp::config::Config;
use graphql_docs_mcp::db::Db;
use graphql_docs_mcp::db::search::DocumentFilter;
use graphql_docs_mcp::indexer::core::Indexer;
use graphql_docs_mcp::mcp::format;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::Mutex as TokioMutex;

const SCHEMA_DOC: &str = r#"---
title: products query
description: Search the product catalog
keywords:
  - products
  - catalog
---
# products query

The `products` query searches the catalog.

Example request:

```graphql
query products($search: String, $pageSize: Int) {
  products(search: $search, pageSize: $pageSize) {
    total_count
    items {
      name
      sku
    }
  }
}
```
"#;

const TUTORIAL_DOC: &str = r#"---
title: Create an empty cart
keywords:
  - cart
---
# Step 1. Create an empty cart

```graphql
mutation {
  createEmptyCart
}
```

```json
{ "data": { "createEmptyCart": "abc" } }
```
"#;

const GUIDE_BODY: &str = "# Exceptions\n\nGraphQL errors are returned in the `errors` array.\n\n```php\nthrow new GraphQlInputException(__('Invalid'));\n```\n";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn corpus(root: &Path) {
    write(root, "schema/products/queries/products.md", SCHEMA_DOC);
    write(root, "tutorials/checkout/a-create-cart.md", TUTORIAL_DOC);
    write(
        root,
        "develop/exceptions.md",
        &format!("---\ntitle: Exceptions\nkeywords: [errors]\n---\n{GUIDE_BODY}"),
    );
}

fn new_indexer(root: &Path) -> (Indexer, Arc<TokioMutex<Db>>) {
    let db = Arc::new(TokioMutex::new(Db::open_in_memory().unwrap()));
    let indexer = Indexer::new(db.clone(), root, &Config::default()).unwrap();
    (indexer, db)
}

/// Three-document corpus: ingest, then exercise the query operations.
#[tokio::test]
async fn test_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    corpus(root);

    let (indexer, db) = new_indexer(root);
    let report = indexer.ingest(false).await.unwrap();
    assert_eq!(report.parsed, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.elements, 1, "only the schema doc declares an element");

    let db = db.lock().await;

    // Category tree
    let tree = db.list_categories().unwrap();
    let counts: Vec<(&str, usize)> = tree.iter().map(|c| (c.name.as_str(), c.total)).collect();
    assert_eq!(counts, vec![("develop", 1), ("schema", 1), ("tutorials", 1)]);

    // Schema elements
    let hits = db.search_elements("products", Some("query"), 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "products");
    assert_eq!(hits[0].kind, "query");
    assert_eq!(hits[0].parameters, vec!["search", "pageSize"]);
    assert_eq!(hits[0].file_path, "schema/products/queries/products.md");

    // Full body comes back exactly as written
    let guide = db.get_document("develop/exceptions.md").unwrap().unwrap();
    assert_eq!(guide.content_md, GUIDE_BODY);
    assert_eq!(guide.content_type, "guide");
    assert_eq!(guide.keywords, vec!["errors"]);
    assert!(db.get_document("develop/missing.md").unwrap().is_none());

    // Keyword search with a filter
    let queries = vec!["catalog".to_string()];
    let found = db
        .search_documents(&queries, &DocumentFilter::default(), 5)
        .unwrap();
    assert_eq!(found[0].document.file_path, "schema/products/queries/products.md");
    let filtered = DocumentFilter {
        category: Some("tutorials"),
        ..Default::default()
    };
    assert!(db.search_documents(&queries, &filtered, 5).unwrap().is_empty());

    // Element details carry the document's GraphQL examples
    let details = db.get_element_details("products", None, &["graphql"], 3).unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].examples.len(), 1);
    assert_eq!(details[0].examples[0].context.as_deref(), Some("Example request:"));

    // Tutorial steps with graphql + json examples
    let steps = db.get_tutorial("checkout", &["graphql", "json"], 2).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].examples.len(), 2);
    let rendered = format::tutorial("checkout", &steps, 400);
    assert!(rendered.contains("## Step 1: Create an empty cart"));

    // Code examples by language
    let examples = db.search_examples("GraphQlInputException", Some("php"), 5).unwrap();
    assert_eq!(examples.len(), 1);
    assert_eq!(examples[0].file_path, "develop/exceptions.md");
    assert!(db.search_examples("GraphQlInputException", Some("json"), 5).unwrap().is_empty());

    // Related documents: nothing shares a category or keyword with the guide
    let related = db.get_related_documents("develop/exceptions.md", 5).unwrap().unwrap();
    assert!(related.is_empty());
    assert!(db.get_related_documents("nope.md", 5).unwrap().is_none());
}

/// Re-ingesting an unchanged corpus takes the fast path and changes nothing.
#[tokio::test]
async fn test_idempotent_reingest() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    corpus(root);

    let (indexer, db) = new_indexer(root);
    let queries = vec!["cart".to_string(), "products".to_string()];

    let first = indexer.ingest(false).await.unwrap();
    let (rows_before, results_before) = {
        let db = db.lock().await;
        (
            db.count_rows("documents").unwrap(),
            db.search_documents(&queries, &DocumentFilter::default(), 5)
                .unwrap(),
        )
    };

    let second = indexer.ingest(false).await.unwrap();
    assert!(!first.fast_path);
    assert!(second.fast_path, "unchanged corpus must skip re-parsing");
    assert_eq!(second.parsed, first.parsed);
    assert_eq!(second.code_blocks, first.code_blocks);
    assert_eq!(second.elements, first.elements);

    let db = db.lock().await;
    assert_eq!(db.count_rows("documents").unwrap(), rows_before);
    let results_after = db
        .search_documents(&queries, &DocumentFilter::default(), 5)
        .unwrap();
    assert_eq!(results_after, results_before);
}

/// Adding, editing and removing files is picked up by the next run.
#[tokio::test]
async fn test_reingest_after_changes() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    corpus(root);

    let (indexer, db) = new_indexer(root);
    indexer.ingest(false).await.unwrap();

    write(
        root,
        "tutorials/checkout/b-add-item.md",
        "---\ntitle: Add an item\n---\nAdd products to the cart.\n",
    );
    fs::remove_file(root.join("develop/exceptions.md")).unwrap();

    let report = indexer.ingest(false).await.unwrap();
    assert!(!report.fast_path);
    assert_eq!(report.parsed, 3);

    let db = db.lock().await;
    assert!(db.get_document("develop/exceptions.md").unwrap().is_none());

    let steps = db.get_tutorial("checkout", &[], 2).unwrap();
    let paths: Vec<&str> = steps.iter().map(|s| s.document.file_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["tutorials/checkout/a-create-cart.md", "tutorials/checkout/b-add-item.md"]
    );
}

/// A malformed file is skipped and counted; the rest of the corpus is indexed.
#[tokio::test]
async fn test_malformed_file_is_skipped() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    corpus(root);
    write(root, "usage/broken.md", "---\ntitle: never closed\n");

    let (indexer, db) = new_indexer(root);
    let report = indexer.ingest(false).await.unwrap();
    assert_eq!(report.discovered, 4);
    assert_eq!(report.parsed, 3);
    assert_eq!(report.skipped, 1);

    let db = db.lock().await;
    assert!(db.get_document("usage/broken.md").unwrap().is_none());
    assert_eq!(db.count_rows("documents").unwrap(), 3);
}

/// The store survives a close / reopen and keeps the fast path.
#[tokio::test]
async fn test_file_backed_store_reopen() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("docs");
    corpus(&root);
    let db_path = temp_dir.path().join("index/database.db");

    let mut config = Config::default();
    config.db_path = db_path.to_string_lossy().into_owned();
    let db_path = config.prepare_db_path().unwrap();

    {
        let db = Arc::new(TokioMutex::new(Db::open(&db_path).unwrap()));
        let indexer = Indexer::new(db.clone(), &root, &config).unwrap();
        assert!(!indexer.ingest(false).await.unwrap().fast_path);
        drop(indexer);
        let db = Arc::try_unwrap(db).ok().unwrap().into_inner();
        db.close().unwrap();
    }

    let db = Arc::new(TokioMutex::new(Db::open(&db_path).unwrap()));
    let indexer = Indexer::new(db.clone(), &root, &config).unwrap();
    let report = indexer.ingest(false).await.unwrap();
    assert!(report.fast_path);
    assert_eq!(report.parsed, 3);
}
