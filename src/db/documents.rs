use super::{Db, Result, json_list, models::*};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params};
use std::cmp::Ordering;
use tracing::info;

const INGESTION_KEY: &str = "last_ingestion";

pub(crate) const SUMMARY_COLUMNS: &str =
    "d.file_path, d.title, d.description, d.category, d.subcategory, d.content_type";

/// Maps the six `SUMMARY_COLUMNS` starting at `offset`.
pub(crate) fn map_summary(row: &Row<'_>, offset: usize) -> rusqlite::Result<DocumentSummary> {
    Ok(DocumentSummary {
        file_path: row.get(offset)?,
        title: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        category: row.get(offset + 3)?,
        subcategory: row.get(offset + 4)?,
        content_type: row.get(offset + 5)?,
    })
}

/// Orders paths segment by segment, so `a/b.md` sorts before `a-b/c.md`.
pub(crate) fn compare_path_segments(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

impl Db {
    /// Replace the whole corpus in one transaction: clear every table, bulk insert
    /// the parsed documents, rebuild both FTS indexes and overwrite the snapshot record.
    ///
    /// On error nothing is committed and the previous snapshot stays intact.
    pub fn replace_all(
        &mut self,
        docs: &[Document],
        fingerprint: &str,
        total_documents: usize,
    ) -> Result<IngestionMetadata> {
        let tx = self.conn.transaction()?;

        tx.execute_batch(
            r#"
            INSERT INTO documents_fts(documents_fts) VALUES('delete-all');
            INSERT INTO graphql_elements_fts(graphql_elements_fts) VALUES('delete-all');
            DELETE FROM code_blocks;
            DELETE FROM graphql_elements;
            DELETE FROM documents;
            DELETE FROM metadata;
            "#,
        )?;

        let mut doc_ids = Vec::with_capacity(docs.len());
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO documents (file_path, title, description, keywords_json, category,
                    subcategory, content_type, headers_json, searchable_text, content_md, last_modified)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for doc in docs {
                let id = stmt.insert(params![
                    doc.file_path,
                    doc.title,
                    doc.description,
                    serde_json::to_string(&doc.keywords)?,
                    doc.category,
                    doc.subcategory,
                    doc.content_type.as_str(),
                    serde_json::to_string(&doc.headers)?,
                    doc.searchable_text,
                    doc.content_md,
                    doc.last_modified,
                ])?;
                doc_ids.push(id);
            }
        }

        let mut block_count = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO code_blocks (document_id, language, code, context, line_number) VALUES (?, ?, ?, ?, ?)",
            )?;
            for (doc, doc_id) in docs.iter().zip(&doc_ids) {
                for block in &doc.code_blocks {
                    stmt.execute(params![
                        doc_id,
                        block.language,
                        block.code,
                        block.context,
                        block.line_number as i64,
                    ])?;
                    block_count += 1;
                }
            }
        }

        let mut element_count = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO graphql_elements (document_id, element_type, name, fields_json,
                    parameters_json, return_type, description, searchable_text)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for (doc, doc_id) in docs.iter().zip(&doc_ids) {
                for element in &doc.elements {
                    stmt.execute(params![
                        doc_id,
                        element.kind.as_str(),
                        element.name,
                        serde_json::to_string(&element.fields)?,
                        serde_json::to_string(&element.parameters)?,
                        element.return_type,
                        element.description,
                        element.searchable_text,
                    ])?;
                    element_count += 1;
                }
            }
        }

        tx.execute_batch(
            r#"
            INSERT INTO documents_fts(documents_fts) VALUES('rebuild');
            INSERT INTO graphql_elements_fts(graphql_elements_fts) VALUES('rebuild');
            "#,
        )?;

        let metadata = IngestionMetadata {
            fingerprint: fingerprint.to_string(),
            total_documents,
            ingested_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO metadata (key, fingerprint, total_documents, ingested_at) VALUES (?, ?, ?, ?)",
            params![
                INGESTION_KEY,
                metadata.fingerprint,
                metadata.total_documents as i64,
                metadata.ingested_at,
            ],
        )?;

        tx.commit()?;
        info!(
            "Stored {} documents, {} code blocks, {} GraphQL elements",
            docs.len(),
            block_count,
            element_count
        );
        Ok(metadata)
    }

    /// Snapshot record of the last successful ingestion, if any.
    pub fn ingestion_metadata(&self) -> Result<Option<IngestionMetadata>> {
        let meta = self
            .conn
            .query_row(
                "SELECT fingerprint, total_documents, ingested_at FROM metadata WHERE key = ?",
                params![INGESTION_KEY],
                |row| {
                    Ok(IngestionMetadata {
                        fingerprint: row.get(0)?,
                        total_documents: row.get::<_, i64>(1)? as usize,
                        ingested_at: row.get::<_, DateTime<Utc>>(2)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    /// Direct lookup by relative path.
    pub fn get_document(&self, file_path: &str) -> Result<Option<StoredDocument>> {
        let doc = self
            .conn
            .query_row(
                r#"
                SELECT file_path, title, description, keywords_json, category, subcategory,
                       content_type, headers_json, content_md, last_modified
                FROM documents WHERE file_path = ?
                "#,
                params![file_path],
                |row| {
                    Ok(StoredDocument {
                        file_path: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        keywords: json_list(row, 3)?,
                        category: row.get(4)?,
                        subcategory: row.get(5)?,
                        content_type: row.get(6)?,
                        headers: json_list(row, 7)?,
                        content_md: row.get(8)?,
                        last_modified: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    /// Document counts grouped into a category -> subcategory tree, both levels sorted by name.
    pub fn list_categories(&self) -> Result<Vec<CategoryNode>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT category, subcategory, COUNT(*)
            FROM documents
            GROUP BY category, subcategory
            ORDER BY category, subcategory
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)? as usize,
            ))
        })?;

        let mut tree: Vec<CategoryNode> = Vec::new();
        for row in rows {
            let (category, subcategory, count) = row?;
            match tree.last_mut() {
                Some(node) if node.name == category => {
                    node.total += count;
                    node.subcategories.push(SubcategoryCount {
                        name: subcategory,
                        count,
                    });
                }
                _ => tree.push(CategoryNode {
                    name: category,
                    total: count,
                    subcategories: vec![SubcategoryCount {
                        name: subcategory,
                        count,
                    }],
                }),
            }
        }

        Ok(tree)
    }

    /// Tutorial pages whose subcategory equals `name` or whose path contains it,
    /// in step order (path compared segment by segment).
    pub fn get_tutorial(
        &self,
        name: &str,
        example_languages: &[&str],
        max_examples: usize,
    ) -> Result<Vec<TutorialStep>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT d.id, {SUMMARY_COLUMNS}
            FROM documents d
            WHERE d.content_type = 'tutorial'
              AND (d.subcategory = ?1 COLLATE NOCASE OR instr(lower(d.file_path), lower(?1)) > 0)
            "#
        ))?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<_, i64>(0)?, map_summary(row, 1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        docs.sort_by(|(_, a), (_, b)| compare_path_segments(&a.file_path, &b.file_path));

        let mut steps = Vec::with_capacity(docs.len());
        for (doc_id, document) in docs {
            let examples = self.code_blocks_for(doc_id, example_languages, max_examples)?;
            steps.push(TutorialStep { document, examples });
        }
        Ok(steps)
    }

    /// Documents sharing the source's category and/or keywords, strongest first.
    ///
    /// Returns `None` when the source path is not indexed.
    pub fn get_related_documents(
        &self,
        file_path: &str,
        limit: usize,
    ) -> Result<Option<Vec<RelatedDocument>>> {
        let source = self
            .conn
            .query_row(
                "SELECT category, subcategory, keywords_json FROM documents WHERE file_path = ?",
                params![file_path],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((category, subcategory, keywords_json)) = source else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT file_path, title, description, category, subcategory, content_type,
                   same_category, shared,
                   2 * same_category + same_subcategory + shared AS score
            FROM (
                SELECT d.file_path, d.title, d.description, d.category, d.subcategory, d.content_type,
                       CASE WHEN d.category = ?1 THEN 1 ELSE 0 END AS same_category,
                       CASE WHEN d.category = ?1 AND d.subcategory IS NOT NULL AND d.subcategory = ?2
                            THEN 1 ELSE 0 END AS same_subcategory,
                       (SELECT COUNT(DISTINCT lower(k.value)) FROM json_each(d.keywords_json) k
                         WHERE lower(k.value) IN (SELECT lower(s.value) FROM json_each(?3) s)) AS shared
                FROM documents d
                WHERE d.file_path != ?4
            )
            WHERE same_category = 1 OR shared > 0
            ORDER BY score DESC, file_path ASC
            LIMIT ?5
            "#,
        )?;

        let rows = stmt.query_map(
            params![
                category,
                subcategory,
                keywords_json,
                file_path,
                limit as i64
            ],
            |row| {
                Ok(RelatedDocument {
                    document: map_summary(row, 0)?,
                    same_category: row.get::<_, i64>(6)? == 1,
                    shared_keywords: row.get::<_, i64>(7)? as usize,
                    score: row.get(8)?,
                })
            },
        )?;

        let mut related = Vec::new();
        for row in rows {
            related.push(row?);
        }
        Ok(Some(related))
    }

    /// Code blocks of one document, optionally restricted to some languages, in line order.
    pub(crate) fn code_blocks_for(
        &self,
        document_id: i64,
        languages: &[&str],
        limit: usize,
    ) -> Result<Vec<CodeBlock>> {
        let mut query = String::from(
            "SELECT language, code, context, line_number FROM code_blocks WHERE document_id = ?",
        );
        let mut params: Vec<Value> = vec![Value::Integer(document_id)];

        if !languages.is_empty() {
            let placeholders = vec!["?"; languages.len()].join(", ");
            query.push_str(&format!(" AND lower(language) IN ({placeholders})"));
            params.extend(languages.iter().map(|l| Value::Text(l.to_lowercase())));
        }

        query.push_str(" ORDER BY line_number ASC, id ASC LIMIT ?");
        params.push(Value::Integer(limit as i64));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_code_block)?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?);
        }
        Ok(blocks)
    }
}

/// Maps `language, code, context, line_number` starting at column 0.
pub(crate) fn map_code_block(row: &Row<'_>) -> rusqlite::Result<CodeBlock> {
    map_code_block_at(row, 0)
}

pub(crate) fn map_code_block_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<CodeBlock> {
    Ok(CodeBlock {
        language: row.get(offset)?,
        code: row.get(offset + 1)?,
        context: row.get(offset + 2)?,
        line_number: row.get::<_, i64>(offset + 3)? as usize,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn doc(path: &str, category: &str, subcategory: Option<&str>) -> Document {
        Document {
            file_path: path.to_string(),
            title: path.to_string(),
            description: None,
            keywords: Vec::new(),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            content_type: ContentType::from_category(category),
            headers: Vec::new(),
            content_md: format!("# {path}\n"),
            last_modified: Utc::now(),
            searchable_text: path.to_string(),
            code_blocks: Vec::new(),
            elements: Vec::new(),
        }
    }

    fn block(language: &str, code: &str, line_number: usize) -> CodeBlock {
        CodeBlock {
            language: language.to_string(),
            code: code.to_string(),
            context: None,
            line_number,
        }
    }

    #[test]
    fn test_replace_all_clears_previous_rows() {
        let mut db = Db::open_in_memory().unwrap();
        let mut first = doc("schema/products/products.md", "schema", Some("products"));
        first.code_blocks.push(block("graphql", "query products { items }", 3));
        db.replace_all(&[first, doc("index.md", "root", None)], "fp-1", 2)
            .unwrap();
        assert_eq!(db.count_rows("documents").unwrap(), 2);
        assert_eq!(db.count_rows("code_blocks").unwrap(), 1);

        db.replace_all(&[doc("develop/intro.md", "develop", None)], "fp-2", 1)
            .unwrap();
        assert_eq!(db.count_rows("documents").unwrap(), 1);
        assert_eq!(db.count_rows("code_blocks").unwrap(), 0);
        assert_eq!(db.count_rows("metadata").unwrap(), 1);

        let meta = db.ingestion_metadata().unwrap().unwrap();
        assert_eq!(meta.fingerprint, "fp-2");
        assert_eq!(meta.total_documents, 1);
        assert!(db.get_document("index.md").unwrap().is_none());
    }

    #[test]
    fn test_get_document_round_trips_lists() {
        let mut db = Db::open_in_memory().unwrap();
        let mut d = doc("develop/caching.md", "develop", None);
        d.keywords = vec!["cache".into(), "varnish".into()];
        d.headers = vec!["Caching".into(), "Varnish".into()];
        d.description = Some("How caching works".into());
        d.content_md = "# Caching\n\nBody with `code`.\n".into();
        db.replace_all(std::slice::from_ref(&d), "fp", 1).unwrap();

        let stored = db.get_document("develop/caching.md").unwrap().unwrap();
        assert_eq!(stored.keywords, d.keywords);
        assert_eq!(stored.headers, d.headers);
        assert_eq!(stored.content_md, d.content_md);
        assert_eq!(stored.content_type, "guide");
        assert!(stored.subcategory.is_none());
        assert!(db.get_document("develop/missing.md").unwrap().is_none());
    }

    #[test]
    fn test_list_categories_tree() {
        let mut db = Db::open_in_memory().unwrap();
        let docs = vec![
            doc("schema/products/a.md", "schema", Some("products")),
            doc("schema/products/b.md", "schema", Some("products")),
            doc("schema/cart/c.md", "schema", Some("cart")),
            doc("schema/overview.md", "schema", None),
            doc("develop/d.md", "develop", None),
            doc("index.md", "root", None),
        ];
        db.replace_all(&docs, "fp", docs.len()).unwrap();

        let tree = db.list_categories().unwrap();
        let names: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["develop", "root", "schema"]);

        let schema = &tree[2];
        assert_eq!(schema.total, 4);
        let subs: Vec<(Option<&str>, usize)> = schema
            .subcategories
            .iter()
            .map(|s| (s.name.as_deref(), s.count))
            .collect();
        assert_eq!(
            subs,
            vec![(None, 1), (Some("cart"), 1), (Some("products"), 2)]
        );
    }

    #[test]
    fn test_get_tutorial_orders_steps_by_path() {
        let mut db = Db::open_in_memory().unwrap();
        let mut step_b = doc("tutorials/checkout/b-add-item.md", "tutorials", Some("checkout"));
        step_b.code_blocks = vec![
            block("bash", "curl ...", 2),
            block("json", "{}", 8),
            block("graphql", "mutation addItem { x }", 5),
            block("graphql", "query cart { y }", 12),
        ];
        let docs = vec![
            step_b,
            doc("tutorials/checkout/a-create-cart.md", "tutorials", Some("checkout")),
            doc("tutorials/other/x.md", "tutorials", Some("other")),
            doc("schema/checkout/z.md", "schema", Some("checkout")),
        ];
        db.replace_all(&docs, "fp", docs.len()).unwrap();

        let steps = db.get_tutorial("checkout", &["graphql", "json"], 2).unwrap();
        let paths: Vec<&str> = steps.iter().map(|s| s.document.file_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "tutorials/checkout/a-create-cart.md",
                "tutorials/checkout/b-add-item.md"
            ]
        );
        let lines: Vec<usize> = steps[1].examples.iter().map(|b| b.line_number).collect();
        assert_eq!(lines, vec![5, 8]);

        assert!(db.get_tutorial("CHECKOUT", &[], 2).unwrap().len() == 2);
        assert!(db.get_tutorial("nonexistent", &[], 2).unwrap().is_empty());
        assert!(db.get_tutorial("  ", &[], 2).unwrap().is_empty());
    }

    #[test]
    fn test_compare_path_segments() {
        assert_eq!(
            compare_path_segments("a/b.md", "a-b/c.md"),
            Ordering::Less
        );
        assert_eq!(
            compare_path_segments("t/1-intro.md", "t/2-next.md"),
            Ordering::Less
        );
    }

    #[test]
    fn test_related_documents_ranking() {
        let mut db = Db::open_in_memory().unwrap();
        let mut source = doc("schema/cart/add.md", "schema", Some("cart"));
        source.keywords = vec!["cart".into(), "checkout".into()];
        let sibling = doc("schema/cart/remove.md", "schema", Some("cart"));
        let cousin = doc("schema/products/p.md", "schema", Some("products"));
        let mut tutorial = doc("tutorials/checkout/a.md", "tutorials", Some("checkout"));
        tutorial.keywords = vec!["Checkout".into(), "cart".into()];
        let unrelated = doc("develop/x.md", "develop", None);

        let docs = vec![source, sibling, cousin, tutorial, unrelated];
        db.replace_all(&docs, "fp", docs.len()).unwrap();

        let related = db
            .get_related_documents("schema/cart/add.md", 10)
            .unwrap()
            .unwrap();
        let paths: Vec<&str> = related.iter().map(|r| r.document.file_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "schema/cart/remove.md",
                "schema/products/p.md",
                "tutorials/checkout/a.md"
            ]
        );
        assert_eq!(related[0].score, 3);
        assert_eq!(related[1].score, 2);
        assert_eq!(related[2].score, 2);
        assert_eq!(related[2].shared_keywords, 2);
        assert!(!related[2].same_category);

        assert!(db.get_related_documents("nope.md", 5).unwrap().is_none());
        let capped = db
            .get_related_documents("schema/cart/add.md", 1)
            .unwrap()
            .unwrap();
        assert_eq!(capped.len(), 1);
    }
}
