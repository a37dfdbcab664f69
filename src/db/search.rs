use super::documents::{SUMMARY_COLUMNS, map_code_block_at, map_summary};
use super::{Db, DbError, Result, json_list, models::*};
use rusqlite::types::Value;
use std::collections::HashMap;

/// Exact-match (case-insensitive) filters applied inside the document search query.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentFilter<'a> {
    pub category: Option<&'a str>,
    pub subcategory: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

/// Trigram tokens need at least three characters; shorter terms never match the index.
const MIN_TERM_CHARS: usize = 3;

/// How one keyword string is turned into a lookup.
#[derive(Debug, PartialEq)]
enum Lookup {
    /// FTS5 MATCH expression: quoted terms joined with AND.
    Match(String),
    /// Lower-cased LIKE patterns, all of which must match.
    Substring(Vec<String>),
}

fn plan_lookup(input: &str) -> Option<Lookup> {
    let terms: Vec<&str> = input.split_whitespace().collect();
    if terms.is_empty() {
        return None;
    }

    let indexable: Vec<String> = terms
        .iter()
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();

    if indexable.is_empty() {
        Some(Lookup::Substring(
            terms.iter().map(|t| like_pattern(t)).collect(),
        ))
    } else {
        Some(Lookup::Match(indexable.join(" AND ")))
    }
}

/// `%term%` with LIKE wildcards escaped (escape char `\`).
fn like_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Substring hits have no relevance score; they rank after every index hit.
fn ranked_score(lookup: &Lookup, raw: f64) -> f64 {
    match lookup {
        Lookup::Match(_) => raw,
        Lookup::Substring(_) => f64::MAX,
    }
}

fn run<T>(
    db: &Db,
    query: &str,
    params: &[Value],
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

    let mut stmt = db.conn.prepare(query)?;
    let rows = stmt.query_map(param_refs.as_slice(), map)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn push_filter(
    clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    column: &str,
    value: Option<&str>,
) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        clauses.push(format!("{column} = ? COLLATE NOCASE"));
        params.push(Value::Text(v.to_string()));
    }
}

impl Db {
    /// Keyword search over documents. Each keyword string is looked up on its own,
    /// candidates are merged keeping their best score, then ranked by score and path.
    pub fn search_documents(
        &self,
        queries: &[String],
        filter: &DocumentFilter<'_>,
        top_k: usize,
    ) -> Result<Vec<DocumentHit>> {
        if queries.is_empty() || queries.len() > 3 {
            return Err(DbError::InvalidQuery(format!(
                "expected 1-3 keyword queries, got {}",
                queries.len()
            )));
        }

        let mut merged: HashMap<String, DocumentHit> = HashMap::new();
        for q in queries {
            let lookup = plan_lookup(q)
                .ok_or_else(|| DbError::InvalidQuery("keyword query is empty".into()))?;

            for hit in self.search_documents_once(&lookup, filter, top_k)? {
                let better = merged
                    .get(&hit.document.file_path)
                    .is_none_or(|existing| hit.score < existing.score);
                if better {
                    merged.insert(hit.document.file_path.clone(), hit);
                }
            }
        }

        let mut hits: Vec<DocumentHit> = merged.into_values().collect();
        hits.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.document.file_path.cmp(&b.document.file_path))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn search_documents_once(
        &self,
        lookup: &Lookup,
        filter: &DocumentFilter<'_>,
        top_k: usize,
    ) -> Result<Vec<DocumentHit>> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        let mut query = match lookup {
            Lookup::Match(expr) => {
                clauses.push("documents_fts MATCH ?".to_string());
                params.push(Value::Text(expr.clone()));
                format!(
                    "SELECT {SUMMARY_COLUMNS}, bm25(documents_fts) AS score \
                     FROM documents_fts JOIN documents d ON d.id = documents_fts.rowid"
                )
            }
            Lookup::Substring(patterns) => {
                for p in patterns {
                    clauses.push("lower(d.searchable_text) LIKE ? ESCAPE '\\'".to_string());
                    params.push(Value::Text(p.clone()));
                }
                format!("SELECT {SUMMARY_COLUMNS}, 0.0 AS score FROM documents d")
            }
        };

        push_filter(&mut clauses, &mut params, "d.category", filter.category);
        push_filter(&mut clauses, &mut params, "d.subcategory", filter.subcategory);
        push_filter(&mut clauses, &mut params, "d.content_type", filter.content_type);

        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
        query.push_str(" ORDER BY score ASC, d.file_path ASC LIMIT ?");
        params.push(Value::Integer(top_k as i64));

        run(self, &query, &params, |row| {
            Ok(DocumentHit {
                document: map_summary(row, 0)?,
                score: ranked_score(lookup, row.get(6)?),
            })
        })
    }

    /// Keyword search over detected schema elements with an optional kind filter.
    pub fn search_elements(
        &self,
        keyword: &str,
        kind: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<ElementHit>> {
        let lookup = plan_lookup(keyword)
            .ok_or_else(|| DbError::InvalidQuery("keyword query is empty".into()))?;

        let mut clauses = Vec::new();
        let mut params = Vec::new();

        let mut query = match &lookup {
            Lookup::Match(expr) => {
                clauses.push("graphql_elements_fts MATCH ?".to_string());
                params.push(Value::Text(expr.clone()));
                String::from(
                    r#"
                    SELECT e.element_type, e.name, e.fields_json, e.parameters_json,
                           d.file_path, d.title, bm25(graphql_elements_fts) AS score
                    FROM graphql_elements_fts
                    JOIN graphql_elements e ON e.id = graphql_elements_fts.rowid
                    JOIN documents d ON d.id = e.document_id
                    "#,
                )
            }
            Lookup::Substring(patterns) => {
                for p in patterns {
                    clauses.push("lower(e.searchable_text) LIKE ? ESCAPE '\\'".to_string());
                    params.push(Value::Text(p.clone()));
                }
                String::from(
                    r#"
                    SELECT e.element_type, e.name, e.fields_json, e.parameters_json,
                           d.file_path, d.title, 0.0 AS score
                    FROM graphql_elements e
                    JOIN documents d ON d.id = e.document_id
                    "#,
                )
            }
        };

        push_filter(&mut clauses, &mut params, "e.element_type", kind);

        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
        query.push_str(" ORDER BY score ASC, d.file_path ASC, e.id ASC LIMIT ?");
        params.push(Value::Integer(top_k as i64));

        run(self, &query, &params, |row| {
            Ok(ElementHit {
                kind: row.get(0)?,
                name: row.get(1)?,
                fields: json_list(row, 2)?,
                parameters: json_list(row, 3)?,
                file_path: row.get(4)?,
                document_title: row.get(5)?,
                score: ranked_score(&lookup, row.get(6)?),
            })
        })
    }

    /// Substring search over code block text and its context, optionally by language.
    pub fn search_examples(
        &self,
        keyword: &str,
        language: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<CodeExample>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(DbError::InvalidQuery("keyword query is empty".into()));
        }

        let mut clauses = vec![
            "(lower(cb.code) LIKE ?1 ESCAPE '\\' OR lower(coalesce(cb.context, '')) LIKE ?1 ESCAPE '\\')"
                .to_string(),
        ];
        let mut params = vec![Value::Text(like_pattern(keyword))];

        if let Some(lang) = language.map(str::trim).filter(|l| !l.is_empty()) {
            clauses.push(format!("cb.language = ?{} COLLATE NOCASE", params.len() + 1));
            params.push(Value::Text(lang.to_string()));
        }

        let query = format!(
            r#"
            SELECT d.file_path, d.title, cb.language, cb.code, cb.context, cb.line_number
            FROM code_blocks cb
            JOIN documents d ON d.id = cb.document_id
            WHERE {}
            ORDER BY d.file_path ASC, cb.line_number ASC, cb.id ASC
            LIMIT ?{}
            "#,
            clauses.join(" AND "),
            params.len() + 1
        );
        params.push(Value::Integer(top_k as i64));

        run(self, &query, &params, |row| {
            Ok(CodeExample {
                file_path: row.get(0)?,
                document_title: row.get(1)?,
                block: map_code_block_at(row, 2)?,
            })
        })
    }
}
