use super::{Db, Result, json_list, models::*};
use rusqlite::types::Value;

impl Db {
    /// Every element with the given name (and kind, if set), ordered by owning
    /// document path then detection order. Names are not unique across documents.
    pub fn get_element_details(
        &self,
        name: &str,
        kind: Option<&str>,
        example_languages: &[&str],
        max_examples: usize,
    ) -> Result<Vec<ElementDetails>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = String::from(
            r#"
            SELECT e.element_type, e.name, e.fields_json, e.parameters_json, e.return_type,
                   e.description, d.id, d.file_path, d.title
            FROM graphql_elements e
            JOIN documents d ON d.id = e.document_id
            WHERE e.name = ? COLLATE NOCASE
            "#,
        );
        let mut params = vec![Value::Text(name.to_string())];

        if let Some(k) = kind.map(str::trim).filter(|k| !k.is_empty()) {
            query.push_str(" AND e.element_type = ? COLLATE NOCASE");
            params.push(Value::Text(k.to_string()));
        }
        query.push_str(" ORDER BY d.file_path ASC, e.id ASC");

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let rows: Vec<(i64, ElementDetails)> = {
            let mut stmt = self.conn.prepare(&query)?;
            let mapped = stmt.query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(6)?,
                    ElementDetails {
                        kind: row.get(0)?,
                        name: row.get(1)?,
                        fields: json_list(row, 2)?,
                        parameters: json_list(row, 3)?,
                        return_type: row.get(4)?,
                        description: row.get(5)?,
                        file_path: row.get(7)?,
                        document_title: row.get(8)?,
                        examples: Vec::new(),
                    },
                ))
            })?;
            mapped.collect::<rusqlite::Result<_>>()?
        };

        let mut details = Vec::with_capacity(rows.len());
        for (doc_id, mut element) in rows {
            element.examples = self.code_blocks_for(doc_id, example_languages, max_examples)?;
            details.push(element);
        }
        Ok(details)
    }
}
