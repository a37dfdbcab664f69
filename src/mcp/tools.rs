/// MCP tool handlers.
///
/// Eight read-only tools over the documentation index:
/// 1. search_documentation - keyword search over pages with category/type filters
/// 2. get_document - full page by relative path
/// 3. search_graphql_elements - keyword search over detected schema elements
/// 4. get_element_details - every element with a given name, with examples
/// 5. list_categories - category / subcategory tree with counts
/// 6. get_tutorial - tutorial pages in step order
/// 7. search_examples - substring search over code blocks
/// 8. get_related_documents - pages sharing category or keywords
use crate::db::DbError;
use crate::db::models::ElementKind;
use crate::db::search::DocumentFilter;
use crate::mcp::format;
use crate::mcp::server::McpContext;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;

/// Code blocks shown per tutorial step.
const TUTORIAL_EXAMPLES: usize = 2;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct SearchDocumentationParams {
    /// 1-3 short keyword queries, e.g. ["product", "cart"]
    queries: Vec<String>,
    /// Filter by category: schema, develop, usage, tutorials, ...
    category: Option<String>,
    /// Filter by subcategory: products, cart, customer, checkout, ...
    subcategory: Option<String>,
    /// Filter by content type: schema | tutorial | guide | reference
    content_type: Option<String>,
    /// Max results (default: 5)
    top_k: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct FilePathParam {
    /// Path relative to the docs root, e.g. 'schema/products/queries/products.md'
    file_path: String,
}

#[derive(Deserialize, JsonSchema)]
struct SearchElementsParams {
    /// Search term, e.g. 'products', 'cart', 'customer'
    query: String,
    /// Element kind filter: query | mutation | type | interface | union
    element_type: Option<String>,
    /// Max results (default: 5)
    top_k: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct ElementDetailsParams {
    /// Element name, e.g. 'products', 'createCustomer', 'ProductInterface'
    element_name: String,
    /// Element kind filter: query | mutation | type | interface | union
    element_type: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct TutorialParams {
    /// Tutorial name, e.g. 'checkout'
    tutorial_name: String,
}

#[derive(Deserialize, JsonSchema)]
struct SearchExamplesParams {
    /// Text to look for in code or in the prose just above it
    query: String,
    /// Language filter: graphql, json, javascript, php, bash, ...
    language: Option<String>,
    /// Max results (default: 5)
    top_k: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct RelatedParams {
    /// Path of the source document
    file_path: String,
    /// Max results (default: 5)
    top_k: Option<usize>,
}

// ── Response helpers ─────────────────────────────────────────────────

fn text_result(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

/// Bad input is reported to the caller; anything else is a server fault.
fn store_error(op: &str, e: DbError) -> Result<CallToolResult, McpError> {
    match e {
        DbError::InvalidQuery(msg) => error_result(&msg),
        other => {
            tracing::error!("{op} failed: {other}");
            Err(McpError::internal_error(format!("{op} failed: {other}"), None))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn valid_kind(value: Option<&str>) -> Result<Option<&str>, String> {
    match non_empty(value) {
        None => Ok(None),
        Some(k) if ElementKind::parse(k).is_some() => Ok(Some(k)),
        Some(k) => {
            let allowed: Vec<&str> = ElementKind::ALL.iter().map(|k| k.as_str()).collect();
            Err(format!(
                "unknown element_type '{k}', expected one of: {}",
                allowed.join(", ")
            ))
        }
    }
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("GraphQL Docs".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only index of GraphQL documentation. Use search_documentation with short \
                 keywords to find pages, get_document to read one, search_graphql_elements and \
                 get_element_details for schema queries, mutations and types, and get_tutorial \
                 for step-by-step guides."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    fn top_k(&self, requested: Option<usize>) -> Result<usize, String> {
        match requested {
            Some(0) => Err("top_k must be positive".to_string()),
            Some(k) => Ok(k),
            None => Ok(self.ctx.config.search_top_k),
        }
    }

    // ── Tool 1: search_documentation ────────────────────────────────

    #[tool(
        description = "Search the GraphQL documentation by keywords. Use 1-3 SHORT keyword queries (1-3 words each). Can filter by category, subcategory or content type."
    )]
    async fn search_documentation(
        &self,
        params: Parameters<SearchDocumentationParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = match self.top_k(p.top_k) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };
        let filter = DocumentFilter {
            category: non_empty(p.category.as_deref()),
            subcategory: non_empty(p.subcategory.as_deref()),
            content_type: non_empty(p.content_type.as_deref()),
        };

        let db = self.ctx.db.lock().await;
        match db.search_documents(&p.queries, &filter, top_k) {
            Ok(hits) => text_result(format::search_results(&hits, &p.queries)),
            Err(e) => store_error("search", e),
        }
    }

    // ── Tool 2: get_document ────────────────────────────────────────

    #[tool(description = "Retrieve a complete documentation page by its file path")]
    async fn get_document(
        &self,
        params: Parameters<FilePathParam>,
    ) -> Result<CallToolResult, McpError> {
        let file_path = params.0.file_path.trim().to_string();
        if file_path.is_empty() {
            return error_result("file_path is required");
        }

        let db = self.ctx.db.lock().await;
        match db.get_document(&file_path) {
            Ok(Some(doc)) => text_result(format::document(&doc)),
            Ok(None) => text_result(format::document_not_found(&file_path)),
            Err(e) => store_error("get_document", e),
        }
    }

    // ── Tool 3: search_graphql_elements ─────────────────────────────

    #[tool(description = "Search for GraphQL queries, mutations, types, interfaces or unions")]
    async fn search_graphql_elements(
        &self,
        params: Parameters<SearchElementsParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = match self.top_k(p.top_k) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };
        let kind = match valid_kind(p.element_type.as_deref()) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };

        let db = self.ctx.db.lock().await;
        match db.search_elements(&p.query, kind, top_k) {
            Ok(hits) => text_result(format::element_hits(&hits, p.query.trim())),
            Err(e) => store_error("element search", e),
        }
    }

    // ── Tool 4: get_element_details ─────────────────────────────────

    #[tool(
        description = "Get complete details about a GraphQL element by name. Every element with that name is returned, each with its source document and example code."
    )]
    async fn get_element_details(
        &self,
        params: Parameters<ElementDetailsParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let name = p.element_name.trim();
        if name.is_empty() {
            return error_result("element_name is required");
        }
        let kind = match valid_kind(p.element_type.as_deref()) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };

        let config = &self.ctx.config;
        let db = self.ctx.db.lock().await;
        match db.get_element_details(
            name,
            kind,
            &[config.schema_language.as_str()],
            config.max_examples_per_element,
        ) {
            Ok(details) => text_result(format::element_details(
                &details,
                name,
                config.max_code_preview,
            )),
            Err(e) => store_error("get_element_details", e),
        }
    }

    // ── Tool 5: list_categories ─────────────────────────────────────

    #[tool(description = "List all documentation categories and subcategories with document counts")]
    async fn list_categories(&self) -> Result<CallToolResult, McpError> {
        let db = self.ctx.db.lock().await;
        match db.list_categories() {
            Ok(tree) => text_result(format::categories(&tree)),
            Err(e) => store_error("list_categories", e),
        }
    }

    // ── Tool 6: get_tutorial ────────────────────────────────────────

    #[tool(description = "Get a complete tutorial with all of its steps in order")]
    async fn get_tutorial(
        &self,
        params: Parameters<TutorialParams>,
    ) -> Result<CallToolResult, McpError> {
        let name = params.0.tutorial_name.trim().to_string();
        if name.is_empty() {
            return error_result("tutorial_name is required");
        }

        let config = &self.ctx.config;
        let db = self.ctx.db.lock().await;
        match db.get_tutorial(
            &name,
            &[config.schema_language.as_str(), "json"],
            TUTORIAL_EXAMPLES,
        ) {
            Ok(steps) => text_result(format::tutorial(&name, &steps, config.max_code_preview)),
            Err(e) => store_error("get_tutorial", e),
        }
    }

    // ── Tool 7: search_examples ─────────────────────────────────────

    #[tool(description = "Search code examples by text and optionally by language")]
    async fn search_examples(
        &self,
        params: Parameters<SearchExamplesParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let top_k = match self.top_k(p.top_k) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };

        let db = self.ctx.db.lock().await;
        match db.search_examples(&p.query, non_empty(p.language.as_deref()), top_k) {
            Ok(hits) => text_result(format::examples(
                &hits,
                p.query.trim(),
                self.ctx.config.max_code_preview,
            )),
            Err(e) => store_error("search_examples", e),
        }
    }

    // ── Tool 8: get_related_documents ───────────────────────────────

    #[tool(
        description = "Find documents related to a given document by category and shared keywords"
    )]
    async fn get_related_documents(
        &self,
        params: Parameters<RelatedParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let file_path = p.file_path.trim();
        if file_path.is_empty() {
            return error_result("file_path is required");
        }
        let top_k = match self.top_k(p.top_k) {
            Ok(k) => k,
            Err(msg) => return error_result(&msg),
        };

        let db = self.ctx.db.lock().await;
        match db.get_related_documents(file_path, top_k) {
            Ok(Some(related)) => text_result(format::related(file_path, &related)),
            Ok(None) => text_result(format::document_not_found(file_path)),
            Err(e) => store_error("get_related_documents", e),
        }
    }
}
