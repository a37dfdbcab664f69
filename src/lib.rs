//! # graphql-docs-mcp: GraphQL documentation index over MCP
//!
//! Indexes a tree of markdown documentation pages (with YAML frontmatter) into
//! SQLite with FTS5 trigram indexes, and answers keyword lookups over the Model
//! Context Protocol.
//!
//! ## Architecture
//!
//! - **[`config`]** - Defaults, JSON file, environment overrides, validation
//! - **[`frontmatter`]** - YAML frontmatter splitting and decoding
//! - **[`indexer`]** - File discovery, markdown parsing, schema element detection, ingestion
//! - **[`db`]** - SQLite store: schema, bulk replace, lookups and keyword search
//! - **[`mcp`]** - MCP server with 8 read-only tools (stdio transport via rmcp)

pub mod config;
pub mod db;
pub mod frontmatter;
pub mod indexer;
pub mod mcp;
