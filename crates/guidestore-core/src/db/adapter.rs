// Document store adapter trait — the abstraction every storage backend implements.
//
// The adapter works with `serde_json::Value` documents to stay schema-agnostic;
// the typed repository layer in the application crate converts between records
// and `Value`. Writes are atomic per document; there is deliberately no
// cross-document transaction surface.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, StoreError>;

// ─── Where Clause ────────────────────────────────────────────────

/// Comparison operators for WHERE clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Value is in the given list.
    In,
    /// String contains substring.
    Contains,
    /// String starts with prefix.
    StartsWith,
    /// String ends with suffix.
    EndsWith,
}

/// A single WHERE condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhereClause {
    /// The field name to filter on.
    pub field: String,
    /// The comparison value.
    pub value: serde_json::Value,
    /// The comparison operator (default: Eq).
    #[serde(default)]
    pub operator: Operator,
    /// Connector to the next clause. None means this is the last/only clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

/// Logical connector between WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

impl WhereClause {
    /// Simple equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator: Operator::Eq,
            connector: None,
        }
    }

    /// Membership filter (`field IN values`).
    pub fn is_in(field: impl Into<String>, values: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: values.into(),
            operator: Operator::In,
            connector: None,
        }
    }

    /// Add an AND connector.
    pub fn and(mut self) -> Self {
        self.connector = Some(Connector::And);
        self
    }

    /// Add an OR connector.
    pub fn or(mut self) -> Self {
        self.connector = Some(Connector::Or);
        self
    }
}

// ─── Sort / Pagination ───────────────────────────────────────────

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification (field + direction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }
}

/// Query parameters for `find_many`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindManyQuery {
    pub where_clauses: Vec<WhereClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
}

// ─── Adapter Trait ───────────────────────────────────────────────

/// The document store adapter trait.
///
/// Backends (memory, hosted document database) implement this trait; all
/// application queries go through it.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Create a new document in the given collection.
    /// Returns the created document (with an auto-generated `id` if absent).
    async fn create(
        &self,
        collection: &str,
        data: serde_json::Value,
    ) -> AdapterResult<serde_json::Value>;

    /// Find a single document matching the WHERE clauses.
    async fn find_one(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>>;

    /// Find multiple documents matching the query parameters.
    async fn find_many(
        &self,
        collection: &str,
        query: FindManyQuery,
    ) -> AdapterResult<Vec<serde_json::Value>>;

    /// Count documents matching the WHERE clauses.
    async fn count(&self, collection: &str, where_clauses: &[WhereClause])
        -> AdapterResult<i64>;

    /// Merge fields into a single document matching the WHERE clauses.
    /// Returns the updated document, or `None` if no match was found.
    async fn update(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>>;

    /// Merge fields into every document matching the WHERE clauses.
    /// Returns the number of affected documents.
    async fn update_many(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<i64>;

    /// Delete a single document matching the WHERE clauses.
    async fn delete(&self, collection: &str, where_clauses: &[WhereClause]) -> AdapterResult<()>;

    /// Delete every document matching the WHERE clauses.
    /// Returns the number of deleted documents.
    async fn delete_many(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<i64>;
}
