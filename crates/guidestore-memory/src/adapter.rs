// In-memory document store — HashMap-based collections implementing the
// core Adapter trait.
//
// Stores documents in `HashMap<String, Vec<serde_json::Value>>` keyed by
// collection name. Thread-safe via `tokio::sync::RwLock`. Updates are
// field merges, matching the per-document atomic write semantics of the
// hosted document database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use guidestore_core::db::adapter::{
    Adapter, AdapterResult, Connector, FindManyQuery, Operator, SortDirection, WhereClause,
};
use guidestore_core::utils::id::generate_id;

/// Type alias for the in-memory store.
type Store = HashMap<String, Vec<serde_json::Value>>;

/// In-memory document store adapter.
///
/// All data lives in a `HashMap` wrapped in an `Arc<RwLock<...>>` for
/// thread-safe concurrent access. Data is lost when the adapter is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<RwLock<Store>>,
}

impl MemoryAdapter {
    /// Create a new empty in-memory adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all data (for debugging/testing).
    pub async fn snapshot(&self) -> Store {
        self.store.read().await.clone()
    }

    /// Clear all data.
    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    /// Document count for a specific collection.
    pub async fn collection_count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

/// Check if a document matches a set of WHERE clauses.
fn matches_where(doc: &serde_json::Value, clauses: &[WhereClause]) -> bool {
    if clauses.is_empty() {
        return true;
    }

    let mut result = true;
    let mut pending_or = false;

    for clause in clauses {
        let field_val = doc
            .get(&clause.field)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let clause_match = match_operator(&field_val, &clause.value, &clause.operator);

        if pending_or {
            result = result || clause_match;
        } else {
            result = result && clause_match;
        }

        pending_or = matches!(clause.connector, Some(Connector::Or));
    }

    result
}

/// Match a single operator condition.
fn match_operator(field_val: &serde_json::Value, target: &serde_json::Value, op: &Operator) -> bool {
    match op {
        Operator::Eq => field_val == target,
        Operator::Ne => field_val != target,
        Operator::Lt => compare_json(field_val, target).is_some_and(|c| c < 0),
        Operator::Lte => compare_json(field_val, target).is_some_and(|c| c <= 0),
        Operator::Gt => compare_json(field_val, target).is_some_and(|c| c > 0),
        Operator::Gte => compare_json(field_val, target).is_some_and(|c| c >= 0),
        Operator::In => {
            if let serde_json::Value::Array(arr) = target {
                arr.contains(field_val)
            } else {
                false
            }
        }
        Operator::Contains => {
            let fs = field_val.as_str().unwrap_or("");
            let ts = target.as_str().unwrap_or("");
            fs.contains(ts)
        }
        Operator::StartsWith => {
            let fs = field_val.as_str().unwrap_or("");
            let ts = target.as_str().unwrap_or("");
            fs.starts_with(ts)
        }
        Operator::EndsWith => {
            let fs = field_val.as_str().unwrap_or("");
            let ts = target.as_str().unwrap_or("");
            fs.ends_with(ts)
        }
    }
}

/// Compare two JSON values numerically or lexicographically.
fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Option<i8> {
    match (a, b) {
        (serde_json::Value::Number(an), serde_json::Value::Number(bn)) => {
            let af = an.as_f64()?;
            let bf = bn.as_f64()?;
            af.partial_cmp(&bf).map(|o| match o {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            })
        }
        (serde_json::Value::String(a_s), serde_json::Value::String(b_s)) => Some(match a_s.cmp(b_s) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        _ => None,
    }
}

/// Apply sorting to documents.
fn sort_documents(docs: &mut [serde_json::Value], query: &FindManyQuery) {
    if let Some(ref sort) = query.sort_by {
        docs.sort_by(|a, b| {
            let av = a.get(&sort.field);
            let bv = b.get(&sort.field);
            let cmp = match (av, bv) {
                (Some(av), Some(bv)) => compare_json(av, bv).unwrap_or(0),
                (Some(_), None) => 1,
                (None, Some(_)) => -1,
                (None, None) => 0,
            };
            match sort.direction {
                SortDirection::Asc => cmp.cmp(&0),
                SortDirection::Desc => cmp.cmp(&0).reverse(),
            }
        });
    }
}

/// Apply field selection to a document.
fn select_fields(doc: &serde_json::Value, select: &Option<Vec<String>>) -> serde_json::Value {
    match select {
        Some(fields) if !fields.is_empty() => {
            let obj = doc.as_object().cloned().unwrap_or_default();
            let filtered: serde_json::Map<String, serde_json::Value> = obj
                .into_iter()
                .filter(|(k, _)| fields.contains(k))
                .collect();
            serde_json::Value::Object(filtered)
        }
        _ => doc.clone(),
    }
}

/// Merge update fields into an existing document.
fn merge_update(doc: &mut serde_json::Value, data: &serde_json::Value) {
    if let (Some(doc_obj), Some(data_obj)) = (doc.as_object_mut(), data.as_object()) {
        for (k, v) in data_obj {
            doc_obj.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn create(
        &self,
        collection: &str,
        data: serde_json::Value,
    ) -> AdapterResult<serde_json::Value> {
        let mut doc = data;

        if doc.get("id").is_none() || doc.get("id") == Some(&serde_json::Value::Null) {
            if let Some(obj) = doc.as_object_mut() {
                obj.insert("id".to_string(), serde_json::Value::String(generate_id()));
            }
        }

        let mut store = self.store.write().await;
        store
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());

        Ok(doc)
    }

    async fn find_one(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>> {
        let store = self.store.read().await;
        Ok(store
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches_where(d, where_clauses)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        query: FindManyQuery,
    ) -> AdapterResult<Vec<serde_json::Value>> {
        let store = self.store.read().await;
        let empty = Vec::new();
        let docs = store.get(collection).unwrap_or(&empty);

        let mut result: Vec<serde_json::Value> = docs
            .iter()
            .filter(|d| matches_where(d, &query.where_clauses))
            .cloned()
            .collect();

        sort_documents(&mut result, &query);

        if let Some(offset) = query.offset {
            if (offset as usize) < result.len() {
                result = result.split_off(offset as usize);
            } else {
                result.clear();
            }
        }

        if let Some(limit) = query.limit {
            result.truncate(limit as usize);
        }

        Ok(result
            .iter()
            .map(|d| select_fields(d, &query.select))
            .collect())
    }

    async fn count(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<i64> {
        let store = self.store.read().await;
        let empty = Vec::new();
        let docs = store.get(collection).unwrap_or(&empty);
        Ok(docs.iter().filter(|d| matches_where(d, where_clauses)).count() as i64)
    }

    async fn update(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>> {
        let mut store = self.store.write().await;
        if let Some(docs) = store.get_mut(collection) {
            if let Some(doc) = docs.iter_mut().find(|d| matches_where(d, where_clauses)) {
                merge_update(doc, &data);
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn update_many(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<i64> {
        let mut store = self.store.write().await;
        let mut count = 0i64;
        if let Some(docs) = store.get_mut(collection) {
            for doc in docs.iter_mut() {
                if matches_where(doc, where_clauses) {
                    merge_update(doc, &data);
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn delete(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<()> {
        let mut store = self.store.write().await;
        if let Some(docs) = store.get_mut(collection) {
            if let Some(pos) = docs.iter().position(|d| matches_where(d, where_clauses)) {
                docs.remove(pos);
            }
        }
        Ok(())
    }

    async fn delete_many(
        &self,
        collection: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<i64> {
        let mut store = self.store.write().await;
        if let Some(docs) = store.get_mut(collection) {
            let before = docs.len();
            docs.retain(|d| !matches_where(d, where_clauses));
            Ok((before - docs.len()) as i64)
        } else {
            Ok(0)
        }
    }
}
