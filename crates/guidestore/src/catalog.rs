//! Guide catalog — a static in-code list merged with the `guides` collection.
//!
//! The static list is the baseline; documents override it field by field
//! (keyed by id), and documents with unknown ids are appended as
//! admin-created guides.

use std::sync::Arc;

use guidestore_core::db::adapter::{Adapter, FindManyQuery};
use guidestore_core::db::records::{collections, from_document, to_document};
use guidestore_core::error::Result;
use guidestore_core::Guide;

/// The built-in guide lineup shipped with the storefront.
pub fn static_guides() -> Vec<Guide> {
    vec![
        Guide {
            id: "sleep-optimization".into(),
            title: "Sleep Optimization".into(),
            slug: "sleep-optimization".into(),
            price: 1_900,
            category: "recovery".into(),
            features: vec![
                "14-day reset protocol".into(),
                "Light and caffeine timing charts".into(),
                "Printable sleep diary".into(),
            ],
            coming_soon: false,
        },
        Guide {
            id: "stress-resilience".into(),
            title: "Stress Resilience".into(),
            slug: "stress-resilience".into(),
            price: 1_900,
            category: "mind".into(),
            features: vec![
                "Breathing drill library".into(),
                "Daily downshift routine".into(),
            ],
            coming_soon: false,
        },
        Guide {
            id: "gut-health-reset".into(),
            title: "Gut Health Reset".into(),
            slug: "gut-health-reset".into(),
            price: 2_400,
            category: "nutrition".into(),
            features: vec![
                "4-week elimination plan".into(),
                "Reintroduction tracker".into(),
                "Grocery templates".into(),
            ],
            coming_soon: false,
        },
        Guide {
            id: "morning-metabolism".into(),
            title: "Morning Metabolism".into(),
            slug: "morning-metabolism".into(),
            price: 1_400,
            category: "nutrition".into(),
            features: vec!["10-minute routines".into()],
            coming_soon: false,
        },
        Guide {
            id: "deep-focus".into(),
            title: "Deep Focus".into(),
            slug: "deep-focus".into(),
            price: 1_900,
            category: "mind".into(),
            features: vec!["Attention audit worksheet".into()],
            coming_soon: true,
        },
    ]
}

/// Read-through catalog over the static list and the `guides` collection.
#[derive(Debug, Clone)]
pub struct Catalog {
    adapter: Arc<dyn Adapter>,
}

impl Catalog {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }

    /// List the effective catalog: static guides with document overrides
    /// applied, plus admin-created guides not in the static list.
    pub async fn list(&self) -> Result<Vec<Guide>> {
        let docs = self
            .adapter
            .find_many(collections::GUIDES, FindManyQuery::default())
            .await?;

        let mut guides = static_guides();

        for doc in docs {
            let doc_id = doc.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            match guides.iter_mut().find(|g| g.id == doc_id) {
                Some(existing) => {
                    let mut merged = to_document(existing)?;
                    if let (Some(base), Some(overlay)) = (merged.as_object_mut(), doc.as_object()) {
                        for (k, v) in overlay {
                            if !v.is_null() {
                                base.insert(k.clone(), v.clone());
                            }
                        }
                    }
                    *existing = from_document(merged)?;
                }
                None => {
                    if let Ok(guide) = from_document::<Guide>(doc) {
                        guides.push(guide);
                    }
                }
            }
        }

        Ok(guides)
    }

    /// Look up a guide by slug.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Guide>> {
        Ok(self.list().await?.into_iter().find(|g| g.slug == slug))
    }

    /// Look up a guide by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Guide>> {
        Ok(self.list().await?.into_iter().find(|g| g.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidestore_memory::MemoryAdapter;

    fn catalog() -> (Catalog, Arc<MemoryAdapter>) {
        let adapter = Arc::new(MemoryAdapter::new());
        (Catalog::new(adapter.clone()), adapter)
    }

    #[tokio::test]
    async fn lists_static_guides_without_documents() {
        let (catalog, _) = catalog();
        let guides = catalog.list().await.unwrap();
        assert!(guides.iter().any(|g| g.slug == "sleep-optimization"));
        assert!(guides.iter().any(|g| g.coming_soon));
    }

    #[tokio::test]
    async fn document_fields_override_static_defaults() {
        let (catalog, adapter) = catalog();
        adapter
            .create(
                collections::GUIDES,
                serde_json::json!({"id": "sleep-optimization", "price": 2_900}),
            )
            .await
            .unwrap();

        let guide = catalog
            .find_by_slug("sleep-optimization")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guide.price, 2_900);
        // Fields absent from the document keep their static values.
        assert_eq!(guide.title, "Sleep Optimization");
        assert!(!guide.features.is_empty());
    }

    #[tokio::test]
    async fn null_document_fields_do_not_override() {
        let (catalog, adapter) = catalog();
        adapter
            .create(
                collections::GUIDES,
                serde_json::json!({"id": "stress-resilience", "title": null, "price": 999}),
            )
            .await
            .unwrap();

        let guide = catalog
            .find_by_id("stress-resilience")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guide.title, "Stress Resilience");
        assert_eq!(guide.price, 999);
    }

    #[tokio::test]
    async fn unknown_document_ids_are_appended() {
        let (catalog, adapter) = catalog();
        adapter
            .create(
                collections::GUIDES,
                serde_json::json!({
                    "id": "cold-exposure",
                    "title": "Cold Exposure",
                    "slug": "cold-exposure",
                    "price": 1_500,
                    "category": "recovery",
                }),
            )
            .await
            .unwrap();

        let guide = catalog.find_by_slug("cold-exposure").await.unwrap();
        assert!(guide.is_some());
    }

    #[tokio::test]
    async fn find_by_slug_missing() {
        let (catalog, _) = catalog();
        assert!(catalog.find_by_slug("nope").await.unwrap().is_none());
    }
}
