// src/repo.rs
//! Persistence collaborator: search records, scraped items, saved items,
//! and user lookup, behind a trait. The relational engine lives elsewhere;
//! this crate ships the contract plus an in-memory implementation used by
//! the default binary and the tests. Repository failures never gate a
//! response upstream.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRecord {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub category: String,
    pub keyword: String,
    pub language: String,
    pub ocr_enabled: bool,
    pub result_count: usize,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSearch {
    pub platform: String,
    pub category: String,
    pub keyword: String,
    pub language: String,
    pub ocr_enabled: bool,
    pub result_count: usize,
}

/// Immutable projection of one campaign record tied to a search.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedItem {
    pub id: String,
    pub search_id: String,
    pub user_id: String,
    pub title: String,
    pub platform: String,
    pub category: String,
    pub url: String,
    pub raised: String,
    pub goal: String,
    pub backers: String,
    pub start_date: String,
    pub end_date: String,
    pub is_relevant: bool,
    /// Serialized full display document, audit copy.
    pub original_data: String,
}

/// User bookmark; at most one per scraped item.
#[derive(Debug, Clone, Serialize)]
pub struct SavedItem {
    pub id: String,
    pub user_id: String,
    pub scraped_item_id: String,
    pub title: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SearchRepository: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRef>>;

    async fn create_search(&self, user_id: &str, search: &NewSearch) -> Result<SearchRecord>;

    /// Bulk-insert the display documents for one search; returns the stored
    /// count.
    async fn store_items(&self, user_id: &str, search_id: &str, items: &[Value]) -> Result<usize>;

    async fn search_history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchRecord>>;

    async fn items_for_search(&self, user_id: &str, search_id: &str) -> Result<Vec<ScrapedItem>>;

    /// Bookmark a scraped item. Returns `None` when already saved (the
    /// at-most-once rule) or when the item does not belong to the user.
    async fn save_item(&self, user_id: &str, scraped_item_id: &str) -> Result<Option<SavedItem>>;
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRef>,
    searches: Vec<SearchRecord>,
    items: Vec<ScrapedItem>,
    saved: HashMap<String, SavedItem>, // keyed by scraped_item_id
}

/// In-memory repository backing the default binary and the tests.
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed a user so searches can reference it.
    pub fn with_user(self, id: &str, email: &str, name: &str) -> Self {
        {
            let mut t = self.tables.lock().expect("repo lock");
            t.users.insert(
                id.to_string(),
                UserRef {
                    id: id.to_string(),
                    email: email.to_string(),
                    name: name.to_string(),
                },
            );
        }
        self
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn doc_str(doc: &Value, key: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl SearchRepository for InMemoryRepository {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRef>> {
        let t = self.tables.lock().expect("repo lock");
        Ok(t.users.get(user_id).cloned())
    }

    async fn create_search(&self, user_id: &str, search: &NewSearch) -> Result<SearchRecord> {
        let record = SearchRecord {
            id: self.next_id("search"),
            user_id: user_id.to_string(),
            platform: search.platform.clone(),
            category: search.category.clone(),
            keyword: search.keyword.clone(),
            language: search.language.clone(),
            ocr_enabled: search.ocr_enabled,
            result_count: search.result_count,
            status: "completed".to_string(),
            created_at: Utc::now(),
        };
        let mut t = self.tables.lock().expect("repo lock");
        t.searches.push(record.clone());
        Ok(record)
    }

    async fn store_items(&self, user_id: &str, search_id: &str, items: &[Value]) -> Result<usize> {
        let mut t = self.tables.lock().expect("repo lock");
        for doc in items {
            let item = ScrapedItem {
                id: self.next_id("item"),
                search_id: search_id.to_string(),
                user_id: user_id.to_string(),
                title: doc_str(doc, "title"),
                platform: doc_str(doc, "platform"),
                category: doc_str(doc, "category"),
                url: doc_str(doc, "url"),
                raised: doc_str(doc, "amount"),
                goal: doc_str(doc, "support_amount"),
                backers: doc_str(doc, "supporters"),
                start_date: doc_str(doc, "crowdfund_start_date"),
                end_date: doc_str(doc, "crowdfund_end_date"),
                is_relevant: doc
                    .get("is_relevant")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                original_data: doc.to_string(),
            };
            t.items.push(item);
        }
        Ok(items.len())
    }

    async fn search_history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let t = self.tables.lock().expect("repo lock");
        let mut out: Vec<SearchRecord> = t
            .searches
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.reverse(); // newest first
        out.truncate(limit);
        Ok(out)
    }

    async fn items_for_search(&self, user_id: &str, search_id: &str) -> Result<Vec<ScrapedItem>> {
        let t = self.tables.lock().expect("repo lock");
        Ok(t.items
            .iter()
            .filter(|i| i.user_id == user_id && i.search_id == search_id)
            .cloned()
            .collect())
    }

    async fn save_item(&self, user_id: &str, scraped_item_id: &str) -> Result<Option<SavedItem>> {
        let mut t = self.tables.lock().expect("repo lock");
        let Some(item) = t
            .items
            .iter()
            .find(|i| i.id == scraped_item_id && i.user_id == user_id)
            .cloned()
        else {
            return Ok(None);
        };
        if t.saved.contains_key(scraped_item_id) {
            return Ok(None);
        }
        let saved = SavedItem {
            id: self.next_id("saved"),
            user_id: user_id.to_string(),
            scraped_item_id: scraped_item_id.to_string(),
            title: item.title,
            platform: item.platform,
            created_at: Utc::now(),
        };
        t.saved.insert(scraped_item_id.to_string(), saved.clone());
        Ok(Some(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_search() -> NewSearch {
        NewSearch {
            platform: "kickstarter".into(),
            category: "tech".into(),
            keyword: "speaker".into(),
            language: "en".into(),
            ocr_enabled: false,
            result_count: 2,
        }
    }

    #[tokio::test]
    async fn search_and_items_roundtrip() {
        let repo = InMemoryRepository::new().with_user("u1", "u1@example.com", "User One");
        assert!(repo.find_user("u1").await.unwrap().is_some());
        assert!(repo.find_user("nope").await.unwrap().is_none());

        let search = repo.create_search("u1", &new_search()).await.unwrap();
        let items = vec![
            json!({"title": "A", "url": "https://k/p/a", "platform": "Kickstarter", "amount": "$1,000"}),
            json!({"title": "B", "url": "https://k/p/b", "platform": "Kickstarter"}),
        ];
        let count = repo.store_items("u1", &search.id, &items).await.unwrap();
        assert_eq!(count, 2);

        let stored = repo.items_for_search("u1", &search.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].raised, "$1,000");
        assert!(stored[0].is_relevant);

        let history = repo.search_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "completed");
    }

    #[tokio::test]
    async fn saving_is_at_most_once_per_item() {
        let repo = InMemoryRepository::new().with_user("u1", "u1@example.com", "User One");
        let search = repo.create_search("u1", &new_search()).await.unwrap();
        repo.store_items("u1", &search.id, &[json!({"title": "A", "url": "https://k/p/a"})])
            .await
            .unwrap();
        let item_id = repo.items_for_search("u1", &search.id).await.unwrap()[0]
            .id
            .clone();

        let first = repo.save_item("u1", &item_id).await.unwrap();
        assert!(first.is_some());
        let second = repo.save_item("u1", &item_id).await.unwrap();
        assert!(second.is_none(), "bookmark must be at most once per item");
        let missing = repo.save_item("u1", "item-999").await.unwrap();
        assert!(missing.is_none());
    }
}
