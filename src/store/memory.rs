//! In-memory reference backend with live subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::plan::{PlanDocument, PlanRecord, RawPlanDocument, StreakRecord};

use super::{plan_path, streak_path, PlanSnapshot, PlanSubscription, RemoteStore, StoreError};

/// In-memory document store with live, self-echoing subscriptions.
///
/// Documents are held as JSON values under the same hierarchical paths
/// a remote backend would use. Every whole-document write re-delivers
/// the new snapshot to all watchers of that key, including the writer;
/// deliveries are per-key FIFO.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    plan_writes: AtomicUsize,
    streak_writes: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Value>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<PlanSnapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of whole-plan writes accepted so far.
    pub fn plan_write_count(&self) -> usize {
        self.plan_writes.load(Ordering::Relaxed)
    }

    /// Number of streak writes accepted so far.
    pub fn streak_write_count(&self) -> usize {
        self.streak_writes.load(Ordering::Relaxed)
    }

    /// Raw stored JSON for a plan key, if any.
    pub fn stored_plan(&self, user_id: &str, date: NaiveDate) -> Option<Value> {
        self.inner
            .lock()
            .unwrap()
            .documents
            .get(&plan_path(user_id, date))
            .cloned()
    }

    fn snapshot_at(documents: &HashMap<String, Value>, path: &str) -> PlanSnapshot {
        documents.get(path).map(parse_raw)
    }
}

/// Decode a stored value into the tolerant read shape. Malformed data
/// degrades to an empty raw document; normalization supplies defaults.
fn parse_raw(value: &Value) -> RawPlanDocument {
    match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("memory store: malformed stored plan ({}), using defaults", e);
            RawPlanDocument::default()
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<PlanSnapshot, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::snapshot_at(&inner.documents, &plan_path(user_id, date)))
    }

    async fn subscribe_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<PlanSubscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let path = plan_path(user_id, date);

        // Initial snapshot is delivered before the handle is returned.
        let initial = Self::snapshot_at(&inner.documents, &path);
        let _ = tx.send(initial);
        inner.watchers.entry(path).or_default().push(tx);

        Ok(PlanSubscription::new(rx))
    }

    async fn write_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
        document: &PlanDocument,
    ) -> Result<(), StoreError> {
        let record = PlanRecord {
            document: document.clone(),
            last_updated: Utc::now(),
        };
        let value = serde_json::to_value(&record)?;

        let mut inner = self.inner.lock().unwrap();
        let path = plan_path(user_id, date);
        inner.documents.insert(path.clone(), value);
        self.plan_writes.fetch_add(1, Ordering::Relaxed);

        let snapshot = Self::snapshot_at(&inner.documents, &path);
        if let Some(watchers) = inner.watchers.get_mut(&path) {
            // Dead watchers (dropped subscriptions) are pruned here.
            watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
        Ok(())
    }

    async fn read_streak(&self, user_id: &str) -> Result<Option<StreakRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .documents
            .get(&streak_path(user_id))
            .and_then(|value| match serde_json::from_value(value.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::debug!(
                        "memory store: malformed streak record ({}), treating as absent",
                        e
                    );
                    None
                }
            }))
    }

    async fn write_streak(
        &self,
        user_id: &str,
        record: &StreakRecord,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.inner
            .lock()
            .unwrap()
            .documents
            .insert(streak_path(user_id), value);
        self.streak_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_subscription_gets_initial_snapshot_immediately() {
        let store = MemoryStore::new();

        let mut before = store.subscribe_plan("u1", date()).await.unwrap();
        assert_eq!(before.next().await, Some(None));

        let mut document = PlanDocument::default();
        document.notes = "hello".to_string();
        store.write_plan("u1", date(), &document).await.unwrap();

        let mut after = store.subscribe_plan("u1", date()).await.unwrap();
        let snapshot = after.next().await.unwrap().unwrap();
        assert_eq!(snapshot.notes.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_writes_echo_to_existing_subscribers_in_order() {
        let store = MemoryStore::new();
        let mut subscription = store.subscribe_plan("u1", date()).await.unwrap();
        assert_eq!(subscription.next().await, Some(None));

        let mut document = PlanDocument::default();
        document.notes = "first".to_string();
        store.write_plan("u1", date(), &document).await.unwrap();
        document.notes = "second".to_string();
        store.write_plan("u1", date(), &document).await.unwrap();

        let first = subscription.next().await.unwrap().unwrap();
        let second = subscription.next().await.unwrap().unwrap();
        assert_eq!(first.notes.as_deref(), Some("first"));
        assert_eq!(second.notes.as_deref(), Some("second"));
        assert_eq!(store.plan_write_count(), 2);
    }

    #[tokio::test]
    async fn test_writes_are_keyed_per_date() {
        let store = MemoryStore::new();
        let other_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut subscription = store.subscribe_plan("u1", other_date).await.unwrap();
        assert_eq!(subscription.next().await, Some(None));

        store
            .write_plan("u1", date(), &PlanDocument::default())
            .await
            .unwrap();
        assert!(store.stored_plan("u1", other_date).is_none());
    }

    #[tokio::test]
    async fn test_write_payload_is_five_fields_plus_timestamp() {
        let store = MemoryStore::new();
        store
            .write_plan("u1", date(), &PlanDocument::default())
            .await
            .unwrap();

        let stored = store.stored_plan("u1", date()).unwrap();
        let object = stored.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["lastUpdated", "notes", "priorities", "schedule", "studySessions", "todos"]
        );

        let stamp = object["lastUpdated"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_stored_plan_degrades_to_defaults() {
        let store = MemoryStore::new();
        store
            .inner
            .lock()
            .unwrap()
            .documents
            .insert(plan_path("u1", date()), serde_json::json!({"schedule": 42}));

        let snapshot = store.read_plan("u1", date()).await.unwrap().unwrap();
        assert_eq!(snapshot, RawPlanDocument::default());
    }

    #[tokio::test]
    async fn test_streak_round_trip() {
        let store = MemoryStore::new();
        assert!(store.read_streak("u1").await.unwrap().is_none());

        let record = StreakRecord {
            current_streak: 3,
            last_login: "2026-02-28".to_string(),
        };
        store.write_streak("u1", &record).await.unwrap();
        assert_eq!(store.read_streak("u1").await.unwrap(), Some(record));
        assert_eq!(store.streak_write_count(), 1);
    }
}
