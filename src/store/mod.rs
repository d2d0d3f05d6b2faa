//! Remote document store boundary.
//!
//! The durable copy of each plan lives in a per-user, per-date document
//! addressed by a hierarchical key path. [`RemoteStore`] abstracts the
//! backend down to "read once", "subscribe to live changes" and "write
//! whole document", plus the per-user streak record. [`MemoryStore`] is
//! the in-memory reference backend with live, self-echoing
//! subscriptions.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::plan::{PlanDocument, RawPlanDocument, StreakRecord};

/// Fixed namespace segment of every document path.
pub const NAMESPACE: &str = "artifacts";

/// Fixed application identifier segment of every document path.
pub const APP_ID: &str = "productivity-app-v1";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write rejected: {0}")]
    WriteRejected(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Document path for one user's plan on one calendar date.
pub fn plan_path(user_id: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/users/{}/plans/{}",
        NAMESPACE,
        APP_ID,
        user_id,
        date.format("%Y-%m-%d")
    )
}

/// Document path for one user's streak record.
pub fn streak_path(user_id: &str) -> String {
    format!("{}/{}/users/{}/stats/streak", NAMESPACE, APP_ID, user_id)
}

/// One delivery from a plan subscription: the raw stored document, or
/// `None` when no document exists at the key.
pub type PlanSnapshot = Option<RawPlanDocument>;

/// Live subscription to one plan document.
///
/// Deliveries arrive in per-key FIFO order, starting with an initial
/// snapshot sent before `subscribe_plan` returns, and include changes
/// caused by this client's own writes (self-echo). Dropping the handle
/// unsubscribes.
pub struct PlanSubscription {
    receiver: mpsc::UnboundedReceiver<PlanSnapshot>,
}

impl PlanSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<PlanSnapshot>) -> Self {
        Self { receiver }
    }

    /// Wait for the next delivery. Returns `None` once the backend has
    /// closed the subscription.
    pub async fn next(&mut self) -> Option<PlanSnapshot> {
        self.receiver.recv().await
    }
}

/// Backend holding the durable copy of each user's planning data.
///
/// Failures are reported to the caller, never swallowed; callers log
/// and keep the session editable rather than crashing.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the plan document at (user, date) once.
    async fn read_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<PlanSnapshot, StoreError>;

    /// Open a live subscription to the plan document at (user, date).
    async fn subscribe_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<PlanSubscription, StoreError>;

    /// Replace the whole plan document at (user, date), stamping
    /// `lastUpdated`. Never a partial merge.
    async fn write_plan(
        &self,
        user_id: &str,
        date: NaiveDate,
        document: &PlanDocument,
    ) -> Result<(), StoreError>;

    /// Read the user's streak record, if one exists.
    async fn read_streak(&self, user_id: &str) -> Result<Option<StreakRecord>, StoreError>;

    /// Replace the user's streak record.
    async fn write_streak(&self, user_id: &str, record: &StreakRecord)
        -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_paths() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(
            plan_path("abc123", date),
            "artifacts/productivity-app-v1/users/abc123/plans/2026-03-01"
        );
        assert_eq!(
            streak_path("abc123"),
            "artifacts/productivity-app-v1/users/abc123/stats/streak"
        );
    }
}
