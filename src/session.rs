//! Authenticated session orchestration.
//!
//! The identity boundary hands this module an opaque user id on sign-in
//! and nothing on sign-out. Signing in runs the streak check once,
//! starts the sync engine on the requested planning date, and creates
//! the notification scheduler disabled until permission is granted.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use uuid::Uuid;

use crate::notifications::{start_notification_scheduler, NotificationScheduler, Notifier};
use crate::plan::PlanDocument;
use crate::store::RemoteStore;
use crate::streak;
use crate::sync::{SyncEngine, SyncState};

/// Default planning date for a fresh session: tomorrow.
pub fn default_plan_date(today: NaiveDate) -> NaiveDate {
    today.succ_opt().unwrap_or(today)
}

/// One authenticated user's live session.
pub struct Session {
    user_id: String,
    streak: u32,
    engine: SyncEngine,
    notifications: NotificationScheduler,
    notifier: Arc<dyn Notifier>,
    permission: Option<bool>,
}

impl Session {
    /// Sign a user in: count the login streak, then start syncing the
    /// given planning date.
    pub async fn start(
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        user_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let user_id = user_id.into();

        // Streak failures never block the session; the counter just
        // shows zero until the next sign-in.
        let today = Local::now().date_naive();
        let streak = match streak::check_streak(store.as_ref(), &user_id, today).await {
            Ok(value) => value,
            Err(e) => {
                log::error!("session: streak check for {} failed: {}", user_id, e);
                0
            }
        };

        let engine = SyncEngine::start(Arc::clone(&store), user_id.clone(), date);
        let notifications =
            start_notification_scheduler(engine.schedule_source(), Arc::clone(&notifier));

        log::info!(
            "session: user {} signed in ({} day streak)",
            user_id,
            streak
        );

        Self {
            user_id,
            streak,
            engine,
            notifications,
            notifier,
            permission: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Streak computed at sign-in.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Snapshot of the currently displayed plan.
    pub fn document(&self) -> PlanDocument {
        self.engine.document()
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    pub fn is_saving(&self) -> bool {
        self.engine.is_saving()
    }

    /// Mutation API for the displayed plan.
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Switch the displayed planning date.
    pub fn set_date(&self, date: NaiveDate) {
        self.engine.set_date(date);
    }

    /// Add an accepted suggestion as a to-do item.
    pub fn accept_suggestion(&self, text: &str) {
        self.engine.add_todo(text);
    }

    pub fn delete_todo(&self, id: Uuid) {
        self.engine.delete_todo(id);
    }

    /// Ask for notification permission (at most once per session) and
    /// enable the hourly check if granted.
    pub fn enable_notifications(&mut self) -> bool {
        if self.permission.is_none() {
            self.permission = Some(self.notifier.request_permission());
        }
        let granted = self.permission == Some(true);
        if granted {
            self.notifications.set_enabled(true);
        } else {
            log::warn!("session: notification permission denied, feature stays off");
        }
        granted
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.is_enabled()
    }

    /// Sign out: stop syncing (flushing any pending edit) and stop the
    /// notification check.
    pub fn sign_out(self) {
        log::info!("session: user {} signing out", self.user_id);
        self.engine.stop();
        self.notifications.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingNotifier {
        grant: bool,
        requests: AtomicUsize,
    }

    impl CountingNotifier {
        fn new(grant: bool) -> Self {
            Self {
                grant,
                requests: AtomicUsize::new(0),
            }
        }
    }

    impl Notifier for CountingNotifier {
        fn request_permission(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.grant
        }

        fn notify(&self, _: &str, _: &str) {}
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_default_plan_date_is_tomorrow() {
        assert_eq!(
            default_plan_date(date("2026-02-28")),
            date("2026-03-01")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_start_counts_streak_and_goes_live() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CountingNotifier::new(true));
        let session =
            Session::start(store.clone(), notifier, "u1", date("2026-03-01")).await;

        assert_eq!(session.streak(), 1);
        assert_eq!(store.streak_write_count(), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.sync_state(), SyncState::Live);
        assert_eq!(session.document(), PlanDocument::default());

        session.sign_out();
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_is_requested_once() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CountingNotifier::new(true));
        let mut session = Session::start(
            store,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            "u1",
            date("2026-03-01"),
        )
        .await;

        assert!(!session.notifications_enabled());
        assert!(session.enable_notifications());
        assert!(session.notifications_enabled());
        assert!(session.enable_notifications());
        assert_eq!(notifier.requests.load(Ordering::SeqCst), 1);

        session.sign_out();
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_keeps_notifications_off() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CountingNotifier::new(false));
        let mut session = Session::start(
            store,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            "u1",
            date("2026-03-01"),
        )
        .await;

        assert!(!session.enable_notifications());
        assert!(!session.notifications_enabled());
        assert_eq!(notifier.requests.load(Ordering::SeqCst), 1);

        session.sign_out();
    }
}
