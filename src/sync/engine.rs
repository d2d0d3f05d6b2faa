//! Sync engine.
//!
//! Owns the in-memory [`PlanDocument`] for one (user, date) pair at a
//! time, drives the subscribe-on-date-change lifecycle against the
//! remote store, and debounces outbound writes so bursts of local edits
//! coalesce into one whole-document write instead of a write per
//! keystroke.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::plan::{PlanDocument, StudySession, Todo, PRIORITY_COUNT, SCHEDULE_SLOTS};
use crate::store::{PlanSnapshot, PlanSubscription, RemoteStore};

/// Quiet period after the last local edit before a write is issued.
const DEBOUNCE: Duration = Duration::from_millis(1000);

/// Minimum time the saving indicator stays visible after a write.
const SAVING_LINGER: Duration = Duration::from_millis(500);

/// Sleep used by the select loop when no write is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Subscription lifecycle state for the current (user, date) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No subscription is active.
    Unsubscribed,
    /// Subscribed, waiting for the first delivery; writes are held back
    /// so loading-gap defaults never clobber a real remote document.
    Loading,
    /// First delivery applied; local edits flow back to the store.
    Live,
}

#[derive(Debug)]
enum EngineMessage {
    /// A field of the in-memory document changed
    Edited,
    /// Switch to a different calendar date
    SetDate(NaiveDate),
    /// End the session
    Stop,
}

struct EngineShared {
    document: Mutex<PlanDocument>,
    state: Mutex<SyncState>,
    saving: AtomicBool,
    saving_epoch: AtomicU64,
}

/// Handle to a running sync engine.
///
/// Mutation methods update the shared in-memory document immediately
/// and signal the background loop, which marks the document dirty and
/// (re)starts the debounce timer. The engine task is spawned on the
/// current tokio runtime by [`SyncEngine::start`].
pub struct SyncEngine {
    sender: mpsc::Sender<EngineMessage>,
    shared: Arc<EngineShared>,
}

impl SyncEngine {
    /// Start the engine for an authenticated user on the given date.
    pub fn start(
        store: Arc<dyn RemoteStore>,
        user_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let shared = Arc::new(EngineShared {
            document: Mutex::new(PlanDocument::default()),
            state: Mutex::new(SyncState::Unsubscribed),
            saving: AtomicBool::new(false),
            saving_epoch: AtomicU64::new(0),
        });

        let loop_shared = Arc::clone(&shared);
        let user_id = user_id.into();
        tokio::spawn(async move {
            engine_loop(store, user_id, date, loop_shared, rx).await;
        });

        Self { sender: tx, shared }
    }

    /// Snapshot of the current in-memory document.
    pub fn document(&self) -> PlanDocument {
        self.shared.document.lock().unwrap().clone()
    }

    pub fn state(&self) -> SyncState {
        *self.shared.state.lock().unwrap()
    }

    /// Whether a write is in flight or within its linger window.
    /// Observability only; it never gates edits or writes.
    pub fn is_saving(&self) -> bool {
        self.shared.saving.load(Ordering::SeqCst)
    }

    /// Accessor for the live schedule, for the notification scheduler.
    pub fn schedule_source(&self) -> crate::notifications::ScheduleSource {
        let shared = Arc::clone(&self.shared);
        Arc::new(move || shared.document.lock().unwrap().schedule.clone())
    }

    /// Switch the engine to another calendar date. A pending unsaved
    /// edit is written to the date it was made under first.
    pub fn set_date(&self, date: NaiveDate) {
        let _ = self.sender.try_send(EngineMessage::SetDate(date));
    }

    /// Stop the engine, flushing any pending edit.
    pub fn stop(&self) {
        let _ = self.sender.try_send(EngineMessage::Stop);
    }

    fn edit(&self, mutate: impl FnOnce(&mut PlanDocument) -> bool) {
        let changed = mutate(&mut *self.shared.document.lock().unwrap());
        if changed {
            let _ = self.sender.try_send(EngineMessage::Edited);
        }
    }

    /// Set the priority at `rank` (0-based). Out-of-range ranks are
    /// ignored.
    pub fn set_priority(&self, rank: usize, text: &str) {
        if rank >= PRIORITY_COUNT {
            return;
        }
        self.edit(|document| {
            document.priorities[rank] = text.to_string();
            true
        });
    }

    /// Set the task text of the schedule slot at `index`.
    pub fn set_schedule_slot(&self, index: usize, task: &str) {
        if index >= SCHEDULE_SLOTS {
            return;
        }
        self.edit(|document| match document.schedule.get_mut(index) {
            Some(slot) => {
                slot.task = task.to_string();
                true
            }
            None => false,
        });
    }

    pub fn set_notes(&self, text: &str) {
        self.edit(|document| {
            document.notes = text.to_string();
            true
        });
    }

    /// Add a study session. Blank subjects are ignored.
    pub fn add_study_session(&self, subject: &str, topic: &str) {
        if subject.trim().is_empty() {
            return;
        }
        let session = StudySession::new(subject, topic);
        self.edit(move |document| {
            document.study_sessions.push(session);
            true
        });
    }

    pub fn toggle_study_session(&self, id: Uuid) {
        self.edit(|document| {
            match document.study_sessions.iter_mut().find(|s| s.id == id) {
                Some(session) => {
                    session.completed = !session.completed;
                    true
                }
                None => false,
            }
        });
    }

    pub fn delete_study_session(&self, id: Uuid) {
        self.edit(|document| {
            let before = document.study_sessions.len();
            document.study_sessions.retain(|s| s.id != id);
            document.study_sessions.len() != before
        });
    }

    /// Add a to-do item. Blank text is ignored.
    pub fn add_todo(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let todo = Todo::new(text);
        self.edit(move |document| {
            document.todos.push(todo);
            true
        });
    }

    pub fn toggle_todo(&self, id: Uuid) {
        self.edit(|document| match document.todos.iter_mut().find(|t| t.id == id) {
            Some(todo) => {
                todo.completed = !todo.completed;
                true
            }
            None => false,
        });
    }

    pub fn delete_todo(&self, id: Uuid) {
        self.edit(|document| {
            let before = document.todos.len();
            document.todos.retain(|t| t.id != id);
            document.todos.len() != before
        });
    }
}

/// Main engine loop: one select over the live subscription, the control
/// channel and the debounce deadline. All document reconciliation
/// happens here, on a single logical thread.
async fn engine_loop(
    store: Arc<dyn RemoteStore>,
    user_id: String,
    mut date: NaiveDate,
    shared: Arc<EngineShared>,
    mut receiver: mpsc::Receiver<EngineMessage>,
) {
    log::info!("sync engine: starting for user {} on {}", user_id, date);

    let mut subscription = open_subscription(store.as_ref(), &user_id, date, &shared).await;
    let mut ready = false;
    let mut dirty = false;
    let mut deadline: Option<Instant> = None;

    loop {
        let flush_at = deadline.unwrap_or_else(|| Instant::now() + IDLE_WAIT);

        tokio::select! {
            delivery = next_delivery(&mut subscription) => {
                match delivery {
                    Some(snapshot) => {
                        apply_snapshot(
                            snapshot, &shared, date, &mut ready, &mut dirty, &mut deadline,
                        );
                    }
                    None => {
                        log::warn!("sync engine: subscription for {} closed by backend", date);
                        subscription = None;
                    }
                }
            }

            message = receiver.recv() => {
                match message {
                    Some(EngineMessage::Edited) => {
                        dirty = true;
                        deadline = Some(Instant::now() + DEBOUNCE);
                    }
                    Some(EngineMessage::SetDate(new_date)) => {
                        if new_date == date {
                            continue;
                        }
                        // A pending edit is written to the date it was
                        // made under, never to the new one.
                        if dirty && ready {
                            flush(store.as_ref(), &user_id, date, &shared).await;
                        }
                        dirty = false;
                        deadline = None;
                        ready = false;

                        // Drop the old subscription before opening the
                        // new one so a stale delivery cannot touch the
                        // new date's state.
                        subscription = None;
                        date = new_date;
                        subscription =
                            open_subscription(store.as_ref(), &user_id, date, &shared).await;
                    }
                    Some(EngineMessage::Stop) | None => {
                        if dirty && ready {
                            flush(store.as_ref(), &user_id, date, &shared).await;
                        }
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(flush_at), if deadline.is_some() => {
                deadline = None;
                if ready && dirty {
                    dirty = false;
                    flush(store.as_ref(), &user_id, date, &shared).await;
                }
            }
        }
    }

    *shared.state.lock().unwrap() = SyncState::Unsubscribed;
    log::info!("sync engine: stopped for user {}", user_id);
}

async fn open_subscription(
    store: &dyn RemoteStore,
    user_id: &str,
    date: NaiveDate,
    shared: &Arc<EngineShared>,
) -> Option<PlanSubscription> {
    *shared.state.lock().unwrap() = SyncState::Loading;
    match store.subscribe_plan(user_id, date).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            log::error!("sync engine: subscribe for {} failed: {}", date, e);
            None
        }
    }
}

async fn next_delivery(subscription: &mut Option<PlanSubscription>) -> Option<PlanSnapshot> {
    match subscription {
        Some(active) => active.next().await,
        None => std::future::pending().await,
    }
}

/// Apply one subscription delivery to the in-memory document.
///
/// The first delivery replaces the document wholesale and opens the
/// write gate. Later deliveries are compared by value: a snapshot
/// identical to the in-memory state (typically the echo of our own
/// write) changes nothing, while a differing one replaces the document
/// wholesale, clearing the dirty flag and the pending debounce. Last
/// write wins.
fn apply_snapshot(
    snapshot: PlanSnapshot,
    shared: &EngineShared,
    date: NaiveDate,
    ready: &mut bool,
    dirty: &mut bool,
    deadline: &mut Option<Instant>,
) {
    let incoming = PlanDocument::normalize(snapshot);
    let mut document = shared.document.lock().unwrap();

    if !*ready {
        *document = incoming;
        *ready = true;
        *dirty = false;
        *deadline = None;
        *shared.state.lock().unwrap() = SyncState::Live;
        log::info!("sync engine: document for {} loaded", date);
    } else if *document != incoming {
        if *dirty {
            log::warn!(
                "sync engine: remote update for {} overrides an unsaved local edit",
                date
            );
        }
        *document = incoming;
        *dirty = false;
        *deadline = None;
    }
}

/// Issue one whole-document write for the current in-memory state.
async fn flush(store: &dyn RemoteStore, user_id: &str, date: NaiveDate, shared: &Arc<EngineShared>) {
    let document = shared.document.lock().unwrap().clone();

    let epoch = shared.saving_epoch.fetch_add(1, Ordering::SeqCst) + 1;
    shared.saving.store(true, Ordering::SeqCst);

    match store.write_plan(user_id, date, &document).await {
        Ok(()) => log::debug!("sync engine: wrote plan for {}", date),
        Err(e) => {
            // No retry is scheduled; the next edit's debounce cycle is
            // the implicit retry path.
            log::error!("sync engine: write for {} failed: {}", date, e);
        }
    }

    // Keep the indicator visible briefly so quick saves register. The
    // epoch guard stops an old linger from clearing a newer write's
    // indicator.
    let linger_shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::time::sleep(SAVING_LINGER).await;
        if linger_shared.saving_epoch.load(Ordering::SeqCst) == epoch {
            linger_shared.saving.store(false, Ordering::SeqCst);
        }
    });
}
