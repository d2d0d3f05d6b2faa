//! Hourly schedule notifications.
//!
//! A single recurring timer inspects the in-memory schedule once a
//! minute and posts a local notification when the wall clock crosses an
//! hour boundary with a non-empty slot. The check reads live state
//! through an injected accessor each tick, so it always sees the
//! schedule of whatever date is currently displayed. That date may not
//! be today.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::sync::mpsc;

use crate::plan::ScheduleSlot;

/// Period of the notification check timer.
const CHECK_PERIOD: Duration = Duration::from_secs(60);

/// Platform boundary for local notifications.
pub trait Notifier: Send + Sync {
    /// Ask the platform for permission to post notifications.
    fn request_permission(&self) -> bool;

    /// Post one local notification.
    fn notify(&self, title: &str, body: &str);
}

/// Accessor returning the schedule currently displayed.
pub type ScheduleSource = Arc<dyn Fn() -> Vec<ScheduleSlot> + Send + Sync>;

/// Handle for the running notification check loop.
pub struct NotificationScheduler {
    shutdown_tx: mpsc::Sender<()>,
    enabled: Arc<AtomicBool>,
}

impl NotificationScheduler {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turn the hourly check on or off. Stays off until permission has
    /// been granted (the session handles the permission request).
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stop the check loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// Start the notification check loop.
///
/// Each tick reads the current schedule through `schedule_source` and
/// the current enabled flag, so later edits and date switches are
/// always observed. The check fires only when the tick lands on minute
/// zero; a process started mid-minute can therefore skip an hour's
/// notification entirely.
pub fn start_notification_scheduler(
    schedule_source: ScheduleSource,
    notifier: Arc<dyn Notifier>,
) -> NotificationScheduler {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let enabled = Arc::new(AtomicBool::new(false));
    let loop_enabled = Arc::clone(&enabled);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHECK_PERIOD);
        // One check per period even after a stall; a burst of catch-up
        // ticks would double-post within the same minute.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so checks
        // start one period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !loop_enabled.load(Ordering::SeqCst) {
                        continue;
                    }
                    let now = Local::now();
                    if let Some(slot) = due_slot(&schedule_source(), now.hour(), now.minute()) {
                        log::info!("notifications: firing for slot {}", slot.time);
                        notifier.notify(&format!("Planner: {}", slot.time), &slot.task);
                    }
                }
                _ = shutdown_rx.recv() => {
                    log::info!("notifications: shutting down");
                    break;
                }
            }
        }
    });

    NotificationScheduler {
        shutdown_tx,
        enabled,
    }
}

/// The schedule slot due for notification at the given wall-clock time.
///
/// Fires only on minute zero and only for a slot whose task is
/// non-blank. Hour labels are unpadded, so hour 0 matches the "0:00"
/// slot with no special case.
pub fn due_slot(schedule: &[ScheduleSlot], hour: u32, minute: u32) -> Option<ScheduleSlot> {
    if minute != 0 {
        return None;
    }
    let label = format!("{}:00", hour);
    schedule
        .iter()
        .find(|slot| slot.time == label)
        .filter(|slot| !slot.task.trim().is_empty())
        .cloned()
}
