//! Plan document data models and normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of fixed slots in the daily schedule (6:00 through 23:00, plus 0:00).
pub const SCHEDULE_SLOTS: usize = 19;

/// Number of ranked priorities in a plan.
pub const PRIORITY_COUNT: usize = 3;

/// One hour slot in the fixed daily schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    /// Fixed hour label ("6:00" through "23:00", then "0:00")
    pub time: String,
    /// Free-text task for the hour (empty = unplanned)
    pub task: String,
}

/// A planned study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    /// Unique identifier, assigned at creation and never reused
    pub id: Uuid,
    /// Subject to study
    pub subject: String,
    /// Topic within the subject (may be empty)
    pub topic: String,
    /// Whether the session has been completed
    pub completed: bool,
}

impl StudySession {
    pub fn new(subject: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            topic: topic.into(),
            completed: false,
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Unique identifier, assigned at creation and never reused
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
        }
    }
}

/// The canonical empty schedule: 19 slots covering 6:00 through 23:00
/// and ending with 0:00, in fixed order.
pub fn schedule_template() -> Vec<ScheduleSlot> {
    let mut slots: Vec<ScheduleSlot> = (6..=23)
        .map(|hour| ScheduleSlot {
            time: format!("{}:00", hour),
            task: String::new(),
        })
        .collect();
    slots.push(ScheduleSlot {
        time: "0:00".to_string(),
        task: String::new(),
    });
    slots
}

/// The full set of planning fields for one user on one calendar date.
///
/// Compared by value when deciding whether a subscription delivery
/// actually changed anything, so every field derives `PartialEq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument {
    /// Ranked priorities, always exactly three (empty string = unset)
    pub priorities: [String; PRIORITY_COUNT],
    pub study_sessions: Vec<StudySession>,
    /// Fixed 19-slot hour-by-hour schedule; only `task` fields mutate
    pub schedule: Vec<ScheduleSlot>,
    pub todos: Vec<Todo>,
    /// Free-form notes blob
    pub notes: String,
}

impl Default for PlanDocument {
    fn default() -> Self {
        Self {
            priorities: Default::default(),
            study_sessions: Vec::new(),
            schedule: schedule_template(),
            todos: Vec::new(),
            notes: String::new(),
        }
    }
}

impl PlanDocument {
    /// Convert a possibly partial or absent remote payload into a
    /// well-formed document by applying per-field defaults.
    ///
    /// Deterministic and side-effect-free. A supplied schedule with the
    /// canonical cardinality is trusted as-is (labels are not
    /// re-validated); any other cardinality falls back to the template.
    /// Priorities are padded or truncated to exactly three.
    pub fn normalize(raw: Option<RawPlanDocument>) -> PlanDocument {
        let raw = raw.unwrap_or_default();

        let mut priorities: [String; PRIORITY_COUNT] = Default::default();
        if let Some(values) = raw.priorities {
            for (slot, value) in priorities.iter_mut().zip(values) {
                *slot = value;
            }
        }

        let schedule = match raw.schedule {
            Some(slots) if slots.len() == SCHEDULE_SLOTS => slots,
            _ => schedule_template(),
        };

        PlanDocument {
            priorities,
            study_sessions: raw.study_sessions.unwrap_or_default(),
            schedule,
            todos: raw.todos.unwrap_or_default(),
            notes: raw.notes.unwrap_or_default(),
        }
    }
}

/// Tolerant read shape for a remotely stored plan.
///
/// Every field is optional so any subset survives deserialization;
/// [`PlanDocument::normalize`] supplies the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPlanDocument {
    pub priorities: Option<Vec<String>>,
    pub study_sessions: Option<Vec<StudySession>>,
    pub schedule: Option<Vec<ScheduleSlot>>,
    pub todos: Option<Vec<Todo>>,
    pub notes: Option<String>,
    /// Timestamp of the last successful write (informational only)
    pub last_updated: Option<String>,
}

impl From<PlanDocument> for RawPlanDocument {
    fn from(document: PlanDocument) -> Self {
        Self {
            priorities: Some(document.priorities.to_vec()),
            study_sessions: Some(document.study_sessions),
            schedule: Some(document.schedule),
            todos: Some(document.todos),
            notes: Some(document.notes),
            last_updated: None,
        }
    }
}

/// Wire shape written to the remote store: the five document fields
/// plus the write timestamp, nothing else.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    #[serde(flatten)]
    pub document: PlanDocument,
    pub last_updated: DateTime<Utc>,
}

/// Per-user consecutive-day login counter, independent of any plan date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakRecord {
    pub current_streak: u32,
    /// ISO calendar date of the last counted login, empty if never
    pub last_login: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_template_shape() {
        let template = schedule_template();
        assert_eq!(template.len(), SCHEDULE_SLOTS);
        assert_eq!(template[0].time, "6:00");
        assert_eq!(template[17].time, "23:00");
        assert_eq!(template[18].time, "0:00");
        assert!(template.iter().all(|slot| slot.task.is_empty()));
    }

    #[test]
    fn test_normalize_absent_yields_defaults() {
        let document = PlanDocument::normalize(None);
        assert_eq!(document, PlanDocument::default());
        assert_eq!(document.priorities, ["", "", ""]);
        assert_eq!(document.schedule.len(), SCHEDULE_SLOTS);
        assert!(document.study_sessions.is_empty());
        assert!(document.todos.is_empty());
        assert_eq!(document.notes, "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = RawPlanDocument {
            priorities: Some(vec!["ship".to_string()]),
            todos: Some(vec![Todo::new("buy milk")]),
            notes: Some("remember the thing".to_string()),
            ..Default::default()
        };

        let once = PlanDocument::normalize(Some(raw));
        let twice = PlanDocument::normalize(Some(once.clone().into()));
        assert_eq!(once, twice);

        // NotFound is a fixed point too.
        let empty = PlanDocument::normalize(None);
        assert_eq!(empty, PlanDocument::normalize(Some(empty.clone().into())));
    }

    #[test]
    fn test_normalize_pads_and_truncates_priorities() {
        let short = PlanDocument::normalize(Some(RawPlanDocument {
            priorities: Some(vec!["one".to_string()]),
            ..Default::default()
        }));
        assert_eq!(short.priorities, ["one", "", ""]);

        let long = PlanDocument::normalize(Some(RawPlanDocument {
            priorities: Some(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ]),
            ..Default::default()
        }));
        assert_eq!(long.priorities, ["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_rejects_malformed_schedule_cardinality() {
        let document = PlanDocument::normalize(Some(RawPlanDocument {
            schedule: Some(vec![ScheduleSlot {
                time: "9:00".to_string(),
                task: "standup".to_string(),
            }]),
            ..Default::default()
        }));
        assert_eq!(document.schedule, schedule_template());
    }

    #[test]
    fn test_normalize_trusts_full_length_schedule() {
        let mut supplied = schedule_template();
        supplied[3].task = "deep work".to_string();
        let document = PlanDocument::normalize(Some(RawPlanDocument {
            schedule: Some(supplied.clone()),
            ..Default::default()
        }));
        assert_eq!(document.schedule, supplied);
    }

    #[test]
    fn test_raw_document_accepts_partial_json() {
        let raw: RawPlanDocument =
            serde_json::from_str(r#"{"notes":"just notes","lastUpdated":"2026-03-01T10:00:00Z"}"#)
                .unwrap();
        assert_eq!(raw.notes.as_deref(), Some("just notes"));
        assert!(raw.priorities.is_none());

        let document = PlanDocument::normalize(Some(raw));
        assert_eq!(document.notes, "just notes");
        assert_eq!(document.schedule.len(), SCHEDULE_SLOTS);
    }

    #[test]
    fn test_plan_record_wire_shape() {
        let record = PlanRecord {
            document: PlanDocument::default(),
            last_updated: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["lastUpdated", "notes", "priorities", "schedule", "studySessions", "todos"]
        );
        assert_eq!(object["priorities"].as_array().unwrap().len(), PRIORITY_COUNT);
        assert_eq!(object["schedule"].as_array().unwrap().len(), SCHEDULE_SLOTS);
    }

    #[test]
    fn test_streak_record_wire_names() {
        let record = StreakRecord {
            current_streak: 4,
            last_login: "2026-02-28".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["currentStreak"], 4);
        assert_eq!(value["lastLogin"], "2026-02-28");
    }
}
