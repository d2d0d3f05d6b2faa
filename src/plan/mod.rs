//! Plan document model: schema, defaults and normalization.

mod models;

pub use models::{
    schedule_template, PlanDocument, PlanRecord, RawPlanDocument, ScheduleSlot, StreakRecord,
    StudySession, Todo, PRIORITY_COUNT, SCHEDULE_SLOTS,
};
