//! Sync core for a cloud-backed daily planner.
//!
//! A user records priorities, study sessions, an hour-by-hour schedule,
//! to-dos and free-form notes for a calendar date. This crate owns the
//! client side of keeping that state in sync: an in-memory per-date
//! plan document, a live remote subscription that may echo our own
//! writes back, debounced whole-document writes, a consecutive-day
//! login streak, and an hourly notification check.
//!
//! - [`plan`]: the per-date document model and its normalization.
//! - [`store`]: the remote document store boundary and the in-memory
//!   reference backend.
//! - [`sync`]: the debounced sync engine.
//! - [`streak`]: the consecutive-day login counter.
//! - [`notifications`]: the hourly schedule notification check.
//! - [`suggest`]: the external suggestion-service client.
//! - [`session`]: sign-in/sign-out orchestration.

pub mod notifications;
pub mod plan;
pub mod session;
pub mod store;
pub mod streak;
pub mod suggest;
pub mod sync;
