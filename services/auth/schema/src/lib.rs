//! Relational entities owned (or read) by the auth service.

pub mod accounts;
pub mod active_sessions;
pub mod login_attempts;
pub mod one_time_codes;
pub mod outbox_events;
