//! Complaint escalation engine.
//!
//! Periodically walks every open complaint, decides whether it has sat too
//! long at its current authority level, and moves it up one level, exactly
//! once, recording the transition for downstream readers.

pub mod authority;
pub mod candidate;
pub mod clock;
pub mod complaint;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod event;
pub mod executor;
pub mod notification;
pub mod outcome;
pub mod reminder;
pub mod rule;
pub mod store;
pub mod types;
