//! Structured self-reflection journal for the terminal.
//!
//! The reusable core lives here: form validation and sanitization, the
//! monthly calendar/statistics transform and the session refresh poller.
//! `main.rs` wires them into a ratatui front end.

pub mod app;
pub mod calendar;
pub mod config;
pub mod context;
pub mod export;
pub mod journal;
pub mod models;
pub mod session;
pub mod store;
pub mod ui;
pub mod validation;
