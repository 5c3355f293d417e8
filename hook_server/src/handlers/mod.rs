//! Per-event handlers. Each takes an authenticated, decoded event.

pub mod pull_request;
