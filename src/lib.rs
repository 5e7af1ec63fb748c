//! Webrate - fixed-window HTTP request rate limiting
//!
//! This crate decides, per incoming HTTP request, whether the request is
//! admitted or rejected based on a per-key quota over a fixed time window.
//! Requests are grouped by a pluggable key policy and counted in an injected
//! counter store, which owns all window state.

pub mod config;
pub mod error;
pub mod ratelimit;
