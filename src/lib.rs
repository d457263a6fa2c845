//! Parapet - Request Abuse & Integrity Protection
//!
//! This crate implements the protection layer that sits between an HTTP
//! transport and its request handlers: per-caller rate limiting of sensitive
//! operations (fixed-window counting over a local or Redis-backed counter
//! store) and CSRF double-submit token verification. Transport adapters
//! extract the request facts into a [`guard::RequestContext`] and ask the
//! [`guard::Guard`] whether the handler may run.

pub mod config;
pub mod csrf;
pub mod error;
pub mod guard;
pub mod identity;
pub mod ratelimit;
