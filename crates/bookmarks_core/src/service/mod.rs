//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, registry and counter calls into per-subject APIs.
//! - Keep callers decoupled from SQL details.

pub mod bookmark_service;
pub mod counter_service;
