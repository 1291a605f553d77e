//! Domain model for bookmarks, their owners and their subjects.
//!
//! # Responsibility
//! - Define the records the store persists and the facade returns.
//! - Define the tagged subject reference used for polymorphic binding.
//!
//! # Invariants
//! - A subject is always addressed by `(type tag, id)`, never by a dynamic
//!   object reference.
//! - Category names are normalized before they reach storage.

pub mod bookmark;
pub mod subject;
pub mod user;
