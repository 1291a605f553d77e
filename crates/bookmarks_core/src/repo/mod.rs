//! Repository layer over SQLite.
//!
//! # Responsibility
//! - Keep SQL inside the persistence boundary.
//! - Return semantic validation errors alongside transport errors.
//!
//! # Invariants
//! - Store writes rely on schema constraints for uniqueness and user
//!   presence.

pub mod bookmark_repo;
pub mod user_repo;
