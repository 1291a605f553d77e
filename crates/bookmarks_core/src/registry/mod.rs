//! Registration of entity kinds that can be bookmarked.
//!
//! # Responsibility
//! - Record which subject kinds opted into bookmarking and their type tags.
//! - Hold the statically declared counter fields for each kind.
//!
//! # Invariants
//! - Every identifier interpolated into SQL by the core (tables, columns)
//!   passes identifier validation at registration time.

pub mod subject_registry;
