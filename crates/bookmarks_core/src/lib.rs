//! Bookmark core: lets users bookmark arbitrary registered entities, with
//! optional categories, duplicate prevention and cached counters.
//! This crate is the single source of truth for bookmark invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::bookmark::{normalize_name, Bookmark, BookmarkId, NewBookmark};
pub use model::subject::{Bookmarkable, LoadableSubject, SubjectId, SubjectRef};
pub use model::user::{Actor, User, UserId};
pub use registry::subject_registry::{
    CounterFields, LoadedSubject, RegistryError, SubjectKind, SubjectLoadError, SubjectLoader,
    SubjectRegistry,
};
pub use repo::bookmark_repo::{
    BookmarkFilter, BookmarkStore, BookmarkValidationError, SqliteBookmarkStore, StoreError,
    StoreResult,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepoError, UserRepoResult, UserRepository};
pub use service::bookmark_service::{BookmarkError, BookmarkService, Page, SubjectBookmarks};
pub use service::counter_service::{
    CounterField, CounterMaintainer, CounterMaintenanceFailure, CounterUpdateError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
