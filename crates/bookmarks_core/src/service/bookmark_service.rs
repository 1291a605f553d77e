//! Per-subject bookmark facade.
//!
//! # Responsibility
//! - Resolve actors and subjects, then delegate writes to the record store.
//! - Run counter maintenance after every committed create/delete.
//! - Answer "who bookmarked this subject" with optional pagination.
//!
//! # Invariants
//! - Only registered subject kinds are accepted.
//! - Counter failures are logged and never turn a committed write into an
//!   error.
//! - Validation failures come back as `BookmarkError::Rejected` with the
//!   attempted bookmark attached.

use crate::config::{ConfigError, CoreConfig};
use crate::db::{write_transaction, DbError};
use crate::model::bookmark::{Bookmark, NewBookmark};
use crate::model::subject::{Bookmarkable, LoadableSubject, SubjectRef};
use crate::model::user::{Actor, User, UserId};
use crate::registry::subject_registry::{
    RegistryError, SubjectKind, SubjectLoadError, SubjectRegistry,
};
use crate::repo::bookmark_repo::{
    BookmarkFilter, BookmarkStore, BookmarkValidationError, SqliteBookmarkStore, StoreError,
};
use crate::repo::user_repo::{SqliteUserRepository, UserRepoError, UserRepository};
use crate::service::counter_service::{
    CounterField, CounterMaintainer, CounterMaintenanceFailure,
};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from facade operations.
#[derive(Debug)]
pub enum BookmarkError {
    /// The bookmark attempt failed validation; nothing was written.
    Rejected {
        attempt: NewBookmark,
        reason: BookmarkValidationError,
    },
    /// The subject's kind never opted into bookmarking.
    UnsupportedSubjectKind(String),
    /// The subject could not be loaded as the requested type.
    SubjectLoad(RegistryError),
    Store(StoreError),
    User(UserRepoError),
}

impl BookmarkError {
    /// Validation reason when the attempt was rejected.
    pub fn validation(&self) -> Option<BookmarkValidationError> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl Display for BookmarkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { attempt, reason } => {
                write!(f, "bookmark on {} rejected: {reason}", attempt.subject)
            }
            Self::UnsupportedSubjectKind(tag) => {
                write!(f, "subject kind is not bookmarkable: {tag}")
            }
            Self::SubjectLoad(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::User(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BookmarkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::UnsupportedSubjectKind(_) => None,
            Self::SubjectLoad(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::User(err) => Some(err),
        }
    }
}

impl From<StoreError> for BookmarkError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<UserRepoError> for BookmarkError {
    fn from(value: UserRepoError) -> Self {
        Self::User(value)
    }
}

impl From<SubjectLoadError> for BookmarkError {
    fn from(value: SubjectLoadError) -> Self {
        match value {
            SubjectLoadError::Registry(RegistryError::UnsupportedSubjectKind(tag)) => {
                Self::UnsupportedSubjectKind(tag)
            }
            SubjectLoadError::Registry(err) => Self::SubjectLoad(err),
            SubjectLoadError::Db(err) => Self::from(err),
        }
    }
}

impl From<DbError> for BookmarkError {
    fn from(value: DbError) -> Self {
        Self::Store(StoreError::Db(value))
    }
}

impl From<rusqlite::Error> for BookmarkError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

/// Page request for bookmarker listings. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    /// `None` uses the configured default page size.
    pub size: Option<u32>,
}

impl Page {
    pub fn new(number: u32) -> Self {
        Self { number, size: None }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Returns `(limit, offset)`; page 0 reads as page 1, size 0 as the
    /// default, and oversized pages are clamped to the configured maximum.
    pub fn bounds(&self, config: &CoreConfig) -> (u32, u32) {
        let limit = match self.size {
            None | Some(0) => config.default_page_size,
            Some(size) => size.min(config.max_page_size),
        };
        let offset = self.number.max(1).saturating_sub(1).saturating_mul(limit);
        (limit, offset)
    }
}

/// Entry point bound to one connection and one subject registry.
#[derive(Debug)]
pub struct BookmarkService<'a> {
    conn: &'a Connection,
    registry: &'a SubjectRegistry,
    config: CoreConfig,
}

impl<'a> BookmarkService<'a> {
    pub fn new(conn: &'a Connection, registry: &'a SubjectRegistry) -> Self {
        Self {
            conn,
            registry,
            config: CoreConfig::default(),
        }
    }

    /// Binds a custom config; rejects configs that fail
    /// [`CoreConfig::validate`].
    pub fn with_config(
        conn: &'a Connection,
        registry: &'a SubjectRegistry,
        config: CoreConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            conn,
            registry,
            config,
        })
    }

    /// Returns the bookmark operations for one subject instance.
    pub fn subject(&self, subject: SubjectRef) -> Result<SubjectBookmarks<'_>, BookmarkError> {
        let kind = self
            .registry
            .resolve(&subject.subject_type)
            .map_err(|_| BookmarkError::UnsupportedSubjectKind(subject.subject_type.clone()))?;
        Ok(SubjectBookmarks {
            conn: self.conn,
            registry: self.registry,
            kind,
            config: &self.config,
            subject,
        })
    }

    /// Same as [`Self::subject`] for a typed bookmarkable entity.
    pub fn subject_of<T: Bookmarkable>(
        &self,
        entity: &T,
    ) -> Result<SubjectBookmarks<'_>, BookmarkError> {
        self.subject(entity.subject_ref())
    }

    /// Loads the subject a bookmark points at.
    ///
    /// Returns `Ok(None)` when the subject row no longer exists.
    pub fn load_subject<T: LoadableSubject>(
        &self,
        bookmark: &Bookmark,
    ) -> Result<Option<T>, BookmarkError> {
        Ok(self.registry.load(self.conn, &bookmark.subject)?)
    }

    /// Removes a user together with all of their bookmarks, decrementing
    /// the counters of every affected subject.
    ///
    /// Returns `false` when the user did not exist.
    pub fn remove_user(&self, user_id: UserId) -> Result<bool, BookmarkError> {
        let tx = write_transaction(self.conn)?;
        let removed = SqliteBookmarkStore::new(&tx).delete_for_user(user_id)?;
        let existed = SqliteUserRepository::new(&tx).delete_user(user_id)?;
        tx.commit()?;

        debug!(
            "event=user_remove module=service status=ok user_id={} existed={} bookmarks_removed={}",
            user_id,
            existed,
            removed.len()
        );

        let maintainer = CounterMaintainer::new(self.conn);
        for bookmark in &removed {
            match self.registry.resolve(&bookmark.subject.subject_type) {
                Ok(kind) => {
                    report_counter_failures("user_remove", maintainer.on_deleted(kind, bookmark))
                }
                Err(err) => warn!(
                    "event=counter_maintenance module=service status=skipped op=user_remove subject={} reason={}",
                    bookmark.subject, err
                ),
            }
        }

        Ok(existed)
    }
}

/// Bookmark operations scoped to one subject instance.
#[derive(Debug)]
pub struct SubjectBookmarks<'a> {
    conn: &'a Connection,
    registry: &'a SubjectRegistry,
    kind: &'a SubjectKind,
    config: &'a CoreConfig,
    subject: SubjectRef,
}

impl SubjectBookmarks<'_> {
    pub fn subject(&self) -> &SubjectRef {
        &self.subject
    }

    pub fn kind(&self) -> &SubjectKind {
        self.kind
    }

    /// Loads this subject as `T` through its registered loader.
    pub fn load_subject<T: LoadableSubject>(&self) -> Result<Option<T>, BookmarkError> {
        Ok(self.registry.load(self.conn, &self.subject)?)
    }

    /// Bookmarks this subject for `actor`, optionally under `name`.
    ///
    /// # Errors
    /// - `Rejected { reason: MissingUser }` when `actor` is absent or the
    ///   user does not exist.
    /// - `Rejected { reason: DuplicateBookmark }` when the user already
    ///   bookmarked this subject under the same name.
    pub fn bookmark(
        &self,
        actor: Option<&Actor>,
        name: Option<&str>,
    ) -> Result<Bookmark, BookmarkError> {
        let attempt = NewBookmark::new(actor.map(Actor::user_id), self.subject.clone(), name);

        let bookmark = match self.store().create(&attempt) {
            Ok(bookmark) => bookmark,
            Err(StoreError::Validation(reason)) => {
                debug!(
                    "event=bookmark_create module=service status=rejected subject={} reason={}",
                    self.subject, reason
                );
                return Err(BookmarkError::Rejected { attempt, reason });
            }
            Err(err) => return Err(err.into()),
        };

        debug!(
            "event=bookmark_create module=service status=ok subject={} bookmark_id={}",
            self.subject, bookmark.id
        );
        report_counter_failures(
            "bookmark_create",
            self.maintainer().on_created(self.kind, &bookmark),
        );
        Ok(bookmark)
    }

    /// Removes the bookmark `find_bookmark_by_user` resolves, if any.
    pub fn remove_bookmark_for(
        &self,
        actor: Option<&Actor>,
        name: Option<&str>,
    ) -> Result<bool, BookmarkError> {
        let Some(bookmark) = self.find_bookmark_by_user(actor, name)? else {
            return Ok(false);
        };

        // A concurrent caller may have removed it first; only the deleting
        // call adjusts counters.
        if !self.store().delete(&bookmark)? {
            return Ok(false);
        }

        debug!(
            "event=bookmark_delete module=service status=ok subject={} bookmark_id={}",
            self.subject, bookmark.id
        );
        report_counter_failures(
            "bookmark_delete",
            self.maintainer().on_deleted(self.kind, &bookmark),
        );
        Ok(true)
    }

    /// Returns the actor's first bookmark on this subject, filtered by
    /// `name` when given.
    pub fn find_bookmark_by_user(
        &self,
        actor: Option<&Actor>,
        name: Option<&str>,
    ) -> Result<Option<Bookmark>, BookmarkError> {
        let Some(actor) = actor else {
            return Ok(None);
        };
        let filter = self
            .filter()
            .by_user(actor.user_id())
            .by_name(name)
            .limit(1);
        Ok(self.store().find(&filter)?.into_iter().next())
    }

    /// `false` for absent or unknown actors.
    pub fn is_bookmarked(
        &self,
        actor: Option<&Actor>,
        name: Option<&str>,
    ) -> Result<bool, BookmarkError> {
        Ok(self.find_bookmark_by_user(actor, name)?.is_some())
    }

    /// Distinct users that bookmarked this subject, in first-bookmarked
    /// order. Without a page every matching user is returned.
    pub fn find_users_that_bookmarked(
        &self,
        name: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<User>, BookmarkError> {
        let mut filter = self.filter().by_name(name);
        if let Some(page) = page {
            let (limit, offset) = page.bounds(self.config);
            filter = filter.limit(limit).offset(offset);
        }
        Ok(SqliteUserRepository::new(self.conn).find_bookmarkers(&filter)?)
    }

    /// All bookmarks on this subject in insertion order.
    pub fn bookmarks(&self) -> Result<Vec<Bookmark>, BookmarkError> {
        Ok(self.store().find(&self.filter())?)
    }

    /// Live bookmark count, optionally for one category.
    pub fn count(&self, name: Option<&str>) -> Result<u64, BookmarkError> {
        Ok(self.store().count(&self.filter().by_name(name))?)
    }

    /// Cached counter value; `None` when the kind does not declare it.
    pub fn counter(&self, field: CounterField<'_>) -> Result<Option<i64>, BookmarkError> {
        Ok(self
            .maintainer()
            .read_counter(self.kind, &self.subject, field)?)
    }

    /// Rebuilds the declared counters from live rows.
    pub fn recompute_counters(&self) -> Result<usize, BookmarkError> {
        Ok(self.maintainer().recompute(self.kind, &self.subject)?)
    }

    /// Destroys the subject row and every bookmark on it.
    ///
    /// Returns the number of bookmarks removed.
    pub fn destroy(&self) -> Result<usize, BookmarkError> {
        let tx = write_transaction(self.conn)?;
        let removed = SqliteBookmarkStore::new(&tx).delete_for_subject(&self.subject)?;
        tx.execute(
            &format!(
                "DELETE FROM {table} WHERE {id_column} = ?1;",
                table = self.kind.table,
                id_column = self.kind.id_column
            ),
            [self.subject.subject_id],
        )?;
        tx.commit()?;

        debug!(
            "event=subject_destroy module=service status=ok subject={} bookmarks_removed={}",
            self.subject,
            removed.len()
        );
        Ok(removed.len())
    }

    fn store(&self) -> SqliteBookmarkStore<'_> {
        SqliteBookmarkStore::new(self.conn)
    }

    fn maintainer(&self) -> CounterMaintainer<'_> {
        CounterMaintainer::new(self.conn)
    }

    fn filter(&self) -> BookmarkFilter {
        BookmarkFilter::default().for_subject(&self.subject)
    }
}

fn report_counter_failures(op: &str, failures: Vec<CounterMaintenanceFailure>) {
    for failure in failures {
        error!(
            "event=counter_maintenance module=service status=error op={} subject={} column={} error={}",
            op, failure.subject, failure.column, failure.source
        );
    }
}
