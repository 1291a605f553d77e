//! Bookmark record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist and remove individual bookmark rows.
//! - Provide composable filters over the `bookmarks` table.
//! - Translate schema constraint failures into validation errors.
//!
//! # Invariants
//! - `create` never pre-checks uniqueness; the unique index decides, so two
//!   racing creators get exactly one row.
//! - Results are ordered by insertion (`id ASC`) unless `newest_first` is set.
//! - Stored names are normalized, so `''` is never persisted as a name.

use crate::db::{constraint_violation, write_transaction, ConstraintKind, DbError};
use crate::model::bookmark::{normalize_name, Bookmark, BookmarkId, NewBookmark};
use crate::model::subject::SubjectRef;
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BOOKMARK_COLUMNS: &str = "id, user_id, subject_type, subject_id, name, created_at, updated_at";

pub type StoreResult<T> = Result<T, StoreError>;

/// Recoverable reasons a bookmark write was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkValidationError {
    /// No actor was given, or the user id does not exist.
    MissingUser,
    /// The user already bookmarked this subject under this name.
    DuplicateBookmark,
}

impl Display for BookmarkValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUser => write!(f, "user is required"),
            Self::DuplicateBookmark => write!(f, "user has already bookmarked"),
        }
    }
}

impl Error for BookmarkValidationError {}

/// Store error for bookmark persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(BookmarkValidationError),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<BookmarkValidationError> for StoreError {
    fn from(value: BookmarkValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match constraint_violation(&value) {
            Some(ConstraintKind::Unique) => {
                Self::Validation(BookmarkValidationError::DuplicateBookmark)
            }
            Some(ConstraintKind::ForeignKey) | Some(ConstraintKind::NotNull) => {
                Self::Validation(BookmarkValidationError::MissingUser)
            }
            None => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Composable predicate set over the `bookmarks` table.
///
/// Unset predicates match everything, so `BookmarkFilter::default()` selects
/// every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkFilter {
    pub subject: Option<SubjectRef>,
    pub user_id: Option<UserId>,
    pub name: Option<String>,
    pub newest_first: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl BookmarkFilter {
    pub fn for_subject(mut self, subject: &SubjectRef) -> Self {
        self.subject = Some(subject.clone());
        self
    }

    /// Restricts to one category; `None` (or a blank name) matches all names.
    pub fn by_name(mut self, name: Option<&str>) -> Self {
        self.name = normalize_name(name);
        self
    }

    pub fn by_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Renders the predicates as ` AND ...` fragments against `alias`.
    pub(crate) fn predicates(&self, alias: &str) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut values = Vec::new();

        if let Some(subject) = self.subject.as_ref() {
            sql.push_str(&format!(
                " AND {alias}.subject_type = ? AND {alias}.subject_id = ?"
            ));
            values.push(Value::Text(subject.subject_type.clone()));
            values.push(Value::Integer(subject.subject_id));
        }
        if let Some(user_id) = self.user_id {
            sql.push_str(&format!(" AND {alias}.user_id = ?"));
            values.push(Value::Integer(user_id));
        }
        if let Some(name) = self.name.as_ref() {
            sql.push_str(&format!(" AND {alias}.name = ?"));
            values.push(Value::Text(name.clone()));
        }

        (sql, values)
    }
}

/// Appends `LIMIT`/`OFFSET` clauses shared by store and user queries.
pub(crate) fn push_pagination(
    sql: &mut String,
    values: &mut Vec<Value>,
    limit: Option<u32>,
    offset: u32,
) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        values.push(Value::Integer(i64::from(offset)));
    }
}

/// Store interface for bookmark rows.
pub trait BookmarkStore {
    /// Inserts one bookmark; rejects absent users and duplicates.
    fn create(&self, draft: &NewBookmark) -> StoreResult<Bookmark>;
    /// Deletes one bookmark; `false` when it was already gone.
    fn delete(&self, bookmark: &Bookmark) -> StoreResult<bool>;
    fn get(&self, id: BookmarkId) -> StoreResult<Option<Bookmark>>;
    fn find(&self, filter: &BookmarkFilter) -> StoreResult<Vec<Bookmark>>;
    fn count(&self, filter: &BookmarkFilter) -> StoreResult<u64>;
    /// Deletes every bookmark on a subject and returns the removed rows.
    fn delete_for_subject(&self, subject: &SubjectRef) -> StoreResult<Vec<Bookmark>>;
    /// Deletes every bookmark owned by a user and returns the removed rows.
    fn delete_for_user(&self, user_id: UserId) -> StoreResult<Vec<Bookmark>>;
}

/// SQLite-backed bookmark store.
pub struct SqliteBookmarkStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookmarkStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn delete_returning(&self, predicate: &str, values: Vec<Value>) -> StoreResult<Vec<Bookmark>> {
        let mut stmt = self.conn.prepare(&format!(
            "DELETE FROM bookmarks WHERE {predicate} RETURNING {BOOKMARK_COLUMNS};"
        ))?;
        let mut removed = stmt
            .query_map(params_from_iter(values), parse_bookmark_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        // RETURNING order is unspecified.
        removed.sort_by_key(|bookmark| bookmark.id);
        Ok(removed)
    }
}

impl BookmarkStore for SqliteBookmarkStore<'_> {
    fn create(&self, draft: &NewBookmark) -> StoreResult<Bookmark> {
        let user_id = draft
            .user_id
            .ok_or(BookmarkValidationError::MissingUser)?;
        // Drafts built by hand may carry '' which would alias the unnamed
        // sentinel in the unique index.
        let name = normalize_name(draft.name.as_deref());

        let tx = write_transaction(self.conn)?;
        let bookmark = tx.query_row(
            &format!(
                "INSERT INTO bookmarks (user_id, subject_type, subject_id, name)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING {BOOKMARK_COLUMNS};"
            ),
            params![
                user_id,
                draft.subject.subject_type.as_str(),
                draft.subject.subject_id,
                name.as_deref(),
            ],
            parse_bookmark_row,
        )?;
        tx.commit()?;

        Ok(bookmark)
    }

    fn delete(&self, bookmark: &Bookmark) -> StoreResult<bool> {
        let tx = write_transaction(self.conn)?;
        let changed = tx.execute("DELETE FROM bookmarks WHERE id = ?1;", [bookmark.id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn get(&self, id: BookmarkId) -> StoreResult<Option<Bookmark>> {
        let bookmark = self
            .conn
            .query_row(
                &format!("SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE id = ?1;"),
                [id],
                parse_bookmark_row,
            )
            .optional()?;
        Ok(bookmark)
    }

    fn find(&self, filter: &BookmarkFilter) -> StoreResult<Vec<Bookmark>> {
        let (predicates, mut values) = filter.predicates("b");
        let mut sql = format!("SELECT {BOOKMARK_COLUMNS} FROM bookmarks b WHERE 1 = 1{predicates}");
        sql.push_str(if filter.newest_first {
            " ORDER BY b.id DESC"
        } else {
            " ORDER BY b.id ASC"
        });
        push_pagination(&mut sql, &mut values, filter.limit, filter.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let bookmarks = stmt
            .query_map(params_from_iter(values), parse_bookmark_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookmarks)
    }

    fn count(&self, filter: &BookmarkFilter) -> StoreResult<u64> {
        let (predicates, values) = filter.predicates("b");
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM bookmarks b WHERE 1 = 1{predicates}"),
            params_from_iter(values),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn delete_for_subject(&self, subject: &SubjectRef) -> StoreResult<Vec<Bookmark>> {
        self.delete_returning(
            "subject_type = ? AND subject_id = ?",
            vec![
                Value::Text(subject.subject_type.clone()),
                Value::Integer(subject.subject_id),
            ],
        )
    }

    fn delete_for_user(&self, user_id: UserId) -> StoreResult<Vec<Bookmark>> {
        self.delete_returning("user_id = ?", vec![Value::Integer(user_id)])
    }
}

fn parse_bookmark_row(row: &Row<'_>) -> rusqlite::Result<Bookmark> {
    Ok(Bookmark {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        subject: SubjectRef::new(
            row.get::<_, String>("subject_type")?,
            row.get("subject_id")?,
        ),
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
