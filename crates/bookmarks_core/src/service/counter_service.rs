//! Counter cache maintenance for bookmarked subjects.
//!
//! # Responsibility
//! - Adjust the total and per-category counters a subject kind declares,
//!   after a bookmark row was created or deleted.
//! - Rebuild declared counters from live rows on demand.
//!
//! # Invariants
//! - Only columns declared in the registered `CounterFields` are touched.
//! - Undeclared counters are skipped silently.
//! - Each counter update is independent; one failing column never prevents
//!   the others from being applied.

use crate::db::{write_transaction, DbError, DbResult};
use crate::model::bookmark::Bookmark;
use crate::model::subject::SubjectRef;
use crate::registry::subject_registry::SubjectKind;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why one counter column was not updated.
#[derive(Debug)]
pub enum CounterUpdateError {
    /// No row in the kind's table has the subject's id.
    SubjectMissing,
    Db(DbError),
}

impl Display for CounterUpdateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubjectMissing => write!(f, "subject row not found"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CounterUpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubjectMissing => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for CounterUpdateError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CounterUpdateError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

/// A counter update that could not be applied. The bookmark write that
/// triggered it stays committed.
#[derive(Debug)]
pub struct CounterMaintenanceFailure {
    pub subject: SubjectRef,
    pub column: String,
    pub source: CounterUpdateError,
}

impl Display for CounterMaintenanceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "counter `{}` on {} was not updated: {}",
            self.column, self.subject, self.source
        )
    }
}

impl Error for CounterMaintenanceFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Selects one declared counter of a subject kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField<'a> {
    Total,
    Named(&'a str),
}

pub struct CounterMaintainer<'conn> {
    conn: &'conn Connection,
}

impl<'conn> CounterMaintainer<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Increments counters for a committed bookmark.
    pub fn on_created(
        &self,
        kind: &SubjectKind,
        bookmark: &Bookmark,
    ) -> Vec<CounterMaintenanceFailure> {
        self.apply(kind, bookmark, 1)
    }

    /// Decrements counters for a deleted bookmark.
    ///
    /// The total counter is always decremented; the category counter only
    /// when the kind declares one for `bookmark.name`.
    pub fn on_deleted(
        &self,
        kind: &SubjectKind,
        bookmark: &Bookmark,
    ) -> Vec<CounterMaintenanceFailure> {
        self.apply(kind, bookmark, -1)
    }

    /// Reads a cached counter value.
    ///
    /// Returns `None` when the kind does not declare the counter or the
    /// subject row does not exist.
    pub fn read_counter(
        &self,
        kind: &SubjectKind,
        subject: &SubjectRef,
        field: CounterField<'_>,
    ) -> DbResult<Option<i64>> {
        let Some(column) = declared_column(kind, field) else {
            return Ok(None);
        };
        let value = self
            .conn
            .query_row(
                &format!(
                    "SELECT {column} FROM {table} WHERE {id_column} = ?1;",
                    table = kind.table,
                    id_column = kind.id_column
                ),
                [subject.subject_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    /// Rewrites every declared counter of `subject` from the live bookmark
    /// rows. Returns the number of counter columns written.
    pub fn recompute(&self, kind: &SubjectKind, subject: &SubjectRef) -> DbResult<usize> {
        let tx = write_transaction(self.conn)?;
        let mut written = 0;
        if let Some(column) = kind.counters.total.as_deref() {
            tx.execute(
                &format!(
                    "UPDATE {table}
                     SET {column} = (
                        SELECT COUNT(*) FROM bookmarks
                        WHERE subject_type = ?1 AND subject_id = ?2
                     )
                     WHERE {id_column} = ?2;",
                    table = kind.table,
                    id_column = kind.id_column
                ),
                params![subject.subject_type.as_str(), subject.subject_id],
            )?;
            written += 1;
        }
        for (name, column) in &kind.counters.named {
            tx.execute(
                &format!(
                    "UPDATE {table}
                     SET {column} = (
                        SELECT COUNT(*) FROM bookmarks
                        WHERE subject_type = ?1 AND subject_id = ?2 AND name = ?3
                     )
                     WHERE {id_column} = ?2;",
                    table = kind.table,
                    id_column = kind.id_column
                ),
                params![
                    subject.subject_type.as_str(),
                    subject.subject_id,
                    name.as_str()
                ],
            )?;
            written += 1;
        }
        tx.commit()?;
        Ok(written)
    }

    fn apply(
        &self,
        kind: &SubjectKind,
        bookmark: &Bookmark,
        delta: i64,
    ) -> Vec<CounterMaintenanceFailure> {
        let columns = kind
            .counters
            .total
            .as_deref()
            .into_iter()
            .chain(kind.counters.named_column(bookmark.name.as_deref()));

        let mut failures = Vec::new();
        for column in columns {
            if let Err(err) = self.adjust(kind, &bookmark.subject, column, delta) {
                failures.push(CounterMaintenanceFailure {
                    subject: bookmark.subject.clone(),
                    column: column.to_string(),
                    source: err,
                });
            }
        }
        failures
    }

    fn adjust(
        &self,
        kind: &SubjectKind,
        subject: &SubjectRef,
        column: &str,
        delta: i64,
    ) -> Result<(), CounterUpdateError> {
        let tx = write_transaction(self.conn)?;
        let changed = tx.execute(
            &format!(
                "UPDATE {table}
                 SET {column} = COALESCE({column}, 0) + ?1
                 WHERE {id_column} = ?2;",
                table = kind.table,
                id_column = kind.id_column
            ),
            params![delta, subject.subject_id],
        )?;
        tx.commit()?;
        if changed == 0 {
            return Err(CounterUpdateError::SubjectMissing);
        }
        Ok(())
    }
}

fn declared_column<'k>(kind: &'k SubjectKind, field: CounterField<'_>) -> Option<&'k str> {
    match field {
        CounterField::Total => kind.counters.total.as_deref(),
        CounterField::Named(name) => kind.counters.named_column(Some(name)),
    }
}
