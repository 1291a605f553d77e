//! User repository and bookmarker lookup.
//!
//! # Responsibility
//! - Persist minimal user rows that bookmarks reference.
//! - Resolve the distinct users behind a set of bookmarks.
//!
//! # Invariants
//! - Bookmarker lists contain each user at most once, ordered by that
//!   user's first matching bookmark.

use crate::db::DbError;
use crate::model::user::{User, UserId};
use crate::repo::bookmark_repo::{push_pagination, BookmarkFilter};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type UserRepoResult<T> = Result<T, UserRepoError>;

#[derive(Debug)]
pub enum UserRepoError {
    /// User name is blank after trim.
    InvalidName,
    Db(DbError),
}

impl Display for UserRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "user name must not be blank"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UserRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for UserRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub trait UserRepository {
    fn create_user(&self, name: &str) -> UserRepoResult<User>;
    fn get_user(&self, id: UserId) -> UserRepoResult<Option<User>>;
    /// Lists all users in id order.
    fn list_users(&self) -> UserRepoResult<Vec<User>>;
    /// Deletes one user row; fails while bookmarks still reference it.
    fn delete_user(&self, id: UserId) -> UserRepoResult<bool>;
    /// Distinct users owning bookmarks that match `filter`, in
    /// first-bookmarked order. `filter.limit`/`filter.offset` page the users,
    /// not the bookmarks.
    fn find_bookmarkers(&self, filter: &BookmarkFilter) -> UserRepoResult<Vec<User>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, name: &str) -> UserRepoResult<User> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(UserRepoError::InvalidName);
        }

        let user = self.conn.query_row(
            "INSERT INTO users (name) VALUES (?1) RETURNING id, name;",
            [trimmed],
            parse_user_row,
        )?;
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> UserRepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name FROM users WHERE id = ?1;",
                [id],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> UserRepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM users ORDER BY id ASC;")?;
        let users = stmt
            .query_map([], parse_user_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn delete_user(&self, id: UserId) -> UserRepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn find_bookmarkers(&self, filter: &BookmarkFilter) -> UserRepoResult<Vec<User>> {
        let (predicates, mut values) = filter.predicates("b");
        let mut sql = format!(
            "SELECT u.id, u.name
             FROM users u
             INNER JOIN bookmarks b ON b.user_id = u.id
             WHERE 1 = 1{predicates}
             GROUP BY u.id, u.name
             ORDER BY MIN(b.id) ASC"
        );
        push_pagination(&mut sql, &mut values, filter.limit, filter.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map(params_from_iter(values), parse_user_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}
