//! Bookmark record model.
//!
//! # Responsibility
//! - Define the persisted bookmark row and the insert request.
//! - Own category-name normalization shared by writes and filters.
//!
//! # Invariants
//! - `(user_id, subject, name)` is unique; `None` is the unnamed bookmark.
//! - A blank name is the unnamed bookmark, never a distinct category.

use crate::model::subject::SubjectRef;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Store-assigned bookmark identifier.
pub type BookmarkId = i64;

/// Persisted bookmark row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub user_id: UserId,
    pub subject: SubjectRef,
    /// Optional category label; `None` is the default bookmark.
    pub name: Option<String>,
    /// Epoch milliseconds, assigned by the store.
    pub created_at: i64,
    /// Epoch milliseconds, assigned by the store.
    pub updated_at: i64,
}

/// Insert request for one bookmark.
///
/// `user_id` is optional so a rejected attempt with no actor can still be
/// reported back to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub user_id: Option<UserId>,
    pub subject: SubjectRef,
    pub name: Option<String>,
}

impl NewBookmark {
    /// Builds an insert request, normalizing `name`.
    pub fn new(user_id: Option<UserId>, subject: SubjectRef, name: Option<&str>) -> Self {
        Self {
            user_id,
            subject,
            name: normalize_name(name),
        }
    }
}

/// Normalizes a category name: trims surrounding whitespace, and maps blank
/// values to the unnamed bookmark.
pub fn normalize_name(name: Option<&str>) -> Option<String> {
    let trimmed = name?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
