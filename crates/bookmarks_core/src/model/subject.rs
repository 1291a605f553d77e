//! Tagged references to bookmarkable subjects.

use crate::registry::subject_registry::SubjectKind;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier of a subject within its kind.
pub type SubjectId = i64;

/// Polymorphic subject address: the registered kind tag plus the id within
/// that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectRef {
    pub subject_type: String,
    pub subject_id: SubjectId,
}

impl SubjectRef {
    pub fn new(subject_type: impl Into<String>, subject_id: SubjectId) -> Self {
        Self {
            subject_type: subject_type.into(),
            subject_id,
        }
    }
}

impl Display for SubjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.subject_type, self.subject_id)
    }
}

/// Typed declaration for entity kinds that opt into bookmarking.
///
/// The tag is stored in `bookmarks.subject_type`, so it must stay stable for
/// the lifetime of the data.
pub trait Bookmarkable {
    const TYPE_TAG: &'static str;

    fn subject_id(&self) -> SubjectId;

    fn subject_ref(&self) -> SubjectRef {
        SubjectRef::new(Self::TYPE_TAG, self.subject_id())
    }
}

/// Bookmarkable kinds that can be read back from their registered table.
pub trait LoadableSubject: Bookmarkable + Sized + Send + 'static {
    /// Loads the entity stored under `id` in `kind.table`.
    fn load(
        conn: &Connection,
        kind: &SubjectKind,
        id: SubjectId,
    ) -> rusqlite::Result<Option<Self>>;
}
