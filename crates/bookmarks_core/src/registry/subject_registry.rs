//! In-process registry of bookmarkable subject kinds.

use crate::db::DbError;
use crate::model::subject::{Bookmarkable, LoadableSubject, SubjectId, SubjectRef};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

static SQL_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

const DEFAULT_ID_COLUMN: &str = "id";
const NAMED_COUNTER_SUFFIX: &str = "_count";

/// Registration and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tag, table or column is not a plain SQL identifier.
    InvalidIdentifier {
        field: &'static str,
        value: String,
    },
    /// The kind was never registered.
    UnsupportedSubjectKind(String),
    /// The kind was registered without a loader.
    LoaderMissing(String),
    /// The loaded subject is not of the requested type.
    KindMismatch { expected: String, found: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { field, value } => {
                write!(f, "{field} is not a valid identifier: `{value}`")
            }
            Self::UnsupportedSubjectKind(tag) => {
                write!(f, "subject kind is not bookmarkable: {tag}")
            }
            Self::LoaderMissing(tag) => write!(f, "no loader registered for {tag}"),
            Self::KindMismatch { expected, found } => {
                write!(f, "subject kind mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl Error for RegistryError {}

/// Errors from loading a subject back through the registry.
#[derive(Debug)]
pub enum SubjectLoadError {
    Registry(RegistryError),
    Db(DbError),
}

impl Display for SubjectLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubjectLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<RegistryError> for SubjectLoadError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<rusqlite::Error> for SubjectLoadError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

/// Type-erased entity produced by a registered loader.
pub type LoadedSubject = Box<dyn Any + Send>;

/// Reads one subject of a registered kind by id.
pub type SubjectLoader =
    fn(&Connection, &SubjectKind, SubjectId) -> rusqlite::Result<Option<LoadedSubject>>;

/// Counter columns a subject kind exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterFields {
    /// Column holding the count of all bookmarks on the subject.
    pub total: Option<String>,
    /// Category name -> column holding the count for that category.
    pub named: BTreeMap<String, String>,
}

impl CounterFields {
    /// Column for the given category, if the kind declares one.
    pub fn named_column(&self, name: Option<&str>) -> Option<&str> {
        name.and_then(|value| self.named.get(value))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_none() && self.named.is_empty()
    }
}

/// Registration descriptor for one bookmarkable kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKind {
    pub type_tag: String,
    pub table: String,
    pub id_column: String,
    pub counters: CounterFields,
}

impl SubjectKind {
    /// Declares a kind stored in `table`, keyed by an `id` column, with no
    /// counters.
    pub fn new(type_tag: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            counters: CounterFields::default(),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Declares the column that counts every bookmark on the subject.
    pub fn with_total_counter(mut self, column: impl Into<String>) -> Self {
        self.counters.total = Some(column.into());
        self
    }

    /// Declares a category counter following the `<name>_count` convention.
    pub fn with_named_counter(self, name: &str) -> Self {
        let column = format!("{name}{NAMED_COUNTER_SUFFIX}");
        self.with_named_counter_column(name, column)
    }

    /// Declares a category counter stored in an explicit column, for names
    /// that are not identifiers (`"tasty!"`, `"to-buy"`).
    pub fn with_named_counter_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.counters.named.insert(name.into(), column.into());
        self
    }

    fn validate(&self) -> Result<(), RegistryError> {
        ensure_identifier("type_tag", &self.type_tag)?;
        ensure_identifier("table", &self.table)?;
        ensure_identifier("id_column", &self.id_column)?;
        if let Some(total) = self.counters.total.as_deref() {
            ensure_identifier("total counter column", total)?;
        }
        for (name, column) in &self.counters.named {
            if name.trim().is_empty() || name.trim() != name {
                return Err(RegistryError::InvalidIdentifier {
                    field: "counter name",
                    value: name.clone(),
                });
            }
            ensure_identifier("named counter column", column)?;
        }
        Ok(())
    }
}

/// Kinds that opted into bookmarking, keyed by type tag.
#[derive(Default)]
pub struct SubjectRegistry {
    kinds: BTreeMap<String, SubjectKind>,
    loaders: BTreeMap<String, SubjectLoader>,
}

impl Debug for SubjectRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectRegistry")
            .field("kinds", &self.kinds)
            .field("loaders", &self.loaders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one kind.
    ///
    /// Returns `Ok(true)` when the kind is new and `Ok(false)` when the tag
    /// was already registered; the first registration always wins.
    pub fn register(&mut self, kind: SubjectKind) -> Result<bool, RegistryError> {
        kind.validate()?;

        if let Some(existing) = self.kinds.get(kind.type_tag.as_str()) {
            if existing != &kind {
                warn!(
                    "event=subject_register module=registry status=ignored type_tag={} reason=conflicting_descriptor",
                    kind.type_tag
                );
            }
            return Ok(false);
        }

        debug!(
            "event=subject_register module=registry status=ok type_tag={} table={} total_counter={} named_counters={}",
            kind.type_tag,
            kind.table,
            kind.counters.total.is_some(),
            kind.counters.named.len()
        );
        self.kinds.insert(kind.type_tag.clone(), kind);
        Ok(true)
    }

    /// Registers a typed kind using its declared tag, stored in `table`.
    pub fn register_bookmarkable<T: Bookmarkable>(
        &mut self,
        table: &str,
        configure: impl FnOnce(SubjectKind) -> SubjectKind,
    ) -> Result<bool, RegistryError> {
        self.register(configure(SubjectKind::new(T::TYPE_TAG, table)))
    }

    /// Registers a typed kind and keeps `T::load` as its loader.
    ///
    /// The loader is only recorded when the kind is new.
    pub fn register_loadable<T: LoadableSubject>(
        &mut self,
        table: &str,
        configure: impl FnOnce(SubjectKind) -> SubjectKind,
    ) -> Result<bool, RegistryError> {
        let registered = self.register_bookmarkable::<T>(table, configure)?;
        if registered {
            self.loaders
                .insert(T::TYPE_TAG.to_string(), load_erased::<T> as SubjectLoader);
        }
        Ok(registered)
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.kinds.contains_key(type_tag)
    }

    /// Looks up the descriptor for a registered tag.
    pub fn resolve(&self, type_tag: &str) -> Result<&SubjectKind, RegistryError> {
        self.kinds
            .get(type_tag)
            .ok_or_else(|| RegistryError::UnsupportedSubjectKind(type_tag.to_string()))
    }

    /// Loads the entity behind `subject` with its kind's loader.
    ///
    /// Returns `Ok(None)` when the subject row does not exist.
    pub fn load_subject(
        &self,
        conn: &Connection,
        subject: &SubjectRef,
    ) -> Result<Option<LoadedSubject>, SubjectLoadError> {
        let kind = self.resolve(&subject.subject_type)?;
        let loader = self
            .loaders
            .get(kind.type_tag.as_str())
            .ok_or_else(|| RegistryError::LoaderMissing(kind.type_tag.clone()))?;
        Ok(loader(conn, kind, subject.subject_id)?)
    }

    /// Typed form of [`Self::load_subject`]; `subject` must carry `T`'s tag.
    pub fn load<T: LoadableSubject>(
        &self,
        conn: &Connection,
        subject: &SubjectRef,
    ) -> Result<Option<T>, SubjectLoadError> {
        if subject.subject_type != T::TYPE_TAG {
            return Err(RegistryError::KindMismatch {
                expected: T::TYPE_TAG.to_string(),
                found: subject.subject_type.clone(),
            }
            .into());
        }
        let Some(entity) = self.load_subject(conn, subject)? else {
            return Ok(None);
        };
        match entity.downcast::<T>() {
            Ok(entity) => Ok(Some(*entity)),
            Err(_) => Err(RegistryError::KindMismatch {
                expected: type_name::<T>().to_string(),
                found: format!("another type loaded as {}", subject.subject_type),
            }
            .into()),
        }
    }

    /// Returns registered tags in sorted order.
    pub fn type_tags(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

fn load_erased<T: LoadableSubject>(
    conn: &Connection,
    kind: &SubjectKind,
    id: SubjectId,
) -> rusqlite::Result<Option<LoadedSubject>> {
    Ok(T::load(conn, kind, id)?.map(|entity| Box::new(entity) as LoadedSubject))
}

fn ensure_identifier(field: &'static str, value: &str) -> Result<(), RegistryError> {
    if SQL_IDENTIFIER_RE.is_match(value) {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistryError, SubjectKind, SubjectLoadError, SubjectRegistry};
    use crate::db::open_db_in_memory;
    use crate::model::subject::{Bookmarkable, SubjectId, SubjectRef};

    struct Beer {
        id: SubjectId,
    }

    impl Bookmarkable for Beer {
        const TYPE_TAG: &'static str = "Beer";

        fn subject_id(&self) -> SubjectId {
            self.id
        }
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = SubjectRegistry::new();
        assert!(registry.register(SubjectKind::new("Beer", "beers")).unwrap());
        assert!(!registry.register(SubjectKind::new("Beer", "beers")).unwrap());
        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered("Beer"));
    }

    #[test]
    fn first_registration_wins_on_conflict() {
        let mut registry = SubjectRegistry::new();
        registry
            .register(SubjectKind::new("Beer", "beers").with_total_counter("bookmarks_count"))
            .unwrap();
        let reregistered = registry
            .register(SubjectKind::new("Beer", "other_beers"))
            .unwrap();

        assert!(!reregistered);
        let kind = registry.resolve("Beer").unwrap();
        assert_eq!(kind.table, "beers");
        assert_eq!(kind.counters.total.as_deref(), Some("bookmarks_count"));
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let registry = SubjectRegistry::new();
        assert!(!registry.is_registered("Donut"));
        assert_eq!(
            registry.resolve("Donut").unwrap_err(),
            RegistryError::UnsupportedSubjectKind("Donut".to_string())
        );
    }

    #[test]
    fn named_counter_uses_count_suffix_convention() {
        let kind = SubjectKind::new("Beer", "beers").with_named_counter("favorite");
        assert_eq!(
            kind.counters.named_column(Some("favorite")),
            Some("favorite_count")
        );
        assert_eq!(kind.counters.named_column(Some("to-buy")), None);
        assert_eq!(kind.counters.named_column(None), None);
    }

    #[test]
    fn rejects_non_identifier_sql_names() {
        let mut registry = SubjectRegistry::new();
        let err = registry
            .register(SubjectKind::new("Beer", "beers; DROP TABLE users"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidIdentifier { field: "table", .. }
        ));

        let err = registry
            .register(SubjectKind::new("Beer", "beers").with_named_counter("to-buy"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidIdentifier {
                field: "named counter column",
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn explicit_column_maps_non_identifier_names() {
        let mut registry = SubjectRegistry::new();
        registry
            .register(
                SubjectKind::new("Beer", "beers").with_named_counter_column("to-buy", "to_buy_count"),
            )
            .unwrap();
        let kind = registry.resolve("Beer").unwrap();
        assert_eq!(kind.counters.named_column(Some("to-buy")), Some("to_buy_count"));
    }

    #[test]
    fn registers_typed_bookmarkable_kinds() {
        let mut registry = SubjectRegistry::new();
        registry
            .register_bookmarkable::<Beer>("beers", |kind| {
                kind.with_total_counter("bookmarks_count")
            })
            .unwrap();

        let duff = Beer { id: 3 };
        let subject = duff.subject_ref();
        assert_eq!(subject.subject_type, "Beer");
        assert_eq!(subject.subject_id, 3);
        assert!(registry.is_registered(&subject.subject_type));
        assert_eq!(registry.type_tags(), vec!["Beer".to_string()]);
    }

    #[test]
    fn load_requires_a_registered_kind_and_loader() {
        let conn = open_db_in_memory().unwrap();
        let mut registry = SubjectRegistry::new();
        registry.register(SubjectKind::new("Beer", "beers")).unwrap();

        let err = registry
            .load_subject(&conn, &SubjectRef::new("Beer", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            SubjectLoadError::Registry(RegistryError::LoaderMissing(tag)) if tag == "Beer"
        ));

        let err = registry
            .load_subject(&conn, &SubjectRef::new("Donut", 1))
            .unwrap_err();
        assert!(matches!(
            err,
            SubjectLoadError::Registry(RegistryError::UnsupportedSubjectKind(_))
        ));
    }
}
