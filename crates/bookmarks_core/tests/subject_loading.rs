use bookmarks_core::db::open_db_in_memory;
use bookmarks_core::{
    Actor, BookmarkError, BookmarkService, Bookmarkable, LoadableSubject, RegistryError,
    SqliteUserRepository, SubjectId, SubjectKind, SubjectRef, SubjectRegistry, UserRepository,
};
use rusqlite::{Connection, OptionalExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Beer {
    id: SubjectId,
    name: String,
}

impl Bookmarkable for Beer {
    const TYPE_TAG: &'static str = "Beer";

    fn subject_id(&self) -> SubjectId {
        self.id
    }
}

impl LoadableSubject for Beer {
    fn load(
        conn: &Connection,
        kind: &SubjectKind,
        id: SubjectId,
    ) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!(
                "SELECT {id_column}, name FROM {table} WHERE {id_column} = ?1;",
                table = kind.table,
                id_column = kind.id_column
            ),
            [id],
            |row| {
                Ok(Beer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Donut {
    id: SubjectId,
    flavor: String,
}

impl Bookmarkable for Donut {
    const TYPE_TAG: &'static str = "Donut";

    fn subject_id(&self) -> SubjectId {
        self.id
    }
}

impl LoadableSubject for Donut {
    fn load(
        conn: &Connection,
        kind: &SubjectKind,
        id: SubjectId,
    ) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            &format!(
                "SELECT {id_column}, flavor FROM {table} WHERE {id_column} = ?1;",
                table = kind.table,
                id_column = kind.id_column
            ),
            [id],
            |row| {
                Ok(Donut {
                    id: row.get(0)?,
                    flavor: row.get(1)?,
                })
            },
        )
        .optional()
    }
}

fn setup() -> (Connection, SubjectRegistry) {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE beers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            bookmarks_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE donuts (
            donut_id INTEGER PRIMARY KEY,
            flavor TEXT NOT NULL
        );
        INSERT INTO beers (id, name) VALUES (1, 'duff');
        INSERT INTO donuts (donut_id, flavor) VALUES (7, 'cream');",
    )
    .unwrap();

    let mut registry = SubjectRegistry::new();
    assert!(registry
        .register_loadable::<Beer>("beers", |kind| {
            kind.with_total_counter("bookmarks_count")
        })
        .unwrap());
    assert!(registry
        .register_loadable::<Donut>("donuts", |kind| kind.with_id_column("donut_id"))
        .unwrap());
    (conn, registry)
}

fn duff() -> Beer {
    Beer {
        id: 1,
        name: "duff".to_string(),
    }
}

fn cream() -> Donut {
    Donut {
        id: 7,
        flavor: "cream".to_string(),
    }
}

#[test]
fn bookmarks_load_back_their_typed_subjects() {
    let (conn, registry) = setup();
    let homer = Actor::from(
        SqliteUserRepository::new(&conn)
            .create_user("homer")
            .unwrap(),
    );
    let service = BookmarkService::new(&conn, &registry);

    let on_duff = service
        .subject_of(&duff())
        .unwrap()
        .bookmark(Some(&homer), None)
        .unwrap();
    let on_cream = service
        .subject_of(&cream())
        .unwrap()
        .bookmark(Some(&homer), Some("tasty!"))
        .unwrap();

    assert_eq!(service.load_subject::<Beer>(&on_duff).unwrap(), Some(duff()));
    assert_eq!(
        service.load_subject::<Donut>(&on_cream).unwrap(),
        Some(cream())
    );
}

#[test]
fn subject_facade_loads_its_own_entity() {
    let (conn, registry) = setup();
    let service = BookmarkService::new(&conn, &registry);

    let duff_bookmarks = service.subject(SubjectRef::new("Beer", 1)).unwrap();
    assert_eq!(duff_bookmarks.load_subject::<Beer>().unwrap(), Some(duff()));

    let missing = service.subject(SubjectRef::new("Beer", 404)).unwrap();
    assert_eq!(missing.load_subject::<Beer>().unwrap(), None);
}

#[test]
fn registry_dispatches_on_the_kind_tag() {
    let (conn, registry) = setup();

    let loaded = registry
        .load_subject(&conn, &SubjectRef::new("Donut", 7))
        .unwrap()
        .unwrap();
    assert_eq!(loaded.downcast_ref::<Donut>(), Some(&cream()));
    assert!(loaded.downcast_ref::<Beer>().is_none());

    let beer = registry
        .load::<Beer>(&conn, &SubjectRef::new("Beer", 1))
        .unwrap();
    assert_eq!(beer, Some(duff()));
}

#[test]
fn loading_as_the_wrong_type_is_a_kind_mismatch() {
    let (conn, registry) = setup();
    let service = BookmarkService::new(&conn, &registry);
    let cream_bookmarks = service.subject_of(&cream()).unwrap();

    let err = cream_bookmarks.load_subject::<Beer>().unwrap_err();
    match err {
        BookmarkError::SubjectLoad(RegistryError::KindMismatch { expected, found }) => {
            assert_eq!(expected, "Beer");
            assert_eq!(found, "Donut");
        }
        other => panic!("unexpected error: {other}"),
    }
}
