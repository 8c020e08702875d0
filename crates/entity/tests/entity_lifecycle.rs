use elif_entity::{ConnectionManager, Entity, EntityList, Settings, Value};
use tempfile::TempDir;

fn sqlite_manager() -> (TempDir, ConnectionManager) {
    let dir = tempfile::tempdir().unwrap();
    let db = ConnectionManager::new(Settings::sqlite(dir.path().join("entities.sqlite")));
    (dir, db)
}

async fn create(db: &mut ConnectionManager, value1: &str, value2: i64) -> i64 {
    let mut entity = Entity::dispense(db, "test").await.unwrap();
    entity.set("value1", value1);
    entity.set("value2", value2);
    entity.save(db).await.unwrap()
}

fn value1s(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .map(|entity| entity.get_str("value1").unwrap())
        .collect()
}

#[tokio::test]
async fn test_save_and_reload_by_id() {
    let (_dir, mut db) = sqlite_manager();

    let mut entity = Entity::dispense(&mut db, "test").await.unwrap();
    assert!(entity.is_initialized());
    entity.set("value1", "String 1");
    entity.set("value2", 123);

    let id = entity.save(&mut db).await.unwrap();
    assert_eq!(entity.id(), Some(id));
    assert!(!db.is_connected());

    let loaded = Entity::with_id(&mut db, "test", id).await.unwrap();
    assert_eq!(loaded.id(), Some(id));
    assert_eq!(loaded.get_str("value1").as_deref(), Some("String 1"));
    assert_eq!(loaded.get_i64("value2"), Some(123));
    assert!(loaded
        .get("value2")
        .unwrap()
        .loosely_eq(&Value::from("123")));
}

#[tokio::test]
async fn test_concrete_scenario() {
    let (_dir, mut db) = sqlite_manager();

    create(&mut db, "String 1", 123).await;
    create(&mut db, "String 2", 456).await;
    create(&mut db, "String 3", 789).await;
    create(&mut db, "Special", 999).await;

    assert_eq!(EntityList::count(&mut db, "test").await.unwrap(), 4);

    let all = EntityList::find_all(&mut db, "test").await.unwrap();
    assert_eq!(
        value1s(&all),
        vec!["String 1", "String 2", "String 3", "Special"]
    );
    assert!(all.iter().all(|entity| entity.name() == "test"));
    assert!(all.iter().all(Entity::is_initialized));

    let big = EntityList::find_by(&mut db, "test", "value2 > 500")
        .await
        .unwrap();
    assert_eq!(value1s(&big), vec!["String 3", "Special"]);

    let strings = EntityList::find_by(&mut db, "test", "value1 LIKE 'String%'")
        .await
        .unwrap();
    assert_eq!(value1s(&strings), vec!["String 1", "String 2", "String 3"]);

    let quoted = EntityList::find_by(&mut db, "test", "value1 LIKE \"String%\"")
        .await
        .unwrap();
    assert_eq!(value1s(&quoted), vec!["String 1", "String 2", "String 3"]);
    assert!(!db.is_connected());
}

#[tokio::test]
async fn test_update_existing_row() {
    let (_dir, mut db) = sqlite_manager();
    let id = create(&mut db, "String 1", 123).await;

    let mut entity = Entity::with_id(&mut db, "test", id).await.unwrap();
    entity.set("value2", 124);
    entity.set("note", "added later");
    assert_eq!(entity.save(&mut db).await.unwrap(), id);

    assert_eq!(EntityList::count(&mut db, "test").await.unwrap(), 1);
    let reloaded = Entity::with_id(&mut db, "test", id).await.unwrap();
    assert_eq!(reloaded.get_i64("value2"), Some(124));
    assert_eq!(reloaded.get_str("note").as_deref(), Some("added later"));
}

#[tokio::test]
async fn test_load_missing_id_yields_empty_entity() {
    let (_dir, mut db) = sqlite_manager();
    create(&mut db, "String 1", 123).await;

    let entity = Entity::with_id(&mut db, "test", 42).await.unwrap();
    assert!(entity.is_initialized());
    assert_eq!(entity.id(), None);
    assert_eq!(entity.attributes().count(), 0);

    let never_written = Entity::with_id(&mut db, "nothing_here", 1).await.unwrap();
    assert_eq!(never_written.id(), None);
}

#[tokio::test]
async fn test_load_overwrites_same_named_attributes() {
    let (_dir, mut db) = sqlite_manager();
    let id = create(&mut db, "String 1", 123).await;

    let mut entity = Entity::dispense(&mut db, "test").await.unwrap();
    entity.set("value1", "in memory");
    entity.set("extra", "kept");
    entity.load(&mut db, id).await.unwrap();

    assert_eq!(entity.id(), Some(id));
    assert_eq!(entity.get_str("value1").as_deref(), Some("String 1"));
    assert_eq!(entity.get_str("extra").as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_table_name_is_case_insensitive() {
    let (_dir, mut db) = sqlite_manager();

    let mut entity = Entity::dispense(&mut db, "Book").await.unwrap();
    entity.set("title", "Dune");
    entity.save(&mut db).await.unwrap();
    assert_eq!(entity.to_string(), "Book");

    assert_eq!(EntityList::count(&mut db, "book").await.unwrap(), 1);
    assert_eq!(EntityList::count(&mut db, "BOOK").await.unwrap(), 1);
}

#[tokio::test]
async fn test_attribute_names_share_a_column_across_case() {
    let (_dir, mut db) = sqlite_manager();

    let mut first = Entity::dispense(&mut db, "book").await.unwrap();
    first.set("Title", "Dune");
    let first_id = first.save(&mut db).await.unwrap();

    let mut second = Entity::dispense(&mut db, "book").await.unwrap();
    second.set("title", "Emma");
    second.save(&mut db).await.unwrap();

    let all = EntityList::find_all(&mut db, "book").await.unwrap();
    let titles: Vec<String> = all
        .iter()
        .map(|entity| entity.get_str("TITLE").unwrap())
        .collect();
    assert_eq!(titles, vec!["Dune", "Emma"]);

    let reloaded = Entity::with_id(&mut db, "book", first_id).await.unwrap();
    let names: Vec<&str> = reloaded.attributes().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["title"]);
}

#[tokio::test]
async fn test_detached_entity_saves_on_demand() {
    let (_dir, mut db) = sqlite_manager();

    let mut entity = Entity::detached("test");
    entity.set("value1", "detached");
    assert!(!entity.is_initialized());

    let id = entity.save(&mut db).await.unwrap();
    assert!(entity.is_initialized());
    assert_eq!(entity.record().and_then(|record| record.id()), Some(id));
    assert_eq!(EntityList::count(&mut db, "test").await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_save_leaves_entity_unchanged() {
    let (_dir, mut db) = sqlite_manager();

    let mut entity = Entity::dispense(&mut db, "test").await.unwrap();
    entity.set("value1", "String 1");
    entity.set("id", 5);
    let before = entity.clone();

    let err = entity.save(&mut db).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(entity, before);
    assert_eq!(entity.id(), None);
}

#[tokio::test]
async fn test_invalid_table_name_is_rejected() {
    let (_dir, mut db) = sqlite_manager();

    let err = Entity::dispense(&mut db, "drop table").await.unwrap_err();
    assert!(err.is_validation());
    let err = Entity::dispense(&mut db, "select").await.unwrap_err();
    assert!(err.is_validation());
}
