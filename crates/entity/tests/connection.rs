use elif_entity::config::{DB_HOST, DB_NAME, DB_PASSWORD, DB_PORT, DB_TYPE, DB_USERNAME};
use elif_entity::{BackendKind, ConnectionManager, EntityList, Settings};

#[tokio::test]
async fn test_unknown_backend_is_a_configuration_error() {
    let mut db = ConnectionManager::new(Settings::new().with(DB_TYPE, "oracle"));

    let err = db.connect().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(!db.is_connected());
    assert!(db.store().err().unwrap().is_not_connected());
}

#[tokio::test]
async fn test_missing_backend_kind_is_a_configuration_error() {
    let mut db = ConnectionManager::new(Settings::new());
    let err = EntityList::count(&mut db, "test").await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_cubrid_has_no_driver() {
    let settings = Settings::from_pairs([
        (DB_TYPE, "cubrid"),
        (DB_HOST, "localhost"),
        (DB_NAME, "demodb"),
        (DB_USERNAME, "dba"),
        (DB_PASSWORD, "secret"),
    ]);
    let mut db = ConnectionManager::new(settings);

    let err = db.connect().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(!err.to_string().contains("secret"));
}

#[tokio::test]
async fn test_incomplete_server_settings_fail_before_connecting() {
    let settings = Settings::from_pairs([
        (DB_TYPE, "mysql"),
        (DB_HOST, "localhost"),
        (DB_NAME, "app"),
        (DB_USERNAME, "app"),
        (DB_PASSWORD, "secret"),
    ]);
    let mut db = ConnectionManager::new(settings);

    let err = db.connect().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains(DB_PORT));
}

#[tokio::test]
async fn test_sqlite_connect_and_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("connection.sqlite");
    let mut db = ConnectionManager::new(Settings::sqlite(&path));

    db.disconnect().await.unwrap();

    db.connect().await.unwrap();
    db.connect().await.unwrap();
    assert_eq!(db.kind(), Some(BackendKind::Sqlite));
    assert!(path.exists());

    db.disconnect().await.unwrap();
    db.disconnect().await.unwrap();
    assert!(!db.is_connected());
}

#[tokio::test]
async fn test_list_operations_close_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = ConnectionManager::new(Settings::sqlite(dir.path().join("scoped.sqlite")));

    db.connect().await.unwrap();
    assert_eq!(EntityList::count(&mut db, "test").await.unwrap(), 0);
    assert!(!db.is_connected());
}
