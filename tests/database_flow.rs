// End-to-end collection flows through the public `Database` API.
use linedb::api::{Database, DatabaseOptions, Durability, ErrorKind, Query, Record};
use serde_json::{Value, json};

fn open(dir: &std::path::Path) -> Database {
    Database::open(DatabaseOptions::new().with_dir(dir)).expect("open")
}

fn user(id: u64) -> Value {
    json!({ "id": id, "name": format!("User{id}"), "age": 20 + id, "city": format!("City{id}") })
}

fn ids(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|record| record["id"].as_u64().expect("id"))
        .collect()
}

#[tokio::test]
async fn clear_then_find_is_empty_and_clear_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());

    db.clear("tests.json").await.expect("clear");
    assert!(db.find("tests.json", Query::all()).await.expect("find").is_empty());

    db.insert("tests.json", user(1)).await.expect("insert");
    db.clear("tests.json").await.expect("clear");
    db.clear("tests.json").await.expect("clear twice");
    assert!(db.find("tests.json", Query::all()).await.expect("find").is_empty());
    assert!(temp.path().join("tests.json.ndjson").exists());
}

#[tokio::test]
async fn find_on_never_touched_collection_is_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    assert!(db.find("fresh", Query::all()).await.expect("find").is_empty());
    assert!(!temp.path().join("fresh.ndjson").exists());
}

#[tokio::test]
async fn insert_returns_record_and_appends_at_end() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());

    let alice = json!({ "id": 1, "name": "Alice", "age": 25, "city": "CityA" });
    let accepted = db.insert("users", alice.clone()).await.expect("insert");
    assert_eq!(Value::Object(accepted), alice);

    db.insert("users", json!({ "id": 2, "name": "Bob", "age": 30, "city": "CityB" }))
        .await
        .expect("insert");
    let all = db.find("users", Query::all()).await.expect("find");
    assert_eq!(ids(&all), vec![1, 2]);
    assert_eq!(Value::Object(all[0].clone()), alice);
}

#[tokio::test]
async fn exact_match_find_returns_only_matching_records() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    db.insert("users", json!({ "id": 1, "city": "CityA" })).await.expect("insert");
    db.insert("users", json!({ "id": 2, "city": "CityB" })).await.expect("insert");

    let found = db
        .find("users", Query::all().field("city", "CityA"))
        .await
        .expect("find");
    assert_eq!(ids(&found), vec![1]);

    let none = db
        .find("users", Query::all().field("nonexistent", "value"))
        .await
        .expect("find");
    assert!(none.is_empty());

    let coerced = db
        .find("users", Query::all().field("id", "1"))
        .await
        .expect("find");
    assert!(coerced.is_empty());
}

#[tokio::test]
async fn duplicate_ids_are_kept() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    db.insert("users", json!({ "id": 1, "name": "Alice" })).await.expect("insert");
    let before = db.find("users", Query::all()).await.expect("find").len();

    db.insert("users", json!({ "id": 1, "name": "AliceDuplicate" })).await.expect("insert");
    db.insert("users", json!({ "id": 1, "name": "AliceAgain" })).await.expect("insert");
    let after = db.find("users", Query::all()).await.expect("find");
    assert_eq!(after.len(), before + 2);
    assert_eq!(
        db.find("users", Query::all().field("id", 1)).await.expect("find").len(),
        3
    );
}

#[tokio::test]
async fn invalid_records_are_rejected_without_side_effects() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    db.insert("users", user(1)).await.expect("insert");

    for bad in [Value::Null, json!(7), json!("x"), json!([{ "id": 2 }])] {
        let err = db.insert("users", bad).await.expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidRecord);
        assert_eq!(err.collection(), Some("users"));
    }
    assert_eq!(db.find("users", Query::all()).await.expect("find").len(), 1);
}

#[tokio::test]
async fn fifty_sequential_inserts_come_back_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    db.clear("tests.json").await.expect("clear");
    for id in 1..=50 {
        db.insert("tests.json", user(id)).await.expect("insert");
    }
    let all = db.find("tests.json", Query::all()).await.expect("find");
    assert_eq!(ids(&all), (1..=50).collect::<Vec<u64>>());
}

#[tokio::test]
async fn records_persist_across_database_handles() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let db = Database::open(
            DatabaseOptions::new()
                .with_dir(temp.path())
                .with_durability(Durability::Flush),
        )
        .expect("open");
        db.insert("tests.json", user(1)).await.expect("insert");
        db.insert("tests.json", user(2)).await.expect("insert");
    }

    let reopened = open(temp.path());
    let all = reopened.find("tests.json", Query::all()).await.expect("find");
    assert_eq!(ids(&all), vec![1, 2]);
}

#[tokio::test]
async fn corrupt_lines_on_disk_are_skipped() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join("users.ndjson"),
        "{\"id\":1}\ngarbage\n\n{\"id\":2}\n{\"id\":",
    )
    .expect("write");
    let db = open(temp.path());
    let all = db.find("users", Query::all()).await.expect("find");
    assert_eq!(ids(&all), vec![1, 2]);
}

#[tokio::test]
async fn insert_after_torn_tail_is_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("users.ndjson"), "{\"id\":1}\n{\"id\":").expect("write");
    let db = open(temp.path());

    db.insert("users", user(3)).await.expect("insert");
    let all = db.find("users", Query::all()).await.expect("find");
    assert_eq!(ids(&all), vec![1, 3]);
    let found = db
        .find("users", Query::all().field("id", json!(3)))
        .await
        .expect("find by id");
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn non_object_query_is_usage_error() {
    let err = Query::from_value(json!(["city"])).expect_err("array query");
    assert_eq!(err.kind(), ErrorKind::Usage);
    let query = Query::from_value(json!({ "city": "CityA" })).expect("query");
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    assert!(db.find("users", query).await.expect("find").is_empty());
}

#[tokio::test]
async fn collections_are_separate_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = open(temp.path());
    db.insert("a", user(1)).await.expect("insert");
    db.insert("b", user(2)).await.expect("insert");
    db.clear("a").await.expect("clear");

    assert!(db.find("a", Query::all()).await.expect("find").is_empty());
    assert_eq!(ids(&db.find("b", Query::all()).await.expect("find")), vec![2]);
}
