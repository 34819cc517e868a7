use super::*;

fn query<'a>(name: &'a str, subject: &'a str) -> NewContactQuery<'a> {
    NewContactQuery {
        full_name: name,
        phone_number: "9876543210",
        subject,
        message: "Hello from the contact form",
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn lists_contact_queries_newest_first() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .insert_contact_query(query("Asha", "Volunteering"))
        .await
        .expect("first");
    let second = storage
        .insert_contact_query(query("Ravi", "Donations"))
        .await
        .expect("second");

    let queries = storage.list_contact_queries().await.expect("list");
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].id, second);
    assert_eq!(queries[1].id, first);
    assert_eq!(queries[1].full_name, "Asha");
}

#[tokio::test]
async fn delete_reports_whether_a_row_was_removed() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .insert_contact_query(query("Asha", "Volunteering"))
        .await
        .expect("insert");

    assert!(storage.delete_contact_query(id).await.expect("delete"));
    assert!(!storage.delete_contact_query(id).await.expect("delete again"));
    assert!(storage.list_contact_queries().await.expect("list").is_empty());
}

#[tokio::test]
async fn payment_settings_are_absent_until_saved() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.load_payment_settings().await.expect("load").is_none());

    storage
        .save_payment_details("trust@upi", "Helping Hands Trust")
        .await
        .expect("save");
    let stored = storage
        .load_payment_settings()
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.settings.upi_id, "trust@upi");
    assert_eq!(stored.settings.qr_code, None);
    assert!(stored.settings.updated_at.is_some());
}

#[tokio::test]
async fn qr_code_replacement_returns_previous_public_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .save_payment_details("trust@upi", "Trust")
        .await
        .expect("save");

    let previous = storage
        .set_qr_code("https://img/qr-codes/one.png", "qr-codes/one")
        .await
        .expect("first qr");
    assert_eq!(previous, None);

    let previous = storage
        .set_qr_code("https://img/qr-codes/two.png", "qr-codes/two")
        .await
        .expect("second qr");
    assert_eq!(previous.as_deref(), Some("qr-codes/one"));

    let stored = storage
        .load_payment_settings()
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.settings.upi_id, "trust@upi");
    assert_eq!(stored.settings.qr_code.as_deref(), Some("https://img/qr-codes/two.png"));

    let cleared = storage.clear_qr_code().await.expect("clear");
    assert_eq!(cleared.as_deref(), Some("qr-codes/two"));
    let stored = storage
        .load_payment_settings()
        .await
        .expect("load")
        .expect("row");
    assert_eq!(stored.settings.qr_code, None);
    assert_eq!(stored.qr_public_id, None);
}

#[test]
fn memory_urls_have_no_parent_dir() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/site.db?mode=rwc"),
        Some(PathBuf::from("./data/site.db"))
    );
}
