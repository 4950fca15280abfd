mod helpers;

use redline::domain::models::{Patch, PatchLayer, PatchOperation};
use redline::domain::ports::{AuditEvent, AuditLogRepository, AuditRecord};
use redline::infrastructure::database::AuditLogRepositoryImpl;

use helpers::database::{setup_test_db, teardown_test_db};

fn sample_patch(id: &str) -> Patch {
    Patch::new(
        id,
        PatchLayer::Knowledge,
        "knowledge_store/S-201/pass1.json",
        PatchOperation::Set,
        "summary",
        serde_json::json!("Framing plan with W14x30 roof beams"),
    )
}

#[tokio::test]
async fn test_append_and_list() {
    let pool = setup_test_db().await;
    let repo = AuditLogRepositoryImpl::new(pool.clone());

    let record = AuditRecord::for_patch(
        "entry_1",
        AuditEvent::PatchApplied,
        &sample_patch("p_001_c_001"),
    );
    assert!(repo.append(&record).await.unwrap());

    let records = repo.list(None, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].patch_id, "p_001_c_001");
    assert_eq!(records[0].entry_id, "entry_1");
    assert_eq!(records[0].event, AuditEvent::PatchApplied);
    assert_eq!(records[0].layer, Some(PatchLayer::Knowledge));
    assert!(records[0].seq > 0);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_duplicate_patch_id_is_ignored() {
    let pool = setup_test_db().await;
    let repo = AuditLogRepositoryImpl::new(pool.clone());

    let record = AuditRecord::for_patch(
        "entry_1",
        AuditEvent::PatchApplied,
        &sample_patch("p_001_c_001"),
    );
    assert!(repo.append(&record).await.unwrap());
    assert!(!repo.append(&record).await.unwrap());

    assert!(repo.contains("p_001_c_001").await.unwrap());
    assert!(!repo.contains("p_002_c_001").await.unwrap());
    assert_eq!(repo.list(None, 10).await.unwrap().len(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_list_scoped_to_entry() {
    let pool = setup_test_db().await;
    let repo = AuditLogRepositoryImpl::new(pool.clone());

    for (entry, patch) in [("entry_1", "p_001"), ("entry_1", "p_002"), ("entry_2", "p_003")] {
        let record = AuditRecord::for_patch(entry, AuditEvent::PatchProposed, &sample_patch(patch));
        repo.append(&record).await.unwrap();
    }

    let scoped = repo.list(Some("entry_1"), 10).await.unwrap();
    assert_eq!(scoped.len(), 2);
    assert!(scoped.iter().all(|r| r.entry_id == "entry_1"));
    // Sequence order within the entry.
    assert!(scoped[0].seq < scoped[1].seq);

    teardown_test_db(pool).await;
}
