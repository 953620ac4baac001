use crate::support::{file, folder, names, store};
use nodevault::error::ApiError;
use nodevault::store::{NodeRecord, NodeRecordStore, SledNodeRecordStore};
use nodevault::types::NodeId;

#[tokio::test]
async fn rename_keeps_children_and_blocks_reuse_of_new_name() {
    let store = store();
    let root = NodeId::root();
    let docs = folder(&store, &root, "Docs").await;
    file(&store, &docs.id, "a.txt", b"alpha").await;

    let archive = store.rename(&docs.id, "Archive").await.unwrap();
    assert_eq!(archive.id, docs.id);

    let top = store.list_children(&root).await.unwrap();
    assert_eq!(names(&top), vec!["Archive"]);
    assert!(top[0].is_folder());

    let inside = store.list_children(&archive.id).await.unwrap();
    assert_eq!(names(&inside), vec!["a.txt"]);

    let err = store
        .create(NodeRecord::new_folder(root.clone(), "Archive"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NameConflict { ref name, .. } if name == "Archive"));

    // The old name is free again
    folder(&store, &root, "Docs").await;
}

#[tokio::test]
async fn cascading_delete_leaves_no_descendants() {
    let store = store();
    let root = NodeId::root();
    let a = folder(&store, &root, "A").await;
    let b = folder(&store, &a.id, "B").await;
    let c = folder(&store, &b.id, "C").await;
    let f1 = file(&store, &b.id, "one.txt", b"1").await;
    let f2 = file(&store, &c.id, "two.txt", b"2").await;
    let keep = folder(&store, &root, "Keep").await;

    let removed = store.delete(&a.id).await.unwrap();
    assert_eq!(removed.len(), 5);
    assert_eq!(removed.last(), Some(&a.id));

    for record in [&a, &b, &c, &f1, &f2] {
        assert!(store.get_by_id(&record.id).await.unwrap().is_none());
        assert!(store.list_children(&record.id).await.unwrap().is_empty());
    }
    assert_eq!(store.list_children(&root).await.unwrap(), vec![keep]);
    assert!(matches!(
        store.read_payload(&f2.id).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_twice_yields_identical_state() {
    let store = store();
    let root = NodeId::root();
    let a = folder(&store, &root, "A").await;
    folder(&store, &a.id, "B").await;
    folder(&store, &root, "Other").await;

    store.delete(&a.id).await.unwrap();
    let after_first = store.list_children(&root).await.unwrap();
    let count_first = store.node_count();

    store.delete(&a.id).await.unwrap();
    assert_eq!(store.list_children(&root).await.unwrap(), after_first);
    assert_eq!(store.node_count(), count_first);
}

#[tokio::test]
async fn search_matches_case_insensitive_substrings() {
    let store = store();
    let root = NodeId::root();
    let docs = folder(&store, &root, "Docs").await;
    file(&store, &docs.id, "Report.pdf", b"%PDF").await;
    file(&store, &docs.id, "Invoice.docx", b"PK").await;

    assert!(store.search("").await.unwrap().is_empty());
    assert!(store.search("   ").await.unwrap().is_empty());
    assert_eq!(names(&store.search("rep").await.unwrap()), vec!["Report.pdf"]);
    assert_eq!(names(&store.search("REP").await.unwrap()), vec!["Report.pdf"]);
    assert_eq!(
        names(&store.search("o").await.unwrap()),
        vec!["Docs", "Invoice.docx", "Report.pdf"]
    );
}

#[tokio::test]
async fn file_payload_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let store = SledNodeRecordStore::open(dir.path().join("db")).unwrap();
        let record = file(&store, &NodeId::root(), "notes.txt", b"keep me").await;
        store.flush().await.unwrap();
        record.id
    };

    let store = SledNodeRecordStore::open(dir.path().join("db")).unwrap();
    let record = store.get_by_id(&id).await.unwrap().unwrap();
    let payload = record.payload.unwrap();
    assert_eq!(payload.size, 7);
    assert_eq!(payload.mime_type, "text/plain");
    assert_eq!(store.read_payload(&id).await.unwrap(), b"keep me");
}
