use crate::support::{folder, names, store, ScriptedStore};
use nodevault::config::ControllerConfig;
use nodevault::error::ApiError;
use nodevault::session::SessionFlag;
use nodevault::state::{BrowseStatus, StateController, UploadEntry, UploadFile};
use nodevault::store::NodeRecordStore;
use nodevault::types::NodeId;
use std::sync::Arc;
use std::time::Duration;

fn controller_over(store: Arc<ScriptedStore>) -> StateController {
    let config = ControllerConfig {
        upload_progress_interval_ms: 5,
        ..ControllerConfig::default()
    };
    StateController::new(store, config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_navigation_cannot_overwrite_newer_one() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let root = NodeId::root();
    let slow = folder(&*scripted, &root, "Slow").await;
    let fast = folder(&*scripted, &root, "Fast").await;
    folder(&*scripted, &slow.id, "from-slow").await;
    folder(&*scripted, &fast.id, "from-fast").await;
    scripted.delay_listing(&slow.id, Duration::from_millis(300));

    let controller = Arc::new(controller_over(Arc::clone(&scripted)));

    let first = {
        let controller = Arc::clone(&controller);
        let id = slow.id.clone();
        tokio::spawn(async move { controller.navigate(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.navigate(&fast.id).await.unwrap();
    first.await.unwrap().unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_folder_id, fast.id);
    assert_eq!(snapshot.browse, BrowseStatus::Ready);
    assert_eq!(names(&snapshot.items), vec!["from-fast"]);
    assert_eq!(snapshot.breadcrumbs, vec![fast]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_while_folder_loads_lands_in_new_listing() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let root = NodeId::root();
    let target = folder(&*scripted, &root, "B").await;
    folder(&*scripted, &root, "RootOnly").await;

    let controller = Arc::new(controller_over(Arc::clone(&scripted)));
    controller.navigate(&root).await.unwrap();
    scripted.delay_listing(&target.id, Duration::from_millis(300));

    let loading = {
        let controller = Arc::clone(&controller);
        let id = target.id.clone();
        tokio::spawn(async move { controller.navigate(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let created = controller.create_folder("X").await.unwrap();
    assert_eq!(created.parent_id, target.id);

    // The old folder's listing is left alone while the new one loads
    let snapshot = controller.snapshot();
    assert!(snapshot.is_loading());
    assert_eq!(names(&snapshot.items), vec!["B", "RootOnly"]);

    loading.await.unwrap().unwrap();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.browse, BrowseStatus::Ready);
    assert_eq!(snapshot.items, vec![created]);
}

#[tokio::test]
async fn deleting_folder_clears_nested_search_hits() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let root = NodeId::root();
    let reports = folder(&*scripted, &root, "Reports").await;
    folder(&*scripted, &reports.id, "report-2024").await;
    let loose = folder(&*scripted, &root, "report-loose").await;

    let controller = controller_over(Arc::clone(&scripted));
    controller.navigate(&root).await.unwrap();
    let hits = controller.search_files("report").await.unwrap();
    assert_eq!(names(&hits), vec!["Reports", "report-2024", "report-loose"]);

    assert_eq!(controller.delete_node(&reports.id).await.unwrap(), 2);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.search_results, vec![loose.clone()]);
    assert_eq!(snapshot.items, vec![loose]);
}

#[tokio::test]
async fn upload_appends_file_and_clears_progress() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let controller = controller_over(Arc::clone(&scripted));
    controller.navigate(&NodeId::root()).await.unwrap();

    let record = controller
        .upload_file(UploadFile::new("Report.pdf", "application/pdf", b"%PDF-1.7".to_vec()))
        .await
        .unwrap();

    let snapshot = controller.snapshot();
    assert!(snapshot.uploads.is_empty());
    assert_eq!(snapshot.items, vec![record.clone()]);
    let payload = record.payload.as_ref().unwrap();
    assert_eq!(payload.size, 8);
    assert_eq!(payload.mime_type, "application/pdf");
    assert_eq!(controller.read_file(&record.id).await.unwrap(), b"%PDF-1.7");

    // Ticks that were still scheduled must not bring the entry back
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(controller.snapshot().uploads.is_empty());
}

#[tokio::test]
async fn failed_upload_is_reported_and_dismissable() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let controller = controller_over(Arc::clone(&scripted));
    controller.navigate(&NodeId::root()).await.unwrap();
    scripted.fail_creates(true);

    let err = controller
        .upload_file(UploadFile::new("a.txt", "text/plain", b"a".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::StorageUnavailable(_)));

    let snapshot = controller.snapshot();
    assert!(snapshot.items.is_empty());
    let (id, entry) = snapshot.uploads.iter().next().unwrap();
    assert!(matches!(entry, UploadEntry::Failed { name, .. } if name == "a.txt"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        controller.snapshot().upload(id),
        Some(UploadEntry::Failed { .. })
    ));

    assert!(controller.dismiss_upload(id));
    assert!(controller.snapshot().uploads.is_empty());
}

#[tokio::test]
async fn upload_with_blank_name_is_rejected_before_tracking() {
    let controller = controller_over(Arc::new(ScriptedStore::new(store())));
    let err = controller
        .upload_file(UploadFile::new("  ", "text/plain", b"a".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
    assert!(controller.snapshot().uploads.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_all_land() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let controller = Arc::new(controller_over(Arc::clone(&scripted)));
    controller.navigate(&NodeId::root()).await.unwrap();

    let uploads = (0..6).map(|i| {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            controller
                .upload_file(UploadFile::new(
                    format!("file-{i}.txt"),
                    "text/plain",
                    vec![b'x'; i + 1],
                ))
                .await
        })
    });
    for joined in futures::future::join_all(uploads).await {
        joined.unwrap().unwrap();
    }

    let snapshot = controller.snapshot();
    assert!(snapshot.uploads.is_empty());
    assert_eq!(snapshot.items.len(), 6);
    assert_eq!(
        scripted.list_children(&NodeId::root()).await.unwrap().len(),
        6
    );
}

#[tokio::test]
async fn deleting_displayed_folder_empties_listing() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let controller = controller_over(Arc::clone(&scripted));
    let docs = controller.create_folder("Docs").await.unwrap();
    controller.navigate(&docs.id).await.unwrap();
    controller.create_folder("Inner").await.unwrap();
    assert_eq!(controller.snapshot().items.len(), 1);

    controller.delete_node(&docs.id).await.unwrap();

    let snapshot = controller.snapshot();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.current_folder_id, docs.id);
    assert!(scripted.get_by_id(&docs.id).await.unwrap().is_none());

    // Reloading the vanished folder reports an error instead of crashing
    assert!(matches!(
        controller.refresh().await,
        Err(ApiError::NotFound(_))
    ));
    assert_eq!(controller.snapshot().browse, BrowseStatus::Error);
}

#[tokio::test]
async fn rename_conflict_surfaces_without_touching_snapshot() {
    let controller = controller_over(Arc::new(ScriptedStore::new(store())));
    controller.create_folder("A").await.unwrap();
    let b = controller.create_folder("B").await.unwrap();
    let before = controller.snapshot();

    let err = controller.rename_node(&b.id, "A").await.unwrap_err();
    assert!(matches!(err, ApiError::NameConflict { .. }));
    assert_eq!(*controller.snapshot(), *before);
}

#[tokio::test]
async fn observers_see_loading_then_ready() {
    let controller = controller_over(Arc::new(ScriptedStore::new(store())));
    let mut rx = controller.subscribe();
    rx.borrow_and_update();

    controller.navigate(&NodeId::root()).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().browse, BrowseStatus::Ready);
}

#[tokio::test]
async fn logged_out_session_reaches_nothing() {
    let scripted = Arc::new(ScriptedStore::new(store()));
    let session = Arc::new(SessionFlag::new(false));
    let controller = controller_over(Arc::clone(&scripted)).with_session(session.clone());

    assert!(matches!(
        controller.search_files("a").await,
        Err(ApiError::Unauthorized(_))
    ));
    assert!(matches!(
        controller
            .upload_file(UploadFile::new("a.txt", "text/plain", b"a".to_vec()))
            .await,
        Err(ApiError::Unauthorized(_))
    ));
    assert!(controller.snapshot().uploads.is_empty());
    assert_eq!(scripted.list_children(&NodeId::root()).await.unwrap().len(), 0);

    session.set_active(true);
    controller.navigate(&NodeId::root()).await.unwrap();
}
