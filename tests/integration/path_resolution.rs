use crate::support::{folder, store};
use nodevault::store::NodeRecordStore;
use nodevault::tree::PathResolver;
use nodevault::types::NodeId;
use std::sync::Arc;

#[tokio::test]
async fn breadcrumbs_run_from_top_level_down_to_target() {
    let store = Arc::new(store());
    let root = NodeId::root();
    let a = folder(&*store, &root, "A").await;
    let b = folder(&*store, &a.id, "B").await;
    let c = folder(&*store, &b.id, "C").await;

    let resolver = PathResolver::new(store.clone());
    let trail = resolver.breadcrumbs(&c.id).await.unwrap();
    assert_eq!(trail, vec![a.clone(), b, c]);

    assert_eq!(resolver.breadcrumbs(&a.id).await.unwrap(), vec![a.clone()]);
    assert!(resolver.breadcrumbs(&root).await.unwrap().is_empty());
}

#[tokio::test]
async fn breadcrumbs_follow_renames() {
    let store = Arc::new(store());
    let a = folder(&*store, &NodeId::root(), "A").await;
    let b = folder(&*store, &a.id, "B").await;
    store.rename(&a.id, "Alpha").await.unwrap();

    let trail = PathResolver::new(store.clone())
        .breadcrumbs(&b.id)
        .await
        .unwrap();
    let names: Vec<&str> = trail.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "B"]);
}

#[tokio::test]
async fn missing_node_has_no_trail() {
    let store = Arc::new(store());
    let trail = PathResolver::new(store)
        .breadcrumbs(&NodeId::from("missing"))
        .await
        .unwrap();
    assert!(trail.is_empty());
}
