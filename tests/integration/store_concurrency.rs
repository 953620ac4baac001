use crate::support::{folder, store};
use futures::future::join_all;
use nodevault::error::ApiError;
use nodevault::store::{NodeRecord, NodeRecordStore, SledNodeRecordStore};
use nodevault::types::NodeId;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn assert_unique_names(records: &[NodeRecord]) {
    let mut seen = HashSet::new();
    for record in records {
        assert!(
            seen.insert(record.name.clone()),
            "duplicate sibling name {:?}",
            record.name
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_concurrent_create_of_a_name_wins() {
    let store = Arc::new(store());
    let root = NodeId::root();

    let attempts = (0..16).map(|_| {
        let store = Arc::clone(&store);
        let root = root.clone();
        tokio::spawn(async move {
            store
                .create(NodeRecord::new_folder(root, "Shared"), None)
                .await
        })
    });
    let results: Vec<Result<NodeRecord, ApiError>> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ApiError::NameConflict { .. })));
    assert_eq!(store.list_children(&root).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_renames_onto_one_name_leave_it_unique() {
    let store = Arc::new(store());
    let root = NodeId::root();
    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(folder(&*store, &root, &format!("Folder {i}")).await.id);
    }

    let renames = ids.iter().cloned().map(|id| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.rename(&id, "Target").await })
    });
    let winners = join_all(renames)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();
    assert_eq!(winners, 1);

    let children = store.list_children(&root).await.unwrap();
    assert_eq!(children.len(), 8);
    assert_unique_names(&children);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn create_racing_delete_never_orphans_a_child() {
    let store = Arc::new(store());
    let parent = folder(&*store, &NodeId::root(), "Parent").await;

    let creates = (0..8).map(|i| {
        let store = Arc::clone(&store);
        let parent_id = parent.id.clone();
        tokio::spawn(async move {
            store
                .create(NodeRecord::new_folder(parent_id, format!("Child {i}")), None)
                .await
        })
    });
    let delete = {
        let store = Arc::clone(&store);
        let id = parent.id.clone();
        tokio::spawn(async move { store.delete(&id).await })
    };

    let created: Vec<NodeRecord> = join_all(creates)
        .await
        .into_iter()
        .filter_map(|joined| joined.unwrap().ok())
        .collect();
    delete.await.unwrap().unwrap();

    // Whatever got in before the delete went out with it
    assert!(store.get_by_id(&parent.id).await.unwrap().is_none());
    for child in created {
        assert!(store.get_by_id(&child.id).await.unwrap().is_none());
    }
    assert!(store.list_children(&parent.id).await.unwrap().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Rename(usize, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Create),
        (0usize..12, 0u8..6).prop_map(|(idx, name)| Op::Rename(idx, name)),
    ]
}

async fn apply_all(store: Arc<SledNodeRecordStore>, ops: Vec<Op>, concurrent: bool) {
    let root = NodeId::root();
    let existing: Vec<NodeId> = store
        .list_children(&root)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();

    let run = |op: Op| {
        let store = Arc::clone(&store);
        let root = root.clone();
        let existing = existing.clone();
        async move {
            match op {
                Op::Create(n) => store
                    .create(NodeRecord::new_folder(root, format!("n{n}")), None)
                    .await
                    .map(|_| ()),
                Op::Rename(idx, n) => match existing.get(idx % existing.len().max(1)) {
                    Some(id) => store.rename(id, &format!("n{n}")).await.map(|_| ()),
                    None => Ok(()),
                },
            }
        }
    };

    if concurrent {
        let handles: Vec<_> = ops.into_iter().map(|op| tokio::spawn(run(op))).collect();
        for handle in join_all(handles).await {
            let _ = handle.unwrap();
        }
    } else {
        for op in ops {
            let _ = run(op).await;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sibling_names_stay_unique(
        seed in proptest::collection::vec(0u8..6, 0..6),
        ops in proptest::collection::vec(op(), 1..24),
        concurrent in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = Arc::new(SledNodeRecordStore::temporary().unwrap());
            for n in seed {
                let _ = store
                    .create(NodeRecord::new_folder(NodeId::root(), format!("n{n}")), None)
                    .await;
            }
            apply_all(Arc::clone(&store), ops, concurrent).await;

            let children = store.list_children(&NodeId::root()).await.unwrap();
            assert_unique_names(&children);
            // Every name index entry points at a live child
            for child in &children {
                let again = store.get_by_id(&child.id).await.unwrap();
                assert_eq!(again.as_ref(), Some(child));
            }
        });
    }
}
