use std::collections::BTreeMap;

use pdf_rag::error::RagError;
use pdf_rag::migrate::migrate_collection;
use pdf_rag::store::{LocalStore, Record, VectorStore};

fn records(prefix: &str, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let mut metadata = BTreeMap::new();
            metadata.insert("source".to_string(), "report.pdf".to_string());
            Record {
                id: format!("{}_doc_{}", prefix, i),
                text: format!("passage number {}", i),
                embedding: vec![i as f32, 1.0, 0.5],
                metadata,
            }
        })
        .collect()
}

#[tokio::test]
async fn copies_all_records_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let source = LocalStore::open(dir.path().join("local")).await.unwrap();
    let target = LocalStore::open(dir.path().join("cloud")).await.unwrap();
    source.write("docs", records("docs", 7)).await.unwrap();

    let report = migrate_collection(&source, &target, "docs", "docs_cloud", false, 3)
        .await
        .unwrap();

    assert_eq!(report.records, 7);
    assert_eq!(report.batches, 3);
    assert!(!report.replaced_existing);
    assert_eq!(
        target.records("docs_cloud").await.unwrap(),
        source.records("docs").await.unwrap()
    );
}

#[tokio::test]
async fn existing_target_requires_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let source = LocalStore::open(dir.path().join("local")).await.unwrap();
    let target = LocalStore::open(dir.path().join("cloud")).await.unwrap();
    source.write("docs", records("docs", 2)).await.unwrap();
    target.write("docs_cloud", records("old", 5)).await.unwrap();

    let err = migrate_collection(&source, &target, "docs", "docs_cloud", false, 500)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RagError>(),
        Some(RagError::CollectionExists(name)) if name == "docs_cloud"
    ));
    assert_eq!(target.records("docs_cloud").await.unwrap().len(), 5);

    let report = migrate_collection(&source, &target, "docs", "docs_cloud", true, 500)
        .await
        .unwrap();
    assert!(report.replaced_existing);
    let copied = target.records("docs_cloud").await.unwrap();
    assert_eq!(copied.len(), 2);
    assert!(copied.iter().all(|r| r.id.starts_with("docs_doc_")));
}

#[tokio::test]
async fn missing_source_collection_fails_before_touching_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = LocalStore::open(dir.path().join("local")).await.unwrap();
    let target = LocalStore::open(dir.path().join("cloud")).await.unwrap();
    target.write("keep", records("keep", 1)).await.unwrap();

    let err = migrate_collection(&source, &target, "absent", "keep", true, 500)
        .await
        .unwrap_err();
    assert!(err.chain().any(|cause| matches!(
        cause.downcast_ref::<RagError>(),
        Some(RagError::CollectionNotFound(_))
    )));
    assert!(target.collection_exists("keep").await.unwrap());
}

#[tokio::test]
async fn empty_source_still_creates_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = LocalStore::open(dir.path().join("local")).await.unwrap();
    let target = LocalStore::open(dir.path().join("cloud")).await.unwrap();
    source.write("blank", Vec::new()).await.unwrap();

    let report = migrate_collection(&source, &target, "blank", "blank_cloud", false, 500)
        .await
        .unwrap();

    assert_eq!(report.records, 0);
    assert_eq!(report.batches, 0);
    assert!(target.collection_exists("blank_cloud").await.unwrap());
    assert!(target.records("blank_cloud").await.unwrap().is_empty());
}
