/*!
 * Tests for snapshot retention
 */

use std::sync::Arc;

use headless_cms::content::EntityRef;
use headless_cms::errors::StorageError;
use headless_cms::publication::PublicationService;

use crate::common::{RecordingEngine, blog_service, english};

async fn edit(service: &PublicationService, reference: &EntityRef, title: &str) {
    let mut entity = service.repository().get_entity(reference).await.unwrap();
    entity.set_localized("title", "en", title);
    service.save(&entity, None).await.unwrap();
}

async fn snapshot_ids(service: &PublicationService, reference: &EntityRef) -> Vec<i64> {
    service
        .repository()
        .snapshots_for(reference)
        .await
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.id)
        .collect()
}

#[tokio::test]
async fn test_deleteOutdatedSnapshots_shouldKeepPublishedAndNewerSnapshots() {
    let service = blog_service(Arc::new(RecordingEngine::new()));
    let post = service.create("post", english(&[("title", "v1")])).await.unwrap();
    service.publish(&post.reference, None).await.unwrap();
    edit(&service, &post.reference, "v2").await;
    let published = service.publish(&post.reference, None).await.unwrap();
    edit(&service, &post.reference, "v3").await;
    let before = snapshot_ids(&service, &post.reference).await;
    assert_eq!(before.len(), 3);

    let deleted = service.delete_outdated_snapshots(0).await.unwrap();

    assert_eq!(deleted, 1);
    let after = snapshot_ids(&service, &post.reference).await;
    assert_eq!(after, vec![before[0], published]);
    assert!(service.repository().get_snapshot(published).await.unwrap().is_some());
}

#[tokio::test]
async fn test_deleteOutdatedSnapshots_withRecentRevisions_shouldKeepEverything() {
    let service = blog_service(Arc::new(RecordingEngine::new()));
    let post = service.create("post", english(&[("title", "v1")])).await.unwrap();
    service.publish(&post.reference, None).await.unwrap();
    edit(&service, &post.reference, "v2").await;
    service.publish(&post.reference, None).await.unwrap();

    let deleted = service.delete_outdated_snapshots(30).await.unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(snapshot_ids(&service, &post.reference).await.len(), 2);
}

#[tokio::test]
async fn test_deleteOutdatedSnapshots_shouldIgnoreUnpublishedEntities() {
    let service = blog_service(Arc::new(RecordingEngine::new()));
    let post = service.create("post", english(&[("title", "v1")])).await.unwrap();
    edit(&service, &post.reference, "v2").await;
    edit(&service, &post.reference, "v3").await;

    let deleted = service.delete_outdated_snapshots(0).await.unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(snapshot_ids(&service, &post.reference).await.len(), 2);
}

#[tokio::test]
async fn test_deleteSnapshots_withPublishedSnapshot_shouldRefuse() {
    let service = blog_service(Arc::new(RecordingEngine::new()));
    let post = service.create("post", english(&[("title", "v1")])).await.unwrap();
    let published = service.publish(&post.reference, None).await.unwrap();
    edit(&service, &post.reference, "v2").await;
    let newer = snapshot_ids(&service, &post.reference).await[0];

    let result = service.repository().delete_snapshots(&[newer, published]).await;

    assert!(matches!(result, Err(StorageError::PublishedSnapshot(id)) if id == published));
    assert_eq!(snapshot_ids(&service, &post.reference).await.len(), 2);

    // The unpublished snapshot alone can go, together with its revision
    let revision = service.history(&post.reference).await.unwrap()[0].revision.id;
    assert_eq!(service.repository().delete_snapshots(&[newer]).await.unwrap(), 1);
    assert!(service.repository().get_revision(revision).await.unwrap().is_none());
}
