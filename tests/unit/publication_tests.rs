/*!
 * Tests for the publish / unpublish state machine
 */

use std::sync::Arc;

use headless_cms::content::EntityRef;
use headless_cms::database::{EntityData, PublicationState};
use headless_cms::errors::{CmsError, StorageError};
use headless_cms::publication::PublicationService;

use crate::common::{RecordingEngine, blog_service, english};

fn service() -> PublicationService {
    blog_service(Arc::new(RecordingEngine::new()))
}

async fn state(service: &PublicationService, reference: &EntityRef) -> PublicationState {
    service.publication_state(reference).await.unwrap()
}

async fn edit_title(service: &PublicationService, reference: &EntityRef, title: &str) {
    let mut entity = service.repository().get_entity(reference).await.unwrap();
    entity.set_localized("title", "en", title);
    service.save(&entity, Some("editor")).await.unwrap();
}

#[tokio::test]
async fn test_create_shouldStartUnpublishedWithoutHistory() {
    let service = service();

    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    assert_eq!(state(&service, &post.reference).await, PublicationState::Unpublished);
    assert!(service.history(&post.reference).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_twice_shouldBeIdempotent() {
    let service = service();
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    let first = service.publish(&post.reference, None).await.unwrap();
    assert_eq!(state(&service, &post.reference).await, PublicationState::PublishedLatest);

    let second = service.publish(&post.reference, None).await.unwrap();
    assert_eq!(state(&service, &post.reference).await, PublicationState::PublishedLatest);

    assert_eq!(first, second);
    assert_eq!(service.history(&post.reference).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_afterPublish_shouldMarkOutdated() {
    let service = service();
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    let published = service.publish(&post.reference, None).await.unwrap();

    edit_title(&service, &post.reference, "Hi").await;

    assert_eq!(state(&service, &post.reference).await, PublicationState::PublishedOutdated);
    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(stored.published_version, Some(published));
}

#[tokio::test]
async fn test_save_withoutChanges_shouldNotRecordRevision() {
    let service = service();
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    service.publish(&post.reference, None).await.unwrap();

    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    let revision = service.save(&stored, None).await.unwrap();

    assert!(revision.is_none());
    assert_eq!(state(&service, &post.reference).await, PublicationState::PublishedLatest);
}

#[tokio::test]
async fn test_republish_afterUnpublishAndEdits_shouldPointAtLatestSnapshot() {
    let service = service();
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    service.publish(&post.reference, None).await.unwrap();
    service.unpublish(&post.reference, None).await.unwrap();
    assert_eq!(state(&service, &post.reference).await, PublicationState::Unpublished);

    edit_title(&service, &post.reference, "Hi").await;
    edit_title(&service, &post.reference, "Hey").await;
    assert_eq!(state(&service, &post.reference).await, PublicationState::Unpublished);

    let republished = service.publish(&post.reference, None).await.unwrap();

    let latest = service
        .repository()
        .latest_snapshot(&post.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(republished, latest.id);
    assert_eq!(state(&service, &post.reference).await, PublicationState::PublishedLatest);
    assert_eq!(latest.field_dict["title"]["en"], "Hey");
}

#[tokio::test]
async fn test_unpublish_shouldKeepHistoryAndUser() {
    let service = service();
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    service.publish(&post.reference, Some("alice")).await.unwrap();

    service.unpublish(&post.reference, Some("bob")).await.unwrap();

    let history = service.history(&post.reference).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].revision.comment, "Publish");
    assert_eq!(history[0].revision.user_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_recursivelyPublish_shouldPublishWholeChain() {
    let service = service();
    let repository = service.repository();
    let blog = service.create("blog", english(&[("title", "Blog")])).await.unwrap();
    let post = service.create("post", english(&[("title", "Post")])).await.unwrap();
    let category = service.create("category", english(&[("title", "News")])).await.unwrap();
    repository
        .add_relation(&blog.reference, "posts", &post.reference, None)
        .await
        .unwrap();
    repository
        .set_relation(&post.reference, "category", Some(&category.reference))
        .await
        .unwrap();

    let visited = service.recursively_publish(&blog.reference, None).await.unwrap();

    assert_eq!(visited.len(), 3);
    for reference in [&blog.reference, &post.reference, &category.reference] {
        assert_eq!(state(&service, reference).await, PublicationState::PublishedLatest);
    }
}

#[tokio::test]
async fn test_recursivelyPublish_shouldSkipUnversionedRelations() {
    let service = service();
    let blog = service.create("blog", english(&[("title", "Blog")])).await.unwrap();
    let audit = service.create("audit_log", EntityData::default()).await.unwrap();
    service
        .repository()
        .set_relation(&blog.reference, "audit", Some(&audit.reference))
        .await
        .unwrap();

    let visited = service.recursively_publish(&blog.reference, None).await.unwrap();

    assert_eq!(visited, vec![blog.reference]);
}

#[tokio::test]
async fn test_publish_withUnversionedType_shouldFail() {
    let service = service();
    let audit = service.create("audit_log", EntityData::default()).await.unwrap();

    assert!(matches!(
        service.publish(&audit.reference, None).await,
        Err(CmsError::NotVersioned(_))
    ));
    assert!(matches!(
        service.unpublish(&audit.reference, None).await,
        Err(CmsError::NotVersioned(_))
    ));
    assert_eq!(service.save(&audit, None).await.unwrap(), None);
}

#[tokio::test]
async fn test_publish_withMissingEntity_shouldReportNotFound() {
    let service = service();

    let result = service.publish(&EntityRef::new("post", 42), None).await;

    assert!(matches!(
        result,
        Err(CmsError::Storage(StorageError::NotFound(reference))) if reference.id == 42
    ));
}

#[tokio::test]
async fn test_recursivelyPublish_withMissingRoot_shouldNameTheEntity() {
    let service = service();

    let error = service
        .recursively_publish(&EntityRef::new("post", 7), None)
        .await
        .unwrap_err();

    assert!(error.to_string().contains("post#7"));
}

#[tokio::test]
async fn test_publish_duringSlowTranslate_shouldKeepPublishedPointer() {
    let service = blog_service(Arc::new(RecordingEngine::new().delayed(100)));
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    let (translated, published) = tokio::join!(service.translate(&post.reference, None, false), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        service.publish(&post.reference, None).await
    });
    translated.unwrap();
    let published = published.unwrap();

    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(stored.published_version, Some(published));
    assert_eq!(stored.localized("title").unwrap().text("vi"), Some("vi-Hello"));
    assert_eq!(
        state(&service, &post.reference).await,
        PublicationState::PublishedOutdated
    );
}
