/*!
 * Publish, edit, translate and republish one post end to end
 */

use std::sync::Arc;

use headless_cms::database::PublicationState;
use headless_cms::publication::PublishedReader;

use crate::common::{RecordingEngine, blog_schema, english, service_with};

#[tokio::test]
async fn test_postLifecycle_shouldTrackPublicationAcrossEditsAndTranslation() {
    let service = service_with(blog_schema(), Arc::new(RecordingEngine::new()), &["en", "vi"]);
    let reader = PublishedReader::new(service.repository(), service.schema());
    let mut post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    // First publication snapshots the live row
    let first = service.publish(&post.reference, None).await.unwrap();
    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(stored.published_version, Some(first));
    assert_eq!(
        service.publication_state(&post.reference).await.unwrap(),
        PublicationState::PublishedLatest
    );

    // An edit without publishing leaves readers on the published snapshot
    post.set_localized("title", "en", "Hi");
    service.save(&post, Some("editor")).await.unwrap();
    assert_eq!(
        service.publication_state(&post.reference).await.unwrap(),
        PublicationState::PublishedOutdated
    );
    let visible = reader.published_data(&post.reference).await.unwrap().unwrap();
    assert_eq!(visible["title"]["en"], "Hello");

    // Translation works on the live text
    service.translate(&post.reference, None, false).await.unwrap();
    let translated = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(translated.localized("title").unwrap().text("vi"), Some("vi-Hi"));
    assert_eq!(
        service.publication_state(&post.reference).await.unwrap(),
        PublicationState::PublishedOutdated
    );

    // Republishing moves the pointer to the newest snapshot
    let second = service.publish(&post.reference, None).await.unwrap();
    let latest = service
        .repository()
        .latest_snapshot(&post.reference)
        .await
        .unwrap()
        .unwrap();
    assert!(second > first);
    assert_eq!(second, latest.id);
    assert_eq!(
        service.publication_state(&post.reference).await.unwrap(),
        PublicationState::PublishedLatest
    );

    let visible = reader.published_data(&post.reference).await.unwrap().unwrap();
    assert_eq!(visible["title"]["en"], "Hi");
    assert_eq!(visible["title"]["vi"], "vi-Hi");

    let comments: Vec<String> = service
        .history(&post.reference)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.revision.comment)
        .collect();
    assert_eq!(comments, vec!["Object translated", "Changed", "Publish"]);
}
