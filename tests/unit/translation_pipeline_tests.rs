/*!
 * Tests for translation through the publication service
 */

use std::sync::Arc;

use headless_cms::content::Entity;
use headless_cms::errors::{CmsError, TranslationError};
use headless_cms::publication::PublicationService;

use crate::common::{RecordingEngine, blog_service, english};

fn text<'a>(entity: &'a Entity, field: &str, language: &str) -> Option<&'a str> {
    entity.localized(field).and_then(|value| value.text(language))
}

async fn reload(service: &PublicationService, entity: &Entity) -> Entity {
    service.repository().get_entity(&entity.reference).await.unwrap()
}

#[tokio::test]
async fn test_translate_byDefault_shouldOnlyFillMissingLanguages() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine.clone());
    let post = service
        .create("post", english(&[("title", "Hello"), ("body", "World")]))
        .await
        .unwrap();

    service.translate(&post.reference, None, false).await.unwrap();

    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "title", "vi"), Some("vi-Hello"));
    assert_eq!(text(&stored, "title", "ro"), Some("ro-Hello"));
    assert_eq!(text(&stored, "body", "ro"), Some("ro-World"));
    assert_eq!(engine.call_count(), 4);

    // Nothing missing any more: the engine is not invoked again
    let revision = service.translate(&post.reference, None, false).await.unwrap();
    assert_eq!(engine.call_count(), 4);
    assert!(revision.is_none());
}

#[tokio::test]
async fn test_translate_withForce_shouldOverwriteEveryLanguage() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine.clone());
    let mut post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    post.set_localized("title", "vi", "Xin chao");
    service.save(&post, None).await.unwrap();

    service.translate(&post.reference, None, false).await.unwrap();
    assert_eq!(text(&reload(&service, &post).await, "title", "vi"), Some("Xin chao"));
    assert_eq!(engine.translate_calls(), vec![("ro".to_string(), "Hello".to_string())]);

    let revision = service.translate(&post.reference, Some("editor"), true).await.unwrap();

    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "title", "vi"), Some("vi-Hello"));
    assert_eq!(engine.translate_calls().len(), 3);
    let record = service
        .repository()
        .get_revision(revision.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.comment, "Object translated (forced)");
}

#[tokio::test]
async fn test_translate_shouldUseLiveTextAndSkipEmptyOrNonTextValues() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine.clone());
    let mut post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    post.set_localized("subtitle", "en", "");
    post.set_localized("description", "en", 42);
    service.save(&post, None).await.unwrap();

    service.translate(&post.reference, None, false).await.unwrap();

    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "subtitle", "vi"), None);
    assert!(stored.localized("description").unwrap().get("vi").is_none());
    assert!(engine.translate_calls().iter().all(|(_, source)| source == "Hello"));
}

#[tokio::test]
async fn test_translate_withFieldByFieldFailure_shouldPersistNothing() {
    let engine = Arc::new(RecordingEngine::new().failing_for("ro"));
    let service = blog_service(engine.clone());
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    let error = service.translate(&post.reference, None, false).await.unwrap_err();

    assert!(matches!(error, CmsError::Translation(TranslationError::Provider(_))));
    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "title", "vi"), None);
    assert!(service.history(&post.reference).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_translate_withBatchEngine_shouldRequestOnlyMissingFieldsPerLanguage() {
    let engine = Arc::new(RecordingEngine::batch());
    let service = blog_service(engine.clone());
    let mut post = service
        .create("post", english(&[("title", "Hello"), ("body", "World")]))
        .await
        .unwrap();
    post.set_localized("title", "vi", "Xin chao");
    post.set_localized("body", "vi", "The gioi");
    post.set_localized("title", "ro", "Salut");
    service.save(&post, None).await.unwrap();

    service.translate(&post.reference, None, false).await.unwrap();

    let calls = engine.batch_calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].contains_key("vi"));
    assert_eq!(calls[0]["ro"].keys().collect::<Vec<_>>(), vec!["body"]);
    assert!(engine.translate_calls().is_empty());

    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "title", "ro"), Some("Salut"));
    assert_eq!(text(&stored, "body", "ro"), Some("ro-World"));
}

#[tokio::test]
async fn test_translate_withBatchFailureForOneLanguage_shouldKeepOtherLanguages() {
    let engine = Arc::new(RecordingEngine::batch().failing_for("vi"));
    let service = blog_service(engine.clone());
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    service.translate(&post.reference, None, false).await.unwrap();

    let stored = reload(&service, &post).await;
    assert_eq!(text(&stored, "title", "vi"), None);
    assert_eq!(text(&stored, "title", "ro"), Some("ro-Hello"));
}

#[tokio::test]
async fn test_translate_withGenericItems_shouldTranslateEachItemInSameRevision() {
    let engine = Arc::new(RecordingEngine::batch());
    let service = blog_service(engine.clone());
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    let first = service.create("item", english(&[("title", "First")])).await.unwrap();
    let mut second = service.create("item", english(&[("title", "Second")])).await.unwrap();
    second.set_localized("title", "vi", "Thu hai");
    second.set_localized("title", "ro", "Al doilea");
    service.save(&second, None).await.unwrap();
    for item in [&first, &second] {
        service
            .repository()
            .add_relation(&post.reference, "items", &item.reference, None)
            .await
            .unwrap();
    }

    let revision = service.translate(&post.reference, None, false).await.unwrap().unwrap();

    assert_eq!(text(&reload(&service, &first).await, "title", "ro"), Some("ro-First"));
    assert_eq!(text(&reload(&service, &second).await, "title", "vi"), Some("Thu hai"));

    // Post, first item, then an empty request for the complete second item
    let calls = engine.batch_calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1]["vi"]["title"], "First");
    assert!(calls[2].is_empty());

    let item_history = service.history(&first.reference).await.unwrap();
    assert_eq!(item_history[0].revision.id, revision);
    assert_eq!(item_history[0].revision.comment, "Object translated");
    let untouched = service.history(&second.reference).await.unwrap();
    assert_ne!(untouched[0].revision.id, revision);
}

#[tokio::test]
async fn test_recursivelyTranslate_shouldTranslateRelatedEntities() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine.clone());
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    let tag = service.create("post_tag", english(&[("title", "Rust")])).await.unwrap();
    service
        .repository()
        .add_relation(&post.reference, "tags", &tag.reference, None)
        .await
        .unwrap();

    // Starting from the tag walks back to the post through the reverse relation
    let visited = service.recursively_translate(&tag.reference, None, false).await.unwrap();

    assert_eq!(visited, vec![tag.reference.clone(), post.reference.clone()]);
    assert_eq!(text(&reload(&service, &tag).await, "title", "vi"), Some("vi-Rust"));
    assert_eq!(text(&reload(&service, &post).await, "title", "ro"), Some("ro-Hello"));
}

#[tokio::test]
async fn test_recursivelyTranslate_withForce_shouldTranslateGenericItemsOnce() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine.clone());
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    let item = service.create("item", english(&[("title", "Sub")])).await.unwrap();
    service
        .repository()
        .add_relation(&post.reference, "items", &item.reference, None)
        .await
        .unwrap();

    let visited = service.recursively_translate(&post.reference, None, true).await.unwrap();

    assert_eq!(visited, vec![post.reference.clone()]);
    let item_calls: Vec<_> = engine
        .translate_calls()
        .into_iter()
        .filter(|(_, text)| text == "Sub")
        .collect();
    assert_eq!(item_calls.len(), 2);
    assert_eq!(text(&reload(&service, &item).await, "title", "vi"), Some("vi-Sub"));
}

#[tokio::test]
async fn test_translate_afterPublish_shouldLeavePublishedSnapshotAlone() {
    let engine = Arc::new(RecordingEngine::new());
    let service = blog_service(engine);
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
    let published = service.publish(&post.reference, None).await.unwrap();

    service.translate(&post.reference, None, false).await.unwrap();

    let snapshot = service
        .repository()
        .published_snapshot(&post.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.id, published);
    assert!(snapshot.field_dict["title"].get("vi").is_none());
}
