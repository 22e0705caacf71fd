/*!
 * Publication state surviving a reopened database file
 */

use std::sync::Arc;

use tempfile::TempDir;

use headless_cms::database::{DatabaseConnection, PublicationState, Repository};
use headless_cms::publication::{PublicationService, PublishedReader};
use headless_cms::translation::TranslationPipeline;

use crate::common::{RecordingEngine, blog_schema, english, init_logging, languages};

fn open_service(temp_dir: &TempDir) -> PublicationService {
    let db_path = temp_dir.path().join("nested").join("content.db");
    let connection = DatabaseConnection::new(&db_path).expect("database file");
    let pipeline = TranslationPipeline::new(Arc::new(RecordingEngine::new()), "en", languages(&["en", "vi"]));
    PublicationService::new(Repository::new(connection), Arc::new(blog_schema()), pipeline)
}

#[test]
fn test_reopenedDatabase_shouldKeepPublishedPointerAndHistory() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();

    let (post, published) = tokio_test::block_on(async {
        let service = open_service(&temp_dir);
        let mut post = service.create("post", english(&[("title", "Hello")])).await.unwrap();
        let published = service.publish(&post.reference, Some("alice")).await.unwrap();
        post.set_localized("title", "en", "Draft");
        service.save(&post, Some("alice")).await.unwrap();
        (post, published)
    });

    assert!(temp_dir.path().join("nested").join("content.db").exists());

    tokio_test::block_on(async {
        let service = open_service(&temp_dir);

        let stored = service.repository().get_entity(&post.reference).await.unwrap();
        assert_eq!(stored.published_version, Some(published));
        assert_eq!(stored.localized("title").unwrap().text("en"), Some("Draft"));
        assert_eq!(
            service.publication_state(&post.reference).await.unwrap(),
            PublicationState::PublishedOutdated
        );

        let reader = PublishedReader::new(service.repository(), service.schema());
        let visible = reader.published_data(&post.reference).await.unwrap().unwrap();
        assert_eq!(visible["title"]["en"], "Hello");

        let history = service.history(&post.reference).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|entry| entry.revision.user_id.as_deref() == Some("alice")));
    });
}

#[test]
fn test_stats_shouldCountStoredRows() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();

    tokio_test::block_on(async {
        let service = open_service(&temp_dir);
        let tag = service.create("post_tag", english(&[("title", "rust")])).await.unwrap();
        service.create("post_tag", english(&[("title", "sqlite")])).await.unwrap();
        service.publish(&tag.reference, None).await.unwrap();

        let stats = service.repository().connection().stats().unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.published_count, 1);
        assert_eq!(stats.revision_count, 1);
        assert_eq!(stats.snapshot_count, 1);
    });
}
