/*!
 * LLM translator driven through the publication service with scripted providers
 */

use std::sync::Arc;

use headless_cms::content::Entity;
use headless_cms::errors::{CmsError, ProviderError, TranslationError};
use headless_cms::providers::MockProvider;
use headless_cms::publication::PublicationService;
use headless_cms::translation::{LlmSettings, LlmTranslator, TranslationPrompts};

use crate::common::{blog_schema, english, service_with};

fn llm_service(provider: &MockProvider, settings: LlmSettings) -> PublicationService {
    let engine = LlmTranslator::new(provider.clone(), TranslationPrompts::default(), settings);
    service_with(blog_schema(), Arc::new(engine), &["en", "vi", "ro"])
}

async fn translated_post(service: &PublicationService, fields: &[(&str, &str)]) -> Result<Entity, CmsError> {
    let post = service.create("post", english(fields)).await?;
    service.translate(&post.reference, None, false).await?;
    Ok(service.repository().get_entity(&post.reference).await?)
}

fn text<'a>(entity: &'a Entity, field: &str, language: &str) -> Option<&'a str> {
    entity.localized(field).and_then(|value| value.text(language))
}

#[tokio::test]
async fn test_batchTranslate_shouldSendOneJsonRequestPerLanguage() {
    let provider = MockProvider::working();
    let service = llm_service(&provider, LlmSettings::default());

    let post = translated_post(&service, &[("title", "Hello"), ("body", "World")])
        .await
        .unwrap();

    assert_eq!(text(&post, "title", "vi"), Some("vi-Hello"));
    assert_eq!(text(&post, "body", "ro"), Some("ro-World"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.options.json_mode));
    assert!(requests.iter().all(|r| r.options.temperature == Some(0.7)));
    let mut languages: Vec<String> = requests.iter().map(|r| r.target_language()).collect();
    languages.sort();
    assert_eq!(languages, vec!["ro", "vi"]);
}

#[tokio::test]
async fn test_batchTranslate_withFailingLanguage_shouldWriteOtherLanguages() {
    let provider = MockProvider::failing_for("ro");
    let service = llm_service(&provider, LlmSettings::default());

    let post = translated_post(&service, &[("title", "Hello")]).await.unwrap();

    assert_eq!(text(&post, "title", "vi"), Some("vi-Hello"));
    assert_eq!(text(&post, "title", "ro"), None);
}

#[tokio::test]
async fn test_batchTranslate_withMalformedAnswers_shouldWriteNothing() {
    let provider = MockProvider::malformed();
    let service = llm_service(&provider, LlmSettings::default());

    let post = translated_post(&service, &[("title", "Hello")]).await.unwrap();

    assert_eq!(text(&post, "title", "vi"), None);
    assert_eq!(text(&post, "title", "ro"), None);
    assert_eq!(text(&post, "title", "en"), Some("Hello"));
}

#[tokio::test]
async fn test_batchTranslate_withTruncatedAnswers_shouldContinueUntilComplete() {
    let provider = MockProvider::chunked(6);
    let service = llm_service(&provider, LlmSettings::default());

    let post = translated_post(&service, &[("title", "Hi")]).await.unwrap();

    // {"title":"vi-Hi"} is 17 characters: three turns per language
    assert_eq!(text(&post, "title", "vi"), Some("vi-Hi"));
    assert_eq!(text(&post, "title", "ro"), Some("ro-Hi"));
    assert_eq!(provider.request_count(), 6);

    let last = provider.requests().into_iter().max_by_key(|r| r.messages.len()).unwrap();
    assert_eq!(last.messages.len(), 6);
    assert_eq!(last.messages[5].content, TranslationPrompts::default().continue_prompt());
}

#[tokio::test]
async fn test_batchTranslate_shouldKeepPlaceholdersVerbatim() {
    let provider = MockProvider::working();
    let service = llm_service(&provider, LlmSettings::default());

    let post = translated_post(&service, &[("title", "Hi <getattr>user.name</getattr>")])
        .await
        .unwrap();

    assert_eq!(text(&post, "title", "vi"), Some("vi-Hi <getattr>user.name</getattr>"));
    assert!(provider.requests().iter().all(|r| !r.source_text().contains("getattr")));
}

#[tokio::test]
async fn test_fieldByField_withFailingLanguage_shouldAbortTranslate() {
    let provider = MockProvider::failing_for("ro");
    let settings = LlmSettings {
        batch: false,
        ..LlmSettings::default()
    };
    let service = llm_service(&provider, settings);
    let post = service.create("post", english(&[("title", "Hello")])).await.unwrap();

    let error = service.translate(&post.reference, None, false).await.unwrap_err();

    assert!(matches!(error, CmsError::Translation(TranslationError::Provider(_))));
    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(text(&stored, "title", "vi"), None);
    assert!(provider.requests().iter().all(|r| !r.options.json_mode));
}

#[tokio::test]
async fn test_fieldByField_withEndlessTruncation_shouldStoreNoPartialText() {
    let provider = MockProvider::chunked(2);
    let settings = LlmSettings {
        batch: false,
        max_continuations: 1,
        ..LlmSettings::default()
    };
    let service = llm_service(&provider, settings);
    let post = service.create("post", english(&[("title", "Hello world")])).await.unwrap();

    let error = service.translate(&post.reference, None, false).await.unwrap_err();

    assert!(matches!(
        error,
        CmsError::Translation(TranslationError::Provider(ProviderError::Truncated { .. }))
    ));
    let stored = service.repository().get_entity(&post.reference).await.unwrap();
    assert_eq!(text(&stored, "title", "vi"), None);
}

#[tokio::test]
async fn test_batchTranslate_withEndlessTruncation_shouldDropLanguages() {
    let provider = MockProvider::chunked(2);
    let settings = LlmSettings {
        max_continuations: 1,
        ..LlmSettings::default()
    };
    let service = llm_service(&provider, settings);

    let post = translated_post(&service, &[("title", "Hello world")]).await.unwrap();

    assert_eq!(text(&post, "title", "vi"), None);
    assert_eq!(text(&post, "title", "ro"), None);
    assert_eq!(provider.request_count(), 4);
}
