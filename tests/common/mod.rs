/*!
 * Common test utilities for the headless-cms-core test suite
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use headless_cms::content::{ContentSchema, EntityType, LocalizedValue, RelationDef, RelationKind};
use headless_cms::database::{EntityData, Repository};
use headless_cms::errors::{ProviderError, TranslationError};
use headless_cms::publication::PublicationService;
use headless_cms::translation::{BatchTexts, FieldTexts, TranslationEngine, TranslationPipeline};

/// Route library logs to the test output (`RUST_LOG=debug cargo test`)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Blog content model: blogs of posts and articles with shared generic items
pub fn blog_schema() -> ContentSchema {
    ContentSchema::new(vec![
        EntityType::new("item")
            .localized_field("title")
            .localized_field("description")
            .localized_field("icon"),
        EntityType::new("post_tag").localized_field("title"),
        EntityType::new("category").localized_field("title"),
        EntityType::new("domain").localized_field("title"),
        EntityType::new("post")
            .localized_field("title")
            .localized_field("subtitle")
            .localized_field("description")
            .localized_field("body")
            .relation(RelationDef::new("tags", RelationKind::ManyToMany, "post_tag").related_name("posts"))
            .relation(RelationDef::new("category", RelationKind::ManyToOne, "category").related_name("posts"))
            .relation(RelationDef::new("items", RelationKind::Generic, "item")),
        EntityType::new("article_image").localized_field("src_file"),
        EntityType::new("article")
            .localized_field("title")
            .localized_field("subtitle")
            .localized_field("story")
            .relation(RelationDef::new("images", RelationKind::ManyToMany, "article_image").ordered())
            .relation(RelationDef::new("items", RelationKind::Generic, "item")),
        EntityType::new("audit_log").unversioned(),
        EntityType::new("blog")
            .localized_field("title")
            .localized_field("name")
            .relation(RelationDef::new("posts", RelationKind::ManyToMany, "post"))
            .relation(RelationDef::new("articles", RelationKind::ManyToMany, "article"))
            .relation(RelationDef::new("domain", RelationKind::ManyToOne, "domain").related_name("blog"))
            .relation(RelationDef::new("audit", RelationKind::ManyToOne, "audit_log")),
    ])
    .expect("blog schema is valid")
}

/// Single-type schema for graph shape tests: every node has two to-one links
pub fn node_schema() -> ContentSchema {
    ContentSchema::new(vec![
        EntityType::new("node")
            .localized_field("title")
            .relation(RelationDef::new("left", RelationKind::ManyToOne, "node"))
            .relation(RelationDef::new("right", RelationKind::ManyToOne, "node")),
    ])
    .expect("node schema is valid")
}

/// Live data with base-language values for the given localized fields
pub fn english(fields: &[(&str, &str)]) -> EntityData {
    EntityData {
        localized: fields
            .iter()
            .map(|(field, text)| (field.to_string(), LocalizedValue::from_pairs([("en", *text)])))
            .collect(),
        attributes: BTreeMap::new(),
    }
}

pub fn languages(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|code| code.to_string()).collect()
}

/// Publication service over an in-memory store
pub fn service_with(
    schema: ContentSchema,
    engine: Arc<dyn TranslationEngine>,
    codes: &[&str],
) -> PublicationService {
    init_logging();
    let repository = Repository::new_in_memory().expect("in-memory database");
    let pipeline = TranslationPipeline::new(engine, "en", languages(codes));
    PublicationService::new(repository, Arc::new(schema), pipeline)
}

/// Blog service translating into Vietnamese and Romanian with a recording engine
pub fn blog_service(engine: Arc<RecordingEngine>) -> PublicationService {
    service_with(blog_schema(), engine, &["en", "vi", "ro"])
}

/// Engine answering `{lang}-{text}` and recording every call
#[derive(Debug, Default)]
pub struct RecordingEngine {
    batch: bool,
    failing: HashSet<String>,
    delay: Option<Duration>,
    translate_calls: Mutex<Vec<(String, String)>>,
    batch_calls: Mutex<Vec<BatchTexts>>,
}

impl RecordingEngine {
    /// Field-by-field engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine offering whole-object translation
    pub fn batch() -> Self {
        Self {
            batch: true,
            ..Self::default()
        }
    }

    /// Fail every request for `language`
    pub fn failing_for(mut self, language: &str) -> Self {
        self.failing.insert(language.to_string());
        self
    }

    /// Wait this long before answering each single-text call
    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(delay_ms));
        self
    }

    /// `(language, text)` of every single-text call
    pub fn translate_calls(&self) -> Vec<(String, String)> {
        self.translate_calls.lock().clone()
    }

    /// Every batch request
    pub fn batch_calls(&self) -> Vec<BatchTexts> {
        self.batch_calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.translate_calls.lock().len() + self.batch_calls.lock().len()
    }

    fn failure(language: &str) -> TranslationError {
        TranslationError::Provider(ProviderError::ApiError {
            status_code: 503,
            message: format!("no translations into {}", language),
        })
    }
}

#[async_trait]
impl TranslationEngine for RecordingEngine {
    async fn translate(&self, language: &str, text: &str) -> Result<String, TranslationError> {
        self.translate_calls
            .lock()
            .push((language.to_string(), text.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(language) {
            return Err(Self::failure(language));
        }
        Ok(format!("{}-{}", language, text))
    }

    fn supports_batch_translate(&self) -> bool {
        self.batch
    }

    async fn batch_translate(&self, request: BatchTexts) -> Result<BatchTexts, TranslationError> {
        self.batch_calls.lock().push(request.clone());

        Ok(request
            .into_iter()
            .filter(|(language, _)| !self.failing.contains(language))
            .map(|(language, fields)| {
                let translated: FieldTexts = fields
                    .into_iter()
                    .map(|(field, text)| (field, format!("{}-{}", language, text)))
                    .collect();
                (language, translated)
            })
            .collect())
    }
}
