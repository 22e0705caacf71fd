/*!
 * Per-entity translation pipeline.
 *
 * For every localized field and every target language the pipeline decides
 * whether a translation is needed (missing value, or `force`) and asks the
 * engine for it, either field by field or with one whole-object request per
 * language when the engine supports it. Generic sub-items of an entity are
 * translated as well, each with its own language diffing.
 */

use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;

use super::engine::{BatchTexts, FieldTexts, TranslationEngine};
use crate::app_config::LanguageConfig;
use crate::content::{ContentSchema, Entity, EntityRef, RelationKind};
use crate::database::Repository;
use crate::errors::TranslationError;
use crate::language_utils;

/// Translates the localized fields of entities into every target language
#[derive(Clone)]
pub struct TranslationPipeline {
    engine: Arc<dyn TranslationEngine>,
    base_language: String,
    languages: Vec<String>,
}

impl TranslationPipeline {
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        base_language: impl Into<String>,
        languages: Vec<String>,
    ) -> Self {
        Self {
            engine,
            base_language: base_language.into(),
            languages,
        }
    }

    pub fn from_config(engine: Arc<dyn TranslationEngine>, languages: &LanguageConfig) -> Self {
        Self::new(engine, languages.base_language.clone(), languages.languages.clone())
    }

    pub fn engine(&self) -> &dyn TranslationEngine {
        self.engine.as_ref()
    }

    pub fn base_language(&self) -> &str {
        &self.base_language
    }

    /// Configured languages except the base language
    pub fn target_languages(&self) -> Vec<String> {
        language_utils::target_languages(&self.languages, &self.base_language)
    }

    /// Base-language text of a field, when there is something to translate
    fn source_text<'a>(&self, entity: &'a Entity, field: &str) -> Option<&'a str> {
        entity
            .localized(field)
            .and_then(|value| value.text(&self.base_language))
            .filter(|text| !text.is_empty())
    }

    fn needs_translation(entity: &Entity, field: &str, language: &str, force: bool) -> bool {
        force || !entity.localized(field).is_some_and(|value| value.is_filled(language))
    }

    /// Translate the localized fields of one entity in place
    ///
    /// Returns the number of values written. In field-by-field mode the
    /// first engine error is returned and the entity must be discarded.
    pub async fn translate_fields(
        &self,
        entity: &mut Entity,
        localized_fields: &[String],
        force: bool,
    ) -> Result<usize, TranslationError> {
        let languages = self.target_languages();

        let written = if self.engine.supports_batch_translate() {
            self.translate_batch(entity, localized_fields, &languages, force).await?
        } else {
            self.translate_each(entity, localized_fields, &languages, force).await?
        };

        debug!("Wrote {} translated value(s) on {}", written, entity.reference);
        Ok(written)
    }

    async fn translate_each(
        &self,
        entity: &mut Entity,
        localized_fields: &[String],
        languages: &[String],
        force: bool,
    ) -> Result<usize, TranslationError> {
        let mut written = 0;

        for field in localized_fields {
            let Some(text) = self.source_text(entity, field).map(str::to_string) else {
                continue;
            };

            for language in languages {
                if !Self::needs_translation(entity, field, language, force) {
                    continue;
                }
                let translated = self.engine.translate(language, &text).await?;
                entity.set_localized(field, language, translated);
                written += 1;
            }
        }

        Ok(written)
    }

    async fn translate_batch(
        &self,
        entity: &mut Entity,
        localized_fields: &[String],
        languages: &[String],
        force: bool,
    ) -> Result<usize, TranslationError> {
        let mut request = BatchTexts::new();

        for language in languages {
            let fields: FieldTexts = localized_fields
                .iter()
                .filter(|field| Self::needs_translation(entity, field, language, force))
                .filter_map(|field| {
                    self.source_text(entity, field)
                        .map(|text| (field.clone(), text.to_string()))
                })
                .collect();

            if fields.is_empty() && !force {
                continue;
            }
            request.insert(language.clone(), fields);
        }

        let response = self.engine.batch_translate(request.clone()).await?;

        let mut written = 0;
        for (language, fields) in response {
            let Some(requested) = request.get(&language) else {
                continue;
            };
            for (field, text) in fields {
                if requested.contains_key(&field) {
                    entity.set_localized(&field, &language, text);
                    written += 1;
                }
            }
        }

        Ok(written)
    }

    /// Translate an entity and, recursively, its generic sub-items
    ///
    /// The root is translated in place. Sub-items are loaded from the
    /// repository, translated with their own language diffing and returned
    /// when anything was written, so the caller can persist them together
    /// with the root.
    pub async fn translate_tree(
        &self,
        entity: &mut Entity,
        schema: &ContentSchema,
        repository: &Repository,
        force: bool,
    ) -> Result<Vec<Entity>, TranslationError> {
        let fields = schema.localized_fields(entity.kind());
        self.translate_fields(entity, fields, force).await?;

        let mut visited: HashSet<EntityRef> = HashSet::from([entity.reference.clone()]);
        let mut pending = self.generic_children(&entity.reference, schema, repository).await?;
        pending.reverse();
        let mut modified = Vec::new();

        while let Some(reference) = pending.pop() {
            if !visited.insert(reference.clone()) {
                continue;
            }

            let mut child = repository.get_entity(&reference).await?;
            let fields = schema.localized_fields(child.kind());
            let written = self.translate_fields(&mut child, fields, force).await?;

            let mut grandchildren = self.generic_children(&reference, schema, repository).await?;
            grandchildren.reverse();
            pending.extend(grandchildren);

            if written > 0 {
                modified.push(child);
            }
        }

        if !modified.is_empty() {
            info!("Translated {} sub-item(s) of {}", modified.len(), entity.reference);
        }
        Ok(modified)
    }

    async fn generic_children(
        &self,
        reference: &EntityRef,
        schema: &ContentSchema,
        repository: &Repository,
    ) -> Result<Vec<EntityRef>, TranslationError> {
        let mut children = Vec::new();
        for relation in schema.relations(&reference.kind) {
            if relation.kind == RelationKind::Generic {
                children.extend(repository.related(reference, relation).await?);
            }
        }
        Ok(children)
    }
}
