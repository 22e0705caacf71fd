/*!
 * Translation engine abstraction.
 *
 * An engine turns base-language text into another language, either one
 * text at a time or as one `{field: text}` object per language.
 */

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::TranslationError;

/// Field name to text
pub type FieldTexts = BTreeMap<String, String>;

/// Language code to the fields translated into it
pub type BatchTexts = BTreeMap<String, FieldTexts>;

/// External collaborator performing the actual text translation
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Translate one text into `language`
    async fn translate(&self, language: &str, text: &str) -> Result<String, TranslationError>;

    /// Whether `batch_translate` is implemented
    fn supports_batch_translate(&self) -> bool {
        false
    }

    /// Translate one object of fields per language
    ///
    /// A language whose translation failed may be missing from the result;
    /// the other languages are still returned.
    async fn batch_translate(&self, request: BatchTexts) -> Result<BatchTexts, TranslationError> {
        let _ = request;
        Err(TranslationError::BatchUnsupported)
    }

    /// Check that the backing service is reachable
    async fn check_connection(&self) -> Result<(), TranslationError> {
        Ok(())
    }
}

/// Engine returning the source text unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEngine;

#[async_trait]
impl TranslationEngine for PassthroughEngine {
    async fn translate(&self, _language: &str, text: &str) -> Result<String, TranslationError> {
        Ok(text.to_string())
    }
}
