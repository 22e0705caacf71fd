/*!
 * Placeholder masking.
 *
 * Content may embed `<getattr>...</getattr>` markup (or the older
 * `<getattr>...<getattr/>` spelling) that must reach readers untouched.
 * Each occurrence is swapped for an opaque token before the text goes to an
 * engine and swapped back afterwards.
 */

use once_cell::sync::Lazy;
use regex::Regex;

static GETATTR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<getattr>.*?(?:</getattr>|<getattr/>)").expect("valid getattr regex")
});

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[KEEP_(\d+)\]\]").expect("valid token regex"));

/// Text with its placeholders replaced by `[[KEEP_n]]` tokens
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedText {
    /// Text to send to the engine
    pub text: String,
    /// Original markup, indexed by token number
    placeholders: Vec<String>,
}

impl MaskedText {
    /// Mask every placeholder in `text`
    pub fn mask(text: &str) -> Self {
        let mut placeholders = Vec::new();
        let masked = GETATTR_REGEX.replace_all(text, |caps: &regex::Captures| {
            placeholders.push(caps[0].to_string());
            format!("[[KEEP_{}]]", placeholders.len() - 1)
        });

        Self {
            text: masked.into_owned(),
            placeholders,
        }
    }

    /// Whether any placeholder was masked
    pub fn has_placeholders(&self) -> bool {
        !self.placeholders.is_empty()
    }

    /// Put the original markup back into a translated text
    ///
    /// Tokens the engine invented are left as they are.
    pub fn restore(&self, translated: &str) -> String {
        if self.placeholders.is_empty() {
            return translated.to_string();
        }

        TOKEN_REGEX
            .replace_all(translated, |caps: &regex::Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.placeholders.get(index))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}
