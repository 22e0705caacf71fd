//! Language utilities for the language codes content is localized into.
//!
//! Codes are an ISO 639-1 (2-letter) or ISO 639-2 (3-letter) primary tag,
//! optionally followed by a region or script subtag (`pt-br`, `zh-hans`).

use anyhow::{Result, anyhow};
use isolang::Language;

/// Map an ISO 639-2/B code to its ISO 639-2/T form
fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        "gre" => Some("ell"),
        "chi" => Some("zho"),
        "cze" => Some("ces"),
        "ice" => Some("isl"),
        "alb" => Some("sqi"),
        "arm" => Some("hye"),
        "baq" => Some("eus"),
        "bur" => Some("mya"),
        "per" => Some("fas"),
        "geo" => Some("kat"),
        "may" => Some("msa"),
        "mac" => Some("mkd"),
        "rum" => Some("ron"),
        "slo" => Some("slk"),
        "wel" => Some("cym"),
        _ => None,
    }
}

/// Split a code into its lowercase primary tag and optional subtag
pub fn split_language_code(code: &str) -> (String, Option<String>) {
    let normalized = code.trim().to_lowercase().replace('_', "-");
    match normalized.split_once('-') {
        Some((primary, subtag)) => (primary.to_string(), Some(subtag.to_string())),
        None => (normalized, None),
    }
}

fn lookup_primary(primary: &str) -> Option<Language> {
    match primary.len() {
        2 => Language::from_639_1(primary),
        3 => Language::from_639_3(bibliographic_to_terminology(primary).unwrap_or(primary)),
        _ => None,
    }
}

/// Validate a language code used as a localized field key
pub fn validate_language_code(code: &str) -> Result<()> {
    let (primary, subtag) = split_language_code(code);

    if lookup_primary(&primary).is_none() {
        return Err(anyhow!("Invalid language code: {}", code));
    }

    if let Some(subtag) = subtag {
        let valid = (2..=8).contains(&subtag.len()) && subtag.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(anyhow!("Invalid language subtag in code: {}", code));
        }
    }

    Ok(())
}

/// Normalize a primary tag to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let (primary, _) = split_language_code(code);
    lookup_primary(&primary)
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes name the same language and subtag
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    let (_, subtag1) = split_language_code(code1);
    let (_, subtag2) = split_language_code(code2);

    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b && subtag1 == subtag2,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let (primary, subtag) = split_language_code(code);
    let lang = lookup_primary(&primary)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(match subtag {
        Some(subtag) => format!("{} ({})", lang.to_name(), subtag.to_uppercase()),
        None => lang.to_name().to_string(),
    })
}

/// Configured languages other than the base language, in configuration order
pub fn target_languages(languages: &[String], base_language: &str) -> Vec<String> {
    languages
        .iter()
        .filter(|code| !language_codes_match(code, base_language) && code.as_str() != base_language)
        .cloned()
        .collect()
}
