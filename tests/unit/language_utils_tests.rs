/*!
 * Tests for ISO language code utilities
 */

use headless_cms::language_utils::{
    get_language_name, language_codes_match, normalize_to_part2t, split_language_code,
    target_languages, validate_language_code,
};

#[test]
fn test_normalizeToPart2t_withVariousCodes_shouldReturnTerminologyCode() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("vi").unwrap(), "vie");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t("pt-BR").unwrap(), "por");
    assert!(normalize_to_part2t("zz").is_err());
}

#[test]
fn test_splitLanguageCode_shouldLowercaseAndSplitSubtag() {
    assert_eq!(split_language_code("pt-BR"), ("pt".to_string(), Some("br".to_string())));
    assert_eq!(split_language_code("zh_Hans"), ("zh".to_string(), Some("hans".to_string())));
    assert_eq!(split_language_code(" EN "), ("en".to_string(), None));
}

#[test]
fn test_languageCodesMatch_withSubtags_shouldRequireSameSubtag() {
    assert!(language_codes_match("ro", "rum"));
    assert!(language_codes_match("pt-BR", "por-br"));
    assert!(!language_codes_match("pt-BR", "pt"));
    assert!(!language_codes_match("en", "fr"));
}

#[test]
fn test_getLanguageName_shouldIncludeSubtag() {
    assert_eq!(get_language_name("vi").unwrap(), "Vietnamese");
    assert_eq!(get_language_name("pt-br").unwrap(), "Portuguese (BR)");
    assert!(get_language_name("qq").is_err());
}

#[test]
fn test_validateLanguageCode_withBadSubtag_shouldFail() {
    assert!(validate_language_code("vi").is_ok());
    assert!(validate_language_code("en-verylongsubtag").is_err());
}

#[test]
fn test_targetLanguages_shouldDropBaseLanguageInAnyForm() {
    let languages = vec!["eng".to_string(), "vi".to_string(), "ro".to_string()];
    assert_eq!(target_languages(&languages, "en"), vec!["vi", "ro"]);
}
