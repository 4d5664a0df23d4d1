//! Requested-language validation.

use crate::error::CoreError;

/// Sentinel asking the backend to detect the spoken language.
pub const AUTO_LANGUAGE: &str = "auto";

/// ISO 639-1 codes the transcription backend accepts, plus `auto`.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "auto", "en", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "zh", "ar", "hi", "tr", "pl",
    "nl", "sv", "da", "no", "fi", "cs", "sk", "hu", "ro", "bg", "hr", "sl", "et", "lv", "lt",
    "mt", "el",
];

/// Normalise and validate a requested language code.
///
/// `None` and blank strings mean [`AUTO_LANGUAGE`]. The returned code is
/// lowercase.
pub fn normalize_language(requested: Option<&str>) -> Result<String, CoreError> {
    let code = match requested.map(str::trim) {
        None | Some("") => return Ok(AUTO_LANGUAGE.to_string()),
        Some(code) => code.to_ascii_lowercase(),
    };

    if SUPPORTED_LANGUAGES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported language code '{code}'"
        )))
    }
}
