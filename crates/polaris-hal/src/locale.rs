//! System locale query.

/// Map a POSIX locale string such as `fr_FR.UTF-8` to the engine's short
/// language code. Unknown languages map to `"other"`.
pub fn locale_code(posix: &str) -> Option<&'static str> {
    if posix.len() < 2 || posix == "C" || posix == "POSIX" {
        return None;
    }
    let code = if posix.starts_with("zh_CN") {
        "zh"
    } else if posix.starts_with("zh_TW") {
        "tw"
    } else {
        match posix.get(..2).unwrap_or_default() {
            "en" => "en",
            "fr" => "fr",
            "de" => "de",
            "it" => "it",
            "es" => "es",
            "el" => "el",
            "ru" => "ru",
            "ja" => "ja",
            _ => "other",
        }
    };
    Some(code)
}

/// Read the locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, first non-empty
/// wins.
pub fn detect_from_env() -> Option<&'static str> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| locale_code(&value))
}

/// Resolve the locale reported to the engine.
pub fn resolve(fallback: &str, detect: bool) -> String {
    let detected = if detect { detect_from_env() } else { None };
    match detected {
        Some(code) => code.to_string(),
        None => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_codes() {
        assert_eq!(locale_code("en_US.UTF-8"), Some("en"));
        assert_eq!(locale_code("ja_JP.UTF-8"), Some("ja"));
        assert_eq!(locale_code("zh_CN.UTF-8"), Some("zh"));
        assert_eq!(locale_code("zh_TW"), Some("tw"));
        assert_eq!(locale_code("pt_BR"), Some("other"));
        assert_eq!(locale_code("C"), None);
        assert_eq!(locale_code(""), None);
    }

    #[test]
    fn test_resolve_without_detection_uses_fallback() {
        assert_eq!(resolve("ja", false), "ja");
    }
}
