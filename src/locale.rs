//! Translation between Alchemy language codes and Contentful locales.

/// Locale used for single-valued Contentful fields (titles, files) and
/// for locale-independent entry lookups.
pub const DEFAULT_REMOTE_LOCALE: &str = "en-GB";

/// Maps an Alchemy language code onto the matching Contentful locale.
///
/// The table must cover every language code the source schema emits;
/// callers treat a `None` as a fatal configuration error rather than
/// silently dropping the locale.
pub fn remote_locale(code: &str) -> Option<&'static str> {
    match code {
        "de" => Some("de-DE"),
        "en" | "en-gb" => Some("en-GB"),
        "es" => Some("es-ES"),
        "fi" => Some("fi-FI"),
        "fr" => Some("fr-FR"),
        "it" => Some("it-IT"),
        "lv" => Some("lv-LV"),
        "nl" => Some("nl-NL"),
        "pl" => Some("pl-PL"),
        "ro" => Some("ro-RO"),
        "sl" => Some("sl-SI"),
        "sv" => Some("sv-SE"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(remote_locale("de"), Some("de-DE"));
        assert_eq!(remote_locale("en"), Some("en-GB"));
        assert_eq!(remote_locale("en-gb"), Some("en-GB"));
        assert_eq!(remote_locale("sl"), Some("sl-SI"));
        assert_eq!(remote_locale("sv"), Some("sv-SE"));
    }

    #[test]
    fn unknown_code_is_uncovered() {
        assert_eq!(remote_locale("xx"), None);
        assert_eq!(remote_locale(""), None);
    }
}
