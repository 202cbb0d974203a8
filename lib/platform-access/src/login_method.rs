//! Normalization of the provider's platform affiliation into a login method.

/// Platform tags in priority order, with the login method each maps to.
const PLATFORM_PRIORITY: &[(&str, &str)] = &[
    ("REGISTERED_PLATFORM_EMAIL", "email"),
    ("REGISTERED_PLATFORM_GOOGLE", "google"),
    ("REGISTERED_PLATFORM_APPLE", "apple"),
    ("REGISTERED_PLATFORM_MICROSOFT", "microsoft"),
    ("REGISTERED_PLATFORM_AZURE", "microsoft"),
    ("REGISTERED_PLATFORM_GITHUB", "github"),
];

/// Derives a normalized login method.
///
/// An explicit, non-empty platform field wins. Otherwise the highest
/// priority known tag wins, independent of tag order. Otherwise the first
/// remaining tag is lower-cased. With no tags the result is `None`.
#[must_use]
pub fn derive_login_method<S: AsRef<str>>(explicit: Option<&str>, platforms: &[S]) -> Option<String> {
    if let Some(explicit) = explicit.filter(|p| !p.is_empty()) {
        return Some(explicit.to_string());
    }

    PLATFORM_PRIORITY
        .iter()
        .find(|(tag, _)| platforms.iter().any(|p| p.as_ref() == *tag))
        .map(|(_, method)| (*method).to_string())
        .or_else(|| {
            platforms
                .iter()
                .map(AsRef::as_ref)
                .find(|p| !p.is_empty())
                .map(str::to_lowercase)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn explicit_platform_wins() {
        assert_eq!(
            derive_login_method(Some("apple"), &["REGISTERED_PLATFORM_EMAIL"]),
            Some("apple".to_string())
        );
    }

    #[test]
    fn empty_explicit_platform_is_ignored() {
        assert_eq!(
            derive_login_method(Some(""), &["REGISTERED_PLATFORM_GITHUB"]),
            Some("github".to_string())
        );
    }

    #[test]
    fn priority_ignores_tag_order() {
        let a = ["REGISTERED_PLATFORM_GOOGLE", "REGISTERED_PLATFORM_EMAIL"];
        let b = ["REGISTERED_PLATFORM_EMAIL", "REGISTERED_PLATFORM_GOOGLE"];
        assert_eq!(derive_login_method(None, &a), Some("email".to_string()));
        assert_eq!(derive_login_method(None, &b), Some("email".to_string()));
    }

    #[test]
    fn azure_and_microsoft_map_to_microsoft() {
        assert_eq!(
            derive_login_method(None, &["REGISTERED_PLATFORM_AZURE"]),
            Some("microsoft".to_string())
        );
        assert_eq!(
            derive_login_method(None, &["REGISTERED_PLATFORM_MICROSOFT"]),
            Some("microsoft".to_string())
        );
    }

    #[test]
    fn apple_beats_github() {
        assert_eq!(
            derive_login_method(
                None,
                &["REGISTERED_PLATFORM_GITHUB", "REGISTERED_PLATFORM_APPLE"]
            ),
            Some("apple".to_string())
        );
    }

    #[test]
    fn unknown_tag_is_lower_cased() {
        assert_eq!(
            derive_login_method(None, &["REGISTERED_PLATFORM_DISCORD"]),
            Some("registered_platform_discord".to_string())
        );
    }

    #[test]
    fn no_tags_yields_none() {
        assert_eq!(derive_login_method(None, NONE), None);
        assert_eq!(derive_login_method(Some(""), NONE), None);
    }
}
