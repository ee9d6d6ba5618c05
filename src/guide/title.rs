use regex::Regex;
use std::sync::OnceLock;

/// Marker glyph wrapping promotional prefixes such as `●NEW●`.
const MARKER: char = '●';

fn leading_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"^\s*{MARKER}[^{MARKER}]*{MARKER}\s*");
        Regex::new(&pattern).expect("leading marker pattern is valid")
    })
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[[^\[\]]*\]\s*").expect("bracket pattern is valid"))
}

/// Strips broadcast noise from a raw guide title so cosmetic variants of
/// the same episode collapse to one dedup key.
///
/// Rules, in order:
/// 1. a leading `●...●` promotional marker plus adjoining whitespace
/// 2. every `[...]` annotation plus surrounding whitespace
/// 3. leading/trailing whitespace
///
/// The rules are applied until the title stops changing: removing one
/// annotation can expose another (`"[字]●NEW● Show"`), and a cleaned title
/// must clean to itself.
///
/// # Examples
///
/// ```
/// use showwatch::guide::normalize_title;
///
/// assert_eq!(normalize_title("●NEW● Show [HD]"), "Show");
/// assert_eq!(normalize_title("  Plain title  "), "Plain title");
/// ```
pub fn normalize_title(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let without_marker = leading_marker_re().replace(raw, "");
    let without_brackets = bracket_re().replace_all(&without_marker, "");
    without_brackets.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_marker_and_bracket_removed() {
        assert_eq!(normalize_title("●NEW● Show [HD]"), "Show");
    }

    #[test]
    fn test_marker_only_stripped_when_leading() {
        assert_eq!(normalize_title("Show ●NEW●"), "Show ●NEW●");
    }

    #[test]
    fn test_all_brackets_removed() {
        assert_eq!(normalize_title("[新][字] Drama #5 [再]"), "Drama #5");
    }

    #[test]
    fn test_bracket_removal_takes_surrounding_whitespace() {
        assert_eq!(normalize_title("Part [SP] Two"), "PartTwo");
    }

    #[test]
    fn test_unclosed_bracket_left_alone() {
        assert_eq!(normalize_title("Show [HD"), "Show [HD");
    }

    #[test]
    fn test_nested_brackets_collapse_fully() {
        assert_eq!(normalize_title("Show [a[b]c]"), "Show");
    }

    #[test]
    fn test_bracket_exposing_marker() {
        assert_eq!(normalize_title("[字]●NEW● Show"), "Show");
    }

    #[test]
    fn test_only_noise_yields_empty() {
        assert_eq!(normalize_title("●NEW● [HD]"), "");
        assert_eq!(normalize_title(""), "");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[ a-zA-Z●\\[\\]字]{0,24}") {
            let once = normalize_title(&raw);
            prop_assert_eq!(normalize_title(&once), once);
        }

        #[test]
        fn prop_normalized_has_no_outer_whitespace(raw in "\\PC{0,32}") {
            let cleaned = normalize_title(&raw);
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
        }
    }
}
