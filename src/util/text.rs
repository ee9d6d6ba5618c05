use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Calculates the display width of a string in terminal columns.
///
/// Guide titles are frequently CJK, which takes two columns per character,
/// so byte or char counts cannot be used for alignment.
///
/// # Examples
///
/// ```
/// use showwatch::util::display_width;
///
/// assert_eq!(display_width("Hello"), 5);
/// assert_eq!(display_width("番組"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: &str = "...";

/// Fits `s` into exactly `width` columns: truncated with "..." when too
/// long, right-padded with spaces when too short.
///
/// Wide characters are never split, so a cut that would land inside one is
/// padded with a space instead.
pub fn fit_to_width(s: &str, width: usize) -> String {
    let full = display_width(s);
    if full <= width {
        let mut out = String::with_capacity(s.len() + width - full);
        out.push_str(s);
        out.extend(std::iter::repeat_n(' ', width - full));
        return out;
    }

    let budget = width.saturating_sub(ELLIPSIS.len());
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    if width >= ELLIPSIS.len() {
        out.push_str(ELLIPSIS);
        used += ELLIPSIS.len();
    }
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    out
}

/// Removes control characters (including ESC, so no ANSI sequences can
/// start) from remote text before it is written to a terminal.
///
/// Tabs become spaces; newlines are dropped since every caller renders a
/// single line.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(char::is_control) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\t' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect(),
    )
}

/// Escapes the five HTML-significant characters for use in element text
/// and double-quoted attribute values.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_pads_short_text() {
        assert_eq!(fit_to_width("ab", 5), "ab   ");
    }

    #[test]
    fn test_fit_exact_width_unchanged() {
        assert_eq!(fit_to_width("abcde", 5), "abcde");
    }

    #[test]
    fn test_fit_truncates_with_ellipsis() {
        assert_eq!(fit_to_width("Hello World", 8), "Hello...");
    }

    #[test]
    fn test_fit_does_not_split_wide_chars() {
        // budget 4 columns → two CJK chars, then ellipsis
        let fitted = fit_to_width("番組表テスト", 7);
        assert_eq!(fitted, "番組...");
        assert_eq!(display_width(&fitted), 7);

        // budget 3 columns → one CJK char plus a pad space
        let fitted = fit_to_width("番組表テスト", 6);
        assert_eq!(display_width(&fitted), 6);
        assert!(fitted.starts_with("番..."));
    }

    #[test]
    fn test_fit_narrow_widths() {
        assert_eq!(fit_to_width("Test title", 0), "");
        assert_eq!(fit_to_width("Test title", 2), "  ");
        assert_eq!(fit_to_width("Test title", 3), "...");
    }

    #[test]
    fn test_strip_clean_text_is_borrowed() {
        assert!(matches!(strip_control_chars("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_removes_escape_and_newlines() {
        assert_eq!(strip_control_chars("a\x1b[31mb\nc\td"), "a[31mbc d");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert!(matches!(escape_html("safe"), Cow::Borrowed(_)));
    }
}
