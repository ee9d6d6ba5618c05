use super::types::Episode;
use crate::util::{display_width, fit_to_width, strip_control_chars};

const TITLE_MAX_WIDTH: usize = 48;
const START_WIDTH: usize = 19;
const RECORDED_WIDTH: usize = 8;

/// Render episodes as a plain-text table: a header row, then one row per
/// episode with the four stored columns (title, start, recorded, url).
///
/// Row order is the caller's; pass [`Database::upcoming_episodes`] output for
/// the nearest-first view.
///
/// [`Database::upcoming_episodes`]: super::Database::upcoming_episodes
pub fn render_table(episodes: &[Episode]) -> String {
    let titles: Vec<_> = episodes
        .iter()
        .map(|e| strip_control_chars(&e.title).into_owned())
        .collect();
    let title_width = titles
        .iter()
        .map(|t| display_width(t))
        .chain(std::iter::once(display_width("Title")))
        .max()
        .unwrap_or(0)
        .min(TITLE_MAX_WIDTH);

    let mut out = String::new();
    push_row(&mut out, title_width, "Title", "Start (UTC)", "Recorded", "URL");
    for (episode, title) in episodes.iter().zip(&titles) {
        let recorded = if episode.recorded { "[x]" } else { "[ ]" };
        push_row(
            &mut out,
            title_width,
            title,
            &episode.display_start(),
            recorded,
            &strip_control_chars(&episode.url),
        );
    }
    out
}

fn push_row(out: &mut String, title_width: usize, title: &str, start: &str, rec: &str, url: &str) {
    out.push_str(&fit_to_width(title, title_width));
    out.push_str("  ");
    out.push_str(&fit_to_width(start, START_WIDTH));
    out.push_str("  ");
    out.push_str(&fit_to_width(rec, RECORDED_WIDTH));
    out.push_str("  ");
    out.push_str(url);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn episode(title: &str, recorded: bool) -> Episode {
        Episode {
            title: title.into(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap(),
            recorded,
            url: "https://tv.example.com/detail/1".into(),
        }
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let table = render_table(&[]);
        assert_eq!(table.lines().count(), 1);
        assert!(table.starts_with("Title"));
    }

    #[test]
    fn test_rows_show_checkbox_state() {
        let table = render_table(&[episode("First", true), episode("Second", false)]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("[x]"));
        assert!(lines[1].contains("2024/05/01 21:0:0"));
        assert!(lines[2].contains("[ ]"));
        assert!(lines[2].ends_with("https://tv.example.com/detail/1"));
    }

    #[test]
    fn test_columns_align_with_wide_titles() {
        let table = render_table(&[episode("番組", false), episode("Show", false)]);
        let starts: Vec<_> = table
            .lines()
            .skip(1)
            .map(|l| display_width(&l[..l.find("2024").unwrap()]))
            .collect();
        assert_eq!(starts[0], starts[1]);
    }

    #[test]
    fn test_control_chars_stripped_from_titles() {
        let table = render_table(&[episode("Evil\x1b[2JTitle", false)]);
        assert!(!table.contains('\x1b'));
    }
}
