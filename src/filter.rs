//! Selecting the episodes worth a reminder: not recorded, visible, and
//! airing within the horizon.

use chrono::{DateTime, Duration, Utc};

use crate::storage::Episode;

/// Default number of days ahead that triggers a reminder.
pub const DEFAULT_HORIZON_DAYS: i64 = 5;

/// Largest horizon the config accepts.
pub const MAX_HORIZON_DAYS: i64 = 3650;

/// Which rows count as visible to the user.
///
/// The presentation view only lists broadcasts after the start of the
/// current day, so a past broadcast is never worth a reminder even when it
/// is still unrecorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Every row is visible.
    All,
    /// Rows starting strictly after midnight UTC of `now`'s day.
    Upcoming,
}

impl Visibility {
    /// Build the row predicate for a run happening at `now`.
    pub fn predicate(self, now: DateTime<Utc>) -> impl Fn(&Episode) -> bool {
        let cutoff = start_of_day(now);
        move |episode: &Episode| match self {
            Visibility::All => true,
            Visibility::Upcoming => episode.start_time > cutoff,
        }
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Rows that are unrecorded, pass `visible`, and start before
/// `now + horizon_days`. Input order is kept. A horizon past the end of
/// representable time is unbounded.
pub fn select_unrecorded<'a, F>(
    rows: &'a [Episode],
    visible: F,
    horizon_days: i64,
    now: DateTime<Utc>,
) -> Vec<&'a Episode>
where
    F: Fn(&Episode) -> bool,
{
    let horizon = Duration::try_days(horizon_days).and_then(|d| now.checked_add_signed(d));
    rows.iter()
        .filter(|row| {
            !row.recorded
                && visible(*row)
                && horizon.map_or(true, |limit| row.start_time < limit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ep(title: &str, start: DateTime<Utc>, recorded: bool) -> Episode {
        Episode {
            title: title.into(),
            start_time: start,
            recorded,
            url: format!("https://tv.example.com/{title}"),
        }
    }

    fn titles(rows: Vec<&Episode>) -> Vec<&str> {
        rows.into_iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_within_horizon_selected() {
        let rows = vec![ep("soon", now() + Duration::days(3), false)];
        let selected = select_unrecorded(&rows, |_| true, 5, now());
        assert_eq!(titles(selected), vec!["soon"]);
    }

    #[test]
    fn test_beyond_horizon_not_selected() {
        let rows = vec![ep("later", now() + Duration::days(7), false)];
        assert!(select_unrecorded(&rows, |_| true, 5, now()).is_empty());
    }

    #[test]
    fn test_horizon_bound_is_exclusive() {
        let rows = vec![ep("edge", now() + Duration::days(5), false)];
        assert!(select_unrecorded(&rows, |_| true, 5, now()).is_empty());
    }

    #[test]
    fn test_overflowing_horizon_is_unbounded() {
        let rows = vec![
            ep("far", now() + Duration::days(4000), false),
            ep("done", now() + Duration::days(1), true),
        ];
        let selected = select_unrecorded(&rows, |_| true, 100_000_000, now());
        assert_eq!(titles(selected), vec!["far"]);
        assert_eq!(titles(select_unrecorded(&rows, |_| true, i64::MAX, now())), vec!["far"]);
    }

    #[test]
    fn test_recorded_never_selected() {
        let rows = vec![
            ep("rec-soon", now() + Duration::days(1), true),
            ep("rec-past", now() - Duration::days(1), true),
        ];
        assert!(select_unrecorded(&rows, |_| true, 5, now()).is_empty());
    }

    #[test]
    fn test_invisible_rows_excluded() {
        let rows = vec![
            ep("hidden", now() + Duration::days(1), false),
            ep("shown", now() + Duration::days(2), false),
        ];
        let selected = select_unrecorded(&rows, |e| e.title != "hidden", 5, now());
        assert_eq!(titles(selected), vec!["shown"]);
    }

    #[test]
    fn test_input_order_kept() {
        let rows = vec![
            ep("c", now() + Duration::days(3), false),
            ep("a", now() + Duration::days(1), false),
            ep("b", now() + Duration::days(2), false),
        ];
        let selected = select_unrecorded(&rows, |_| true, 5, now());
        assert_eq!(titles(selected), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_upcoming_visibility_hides_earlier_days_only() {
        let visible = Visibility::Upcoming.predicate(now());
        assert!(visible(&ep("this-morning", now() - Duration::hours(3), false)));
        assert!(!visible(&ep("yesterday", now() - Duration::days(1), false)));
        assert!(!visible(&ep("midnight", start_of_day(now()), false)));
    }

    #[test]
    fn test_upcoming_visibility_in_selection() {
        let rows = vec![
            ep("yesterday", now() - Duration::days(1), false),
            ep("tomorrow", now() + Duration::days(1), false),
        ];
        let selected =
            select_unrecorded(&rows, Visibility::Upcoming.predicate(now()), 5, now());
        assert_eq!(titles(selected), vec!["tomorrow"]);
    }

    #[test]
    fn test_all_visibility() {
        let visible = Visibility::All.predicate(now());
        assert!(visible(&ep("ancient", now() - Duration::days(400), false)));
    }
}
