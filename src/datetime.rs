//! Publish-date normalization for source feed items.
//!
//! Each item's raw `pubDate` is mapped to an effective *sort date* — the
//! date used to order the merged timeline — according to the feed's date
//! rules. The original date is kept separately for the cutoff comparison
//! in the merge step.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike};

/// Per-feed date rules applied while normalizing item publish dates.
#[derive(Debug, Clone, Copy)]
pub struct DateRules {
    /// Feed-specific cutoff year. When earlier than `default_cutoff_year`,
    /// item dates are shifted forward by the difference.
    pub cutoff_year: Option<i32>,
    /// Global cutoff year the shift maps onto.
    pub default_cutoff_year: i32,
    /// Compare items against a pseudo-present-day reference instead of
    /// accepting the feed's own timeline as-is.
    pub date_sync: bool,
}

/// Parses an item's `pubDate` string. Podcast feeds use RFC 2822 almost
/// exclusively, but some generators emit RFC 3339.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// Computes the effective sort date for an item, or `None` when the item
/// must be excluded from the combined feed.
///
/// Rules, in order:
///
/// 1. With `date_sync`, a pseudo-now of tomorrow 23:59:59 (year overridden
///    by `cutoff_year` when set) excludes items dated after it — they are
///    "not yet released" on the synced timeline.
/// 2. With `cutoff_year` earlier than `default_cutoff_year`, the date is
///    shifted forward by the year difference, mapping the feed's historical
///    run onto the combined feed's current timeline.
/// 3. A shifted date past today 23:59:59 is excluded; upstream clocks are
///    not trusted to stay in the past.
///
/// `now` is the caller's local wall-clock time; injecting it keeps the
/// whole pipeline deterministic for a given invocation.
pub fn effective_sort_date(
    original: DateTime<FixedOffset>,
    rules: &DateRules,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    if rules.date_sync {
        let mut pseudo_now = end_of_day(now + Duration::days(1));
        if let Some(year) = rules.cutoff_year {
            pseudo_now = with_year_rolled(pseudo_now, year);
        }
        if original > pseudo_now {
            return None;
        }
    }

    let mut sort_date = original;
    if let Some(year) = rules.cutoff_year {
        if year < rules.default_cutoff_year {
            sort_date = shift_years(sort_date, rules.default_cutoff_year - year);
        }
    }

    if sort_date > end_of_day(now) {
        return None;
    }

    Some(sort_date)
}

/// Same date at 23:59:59 wall clock.
fn end_of_day(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_hour(23)
        .and_then(|d| d.with_minute(59))
        .and_then(|d| d.with_second(59))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Moves a date forward by whole years.
fn shift_years(dt: DateTime<FixedOffset>, years: i32) -> DateTime<FixedOffset> {
    with_year_rolled(dt, dt.year() + years)
}

/// `with_year` with the JS `setFullYear` overflow rule: Feb 29 landing on
/// a non-leap year rolls over to Mar 1.
fn with_year_rolled(dt: DateTime<FixedOffset>, year: i32) -> DateTime<FixedOffset> {
    dt.with_year(year).unwrap_or_else(|| {
        dt.with_day(1)
            .and_then(|d| d.with_month(3))
            .and_then(|d| d.with_year(year))
            .unwrap_or(dt)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    const NOW: &str = "2024-06-15T12:00:00+00:00";

    fn rules(cutoff_year: Option<i32>, date_sync: bool) -> DateRules {
        DateRules {
            cutoff_year,
            default_cutoff_year: 2024,
            date_sync,
        }
    }

    #[test]
    fn parses_rfc2822_and_rfc3339() {
        assert!(parse_pub_date("Mon, 01 Jan 2024 00:00:00 GMT").is_some());
        assert!(parse_pub_date("2024-01-01T00:00:00Z").is_some());
        assert!(parse_pub_date("").is_none());
        assert!(parse_pub_date("not a date").is_none());
    }

    #[test]
    fn plain_past_date_is_kept_unchanged() {
        let original = date("2024-03-01T08:00:00+00:00");
        let sort = effective_sort_date(original, &rules(None, false), date(NOW));
        assert_eq!(sort, Some(original));
    }

    #[test]
    fn future_date_is_dropped() {
        let original = date("2024-06-17T00:00:00+00:00");
        assert_eq!(
            effective_sort_date(original, &rules(None, false), date(NOW)),
            None
        );
    }

    #[test]
    fn today_late_evening_is_kept() {
        // The future guard closes at 23:59:59 today, not at `now` itself.
        let original = date("2024-06-15T23:00:00+00:00");
        assert_eq!(
            effective_sort_date(original, &rules(None, false), date(NOW)),
            Some(original)
        );
    }

    #[test]
    fn cutoff_year_shifts_forward() {
        // Scenario: feed numbered in 2020, combined timeline runs in 2024.
        let original = date("2020-03-01T10:00:00+00:00");
        let sort = effective_sort_date(original, &rules(Some(2020), false), date(NOW)).unwrap();
        assert_eq!(sort, date("2024-03-01T10:00:00+00:00"));
    }

    #[test]
    fn cutoff_year_at_or_after_default_does_not_shift() {
        let original = date("2024-03-01T10:00:00+00:00");
        let sort = effective_sort_date(original, &rules(Some(2024), false), date(NOW)).unwrap();
        assert_eq!(sort, original);
    }

    #[test]
    fn shifted_date_past_today_is_dropped() {
        // 2020-12-01 shifted by 4 years lands in the future relative to now.
        let original = date("2020-12-01T00:00:00+00:00");
        assert_eq!(
            effective_sort_date(original, &rules(Some(2020), false), date(NOW)),
            None
        );
    }

    #[test]
    fn leap_day_rolls_to_march_first() {
        // 2020-02-29 + 3 years: 2023 has no Feb 29.
        let shifted = shift_years(date("2020-02-29T06:00:00+00:00"), 3);
        assert_eq!(shifted, date("2023-03-01T06:00:00+00:00"));
    }

    #[test]
    fn date_sync_drops_items_after_pseudo_now() {
        // Pseudo-now is tomorrow 23:59:59 with the year replaced by the
        // cutoff year: 2020-06-16T23:59:59.
        let kept = date("2020-06-10T00:00:00+00:00");
        let dropped = date("2020-06-17T00:00:00+00:00");
        let r = rules(Some(2020), true);
        assert!(effective_sort_date(kept, &r, date(NOW)).is_some());
        assert_eq!(effective_sort_date(dropped, &r, date(NOW)), None);
    }

    #[test]
    fn date_sync_pseudo_now_on_leap_day_rolls_to_march_first() {
        // Tomorrow is 2024-02-29; overriding the year to non-leap 2023
        // must roll the reference to 2023-03-01T23:59:59, not keep 2024.
        let now = date("2024-02-28T12:00:00+00:00");
        let r = DateRules {
            cutoff_year: Some(2023),
            default_cutoff_year: 2024,
            date_sync: true,
        };
        // After the rolled reference on the synced timeline: dropped.
        assert_eq!(effective_sort_date(date("2023-06-01T00:00:00+00:00"), &r, now), None);
        // Before it: kept, then shifted onto the current year.
        assert_eq!(
            effective_sort_date(date("2023-02-15T00:00:00+00:00"), &r, now),
            Some(date("2024-02-15T00:00:00+00:00"))
        );
    }

    #[test]
    fn date_sync_without_cutoff_uses_plain_tomorrow() {
        let kept = date("2024-06-16T20:00:00+00:00");
        let dropped = date("2024-06-17T00:00:00+00:00");
        let r = rules(None, true);
        // Tomorrow itself survives the sync check but the future guard
        // still removes it afterwards.
        assert_eq!(effective_sort_date(kept, &r, date(NOW)), None);
        assert_eq!(effective_sort_date(dropped, &r, date(NOW)), None);
    }
}
