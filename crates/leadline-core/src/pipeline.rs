//! Merge, filter, sort and paginate timeline items.
//!
//! Caller input is never rejected here: unknown type tokens are ignored,
//! unparsable dates leave the window open, and an undecodable cursor means
//! "first page".

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::cursor::{encode_cursor, Cursor};
use crate::error::Result;
use crate::item::{ItemType, TimelineItem};

// =============================================================================
// TYPE FILTER
// =============================================================================

/// Parse a comma-separated type filter. No recognized token means all types.
pub fn parse_types(raw: Option<&str>) -> BTreeSet<ItemType> {
    let parsed: BTreeSet<ItemType> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(ItemType::parse_token)
        .collect();
    if parsed.is_empty() {
        ItemType::ALL.into_iter().collect()
    } else {
        parsed
    }
}

// =============================================================================
// TIME WINDOW
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Parse a window bound.
///
/// A bare `YYYY-MM-DD` covers the whole day: start of day for `from`, the
/// last millisecond for `to`. Full timestamps are RFC 3339, or naive and read
/// as UTC. Anything else is no bound.
pub fn parse_bound(raw: Option<&str>, bound: Bound) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.len() == 10 {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?,
        };
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Inclusive time window; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: parse_bound(from, Bound::Start),
            to: parse_bound(to, Bound::End),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }
}

/// Keep items whose type is selected and whose timestamp falls in the window.
pub fn filter_items(
    items: Vec<TimelineItem>,
    types: &BTreeSet<ItemType>,
    window: &TimeWindow,
) -> Vec<TimelineItem> {
    items
        .into_iter()
        .filter(|item| types.contains(&item.item_type()) && window.contains(item.ts))
        .collect()
}

// =============================================================================
// ORDERING AND PAGINATION
// =============================================================================

/// Newest first; ties broken by descending id.
pub fn sort_items(items: &mut [TimelineItem]) {
    items.sort_by(|a, b| b.ts.cmp(&a.ts).then_with(|| b.id.cmp(&a.id)));
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<TimelineItem>,
    pub next_cursor: Option<String>,
}

/// Slice a sorted item list after `cursor`, keeping at most `limit` items.
pub fn paginate(
    sorted: Vec<TimelineItem>,
    cursor: Option<&Cursor>,
    limit: usize,
) -> Result<Page> {
    let mut remaining = sorted
        .into_iter()
        .filter(|item| cursor.map_or(true, |c| c.precedes(item.ts, &item.id)));

    let items: Vec<TimelineItem> = remaining.by_ref().take(limit).collect();
    let has_more = remaining.next().is_some();

    let next_cursor = match items.last() {
        Some(last) if has_more => Some(encode_cursor(&Cursor::new(last.ts, last.id.clone()))?),
        _ => None,
    };
    Ok(Page { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::decode_cursor;
    use crate::item::ItemDetail;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn item(id: &str, ts: DateTime<Utc>) -> TimelineItem {
        TimelineItem {
            id: id.to_string(),
            ts,
            title: id.to_string(),
            subtitle: None,
            status: None,
            preview: None,
            refs: BTreeMap::new(),
            detail: ItemDetail::Activity {
                activity_type: "note".into(),
            },
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn five() -> Vec<TimelineItem> {
        let mut items: Vec<_> = (0..5)
            .map(|i| item(&format!("activity:{}", i), base() + Duration::hours(i)))
            .collect();
        sort_items(&mut items);
        items
    }

    #[test]
    fn test_parse_types() {
        let all = parse_types(None);
        assert_eq!(all.len(), ItemType::ALL.len());
        assert_eq!(parse_types(Some("bogus,,")), all);

        let some = parse_types(Some("task, sms ,bogus"));
        assert_eq!(some, BTreeSet::from([ItemType::Task, ItemType::Sms]));
    }

    #[test]
    fn test_parse_bound_forms() {
        let day_start = parse_bound(Some("2026-04-01"), Bound::Start).unwrap();
        assert_eq!(day_start, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());

        let day_end = parse_bound(Some("2026-04-01"), Bound::End).unwrap();
        assert_eq!(
            day_end,
            Utc.with_ymd_and_hms(2026, 4, 1, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );

        let offset = parse_bound(Some("2026-04-01T10:00:00+03:30"), Bound::Start).unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2026, 4, 1, 6, 30, 0).unwrap());

        let naive = parse_bound(Some("2026-04-01 10:00:00"), Bound::End).unwrap();
        assert_eq!(naive, Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap());

        assert_eq!(parse_bound(Some("yesterday"), Bound::Start), None);
        assert_eq!(parse_bound(Some("2026-13-01"), Bound::Start), None);
        assert_eq!(parse_bound(None, Bound::End), None);
    }

    #[test]
    fn test_date_only_to_is_inclusive_of_whole_day() {
        let window = TimeWindow::parse(None, Some("2026-04-01"));
        let late = Utc.with_ymd_and_hms(2026, 4, 1, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap() + Duration::milliseconds(1);
        assert!(window.contains(late));
        assert!(!window.contains(next));
    }

    #[test]
    fn test_sort_breaks_ties_by_descending_id() {
        let mut items = vec![item("a", base()), item("c", base()), item("b", base())];
        sort_items(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_paginate_limit_one_then_rest() {
        let first = paginate(five(), None, 1).unwrap();
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].id, "activity:4");
        let token = first.next_cursor.expect("more items remain");

        let cursor = decode_cursor(&token).unwrap();
        let second = paginate(five(), Some(&cursor), 10).unwrap();
        let ids: Vec<_> = second.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["activity:3", "activity:2", "activity:1", "activity:0"]);
        assert_eq!(second.next_cursor, None);
    }

    #[test]
    fn test_following_cursors_visits_everything_once() {
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = paginate(five(), cursor.as_ref(), 2).unwrap();
            seen.extend(page.items.into_iter().map(|i| i.id));
            match page.next_cursor {
                Some(token) => cursor = decode_cursor(&token),
                None => break,
            }
        }
        let expected: Vec<_> = five().into_iter().map(|i| i.id).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_exact_fit_emits_no_cursor() {
        let page = paginate(five(), None, 5).unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_filter_items_by_type_and_window() {
        let items = five();
        let window = TimeWindow {
            from: Some(base() + Duration::hours(1)),
            to: Some(base() + Duration::hours(3)),
        };
        let kept = filter_items(items.clone(), &parse_types(None), &window);
        assert_eq!(kept.len(), 3);

        let none = filter_items(items, &BTreeSet::from([ItemType::Call]), &TimeWindow::default());
        assert!(none.is_empty());
    }
}
