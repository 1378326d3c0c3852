//! Counters derived from the filtered, unpaginated item set.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::item::{ItemDetail, ItemType, TimelineItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_items: usize,
    pub overdue_tasks: usize,
    pub waiting_quotes: usize,
    pub last_touch_at: Option<DateTime<Utc>>,
    pub last_touch_type: Option<ItemType>,
}

/// Aggregate summary counters.
///
/// A task is overdue when it is due before `now` and not done. A quote is
/// waiting when its deal was sent longer than `waiting_after` ago and its
/// stage is not terminal; each deal counts once.
pub fn summarize(items: &[TimelineItem], now: DateTime<Utc>, waiting_after: Duration) -> Summary {
    // A threshold reaching before the representable range means nothing waits.
    let waiting_cutoff = now
        .checked_sub_signed(waiting_after)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let overdue_tasks = items
        .iter()
        .filter(|item| {
            matches!(
                item.detail,
                ItemDetail::Task { due_at: Some(due), done: false, .. } if due < now
            )
        })
        .count();

    let waiting_quotes = items
        .iter()
        .filter_map(|item| match &item.detail {
            ItemDetail::Quote {
                deal_id,
                sent_at: Some(sent_at),
                stage_family,
                ..
            } if *sent_at < waiting_cutoff
                && !stage_family.map(|f| f.is_terminal()).unwrap_or(false) =>
            {
                Some(*deal_id)
            }
            _ => None,
        })
        .collect::<HashSet<_>>()
        .len();

    let last_touch = items
        .iter()
        .max_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.id.cmp(&b.id)));

    Summary {
        total_items: items.len(),
        overdue_tasks,
        waiting_quotes,
        last_touch_at: last_touch.map(|i| i.ts),
        last_touch_type: last_touch.map(|i| i.item_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::QuoteEvent;
    use crate::stage::StageFamily;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(id: &str, ts: DateTime<Utc>, detail: ItemDetail) -> TimelineItem {
        TimelineItem {
            id: id.into(),
            ts,
            title: String::new(),
            subtitle: None,
            status: None,
            preview: None,
            refs: BTreeMap::new(),
            detail,
        }
    }

    fn task(id: &str, due: Option<DateTime<Utc>>, done: bool) -> TimelineItem {
        item(
            id,
            due.unwrap_or(now()),
            ItemDetail::Task {
                due_at: due,
                assignee_id: None,
                assignee_name: None,
                done,
            },
        )
    }

    fn quote(
        deal_id: Uuid,
        event: QuoteEvent,
        sent_days_ago: i64,
        family: Option<StageFamily>,
    ) -> TimelineItem {
        let sent = now() - Duration::days(sent_days_ago);
        item(
            &format!("quote:{}:{}", deal_id, event.as_str()),
            sent,
            ItemDetail::Quote {
                deal_id,
                event,
                stage: String::new(),
                stage_family: family,
                sent_at: Some(sent),
                amount: None,
                currency: None,
            },
        )
    }

    #[test]
    fn test_empty_set() {
        let summary = summarize(&[], now(), Duration::days(2));
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.last_touch_at, None);
        assert_eq!(summary.last_touch_type, None);
    }

    #[test]
    fn test_overdue_tasks() {
        let items = vec![
            task("task:1", Some(now() - Duration::hours(1)), false),
            task("task:2", Some(now() - Duration::hours(1)), true),
            task("task:3", Some(now() + Duration::hours(1)), false),
            task("task:4", None, false),
        ];
        assert_eq!(summarize(&items, now(), Duration::days(2)).overdue_tasks, 1);
    }

    #[test]
    fn test_waiting_quotes_count_each_deal_once() {
        let open = Uuid::new_v4();
        let signed = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let items = vec![
            quote(open, QuoteEvent::Sent, 3, Some(StageFamily::QuoteSent)),
            quote(open, QuoteEvent::Negotiation, 3, Some(StageFamily::QuoteSent)),
            quote(signed, QuoteEvent::Sent, 5, Some(StageFamily::Signed)),
            quote(fresh, QuoteEvent::Sent, 1, None),
        ];
        assert_eq!(summarize(&items, now(), Duration::days(2)).waiting_quotes, 1);
    }

    #[test]
    fn test_canceled_quotes_do_not_wait() {
        let items = vec![quote(Uuid::new_v4(), QuoteEvent::Sent, 10, Some(StageFamily::Canceled))];
        assert_eq!(summarize(&items, now(), Duration::days(2)).waiting_quotes, 0);
    }

    #[test]
    fn test_threshold_beyond_calendar_waits_for_nothing() {
        let items = vec![quote(Uuid::new_v4(), QuoteEvent::Sent, 30, None)];
        // Roughly 2.7 million years, past the earliest representable instant.
        let huge = Duration::days(1_000_000_000);
        assert_eq!(summarize(&items, now(), huge).waiting_quotes, 0);
    }

    #[test]
    fn test_last_touch_is_newest_item() {
        let items = vec![
            task("task:1", Some(now() - Duration::days(1)), false),
            quote(Uuid::new_v4(), QuoteEvent::Sent, 3, None),
        ];
        let summary = summarize(&items, now(), Duration::days(2));
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.last_touch_at, Some(now() - Duration::days(1)));
        assert_eq!(summary.last_touch_type, Some(ItemType::Task));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(summarize(&[], now(), Duration::days(2))).unwrap();
        assert!(value.get("totalItems").is_some());
        assert!(value.get("lastTouchType").is_some());
    }
}
