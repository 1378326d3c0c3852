//! Timeline engine configuration.

use chrono::Duration;

use crate::defaults;

/// Effective settings for timeline assembly.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Page size used when the caller omits `limit` or sends garbage.
    pub default_limit: usize,
    /// Upper clamp for `limit`.
    pub max_limit: usize,
    /// Age after which a sent, non-terminal quote counts as waiting.
    pub waiting_quote_after: Duration,
    /// Maximum characters kept in item previews.
    pub preview_chars: usize,
    /// Per-source row caps.
    pub caps: CollectorCaps,
}

/// Row caps applied to each store query.
#[derive(Debug, Clone, Copy)]
pub struct CollectorCaps {
    pub contacts: usize,
    pub companies: usize,
    pub deals: usize,
    pub tasks: usize,
    pub activities: usize,
    pub calls: usize,
    pub sms: usize,
}

impl Default for CollectorCaps {
    fn default() -> Self {
        Self {
            contacts: defaults::CONTACT_CAP,
            companies: defaults::COMPANY_CAP,
            deals: defaults::DEAL_CAP,
            tasks: defaults::TASK_CAP,
            activities: defaults::ACTIVITY_CAP,
            calls: defaults::CALL_CAP,
            sms: defaults::SMS_CAP,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::PAGE_LIMIT,
            max_limit: defaults::PAGE_LIMIT_MAX,
            waiting_quote_after: Duration::days(defaults::WAITING_QUOTE_DAYS),
            preview_chars: defaults::PREVIEW_CHARS,
            caps: CollectorCaps::default(),
        }
    }
}

impl TimelineConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables:
    ///   TIMELINE_DEFAULT_LIMIT      - default page size (default: 30)
    ///   TIMELINE_MAX_LIMIT          - maximum page size (default: 100)
    ///   TIMELINE_WAITING_QUOTE_DAYS - waiting-quote threshold in days (default: 2)
    ///   TIMELINE_PREVIEW_CHARS      - preview truncation length (default: 140)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let parse_usize = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        let max_limit = parse_usize("TIMELINE_MAX_LIMIT")
            .filter(|n| *n >= defaults::PAGE_LIMIT_MIN)
            .unwrap_or(base.max_limit);
        let default_limit = parse_usize("TIMELINE_DEFAULT_LIMIT")
            .unwrap_or(base.default_limit)
            .clamp(defaults::PAGE_LIMIT_MIN, max_limit);
        let waiting_quote_after = lookup("TIMELINE_WAITING_QUOTE_DAYS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|d| (0..=defaults::WAITING_QUOTE_DAYS_MAX).contains(d))
            .and_then(Duration::try_days)
            .unwrap_or(base.waiting_quote_after);
        let preview_chars = parse_usize("TIMELINE_PREVIEW_CHARS")
            .filter(|n| *n > 0)
            .unwrap_or(base.preview_chars);

        Self {
            default_limit,
            max_limit,
            waiting_quote_after,
            preview_chars,
            caps: base.caps,
        }
    }

    /// Clamp a raw `limit` parameter into `[1, max_limit]`.
    ///
    /// Absent or non-numeric values yield the default page size. Integers too
    /// large for `i64` still clamp by sign.
    pub fn clamp_limit(&self, raw: Option<&str>) -> usize {
        let Some(raw) = raw.map(str::trim) else {
            return self.default_limit;
        };
        match raw.parse::<i64>() {
            Ok(n) if n < defaults::PAGE_LIMIT_MIN as i64 => defaults::PAGE_LIMIT_MIN,
            Ok(n) if n > self.max_limit as i64 => self.max_limit,
            Ok(n) => n as usize,
            Err(_) => match integer_is_negative(raw) {
                Some(true) => defaults::PAGE_LIMIT_MIN,
                Some(false) => self.max_limit,
                None => self.default_limit,
            },
        }
    }
}

/// Sign of a string of decimal digits with an optional sign, or `None` when
/// it is not an integer at all.
fn integer_is_negative(raw: &str) -> Option<bool> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(negative)
}
