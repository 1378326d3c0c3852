//! Query parameter types for the timeline route.
//!
//! Every field is kept as a raw string. Malformed values are normalized by
//! the engine (ignored bounds, default limit, all types, first page) rather
//! than rejected at extraction. Repeated keys are folded here for the same
//! reason: `type` accumulates, every other key keeps its first non-empty
//! value, and unknown keys are ignored.

use leadline_core::TimelineRequest;

/// `?from=&to=&type=&limit=&cursor=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineParams {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma-separated item types, e.g. `task,quote`.
    pub types: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl TimelineParams {
    /// Fold decoded query pairs, in request order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        let mut types: Vec<String> = Vec::new();

        for (key, value) in pairs {
            if value.trim().is_empty() {
                continue;
            }
            let slot = match key.as_str() {
                "type" => {
                    types.push(value);
                    continue;
                }
                "from" => &mut params.from,
                "to" => &mut params.to,
                "limit" => &mut params.limit,
                "cursor" => &mut params.cursor,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        if !types.is_empty() {
            params.types = Some(types.join(","));
        }
        params
    }
}

impl From<TimelineParams> for TimelineRequest {
    fn from(params: TimelineParams) -> Self {
        TimelineRequest {
            from: params.from,
            to: params.to,
            types: params.types,
            limit: params.limit,
            cursor: params.cursor,
        }
    }
}
