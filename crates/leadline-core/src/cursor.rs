//! Opaque resumption cursor for timeline pagination.
//!
//! A cursor is base64 over a small tagged JSON object anchoring the last item
//! of the previous page by `(ts, id)`. Decoding never fails loudly: anything
//! that is not a well-formed cursor of a known version decodes to `None`.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CURSOR_VERSION: u8 = 1;

const MAX_CURSOR_CHARS: usize = 2_048;

fn default_version() -> u8 {
    CURSOR_VERSION
}

/// Position of the last item on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default = "default_version")]
    pub v: u8,
    pub ts: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(ts: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            v: CURSOR_VERSION,
            ts,
            id: id.into(),
        }
    }

    /// Whether an item at `(ts, id)` sorts strictly after this cursor in the
    /// descending `(ts, id)` order.
    pub fn precedes(&self, ts: DateTime<Utc>, id: &str) -> bool {
        ts < self.ts || (ts == self.ts && id < self.id.as_str())
    }
}

/// Encode a cursor as URL-safe base64 JSON.
pub fn encode_cursor(cursor: &Cursor) -> Result<String> {
    let bytes = serde_json::to_vec(cursor)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a cursor. Malformed, oversized, or unknown-version input yields `None`.
pub fn decode_cursor(raw: &str) -> Option<Cursor> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > MAX_CURSOR_CHARS {
        return None;
    }
    let bytes = [URL_SAFE_NO_PAD, URL_SAFE, STANDARD, STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(raw.as_bytes()).ok())?;
    let cursor: Cursor = serde_json::from_slice(&bytes).ok()?;
    if cursor.v != CURSOR_VERSION || cursor.id.is_empty() {
        return None;
    }
    Some(cursor)
}
