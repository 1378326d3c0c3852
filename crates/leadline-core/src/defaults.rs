//! Centralized default constants for leadline.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration falls back to these when an environment override is missing
//! or unparsable.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default timeline page size.
pub const PAGE_LIMIT: usize = 30;

/// Smallest page a caller can request.
pub const PAGE_LIMIT_MIN: usize = 1;

/// Largest page a caller can request.
pub const PAGE_LIMIT_MAX: usize = 100;

// =============================================================================
// COLLECTOR CAPS
// =============================================================================

/// Row cap for contact correlation lookups.
pub const CONTACT_CAP: usize = 200;

/// Row cap for company correlation lookups.
pub const COMPANY_CAP: usize = 200;

/// Row cap for deal lookups (correlation and quote collection).
pub const DEAL_CAP: usize = 120;

/// Row cap for task collection.
pub const TASK_CAP: usize = 150;

/// Row cap for activity collection.
pub const ACTIVITY_CAP: usize = 150;

/// Row cap for call log collection.
pub const CALL_CAP: usize = 200;

/// Row cap for SMS log collection.
pub const SMS_CAP: usize = 200;

// =============================================================================
// TIMELINE RENDERING
// =============================================================================

/// Days after sending before an unanswered quote counts as waiting.
pub const WAITING_QUOTE_DAYS: i64 = 2;

/// Largest accepted waiting-quote threshold (ten years).
pub const WAITING_QUOTE_DAYS_MAX: i64 = 3650;

/// Maximum characters kept in an item preview.
pub const PREVIEW_CHARS: usize = 140;

/// Number of trailing digits of a phone number used for matching.
pub const PHONE_TAIL_DIGITS: usize = 10;

/// Placeholder rendered when a user reference has no usable name.
pub const UNKNOWN_USER: &str = "unknown";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP port.
pub const SERVER_PORT: u16 = 3000;

/// Default database URL for local development.
pub const DATABASE_URL: &str = "postgres://localhost/leadline";
