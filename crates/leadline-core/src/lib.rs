//! # leadline-core
//!
//! Core types, traits, and timeline assembly for the leadline service.
//!
//! This crate owns everything that does not touch a database or HTTP: the
//! record models, the store trait, lead correlation, per-source
//! normalization, stage classification, cursors, and the pipeline that turns
//! collected items into a paginated feed.
//!
//! ## Log level contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | WARN  | A store is not provisioned and its source was skipped |
//! | DEBUG | Correlation results, per-request assembly counts and timing |

pub mod collect;
pub mod config;
pub mod correlate;
pub mod cursor;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod item;
pub mod memory_store;
pub mod models;
pub mod normalize;
pub mod phone;
pub mod pipeline;
pub mod stage;
pub mod summary;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{CollectorCaps, TimelineConfig};
pub use correlate::CorrelationKeys;
pub use cursor::{decode_cursor, encode_cursor, Cursor};
pub use engine::{LeadView, TimelineEngine, TimelineRequest, TimelineResponse};
pub use error::{Error, Result};
pub use item::{ItemDetail, ItemType, QuoteEvent, SmsLifecycle, TimelineItem};
pub use memory_store::{MemoryStore, StoreKind};
pub use models::*;
pub use stage::{classify_stage, StageFamily};
pub use summary::Summary;
pub use traits::*;
