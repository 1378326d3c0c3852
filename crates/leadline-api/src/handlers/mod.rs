//! HTTP handlers for leadline-api.

pub mod health;
pub mod timeline;
