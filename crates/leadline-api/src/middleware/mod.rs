//! Request middleware for leadline-api.

pub mod actor_context;
