// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "documents/mod.rs"]
pub mod documents;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "threads/mod.rs"]
pub mod threads;
