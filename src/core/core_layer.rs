// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "documents/mod.rs"]
pub mod documents;

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "threads/mod.rs"]
pub mod threads;

#[path = "eliza/eliza_bot.rs"]
pub mod eliza;
