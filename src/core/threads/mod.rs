pub mod thread_models;
pub mod thread_service;
pub mod thread_store;

pub use thread_models::{ConversationTurn, Thread};
pub use thread_service::ThreadService;
pub use thread_store::{ThreadError, ThreadStore};
