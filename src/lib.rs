// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod browser_pool;
pub mod cli;
pub mod compose;
pub mod config;
pub mod contacts;
pub mod discover;
pub mod fetch;
pub mod history;
pub mod llm;
pub mod outreach_log;
pub mod pain;
pub mod pipeline;
pub mod retry;
pub mod send;

pub use discover::Lead;
pub use fetch::{FetchError, PageContent, PageFetcher};
pub use outreach_log::{LogEntry, LogStatus, OutreachLog};
