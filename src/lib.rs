//! Tipster Bot
//!
//! Dispatch-and-cache core of a conversational sports tipster:
//! - Classifies each message by language and sentiment
//! - Keeps a short rolling history and topic per user
//! - Routes betting requests to templated, generated tips
//! - Caches every external call behind a TTL with graceful fallbacks
//! - Tracks a per-user activity leaderboard
//!
//! FLOW:
//! MESSAGE → CLASSIFY → CONTEXT → ROUTE → GENERATE/CACHE → REPLY → SCORE

pub mod api;
pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod feeds;
pub mod leaderboard;
pub mod models;
pub mod providers;
pub mod router;
pub mod scheduler;
pub mod storage;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use catalog::{ResponseCatalog, VariantPolicy};
pub use config::BotConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder, InboundMessage, RefreshReport};
pub use error::TipsterError;
pub use scheduler::RefreshScheduler;
