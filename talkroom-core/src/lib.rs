//! # talkroom-core
//!
//! Core library for talkroom - statistics and awards for KakaoTalk chat exports.
//!
//! This library provides:
//! - A line-oriented parser for exported chat logs
//! - Fixed UTC+9 time normalization
//! - Per-participant statistics, activity histograms and bursts
//! - Six deterministic fixed awards
//! - An optional narrative port with retries and fallbacks
//! - A room pipeline tying upload, stats and narrative together
//!
//! ## Data flow
//!
//! - **Raw:** export bytes, validated and decoded lossily
//! - **Parsed:** [`ParsedChat`] with real names; lives for one run only
//! - **Derived:** [`RoomStatsData`] keyed by alias; the only thing stored
//!
//! ## Example
//!
//! ```rust
//! use talkroom_core::{compute_stats, parse_chat};
//!
//! let chat = parse_chat("2024.03.15. 오후 3:45, Alice : 안녕 ㅋㅋ");
//! let stats = compute_stats(&chat.messages, &chat.participants);
//!
//! assert_eq!(stats.total_messages, 1);
//! assert_eq!(stats.participants[0].alias, "A");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{compute_stats, compute_stats_with};
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{parse_chat, read_export};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod narrative;
pub mod room;
pub mod time;
pub mod types;
