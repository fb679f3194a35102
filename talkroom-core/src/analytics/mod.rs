//! Analytics for parsed chats
//!
//! - [`stats`]: per-participant counts, activity histograms and bursts
//! - [`awards`]: the six fixed awards, ranked deterministically
//!
//! Everything here is a pure function of the parsed messages and the
//! participant list. Output refers to participants by alias only.

pub mod awards;
pub mod stats;

pub use awards::{
    compare_for, compare_names, compute_fixed_awards, pick_winner, tally_participants, PersonTally,
};
pub use stats::{
    alias_for, build_roster, compute_stats, compute_stats_with, count_tokens, detect_bursts,
};
