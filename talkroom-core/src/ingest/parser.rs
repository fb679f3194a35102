//! Chat export parser
//!
//! Turns the text of an export into a [`ParsedChat`].
//!
//! ## Design Principles
//!
//! 1. **Never fails on content**: unknown lines and impossible timestamps are
//!    skipped and counted, the rest of the file is still parsed
//! 2. **Ordered grammars**: classification is delegated to the rule table in
//!    [`super::rules`], first match wins
//! 3. **Private by default**: only counts are logged, never text or names

use std::collections::BTreeSet;

use super::rules::{classify, HeaderState, LineMatch};
use crate::types::{ChatMessage, ParsedChat};

/// Line-level counters from one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Non-blank lines offered to the grammar table
    pub lines: usize,
    /// Lines no grammar claimed
    pub unknown_lines: usize,
    /// Message-shaped lines whose stamp is not a real calendar point
    pub invalid_timestamps: usize,
}

/// Parse an export. See [`parse_chat_with_report`].
pub fn parse_chat(content: &str) -> ParsedChat {
    parse_chat_with_report(content).0
}

/// Parse an export and return line counters alongside the result.
///
/// Any newline convention is accepted (`\n`, `\r\n`, `\r`). Lines are
/// trimmed and blank lines dropped before classification.
pub fn parse_chat_with_report(content: &str) -> (ParsedChat, ParseReport) {
    let mut chat = ParsedChat::default();
    let mut participants = BTreeSet::new();
    let mut header = HeaderState::default();
    let mut report = ParseReport::default();

    let lines = content
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty());

    for line in lines {
        report.lines += 1;

        let Some((_, matched)) = classify(line, &header) else {
            report.unknown_lines += 1;
            continue;
        };

        match matched {
            LineMatch::Title(title) => {
                chat.title = Some(title);
                header.has_title = true;
            }
            LineMatch::ExportedAt(raw) => {
                chat.exported_at = Some(raw.to_string());
                header.has_exported_at = true;
            }
            LineMatch::Message { stamp, author, text } => match stamp.to_instant() {
                Ok(ts) => {
                    participants.insert(author.to_string());
                    chat.messages.push(ChatMessage::spoken(ts, author, text));
                }
                Err(e) => {
                    tracing::trace!(error = %e, "Skipping message line with invalid timestamp");
                    report.invalid_timestamps += 1;
                }
            },
            LineMatch::Notice(kind) => {
                chat.messages.push(ChatMessage::unattributed(kind, line));
            }
        }
    }

    chat.participants = participants.into_iter().collect();

    tracing::debug!(
        lines = report.lines,
        unknown_lines = report.unknown_lines,
        invalid_timestamps = report.invalid_timestamps,
        messages = chat.messages.len(),
        participants = chat.participants.len(),
        has_title = chat.title.is_some(),
        "Parsed chat export"
    );

    (chat, report)
}
