//! Room statistics
//!
//! [`compute_stats`] turns a parsed message stream into a [`RoomStatsData`]:
//! per-participant counts, expression token counts, local-time activity
//! histograms, bursts and the fixed awards.
//!
//! The computation is a pure function of its input. Participants are
//! aliased by position in the (sorted) participant list, so the same export
//! always produces the same aliases.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::awards::compute_fixed_awards;
use crate::config::StatsConfig;
use crate::time;
use crate::types::{
    ActivityStats, Burst, ChatMessage, MessageKind, ParticipantStats, RoomStatsData, TokenCounts,
};

struct TokenPatterns {
    laughter: [Regex; 2],
    cry: [Regex; 2],
    punctuation: [Regex; 1],
}

fn token_patterns() -> &'static TokenPatterns {
    static PATTERNS: OnceLock<TokenPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TokenPatterns {
        laughter: [
            Regex::new("ㅋ+").expect("laughter pattern"),
            Regex::new("ㅎ+").expect("laughter pattern"),
        ],
        cry: [
            Regex::new("ㅠ+").expect("cry pattern"),
            Regex::new("ㅜ+").expect("cry pattern"),
        ],
        punctuation: [Regex::new("[!?…]").expect("punctuation pattern")],
    })
}

fn count_matches(text: &str, patterns: &[Regex]) -> u64 {
    patterns
        .iter()
        .map(|p| p.find_iter(text).count() as u64)
        .sum()
}

/// Count expression tokens in one message. Every match counts.
pub fn count_tokens(text: &str) -> TokenCounts {
    let p = token_patterns();
    TokenCounts {
        laughter: count_matches(text, &p.laughter),
        cry: count_matches(text, &p.cry),
        punctuation: count_matches(text, &p.punctuation),
    }
}

/// Alias for the participant at `index` in the sorted list.
///
/// `A`..`Z`, then `AA`..`AZ`, `BA`.. (spreadsheet column numbering), so
/// aliases stay unique past 26 participants.
pub fn alias_for(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Roster with aliases assigned and metrics zeroed.
pub fn build_roster(participants: &[String]) -> Vec<ParticipantStats> {
    participants
        .iter()
        .enumerate()
        .map(|(i, name)| ParticipantStats::new(name.as_str(), alias_for(i)))
        .collect()
}

/// Compute statistics with default windows.
pub fn compute_stats(messages: &[ChatMessage], participants: &[String]) -> RoomStatsData {
    compute_stats_with(messages, participants, &StatsConfig::default())
}

/// Compute statistics.
///
/// `participants` should be the sorted participant list from the parser;
/// aliases follow its order.
pub fn compute_stats_with(
    messages: &[ChatMessage],
    participants: &[String],
    config: &StatsConfig,
) -> RoomStatsData {
    let mut roster = build_roster(participants);
    let index: HashMap<&str, usize> = participants
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut activity = ActivityStats::default();
    let mut total_attachments = 0u64;
    let mut total_messages = 0u64;

    for msg in messages {
        match msg.kind {
            MessageKind::Attachment => {
                total_attachments += 1;
                if let Some(&i) = msg.author.as_deref().and_then(|a| index.get(a)) {
                    roster[i].attachment_count += 1;
                }
            }
            MessageKind::Message => {
                let Some(author) = msg.speaker() else {
                    continue;
                };
                total_messages += 1;

                let Some(&i) = index.get(author) else {
                    continue;
                };
                let stats = &mut roster[i];
                stats.message_count += 1;

                let tokens = count_tokens(&msg.text);
                stats.top_tokens.laughter += tokens.laughter;
                stats.top_tokens.cry += tokens.cry;
                stats.top_tokens.punctuation += tokens.punctuation;

                if let Some(ts) = &msg.timestamp {
                    *activity.by_hour.entry(time::hour_of_day(ts)).or_insert(0) += 1;
                    *activity
                        .by_weekday
                        .entry(time::weekday_index(ts))
                        .or_insert(0) += 1;
                }
            }
            MessageKind::System => {}
        }
    }

    let bursts = detect_bursts(
        messages,
        Duration::minutes(i64::from(config.burst_window_minutes)),
        config.burst_min_messages,
    );

    let fixed_awards = compute_fixed_awards(
        messages,
        &roster,
        Duration::minutes(i64::from(config.quick_reply_minutes)),
    );

    tracing::debug!(
        total_messages,
        total_attachments,
        participants = roster.len(),
        bursts = bursts.len(),
        "Computed room stats"
    );

    RoomStatsData {
        total_messages,
        total_attachments,
        participants: roster,
        activity,
        fixed_awards,
        bursts,
    }
}

/// Find bursts of attributed, timestamped messages.
///
/// Messages are scanned in encounter order. A run is anchored at its first
/// message; a message joins the run while it is within `window` of that
/// anchor (inclusive), otherwise it starts a new run. Runs shorter than
/// `min_messages` are dropped.
pub fn detect_bursts(messages: &[ChatMessage], window: Duration, min_messages: usize) -> Vec<Burst> {
    let mut bursts = Vec::new();
    let mut run: Vec<DateTime<Utc>> = Vec::new();

    let flush = |run: &[DateTime<Utc>], bursts: &mut Vec<Burst>| {
        if let (Some(&start), Some(&end)) = (run.first(), run.last()) {
            if run.len() >= min_messages {
                bursts.push(Burst {
                    start,
                    end,
                    message_count: run.len() as u64,
                });
            }
        }
    };

    let timeline = messages
        .iter()
        .filter(|m| m.speaker().is_some())
        .filter_map(|m| m.timestamp);

    for ts in timeline {
        match run.first() {
            Some(&anchor) if ts - anchor <= window => run.push(ts),
            Some(_) => {
                flush(&run, &mut bursts);
                run.clear();
                run.push(ts);
            }
            None => run.push(ts),
        }
    }
    flush(&run, &mut bursts);

    bursts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        time::to_instant(2024, 3, 15, 21, 0).unwrap() + Duration::minutes(i64::from(minute))
    }

    fn msg(ts: DateTime<Utc>, author: &str, text: &str) -> ChatMessage {
        ChatMessage::spoken(ts, author, text)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_for() {
        assert_eq!(alias_for(0), "A");
        assert_eq!(alias_for(2), "C");
        assert_eq!(alias_for(25), "Z");
        assert_eq!(alias_for(26), "AA");
        assert_eq!(alias_for(27), "AB");
        assert_eq!(alias_for(51), "AZ");
        assert_eq!(alias_for(52), "BA");
        assert_eq!(alias_for(701), "ZZ");
        assert_eq!(alias_for(702), "AAA");
    }

    #[test]
    fn test_token_counts_are_occurrence_based() {
        assert_eq!(count_tokens("ㅋㅋㅋ ㅋㅋ").laughter, 2);
        assert_eq!(count_tokens("ㅋㅋㅎㅎ").laughter, 2);
        assert_eq!(count_tokens("ㅠㅠ ㅜ").cry, 2);
        assert_eq!(count_tokens("진짜?!…").punctuation, 3);
        assert_eq!(count_tokens("plain"), TokenCounts::default());
    }

    #[test]
    fn test_bursts_are_anchor_based() {
        let messages = vec![
            msg(at(0), "A", "1"),
            msg(at(4), "B", "2"),
            msg(at(5), "C", "3"),
            msg(at(6), "A", "4"),
        ];
        let bursts = detect_bursts(&messages, Duration::minutes(5), 3);
        // t=6 is 6 minutes from the anchor at t=0, so it starts a new run
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].message_count, 3);
        assert_eq!(bursts[0].start, at(0));
        assert_eq!(bursts[0].end, at(5));
    }

    #[test]
    fn test_burst_window_excludes_beyond_anchor() {
        let messages = vec![
            msg(at(0), "A", "1"),
            msg(at(4), "B", "2"),
            msg(at(8), "C", "3"),
            msg(at(9), "A", "4"),
        ];
        // 8 - 0 > 5: no run reaches three messages
        assert!(detect_bursts(&messages, Duration::minutes(5), 3).is_empty());
    }

    #[test]
    fn test_final_run_is_flushed() {
        let messages = vec![
            msg(at(0), "A", "1"),
            msg(at(20), "A", "2"),
            msg(at(21), "B", "3"),
            msg(at(25), "A", "4"),
        ];
        let bursts = detect_bursts(&messages, Duration::minutes(5), 3);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].start, at(20));
        assert_eq!(bursts[0].message_count, 3);
    }

    #[test]
    fn test_bursts_skip_unattributed() {
        let messages = vec![
            msg(at(0), "A", "1"),
            ChatMessage::unattributed(MessageKind::Message, "메시지가 삭제되었습니다."),
            ChatMessage::unattributed(MessageKind::Attachment, "사진"),
            msg(at(1), "B", "2"),
        ];
        assert!(detect_bursts(&messages, Duration::minutes(5), 3).is_empty());
    }

    #[test]
    fn test_compute_stats_counts() {
        let messages = vec![
            msg(at(0), "Bob", "ㅋㅋㅋ 진짜?"),
            msg(at(1), "Alice", "ㅠㅠ"),
            msg(at(2), "Bob", "ㅎㅎ!"),
            ChatMessage::unattributed(MessageKind::Attachment, "사진 2장"),
            ChatMessage::unattributed(MessageKind::System, "Alice님이 Bob님을 초대했습니다."),
            ChatMessage::unattributed(MessageKind::Message, "메시지가 삭제되었습니다."),
        ];
        let stats = compute_stats(&messages, &names(&["Alice", "Bob"]));

        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_attachments, 1);
        assert_eq!(stats.fixed_awards.len(), 6);

        let alice = stats.participant("A").unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.message_count, 1);
        assert_eq!(alice.top_tokens.cry, 1);

        let bob = stats.participant("B").unwrap();
        assert_eq!(bob.message_count, 2);
        assert_eq!(bob.top_tokens.laughter, 2);
        assert_eq!(bob.top_tokens.punctuation, 2);
        assert_eq!(bob.attachment_count, 0);

        // 21:00 local on a Friday
        assert_eq!(stats.activity.by_hour.get(&21), Some(&3));
        assert_eq!(stats.activity.by_hour.len(), 1);
        assert_eq!(stats.activity.by_weekday.get(&5), Some(&3));

        assert_eq!(stats.bursts.len(), 1);
        assert_eq!(stats.bursts[0].message_count, 3);
    }

    #[test]
    fn test_compute_stats_empty() {
        let stats = compute_stats(&[], &[]);
        assert_eq!(stats.total_messages, 0);
        assert!(stats.participants.is_empty());
        assert!(stats.activity.by_hour.is_empty());
        assert!(stats.bursts.is_empty());
        assert_eq!(stats.fixed_awards.len(), 6);
    }

    #[test]
    fn test_alias_depends_on_sorted_position() {
        let messages = vec![msg(at(0), "Carol", "hi")];
        let before = compute_stats(&messages, &names(&["Bob", "Carol"]));
        assert_eq!(before.participants[1].alias, "B");

        // A new name sorting first shifts Carol's alias
        let after = compute_stats(&messages, &names(&["Alice", "Bob", "Carol"]));
        assert_eq!(after.participants[2].alias, "C");
    }

    #[test]
    fn test_custom_windows() {
        let messages = vec![
            msg(at(0), "A", "1"),
            msg(at(1), "B", "2"),
        ];
        let config = StatsConfig {
            burst_min_messages: 2,
            ..Default::default()
        };
        let stats = compute_stats_with(&messages, &names(&["A", "B"]), &config);
        assert_eq!(stats.bursts.len(), 1);
    }
}
