//! Core domain types for talkroom
//!
//! Two families of types live here:
//!
//! - **Parsed** types ([`ChatMessage`], [`ParsedChat`]) exist only for the
//!   duration of one analysis run. They carry raw message text and real
//!   participant names and are never persisted.
//! - **Derived** types ([`RoomStatsData`] and its parts) are the only thing
//!   handed to storage and to the narrative collaborator.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Participant** | A display name that authored at least one timestamped message |
//! | **Alias** | Position-derived pseudonym (`A`, `B`, ...) used instead of the real name |
//! | **Burst** | A run of ≥3 attributed messages within a window anchored at the first one |
//! | **Fixed award** | One of six rule-computed superlatives |
//!
//! Derived types serialize with camelCase keys; instants serialize as
//! `2024-03-15T06:45:00.000Z`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Parsed chat
// ============================================

/// Classification of a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A spoken line, or a deletion notice (which has no author)
    Message,
    /// Invite and other room notices
    System,
    /// Bare photo / emoticon marker lines
    Attachment,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::System => "system",
            MessageKind::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(MessageKind::Message),
            "system" => Ok(MessageKind::System),
            "attachment" => Ok(MessageKind::Attachment),
            _ => Err(format!("unknown message kind: {}", s)),
        }
    }
}

/// One line of semantic significance from an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Absolute instant. Always present for attributed messages; `None` for
    /// lines that carry no time of their own (notices, markers, deletions).
    #[serde(rename = "ts", default, with = "crate::time::iso_millis_opt")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Speaker display name, `None` for non-attributable lines
    pub author: Option<String>,
    pub kind: MessageKind,
    /// Message body (speaker prefix removed) or the raw line
    pub text: String,
}

impl ChatMessage {
    /// A spoken line with a known author and time.
    pub fn spoken(timestamp: DateTime<Utc>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp),
            author: Some(author.into()),
            kind: MessageKind::Message,
            text: text.into(),
        }
    }

    /// A line with no author and no time of its own.
    pub fn unattributed(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            author: None,
            kind,
            text: text.into(),
        }
    }

    /// Author of a `message`-kind line, if any.
    pub fn speaker(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Message => self.author.as_deref().filter(|a| !a.is_empty()),
            _ => None,
        }
    }
}

/// Parser output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Export-date header line, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Sorted, deduplicated authors of `message` lines
    pub participants: Vec<String>,
}

// ============================================
// Derived statistics
// ============================================

/// Occurrence counts of the three expression classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    /// ㅋ / ㅎ runs
    pub laughter: u64,
    /// ㅠ / ㅜ runs
    pub cry: u64,
    /// `!`, `?`, `…`
    pub punctuation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub display_name: String,
    pub alias: String,
    pub message_count: u64,
    pub attachment_count: u64,
    pub top_tokens: TokenCounts,
}

impl ParticipantStats {
    /// Fresh roster entry with zeroed metrics.
    pub fn new(display_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            alias: alias.into(),
            message_count: 0,
            attachment_count: 0,
            top_tokens: TokenCounts::default(),
        }
    }
}

/// Sparse activity histograms in local time. Only non-zero buckets appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    /// Hour of day (0-23) -> messages
    pub by_hour: BTreeMap<u8, u64>,
    /// Weekday (0=Sunday .. 6=Saturday) -> messages
    pub by_weekday: BTreeMap<u8, u64>,
}

impl ActivityStats {
    /// Busiest hour, earliest hour on ties.
    pub fn peak_hour(&self) -> Option<u8> {
        peak_bucket(&self.by_hour)
    }

    /// Busiest weekday, lowest index on ties.
    pub fn busiest_weekday(&self) -> Option<u8> {
        peak_bucket(&self.by_weekday)
    }

    /// Get day name from index.
    pub fn day_name(day: u8) -> &'static str {
        match day {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            _ => "Unknown",
        }
    }

    /// Get hour display (e.g., "10am–11am").
    pub fn hour_display(hour: u8) -> String {
        let h = hour % 12;
        let h = if h == 0 { 12 } else { h };
        let period = if hour < 12 { "am" } else { "pm" };
        let next_h = (hour + 1) % 12;
        let next_h = if next_h == 0 { 12 } else { next_h };
        let next_period = if (hour + 1) % 24 < 12 { "am" } else { "pm" };
        format!("{}{}–{}{}", h, period, next_h, next_period)
    }
}

fn peak_bucket(buckets: &BTreeMap<u8, u64>) -> Option<u8> {
    buckets
        .iter()
        .fold(None, |best: Option<(u8, u64)>, (&bucket, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((bucket, count)),
        })
        .map(|(bucket, _)| bucket)
}

/// The six fixed award categories, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwardKind {
    /// Most distinct active days
    Attendance,
    /// Most replies to someone else within the quick-reply window
    QuickReply,
    /// Most messages containing laughter
    Laughter,
    /// Most photo posts
    Photo,
    /// Most emoticon posts
    Emoticon,
    /// Most messages between midnight and 6am
    NightOwl,
}

impl AwardKind {
    pub const ALL: [AwardKind; 6] = [
        AwardKind::Attendance,
        AwardKind::QuickReply,
        AwardKind::Laughter,
        AwardKind::Photo,
        AwardKind::Emoticon,
        AwardKind::NightOwl,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AwardKind::Attendance => "출석왕",
            AwardKind::QuickReply => "칼답러",
            AwardKind::Laughter => "웃음요정상",
            AwardKind::Photo => "짤/사진 공유왕",
            AwardKind::Emoticon => "이모티콘 장인",
            AwardKind::NightOwl => "새벽 감성러",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AwardKind::Attendance => "올해 톡방 문을 가장 자주 열었어요.",
            AwardKind::QuickReply => "답장이 번개처럼 빠른 톡방의 엔진!",
            AwardKind::Laughter => "ㅋㅋ로 분위기 살리는 핵심 멤버.",
            AwardKind::Photo => "추억을 사진으로 남기는 기록 담당.",
            AwardKind::Emoticon => "말 대신 이모티콘으로 감정 전달 완료.",
            AwardKind::NightOwl => "새벽에 톡방을 지키는 감성 담당.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    /// Winner's alias; empty when nobody could win
    pub participant: String,
    pub title: String,
    pub description: String,
}

impl Award {
    pub fn new(kind: AwardKind, participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            title: kind.title().to_string(),
            description: kind.description().to_string(),
        }
    }

    /// Category this award was built from, recovered from its title.
    pub fn kind(&self) -> Option<AwardKind> {
        AwardKind::ALL.into_iter().find(|k| k.title() == self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Burst {
    #[serde(with = "crate::time::iso_millis")]
    pub start: DateTime<Utc>,
    #[serde(with = "crate::time::iso_millis")]
    pub end: DateTime<Utc>,
    pub message_count: u64,
}

/// Everything the core computes for one chat. Contains no raw message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatsData {
    /// `message`-kind lines with an author
    pub total_messages: u64,
    pub total_attachments: u64,
    pub participants: Vec<ParticipantStats>,
    pub activity: ActivityStats,
    /// Always six entries, in [`AwardKind::ALL`] order
    pub fixed_awards: Vec<Award>,
    pub bursts: Vec<Burst>,
}

impl RoomStatsData {
    /// Look up a participant by alias.
    pub fn participant(&self, alias: &str) -> Option<&ParticipantStats> {
        self.participants.iter().find(|p| p.alias == alias)
    }

    /// Award for a category.
    pub fn award(&self, kind: AwardKind) -> Option<&Award> {
        self.fixed_awards.iter().find(|a| a.title == kind.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_roundtrip() {
        for kind in [MessageKind::Message, MessageKind::System, MessageKind::Attachment] {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
        assert!("photo".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_speaker_requires_message_kind() {
        let notice = ChatMessage {
            author: Some("Alice".to_string()),
            ..ChatMessage::unattributed(MessageKind::System, "x")
        };
        assert_eq!(notice.speaker(), None);

        let deleted = ChatMessage::unattributed(MessageKind::Message, "메시지가 삭제되었습니다.");
        assert_eq!(deleted.speaker(), None);
    }

    #[test]
    fn test_peak_bucket_prefers_lowest_on_tie() {
        let mut activity = ActivityStats::default();
        activity.by_hour.insert(9, 4);
        activity.by_hour.insert(21, 4);
        activity.by_hour.insert(3, 1);
        assert_eq!(activity.peak_hour(), Some(9));
        assert_eq!(activity.busiest_weekday(), None);
    }

    #[test]
    fn test_hour_display() {
        assert_eq!(ActivityStats::hour_display(0), "12am–1am");
        assert_eq!(ActivityStats::hour_display(12), "12pm–1pm");
        assert_eq!(ActivityStats::hour_display(23), "11pm–12am");
    }

    #[test]
    fn test_award_kind_lookup() {
        let award = Award::new(AwardKind::NightOwl, "B");
        assert_eq!(award.kind(), Some(AwardKind::NightOwl));
        assert_eq!(award.title, "새벽 감성러");
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = RoomStatsData {
            total_messages: 1,
            total_attachments: 0,
            participants: vec![ParticipantStats::new("Alice", "A")],
            activity: ActivityStats::default(),
            fixed_awards: vec![],
            bursts: vec![],
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalMessages"], 1);
        assert_eq!(json["participants"][0]["displayName"], "Alice");
        assert_eq!(json["participants"][0]["topTokens"]["cry"], 0);
    }
}
