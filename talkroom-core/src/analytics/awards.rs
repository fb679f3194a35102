//! Fixed awards
//!
//! Six rule-computed superlatives, always emitted in [`AwardKind::ALL`]
//! order. Winners are chosen by a fixed ranking chain so the same chat
//! always yields the same winners:
//!
//! 1. primary score, descending
//! 2. (night owl only) share of night messages, descending
//! 3. total messages, descending
//! 4. most recent activity, descending
//! 5. display name, ascending in Korean collation order (Hangul before
//!    Latin, case only decides between otherwise equal names)
//!
//! Input order is not trusted: attributed messages are sorted by time first.

use chrono::{DateTime, Duration, Utc};
use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::time;
use crate::types::{Award, AwardKind, ChatMessage, ParticipantStats};

/// Hours (local, inclusive) that count as night.
const NIGHT_HOURS: std::ops::RangeInclusive<u8> = 0..=5;

struct Patterns {
    laugh: Regex,
    photo: Regex,
    emoticon: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        laugh: Regex::new(r"ㅋㅋ|ㅎㅎ|🤣|😂").expect("laugh pattern"),
        photo: Regex::new(r"^사진(?:\s+(\d+)장)?$").expect("photo pattern"),
        emoticon: Regex::new(r"^이모티콘(?:\s+(\d+)(?:개|장))?$").expect("emoticon pattern"),
    })
}

/// Compare display names the way a Korean reader sorts them.
///
/// Falls back to code point order if the collation data cannot be loaded.
/// Names the collator considers equal are still ordered by code point.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    thread_local! {
        static KOREAN: Option<Collator> =
            Collator::try_new(&locale!("ko").into(), CollatorOptions::new()).ok();
    }

    let collated = KOREAN.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => Ordering::Equal,
    });
    collated.then_with(|| a.cmp(b))
}

/// Per-participant aggregates behind the awards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonTally {
    pub display_name: String,
    pub alias: String,
    pub total_messages: u64,
    pub last_activity: Option<DateTime<Utc>>,
    /// Distinct local calendar days with at least one message
    pub active_days: BTreeSet<String>,
    pub quick_replies: u64,
    /// Messages containing laughter (presence, not occurrences)
    pub laugh_messages: u64,
    /// Photo posts
    pub photo_events: u64,
    /// Photos across all posts (`사진 3장` counts 3); informational only
    pub photo_pieces: u64,
    pub emoticon_events: u64,
    pub night_messages: u64,
}

impl PersonTally {
    fn new(p: &ParticipantStats) -> Self {
        Self {
            display_name: p.display_name.clone(),
            alias: p.alias.clone(),
            ..Default::default()
        }
    }

    /// Score used as the primary key for a category.
    pub fn score(&self, kind: AwardKind) -> u64 {
        match kind {
            AwardKind::Attendance => self.active_days.len() as u64,
            AwardKind::QuickReply => self.quick_replies,
            AwardKind::Laughter => self.laugh_messages,
            AwardKind::Photo => self.photo_events,
            AwardKind::Emoticon => self.emoticon_events,
            AwardKind::NightOwl => self.night_messages,
        }
    }

    fn sort_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.alias
        } else {
            &self.display_name
        }
    }

    fn award_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.display_name
        } else {
            &self.alias
        }
    }
}

struct Timed<'a> {
    ts: DateTime<Utc>,
    author: &'a str,
    text: &'a str,
}

/// Build per-participant tallies from the message stream.
///
/// Messages whose author is not on the roster are ignored, but still take
/// part in quick-reply adjacency.
pub fn tally_participants(
    messages: &[ChatMessage],
    roster: &[ParticipantStats],
    quick_reply_window: Duration,
) -> Vec<PersonTally> {
    let mut people: Vec<PersonTally> = roster.iter().map(PersonTally::new).collect();
    let index: HashMap<String, usize> = people
        .iter()
        .enumerate()
        .map(|(i, p)| (p.display_name.clone(), i))
        .collect();

    let mut timeline: Vec<Timed<'_>> = messages
        .iter()
        .filter_map(|m| {
            Some(Timed {
                ts: m.timestamp?,
                author: m.speaker()?,
                text: &m.text,
            })
        })
        .collect();
    timeline.sort_by_key(|m| m.ts);

    let p = patterns();

    for msg in &timeline {
        let Some(&i) = index.get(msg.author) else {
            continue;
        };
        let person = &mut people[i];

        person.total_messages += 1;
        person.last_activity = person.last_activity.max(Some(msg.ts));
        person.active_days.insert(time::date_key(&msg.ts));

        if p.laugh.is_match(msg.text) {
            person.laugh_messages += 1;
        }

        let body = msg.text.trim();
        if let Some(caps) = p.photo.captures(body) {
            person.photo_events += 1;
            let pieces = caps
                .get(1)
                .and_then(|n| n.as_str().parse::<u64>().ok())
                .unwrap_or(1);
            if pieces > 0 {
                person.photo_pieces += pieces;
            }
        }
        if p.emoticon.is_match(body) {
            person.emoticon_events += 1;
        }

        if NIGHT_HOURS.contains(&time::hour_of_day(&msg.ts)) {
            person.night_messages += 1;
        }
    }

    for pair in timeline.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.author == prev.author || cur.ts - prev.ts > quick_reply_window {
            continue;
        }
        if let Some(&i) = index.get(cur.author) {
            people[i].quick_replies += 1;
        }
    }

    people
}

/// Night share comparison without floating point. Higher share sorts first.
fn compare_night_share(a: &PersonTally, b: &PersonTally) -> Ordering {
    let lhs = a.night_messages as u128 * b.total_messages.max(1) as u128;
    let rhs = b.night_messages as u128 * a.total_messages.max(1) as u128;
    rhs.cmp(&lhs)
}

/// Ranking chain for a category. `Ordering::Less` means `a` ranks higher.
pub fn compare_for(kind: AwardKind, a: &PersonTally, b: &PersonTally) -> Ordering {
    let primary = b.score(kind).cmp(&a.score(kind));
    let extra = match kind {
        AwardKind::NightOwl => compare_night_share(a, b),
        _ => Ordering::Equal,
    };

    primary
        .then(extra)
        .then_with(|| b.total_messages.cmp(&a.total_messages))
        .then_with(|| b.last_activity.cmp(&a.last_activity))
        .then_with(|| compare_names(a.sort_name(), b.sort_name()))
}

/// Highest-ranked participant for a category, `None` for an empty roster.
pub fn pick_winner(kind: AwardKind, people: &[PersonTally]) -> Option<&PersonTally> {
    people.iter().min_by(|a, b| compare_for(kind, a, b))
}

/// Compute the six fixed awards.
///
/// Always returns six entries. With an empty roster every award has an
/// empty `participant`.
pub fn compute_fixed_awards(
    messages: &[ChatMessage],
    roster: &[ParticipantStats],
    quick_reply_window: Duration,
) -> Vec<Award> {
    let people = tally_participants(messages, roster, quick_reply_window);

    AwardKind::ALL
        .into_iter()
        .map(|kind| {
            let winner = pick_winner(kind, &people).map(PersonTally::award_name);
            Award::new(kind, winner.unwrap_or_default())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        time::to_instant(2024, 3, day, hour, minute).unwrap()
    }

    fn msg(ts: DateTime<Utc>, author: &str, text: &str) -> ChatMessage {
        ChatMessage::spoken(ts, author, text)
    }

    fn roster(names: &[&str]) -> Vec<ParticipantStats> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| ParticipantStats::new(*n, crate::analytics::alias_for(i)))
            .collect()
    }

    fn window() -> Duration {
        Duration::minutes(3)
    }

    fn winner_of(awards: &[Award], kind: AwardKind) -> &str {
        &awards[AwardKind::ALL.iter().position(|k| *k == kind).unwrap()].participant
    }

    #[test]
    fn test_always_six_awards() {
        let awards = compute_fixed_awards(&[], &[], window());
        assert_eq!(awards.len(), 6);
        assert!(awards.iter().all(|a| a.participant.is_empty()));

        let kinds: Vec<_> = awards.iter().map(|a| a.kind().unwrap()).collect();
        assert_eq!(kinds, AwardKind::ALL.to_vec());
    }

    #[test]
    fn test_single_participant_wins_everything() {
        let messages = vec![msg(at(15, 15, 45), "Alice", "hello")];
        let awards = compute_fixed_awards(&messages, &roster(&["Alice"]), window());
        assert_eq!(awards.len(), 6);
        assert!(awards.iter().all(|a| a.participant == "A"));
    }

    #[test]
    fn test_attendance_counts_local_days() {
        // 23:30 and 00:30 local fall on the same UTC day but different local days
        let messages = vec![
            msg(at(15, 23, 30), "Bob", "late"),
            msg(at(16, 0, 30), "Bob", "later"),
            msg(at(15, 10, 0), "Alice", "a"),
            msg(at(15, 11, 0), "Alice", "b"),
            msg(at(15, 12, 0), "Alice", "c"),
        ];
        let awards = compute_fixed_awards(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(winner_of(&awards, AwardKind::Attendance), "B");
    }

    #[test]
    fn test_quick_reply_requires_author_change() {
        let messages = vec![
            msg(at(15, 10, 0), "Alice", "1"),
            msg(at(15, 10, 1), "Alice", "2"),
            msg(at(15, 10, 2), "Alice", "3"),
        ];
        let people = tally_participants(&messages, &roster(&["Alice"]), window());
        assert_eq!(people[0].quick_replies, 0);
    }

    #[test]
    fn test_quick_reply_window_and_credit() {
        let messages = vec![
            msg(at(15, 10, 0), "Alice", "q"),
            msg(at(15, 10, 3), "Bob", "within window"),
            // Out of order on purpose; sorted before adjacency
            msg(at(15, 10, 8), "Bob", "fast"),
            msg(at(15, 10, 7), "Alice", "too slow"),
        ];
        let people = tally_participants(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(people[0].quick_replies, 0);
        assert_eq!(people[1].quick_replies, 2);
    }

    #[test]
    fn test_photo_and_emoticon_events() {
        let messages = vec![
            msg(at(15, 10, 0), "Alice", "사진"),
            msg(at(15, 10, 1), "Alice", "사진 3장"),
            msg(at(15, 10, 2), "Bob", "사진 찍자"),
            msg(at(15, 10, 3), "Bob", "이모티콘"),
            msg(at(15, 10, 4), "Bob", "이모티콘 2개"),
        ];
        let people = tally_participants(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(people[0].photo_events, 2);
        assert_eq!(people[0].photo_pieces, 4);
        assert_eq!(people[1].photo_events, 0);
        assert_eq!(people[1].emoticon_events, 2);
    }

    #[test]
    fn test_laughter_counts_messages_not_occurrences() {
        let messages = vec![
            msg(at(15, 10, 0), "Alice", "ㅋㅋㅋ ㅋㅋ ㅎㅎ"),
            msg(at(15, 10, 1), "Bob", "😂"),
            msg(at(15, 10, 2), "Bob", "ㅎㅎ"),
            msg(at(15, 10, 3), "Bob", "ㅋ"),
        ];
        let people = tally_participants(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(people[0].laugh_messages, 1);
        assert_eq!(people[1].laugh_messages, 2);
    }

    #[test]
    fn test_night_owl_ratio_breaks_ties() {
        // Both have 2 night messages; Bob has a higher night share
        let messages = vec![
            msg(at(15, 1, 0), "Alice", "a"),
            msg(at(15, 2, 0), "Alice", "b"),
            msg(at(15, 14, 0), "Alice", "c"),
            msg(at(15, 15, 0), "Alice", "d"),
            msg(at(15, 3, 0), "Bob", "e"),
            msg(at(15, 5, 59), "Bob", "f"),
            msg(at(15, 6, 0), "Bob", "g"),
        ];
        let awards = compute_fixed_awards(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(winner_of(&awards, AwardKind::NightOwl), "B");
    }

    #[test]
    fn test_tie_break_chain() {
        // Equal primary (0 laughs) and equal totals; Bob spoke last
        let messages = vec![
            msg(at(15, 10, 0), "Alice", "a"),
            msg(at(15, 11, 0), "Bob", "b"),
        ];
        let awards = compute_fixed_awards(&messages, &roster(&["Alice", "Bob"]), window());
        assert_eq!(winner_of(&awards, AwardKind::Laughter), "B");

        // Everything equal: name order decides
        let people = roster(&["Bob", "Alice"]);
        let awards = compute_fixed_awards(&[], &people, window());
        assert!(awards.iter().all(|a| a.participant == "B"));
    }

    #[test]
    fn test_name_tie_break_puts_hangul_first() {
        let people = roster(&["Alice", "철수"]);
        let awards = compute_fixed_awards(&[], &people, window());
        assert!(awards.iter().all(|a| a.participant == "B"));
    }

    #[test]
    fn test_name_tie_break_ignores_case_first() {
        // Code point order would pick "Bob" (uppercase sorts before lowercase)
        let people = roster(&["Bob", "alice"]);
        let awards = compute_fixed_awards(&[], &people, window());
        assert!(awards.iter().all(|a| a.participant == "B"));
    }

    #[test]
    fn test_compare_names() {
        let mut names = vec!["철수", "Alice", "bob", "Bob", "alice", "민수"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["민수", "철수", "alice", "Alice", "bob", "Bob"]);
        assert_eq!(compare_names("지영", "지영"), Ordering::Equal);
    }

    #[test]
    fn test_unattributed_and_untimed_lines_ignored() {
        let messages = vec![
            ChatMessage::unattributed(MessageKind::Attachment, "사진"),
            ChatMessage::unattributed(MessageKind::Message, "메시지가 삭제되었습니다."),
            msg(at(15, 10, 0), "Alice", "hi"),
        ];
        let people = tally_participants(&messages, &roster(&["Alice"]), window());
        assert_eq!(people[0].total_messages, 1);
        assert_eq!(people[0].photo_events, 0);
    }

    #[test]
    fn test_alias_falls_back_to_display_name() {
        let people = vec![ParticipantStats::new("Alice", "")];
        let awards = compute_fixed_awards(&[msg(at(15, 10, 0), "Alice", "hi")], &people, window());
        assert!(awards.iter().all(|a| a.participant == "Alice"));
    }
}
