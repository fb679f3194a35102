//! Line grammars for exported chat logs
//!
//! Every non-blank line of an export is offered to [`RULES`] in order; the
//! first rule that claims it decides what the line is. Adding a grammar means
//! adding a variant and a table slot, nothing else.
//!
//! ## Supported message lines
//!
//! | Format | Example |
//! |--------|---------|
//! | Dotted | `2024.03.15. 오후 3:45, Alice : hello` |
//! | Korean | `2024년 3월 15일 오후 3:45, Alice : hello` |

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::error::Result;
use crate::types::MessageKind;

/// Marker token that appears in the export header line.
pub const TITLE_MARKER: &str = "카카오톡";
/// Weaker header marker ("conversation"), used when the main one is absent.
const TITLE_FALLBACK_MARKER: &str = "대화";
/// Marker of the "saved on" header line.
const EXPORT_DATE_MARKER: &str = "저장한 날짜";

/// AM/PM indicator of a 12-hour clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    /// 오전
    Am,
    /// 오후
    Pm,
}

impl Meridiem {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "오전" => Some(Meridiem::Am),
            "오후" => Some(Meridiem::Pm),
            _ => None,
        }
    }

    /// Convert a 12-hour clock hour to 0-23.
    ///
    /// Out-of-range input is passed through shifted, so calendar validation
    /// downstream rejects it instead of silently wrapping.
    pub fn to_24h(self, hour: u32) -> u32 {
        match (self, hour) {
            (Meridiem::Pm, h) if h != 12 => h + 12,
            (Meridiem::Am, 12) => 0,
            (_, h) => h,
        }
    }
}

/// Local wall-clock stamp as written in a message line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub meridiem: Meridiem,
    /// Hour as written (12-hour clock)
    pub hour: u32,
    pub minute: u32,
}

impl LocalStamp {
    /// Absolute instant of this stamp.
    pub fn to_instant(&self) -> Result<DateTime<Utc>> {
        crate::time::to_instant(
            self.year,
            self.month,
            self.day,
            self.meridiem.to_24h(self.hour),
            self.minute,
        )
    }
}

/// What a rule extracted from a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<'a> {
    Title(String),
    ExportedAt(&'a str),
    Message {
        stamp: LocalStamp,
        author: &'a str,
        text: &'a str,
    },
    /// A line kept verbatim with no author or time
    Notice(MessageKind),
}

/// Which header fields are still open. Header rules only fire while theirs is.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderState {
    pub has_title: bool,
    pub has_exported_at: bool,
}

/// One line grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRule {
    Title,
    ExportDate,
    DottedMessage,
    KoreanMessage,
    Invite,
    Attachment,
    Deletion,
}

/// Rules in priority order.
pub const RULES: [LineRule; 7] = [
    LineRule::Title,
    LineRule::ExportDate,
    LineRule::DottedMessage,
    LineRule::KoreanMessage,
    LineRule::Invite,
    LineRule::Attachment,
    LineRule::Deletion,
];

struct Patterns {
    dotted: Regex,
    korean: Regex,
    export_date: Regex,
    invite: Regex,
    attachment: Regex,
    deletion: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        dotted: Regex::new(
            r"^(\d{4})\.(\d{2})\.(\d{2})\.\s*(오전|오후)\s*(\d{1,2}):(\d{2}),\s*(.+?)\s*:\s*(.+)$",
        )
        .expect("dotted message pattern"),
        korean: Regex::new(
            r"^(\d{4})년\s*(\d{1,2})월\s*(\d{1,2})일\s*(오전|오후)\s*(\d{1,2}):(\d{2}),\s*(.+?)\s*:\s*(.+)$",
        )
        .expect("korean message pattern"),
        export_date: Regex::new(r"^\d{4}[.년]\s*\d{1,2}[.월]").expect("export date pattern"),
        invite: Regex::new(r"^(.+?)님이\s+(.+?)님을\s+초대했습니다\.$").expect("invite pattern"),
        attachment: Regex::new(r"^(사진|이모티콘)(\s+\d+장)?$").expect("attachment pattern"),
        deletion: Regex::new(r"^메시지가\s+삭제되었습니다\.$").expect("deletion pattern"),
    })
}

/// True if the line is shaped like a spoken message in either format.
pub fn is_message_line(line: &str) -> bool {
    let p = patterns();
    p.dotted.is_match(line) || p.korean.is_match(line)
}

impl LineRule {
    /// Try this rule against a trimmed, non-empty line.
    pub fn apply<'a>(&self, line: &'a str, header: &HeaderState) -> Option<LineMatch<'a>> {
        let p = patterns();
        match self {
            LineRule::Title => {
                if header.has_title || is_message_line(line) {
                    return None;
                }
                extract_title(line).map(LineMatch::Title)
            }
            LineRule::ExportDate => {
                if header.has_exported_at || is_message_line(line) {
                    return None;
                }
                if line.contains(EXPORT_DATE_MARKER) || p.export_date.is_match(line) {
                    Some(LineMatch::ExportedAt(line))
                } else {
                    None
                }
            }
            LineRule::DottedMessage => p.dotted.captures(line).and_then(message_from),
            LineRule::KoreanMessage => p.korean.captures(line).and_then(message_from),
            LineRule::Invite => p
                .invite
                .is_match(line)
                .then_some(LineMatch::Notice(MessageKind::System)),
            LineRule::Attachment => p
                .attachment
                .is_match(line)
                .then_some(LineMatch::Notice(MessageKind::Attachment)),
            LineRule::Deletion => p
                .deletion
                .is_match(line)
                .then_some(LineMatch::Notice(MessageKind::Message)),
        }
    }
}

/// Classify a line against [`RULES`]. `None` means the line is unknown.
pub fn classify<'a>(line: &'a str, header: &HeaderState) -> Option<(LineRule, LineMatch<'a>)> {
    RULES
        .iter()
        .find_map(|rule| rule.apply(line, header).map(|m| (*rule, m)))
}

fn extract_title(line: &str) -> Option<String> {
    let raw = if let Some(idx) = line.find(TITLE_MARKER) {
        &line[..idx]
    } else if line.contains(TITLE_FALLBACK_MARKER) {
        line
    } else {
        return None;
    };

    let title = raw.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn message_from<'a>(caps: Captures<'a>) -> Option<LineMatch<'a>> {
    let field = |i: usize| caps.get(i).map(|m| m.as_str());

    let stamp = LocalStamp {
        year: field(1)?.parse().ok()?,
        month: field(2)?.parse().ok()?,
        day: field(3)?.parse().ok()?,
        meridiem: Meridiem::from_token(field(4)?)?,
        hour: field(5)?.parse().ok()?,
        minute: field(6)?.parse().ok()?,
    };

    Some(LineMatch::Message {
        stamp,
        author: field(7)?,
        text: field(8)?.trim(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> HeaderState {
        HeaderState::default()
    }

    fn closed() -> HeaderState {
        HeaderState {
            has_title: true,
            has_exported_at: true,
        }
    }

    #[test]
    fn test_meridiem_conversion() {
        assert_eq!(Meridiem::Am.to_24h(12), 0);
        assert_eq!(Meridiem::Pm.to_24h(12), 12);
        assert_eq!(Meridiem::Pm.to_24h(1), 13);
        assert_eq!(Meridiem::Am.to_24h(9), 9);
    }

    #[test]
    fn test_dotted_message() {
        let (rule, m) = classify("2024.03.15. 오후 3:45, Alice : hello", &closed()).unwrap();
        assert_eq!(rule, LineRule::DottedMessage);
        match m {
            LineMatch::Message { stamp, author, text } => {
                assert_eq!((stamp.year, stamp.month, stamp.day), (2024, 3, 15));
                assert_eq!(stamp.meridiem, Meridiem::Pm);
                assert_eq!((stamp.hour, stamp.minute), (3, 45));
                assert_eq!(author, "Alice");
                assert_eq!(text, "hello");
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_korean_message_unpadded() {
        let (rule, m) = classify("2024년 3월 5일 오전 9:05, 김철수 : 안녕 : 반가워", &closed()).unwrap();
        assert_eq!(rule, LineRule::KoreanMessage);
        match m {
            LineMatch::Message { stamp, author, text } => {
                assert_eq!((stamp.month, stamp.day, stamp.hour), (3, 5, 9));
                assert_eq!(author, "김철수");
                // Only the first separator splits speaker from text
                assert_eq!(text, "안녕 : 반가워");
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_header_rules_do_not_claim_message_lines() {
        let (rule, _) = classify("2024.03.15. 오후 3:45, Alice : 카카오톡 대화 좋아", &open()).unwrap();
        assert_eq!(rule, LineRule::DottedMessage);
    }

    #[test]
    fn test_title_extraction() {
        // The header text is kept as exported, honorific included
        let (_, m) = classify("친구들 님과 카카오톡 대화", &open()).unwrap();
        assert_eq!(m, LineMatch::Title("친구들 님과".to_string()));

        let (_, m) = classify("우리 동아리 카카오톡 대화", &open()).unwrap();
        assert_eq!(m, LineMatch::Title("우리 동아리".to_string()));

        // Nothing before the marker is not a title
        assert_ne!(
            classify("카카오톡 대화", &open()).map(|(r, _)| r),
            Some(LineRule::Title)
        );
    }

    #[test]
    fn test_export_date_line() {
        let (rule, m) = classify("저장한 날짜 : 2024-03-20 10:00:00", &open()).unwrap();
        assert_eq!(rule, LineRule::ExportDate);
        assert_eq!(m, LineMatch::ExportedAt("저장한 날짜 : 2024-03-20 10:00:00"));

        let (rule, _) = classify("2024년 3월 15일 금요일", &open()).unwrap();
        assert_eq!(rule, LineRule::ExportDate);

        assert!(classify("2024년 3월 15일 금요일", &closed()).is_none());
    }

    #[test]
    fn test_notice_lines() {
        let cases = [
            ("Alice님이 Bob님을 초대했습니다.", MessageKind::System),
            ("사진", MessageKind::Attachment),
            ("사진 3장", MessageKind::Attachment),
            ("이모티콘", MessageKind::Attachment),
            ("메시지가 삭제되었습니다.", MessageKind::Message),
        ];
        for (line, kind) in cases {
            let (_, m) = classify(line, &closed()).unwrap();
            assert_eq!(m, LineMatch::Notice(kind), "line: {}", line);
        }
    }

    #[test]
    fn test_unknown_lines() {
        for line in ["hello world", "사진을 보냈어", "2024.3.15 missing parts", "Alice : hi"] {
            assert!(classify(line, &closed()).is_none(), "line: {}", line);
        }
    }
}
