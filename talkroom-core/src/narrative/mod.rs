//! Narrative generation port
//!
//! A narrative is the playful text shown next to the statistics: a room
//! MBTI, a group fortune and three hot topics. It comes from an external
//! collaborator (typically a language model) behind the [`Narrator`] trait.
//!
//! The collaborator is optional and untrusted:
//!
//! - its output is validated and invalid output counts as a failed attempt
//! - failed attempts are retried per [`RetryPolicy`]
//! - a section that still fails falls back to a fixed default
//!
//! [`generate_narrative`] therefore never fails.

pub mod retry;

pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RoomStatsData;

/// The sixteen MBTI codes a room can be assigned.
pub const MBTI_TYPES: [&str; 16] = [
    "ISTJ", "ISTP", "ISFJ", "ISFP", "INTJ", "INTP", "INFJ", "INFP", "ESTJ", "ESTP", "ESFJ",
    "ESFP", "ENTJ", "ENTP", "ENFJ", "ENFP",
];

/// Number of hot topics a narrative carries.
pub const HOT_TOPIC_COUNT: usize = 3;

// ============================================
// Collaborator input
// ============================================

/// Participant as shown to the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    pub display_name: String,
    pub alias: String,
}

/// Everything the collaborator may see. No raw message text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeInput {
    pub stats: RoomStatsData,
    pub participants: Vec<ParticipantRef>,
    pub title: Option<String>,
    /// Stable per-room seed (the share slug) so a fortune can be reproduced
    pub seed: String,
}

impl NarrativeInput {
    pub fn new(stats: RoomStatsData, title: Option<String>, seed: impl Into<String>) -> Self {
        let participants = stats
            .participants
            .iter()
            .map(|p| ParticipantRef {
                display_name: p.display_name.clone(),
                alias: p.alias.clone(),
            })
            .collect();

        Self {
            stats,
            participants,
            title,
            seed: seed.into(),
        }
    }
}

// ============================================
// Collaborator output
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mbti {
    #[serde(rename = "type")]
    pub code: String,
    pub description: String,
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFortune {
    pub group: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotTopic {
    pub topic: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
}

/// Complete narrative for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNarrative {
    pub mbti: Mbti,
    pub fortune: GroupFortune,
    pub hot_topics: Vec<HotTopic>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn require(condition: bool, what: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Narrative(format!("invalid collaborator output: {}", what)))
    }
}

impl Mbti {
    pub fn validate(&self) -> Result<()> {
        require(MBTI_TYPES.contains(&self.code.as_str()), "unknown MBTI type")?;
        require(char_len(&self.description) >= 10, "MBTI description too short")?;
        require((2..=5).contains(&self.traits.len()), "MBTI needs 2 to 5 traits")
    }

    pub fn fallback() -> Self {
        Self {
            code: "ENFP".to_string(),
            description: "활발하고 재미있는 대화가 많은 톡방이에요!".to_string(),
            traits: vec![
                "활발한 소통".to_string(),
                "감정 표현이 풍부함".to_string(),
                "즐거운 분위기".to_string(),
            ],
        }
    }
}

impl GroupFortune {
    pub fn validate(&self) -> Result<()> {
        require(char_len(&self.group) >= 20, "fortune text too short")?;
        require(
            (2..=5).contains(&self.keywords.len()),
            "fortune needs 2 to 5 keywords",
        )
    }

    pub fn fallback() -> Self {
        Self {
            group: "새해에도 좋은 일만 가득하길 바랍니다!".to_string(),
            keywords: vec!["행복".to_string(), "건강".to_string(), "성장".to_string()],
        }
    }
}

impl HotTopic {
    fn new(topic: &str, description: &str) -> Self {
        Self {
            topic: topic.to_string(),
            description: description.to_string(),
            frequency: Some(0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require(char_len(&self.topic) >= 3, "hot topic title too short")?;
        require(
            char_len(&self.description) >= 10,
            "hot topic description too short",
        )
    }

    pub fn validate_all(topics: &[HotTopic]) -> Result<()> {
        require(
            topics.len() == HOT_TOPIC_COUNT,
            "exactly three hot topics required",
        )?;
        topics.iter().try_for_each(HotTopic::validate)
    }

    /// Fixed topics used when the collaborator fails. Not held to
    /// [`HotTopic::validate`]: `소통` is shorter than a generated title may be.
    pub fn fallback() -> Vec<Self> {
        vec![
            Self::new("일상 대화", "일상적인 대화가 주를 이루는 톡방이에요."),
            Self::new("소통", "활발한 소통이 이루어지는 톡방이에요."),
            Self::new("약속/일정", "약속, 일정, 계획 이야기가 자주 오간 톡방이에요."),
        ]
    }
}

impl RoomNarrative {
    pub fn fallback() -> Self {
        Self {
            mbti: Mbti::fallback(),
            fortune: GroupFortune::fallback(),
            hot_topics: HotTopic::fallback(),
        }
    }
}

// ============================================
// Port
// ============================================

/// External narrative collaborator.
///
/// Implementations return whatever the collaborator produced; validation
/// happens in [`generate_narrative`].
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn mbti(&self, input: &NarrativeInput) -> Result<Mbti>;

    async fn fortune(&self, input: &NarrativeInput) -> Result<GroupFortune>;

    async fn hot_topics(&self, input: &NarrativeInput) -> Result<Vec<HotTopic>>;
}

/// Stand-in for an absent collaborator. Every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNarrator;

#[async_trait]
impl Narrator for DisabledNarrator {
    async fn mbti(&self, _input: &NarrativeInput) -> Result<Mbti> {
        Err(Error::Narrative("narrative generation is disabled".to_string()))
    }

    async fn fortune(&self, _input: &NarrativeInput) -> Result<GroupFortune> {
        Err(Error::Narrative("narrative generation is disabled".to_string()))
    }

    async fn hot_topics(&self, _input: &NarrativeInput) -> Result<Vec<HotTopic>> {
        Err(Error::Narrative("narrative generation is disabled".to_string()))
    }
}

/// Generate all three sections concurrently.
///
/// Each section is retried independently and replaced by its fallback when
/// retries run out, so one bad section never discards the others.
pub async fn generate_narrative(
    narrator: &dyn Narrator,
    input: &NarrativeInput,
    policy: &RetryPolicy,
) -> RoomNarrative {
    let mbti = policy.run("mbti", move || async move {
        let mbti = narrator.mbti(input).await?;
        mbti.validate()?;
        Ok(mbti)
    });

    let fortune = policy.run("fortune", move || async move {
        let fortune = narrator.fortune(input).await?;
        fortune.validate()?;
        Ok(fortune)
    });

    let hot_topics = policy.run("hot_topics", move || async move {
        let topics = narrator.hot_topics(input).await?;
        HotTopic::validate_all(&topics)?;
        Ok(topics)
    });

    let (mbti, fortune, hot_topics) = tokio::join!(mbti, fortune, hot_topics);

    RoomNarrative {
        mbti: mbti.unwrap_or_else(|e| {
            tracing::warn!(code = e.code(), "MBTI generation failed, using fallback");
            Mbti::fallback()
        }),
        fortune: fortune.unwrap_or_else(|e| {
            tracing::warn!(code = e.code(), "Fortune generation failed, using fallback");
            GroupFortune::fallback()
        }),
        hot_topics: hot_topics.unwrap_or_else(|e| {
            tracing::warn!(code = e.code(), "Hot topic generation failed, using fallback");
            HotTopic::fallback()
        }),
    }
}
