//! Shared rooms
//!
//! A room is the stored result of one upload: derived statistics, an
//! optional narrative and the two secrets handed back to the uploader (a
//! share slug for viewing, a delete token for removal). Raw chat text never
//! reaches the store.
//!
//! Viewers see a [`RoomView`], which never carries the delete token, and
//! only once the room is ready. Deletion requires the token.
//!
//! [`RoomPipeline::process_upload`] drives a room through its states:
//!
//! ```text
//! validate -> decode -> parse -> create (processing) -> stats -> narrative? -> ready
//!                                              \-> failed (error code recorded)
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analytics::compute_stats_with;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{decode_lossy, parse_chat_with_report, validate_upload};
use crate::narrative::{
    generate_narrative, NarrativeInput, Narrator, ParticipantRef, RetryPolicy, RoomNarrative,
};
use crate::types::{ChatMessage, RoomStatsData};

const TOKEN_BYTES: usize = 24;

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Public identifier for viewing a room.
pub fn generate_share_slug() -> String {
    random_token()
}

/// Secret required to delete a room.
pub fn generate_delete_token() -> String {
    random_token()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Processing,
    Ready,
    Failed,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Processing => "processing",
            RoomStatus::Ready => "ready",
            RoomStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub share_slug: String,
    pub delete_token: String,
    pub title: Option<String>,
    pub status: RoomStatus,
    /// Set when `status` is `Failed`
    pub error_code: Option<String>,
    #[serde(with = "crate::time::iso_millis")]
    pub expires_at: DateTime<Utc>,
    pub participants: Vec<ParticipantRef>,
    pub stats: Option<RoomStatsData>,
    pub narrative: Option<StoredNarrative>,
}

impl RoomRecord {
    /// A fresh room in the `Processing` state.
    pub fn processing(title: Option<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            share_slug: generate_share_slug(),
            delete_token: generate_delete_token(),
            title,
            status: RoomStatus::Processing,
            error_code: None,
            expires_at,
            participants: Vec::new(),
            stats: None,
            narrative: None,
        }
    }
}

/// A generated narrative together with where and when it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNarrative {
    #[serde(flatten)]
    pub content: RoomNarrative,
    /// Model identifier from `narrative.model`
    pub model: String,
    #[serde(with = "crate::time::iso_millis")]
    pub generated_at: DateTime<Utc>,
}

/// Public payload of a ready room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub share_slug: String,
    pub title: Option<String>,
    #[serde(with = "crate::time::iso_millis")]
    pub expires_at: DateTime<Utc>,
    pub participants: Vec<ParticipantRef>,
    pub stats: Option<RoomStatsData>,
    pub narrative: Option<StoredNarrative>,
}

impl From<RoomRecord> for RoomView {
    fn from(room: RoomRecord) -> Self {
        Self {
            share_slug: room.share_slug,
            title: room.title,
            expires_at: room.expires_at,
            participants: room.participants,
            stats: room.stats,
            narrative: room.narrative,
        }
    }
}

/// What the uploader gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReceipt {
    pub share_slug: String,
    pub delete_token: String,
    #[serde(with = "crate::time::iso_millis")]
    pub expires_at: DateTime<Utc>,
}

/// Persistence for rooms.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create(&self, room: RoomRecord) -> Result<()>;

    /// Store stats and the participant list derived from them.
    async fn save_stats(&self, share_slug: &str, stats: &RoomStatsData) -> Result<()>;

    async fn save_narrative(&self, share_slug: &str, narrative: &StoredNarrative) -> Result<()>;

    async fn set_status(
        &self,
        share_slug: &str,
        status: RoomStatus,
        error_code: Option<&str>,
    ) -> Result<()>;

    async fn get(&self, share_slug: &str) -> Result<Option<RoomRecord>>;

    /// Remove a room. Returns whether it existed.
    async fn delete(&self, share_slug: &str) -> Result<bool>;
}

/// In-process room store.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    rooms: Mutex<HashMap<String, RoomRecord>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }

    async fn update<F>(&self, share_slug: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut RoomRecord) + Send,
    {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(share_slug)
            .ok_or_else(|| Error::RoomNotFound(share_slug.to_string()))?;
        apply(room);
        Ok(())
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create(&self, room: RoomRecord) -> Result<()> {
        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(&room.share_slug) {
            return Err(Error::Store("share slug already exists".to_string()));
        }
        rooms.insert(room.share_slug.clone(), room);
        Ok(())
    }

    async fn save_stats(&self, share_slug: &str, stats: &RoomStatsData) -> Result<()> {
        let participants: Vec<ParticipantRef> = stats
            .participants
            .iter()
            .map(|p| ParticipantRef {
                display_name: p.display_name.clone(),
                alias: p.alias.clone(),
            })
            .collect();
        let stats = stats.clone();

        self.update(share_slug, move |room| {
            room.participants = participants;
            room.stats = Some(stats);
        })
        .await
    }

    async fn save_narrative(&self, share_slug: &str, narrative: &StoredNarrative) -> Result<()> {
        let narrative = narrative.clone();
        self.update(share_slug, move |room| room.narrative = Some(narrative))
            .await
    }

    async fn set_status(
        &self,
        share_slug: &str,
        status: RoomStatus,
        error_code: Option<&str>,
    ) -> Result<()> {
        let error_code = error_code.map(str::to_string);
        self.update(share_slug, move |room| {
            room.status = status;
            room.error_code = error_code;
        })
        .await
    }

    async fn get(&self, share_slug: &str) -> Result<Option<RoomRecord>> {
        Ok(self.rooms.lock().await.get(share_slug).cloned())
    }

    async fn delete(&self, share_slug: &str) -> Result<bool> {
        Ok(self.rooms.lock().await.remove(share_slug).is_some())
    }
}

/// Upload-to-room workflow.
pub struct RoomPipeline {
    store: Arc<dyn RoomStore>,
    narrator: Arc<dyn Narrator>,
    config: Config,
}

impl RoomPipeline {
    pub fn new(store: Arc<dyn RoomStore>, narrator: Arc<dyn Narrator>, config: Config) -> Self {
        Self {
            store,
            narrator,
            config,
        }
    }

    /// Turn an uploaded export into a ready room.
    ///
    /// Upload and parse errors are returned before any room exists. Once
    /// the room is created, a stats failure marks it `Failed` with the
    /// error's code. Narrative failures are logged and never fail the
    /// upload.
    pub async fn process_upload(&self, file_name: &str, bytes: &[u8]) -> Result<RoomReceipt> {
        validate_upload(file_name, bytes.len() as u64, &self.config.upload)?;

        let text = decode_lossy(bytes);
        let (chat, report) = parse_chat_with_report(&text);
        tracing::info!(
            messages = chat.messages.len(),
            participants = chat.participants.len(),
            has_title = chat.title.is_some(),
            unknown_lines = report.unknown_lines,
            "Parsed upload"
        );

        if chat.messages.is_empty() {
            return Err(Error::EmptyChat);
        }
        if chat.participants.is_empty() {
            return Err(Error::NoParticipants);
        }

        let expires_at = Utc::now() + Duration::days(i64::from(self.config.upload.room_ttl_days));
        let room = RoomRecord::processing(chat.title.clone(), expires_at);
        let receipt = RoomReceipt {
            share_slug: room.share_slug.clone(),
            delete_token: room.delete_token.clone(),
            expires_at,
        };
        self.store.create(room).await?;

        let slug = receipt.share_slug.as_str();
        let stats = match self.compute(chat.messages, chat.participants).await {
            Ok(stats) => stats,
            Err(e) => return Err(self.fail(slug, e).await),
        };

        if let Err(e) = self.store.save_stats(slug, &stats).await {
            return Err(self.fail(slug, e).await);
        }

        if self.config.narrative.enabled {
            let input = NarrativeInput::new(stats, chat.title, slug);
            let policy = RetryPolicy::from(&self.config.narrative);
            let narrative = StoredNarrative {
                content: generate_narrative(self.narrator.as_ref(), &input, &policy).await,
                model: self.config.narrative.model.clone(),
                generated_at: Utc::now(),
            };
            if let Err(e) = self.store.save_narrative(slug, &narrative).await {
                tracing::warn!(code = e.code(), "Failed to save narrative: {}", e);
            }
        }

        if let Err(e) = self.store.set_status(slug, RoomStatus::Ready, None).await {
            return Err(self.fail(slug, e).await);
        }
        tracing::info!("Room ready");
        Ok(receipt)
    }

    /// Public view of a room.
    ///
    /// Unknown slugs are `NOT_FOUND`; rooms still processing or failed are
    /// `NOT_READY`.
    pub async fn view_room(&self, share_slug: &str) -> Result<RoomView> {
        let room = self
            .store
            .get(share_slug)
            .await?
            .ok_or_else(|| Error::RoomNotFound(share_slug.to_string()))?;

        if room.status != RoomStatus::Ready {
            return Err(Error::NotReady(room.status.to_string()));
        }
        Ok(RoomView::from(room))
    }

    /// Delete a room with the token handed out at upload.
    ///
    /// The token is checked before anything is removed.
    pub async fn delete_room(&self, share_slug: &str, delete_token: Option<&str>) -> Result<()> {
        let token = match delete_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(Error::MissingToken),
        };

        let room = self
            .store
            .get(share_slug)
            .await?
            .ok_or_else(|| Error::RoomNotFound(share_slug.to_string()))?;

        if room.delete_token != token {
            tracing::warn!("Rejected room deletion with a wrong token");
            return Err(Error::InvalidToken);
        }

        if !self.store.delete(share_slug).await? {
            return Err(Error::RoomNotFound(share_slug.to_string()));
        }
        tracing::info!(status = %room.status, "Room deleted");
        Ok(())
    }

    /// Statistics run on the blocking pool; a panic there is a stats failure.
    async fn compute(
        &self,
        messages: Vec<ChatMessage>,
        participants: Vec<String>,
    ) -> Result<RoomStatsData> {
        let config = self.config.stats.clone();
        tokio::task::spawn_blocking(move || compute_stats_with(&messages, &participants, &config))
            .await
            .map_err(|e| Error::Stats(e.to_string()))
    }

    /// Mark the room failed and hand back the error.
    async fn fail(&self, share_slug: &str, error: Error) -> Error {
        tracing::error!(code = error.code(), "Room processing failed: {}", error);
        if let Err(e) = self
            .store
            .set_status(share_slug, RoomStatus::Failed, Some(error.code()))
            .await
        {
            tracing::warn!("Failed to record room failure: {}", e);
        }
        error
    }
}
