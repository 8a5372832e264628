use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PrivacyStatus, UpdateInstruction, ValidationError, VideoRecord};

#[derive(Deserialize, Debug)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub content_details: ChannelContentDetails,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Deserialize, Debug)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub content_details: PlaylistItemContentDetails,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: String,
}

/// A `videos.list` item. Everything below `id` is optional on the wire so
/// that incomplete items can be reported rather than failing the batch.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
    #[serde(default)]
    pub status: Option<VideoStatus>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: Option<String>,
}

impl TryFrom<VideoItem> for VideoRecord {
    type Error = ValidationError;

    fn try_from(item: VideoItem) -> Result<Self, Self::Error> {
        let id = item.id;
        let missing = |field: &'static str| ValidationError::MissingField {
            video_id: id.clone(),
            field,
        };
        let snippet = item.snippet.ok_or_else(|| missing("snippet"))?;
        let status = item.status.ok_or_else(|| missing("status"))?;
        let title = snippet.title.ok_or_else(|| missing("title"))?;
        let category_id = snippet
            .category_id
            .filter(|c| !c.is_empty())
            .ok_or_else(|| missing("categoryId"))?;
        let raw_published = snippet
            .published_at
            .ok_or_else(|| missing("publishedAt"))?;
        let raw_privacy = status
            .privacy_status
            .ok_or_else(|| missing("privacyStatus"))?;

        let published_at = DateTime::parse_from_rfc3339(&raw_published)
            .map_err(|_| ValidationError::BadTimestamp {
                video_id: id.clone(),
                raw: raw_published.clone(),
            })?
            .with_timezone(&Utc);
        let privacy_status =
            PrivacyStatus::parse(&raw_privacy).ok_or_else(|| ValidationError::UnknownPrivacy {
                video_id: id.clone(),
                raw: raw_privacy.clone(),
            })?;

        Ok(VideoRecord {
            id,
            title,
            description: snippet.description.unwrap_or_default(),
            privacy_status,
            category_id,
            published_at,
        })
    }
}

/// Body for `PUT videos?part=snippet`.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct VideoUpdateBody<'a> {
    pub id: &'a str,
    pub snippet: SnippetUpdate<'a>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SnippetUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub category_id: &'a str,
}

impl<'a> From<&'a UpdateInstruction> for VideoUpdateBody<'a> {
    fn from(ins: &'a UpdateInstruction) -> Self {
        Self {
            id: &ins.video_id,
            snippet: SnippetUpdate {
                title: &ins.title,
                description: &ins.description,
                category_id: &ins.category_id,
            },
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
