use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "public" => Some(PrivacyStatus::Public),
            "unlisted" => Some(PrivacyStatus::Unlisted),
            "private" => Some(PrivacyStatus::Private),
            _ => None,
        }
    }
}

/// Snapshot of one uploaded video, materialized fresh for every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub privacy_status: PrivacyStatus,
    pub category_id: String,
    pub published_at: DateTime<Utc>,
}

/// A pending rewrite of one video's snippet. `category_id` is echoed back
/// untouched because the remote update replaces the whole field group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateInstruction {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub category_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("video {video_id}: missing required field `{field}`")]
    MissingField {
        video_id: String,
        field: &'static str,
    },
    #[error("video {video_id}: invalid publishedAt `{raw}`")]
    BadTimestamp { video_id: String, raw: String },
    #[error("video {video_id}: unknown privacyStatus `{raw}`")]
    UnknownPrivacy { video_id: String, raw: String },
}

impl ValidationError {
    pub fn video_id(&self) -> &str {
        match self {
            ValidationError::MissingField { video_id, .. }
            | ValidationError::BadTimestamp { video_id, .. }
            | ValidationError::UnknownPrivacy { video_id, .. } => video_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_round_trips_through_str() {
        for status in [
            PrivacyStatus::Public,
            PrivacyStatus::Unlisted,
            PrivacyStatus::Private,
        ] {
            assert_eq!(PrivacyStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PrivacyStatus::parse("Public"), None);
        assert_eq!(PrivacyStatus::parse(""), None);
    }

    #[test]
    fn validation_error_exposes_video_id() {
        let err = ValidationError::MissingField {
            video_id: "abc".into(),
            field: "categoryId",
        };
        assert_eq!(err.video_id(), "abc");
        assert!(err.to_string().contains("categoryId"));
    }
}
