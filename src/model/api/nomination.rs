use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        id::ApiId,
        race::{MemberRef, RaceSummary, RidingDescription},
    },
    common::status::RidingKind,
};

/// A request to nominate a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationRequest {
    pub nominator_id: ApiId,
    pub nominee_id: ApiId,
    /// If given, must be the nominee's own riding.
    #[serde(default)]
    pub riding_id: Option<ApiId>,
    /// Which of the nominee's home ridings to use; federal if absent.
    #[serde(default)]
    pub riding_type: Option<RidingKind>,
    /// If given, must be the race for the nominee's own riding.
    #[serde(default)]
    pub race_id: Option<ApiId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A member acting on their own nominations or candidacy in a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidacyRequest {
    pub user_id: ApiId,
    pub race_id: ApiId,
}

/// Response to a successful nomination or acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationResponse {
    pub success: bool,
    pub message: String,
    pub race_id: ApiId,
    pub nomination_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub riding: Option<RidingDescription>,
}

/// Plain success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationDescription {
    pub id: ApiId,
    pub nominator: MemberRef,
    pub message: Option<String>,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// All of a member's nominations for one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominationGroup {
    pub race: RaceSummary,
    pub riding: RidingDescription,
    pub nominations: Vec<NominationDescription>,
    pub nomination_count: u64,
    pub has_accepted: bool,
}
