use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::status::RoundStatus,
    mongodb::{serde_optional_datetime, Id},
};

/// One round of voting within a race.
///
/// Rounds are append-only: once closed only `status` and `closed_at` have
/// ever changed. `(race_id, round_number)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingRound {
    #[serde(rename = "_id")]
    pub id: Id,
    pub race_id: Id,
    /// Starts at 1.
    pub round_number: u32,
    pub status: RoundStatus,
    /// Incremented by every ballot; doubles as the write that serialises
    /// voting against closing the round.
    pub ballot_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "serde_optional_datetime")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl VotingRound {
    /// Open a new round.
    pub fn start(race_id: Id, round_number: u32) -> Self {
        Self {
            id: Id::new(),
            race_id,
            round_number,
            status: RoundStatus::Active,
            ballot_count: 0,
            started_at: Utc::now(),
            closed_at: None,
        }
    }
}
