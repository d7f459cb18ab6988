use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A vote cast in one round.
///
/// The same document is both the voter's choice and their receipt for the
/// round: `(voter_id, round_id)` is unique, so a second ballot from the same
/// voter in the same round can never be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub id: Id,
    pub voter_id: Id,
    pub round_id: Id,
    pub race_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(voter_id: Id, round_id: Id, race_id: Id, candidate_id: Id) -> Self {
        Self {
            id: Id::new(),
            voter_id,
            round_id,
            race_id,
            candidate_id,
            cast_at: Utc::now(),
        }
    }
}
