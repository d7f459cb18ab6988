use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{db::race::Race, mongodb::Id};

/// A member running in a race after accepting their nominations.
///
/// `(user_id, convention_id)` is unique: one race per member per convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    #[serde(rename = "_id")]
    pub id: Id,
    pub user_id: Id,
    pub race_id: Id,
    pub convention_id: Id,
    /// When the earliest of their nominations for this race was made.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub nominated_at: DateTime<Utc>,
    /// Nominations held at the moment of acceptance.
    pub nomination_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub accepted_at: DateTime<Utc>,
}

impl Candidacy {
    pub fn new(user_id: Id, race: &Race, nominated_at: DateTime<Utc>, nomination_count: u64) -> Self {
        Self {
            id: Id::new(),
            user_id,
            race_id: race.id,
            convention_id: race.convention_id,
            nominated_at,
            nomination_count,
            accepted_at: Utc::now(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidacy {
        pub fn example(user_id: Id, race: &Race) -> Self {
            Self::new(user_id, race, Utc::now(), 1)
        }
    }
}
