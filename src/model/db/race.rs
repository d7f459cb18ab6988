use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{phase::Wave, status::RaceStatus},
    mongodb::Id,
};

/// Core nomination race data, as stored in the database.
///
/// There is at most one race per `(convention_id, riding_id)`; a unique
/// index enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceCore {
    pub convention_id: Id,
    pub riding_id: Id,
    pub wave: Wave,
    pub status: RaceStatus,
    /// Number of the latest round; zero until voting starts.
    pub current_round: u32,
    /// The latest round, whether still active or closed.
    pub current_round_id: Option<Id>,
    pub winner_id: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl RaceCore {
    pub fn new(convention_id: Id, riding_id: Id, wave: Wave) -> Self {
        Self {
            convention_id,
            riding_id,
            wave,
            status: RaceStatus::Open,
            current_round: 0,
            current_round_id: None,
            winner_id: None,
            created_at: Utc::now(),
        }
    }
}

/// A race without an ID.
pub type NewRace = RaceCore;

/// A race from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub race: RaceCore,
}

impl Race {
    /// The round currently accepting ballots, if any.
    pub fn active_round_id(&self) -> Option<Id> {
        match self.status {
            RaceStatus::Voting => self.current_round_id,
            RaceStatus::Open | RaceStatus::Completed => None,
        }
    }
}

impl Deref for Race {
    type Target = RaceCore;

    fn deref(&self) -> &Self::Target {
        &self.race
    }
}

impl DerefMut for Race {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.race
    }
}
