use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{db::race::Race, mongodb::Id};

/// One member nominating another for a race.
///
/// A nominee may hold many nominations for the same race, one per
/// nominator; `(nominator_id, nominee_id, race_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nomination {
    #[serde(rename = "_id")]
    pub id: Id,
    pub nominator_id: Id,
    pub nominee_id: Id,
    pub race_id: Id,
    pub convention_id: Id,
    /// Always the nominee's own home riding.
    pub riding_id: Id,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Nomination {
    pub fn new(nominator_id: Id, nominee_id: Id, race: &Race, message: Option<String>) -> Self {
        Self {
            id: Id::new(),
            nominator_id,
            nominee_id,
            race_id: race.id,
            convention_id: race.convention_id,
            riding_id: race.riding_id,
            message,
            created_at: Utc::now(),
        }
    }
}
