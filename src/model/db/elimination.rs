use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Marks a candidate as out of a race from the given round onwards.
/// `(race_id, candidate_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elimination {
    #[serde(rename = "_id")]
    pub id: Id,
    pub race_id: Id,
    pub round_id: Id,
    pub round_number: u32,
    pub candidate_id: Id,
    /// Their vote count in the round that eliminated them.
    pub votes: u64,
}
