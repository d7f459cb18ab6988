//! Ranking signals owned by the idea and endorsement services.

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An idea posted by a member. Each supporter earns its author a point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    #[serde(rename = "_id")]
    pub id: Id,
    pub author_id: Id,
    #[serde(default)]
    pub supporter_ids: Vec<Id>,
}

/// One member publicly backing a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    #[serde(rename = "_id")]
    pub id: Id,
    pub endorser_id: Id,
    pub candidate_id: Id,
}
