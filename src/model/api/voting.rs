use chrono::{
    serde::{ts_seconds, ts_seconds_option},
    DateTime, Utc,
};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        id::ApiId,
        race::{MemberRef, RaceSummary},
    },
    common::status::RoundStatus,
    db::round::VotingRound,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: ApiId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVotingResponse {
    pub success: bool,
    pub message: String,
    pub round_id: ApiId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDescription {
    pub id: ApiId,
    pub round_number: u32,
    pub status: RoundStatus,
    pub ballot_count: u64,
    #[serde(with = "ts_seconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "ts_seconds_option")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<VotingRound> for RoundDescription {
    fn from(round: VotingRound) -> Self {
        Self {
            id: round.id.into(),
            round_number: round.round_number,
            status: round.status,
            ballot_count: round.ballot_count,
            started_at: round.started_at,
            closed_at: round.closed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate: MemberRef,
    pub votes: u64,
}

/// Live vote counts for the latest round of a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tallies {
    pub round: Option<RoundDescription>,
    /// Highest first, in tie-break order.
    pub tallies: Vec<CandidateTally>,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStatus {
    pub race: RaceSummary,
    pub current_round: Option<RoundDescription>,
    pub active_candidates: Vec<MemberRef>,
    pub is_complete: bool,
    pub winner_id: Option<ApiId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasVoted {
    pub has_active_round: bool,
    pub has_voted: bool,
}

/// How a closed round ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RoundOutcome {
    #[serde(rename_all = "camelCase")]
    Winner {
        winner_id: ApiId,
        majority: bool,
        tie_broken: bool,
        round: RoundDescription,
        tallies: Vec<CandidateTally>,
    },
    #[serde(rename_all = "camelCase")]
    Elimination {
        eliminated_id: ApiId,
        eliminated_votes: u64,
        tie_broken: bool,
        closed_round: RoundDescription,
        next_round: RoundDescription,
        tallies: Vec<CandidateTally>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRoundResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: RoundOutcome,
}
