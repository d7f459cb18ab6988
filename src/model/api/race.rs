use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{
        phase::Wave,
        status::{RaceStatus, RidingKind},
    },
    db::{
        location::{Province, Riding},
        member::Member,
        race::Race,
    },
};

/// A member as shown alongside races and ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: ApiId,
    pub name: String,
}

impl From<&Member> for MemberRef {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.into(),
            name: member.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RidingDescription {
    pub id: ApiId,
    pub name: String,
    pub kind: RidingKind,
}

impl From<Riding> for RidingDescription {
    fn from(riding: Riding) -> Self {
        Self {
            id: riding.id.into(),
            name: riding.name,
            kind: riding.kind,
        }
    }
}

/// API-friendly view of a race, without its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSummary {
    pub id: ApiId,
    pub convention_id: ApiId,
    pub riding_id: ApiId,
    pub wave: Wave,
    pub status: RaceStatus,
    pub current_round: u32,
    pub winner_id: Option<ApiId>,
}

impl From<&Race> for RaceSummary {
    fn from(race: &Race) -> Self {
        Self {
            id: race.id.into(),
            convention_id: race.convention_id.into(),
            riding_id: race.riding_id.into(),
            wave: race.wave,
            status: race.status,
            current_round: race.current_round,
            winner_id: race.winner_id.map(Into::into),
        }
    }
}

/// A candidate in a race, with the ranking signals shown on the race page.
/// These signals are not part of any vote tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub nomination_count: u64,
    pub endorsements: u64,
    /// Total supporters across the ideas the candidate has posted.
    pub points: u64,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceDetail {
    pub race: RaceSummary,
    pub riding: RidingDescription,
    /// Sorted by points, then endorsements, highest first.
    pub candidates: Vec<CandidateDescription>,
}

/// How many races one province contributed to a wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvinceReport {
    pub code: String,
    pub name: String,
    pub ridings: u64,
}

impl ProvinceReport {
    pub fn new(province: &Province, ridings: u64) -> Self {
        Self {
            code: province.code.clone(),
            name: province.name.clone(),
            ridings,
        }
    }
}

/// Result of bulk-creating the races for a wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveRacesReport {
    pub wave: Wave,
    /// Races that did not exist before this call.
    pub races_created: u64,
    /// Races for the wave after this call, new or not.
    pub races_total: u64,
    pub provinces: Vec<ProvinceReport>,
    pub message: String,
}
