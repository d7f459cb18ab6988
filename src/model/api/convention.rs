use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::phase::{ConventionPhase, Wave},
    db::convention::{Convention, NewConvention},
};

/// What an admin supplies to create a convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionSpec {
    pub name: String,
    pub year: i32,
}

impl From<ConventionSpec> for NewConvention {
    fn from(spec: ConventionSpec) -> Self {
        NewConvention::new(spec.name, spec.year)
    }
}

/// API-friendly view of a convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConventionDescription {
    pub id: ApiId,
    pub name: String,
    pub year: i32,
    pub phase: ConventionPhase,
    /// The phase as a single tag, e.g. `wave3-voting`.
    pub status: String,
    pub current_wave: Option<Wave>,
}

impl From<Convention> for ConventionDescription {
    fn from(convention: Convention) -> Self {
        let phase = convention.phase;
        Self {
            id: convention.id.into(),
            name: convention.convention.name,
            year: convention.convention.year,
            phase,
            status: phase.to_string(),
            current_wave: phase.wave(),
        }
    }
}
