use serde::{Deserialize, Serialize};

use crate::model::{common::status::RidingKind, mongodb::Id};

/// A registered member, as kept by the user registry.
///
/// Everything except `candidate` is owned by the registry; this service
/// only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub federal_riding_id: Option<Id>,
    #[serde(default)]
    pub provincial_riding_id: Option<Id>,
    /// Only verified members may vote.
    #[serde(default)]
    pub verified: bool,
    /// Set while the member holds a candidacy.
    #[serde(default)]
    pub candidate: bool,
}

impl Member {
    /// The riding of the given kind the member lives in, if they have set one.
    pub fn home_riding(&self, kind: RidingKind) -> Option<Id> {
        match kind {
            RidingKind::Federal => self.federal_riding_id,
            RidingKind::Provincial => self.provincial_riding_id,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Member {
        pub fn example(name: &str, federal_riding_id: Option<Id>) -> Self {
            Self {
                id: Id::new(),
                name: name.to_string(),
                federal_riding_id,
                provincial_riding_id: None,
                verified: true,
                candidate: false,
            }
        }
    }
}
