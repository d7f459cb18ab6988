//! The slice of the location hierarchy this service reads.

use serde::{Deserialize, Serialize};

use crate::model::{common::status::RidingKind, mongodb::Id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    /// Two-letter postal code, e.g. `BC`.
    pub code: String,
    #[serde(default)]
    pub country_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Riding {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub kind: RidingKind,
    pub province_id: Id,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Province {
        pub fn example(code: &str) -> Self {
            Self {
                id: Id::new(),
                name: format!("Province {code}"),
                code: code.to_string(),
                country_id: None,
            }
        }
    }

    impl Riding {
        pub fn example(name: &str, province: &Province) -> Self {
            Self {
                id: Id::new(),
                name: name.to_string(),
                kind: RidingKind::Federal,
                province_id: province.id,
            }
        }
    }
}
