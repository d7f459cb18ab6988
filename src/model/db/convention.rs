use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::phase::ConventionPhase, mongodb::Id};

/// Core convention data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionCore {
    pub name: String,
    pub year: i32,
    /// Only ever changed by an explicit phase advance.
    pub phase: ConventionPhase,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ConventionCore {
    /// A new convention that has not started yet.
    pub fn new(name: String, year: i32) -> Self {
        Self {
            name,
            year,
            phase: ConventionPhase::Upcoming,
            created_at: Utc::now(),
        }
    }
}

/// A convention without an ID.
pub type NewConvention = ConventionCore;

/// A convention from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convention {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub convention: ConventionCore,
}

impl Deref for Convention {
    type Target = ConventionCore;

    fn deref(&self) -> &Self::Target {
        &self.convention
    }
}

impl DerefMut for Convention {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.convention
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ConventionCore {
        pub fn example(phase: ConventionPhase) -> Self {
            Self {
                name: "Founding Convention".to_string(),
                year: 2026,
                phase,
                created_at: Utc::now(),
            }
        }
    }
}
