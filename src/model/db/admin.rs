use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An administrator account. Credentials live with the external auth
/// service; this record only proves the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    pub username: String,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Admin {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                username: "coordinator".to_string(),
            }
        }
    }
}
