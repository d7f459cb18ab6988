use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the nomination race lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    /// Taking nominations and acceptances.
    Open,
    /// Rounds are being run.
    Voting,
    /// A winner has been declared.
    Completed,
}

impl From<RaceStatus> for Bson {
    fn from(status: RaceStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Active,
    Completed,
}

impl From<RoundStatus> for Bson {
    fn from(status: RoundStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Electoral level of a riding. Wave races are created for federal ridings,
/// but a nomination may name either of the nominee's home ridings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RidingKind {
    #[default]
    Federal,
    Provincial,
}

impl From<RidingKind> for Bson {
    fn from(kind: RidingKind) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}

/// What a round-outcome notification tells its recipient.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// You were eliminated in this round.
    Eliminated,
    /// You survived this round and are in the next one.
    Advanced,
    /// You won the race.
    Won,
    /// Someone else won the race.
    Lost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_store_as_lowercase_strings() {
        assert_eq!(Bson::from(RaceStatus::Voting), Bson::String("voting".into()));
        assert_eq!(Bson::from(RoundStatus::Active), Bson::String("active".into()));
        assert_eq!(
            Bson::from(RidingKind::Provincial),
            Bson::String("provincial".into())
        );
    }
}
