use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use rocket::{
    form::{self, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// One of the six geographic waves a convention moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Wave(u8);

/// Province codes whose federal ridings hold their races in each wave.
const WAVE_PROVINCES: [&[&str]; 6] = [
    &["BC", "YT"],
    &["AB", "NT"],
    &["SK", "MB", "NU"],
    &["ON"],
    &["QC"],
    &["NB", "NS", "PE", "NL"],
];

impl Wave {
    pub const FIRST: Wave = Wave(1);
    pub const LAST: Wave = Wave(WAVE_PROVINCES.len() as u8);

    pub fn new(number: u8) -> Option<Self> {
        (Self::FIRST.0..=Self::LAST.0)
            .contains(&number)
            .then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// The province codes this wave covers.
    pub fn province_codes(self) -> &'static [&'static str] {
        WAVE_PROVINCES[usize::from(self.0 - 1)]
    }

    /// The wave a province belongs to, if any.
    pub fn for_province(code: &str) -> Option<Self> {
        WAVE_PROVINCES
            .iter()
            .position(|codes| codes.iter().any(|c| c.eq_ignore_ascii_case(code)))
            .map(|index| Self(index as u8 + 1))
    }
}

impl TryFrom<u8> for Wave {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::new(number).ok_or_else(|| format!("No such wave: {number}"))
    }
}

impl From<Wave> for u8 {
    fn from(wave: Wave) -> Self {
        wave.0
    }
}

impl From<Wave> for Bson {
    fn from(wave: Wave) -> Self {
        Bson::Int32(wave.0.into())
    }
}

impl Display for Wave {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "wave{}", self.0)
    }
}

impl<'a> FromParam<'a> for Wave {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<u8>().ok().and_then(Wave::new).ok_or(param)
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Wave {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field
            .value
            .parse::<u8>()
            .ok()
            .and_then(Wave::new)
            .ok_or_else(|| form::Error::validation("wave must be between 1 and 6").into())
    }
}

impl UriDisplay<Path> for Wave {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.0)
    }
}

impl_from_uri_param_identity!([Path] Wave);

/// Where a convention is in its lifecycle.
///
/// Each wave has a nomination stage followed by a voting stage; waves run in
/// order and the convention completes after the last wave's voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ConventionPhase {
    Upcoming,
    Nominations { wave: Wave },
    Voting { wave: Wave },
    Completed,
}

impl ConventionPhase {
    /// Are members currently allowed to nominate each other?
    pub fn accepts_nominations(&self) -> bool {
        matches!(self, Self::Nominations { .. })
    }

    pub fn wave(&self) -> Option<Wave> {
        match self {
            Self::Nominations { wave } | Self::Voting { wave } => Some(*wave),
            Self::Upcoming | Self::Completed => None,
        }
    }

    /// The phase that follows this one, or `None` once completed.
    pub fn next(&self) -> Option<Self> {
        match *self {
            Self::Upcoming => Some(Self::Nominations { wave: Wave::FIRST }),
            Self::Nominations { wave } => Some(Self::Voting { wave }),
            Self::Voting { wave } => Some(match wave.next() {
                Some(wave) => Self::Nominations { wave },
                None => Self::Completed,
            }),
            Self::Completed => None,
        }
    }
}

/// Renders the legacy status tag, e.g. `wave3-voting`.
impl Display for ConventionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upcoming => write!(f, "upcoming"),
            Self::Nominations { wave } => write!(f, "{wave}-nominations"),
            Self::Voting { wave } => write!(f, "{wave}-voting"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl From<ConventionPhase> for Bson {
    fn from(phase: ConventionPhase) -> Self {
        to_bson(&phase).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_bounds() {
        assert_eq!(Wave::new(0), None);
        assert_eq!(Wave::new(1), Some(Wave::FIRST));
        assert_eq!(Wave::new(6), Some(Wave::LAST));
        assert_eq!(Wave::new(7), None);
        assert_eq!(Wave::LAST.next(), None);
    }

    #[test]
    fn every_province_in_exactly_one_wave() {
        let mut seen = Vec::new();
        for number in 1..=6 {
            let wave = Wave::new(number).unwrap();
            for code in wave.province_codes() {
                assert!(!seen.contains(code), "{code} appears twice");
                assert_eq!(Wave::for_province(code), Some(wave));
                seen.push(*code);
            }
        }
        assert_eq!(seen.len(), 13);
        assert_eq!(Wave::for_province("bc"), Some(Wave::FIRST));
        assert_eq!(Wave::for_province("XX"), None);
    }

    #[test]
    fn phases_run_in_order() {
        let mut phase = ConventionPhase::Upcoming;
        let mut tags = vec![phase.to_string()];
        while let Some(next) = phase.next() {
            phase = next;
            tags.push(phase.to_string());
        }
        assert_eq!(tags.len(), 14);
        assert_eq!(tags[1], "wave1-nominations");
        assert_eq!(tags[2], "wave1-voting");
        assert_eq!(tags[12], "wave6-voting");
        assert_eq!(tags[13], "completed");
    }

    #[test]
    fn only_nomination_stages_accept_nominations() {
        let wave = Wave::new(3).unwrap();
        assert!(ConventionPhase::Nominations { wave }.accepts_nominations());
        assert!(!ConventionPhase::Voting { wave }.accepts_nominations());
        assert!(!ConventionPhase::Upcoming.accepts_nominations());
        assert!(!ConventionPhase::Completed.accepts_nominations());
    }

    #[test]
    fn phase_bson_shape() {
        let phase = ConventionPhase::Voting {
            wave: Wave::new(2).unwrap(),
        };
        let bson = Bson::from(phase);
        let doc = bson.as_document().unwrap();
        assert_eq!(doc.get_str("stage").unwrap(), "voting");
        assert_eq!(doc.get_i32("wave").unwrap(), 2);
    }
}
