//! The decision taken when a voting round is closed.
//!
//! A round ends the race when some candidate holds a strict majority of the
//! ballots cast, or when at most two candidates remain. Otherwise the
//! candidate at the bottom of the ranking is eliminated and a new round opens.
//!
//! Ranking order is votes descending, then the nomination count recorded when
//! the candidate accepted (descending), then candidate ID ascending. The winner
//! is the top of this ranking and the eliminated candidate is the bottom, so
//! exact ties are always resolved the same way.

use std::cmp::Ordering;

use crate::model::mongodb::Id;

/// Number of remaining candidates at or below which the leader wins outright.
pub const RUNOFF_FLOOR: usize = 2;

/// One active candidate's standing in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub candidate_id: Id,
    pub votes: u64,
    pub nomination_count: u64,
}

impl Standing {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .votes
            .cmp(&self.votes)
            .then(other.nomination_count.cmp(&self.nomination_count))
            .then(self.candidate_id.cmp(&other.candidate_id))
    }
}

/// Sort standings into ranking order, best first.
pub fn rank(standings: &mut [Standing]) {
    standings.sort_by(Standing::rank_cmp);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDecision {
    Winner {
        winner: Standing,
        /// Whether the winner held more than half the ballots.
        majority: bool,
        /// Whether the runner-up had exactly as many votes.
        tie_broken: bool,
    },
    Eliminate {
        eliminated: Standing,
        /// Whether another candidate shared the lowest vote count.
        tie_broken: bool,
    },
}

/// Decide how a round with the given standings ends.
///
/// Returns `None` if there are no candidates, since nobody can win or be
/// eliminated.
pub fn decide(standings: &[Standing]) -> Option<RoundDecision> {
    let mut ranked = standings.to_vec();
    rank(&mut ranked);

    let top = *ranked.first()?;
    let total: u64 = ranked.iter().map(|s| s.votes).sum();
    let majority = top.votes * 2 > total;

    if majority || ranked.len() <= RUNOFF_FLOOR {
        let tie_broken = ranked.get(1).map_or(false, |s| s.votes == top.votes);
        return Some(RoundDecision::Winner {
            winner: top,
            majority,
            tie_broken,
        });
    }

    // At least three candidates, so there is always a second-to-last entry.
    let eliminated = ranked[ranked.len() - 1];
    let tie_broken = ranked[ranked.len() - 2].votes == eliminated.votes;
    Some(RoundDecision::Eliminate {
        eliminated,
        tie_broken,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(id: &str, votes: u64, nomination_count: u64) -> Standing {
        Standing {
            candidate_id: id.parse().unwrap(),
            votes,
            nomination_count,
        }
    }

    const A: &str = "00000000000000000000000a";
    const B: &str = "00000000000000000000000b";
    const C: &str = "00000000000000000000000c";
    const D: &str = "00000000000000000000000d";

    #[test]
    fn no_candidates_no_decision() {
        assert_eq!(decide(&[]), None);
    }

    #[test]
    fn lowest_is_eliminated_without_majority() {
        // A=3, B=3, C=2 out of 8: nobody has more than half.
        let standings = [standing(A, 3, 1), standing(B, 3, 1), standing(C, 2, 5)];
        let decision = decide(&standings).unwrap();
        assert_eq!(
            decision,
            RoundDecision::Eliminate {
                eliminated: standings[2],
                tie_broken: false,
            }
        );
    }

    #[test]
    fn strict_majority_wins() {
        let standings = [standing(A, 5, 1), standing(B, 2, 1), standing(C, 2, 1)];
        match decide(&standings).unwrap() {
            RoundDecision::Winner {
                winner, majority, ..
            } => {
                assert_eq!(winner.candidate_id, standings[0].candidate_id);
                assert!(majority);
            }
            other => panic!("Expected a winner, got {other:?}"),
        }
    }

    #[test]
    fn exactly_half_is_not_a_majority() {
        let standings = [standing(A, 4, 1), standing(B, 2, 1), standing(C, 2, 1)];
        assert!(matches!(
            decide(&standings).unwrap(),
            RoundDecision::Eliminate { .. }
        ));
    }

    #[test]
    fn two_remaining_leader_wins() {
        // Two left and level on votes: no majority, but someone must win.
        let standings = [standing(A, 4, 1), standing(B, 4, 3)];
        match decide(&standings).unwrap() {
            RoundDecision::Winner {
                winner,
                majority,
                tie_broken,
            } => {
                // Equal votes: more nominations ranks higher.
                assert_eq!(winner.candidate_id, standings[1].candidate_id);
                assert!(!majority);
                assert!(tie_broken);
            }
            other => panic!("Expected a winner, got {other:?}"),
        }
    }

    #[test]
    fn sole_candidate_wins_even_with_no_votes() {
        let standings = [standing(A, 0, 1)];
        assert!(matches!(
            decide(&standings).unwrap(),
            RoundDecision::Winner { majority: false, .. }
        ));
    }

    #[test]
    fn bottom_tie_broken_by_nominations_then_id() {
        let standings = [
            standing(A, 5, 1),
            standing(B, 1, 2),
            standing(C, 1, 1),
            standing(D, 1, 1),
        ];
        match decide(&standings).unwrap() {
            RoundDecision::Eliminate {
                eliminated,
                tie_broken,
            } => {
                // C and D tie on votes and nominations; the larger ID goes.
                assert_eq!(eliminated.candidate_id, standings[3].candidate_id);
                assert!(tie_broken);
            }
            other => panic!("Expected an elimination, got {other:?}"),
        }
    }

    #[test]
    fn zero_ballots_still_eliminates_one() {
        let standings = [standing(A, 0, 3), standing(B, 0, 2), standing(C, 0, 1)];
        match decide(&standings).unwrap() {
            RoundDecision::Eliminate { eliminated, .. } => {
                assert_eq!(eliminated.candidate_id, standings[2].candidate_id);
            }
            other => panic!("Expected an elimination, got {other:?}"),
        }
    }

    #[test]
    fn decision_ignores_input_order() {
        let forwards = [standing(A, 2, 1), standing(B, 3, 1), standing(C, 3, 1)];
        let mut backwards = forwards;
        backwards.reverse();
        assert_eq!(decide(&forwards), decide(&backwards));
    }
}
