use std::collections::{HashMap, HashSet};

use chrono::Utc;
use mongodb::{
    bson::{doc, Document},
    Client, ClientSession, Database,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::AuthToken,
        nomination::Ack,
        race::{MemberRef, RaceSummary},
        voting::{
            CandidateTally, CloseRoundResponse, HasVoted, RoundDescription, RoundOutcome,
            StartVotingResponse, Tallies, VoteRequest, VotingStatus,
        },
    },
    common::{
        outcome::{decide, rank, RoundDecision, Standing},
        status::{NotificationKind, RaceStatus, RoundStatus},
    },
    db::{
        admin::Admin,
        ballot::Ballot,
        candidacy::Candidacy,
        elimination::Elimination,
        member::Member,
        notification::Notification,
        race::Race,
        round::VotingRound,
    },
    mongodb::{is_duplicate_key_error, run_transaction, Coll, Id, Transaction},
};

use super::common::{member_by_id, member_ref, member_refs, race_by_id};

pub fn routes() -> Vec<Route> {
    routes![
        start_voting,
        cast_vote,
        voting_status,
        tallies,
        close_round,
        has_voted,
    ]
}

#[post("/voting/race/<race_id>/start")]
async fn start_voting(
    _token: AuthToken<Admin>,
    race_id: Id,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<Json<StartVotingResponse>> {
    let round = run_transaction(db_client, &StartVoting { db, race_id }).await?;
    info!("Voting started in race {race_id}, round {}", round.id);

    Ok(Json(StartVotingResponse {
        success: true,
        message: "Voting has started".to_string(),
        round_id: round.id.into(),
    }))
}

#[post("/voting/race/<race_id>/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    token: AuthToken<Member>,
    race_id: Id,
    vote: Json<VoteRequest>,
    request_id: &RequestId,
    members: Coll<Member>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<Json<Ack>> {
    let voter = member_by_id(token.id, &members).await?;
    if !voter.verified {
        return Err(Error::forbidden("Only verified members can vote"));
    }

    let ballot = CastVote {
        db,
        voter_id: voter.id,
        race_id,
        candidate_id: vote.candidate_id.into(),
    };
    let round_number = run_transaction(db_client, &ballot).await?;
    info!("req{request_id}: {} voted in race {race_id} round {round_number}", voter.id);

    Ok(Json(Ack::new(format!("Vote recorded for round {round_number}"))))
}

#[get("/voting/race/<race_id>/status")]
async fn voting_status(
    race_id: Id,
    races: Coll<Race>,
    rounds: Coll<VotingRound>,
    candidacies: Coll<Candidacy>,
    eliminations: Coll<Elimination>,
    members: Coll<Member>,
) -> Result<Json<VotingStatus>> {
    let race = race_by_id(race_id, &races).await?;
    let current_round = match race.current_round_id {
        Some(round_id) => rounds.find_one(round_id.as_doc(), None).await?,
        None => None,
    };

    let in_race = doc! { "race_id": race_id };
    let eliminated: HashSet<Id> = eliminations
        .find(in_race.clone(), None)
        .await?
        .map_ok(|elimination| elimination.candidate_id)
        .try_collect()
        .await?;
    let active: Vec<Id> = candidacies
        .find(in_race, None)
        .await?
        .map_ok(|candidacy| candidacy.user_id)
        .try_filter(|candidate_id| std::future::ready(!eliminated.contains(candidate_id)))
        .try_collect()
        .await?;
    let refs = member_refs(active.iter().copied(), &members).await?;

    Ok(Json(VotingStatus {
        race: RaceSummary::from(&race),
        current_round: current_round.map(RoundDescription::from),
        active_candidates: active.iter().map(|id| member_ref(*id, &refs)).collect(),
        is_complete: race.status == RaceStatus::Completed,
        winner_id: race.winner_id.map(Into::into),
    }))
}

/// Live counts for the latest round, recomputed from the ballots on every call.
#[get("/voting/race/<race_id>/tallies")]
async fn tallies(
    race_id: Id,
    members: Coll<Member>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<Json<Tallies>> {
    let read = ReadTallies { db, race_id };
    let Some((round, standings)) = run_transaction(db_client, &read).await? else {
        return Ok(Json(Tallies {
            round: None,
            tallies: Vec::new(),
            total_votes: 0,
        }));
    };
    let refs = member_refs(standings.iter().map(|s| s.candidate_id), &members).await?;

    Ok(Json(Tallies {
        round: Some(round.into()),
        total_votes: standings.iter().map(|s| s.votes).sum(),
        tallies: to_tallies(&standings, &refs),
    }))
}

/// Close the current round, then either declare a winner or eliminate the
/// last-placed candidate and open the next round.
///
/// `round` is the round the caller believes is current. If omitted, the
/// round current when the request arrives is used, so a retried request can
/// never close two rounds.
#[allow(clippy::too_many_arguments)]
#[post("/voting/race/<race_id>/close-round?<round>")]
async fn close_round(
    _token: AuthToken<Admin>,
    race_id: Id,
    round: Option<u32>,
    request_id: &RequestId,
    races: Coll<Race>,
    members: Coll<Member>,
    db: &State<Database>,
    db_client: &State<Client>,
) -> Result<Json<CloseRoundResponse>> {
    let expected_round = match round {
        Some(round) => round,
        None => race_by_id(race_id, &races).await?.current_round,
    };

    let close = CloseRound {
        db,
        race_id,
        expected_round,
    };
    let closed = run_transaction(db_client, &close).await?;

    let refs = member_refs(closed.standings.iter().map(|s| s.candidate_id), &members).await?;
    let tallies = to_tallies(&closed.standings, &refs);
    let closed_round = RoundDescription::from(closed.round);
    let outcome = match closed.result {
        RoundResult::Won {
            winner,
            majority,
            tie_broken,
        } => {
            info!(
                "req{request_id}: race {race_id} won by {} with {} votes in round {expected_round}{}",
                winner.candidate_id,
                winner.votes,
                if majority { " (majority)" } else { "" }
            );
            RoundOutcome::Winner {
                winner_id: winner.candidate_id.into(),
                majority,
                tie_broken,
                round: closed_round,
                tallies,
            }
        }
        RoundResult::Eliminated {
            eliminated,
            tie_broken,
            next_round,
        } => {
            info!(
                "req{request_id}: race {race_id} eliminated {} with {} votes in round {expected_round}",
                eliminated.candidate_id, eliminated.votes
            );
            RoundOutcome::Elimination {
                eliminated_id: eliminated.candidate_id.into(),
                eliminated_votes: eliminated.votes,
                tie_broken,
                closed_round,
                next_round: next_round.into(),
                tallies,
            }
        }
    };

    Ok(Json(CloseRoundResponse {
        success: true,
        outcome,
    }))
}

#[get("/voting/race/<race_id>/has-voted/<user_id>")]
async fn has_voted(
    token: AuthToken<Member>,
    race_id: Id,
    user_id: Id,
    races: Coll<Race>,
    ballots: Coll<Ballot>,
) -> Result<Json<HasVoted>> {
    token.ensure_is(user_id)?;

    let race = race_by_id(race_id, &races).await?;
    let Some(round_id) = race.active_round_id() else {
        return Ok(Json(HasVoted {
            has_active_round: false,
            has_voted: false,
        }));
    };
    let count = ballots
        .count_documents(doc! { "voter_id": user_id, "round_id": round_id }, None)
        .await?;
    Ok(Json(HasVoted {
        has_active_round: true,
        has_voted: count > 0,
    }))
}

/// Ranked standings of the active candidates in a round.
///
/// A candidate is active while they hold a candidacy in the race and have
/// not been eliminated. Active candidates without ballots stand on zero.
async fn read_standings(
    db: &Database,
    race_id: Id,
    round_id: Id,
    session: &mut ClientSession,
) -> Result<Vec<Standing>> {
    let in_race = doc! { "race_id": race_id };
    let running: Vec<Candidacy> = Coll::<Candidacy>::from_db(db)
        .find_with_session(in_race.clone(), None, session)
        .await?
        .stream(session)
        .try_collect()
        .await?;
    let eliminated: HashSet<Id> = Coll::<Elimination>::from_db(db)
        .find_with_session(in_race, None, session)
        .await?
        .stream(session)
        .map_ok(|elimination| elimination.candidate_id)
        .try_collect()
        .await?;
    let choices: Vec<Id> = Coll::<Ballot>::from_db(db)
        .find_with_session(doc! { "round_id": round_id }, None, session)
        .await?
        .stream(session)
        .map_ok(|ballot| ballot.candidate_id)
        .try_collect()
        .await?;

    let mut votes: HashMap<Id, u64> = HashMap::new();
    for candidate_id in choices {
        *votes.entry(candidate_id).or_default() += 1;
    }

    let mut standings: Vec<Standing> = running
        .iter()
        .filter(|candidacy| !eliminated.contains(&candidacy.user_id))
        .map(|candidacy| Standing {
            candidate_id: candidacy.user_id,
            votes: votes.get(&candidacy.user_id).copied().unwrap_or(0),
            nomination_count: candidacy.nomination_count,
        })
        .collect();
    rank(&mut standings);
    Ok(standings)
}

fn to_tallies(standings: &[Standing], refs: &HashMap<Id, MemberRef>) -> Vec<CandidateTally> {
    standings
        .iter()
        .map(|standing| CandidateTally {
            candidate: member_ref(standing.candidate_id, refs),
            votes: standing.votes,
        })
        .collect()
}

/// Read a race's latest round and its standings from one snapshot, so the
/// round's status and ballot count agree with the tallies.
struct ReadTallies<'a> {
    db: &'a Database,
    race_id: Id,
}

#[rocket::async_trait]
impl Transaction for ReadTallies<'_> {
    /// `None` until voting starts.
    type Output = Option<(VotingRound, Vec<Standing>)>;

    const NAME: &'static str = "read-tallies";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let race = Coll::<Race>::from_db(self.db)
            .find_one_with_session(self.race_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {}", self.race_id)))?;
        let Some(round_id) = race.current_round_id else {
            return Ok(None);
        };

        let round = Coll::<VotingRound>::from_db(self.db)
            .find_one_with_session(round_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Round {round_id}")))?;
        let standings = read_standings(self.db, race.id, round_id, session).await?;
        Ok(Some((round, standings)))
    }
}

/// Open round 1 of a race.
struct StartVoting<'a> {
    db: &'a Database,
    race_id: Id,
}

#[rocket::async_trait]
impl Transaction for StartVoting<'_> {
    type Output = VotingRound;

    const NAME: &'static str = "start-voting";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let races = Coll::<Race>::from_db(self.db);
        let race = races
            .find_one_with_session(self.race_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {}", self.race_id)))?;

        let rounds = Coll::<VotingRound>::from_db(self.db);
        let in_race = doc! { "race_id": race.id };
        let existing = rounds
            .count_documents_with_session(in_race.clone(), None, session)
            .await?;
        if existing > 0 {
            return Err(Error::bad_request("Voting has already started in this race"));
        }
        if race.status != RaceStatus::Open {
            return Err(Error::bad_request("This race is not open"));
        }
        let candidates = Coll::<Candidacy>::from_db(self.db)
            .count_documents_with_session(in_race, None, session)
            .await?;
        if candidates == 0 {
            return Err(Error::bad_request("This race has no candidates"));
        }

        let round = VotingRound::start(race.id, 1);
        let filter = doc! {
            "_id": race.id,
            "status": RaceStatus::Open,
            "current_round": 0,
        };
        let update = doc! {
            "$set": {
                "status": RaceStatus::Voting,
                "current_round": i64::from(round.round_number),
                "current_round_id": round.id,
            },
        };
        let result = races
            .update_one_with_session(filter, update, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::conflict("The race changed while voting was starting"));
        }

        match rounds.insert_one_with_session(&round, None, session).await {
            Ok(_) => Ok(round),
            Err(err) if is_duplicate_key_error(&err) => {
                Err(Error::bad_request("Voting has already started in this race"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Record one member's vote in the active round of a race.
struct CastVote<'a> {
    db: &'a Database,
    voter_id: Id,
    race_id: Id,
    candidate_id: Id,
}

#[rocket::async_trait]
impl Transaction for CastVote<'_> {
    /// The round the vote was counted in.
    type Output = u32;

    const NAME: &'static str = "cast-vote";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let race = Coll::<Race>::from_db(self.db)
            .find_one_with_session(self.race_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {}", self.race_id)))?;
        let round_id = race
            .active_round_id()
            .ok_or_else(|| Error::bad_request("There is no active voting round"))?;

        let candidate = doc! { "race_id": race.id, "user_id": self.candidate_id };
        let running = Coll::<Candidacy>::from_db(self.db)
            .count_documents_with_session(candidate, None, session)
            .await?;
        let eliminated = Coll::<Elimination>::from_db(self.db)
            .count_documents_with_session(
                doc! { "race_id": race.id, "candidate_id": self.candidate_id },
                None,
                session,
            )
            .await?;
        if running == 0 || eliminated > 0 {
            return Err(Error::bad_request("That candidate is not active in this race"));
        }

        let ballots = Coll::<Ballot>::from_db(self.db);
        let receipt = doc! { "voter_id": self.voter_id, "round_id": round_id };
        if ballots
            .count_documents_with_session(receipt, None, session)
            .await?
            > 0
        {
            return Err(Error::bad_request("You have already voted in this round"));
        }

        // Writing to the round makes this transaction conflict with a
        // concurrent close, so no ballot lands in a round after its tally.
        let result = Coll::<VotingRound>::from_db(self.db)
            .update_one_with_session(
                doc! { "_id": round_id, "status": RoundStatus::Active },
                doc! { "$inc": { "ballot_count": 1 } },
                None,
                session,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::bad_request("There is no active voting round"));
        }

        let ballot = Ballot::new(self.voter_id, round_id, race.id, self.candidate_id);
        match ballots.insert_one_with_session(&ballot, None, session).await {
            Ok(_) => Ok(race.current_round),
            Err(err) if is_duplicate_key_error(&err) => {
                Err(Error::bad_request("You have already voted in this round"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Close the current round of a race and act on its result.
struct CloseRound<'a> {
    db: &'a Database,
    race_id: Id,
    expected_round: u32,
}

struct ClosedRound {
    result: RoundResult,
    /// Ranked, as tallied when the round closed.
    standings: Vec<Standing>,
    round: VotingRound,
}

enum RoundResult {
    Won {
        winner: Standing,
        majority: bool,
        tie_broken: bool,
    },
    Eliminated {
        eliminated: Standing,
        tie_broken: bool,
        next_round: VotingRound,
    },
}

#[rocket::async_trait]
impl Transaction for CloseRound<'_> {
    type Output = ClosedRound;

    const NAME: &'static str = "close-round";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let races = Coll::<Race>::from_db(self.db);
        let race = races
            .find_one_with_session(self.race_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Race {}", self.race_id)))?;
        let round_id = race
            .active_round_id()
            .ok_or_else(|| Error::bad_request("There is no active voting round"))?;
        if race.current_round != self.expected_round {
            return Err(Error::conflict(format!(
                "Round {} is not the current round (current round is {})",
                self.expected_round, race.current_round
            )));
        }

        let rounds = Coll::<VotingRound>::from_db(self.db);
        let mut round = rounds
            .find_one_with_session(round_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Round {round_id}")))?;
        if round.status != RoundStatus::Active {
            return Err(Error::bad_request("There is no active voting round"));
        }

        let standings = read_standings(self.db, race.id, round_id, session).await?;
        let decision = decide(&standings)
            .ok_or_else(|| Error::bad_request("This race has no active candidates"))?;

        round.status = RoundStatus::Completed;
        round.closed_at = Some(Utc::now());
        let notifications = round_notifications(&race, &round, decision, &standings);

        let result = match decision {
            RoundDecision::Winner {
                winner,
                majority,
                tie_broken,
            } => {
                let update = doc! {
                    "$set": {
                        "status": RaceStatus::Completed,
                        "winner_id": winner.candidate_id,
                    },
                };
                self.advance_race(update, session).await?;
                RoundResult::Won {
                    winner,
                    majority,
                    tie_broken,
                }
            }
            RoundDecision::Eliminate {
                eliminated,
                tie_broken,
            } => {
                let next_round = VotingRound::start(race.id, round.round_number + 1);
                let update = doc! {
                    "$set": {
                        "current_round": i64::from(next_round.round_number),
                        "current_round_id": next_round.id,
                    },
                };
                self.advance_race(update, session).await?;

                let elimination = Elimination {
                    id: Id::new(),
                    race_id: race.id,
                    round_id,
                    round_number: round.round_number,
                    candidate_id: eliminated.candidate_id,
                    votes: eliminated.votes,
                };
                Coll::<Elimination>::from_db(self.db)
                    .insert_one_with_session(&elimination, None, session)
                    .await?;
                rounds
                    .insert_one_with_session(&next_round, None, session)
                    .await?;
                RoundResult::Eliminated {
                    eliminated,
                    tie_broken,
                    next_round,
                }
            }
        };

        rounds
            .update_one_with_session(
                round_id.as_doc(),
                doc! {
                    "$set": {
                        "status": RoundStatus::Completed,
                        "closed_at": round.closed_at,
                    },
                },
                None,
                session,
            )
            .await?;
        Coll::<Notification>::from_db(self.db)
            .insert_many_with_session(&notifications, None, session)
            .await?;

        Ok(ClosedRound {
            result,
            standings,
            round,
        })
    }
}

impl CloseRound<'_> {
    /// Compare-and-swap on the round pointer, so each round closes once.
    async fn advance_race(&self, update: Document, session: &mut ClientSession) -> Result<()> {
        let current = doc! {
            "_id": self.race_id,
            "status": RaceStatus::Voting,
            "current_round": i64::from(self.expected_round),
        };
        let result = Coll::<Race>::from_db(self.db)
            .update_one_with_session(current, update, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::conflict("Another request closed this round first"));
        }
        Ok(())
    }
}

/// One notification per active candidate telling them how the round went.
fn round_notifications(
    race: &Race,
    round: &VotingRound,
    decision: RoundDecision,
    standings: &[Standing],
) -> Vec<Notification> {
    let number = round.round_number;
    standings
        .iter()
        .map(|standing| {
            let (kind, message) = match decision {
                RoundDecision::Winner { winner, .. } if winner.candidate_id == standing.candidate_id => (
                    NotificationKind::Won,
                    format!("You won the race in round {number} with {} votes", standing.votes),
                ),
                RoundDecision::Winner { .. } => (
                    NotificationKind::Lost,
                    format!("The race was decided in round {number}; you received {} votes", standing.votes),
                ),
                RoundDecision::Eliminate { eliminated, .. }
                    if eliminated.candidate_id == standing.candidate_id =>
                {
                    (
                        NotificationKind::Eliminated,
                        format!("You were eliminated in round {number} with {} votes", standing.votes),
                    )
                }
                RoundDecision::Eliminate { .. } => (
                    NotificationKind::Advanced,
                    format!("You advance to round {} with {} votes", number + 1, standing.votes),
                ),
            };
            Notification::new(standing.candidate_id, kind, race.id, number, message)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
        tokio,
    };

    use crate::api::testing::auth_cookie;
    use crate::model::{common::phase::Wave, db::race::NewRace};

    use super::*;

    struct Setup {
        admin: Admin,
        race: Race,
        a: Member,
        b: Member,
        c: Member,
        voters: Vec<Member>,
    }

    /// A race with three accepted candidates and the given number of
    /// verified voters.
    async fn race_with_candidates(db: &Database, voter_count: usize) -> Setup {
        let admin = Admin::example();
        Coll::<Admin>::from_db(db).insert_one(&admin, None).await.unwrap();

        let race = Race {
            id: Id::new(),
            race: NewRace::new(Id::new(), Id::new(), Wave::FIRST),
        };
        Coll::<Race>::from_db(db).insert_one(&race, None).await.unwrap();

        let a = Member::example("A", Some(race.riding_id));
        let b = Member::example("B", Some(race.riding_id));
        let c = Member::example("C", Some(race.riding_id));
        let voters: Vec<Member> = (0..voter_count)
            .map(|i| Member::example(&format!("Voter {i}"), None))
            .collect();
        let members = Coll::<Member>::from_db(db);
        members.insert_many([&a, &b, &c], None).await.unwrap();
        if !voters.is_empty() {
            members.insert_many(&voters, None).await.unwrap();
        }

        let candidacies = [&a, &b, &c].map(|m| Candidacy::example(m.id, &race));
        Coll::<Candidacy>::from_db(db)
            .insert_many(&candidacies, None)
            .await
            .unwrap();

        Setup {
            admin,
            race,
            a,
            b,
            c,
            voters,
        }
    }

    async fn start(client: &Client, admin: &Admin, race_id: Id) -> Status {
        client
            .post(uri!(start_voting(race_id)))
            .cookie(auth_cookie(client, admin))
            .dispatch()
            .await
            .status()
    }

    async fn vote(client: &Client, voter: &Member, race_id: Id, candidate: &Member) -> Status {
        client
            .post(uri!(cast_vote(race_id)))
            .cookie(auth_cookie(client, voter))
            .header(ContentType::JSON)
            .body(json!({ "candidateId": candidate.id.to_string() }).to_string())
            .dispatch()
            .await
            .status()
    }

    async fn close(
        client: &Client,
        admin: &Admin,
        race_id: Id,
        round: Option<u32>,
    ) -> (Status, Option<CloseRoundResponse>) {
        let uri = match round {
            Some(round) => format!("/voting/race/{race_id}/close-round?round={round}"),
            None => format!("/voting/race/{race_id}/close-round"),
        };
        let response = client
            .post(uri)
            .cookie(auth_cookie(client, admin))
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json().await)
    }

    async fn get_tallies(client: &Client, race_id: Id) -> Tallies {
        client
            .get(uri!(tallies(race_id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap()
    }

    async fn get_status(client: &Client, race_id: Id) -> VotingStatus {
        client
            .get(uri!(voting_status(race_id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap()
    }

    #[backend_test]
    async fn runoff_to_a_majority(client: Client, db: Database, notifications: Coll<Notification>) {
        let s = race_with_candidates(&db, 9).await;
        let race_id = s.race.id;
        assert_eq!(Status::Ok, start(&client, &s.admin, race_id).await);

        // Round 1: A=3, B=3, C=2.
        let round_one = [&s.a, &s.a, &s.a, &s.b, &s.b, &s.b, &s.c, &s.c];
        for (voter, candidate) in s.voters.iter().zip(round_one) {
            assert_eq!(Status::Ok, vote(&client, voter, race_id, candidate).await);
        }
        let live = get_tallies(&client, race_id).await;
        assert_eq!(live.total_votes, 8);
        assert_eq!(live.tallies.len(), 3);
        assert_eq!(live.tallies[2].votes, 2);

        let (status, closed) = close(&client, &s.admin, race_id, Some(1)).await;
        assert_eq!(Status::Ok, status);
        match closed.unwrap().outcome {
            RoundOutcome::Elimination {
                eliminated_id,
                eliminated_votes,
                tie_broken,
                next_round,
                ..
            } => {
                assert_eq!(Id::from(eliminated_id), s.c.id);
                assert_eq!(eliminated_votes, 2);
                assert!(!tie_broken);
                assert_eq!(next_round.round_number, 2);
            }
            other => panic!("Expected an elimination, got {other:?}"),
        }

        let live = get_tallies(&client, race_id).await;
        let round = live.round.unwrap();
        assert_eq!(round.round_number, 2);
        assert_eq!(round.status, RoundStatus::Active);
        assert_eq!(live.tallies.len(), 2);
        assert_eq!(live.total_votes, 0);

        // C is out for good.
        assert_eq!(
            Status::BadRequest,
            vote(&client, &s.voters[0], race_id, &s.c).await
        );
        let status = get_status(&client, race_id).await;
        assert!(status.active_candidates.iter().all(|m| Id::from(m.id) != s.c.id));

        // Round 2: A=5, B=4.
        let round_two = [&s.a, &s.a, &s.a, &s.a, &s.a, &s.b, &s.b, &s.b, &s.b];
        for (voter, candidate) in s.voters.iter().zip(round_two) {
            assert_eq!(Status::Ok, vote(&client, voter, race_id, candidate).await);
        }
        let (status, closed) = close(&client, &s.admin, race_id, None).await;
        assert_eq!(Status::Ok, status);
        match closed.unwrap().outcome {
            RoundOutcome::Winner {
                winner_id,
                majority,
                ..
            } => {
                assert_eq!(Id::from(winner_id), s.a.id);
                assert!(majority);
            }
            other => panic!("Expected a winner, got {other:?}"),
        }

        let status = get_status(&client, race_id).await;
        assert!(status.is_complete);
        assert_eq!(status.winner_id.map(Id::from), Some(s.a.id));

        // Nothing left to close or vote in.
        let (status, _) = close(&client, &s.admin, race_id, None).await;
        assert_eq!(Status::BadRequest, status);
        assert_eq!(
            Status::BadRequest,
            vote(&client, &s.voters[0], race_id, &s.a).await
        );

        // Round 1 told all three, round 2 told the final two.
        let count = notifications
            .count_documents(doc! { "race_id": race_id }, None)
            .await
            .unwrap();
        assert_eq!(count, 5);
        let won = notifications
            .find_one(doc! { "user_id": s.a.id, "kind": "won" }, None)
            .await
            .unwrap();
        assert!(won.is_some());
    }

    #[backend_test]
    async fn one_vote_per_round(client: Client, db: Database, ballots: Coll<Ballot>) {
        let s = race_with_candidates(&db, 1).await;
        let race_id = s.race.id;
        let voter = &s.voters[0];

        // No round yet.
        assert_eq!(Status::BadRequest, vote(&client, voter, race_id, &s.a).await);
        assert_eq!(Status::Ok, start(&client, &s.admin, race_id).await);
        assert_eq!(Status::BadRequest, start(&client, &s.admin, race_id).await);

        let (first, second) = tokio::join!(
            vote(&client, voter, race_id, &s.a),
            vote(&client, voter, race_id, &s.b),
        );
        let successes = [first, second]
            .iter()
            .filter(|status| **status == Status::Ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(ballots.count_documents(None, None).await.unwrap(), 1);

        let has_voted: HasVoted = client
            .get(uri!(has_voted(race_id, voter.id)))
            .cookie(auth_cookie(&client, voter))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(has_voted.has_active_round);
        assert!(has_voted.has_voted);

        // Asking about someone else is forbidden.
        let response = client
            .get(uri!(has_voted(race_id, s.a.id)))
            .cookie(auth_cookie(&client, voter))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn unverified_members_cannot_vote(client: Client, db: Database, members: Coll<Member>) {
        let s = race_with_candidates(&db, 1).await;
        let voter = &s.voters[0];
        members
            .update_one(voter.id.as_doc(), doc! { "$set": { "verified": false } }, None)
            .await
            .unwrap();
        assert_eq!(Status::Ok, start(&client, &s.admin, s.race.id).await);
        assert_eq!(
            Status::Forbidden,
            vote(&client, voter, s.race.id, &s.a).await
        );
    }

    #[backend_test]
    async fn stale_close_is_a_conflict(client: Client, db: Database, rounds: Coll<VotingRound>) {
        let s = race_with_candidates(&db, 0).await;
        let race_id = s.race.id;
        assert_eq!(Status::Ok, start(&client, &s.admin, race_id).await);

        // No ballots: all three level on zero, so the tie-break picks who goes.
        let (status, closed) = close(&client, &s.admin, race_id, Some(1)).await;
        assert_eq!(Status::Ok, status);
        match closed.unwrap().outcome {
            RoundOutcome::Elimination { tie_broken, .. } => assert!(tie_broken),
            other => panic!("Expected an elimination, got {other:?}"),
        }

        // A second close aimed at round 1 must not close round 2.
        let (status, _) = close(&client, &s.admin, race_id, Some(1)).await;
        assert_eq!(Status::Conflict, status);
        let open = rounds
            .count_documents(doc! { "race_id": race_id, "status": "active" }, None)
            .await
            .unwrap();
        assert_eq!(open, 1);
        assert_eq!(rounds.count_documents(None, None).await.unwrap(), 2);

        // Two left, so the next close declares a winner even without votes.
        let (status, closed) = close(&client, &s.admin, race_id, Some(2)).await;
        assert_eq!(Status::Ok, status);
        assert!(matches!(
            closed.unwrap().outcome,
            RoundOutcome::Winner { majority: false, tie_broken: true, .. }
        ));
    }

    #[backend_test]
    async fn cannot_start_without_candidates(client: Client, db: Database, candidacies: Coll<Candidacy>) {
        let s = race_with_candidates(&db, 0).await;
        candidacies.delete_many(doc! {}, None).await.unwrap();
        assert_eq!(Status::BadRequest, start(&client, &s.admin, s.race.id).await);
        assert_eq!(Status::NotFound, start(&client, &s.admin, Id::new()).await);
    }

    #[backend_test]
    async fn tallies_match_round_while_voting(client: Client, db: Database) {
        let s = race_with_candidates(&db, 4).await;
        let race_id = s.race.id;

        let before = get_tallies(&client, race_id).await;
        assert!(before.round.is_none());
        assert_eq!(before.total_votes, 0);
        let response = client.get(uri!(tallies(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        assert_eq!(Status::Ok, start(&client, &s.admin, race_id).await);
        let candidates = [&s.a, &s.b, &s.c, &s.a];
        for (voter, candidate) in s.voters.iter().zip(candidates) {
            // Reads racing the vote still see one consistent round.
            let (status, live) = tokio::join!(
                vote(&client, voter, race_id, candidate),
                get_tallies(&client, race_id),
            );
            assert_eq!(Status::Ok, status);
            assert_eq!(live.round.unwrap().ballot_count, live.total_votes);
        }

        let live = get_tallies(&client, race_id).await;
        assert_eq!(live.total_votes, 4);
        assert_eq!(live.round.unwrap().ballot_count, 4);
        assert_eq!(Id::from(live.tallies[0].candidate.id), s.a.id);
    }
}
