use std::collections::HashMap;

use mongodb::{
    bson::doc,
    options::{FindOneOptions, FindOptions},
    ClientSession, Database,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        nomination::{
            Ack, CandidacyRequest, NominationDescription, NominationGroup, NominationRequest,
            NominationResponse,
        },
        race::{RaceSummary, RidingDescription},
    },
    common::{
        phase::Wave,
        status::{RaceStatus, RidingKind},
    },
    db::{
        candidacy::Candidacy,
        convention::Convention,
        location::{Province, Riding},
        member::Member,
        nomination::Nomination,
        race::Race,
    },
    mongodb::{is_duplicate_key_error, run_transaction, Coll, Id, Transaction},
};

use super::common::{convention_by_id, get_or_create_race, member_by_id, member_ref, member_refs};

pub fn routes() -> Vec<Route> {
    routes![
        nominate,
        nominations_for_user,
        accept_nomination,
        decline_nomination,
        withdraw,
    ]
}

/// Work out which riding a member is being nominated for.
///
/// Members can only be nominated for their own home riding of the requested
/// kind; naming any other riding is rejected rather than corrected.
pub fn resolve_nominee_riding(
    nominee: &Member,
    kind: RidingKind,
    requested: Option<Id>,
) -> Result<Id> {
    let home = nominee.home_riding(kind).ok_or_else(|| {
        Error::bad_request(format!(
            "{} must set their home location before they can be nominated",
            nominee.name
        ))
    })?;
    match requested {
        Some(riding_id) if riding_id != home => Err(Error::bad_request(
            "Members can only be nominated for the riding they live in",
        )),
        _ => Ok(home),
    }
}

#[allow(clippy::too_many_arguments)]
#[post("/conventions/<convention_id>/nominate", data = "<request>", format = "json")]
async fn nominate(
    token: AuthToken<Member>,
    convention_id: Id,
    request: Json<NominationRequest>,
    conventions: Coll<Convention>,
    members: Coll<Member>,
    provinces: Coll<Province>,
    ridings: Coll<Riding>,
    races: Coll<Race>,
    nominations: Coll<Nomination>,
) -> Result<Json<NominationResponse>> {
    let request = request.0;
    let nominator_id: Id = request.nominator_id.into();
    let nominee_id: Id = request.nominee_id.into();
    token.ensure_is(nominator_id)?;

    if nominator_id == nominee_id {
        return Err(Error::bad_request("You cannot nominate yourself"));
    }

    let convention = convention_by_id(convention_id, &conventions).await?;
    if !convention.phase.accepts_nominations() {
        return Err(Error::bad_request(format!(
            "Convention is not taking nominations (status: {})",
            convention.phase
        )));
    }

    // Pin the nominee to their own riding.
    let nominee = member_by_id(nominee_id, &members).await?;
    let riding_id = resolve_nominee_riding(
        &nominee,
        request.riding_type.unwrap_or_default(),
        request.riding_id.map(Id::from),
    )?;
    // The riding's province decides the race's wave. Ridings missing from
    // the registry, or outside the wave table, join whichever wave is running.
    let riding = ridings.find_one(riding_id.as_doc(), None).await?;
    let province = match &riding {
        Some(riding) => provinces.find_one(riding.province_id.as_doc(), None).await?,
        None => {
            warn!("Nominee {nominee_id} lives in unknown riding {riding_id}");
            None
        }
    };
    let wave = province
        .and_then(|province| Wave::for_province(&province.code))
        .or_else(|| convention.phase.wave())
        .ok_or_else(|| Error::bad_request("Convention is not taking nominations"))?;
    let riding_name = riding.map_or_else(|| format!("riding {riding_id}"), |r| r.name);

    let (race, _) = get_or_create_race(convention_id, riding_id, wave, &races).await?;
    if let Some(race_id) = request.race_id {
        if Id::from(race_id) != race.id {
            return Err(Error::bad_request(
                "Members can only be nominated for the riding they live in",
            ));
        }
    }
    if race.status != RaceStatus::Open {
        return Err(Error::bad_request(format!(
            "The race in {riding_name} is no longer taking nominations"
        )));
    }

    let nomination = Nomination::new(nominator_id, nominee_id, &race, request.message);
    match nominations.insert_one(&nomination, None).await {
        Ok(_) => {}
        Err(err) if is_duplicate_key_error(&err) => {
            debug!("{nominator_id} already nominated {nominee_id} in race {}", race.id);
            return Err(Error::bad_request(format!(
                "You have already nominated {} in this race",
                nominee.name
            )));
        }
        Err(err) => return Err(err.into()),
    }

    let nomination_count = nominations
        .count_documents(doc! { "nominee_id": nominee_id, "race_id": race.id }, None)
        .await?;
    info!(
        "{nominator_id} nominated {nominee_id} in race {} ({nomination_count} nominations)",
        race.id
    );

    Ok(Json(NominationResponse {
        success: true,
        message: format!("Nominated {} in {riding_name}", nominee.name),
        race_id: race.id.into(),
        nomination_count,
        riding: None,
    }))
}

#[allow(clippy::too_many_arguments)]
#[get("/conventions/<convention_id>/nominations/<user_id>")]
async fn nominations_for_user(
    _token: AuthToken<Member>,
    convention_id: Id,
    user_id: Id,
    conventions: Coll<Convention>,
    nominations: Coll<Nomination>,
    races: Coll<Race>,
    ridings: Coll<Riding>,
    candidacies: Coll<Candidacy>,
    members: Coll<Member>,
) -> Result<Json<Vec<NominationGroup>>> {
    convention_by_id(convention_id, &conventions).await?;

    let oldest_first = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
    let received: Vec<Nomination> = nominations
        .find(
            doc! { "nominee_id": user_id, "convention_id": convention_id },
            oldest_first,
        )
        .await?
        .try_collect()
        .await?;

    let mut by_race: HashMap<Id, Vec<Nomination>> = HashMap::new();
    for nomination in received {
        by_race.entry(nomination.race_id).or_default().push(nomination);
    }

    let race_ids: Vec<Id> = by_race.keys().copied().collect();
    let found_races: HashMap<Id, Race> = races
        .find(doc! { "_id": { "$in": race_ids } }, None)
        .await?
        .map_ok(|race| (race.id, race))
        .try_collect()
        .await?;
    let riding_ids: Vec<Id> = found_races.values().map(|race| race.riding_id).collect();
    let found_ridings: HashMap<Id, Riding> = ridings
        .find(doc! { "_id": { "$in": riding_ids } }, None)
        .await?
        .map_ok(|riding| (riding.id, riding))
        .try_collect()
        .await?;
    let nominators = member_refs(
        by_race.values().flatten().map(|n| n.nominator_id),
        &members,
    )
    .await?;
    let accepted_race = candidacies
        .find_one(doc! { "user_id": user_id, "convention_id": convention_id }, None)
        .await?
        .map(|candidacy| candidacy.race_id);

    let mut groups = Vec::with_capacity(by_race.len());
    for (race_id, race_nominations) in by_race {
        let Some(race) = found_races.get(&race_id) else {
            warn!("Nominations reference missing race {race_id}");
            continue;
        };
        let Some(riding) = found_ridings.get(&race.riding_id) else {
            warn!("Race {race_id} references missing riding {}", race.riding_id);
            continue;
        };
        groups.push(NominationGroup {
            race: RaceSummary::from(race),
            riding: RidingDescription::from(riding.clone()),
            nomination_count: race_nominations.len() as u64,
            has_accepted: accepted_race == Some(race_id),
            nominations: race_nominations
                .into_iter()
                .map(|n| NominationDescription {
                    id: n.id.into(),
                    nominator: member_ref(n.nominator_id, &nominators),
                    message: n.message,
                    created_at: n.created_at,
                })
                .collect(),
        });
    }
    groups.sort_by(|a, b| b.nomination_count.cmp(&a.nomination_count));

    Ok(Json(groups))
}

#[post("/conventions/<convention_id>/accept-nomination", data = "<request>", format = "json")]
async fn accept_nomination(
    token: AuthToken<Member>,
    convention_id: Id,
    request: Json<CandidacyRequest>,
    ridings: Coll<Riding>,
    db: &State<Database>,
    db_client: &State<mongodb::Client>,
) -> Result<Json<NominationResponse>> {
    let user_id: Id = request.user_id.into();
    token.ensure_is(user_id)?;

    let accept = AcceptNomination {
        db,
        convention_id,
        user_id,
        race_id: request.race_id.into(),
    };
    let (race, candidacy) = run_transaction(db_client, &accept).await?;
    info!(
        "{user_id} accepted {} nominations and is running in race {}",
        candidacy.nomination_count, race.id
    );

    let riding = ridings.find_one(race.riding_id.as_doc(), None).await?;
    Ok(Json(NominationResponse {
        success: true,
        message: "Nomination accepted".to_string(),
        race_id: race.id.into(),
        nomination_count: candidacy.nomination_count,
        riding: riding.map(RidingDescription::from),
    }))
}

#[post("/conventions/<convention_id>/decline-nomination", data = "<request>", format = "json")]
async fn decline_nomination(
    token: AuthToken<Member>,
    convention_id: Id,
    request: Json<CandidacyRequest>,
    db: &State<Database>,
    db_client: &State<mongodb::Client>,
) -> Result<Json<Ack>> {
    let user_id: Id = request.user_id.into();
    token.ensure_is(user_id)?;

    let decline = DeclineNomination {
        db,
        convention_id,
        user_id,
        race_id: request.race_id.into(),
    };
    let removed = run_transaction(db_client, &decline).await?;
    info!("{user_id} declined {removed} nominations in race {}", decline.race_id);

    Ok(Json(Ack::new(format!("Declined {removed} nominations"))))
}

#[post("/conventions/<convention_id>/withdraw", data = "<request>", format = "json")]
async fn withdraw(
    token: AuthToken<Member>,
    convention_id: Id,
    request: Json<CandidacyRequest>,
    db: &State<Database>,
    db_client: &State<mongodb::Client>,
) -> Result<Json<Ack>> {
    let user_id: Id = request.user_id.into();
    token.ensure_is(user_id)?;

    let withdrawal = Withdraw {
        db,
        convention_id,
        user_id,
        race_id: request.race_id.into(),
    };
    let message = if run_transaction(db_client, &withdrawal).await? {
        info!("{user_id} withdrew from race {}", withdrawal.race_id);
        "Withdrew from the race"
    } else {
        "Not running in this race"
    };
    Ok(Json(Ack::new(message)))
}

/// Fetch a race, if it exists and belongs to the convention in the request path.
async fn race_in_convention(
    race_id: Id,
    convention_id: Id,
    db: &Database,
    session: &mut ClientSession,
) -> Result<Option<Race>> {
    let race = Coll::<Race>::from_db(db)
        .find_one_with_session(race_id.as_doc(), None, session)
        .await?
        .filter(|race| race.convention_id == convention_id);
    if race.is_none() {
        debug!("No race {race_id} in convention {convention_id}");
    }
    Ok(race)
}

/// Turn a member's nominations for a race into a candidacy.
struct AcceptNomination<'a> {
    db: &'a Database,
    convention_id: Id,
    user_id: Id,
    race_id: Id,
}

#[rocket::async_trait]
impl Transaction for AcceptNomination<'_> {
    type Output = (Race, Candidacy);

    const NAME: &'static str = "accept-nomination";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let race = race_in_convention(self.race_id, self.convention_id, self.db, session)
            .await?
            .ok_or_else(|| Error::bad_request("You have not been nominated in this race"))?;
        if race.status != RaceStatus::Open {
            return Err(Error::bad_request(
                "Voting has started, nominations can no longer be accepted",
            ));
        }

        let candidacies = Coll::<Candidacy>::from_db(self.db);
        let existing = candidacies
            .find_one_with_session(
                doc! { "user_id": self.user_id, "convention_id": self.convention_id },
                None,
                session,
            )
            .await?;
        if let Some(existing) = existing {
            debug!("{} is already running in race {}", self.user_id, existing.race_id);
            return Err(if existing.race_id == race.id {
                Error::bad_request("You have already accepted this nomination")
            } else {
                Error::bad_request(
                    "You are already running in another race in this convention; withdraw first",
                )
            });
        }

        let nominations = Coll::<Nomination>::from_db(self.db);
        let received = doc! { "nominee_id": self.user_id, "race_id": race.id };
        let nomination_count = nominations
            .count_documents_with_session(received.clone(), None, session)
            .await?;
        let oldest_first = FindOneOptions::builder().sort(doc! { "created_at": 1 }).build();
        let first = nominations
            .find_one_with_session(received, oldest_first, session)
            .await?
            .ok_or_else(|| Error::bad_request("You have not been nominated in this race"))?;

        let candidacy = Candidacy::new(self.user_id, &race, first.created_at, nomination_count);
        match candidacies
            .insert_one_with_session(&candidacy, None, session)
            .await
        {
            Ok(_) => {}
            Err(err) if is_duplicate_key_error(&err) => {
                return Err(Error::bad_request(
                    "You are already running in a race in this convention",
                ))
            }
            Err(err) => return Err(err.into()),
        }

        Coll::<Member>::from_db(self.db)
            .update_one_with_session(
                self.user_id.as_doc(),
                doc! { "$set": { "candidate": true } },
                None,
                session,
            )
            .await?;

        Ok((race, candidacy))
    }
}

/// Drop all of a member's nominations for a race.
struct DeclineNomination<'a> {
    db: &'a Database,
    convention_id: Id,
    user_id: Id,
    race_id: Id,
}

#[rocket::async_trait]
impl Transaction for DeclineNomination<'_> {
    type Output = u64;

    const NAME: &'static str = "decline-nomination";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let Some(race) =
            race_in_convention(self.race_id, self.convention_id, self.db, session).await?
        else {
            return Ok(0);
        };

        let running = Coll::<Candidacy>::from_db(self.db)
            .count_documents_with_session(
                doc! { "user_id": self.user_id, "race_id": race.id },
                None,
                session,
            )
            .await?;
        if running > 0 {
            return Err(Error::bad_request(
                "You are running in this race; withdraw before declining",
            ));
        }

        let result = Coll::<Nomination>::from_db(self.db)
            .delete_many_with_session(
                doc! { "nominee_id": self.user_id, "race_id": race.id },
                None,
                session,
            )
            .await?;
        Ok(result.deleted_count)
    }
}

/// Remove a member's candidacy. Their nominations are kept.
struct Withdraw<'a> {
    db: &'a Database,
    convention_id: Id,
    user_id: Id,
    race_id: Id,
}

#[rocket::async_trait]
impl Transaction for Withdraw<'_> {
    /// Whether there was a candidacy to remove.
    type Output = bool;

    const NAME: &'static str = "withdraw";

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output> {
        let Some(race) =
            race_in_convention(self.race_id, self.convention_id, self.db, session).await?
        else {
            return Ok(false);
        };

        let candidacies = Coll::<Candidacy>::from_db(self.db);
        let filter = doc! { "user_id": self.user_id, "race_id": race.id };
        if candidacies
            .find_one_with_session(filter.clone(), None, session)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        // Ballots already cast for this candidate must keep counting.
        if race.status != RaceStatus::Open {
            return Err(Error::bad_request(
                "Voting has started, candidates can no longer withdraw",
            ));
        }

        candidacies
            .delete_one_with_session(filter, None, session)
            .await?;
        Coll::<Member>::from_db(self.db)
            .update_one_with_session(
                self.user_id.as_doc(),
                doc! { "$set": { "candidate": false } },
                None,
                session,
            )
            .await?;
        Ok(true)
    }
}
