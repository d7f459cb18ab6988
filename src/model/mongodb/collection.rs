use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::Admin,
    ballot::Ballot,
    candidacy::Candidacy,
    convention::{Convention, NewConvention},
    elimination::Elimination,
    idea::{Endorsement, Idea},
    location::{Province, Riding},
    member::Member,
    nomination::Nomination,
    notification::Notification,
    race::{NewRace, Race},
    round::VotingRound,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Collections owned by other services, read here.
impl MongoCollection for Member {
    const NAME: &'static str = "users";
}
impl MongoCollection for Admin {
    const NAME: &'static str = "admins";
}
impl MongoCollection for Province {
    const NAME: &'static str = "provinces";
}
impl MongoCollection for Riding {
    const NAME: &'static str = "ridings";
}
impl MongoCollection for Idea {
    const NAME: &'static str = "ideas";
}
impl MongoCollection for Endorsement {
    const NAME: &'static str = "endorsements";
}

// Convention collections
const CONVENTIONS: &str = "conventions";
impl MongoCollection for Convention {
    const NAME: &'static str = CONVENTIONS;
}
impl MongoCollection for NewConvention {
    const NAME: &'static str = CONVENTIONS;
}

// Race collections
const RACES: &str = "races";
impl MongoCollection for Race {
    const NAME: &'static str = RACES;
}
impl MongoCollection for NewRace {
    const NAME: &'static str = RACES;
}

impl MongoCollection for Nomination {
    const NAME: &'static str = "nominations";
}
impl MongoCollection for Candidacy {
    const NAME: &'static str = "candidacies";
}
impl MongoCollection for VotingRound {
    const NAME: &'static str = "rounds";
}
impl MongoCollection for Ballot {
    const NAME: &'static str = "ballots";
}
impl MongoCollection for Elimination {
    const NAME: &'static str = "eliminations";
}
impl MongoCollection for Notification {
    const NAME: &'static str = "notifications";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes here are what make the voting invariants hold under
/// concurrent requests, not just the checks in the request handlers.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One race per riding per convention.
    let race_index = IndexModel::builder()
        .keys(doc! {"convention_id": 1, "riding_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Race>::from_db(db)
        .create_index(race_index, None)
        .await?;

    // One nomination per nominator per nominee per race.
    let nomination_index = IndexModel::builder()
        .keys(doc! {"nominator_id": 1, "nominee_id": 1, "race_id": 1})
        .options(unique.clone())
        .build();
    let nominee_index = IndexModel::builder()
        .keys(doc! {"nominee_id": 1, "convention_id": 1})
        .build();
    Coll::<Nomination>::from_db(db)
        .create_indexes([nomination_index, nominee_index], None)
        .await?;

    // One candidacy per member per convention.
    let candidacy_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "convention_id": 1})
        .options(unique.clone())
        .build();
    let candidacy_race_index = IndexModel::builder().keys(doc! {"race_id": 1}).build();
    Coll::<Candidacy>::from_db(db)
        .create_indexes([candidacy_index, candidacy_race_index], None)
        .await?;

    // Round numbers never repeat within a race.
    let round_index = IndexModel::builder()
        .keys(doc! {"race_id": 1, "round_number": 1})
        .options(unique.clone())
        .build();
    Coll::<VotingRound>::from_db(db)
        .create_index(round_index, None)
        .await?;

    // One ballot per voter per round.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "round_id": 1})
        .options(unique.clone())
        .build();
    let ballot_round_index = IndexModel::builder()
        .keys(doc! {"round_id": 1, "candidate_id": 1})
        .build();
    Coll::<Ballot>::from_db(db)
        .create_indexes([ballot_index, ballot_round_index], None)
        .await?;

    // A candidate is eliminated from a race at most once.
    let elimination_index = IndexModel::builder()
        .keys(doc! {"race_id": 1, "candidate_id": 1})
        .options(unique)
        .build();
    Coll::<Elimination>::from_db(db)
        .create_index(elimination_index, None)
        .await?;

    Ok(())
}
