use std::collections::HashMap;

use mongodb::{
    bson::{doc, to_document},
    options::UpdateOptions,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::race::MemberRef,
    common::phase::Wave,
    db::{
        convention::Convention,
        member::Member,
        race::{NewRace, Race},
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

pub async fn convention_by_id(
    convention_id: Id,
    conventions: &Coll<Convention>,
) -> Result<Convention> {
    conventions
        .find_one(convention_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Convention {convention_id}")))
}

pub async fn race_by_id(race_id: Id, races: &Coll<Race>) -> Result<Race> {
    races
        .find_one(race_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Race {race_id}")))
}

pub async fn member_by_id(member_id: Id, members: &Coll<Member>) -> Result<Member> {
    members
        .find_one(member_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Member {member_id}")))
}

/// Look up display references for the given members. Unknown IDs are skipped.
pub async fn member_refs(
    member_ids: impl IntoIterator<Item = Id>,
    members: &Coll<Member>,
) -> Result<HashMap<Id, MemberRef>> {
    let ids: Vec<Id> = member_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let found: Vec<Member> = members
        .find(doc! { "_id": { "$in": ids } }, None)
        .await?
        .try_collect()
        .await?;
    Ok(found
        .iter()
        .map(|member| (member.id, MemberRef::from(member)))
        .collect())
}

/// The display reference for a member, falling back to a bare ID if the
/// registry no longer knows them.
pub fn member_ref(member_id: Id, refs: &HashMap<Id, MemberRef>) -> MemberRef {
    refs.get(&member_id).cloned().unwrap_or_else(|| MemberRef {
        id: member_id.into(),
        name: String::new(),
    })
}

/// Find the race for a riding in a convention, creating it if needed.
///
/// Returns the race and whether this call created it. Safe to call
/// concurrently: the unique `(convention_id, riding_id)` index means at most
/// one upsert inserts, and a losing upsert is retried as a plain match.
pub async fn get_or_create_race(
    convention_id: Id,
    riding_id: Id,
    wave: Wave,
    races: &Coll<Race>,
) -> Result<(Race, bool)> {
    let filter = doc! {
        "convention_id": convention_id,
        "riding_id": riding_id,
    };
    let update = doc! {
        "$setOnInsert": to_document(&NewRace::new(convention_id, riding_id, wave))?,
    };
    let upsert = UpdateOptions::builder().upsert(true).build();

    let result = match races
        .update_one(filter.clone(), update.clone(), upsert.clone())
        .await
    {
        Err(err) if is_duplicate_key_error(&err) => {
            debug!("Lost race creation for riding {riding_id}, retrying");
            races.update_one(filter.clone(), update, upsert).await?
        }
        result => result?,
    };
    let created = result.upserted_id.is_some();

    let race = races
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Race for riding {riding_id}")))?;
    if created {
        info!(
            "Created race {} for riding {riding_id} in convention {convention_id} ({wave})",
            race.id
        );
    }
    Ok((race, created))
}
