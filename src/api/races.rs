use std::collections::HashSet;

use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::race::{CandidateDescription, RaceDetail, RaceSummary},
    common::phase::Wave,
    db::{
        candidacy::Candidacy,
        convention::Convention,
        elimination::Elimination,
        idea::{Endorsement, Idea},
        location::Riding,
        member::Member,
        race::Race,
    },
    mongodb::{Coll, Id},
};

use super::common::{convention_by_id, member_refs, race_by_id};

pub fn routes() -> Vec<Route> {
    routes![list_races, get_race]
}

#[get("/conventions/<convention_id>/races?<wave>")]
async fn list_races(
    convention_id: Id,
    wave: Option<Wave>,
    conventions: Coll<Convention>,
    races: Coll<Race>,
) -> Result<Json<Vec<RaceSummary>>> {
    convention_by_id(convention_id, &conventions).await?;

    let mut filter = doc! { "convention_id": convention_id };
    if let Some(wave) = wave {
        filter.insert("wave", wave);
    }
    let sort = FindOptions::builder()
        .sort(doc! { "wave": 1, "created_at": 1 })
        .build();
    let found: Vec<Race> = races.find(filter, sort).await?.try_collect().await?;
    Ok(Json(found.iter().map(RaceSummary::from).collect()))
}

#[allow(clippy::too_many_arguments)]
#[get("/races/<race_id>")]
async fn get_race(
    race_id: Id,
    races: Coll<Race>,
    ridings: Coll<Riding>,
    candidacies: Coll<Candidacy>,
    eliminations: Coll<Elimination>,
    members: Coll<Member>,
    ideas: Coll<Idea>,
    endorsements: Coll<Endorsement>,
) -> Result<Json<RaceDetail>> {
    let race = race_by_id(race_id, &races).await?;
    let riding = ridings
        .find_one(race.riding_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Riding {}", race.riding_id)))?;

    let in_race = doc! { "race_id": race_id };
    let running: Vec<Candidacy> = candidacies
        .find(in_race.clone(), None)
        .await?
        .try_collect()
        .await?;
    let eliminated: HashSet<Id> = eliminations
        .find(in_race, None)
        .await?
        .map_ok(|elimination| elimination.candidate_id)
        .try_collect()
        .await?;
    let refs = member_refs(running.iter().map(|c| c.user_id), &members).await?;

    let mut candidates = Vec::with_capacity(running.len());
    for candidacy in &running {
        let candidate_id = candidacy.user_id;
        let endorsement_count = endorsements
            .count_documents(doc! { "candidate_id": candidate_id }, None)
            .await?;
        let points = idea_points(candidate_id, &ideas).await?;
        candidates.push(CandidateDescription {
            id: candidate_id.into(),
            name: refs
                .get(&candidate_id)
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            nomination_count: candidacy.nomination_count,
            endorsements: endorsement_count,
            points,
            eliminated: eliminated.contains(&candidate_id),
        });
    }
    candidates.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.endorsements.cmp(&a.endorsements))
    });

    Ok(Json(RaceDetail {
        race: RaceSummary::from(&race),
        riding: riding.into(),
        candidates,
    }))
}

/// One point per supporter, summed over every idea the member has posted.
async fn idea_points(author_id: Id, ideas: &Coll<Idea>) -> Result<u64> {
    let projection: Document = doc! { "supporter_ids": 1 };
    let options = FindOptions::builder().projection(projection).build();
    let per_idea: Vec<u64> = ideas
        .clone_with_type::<Document>()
        .find(doc! { "author_id": author_id }, options)
        .await?
        .map_ok(|idea| {
            idea.get_array("supporter_ids")
                .map_or(0, |supporters| supporters.len() as u64)
        })
        .try_collect()
        .await?;
    Ok(per_idea.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::{
        common::phase::ConventionPhase,
        db::{convention::NewConvention, location::Province, race::NewRace},
    };

    use super::*;

    #[backend_test]
    async fn race_detail_ranks_by_points(client: Client, db: Database) {
        let province = Province::example("BC");
        let riding = Riding::example("Vancouver Quadra", &province);
        Coll::<Riding>::from_db(&db).insert_one(&riding, None).await.unwrap();
        let convention = Convention {
            id: Id::new(),
            convention: NewConvention::example(ConventionPhase::Nominations { wave: Wave::FIRST }),
        };
        Coll::<Convention>::from_db(&db).insert_one(&convention, None).await.unwrap();
        let race = Race {
            id: Id::new(),
            race: NewRace::new(convention.id, riding.id, Wave::FIRST),
        };
        Coll::<Race>::from_db(&db).insert_one(&race, None).await.unwrap();

        let quiet = Member::example("Quiet", Some(riding.id));
        let popular = Member::example("Popular", Some(riding.id));
        Coll::<Member>::from_db(&db)
            .insert_many([&quiet, &popular], None)
            .await
            .unwrap();
        let candidacies = [&quiet, &popular].map(|member| Candidacy::example(member.id, &race));
        Coll::<Candidacy>::from_db(&db)
            .insert_many(&candidacies, None)
            .await
            .unwrap();

        let idea = Idea {
            id: Id::new(),
            author_id: popular.id,
            supporter_ids: vec![Id::new(), Id::new(), Id::new()],
        };
        Coll::<Idea>::from_db(&db).insert_one(&idea, None).await.unwrap();
        let endorsement = Endorsement {
            id: Id::new(),
            endorser_id: Id::new(),
            candidate_id: quiet.id,
        };
        Coll::<Endorsement>::from_db(&db)
            .insert_one(&endorsement, None)
            .await
            .unwrap();

        let response = client.get(uri!(get_race(race.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let detail: RaceDetail = response.into_json().await.unwrap();
        assert_eq!(detail.riding.name, "Vancouver Quadra");
        let names: Vec<&str> = detail.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Popular", "Quiet"]);
        assert_eq!(detail.candidates[0].points, 3);
        assert_eq!(detail.candidates[1].endorsements, 1);

        let response = client.get(uri!(get_race(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn list_races_filters_by_wave(client: Client, db: Database, races: Coll<NewRace>) {
        let convention = Convention {
            id: Id::new(),
            convention: NewConvention::example(ConventionPhase::Upcoming),
        };
        Coll::<Convention>::from_db(&db)
            .insert_one(&convention, None)
            .await
            .unwrap();
        let wave_two = Wave::new(2).unwrap();
        races
            .insert_many(
                [
                    NewRace::new(convention.id, Id::new(), Wave::FIRST),
                    NewRace::new(convention.id, Id::new(), Wave::FIRST),
                    NewRace::new(convention.id, Id::new(), wave_two),
                ],
                None,
            )
            .await
            .unwrap();

        let response = client
            .get(format!("/conventions/{}/races?wave=2", convention.id))
            .dispatch()
            .await;
        let listed: Vec<RaceSummary> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].wave, wave_two);

        let response = client
            .get(format!("/conventions/{}/races", convention.id))
            .dispatch()
            .await;
        let listed: Vec<RaceSummary> = response.into_json().await.unwrap();
        assert_eq!(listed.len(), 3);
    }
}
