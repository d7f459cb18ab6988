use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        convention::{ConventionDescription, ConventionSpec},
        race::{ProvinceReport, WaveRacesReport},
    },
    common::{
        phase::{ConventionPhase, Wave},
        status::RidingKind,
    },
    db::{
        admin::Admin,
        convention::Convention,
        location::{Province, Riding},
        race::Race,
    },
    mongodb::{Coll, Id},
};

use super::common::{convention_by_id, get_or_create_race};

pub fn routes() -> Vec<Route> {
    routes![
        create_convention,
        get_convention,
        advance_phase,
        create_races_for_wave,
    ]
}

#[post("/conventions", data = "<spec>", format = "json")]
async fn create_convention(
    _token: AuthToken<Admin>,
    spec: Json<ConventionSpec>,
    conventions: Coll<Convention>,
) -> Result<Json<ConventionDescription>> {
    if spec.name.trim().is_empty() {
        return Err(Error::bad_request("Convention name must not be empty"));
    }

    let convention = Convention {
        id: Id::new(),
        convention: spec.0.into(),
    };
    conventions.insert_one(&convention, None).await?;
    info!(
        "Created convention {} ({} {})",
        convention.id, convention.name, convention.year
    );

    Ok(Json(convention.into()))
}

#[get("/conventions/<convention_id>")]
async fn get_convention(
    convention_id: Id,
    conventions: Coll<Convention>,
) -> Result<Json<ConventionDescription>> {
    let convention = convention_by_id(convention_id, &conventions).await?;
    Ok(Json(convention.into()))
}

/// Move the convention to its next phase.
///
/// The update only matches while the stored phase is still the one read
/// here, so two concurrent advances cannot skip a phase.
#[post("/conventions/<convention_id>/advance-phase")]
async fn advance_phase(
    _token: AuthToken<Admin>,
    convention_id: Id,
    conventions: Coll<Convention>,
) -> Result<Json<ConventionDescription>> {
    let convention = convention_by_id(convention_id, &conventions).await?;
    let current = convention.phase;
    let next = current
        .next()
        .ok_or_else(|| Error::bad_request(format!("Convention {convention_id} is already completed")))?;

    let filter = doc! {
        "_id": convention_id,
        "phase": current,
    };
    let update = doc! {
        "$set": { "phase": next },
    };
    let result = conventions.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::conflict(format!(
            "Convention {convention_id} has already left {current}"
        )));
    }
    info!("Convention {convention_id} advanced from {current} to {next}");

    let convention = convention_by_id(convention_id, &conventions).await?;
    Ok(Json(convention.into()))
}

/// Create one race per federal riding in the provinces of a wave.
///
/// Re-running is safe: existing races are left as they are and only counted.
#[post("/conventions/<convention_id>/waves/<wave>/races")]
async fn create_races_for_wave(
    _token: AuthToken<Admin>,
    convention_id: Id,
    wave: Wave,
    conventions: Coll<Convention>,
    provinces: Coll<Province>,
    ridings: Coll<Riding>,
    races: Coll<Race>,
) -> Result<Json<WaveRacesReport>> {
    let convention = convention_by_id(convention_id, &conventions).await?;
    if convention.phase == ConventionPhase::Completed {
        return Err(Error::bad_request(format!(
            "Convention {convention_id} is already completed"
        )));
    }

    let codes = wave.province_codes();
    let wave_provinces: Vec<Province> = provinces
        .find(doc! { "code": { "$in": codes } }, None)
        .await?
        .try_collect()
        .await?;

    if wave_provinces.is_empty() {
        warn!("No provinces found for {wave} ({})", codes.join(", "));
        return Ok(Json(WaveRacesReport {
            wave,
            races_created: 0,
            races_total: 0,
            provinces: Vec::new(),
            message: format!(
                "No provinces found for {wave} ({}); has the location data been loaded?",
                codes.join(", ")
            ),
        }));
    }

    let mut races_created = 0;
    let mut races_total = 0;
    let mut reports = Vec::with_capacity(wave_provinces.len());
    for province in &wave_provinces {
        let filter = doc! {
            "province_id": province.id,
            "kind": RidingKind::Federal,
        };
        let province_ridings: Vec<Riding> = ridings.find(filter, None).await?.try_collect().await?;
        debug!(
            "{wave}: {} ({}) has {} federal ridings",
            province.name,
            province.code,
            province_ridings.len()
        );

        for riding in &province_ridings {
            let (_, created) = get_or_create_race(convention_id, riding.id, wave, &races).await?;
            if created {
                races_created += 1;
            }
            races_total += 1;
        }
        reports.push(ProvinceReport::new(province, province_ridings.len() as u64));
    }

    let message = if races_total == 0 {
        format!("No federal ridings found in the provinces of {wave}")
    } else {
        format!("Created {races_created} of {races_total} races for {wave}")
    };
    info!("Convention {convention_id}: {message}");

    Ok(Json(WaveRacesReport {
        wave,
        races_created,
        races_total,
        provinces: reports,
        message,
    }))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::api::testing::auth_cookie;
    use crate::model::db::convention::NewConvention;

    use super::*;

    #[backend_test]
    async fn create_and_advance(client: Client, admins: Coll<Admin>) {
        let admin = Admin::example();
        admins.insert_one(&admin, None).await.unwrap();
        let cookie = auth_cookie(&client, &admin);

        let response = client
            .post(uri!(create_convention))
            .cookie(cookie.clone())
            .header(ContentType::JSON)
            .body(json!({"name": "Founding Convention", "year": 2026}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created: ConventionDescription = response.into_json().await.unwrap();
        assert_eq!(created.phase, ConventionPhase::Upcoming);
        assert_eq!(created.status, "upcoming");

        let convention_id: Id = created.id.into();
        let response = client
            .post(uri!(advance_phase(convention_id)))
            .cookie(cookie.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let advanced: ConventionDescription = response.into_json().await.unwrap();
        assert_eq!(advanced.status, "wave1-nominations");
        assert_eq!(advanced.current_wave, Some(Wave::FIRST));

        let response = client
            .get(uri!(get_convention(convention_id)))
            .dispatch()
            .await;
        let fetched: ConventionDescription = response.into_json().await.unwrap();
        assert_eq!(fetched, advanced);
    }

    #[backend_test]
    async fn completed_convention_cannot_advance(
        client: Client,
        admins: Coll<Admin>,
        conventions: Coll<NewConvention>,
    ) {
        let admin = Admin::example();
        admins.insert_one(&admin, None).await.unwrap();
        let convention_id: Id = conventions
            .insert_one(NewConvention::example(ConventionPhase::Completed), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client
            .post(uri!(advance_phase(convention_id)))
            .cookie(auth_cookie(&client, &admin))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn wave_races_are_idempotent(client: Client, db: Database) {
        let admin = Admin::example();
        Coll::<Admin>::from_db(&db).insert_one(&admin, None).await.unwrap();
        let convention_id: Id = Coll::<NewConvention>::from_db(&db)
            .insert_one(NewConvention::example(ConventionPhase::Upcoming), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let bc = Province::example("BC");
        let yt = Province::example("YT");
        let on = Province::example("ON");
        Coll::<Province>::from_db(&db)
            .insert_many([&bc, &yt, &on], None)
            .await
            .unwrap();
        let mut provincial = Riding::example("Vancouver East (provincial)", &bc);
        provincial.kind = RidingKind::Provincial;
        let wave_ridings = [
            Riding::example("Vancouver East", &bc),
            Riding::example("Victoria", &bc),
            Riding::example("Yukon", &yt),
            Riding::example("Toronto Centre", &on),
            provincial,
        ];
        Coll::<Riding>::from_db(&db)
            .insert_many(&wave_ridings, None)
            .await
            .unwrap();

        let cookie = auth_cookie(&client, &admin);
        let response = client
            .post(uri!(create_races_for_wave(convention_id, Wave::FIRST)))
            .cookie(cookie.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: WaveRacesReport = response.into_json().await.unwrap();
        assert_eq!(report.races_created, 3);
        assert_eq!(report.races_total, 3);
        assert_eq!(report.provinces.len(), 2);

        // Running it again creates nothing new.
        let response = client
            .post(uri!(create_races_for_wave(convention_id, Wave::FIRST)))
            .cookie(cookie)
            .dispatch()
            .await;
        let report: WaveRacesReport = response.into_json().await.unwrap();
        assert_eq!(report.races_created, 0);
        assert_eq!(report.races_total, 3);

        let count = Coll::<Race>::from_db(&db)
            .count_documents(doc! { "convention_id": convention_id }, None)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[backend_test]
    async fn unseeded_wave_reports_nothing(client: Client, db: Database) {
        let admin = Admin::example();
        Coll::<Admin>::from_db(&db).insert_one(&admin, None).await.unwrap();
        let convention_id: Id = Coll::<NewConvention>::from_db(&db)
            .insert_one(NewConvention::example(ConventionPhase::Upcoming), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client
            .post(uri!(create_races_for_wave(convention_id, Wave::LAST)))
            .cookie(auth_cookie(&client, &admin))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let report: WaveRacesReport = response.into_json().await.unwrap();
        assert_eq!(report.races_created, 0);
        assert!(report.message.contains("No provinces found"));
    }
}
